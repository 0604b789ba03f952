use pyo3::exceptions::{PyRuntimeError, PyValueError};
use pyo3::prelude::*;
use pyo3::types::{PyAny, PyBytes, PyDict, PyList, PyTuple};
use xlsxsplit::conf::{
    derive_default_preview_options, derive_default_split_options,
    derive_default_xlsx_write_options,
};
use xlsxsplit::spec::{
    EnumSplitMode, SpecArtifact, SpecPreview, SpecSplitReport, SpecXlsxWriteOptions, SplitError,
};
use xlsxsplit::{
    Session as RsSession, SpecSplitOutput, TabularCodec, XlsxCodec,
    derive_dataset_from_ipc_bytes, split_dataset,
};

const N_BRIDGE_ABI_VERSION: u64 = 1;
const C_BRIDGE_CONTRACT_VERSION: &str = "xlsxsplit.split.v1";
const C_BRIDGE_TRANSPORT: &str = "arrow_ipc_bytes";

#[pyclass(name = "SplitSession")]
struct PySplitSession {
    #[pyo3(get)]
    file_name: String,
    inner: RsSession,
    codec: XlsxCodec,
}

#[pymethods]
impl PySplitSession {
    #[new]
    #[pyo3(signature = (file_name, data, write_options = None))]
    fn new(
        file_name: String,
        data: &[u8],
        write_options: Option<&Bound<'_, PyAny>>,
    ) -> PyResult<Self> {
        let cfg_write_options = parse_spec_xlsx_write_options(write_options)?
            .unwrap_or_else(derive_default_xlsx_write_options);
        let codec = XlsxCodec::new(cfg_write_options);
        let inner = RsSession::load(&file_name, data, &codec).map_err(derive_py_err)?;

        Ok(Self {
            file_name,
            inner,
            codec,
        })
    }

    fn sheet_names(&self) -> Vec<String> {
        self.inner.sheet_names()
    }

    fn needs_sheet_selection(&self) -> bool {
        self.inner.needs_sheet_selection()
    }

    fn selected_sheet(&self) -> Option<String> {
        self.inner.selected_sheet().map(ToString::to_string)
    }

    fn select_sheet(&mut self, sheet_name: &str) -> PyResult<()> {
        self.inner.select_sheet(sheet_name).map_err(derive_py_err)
    }

    fn available_columns(&self) -> PyResult<Vec<String>> {
        self.inner.available_columns().map_err(derive_py_err)
    }

    #[pyo3(signature = (rows_max = None, cols_max = None))]
    fn preview(
        &self,
        py: Python<'_>,
        rows_max: Option<usize>,
        cols_max: Option<usize>,
    ) -> PyResult<Py<PyAny>> {
        let mut cfg_preview_options = derive_default_preview_options();
        if let Some(v) = rows_max {
            cfg_preview_options.rows_max = v;
        }
        if let Some(v) = cols_max {
            cfg_preview_options.cols_max = v;
        }

        let preview = self
            .inner
            .preview(cfg_preview_options)
            .map_err(derive_py_err)?;
        create_preview_object(py, &preview)
    }

    #[pyo3(signature = (split_key, mode = "per-file", group_label_merged = None))]
    fn process(
        &self,
        py: Python<'_>,
        split_key: &str,
        mode: &str,
        group_label_merged: Option<String>,
    ) -> PyResult<Py<PyAny>> {
        let rule_mode = parse_rule_split_mode(mode)?;
        let mut cfg_split_options = derive_default_split_options();
        if let Some(v) = group_label_merged {
            cfg_split_options.group_label_merged = v;
        }

        let output = py
            .allow_threads(|| {
                self.inner
                    .process(split_key, rule_mode, &self.codec, cfg_split_options)
            })
            .map_err(derive_py_err)?;
        create_split_output_object(py, &output)
    }
}

/// Sheet names of a workbook, in file order.
#[pyfunction]
fn list_sheets(py: Python<'_>, data: &[u8]) -> PyResult<Vec<String>> {
    let codec = XlsxCodec::default();
    let workbook = py
        .allow_threads(|| codec.decode(data))
        .map_err(derive_py_err)?;
    Ok(workbook.sheet_names())
}

/// One-shot load, sheet selection and split of workbook bytes.
#[pyfunction]
#[pyo3(signature = (
    data,
    file_name,
    split_key,
    mode = "per-file",
    sheet_name = None,
    write_options = None
))]
fn split_workbook(
    py: Python<'_>,
    data: &[u8],
    file_name: &str,
    split_key: &str,
    mode: &str,
    sheet_name: Option<&str>,
    write_options: Option<&Bound<'_, PyAny>>,
) -> PyResult<Py<PyAny>> {
    let rule_mode = parse_rule_split_mode(mode)?;
    let cfg_write_options = parse_spec_xlsx_write_options(write_options)?
        .unwrap_or_else(derive_default_xlsx_write_options);
    let codec = XlsxCodec::new(cfg_write_options);

    let output = py
        .allow_threads(|| {
            let mut session = RsSession::load(file_name, data, &codec)?;
            if let Some(c_sheet_name) = sheet_name {
                session.select_sheet(c_sheet_name)?;
            }
            session.process(split_key, rule_mode, &codec, derive_default_split_options())
        })
        .map_err(derive_py_err)?;
    create_split_output_object(py, &output)
}

/// Split an Arrow IPC payload (e.g. `polars.DataFrame.write_ipc(None).getvalue()`).
#[pyfunction]
#[pyo3(signature = (
    ipc_bytes,
    split_key,
    mode = "per-file",
    base_file_name = "data.xlsx",
    write_options = None
))]
fn split_dataframe_ipc(
    py: Python<'_>,
    ipc_bytes: &[u8],
    split_key: &str,
    mode: &str,
    base_file_name: &str,
    write_options: Option<&Bound<'_, PyAny>>,
) -> PyResult<Py<PyAny>> {
    let rule_mode = parse_rule_split_mode(mode)?;
    let cfg_write_options = parse_spec_xlsx_write_options(write_options)?
        .unwrap_or_else(derive_default_xlsx_write_options);
    let codec = XlsxCodec::new(cfg_write_options);

    let output = py
        .allow_threads(|| {
            let dataset = derive_dataset_from_ipc_bytes(ipc_bytes)?;
            split_dataset(
                &dataset,
                split_key,
                rule_mode,
                base_file_name,
                &codec,
                derive_default_split_options(),
            )
        })
        .map_err(derive_py_err)?;
    create_split_output_object(py, &output)
}

/// Split any object `polars.DataFrame(...)` accepts.
#[pyfunction]
#[pyo3(signature = (
    df,
    split_key,
    mode = "per-file",
    base_file_name = "data.xlsx",
    write_options = None
))]
fn split_dataframe<'py>(
    py: Python<'py>,
    df: &Bound<'py, PyAny>,
    split_key: &str,
    mode: &str,
    base_file_name: &str,
    write_options: Option<&Bound<'py, PyAny>>,
) -> PyResult<Py<PyAny>> {
    let v_ipc_df = derive_ipc_bytes_from_any_dataframe(py, df)?;
    split_dataframe_ipc(py, &v_ipc_df, split_key, mode, base_file_name, write_options)
}

fn derive_py_err(err: SplitError) -> PyErr {
    if err.is_input_error() {
        PyValueError::new_err(err.to_string())
    } else {
        PyRuntimeError::new_err(err.to_string())
    }
}

fn parse_rule_split_mode(value: &str) -> PyResult<EnumSplitMode> {
    value.parse::<EnumSplitMode>().map_err(PyValueError::new_err)
}

fn derive_ipc_bytes_from_any_dataframe<'py>(
    py: Python<'py>,
    df: &Bound<'py, PyAny>,
) -> PyResult<Vec<u8>> {
    let df_polars = convert_to_polars_dataframe(py, df)?;
    let buf_ipc = df_polars.call_method1("write_ipc", (py.None(),))?;
    buf_ipc.call_method0("getvalue")?.extract::<Vec<u8>>()
}

fn convert_to_polars_dataframe<'py>(
    py: Python<'py>,
    df: &Bound<'py, PyAny>,
) -> PyResult<Bound<'py, PyAny>> {
    let module_polars = py.import("polars")?;
    let cls_dataframe = module_polars.getattr("DataFrame")?;

    if df.is_instance(&cls_dataframe)? {
        return Ok(df.clone());
    }

    cls_dataframe.call1((df,))
}

fn create_split_output_object(py: Python<'_>, output: &SpecSplitOutput) -> PyResult<Py<PyAny>> {
    let mut l_artifact_obj = Vec::with_capacity(output.artifacts.len());
    for artifact in &output.artifacts {
        l_artifact_obj.push(create_artifact_object(py, artifact)?);
    }

    let dict_output = PyDict::new(py);
    dict_output.set_item("artifacts", PyList::new(py, l_artifact_obj)?)?;
    dict_output.set_item("report", create_report_object(py, &output.report)?)?;
    Ok(dict_output.into_any().unbind())
}

fn create_artifact_object<'py>(
    py: Python<'py>,
    artifact: &SpecArtifact,
) -> PyResult<Bound<'py, PyDict>> {
    let dict_artifact = PyDict::new(py);
    dict_artifact.set_item("name", &artifact.name)?;
    dict_artifact.set_item("data", PyBytes::new(py, &artifact.bytes))?;
    dict_artifact.set_item("row_count", artifact.row_count)?;
    dict_artifact.set_item("group_label", &artifact.group_label)?;
    dict_artifact.set_item("size", &artifact.size_text)?;
    Ok(dict_artifact)
}

fn create_report_object<'py>(
    py: Python<'py>,
    report: &SpecSplitReport,
) -> PyResult<Bound<'py, PyDict>> {
    let mut l_rename_obj = Vec::with_capacity(report.renames.len());
    for rename in &report.renames {
        l_rename_obj.push(PyTuple::new(
            py,
            [
                &rename.group_key,
                &rename.sheet_name_sanitized,
                &rename.sheet_name_final,
            ],
        )?);
    }

    let dict_report = PyDict::new(py);
    dict_report.set_item("split_key", &report.split_key)?;
    dict_report.set_item("mode", report.mode.label())?;
    dict_report.set_item("n_files", report.n_files)?;
    dict_report.set_item("n_groups", report.n_groups)?;
    dict_report.set_item("n_rows_data", report.n_rows_data)?;
    dict_report.set_item("n_rows_dropped", report.n_rows_dropped)?;
    dict_report.set_item("renames", PyList::new(py, l_rename_obj)?)?;
    dict_report.set_item("warnings", report.warnings.clone())?;
    Ok(dict_report)
}

fn create_preview_object(py: Python<'_>, preview: &SpecPreview) -> PyResult<Py<PyAny>> {
    let dict_preview = PyDict::new(py);
    dict_preview.set_item("header", preview.header.clone())?;
    dict_preview.set_item("rows", preview.rows.clone())?;
    dict_preview.set_item("n_rows_total", preview.n_rows_total)?;
    dict_preview.set_item("n_cols_total", preview.n_cols_total)?;
    dict_preview.set_item("n_rows_hidden", preview.n_rows_hidden)?;
    dict_preview.set_item("if_cols_truncated", preview.if_cols_truncated)?;
    Ok(dict_preview.into_any().unbind())
}

fn parse_spec_xlsx_write_options(
    obj: Option<&Bound<'_, PyAny>>,
) -> PyResult<Option<SpecXlsxWriteOptions>> {
    let Some(obj) = obj else {
        return Ok(None);
    };
    if obj.is_none() {
        return Ok(None);
    }

    let mut cfg_write_options = derive_default_xlsx_write_options();

    if let Some(value_policy_obj) = extract_optional_attr_bound(obj, "value_policy")? {
        if let Some(v) = extract_optional_attr::<String>(&value_policy_obj, "nan_str")? {
            cfg_write_options.value_policy.nan_str = v;
        }
        if let Some(v) = extract_optional_attr::<String>(&value_policy_obj, "posinf_str")? {
            cfg_write_options.value_policy.posinf_str = v;
        }
        if let Some(v) = extract_optional_attr::<String>(&value_policy_obj, "neginf_str")? {
            cfg_write_options.value_policy.neginf_str = v;
        }
    }

    if let Some(v) = extract_optional_attr::<bool>(obj, "if_bold_header")? {
        cfg_write_options.if_bold_header = v;
    }

    Ok(Some(cfg_write_options))
}

fn extract_optional_attr<T>(obj: &Bound<'_, PyAny>, attr: &str) -> PyResult<Option<T>>
where
    for<'a> T: FromPyObject<'a>,
{
    let Some(val) = extract_optional_attr_bound(obj, attr)? else {
        return Ok(None);
    };
    Ok(Some(val.extract::<T>()?))
}

fn extract_optional_attr_bound<'py>(
    obj: &Bound<'py, PyAny>,
    attr: &str,
) -> PyResult<Option<Bound<'py, PyAny>>> {
    if !obj.hasattr(attr)? {
        return Ok(None);
    }
    let val = obj.getattr(attr)?;
    if val.is_none() {
        return Ok(None);
    }
    Ok(Some(val))
}

#[pymodule]
fn _xlsxsplit_rs(_py: Python<'_>, module: &Bound<'_, PyModule>) -> PyResult<()> {
    module.add_class::<PySplitSession>()?;
    module.add_function(wrap_pyfunction!(list_sheets, module)?)?;
    module.add_function(wrap_pyfunction!(split_workbook, module)?)?;
    module.add_function(wrap_pyfunction!(split_dataframe_ipc, module)?)?;
    module.add_function(wrap_pyfunction!(split_dataframe, module)?)?;
    module.add("__bridge_abi__", N_BRIDGE_ABI_VERSION)?;
    module.add("__bridge_contract__", C_BRIDGE_CONTRACT_VERSION)?;
    module.add("__bridge_transport__", C_BRIDGE_TRANSPORT)?;
    Ok(())
}
