//! Tabular codec: workbook bytes <-> cell grids.
//!
//! Decoding goes through `calamine`, encoding through `rust_xlsxwriter`.
//! Polars DataFrames (in memory or IPC bytes) are accepted as an alternative
//! source.

use std::io::Cursor;

use calamine::{Data, Reader, open_workbook_auto_from_rs};
use polars::prelude::{AnyValue, DataFrame, IpcReader, SerReader};
use rust_xlsxwriter::{DocProperties, ExcelDateTime, Format, Workbook, Worksheet, XlsxError};

use crate::spec::{
    EnumCellValue, SpecSourceSheet, SpecSourceWorkbook, SpecTabularDataset,
    SpecWorkbookDocument, SpecXlsxValuePolicy, SpecXlsxWriteOptions, SplitError, SplitResult,
    TypeRow,
};
use crate::util::{convert_nan_inf_to_str, validate_sheet_limits};

/// Decode/encode capability used by the session and the assembler.
pub trait TabularCodec {
    /// Parse workbook bytes into named sheets.
    fn decode(&self, bytes: &[u8]) -> SplitResult<SpecSourceWorkbook>;

    /// Serialize a document of one or more named sheets.
    fn encode(&self, document: &SpecWorkbookDocument) -> SplitResult<Vec<u8>>;
}

/// `.xlsx` encoder and multi-format decoder.
#[derive(Debug, Clone, Default)]
pub struct XlsxCodec {
    write_options: SpecXlsxWriteOptions,
}

impl XlsxCodec {
    /// Create codec with explicit encoder options.
    pub fn new(write_options: SpecXlsxWriteOptions) -> Self {
        Self { write_options }
    }

    /// Encoder options in use.
    pub fn write_options(&self) -> &SpecXlsxWriteOptions {
        &self.write_options
    }
}

impl TabularCodec for XlsxCodec {
    fn decode(&self, bytes: &[u8]) -> SplitResult<SpecSourceWorkbook> {
        let mut workbook = open_workbook_auto_from_rs(Cursor::new(bytes.to_vec()))
            .map_err(|err| SplitError::Decode(err.to_string()))?;

        let l_sheet_names = workbook.sheet_names();
        let mut l_sheets = Vec::with_capacity(l_sheet_names.len());
        for sheet_name in l_sheet_names {
            let range = workbook
                .worksheet_range(&sheet_name)
                .map_err(|err| SplitError::Decode(format!("sheet {sheet_name:?}: {err}")))?;

            let l_rows: Vec<TypeRow> = range
                .rows()
                .map(|row| {
                    let mut l_cells: TypeRow =
                        row.iter().map(derive_cell_value_from_data).collect();
                    while l_cells.last() == Some(&EnumCellValue::Empty) {
                        l_cells.pop();
                    }
                    l_cells
                })
                .collect();

            l_sheets.push(SpecSourceSheet {
                sheet_name,
                dataset: SpecTabularDataset::new(l_rows),
            });
        }

        Ok(SpecSourceWorkbook { sheets: l_sheets })
    }

    fn encode(&self, document: &SpecWorkbookDocument) -> SplitResult<Vec<u8>> {
        if document.sheets.is_empty() {
            return Err(SplitError::Encode(
                "document must hold at least one sheet".to_string(),
            ));
        }

        let mut workbook = Workbook::new();
        // Pinned so identical input gives identical bytes.
        let dt_created = ExcelDateTime::from_ymd(2000, 1, 1).map_err(derive_xlsx_error)?;
        workbook.set_properties(&DocProperties::new().set_creation_datetime(&dt_created));

        let fmt_header = if self.write_options.if_bold_header {
            Format::new().set_bold()
        } else {
            Format::new()
        };

        for sheet in &document.sheets {
            validate_sheet_limits(&sheet.sheet_name, &sheet.rows)?;

            let worksheet = workbook.add_worksheet();
            worksheet
                .set_name(&sheet.sheet_name)
                .map_err(derive_xlsx_error)?;

            for (n_idx_row, row) in sheet.rows.iter().enumerate() {
                let fmt_row = (n_idx_row == 0 && self.write_options.if_bold_header)
                    .then_some(&fmt_header);
                for (n_idx_col, value) in row.iter().enumerate() {
                    write_cell(
                        worksheet,
                        n_idx_row,
                        n_idx_col,
                        value,
                        fmt_row,
                        &self.write_options.value_policy,
                    )?;
                }
            }
        }

        workbook.save_to_buffer().map_err(derive_xlsx_error)
    }
}

fn write_cell(
    worksheet: &mut Worksheet,
    row_idx: usize,
    col_idx: usize,
    value: &EnumCellValue,
    format: Option<&Format>,
    value_policy: &SpecXlsxValuePolicy,
) -> SplitResult<()> {
    let n_row = cast_row_num(row_idx)?;
    let n_col = cast_col_num(col_idx)?;

    match value {
        EnumCellValue::Empty => {}
        EnumCellValue::Text(val) => {
            match format {
                Some(fmt) => worksheet.write_string_with_format(n_row, n_col, val, fmt),
                None => worksheet.write_string(n_row, n_col, val),
            }
            .map_err(derive_xlsx_error)?;
        }
        EnumCellValue::Number(val) if !val.is_finite() => {
            let c_text = convert_nan_inf_to_str(*val, value_policy)
                .unwrap_or_else(|_| value_policy.nan_str.clone());
            match format {
                Some(fmt) => worksheet.write_string_with_format(n_row, n_col, &c_text, fmt),
                None => worksheet.write_string(n_row, n_col, &c_text),
            }
            .map_err(derive_xlsx_error)?;
        }
        EnumCellValue::Number(val) => {
            match format {
                Some(fmt) => worksheet.write_number_with_format(n_row, n_col, *val, fmt),
                None => worksheet.write_number(n_row, n_col, *val),
            }
            .map_err(derive_xlsx_error)?;
        }
    }
    Ok(())
}

fn derive_cell_value_from_data(value: &Data) -> EnumCellValue {
    match value {
        Data::Empty => EnumCellValue::Empty,
        Data::Bool(v) => EnumCellValue::Text(v.to_string()),
        Data::Int(v) => EnumCellValue::Number(*v as f64),
        Data::Float(v) => EnumCellValue::Number(*v),
        Data::String(v) => EnumCellValue::Text(v.clone()),
        Data::Error(e) => EnumCellValue::Text(e.to_string()),
        Data::DateTime(v) => EnumCellValue::Number(v.as_f64()),
        Data::DateTimeIso(v) => EnumCellValue::Text(v.clone()),
        Data::DurationIso(v) => EnumCellValue::Text(v.clone()),
    }
}

fn cast_row_num(value: usize) -> SplitResult<u32> {
    u32::try_from(value).map_err(|_| SplitError::Encode(format!("row index overflow: {value}")))
}

fn cast_col_num(value: usize) -> SplitResult<u16> {
    u16::try_from(value)
        .map_err(|_| SplitError::Encode(format!("column index overflow: {value}")))
}

fn derive_xlsx_error(err: XlsxError) -> SplitError {
    SplitError::Encode(format!("xlsx write error: {err}"))
}

////////////////////////////////////////////////////////////////////////////////
// #region DataFrameSource

/// Build a dataset from a DataFrame; column names become the header row.
pub fn derive_dataset_from_dataframe(df: &DataFrame) -> SplitResult<SpecTabularDataset> {
    let l_header: TypeRow = df
        .get_column_names_str()
        .into_iter()
        .map(EnumCellValue::from)
        .collect();

    let l_cols = df.get_columns();
    let mut l_rows = Vec::with_capacity(df.height() + 1);
    l_rows.push(l_header);
    for n_idx_row in 0..df.height() {
        let mut l_cells = Vec::with_capacity(l_cols.len());
        for col in l_cols {
            let value = col
                .get(n_idx_row)
                .map_err(|err| SplitError::Decode(format!("Failed to access cell value: {err}")))?;
            l_cells.push(derive_cell_value_from_any_value(value));
        }
        l_rows.push(l_cells);
    }

    Ok(SpecTabularDataset::new(l_rows))
}

/// Build a dataset from IPC-serialized DataFrame bytes.
pub fn derive_dataset_from_ipc_bytes(v_ipc_df: &[u8]) -> SplitResult<SpecTabularDataset> {
    let df = IpcReader::new(Cursor::new(v_ipc_df))
        .finish()
        .map_err(|err| SplitError::Decode(format!("Failed to read IPC DataFrame bytes: {err}")))?;
    derive_dataset_from_dataframe(&df)
}

fn derive_cell_value_from_any_value(value: AnyValue<'_>) -> EnumCellValue {
    match value {
        AnyValue::Null => EnumCellValue::Empty,
        AnyValue::String(val) => EnumCellValue::Text(val.to_string()),
        AnyValue::StringOwned(val) => EnumCellValue::Text(val.to_string()),
        AnyValue::Boolean(val) => EnumCellValue::Text(val.to_string()),
        AnyValue::UInt8(val) => EnumCellValue::Number(val as f64),
        AnyValue::UInt16(val) => EnumCellValue::Number(val as f64),
        AnyValue::UInt32(val) => EnumCellValue::Number(val as f64),
        AnyValue::UInt64(val) => EnumCellValue::Number(val as f64),
        AnyValue::Int8(val) => EnumCellValue::Number(val as f64),
        AnyValue::Int16(val) => EnumCellValue::Number(val as f64),
        AnyValue::Int32(val) => EnumCellValue::Number(val as f64),
        AnyValue::Int64(val) => EnumCellValue::Number(val as f64),
        AnyValue::Float32(val) => EnumCellValue::Number(val as f64),
        AnyValue::Float64(val) => EnumCellValue::Number(val),
        _ => EnumCellValue::Text(value.to_string()),
    }
}

// #endregion
////////////////////////////////////////////////////////////////////////////////

#[cfg(test)]
mod tests {
    use super::*;
    use crate::spec::SpecSheetDocument;
    use polars::prelude::{Column, NamedFrom};

    fn t(s: &str) -> EnumCellValue {
        EnumCellValue::from(s)
    }

    fn document(l_sheet_names: &[&str]) -> SpecWorkbookDocument {
        SpecWorkbookDocument {
            sheets: l_sheet_names
                .iter()
                .map(|name| SpecSheetDocument {
                    sheet_name: name.to_string(),
                    rows: vec![
                        vec![t("Region"), t("Amount"), t("Note")],
                        vec![t(name), EnumCellValue::Number(10.0)],
                        vec![t(name), EnumCellValue::Number(f64::NAN), t("x")],
                    ],
                })
                .collect(),
        }
    }

    #[test]
    fn test_encode_then_decode_keeps_sheets_and_values() {
        let codec = XlsxCodec::default();
        let v_bytes = codec.encode(&document(&["North", "South"])).unwrap();
        let workbook = codec.decode(&v_bytes).unwrap();

        assert_eq!(workbook.sheet_names(), vec!["North", "South"]);
        let dataset = &workbook.sheet("South").unwrap().dataset;
        assert_eq!(dataset.rows[0], vec![t("Region"), t("Amount"), t("Note")]);
        // Trailing blank cells are trimmed on decode.
        assert_eq!(dataset.rows[1], vec![t("South"), EnumCellValue::Number(10.0)]);
        assert_eq!(dataset.rows[2], vec![t("South"), t("NaN"), t("x")]);
    }

    #[test]
    fn test_encode_is_deterministic() {
        let codec = XlsxCodec::new(SpecXlsxWriteOptions {
            if_bold_header: true,
            ..Default::default()
        });
        let doc = document(&["A"]);
        assert_eq!(codec.encode(&doc).unwrap(), codec.encode(&doc).unwrap());
    }

    #[test]
    fn test_encode_rejects_invalid_documents() {
        let codec = XlsxCodec::default();
        assert!(matches!(
            codec.encode(&SpecWorkbookDocument::default()),
            Err(SplitError::Encode(_))
        ));
        assert!(matches!(
            codec.encode(&document(&["dup", "dup"])),
            Err(SplitError::Encode(_))
        ));
    }

    #[test]
    fn test_decode_rejects_garbage() {
        let err = XlsxCodec::default().decode(b"not a workbook").unwrap_err();
        assert!(matches!(err, SplitError::Decode(_)));
    }

    #[test]
    fn test_dataset_from_dataframe() {
        let df = DataFrame::new(vec![
            Column::new("Region".into(), &["North", "South"]),
            Column::new("Amount".into(), &[10i64, 20]),
        ])
        .unwrap();

        let dataset = derive_dataset_from_dataframe(&df).unwrap();
        assert_eq!(dataset.rows[0], vec![t("Region"), t("Amount")]);
        assert_eq!(dataset.rows[2], vec![t("South"), EnumCellValue::Number(20.0)]);
    }
}
