//! Workbook assembler: turn grouped rows into encoded artifacts.

use std::collections::BTreeSet;

use log::{debug, info, warn};

use crate::codec::TabularCodec;
use crate::conf::{C_EXT_XLSX, C_SHEET_NAME_PER_GROUP_FILE};
use crate::group::group_rows_in_sheet;
use crate::spec::{
    EnumCellValue, EnumSplitMode, SpecArtifact, SpecGroupedRows, SpecSheetDocument, SpecSheetRename,
    SpecSplitOptions, SpecSplitReport, SpecTabularDataset, SpecWorkbookDocument, SplitError,
    SplitResult, TypeRow,
};
use crate::util::{
    derive_unique_sheet_name, format_file_size, sanitize_file_name, sanitize_sheet_name,
};

/// Artifacts of one split call plus its report.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpecSplitOutput {
    /// Artifacts in group order (one in multi-sheet mode).
    pub artifacts: Vec<SpecArtifact>,
    /// Counters, renames and warnings.
    pub report: SpecSplitReport,
}

/// Assembles grouped rows into workbooks through a [`TabularCodec`].
///
/// Holds no per-call state; every [`Self::assemble`] call starts fresh.
pub struct WorkbookAssembler<'a, C: TabularCodec> {
    codec: &'a C,
    options: SpecSplitOptions,
}

impl<'a, C: TabularCodec> WorkbookAssembler<'a, C> {
    /// Create assembler bound to a codec and options.
    pub fn new(codec: &'a C, options: SpecSplitOptions) -> Self {
        Self { codec, options }
    }

    /// Build artifacts for `grouped` in the requested mode.
    ///
    /// `base_file_name` names the multi-sheet artifact (`<split_key>-<base_file_name>`).
    pub fn assemble(
        &self,
        header: &[EnumCellValue],
        grouped: &SpecGroupedRows,
        mode: EnumSplitMode,
        base_file_name: &str,
    ) -> SplitResult<SpecSplitOutput> {
        if grouped.is_empty() {
            return Err(SplitError::NoValidGroups {
                split_key: grouped.split_key.clone(),
            });
        }

        let mut report = SpecSplitReport {
            split_key: grouped.split_key.clone(),
            mode,
            n_groups: grouped.len(),
            n_rows_data: grouped.n_rows_data,
            n_rows_dropped: grouped.n_rows_dropped,
            ..Default::default()
        };
        if grouped.n_rows_dropped > 0 {
            report.warn(format!(
                "{} rows skipped: blank value in column {:?}.",
                grouped.n_rows_dropped, grouped.split_key
            ));
        }

        let artifacts = match mode {
            EnumSplitMode::PerGroupFile => self.assemble_per_group_files(header, grouped)?,
            EnumSplitMode::SingleFileMultiSheet => {
                vec![self.assemble_multi_sheet_file(header, grouped, base_file_name, &mut report)?]
            }
        };
        report.n_files = artifacts.len();

        info!("{report}");
        Ok(SpecSplitOutput { artifacts, report })
    }

    fn assemble_per_group_files(
        &self,
        header: &[EnumCellValue],
        grouped: &SpecGroupedRows,
    ) -> SplitResult<Vec<SpecArtifact>> {
        let mut l_artifacts = Vec::with_capacity(grouped.len());
        for group in &grouped.groups {
            let document = SpecWorkbookDocument {
                sheets: vec![SpecSheetDocument {
                    sheet_name: C_SHEET_NAME_PER_GROUP_FILE.to_string(),
                    rows: derive_sheet_rows(header, &group.rows),
                }],
            };
            let v_bytes = self.encode_group(&document, &group.key)?;

            let c_name = format!("{}{C_EXT_XLSX}", sanitize_file_name(&group.key));
            debug!("encoded {c_name:?}: {} rows, {} bytes", group.rows.len(), v_bytes.len());
            l_artifacts.push(SpecArtifact {
                name: c_name,
                size_text: format_file_size(v_bytes.len()),
                bytes: v_bytes,
                row_count: group.rows.len(),
                group_label: group.key.clone(),
            });
        }
        Ok(l_artifacts)
    }

    fn assemble_multi_sheet_file(
        &self,
        header: &[EnumCellValue],
        grouped: &SpecGroupedRows,
        base_file_name: &str,
        report: &mut SpecSplitReport,
    ) -> SplitResult<SpecArtifact> {
        let mut set_sheet_names_existing = BTreeSet::new();
        let mut l_sheets = Vec::with_capacity(grouped.len());

        for group in &grouped.groups {
            let c_sheet_name_sanitized = sanitize_sheet_name(&group.key, '_');
            let c_sheet_name_final =
                derive_unique_sheet_name(&c_sheet_name_sanitized, &mut set_sheet_names_existing);
            if c_sheet_name_final != c_sheet_name_sanitized {
                warn!(
                    "sheet name {c_sheet_name_sanitized:?} already used; group {:?} written to {c_sheet_name_final:?}",
                    group.key
                );
                report.renames.push(SpecSheetRename {
                    group_key: group.key.clone(),
                    sheet_name_sanitized: c_sheet_name_sanitized,
                    sheet_name_final: c_sheet_name_final.clone(),
                });
            }

            l_sheets.push(SpecSheetDocument {
                sheet_name: c_sheet_name_final,
                rows: derive_sheet_rows(header, &group.rows),
            });
        }

        let document = SpecWorkbookDocument { sheets: l_sheets };
        let v_bytes = self.encode_group(&document, &grouped.split_key)?;

        let c_name = format!(
            "{}-{}",
            grouped.split_key,
            derive_xlsx_file_name(base_file_name)
        );
        debug!(
            "encoded {c_name:?}: {} sheets, {} bytes",
            document.sheets.len(),
            v_bytes.len()
        );
        Ok(SpecArtifact {
            name: c_name,
            size_text: format_file_size(v_bytes.len()),
            bytes: v_bytes,
            row_count: grouped.n_rows_data,
            group_label: self.options.group_label_merged.clone(),
        })
    }

    fn encode_group(&self, document: &SpecWorkbookDocument, label: &str) -> SplitResult<Vec<u8>> {
        self.codec.encode(document).map_err(|err| match err {
            SplitError::Encode(msg) => SplitError::Encode(format!("{label:?}: {msg}")),
            other => other,
        })
    }
}

/// Group `dataset` by `split_key` and assemble the artifacts in one call.
pub fn split_dataset<C: TabularCodec>(
    dataset: &SpecTabularDataset,
    split_key: &str,
    mode: EnumSplitMode,
    base_file_name: &str,
    codec: &C,
    options: SpecSplitOptions,
) -> SplitResult<SpecSplitOutput> {
    split_dataset_in_sheet(dataset, None, split_key, mode, base_file_name, codec, options)
}

/// Same as [`split_dataset`]; `sheet_name` only enriches error messages.
pub fn split_dataset_in_sheet<C: TabularCodec>(
    dataset: &SpecTabularDataset,
    sheet_name: Option<&str>,
    split_key: &str,
    mode: EnumSplitMode,
    base_file_name: &str,
    codec: &C,
    options: SpecSplitOptions,
) -> SplitResult<SpecSplitOutput> {
    let grouped = group_rows_in_sheet(dataset, split_key, sheet_name)?;
    let l_header = dataset.header().ok_or(SplitError::EmptyDataset)?;
    WorkbookAssembler::new(codec, options).assemble(l_header, &grouped, mode, base_file_name)
}

/// Keep `file_name` when it already ends in `.xlsx`, else swap its extension.
fn derive_xlsx_file_name(file_name: &str) -> String {
    if file_name.to_ascii_lowercase().ends_with(C_EXT_XLSX) {
        return file_name.to_string();
    }
    let c_stem = match file_name.rfind('.') {
        Some(n_pos) if n_pos > 0 => &file_name[..n_pos],
        _ => file_name,
    };
    format!("{c_stem}{C_EXT_XLSX}")
}

fn derive_sheet_rows(header: &[EnumCellValue], rows: &[TypeRow]) -> Vec<TypeRow> {
    let mut l_rows = Vec::with_capacity(rows.len() + 1);
    l_rows.push(header.to_vec());
    l_rows.extend(rows.iter().cloned());
    l_rows
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::XlsxCodec;

    fn t(s: &str) -> EnumCellValue {
        EnumCellValue::from(s)
    }

    fn n(x: f64) -> EnumCellValue {
        EnumCellValue::Number(x)
    }

    fn region_dataset() -> SpecTabularDataset {
        SpecTabularDataset::from_parts(
            vec![t("Region"), t("Amount")],
            vec![
                vec![t("North"), n(10.0)],
                vec![t("South"), n(20.0)],
                vec![t("North"), n(5.0)],
                vec![t(""), n(99.0)],
            ],
        )
    }

    fn split(dataset: &SpecTabularDataset, mode: EnumSplitMode) -> SpecSplitOutput {
        split_dataset(
            dataset,
            "Region",
            mode,
            "sales.xlsx",
            &XlsxCodec::default(),
            SpecSplitOptions::default(),
        )
        .unwrap()
    }

    #[test]
    fn test_per_group_file_region_example() {
        let codec = XlsxCodec::default();
        let output = split(&region_dataset(), EnumSplitMode::PerGroupFile);

        let l_names: Vec<&str> = output.artifacts.iter().map(|a| a.name.as_str()).collect();
        assert_eq!(l_names, vec!["North.xlsx", "South.xlsx"]);
        let l_counts: Vec<usize> = output.artifacts.iter().map(|a| a.row_count).collect();
        assert_eq!(l_counts, vec![2, 1]);
        assert_eq!(output.artifacts[0].group_label, "North");

        let workbook = codec.decode(&output.artifacts[0].bytes).unwrap();
        assert_eq!(workbook.sheet_names(), vec!["Sheet1"]);
        assert_eq!(
            workbook.sheets[0].dataset.rows,
            vec![
                vec![t("Region"), t("Amount")],
                vec![t("North"), n(10.0)],
                vec![t("North"), n(5.0)],
            ]
        );

        assert_eq!(output.report.n_files, 2);
        assert_eq!(output.report.n_rows_dropped, 1);
        assert_eq!(output.report.warnings.len(), 1);
    }

    #[test]
    fn test_multi_sheet_region_example() {
        let codec = XlsxCodec::default();
        let output = split(&region_dataset(), EnumSplitMode::SingleFileMultiSheet);

        assert_eq!(output.artifacts.len(), 1);
        let artifact = &output.artifacts[0];
        assert_eq!(artifact.name, "Region-sales.xlsx");
        assert_eq!(artifact.group_label, "merged");
        assert_eq!(artifact.row_count, 4);
        assert_eq!(artifact.size_text, format_file_size(artifact.bytes.len()));

        let workbook = codec.decode(&artifact.bytes).unwrap();
        assert_eq!(workbook.sheet_names(), vec!["North", "South"]);
        assert_eq!(workbook.sheet("South").unwrap().dataset.rows.len(), 2);
    }

    #[test]
    fn test_multi_sheet_disambiguates_colliding_sheet_names() {
        let c_prefix = "x".repeat(31);
        let dataset = SpecTabularDataset::from_parts(
            vec![t("Region")],
            vec![
                vec![t(&format!("{c_prefix}-a"))],
                vec![t(&format!("{c_prefix}-b"))],
                vec![t("a/b")],
                vec![t("a?b")],
                vec![t("A_B")],
            ],
        );
        let output = split(&dataset, EnumSplitMode::SingleFileMultiSheet);

        let workbook = XlsxCodec::default()
            .decode(&output.artifacts[0].bytes)
            .unwrap();
        let l_names = workbook.sheet_names();
        assert_eq!(
            l_names,
            vec![
                c_prefix.clone(),
                format!("{}__2", "x".repeat(28)),
                "a_b".to_string(),
                "a_b__2".to_string(),
                "A_B__3".to_string(),
            ]
        );
        assert_eq!(output.report.renames.len(), 3);
        assert_eq!(output.report.renames[0].sheet_name_sanitized, c_prefix);
    }

    #[test]
    fn test_split_is_idempotent() {
        let dataset = region_dataset();
        for mode in [EnumSplitMode::PerGroupFile, EnumSplitMode::SingleFileMultiSheet] {
            assert_eq!(split(&dataset, mode), split(&dataset, mode));
        }
    }

    #[test]
    fn test_split_propagates_grouping_errors() {
        let err = split_dataset(
            &region_dataset(),
            "Country",
            EnumSplitMode::PerGroupFile,
            "sales.xlsx",
            &XlsxCodec::default(),
            SpecSplitOptions::default(),
        )
        .unwrap_err();
        assert!(matches!(err, SplitError::SplitKeyNotFound { .. }));
    }

    #[test]
    fn test_per_group_file_names_are_sanitized() {
        let dataset = SpecTabularDataset::from_parts(
            vec![t("City")],
            vec![vec![t("New  York")], vec![t("a:b")]],
        );
        let output = split_dataset(
            &dataset,
            "City",
            EnumSplitMode::PerGroupFile,
            "c.xlsx",
            &XlsxCodec::default(),
            SpecSplitOptions::default(),
        )
        .unwrap();
        let l_names: Vec<&str> = output.artifacts.iter().map(|a| a.name.as_str()).collect();
        assert_eq!(l_names, vec!["New_York.xlsx", "a_b.xlsx"]);
    }

    #[test]
    fn test_multi_sheet_artifact_always_has_xlsx_extension() {
        assert_eq!(derive_xlsx_file_name("sales.XLSX"), "sales.XLSX");
        assert_eq!(derive_xlsx_file_name("old.xls"), "old.xlsx");
        assert_eq!(derive_xlsx_file_name("q1.report.ods"), "q1.report.xlsx");
        assert_eq!(derive_xlsx_file_name("noext"), "noext.xlsx");
    }

    struct FailingCodec;

    impl TabularCodec for FailingCodec {
        fn decode(&self, _bytes: &[u8]) -> SplitResult<crate::spec::SpecSourceWorkbook> {
            Err(SplitError::Decode("unused".to_string()))
        }

        fn encode(&self, _document: &SpecWorkbookDocument) -> SplitResult<Vec<u8>> {
            Err(SplitError::Encode("disk full".to_string()))
        }
    }

    #[test]
    fn test_encode_failure_is_terminal_and_names_the_group() {
        let err = split_dataset(
            &region_dataset(),
            "Region",
            EnumSplitMode::PerGroupFile,
            "sales.xlsx",
            &FailingCodec,
            SpecSplitOptions::default(),
        )
        .unwrap_err();
        assert_eq!(
            err.to_string(),
            "Failed to encode workbook: \"North\": disk full"
        );
    }
}
