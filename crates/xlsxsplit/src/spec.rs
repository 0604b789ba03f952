//! Shared split specification models, options, report and errors.

use std::fmt;
use std::str::FromStr;

use thiserror::Error;

use crate::conf::{C_GROUP_LABEL_MERGED, N_PREVIEW_COLS_DEFAULT, N_PREVIEW_ROWS_DEFAULT};

////////////////////////////////////////////////////////////////////////////////
// #region CellValueSpecification

/// Normalized cell value flowing from decode through grouping to encode.
#[derive(Debug, Clone, PartialEq)]
pub enum EnumCellValue {
    /// Missing/blank value.
    Empty,
    /// Text value.
    Text(String),
    /// Numeric value (dates arrive as serial numbers).
    Number(f64),
}

impl EnumCellValue {
    /// Textual form used for header lookup, group keys and sanitization input.
    pub fn to_text_form(&self) -> String {
        match self {
            Self::Empty => String::new(),
            Self::Text(s) => s.clone(),
            Self::Number(n) => derive_number_text_form(*n),
        }
    }

    /// `true` for values the grouping step drops: blank cells and `""`.
    ///
    /// Whitespace-only text is not blank here.
    pub fn is_blank(&self) -> bool {
        match self {
            Self::Empty => true,
            Self::Text(s) => s.is_empty(),
            Self::Number(_) => false,
        }
    }
}

impl From<&str> for EnumCellValue {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

impl From<String> for EnumCellValue {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

impl From<f64> for EnumCellValue {
    fn from(value: f64) -> Self {
        Self::Number(value)
    }
}

impl From<i64> for EnumCellValue {
    fn from(value: i64) -> Self {
        Self::Number(value as f64)
    }
}

fn derive_number_text_form(n: f64) -> String {
    if n.is_nan() {
        return "NaN".to_string();
    }
    if n.is_infinite() {
        return if n.is_sign_positive() {
            "Infinity".to_string()
        } else {
            "-Infinity".to_string()
        };
    }
    if n == 0.0 {
        return "0".to_string();
    }

    // Exponent form outside [1e-6, 1e21), signed exponent: `1e+21`, `1.5e-7`.
    let n_abs = n.abs();
    if !(1e-6..1e21).contains(&n_abs) {
        let c_exp = format!("{n:e}");
        return match c_exp.split_once('e') {
            Some((c_mantissa, c_power)) if !c_power.starts_with('-') => {
                format!("{c_mantissa}e+{c_power}")
            }
            _ => c_exp,
        };
    }
    n.to_string()
}

/// One row of cells; rows may differ in length.
pub type TypeRow = Vec<EnumCellValue>;

// #endregion
////////////////////////////////////////////////////////////////////////////////
// #region DatasetSpecification

/// Ordered rows; row 0 is the header, rows `1..` are data.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct SpecTabularDataset {
    /// All rows including the header.
    pub rows: Vec<TypeRow>,
}

impl SpecTabularDataset {
    /// Wrap raw rows.
    pub fn new(rows: Vec<TypeRow>) -> Self {
        Self { rows }
    }

    /// Build from a header and data rows.
    pub fn from_parts(header: TypeRow, data_rows: Vec<TypeRow>) -> Self {
        let mut rows = Vec::with_capacity(data_rows.len() + 1);
        rows.push(header);
        rows.extend(data_rows);
        Self { rows }
    }

    /// `true` when there is not even a header row.
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Header row, if present.
    pub fn header(&self) -> Option<&TypeRow> {
        self.rows.first()
    }

    /// Data rows (everything after the header).
    pub fn data_rows(&self) -> &[TypeRow] {
        self.rows.get(1..).unwrap_or(&[])
    }

    /// Header width.
    pub fn width(&self) -> usize {
        self.header().map_or(0, Vec::len)
    }
}

/// One decoded sheet.
#[derive(Debug, Clone, PartialEq)]
pub struct SpecSourceSheet {
    /// Sheet name as stored in the source file.
    pub sheet_name: String,
    /// Sheet content.
    pub dataset: SpecTabularDataset,
}

/// Decoded source workbook with sheets in file order.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct SpecSourceWorkbook {
    /// Sheets in file order.
    pub sheets: Vec<SpecSourceSheet>,
}

impl SpecSourceWorkbook {
    /// Sheet names in file order.
    pub fn sheet_names(&self) -> Vec<String> {
        self.sheets.iter().map(|s| s.sheet_name.clone()).collect()
    }

    /// Look up a sheet by exact name.
    pub fn sheet(&self, sheet_name: &str) -> Option<&SpecSourceSheet> {
        self.sheets.iter().find(|s| s.sheet_name == sheet_name)
    }
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
// #region GroupSpecification

/// Rows sharing one group key.
#[derive(Debug, Clone, PartialEq)]
pub struct SpecRowGroup {
    /// Trimmed text form of the split cell.
    pub key: String,
    /// Full rows in input order.
    pub rows: Vec<TypeRow>,
}

/// Grouping result; groups are in first-seen key order.
#[derive(Debug, Clone, PartialEq)]
pub struct SpecGroupedRows {
    /// Split key as matched against the header.
    pub split_key: String,
    /// Zero-based index of the split column.
    pub idx_col_split: usize,
    /// Groups in first-seen order.
    pub groups: Vec<SpecRowGroup>,
    /// Number of data rows inspected.
    pub n_rows_data: usize,
    /// Number of data rows dropped for a blank split value.
    pub n_rows_dropped: usize,
}

impl SpecGroupedRows {
    /// Group keys in first-seen order.
    pub fn keys(&self) -> Vec<&str> {
        self.groups.iter().map(|g| g.key.as_str()).collect()
    }

    /// Rows of one group.
    pub fn get(&self, key: &str) -> Option<&[TypeRow]> {
        self.groups
            .iter()
            .find(|g| g.key == key)
            .map(|g| g.rows.as_slice())
    }

    /// Number of groups.
    pub fn len(&self) -> usize {
        self.groups.len()
    }

    /// `true` when there are no groups.
    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
// #region DocumentSpecification

/// One named sheet handed to the encoder.
#[derive(Debug, Clone, PartialEq)]
pub struct SpecSheetDocument {
    /// Final sheet name (already sanitized and unique).
    pub sheet_name: String,
    /// Header followed by data rows.
    pub rows: Vec<TypeRow>,
}

/// Workbook handed to the encoder.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct SpecWorkbookDocument {
    /// Sheets in output order.
    pub sheets: Vec<SpecSheetDocument>,
}

/// Output mode for one split run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum EnumSplitMode {
    /// One workbook per group.
    #[default]
    PerGroupFile,
    /// One workbook with one sheet per group.
    SingleFileMultiSheet,
}

impl EnumSplitMode {
    /// Human-readable mode label.
    pub fn label(&self) -> &'static str {
        match self {
            Self::PerGroupFile => "per-file",
            Self::SingleFileMultiSheet => "multi-sheet",
        }
    }
}

impl fmt::Display for EnumSplitMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for EnumSplitMode {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().replace('_', "-").as_str() {
            "per-file" => Ok(Self::PerGroupFile),
            "multi-sheet" => Ok(Self::SingleFileMultiSheet),
            _ => Err(format!(
                "Invalid split mode: {value:?}. Expected one of: per-file, multi-sheet."
            )),
        }
    }
}

/// One generated downloadable document plus its display metadata.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpecArtifact {
    /// File name offered for download.
    pub name: String,
    /// Encoded workbook bytes.
    pub bytes: Vec<u8>,
    /// Data rows represented by this artifact.
    pub row_count: usize,
    /// Group key, or the merged label for the multi-sheet workbook.
    pub group_label: String,
    /// Display size such as `1.5 KB`.
    pub size_text: String,
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
// #region Options

/// Text written in place of numbers the format cannot hold.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpecXlsxValuePolicy {
    /// Replacement text for NaN.
    pub nan_str: String,
    /// Replacement text for positive infinity.
    pub posinf_str: String,
    /// Replacement text for negative infinity.
    pub neginf_str: String,
}

impl Default for SpecXlsxValuePolicy {
    fn default() -> Self {
        Self {
            nan_str: "NaN".to_string(),
            posinf_str: "Inf".to_string(),
            neginf_str: "-Inf".to_string(),
        }
    }
}

/// Encoder options.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpecXlsxWriteOptions {
    /// Non-finite number handling.
    pub value_policy: SpecXlsxValuePolicy,
    /// Write the first row of every sheet in bold.
    pub if_bold_header: bool,
}

impl Default for SpecXlsxWriteOptions {
    fn default() -> Self {
        Self {
            value_policy: SpecXlsxValuePolicy::default(),
            if_bold_header: false,
        }
    }
}

/// Options for one assemble call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpecSplitOptions {
    /// Group label of the single multi-sheet artifact.
    pub group_label_merged: String,
}

impl Default for SpecSplitOptions {
    fn default() -> Self {
        Self {
            group_label_merged: C_GROUP_LABEL_MERGED.to_string(),
        }
    }
}

/// Preview window size.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SpecPreviewOptions {
    /// Max data rows shown.
    pub rows_max: usize,
    /// Max columns shown.
    pub cols_max: usize,
}

impl Default for SpecPreviewOptions {
    fn default() -> Self {
        Self {
            rows_max: N_PREVIEW_ROWS_DEFAULT,
            cols_max: N_PREVIEW_COLS_DEFAULT,
        }
    }
}

/// Truncated view of the loaded sheet.
#[derive(Debug, Clone, PartialEq)]
pub struct SpecPreview {
    /// Header cells (text form), truncated to `cols_max`.
    pub header: Vec<String>,
    /// Data rows (text form), truncated to `rows_max` x `cols_max`.
    pub rows: Vec<Vec<String>>,
    /// Total rows including the header.
    pub n_rows_total: usize,
    /// Header width.
    pub n_cols_total: usize,
    /// Data rows not shown.
    pub n_rows_hidden: usize,
    /// Some row has more cells than shown.
    pub if_cols_truncated: bool,
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
// #region ReportSpecification

/// Sheet renamed to keep workbook sheet names unique.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpecSheetRename {
    /// Group key the sheet holds.
    pub group_key: String,
    /// Name after sanitization.
    pub sheet_name_sanitized: String,
    /// Name actually written.
    pub sheet_name_final: String,
}

/// Per-split-call report.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SpecSplitReport {
    /// Split key used.
    pub split_key: String,
    /// Output mode.
    pub mode: EnumSplitMode,
    /// Number of artifacts produced.
    pub n_files: usize,
    /// Number of groups.
    pub n_groups: usize,
    /// Data rows inspected.
    pub n_rows_data: usize,
    /// Data rows dropped for a blank split value.
    pub n_rows_dropped: usize,
    /// Collision renames in multi-sheet mode.
    pub renames: Vec<SpecSheetRename>,
    /// Non-fatal warnings.
    pub warnings: Vec<String>,
}

impl SpecSplitReport {
    /// Add a warning message.
    pub fn warn(&mut self, msg: impl AsRef<str>) {
        self.warnings.push(msg.as_ref().to_string());
    }

    /// Human-readable one-line summary.
    pub fn format(&self, prefix: &str) -> String {
        format!(
            "{prefix} key={:?} mode={} files={} groups={} rows={} dropped={} renames={} warnings={}",
            self.split_key,
            self.mode,
            self.n_files,
            self.n_groups,
            self.n_rows_data,
            self.n_rows_dropped,
            self.renames.len(),
            self.warnings.len()
        )
    }
}

impl fmt::Display for SpecSplitReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.format("[SPLIT]"))
    }
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
// #region Errors

/// Errors terminal for one load/group/assemble call.
#[derive(Debug, Error)]
pub enum SplitError {
    /// Split key is blank after trimming.
    #[error("Split key must not be empty.")]
    EmptySplitKey,

    /// Dataset has no header row.
    #[error("Dataset is empty (no header row).")]
    EmptyDataset,

    /// Requested column header is absent from the header row.
    #[error("Split key {split_key:?} does not exist in the header row.")]
    SplitKeyNotFound { split_key: String },

    /// Header present but no data rows.
    #[error("{} has no data rows besides the header.", derive_sheet_label(.sheet_name))]
    NoDataRows { sheet_name: Option<String> },

    /// Every data row had a blank value in the split column.
    #[error("Split key {split_key:?} column has no valid values.")]
    NoValidGroups { split_key: String },

    /// Sheet exceeds Excel limits.
    #[error("Sheet {sheet_name:?} exceeds Excel limits: rows={rows} cols={cols}.")]
    SheetTooLarge {
        sheet_name: String,
        rows: usize,
        cols: usize,
    },

    /// Input bytes could not be decoded.
    #[error("Failed to decode workbook: {0}")]
    Decode(String),

    /// Workbook could not be encoded.
    #[error("Failed to encode workbook: {0}")]
    Encode(String),

    /// File name does not carry a supported spreadsheet extension.
    #[error("Unsupported file type: {0:?} (expected .xlsx, .xls, .xlsm, .xlsb or .ods).")]
    UnsupportedFileType(String),

    /// Workbook has no sheets.
    #[error("Workbook contains no sheets.")]
    NoSheets,

    /// Requested sheet does not exist.
    #[error("Sheet not found: {0:?}")]
    SheetNotFound(String),

    /// Selected sheet has no rows at all.
    #[error("Sheet {0:?} contains no data.")]
    EmptySheet(String),

    /// Workbook has several sheets and none was selected.
    #[error("Select a sheet first.")]
    NoSheetSelected,
}

fn derive_sheet_label(sheet_name: &Option<String>) -> String {
    match sheet_name {
        Some(name) => format!("Sheet {name:?}"),
        None => "Dataset".to_string(),
    }
}

impl SplitError {
    /// `true` for errors caused by user input rather than codec failure.
    pub fn is_input_error(&self) -> bool {
        !matches!(self, Self::Decode(_) | Self::Encode(_))
    }
}

/// Result alias for split operations.
pub type SplitResult<T> = Result<T, SplitError>;

// #endregion
////////////////////////////////////////////////////////////////////////////////
