//! Split constants and default option factories.

use crate::spec::{SpecPreviewOptions, SpecSplitOptions, SpecXlsxWriteOptions};

/// Excel worksheet maximum row count.
pub const N_NROWS_EXCEL_MAX: usize = 1_048_576;
/// Excel worksheet maximum column count.
pub const N_NCOLS_EXCEL_MAX: usize = 16_384;
/// Excel sheet name maximum length.
pub const N_LEN_EXCEL_SHEET_NAME_MAX: usize = 31;
/// Characters not allowed in sheet names.
pub const TUP_EXCEL_ILLEGAL: [char; 7] = ['[', ']', '*', '?', '/', '\\', ':'];
/// Sheet names Excel keeps for itself.
pub const TUP_EXCEL_RESERVED_SHEET_NAMES: [&str; 1] = ["history"];
/// Fallback sheet name for blank input.
pub const C_SHEET_NAME_FALLBACK: &str = "Sheet";
/// Sheet name used inside per-group workbooks.
pub const C_SHEET_NAME_PER_GROUP_FILE: &str = "Sheet1";

/// Generated file name maximum length (before extension).
pub const N_LEN_FILE_NAME_MAX: usize = 100;
/// Characters not allowed in generated file names.
pub const C_PATTERN_FILE_NAME_ILLEGAL: &str = r#"[<>:"/\\|?*]"#;
/// Whitespace runs collapsed in generated file names.
pub const C_PATTERN_FILE_NAME_WHITESPACE: &str = r"\s+";
/// Extension of every generated workbook.
pub const C_EXT_XLSX: &str = ".xlsx";

/// Input file extensions accepted by [`crate::session::Session::load`].
pub const TUP_EXT_INPUT_SUPPORTED: [&str; 5] = ["xlsx", "xls", "xlsm", "xlsb", "ods"];

/// Display units used by [`crate::util::format_file_size`].
pub const TUP_SIZE_UNITS: [&str; 4] = ["Bytes", "KB", "MB", "GB"];

/// Default number of data rows shown in a preview.
pub const N_PREVIEW_ROWS_DEFAULT: usize = 10;
/// Default number of columns shown in a preview.
pub const N_PREVIEW_COLS_DEFAULT: usize = 10;

/// Group label carried by the single multi-sheet artifact.
pub const C_GROUP_LABEL_MERGED: &str = "merged";

/// Build default split options.
pub fn derive_default_split_options() -> SpecSplitOptions {
    SpecSplitOptions::default()
}

/// Build default encoder options.
pub fn derive_default_xlsx_write_options() -> SpecXlsxWriteOptions {
    SpecXlsxWriteOptions::default()
}

/// Build default preview options.
pub fn derive_default_preview_options() -> SpecPreviewOptions {
    SpecPreviewOptions::default()
}
