//! `xlsxsplit` v1:
//! Split a spreadsheet into groups keyed by one column and emit XLSX artifacts.
//!
//! Module layout:
//! - `conf`    : constants and default presets
//! - `spec`    : specs/models/options/errors
//! - `util`    : pure helper functions (sanitizers, size text)
//! - `group`   : grouping engine
//! - `codec`   : spreadsheet decode/encode boundary
//! - `writer`  : workbook assembler
//! - `session` : loaded workbook, sheet selection and preview
pub mod codec;
pub mod conf;
pub mod group;
pub mod session;
pub mod spec;
pub mod util;
pub mod writer;

pub use codec::{
    TabularCodec, XlsxCodec, derive_dataset_from_dataframe, derive_dataset_from_ipc_bytes,
};
pub use conf::{
    C_GROUP_LABEL_MERGED, N_LEN_EXCEL_SHEET_NAME_MAX, N_LEN_FILE_NAME_MAX, N_NCOLS_EXCEL_MAX,
    N_NROWS_EXCEL_MAX, TUP_EXCEL_ILLEGAL,
};
pub use group::{find_split_column, group_rows, group_rows_in_sheet};
pub use session::{Session, derive_preview, validate_input_file_name};
pub use spec::{
    EnumCellValue, EnumSplitMode, SpecArtifact, SpecGroupedRows, SpecPreview, SpecPreviewOptions,
    SpecRowGroup, SpecSheetDocument, SpecSheetRename, SpecSourceSheet, SpecSourceWorkbook,
    SpecSplitOptions, SpecSplitReport, SpecTabularDataset, SpecWorkbookDocument,
    SpecXlsxValuePolicy, SpecXlsxWriteOptions, SplitError, SplitResult, TypeRow,
};
pub use util::{
    derive_unique_file_name, derive_unique_sheet_name, format_file_size, sanitize_file_name,
    sanitize_sheet_name,
};
pub use writer::{SpecSplitOutput, WorkbookAssembler, split_dataset, split_dataset_in_sheet};
