//! Per-user state: loaded workbook, selected sheet and preview.

use std::path::Path;

use log::{debug, info};

use crate::codec::TabularCodec;
use crate::conf::TUP_EXT_INPUT_SUPPORTED;
use crate::spec::{
    EnumCellValue, EnumSplitMode, SpecPreview, SpecPreviewOptions, SpecSourceWorkbook,
    SpecSplitOptions, SpecTabularDataset, SplitError, SplitResult,
};
use crate::writer::{SpecSplitOutput, split_dataset_in_sheet};

/// Loaded source workbook plus the currently selected sheet.
///
/// Replacing the file means building a new session.
#[derive(Debug, Clone)]
pub struct Session {
    file_name: String,
    workbook: SpecSourceWorkbook,
    sheet_name_selected: Option<String>,
}

impl Session {
    /// Validate the file name, decode `bytes`, and auto-select a lone sheet.
    pub fn load<C: TabularCodec>(file_name: &str, bytes: &[u8], codec: &C) -> SplitResult<Self> {
        validate_input_file_name(file_name)?;
        let workbook = codec.decode(bytes)?;
        Self::from_workbook(file_name, workbook)
    }

    /// Wrap an already decoded workbook.
    pub fn from_workbook(file_name: &str, workbook: SpecSourceWorkbook) -> SplitResult<Self> {
        if workbook.sheets.is_empty() {
            return Err(SplitError::NoSheets);
        }

        let mut session = Self {
            file_name: file_name.to_string(),
            workbook,
            sheet_name_selected: None,
        };
        info!(
            "loaded {:?} with {} sheet(s)",
            session.file_name,
            session.workbook.sheets.len()
        );

        if let [sheet] = session.workbook.sheets.as_slice() {
            let c_sheet_name = sheet.sheet_name.clone();
            session.select_sheet(&c_sheet_name)?;
        }
        Ok(session)
    }

    /// Source file name (used as the multi-sheet artifact suffix).
    pub fn file_name(&self) -> &str {
        &self.file_name
    }

    /// Sheet names in file order.
    pub fn sheet_names(&self) -> Vec<String> {
        self.workbook.sheet_names()
    }

    /// `true` when the workbook has several sheets and none is selected yet.
    pub fn needs_sheet_selection(&self) -> bool {
        self.sheet_name_selected.is_none()
    }

    /// Currently selected sheet.
    pub fn selected_sheet(&self) -> Option<&str> {
        self.sheet_name_selected.as_deref()
    }

    /// Select the sheet to split; an empty sheet is rejected and leaves no selection.
    pub fn select_sheet(&mut self, sheet_name: &str) -> SplitResult<()> {
        let Some(sheet) = self.workbook.sheet(sheet_name) else {
            return Err(SplitError::SheetNotFound(sheet_name.to_string()));
        };
        if sheet.dataset.is_empty() {
            self.sheet_name_selected = None;
            return Err(SplitError::EmptySheet(sheet_name.to_string()));
        }

        debug!(
            "selected sheet {sheet_name:?}: {} rows x {} cols",
            sheet.dataset.rows.len(),
            sheet.dataset.width()
        );
        self.sheet_name_selected = Some(sheet_name.to_string());
        Ok(())
    }

    /// Dataset of the selected sheet.
    pub fn dataset(&self) -> SplitResult<&SpecTabularDataset> {
        let c_sheet_name = self
            .sheet_name_selected
            .as_deref()
            .ok_or(SplitError::NoSheetSelected)?;
        self.workbook
            .sheet(c_sheet_name)
            .map(|sheet| &sheet.dataset)
            .ok_or_else(|| SplitError::SheetNotFound(c_sheet_name.to_string()))
    }

    /// Header cells with non-blank trimmed text, in header order.
    pub fn available_columns(&self) -> SplitResult<Vec<String>> {
        let dataset = self.dataset()?;
        Ok(dataset
            .header()
            .map(|header| {
                header
                    .iter()
                    .map(|cell| cell.to_text_form())
                    .filter(|c_text| !c_text.trim().is_empty())
                    .collect()
            })
            .unwrap_or_default())
    }

    /// Truncated view of the selected sheet.
    pub fn preview(&self, options: SpecPreviewOptions) -> SplitResult<SpecPreview> {
        Ok(derive_preview(self.dataset()?, options))
    }

    /// Split the selected sheet by `split_key`.
    pub fn process<C: TabularCodec>(
        &self,
        split_key: &str,
        mode: EnumSplitMode,
        codec: &C,
        options: SpecSplitOptions,
    ) -> SplitResult<SpecSplitOutput> {
        let dataset = self.dataset()?;
        split_dataset_in_sheet(
            dataset,
            self.sheet_name_selected.as_deref(),
            split_key,
            mode,
            &self.file_name,
            codec,
            options,
        )
    }
}

/// Reject file names without a spreadsheet extension (case-insensitive).
pub fn validate_input_file_name(file_name: &str) -> SplitResult<()> {
    let c_ext = Path::new(file_name)
        .extension()
        .and_then(|ext| ext.to_str())
        .map(str::to_ascii_lowercase)
        .unwrap_or_default();
    if TUP_EXT_INPUT_SUPPORTED.contains(&c_ext.as_str()) {
        Ok(())
    } else {
        Err(SplitError::UnsupportedFileType(file_name.to_string()))
    }
}

/// Build a preview of at most `rows_max` data rows and `cols_max` columns.
pub fn derive_preview(dataset: &SpecTabularDataset, options: SpecPreviewOptions) -> SpecPreview {
    let to_texts = |row: &[EnumCellValue]| -> Vec<String> {
        row.iter()
            .take(options.cols_max)
            .map(|cell| cell.to_text_form())
            .collect()
    };

    let l_header = dataset
        .header()
        .map(|h| to_texts(h.as_slice()))
        .unwrap_or_default();
    let l_rows_data = dataset.data_rows();
    let l_rows: Vec<Vec<String>> = l_rows_data
        .iter()
        .take(options.rows_max)
        .map(|row| to_texts(row.as_slice()))
        .collect();

    let if_cols_truncated = dataset
        .rows
        .iter()
        .take(options.rows_max.saturating_add(1))
        .any(|row| row.len() > options.cols_max);

    SpecPreview {
        header: l_header,
        n_rows_hidden: l_rows_data.len().saturating_sub(l_rows.len()),
        rows: l_rows,
        n_rows_total: dataset.rows.len(),
        n_cols_total: dataset.width(),
        if_cols_truncated,
    }
}
