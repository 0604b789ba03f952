//! Grouping engine: partition data rows by the trimmed value of one column.

use std::collections::HashMap;

use log::debug;

use crate::spec::{
    EnumCellValue, SpecGroupedRows, SpecRowGroup, SpecTabularDataset, SplitError, SplitResult,
};

/// Locate the first header cell whose trimmed text form equals `split_key`.
///
/// Matching is exact and case-sensitive; no Unicode normalization.
pub fn find_split_column(header: &[EnumCellValue], split_key: &str) -> Option<usize> {
    header
        .iter()
        .position(|cell| cell.to_text_form().trim() == split_key)
}

/// Group data rows of `dataset` by the column named `split_key`.
///
/// Rows whose split cell is missing, blank or `""` are dropped and counted in
/// [`SpecGroupedRows::n_rows_dropped`]. Groups keep first-seen key order and
/// rows keep input order.
pub fn group_rows(dataset: &SpecTabularDataset, split_key: &str) -> SplitResult<SpecGroupedRows> {
    group_rows_in_sheet(dataset, split_key, None)
}

/// Same as [`group_rows`]; `sheet_name` only enriches the `NoDataRows` message.
pub fn group_rows_in_sheet(
    dataset: &SpecTabularDataset,
    split_key: &str,
    sheet_name: Option<&str>,
) -> SplitResult<SpecGroupedRows> {
    let c_split_key = split_key.trim();
    if c_split_key.is_empty() {
        return Err(SplitError::EmptySplitKey);
    }
    let Some(l_header) = dataset.header() else {
        return Err(SplitError::EmptyDataset);
    };

    let Some(n_idx_col_split) = find_split_column(l_header, c_split_key) else {
        return Err(SplitError::SplitKeyNotFound {
            split_key: c_split_key.to_string(),
        });
    };

    let l_rows_data = dataset.data_rows();
    if l_rows_data.is_empty() {
        return Err(SplitError::NoDataRows {
            sheet_name: sheet_name.map(ToString::to_string),
        });
    }

    let mut l_groups: Vec<SpecRowGroup> = Vec::new();
    let mut dict_idx_group: HashMap<String, usize> = HashMap::new();
    let mut n_rows_dropped = 0usize;

    for row in l_rows_data {
        let value = row.get(n_idx_col_split).unwrap_or(&EnumCellValue::Empty);
        // Blank split values are a filter, not an error.
        if value.is_blank() {
            n_rows_dropped += 1;
            continue;
        }

        let c_key = value.to_text_form().trim().to_string();
        match dict_idx_group.get(&c_key) {
            Some(&n_idx_group) => l_groups[n_idx_group].rows.push(row.clone()),
            None => {
                dict_idx_group.insert(c_key.clone(), l_groups.len());
                l_groups.push(SpecRowGroup {
                    key: c_key,
                    rows: vec![row.clone()],
                });
            }
        }
    }

    if l_groups.is_empty() {
        return Err(SplitError::NoValidGroups {
            split_key: c_split_key.to_string(),
        });
    }

    debug!(
        "grouped {} rows by {c_split_key:?} (col {n_idx_col_split}) into {} groups, dropped {n_rows_dropped}",
        l_rows_data.len(),
        l_groups.len()
    );

    Ok(SpecGroupedRows {
        split_key: c_split_key.to_string(),
        idx_col_split: n_idx_col_split,
        groups: l_groups,
        n_rows_data: l_rows_data.len(),
        n_rows_dropped,
    })
}
