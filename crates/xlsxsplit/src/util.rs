//! Stateless helper utilities used by the grouping and assembly steps.

use std::collections::BTreeSet;
use std::sync::LazyLock;

use regex::Regex;

use crate::conf::{
    C_PATTERN_FILE_NAME_ILLEGAL, C_PATTERN_FILE_NAME_WHITESPACE, C_SHEET_NAME_FALLBACK,
    N_LEN_EXCEL_SHEET_NAME_MAX, N_LEN_FILE_NAME_MAX, N_NCOLS_EXCEL_MAX, N_NROWS_EXCEL_MAX,
    TUP_EXCEL_ILLEGAL, TUP_EXCEL_RESERVED_SHEET_NAMES, TUP_SIZE_UNITS,
};
use crate::spec::{SplitError, SplitResult, SpecXlsxValuePolicy, TypeRow};

static RE_FILE_NAME_ILLEGAL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(C_PATTERN_FILE_NAME_ILLEGAL).expect("file name pattern is valid")
});
static RE_FILE_NAME_WHITESPACE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(C_PATTERN_FILE_NAME_WHITESPACE).expect("whitespace pattern is valid")
});

////////////////////////////////////////////////////////////////////////////////
// #region CellValueConversion

/// Convert `NaN`/`Inf` to policy string; return error for finite values.
pub fn convert_nan_inf_to_str(
    x: f64,
    value_policy: &SpecXlsxValuePolicy,
) -> Result<String, String> {
    if x.is_nan() {
        return Ok(value_policy.nan_str.clone());
    }
    if x.is_infinite() {
        return Ok(if x.is_sign_positive() {
            value_policy.posinf_str.clone()
        } else {
            value_policy.neginf_str.clone()
        });
    }
    Err("Input is neither NaN nor Inf.".to_string())
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
// #region NameNormalization

/// Replace filesystem-illegal chars and whitespace runs with `_`; cap at 100 chars.
///
/// Lossy: distinct keys may map to the same name.
pub fn sanitize_file_name(name: &str) -> String {
    let c_name = RE_FILE_NAME_ILLEGAL.replace_all(name, "_");
    let c_name = RE_FILE_NAME_WHITESPACE.replace_all(&c_name, "_");
    c_name.chars().take(N_LEN_FILE_NAME_MAX).collect()
}

/// Replace invalid chars and trim to valid Excel sheet name.
pub fn sanitize_sheet_name(name: &str, replace_to: char) -> String {
    let mut l_chars: Vec<char> = name
        .chars()
        .map(|chr| {
            if TUP_EXCEL_ILLEGAL.contains(&chr) {
                replace_to
            } else {
                chr
            }
        })
        .take(N_LEN_EXCEL_SHEET_NAME_MAX)
        .collect();

    if l_chars.is_empty() {
        return C_SHEET_NAME_FALLBACK.to_string();
    }

    // Excel rejects names starting or ending with an apostrophe.
    if l_chars.first() == Some(&'\'') {
        l_chars[0] = replace_to;
    }
    if let Some(chr_last) = l_chars.last_mut()
        && *chr_last == '\''
    {
        *chr_last = replace_to;
    }

    l_chars.into_iter().collect()
}

/// Create suffixed sheet name (`base__2`, `base__3`, ...), respecting length cap.
pub fn create_sheet_identifier(base_name: &str, part_idx: usize) -> String {
    let c_sheet_name_suffix = format!("__{part_idx}");
    let n_len_base_name_max = N_LEN_EXCEL_SHEET_NAME_MAX.saturating_sub(c_sheet_name_suffix.len());

    let c_sheet_name_base: String = base_name
        .chars()
        .take(usize::max(1, n_len_base_name_max))
        .collect();

    format!("{c_sheet_name_base}{c_sheet_name_suffix}")
}

/// Return `name` if unused, else the first free suffixed variant; record it as used.
///
/// `set_names_existing` holds lowercase names since Excel compares sheet names
/// case-insensitively.
pub fn derive_unique_sheet_name(name: &str, set_names_existing: &mut BTreeSet<String>) -> String {
    let is_taken = |candidate: &str, set_names: &BTreeSet<String>| {
        let c_lower = candidate.to_lowercase();
        set_names.contains(&c_lower) || TUP_EXCEL_RESERVED_SHEET_NAMES.contains(&c_lower.as_str())
    };

    if !is_taken(name, set_names_existing) {
        set_names_existing.insert(name.to_lowercase());
        return name.to_string();
    }

    let mut n_idx = 2usize;
    loop {
        let candidate = create_sheet_identifier(name, n_idx);
        if !is_taken(&candidate, set_names_existing) {
            set_names_existing.insert(candidate.to_lowercase());
            return candidate;
        }
        n_idx += 1;
    }
}

/// Return `file_name` if unused, else `stem (2).ext`, `stem (3).ext`, ...; record it.
pub fn derive_unique_file_name(file_name: &str, set_names_existing: &mut BTreeSet<String>) -> String {
    if set_names_existing.insert(file_name.to_string()) {
        return file_name.to_string();
    }

    let (c_stem, c_ext) = match file_name.rfind('.') {
        Some(n_pos) if n_pos > 0 => file_name.split_at(n_pos),
        _ => (file_name, ""),
    };

    let mut n_idx = 2usize;
    loop {
        let candidate = format!("{c_stem} ({n_idx}){c_ext}");
        if set_names_existing.insert(candidate.clone()) {
            return candidate;
        }
        n_idx += 1;
    }
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
// #region SizeFormatting

/// Binary-unit size text: `0 Bytes`, `1000 Bytes`, `1.5 KB`, `2 MB`.
///
/// Two-decimal rounding with trailing zeros removed; units stop at GB.
pub fn format_file_size(n_bytes: usize) -> String {
    if n_bytes == 0 {
        return format!("0 {}", TUP_SIZE_UNITS[0]);
    }

    let n_base = 1024f64;
    let n_value_raw = n_bytes as f64;
    let mut n_idx_unit = 0usize;
    while n_idx_unit + 1 < TUP_SIZE_UNITS.len()
        && n_value_raw >= n_base.powi(n_idx_unit as i32 + 1)
    {
        n_idx_unit += 1;
    }

    let n_value = n_value_raw / n_base.powi(n_idx_unit as i32);
    let n_value_rounded = (n_value * 100.0).round() / 100.0;
    format!("{n_value_rounded} {}", TUP_SIZE_UNITS[n_idx_unit])
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
// #region LimitValidation

/// Reject grids Excel cannot hold in one sheet.
pub fn validate_sheet_limits(sheet_name: &str, rows: &[TypeRow]) -> SplitResult<()> {
    let n_rows = rows.len();
    let n_cols = rows.iter().map(Vec::len).max().unwrap_or(0);
    if n_rows > N_NROWS_EXCEL_MAX || n_cols > N_NCOLS_EXCEL_MAX {
        return Err(SplitError::SheetTooLarge {
            sheet_name: sheet_name.to_string(),
            rows: n_rows,
            cols: n_cols,
        });
    }
    Ok(())
}

// #endregion
////////////////////////////////////////////////////////////////////////////////

#[cfg(test)]
mod tests {
    use super::*;
    use crate::spec::EnumCellValue;

    #[test]
    fn test_sanitize_file_name_replaces_illegal_and_whitespace_runs() {
        assert_eq!(sanitize_file_name("a<b>c:d\"e/f\\g|h?i*j"), "a_b_c_d_e_f_g_h_i_j");
        assert_eq!(sanitize_file_name("New   York\tCity"), "New_York_City");
        assert_eq!(sanitize_file_name("North"), "North");
    }

    #[test]
    fn test_sanitize_file_name_bounds() {
        let c_long = "é?".repeat(120);
        let c_name = sanitize_file_name(&c_long);
        assert_eq!(c_name.chars().count(), 100);
        assert!(!c_name.chars().any(|chr| "<>:\"/\\|?*".contains(chr)));
    }

    #[test]
    fn test_sanitize_sheet_name_bounds() {
        let c_name = sanitize_sheet_name("[Q1]*sales?/by\\region and a very long tail", '_');
        assert_eq!(c_name.chars().count(), 31);
        assert!(c_name.starts_with("_Q1__sales__by_region"));
        assert!(!c_name.chars().any(|chr| "[]*?/\\".contains(chr)));
    }

    #[test]
    fn test_sanitize_sheet_name_edge_cases() {
        assert_eq!(sanitize_sheet_name("", '_'), "Sheet");
        assert_eq!(sanitize_sheet_name("'quoted'", '_'), "_quoted_");
        assert_eq!(sanitize_sheet_name("a:b", '_'), "a_b");
        assert_eq!(sanitize_sheet_name("North", '_'), "North");
    }

    #[test]
    fn test_derive_unique_sheet_name_is_case_insensitive() {
        let mut set_names = BTreeSet::new();
        assert_eq!(derive_unique_sheet_name("North", &mut set_names), "North");
        assert_eq!(derive_unique_sheet_name("north", &mut set_names), "north__2");
        assert_eq!(derive_unique_sheet_name("NORTH", &mut set_names), "NORTH__3");
        assert_eq!(derive_unique_sheet_name("History", &mut set_names), "History__2");
    }

    #[test]
    fn test_derive_unique_sheet_name_keeps_length_cap() {
        let mut set_names = BTreeSet::new();
        let c_base = "x".repeat(31);
        assert_eq!(derive_unique_sheet_name(&c_base, &mut set_names), c_base);
        let c_second = derive_unique_sheet_name(&c_base, &mut set_names);
        assert_eq!(c_second.chars().count(), 31);
        assert!(c_second.ends_with("__2"));
    }

    #[test]
    fn test_derive_unique_file_name() {
        let mut set_names = BTreeSet::new();
        assert_eq!(derive_unique_file_name("a_b.xlsx", &mut set_names), "a_b.xlsx");
        assert_eq!(derive_unique_file_name("a_b.xlsx", &mut set_names), "a_b (2).xlsx");
        assert_eq!(derive_unique_file_name("a_b.xlsx", &mut set_names), "a_b (3).xlsx");
        assert_eq!(derive_unique_file_name(".xlsx", &mut set_names), ".xlsx");
        assert_eq!(derive_unique_file_name(".xlsx", &mut set_names), ".xlsx (2)");
    }

    #[test]
    fn test_format_file_size() {
        assert_eq!(format_file_size(0), "0 Bytes");
        assert_eq!(format_file_size(1000), "1000 Bytes");
        assert_eq!(format_file_size(1024), "1 KB");
        assert_eq!(format_file_size(1536), "1.5 KB");
        assert_eq!(format_file_size(1_234_567), "1.18 MB");
        assert_eq!(format_file_size(3 * 1024 * 1024 * 1024), "3 GB");
        assert_eq!(format_file_size(2048 * 1024 * 1024 * 1024), "2048 GB");
    }

    #[test]
    fn test_validate_sheet_limits() {
        let rows = vec![vec![EnumCellValue::Empty; N_NCOLS_EXCEL_MAX + 1]];
        assert!(matches!(
            validate_sheet_limits("wide", &rows),
            Err(SplitError::SheetTooLarge { cols, .. }) if cols == N_NCOLS_EXCEL_MAX + 1
        ));
        assert!(validate_sheet_limits("ok", &rows[..0]).is_ok());
    }
}
