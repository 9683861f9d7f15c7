//! Stateless helper utilities shared by sinks, writers and the exporter.

use std::collections::{BTreeMap, BTreeSet};

use crate::conf::{N_LEN_EXCEL_SHEET_NAME_MAX, N_NCOLS_EXCEL_MAX, N_NROWS_EXCEL_MAX, TUP_EXCEL_ILLEGAL};
use crate::error::SinkError;

////////////////////////////////////////////////////////////////////////////////
// #region SheetNaming

/// Validate that `names` has no duplicates.
pub fn validate_unique_sheet_names(names: &[&str]) -> Result<(), String> {
    if names.len() == names.iter().collect::<BTreeSet<_>>().len() {
        return Ok(());
    }

    let mut dict_pos: BTreeMap<&str, Vec<usize>> = BTreeMap::new();
    for (n_idx, c_name) in names.iter().enumerate() {
        dict_pos.entry(c_name).or_default().push(n_idx);
    }

    let c_msg = dict_pos
        .iter()
        .filter_map(|(c_name, l_pos)| {
            if l_pos.len() > 1 {
                Some(format!(
                    "{c_name:?} x{} at indices {:?}",
                    l_pos.len(),
                    l_pos
                ))
            } else {
                None
            }
        })
        .collect::<Vec<_>>()
        .join("; ");

    Err(format!("Duplicate sheet names detected: {c_msg}"))
}

/// Check a sheet name against Excel rules (non-empty, length cap, no illegal chars).
pub fn validate_sheet_name(name: &str) -> Result<(), SinkError> {
    if name.trim().is_empty() {
        return Err(SinkError::InvalidSheetName(format!(
            "{name:?}: name must not be blank"
        )));
    }
    if name.chars().count() > N_LEN_EXCEL_SHEET_NAME_MAX {
        return Err(SinkError::InvalidSheetName(format!(
            "{name:?}: longer than {N_LEN_EXCEL_SHEET_NAME_MAX} characters"
        )));
    }
    if let Some(c_illegal) = TUP_EXCEL_ILLEGAL.iter().find(|c| name.contains(**c)) {
        return Err(SinkError::InvalidSheetName(format!(
            "{name:?}: contains illegal character {c_illegal:?}"
        )));
    }
    if name.starts_with('\'') || name.ends_with('\'') {
        return Err(SinkError::InvalidSheetName(format!(
            "{name:?}: must not start or end with an apostrophe"
        )));
    }
    Ok(())
}

/// Create suffixed sheet name (`base_1`, `base_2`, ...), respecting length cap.
pub fn create_sheet_identifier(base_name: &str, part_idx_1based: usize) -> String {
    let c_sheet_name_suffix = format!("_{part_idx_1based}");
    let n_len_base_name_max = N_LEN_EXCEL_SHEET_NAME_MAX.saturating_sub(c_sheet_name_suffix.len());

    let c_sheet_name_base: String = base_name
        .chars()
        .take(usize::max(1, n_len_base_name_max))
        .collect();

    format!("{c_sheet_name_base}{c_sheet_name_suffix}")
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
// #region CellAddressing

/// Convert 1-based column number to letters (`1` -> `A`, `27` -> `AA`).
pub fn convert_column_number_to_name(col: u16) -> String {
    let mut n_col = col as u32;
    let mut l_chars = Vec::new();
    while n_col > 0 {
        let n_rem = (n_col - 1) % 26;
        l_chars.push((b'A' + n_rem as u8) as char);
        n_col = (n_col - 1) / 26;
    }
    l_chars.iter().rev().collect()
}

/// Convert 1-based `(row, col)` to an A1-style cell name.
pub fn convert_coord_to_cell_name(row: u32, col: u16) -> String {
    format!("{}{row}", convert_column_number_to_name(col))
}

/// Parse an A1-style cell name (optionally `$`-anchored) into 1-based `(row, col)`.
pub fn parse_cell_name(name: &str) -> Result<(u32, u16), SinkError> {
    let c_name = name.trim().replace('$', "");
    let derive_err = || SinkError::InvalidRange(format!("invalid cell name: {name:?}"));

    let n_pos_digit = c_name
        .find(|chr: char| chr.is_ascii_digit())
        .ok_or_else(derive_err)?;
    let (c_letters, c_digits) = c_name.split_at(n_pos_digit);
    if c_letters.is_empty() || !c_letters.chars().all(|chr| chr.is_ascii_alphabetic()) {
        return Err(derive_err());
    }

    let mut n_col: u32 = 0;
    for chr in c_letters.chars() {
        n_col = n_col * 26 + (chr.to_ascii_uppercase() as u32 - 'A' as u32 + 1);
        if n_col as usize > N_NCOLS_EXCEL_MAX {
            return Err(derive_err());
        }
    }

    let n_row: u32 = c_digits.parse().map_err(|_| derive_err())?;
    if n_row == 0 || n_row as usize > N_NROWS_EXCEL_MAX {
        return Err(derive_err());
    }

    Ok((n_row, n_col as u16))
}

// #endregion
////////////////////////////////////////////////////////////////////////////////

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_sheet_identifier_keeps_short_names_exact() {
        assert_eq!(create_sheet_identifier("Orders", 1), "Orders_1");
        assert_eq!(create_sheet_identifier("Orders", 12), "Orders_12");
    }

    #[test]
    fn test_create_sheet_identifier_truncates_to_length_cap() {
        let c_base = "x".repeat(31);
        let c_name = create_sheet_identifier(&c_base, 3);
        assert_eq!(c_name.chars().count(), 31);
        assert!(c_name.ends_with("_3"));
    }

    #[test]
    fn test_validate_unique_sheet_names_reports_positions() {
        assert!(validate_unique_sheet_names(&["a", "b"]).is_ok());
        let c_msg = validate_unique_sheet_names(&["a", "b", "a"]).unwrap_err();
        assert_eq!(c_msg, "Duplicate sheet names detected: \"a\" x2 at indices [0, 2]");
    }

    #[test]
    fn test_validate_sheet_name() {
        assert!(validate_sheet_name("Sheet A").is_ok());
        assert!(validate_sheet_name("").is_err());
        assert!(validate_sheet_name("a/b").is_err());
        assert!(validate_sheet_name(&"y".repeat(32)).is_err());
        assert!(validate_sheet_name("'quoted").is_err());
    }

    #[test]
    fn test_cell_name_round_trip_edges() {
        assert_eq!(convert_column_number_to_name(1), "A");
        assert_eq!(convert_column_number_to_name(26), "Z");
        assert_eq!(convert_column_number_to_name(27), "AA");
        assert_eq!(convert_column_number_to_name(16_384), "XFD");
        assert_eq!(parse_cell_name("$B$3").unwrap(), (3, 2));
        assert_eq!(parse_cell_name("xfd1048576").unwrap(), (1_048_576, 16_384));
        assert!(parse_cell_name("A0").is_err());
        assert!(parse_cell_name("XFE1").is_err());
        assert!(parse_cell_name("12").is_err());
        assert!(parse_cell_name("A1B").is_err());
    }
}
