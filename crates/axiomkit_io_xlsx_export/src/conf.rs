//! XLSX export constants and default preset factories.

use std::collections::BTreeMap;

use crate::spec::{SpecCellFormat, SpecXlsxExportOptions};

/// Excel worksheet maximum row count.
pub const N_NROWS_EXCEL_MAX: usize = 1_048_576;
/// Excel worksheet maximum column count.
pub const N_NCOLS_EXCEL_MAX: usize = 16_384;
/// Excel sheet name maximum length.
pub const N_LEN_EXCEL_SHEET_NAME_MAX: usize = 31;
/// Characters not allowed in sheet names.
pub const TUP_EXCEL_ILLEGAL: [&str; 7] = ["*", ":", "?", "/", "\\", "[", "]"];

/// Name of the default sheet a fresh workbook starts with.
pub const C_SHEET_NAME_PLACEHOLDER: &str = "Sheet1";
/// Number format applied to date-time cells written without a style.
pub const C_NUM_FORMAT_DATETIME_DEFAULT: &str = "yyyy-mm-dd hh:mm:ss";
/// Default handoff queue size of channel-backed producers (0 = rendezvous).
pub const N_CHANNEL_CAPACITY_DEFAULT: usize = 0;

/// Build default named format presets that callers can register as styles.
pub fn derive_default_xlsx_formats() -> BTreeMap<String, SpecCellFormat> {
    let cfg_base_fmt_spec = SpecCellFormat {
        font_name: Some("Times New Roman".to_string()),
        font_size: Some(11),
        border: Some(1),
        align: Some("left".to_string()),
        valign: Some("vcenter".to_string()),
        ..Default::default()
    };

    let mut dict_fmt = BTreeMap::new();
    dict_fmt.insert("text".to_string(), cfg_base_fmt_spec.clone());
    dict_fmt.insert(
        "header".to_string(),
        cfg_base_fmt_spec.with_(SpecCellFormat {
            bold: Some(true),
            align: Some("center".to_string()),
            ..Default::default()
        }),
    );
    dict_fmt.insert(
        "integer".to_string(),
        cfg_base_fmt_spec.with_(SpecCellFormat {
            num_format: Some("0".to_string()),
            ..Default::default()
        }),
    );
    dict_fmt.insert(
        "decimal".to_string(),
        cfg_base_fmt_spec.with_(SpecCellFormat {
            num_format: Some("0.0000".to_string()),
            ..Default::default()
        }),
    );
    dict_fmt.insert(
        "scientific".to_string(),
        cfg_base_fmt_spec.with_(SpecCellFormat {
            num_format: Some("0.00E+0".to_string()),
            ..Default::default()
        }),
    );

    dict_fmt
}

/// Build default export options.
pub fn derive_default_xlsx_export_options() -> SpecXlsxExportOptions {
    SpecXlsxExportOptions::default()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_formats_share_base_font() {
        let dict_fmt = derive_default_xlsx_formats();
        assert_eq!(dict_fmt.len(), 5);
        for fmt in dict_fmt.values() {
            assert_eq!(fmt.font_name.as_deref(), Some("Times New Roman"));
        }
        assert_eq!(dict_fmt["header"].bold, Some(true));
        assert_eq!(dict_fmt["header"].align.as_deref(), Some("center"));
        assert_eq!(dict_fmt["integer"].num_format.as_deref(), Some("0"));
    }

    #[test]
    fn test_default_export_options_use_excel_row_limit() {
        let options = derive_default_xlsx_export_options();
        assert_eq!(options.n_rows_sheet_max, 1_048_576);
    }
}
