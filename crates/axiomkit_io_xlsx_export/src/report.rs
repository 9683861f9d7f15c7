//! Export report models.

use std::collections::BTreeMap;
use std::fmt;

/// One physical sheet written during an export.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpecSheetSegment {
    /// Physical sheet name in the document.
    pub sheet_name: String,
    /// Name of the sheet definition the rows came from.
    pub source_name: String,
    /// `0` for the base sheet, `n` for `{base}_{n}`.
    pub overflow_index: usize,
    /// Data rows written to this sheet.
    pub n_rows: u32,
}

/// Outcome of one committed export.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct SpecXlsxExportReport {
    /// Physical sheets in creation order.
    pub sheets: Vec<SpecSheetSegment>,
    /// Non-fatal warnings collected while writing.
    pub warnings: Vec<String>,
}

impl SpecXlsxExportReport {
    /// Total data rows across all physical sheets.
    pub fn total_rows(&self) -> u64 {
        self.sheets.iter().map(|seg| seg.n_rows as u64).sum()
    }

    /// Number of overflow (continuation) sheets.
    pub fn overflow_count(&self) -> usize {
        self.sheets.iter().filter(|seg| seg.overflow_index > 0).count()
    }

    /// Physical sheet names in creation order.
    pub fn sheet_names(&self) -> Vec<&str> {
        self.sheets.iter().map(|seg| seg.sheet_name.as_str()).collect()
    }

    /// Physical segments of definition `source_name`.
    pub fn segments_of<'a>(
        &'a self,
        source_name: &'a str,
    ) -> impl Iterator<Item = &'a SpecSheetSegment> + 'a {
        self.sheets
            .iter()
            .filter(move |seg| seg.source_name == source_name)
    }

    /// Add warning message.
    pub fn add_warning(&mut self, warning: String) {
        self.warnings.push(warning);
    }

    /// Machine-readable counters.
    pub fn to_dict(&self) -> BTreeMap<String, u64> {
        let mut dict_counts = BTreeMap::new();
        dict_counts.insert("cnt_sheets".to_string(), self.sheets.len() as u64);
        dict_counts.insert("cnt_overflow".to_string(), self.overflow_count() as u64);
        dict_counts.insert("cnt_rows".to_string(), self.total_rows());
        dict_counts.insert("cnt_warnings".to_string(), self.warnings.len() as u64);
        dict_counts
    }

    /// Human-readable one-line summary.
    pub fn format(&self, prefix: &str) -> String {
        let dict_counts = self.to_dict();
        format!(
            "{prefix} sheets={} overflow={} rows={} warnings={}",
            dict_counts["cnt_sheets"],
            dict_counts["cnt_overflow"],
            dict_counts["cnt_rows"],
            dict_counts["cnt_warnings"]
        )
    }
}

impl fmt::Display for SpecXlsxExportReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.format("[XLSX]"))
    }
}
