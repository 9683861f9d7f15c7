//! Document sink contract, append cursor and the in-memory sink.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use crate::conf::C_SHEET_NAME_PLACEHOLDER;
use crate::error::SinkError;
use crate::spec::{SpecCell, SpecCellCoord, SpecCellFormat, SpecCellRange, SpecRowOptions};
use crate::util::validate_sheet_name;

////////////////////////////////////////////////////////////////////////////////
// #region SinkContract

/// Spreadsheet document store the export pipeline writes into.
///
/// Coordinates are absolute and 1-based. Buffered writes (`write_cell`,
/// `merge_cells`) may address any cell of any created sheet; streaming writes
/// go through a [`SpecAppendCursor`] that only moves forward.
pub trait XlsxSink {
    /// Register a style; the returned handle is `>= 1`.
    fn add_style(&mut self, format: &SpecCellFormat) -> Result<u32, SinkError>;

    /// Append a new empty sheet named `name`.
    fn create_sheet(&mut self, name: &str) -> Result<(), SinkError>;

    /// Remove sheet `name`.
    fn delete_sheet(&mut self, name: &str) -> Result<(), SinkError>;

    /// Number of sheets, placeholder included.
    fn count_sheets(&self) -> usize;

    /// Name of the default sheet a fresh document starts with, while it exists.
    fn placeholder_sheet_name(&self) -> Option<String>;

    /// Write value, style and formula of one cell.
    fn write_cell(
        &mut self,
        sheet: &str,
        coord: SpecCellCoord,
        cell: &SpecCell,
    ) -> Result<(), SinkError>;

    /// Merge `range`. `anchor` is the content kept at the top-left corner;
    /// without it the corner is left blank. Every other covered cell becomes
    /// a blank carrying the anchor's style.
    fn merge_cells(
        &mut self,
        sheet: &str,
        range: SpecCellRange,
        anchor: Option<&SpecCell>,
    ) -> Result<(), SinkError>;

    /// Set the width of 1-based columns `col_first..=col_last`.
    fn set_column_width(
        &mut self,
        sheet: &str,
        col_first: u16,
        col_last: u16,
        width: f64,
    ) -> Result<(), SinkError>;

    /// Open an append-only cursor on a freshly created sheet.
    fn new_append_cursor(&mut self, sheet: &str) -> Result<SpecAppendCursor, SinkError>;

    /// Append row `n_row`; cells start at column 1, options apply to the whole row.
    fn append_row(
        &mut self,
        cursor: &mut SpecAppendCursor,
        n_row: u32,
        cells: &[SpecCell],
        options: &[SpecRowOptions],
    ) -> Result<(), SinkError>;

    /// Merge `range` on the cursor's sheet.
    ///
    /// A range starting on the last appended row is applied at once, keeping
    /// that row's cell as anchor. A range starting further down is applied
    /// when its first row is appended, before that row's cells, or at flush.
    /// A range starting above the last appended row is a cursor error.
    fn append_merge(
        &mut self,
        cursor: &mut SpecAppendCursor,
        range: SpecCellRange,
    ) -> Result<(), SinkError>;

    /// Flush pending cursor state into the document and close the cursor.
    fn flush_cursor(&mut self, cursor: SpecAppendCursor) -> Result<(), SinkError>;

    /// Persist the document at `path`.
    fn save(&mut self, path: &Path) -> Result<(), SinkError>;
}

/// Forward-only write position on one sheet.
#[derive(Debug, PartialEq, Eq)]
pub struct SpecAppendCursor {
    sheet_name: String,
    n_row_last: Option<u32>,
    l_merges_pending: Vec<SpecCellRange>,
}

impl SpecAppendCursor {
    /// Cursor bound to `sheet_name`, before any row.
    pub fn new(sheet_name: impl Into<String>) -> Self {
        Self {
            sheet_name: sheet_name.into(),
            n_row_last: None,
            l_merges_pending: vec![],
        }
    }

    /// Sheet this cursor appends to.
    pub fn sheet_name(&self) -> &str {
        &self.sheet_name
    }

    /// Last appended row, if any.
    pub fn last_row(&self) -> Option<u32> {
        self.n_row_last
    }

    /// Claim row `n_row`; rows must strictly increase.
    pub fn advance_to(&mut self, n_row: u32) -> Result<(), SinkError> {
        if let Some(n_row_last) = self.n_row_last
            && n_row <= n_row_last
        {
            return Err(SinkError::Cursor(format!(
                "sheet {:?}: row {n_row} appended after row {n_row_last}",
                self.sheet_name
            )));
        }
        self.n_row_last = Some(n_row);
        Ok(())
    }

    /// Route a merge by its first row.
    ///
    /// Returns the range when it starts on the last appended row, queues it
    /// when it starts below, and rejects it when it starts above.
    pub fn route_merge(
        &mut self,
        range: SpecCellRange,
    ) -> Result<Option<SpecCellRange>, SinkError> {
        match self.n_row_last {
            Some(n_row_last) if range.first.row < n_row_last => Err(SinkError::Cursor(format!(
                "sheet {:?}: merge {} starts above appended row {n_row_last}",
                self.sheet_name,
                range.to_a1()
            ))),
            Some(n_row_last) if range.first.row == n_row_last => Ok(Some(range)),
            _ => {
                self.l_merges_pending.push(range);
                Ok(None)
            }
        }
    }

    /// Drain queued merges whose first row is `n_row` or earlier, topmost first.
    pub fn take_merges_through(&mut self, n_row: u32) -> Vec<SpecCellRange> {
        let (mut l_due, l_rest): (Vec<_>, Vec<_>) = std::mem::take(&mut self.l_merges_pending)
            .into_iter()
            .partition(|range| range.first.row <= n_row);
        self.l_merges_pending = l_rest;
        l_due.sort_by_key(|range| range.first);
        l_due
    }

    /// Drain all queued merges, topmost first.
    pub fn take_merges(&mut self) -> Vec<SpecCellRange> {
        self.take_merges_through(u32::MAX)
    }
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
// #region MemorySink

/// One sheet of a [`MemorySink`] document.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct SpecMemorySheet {
    /// Sheet name.
    pub name: String,
    /// Written cells by `(row, col)`, both 1-based.
    pub cells: BTreeMap<(u32, u16), SpecCell>,
    /// Merged ranges in application order.
    pub merges: Vec<SpecCellRange>,
    /// Row options by 1-based row.
    pub row_options: BTreeMap<u32, Vec<SpecRowOptions>>,
    /// Column widths by 1-based column.
    pub col_widths: BTreeMap<u16, f64>,
}

impl SpecMemorySheet {
    fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            ..Default::default()
        }
    }

    /// Cell at 1-based `(row, col)`.
    pub fn cell(&self, row: u32, col: u16) -> Option<&SpecCell> {
        self.cells.get(&(row, col))
    }

    /// Highest written row, 0 when empty.
    pub fn max_row(&self) -> u32 {
        self.cells.keys().map(|(n_row, _)| *n_row).max().unwrap_or(0)
    }

    /// Number of distinct rows holding at least one cell.
    pub fn count_rows(&self) -> usize {
        let mut n_rows = 0;
        let mut n_row_prev = None;
        for (n_row, _) in self.cells.keys() {
            if n_row_prev != Some(*n_row) {
                n_rows += 1;
                n_row_prev = Some(*n_row);
            }
        }
        n_rows
    }
}

/// Operation recorded by [`MemorySink`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EnumSinkOp {
    /// Sheet created.
    CreateSheet(String),
    /// Sheet deleted.
    DeleteSheet(String),
    /// Append cursor opened.
    OpenCursor(String),
    /// Append cursor flushed.
    FlushCursor(String),
    /// Document saved.
    Save(PathBuf),
}

/// In-memory document with the same contract as the workbook sink.
///
/// Starts with a placeholder sheet named [`C_SHEET_NAME_PLACEHOLDER`]; records
/// structural operations in a journal for inspection. Merges blank their
/// covered cells as the workbook sink does.
#[derive(Debug, Clone)]
pub struct MemorySink {
    l_sheets: Vec<SpecMemorySheet>,
    l_styles: Vec<SpecCellFormat>,
    if_placeholder: bool,
    c_sheet_cursor_open: Option<String>,
    l_journal: Vec<EnumSinkOp>,
    path_saved: Option<PathBuf>,
}

impl Default for MemorySink {
    fn default() -> Self {
        Self::new()
    }
}

impl MemorySink {
    /// Empty document holding only the placeholder sheet.
    pub fn new() -> Self {
        Self {
            l_sheets: vec![SpecMemorySheet::new(C_SHEET_NAME_PLACEHOLDER)],
            l_styles: vec![],
            if_placeholder: true,
            c_sheet_cursor_open: None,
            l_journal: vec![],
            path_saved: None,
        }
    }

    /// Sheets in document order.
    pub fn sheets(&self) -> &[SpecMemorySheet] {
        &self.l_sheets
    }

    /// Sheet names in document order.
    pub fn sheet_names(&self) -> Vec<&str> {
        self.l_sheets.iter().map(|sheet| sheet.name.as_str()).collect()
    }

    /// Sheet by name.
    pub fn sheet(&self, name: &str) -> Option<&SpecMemorySheet> {
        self.l_sheets.iter().find(|sheet| sheet.name == name)
    }

    /// Registered style by handle.
    pub fn style(&self, style: u32) -> Option<&SpecCellFormat> {
        style
            .checked_sub(1)
            .and_then(|n_idx| self.l_styles.get(n_idx as usize))
    }

    /// Structural operations in call order.
    pub fn journal(&self) -> &[EnumSinkOp] {
        &self.l_journal
    }

    /// Path of the last successful save.
    pub fn saved_path(&self) -> Option<&Path> {
        self.path_saved.as_deref()
    }

    fn sheet_mut(&mut self, name: &str) -> Result<&mut SpecMemorySheet, SinkError> {
        self.l_sheets
            .iter_mut()
            .find(|sheet| sheet.name == name)
            .ok_or_else(|| SinkError::SheetNotFound(name.to_string()))
    }

    fn validate_style(&self, style: Option<u32>) -> Result<(), SinkError> {
        match style {
            Some(n_style) if n_style > 0 && self.style(n_style).is_none() => {
                Err(SinkError::UnknownStyle(n_style))
            }
            _ => Ok(()),
        }
    }

    fn validate_random_access(&self, sheet: &str) -> Result<(), SinkError> {
        if self.c_sheet_cursor_open.as_deref() == Some(sheet) {
            return Err(SinkError::Cursor(format!(
                "sheet {sheet:?} has an open append cursor"
            )));
        }
        Ok(())
    }

    fn store_cell(
        &mut self,
        sheet: &str,
        coord: SpecCellCoord,
        cell: &SpecCell,
    ) -> Result<(), SinkError> {
        self.validate_style(cell.style)?;
        let sheet = self.sheet_mut(sheet)?;
        sheet.cells.insert((coord.row, coord.col), cell.clone());
        Ok(())
    }

    fn store_merge(
        &mut self,
        sheet: &str,
        range: SpecCellRange,
        anchor: Option<&SpecCell>,
    ) -> Result<(), SinkError> {
        if let Some(cell) = anchor {
            self.validate_style(cell.style)?;
        }
        if range.is_single_cell() {
            return Err(SinkError::InvalidRange(format!(
                "{}: a merge must cover more than one cell",
                range.to_a1()
            )));
        }
        let sheet = self.sheet_mut(sheet)?;
        if let Some(range_existing) = sheet.merges.iter().find(|other| other.overlaps(&range)) {
            return Err(SinkError::InvalidRange(format!(
                "{} overlaps merged range {}",
                range.to_a1(),
                range_existing.to_a1()
            )));
        }
        let cell_anchor = anchor.cloned().unwrap_or_default();
        let cell_blank = SpecCell {
            style: cell_anchor.style,
            ..Default::default()
        };
        for n_row in range.first.row..=range.last.row {
            for n_col in range.first.col..=range.last.col {
                sheet.cells.insert((n_row, n_col), cell_blank.clone());
            }
        }
        sheet
            .cells
            .insert((range.first.row, range.first.col), cell_anchor);
        sheet.merges.push(range);
        Ok(())
    }

    fn validate_cursor_open(&self, cursor: &SpecAppendCursor) -> Result<(), SinkError> {
        if self.c_sheet_cursor_open.as_deref() != Some(cursor.sheet_name()) {
            return Err(SinkError::Cursor(format!(
                "cursor on sheet {:?} is not open",
                cursor.sheet_name()
            )));
        }
        Ok(())
    }
}

impl XlsxSink for MemorySink {
    fn add_style(&mut self, format: &SpecCellFormat) -> Result<u32, SinkError> {
        self.l_styles.push(format.clone());
        Ok(self.l_styles.len() as u32)
    }

    fn create_sheet(&mut self, name: &str) -> Result<(), SinkError> {
        validate_sheet_name(name)?;
        if self.if_placeholder && name == C_SHEET_NAME_PLACEHOLDER {
            self.if_placeholder = false;
            self.l_journal.push(EnumSinkOp::CreateSheet(name.to_string()));
            return Ok(());
        }
        if self.sheet(name).is_some() {
            return Err(SinkError::DuplicateSheetName(name.to_string()));
        }
        self.l_sheets.push(SpecMemorySheet::new(name));
        self.l_journal.push(EnumSinkOp::CreateSheet(name.to_string()));
        Ok(())
    }

    fn delete_sheet(&mut self, name: &str) -> Result<(), SinkError> {
        let Some(n_idx) = self.l_sheets.iter().position(|sheet| sheet.name == name) else {
            return Err(SinkError::SheetNotFound(name.to_string()));
        };
        if self.l_sheets.len() == 1 {
            return Err(SinkError::Unsupported(
                "cannot delete the only sheet of a document".to_string(),
            ));
        }
        self.l_sheets.remove(n_idx);
        if name == C_SHEET_NAME_PLACEHOLDER {
            self.if_placeholder = false;
        }
        self.l_journal.push(EnumSinkOp::DeleteSheet(name.to_string()));
        Ok(())
    }

    fn count_sheets(&self) -> usize {
        self.l_sheets.len()
    }

    fn placeholder_sheet_name(&self) -> Option<String> {
        self.if_placeholder
            .then(|| C_SHEET_NAME_PLACEHOLDER.to_string())
    }

    fn write_cell(
        &mut self,
        sheet: &str,
        coord: SpecCellCoord,
        cell: &SpecCell,
    ) -> Result<(), SinkError> {
        self.validate_random_access(sheet)?;
        self.store_cell(sheet, coord, cell)
    }

    fn merge_cells(
        &mut self,
        sheet: &str,
        range: SpecCellRange,
        anchor: Option<&SpecCell>,
    ) -> Result<(), SinkError> {
        self.validate_random_access(sheet)?;
        self.store_merge(sheet, range, anchor)
    }

    fn set_column_width(
        &mut self,
        sheet: &str,
        col_first: u16,
        col_last: u16,
        width: f64,
    ) -> Result<(), SinkError> {
        if col_first == 0 || col_first > col_last {
            return Err(SinkError::InvalidRange(format!(
                "columns {col_first}..{col_last}"
            )));
        }
        let sheet = self.sheet_mut(sheet)?;
        for n_col in col_first..=col_last {
            sheet.col_widths.insert(n_col, width);
        }
        Ok(())
    }

    fn new_append_cursor(&mut self, sheet: &str) -> Result<SpecAppendCursor, SinkError> {
        if let Some(c_sheet_open) = &self.c_sheet_cursor_open {
            return Err(SinkError::Cursor(format!(
                "cursor on sheet {c_sheet_open:?} must be flushed before opening another"
            )));
        }
        let sheet_target = self
            .sheet(sheet)
            .ok_or_else(|| SinkError::SheetNotFound(sheet.to_string()))?;
        if !sheet_target.cells.is_empty() {
            return Err(SinkError::Cursor(format!(
                "sheet {sheet:?} already holds cells"
            )));
        }
        self.c_sheet_cursor_open = Some(sheet.to_string());
        self.l_journal.push(EnumSinkOp::OpenCursor(sheet.to_string()));
        Ok(SpecAppendCursor::new(sheet))
    }

    fn append_row(
        &mut self,
        cursor: &mut SpecAppendCursor,
        n_row: u32,
        cells: &[SpecCell],
        options: &[SpecRowOptions],
    ) -> Result<(), SinkError> {
        self.validate_cursor_open(cursor)?;
        for opts in options {
            self.validate_style(opts.style)?;
        }
        cursor.advance_to(n_row)?;

        let c_sheet = cursor.sheet_name().to_string();
        for range in cursor.take_merges_through(n_row) {
            self.store_merge(&c_sheet, range, None)?;
        }
        for (n_idx, cell) in cells.iter().enumerate() {
            let n_col = u16::try_from(n_idx + 1).map_err(|_| SinkError::InvalidCoordinate {
                row: n_row,
                col: u16::MAX,
            })?;
            let coord = SpecCellCoord::new(n_row, n_col)?;
            self.store_cell(&c_sheet, coord, cell)?;
        }
        if !options.is_empty() {
            self.sheet_mut(&c_sheet)?
                .row_options
                .insert(n_row, options.to_vec());
        }
        Ok(())
    }

    fn append_merge(
        &mut self,
        cursor: &mut SpecAppendCursor,
        range: SpecCellRange,
    ) -> Result<(), SinkError> {
        self.validate_cursor_open(cursor)?;
        let Some(range) = cursor.route_merge(range)? else {
            return Ok(());
        };
        let c_sheet = cursor.sheet_name().to_string();
        let anchor = self
            .sheet(&c_sheet)
            .and_then(|sheet| sheet.cell(range.first.row, range.first.col))
            .cloned();
        self.store_merge(&c_sheet, range, anchor.as_ref())
    }

    fn flush_cursor(&mut self, mut cursor: SpecAppendCursor) -> Result<(), SinkError> {
        self.validate_cursor_open(&cursor)?;
        let c_sheet = cursor.sheet_name().to_string();
        for range in cursor.take_merges() {
            self.store_merge(&c_sheet, range, None)?;
        }
        self.c_sheet_cursor_open = None;
        self.l_journal.push(EnumSinkOp::FlushCursor(c_sheet));
        Ok(())
    }

    fn save(&mut self, path: &Path) -> Result<(), SinkError> {
        if let Some(c_sheet_open) = &self.c_sheet_cursor_open {
            return Err(SinkError::Cursor(format!(
                "cursor on sheet {c_sheet_open:?} was never flushed"
            )));
        }
        self.path_saved = Some(path.to_path_buf());
        self.l_journal.push(EnumSinkOp::Save(path.to_path_buf()));
        Ok(())
    }
}

// #endregion
////////////////////////////////////////////////////////////////////////////////

#[cfg(test)]
mod tests {
    use super::*;
    use crate::spec::SpecMergeSpan;

    fn coord(row: u32, col: u16) -> SpecCellCoord {
        SpecCellCoord::new(row, col).expect("coord")
    }

    #[test]
    fn test_memory_sink_starts_with_placeholder() {
        let mut sink = MemorySink::new();
        assert_eq!(sink.placeholder_sheet_name().as_deref(), Some("Sheet1"));
        sink.create_sheet("Data").expect("create");
        assert_eq!(sink.count_sheets(), 2);
        sink.delete_sheet("Sheet1").expect("delete");
        assert_eq!(sink.placeholder_sheet_name(), None);
        assert_eq!(sink.sheet_names(), vec!["Data"]);
    }

    #[test]
    fn test_memory_sink_rejects_duplicate_and_unknown_style() {
        let mut sink = MemorySink::new();
        sink.create_sheet("Data").expect("create");
        assert!(matches!(
            sink.create_sheet("Data"),
            Err(SinkError::DuplicateSheetName(_))
        ));

        let err = sink
            .write_cell("Data", coord(1, 1), &SpecCell::new("x").with_style(9))
            .expect_err("unknown style");
        assert!(matches!(err, SinkError::UnknownStyle(9)));

        let n_style = sink.add_style(&SpecCellFormat::default()).expect("style");
        assert_eq!(n_style, 1);
        sink.write_cell("Data", coord(1, 1), &SpecCell::new("x").with_style(n_style))
            .expect("styled write");
    }

    #[test]
    fn test_memory_sink_rejects_overlapping_merges() {
        let mut sink = MemorySink::new();
        sink.create_sheet("Data").expect("create");
        let r1 = SpecMergeSpan::horizontal(1, 2).unwrap().resolve(1).unwrap();
        let r2 = SpecMergeSpan::horizontal(2, 3).unwrap().resolve(1).unwrap();
        sink.merge_cells("Data", r1, None).expect("merge");
        assert!(matches!(
            sink.merge_cells("Data", r2, None),
            Err(SinkError::InvalidRange(_))
        ));
    }

    #[test]
    fn test_append_cursor_is_forward_only() {
        let mut sink = MemorySink::new();
        sink.create_sheet("S").expect("create");
        let mut cursor = sink.new_append_cursor("S").expect("cursor");

        sink.append_row(&mut cursor, 1, &[SpecCell::new("a"), SpecCell::new("b")], &[])
            .expect("row 1");
        assert!(matches!(
            sink.append_row(&mut cursor, 1, &[SpecCell::new("b")], &[]),
            Err(SinkError::Cursor(_))
        ));
        assert!(matches!(
            sink.write_cell("S", coord(5, 1), &SpecCell::new("c")),
            Err(SinkError::Cursor(_))
        ));
        assert!(sink.save(Path::new("x.xlsx")).is_err());

        sink.flush_cursor(cursor).expect("flush");
        assert_eq!(
            sink.journal(),
            &[
                EnumSinkOp::CreateSheet("S".to_string()),
                EnumSinkOp::OpenCursor("S".to_string()),
                EnumSinkOp::FlushCursor("S".to_string()),
            ]
        );
    }

    #[test]
    fn test_merge_on_current_row_blanks_covered_cells_at_once() {
        let mut sink = MemorySink::new();
        let n_style = sink.add_style(&SpecCellFormat::default()).expect("style");
        sink.create_sheet("S").expect("create");
        let mut cursor = sink.new_append_cursor("S").expect("cursor");

        sink.append_row(
            &mut cursor,
            1,
            &[SpecCell::new("a").with_style(n_style), SpecCell::new("b")],
            &[],
        )
        .expect("row 1");
        let range = SpecMergeSpan::horizontal(1, 2).unwrap().resolve(1).unwrap();
        sink.append_merge(&mut cursor, range).expect("merge");

        let sheet = sink.sheet("S").unwrap();
        assert_eq!(sheet.merges, vec![range]);
        assert_eq!(sheet.cell(1, 1), Some(&SpecCell::new("a").with_style(n_style)));
        assert_eq!(
            sheet.cell(1, 2),
            Some(&SpecCell::new(None::<i64>).with_style(n_style))
        );
        sink.flush_cursor(cursor).expect("flush");
    }

    #[test]
    fn test_merge_below_cursor_applies_before_its_row() {
        let mut sink = MemorySink::new();
        sink.create_sheet("S").expect("create");
        let mut cursor = sink.new_append_cursor("S").expect("cursor");

        sink.append_row(&mut cursor, 1, &[SpecCell::new("a")], &[])
            .expect("row 1");
        let range = SpecMergeSpan::new(1, 1, 2, 2).unwrap().resolve(1).unwrap();
        sink.append_merge(&mut cursor, range).expect("merge");
        assert!(sink.sheet("S").unwrap().merges.is_empty());

        sink.append_row(&mut cursor, 2, &[SpecCell::new("x")], &[])
            .expect("row 2");
        let sheet = sink.sheet("S").unwrap();
        assert_eq!(sheet.merges, vec![range]);
        assert_eq!(sheet.cell(2, 1), Some(&SpecCell::new("x")));
        assert_eq!(sheet.cell(3, 2), Some(&SpecCell::default()));

        let range_above = SpecMergeSpan::horizontal(3, 4).unwrap().resolve(1).unwrap();
        assert!(matches!(
            sink.append_merge(&mut cursor, range_above),
            Err(SinkError::Cursor(_))
        ));
        sink.flush_cursor(cursor).expect("flush");
    }

    #[test]
    fn test_buffered_merge_keeps_only_anchor() {
        let mut sink = MemorySink::new();
        sink.create_sheet("S").expect("create");
        sink.write_cell("S", coord(1, 1), &SpecCell::new("a")).unwrap();
        sink.write_cell("S", coord(1, 2), &SpecCell::new("b")).unwrap();
        sink.write_cell("S", coord(2, 1), &SpecCell::new("c")).unwrap();

        let range = SpecMergeSpan::horizontal(1, 2).unwrap().resolve(1).unwrap();
        sink.merge_cells("S", range, Some(&SpecCell::new("a")))
            .expect("merge");
        let range = SpecMergeSpan::horizontal(1, 2).unwrap().resolve(2).unwrap();
        sink.merge_cells("S", range, None).expect("merge");

        let sheet = sink.sheet("S").unwrap();
        assert_eq!(sheet.cell(1, 1), Some(&SpecCell::new("a")));
        assert_eq!(sheet.cell(1, 2), Some(&SpecCell::default()));
        assert_eq!(sheet.cell(2, 1), Some(&SpecCell::default()));
    }

    #[test]
    fn test_memory_sheet_row_counters() {
        let mut sink = MemorySink::new();
        sink.create_sheet("S").expect("create");
        sink.write_cell("S", coord(1, 1), &SpecCell::new(1i64)).unwrap();
        sink.write_cell("S", coord(1, 2), &SpecCell::new(2i64)).unwrap();
        sink.write_cell("S", coord(3, 1), &SpecCell::new(3i64)).unwrap();
        let sheet = sink.sheet("S").unwrap();
        assert_eq!(sheet.count_rows(), 2);
        assert_eq!(sheet.max_row(), 3);
    }
}
