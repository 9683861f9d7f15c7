//! `rust_xlsxwriter`-backed document sink.
//!
//! Worksheets are materialized lazily: a created sheet stays pending until
//! the first write decides whether it is a standard worksheet (buffered
//! writes) or a constant-memory worksheet (append cursor). The workbook is
//! held in memory until [`XlsxSink::save`].

use std::path::Path;

use rust_xlsxwriter::{Format, FormatAlign, FormatBorder, Formula, Workbook, Worksheet};

use crate::conf::{C_NUM_FORMAT_DATETIME_DEFAULT, C_SHEET_NAME_PLACEHOLDER};
use crate::error::SinkError;
use crate::sink::{SpecAppendCursor, XlsxSink};
use crate::spec::{
    EnumCellValue, SpecCell, SpecCellCoord, SpecCellFormat, SpecCellRange, SpecRowOptions,
};
use crate::util::validate_sheet_name;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum EnumWorksheetKind {
    Standard,
    ConstantMemory,
}

/// Resolved formats of one style handle.
#[derive(Debug, Clone)]
struct SpecStyleFormats {
    fmt: Format,
    /// Same style with a datetime number format when the style has none.
    fmt_datetime: Format,
}

impl SpecStyleFormats {
    fn new(spec: &SpecCellFormat) -> Self {
        let spec_datetime = if spec.num_format.is_some() {
            spec.clone()
        } else {
            spec.with_(SpecCellFormat {
                num_format: Some(C_NUM_FORMAT_DATETIME_DEFAULT.to_string()),
                ..Default::default()
            })
        };
        Self {
            fmt: derive_rust_xlsx_format(spec),
            fmt_datetime: derive_rust_xlsx_format(&spec_datetime),
        }
    }

    fn select(&self, value: &EnumCellValue) -> &Format {
        match value {
            EnumCellValue::DateTime(_) => &self.fmt_datetime,
            _ => &self.fmt,
        }
    }
}

/// Streaming state of the sheet with an open append cursor.
#[derive(Debug)]
struct SpecStreamState {
    sheet_name: String,
    /// Cells of the last appended row; anchors of merges starting on it.
    l_cells_row_last: Vec<SpecCell>,
}

/// Document sink writing a real `.xlsx` workbook.
///
/// The default `Sheet1` of a fresh document is virtual: it counts as a sheet
/// until deleted or claimed by name, and is only materialized on save when
/// it is still present. Only that placeholder can be deleted.
pub struct RustXlsxSink {
    workbook: Workbook,
    l_styles: Vec<SpecStyleFormats>,
    fmt_default: SpecStyleFormats,
    l_sheet_names: Vec<String>,
    c_sheet_pending: Option<String>,
    if_placeholder: bool,
    stream: Option<SpecStreamState>,
}

impl Default for RustXlsxSink {
    fn default() -> Self {
        Self::new()
    }
}

impl RustXlsxSink {
    /// Empty workbook with the virtual placeholder sheet.
    pub fn new() -> Self {
        Self {
            workbook: Workbook::new(),
            l_styles: vec![],
            fmt_default: SpecStyleFormats::new(&SpecCellFormat::default()),
            l_sheet_names: vec![],
            c_sheet_pending: None,
            if_placeholder: true,
            stream: None,
        }
    }

    /// Names of created sheets in document order.
    pub fn sheet_names(&self) -> &[String] {
        &self.l_sheet_names
    }

    fn validate_known_sheet(&self, name: &str) -> Result<(), SinkError> {
        if self.l_sheet_names.iter().any(|c_name| c_name == name) {
            Ok(())
        } else {
            Err(SinkError::SheetNotFound(name.to_string()))
        }
    }

    fn validate_random_access(&self, name: &str) -> Result<(), SinkError> {
        self.validate_known_sheet(name)?;
        if let Some(stream) = &self.stream
            && stream.sheet_name == name
        {
            return Err(SinkError::Cursor(format!(
                "sheet {name:?} has an open append cursor"
            )));
        }
        Ok(())
    }

    /// Turn the pending sheet into a real worksheet of `kind`.
    fn materialize_pending(&mut self, kind: EnumWorksheetKind) -> Result<(), SinkError> {
        let Some(c_name) = self.c_sheet_pending.take() else {
            return Ok(());
        };
        let worksheet = match kind {
            EnumWorksheetKind::Standard => self.workbook.add_worksheet(),
            EnumWorksheetKind::ConstantMemory => self.workbook.add_worksheet_with_constant_memory(),
        };
        worksheet.set_name(&c_name)?;
        log::trace!("materialized worksheet {c_name:?} as {kind:?}");
        Ok(())
    }

    /// Materialize `name` as a standard worksheet if it is still pending.
    fn materialize_for_random_access(&mut self, name: &str) -> Result<(), SinkError> {
        if self.c_sheet_pending.as_deref() == Some(name) {
            self.materialize_pending(EnumWorksheetKind::Standard)?;
        }
        Ok(())
    }

    fn select_style(&self, style: Option<u32>) -> Result<&SpecStyleFormats, SinkError> {
        select_style(&self.l_styles, &self.fmt_default, style)
    }

    fn validate_style(&self, style: Option<u32>) -> Result<(), SinkError> {
        self.select_style(style).map(|_| ())
    }
}

impl XlsxSink for RustXlsxSink {
    fn add_style(&mut self, format: &SpecCellFormat) -> Result<u32, SinkError> {
        self.l_styles.push(SpecStyleFormats::new(format));
        Ok(self.l_styles.len() as u32)
    }

    fn create_sheet(&mut self, name: &str) -> Result<(), SinkError> {
        validate_sheet_name(name)?;
        if self.l_sheet_names.iter().any(|c_name| c_name == name) {
            return Err(SinkError::DuplicateSheetName(name.to_string()));
        }
        if self.if_placeholder && name == C_SHEET_NAME_PLACEHOLDER {
            self.if_placeholder = false;
        }
        self.materialize_pending(EnumWorksheetKind::Standard)?;
        self.c_sheet_pending = Some(name.to_string());
        self.l_sheet_names.push(name.to_string());
        Ok(())
    }

    fn delete_sheet(&mut self, name: &str) -> Result<(), SinkError> {
        if self.if_placeholder && name == C_SHEET_NAME_PLACEHOLDER {
            self.if_placeholder = false;
            return Ok(());
        }
        self.validate_known_sheet(name)?;
        Err(SinkError::Unsupported(format!(
            "worksheet {name:?} cannot be removed once created"
        )))
    }

    fn count_sheets(&self) -> usize {
        self.l_sheet_names.len() + usize::from(self.if_placeholder)
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
        self.validate_style(cell.style)?;
        self.materialize_for_random_access(sheet)?;

        let format = select_style(&self.l_styles, &self.fmt_default, cell.style)?;
        let worksheet = self.workbook.worksheet_from_name(sheet)?;
        write_cell_with_format(worksheet, coord.row - 1, coord.col - 1, cell, format)
    }

    fn merge_cells(
        &mut self,
        sheet: &str,
        range: SpecCellRange,
        anchor: Option<&SpecCell>,
    ) -> Result<(), SinkError> {
        self.validate_random_access(sheet)?;
        self.materialize_for_random_access(sheet)?;

        let worksheet = self.workbook.worksheet_from_name(sheet)?;
        merge_range_with_anchor(worksheet, range, anchor, &self.l_styles, &self.fmt_default)
    }

    fn set_column_width(
        &mut self,
        sheet: &str,
        col_first: u16,
        col_last: u16,
        width: f64,
    ) -> Result<(), SinkError> {
        self.validate_known_sheet(sheet)?;
        if col_first == 0 || col_first > col_last {
            return Err(SinkError::InvalidRange(format!(
                "columns {col_first}..{col_last}"
            )));
        }
        self.materialize_for_random_access(sheet)?;

        let worksheet = self.workbook.worksheet_from_name(sheet)?;
        for n_col in col_first..=col_last {
            worksheet.set_column_width(n_col - 1, width)?;
        }
        Ok(())
    }

    fn new_append_cursor(&mut self, sheet: &str) -> Result<SpecAppendCursor, SinkError> {
        self.validate_known_sheet(sheet)?;
        if let Some(stream) = &self.stream {
            return Err(SinkError::Cursor(format!(
                "cursor on sheet {:?} must be flushed before opening another",
                stream.sheet_name
            )));
        }
        if self.c_sheet_pending.as_deref() != Some(sheet) {
            return Err(SinkError::Cursor(format!(
                "sheet {sheet:?} already holds content; append cursors need a fresh sheet"
            )));
        }
        self.materialize_pending(EnumWorksheetKind::ConstantMemory)?;
        self.stream = Some(SpecStreamState {
            sheet_name: sheet.to_string(),
            l_cells_row_last: vec![],
        });
        Ok(SpecAppendCursor::new(sheet))
    }

    fn append_row(
        &mut self,
        cursor: &mut SpecAppendCursor,
        n_row: u32,
        cells: &[SpecCell],
        options: &[SpecRowOptions],
    ) -> Result<(), SinkError> {
        let Some(stream) = self
            .stream
            .as_mut()
            .filter(|stream| stream.sheet_name == cursor.sheet_name())
        else {
            return Err(SinkError::Cursor(format!(
                "cursor on sheet {:?} is not open",
                cursor.sheet_name()
            )));
        };
        for cell in cells {
            select_style(&self.l_styles, &self.fmt_default, cell.style)?;
        }
        for opts in options {
            select_style(&self.l_styles, &self.fmt_default, opts.style)?;
        }
        cursor.advance_to(n_row)?;

        let worksheet = self.workbook.worksheet_from_name(&stream.sheet_name)?;
        for range in cursor.take_merges_through(n_row) {
            merge_range_with_anchor(worksheet, range, None, &self.l_styles, &self.fmt_default)?;
        }
        let n_row_0 = n_row - 1;
        for opts in options {
            if let Some(n_height) = opts.height {
                worksheet.set_row_height(n_row_0, n_height)?;
            }
            if opts.hidden {
                worksheet.set_row_hidden(n_row_0)?;
            }
            if opts.style.is_some_and(|n_style| n_style > 0) {
                let format = select_style(&self.l_styles, &self.fmt_default, opts.style)?;
                worksheet.set_row_format(n_row_0, &format.fmt)?;
            }
        }
        for (n_idx, cell) in cells.iter().enumerate() {
            let n_col_0 = cast_col_num(n_idx)?;
            let format = select_style(&self.l_styles, &self.fmt_default, cell.style)?;
            write_cell_with_format(worksheet, n_row_0, n_col_0, cell, format)?;
        }
        stream.l_cells_row_last = cells.to_vec();
        Ok(())
    }

    fn append_merge(
        &mut self,
        cursor: &mut SpecAppendCursor,
        range: SpecCellRange,
    ) -> Result<(), SinkError> {
        let Some(stream) = self
            .stream
            .as_ref()
            .filter(|stream| stream.sheet_name == cursor.sheet_name())
        else {
            return Err(SinkError::Cursor(format!(
                "cursor on sheet {:?} is not open",
                cursor.sheet_name()
            )));
        };
        let Some(range) = cursor.route_merge(range)? else {
            return Ok(());
        };
        // The row is still current, so covered rows below go to the write-ahead buffer.
        let anchor = stream.l_cells_row_last.get(range.first.col as usize - 1);
        let worksheet = self.workbook.worksheet_from_name(&stream.sheet_name)?;
        merge_range_with_anchor(worksheet, range, anchor, &self.l_styles, &self.fmt_default)
    }

    fn flush_cursor(&mut self, mut cursor: SpecAppendCursor) -> Result<(), SinkError> {
        let Some(stream) = self
            .stream
            .take_if(|stream| stream.sheet_name == cursor.sheet_name())
        else {
            return Err(SinkError::Cursor(format!(
                "cursor on sheet {:?} is not open",
                cursor.sheet_name()
            )));
        };

        let worksheet = self.workbook.worksheet_from_name(&stream.sheet_name)?;
        for range in cursor.take_merges() {
            merge_range_with_anchor(worksheet, range, None, &self.l_styles, &self.fmt_default)?;
        }
        log::trace!(
            "flushed append cursor on {:?} at row {:?}",
            stream.sheet_name,
            cursor.last_row()
        );
        Ok(())
    }

    fn save(&mut self, path: &Path) -> Result<(), SinkError> {
        if let Some(stream) = &self.stream {
            return Err(SinkError::Cursor(format!(
                "cursor on sheet {:?} was never flushed",
                stream.sheet_name
            )));
        }
        self.materialize_pending(EnumWorksheetKind::Standard)?;
        if self.if_placeholder && !self.l_sheet_names.is_empty() {
            self.workbook
                .add_worksheet()
                .set_name(C_SHEET_NAME_PLACEHOLDER)?;
        }
        self.workbook.save(path)?;
        Ok(())
    }
}

impl std::fmt::Debug for RustXlsxSink {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RustXlsxSink")
            .field("n_styles", &self.l_styles.len())
            .field("l_sheet_names", &self.l_sheet_names)
            .field("c_sheet_pending", &self.c_sheet_pending)
            .field("if_placeholder", &self.if_placeholder)
            .finish_non_exhaustive()
    }
}

////////////////////////////////////////////////////////////////////////////////
// #region CellWriting

fn select_style<'a>(
    l_styles: &'a [SpecStyleFormats],
    fmt_default: &'a SpecStyleFormats,
    style: Option<u32>,
) -> Result<&'a SpecStyleFormats, SinkError> {
    match style.filter(|&n_style| n_style > 0) {
        None => Ok(fmt_default),
        Some(n_style) => l_styles
            .get(n_style as usize - 1)
            .ok_or(SinkError::UnknownStyle(n_style)),
    }
}

fn write_cell_with_format(
    worksheet: &mut Worksheet,
    n_row: u32,
    n_col: u16,
    cell: &SpecCell,
    formats: &SpecStyleFormats,
) -> Result<(), SinkError> {
    let format = formats.select(&cell.value);
    if let Some(c_formula) = cell.formula_text() {
        let formula = Formula::new(c_formula).set_result(cell.value.to_display_text());
        worksheet.write_formula_with_format(n_row, n_col, formula, format)?;
        return Ok(());
    }

    match &cell.value {
        EnumCellValue::None => {
            worksheet.write_blank(n_row, n_col, format)?;
        }
        EnumCellValue::String(val) => {
            worksheet.write_string_with_format(n_row, n_col, val, format)?;
        }
        EnumCellValue::Number(val) => {
            worksheet.write_number_with_format(n_row, n_col, *val, format)?;
        }
        EnumCellValue::Integer(val) => {
            worksheet.write_number_with_format(n_row, n_col, *val as f64, format)?;
        }
        EnumCellValue::Boolean(val) => {
            worksheet.write_boolean_with_format(n_row, n_col, *val, format)?;
        }
        EnumCellValue::DateTime(val) => {
            worksheet.write_datetime_with_format(n_row, n_col, val, format)?;
        }
    }
    Ok(())
}

/// Merge `range`, then restore the anchor content `merge_range` overwrote.
fn merge_range_with_anchor(
    worksheet: &mut Worksheet,
    range: SpecCellRange,
    anchor: Option<&SpecCell>,
    l_styles: &[SpecStyleFormats],
    fmt_default: &SpecStyleFormats,
) -> Result<(), SinkError> {
    let formats = select_style(l_styles, fmt_default, anchor.and_then(|cell| cell.style))?;
    let (n_row_first, n_col_first) = (range.first.row - 1, range.first.col - 1);
    worksheet.merge_range(
        n_row_first,
        n_col_first,
        range.last.row - 1,
        range.last.col - 1,
        "",
        &formats.fmt,
    )?;
    if let Some(cell) = anchor {
        write_cell_with_format(worksheet, n_row_first, n_col_first, cell, formats)?;
    }
    Ok(())
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
// #region FormatConversion

fn derive_rust_xlsx_format(spec: &SpecCellFormat) -> Format {
    let mut format = Format::new();

    if let Some(val) = &spec.font_name {
        format = format.set_font_name(val.clone());
    }
    if let Some(val) = spec.font_size {
        format = format.set_font_size(val as f64);
    }
    if spec.bold.unwrap_or(false) {
        format = format.set_bold();
    }
    if spec.italic.unwrap_or(false) {
        format = format.set_italic();
    }

    if let Some(val) = &spec.align
        && let Some(align) = derive_format_align(val)
    {
        format = format.set_align(align);
    }
    if let Some(val) = &spec.valign
        && let Some(align) = derive_format_align(val)
    {
        format = format.set_align(align);
    }

    if let Some(val) = &spec.num_format {
        format = format.set_num_format(val.clone());
    }
    if let Some(val) = &spec.bg_color {
        format = format.set_background_color(val.as_str());
    }
    if let Some(val) = &spec.font_color {
        format = format.set_font_color(val.as_str());
    }

    if let Some(val) = spec.border {
        format = format.set_border(derive_format_border(val));
    }
    if let Some(val) = spec.top {
        format = format.set_border_top(derive_format_border(val));
    }
    if let Some(val) = spec.bottom {
        format = format.set_border_bottom(derive_format_border(val));
    }
    if let Some(val) = spec.left {
        format = format.set_border_left(derive_format_border(val));
    }
    if let Some(val) = spec.right {
        format = format.set_border_right(derive_format_border(val));
    }

    if spec.text_wrap.unwrap_or(false) {
        format = format.set_text_wrap();
    }

    format
}

fn derive_format_border(border: i64) -> FormatBorder {
    match border {
        1 => FormatBorder::Thin,
        2 => FormatBorder::Medium,
        3 => FormatBorder::Dashed,
        4 => FormatBorder::Dotted,
        5 => FormatBorder::Thick,
        6 => FormatBorder::Double,
        7 => FormatBorder::Hair,
        8 => FormatBorder::MediumDashed,
        9 => FormatBorder::DashDot,
        10 => FormatBorder::MediumDashDot,
        11 => FormatBorder::DashDotDot,
        12 => FormatBorder::MediumDashDotDot,
        13 => FormatBorder::SlantDashDot,
        _ => FormatBorder::None,
    }
}

fn derive_format_align(align: &str) -> Option<FormatAlign> {
    match align.trim().to_ascii_lowercase().as_str() {
        "general" => Some(FormatAlign::General),
        "left" => Some(FormatAlign::Left),
        "center" => Some(FormatAlign::Center),
        "right" => Some(FormatAlign::Right),
        "fill" => Some(FormatAlign::Fill),
        "justify" => Some(FormatAlign::Justify),
        "center_across" => Some(FormatAlign::CenterAcross),
        "distributed" => Some(FormatAlign::Distributed),
        "top" => Some(FormatAlign::Top),
        "bottom" => Some(FormatAlign::Bottom),
        "vcenter" | "vertical_center" => Some(FormatAlign::VerticalCenter),
        "vjustify" | "vertical_justify" => Some(FormatAlign::VerticalJustify),
        "vdistributed" | "vertical_distributed" => Some(FormatAlign::VerticalDistributed),
        _ => None,
    }
}

fn cast_col_num(n_idx: usize) -> Result<u16, SinkError> {
    u16::try_from(n_idx).map_err(|_| SinkError::InvalidCoordinate {
        row: 0,
        col: u16::MAX,
    })
}

// #endregion
////////////////////////////////////////////////////////////////////////////////

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;
    use std::io::Read;

    use pretty_assertions::assert_eq;
    use quick_xml::Reader;
    use quick_xml::events::Event;
    use zip::ZipArchive;

    use super::*;
    use crate::spec::{EnumWriteMode, SpecMergeSpan, SpecRow};
    use crate::writer::{EnumSheetWriter, SheetWriter};

    fn coord(row: u32, col: u16) -> SpecCellCoord {
        SpecCellCoord::new(row, col).expect("coord")
    }

    #[test]
    fn test_placeholder_is_virtual_and_deletable_once() {
        let mut sink = RustXlsxSink::new();
        assert_eq!(sink.count_sheets(), 1);
        sink.create_sheet("Data").expect("create");
        assert_eq!(sink.count_sheets(), 2);

        sink.delete_sheet("Sheet1").expect("delete placeholder");
        assert_eq!(sink.count_sheets(), 1);
        assert_eq!(sink.placeholder_sheet_name(), None);

        assert!(matches!(
            sink.delete_sheet("Data"),
            Err(SinkError::Unsupported(_))
        ));
        assert!(matches!(
            sink.delete_sheet("Missing"),
            Err(SinkError::SheetNotFound(_))
        ));
    }

    #[test]
    fn test_creating_placeholder_name_claims_it() {
        let mut sink = RustXlsxSink::new();
        sink.create_sheet("Sheet1").expect("create");
        assert_eq!(sink.count_sheets(), 1);
        assert_eq!(sink.placeholder_sheet_name(), None);
    }

    #[test]
    fn test_write_cell_rejects_unknown_style_and_sheet() {
        let mut sink = RustXlsxSink::new();
        sink.create_sheet("Data").expect("create");
        assert!(matches!(
            sink.write_cell("Data", coord(1, 1), &SpecCell::new("x").with_style(3)),
            Err(SinkError::UnknownStyle(3))
        ));
        assert!(matches!(
            sink.write_cell("Nope", coord(1, 1), &SpecCell::new("x")),
            Err(SinkError::SheetNotFound(_))
        ));
    }

    #[test]
    fn test_append_cursor_needs_fresh_sheet() {
        let mut sink = RustXlsxSink::new();
        sink.create_sheet("A").expect("create");
        sink.write_cell("A", coord(1, 1), &SpecCell::new("x")).expect("write");
        assert!(matches!(
            sink.new_append_cursor("A"),
            Err(SinkError::Cursor(_))
        ));

        sink.create_sheet("B").expect("create");
        let mut cursor = sink.new_append_cursor("B").expect("cursor");
        sink.append_row(&mut cursor, 2, &[SpecCell::new("b")], &[])
            .expect("row 2");
        assert!(matches!(
            sink.append_row(&mut cursor, 2, &[SpecCell::new("c")], &[]),
            Err(SinkError::Cursor(_))
        ));
        assert!(matches!(
            sink.write_cell("B", coord(9, 1), &SpecCell::new("x")),
            Err(SinkError::Cursor(_))
        ));
        sink.flush_cursor(cursor).expect("flush");
    }

    #[test]
    fn test_save_buffered_and_streaming_sheets() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("out.xlsx");

        let mut sink = RustXlsxSink::new();
        let n_style = sink
            .add_style(&SpecCellFormat {
                bold: Some(true),
                border: Some(1),
                ..Default::default()
            })
            .expect("style");

        sink.create_sheet("Buffered").expect("create");
        sink.delete_sheet("Sheet1").expect("delete placeholder");
        sink.write_cell("Buffered", coord(1, 1), &SpecCell::new("title").with_style(n_style))
            .expect("write");
        let range = SpecMergeSpan::horizontal(1, 3).unwrap().resolve(1).unwrap();
        sink.merge_cells("Buffered", range, Some(&SpecCell::new("title").with_style(n_style)))
            .expect("merge");
        sink.write_cell("Buffered", coord(2, 1), &SpecCell::new(2i64).with_formula("=1+1"))
            .expect("formula");
        sink.set_column_width("Buffered", 1, 3, 18.0).expect("width");

        sink.create_sheet("Streaming").expect("create");
        let mut cursor = sink.new_append_cursor("Streaming").expect("cursor");
        let options = [SpecRowOptions {
            height: Some(24.0),
            hidden: false,
            style: Some(n_style),
        }];
        sink.append_row(
            &mut cursor,
            1,
            &[SpecCell::new("a"), SpecCell::new(None::<i64>)],
            &options,
        )
        .expect("row");
        let range = SpecMergeSpan::horizontal(1, 2).unwrap().resolve(1).unwrap();
        sink.append_merge(&mut cursor, range).expect("merge");
        sink.flush_cursor(cursor).expect("flush");

        sink.save(&path).expect("save");
        let n_len = std::fs::metadata(&path).expect("metadata").len();
        assert!(n_len > 0);
    }

    /// Cell values (blanks left out) and merge refs of the first worksheet.
    fn read_first_sheet(path: &Path) -> (BTreeMap<String, String>, Vec<String>) {
        let file = std::fs::File::open(path).expect("open");
        let mut archive = ZipArchive::new(file).expect("zip");
        let read_entry = |archive: &mut ZipArchive<std::fs::File>, c_name: &str| {
            let mut c_xml = String::new();
            if let Ok(mut entry) = archive.by_name(c_name) {
                entry.read_to_string(&mut c_xml).expect("read entry");
            }
            c_xml
        };

        let mut l_shared = vec![];
        let c_xml_shared = read_entry(&mut archive, "xl/sharedStrings.xml");
        let mut reader = Reader::from_str(&c_xml_shared);
        let mut if_in_text = false;
        loop {
            match reader.read_event().expect("xml") {
                Event::Start(e) if e.name().as_ref() == b"si" => l_shared.push(String::new()),
                Event::Start(e) if e.name().as_ref() == b"t" => if_in_text = true,
                Event::End(e) if e.name().as_ref() == b"t" => if_in_text = false,
                Event::Text(text) if if_in_text => {
                    if let Some(c_shared) = l_shared.last_mut() {
                        c_shared.push_str(&text.decode().expect("text"));
                    }
                }
                Event::Eof => break,
                _ => {}
            }
        }

        let c_xml_sheet = read_entry(&mut archive, "xl/worksheets/sheet1.xml");
        let mut reader = Reader::from_str(&c_xml_sheet);
        let mut dict_values = BTreeMap::new();
        let mut l_merges = vec![];
        let (mut c_ref, mut c_type, mut c_value) = (String::new(), String::new(), String::new());
        let mut if_in_value = false;
        loop {
            match reader.read_event().expect("xml") {
                Event::Start(e) if e.name().as_ref() == b"c" => {
                    (c_ref, c_type, c_value) = (String::new(), String::new(), String::new());
                    for attr in e.attributes().flatten() {
                        match attr.key.as_ref() {
                            b"r" => c_ref = String::from_utf8_lossy(&attr.value).to_string(),
                            b"t" => c_type = String::from_utf8_lossy(&attr.value).to_string(),
                            _ => {}
                        }
                    }
                }
                Event::Start(e) if matches!(e.name().as_ref(), b"v" | b"t") => {
                    if_in_value = true;
                }
                Event::Text(text) if if_in_value => {
                    c_value.push_str(&text.decode().expect("text"));
                }
                Event::End(e) if matches!(e.name().as_ref(), b"v" | b"t") => {
                    if_in_value = false;
                }
                Event::End(e) if e.name().as_ref() == b"c" => {
                    let c_text = if c_type == "s" {
                        let n_idx: usize = c_value.parse().expect("shared string index");
                        l_shared[n_idx].clone()
                    } else {
                        c_value.clone()
                    };
                    dict_values.insert(c_ref.clone(), c_text);
                }
                Event::Empty(e) | Event::Start(e) if e.name().as_ref() == b"mergeCell" => {
                    for attr in e.attributes().flatten() {
                        if attr.key.as_ref() == b"ref" {
                            l_merges.push(String::from_utf8_lossy(&attr.value).to_string());
                        }
                    }
                }
                Event::Eof => break,
                _ => {}
            }
        }
        l_merges.sort();
        (dict_values, l_merges)
    }

    fn save_merged_rows(mode: EnumWriteMode, path: &Path) {
        let l_rows: Vec<SpecRow> = vec![
            crate::row!["a", "b"].with_merge(SpecMergeSpan::from_a1("A1:B1").unwrap()),
            crate::row!["c", "d"],
            crate::row!["e", "f"].with_merge(SpecMergeSpan::new(0, 1, 1, 1).unwrap()),
            crate::row!["g", "h"].with_merge(SpecMergeSpan::new(1, 2, 1, 3).unwrap()),
        ];
        let mut sink = RustXlsxSink::new();
        sink.create_sheet("S").expect("create");
        sink.delete_sheet("Sheet1").expect("delete placeholder");
        let mut writer = EnumSheetWriter::new(mode);
        writer.init(&mut sink, "S").expect("init");
        for (n_idx, row) in l_rows.iter().enumerate() {
            writer
                .write_row(&mut sink, "S", n_idx as u32 + 1, row)
                .expect("write row");
        }
        SheetWriter::<RustXlsxSink>::finalize(&mut writer, &mut sink).expect("finalize");
        sink.save(path).expect("save");
    }

    #[test]
    fn test_buffered_and_streaming_workbooks_hold_same_cells() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path_buffered = dir.path().join("buffered.xlsx");
        let path_streaming = dir.path().join("streaming.xlsx");
        save_merged_rows(EnumWriteMode::Buffered, &path_buffered);
        save_merged_rows(EnumWriteMode::Streaming, &path_streaming);

        let (dict_buffered, l_merges_buffered) = read_first_sheet(&path_buffered);
        let (dict_streaming, l_merges_streaming) = read_first_sheet(&path_streaming);
        assert_eq!(dict_buffered, dict_streaming);
        assert_eq!(l_merges_buffered, l_merges_streaming);

        let dict_expected: BTreeMap<String, String> = [
            ("A1", "a"),
            ("A2", "c"),
            ("B2", "d"),
            ("A3", "e"),
            ("B3", "f"),
            ("A4", "g"),
            ("B4", "h"),
        ]
        .into_iter()
        .map(|(c_ref, c_val)| (c_ref.to_string(), c_val.to_string()))
        .collect();
        assert_eq!(dict_streaming, dict_expected);
        assert_eq!(l_merges_streaming, vec!["A1:B1", "A3:A4", "B5:C5"]);
    }

    #[test]
    fn test_streaming_merge_above_cursor_is_rejected() {
        let mut sink = RustXlsxSink::new();
        sink.create_sheet("S").expect("create");
        let mut cursor = sink.new_append_cursor("S").expect("cursor");
        sink.append_row(&mut cursor, 1, &[SpecCell::new("a")], &[])
            .expect("row 1");
        sink.append_row(&mut cursor, 2, &[SpecCell::new("b")], &[])
            .expect("row 2");
        let range = SpecMergeSpan::horizontal(1, 2).unwrap().resolve(1).unwrap();
        assert!(matches!(
            sink.append_merge(&mut cursor, range),
            Err(SinkError::Cursor(_))
        ));
        sink.flush_cursor(cursor).expect("flush");
    }

    #[test]
    fn test_format_helpers() {
        assert!(matches!(derive_format_border(0), FormatBorder::None));
        assert!(matches!(derive_format_border(5), FormatBorder::Thick));
        assert!(matches!(
            derive_format_align(" VCenter "),
            Some(FormatAlign::VerticalCenter)
        ));
        assert!(derive_format_align("sideways").is_none());
    }
}
