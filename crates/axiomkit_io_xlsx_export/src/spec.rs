//! Shared XLSX export models: cells, rows, merges, sheet definitions, options.

use chrono::NaiveDateTime;

use crate::conf::{N_NCOLS_EXCEL_MAX, N_NROWS_EXCEL_MAX};
use crate::error::SinkError;
use crate::producer::RowProducer;
use crate::util::{convert_coord_to_cell_name, parse_cell_name};

////////////////////////////////////////////////////////////////////////////////
// #region CellFormatSpecification

/// Cell format specification registered in a sink's style table.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct SpecCellFormat {
    /// Font family name.
    pub font_name: Option<String>,
    /// Font size in points.
    pub font_size: Option<i64>,
    /// Bold style.
    pub bold: Option<bool>,
    /// Italic style.
    pub italic: Option<bool>,

    /// Horizontal alignment.
    pub align: Option<String>,
    /// Vertical alignment.
    pub valign: Option<String>,
    /// Border style for all sides.
    pub border: Option<i64>,
    /// Text wrap.
    pub text_wrap: Option<bool>,

    /// Top border override.
    pub top: Option<i64>,
    /// Bottom border override.
    pub bottom: Option<i64>,
    /// Left border override.
    pub left: Option<i64>,
    /// Right border override.
    pub right: Option<i64>,

    /// Number format code.
    pub num_format: Option<String>,
    /// Background fill color.
    pub bg_color: Option<String>,
    /// Font color.
    pub font_color: Option<String>,
}

impl SpecCellFormat {
    /// Return a new format by overlaying `patch` onto `self`.
    pub fn with_(&self, patch: SpecCellFormat) -> SpecCellFormat {
        self.merge(&patch)
    }

    /// Merge two formats with right-side non-`None` overwrite semantics.
    pub fn merge(&self, other: &SpecCellFormat) -> SpecCellFormat {
        SpecCellFormat {
            font_name: other.font_name.clone().or_else(|| self.font_name.clone()),
            font_size: other.font_size.or(self.font_size),
            bold: other.bold.or(self.bold),
            italic: other.italic.or(self.italic),
            align: other.align.clone().or_else(|| self.align.clone()),
            valign: other.valign.clone().or_else(|| self.valign.clone()),
            border: other.border.or(self.border),
            text_wrap: other.text_wrap.or(self.text_wrap),
            top: other.top.or(self.top),
            bottom: other.bottom.or(self.bottom),
            left: other.left.or(self.left),
            right: other.right.or(self.right),
            num_format: other.num_format.clone().or_else(|| self.num_format.clone()),
            bg_color: other.bg_color.clone().or_else(|| self.bg_color.clone()),
            font_color: other.font_color.clone().or_else(|| self.font_color.clone()),
        }
    }
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
// #region CellSpecification

/// Type-erased cell value passed through to the sink unchanged.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum EnumCellValue {
    /// Missing/blank value.
    #[default]
    None,
    /// Text value.
    String(String),
    /// Floating point value.
    Number(f64),
    /// Integer value.
    Integer(i64),
    /// Boolean value.
    Boolean(bool),
    /// Naive date-time value.
    DateTime(NaiveDateTime),
}

impl EnumCellValue {
    /// Display text of the value, used as cached formula result.
    pub fn to_display_text(&self) -> String {
        match self {
            Self::None => String::new(),
            Self::String(val) => val.clone(),
            Self::Number(val) => val.to_string(),
            Self::Integer(val) => val.to_string(),
            Self::Boolean(val) => if *val { "TRUE" } else { "FALSE" }.to_string(),
            Self::DateTime(val) => val.format("%Y-%m-%d %H:%M:%S").to_string(),
        }
    }
}

impl From<&str> for EnumCellValue {
    fn from(value: &str) -> Self {
        Self::String(value.to_string())
    }
}

impl From<String> for EnumCellValue {
    fn from(value: String) -> Self {
        Self::String(value)
    }
}

impl From<f64> for EnumCellValue {
    fn from(value: f64) -> Self {
        Self::Number(value)
    }
}

impl From<f32> for EnumCellValue {
    fn from(value: f32) -> Self {
        Self::Number(value as f64)
    }
}

impl From<i64> for EnumCellValue {
    fn from(value: i64) -> Self {
        Self::Integer(value)
    }
}

impl From<i32> for EnumCellValue {
    fn from(value: i32) -> Self {
        Self::Integer(value as i64)
    }
}

impl From<u32> for EnumCellValue {
    fn from(value: u32) -> Self {
        Self::Integer(value as i64)
    }
}

impl From<usize> for EnumCellValue {
    fn from(value: usize) -> Self {
        Self::Integer(value as i64)
    }
}

impl From<bool> for EnumCellValue {
    fn from(value: bool) -> Self {
        Self::Boolean(value)
    }
}

impl From<NaiveDateTime> for EnumCellValue {
    fn from(value: NaiveDateTime) -> Self {
        Self::DateTime(value)
    }
}

impl<T: Into<EnumCellValue>> From<Option<T>> for EnumCellValue {
    fn from(value: Option<T>) -> Self {
        value.map_or(Self::None, Into::into)
    }
}

/// One cell: value, optional style handle, optional formula.
///
/// When `formula` is set it drives the displayed content; `value` is still
/// recorded as the cached result for consumers that do not evaluate formulas.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct SpecCell {
    /// Literal value.
    pub value: EnumCellValue,
    /// Style handle returned by [`crate::sink::XlsxSink::add_style`]; `0` means no style.
    pub style: Option<u32>,
    /// Formula expression, with or without leading `=`.
    pub formula: Option<String>,
}

impl SpecCell {
    /// Create an unstyled cell holding `value`.
    pub fn new(value: impl Into<EnumCellValue>) -> Self {
        Self {
            value: value.into(),
            style: None,
            formula: None,
        }
    }

    /// Attach a style handle.
    pub fn with_style(mut self, style: u32) -> Self {
        self.style = Some(style);
        self
    }

    /// Attach a formula.
    pub fn with_formula(mut self, formula: impl Into<String>) -> Self {
        self.formula = Some(formula.into());
        self
    }

    /// Effective style handle (`None` for absent or `0`).
    pub fn style_id(&self) -> Option<u32> {
        self.style.filter(|&n_style| n_style > 0)
    }

    /// Formula if present and non-empty.
    pub fn formula_text(&self) -> Option<&str> {
        self.formula.as_deref().filter(|c_formula| !c_formula.is_empty())
    }
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
// #region CoordinateSpecification

/// Absolute 1-based cell coordinate inside one physical sheet.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SpecCellCoord {
    /// 1-based row index.
    pub row: u32,
    /// 1-based column index.
    pub col: u16,
}

impl SpecCellCoord {
    /// Build a coordinate, rejecting positions outside the Excel grid.
    pub fn new(row: u32, col: u16) -> Result<Self, SinkError> {
        if row == 0 || row as usize > N_NROWS_EXCEL_MAX || col == 0 || col as usize > N_NCOLS_EXCEL_MAX
        {
            return Err(SinkError::InvalidCoordinate { row, col });
        }
        Ok(Self { row, col })
    }

    /// A1-style name, e.g. `B3`.
    pub fn to_a1(&self) -> String {
        convert_coord_to_cell_name(self.row, self.col)
    }
}

/// Absolute rectangular range `first..=last`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SpecCellRange {
    /// Top-left corner.
    pub first: SpecCellCoord,
    /// Bottom-right corner.
    pub last: SpecCellCoord,
}

impl SpecCellRange {
    /// Build a range; `first` must not be right of or below `last`.
    pub fn new(first: SpecCellCoord, last: SpecCellCoord) -> Result<Self, SinkError> {
        if first.row > last.row || first.col > last.col {
            return Err(SinkError::InvalidRange(format!(
                "{}:{}",
                first.to_a1(),
                last.to_a1()
            )));
        }
        Ok(Self { first, last })
    }

    /// Whether the range covers exactly one cell.
    pub fn is_single_cell(&self) -> bool {
        self.first == self.last
    }

    /// Whether `coord` lies inside the range.
    pub fn contains(&self, coord: SpecCellCoord) -> bool {
        (self.first.row..=self.last.row).contains(&coord.row)
            && (self.first.col..=self.last.col).contains(&coord.col)
    }

    /// Whether two ranges share at least one cell.
    pub fn overlaps(&self, other: &SpecCellRange) -> bool {
        self.first.row <= other.last.row
            && other.first.row <= self.last.row
            && self.first.col <= other.last.col
            && other.first.col <= self.last.col
    }

    /// A1-style name, e.g. `A1:B2`.
    pub fn to_a1(&self) -> String {
        format!("{}:{}", self.first.to_a1(), self.last.to_a1())
    }
}

/// Merge region attached to a row.
///
/// A span built from A1 text ([`SpecMergeSpan::from_a1`]) holds absolute sheet
/// rows. A row-relative span ([`SpecMergeSpan::new`],
/// [`SpecMergeSpan::horizontal`], [`SpecMergeSpan::from_a1_relative`]) holds
/// offsets from the row that carries it (`0` = that row) and so stays valid
/// on overflow continuation sheets. Columns are 1-based in both cases.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SpecMergeSpan {
    if_absolute: bool,
    row_first: u32,
    col_first: u16,
    row_last: u32,
    col_last: u16,
}

impl SpecMergeSpan {
    /// Row-relative span from row offsets and 1-based columns.
    pub fn new(
        row_offset_first: u32,
        col_first: u16,
        row_offset_last: u32,
        col_last: u16,
    ) -> Result<Self, SinkError> {
        let c_desc = || {
            format!("rows +{row_offset_first}..+{row_offset_last}, cols {col_first}..{col_last}")
        };
        Self::validate_bounds(row_offset_first, col_first, row_offset_last, col_last, c_desc)?;
        Ok(Self {
            if_absolute: false,
            row_first: row_offset_first,
            col_first,
            row_last: row_offset_last,
            col_last,
        })
    }

    /// Horizontal span over `col_first..=col_last` of the owning row.
    pub fn horizontal(col_first: u16, col_last: u16) -> Result<Self, SinkError> {
        Self::new(0, col_first, 0, col_last)
    }

    /// Parse `A3:B3`-style text as absolute sheet coordinates.
    pub fn from_a1(range: &str) -> Result<Self, SinkError> {
        let ((n_row_first, n_col_first), (n_row_last, n_col_last)) = parse_range_name(range)?;
        Self::validate_bounds(n_row_first, n_col_first, n_row_last, n_col_last, || {
            range.to_string()
        })?;
        Ok(Self {
            if_absolute: true,
            row_first: n_row_first,
            col_first: n_col_first,
            row_last: n_row_last,
            col_last: n_col_last,
        })
    }

    /// Parse `A1:B1`-style text where row `1` denotes the owning row.
    pub fn from_a1_relative(range: &str) -> Result<Self, SinkError> {
        let ((n_row_first, n_col_first), (n_row_last, n_col_last)) = parse_range_name(range)?;
        Self::new(n_row_first - 1, n_col_first, n_row_last - 1, n_col_last)
    }

    fn validate_bounds(
        row_first: u32,
        col_first: u16,
        row_last: u32,
        col_last: u16,
        c_desc: impl Fn() -> String,
    ) -> Result<(), SinkError> {
        if col_first == 0 || col_last as usize > N_NCOLS_EXCEL_MAX {
            return Err(SinkError::InvalidRange(c_desc()));
        }
        if row_first > row_last || col_first > col_last {
            return Err(SinkError::InvalidRange(c_desc()));
        }
        if row_first == row_last && col_first == col_last {
            return Err(SinkError::InvalidRange(format!(
                "{}: a merge must cover more than one cell",
                c_desc()
            )));
        }
        Ok(())
    }

    /// Whether the rows are sheet rows rather than offsets.
    pub fn is_absolute(&self) -> bool {
        self.if_absolute
    }

    /// First column (1-based).
    pub fn col_first(&self) -> u16 {
        self.col_first
    }

    /// Resolve against the 1-based physical row the span belongs to.
    ///
    /// Absolute spans resolve to their own rows and must not start above
    /// `n_row`; rows already written cannot be merged by later rows.
    pub fn resolve(&self, n_row: u32) -> Result<SpecCellRange, SinkError> {
        let (n_row_first, n_row_last) = if self.if_absolute {
            (self.row_first, self.row_last)
        } else {
            let derive_row = |n_offset: u32| {
                n_row
                    .checked_add(n_offset)
                    .ok_or(SinkError::InvalidCoordinate {
                        row: u32::MAX,
                        col: self.col_last,
                    })
            };
            (derive_row(self.row_first)?, derive_row(self.row_last)?)
        };
        let first = SpecCellCoord::new(n_row_first, self.col_first)?;
        let last = SpecCellCoord::new(n_row_last, self.col_last)?;
        let range = SpecCellRange::new(first, last)?;
        if range.first.row < n_row {
            return Err(SinkError::InvalidRange(format!(
                "{} starts above its row {n_row}",
                range.to_a1()
            )));
        }
        Ok(range)
    }
}

fn parse_range_name(range: &str) -> Result<((u32, u16), (u32, u16)), SinkError> {
    let Some((c_first, c_last)) = range.split_once(':') else {
        return Err(SinkError::InvalidRange(range.to_string()));
    };
    Ok((parse_cell_name(c_first)?, parse_cell_name(c_last)?))
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
// #region RowSpecification

/// Row-level layout settings; honoured by the streaming writer only.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct SpecRowOptions {
    /// Row height in points.
    pub height: Option<f64>,
    /// Hide the row.
    pub hidden: bool,
    /// Default style handle for the whole row.
    pub style: Option<u32>,
}

/// One logical record: cells, merges and row options.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct SpecRow {
    /// Cells by column, column 1 first.
    pub cells: Vec<SpecCell>,
    /// Merge regions attached to this row.
    pub merges: Vec<SpecMergeSpan>,
    /// Row layout options.
    pub options: Vec<SpecRowOptions>,
}

impl SpecRow {
    /// Row made of `cells`, without merges or options.
    pub fn new(cells: Vec<SpecCell>) -> Self {
        Self {
            cells,
            merges: vec![],
            options: vec![],
        }
    }

    /// One unstyled cell per value, without merges or options.
    pub fn from_values<I, V>(values: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<EnumCellValue>,
    {
        Self::new(values.into_iter().map(SpecCell::new).collect())
    }

    /// Add a merge span.
    pub fn with_merge(mut self, merge: SpecMergeSpan) -> Self {
        self.merges.push(merge);
        self
    }

    /// Add row layout options.
    pub fn with_options(mut self, options: SpecRowOptions) -> Self {
        self.options.push(options);
        self
    }

    /// An empty cell sequence marks end of stream and is never written.
    pub fn is_sentinel(&self) -> bool {
        self.cells.is_empty()
    }
}

/// Build a [`SpecRow`] from heterogeneous values: `row!["a", 1, 2.5, true]`.
#[macro_export]
macro_rules! row {
    ($($value:expr),* $(,)?) => {
        $crate::spec::SpecRow::from_values(::std::vec![
            $($crate::spec::EnumCellValue::from($value)),*
        ])
    };
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
// #region ExportOptions

/// Write strategy used for every physical sheet of one export.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum EnumWriteMode {
    /// Random-access cell writes into the in-memory document (default).
    #[default]
    Buffered,
    /// Append-only row cursor per sheet; row options are honoured.
    Streaming,
}

/// Export-wide options.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpecXlsxExportOptions {
    /// Buffered or streaming sheet writes.
    pub write_mode: EnumWriteMode,
    /// Row capacity of one physical sheet before overflowing.
    pub n_rows_sheet_max: usize,
}

impl Default for SpecXlsxExportOptions {
    fn default() -> Self {
        Self {
            write_mode: EnumWriteMode::Buffered,
            n_rows_sheet_max: N_NROWS_EXCEL_MAX,
        }
    }
}

/// Column width applied to `col_first..=col_last` (1-based).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SpecColumnWidth {
    /// First column (1-based).
    pub col_first: u16,
    /// Last column (1-based).
    pub col_last: u16,
    /// Width in character units.
    pub width: f64,
}

/// A named sheet and the producer feeding it.
pub struct SpecSheetDefinition<'a> {
    /// Base sheet name; overflow segments append `_1`, `_2`, ...
    pub name: String,
    /// Row source, pulled until end of stream.
    pub producer: Box<dyn RowProducer + 'a>,
    /// Column widths applied on every physical segment.
    pub col_widths: Vec<SpecColumnWidth>,
}

impl<'a> SpecSheetDefinition<'a> {
    /// Bind `producer` to sheet `name`.
    pub fn new(name: impl Into<String>, producer: impl RowProducer + 'a) -> Self {
        Self {
            name: name.into(),
            producer: Box::new(producer),
            col_widths: vec![],
        }
    }

    /// Set the width of columns `col_first..=col_last`.
    pub fn with_column_width(mut self, col_first: u16, col_last: u16, width: f64) -> Self {
        self.col_widths.push(SpecColumnWidth {
            col_first,
            col_last,
            width,
        });
        self
    }
}

impl std::fmt::Debug for SpecSheetDefinition<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SpecSheetDefinition")
            .field("name", &self.name)
            .field("col_widths", &self.col_widths)
            .finish_non_exhaustive()
    }
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
