//! Per-sheet writers: buffered random-access writes or an append-only cursor.

use crate::error::SinkError;
use crate::sink::{SpecAppendCursor, XlsxSink};
use crate::spec::{EnumWriteMode, SpecCellCoord, SpecRow};

/// Writes the rows of one physical sheet into a sink.
///
/// Call order per sheet is `init`, any number of `write_row` with strictly
/// increasing 1-based rows, then `finalize`.
pub trait SheetWriter<S: XlsxSink> {
    /// Prepare writing into the freshly created sheet `sheet_name`.
    fn init(&mut self, sink: &mut S, sheet_name: &str) -> Result<(), SinkError>;

    /// Write cells from column 1, then the row's merge spans, at row `n_row`.
    fn write_row(
        &mut self,
        sink: &mut S,
        sheet_name: &str,
        n_row: u32,
        row: &SpecRow,
    ) -> Result<(), SinkError>;

    /// Complete the current sheet.
    fn finalize(&mut self, sink: &mut S) -> Result<(), SinkError>;

    /// Whether row options reach the sink.
    fn supports_row_options(&self) -> bool;
}

////////////////////////////////////////////////////////////////////////////////
// #region BufferedWriter

/// Random-access cell writes; row options are not applied.
#[derive(Debug, Default)]
pub struct BufferedSheetWriter;

impl<S: XlsxSink> SheetWriter<S> for BufferedSheetWriter {
    fn init(&mut self, _sink: &mut S, _sheet_name: &str) -> Result<(), SinkError> {
        Ok(())
    }

    fn write_row(
        &mut self,
        sink: &mut S,
        sheet_name: &str,
        n_row: u32,
        row: &SpecRow,
    ) -> Result<(), SinkError> {
        for (n_idx, cell) in row.cells.iter().enumerate() {
            let coord = SpecCellCoord::new(n_row, derive_col_num(n_row, n_idx)?)?;
            sink.write_cell(sheet_name, coord, cell)?;
        }
        for span in &row.merges {
            let range = span.resolve(n_row)?;
            let anchor = (range.first.row == n_row)
                .then(|| row.cells.get(range.first.col as usize - 1))
                .flatten();
            sink.merge_cells(sheet_name, range, anchor)?;
        }
        Ok(())
    }

    fn finalize(&mut self, _sink: &mut S) -> Result<(), SinkError> {
        Ok(())
    }

    fn supports_row_options(&self) -> bool {
        false
    }
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
// #region StreamingWriter

/// Append-only writes through a sink cursor; row options are honoured.
#[derive(Debug, Default)]
pub struct StreamingSheetWriter {
    cursor: Option<SpecAppendCursor>,
}

impl StreamingSheetWriter {
    /// Whether a cursor is open.
    pub fn is_open(&self) -> bool {
        self.cursor.is_some()
    }
}

impl<S: XlsxSink> SheetWriter<S> for StreamingSheetWriter {
    fn init(&mut self, sink: &mut S, sheet_name: &str) -> Result<(), SinkError> {
        if let Some(cursor) = &self.cursor {
            return Err(SinkError::Cursor(format!(
                "sheet {:?} must be finalized before initializing {sheet_name:?}",
                cursor.sheet_name()
            )));
        }
        self.cursor = Some(sink.new_append_cursor(sheet_name)?);
        Ok(())
    }

    fn write_row(
        &mut self,
        sink: &mut S,
        sheet_name: &str,
        n_row: u32,
        row: &SpecRow,
    ) -> Result<(), SinkError> {
        let Some(cursor) = self
            .cursor
            .as_mut()
            .filter(|cursor| cursor.sheet_name() == sheet_name)
        else {
            return Err(SinkError::Cursor(format!(
                "no open cursor for sheet {sheet_name:?}"
            )));
        };
        sink.append_row(cursor, n_row, &row.cells, &row.options)?;
        for span in &row.merges {
            sink.append_merge(cursor, span.resolve(n_row)?)?;
        }
        Ok(())
    }

    fn finalize(&mut self, sink: &mut S) -> Result<(), SinkError> {
        match self.cursor.take() {
            Some(cursor) => sink.flush_cursor(cursor),
            None => Ok(()),
        }
    }

    fn supports_row_options(&self) -> bool {
        true
    }
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
// #region WriterDispatch

/// Writer variant selected by [`EnumWriteMode`].
#[derive(Debug)]
pub enum EnumSheetWriter {
    /// See [`BufferedSheetWriter`].
    Buffered(BufferedSheetWriter),
    /// See [`StreamingSheetWriter`].
    Streaming(StreamingSheetWriter),
}

impl EnumSheetWriter {
    /// Writer for `mode`.
    pub fn new(mode: EnumWriteMode) -> Self {
        match mode {
            EnumWriteMode::Buffered => Self::Buffered(BufferedSheetWriter),
            EnumWriteMode::Streaming => Self::Streaming(StreamingSheetWriter::default()),
        }
    }

    /// Mode this writer was built for.
    pub fn write_mode(&self) -> EnumWriteMode {
        match self {
            Self::Buffered(_) => EnumWriteMode::Buffered,
            Self::Streaming(_) => EnumWriteMode::Streaming,
        }
    }
}

impl<S: XlsxSink> SheetWriter<S> for EnumSheetWriter {
    fn init(&mut self, sink: &mut S, sheet_name: &str) -> Result<(), SinkError> {
        match self {
            Self::Buffered(writer) => writer.init(sink, sheet_name),
            Self::Streaming(writer) => writer.init(sink, sheet_name),
        }
    }

    fn write_row(
        &mut self,
        sink: &mut S,
        sheet_name: &str,
        n_row: u32,
        row: &SpecRow,
    ) -> Result<(), SinkError> {
        match self {
            Self::Buffered(writer) => writer.write_row(sink, sheet_name, n_row, row),
            Self::Streaming(writer) => writer.write_row(sink, sheet_name, n_row, row),
        }
    }

    fn finalize(&mut self, sink: &mut S) -> Result<(), SinkError> {
        match self {
            Self::Buffered(writer) => SheetWriter::<S>::finalize(writer, sink),
            Self::Streaming(writer) => SheetWriter::<S>::finalize(writer, sink),
        }
    }

    fn supports_row_options(&self) -> bool {
        match self {
            Self::Buffered(writer) => SheetWriter::<S>::supports_row_options(writer),
            Self::Streaming(writer) => SheetWriter::<S>::supports_row_options(writer),
        }
    }
}

// #endregion
////////////////////////////////////////////////////////////////////////////////

fn derive_col_num(n_row: u32, n_idx: usize) -> Result<u16, SinkError> {
    u16::try_from(n_idx + 1).map_err(|_| SinkError::InvalidCoordinate {
        row: n_row,
        col: u16::MAX,
    })
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::sink::{EnumSinkOp, MemorySink};
    use crate::spec::{SpecCell, SpecMergeSpan, SpecRowOptions};

    fn derive_rows() -> Vec<SpecRow> {
        vec![
            crate::row!["Title", "", ""].with_merge(SpecMergeSpan::from_a1("A1:C1").unwrap()),
            SpecRow::new(vec![
                SpecCell::new(1i64),
                SpecCell::new(2.5),
                SpecCell::new(3.5).with_formula("=A2+B2"),
            ])
            .with_options(SpecRowOptions {
                height: Some(20.0),
                ..Default::default()
            }),
            crate::row!["x", "y"].with_merge(SpecMergeSpan::from_a1_relative("A1:A2").unwrap()),
            crate::row![None::<i64>, "z"],
        ]
    }

    fn write_all(mode: EnumWriteMode) -> MemorySink {
        let mut sink = MemorySink::new();
        sink.create_sheet("S").expect("create");
        let mut writer = EnumSheetWriter::new(mode);
        writer.init(&mut sink, "S").expect("init");
        for (n_idx, row) in derive_rows().iter().enumerate() {
            writer
                .write_row(&mut sink, "S", n_idx as u32 + 1, row)
                .expect("write row");
        }
        SheetWriter::<MemorySink>::finalize(&mut writer, &mut sink).expect("finalize");
        sink
    }

    #[test]
    fn test_buffered_and_streaming_write_same_content() {
        let sink_buffered = write_all(EnumWriteMode::Buffered);
        let sink_streaming = write_all(EnumWriteMode::Streaming);

        let sheet_buffered = sink_buffered.sheet("S").unwrap();
        let sheet_streaming = sink_streaming.sheet("S").unwrap();
        assert_eq!(sheet_buffered.cells, sheet_streaming.cells);
        assert_eq!(sheet_buffered.merges, sheet_streaming.merges);

        assert_eq!(sheet_buffered.merges[0].to_a1(), "A1:C1");
        assert_eq!(sheet_buffered.merges[1].to_a1(), "A3:A4");
        assert_eq!(sheet_buffered.cell(1, 1), Some(&SpecCell::new("Title")));
        assert_eq!(sheet_buffered.cell(1, 2), Some(&SpecCell::default()));
        assert_eq!(
            sheet_buffered.cell(2, 3).and_then(|cell| cell.formula_text()),
            Some("=A2+B2")
        );
    }

    #[test]
    fn test_only_streaming_applies_row_options() {
        let sink_buffered = write_all(EnumWriteMode::Buffered);
        let sink_streaming = write_all(EnumWriteMode::Streaming);
        assert!(sink_buffered.sheet("S").unwrap().row_options.is_empty());
        assert_eq!(
            sink_streaming.sheet("S").unwrap().row_options[&2][0].height,
            Some(20.0)
        );

        let writer = EnumSheetWriter::new(EnumWriteMode::Buffered);
        assert!(!SheetWriter::<MemorySink>::supports_row_options(&writer));
        let writer = EnumSheetWriter::new(EnumWriteMode::Streaming);
        assert!(SheetWriter::<MemorySink>::supports_row_options(&writer));
    }

    #[test]
    fn test_streaming_finalize_flushes_cursor() {
        let sink = write_all(EnumWriteMode::Streaming);
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
    fn test_streaming_requires_init_and_finalize_order() {
        let mut sink = MemorySink::new();
        sink.create_sheet("A").expect("create");
        sink.create_sheet("B").expect("create");
        let mut writer = StreamingSheetWriter::default();

        let err = writer
            .write_row(&mut sink, "A", 1, &crate::row!["a"])
            .expect_err("not initialized");
        assert!(matches!(err, SinkError::Cursor(_)));

        writer.init(&mut sink, "A").expect("init");
        assert!(writer.is_open());
        assert!(writer.init(&mut sink, "B").is_err());
        SheetWriter::<MemorySink>::finalize(&mut writer, &mut sink).expect("finalize");
        assert!(!writer.is_open());
        writer.init(&mut sink, "B").expect("init after finalize");
    }

    #[test]
    fn test_merge_above_owning_row_is_rejected_in_both_modes() {
        for mode in [EnumWriteMode::Buffered, EnumWriteMode::Streaming] {
            let mut sink = MemorySink::new();
            sink.create_sheet("S").expect("create");
            let mut writer = EnumSheetWriter::new(mode);
            writer.init(&mut sink, "S").expect("init");
            writer
                .write_row(&mut sink, "S", 1, &crate::row!["a"])
                .expect("row 1");
            let row = crate::row!["b", "c"].with_merge(SpecMergeSpan::from_a1("A1:B2").unwrap());
            let err = writer
                .write_row(&mut sink, "S", 2, &row)
                .expect_err("merge above its row");
            assert!(matches!(err, SinkError::InvalidRange(_)));
        }
    }

    #[test]
    fn test_buffered_write_surfaces_sink_rejection() {
        let mut sink = MemorySink::new();
        sink.create_sheet("S").expect("create");
        let mut writer = BufferedSheetWriter;
        let row = SpecRow::new(vec![SpecCell::new("x").with_style(7)]);
        let err = writer
            .write_row(&mut sink, "S", 1, &row)
            .expect_err("unknown style");
        assert!(matches!(err, SinkError::UnknownStyle(7)));
    }
}
