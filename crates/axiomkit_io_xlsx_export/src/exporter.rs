//! Export orchestrator: drives sheet definitions into a sink, splitting
//! sheets on row overflow, and commits the document once.

use std::path::{Path, PathBuf};

use crate::conf::N_NROWS_EXCEL_MAX;
use crate::error::{SinkError, XlsxExportError};
use crate::report::{SpecSheetSegment, SpecXlsxExportReport};
use crate::sink::XlsxSink;
use crate::spec::{
    EnumWriteMode, SpecCellFormat, SpecColumnWidth, SpecSheetDefinition, SpecXlsxExportOptions,
};
use crate::util::{create_sheet_identifier, validate_unique_sheet_names};
use crate::workbook::RustXlsxSink;
use crate::writer::{EnumSheetWriter, SheetWriter};

/// Stateful exporter bound to one output path and one sink.
///
/// The document is committed by the first successful [`Self::export`];
/// later calls fail with [`XlsxExportError::AlreadyCommitted`].
pub struct XlsxExporter<S: XlsxSink = RustXlsxSink> {
    sink: S,
    path_file_out: PathBuf,
    options: SpecXlsxExportOptions,
    if_committed: bool,
}

impl XlsxExporter<RustXlsxSink> {
    /// Exporter writing a `.xlsx` workbook to `path_file_out`.
    pub fn new(path_file_out: impl Into<PathBuf>, options: SpecXlsxExportOptions) -> Self {
        Self::with_sink(RustXlsxSink::new(), path_file_out, options)
    }
}

impl<S: XlsxSink> XlsxExporter<S> {
    /// Exporter writing into `sink`, saved to `path_file_out` on commit.
    pub fn with_sink(
        sink: S,
        path_file_out: impl Into<PathBuf>,
        options: SpecXlsxExportOptions,
    ) -> Self {
        Self {
            sink,
            path_file_out: path_file_out.into(),
            options,
            if_committed: false,
        }
    }

    /// Underlying sink.
    pub fn sink(&self) -> &S {
        &self.sink
    }

    /// Underlying sink, e.g. to register styles directly.
    pub fn sink_mut(&mut self) -> &mut S {
        &mut self.sink
    }

    /// Consume the exporter and return its sink.
    pub fn into_sink(self) -> S {
        self.sink
    }

    /// Output path.
    pub fn path_file_out(&self) -> &Path {
        &self.path_file_out
    }

    /// Export options.
    pub fn options(&self) -> &SpecXlsxExportOptions {
        &self.options
    }

    /// Write mode producers may consult before the export starts.
    pub fn write_mode(&self) -> EnumWriteMode {
        self.options.write_mode
    }

    /// Whether the document has been saved.
    pub fn is_committed(&self) -> bool {
        self.if_committed
    }

    /// Register a style in the sink; the handle goes into [`crate::spec::SpecCell::style`].
    pub fn add_style(&mut self, format: &SpecCellFormat) -> Result<u32, SinkError> {
        self.sink.add_style(format)
    }

    /// Write every definition in order, then save the document.
    ///
    /// Any failure aborts the export and leaves the document unsaved.
    pub fn export(
        &mut self,
        definitions: Vec<SpecSheetDefinition<'_>>,
    ) -> Result<SpecXlsxExportReport, XlsxExportError> {
        if self.if_committed {
            return Err(XlsxExportError::AlreadyCommitted);
        }
        self.validate_definitions(&definitions)?;

        log::info!(
            "exporting {} sheet definition(s) to {} (mode={:?}, rows per sheet={})",
            definitions.len(),
            self.path_file_out.display(),
            self.options.write_mode,
            self.options.n_rows_sheet_max
        );

        let mut report = SpecXlsxExportReport::default();
        let mut writer = EnumSheetWriter::new(self.options.write_mode);
        for (n_idx, definition) in definitions.into_iter().enumerate() {
            self.export_definition(&mut writer, definition, n_idx == 0, &mut report)?;
        }

        self.sink
            .save(&self.path_file_out)
            .map_err(|source| XlsxExportError::Commit {
                path: self.path_file_out.clone(),
                source,
            })?;
        self.if_committed = true;
        log::info!("committed {}: {report}", self.path_file_out.display());
        Ok(report)
    }

    fn validate_definitions(
        &self,
        definitions: &[SpecSheetDefinition<'_>],
    ) -> Result<(), XlsxExportError> {
        let n_rows_sheet_max = self.options.n_rows_sheet_max;
        if n_rows_sheet_max == 0 || n_rows_sheet_max > N_NROWS_EXCEL_MAX {
            return Err(XlsxExportError::InvalidOptions(format!(
                "n_rows_sheet_max must be within 1..={N_NROWS_EXCEL_MAX}, got {n_rows_sheet_max}"
            )));
        }
        let l_names: Vec<&str> = definitions.iter().map(|def| def.name.as_str()).collect();
        validate_unique_sheet_names(&l_names).map_err(XlsxExportError::InvalidOptions)
    }

    /// Drain one definition's producer into one or more physical sheets.
    fn export_definition(
        &mut self,
        writer: &mut EnumSheetWriter,
        definition: SpecSheetDefinition<'_>,
        if_first_definition: bool,
        report: &mut SpecXlsxExportReport,
    ) -> Result<(), XlsxExportError> {
        let SpecSheetDefinition {
            name: c_name_base,
            mut producer,
            col_widths,
        } = definition;
        let n_rows_sheet_max = self.options.n_rows_sheet_max;

        let mut segment = SpecSheetSegment {
            sheet_name: c_name_base.clone(),
            source_name: c_name_base.clone(),
            overflow_index: 0,
            n_rows: 0,
        };
        self.init_segment(writer, &segment.sheet_name, &col_widths, if_first_definition)?;
        let mut if_warned_row_options = false;

        loop {
            let row = match producer.next_row() {
                Ok(Some(row)) if !row.is_sentinel() => row,
                Ok(_) => break,
                Err(source) => {
                    // A full sheet means the failed row would have opened the next one.
                    let (sheet, row) = if segment.n_rows as usize >= n_rows_sheet_max {
                        let n_overflow = segment.overflow_index + 1;
                        (create_sheet_identifier(&c_name_base, n_overflow), 1)
                    } else {
                        (segment.sheet_name.clone(), segment.n_rows + 1)
                    };
                    return Err(XlsxExportError::Producer { sheet, row, source });
                }
            };

            if segment.n_rows as usize >= n_rows_sheet_max {
                self.finalize_segment(writer, &segment)?;
                let n_overflow = segment.overflow_index + 1;
                let c_sheet_next = create_sheet_identifier(&c_name_base, n_overflow);
                log::debug!(
                    "sheet {:?} reached {n_rows_sheet_max} rows; continuing on {c_sheet_next:?}",
                    segment.sheet_name
                );
                report.sheets.push(segment);
                segment = SpecSheetSegment {
                    sheet_name: c_sheet_next,
                    source_name: c_name_base.clone(),
                    overflow_index: n_overflow,
                    n_rows: 0,
                };
                self.init_segment(writer, &segment.sheet_name, &col_widths, false)?;
                if_warned_row_options = false;
            }

            let n_row = segment.n_rows + 1;
            if !row.options.is_empty()
                && !if_warned_row_options
                && !SheetWriter::<S>::supports_row_options(writer)
            {
                let c_warning = format!(
                    "sheet {:?}: row options ignored in {:?} mode (first at row {n_row})",
                    segment.sheet_name,
                    writer.write_mode()
                );
                log::warn!("{c_warning}");
                report.add_warning(c_warning);
                if_warned_row_options = true;
            }

            log::trace!("writing row {n_row} of sheet {:?}", segment.sheet_name);
            writer
                .write_row(&mut self.sink, &segment.sheet_name, n_row, &row)
                .map_err(derive_sink_error(&segment.sheet_name, Some(n_row)))?;
            segment.n_rows = n_row;
        }

        self.finalize_segment(writer, &segment)?;
        report.sheets.push(segment);
        Ok(())
    }

    /// Create `sheet_name`, drop the placeholder when due, init the writer, apply widths.
    fn init_segment(
        &mut self,
        writer: &mut EnumSheetWriter,
        sheet_name: &str,
        col_widths: &[SpecColumnWidth],
        if_first_sheet: bool,
    ) -> Result<(), XlsxExportError> {
        self.sink
            .create_sheet(sheet_name)
            .map_err(derive_sink_error(sheet_name, None))?;

        if if_first_sheet
            && let Some(c_placeholder) = self.sink.placeholder_sheet_name()
            && c_placeholder != sheet_name
            && self.sink.count_sheets() > 1
        {
            self.sink
                .delete_sheet(&c_placeholder)
                .map_err(derive_sink_error(&c_placeholder, None))?;
            log::debug!("removed placeholder sheet {c_placeholder:?}");
        }

        writer
            .init(&mut self.sink, sheet_name)
            .map_err(derive_sink_error(sheet_name, None))?;
        for width in col_widths {
            self.sink
                .set_column_width(sheet_name, width.col_first, width.col_last, width.width)
                .map_err(derive_sink_error(sheet_name, None))?;
        }
        log::debug!("initialized sheet {sheet_name:?}");
        Ok(())
    }

    fn finalize_segment(
        &mut self,
        writer: &mut EnumSheetWriter,
        segment: &SpecSheetSegment,
    ) -> Result<(), XlsxExportError> {
        writer
            .finalize(&mut self.sink)
            .map_err(derive_sink_error(&segment.sheet_name, None))?;
        log::debug!(
            "finalized sheet {:?} with {} row(s)",
            segment.sheet_name,
            segment.n_rows
        );
        Ok(())
    }
}

impl<S: XlsxSink + std::fmt::Debug> std::fmt::Debug for XlsxExporter<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("XlsxExporter")
            .field("sink", &self.sink)
            .field("path_file_out", &self.path_file_out)
            .field("options", &self.options)
            .field("if_committed", &self.if_committed)
            .finish()
    }
}

fn derive_sink_error(sheet: &str, row: Option<u32>) -> impl Fn(SinkError) -> XlsxExportError + '_ {
    move |source| XlsxExportError::Sink {
        sheet: sheet.to_string(),
        row,
        source,
    }
}
