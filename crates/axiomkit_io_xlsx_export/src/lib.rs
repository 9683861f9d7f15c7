//! `axiomkit_io_xlsx_export` v1:
//! Row-streaming XLSX export with automatic sheet overflow.
//!
//! Layout:
//! - `conf`     : constants and default presets
//! - `spec`     : cell/row/merge models and options
//! - `error`    : producer, sink and export errors
//! - `util`     : sheet naming and cell addressing helpers
//! - `producer` : pull-based row sources (closure, iterator, channel, DataFrame)
//! - `sink`     : document sink contract, append cursor, in-memory sink
//! - `workbook` : `rust_xlsxwriter`-backed sink
//! - `writer`   : buffered and streaming sheet writers
//! - `report`   : export report
//! - `exporter` : orchestrator with overflow splitting and single commit
pub mod conf;
pub mod error;
pub mod exporter;
pub mod producer;
pub mod report;
pub mod sink;
pub mod spec;
pub mod util;
pub mod workbook;
pub mod writer;

pub use conf::{
    C_SHEET_NAME_PLACEHOLDER, N_LEN_EXCEL_SHEET_NAME_MAX, N_NCOLS_EXCEL_MAX, N_NROWS_EXCEL_MAX,
    TUP_EXCEL_ILLEGAL, derive_default_xlsx_export_options, derive_default_xlsx_formats,
};
pub use error::{ProducerError, SinkError, XlsxExportError};
pub use exporter::XlsxExporter;
pub use producer::{
    ChannelRowProducer, DataFrameRowProducer, EnumChannelCapacity, IterRowProducer, RowProducer,
    RowSender,
};
pub use report::{SpecSheetSegment, SpecXlsxExportReport};
pub use sink::{EnumSinkOp, MemorySink, SpecAppendCursor, SpecMemorySheet, XlsxSink};
pub use spec::{
    EnumCellValue, EnumWriteMode, SpecCell, SpecCellCoord, SpecCellFormat, SpecCellRange,
    SpecColumnWidth, SpecMergeSpan, SpecRow, SpecRowOptions, SpecSheetDefinition,
    SpecXlsxExportOptions,
};
pub use workbook::RustXlsxSink;
pub use writer::{BufferedSheetWriter, EnumSheetWriter, SheetWriter, StreamingSheetWriter};
