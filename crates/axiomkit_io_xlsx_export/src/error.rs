//! Error types for the XLSX export pipeline.

use std::path::PathBuf;

use polars::error::PolarsError;
use rust_xlsxwriter::XlsxError;
use thiserror::Error;

/// Upstream row production failed.
#[derive(Debug, Error)]
pub enum ProducerError {
    /// Generic producer failure with message.
    #[error("{0}")]
    Message(String),

    /// Background task of a channel-backed producer panicked.
    #[error("row producer task panicked: {0}")]
    TaskPanicked(String),

    /// Consumer side of a channel-backed producer went away.
    #[error("row channel closed by consumer")]
    ChannelClosed,

    /// DataFrame access failed.
    #[error("polars error: {0}")]
    Polars(#[from] PolarsError),
}

impl ProducerError {
    /// Create a message error.
    pub fn msg<S: Into<String>>(msg: S) -> Self {
        Self::Message(msg.into())
    }
}

/// An operation was rejected by the document sink.
#[derive(Debug, Error)]
pub enum SinkError {
    /// Sheet name is already taken.
    #[error("Sheet name already exists: {0}")]
    DuplicateSheetName(String),

    /// Sheet not found by name.
    #[error("Sheet not found: {0}")]
    SheetNotFound(String),

    /// Sheet name breaks Excel naming rules.
    #[error("Invalid sheet name: {0}")]
    InvalidSheetName(String),

    /// Coordinate outside the sheet grid.
    #[error("Invalid cell coordinate: row={row}, col={col}")]
    InvalidCoordinate {
        /// 1-based row.
        row: u32,
        /// 1-based column.
        col: u16,
    },

    /// Malformed, single-cell or overlapping range.
    #[error("Invalid cell range: {0}")]
    InvalidRange(String),

    /// Style handle not registered in the style table.
    #[error("Unknown style handle: {0}")]
    UnknownStyle(u32),

    /// Append cursor used out of order or against the wrong sheet.
    #[error("Append cursor error: {0}")]
    Cursor(String),

    /// Operation not available on this sink.
    #[error("Unsupported sink operation: {0}")]
    Unsupported(String),

    /// Underlying workbook encoder failure.
    #[error("xlsx write error: {0}")]
    Xlsx(#[from] XlsxError),
}

/// Terminal error of one export call.
#[derive(Debug, Error)]
pub enum XlsxExportError {
    /// Options or sheet definitions rejected before writing.
    #[error("invalid export options: {0}")]
    InvalidOptions(String),

    /// The exporter already committed its document.
    #[error("cannot export after the document has been committed")]
    AlreadyCommitted,

    /// Producer failed while pulling the given logical row.
    #[error("sheet {sheet:?}: producer failed before row {row}: {source}")]
    Producer {
        /// Physical sheet the pulled row was destined for; the next overflow
        /// sheet when the current one is full.
        sheet: String,
        /// Physical row index the pulled row was destined for.
        row: u32,
        /// Underlying producer error.
        #[source]
        source: ProducerError,
    },

    /// Sink rejected an operation.
    #[error("sheet {sheet:?}{}: {source}", derive_row_suffix(.row))]
    Sink {
        /// Physical sheet being written.
        sheet: String,
        /// Physical row index when the failure happened on a row write.
        row: Option<u32>,
        /// Underlying sink error.
        #[source]
        source: SinkError,
    },

    /// Final save failed.
    #[error("failed to commit {}: {source}", .path.display())]
    Commit {
        /// Target output path.
        path: PathBuf,
        /// Underlying sink error.
        #[source]
        source: SinkError,
    },
}

fn derive_row_suffix(row: &Option<u32>) -> String {
    row.map(|n_row| format!(" row {n_row}")).unwrap_or_default()
}
