//! Pull-based row producers.
//!
//! - closures and iterators for in-process data,
//! - [`ChannelRowProducer`] for push-style sources running on a background thread,
//! - [`DataFrameRowProducer`] for Polars frames.

use std::any::Any;
use std::io::Cursor;
use std::sync::mpsc::{self, Receiver, Sender, SyncSender};
use std::thread::{self, JoinHandle};

use polars::prelude::{AnyValue, Column, DataFrame, IpcReader, SerReader};

use crate::conf::N_CHANNEL_CAPACITY_DEFAULT;
use crate::error::ProducerError;
use crate::spec::{EnumCellValue, SpecCell, SpecRow};

/// Source of rows for one sheet definition.
///
/// `Ok(None)` signals end of stream. The exporter never pulls the next row
/// before the previous one has been written.
pub trait RowProducer {
    /// Pull the next row.
    fn next_row(&mut self) -> Result<Option<SpecRow>, ProducerError>;
}

impl<F> RowProducer for F
where
    F: FnMut() -> Result<Option<SpecRow>, ProducerError>,
{
    fn next_row(&mut self) -> Result<Option<SpecRow>, ProducerError> {
        self()
    }
}

////////////////////////////////////////////////////////////////////////////////
// #region IteratorProducer

/// Infallible producer over any row iterator.
#[derive(Debug, Clone)]
pub struct IterRowProducer<I> {
    iter: I,
}

impl<I> IterRowProducer<I>
where
    I: Iterator<Item = SpecRow>,
{
    /// Wrap anything iterable over rows.
    pub fn new(rows: impl IntoIterator<IntoIter = I>) -> Self {
        Self {
            iter: rows.into_iter(),
        }
    }
}

impl<I> RowProducer for IterRowProducer<I>
where
    I: Iterator<Item = SpecRow>,
{
    fn next_row(&mut self) -> Result<Option<SpecRow>, ProducerError> {
        Ok(self.iter.next())
    }
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
// #region ChannelProducer

/// Handoff queue sizing for [`ChannelRowProducer`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnumChannelCapacity {
    /// At most `n` rows in flight; `0` makes every send wait for the consumer.
    Bounded(usize),
    /// No backpressure on the sending task.
    Unbounded,
}

impl Default for EnumChannelCapacity {
    fn default() -> Self {
        Self::Bounded(N_CHANNEL_CAPACITY_DEFAULT)
    }
}

#[derive(Debug, Clone)]
enum EnumRowTx {
    Bounded(SyncSender<SpecRow>),
    Unbounded(Sender<SpecRow>),
}

/// Sending half handed to the background task of a [`ChannelRowProducer`].
#[derive(Debug, Clone)]
pub struct RowSender {
    tx: EnumRowTx,
}

impl RowSender {
    /// Send one row, blocking while a bounded queue is full.
    ///
    /// Fails with [`ProducerError::ChannelClosed`] once the consumer is gone,
    /// e.g. after the export aborted; the task should return at that point.
    pub fn send(&self, row: SpecRow) -> Result<(), ProducerError> {
        let result = match &self.tx {
            EnumRowTx::Bounded(tx) => tx.send(row),
            EnumRowTx::Unbounded(tx) => tx.send(row),
        };
        result.map_err(|_| ProducerError::ChannelClosed)
    }
}

type FnSendRows = Box<dyn FnOnce(RowSender) -> Result<(), ProducerError> + Send + 'static>;

enum EnumChannelState {
    Pending(FnSendRows),
    Running {
        rx: Receiver<SpecRow>,
        handle: JoinHandle<Result<(), ProducerError>>,
    },
    Finished,
}

/// Adapter turning a push-style row source into a [`RowProducer`].
///
/// The callback starts on a background thread at the first pull, exactly once.
/// Rows arrive in send order. When the callback returns, its error (or panic)
/// is surfaced by the pull that observes the closed channel.
pub struct ChannelRowProducer {
    capacity: EnumChannelCapacity,
    state: EnumChannelState,
}

impl ChannelRowProducer {
    /// Wrap `fn_send_rows` with the default (rendezvous) queue.
    pub fn new<F>(fn_send_rows: F) -> Self
    where
        F: FnOnce(RowSender) -> Result<(), ProducerError> + Send + 'static,
    {
        Self::with_capacity(EnumChannelCapacity::default(), fn_send_rows)
    }

    /// Wrap `fn_send_rows` with an explicit queue capacity.
    pub fn with_capacity<F>(capacity: EnumChannelCapacity, fn_send_rows: F) -> Self
    where
        F: FnOnce(RowSender) -> Result<(), ProducerError> + Send + 'static,
    {
        Self {
            capacity,
            state: EnumChannelState::Pending(Box::new(fn_send_rows)),
        }
    }

    /// Whether the background task has been started.
    pub fn is_started(&self) -> bool {
        !matches!(self.state, EnumChannelState::Pending(_))
    }

    fn start(&mut self) {
        let EnumChannelState::Pending(fn_send_rows) =
            std::mem::replace(&mut self.state, EnumChannelState::Finished)
        else {
            return;
        };

        let (tx, rx) = match self.capacity {
            EnumChannelCapacity::Bounded(n_capacity) => {
                let (tx, rx) = mpsc::sync_channel(n_capacity);
                (EnumRowTx::Bounded(tx), rx)
            }
            EnumChannelCapacity::Unbounded => {
                let (tx, rx) = mpsc::channel();
                (EnumRowTx::Unbounded(tx), rx)
            }
        };

        log::debug!("Starting row producer task ({:?}).", self.capacity);
        let sender = RowSender { tx };
        let handle = thread::spawn(move || fn_send_rows(sender));
        self.state = EnumChannelState::Running { rx, handle };
    }

    fn finish(&mut self) -> Result<(), ProducerError> {
        let EnumChannelState::Running { handle, .. } =
            std::mem::replace(&mut self.state, EnumChannelState::Finished)
        else {
            return Ok(());
        };

        match handle.join() {
            Ok(result) => result,
            Err(payload) => Err(ProducerError::TaskPanicked(derive_panic_text(
                payload.as_ref(),
            ))),
        }
    }
}

impl RowProducer for ChannelRowProducer {
    fn next_row(&mut self) -> Result<Option<SpecRow>, ProducerError> {
        if let EnumChannelState::Pending(_) = self.state {
            self.start();
        }

        let EnumChannelState::Running { rx, .. } = &self.state else {
            return Ok(None);
        };

        match rx.recv() {
            Ok(row) => Ok(Some(row)),
            Err(_) => {
                self.finish()?;
                Ok(None)
            }
        }
    }
}

impl std::fmt::Debug for ChannelRowProducer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let c_state = match self.state {
            EnumChannelState::Pending(_) => "pending",
            EnumChannelState::Running { .. } => "running",
            EnumChannelState::Finished => "finished",
        };
        f.debug_struct("ChannelRowProducer")
            .field("capacity", &self.capacity)
            .field("state", &c_state)
            .finish()
    }
}

fn derive_panic_text(payload: &(dyn Any + Send)) -> String {
    if let Some(c_msg) = payload.downcast_ref::<&str>() {
        return (*c_msg).to_string();
    }
    if let Some(c_msg) = payload.downcast_ref::<String>() {
        return c_msg.clone();
    }
    "unknown panic payload".to_string()
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
// #region DataFrameProducer

/// Streams a Polars [`DataFrame`] row by row.
#[derive(Debug, Clone)]
pub struct DataFrameRowProducer {
    df: DataFrame,
    n_idx_row_next: usize,
    header: Option<SpecRow>,
}

impl DataFrameRowProducer {
    /// Produce the body rows of `df`.
    pub fn new(df: DataFrame) -> Self {
        Self {
            df,
            n_idx_row_next: 0,
            header: None,
        }
    }

    /// Read a Polars IPC payload.
    pub fn from_ipc_bytes(v_ipc_df: &[u8]) -> Result<Self, ProducerError> {
        let df = IpcReader::new(Cursor::new(v_ipc_df)).finish()?;
        Ok(Self::new(df))
    }

    /// Emit a header row of column names first, styled with `style` if given.
    pub fn with_header(mut self, style: Option<u32>) -> Self {
        let l_cells = self
            .df
            .get_column_names_str()
            .into_iter()
            .map(|c_name| SpecCell {
                value: EnumCellValue::String(c_name.to_string()),
                style,
                formula: None,
            })
            .collect();
        self.header = Some(SpecRow::new(l_cells));
        self
    }

    /// Number of body rows.
    pub fn height(&self) -> usize {
        self.df.height()
    }
}

impl RowProducer for DataFrameRowProducer {
    fn next_row(&mut self) -> Result<Option<SpecRow>, ProducerError> {
        if let Some(row_header) = self.header.take() {
            return Ok(Some(row_header));
        }
        if self.n_idx_row_next >= self.df.height() {
            return Ok(None);
        }

        let n_idx_row = self.n_idx_row_next;
        self.n_idx_row_next += 1;

        let l_cells = self
            .df
            .get_columns()
            .iter()
            .map(|col| derive_cell_from_column(col, n_idx_row))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Some(SpecRow::new(l_cells)))
    }
}

fn derive_cell_from_column(col: &Column, n_idx_row: usize) -> Result<SpecCell, ProducerError> {
    let value = col.get(n_idx_row)?;
    Ok(SpecCell::new(derive_cell_value_from_any_value(value)))
}

fn derive_cell_value_from_any_value(value: AnyValue<'_>) -> EnumCellValue {
    match value {
        AnyValue::Null => EnumCellValue::None,
        AnyValue::String(val) => EnumCellValue::String(val.to_string()),
        AnyValue::StringOwned(val) => EnumCellValue::String(val.to_string()),
        AnyValue::Boolean(val) => EnumCellValue::Boolean(val),
        AnyValue::UInt8(val) => EnumCellValue::Integer(val as i64),
        AnyValue::UInt16(val) => EnumCellValue::Integer(val as i64),
        AnyValue::UInt32(val) => EnumCellValue::Integer(val as i64),
        AnyValue::UInt64(val) => match i64::try_from(val) {
            Ok(n_val) => EnumCellValue::Integer(n_val),
            Err(_) => EnumCellValue::Number(val as f64),
        },
        AnyValue::Int8(val) => EnumCellValue::Integer(val as i64),
        AnyValue::Int16(val) => EnumCellValue::Integer(val as i64),
        AnyValue::Int32(val) => EnumCellValue::Integer(val as i64),
        AnyValue::Int64(val) => EnumCellValue::Integer(val),
        AnyValue::Float32(val) => EnumCellValue::Number(val as f64),
        AnyValue::Float64(val) => EnumCellValue::Number(val),
        _ => EnumCellValue::String(value.to_string()),
    }
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
