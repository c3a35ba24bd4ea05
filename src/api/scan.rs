//! Purpose: Lazy, forward-only scan results that own their store resources.
//! Exports: `Scan`, `ScanCancel`.
//! Role: Returned by `TableClient::scan*`; iterating pulls rows from the driver on demand.
//! Invariants: The scanner and the table handle are released on every exit path:
//! exhaustion, iteration error, cancellation, `close`, or drop (scanner first).
//! Invariants: Once finished, a scan yields nothing more; it cannot be restarted.
use std::fmt;
use std::iter::FusedIterator;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use tracing::debug;

use crate::api::sink::CellSink;
use crate::core::cell::Row;
use crate::core::driver::{RowScanner, TableHandle};
use crate::core::error::ApiResult;
use crate::core::schema::TableName;

/// Cloneable token that stops a scan from another thread. The next pull after
/// `cancel` ends the iteration and releases the scan's resources. A pull already
/// blocked in the driver runs to completion (bounded by the connection's
/// `timeout_ms`); whatever it returns is discarded and the iteration ends.
#[derive(Clone, Debug, Default)]
pub struct ScanCancel {
    cancelled: Arc<AtomicBool>,
}

impl ScanCancel {
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }
}

pub struct Scan {
    scanner: Option<Box<dyn RowScanner>>,
    table: Option<Box<dyn TableHandle>>,
    name: TableName,
    cancel: ScanCancel,
    rows: usize,
}

impl Scan {
    pub(crate) fn new(
        name: TableName,
        table: Box<dyn TableHandle>,
        scanner: Box<dyn RowScanner>,
    ) -> Self {
        Self {
            scanner: Some(scanner),
            table: Some(table),
            name,
            cancel: ScanCancel::default(),
            rows: 0,
        }
    }

    pub fn table(&self) -> &TableName {
        &self.name
    }

    pub fn canceller(&self) -> ScanCancel {
        self.cancel.clone()
    }

    pub fn is_open(&self) -> bool {
        self.scanner.is_some() || self.table.is_some()
    }

    /// Rows yielded so far.
    pub fn rows_seen(&self) -> usize {
        self.rows
    }

    pub fn close(&mut self) {
        if !self.is_open() {
            return;
        }
        self.scanner = None;
        self.table = None;
        debug!(table = %self.name, rows = self.rows, "scan closed");
    }

    /// Emits every cell of every remaining row; returns the number of rows.
    pub fn drain_into<S: CellSink + ?Sized>(mut self, sink: &mut S) -> ApiResult<usize> {
        let mut count = 0;
        for row in self.by_ref() {
            let row = row?;
            for cell in row.cells() {
                sink.accept(row.key(), &cell.qualifier, &cell.value)?;
            }
            count += 1;
        }
        Ok(count)
    }

    pub fn collect_rows(self) -> ApiResult<Vec<Row>> {
        self.collect()
    }
}

impl Iterator for Scan {
    type Item = ApiResult<Row>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.cancel.is_cancelled() {
            self.close();
            return None;
        }
        let scanner = self.scanner.as_mut()?;
        let pulled = scanner.next_row();
        if self.cancel.is_cancelled() {
            self.close();
            return None;
        }
        match pulled {
            Ok(Some(row)) => {
                self.rows += 1;
                Some(Ok(row))
            }
            Ok(None) => {
                self.close();
                None
            }
            Err(err) => {
                self.close();
                Some(Err(err.or_table(self.name.as_str())))
            }
        }
    }
}

impl FusedIterator for Scan {}

impl Drop for Scan {
    fn drop(&mut self) {
        self.close();
    }
}

impl fmt::Debug for Scan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Scan")
            .field("table", &self.name)
            .field("open", &self.is_open())
            .field("rows", &self.rows)
            .finish()
    }
}
