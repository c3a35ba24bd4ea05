// Driver seam: the store client the facade forwards to.
//
// A `Connection` is long-lived and shared across threads. Admin, table, and scanner
// handles are per call; dropping one releases whatever the driver holds for it.
use std::sync::Arc;

use crate::core::cell::{DeleteCells, PutCell, Row};
use crate::core::config::StoreConfig;
use crate::core::error::ApiResult;
use crate::core::filter::ScanSpec;
use crate::core::schema::{TableDescriptor, TableName};

pub trait Connector: Send + Sync {
    /// Single attempt; an unreachable store is `ErrorKind::Connection`.
    fn connect(&self, config: &StoreConfig) -> ApiResult<Arc<dyn Connection>>;
}

pub trait Connection: Send + Sync {
    fn admin(&self) -> ApiResult<Box<dyn AdminHandle>>;

    /// Opening a handle does not check that the table exists.
    fn table(&self, name: &TableName) -> ApiResult<Box<dyn TableHandle>>;

    /// Idempotent. Handles issued afterwards fail with `ErrorKind::Connection`.
    fn close(&self);
}

pub trait AdminHandle: Send {
    fn table_exists(&self, name: &TableName) -> ApiResult<bool>;

    fn create_table(&self, descriptor: &TableDescriptor) -> ApiResult<()>;

    fn disable_table(&self, name: &TableName) -> ApiResult<()>;

    /// The table must be disabled first.
    fn delete_table(&self, name: &TableName) -> ApiResult<()>;
}

pub trait TableHandle: Send {
    fn put(&self, put: &PutCell) -> ApiResult<()>;

    fn delete(&self, delete: &DeleteCells) -> ApiResult<()>;

    /// An unknown row key yields an empty row.
    fn get(&self, row: &[u8]) -> ApiResult<Row>;

    fn scanner(&self, spec: &ScanSpec) -> ApiResult<Box<dyn RowScanner>>;
}

pub trait RowScanner: Send {
    /// Rows come in ascending key order; `None` once exhausted.
    fn next_row(&mut self) -> ApiResult<Option<Row>>;
}
