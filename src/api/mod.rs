//! Purpose: Define the public Rust API boundary for widecolumn.
//! Exports: Handle manager, facade, scan results, sinks, and the core types they speak.
//! Role: The surface a composition root wires up: pick a connector, build a
//! `StoreHandle`, wrap it in a `TableClient`.
//! Invariants: Driver traits stay in `core::driver`; callers implement them only to add a store.

mod client;
mod handle;
mod outcome;
mod scan;
mod sink;

pub use crate::core::cell::{Cell, Row};
pub use crate::core::config::StoreConfig;
pub use crate::core::error::{ApiResult, Error, ErrorKind};
pub use crate::core::filter::{CompareOp, Conjunction, FilterList, MissingPolicy, Predicate, ScanSpec};
pub use crate::core::memory::{Fault, MemoryStore};
pub use crate::core::rest::RestConnector;
pub use crate::core::schema::{ColumnFamily, TableDescriptor, TableName};
pub use client::TableClient;
pub use handle::StoreHandle;
pub use outcome::Outcome;
pub use scan::{Scan, ScanCancel};
pub use sink::{CellSink, CellTriple, LineSink};
