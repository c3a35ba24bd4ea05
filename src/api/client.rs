//! Purpose: Data-access facade over a `StoreHandle`: table lifecycle, cell mutations,
//! point reads, and predicate scans.
//! Exports: `TableClient`.
//! Role: The surface callers use; every call forwards to the driver through scoped handles.
//! Invariants: Every handle a call opens is released before it returns, on success,
//! on an expected-state short-circuit, and on error.
//! Invariants: Missing/present tables are reported as `Outcome`; store errors propagate.
//! Invariants: Mutations, reads, and scans check table existence first (two round-trips).
#![allow(clippy::result_large_err)]

use bytes::Bytes;
use tracing::{debug, info, warn};

use super::handle::StoreHandle;
use super::outcome::Outcome;
use super::scan::Scan;
use super::sink::CellSink;
use crate::core::cell::{Cell, DeleteCells, DeleteScope, PutCell};
use crate::core::driver::TableHandle;
use crate::core::error::{ApiResult, Error, ErrorKind};
use crate::core::filter::{FilterList, Predicate, ScanSpec};
use crate::core::schema::{TableDescriptor, TableName};

#[derive(Clone, Debug)]
pub struct TableClient {
    handle: StoreHandle,
}

impl TableClient {
    pub fn new(handle: StoreHandle) -> Self {
        Self { handle }
    }

    pub fn handle(&self) -> &StoreHandle {
        &self.handle
    }

    pub fn table_exists(&self, table: &str) -> ApiResult<bool> {
        let name = TableName::new(table)?;
        self.exists(&name)
    }

    /// `families` must be non-empty and distinct; the store may reorder them.
    pub fn create_table(&self, table: &str, families: &[&str]) -> ApiResult<Outcome> {
        let descriptor = TableDescriptor::from_names(table, families)?;
        self.create_table_with(&descriptor)
    }

    pub fn create_table_with(&self, descriptor: &TableDescriptor) -> ApiResult<Outcome> {
        let name = descriptor.name();
        let admin = self.handle.admin()?;
        if admin.table_exists(name).map_err(|err| err.or_table(name.as_str()))? {
            warn!(table = %name, "table already exists");
            return Ok(Outcome::AlreadyExists);
        }
        match admin.create_table(descriptor) {
            Ok(()) => {}
            // Lost a race with another creator between the check and the create.
            Err(err) if err.kind() == ErrorKind::AlreadyExists => {
                warn!(table = %name, "table already exists");
                return Ok(Outcome::AlreadyExists);
            }
            Err(err) => return Err(err.or_table(name.as_str())),
        }
        info!(table = %name, families = descriptor.families().len(), "table created");
        Ok(Outcome::Applied(()))
    }

    /// Disables, then deletes. A delete failure after a successful disable leaves the
    /// table disabled and surfaces as `ErrorKind::DropIncomplete`; nothing is rolled back.
    pub fn drop_table(&self, table: &str) -> ApiResult<Outcome> {
        let name = TableName::new(table)?;
        let admin = self.handle.admin()?;
        if !admin.table_exists(&name).map_err(|err| err.or_table(table))? {
            warn!(table = %name, "table not found");
            return Ok(Outcome::NotFound);
        }
        admin
            .disable_table(&name)
            .map_err(|err| err.or_table(table))?;
        debug!(table = %name, "table disabled");
        if let Err(err) = admin.delete_table(&name) {
            warn!(table = %name, error = %err, "table disabled but not deleted");
            return Err(Error::new(ErrorKind::DropIncomplete)
                .with_message("table was disabled but delete failed")
                .with_table(table)
                .with_source(err));
        }
        info!(table = %name, "table dropped");
        Ok(Outcome::Applied(()))
    }

    /// Upserts one cell: creates the row if needed, otherwise writes a new latest version.
    pub fn put_cell(
        &self,
        table: &str,
        row: impl AsRef<[u8]>,
        family: &str,
        qualifier: impl AsRef<[u8]>,
        value: impl AsRef<[u8]>,
    ) -> ApiResult<Outcome> {
        let put = PutCell {
            row: Bytes::copy_from_slice(row.as_ref()),
            family: Bytes::copy_from_slice(family.as_bytes()),
            qualifier: Bytes::copy_from_slice(qualifier.as_ref()),
            value: Bytes::copy_from_slice(value.as_ref()),
        };
        self.with_table(table, |handle| handle.put(&put))
    }

    pub fn delete_row(&self, table: &str, row: impl AsRef<[u8]>) -> ApiResult<Outcome> {
        self.delete(table, row.as_ref(), DeleteScope::Row)
    }

    pub fn delete_family(
        &self,
        table: &str,
        row: impl AsRef<[u8]>,
        family: &str,
    ) -> ApiResult<Outcome> {
        let scope = DeleteScope::Family(Bytes::copy_from_slice(family.as_bytes()));
        self.delete(table, row.as_ref(), scope)
    }

    /// Removes only the latest version of the column.
    pub fn delete_cell(
        &self,
        table: &str,
        row: impl AsRef<[u8]>,
        family: &str,
        qualifier: impl AsRef<[u8]>,
    ) -> ApiResult<Outcome> {
        let scope = DeleteScope::LatestVersion {
            family: Bytes::copy_from_slice(family.as_bytes()),
            qualifier: Bytes::copy_from_slice(qualifier.as_ref()),
        };
        self.delete(table, row.as_ref(), scope)
    }

    fn delete(&self, table: &str, row: &[u8], scope: DeleteScope) -> ApiResult<Outcome> {
        let delete = DeleteCells {
            row: Bytes::copy_from_slice(row),
            scope,
        };
        self.with_table(table, |handle| handle.delete(&delete))
    }

    /// (qualifier, value) for every cell in the row; empty when the row has no cells.
    pub fn get_row(
        &self,
        table: &str,
        row: impl AsRef<[u8]>,
    ) -> ApiResult<Outcome<Vec<(Bytes, Bytes)>>> {
        Ok(self.get_row_cells(table, row)?.map(|cells| {
            cells
                .into_iter()
                .map(|cell| (cell.qualifier, cell.value))
                .collect()
        }))
    }

    pub fn get_row_cells(&self, table: &str, row: impl AsRef<[u8]>) -> ApiResult<Outcome<Vec<Cell>>> {
        let row = row.as_ref();
        self.with_table(table, |handle| handle.get(row).map(|found| found.into_cells()))
    }

    /// Sends each cell to `sink`; the outcome carries the number of cells sent.
    pub fn get_row_into<S: CellSink + ?Sized>(
        &self,
        table: &str,
        row: impl AsRef<[u8]>,
        sink: &mut S,
    ) -> ApiResult<Outcome<usize>> {
        let cells = match self.get_row_cells(table, row)? {
            Outcome::Applied(cells) => cells,
            Outcome::NotFound => return Ok(Outcome::NotFound),
            Outcome::AlreadyExists => return Ok(Outcome::AlreadyExists),
        };
        for cell in &cells {
            sink.accept(&cell.row, &cell.qualifier, &cell.value)?;
        }
        Ok(Outcome::Applied(cells.len()))
    }

    /// One equality predicate per `(qualifier, value)` entry under `family`, all of which
    /// must hold; a row lacking any of the qualifiers does not match.
    pub fn scan_with_predicates<Q, V>(
        &self,
        table: &str,
        family: &str,
        predicates: &[(Q, V)],
    ) -> ApiResult<Outcome<Scan>>
    where
        Q: AsRef<[u8]>,
        V: AsRef<[u8]>,
    {
        let filter = FilterList::all(
            predicates
                .iter()
                .map(|(qualifier, value)| Predicate::equals(family, qualifier, value))
                .collect(),
        );
        self.scan(table, ScanSpec::new().with_filter(filter))
    }

    /// The returned `Scan` owns its table handle and scanner until it is finished,
    /// closed, or dropped.
    pub fn scan(&self, table: &str, spec: ScanSpec) -> ApiResult<Outcome<Scan>> {
        let name = TableName::new(table)?;
        if !self.exists(&name)? {
            warn!(table = %name, "table not found");
            return Ok(Outcome::NotFound);
        }
        let handle = self.handle.table(&name)?;
        let scanner = handle
            .scanner(&spec)
            .map_err(|err| err.or_table(table))?;
        debug!(
            table = %name,
            predicates = spec.filter.predicates().len(),
            "scan opened"
        );
        Ok(Outcome::Applied(Scan::new(name, handle, scanner)))
    }

    /// Drains a scan into `sink`; the outcome carries the number of rows emitted.
    pub fn scan_into<S: CellSink + ?Sized>(
        &self,
        table: &str,
        spec: ScanSpec,
        sink: &mut S,
    ) -> ApiResult<Outcome<usize>> {
        match self.scan(table, spec)? {
            Outcome::Applied(scan) => Ok(Outcome::Applied(scan.drain_into(sink)?)),
            Outcome::NotFound => Ok(Outcome::NotFound),
            Outcome::AlreadyExists => Ok(Outcome::AlreadyExists),
        }
    }

    fn exists(&self, name: &TableName) -> ApiResult<bool> {
        let admin = self.handle.admin()?;
        admin
            .table_exists(name)
            .map_err(|err| err.or_table(name.as_str()))
    }

    fn with_table<T>(
        &self,
        table: &str,
        op: impl FnOnce(&dyn TableHandle) -> ApiResult<T>,
    ) -> ApiResult<Outcome<T>> {
        let name = TableName::new(table)?;
        if !self.exists(&name)? {
            warn!(table = %name, "table not found");
            return Ok(Outcome::NotFound);
        }
        let handle = self.handle.table(&name)?;
        op(handle.as_ref())
            .map(Outcome::Applied)
            .map_err(|err| err.or_table(table))
    }
}
