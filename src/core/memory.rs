// In-process reference store: ordered rows, per-column version history, disable state,
// open-handle accounting, and one-shot fault injection for exercising failure paths.
use std::collections::{BTreeMap, HashMap};
use std::ops::Bound;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use bytes::Bytes;
use tracing::debug;

use crate::core::cell::{Cell, DeleteCells, DeleteScope, PutCell, Row};
use crate::core::config::StoreConfig;
use crate::core::driver::{AdminHandle, Connection, Connector, RowScanner, TableHandle};
use crate::core::error::{ApiResult, Error, ErrorKind};
use crate::core::filter::ScanSpec;
use crate::core::schema::{TableDescriptor, TableName};

#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
pub enum Fault {
    Connect,
    TableExists,
    CreateTable,
    DisableTable,
    DeleteTable,
    Put,
    Delete,
    Get,
    OpenScanner,
    NextRow,
}

type Columns = BTreeMap<(Bytes, Bytes), Vec<Version>>;

#[derive(Clone, Debug)]
struct Version {
    timestamp: u64,
    value: Bytes,
}

#[derive(Debug)]
struct MemTable {
    descriptor: TableDescriptor,
    enabled: bool,
    rows: BTreeMap<Bytes, Columns>,
}

#[derive(Default)]
struct Shared {
    tables: RwLock<BTreeMap<TableName, MemTable>>,
    clock: AtomicU64,
    open_handles: AtomicUsize,
    connects: AtomicUsize,
    faults: Mutex<HashMap<Fault, usize>>,
}

impl Shared {
    fn read(&self) -> RwLockReadGuard<'_, BTreeMap<TableName, MemTable>> {
        self.tables.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, BTreeMap<TableName, MemTable>> {
        self.tables.write().unwrap_or_else(PoisonError::into_inner)
    }

    fn take_fault(&self, fault: Fault) -> ApiResult<()> {
        let mut faults = self.faults.lock().unwrap_or_else(PoisonError::into_inner);
        match faults.get_mut(&fault) {
            Some(remaining) if *remaining > 0 => {
                *remaining -= 1;
                let kind = match fault {
                    Fault::Connect => ErrorKind::Connection,
                    _ => ErrorKind::StoreIo,
                };
                Err(Error::new(kind).with_message(format!("injected {fault:?} failure")))
            }
            _ => Ok(()),
        }
    }

    fn tick(&self) -> u64 {
        self.clock.fetch_add(1, Ordering::SeqCst) + 1
    }
}

/// Cloning shares the same tables; every clone observes the same handle counts.
#[derive(Clone, Default)]
pub struct MemoryStore {
    shared: Arc<Shared>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Arms `fault` so that the next matching driver call fails once.
    pub fn fail_next(&self, fault: Fault) {
        let mut faults = self
            .shared
            .faults
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        *faults.entry(fault).or_default() += 1;
    }

    /// Admin, table, and scanner handles currently checked out.
    pub fn open_handles(&self) -> usize {
        self.shared.open_handles.load(Ordering::SeqCst)
    }

    pub fn connect_count(&self) -> usize {
        self.shared.connects.load(Ordering::SeqCst)
    }

    pub fn is_enabled(&self, table: &str) -> Option<bool> {
        let name = TableName::new(table).ok()?;
        self.shared.read().get(&name).map(|table| table.enabled)
    }

    pub fn descriptor(&self, table: &str) -> Option<TableDescriptor> {
        let name = TableName::new(table).ok()?;
        self.shared
            .read()
            .get(&name)
            .map(|table| table.descriptor.clone())
    }
}

impl Connector for MemoryStore {
    fn connect(&self, _config: &StoreConfig) -> ApiResult<Arc<dyn Connection>> {
        self.shared.take_fault(Fault::Connect)?;
        self.shared.connects.fetch_add(1, Ordering::SeqCst);
        debug!("memory store connection opened");
        Ok(Arc::new(MemoryConnection {
            shared: Arc::clone(&self.shared),
            closed: AtomicBool::new(false),
        }))
    }
}

struct MemoryConnection {
    shared: Arc<Shared>,
    closed: AtomicBool,
}

impl MemoryConnection {
    fn guard(&self) -> ApiResult<HandleGuard> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(Error::new(ErrorKind::Connection).with_message("connection is closed"));
        }
        Ok(HandleGuard::new(&self.shared))
    }
}

impl Connection for MemoryConnection {
    fn admin(&self) -> ApiResult<Box<dyn AdminHandle>> {
        Ok(Box::new(MemoryAdmin {
            guard: self.guard()?,
        }))
    }

    fn table(&self, name: &TableName) -> ApiResult<Box<dyn TableHandle>> {
        Ok(Box::new(MemoryTable {
            guard: self.guard()?,
            name: name.clone(),
        }))
    }

    fn close(&self) {
        if !self.closed.swap(true, Ordering::SeqCst) {
            debug!("memory store connection closed");
        }
    }
}

struct HandleGuard {
    shared: Arc<Shared>,
}

impl HandleGuard {
    fn new(shared: &Arc<Shared>) -> Self {
        shared.open_handles.fetch_add(1, Ordering::SeqCst);
        Self {
            shared: Arc::clone(shared),
        }
    }
}

impl Drop for HandleGuard {
    fn drop(&mut self) {
        self.shared.open_handles.fetch_sub(1, Ordering::SeqCst);
    }
}

struct MemoryAdmin {
    guard: HandleGuard,
}

impl AdminHandle for MemoryAdmin {
    fn table_exists(&self, name: &TableName) -> ApiResult<bool> {
        let shared = &self.guard.shared;
        shared.take_fault(Fault::TableExists)?;
        Ok(shared.read().contains_key(name))
    }

    fn create_table(&self, descriptor: &TableDescriptor) -> ApiResult<()> {
        let shared = &self.guard.shared;
        shared.take_fault(Fault::CreateTable)?;
        let mut tables = shared.write();
        if tables.contains_key(descriptor.name()) {
            return Err(Error::new(ErrorKind::AlreadyExists).with_table(descriptor.name().as_str()));
        }
        tables.insert(
            descriptor.name().clone(),
            MemTable {
                descriptor: descriptor.clone(),
                enabled: true,
                rows: BTreeMap::new(),
            },
        );
        Ok(())
    }

    /// Disabling an already disabled table succeeds.
    fn disable_table(&self, name: &TableName) -> ApiResult<()> {
        let shared = &self.guard.shared;
        shared.take_fault(Fault::DisableTable)?;
        let mut tables = shared.write();
        let table = tables
            .get_mut(name)
            .ok_or_else(|| Error::new(ErrorKind::NotFound).with_table(name.as_str()))?;
        table.enabled = false;
        Ok(())
    }

    fn delete_table(&self, name: &TableName) -> ApiResult<()> {
        let shared = &self.guard.shared;
        shared.take_fault(Fault::DeleteTable)?;
        let mut tables = shared.write();
        match tables.get(name).map(|table| table.enabled) {
            None => Err(Error::new(ErrorKind::NotFound).with_table(name.as_str())),
            Some(true) => Err(Error::new(ErrorKind::StoreIo)
                .with_message("table must be disabled before delete")
                .with_table(name.as_str())),
            Some(false) => {
                tables.remove(name);
                Ok(())
            }
        }
    }
}

struct MemoryTable {
    guard: HandleGuard,
    name: TableName,
}

fn usable<'a>(table: Option<&'a MemTable>, name: &TableName) -> ApiResult<&'a MemTable> {
    let table = table.ok_or_else(|| Error::new(ErrorKind::NotFound).with_table(name.as_str()))?;
    if !table.enabled {
        return Err(Error::new(ErrorKind::StoreIo)
            .with_message("table is disabled")
            .with_table(name.as_str()));
    }
    Ok(table)
}

fn usable_mut<'a>(table: Option<&'a mut MemTable>, name: &TableName) -> ApiResult<&'a mut MemTable> {
    let table = table.ok_or_else(|| Error::new(ErrorKind::NotFound).with_table(name.as_str()))?;
    if !table.enabled {
        return Err(Error::new(ErrorKind::StoreIo)
            .with_message("table is disabled")
            .with_table(name.as_str()));
    }
    Ok(table)
}

fn check_family(table: &MemTable, family: &[u8], name: &TableName) -> ApiResult<u32> {
    table
        .descriptor
        .family(family)
        .map(|family| family.max_versions())
        .ok_or_else(|| {
            Error::new(ErrorKind::StoreIo)
                .with_message(format!(
                    "unknown column family `{}`",
                    String::from_utf8_lossy(family)
                ))
                .with_table(name.as_str())
        })
}

fn latest_row(key: &Bytes, columns: &Columns) -> Row {
    let cells = columns
        .iter()
        .filter_map(|((family, qualifier), versions)| {
            versions.last().map(|version| Cell {
                row: key.clone(),
                family: family.clone(),
                qualifier: qualifier.clone(),
                value: version.value.clone(),
                timestamp: version.timestamp,
            })
        })
        .collect();
    Row::new(key.clone(), cells)
}

impl TableHandle for MemoryTable {
    fn put(&self, put: &PutCell) -> ApiResult<()> {
        let shared = &self.guard.shared;
        shared.take_fault(Fault::Put)?;
        let mut tables = shared.write();
        let table = usable_mut(tables.get_mut(&self.name), &self.name)?;
        let max_versions = check_family(table, &put.family, &self.name)? as usize;
        let versions = table
            .rows
            .entry(put.row.clone())
            .or_default()
            .entry((put.family.clone(), put.qualifier.clone()))
            .or_default();
        versions.push(Version {
            timestamp: shared.tick(),
            value: put.value.clone(),
        });
        if versions.len() > max_versions {
            let excess = versions.len() - max_versions;
            versions.drain(..excess);
        }
        Ok(())
    }

    fn delete(&self, delete: &DeleteCells) -> ApiResult<()> {
        let shared = &self.guard.shared;
        shared.take_fault(Fault::Delete)?;
        let mut tables = shared.write();
        let table = usable_mut(tables.get_mut(&self.name), &self.name)?;
        match &delete.scope {
            DeleteScope::Row => {
                table.rows.remove(&delete.row);
            }
            DeleteScope::Family(family) => {
                check_family(table, family, &self.name)?;
                if let Some(columns) = table.rows.get_mut(&delete.row) {
                    columns.retain(|(column_family, _), _| column_family != family);
                }
            }
            DeleteScope::Column { family, qualifier } => {
                check_family(table, family, &self.name)?;
                if let Some(columns) = table.rows.get_mut(&delete.row) {
                    columns.remove(&(family.clone(), qualifier.clone()));
                }
            }
            DeleteScope::LatestVersion { family, qualifier } => {
                check_family(table, family, &self.name)?;
                if let Some(columns) = table.rows.get_mut(&delete.row) {
                    let key = (family.clone(), qualifier.clone());
                    if let Some(versions) = columns.get_mut(&key) {
                        versions.pop();
                        if versions.is_empty() {
                            columns.remove(&key);
                        }
                    }
                }
            }
            DeleteScope::Version {
                family,
                qualifier,
                timestamp,
            } => {
                check_family(table, family, &self.name)?;
                if let Some(columns) = table.rows.get_mut(&delete.row) {
                    let key = (family.clone(), qualifier.clone());
                    if let Some(versions) = columns.get_mut(&key) {
                        versions.retain(|version| version.timestamp != *timestamp);
                        if versions.is_empty() {
                            columns.remove(&key);
                        }
                    }
                }
            }
        }
        if table
            .rows
            .get(&delete.row)
            .is_some_and(|columns| columns.is_empty())
        {
            table.rows.remove(&delete.row);
        }
        Ok(())
    }

    fn get(&self, row: &[u8]) -> ApiResult<Row> {
        let shared = &self.guard.shared;
        shared.take_fault(Fault::Get)?;
        let tables = shared.read();
        let table = usable(tables.get(&self.name), &self.name)?;
        let key = Bytes::copy_from_slice(row);
        Ok(match table.rows.get(&key) {
            Some(columns) => latest_row(&key, columns),
            None => Row::empty(key),
        })
    }

    fn scanner(&self, spec: &ScanSpec) -> ApiResult<Box<dyn RowScanner>> {
        let shared = &self.guard.shared;
        shared.take_fault(Fault::OpenScanner)?;
        usable(shared.read().get(&self.name), &self.name)?;
        Ok(Box::new(MemoryScanner {
            guard: HandleGuard::new(shared),
            name: self.name.clone(),
            spec: spec.clone(),
            cursor: None,
            done: false,
        }))
    }
}

/// Reads lazily: each call resumes after the last row it visited.
struct MemoryScanner {
    guard: HandleGuard,
    name: TableName,
    spec: ScanSpec,
    cursor: Option<Bytes>,
    done: bool,
}

impl RowScanner for MemoryScanner {
    fn next_row(&mut self) -> ApiResult<Option<Row>> {
        if self.done {
            return Ok(None);
        }
        let shared = &self.guard.shared;
        shared.take_fault(Fault::NextRow)?;
        let tables = shared.read();
        let table = usable(tables.get(&self.name), &self.name)?;

        let lower: Bound<Bytes> = match (&self.cursor, &self.spec.start_row) {
            (Some(cursor), _) => Bound::Excluded(cursor.clone()),
            (None, Some(start)) => Bound::Included(start.clone()),
            (None, None) => Bound::Unbounded,
        };
        for (key, columns) in table.rows.range((lower, Bound::Unbounded)) {
            if self.spec.is_past_stop(key) {
                break;
            }
            self.cursor = Some(key.clone());
            let row = latest_row(key, columns);
            if !row.is_empty() && self.spec.filter.matches(&row) {
                return Ok(Some(row));
            }
        }
        self.done = true;
        Ok(None)
    }
}
