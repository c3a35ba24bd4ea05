//! Purpose: In-test REST gateway speaking the HBase REST JSON subset over loopback.
//! Exports: `TestGateway`, `TestResult`.
//! Role: Lets integration tests drive `RestConnector` against real HTTP, backed by `MemoryStore`.
//! Invariants: Binds 127.0.0.1 on an ephemeral port; the server stops when the gateway drops.
//! Invariants: A scanner response carries at most `batch` cells, so rows may span responses.
//! Invariants: Column deletes without a timestamp remove every version of the column.
#![allow(dead_code)]

use std::collections::HashMap;
use std::net::TcpListener;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread::JoinHandle;
use std::time::Duration;

use axum::Json;
use axum::Router;
use axum::extract::{Path, State};
use axum::http::{StatusCode, header};
use axum::response::{IntoResponse, Response};
use axum::routing::{delete, get};
use bytes::Bytes;
use serde::de::DeserializeOwned;
use tokio::sync::oneshot;

use widecolumn::core::cell::{DeleteCells, DeleteScope, PutCell, Row};
use widecolumn::core::config::StoreConfig;
use widecolumn::core::driver::{Connection, Connector, RowScanner, TableHandle};
use widecolumn::core::error::{ApiResult, Error, ErrorKind};
use widecolumn::core::filter::{FilterList, ScanSpec};
use widecolumn::core::memory::MemoryStore;
use widecolumn::core::rest::model::{self, CellSetModel, FilterModel, ScannerModel, TableSchemaModel};
use widecolumn::core::schema::TableName;

pub type TestResult<T> = Result<T, Box<dyn std::error::Error>>;

const DEFAULT_BATCH: usize = 100;

pub struct TestGateway {
    store: MemoryStore,
    base_url: String,
    stop: Option<oneshot::Sender<()>>,
    server: Option<JoinHandle<()>>,
}

impl TestGateway {
    pub fn start() -> TestResult<Self> {
        Self::with_store(MemoryStore::new())
    }

    pub fn with_store(store: MemoryStore) -> TestResult<Self> {
        let connection = store.connect(&StoreConfig::default())?;
        let gateway = Gateway {
            connection,
            scanners: Arc::new(Mutex::new(HashMap::new())),
            next_scanner: Arc::new(AtomicU64::new(1)),
        };
        let app = Router::new()
            .route("/:table/:item", get(item_get).put(item_put).delete(item_delete))
            .route(
                "/:table/:item/:leaf",
                get(leaf_get).put(leaf_put).delete(leaf_delete),
            )
            .route("/:table/:item/:leaf/:timestamp", delete(version_delete))
            .with_state(gateway);

        let listener = TcpListener::bind("127.0.0.1:0")?;
        listener.set_nonblocking(true)?;
        let base_url = format!("http://{}/", listener.local_addr()?);
        let (stop, stopped) = oneshot::channel::<()>();
        let server = std::thread::spawn(move || {
            let runtime = tokio::runtime::Builder::new_multi_thread()
                .worker_threads(2)
                .enable_all()
                .build()
                .expect("gateway runtime");
            runtime.block_on(async move {
                let listener = tokio::net::TcpListener::from_std(listener).expect("gateway listener");
                axum::serve(listener, app)
                    .with_graceful_shutdown(async {
                        let _ = stopped.await;
                    })
                    .await
                    .expect("gateway serve");
            });
        });

        Ok(Self {
            store,
            base_url,
            stop: Some(stop),
            server: Some(server),
        })
    }

    /// The store behind the gateway; fault injection and handle counts apply server-side.
    pub fn store(&self) -> &MemoryStore {
        &self.store
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn config(&self) -> StoreConfig {
        StoreConfig::new([self.base_url.clone()]).with_timeout(Duration::from_secs(5))
    }
}

impl Drop for TestGateway {
    fn drop(&mut self) {
        if let Some(stop) = self.stop.take() {
            let _ = stop.send(());
        }
        if let Some(server) = self.server.take() {
            let _ = server.join();
        }
    }
}

struct OpenScanner {
    rows: Box<dyn RowScanner>,
    batch: usize,
    carry: Option<Row>,
}

impl OpenScanner {
    fn next_batch(&mut self) -> ApiResult<Vec<Row>> {
        let mut rows = Vec::new();
        let mut room = self.batch;
        while room > 0 {
            let row = match self.carry.take() {
                Some(row) => row,
                None => match self.rows.next_row()? {
                    Some(row) => row,
                    None => break,
                },
            };
            let key = row.key().clone();
            let mut cells = row.into_cells();
            if cells.len() > room {
                let rest = cells.split_off(room);
                self.carry = Some(Row::new(key.clone(), rest));
            }
            room -= cells.len();
            rows.push(Row::new(key, cells));
        }
        Ok(rows)
    }
}

#[derive(Clone)]
struct Gateway {
    connection: Arc<dyn Connection>,
    scanners: Arc<Mutex<HashMap<u64, OpenScanner>>>,
    next_scanner: Arc<AtomicU64>,
}

struct Failure {
    status: StatusCode,
    message: String,
}

impl Failure {
    fn bad_request(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            message: message.into(),
        }
    }

    fn not_found() -> Self {
        Self {
            status: StatusCode::NOT_FOUND,
            message: "not found".to_string(),
        }
    }
}

impl From<Error> for Failure {
    fn from(err: Error) -> Self {
        let status = match err.kind() {
            ErrorKind::NotFound => StatusCode::NOT_FOUND,
            ErrorKind::AlreadyExists => StatusCode::CONFLICT,
            ErrorKind::Usage => StatusCode::BAD_REQUEST,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        Self {
            status,
            message: err.to_string(),
        }
    }
}

impl IntoResponse for Failure {
    fn into_response(self) -> Response {
        (self.status, self.message).into_response()
    }
}

type Reply = Result<Response, Failure>;

fn parse<T: DeserializeOwned>(body: &str) -> Result<T, Failure> {
    serde_json::from_str(body).map_err(|err| Failure::bad_request(err.to_string()))
}

fn decode_opt(text: Option<&str>) -> Result<Option<Bytes>, Failure> {
    text.map(model::decode).transpose().map_err(Failure::from)
}

async fn item_get(
    State(gateway): State<Gateway>,
    Path((table, item)): Path<(String, String)>,
) -> Reply {
    if table == "version" && item == "cluster" {
        return Ok("widecolumn-test-gateway".into_response());
    }
    let name = TableName::new(table)?;
    match item.as_str() {
        "exists" => gateway.exists(&name),
        row => gateway.get_row(&name, row),
    }
}

async fn item_put(
    State(gateway): State<Gateway>,
    Path((table, item)): Path<(String, String)>,
    body: String,
) -> Reply {
    let name = TableName::new(table)?;
    match item.as_str() {
        "schema" => gateway.create_table(&name, &body),
        "scanner" => gateway.open_scanner(&name, &body),
        _ => gateway.put_cells(&name, &body),
    }
}

async fn item_delete(
    State(gateway): State<Gateway>,
    Path((table, item)): Path<(String, String)>,
) -> Reply {
    let name = TableName::new(table)?;
    match item.as_str() {
        "schema" => gateway.drop_table(&name),
        row => gateway.delete_cells(&name, row, DeleteScope::Row),
    }
}

async fn leaf_get(
    State(gateway): State<Gateway>,
    Path((_table, item, leaf)): Path<(String, String, String)>,
) -> Reply {
    if item != "scanner" {
        return Err(Failure::not_found());
    }
    gateway.next_batch(&leaf)
}

async fn leaf_put(
    State(gateway): State<Gateway>,
    Path((table, _row, _column)): Path<(String, String, String)>,
    body: String,
) -> Reply {
    let name = TableName::new(table)?;
    gateway.put_cells(&name, &body)
}

async fn leaf_delete(
    State(gateway): State<Gateway>,
    Path((table, item, leaf)): Path<(String, String, String)>,
) -> Reply {
    if item == "scanner" {
        return gateway.close_scanner(&leaf);
    }
    let name = TableName::new(table)?;
    // Without a timestamp a column delete removes every version.
    let scope = match model::split_column(leaf.as_bytes()) {
        Ok((family, qualifier)) => DeleteScope::Column { family, qualifier },
        Err(_) => DeleteScope::Family(Bytes::from(leaf)),
    };
    gateway.delete_cells(&name, &item, scope)
}

async fn version_delete(
    State(gateway): State<Gateway>,
    Path((table, row, column, timestamp)): Path<(String, String, String, String)>,
) -> Reply {
    let name = TableName::new(table)?;
    let timestamp: u64 = timestamp
        .parse()
        .map_err(|_| Failure::bad_request("timestamp must be a number"))?;
    let (family, qualifier) = model::split_column(column.as_bytes())?;
    gateway.delete_cells(
        &name,
        &row,
        DeleteScope::Version {
            family,
            qualifier,
            timestamp,
        },
    )
}

impl Gateway {
    fn table(&self, name: &TableName) -> Result<Box<dyn TableHandle>, Failure> {
        Ok(self.connection.table(name)?)
    }

    fn scanners(&self) -> MutexGuard<'_, HashMap<u64, OpenScanner>> {
        self.scanners.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn exists(&self, name: &TableName) -> Reply {
        if self.connection.admin()?.table_exists(name)? {
            Ok(StatusCode::OK.into_response())
        } else {
            Err(Failure::not_found())
        }
    }

    fn create_table(&self, name: &TableName, body: &str) -> Reply {
        let descriptor = parse::<TableSchemaModel>(body)?.into_descriptor()?;
        if descriptor.name() != name {
            return Err(Failure::bad_request("schema name does not match path"));
        }
        self.connection.admin()?.create_table(&descriptor)?;
        Ok(StatusCode::CREATED.into_response())
    }

    fn drop_table(&self, name: &TableName) -> Reply {
        let admin = self.connection.admin()?;
        if !admin.table_exists(name)? {
            return Err(Failure::not_found());
        }
        admin.disable_table(name)?;
        admin.delete_table(name)?;
        Ok(StatusCode::OK.into_response())
    }

    fn get_row(&self, name: &TableName, row: &str) -> Reply {
        let found = self.table(name)?.get(row.as_bytes())?;
        if found.is_empty() {
            return Err(Failure::not_found());
        }
        Ok(Json(CellSetModel::from_rows(&[found])).into_response())
    }

    fn put_cells(&self, name: &TableName, body: &str) -> Reply {
        let rows = parse::<CellSetModel>(body)?.into_rows()?;
        let table = self.table(name)?;
        for row in rows {
            for cell in row.cells() {
                table.put(&PutCell {
                    row: cell.row.clone(),
                    family: cell.family.clone(),
                    qualifier: cell.qualifier.clone(),
                    value: cell.value.clone(),
                })?;
            }
        }
        Ok(StatusCode::OK.into_response())
    }

    fn delete_cells(&self, name: &TableName, row: &str, scope: DeleteScope) -> Reply {
        self.table(name)?.delete(&DeleteCells {
            row: Bytes::copy_from_slice(row.as_bytes()),
            scope,
        })?;
        Ok(StatusCode::OK.into_response())
    }

    fn open_scanner(&self, name: &TableName, body: &str) -> Reply {
        let request = parse::<ScannerModel>(body)?;
        let filter = match request.filter.as_deref() {
            Some(text) => parse::<FilterModel>(text)?.into_filter_list()?,
            None => FilterList::default(),
        };
        let spec = ScanSpec {
            start_row: decode_opt(request.start_row.as_deref())?,
            stop_row: decode_opt(request.end_row.as_deref())?,
            filter,
            batch: request.batch,
        };
        let rows = self.table(name)?.scanner(&spec)?;
        let id = self.next_scanner.fetch_add(1, Ordering::SeqCst);
        self.scanners().insert(
            id,
            OpenScanner {
                rows,
                batch: request.batch.unwrap_or(DEFAULT_BATCH).max(1),
                carry: None,
            },
        );
        let location = format!("/{name}/scanner/{id}");
        Ok((StatusCode::CREATED, [(header::LOCATION, location)]).into_response())
    }

    fn next_batch(&self, id: &str) -> Reply {
        let id: u64 = id.parse().map_err(|_| Failure::not_found())?;
        let mut scanners = self.scanners();
        let scanner = scanners.get_mut(&id).ok_or_else(Failure::not_found)?;
        let rows = scanner.next_batch()?;
        if rows.is_empty() {
            return Ok(StatusCode::NO_CONTENT.into_response());
        }
        Ok(Json(CellSetModel::from_rows(&rows)).into_response())
    }

    fn close_scanner(&self, id: &str) -> Reply {
        let id: u64 = id.parse().map_err(|_| Failure::not_found())?;
        match self.scanners().remove(&id) {
            Some(_) => Ok(StatusCode::OK.into_response()),
            None => Err(Failure::not_found()),
        }
    }
}
