// Driver for an HBase-compatible REST gateway: blocking HTTP via `ureq`, JSON bodies.
//
// Endpoints in the quorum are probed once each, in order, at connect time; the first
// one that answers becomes the base URL for the life of the connection.
use std::collections::VecDeque;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use serde::de::DeserializeOwned;
use tracing::{debug, info, warn};
use url::Url;

use crate::core::cell::{DeleteCells, DeleteScope, PutCell, Row};
use crate::core::config::StoreConfig;
use crate::core::driver::{AdminHandle, Connection, Connector, RowScanner, TableHandle};
use crate::core::error::{ApiResult, Error, ErrorKind};
use crate::core::filter::ScanSpec;
use crate::core::schema::{TableDescriptor, TableName};

pub mod model;

use model::{CellSetModel, FilterModel, ScannerModel, TableSchemaModel};

#[derive(Clone, Copy, Debug, Default)]
pub struct RestConnector;

impl RestConnector {
    pub fn new() -> Self {
        Self
    }
}

impl Connector for RestConnector {
    fn connect(&self, config: &StoreConfig) -> ApiResult<Arc<dyn Connection>> {
        config.validate()?;
        let endpoints = endpoint_urls(config)?;
        let mut builder = ureq::AgentBuilder::new();
        if let Some(timeout) = config.timeout() {
            builder = builder.timeout(timeout);
        }
        let agent = builder.build();

        let mut last_failure = None;
        for base_url in endpoints {
            let probe = join(&base_url, &["version", "cluster"])?;
            match agent.get(probe.as_str()).set("Accept", "text/plain").call() {
                Ok(_) => {
                    info!(endpoint = %base_url, "connected to gateway");
                    return Ok(Arc::new(RestConnection {
                        inner: Arc::new(RestInner {
                            base_url,
                            agent,
                            batch: config.scanner_batch,
                            closed: AtomicBool::new(false),
                        }),
                    }));
                }
                Err(ureq::Error::Status(code, _)) => {
                    warn!(endpoint = %base_url, status = code, "gateway endpoint rejected probe");
                    last_failure = Some(
                        Error::new(ErrorKind::Connection)
                            .with_message(format!("gateway {base_url} answered status {code}")),
                    );
                }
                Err(ureq::Error::Transport(err)) => {
                    warn!(endpoint = %base_url, error = %err, "gateway endpoint unreachable");
                    last_failure = Some(
                        Error::new(ErrorKind::Connection)
                            .with_message(format!("gateway {base_url} unreachable"))
                            .with_source(err),
                    );
                }
            }
        }
        Err(last_failure.unwrap_or_else(|| {
            Error::new(ErrorKind::Connection).with_message("no gateway endpoint configured")
        }))
    }
}

/// Quorum entries may be bare hosts (given `client_port`), `host:port`, or full URLs.
pub fn endpoint_urls(config: &StoreConfig) -> ApiResult<Vec<Url>> {
    config
        .quorum
        .iter()
        .map(|host| {
            let host = host.trim();
            let text = if host.contains("://") {
                host.to_string()
            } else if host.contains(':') {
                format!("http://{host}/")
            } else {
                format!("http://{host}:{}/", config.client_port)
            };
            Url::parse(&text).map_err(|err| {
                Error::new(ErrorKind::Usage)
                    .with_message(format!("invalid gateway endpoint `{host}`"))
                    .with_source(err)
            })
        })
        .collect()
}

fn join(base: &Url, segments: &[&str]) -> ApiResult<Url> {
    let mut url = base.clone();
    url.path_segments_mut()
        .map_err(|_| {
            Error::new(ErrorKind::Usage).with_message(format!("gateway url {base} cannot carry a path"))
        })?
        .pop_if_empty()
        .extend(segments);
    Ok(url)
}

fn utf8<'a>(bytes: &'a [u8], what: &str) -> ApiResult<&'a str> {
    std::str::from_utf8(bytes).map_err(|err| {
        Error::new(ErrorKind::Usage)
            .with_message(format!("gateway paths need a UTF-8 {what}"))
            .with_source(err)
    })
}

/// Second path segments the gateway routes to table resources rather than rows.
const RESERVED_ROW_KEYS: &[&str] = &["schema", "exists", "scanner", "regions", ".", ".."];

/// A row key as the second path segment of `/{table}/{row}/..`.
fn row_segment(row: &[u8]) -> ApiResult<&str> {
    let text = utf8(row, "row key")?;
    if text.is_empty() {
        return Err(Error::new(ErrorKind::Usage).with_message("gateway paths need a non-empty row key"));
    }
    if RESERVED_ROW_KEYS.contains(&text) {
        return Err(Error::new(ErrorKind::Usage)
            .with_message(format!("row key `{text}` is a reserved gateway path"))
            .with_row(row.to_vec()));
    }
    Ok(text)
}

struct RestInner {
    base_url: Url,
    agent: ureq::Agent,
    batch: usize,
    closed: AtomicBool,
}

impl RestInner {
    fn execute(&self, method: &str, url: &Url, body: Option<&str>) -> ApiResult<ureq::Response> {
        debug!(method, url = %url, "gateway request");
        let request = self
            .agent
            .request(method, url.as_str())
            .set("Accept", "application/json");
        let response = match body {
            Some(body) => request
                .set("Content-Type", "application/json")
                .send_string(body),
            None => request.call(),
        };
        match response {
            Ok(resp) => Ok(resp),
            Err(ureq::Error::Status(code, resp)) => Err(status_error(code, resp)),
            Err(ureq::Error::Transport(err)) => Err(Error::new(ErrorKind::StoreIo)
                .with_message("gateway request failed")
                .with_source(err)),
        }
    }

    fn url(&self, segments: &[&str]) -> ApiResult<Url> {
        join(&self.base_url, segments)
    }
}

fn status_error(status: u16, response: ureq::Response) -> Error {
    let body = response.into_string().unwrap_or_default();
    let kind = match status {
        404 => ErrorKind::NotFound,
        409 => ErrorKind::AlreadyExists,
        _ => ErrorKind::StoreIo,
    };
    let detail: String = body.trim().chars().take(200).collect();
    if detail.is_empty() {
        Error::new(kind).with_message(format!("gateway status {status}"))
    } else {
        Error::new(kind).with_message(format!("gateway status {status}: {detail}"))
    }
}

fn to_json<T: serde::Serialize>(value: &T) -> ApiResult<String> {
    serde_json::to_string(value).map_err(|err| {
        Error::new(ErrorKind::Internal)
            .with_message("failed to encode request json")
            .with_source(err)
    })
}

fn read_json<R>(response: ureq::Response) -> ApiResult<R>
where
    R: DeserializeOwned,
{
    let body = response.into_string().map_err(|err| {
        Error::new(ErrorKind::StoreIo)
            .with_message("failed to read response body")
            .with_source(err)
    })?;
    serde_json::from_str(&body).map_err(|err| {
        Error::new(ErrorKind::Internal)
            .with_message("invalid response json")
            .with_source(err)
    })
}

pub struct RestConnection {
    inner: Arc<RestInner>,
}

impl RestConnection {
    pub fn base_url(&self) -> &Url {
        &self.inner.base_url
    }

    fn ensure_open(&self) -> ApiResult<()> {
        if self.inner.closed.load(Ordering::SeqCst) {
            return Err(Error::new(ErrorKind::Connection).with_message("connection is closed"));
        }
        Ok(())
    }
}

impl Connection for RestConnection {
    fn admin(&self) -> ApiResult<Box<dyn AdminHandle>> {
        self.ensure_open()?;
        Ok(Box::new(RestAdmin {
            inner: Arc::clone(&self.inner),
        }))
    }

    fn table(&self, name: &TableName) -> ApiResult<Box<dyn TableHandle>> {
        self.ensure_open()?;
        Ok(Box::new(RestTable {
            inner: Arc::clone(&self.inner),
            name: name.clone(),
        }))
    }

    fn close(&self) {
        if !self.inner.closed.swap(true, Ordering::SeqCst) {
            debug!(endpoint = %self.inner.base_url, "gateway connection closed");
        }
    }
}

struct RestAdmin {
    inner: Arc<RestInner>,
}

impl AdminHandle for RestAdmin {
    fn table_exists(&self, name: &TableName) -> ApiResult<bool> {
        let url = self.inner.url(&[name.as_str(), "exists"])?;
        match self.inner.execute("GET", &url, None) {
            Ok(_) => Ok(true),
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(false),
            Err(err) => Err(err.or_table(name.as_str())),
        }
    }

    fn create_table(&self, descriptor: &TableDescriptor) -> ApiResult<()> {
        let url = self.inner.url(&[descriptor.name().as_str(), "schema"])?;
        let body = to_json(&TableSchemaModel::from_descriptor(descriptor))?;
        self.inner
            .execute("PUT", &url, Some(&body))
            .map(|_| ())
            .map_err(|err| err.or_table(descriptor.name().as_str()))
    }

    /// The gateway disables a table itself when its schema is deleted, so this only
    /// confirms the table is still there.
    fn disable_table(&self, name: &TableName) -> ApiResult<()> {
        if self.table_exists(name)? {
            Ok(())
        } else {
            Err(Error::new(ErrorKind::NotFound).with_table(name.as_str()))
        }
    }

    fn delete_table(&self, name: &TableName) -> ApiResult<()> {
        let url = self.inner.url(&[name.as_str(), "schema"])?;
        self.inner
            .execute("DELETE", &url, None)
            .map(|_| ())
            .map_err(|err| err.or_table(name.as_str()))
    }
}

struct RestTable {
    inner: Arc<RestInner>,
    name: TableName,
}

impl TableHandle for RestTable {
    fn put(&self, put: &PutCell) -> ApiResult<()> {
        let column = model::column_spec(&put.family, &put.qualifier);
        let url = self.inner.url(&[
            self.name.as_str(),
            row_segment(&put.row)?,
            utf8(&column, "column")?,
        ])?;
        let body = to_json(&CellSetModel::single(
            &put.row,
            &put.family,
            &put.qualifier,
            &put.value,
        ))?;
        self.inner
            .execute("PUT", &url, Some(&body))
            .map(|_| ())
            .map_err(|err| err.or_table(self.name.as_str()).with_row(put.row.clone()))
    }

    fn delete(&self, delete: &DeleteCells) -> ApiResult<()> {
        let row = row_segment(&delete.row)?;
        let column;
        let timestamp;
        let url = match &delete.scope {
            DeleteScope::Row => self.inner.url(&[self.name.as_str(), row])?,
            DeleteScope::Family(family) => {
                self.inner
                    .url(&[self.name.as_str(), row, utf8(family, "column family")?])?
            }
            DeleteScope::Column { family, qualifier } => {
                column = model::column_spec(family, qualifier);
                self.inner
                    .url(&[self.name.as_str(), row, utf8(&column, "column")?])?
            }
            DeleteScope::Version {
                family,
                qualifier,
                timestamp: at,
            } => {
                column = model::column_spec(family, qualifier);
                timestamp = at.to_string();
                self.inner.url(&[
                    self.name.as_str(),
                    row,
                    utf8(&column, "column")?,
                    &timestamp,
                ])?
            }
            // An untimestamped column delete removes every version, so pin the latest one.
            DeleteScope::LatestVersion { family, qualifier } => {
                let current = self.get(&delete.row)?;
                let Some(latest) = current.latest(family, qualifier) else {
                    return Ok(());
                };
                return self.delete(&DeleteCells {
                    row: delete.row.clone(),
                    scope: DeleteScope::Version {
                        family: family.clone(),
                        qualifier: qualifier.clone(),
                        timestamp: latest.timestamp,
                    },
                });
            }
        };
        match self.inner.execute("DELETE", &url, None) {
            Ok(_) => Ok(()),
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(()),
            Err(err) => Err(err.or_table(self.name.as_str()).with_row(delete.row.clone())),
        }
    }

    fn get(&self, row: &[u8]) -> ApiResult<Row> {
        let url = self.inner.url(&[self.name.as_str(), row_segment(row)?])?;
        let response = match self.inner.execute("GET", &url, None) {
            Ok(response) => response,
            Err(err) if err.kind() == ErrorKind::NotFound => return Ok(Row::empty(row.to_vec())),
            Err(err) => return Err(err.or_table(self.name.as_str())),
        };
        let cells = read_json::<CellSetModel>(response)?
            .into_rows()?
            .into_iter()
            .filter(|found| found.key().as_ref() == row)
            .flat_map(Row::into_cells)
            .collect();
        Ok(Row::new(row.to_vec(), cells))
    }

    fn scanner(&self, spec: &ScanSpec) -> ApiResult<Box<dyn RowScanner>> {
        let filter = if spec.filter.is_empty() {
            None
        } else {
            Some(to_json(&FilterModel::from_filter_list(&spec.filter))?)
        };
        let body = to_json(&ScannerModel {
            batch: Some(spec.batch.unwrap_or(self.inner.batch)),
            start_row: spec.start_row.as_deref().map(model::encode),
            end_row: spec.stop_row.as_deref().map(model::encode),
            filter,
        })?;
        let url = self.inner.url(&[self.name.as_str(), "scanner"])?;
        let response = self
            .inner
            .execute("PUT", &url, Some(&body))
            .map_err(|err| err.or_table(self.name.as_str()))?;
        let location = response.header("Location").ok_or_else(|| {
            Error::new(ErrorKind::Internal)
                .with_message("gateway did not return a scanner location")
                .with_table(self.name.as_str())
        })?;
        let location = self.inner.base_url.join(location).map_err(|err| {
            Error::new(ErrorKind::Internal)
                .with_message("gateway returned an invalid scanner location")
                .with_source(err)
        })?;
        debug!(table = %self.name, scanner = %location, "scanner opened");
        Ok(Box::new(RestScanner {
            inner: Arc::clone(&self.inner),
            location,
            pending: VecDeque::new(),
            exhausted: false,
        }))
    }
}

/// Batches may split a row's cells; a row is handed out only once the next key
/// (or the end of the scan) has been seen.
struct RestScanner {
    inner: Arc<RestInner>,
    location: Url,
    pending: VecDeque<Row>,
    exhausted: bool,
}

impl RestScanner {
    fn fetch(&mut self) -> ApiResult<()> {
        let response = self.inner.execute("GET", &self.location, None)?;
        if response.status() == 204 {
            self.exhausted = true;
            return Ok(());
        }
        let rows = read_json::<CellSetModel>(response)?.into_rows()?;
        if rows.is_empty() {
            self.exhausted = true;
            return Ok(());
        }
        for row in rows {
            let continues_last = self
                .pending
                .back()
                .is_some_and(|last| last.key() == row.key());
            if continues_last {
                if let Some(last) = self.pending.back_mut() {
                    last.extend(row.into_cells());
                    continue;
                }
            }
            self.pending.push_back(row);
        }
        Ok(())
    }
}

impl RowScanner for RestScanner {
    fn next_row(&mut self) -> ApiResult<Option<Row>> {
        loop {
            if self.pending.len() > 1 || self.exhausted {
                return Ok(self.pending.pop_front());
            }
            self.fetch()?;
        }
    }
}

impl Drop for RestScanner {
    fn drop(&mut self) {
        if let Err(err) = self.inner.execute("DELETE", &self.location, None) {
            debug!(scanner = %self.location, error = %err, "scanner release failed");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{endpoint_urls, join, row_segment};
    use crate::core::error::ErrorKind;
    use crate::core::config::StoreConfig;
    use url::Url;

    #[test]
    fn endpoints_take_client_port_unless_given() {
        let config = StoreConfig::new(["hadoop101", "hadoop102:8080", "https://gw.example/hbase/"])
            .with_client_port(2181);
        let urls: Vec<String> = endpoint_urls(&config)
            .expect("urls")
            .into_iter()
            .map(String::from)
            .collect();
        assert_eq!(
            urls,
            vec![
                "http://hadoop101:2181/",
                "http://hadoop102:8080/",
                "https://gw.example/hbase/",
            ]
        );
    }

    #[test]
    fn join_encodes_segments() {
        let base = Url::parse("http://gw:8080/hbase/").expect("url");
        let url = join(&base, &["student", "row 1", "info:name"]).expect("join");
        assert_eq!(url.as_str(), "http://gw:8080/hbase/student/row%201/info:name");
    }

    #[test]
    fn reserved_row_keys_are_usage_errors() {
        for key in ["schema", "exists", "scanner", "regions", "", ".."] {
            let err = row_segment(key.as_bytes()).expect_err(key);
            assert_eq!(err.kind(), ErrorKind::Usage);
        }
        assert_eq!(row_segment(b"schemas").expect("row"), "schemas");
        assert_eq!(row_segment(b"1001").expect("row"), "1001");
    }
}
