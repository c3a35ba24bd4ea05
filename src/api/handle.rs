//! Purpose: Own the one shared store connection and hand out scoped per-call handles.
//! Exports: `StoreHandle`.
//! Role: Built once by the composition root and cloned into every facade.
//! Invariants: At most one `Connector::connect` succeeds per handle, even under
//! concurrent first use; after `shutdown` the handle never reconnects.
//! Invariants: Admin and table handles are per call and released on drop.
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tracing::{debug, info};

use crate::core::config::StoreConfig;
use crate::core::driver::{AdminHandle, Connection, Connector, TableHandle};
use crate::core::error::{ApiResult, Error, ErrorKind};
use crate::core::schema::TableName;

enum HandleState {
    Unopened,
    Open(Arc<dyn Connection>),
    ShutDown,
}

struct HandleInner {
    connector: Box<dyn Connector>,
    config: StoreConfig,
    state: Mutex<HandleState>,
}

#[derive(Clone)]
pub struct StoreHandle {
    inner: Arc<HandleInner>,
}

impl fmt::Debug for StoreHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StoreHandle")
            .field("quorum", &self.inner.config.quorum)
            .field("client_port", &self.inner.config.client_port)
            .field("connected", &self.is_connected())
            .finish()
    }
}

impl StoreHandle {
    pub fn new(connector: impl Connector + 'static, config: StoreConfig) -> Self {
        Self {
            inner: Arc::new(HandleInner {
                connector: Box::new(connector),
                config,
                state: Mutex::new(HandleState::Unopened),
            }),
        }
    }

    pub fn config(&self) -> &StoreConfig {
        &self.inner.config
    }

    /// Eager `acquire` for startup code that wants to fail before serving calls.
    pub fn connect(&self) -> ApiResult<()> {
        self.acquire().map(|_| ())
    }

    /// Returns the shared connection, opening it on first use. Callers racing the
    /// first use wait on the one in-flight attempt. A failed attempt leaves the handle
    /// unopened; nothing here retries.
    pub fn acquire(&self) -> ApiResult<Arc<dyn Connection>> {
        let mut state = self.state();
        if let HandleState::Open(connection) = &*state {
            return Ok(Arc::clone(connection));
        }
        if matches!(*state, HandleState::ShutDown) {
            return Err(Error::new(ErrorKind::Connection).with_message("store handle is shut down"));
        }
        let connection = self.inner.connector.connect(&self.inner.config)?;
        info!(quorum = ?self.inner.config.quorum, "store connection established");
        *state = HandleState::Open(Arc::clone(&connection));
        Ok(connection)
    }

    /// Per-call release. The connection is long-lived, so this only drops the caller's
    /// reference.
    pub fn release(&self, connection: Arc<dyn Connection>) {
        drop(connection);
    }

    /// Idempotent; the first call closes the connection.
    pub fn shutdown(&self) {
        let mut state = self.state();
        match std::mem::replace(&mut *state, HandleState::ShutDown) {
            HandleState::Open(connection) => {
                connection.close();
                info!("store connection shut down");
            }
            HandleState::Unopened => debug!("store handle shut down before first use"),
            HandleState::ShutDown => {}
        }
    }

    pub fn is_connected(&self) -> bool {
        matches!(&*self.state(), HandleState::Open(_))
    }

    pub fn is_shut_down(&self) -> bool {
        matches!(&*self.state(), HandleState::ShutDown)
    }

    pub fn admin(&self) -> ApiResult<Box<dyn AdminHandle>> {
        self.acquire()?.admin()
    }

    pub fn table(&self, name: &TableName) -> ApiResult<Box<dyn TableHandle>> {
        self.acquire()?
            .table(name)
            .map_err(|err| err.or_table(name.as_str()))
    }

    fn state(&self) -> MutexGuard<'_, HandleState> {
        self.inner
            .state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }
}
