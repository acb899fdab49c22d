//! A connection opened on first use and held for its owner's lifetime.

use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use asupersync::sync::Mutex;
use asupersync::{Cx, Outcome};

use crate::config::ConnectionConfig;
use crate::connection::Connection;
use crate::error::Error;
use crate::row::Row;
use crate::try_outcome;
use crate::value::Value;

/// Wraps a connector so the underlying connection is only opened when the
/// first statement runs.
///
/// Concurrent first use is serialized by an async mutex: exactly one connect
/// attempt runs, later callers reuse the stored connection. A failed connect
/// leaves the slot empty so the next statement retries.
///
/// # Example
///
/// ```ignore
/// let conn = LazyConnection::new(ConnectionConfig::from_env()?, |config| async move {
///     MyDriver::connect(&config).await
/// });
/// let engine = RecordEngine::new(conn, registry)?;
/// ```
pub struct LazyConnection<C, F> {
    config: ConnectionConfig,
    connector: F,
    slot: Mutex<Option<Arc<C>>>,
    connected: AtomicBool,
}

impl<C, F, Fut> LazyConnection<C, F>
where
    C: Connection,
    F: Fn(ConnectionConfig) -> Fut + Send + Sync,
    Fut: Future<Output = Outcome<C, Error>> + Send,
{
    /// Create a lazy connection; nothing is opened yet.
    pub fn new(config: ConnectionConfig, connector: F) -> Self {
        Self {
            config,
            connector,
            slot: Mutex::new(None),
            connected: AtomicBool::new(false),
        }
    }

    /// The configuration handed to the connector.
    pub fn config(&self) -> &ConnectionConfig {
        &self.config
    }

    /// True once a connection has been opened.
    pub fn is_connected(&self) -> bool {
        self.connected.load(Ordering::Acquire)
    }

    async fn acquire(&self, cx: &Cx) -> Outcome<Arc<C>, Error> {
        if let Some(reason) = cx.cancel_reason() {
            return Outcome::Cancelled(reason);
        }
        let Ok(mut guard) = self.slot.lock(cx).await else {
            return Outcome::Err(Error::storage("failed to acquire connection slot"));
        };
        if let Some(conn) = guard.as_ref() {
            return Outcome::Ok(Arc::clone(conn));
        }

        tracing::info!(addr = %self.config.socket_addr(), "Opening database connection");
        let conn = Arc::new(try_outcome!((self.connector)(self.config.clone()).await));
        *guard = Some(Arc::clone(&conn));
        self.connected.store(true, Ordering::Release);
        Outcome::Ok(conn)
    }
}

impl<C, F, Fut> Connection for LazyConnection<C, F>
where
    C: Connection,
    F: Fn(ConnectionConfig) -> Fut + Send + Sync,
    Fut: Future<Output = Outcome<C, Error>> + Send,
{
    fn query(
        &self,
        cx: &Cx,
        sql: &str,
        params: &[Value],
    ) -> impl Future<Output = Outcome<Vec<Row>, Error>> + Send {
        async move {
            let conn = try_outcome!(self.acquire(cx).await);
            conn.query(cx, sql, params).await
        }
    }

    fn execute(
        &self,
        cx: &Cx,
        sql: &str,
        params: &[Value],
    ) -> impl Future<Output = Outcome<u64, Error>> + Send {
        async move {
            let conn = try_outcome!(self.acquire(cx).await);
            conn.execute(cx, sql, params).await
        }
    }

    fn last_insert_id(&self, cx: &Cx) -> impl Future<Output = Outcome<Option<Value>, Error>> + Send {
        async move {
            let conn = try_outcome!(self.acquire(cx).await);
            conn.last_insert_id(cx).await
        }
    }
}

impl<C, F> std::fmt::Debug for LazyConnection<C, F> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LazyConnection")
            .field("addr", &self.config.socket_addr())
            .field("connected", &self.connected.load(Ordering::Relaxed))
            .finish_non_exhaustive()
    }
}
