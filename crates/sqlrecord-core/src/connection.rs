//! The storage capability consumed by the record engine.

use std::future::Future;
use std::sync::Arc;

use asupersync::{Cx, Outcome};

use crate::error::Error;
use crate::row::Row;
use crate::value::Value;

/// A database connection able to run parameterized statements.
///
/// Parameters are positional and bound in slice order; implementations must
/// never splice them into the SQL text. Every method receives the caller's
/// [`Cx`] so cancellation and budgets reach the driver, and should return
/// `Outcome::Cancelled` when `cx.cancel_reason()` is set before I/O starts.
pub trait Connection: Send + Sync {
    /// Prepare, bind and execute a statement, fetching every result row.
    fn query(
        &self,
        cx: &Cx,
        sql: &str,
        params: &[Value],
    ) -> impl Future<Output = Outcome<Vec<Row>, Error>> + Send;

    /// Prepare, bind and execute a statement, returning the affected row count.
    fn execute(
        &self,
        cx: &Cx,
        sql: &str,
        params: &[Value],
    ) -> impl Future<Output = Outcome<u64, Error>> + Send;

    /// Identity generated by the most recent INSERT on this connection.
    fn last_insert_id(&self, cx: &Cx) -> impl Future<Output = Outcome<Option<Value>, Error>> + Send;
}

impl<C: Connection> Connection for Arc<C> {
    fn query(
        &self,
        cx: &Cx,
        sql: &str,
        params: &[Value],
    ) -> impl Future<Output = Outcome<Vec<Row>, Error>> + Send {
        (**self).query(cx, sql, params)
    }

    fn execute(
        &self,
        cx: &Cx,
        sql: &str,
        params: &[Value],
    ) -> impl Future<Output = Outcome<u64, Error>> + Send {
        (**self).execute(cx, sql, params)
    }

    fn last_insert_id(&self, cx: &Cx) -> impl Future<Output = Outcome<Option<Value>, Error>> + Send {
        (**self).last_insert_id(cx)
    }
}
