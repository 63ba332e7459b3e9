//! Collaborator traits for query execution.
//!
//! The preload engine never renders dialect-specific SQL or touches a
//! connection itself; it hands SQL text and positional arguments to a
//! [`QueryEngine`] and gets decoded [`Record`]s back. Preload execution is
//! strictly sequential, so the interface is synchronous.

use crate::error::QueryResult;
use crate::record::Record;
use crate::value::Value;

/// Executes SQL and decodes result rows.
///
/// Implemented by the database adapter crates; tests use in-memory stubs
/// that count queries and serve fixtures.
pub trait QueryEngine {
    /// Execute a query and decode every row into a [`Record`].
    fn query(&self, sql: &str, args: &[Value]) -> QueryResult<Vec<Record>>;

    /// Execute a query and return a live row cursor.
    ///
    /// Used when the caller must see raw columns beyond the model's own,
    /// such as join-table keys selected alongside the related rows. The
    /// cursor holds the underlying statement; dropping it releases the
    /// resource on every exit path.
    fn query_rows<'a>(&'a self, sql: &str, args: &[Value])
    -> QueryResult<Box<dyn RowCursor + 'a>>;
}

/// A live result cursor over raw rows.
pub trait RowCursor {
    /// Column names of the result set, in select order.
    fn columns(&self) -> &[String];

    /// Fetch the next row, or `None` when the result set is exhausted.
    fn next_row(&mut self) -> QueryResult<Option<Vec<Value>>>;
}
