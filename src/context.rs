//! Per-query execution context.
//!
//! One `QueryContext` is created for each top-level query, after its primary
//! rows have been fetched and decoded. It owns the root records, the SQL
//! expression that produced them, the registered preload requests, and the
//! accumulated error slot. Contexts are never shared between queries.

use std::sync::Arc;

use crate::engine::QueryEngine;
use crate::error::QueryError;
use crate::preload::PreloadRequest;
use crate::record::Record;
use crate::schema::ModelSchema;
use crate::sql::SqlExpr;

/// Execution context for one top-level query.
pub struct QueryContext<'e> {
    pub(crate) engine: &'e dyn QueryEngine,
    pub(crate) schema: Arc<ModelSchema>,
    pub(crate) records: Vec<Record>,
    pub(crate) single: bool,
    pub(crate) root_expr: SqlExpr,
    pub(crate) preloads: Vec<PreloadRequest>,
    pub(crate) auto_preload: Option<bool>,
    pub(crate) skip_preloads: bool,
    pub(crate) error: Option<QueryError>,
}

impl<'e> QueryContext<'e> {
    /// Create a context from a fetched result set.
    ///
    /// `root_expr` is the SQL expression that produced `records`; nested
    /// preload levels are filtered against it rather than re-querying the
    /// base table.
    pub fn new(
        engine: &'e dyn QueryEngine,
        schema: Arc<ModelSchema>,
        records: Vec<Record>,
        root_expr: SqlExpr,
    ) -> Self {
        Self {
            engine,
            schema,
            records,
            single: false,
            root_expr,
            preloads: Vec::new(),
            auto_preload: None,
            skip_preloads: false,
            error: None,
        }
    }

    /// Mark the context as holding a single object rather than a collection.
    ///
    /// Affects one-kind stitching: a single parent receives matching rows
    /// directly instead of by keyed lookup.
    pub fn single(mut self) -> Self {
        self.single = true;
        self
    }

    /// Register a preload path with no conditions.
    pub fn preload(&mut self, path: impl Into<String>) -> &mut Self {
        self.preloads.push(PreloadRequest::new(path));
        self
    }

    /// Register a preload request.
    pub fn preload_request(&mut self, request: PreloadRequest) -> &mut Self {
        self.preloads.push(request);
        self
    }

    /// Enable or disable the auto-preload scan for this query.
    pub fn set_auto_preload(&mut self, enabled: bool) -> &mut Self {
        self.auto_preload = Some(enabled);
        self
    }

    /// Set the marker that suppresses preload processing on this context.
    ///
    /// Used internally to stop preload-issued nested queries from triggering
    /// further preload passes; also set after a completed pass.
    pub fn set_skip_preloads(&mut self, skip: bool) -> &mut Self {
        self.skip_preloads = skip;
        self
    }

    /// The model schema of the root records.
    pub fn schema(&self) -> &Arc<ModelSchema> {
        &self.schema
    }

    /// The root records.
    pub fn records(&self) -> &[Record] {
        &self.records
    }

    /// The root records, mutably.
    pub fn records_mut(&mut self) -> &mut [Record] {
        &mut self.records
    }

    /// Consume the context, returning the root records.
    pub fn into_records(self) -> Vec<Record> {
        self.records
    }

    /// Record an error, keeping the first one.
    ///
    /// Errors accumulate here instead of interrupting control flow so one
    /// path's failure cannot corrupt state already committed by a sibling.
    pub fn record_error(&mut self, error: QueryError) {
        if self.error.is_none() {
            self.error = Some(error);
        }
    }

    /// Check whether an error has been recorded.
    pub fn has_error(&self) -> bool {
        self.error.is_some()
    }

    /// The recorded error, if any.
    pub fn error(&self) -> Option<&QueryError> {
        self.error.as_ref()
    }

    /// Take the recorded error, clearing the slot.
    pub fn take_error(&mut self) -> Option<QueryError> {
        self.error.take()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::RowCursor;
    use crate::error::QueryResult;
    use crate::value::Value;

    struct NullEngine;

    impl QueryEngine for NullEngine {
        fn query(&self, _sql: &str, _args: &[Value]) -> QueryResult<Vec<Record>> {
            Ok(Vec::new())
        }

        fn query_rows<'a>(
            &'a self,
            _sql: &str,
            _args: &[Value],
        ) -> QueryResult<Box<dyn RowCursor + 'a>> {
            Err(QueryError::execution("no rows in tests"))
        }
    }

    #[test]
    fn test_first_error_wins() {
        let schema = Arc::new(ModelSchema::new("Order", "orders"));
        let mut ctx = QueryContext::new(&NullEngine, schema, Vec::new(), SqlExpr::default());

        assert!(!ctx.has_error());
        ctx.record_error(QueryError::execution("first"));
        ctx.record_error(QueryError::execution("second"));
        assert_eq!(ctx.error().map(|e| e.message.as_str()), Some("first"));
    }

    #[test]
    fn test_preload_registration() {
        let schema = Arc::new(ModelSchema::new("Order", "orders"));
        let mut ctx = QueryContext::new(&NullEngine, schema, Vec::new(), SqlExpr::default());
        ctx.preload("Items").preload("Customer.Address");
        assert_eq!(ctx.preloads.len(), 2);
        assert_eq!(ctx.preloads[1].path, "Customer.Address");
    }
}
