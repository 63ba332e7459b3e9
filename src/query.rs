//! Narrow query builder consumed by the preload loaders.
//!
//! This is deliberately small: a table, an optional select list, join and
//! where fragments with their bound arguments, and an optional ordering.
//! Rendering uses `?` placeholders; dialect renumbering is the engine's
//! concern.

use tracing::debug;

use crate::engine::{QueryEngine, RowCursor};
use crate::error::QueryResult;
use crate::record::Record;
use crate::sql::{SqlExpr, quote_identifier};
use crate::value::Value;

/// A query over one table, executed through a borrowed engine.
pub struct Query<'e> {
    engine: &'e dyn QueryEngine,
    table: String,
    select: Option<String>,
    joins: Vec<SqlExpr>,
    wheres: Vec<SqlExpr>,
    order: Option<String>,
}

impl<'e> Query<'e> {
    /// Create a new query over `table`.
    pub fn new(engine: &'e dyn QueryEngine, table: impl Into<String>) -> Self {
        Self {
            engine,
            table: table.into(),
            select: None,
            joins: Vec::new(),
            wheres: Vec::new(),
            order: None,
        }
    }

    /// Set the select list.
    pub fn select(mut self, select: impl Into<String>) -> Self {
        self.select = Some(select.into());
        self
    }

    /// Check if a select list has been set.
    pub fn has_select(&self) -> bool {
        self.select.is_some()
    }

    /// Add a WHERE conjunct with its bound arguments.
    pub fn filter(mut self, sql: impl Into<String>, args: Vec<Value>) -> Self {
        self.wheres.push(SqlExpr::new(sql, args));
        self
    }

    /// Add a join clause with its bound arguments.
    pub fn join(mut self, sql: impl Into<String>, args: Vec<Value>) -> Self {
        self.joins.push(SqlExpr::new(sql, args));
        self
    }

    /// Set the ORDER BY clause body.
    pub fn order_by(mut self, order: impl Into<String>) -> Self {
        self.order = Some(order.into());
        self
    }

    /// Render the query as SQL text with its positional arguments.
    pub fn to_sql(&self) -> SqlExpr {
        let mut sql = String::from("SELECT ");
        sql.push_str(self.select.as_deref().unwrap_or("*"));
        sql.push_str(" FROM ");
        sql.push_str(&quote_identifier(&self.table));

        let mut args = Vec::new();
        for join in &self.joins {
            sql.push(' ');
            sql.push_str(&join.sql);
            args.extend(join.args.iter().cloned());
        }

        for (i, clause) in self.wheres.iter().enumerate() {
            sql.push_str(if i == 0 { " WHERE " } else { " AND " });
            sql.push_str(&clause.sql);
            args.extend(clause.args.iter().cloned());
        }

        if let Some(order) = &self.order {
            sql.push_str(" ORDER BY ");
            sql.push_str(order);
        }

        SqlExpr::new(sql, args)
    }

    /// Snapshot this query as a subquery expression.
    ///
    /// The preload resolver memoizes this per path prefix so the next nested
    /// level can filter against it as a derived table.
    pub fn as_subquery_expr(&self) -> SqlExpr {
        self.to_sql()
    }

    /// Execute the query and decode all rows.
    pub fn find(&self) -> QueryResult<Vec<Record>> {
        let expr = self.to_sql();
        debug!(sql = %expr.sql, args = expr.args.len(), "executing query");
        self.engine.query(&expr.sql, &expr.args)
    }

    /// Execute the query and return a live row cursor.
    pub fn rows(&self) -> QueryResult<Box<dyn RowCursor + 'e>> {
        let expr = self.to_sql();
        debug!(sql = %expr.sql, args = expr.args.len(), "opening row cursor");
        self.engine.query_rows(&expr.sql, &expr.args)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::QueryError;

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
    fn test_render_plain() {
        let query = Query::new(&NullEngine, "items");
        assert_eq!(query.to_sql(), SqlExpr::new("SELECT * FROM items", vec![]));
    }

    #[test]
    fn test_render_with_filters_and_order() {
        let query = Query::new(&NullEngine, "items")
            .filter("order_id IN (?)", vec![Value::Int(1)])
            .filter("deleted = ?", vec![Value::Bool(false)])
            .order_by("id");
        let expr = query.to_sql();
        assert_eq!(
            expr.sql,
            "SELECT * FROM items WHERE order_id IN (?) AND deleted = ? ORDER BY id"
        );
        assert_eq!(expr.args, vec![Value::Int(1), Value::Bool(false)]);
    }

    #[test]
    fn test_render_join_args_precede_where_args() {
        let query = Query::new(&NullEngine, "tags")
            .select("*")
            .join("INNER JOIN post_tags ON post_tags.tag_id = tags.id AND post_tags.post_id IN (SELECT id FROM posts WHERE id = ?)", vec![Value::Int(7)])
            .filter("name = ?", vec![Value::String("rust".into())]);
        let expr = query.to_sql();
        assert!(expr.sql.starts_with("SELECT * FROM tags INNER JOIN post_tags"));
        assert_eq!(
            expr.args,
            vec![Value::Int(7), Value::String("rust".into())]
        );
    }

    #[test]
    fn test_reserved_table_name_is_quoted() {
        let query = Query::new(&NullEngine, "order");
        assert_eq!(query.to_sql().sql, "SELECT * FROM \"order\"");
    }
}
