//! Relationship loaders: one query plus result stitching per kind.
//!
//! All four loaders share a shape: short-circuit when the parent level is
//! empty, compose the containment predicate against the parent query's
//! derived table, issue exactly one query (many-to-many adds a row-scan
//! loop), then stitch fetched rows onto the parents by composite key. Each
//! loader returns the executed query's own expression, which becomes the
//! parent scope of the next nested level.

use std::collections::HashMap;

use tracing::debug;

use crate::engine::QueryEngine;
use crate::error::{QueryError, QueryResult};
use crate::query::Query;
use crate::record::{Association, CompositeKey, Record, group_by_fields, key_of};
use crate::schema::{FieldDescriptor, ManyToManyRef, ModelSchema, Reference, Relationship};
use crate::sql::SqlExpr;
use crate::value::Value;

use super::request::{Condition, partition};
use super::subquery::{compose, derived_table};

/// Dispatch to the loader matching the field's relationship kind.
pub(crate) fn load_relationship(
    engine: &dyn QueryEngine,
    field: &FieldDescriptor,
    conditions: &[Condition],
    parent_query: &SqlExpr,
    parents: &mut [&mut Record],
    single: bool,
) -> QueryResult<SqlExpr> {
    let relationship = field
        .relationship
        .as_ref()
        .ok_or_else(|| internal(field, "field has no relationship"))?;

    debug!(
        field = %field.name,
        kind = %relationship.kind(),
        parents = parents.len(),
        "preloading association"
    );

    match relationship {
        Relationship::HasOne(reference) => {
            load_has_one(engine, field, reference, conditions, parent_query, parents, single)
        }
        Relationship::HasMany(reference) => {
            load_has_many(engine, field, reference, conditions, parent_query, parents, single)
        }
        Relationship::BelongsTo(reference) => {
            load_belongs_to(engine, field, reference, conditions, parent_query, parents, single)
        }
        Relationship::ManyToMany(m2m) => {
            load_many_to_many(engine, field, m2m, conditions, parent_query, parents)
        }
        Relationship::Unsupported(kind) => Err(QueryError::unsupported_relation(kind.clone())
            .with_field(&field.name)),
    }
}

fn internal(field: &FieldDescriptor, message: &str) -> QueryError {
    QueryError::new(crate::error::ErrorCode::Internal, message).with_field(&field.name)
}

fn related_schema<'a>(field: &'a FieldDescriptor) -> QueryResult<&'a ModelSchema> {
    field
        .related
        .as_deref()
        .ok_or_else(|| internal(field, "association field has no related schema"))
}

/// Build the nested query: containment predicate first, then scope
/// conditions, then literal filters appended after the predicate.
fn nested_query<'e>(
    engine: &'e dyn QueryEngine,
    table: &str,
    predicate: SqlExpr,
    conditions: &[Condition],
) -> Query<'e> {
    let (scopes, filters) = partition(conditions);
    let mut query = Query::new(engine, table).filter(predicate.sql, predicate.args);
    for scope in scopes {
        query = scope(query);
    }
    for filter in filters {
        query = query.filter(filter.sql.clone(), filter.args.clone());
    }
    query
}

/// Load a one-to-one association.
///
/// Duplicate matches resolve last-write-wins in result-set order, for both
/// the single-object and keyed-collection cases. This tie-break is
/// implementation-defined and deliberately left as-is.
fn load_has_one(
    engine: &dyn QueryEngine,
    field: &FieldDescriptor,
    reference: &Reference,
    conditions: &[Condition],
    parent_query: &SqlExpr,
    parents: &mut [&mut Record],
    single: bool,
) -> QueryResult<SqlExpr> {
    if parents.is_empty() {
        return Ok(parent_query.clone());
    }
    let related = related_schema(field)?;

    let alias = format!("ho_{}", field.db_name);
    let predicate = compose(
        parent_query,
        &reference.owner_columns,
        &reference.related_columns,
        &alias,
        reference.polymorphic.as_ref(),
    );
    let query = nested_query(engine, &related.table, predicate, conditions);
    let rows = query.find()?;

    if single && parents.len() == 1 {
        for row in rows {
            parents[0].set_one(&field.name, row);
        }
    } else {
        let mut by_key: HashMap<CompositeKey, Record> = HashMap::new();
        for row in rows {
            by_key.insert(key_of(&row, &reference.related_fields), row);
        }
        for parent in parents.iter_mut() {
            let key = key_of(parent, &reference.owner_fields);
            if let Some(row) = by_key.get(&key) {
                parent.set_one(&field.name, row.clone());
            }
        }
    }

    Ok(query.as_subquery_expr())
}

/// Load a one-to-many association.
///
/// Every parent's association field is replaced: with the matched group in
/// result order, or with an explicit empty collection when nothing matched.
fn load_has_many(
    engine: &dyn QueryEngine,
    field: &FieldDescriptor,
    reference: &Reference,
    conditions: &[Condition],
    parent_query: &SqlExpr,
    parents: &mut [&mut Record],
    single: bool,
) -> QueryResult<SqlExpr> {
    if parents.is_empty() {
        return Ok(parent_query.clone());
    }
    let related = related_schema(field)?;

    let alias = format!("hm_{}", field.db_name);
    let predicate = compose(
        parent_query,
        &reference.owner_columns,
        &reference.related_columns,
        &alias,
        reference.polymorphic.as_ref(),
    );
    let query = nested_query(engine, &related.table, predicate, conditions);
    let rows = query.find()?;

    if single && parents.len() == 1 {
        parents[0].set_many(&field.name, rows);
    } else {
        let groups = group_by_fields(rows, &reference.related_fields);
        for parent in parents.iter_mut() {
            let key = key_of(parent, &reference.owner_fields);
            let matched = groups.get(&key).cloned().unwrap_or_default();
            parent.set_many(&field.name, matched);
        }
    }

    Ok(query.as_subquery_expr())
}

/// Load a many-to-one association.
///
/// One related row can legitimately be owned by many parents; the row is
/// broadcast to every parent sharing its foreign-key tuple.
fn load_belongs_to(
    engine: &dyn QueryEngine,
    field: &FieldDescriptor,
    reference: &Reference,
    conditions: &[Condition],
    parent_query: &SqlExpr,
    parents: &mut [&mut Record],
    single: bool,
) -> QueryResult<SqlExpr> {
    if parents.is_empty() {
        return Ok(parent_query.clone());
    }
    let related = related_schema(field)?;

    let alias = format!("bt_{}", field.db_name);
    let predicate = compose(
        parent_query,
        &reference.owner_columns,
        &reference.related_columns,
        &alias,
        reference.polymorphic.as_ref(),
    );
    let query = nested_query(engine, &related.table, predicate, conditions);
    let rows = query.find()?;

    if single && parents.len() == 1 {
        for row in rows {
            parents[0].set_one(&field.name, row);
        }
    } else {
        let mut by_key: HashMap<CompositeKey, Record> = HashMap::new();
        for row in rows {
            by_key.insert(key_of(&row, &reference.related_fields), row);
        }
        for parent in parents.iter_mut() {
            let key = key_of(parent, &reference.owner_fields);
            if let Some(row) = by_key.get(&key) {
                parent.set_one(&field.name, row.clone());
            }
        }
    }

    Ok(query.as_subquery_expr())
}

/// Load a many-to-many association through its join table.
///
/// The joined select returns the related rows alongside the join table's
/// source-key columns; each raw row is decoded into a related record plus
/// the key tuple linking it back to an owner. Association fields that are
/// already populated are skipped, only empty slots are filled — callers must
/// not mutate association fields while a preload pass runs.
fn load_many_to_many(
    engine: &dyn QueryEngine,
    field: &FieldDescriptor,
    m2m: &ManyToManyRef,
    conditions: &[Condition],
    parent_query: &SqlExpr,
    parents: &mut [&mut Record],
) -> QueryResult<SqlExpr> {
    if parents.is_empty() {
        return Ok(parent_query.clone());
    }
    let related = related_schema(field)?;

    let alias = format!("mm_{}", field.db_name);
    let subquery = derived_table(parent_query, &m2m.owner_columns, &alias);

    let (scopes, filters) = partition(conditions);
    let mut query = Query::new(engine, &related.table);
    for scope in scopes {
        query = scope(query);
    }
    if !query.has_select() {
        query = query.select("*");
    }
    query = m2m.handler.join_with_query(query, subquery);
    for filter in filters {
        query = query.filter(filter.sql.clone(), filter.args.clone());
    }

    let source_keys = m2m.handler.source_foreign_keys();
    let mut link: HashMap<CompositeKey, Vec<Record>> = HashMap::new();

    {
        // Cursor scope: dropping it releases the statement on every path.
        let mut cursor = query.rows()?;
        let columns = cursor.columns().to_vec();

        while let Some(values) = cursor.next_row()? {
            let mut row = Record::new();
            let mut key_values: HashMap<String, Value> = HashMap::new();

            for (column, value) in columns.iter().zip(values) {
                if source_keys.iter().any(|k| k == column) {
                    // Join key columns come after the related columns in the
                    // joined select; the last occurrence is the join table's.
                    key_values.insert(column.clone(), value.clone());
                }
                if let Some(f) = related.field_by_db_name(column) {
                    if !row.has_field(&f.name) {
                        row.set(&f.name, value);
                    }
                }
            }

            let key = CompositeKey::from_values(
                source_keys
                    .iter()
                    .map(|k| key_values.get(k).unwrap_or(&Value::Null)),
            );
            link.entry(key).or_default().push(row);
        }
    }

    for parent in parents.iter_mut() {
        let populated = matches!(
            parent.association(&field.name),
            Some(Association::Many(records)) if !records.is_empty()
        );
        if populated {
            continue;
        }
        let key = key_of(parent, &m2m.owner_fields);
        parent.set_many(&field.name, link.get(&key).cloned().unwrap_or_default());
    }

    Ok(query.as_subquery_expr())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::RowCursor;
    use crate::schema::Reference;
    use std::cell::RefCell;
    use std::sync::Arc;

    struct CountingEngine {
        rows: Vec<Record>,
        queries: RefCell<Vec<String>>,
    }

    impl CountingEngine {
        fn new(rows: Vec<Record>) -> Self {
            Self {
                rows,
                queries: RefCell::new(Vec::new()),
            }
        }
    }

    impl QueryEngine for CountingEngine {
        fn query(&self, sql: &str, _args: &[Value]) -> QueryResult<Vec<Record>> {
            self.queries.borrow_mut().push(sql.to_string());
            Ok(self.rows.clone())
        }

        fn query_rows<'a>(
            &'a self,
            _sql: &str,
            _args: &[Value],
        ) -> QueryResult<Box<dyn RowCursor + 'a>> {
            Err(QueryError::execution("not used"))
        }
    }

    fn items_field() -> FieldDescriptor {
        let related = Arc::new(
            ModelSchema::new("Item", "items")
                .register(FieldDescriptor::column("Id", "id"))
                .register(FieldDescriptor::column("OrderId", "order_id")),
        );
        FieldDescriptor::relation(
            "Items",
            "items",
            Relationship::HasMany(
                Reference::new()
                    .owner(["id"], ["Id"])
                    .related(["order_id"], ["OrderId"]),
            ),
            related,
        )
    }

    #[test]
    fn test_empty_parents_issue_no_query() {
        let engine = CountingEngine::new(Vec::new());
        let field = items_field();
        let parent_query = SqlExpr::new("SELECT * FROM orders", vec![]);
        let mut parents: Vec<&mut Record> = Vec::new();

        let expr =
            load_relationship(&engine, &field, &[], &parent_query, &mut parents, false).unwrap();

        assert!(engine.queries.borrow().is_empty());
        assert_eq!(expr, parent_query);
    }

    #[test]
    fn test_has_many_sets_empty_group_when_unmatched() {
        let engine = CountingEngine::new(vec![
            Record::new().with("Id", 1).with("OrderId", 10),
        ]);
        let field = items_field();
        let parent_query = SqlExpr::new("SELECT * FROM orders", vec![]);

        let mut matched = Record::new().with("Id", 10);
        let mut unmatched = Record::new().with("Id", 11);
        let mut parents: Vec<&mut Record> = vec![&mut matched, &mut unmatched];

        load_relationship(&engine, &field, &[], &parent_query, &mut parents, false).unwrap();

        assert_eq!(matched.many("Items").map(<[Record]>::len), Some(1));
        assert_eq!(unmatched.many("Items").map(<[Record]>::len), Some(0));
    }

    #[test]
    fn test_has_one_last_write_wins() {
        let related = Arc::new(
            ModelSchema::new("Profile", "profiles")
                .register(FieldDescriptor::column("Id", "id"))
                .register(FieldDescriptor::column("UserId", "user_id")),
        );
        let field = FieldDescriptor::relation(
            "Profile",
            "profile",
            Relationship::HasOne(
                Reference::new()
                    .owner(["id"], ["Id"])
                    .related(["user_id"], ["UserId"]),
            ),
            related,
        );
        // Two rows match the same parent; the later row wins.
        let engine = CountingEngine::new(vec![
            Record::new().with("Id", 1).with("UserId", 7),
            Record::new().with("Id", 2).with("UserId", 7),
        ]);
        let parent_query = SqlExpr::new("SELECT * FROM users", vec![]);
        let mut user = Record::new().with("Id", 7);
        let mut parents: Vec<&mut Record> = vec![&mut user];

        load_relationship(&engine, &field, &[], &parent_query, &mut parents, false).unwrap();

        assert_eq!(
            user.one("Profile").and_then(|r| r.get("Id")),
            Some(&Value::Int(2))
        );
    }

    #[test]
    fn test_unsupported_kind_fails() {
        let related = Arc::new(ModelSchema::new("Edge", "edges"));
        let field = FieldDescriptor::relation(
            "Edges",
            "edges",
            Relationship::Unsupported("graph_edge".into()),
            related,
        );
        let engine = CountingEngine::new(Vec::new());
        let parent_query = SqlExpr::new("SELECT * FROM nodes", vec![]);
        let mut node = Record::new().with("Id", 1);
        let mut parents: Vec<&mut Record> = vec![&mut node];

        let err = load_relationship(&engine, &field, &[], &parent_query, &mut parents, false)
            .unwrap_err();
        assert_eq!(err.code, crate::error::ErrorCode::UnsupportedRelationKind);
    }
}
