//! Dotted-path resolution and traversal state.
//!
//! `apply_preloads` is the hook the query pipeline invokes once per query,
//! after the primary rows are fetched and decoded. For every registered
//! preload path it walks the schema graph one segment at a time, dispatching
//! each unvisited prefix to the loader for its relationship kind and
//! descending the object graph to the next level. Traversal state lives in a
//! [`PreloadState`] owned by the call; prefixes shared between sibling paths
//! (`"A.B"` and `"A.C"`) are therefore loaded exactly once, and deeper
//! levels filter against the memoized query expression of their prefix
//! instead of the root query.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use tracing::{debug, warn};

use crate::context::QueryContext;
use crate::error::{ErrorCode, QueryError};
use crate::record::{Association, Record};
use crate::schema::ModelSchema;
use crate::sql::SqlExpr;

use super::auto::auto_preload;
use super::loaders::load_relationship;
use super::request::Condition;

/// Traversal state for one `apply_preloads` call.
///
/// Never shared across query contexts; correctness of parent-query reuse
/// depends on strictly sequential population.
#[derive(Debug, Default)]
struct PreloadState {
    /// Path prefixes already loaded. A prefix is added at most once.
    preloaded: HashSet<String>,
    /// Most recently executed query expression per prefix; the filter source
    /// for the next nested level.
    parent_queries: HashMap<String, SqlExpr>,
}

/// Run all registered preloads against the context's result set.
///
/// Mutates the records in place. Errors are accumulated on the context, not
/// returned: an unresolved association aborts further preload processing,
/// a failed query stops new segments from advancing, and in both cases data
/// stitched by previously completed segments stays attached. Completing a
/// pass sets the context's skip marker, so a second invocation is a no-op.
pub fn apply_preloads(ctx: &mut QueryContext<'_>) {
    if ctx.skip_preloads || ctx.has_error() {
        return;
    }

    if ctx.auto_preload == Some(true) {
        match auto_preload(&ctx.schema) {
            Ok(requests) => ctx.preloads.extend(requests),
            // Fatal to the auto scan only; explicit paths still resolve.
            Err(error) => ctx.record_error(error),
        }
    }

    if ctx.preloads.is_empty() {
        ctx.skip_preloads = true;
        return;
    }

    let requests = ctx.preloads.clone();
    let mut state = PreloadState::default();

    'requests: for request in &requests {
        let segments = request.segments();

        let mut parent_query = ctx.root_expr.clone();
        parent_query.strip_trailing_order_by();

        // Association names walked so far; names the current scope.
        let mut descent: Vec<String> = Vec::new();

        for (idx, segment) in segments.iter().enumerate() {
            let last = idx == segments.len() - 1;
            let prefix = segments[..=idx].join(".");

            if !state.preloaded.contains(&prefix) {
                // A sibling path may have already loaded a shorter prefix;
                // its query expression replaces the root as filter source.
                let parent_key = segments[..idx].join(".");
                if let Some(expr) = state.parent_queries.get(&parent_key) {
                    parent_query = expr.clone();
                    parent_query.strip_trailing_order_by();
                }

                // Conditions bind to the deepest named association only.
                let conditions: &[Condition] = if last { &request.conditions } else { &[] };

                let Some(schema) = schema_at(&ctx.schema, &descent) else {
                    warn!(path = %request.path, prefix = %prefix, "no schema at preload level");
                    continue 'requests;
                };
                let Some(field) = schema
                    .fields
                    .iter()
                    .find(|f| f.name == *segment && f.relationship.is_some())
                else {
                    ctx.record_error(QueryError::unresolved_association(*segment, &schema.model));
                    return;
                };

                let engine = ctx.engine;
                let single = ctx.single && descent.is_empty();
                let mut parents = collect_level(&mut ctx.records, &descent);

                match load_relationship(
                    engine,
                    field,
                    conditions,
                    &parent_query,
                    &mut parents,
                    single,
                ) {
                    Ok(expr) => {
                        debug!(prefix = %prefix, "preload level loaded");
                        state.preloaded.insert(prefix.clone());
                        state.parent_queries.insert(prefix.clone(), expr);
                    }
                    Err(error) if error.code == ErrorCode::UnsupportedRelationKind => {
                        ctx.record_error(error);
                        return;
                    }
                    Err(error) => {
                        // Already-stitched data stays attached; no further
                        // segments advance.
                        ctx.record_error(error);
                        break 'requests;
                    }
                }
            }

            if !last {
                descent.push((*segment).to_string());
                if collect_level(&mut ctx.records, &descent).is_empty() {
                    // An empty parent yields empty descendants, not a failure.
                    continue 'requests;
                }
            }
        }
    }

    ctx.skip_preloads = true;
}

/// Resolve the schema reached by walking `descent` from the root model.
fn schema_at(root: &Arc<ModelSchema>, descent: &[String]) -> Option<Arc<ModelSchema>> {
    let mut current = Arc::clone(root);
    for name in descent {
        let next = current.field(name)?.related.clone()?;
        current = next;
    }
    Some(current)
}

/// Collect mutable references to every record at the scope named by `descent`.
fn collect_level<'a>(records: &'a mut [Record], descent: &[String]) -> Vec<&'a mut Record> {
    let mut level: Vec<&'a mut Record> = records.iter_mut().collect();
    for name in descent {
        let mut next = Vec::new();
        for record in level {
            match record.association_mut(name) {
                Some(Association::One(Some(child))) => next.push(child.as_mut()),
                Some(Association::Many(children)) => next.extend(children.iter_mut()),
                _ => {}
            }
        }
        level = next;
    }
    level
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_collect_level_root() {
        let mut records = vec![Record::new().with("id", 1), Record::new().with("id", 2)];
        let level = collect_level(&mut records, &[]);
        assert_eq!(level.len(), 2);
    }

    #[test]
    fn test_collect_level_descends_many() {
        let mut parent = Record::new().with("id", 1);
        parent.set_many(
            "Items",
            vec![Record::new().with("id", 10), Record::new().with("id", 11)],
        );
        let mut other = Record::new().with("id", 2);
        other.set_many("Items", Vec::new());
        let mut records = vec![parent, other];

        let level = collect_level(&mut records, &["Items".into()]);
        assert_eq!(level.len(), 2);
    }

    #[test]
    fn test_collect_level_descends_one() {
        let mut parent = Record::new().with("id", 1);
        parent.set_one("Customer", Record::new().with("id", 5));
        let mut records = vec![parent, Record::new().with("id", 2)];

        let level = collect_level(&mut records, &["Customer".into()]);
        assert_eq!(level.len(), 1);
    }

    #[test]
    fn test_schema_at_walks_related() {
        use crate::schema::{FieldDescriptor, Reference, Relationship};

        let item = Arc::new(ModelSchema::new("Item", "items"));
        let order = Arc::new(ModelSchema::new("Order", "orders").register(
            FieldDescriptor::relation(
                "Items",
                "items",
                Relationship::HasMany(Reference::new()),
                Arc::clone(&item),
            ),
        ));
        let root = Arc::new(ModelSchema::new("Customer", "customers").register(
            FieldDescriptor::relation(
                "Orders",
                "orders",
                Relationship::HasMany(Reference::new()),
                Arc::clone(&order),
            ),
        ));

        assert_eq!(schema_at(&root, &[]).unwrap().model, "Customer");
        assert_eq!(schema_at(&root, &["Orders".into()]).unwrap().model, "Order");
        assert_eq!(
            schema_at(&root, &["Orders".into(), "Items".into()])
                .unwrap()
                .model,
            "Item"
        );
        assert!(schema_at(&root, &["Missing".into()]).is_none());
    }
}
