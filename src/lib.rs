//! # loam-query
//!
//! Query-layer core for the Loam ORM. The centerpiece is the relation
//! preload engine: given a fetched result set and dotted association paths,
//! it issues one additional query per path level across four relationship
//! kinds (has-one, has-many, belongs-to, many-to-many) and stitches the
//! fetched rows back onto the in-memory object graph.
//!
//! Key properties:
//! - Nested levels filter against the parent level's query expression as a
//!   derived table, never re-querying the base table.
//! - Paths sharing a prefix (`"Orders.Items"`, `"Orders.Shipping"`) load the
//!   shared prefix exactly once.
//! - Stitching groups rows by composite foreign-key tuples with structural
//!   equality, independent of the concrete row type.
//! - Errors accumulate on the query context; a failing path never corrupts
//!   data already attached by its siblings.
//!
//! SQL rendering and execution, transaction management, and schema
//! compilation live in other Loam crates; this crate consumes them through
//! the narrow [`QueryEngine`], [`RowCursor`] and [`JoinTable`] traits.
//!
//! ## Preloading
//!
//! ```rust,ignore
//! use loam_query::prelude::*;
//!
//! let mut ctx = QueryContext::new(&engine, schema, customers, root_expr);
//! ctx.preload("Orders.Items");
//! apply_preloads(&mut ctx);
//! let customers = ctx.into_records();
//! ```
//!
//! ## Values
//!
//! ```rust
//! use loam_query::Value;
//!
//! let v: Value = 42.into();
//! assert!(matches!(v, Value::Int(42)));
//!
//! let v: Value = "hello".into();
//! assert!(matches!(v, Value::String(_)));
//! ```
//!
//! ## Error Handling
//!
//! ```rust
//! use loam_query::{QueryError, ErrorCode};
//!
//! let err = QueryError::unresolved_association("Orders", "Customer");
//! assert_eq!(err.code, ErrorCode::UnresolvedAssociation);
//! ```

pub mod context;
pub mod engine;
pub mod error;
pub mod logging;
pub mod preload;
pub mod query;
pub mod record;
pub mod schema;
pub mod sql;
pub mod value;

pub use context::QueryContext;
pub use engine::{QueryEngine, RowCursor};
pub use error::{ErrorCode, ErrorContext, QueryError, QueryResult, Suggestion};
pub use preload::{Condition, EAGER_SETTING, PreloadRequest, ScopeFn, apply_preloads, auto_preload};
pub use query::Query;
pub use record::{Association, CompositeKey, Record, group_by_fields, key_of};
pub use schema::{
    DefaultJoinTable, FieldDescriptor, JoinTable, ManyToManyRef, ModelSchema, Polymorphic,
    Reference, Relationship,
};
pub use sql::{SqlExpr, column_condition, quote_identifier};
pub use value::Value;

/// Prelude module for convenient imports.
pub mod prelude {
    pub use crate::context::QueryContext;
    pub use crate::engine::{QueryEngine, RowCursor};
    pub use crate::error::{ErrorCode, QueryError, QueryResult};
    pub use crate::preload::{Condition, PreloadRequest, apply_preloads};
    pub use crate::query::Query;
    pub use crate::record::{Association, Record};
    pub use crate::schema::{
        DefaultJoinTable, FieldDescriptor, JoinTable, ModelSchema, Reference, Relationship,
    };
    pub use crate::sql::SqlExpr;
    pub use crate::value::Value;
}
