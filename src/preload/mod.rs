//! Relation preloading: eager loading of association graphs.
//!
//! Given a fetched result set and dotted association paths such as
//! `"Orders.Items"`, the preload engine issues one additional query per path
//! level and stitches the fetched rows back onto the in-memory records.
//! Nested levels are filtered against the previous level's query expression
//! wrapped as a derived table, so preloading never re-queries the base table,
//! and paths sharing a prefix share one query for it.
//!
//! ## Example
//!
//! ```rust,ignore
//! let mut ctx = QueryContext::new(&engine, schema, customers, root_expr);
//! ctx.preload("Orders.Items");
//! ctx.preload_request(
//!     PreloadRequest::new("Orders.Shipping")
//!         .filter("state = ?", vec!["delivered".into()]),
//! );
//! apply_preloads(&mut ctx);
//! ```

mod auto;
mod loaders;
mod request;
mod resolver;
mod subquery;

pub use auto::{EAGER_SETTING, auto_preload};
pub use request::{Condition, PreloadRequest, ScopeFn};
pub use resolver::apply_preloads;
