//! Preload requests and their conditions.

use std::fmt;
use std::sync::Arc;

use crate::query::Query;
use crate::sql::SqlExpr;
use crate::value::Value;

/// A scope-mutating condition: rewrites the nested query builder itself.
pub type ScopeFn = Arc<dyn for<'e> Fn(Query<'e>) -> Query<'e> + Send + Sync>;

/// A condition attached to a preload request.
///
/// Scope conditions are applied to the nested query builder (ordering,
/// select lists, arbitrary rewrites); filter conditions are literal WHERE
/// terms appended after the composed containment predicate.
#[derive(Clone)]
pub enum Condition {
    /// Rewrites the nested query builder.
    Scope(ScopeFn),
    /// A literal WHERE conjunct with bound arguments.
    Filter(SqlExpr),
}

impl Condition {
    /// Create a scope condition from a closure.
    pub fn scope(f: impl for<'e> Fn(Query<'e>) -> Query<'e> + Send + Sync + 'static) -> Self {
        Self::Scope(Arc::new(f))
    }

    /// Create a literal filter condition.
    pub fn filter(sql: impl Into<String>, args: Vec<Value>) -> Self {
        Self::Filter(SqlExpr::new(sql, args))
    }
}

impl fmt::Debug for Condition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Scope(_) => f.write_str("Condition::Scope(..)"),
            Self::Filter(expr) => f.debug_tuple("Condition::Filter").field(expr).finish(),
        }
    }
}

/// Split conditions into scope functions and literal filters.
pub(crate) fn partition(conditions: &[Condition]) -> (Vec<&ScopeFn>, Vec<&SqlExpr>) {
    let mut scopes = Vec::new();
    let mut filters = Vec::new();
    for condition in conditions {
        match condition {
            Condition::Scope(f) => scopes.push(f),
            Condition::Filter(expr) => filters.push(expr),
        }
    }
    (scopes, filters)
}

/// A registered preload: a dotted association path plus optional conditions.
///
/// Conditions apply only to the deepest named association, never to the
/// intermediate hops of the path.
#[derive(Debug, Clone)]
pub struct PreloadRequest {
    /// Dot-separated association names, e.g. `"Orders.Items"`.
    pub path: String,
    /// Conditions for the deepest segment.
    pub conditions: Vec<Condition>,
}

impl PreloadRequest {
    /// Create a request with no conditions.
    pub fn new(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            conditions: Vec::new(),
        }
    }

    /// Attach a condition.
    pub fn condition(mut self, condition: Condition) -> Self {
        self.conditions.push(condition);
        self
    }

    /// Attach a literal filter condition.
    pub fn filter(self, sql: impl Into<String>, args: Vec<Value>) -> Self {
        self.condition(Condition::filter(sql, args))
    }

    /// The path split into segments.
    pub fn segments(&self) -> Vec<&str> {
        self.path.split('.').collect()
    }
}
