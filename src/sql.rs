//! SQL text utilities: expression snapshots, quoting, column conditions.

use serde::{Deserialize, Serialize};

use crate::value::Value;

/// A rendered SQL expression with its positional arguments.
///
/// Preloading snapshots the query that produced each level of the object
/// graph as a `SqlExpr` so the next level can be filtered against it as a
/// derived table instead of re-querying the base table.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SqlExpr {
    /// The rendered SQL text with `?` placeholders.
    pub sql: String,
    /// The positional arguments bound to the placeholders.
    pub args: Vec<Value>,
}

impl SqlExpr {
    /// Create a new SQL expression.
    pub fn new(sql: impl Into<String>, args: Vec<Value>) -> Self {
        Self {
            sql: sql.into(),
            args,
        }
    }

    /// Check if the expression is empty.
    pub fn is_empty(&self) -> bool {
        self.sql.is_empty()
    }

    /// Strip a trailing top-level `ORDER BY` clause.
    ///
    /// Parent expressions are reused as derived tables; an ordering clause on
    /// the outermost query is meaningless there and some backends reject it.
    /// Clauses inside parenthesized subqueries are left alone.
    pub fn strip_trailing_order_by(&mut self) -> &mut Self {
        if let Some(at) = last_top_level_order_by(&self.sql) {
            self.sql.truncate(at);
            let trimmed = self.sql.trim_end().len();
            self.sql.truncate(trimmed);
        }
        self
    }
}

/// Find the byte offset of the last `ORDER BY` at parenthesis depth zero.
fn last_top_level_order_by(sql: &str) -> Option<usize> {
    let bytes = sql.as_bytes();
    let mut depth = 0i32;
    let mut in_string = false;
    let mut found = None;
    let mut i = 0;

    while i < bytes.len() {
        let b = bytes[i];
        if in_string {
            if b == b'\'' {
                in_string = false;
            }
        } else {
            match b {
                b'\'' => in_string = true,
                b'(' => depth += 1,
                b')' => depth -= 1,
                _ => {
                    if depth == 0
                        && sql[i..].len() >= 8
                        && sql.is_char_boundary(i + 8)
                        && sql[i..i + 8].eq_ignore_ascii_case("order by")
                        && (i == 0 || bytes[i - 1].is_ascii_whitespace())
                    {
                        found = Some(i);
                    }
                }
            }
        }
        i += 1;
    }
    found
}

/// Escape a string for use in SQL (for identifiers, not values).
pub fn escape_identifier(name: &str) -> String {
    let escaped = name.replace('"', "\"\"");
    format!("\"{}\"", escaped)
}

/// Check if an identifier needs quoting.
pub fn needs_quoting(name: &str) -> bool {
    let reserved = [
        "user", "order", "group", "select", "from", "where", "table", "index", "key", "primary",
        "foreign", "check", "default", "null", "not", "and", "or", "in", "is", "like", "between",
        "case", "when", "then", "else", "end", "as", "on", "join", "left", "right", "inner",
        "outer", "cross", "natural", "using", "limit", "offset", "union", "intersect", "except",
        "all", "distinct", "having",
    ];

    if reserved.contains(&name.to_lowercase().as_str()) {
        return true;
    }

    !name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_')
}

/// Quote an identifier if needed.
pub fn quote_identifier(name: &str) -> String {
    if needs_quoting(name) {
        escape_identifier(name)
    } else {
        name.to_string()
    }
}

/// Render a column list as a SQL condition operand.
///
/// A single column renders bare; multiple columns render as a tuple so that
/// composite foreign keys can be used in containment predicates:
/// `(c1,c2) IN (SELECT c1,c2 FROM ...)`.
pub fn column_condition(columns: &[String]) -> String {
    let quoted: Vec<_> = columns.iter().map(|c| quote_identifier(c)).collect();
    if quoted.len() == 1 {
        quoted.into_iter().next().unwrap_or_default()
    } else {
        format!("({})", quoted.join(","))
    }
}
