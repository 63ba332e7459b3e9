//! Error types for query and preload operations with actionable messages.
//!
//! Error codes follow a pattern: L{category}{number}
//! - 1xxx: resolution errors (unknown association, bad preload option)
//! - 5xxx: execution errors (bubbled from the query engine)
//! - 9xxx: internal errors
//!
//! ```rust
//! use loam_query::{QueryError, ErrorCode};
//!
//! let err = QueryError::unresolved_association("Orders", "Customer");
//! assert_eq!(err.code, ErrorCode::UnresolvedAssociation);
//! ```

use std::fmt;
use thiserror::Error;

/// Result type for query operations.
pub type QueryResult<T> = Result<T, QueryError>;

/// Error codes for programmatic error handling.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCode {
    // Resolution errors (1xxx)
    /// A preload path segment names a field that does not exist or has no
    /// relationship (L1001).
    UnresolvedAssociation = 1001,
    /// The schema declares a relationship kind this engine does not
    /// implement (L1002).
    UnsupportedRelationKind = 1002,
    /// The eager-load tag on a field could not be parsed as a boolean
    /// (L1003).
    InvalidPreloadOption = 1003,

    // Execution errors (5xxx)
    /// A query issued by a relation loader failed (L5001).
    QueryExecution = 5001,
    /// A row could not be decoded into a record (L5002).
    RowDecode = 5002,

    // Internal errors (9xxx)
    /// Internal error (L9001).
    Internal = 9001,
}

impl ErrorCode {
    /// Get the error code string (e.g., "L1001").
    pub fn code(&self) -> String {
        format!("L{}", *self as u16)
    }

    /// Get a short description of the error code.
    pub fn description(&self) -> &'static str {
        match self {
            Self::UnresolvedAssociation => "Association could not be resolved",
            Self::UnsupportedRelationKind => "Unsupported relationship kind",
            Self::InvalidPreloadOption => "Invalid eager-load option",
            Self::QueryExecution => "Query execution failed",
            Self::RowDecode => "Row could not be decoded",
            Self::Internal => "Internal error",
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code())
    }
}

/// Suggestion for fixing an error.
#[derive(Debug, Clone)]
pub struct Suggestion {
    /// The suggestion text.
    pub text: String,
    /// Optional code example.
    pub code: Option<String>,
}

impl Suggestion {
    /// Create a new suggestion.
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            code: None,
        }
    }

    /// Add a code example.
    pub fn with_code(mut self, code: impl Into<String>) -> Self {
        self.code = Some(code.into());
        self
    }
}

/// Additional context for an error.
#[derive(Debug, Clone, Default)]
pub struct ErrorContext {
    /// The operation that was being performed.
    pub operation: Option<String>,
    /// The model involved.
    pub model: Option<String>,
    /// The field involved.
    pub field: Option<String>,
    /// The SQL query (if available).
    pub sql: Option<String>,
    /// Suggestions for fixing the error.
    pub suggestions: Vec<Suggestion>,
}

/// Errors that can occur during query and preload operations.
#[derive(Error, Debug)]
pub struct QueryError {
    /// The error code.
    pub code: ErrorCode,
    /// The error message.
    pub message: String,
    /// Additional context.
    pub context: ErrorContext,
    /// The source error (if any).
    #[source]
    pub source: Option<Box<dyn std::error::Error + Send + Sync>>,
}

impl fmt::Display for QueryError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.code.code(), self.message)
    }
}

impl QueryError {
    /// Create a new error with the given code and message.
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            context: ErrorContext::default(),
            source: None,
        }
    }

    /// Add context about the operation.
    pub fn with_operation(mut self, operation: impl Into<String>) -> Self {
        self.context.operation = Some(operation.into());
        self
    }

    /// Set the model.
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.context.model = Some(model.into());
        self
    }

    /// Set the field.
    pub fn with_field(mut self, field: impl Into<String>) -> Self {
        self.context.field = Some(field.into());
        self
    }

    /// Set the SQL query.
    pub fn with_sql(mut self, sql: impl Into<String>) -> Self {
        self.context.sql = Some(sql.into());
        self
    }

    /// Add a suggestion for fixing the error.
    pub fn with_suggestion(mut self, suggestion: impl Into<String>) -> Self {
        self.context.suggestions.push(Suggestion::new(suggestion));
        self
    }

    /// Set the source error.
    pub fn with_source<E: std::error::Error + Send + Sync + 'static>(mut self, source: E) -> Self {
        self.source = Some(Box::new(source));
        self
    }

    // ============== Constructor Functions ==============

    /// A preload path segment did not resolve to a relationship field.
    pub fn unresolved_association(field: impl Into<String>, model: impl Into<String>) -> Self {
        let field = field.into();
        let model = model.into();
        Self::new(
            ErrorCode::UnresolvedAssociation,
            format!("can't preload field {} for {}", field, model),
        )
        .with_model(&model)
        .with_field(&field)
        .with_suggestion(format!(
            "Check that {} declares an association named {}",
            model, field
        ))
    }

    /// The schema declared a relationship kind the engine cannot load.
    pub fn unsupported_relation(kind: impl Into<String>) -> Self {
        let kind = kind.into();
        Self::new(
            ErrorCode::UnsupportedRelationKind,
            format!("unsupported relationship kind: {}", kind),
        )
        .with_suggestion("Supported kinds are has-one, has-many, belongs-to and many-to-many")
    }

    /// The eager-load tag value on a field is not a boolean.
    pub fn invalid_preload_option(field: impl Into<String>, value: impl Into<String>) -> Self {
        let field = field.into();
        let value = value.into();
        Self::new(
            ErrorCode::InvalidPreloadOption,
            format!("invalid eager-load option {:?} on field {}", value, field),
        )
        .with_field(&field)
        .with_suggestion("Use \"true\" or \"false\" for the eager-load tag")
    }

    /// A query issued during preloading failed.
    pub fn execution(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::QueryExecution, message)
    }

    /// A row returned by the engine could not be decoded.
    pub fn row_decode(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::RowDecode, message)
    }
}
