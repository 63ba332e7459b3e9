//! Registration-time model metadata.
//!
//! Schemas are built once when a model is registered and only read afterward.
//! The preload engine walks them level by level to resolve dotted association
//! paths; it never inspects concrete Rust types.

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::query::Query;
use crate::sql::{SqlExpr, quote_identifier};
use crate::value::Value;

/// Polymorphic discriminator carried by a relationship.
///
/// When present, preload queries gain a `column = value` conjunct so only
/// rows tagged with the owner's type are attached.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Polymorphic {
    /// The discriminator column on the related table.
    pub column: String,
    /// The discriminator value identifying the owning model.
    pub value: Value,
}

impl Polymorphic {
    /// Create a new discriminator.
    pub fn new(column: impl Into<String>, value: impl Into<Value>) -> Self {
        Self {
            column: column.into(),
            value: value.into(),
        }
    }
}

/// Column and field lists for a direct (non-join-table) relationship.
///
/// `owner_*` names the side read from the parent scope: the columns selected
/// from the parent derived table and the fields read off parent records when
/// stitching. `related_*` names the side filtered and fetched: the columns
/// the containment predicate applies to and the fields read off fetched rows.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Reference {
    /// Key columns selected from the parent query's derived table.
    pub owner_columns: Vec<String>,
    /// Matching field names on parent records.
    pub owner_fields: Vec<String>,
    /// Columns the containment predicate filters on the related table.
    pub related_columns: Vec<String>,
    /// Matching field names on fetched related records.
    pub related_fields: Vec<String>,
    /// Optional polymorphic discriminator.
    pub polymorphic: Option<Polymorphic>,
}

impl Reference {
    /// Create an empty reference.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the owner-side columns and fields.
    pub fn owner(
        mut self,
        columns: impl IntoIterator<Item = impl Into<String>>,
        fields: impl IntoIterator<Item = impl Into<String>>,
    ) -> Self {
        self.owner_columns = columns.into_iter().map(Into::into).collect();
        self.owner_fields = fields.into_iter().map(Into::into).collect();
        self
    }

    /// Set the related-side columns and fields.
    pub fn related(
        mut self,
        columns: impl IntoIterator<Item = impl Into<String>>,
        fields: impl IntoIterator<Item = impl Into<String>>,
    ) -> Self {
        self.related_columns = columns.into_iter().map(Into::into).collect();
        self.related_fields = fields.into_iter().map(Into::into).collect();
        self
    }

    /// Attach a polymorphic discriminator.
    pub fn polymorphic(mut self, column: impl Into<String>, value: impl Into<Value>) -> Self {
        self.polymorphic = Some(Polymorphic::new(column, value));
        self
    }
}

/// Column and field lists for a many-to-many relationship.
#[derive(Debug, Clone)]
pub struct ManyToManyRef {
    /// Key columns on the owner referenced by the join table.
    pub owner_columns: Vec<String>,
    /// Matching field names on parent records.
    pub owner_fields: Vec<String>,
    /// The join-table collaborator.
    pub handler: Arc<dyn JoinTable>,
}

impl ManyToManyRef {
    /// Create a new many-to-many reference.
    pub fn new(
        columns: impl IntoIterator<Item = impl Into<String>>,
        fields: impl IntoIterator<Item = impl Into<String>>,
        handler: Arc<dyn JoinTable>,
    ) -> Self {
        Self {
            owner_columns: columns.into_iter().map(Into::into).collect(),
            owner_fields: fields.into_iter().map(Into::into).collect(),
            handler,
        }
    }
}

/// A relationship between two models.
///
/// A closed set: each variant carries exactly the column and key data its
/// loader needs, and loader dispatch is an exhaustive match. `Unsupported`
/// exists for schema front ends that admit relationship kinds this engine
/// does not load; resolving through one fails with an
/// [`UnsupportedRelationKind`](crate::ErrorCode::UnsupportedRelationKind)
/// error.
#[derive(Debug, Clone)]
pub enum Relationship {
    /// One-to-one: the related table carries the foreign key.
    HasOne(Reference),
    /// One-to-many: the related table carries the foreign key.
    HasMany(Reference),
    /// Many-to-one: the owner carries the foreign key.
    BelongsTo(Reference),
    /// Many-to-many through a join table.
    ManyToMany(ManyToManyRef),
    /// A kind declared by the schema that this engine cannot load.
    Unsupported(String),
}

impl Relationship {
    /// Human-readable kind name, used in logs and errors.
    pub fn kind(&self) -> &str {
        match self {
            Self::HasOne(_) => "has_one",
            Self::HasMany(_) => "has_many",
            Self::BelongsTo(_) => "belongs_to",
            Self::ManyToMany(_) => "many_to_many",
            Self::Unsupported(kind) => kind,
        }
    }

    /// Check if this relationship yields a collection.
    pub fn is_many(&self) -> bool {
        matches!(self, Self::HasMany(_) | Self::ManyToMany(_))
    }
}

/// Join-table collaborator for many-to-many relationships.
///
/// Encapsulates the extra linking table: which of its columns point back at
/// the owner, and how to graft the join onto a query over the related table.
pub trait JoinTable: fmt::Debug + Send + Sync {
    /// The join table's name.
    fn table(&self) -> &str;

    /// The join-table columns referencing the owner, in key order.
    fn source_foreign_keys(&self) -> Vec<String>;

    /// Attach the join clause to a query over the related table, constraining
    /// the owner side to the rows selected by `parent_subquery`.
    fn join_with_query<'e>(&self, query: Query<'e>, parent_subquery: SqlExpr) -> Query<'e>;
}

/// Default join-table handler joining two tables through a linking table.
#[derive(Debug, Clone)]
pub struct DefaultJoinTable {
    /// Name of the join table.
    pub table_name: String,
    /// Join-table columns referencing the owner.
    pub source_columns: Vec<String>,
    /// Join-table columns referencing the related model.
    pub target_columns: Vec<String>,
    /// Name of the related table.
    pub related_table: String,
    /// Key columns on the related table the target columns join to.
    pub related_keys: Vec<String>,
}

impl DefaultJoinTable {
    /// Create a new join-table handler.
    pub fn new(
        table_name: impl Into<String>,
        source_columns: impl IntoIterator<Item = impl Into<String>>,
        target_columns: impl IntoIterator<Item = impl Into<String>>,
        related_table: impl Into<String>,
        related_keys: impl IntoIterator<Item = impl Into<String>>,
    ) -> Self {
        Self {
            table_name: table_name.into(),
            source_columns: source_columns.into_iter().map(Into::into).collect(),
            target_columns: target_columns.into_iter().map(Into::into).collect(),
            related_table: related_table.into(),
            related_keys: related_keys.into_iter().map(Into::into).collect(),
        }
    }
}

impl JoinTable for DefaultJoinTable {
    fn table(&self) -> &str {
        &self.table_name
    }

    fn source_foreign_keys(&self) -> Vec<String> {
        self.source_columns.clone()
    }

    fn join_with_query<'e>(&self, query: Query<'e>, parent_subquery: SqlExpr) -> Query<'e> {
        let jt = quote_identifier(&self.table_name);
        let related = quote_identifier(&self.related_table);

        let on: Vec<_> = self
            .target_columns
            .iter()
            .zip(self.related_keys.iter())
            .map(|(tc, rk)| {
                format!(
                    "{}.{} = {}.{}",
                    jt,
                    quote_identifier(tc),
                    related,
                    quote_identifier(rk)
                )
            })
            .collect();

        let source: Vec<_> = self
            .source_columns
            .iter()
            .map(|c| format!("{}.{}", jt, quote_identifier(c)))
            .collect();
        let source_cond = if source.len() == 1 {
            source.into_iter().next().unwrap_or_default()
        } else {
            format!("({})", source.join(","))
        };

        let join_sql = format!(
            "INNER JOIN {} ON {} AND {} IN ({})",
            jt,
            on.join(" AND "),
            source_cond,
            parent_subquery.sql
        );
        query.join(join_sql, parent_subquery.args)
    }
}

/// A field on a registered model: a plain column or an association.
#[derive(Debug, Clone)]
pub struct FieldDescriptor {
    /// Field name on the model.
    pub name: String,
    /// Column name in the database.
    pub db_name: String,
    /// Relationship descriptor, if this field is an association.
    pub relationship: Option<Relationship>,
    /// Schema of the related model, for associations.
    pub related: Option<Arc<ModelSchema>>,
    /// Tag settings attached to the field (e.g. the eager-load flag).
    pub settings: Vec<(String, String)>,
}

impl FieldDescriptor {
    /// Create a plain column field.
    pub fn column(name: impl Into<String>, db_name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            db_name: db_name.into(),
            relationship: None,
            related: None,
            settings: Vec::new(),
        }
    }

    /// Create an association field.
    pub fn relation(
        name: impl Into<String>,
        db_name: impl Into<String>,
        relationship: Relationship,
        related: Arc<ModelSchema>,
    ) -> Self {
        Self {
            name: name.into(),
            db_name: db_name.into(),
            relationship: Some(relationship),
            related: Some(related),
            settings: Vec::new(),
        }
    }

    /// Attach a tag setting.
    pub fn setting(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.settings.push((key.into(), value.into()));
        self
    }

    /// Look up a tag setting by key.
    pub fn setting_value(&self, key: &str) -> Option<&str> {
        self.settings
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }
}

/// Metadata for one registered model.
#[derive(Debug, Clone)]
pub struct ModelSchema {
    /// Model name.
    pub model: String,
    /// Table name.
    pub table: String,
    /// Fields in declaration order.
    pub fields: Vec<FieldDescriptor>,
}

impl ModelSchema {
    /// Create a new schema.
    pub fn new(model: impl Into<String>, table: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            table: table.into(),
            fields: Vec::new(),
        }
    }

    /// Register a field.
    pub fn register(mut self, field: FieldDescriptor) -> Self {
        self.fields.push(field);
        self
    }

    /// Look up a field by name.
    pub fn field(&self, name: &str) -> Option<&FieldDescriptor> {
        self.fields.iter().find(|f| f.name == name)
    }

    /// Look up a field by database column name.
    pub fn field_by_db_name(&self, db_name: &str) -> Option<&FieldDescriptor> {
        self.fields.iter().find(|f| f.db_name == db_name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reference_builder() {
        let r = Reference::new()
            .owner(["id"], ["id"])
            .related(["customer_id"], ["customer_id"]);
        assert_eq!(r.owner_columns, vec!["id"]);
        assert_eq!(r.related_fields, vec!["customer_id"]);
        assert!(r.polymorphic.is_none());
    }

    #[test]
    fn test_relationship_kind() {
        let r = Relationship::HasMany(Reference::new());
        assert_eq!(r.kind(), "has_many");
        assert!(r.is_many());

        let r = Relationship::BelongsTo(Reference::new());
        assert!(!r.is_many());

        let r = Relationship::Unsupported("graph_edge".into());
        assert_eq!(r.kind(), "graph_edge");
    }

    #[test]
    fn test_schema_lookup() {
        let schema = ModelSchema::new("Order", "orders")
            .register(FieldDescriptor::column("Id", "id"))
            .register(FieldDescriptor::column("CustomerId", "customer_id"));

        assert!(schema.field("Id").is_some());
        assert!(schema.field("id").is_none());
        assert_eq!(
            schema.field_by_db_name("customer_id").map(|f| f.name.as_str()),
            Some("CustomerId")
        );
    }

    #[test]
    fn test_field_settings() {
        let field = FieldDescriptor::column("Tags", "tags").setting("preload", "true");
        assert_eq!(field.setting_value("preload"), Some("true"));
        assert_eq!(field.setting_value("other"), None);
    }
}
