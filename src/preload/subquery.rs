//! Derived-table subquery composition.
//!
//! Each preload level filters the related table against the rows already
//! selected by the parent query, wrapped as a derived table, instead of
//! re-querying the base table. Composite keys compose as tuple containment.

use crate::schema::Polymorphic;
use crate::sql::{SqlExpr, column_condition, quote_identifier};

/// Render the owner-key subquery over the parent expression.
///
/// Produces `SELECT <owner columns> FROM (<parent sql>) <alias>`.
pub(crate) fn derived_table(parent: &SqlExpr, owner_columns: &[String], alias: &str) -> SqlExpr {
    let select: Vec<_> = owner_columns
        .iter()
        .map(|c| quote_identifier(c))
        .collect();
    SqlExpr::new(
        format!(
            "SELECT {} FROM ({}) {}",
            select.join(","),
            parent.sql,
            quote_identifier(alias)
        ),
        parent.args.clone(),
    )
}

/// Compose the containment predicate for one preload level.
///
/// `<related columns> IN (SELECT <owner columns> FROM (<parent>) <alias>)`,
/// with a `<discriminator> = ?` conjunct appended when the relationship is
/// polymorphic. Multi-column lists render as tuples on both sides.
pub(crate) fn compose(
    parent: &SqlExpr,
    owner_columns: &[String],
    related_columns: &[String],
    alias: &str,
    polymorphic: Option<&Polymorphic>,
) -> SqlExpr {
    let subquery = derived_table(parent, owner_columns, alias);
    let mut sql = format!("{} IN ({})", column_condition(related_columns), subquery.sql);
    let mut args = subquery.args;

    if let Some(discriminator) = polymorphic {
        sql.push_str(&format!(
            " AND {} = ?",
            quote_identifier(&discriminator.column)
        ));
        args.push(discriminator.value.clone());
    }

    SqlExpr::new(sql, args)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::Value;

    fn cols(names: &[&str]) -> Vec<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_compose_single_column() {
        let parent = SqlExpr::new("SELECT * FROM orders WHERE state = ?", vec!["paid".into()]);
        let expr = compose(&parent, &cols(&["id"]), &cols(&["order_id"]), "hm_items", None);
        insta::assert_snapshot!(
            expr.sql,
            @"order_id IN (SELECT id FROM (SELECT * FROM orders WHERE state = ?) hm_items)"
        );
        assert_eq!(expr.args, vec![Value::String("paid".into())]);
    }

    #[test]
    fn test_compose_composite_key_tuple() {
        let parent = SqlExpr::new("SELECT * FROM orders", vec![]);
        let expr = compose(
            &parent,
            &cols(&["tenant_id", "id"]),
            &cols(&["tenant_id", "order_id"]),
            "hm_items",
            None,
        );
        insta::assert_snapshot!(
            expr.sql,
            @"(tenant_id,order_id) IN (SELECT tenant_id,id FROM (SELECT * FROM orders) hm_items)"
        );
    }

    #[test]
    fn test_compose_polymorphic_conjunct() {
        let parent = SqlExpr::new("SELECT * FROM posts WHERE id = ?", vec![Value::Int(7)]);
        let poly = Polymorphic::new("owner_type", "Post");
        let expr = compose(
            &parent,
            &cols(&["id"]),
            &cols(&["owner_id"]),
            "hm_comments",
            Some(&poly),
        );
        insta::assert_snapshot!(
            expr.sql,
            @"owner_id IN (SELECT id FROM (SELECT * FROM posts WHERE id = ?) hm_comments) AND owner_type = ?"
        );
        assert_eq!(
            expr.args,
            vec![Value::Int(7), Value::String("Post".into())]
        );
    }

    #[test]
    fn test_reserved_alias_is_quoted() {
        let parent = SqlExpr::new("SELECT * FROM t", vec![]);
        let expr = derived_table(&parent, &cols(&["id"]), "order");
        assert!(expr.sql.ends_with("\"order\""));
    }
}
