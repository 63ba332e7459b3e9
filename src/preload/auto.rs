//! Auto-preload: eager-tagged associations become implicit preload requests.

use tracing::debug;

use crate::error::{QueryError, QueryResult};
use crate::schema::ModelSchema;

use super::request::PreloadRequest;

/// Tag setting key marking an association for automatic eager loading.
pub const EAGER_SETTING: &str = "preload";

/// Scan a schema for eager-tagged associations.
///
/// Fields without the tag are skipped; a tag value that does not parse as a
/// boolean halts the scan with an
/// [`InvalidPreloadOption`](crate::ErrorCode::InvalidPreloadOption) error.
/// The returned requests carry no conditions and are merged into the same
/// list the path resolver consumes.
pub fn auto_preload(schema: &ModelSchema) -> QueryResult<Vec<PreloadRequest>> {
    let mut requests = Vec::new();

    for field in &schema.fields {
        if field.relationship.is_none() {
            continue;
        }

        let Some(raw) = field.setting_value(EAGER_SETTING) else {
            continue;
        };
        match parse_bool(raw) {
            Some(true) => {
                debug!(model = %schema.model, field = %field.name, "auto-preloading association");
                requests.push(PreloadRequest::new(&field.name));
            }
            Some(false) => {}
            None => return Err(QueryError::invalid_preload_option(&field.name, raw)),
        }
    }

    Ok(requests)
}

fn parse_bool(raw: &str) -> Option<bool> {
    match raw {
        "1" | "t" | "T" | "true" | "TRUE" | "True" => Some(true),
        "0" | "f" | "F" | "false" | "FALSE" | "False" => Some(false),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorCode;
    use crate::schema::{FieldDescriptor, Reference, Relationship};
    use std::sync::Arc;

    fn tagged_schema(tag: Option<&str>) -> ModelSchema {
        let related = Arc::new(ModelSchema::new("Tag", "tags"));
        let mut field = FieldDescriptor::relation(
            "Tags",
            "tags",
            Relationship::HasMany(Reference::new()),
            related,
        );
        if let Some(value) = tag {
            field = field.setting(EAGER_SETTING, value);
        }
        ModelSchema::new("Post", "posts")
            .register(FieldDescriptor::column("Id", "id"))
            .register(field)
    }

    #[test]
    fn test_untagged_field_not_auto_preloaded() {
        let requests = auto_preload(&tagged_schema(None)).unwrap();
        assert!(requests.is_empty());
    }

    #[test]
    fn test_true_tag_emits_request() {
        let requests = auto_preload(&tagged_schema(Some("true"))).unwrap();
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].path, "Tags");
        assert!(requests[0].conditions.is_empty());
    }

    #[test]
    fn test_false_tag_skipped() {
        let requests = auto_preload(&tagged_schema(Some("false"))).unwrap();
        assert!(requests.is_empty());
    }

    #[test]
    fn test_unparsable_tag_fails() {
        let err = auto_preload(&tagged_schema(Some("notabool"))).unwrap_err();
        assert_eq!(err.code, ErrorCode::InvalidPreloadOption);
        assert_eq!(err.context.field.as_deref(), Some("Tags"));
    }

    #[test]
    fn test_parse_bool_accepted_forms() {
        assert_eq!(parse_bool("1"), Some(true));
        assert_eq!(parse_bool("T"), Some(true));
        assert_eq!(parse_bool("False"), Some(false));
        assert_eq!(parse_bool("yes"), None);
    }
}
