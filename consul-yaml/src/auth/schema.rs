use super::common::{FIELD_NAMESPACE, FIELD_PARTITION};
use super::registry::AuthLoginRegistry;
use crate::common::{Resource, Schema};

/// Schema of a backend's top-level block: a list of at most one `resource`
/// that conflicts with every other registered auth-login field
pub fn get_login_schema(
    registry: &AuthLoginRegistry,
    auth_field: &str,
    description: &str,
    resource_fn: impl FnOnce() -> Resource,
) -> Schema {
    let mut conflicts: Vec<String> = registry
        .fields()
        .into_iter()
        .filter(|field| field != auth_field)
        .collect();
    conflicts.sort();

    Schema::block_list(description, resource_fn())
        .max_items(1)
        .conflicts_with(conflicts)
}

/// Add the `namespace` and `partition` fields shared by every backend.
///
/// # Panics
///
/// Panics if `resource` already defines either field.
pub fn must_add_login_schema(resource: &mut Resource, auth_field: &str) {
    let common = [
        (
            FIELD_NAMESPACE,
            "The Consul namespace to log in to. Enterprise only.",
        ),
        (
            FIELD_PARTITION,
            "The Consul admin partition to log in to. Enterprise only.",
        ),
    ];

    for (field, description) in common {
        if resource.schema.contains_key(field) {
            panic!(
                "auth login {:?} already defines the common field {:?}",
                auth_field, field
            );
        }
        resource
            .schema
            .insert(field.to_string(), Schema::string(description));
    }
}
