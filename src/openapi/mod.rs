use utoipa::{
    openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme},
    Modify, OpenApi,
};
use utoipa_swagger_ui::SwaggerUi;

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Back-office API",
        version = "1.0.0",
        description = r#"
# Back-office API

Administration of the product catalog: products and their variants, brands,
categories, units, variant attributes, and the roles and permissions that gate
access to them.

## Authentication

Every resource endpoint requires a JWT bearer token whose claims carry the
caller's roles and permissions:

```
Authorization: Bearer <your-jwt-token>
```

Holders of the `admin` role may call everything. Other callers need the
`resource:action` permission listed on each route group; `resource:*` grants
every action on that resource.

## SKUs

Products get a base SKU of the form `SKU-0001` when none is supplied. Variants
get `<base>-01`, `<base>-02`, ... in submission order, skipping any value already
held by a live or deleted row.

## Listings

Table endpoints accept `search`, `sort`, `order` (`asc`/`desc`), `limit`,
`page` and `draw`, and answer with
`{data, recordsTotal, recordsFiltered, draw}`.

## Errors

Failures carry a message, the request id, and for 422 responses a list of
`field: message` entries.
        "#
    ),
    servers(
        (url = "http://localhost:8080", description = "Local development")
    ),
    modifiers(&SecurityAddon),
    security(("bearer_auth" = [])),
    tags(
        (name = "products", description = "Products and their variants"),
        (name = "brands", description = "Brands"),
        (name = "categories", description = "Category tree"),
        (name = "catalog", description = "Units and variant attributes"),
        (name = "access", description = "Roles, permissions and assignments")
    ),
    paths(
        // Products
        crate::handlers::products::list_products,
        crate::handlers::products::product_lookups,
        crate::handlers::products::get_product,
        crate::handlers::products::create_product,
        crate::handlers::products::update_product,
        crate::handlers::products::delete_product,

        // Brands
        crate::handlers::brands::list_brands,
        crate::handlers::brands::get_brand,
        crate::handlers::brands::create_brand,
        crate::handlers::brands::update_brand,
        crate::handlers::brands::delete_brand,

        // Categories
        crate::handlers::categories::list_categories,
        crate::handlers::categories::get_category,
        crate::handlers::categories::create_category,
        crate::handlers::categories::update_category,
        crate::handlers::categories::delete_category,

        // Catalog
        crate::handlers::catalog::list_units,
        crate::handlers::catalog::create_unit,
        crate::handlers::catalog::list_attributes,
        crate::handlers::catalog::create_attribute,
        crate::handlers::catalog::create_value,

        // Access
        crate::handlers::access::me,
        crate::handlers::access::list_permissions,
        crate::handlers::access::create_permission,
        crate::handlers::access::update_permission,
        crate::handlers::access::delete_permission,
        crate::handlers::access::list_roles,
        crate::handlers::access::get_role,
        crate::handlers::access::create_role,
        crate::handlers::access::update_role,
        crate::handlers::access::delete_role,
        crate::handlers::access::assign_role,
        crate::handlers::access::user_access,
    ),
    components(
        schemas(
            crate::services::products::ProductInput,
            crate::services::products::ProductDetail,
            crate::services::products::VariantDetail,
            crate::services::variants::VariantInput,
            crate::services::brands::BrandInput,
            crate::services::categories::CategoryInput,
            crate::services::categories::CategoryRow,
            crate::services::catalog::UnitInput,
            crate::services::catalog::AttributeInput,
            crate::services::catalog::ValueInput,
            crate::services::access::PermissionInput,
            crate::services::access::RoleInput,
            crate::handlers::access::AssignRoleRequest,
            crate::handlers::products::ProductLookups,
            crate::auth::AuthUser,
            crate::errors::ErrorResponse
        )
    )
)]
pub struct ApiDocV1;

struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "bearer_auth",
                SecurityScheme::Http(
                    HttpBuilder::new()
                        .scheme(HttpAuthScheme::Bearer)
                        .bearer_format("JWT")
                        .build(),
                ),
            );
        }
    }
}

pub fn swagger_ui() -> SwaggerUi {
    SwaggerUi::new("/swagger-ui")
        .url("/api-docs/openapi.json", ApiDocV1::openapi())
        .config(utoipa_swagger_ui::Config::from("/api-docs/openapi.json").try_it_out_enabled(true))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn openapi_document_lists_the_product_routes() {
        let openapi = ApiDocV1::openapi();
        let json = serde_json::to_string_pretty(&openapi).unwrap();
        assert!(json.contains("Back-office API"));
        assert!(json.contains("/api/v1/products"));
        assert!(json.contains("/api/v1/roles"));
        assert!(json.contains("bearer_auth"));
    }
}
