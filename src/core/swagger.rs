use anyhow::Result;
use utoipa::openapi::OpenApi;
use utoipa::openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme};
use utoipa_swagger_ui::SwaggerUi;

/// Mounts Swagger UI over the merged OpenAPI document and registers the
/// bearer security scheme referenced by the protected operations.
pub fn create_swagger_ui(mut openapi: OpenApi) -> Result<SwaggerUi> {
    let components = openapi
        .components
        .get_or_insert(utoipa::openapi::Components::new());
    components.add_security_scheme(
        "bearerAuth",
        SecurityScheme::Http(
            HttpBuilder::new()
                .scheme(HttpAuthScheme::Bearer)
                .bearer_format("UUID")
                .build(),
        ),
    );

    Ok(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", openapi))
}
