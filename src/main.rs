use anyhow::Result;
use axum::Router;
use diesel_migrations::{EmbeddedMigrations, embed_migrations};
use shopmart_service::core::{bootstrap, config, db, swagger};
use shopmart_service::routes;

/// Migrations embedded into the binary which helps with streamlining image building process
const MIGRATIONS: EmbeddedMigrations = embed_migrations!("migrations");

#[tokio::main]
async fn main() -> Result<()> {
    bootstrap::init_tracing();
    bootstrap::init_env();

    let routes = routes::users::routes_with_openapi()
        .merge(routes::addresses::routes_with_openapi())
        .merge(routes::categories::routes_with_openapi())
        .merge(routes::products::routes_with_openapi())
        .merge(routes::carts::routes_with_openapi())
        .merge(routes::orders::routes_with_openapi());

    let mut openapi = routes.get_openapi().clone();
    openapi.info = utoipa::openapi::InfoBuilder::new()
        .title("ShopMart Commerce API")
        .version("1.0.0")
        .build();
    let swagger_ui = swagger::create_swagger_ui(openapi)?;

    let app = Router::new()
        .route("/", axum::routing::get(routes::welcome))
        .merge(routes)
        .merge(swagger_ui);

    tracing::info!("Running migrations...");
    let config = config::load()?;
    let migrations_count = db::run_migrations_blocking(MIGRATIONS, &config.database.url).await?;
    tracing::info!("Run {} new migrations successfully", migrations_count);

    bootstrap::bootstrap("ShopMart", app).await?;
    Ok(())
}
