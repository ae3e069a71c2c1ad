use anyhow::Context;
use axum::{
    Extension, Json,
    extract::State,
    response::IntoResponse,
};
use diesel::{ExpressionMethods, QueryDsl, SelectableHelper};
use diesel_async::RunQueryDsl;
use serde::Deserialize;
use utoipa::ToSchema;
use utoipa_axum::router::OpenApiRouter;

use crate::{
    core::{
        app_error::{AppError, StdResponse},
        app_state::AppState,
        middleware::{self, BearerToken},
    },
    models::{CategoryEntity, CreateCategoryEntity},
    schema::categories,
};

/// Defines the category routes: public catalog read, admin-gated create.
pub fn routes_with_openapi() -> OpenApiRouter<AppState> {
    let public = OpenApiRouter::new().routes(utoipa_axum::routes!(get_categories));

    let protected = OpenApiRouter::new()
        .routes(utoipa_axum::routes!(create_category))
        .route_layer(axum::middleware::from_fn(middleware::authorization));

    utoipa_axum::router::OpenApiRouter::new().nest("/api/categories", public.merge(protected))
}

#[derive(Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
struct CreateCategoryReq {
    name: String,
    description: String,
}

/// Create a catalog category. Admin operation.
#[utoipa::path(
    post,
    path = "/",
    tags = ["Categories"],
    security(("bearerAuth" = [])),
    request_body = CreateCategoryReq,
    responses(
        (status = 200, description = "Created category successfully", body = StdResponse<CategoryEntity, String>)
    )
)]
async fn create_category(
    State(state): State<AppState>,
    Extension(token): Extension<BearerToken>,
    Json(body): Json<CreateCategoryReq>,
) -> Result<impl IntoResponse, AppError> {
    let conn = &mut state
        .db_pool
        .get()
        .await
        .context("Failed to obtain a DB connection pool")?;

    let actor = middleware::resolve_actor(conn, token).await?;
    middleware::require_admin(&actor)?;

    let category: CategoryEntity = diesel::insert_into(categories::table)
        .values(CreateCategoryEntity {
            name: body.name,
            description: body.description,
        })
        .returning(CategoryEntity::as_returning())
        .get_result(conn)
        .await
        .context("Failed to create category")?;

    Ok(StdResponse::success(category, "Category Creation is Success"))
}

/// List every catalog category.
#[utoipa::path(
    get,
    path = "/",
    tags = ["Categories"],
    responses(
        (status = 200, description = "List all categories", body = StdResponse<Vec<CategoryEntity>, String>)
    )
)]
async fn get_categories(State(state): State<AppState>) -> Result<impl IntoResponse, AppError> {
    let conn = &mut state
        .db_pool
        .get()
        .await
        .context("Failed to obtain a DB connection pool")?;

    let categories: Vec<CategoryEntity> = categories::table
        .order_by(categories::name.asc())
        .get_results(conn)
        .await
        .context("Failed to get categories")?;

    Ok(StdResponse::success(
        categories,
        "Get categories successfully",
    ))
}
