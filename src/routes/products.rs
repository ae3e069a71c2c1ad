use std::collections::HashMap;

use anyhow::Context;
use axum::{
    Extension, Json,
    extract::{Path, State},
    response::IntoResponse,
};
use diesel::{ExpressionMethods, OptionalExtension, QueryDsl, QueryResult, SelectableHelper};
use diesel_async::RunQueryDsl;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use utoipa_axum::router::OpenApiRouter;

use crate::{
    core::{
        aliases::DieselError,
        app_error::{AppError, StdResponse},
        app_state::AppState,
        middleware::{self, BearerToken},
    },
    models::{CategoryEntity, CreateProductEntity, ProductEntity},
    schema::{categories, products},
};

/// Defines the product routes: public catalog reads, admin-gated create.
pub fn routes_with_openapi() -> OpenApiRouter<AppState> {
    let public = OpenApiRouter::new()
        .routes(utoipa_axum::routes!(get_products))
        .routes(utoipa_axum::routes!(get_product));

    let protected = OpenApiRouter::new()
        .routes(utoipa_axum::routes!(create_product))
        .route_layer(axum::middleware::from_fn(middleware::authorization));

    utoipa_axum::router::OpenApiRouter::new().nest("/api/products", public.merge(protected))
}

#[derive(Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
struct CreateProductReq {
    name: String,
    description: String,
    image_url: String,
    brand: String,
    price: f32,
    quantity: i32,
    category_id: i32,
}

#[derive(Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
struct GetProductRes {
    product: ProductEntity,
    category: Option<CategoryEntity>,
}

/// Create a catalog product under an existing category. Admin operation.
#[utoipa::path(
    post,
    path = "/",
    tags = ["Products"],
    security(("bearerAuth" = [])),
    request_body = CreateProductReq,
    responses(
        (status = 200, description = "Created product successfully", body = StdResponse<ProductEntity, String>),
        (status = 404, description = "No category with this ID", body = StdResponse<ProductEntity, String>)
    )
)]
async fn create_product(
    State(state): State<AppState>,
    Extension(token): Extension<BearerToken>,
    Json(body): Json<CreateProductReq>,
) -> Result<impl IntoResponse, AppError> {
    let conn = &mut state
        .db_pool
        .get()
        .await
        .context("Failed to obtain a DB connection pool")?;

    let actor = middleware::resolve_actor(conn, token).await?;
    middleware::require_admin(&actor)?;

    let category_exists: i64 = categories::table
        .find(body.category_id)
        .count()
        .get_result(conn)
        .await
        .context("Failed to check the product category")?;

    if category_exists == 0 {
        return Err(AppError::NotFound("No Category found".to_owned()));
    }

    let product: ProductEntity = diesel::insert_into(products::table)
        .values(CreateProductEntity {
            name: body.name,
            description: body.description,
            image_url: body.image_url,
            brand: body.brand,
            price: body.price,
            quantity: body.quantity,
            category_id: body.category_id,
        })
        .returning(ProductEntity::as_returning())
        .get_result(conn)
        .await
        .context("Failed to create product")?;

    Ok(StdResponse::success(product, "Product Creation is Success"))
}

/// List every catalog product with its category populated.
#[utoipa::path(
    get,
    path = "/",
    tags = ["Products"],
    responses(
        (status = 200, description = "List all products", body = StdResponse<Vec<GetProductRes>, String>)
    )
)]
async fn get_products(State(state): State<AppState>) -> Result<impl IntoResponse, AppError> {
    let conn = &mut state
        .db_pool
        .get()
        .await
        .context("Failed to obtain a DB connection pool")?;

    let products: Vec<ProductEntity> = products::table
        .order_by(products::name.asc())
        .get_results(conn)
        .await
        .context("Failed to get products")?;

    let category_ids: Vec<i32> = products.iter().map(|product| product.category_id).collect();
    let category_by_id: HashMap<i32, CategoryEntity> = categories::table
        .filter(categories::id.eq_any(&category_ids))
        .get_results::<CategoryEntity>(conn)
        .await
        .context("Failed to get categories")?
        .into_iter()
        .map(|category| (category.id, category))
        .collect();

    let products: Vec<GetProductRes> = products
        .into_iter()
        .map(|product| GetProductRes {
            category: category_by_id.get(&product.category_id).cloned(),
            product,
        })
        .collect();

    Ok(StdResponse::success(products, "Get products successfully"))
}

/// Fetch a single product with its category populated.
#[utoipa::path(
    get,
    path = "/{id}",
    tags = ["Products"],
    params(
        ("id" = i32, Path, description = "Product ID to fetch")
    ),
    responses(
        (status = 200, description = "Get product successfully", body = StdResponse<GetProductRes, String>),
        (status = 404, description = "No product with this ID", body = StdResponse<GetProductRes, String>)
    )
)]
async fn get_product(
    Path(id): Path<i32>,
    State(state): State<AppState>,
) -> Result<impl IntoResponse, AppError> {
    let conn = &mut state
        .db_pool
        .get()
        .await
        .context("Failed to obtain a DB connection pool")?;

    let product: QueryResult<ProductEntity> = products::table.find(id).get_result(conn).await;

    let product = match product {
        Ok(product) => product,
        Err(DieselError::NotFound) => {
            return Err(AppError::NotFound("No Product found".to_owned()));
        }
        Err(err) => return Err(AppError::Other(err.into())),
    };

    let category: Option<CategoryEntity> = categories::table
        .find(product.category_id)
        .get_result(conn)
        .await
        .optional()
        .context("Failed to get the product category")?;

    Ok(StdResponse::success(
        GetProductRes { product, category },
        "Get product successfully",
    ))
}
