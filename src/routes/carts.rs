use std::collections::HashMap;

use anyhow::Context;
use axum::{
    Extension, Json,
    extract::State,
    response::IntoResponse,
};
use diesel::{ExpressionMethods, OptionalExtension, QueryDsl, SelectableHelper};
use diesel_async::{AsyncConnection, RunQueryDsl};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use utoipa_axum::router::OpenApiRouter;

use crate::{
    core::{
        app_error::{AppError, StdResponse},
        app_state::AppState,
        middleware::{self, BearerToken},
    },
    models::{CartEntity, CartItemEntity, CreateCartEntity, CreateCartItemEntity, ProductEntity},
    schema::{cart_items, carts, products},
};

/// Defines the cart routes. Both operations require an authenticated actor.
pub fn routes_with_openapi() -> OpenApiRouter<AppState> {
    utoipa_axum::router::OpenApiRouter::new().nest(
        "/api/carts",
        OpenApiRouter::new()
            .routes(utoipa_axum::routes!(create_cart))
            .routes(utoipa_axum::routes!(get_my_cart))
            .route_layer(axum::middleware::from_fn(middleware::authorization)),
    )
}

#[derive(Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
struct CreateCartReq {
    products: Vec<CreateCartReqItem>,
    total: f32,
    tax: f32,
    grand_total: f32,
}

#[derive(Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
struct CreateCartReqItem {
    product_id: i32,
    price: f32,
    quantity: i32,
}

impl CreateCartReq {
    /// Boundary validation, checked before the service logic runs. Field
    /// presence is already enforced by deserialization.
    fn validate(&self) -> Result<(), AppError> {
        if self.products.is_empty() {
            return Err(AppError::UnprocessableEntity(
                "products is required".to_owned(),
            ));
        }
        Ok(())
    }
}

#[derive(Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
struct CreateCartRes {
    cart: CartEntity,
    cart_items: Vec<CartItemEntity>,
}

/// Persist the actor's cart, replacing any existing one in the same
/// transaction. A user has at most one active cart.
#[utoipa::path(
    post,
    path = "/",
    tags = ["Carts"],
    security(("bearerAuth" = [])),
    request_body = CreateCartReq,
    responses(
        (status = 200, description = "Created cart successfully", body = StdResponse<CreateCartRes, String>),
        (status = 422, description = "Missing or empty required fields", body = StdResponse<CreateCartRes, String>)
    )
)]
async fn create_cart(
    State(state): State<AppState>,
    Extension(token): Extension<BearerToken>,
    Json(body): Json<CreateCartReq>,
) -> Result<impl IntoResponse, AppError> {
    body.validate()?;

    let conn = &mut state
        .db_pool
        .get()
        .await
        .context("Failed to obtain a DB connection pool")?;

    let actor = middleware::resolve_actor(conn, token).await?;
    let user_id = actor.id;

    let (cart, cart_items) = conn
        .transaction(move |conn| {
            Box::pin(async move {
                diesel::delete(carts::table)
                    .filter(carts::user_id.eq(user_id))
                    .execute(conn)
                    .await
                    .context("Failed to replace existing cart")?;

                let cart: CartEntity = diesel::insert_into(carts::table)
                    .values(CreateCartEntity {
                        user_id,
                        total: body.total,
                        tax: body.tax,
                        grand_total: body.grand_total,
                    })
                    .returning(CartEntity::as_returning())
                    .get_result(conn)
                    .await
                    .context("Failed to create cart")?;

                let cart_items: Vec<CreateCartItemEntity> = body
                    .products
                    .into_iter()
                    .filter(|item| item.quantity > 0)
                    .map(|item| CreateCartItemEntity {
                        cart_id: cart.id,
                        product_id: item.product_id,
                        price: item.price,
                        quantity: item.quantity,
                    })
                    .collect();

                let cart_items = diesel::insert_into(cart_items::table)
                    .values(cart_items)
                    .returning(CartItemEntity::as_returning())
                    .get_results(conn)
                    .await
                    .context("Failed to create cart items")?;

                Ok::<(CartEntity, Vec<CartItemEntity>), anyhow::Error>((cart, cart_items))
            })
        })
        .await
        .context("Transaction failed")?;

    Ok(StdResponse::success(
        CreateCartRes { cart, cart_items },
        "Cart Creation is Success",
    ))
}

#[derive(Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
struct CartItemRes {
    item: CartItemEntity,
    product: Option<ProductEntity>,
}

#[derive(Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
struct GetCartRes {
    cart: CartEntity,
    cart_items: Vec<CartItemRes>,
}

/// Fetch the authenticated actor's cart with product relations populated.
/// Data is empty when the actor has no cart.
#[utoipa::path(
    get,
    path = "/me",
    tags = ["Carts"],
    security(("bearerAuth" = [])),
    responses(
        (status = 200, description = "Get my cart", body = StdResponse<GetCartRes, String>)
    )
)]
async fn get_my_cart(
    State(state): State<AppState>,
    Extension(token): Extension<BearerToken>,
) -> Result<impl IntoResponse, AppError> {
    let conn = &mut state
        .db_pool
        .get()
        .await
        .context("Failed to obtain a DB connection pool")?;

    let actor = middleware::resolve_actor(conn, token).await?;

    let cart: Option<CartEntity> = carts::table
        .filter(carts::user_id.eq(actor.id))
        .get_result(conn)
        .await
        .optional()
        .context("Failed to get my cart")?;

    let Some(cart) = cart else {
        return Ok(StdResponse::<GetCartRes, _>::success_opt(
            None,
            "Get my cart successfully",
        ));
    };

    let items: Vec<CartItemEntity> = cart_items::table
        .filter(cart_items::cart_id.eq(cart.id))
        .get_results(conn)
        .await
        .context("Failed to get cart items")?;

    let product_ids: Vec<i32> = items.iter().map(|item| item.product_id).collect();
    let product_by_id: HashMap<i32, ProductEntity> = products::table
        .filter(products::id.eq_any(&product_ids))
        .get_results::<ProductEntity>(conn)
        .await
        .context("Failed to get products")?
        .into_iter()
        .map(|product| (product.id, product))
        .collect();

    let cart_items = items
        .into_iter()
        .map(|item| CartItemRes {
            product: product_by_id.get(&item.product_id).cloned(),
            item,
        })
        .collect();

    Ok(StdResponse::success_opt(
        Some(GetCartRes { cart, cart_items }),
        "Get my cart successfully",
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_tax_field_fails_deserialization() {
        let result = serde_json::from_str::<CreateCartReq>(
            r#"{
                "products": [{"productId": 1, "price": 100.0, "quantity": 1}],
                "total": 100.0,
                "grandTotal": 110.0
            }"#,
        );
        assert!(result.is_err());
    }

    #[test]
    fn empty_products_fail_validation() {
        let body: CreateCartReq = serde_json::from_str(
            r#"{"products": [], "total": 0.0, "tax": 0.0, "grandTotal": 0.0}"#,
        )
        .unwrap();
        assert!(matches!(
            body.validate(),
            Err(AppError::UnprocessableEntity(_))
        ));
    }

    #[test]
    fn populated_products_pass_validation() {
        let body: CreateCartReq = serde_json::from_str(
            r#"{
                "products": [{"productId": 2, "price": 50.0, "quantity": 2}],
                "total": 100.0,
                "tax": 10.0,
                "grandTotal": 110.0
            }"#,
        )
        .unwrap();
        assert!(body.validate().is_ok());
    }
}
