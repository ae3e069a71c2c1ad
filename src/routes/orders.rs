use std::collections::HashMap;

use anyhow::Context;
use axum::{
    Extension, Json,
    extract::{Path, State},
    response::IntoResponse,
};
use diesel::{ExpressionMethods, QueryDsl, QueryResult, SelectableHelper};
use diesel_async::{AsyncConnection, RunQueryDsl};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use utoipa_axum::router::OpenApiRouter;

use crate::{
    core::{
        aliases::{DbConnection, DieselError},
        app_error::{AppError, StdResponse},
        app_state::AppState,
        middleware::{self, BearerToken},
    },
    models::{
        CreateOrderEntity, CreateOrderItemEntity, OrderEntity, OrderItemEntity, ProductEntity,
        UserEntity,
    },
    schema::{order_items, orders, products, users},
};

/// Status a freshly placed order starts in.
const ORDER_PLACED: &str = "PLACED";

/// Every status an order may carry. Updates are validated against this set
/// but any overwrite within it is allowed.
const ORDER_STATUSES: [&str; 5] = ["PLACED", "PROCESSING", "SHIPPED", "DELIVERED", "CANCELLED"];

/// Defines all order routes (authenticated CRUD + explicit admin gates).
pub fn routes_with_openapi() -> OpenApiRouter<AppState> {
    utoipa_axum::router::OpenApiRouter::new().nest(
        "/api/orders",
        OpenApiRouter::new()
            .routes(utoipa_axum::routes!(place_order))
            .routes(utoipa_axum::routes!(get_orders))
            .routes(utoipa_axum::routes!(get_my_orders))
            .routes(utoipa_axum::routes!(update_order_status))
            .route_layer(axum::middleware::from_fn(middleware::authorization)),
    )
}

#[derive(Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
struct PlaceOrderReq {
    products: Vec<PlaceOrderReqItem>,
    total: f32,
    tax: f32,
    grand_total: f32,
    payment_type: String,
}

#[derive(Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
struct PlaceOrderReqItem {
    product_id: i32,
    price: f32,
    quantity: i32,
}

#[derive(Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
struct OrderItemRes {
    item: OrderItemEntity,
    product: Option<ProductEntity>,
}

#[derive(Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
struct GetOrderRes {
    order: OrderEntity,
    products: Vec<OrderItemRes>,
    user_obj: Option<UserEntity>,
}

/// Create a new order owned by the authenticated actor. Totals are taken
/// from the request as-is; items snapshot the client-sent price/quantity.
#[utoipa::path(
    post,
    path = "/",
    tags = ["Orders"],
    security(("bearerAuth" = [])),
    request_body = PlaceOrderReq,
    responses(
        (status = 200, description = "Created order successfully", body = StdResponse<GetOrderRes, String>),
        (status = 400, description = "Order creation failed", body = StdResponse<GetOrderRes, String>)
    )
)]
async fn place_order(
    State(state): State<AppState>,
    Extension(token): Extension<BearerToken>,
    Json(body): Json<PlaceOrderReq>,
) -> Result<impl IntoResponse, AppError> {
    let conn = &mut state
        .db_pool
        .get()
        .await
        .context("Failed to obtain a DB connection pool")?;

    let actor = middleware::resolve_actor(conn, token).await?;
    let order_by = actor.id;

    let order = conn
        .transaction(move |conn| {
            Box::pin(async move {
                let order: OrderEntity = diesel::insert_into(orders::table)
                    .values(CreateOrderEntity {
                        order_by,
                        total: body.total,
                        tax: body.tax,
                        grand_total: body.grand_total,
                        payment_type: body.payment_type,
                        order_status: ORDER_PLACED.into(),
                    })
                    .returning(OrderEntity::as_returning())
                    .get_result(conn)
                    .await
                    .context("Failed to create order")?;

                let order_items: Vec<CreateOrderItemEntity> = body
                    .products
                    .into_iter()
                    .filter(|item| item.quantity > 0)
                    .map(|item| CreateOrderItemEntity {
                        order_id: order.id,
                        product_id: item.product_id,
                        price: item.price,
                        quantity: item.quantity,
                    })
                    .collect();

                diesel::insert_into(order_items::table)
                    .values(order_items)
                    .execute(conn)
                    .await
                    .context("Failed to create order items")?;

                Ok::<OrderEntity, anyhow::Error>(order)
            })
        })
        .await
        .map_err(|_| AppError::BadRequest("Order Creation is failed".to_owned()))?;

    // Re-fetch with the owner relation populated.
    let order = fetch_order(conn, order.id).await?;

    Ok(StdResponse::success(order, "Order Creation is Success"))
}

/// Fetch every order in the system with product and owner relations
/// populated. Listing all orders is an admin operation.
#[utoipa::path(
    get,
    path = "/",
    tags = ["Orders"],
    security(("bearerAuth" = [])),
    responses(
        (status = 200, description = "List all orders", body = StdResponse<Vec<GetOrderRes>, String>)
    )
)]
async fn get_orders(
    State(state): State<AppState>,
    Extension(token): Extension<BearerToken>,
) -> Result<impl IntoResponse, AppError> {
    let conn = &mut state
        .db_pool
        .get()
        .await
        .context("Failed to obtain a DB connection pool")?;

    let actor = middleware::resolve_actor(conn, token).await?;
    middleware::require_admin(&actor)?;

    let orders: Vec<OrderEntity> = orders::table
        .order_by(orders::updated_at.desc())
        .get_results(conn)
        .await
        .context("Failed to get orders")?;

    let orders = populate_orders(conn, orders).await?;

    Ok(StdResponse::success(orders, "Get orders successfully"))
}

/// Fetch all orders belonging to the authenticated actor, newest first.
#[utoipa::path(
    get,
    path = "/my-orders",
    tags = ["Orders"],
    security(("bearerAuth" = [])),
    responses(
        (status = 200, description = "List my orders", body = StdResponse<Vec<GetOrderRes>, String>)
    )
)]
async fn get_my_orders(
    State(state): State<AppState>,
    Extension(token): Extension<BearerToken>,
) -> Result<impl IntoResponse, AppError> {
    let conn = &mut state
        .db_pool
        .get()
        .await
        .context("Failed to obtain a DB connection pool")?;

    let actor = middleware::resolve_actor(conn, token).await?;

    let orders: Vec<OrderEntity> = orders::table
        .filter(orders::order_by.eq(actor.id))
        .order_by(orders::updated_at.desc())
        .get_results(conn)
        .await
        .context("Failed to get my orders")?;

    let orders = populate_orders(conn, orders).await?;

    Ok(StdResponse::success(orders, "Get my orders successfully"))
}

#[derive(Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
struct UpdateOrderStatusReq {
    order_status: String,
}

/// Overwrite an order's status. The new value must be a known status; any
/// overwrite within the known set is allowed. Admin operation.
#[utoipa::path(
    patch,
    path = "/{id}/status",
    tags = ["Orders"],
    security(("bearerAuth" = [])),
    params(
        ("id" = i32, Path, description = "Order ID to update")
    ),
    request_body = UpdateOrderStatusReq,
    responses(
        (status = 200, description = "Updated order status successfully", body = StdResponse<GetOrderRes, String>),
        (status = 404, description = "No order with this ID", body = StdResponse<GetOrderRes, String>)
    )
)]
async fn update_order_status(
    Path(id): Path<i32>,
    State(state): State<AppState>,
    Extension(token): Extension<BearerToken>,
    Json(body): Json<UpdateOrderStatusReq>,
) -> Result<impl IntoResponse, AppError> {
    let conn = &mut state
        .db_pool
        .get()
        .await
        .context("Failed to obtain a DB connection pool")?;

    let actor = middleware::resolve_actor(conn, token).await?;
    middleware::require_admin(&actor)?;
    validate_order_status(&body.order_status)?;

    let updated: QueryResult<OrderEntity> = diesel::update(orders::table.find(id))
        .set((
            orders::order_status.eq(&body.order_status),
            orders::updated_at.eq(diesel::dsl::now),
        ))
        .returning(OrderEntity::as_returning())
        .get_result(conn)
        .await;

    if let Err(err) = updated {
        match err {
            DieselError::NotFound => {
                return Err(AppError::NotFound("No Order found".to_owned()));
            }
            _ => return Err(AppError::Other(err.into())),
        }
    }

    let order = fetch_order(conn, id).await?;

    Ok(StdResponse::success(order, "Order Status is Updated!"))
}

fn validate_order_status(status: &str) -> Result<(), AppError> {
    if ORDER_STATUSES.contains(&status) {
        Ok(())
    } else {
        Err(AppError::BadRequest(format!(
            "{status} is not a valid order status"
        )))
    }
}

/// Load one order with its items, products, and owner populated.
async fn fetch_order(conn: &mut DbConnection<'_>, id: i32) -> Result<GetOrderRes, AppError> {
    let order: QueryResult<OrderEntity> = orders::table.find(id).get_result(conn).await;

    let order = match order {
        Ok(order) => order,
        Err(DieselError::NotFound) => {
            return Err(AppError::NotFound("No Order found".to_owned()));
        }
        Err(err) => return Err(AppError::Other(err.into())),
    };

    let mut populated = populate_orders(conn, vec![order]).await?;
    populated
        .pop()
        .ok_or_else(|| AppError::NotFound("No Order found".to_owned()))
}

/// Attach item, product, and owner relations to a batch of orders.
async fn populate_orders(
    conn: &mut DbConnection<'_>,
    orders: Vec<OrderEntity>,
) -> Result<Vec<GetOrderRes>, AppError> {
    let order_ids: Vec<i32> = orders.iter().map(|order| order.id).collect();
    let items: Vec<OrderItemEntity> = order_items::table
        .filter(order_items::order_id.eq_any(&order_ids))
        .get_results(conn)
        .await
        .context("Failed to get order items")?;

    let product_ids: Vec<i32> = items.iter().map(|item| item.product_id).collect();
    let product_by_id: HashMap<i32, ProductEntity> = products::table
        .filter(products::id.eq_any(&product_ids))
        .get_results::<ProductEntity>(conn)
        .await
        .context("Failed to get products")?
        .into_iter()
        .map(|product| (product.id, product))
        .collect();

    let owner_ids: Vec<i32> = orders.iter().map(|order| order.order_by).collect();
    let owner_by_id: HashMap<i32, UserEntity> = users::table
        .filter(users::id.eq_any(&owner_ids))
        .select(UserEntity::as_select())
        .get_results::<UserEntity>(conn)
        .await
        .context("Failed to get order owners")?
        .into_iter()
        .map(|user| (user.id, user))
        .collect();

    let mut group: HashMap<i32, Vec<OrderItemRes>> = HashMap::new();
    for item in items {
        let product = product_by_id.get(&item.product_id).cloned();
        group
            .entry(item.order_id)
            .or_default()
            .push(OrderItemRes { item, product });
    }

    Ok(orders
        .into_iter()
        .map(|order| GetOrderRes {
            products: group.remove(&order.id).unwrap_or_default(),
            user_obj: owner_by_id.get(&order.order_by).cloned(),
            order,
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use chrono::Utc;

    use super::*;

    #[test]
    fn known_statuses_pass_validation() {
        for status in ORDER_STATUSES {
            assert!(validate_order_status(status).is_ok());
        }
    }

    #[test]
    fn unknown_status_is_a_bad_request() {
        let err = validate_order_status("TELEPORTED").unwrap_err();
        assert!(matches!(err, AppError::BadRequest(_)));
        assert_eq!(err.to_string(), "TELEPORTED is not a valid order status");
    }

    #[test]
    fn place_order_request_uses_camel_case_fields() {
        let body: PlaceOrderReq = serde_json::from_str(
            r#"{
                "products": [{"productId": 1, "price": 100.0, "quantity": 1}],
                "total": 100.0,
                "tax": 10.0,
                "grandTotal": 110.0,
                "paymentType": "COD"
            }"#,
        )
        .unwrap();
        assert_eq!(body.products.len(), 1);
        assert_eq!(body.payment_type, "COD");
        assert_eq!(body.grand_total, 110.0);
    }

    #[test]
    fn order_response_exposes_owner_as_user_obj() {
        let now = Utc::now();
        let res = GetOrderRes {
            order: OrderEntity {
                id: 7,
                order_by: 3,
                total: 100.0,
                tax: 10.0,
                grand_total: 110.0,
                payment_type: "COD".to_owned(),
                order_status: ORDER_PLACED.to_owned(),
                created_at: now,
                updated_at: now,
            },
            products: vec![],
            user_obj: None,
        };
        let json = serde_json::to_value(&res).unwrap();
        assert_eq!(json["order"]["orderBy"], 3);
        assert_eq!(json["order"]["grandTotal"], 110.0);
        assert_eq!(json["order"]["orderStatus"], "PLACED");
        assert!(json["userObj"].is_null());
    }
}
