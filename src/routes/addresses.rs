use anyhow::Context;
use axum::{
    Extension, Json,
    extract::{Path, State},
    response::IntoResponse,
};
use diesel::{ExpressionMethods, OptionalExtension, QueryDsl, QueryResult, SelectableHelper};
use diesel_async::RunQueryDsl;
use serde::Deserialize;
use utoipa::ToSchema;
use utoipa_axum::router::OpenApiRouter;

use crate::{
    core::{
        aliases::DieselError,
        app_error::{AppError, StdResponse},
        app_state::AppState,
        middleware::{self, BearerToken},
    },
    models::{AddressEntity, CreateAddressEntity, UpdateAddressEntity},
    schema::addresses,
};

/// Defines the shipping-address routes. All of them are owner-scoped.
pub fn routes_with_openapi() -> OpenApiRouter<AppState> {
    utoipa_axum::router::OpenApiRouter::new().nest(
        "/api/addresses",
        OpenApiRouter::new()
            .routes(utoipa_axum::routes!(create_address))
            .routes(utoipa_axum::routes!(get_my_address))
            .routes(utoipa_axum::routes!(update_address))
            .routes(utoipa_axum::routes!(delete_address))
            .route_layer(axum::middleware::from_fn(middleware::authorization)),
    )
}

#[derive(Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
struct AddressReq {
    mobile: String,
    flat: String,
    street: String,
    landmark: String,
    city: String,
    state: String,
    country: String,
    pin_code: String,
}

/// Create the actor's shipping address. A user owns at most one address,
/// so a second create is rejected.
#[utoipa::path(
    post,
    path = "/",
    tags = ["Addresses"],
    security(("bearerAuth" = [])),
    request_body = AddressReq,
    responses(
        (status = 200, description = "Created address successfully", body = StdResponse<AddressEntity, String>),
        (status = 400, description = "Address already exists", body = StdResponse<AddressEntity, String>)
    )
)]
async fn create_address(
    State(state): State<AppState>,
    Extension(token): Extension<BearerToken>,
    Json(body): Json<AddressReq>,
) -> Result<impl IntoResponse, AppError> {
    let conn = &mut state
        .db_pool
        .get()
        .await
        .context("Failed to obtain a DB connection pool")?;

    let actor = middleware::resolve_actor(conn, token).await?;

    let existing: i64 = addresses::table
        .filter(addresses::user_id.eq(actor.id))
        .count()
        .get_result(conn)
        .await
        .context("Failed to check for an existing address")?;

    if existing > 0 {
        return Err(AppError::BadRequest(
            "Address already exists for this user".to_owned(),
        ));
    }

    let address: AddressEntity = diesel::insert_into(addresses::table)
        .values(CreateAddressEntity {
            user_id: actor.id,
            mobile: body.mobile,
            flat: body.flat,
            street: body.street,
            landmark: body.landmark,
            city: body.city,
            state: body.state,
            country: body.country,
            pin_code: body.pin_code,
        })
        .returning(AddressEntity::as_returning())
        .get_result(conn)
        .await
        .context("Failed to create address")?;

    Ok(StdResponse::success(address, "Address Creation is Success"))
}

/// Fetch the actor's shipping address. Data is empty when none exists.
#[utoipa::path(
    get,
    path = "/me",
    tags = ["Addresses"],
    security(("bearerAuth" = [])),
    responses(
        (status = 200, description = "Get my address", body = StdResponse<AddressEntity, String>)
    )
)]
async fn get_my_address(
    State(state): State<AppState>,
    Extension(token): Extension<BearerToken>,
) -> Result<impl IntoResponse, AppError> {
    let conn = &mut state
        .db_pool
        .get()
        .await
        .context("Failed to obtain a DB connection pool")?;

    let actor = middleware::resolve_actor(conn, token).await?;

    let address: Option<AddressEntity> = addresses::table
        .filter(addresses::user_id.eq(actor.id))
        .get_result(conn)
        .await
        .optional()
        .context("Failed to get my address")?;

    Ok(StdResponse::success_opt(
        address,
        "Get address successfully",
    ))
}

/// Update the actor's own address.
#[utoipa::path(
    put,
    path = "/{id}",
    tags = ["Addresses"],
    security(("bearerAuth" = [])),
    params(
        ("id" = i32, Path, description = "Address ID to update")
    ),
    request_body = AddressReq,
    responses(
        (status = 200, description = "Updated address successfully", body = StdResponse<AddressEntity, String>),
        (status = 404, description = "No address with this ID", body = StdResponse<AddressEntity, String>)
    )
)]
async fn update_address(
    Path(id): Path<i32>,
    State(state): State<AppState>,
    Extension(token): Extension<BearerToken>,
    Json(body): Json<AddressReq>,
) -> Result<impl IntoResponse, AppError> {
    let conn = &mut state
        .db_pool
        .get()
        .await
        .context("Failed to obtain a DB connection pool")?;

    let actor = middleware::resolve_actor(conn, token).await?;

    let address: QueryResult<AddressEntity> = diesel::update(
        addresses::table
            .find(id)
            .filter(addresses::user_id.eq(actor.id)),
    )
    .set((
        UpdateAddressEntity {
            mobile: body.mobile,
            flat: body.flat,
            street: body.street,
            landmark: body.landmark,
            city: body.city,
            state: body.state,
            country: body.country,
            pin_code: body.pin_code,
        },
        addresses::updated_at.eq(diesel::dsl::now),
    ))
    .returning(AddressEntity::as_returning())
    .get_result(conn)
    .await;

    match address {
        Ok(address) => Ok(StdResponse::success(address, "Address is Updated!")),
        Err(DieselError::NotFound) => Err(AppError::NotFound("No Address found".to_owned())),
        Err(err) => Err(AppError::Other(err.into())),
    }
}

/// Delete the actor's own address.
#[utoipa::path(
    delete,
    path = "/{id}",
    tags = ["Addresses"],
    security(("bearerAuth" = [])),
    params(
        ("id" = i32, Path, description = "Address ID to delete")
    ),
    responses(
        (status = 200, description = "Deleted address successfully", body = StdResponse<AddressEntity, String>),
        (status = 404, description = "No address with this ID", body = StdResponse<AddressEntity, String>)
    )
)]
async fn delete_address(
    Path(id): Path<i32>,
    State(state): State<AppState>,
    Extension(token): Extension<BearerToken>,
) -> Result<impl IntoResponse, AppError> {
    let conn = &mut state
        .db_pool
        .get()
        .await
        .context("Failed to obtain a DB connection pool")?;

    let actor = middleware::resolve_actor(conn, token).await?;

    let address: QueryResult<AddressEntity> = diesel::delete(addresses::table)
        .filter(addresses::id.eq(id))
        .filter(addresses::user_id.eq(actor.id))
        .returning(AddressEntity::as_returning())
        .get_result(conn)
        .await;

    match address {
        Ok(address) => Ok(StdResponse::success(address, "Address is Deleted!")),
        Err(DieselError::NotFound) => Err(AppError::NotFound("No Address found".to_owned())),
        Err(err) => Err(AppError::Other(err.into())),
    }
}
