use anyhow::Context;
use axum::{
    Extension, Json,
    extract::State,
    response::IntoResponse,
};
use argon2::{
    Argon2,
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString, rand_core::OsRng},
};
use diesel::{ExpressionMethods, QueryDsl, QueryResult, SelectableHelper};
use diesel_async::RunQueryDsl;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use utoipa_axum::router::OpenApiRouter;
use uuid::Uuid;

use crate::{
    core::{
        aliases::DieselError,
        app_error::{AppError, StdResponse},
        app_state::AppState,
        middleware::{self, BearerToken},
    },
    models::{AuthTokenEntity, CreateAuthTokenEntity, CreateUserEntity, UserAuthEntity, UserEntity},
    schema::{auth_tokens, users},
};

/// Defines the user routes: public registration/login plus authenticated
/// profile operations.
pub fn routes_with_openapi() -> OpenApiRouter<AppState> {
    let public = OpenApiRouter::new()
        .routes(utoipa_axum::routes!(register))
        .routes(utoipa_axum::routes!(login));

    let protected = OpenApiRouter::new()
        .routes(utoipa_axum::routes!(get_me))
        .routes(utoipa_axum::routes!(update_profile_picture))
        .route_layer(axum::middleware::from_fn(middleware::authorization));

    utoipa_axum::router::OpenApiRouter::new().nest("/api/users", public.merge(protected))
}

#[derive(Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
struct RegisterReq {
    username: String,
    email: String,
    password: String,
}

/// Register a new user. New accounts carry no role flags and an empty
/// profile image until the upload widget sets one.
#[utoipa::path(
    post,
    path = "/register",
    tags = ["Users"],
    request_body = RegisterReq,
    responses(
        (status = 200, description = "Registered successfully", body = StdResponse<UserEntity, String>),
        (status = 400, description = "Email already registered", body = StdResponse<UserEntity, String>)
    )
)]
async fn register(
    State(state): State<AppState>,
    Json(body): Json<RegisterReq>,
) -> Result<impl IntoResponse, AppError> {
    let conn = &mut state
        .db_pool
        .get()
        .await
        .context("Failed to obtain a DB connection pool")?;

    let existing: i64 = users::table
        .filter(users::email.eq(&body.email))
        .count()
        .get_result(conn)
        .await
        .context("Failed to check for an existing user")?;

    if existing > 0 {
        return Err(AppError::BadRequest(
            "User already exists with this email".to_owned(),
        ));
    }

    let password_hash = hash_password(&body.password)?;
    let user: UserEntity = diesel::insert_into(users::table)
        .values(CreateUserEntity {
            username: body.username,
            email: body.email,
            password_hash,
        })
        .returning(UserEntity::as_returning())
        .get_result(conn)
        .await
        .context("Failed to create user")?;

    Ok(StdResponse::success(user, "Registration is Success"))
}

#[derive(Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
struct LoginReq {
    email: String,
    password: String,
}

#[derive(Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
struct LoginRes {
    user: UserEntity,
    token: Uuid,
}

/// Verify credentials and issue a bearer token for subsequent requests.
#[utoipa::path(
    post,
    path = "/login",
    tags = ["Users"],
    request_body = LoginReq,
    responses(
        (status = 200, description = "Logged in successfully", body = StdResponse<LoginRes, String>),
        (status = 401, description = "Invalid credentials", body = StdResponse<LoginRes, String>)
    )
)]
async fn login(
    State(state): State<AppState>,
    Json(body): Json<LoginReq>,
) -> Result<impl IntoResponse, AppError> {
    let conn = &mut state
        .db_pool
        .get()
        .await
        .context("Failed to obtain a DB connection pool")?;

    let account: QueryResult<UserAuthEntity> = users::table
        .filter(users::email.eq(&body.email))
        .select(UserAuthEntity::as_select())
        .get_result(conn)
        .await;

    let account = match account {
        Ok(account) => account,
        Err(DieselError::NotFound) => {
            return Err(AppError::Unauthorized(
                "Invalid email or password".to_owned(),
            ));
        }
        Err(err) => return Err(AppError::Other(err.into())),
    };

    if !verify_password(&body.password, &account.password_hash)? {
        return Err(AppError::Unauthorized(
            "Invalid email or password".to_owned(),
        ));
    }

    let token: AuthTokenEntity = diesel::insert_into(auth_tokens::table)
        .values(CreateAuthTokenEntity {
            id: Uuid::new_v4(),
            user_id: account.id,
        })
        .returning(AuthTokenEntity::as_returning())
        .get_result(conn)
        .await
        .context("Failed to issue auth token")?;

    Ok(StdResponse::success(
        LoginRes {
            user: account.into(),
            token: token.id,
        },
        "Login is Success",
    ))
}

/// Fetch the authenticated actor's profile.
#[utoipa::path(
    get,
    path = "/me",
    tags = ["Users"],
    security(("bearerAuth" = [])),
    responses(
        (status = 200, description = "Get profile", body = StdResponse<UserEntity, String>)
    )
)]
async fn get_me(
    State(state): State<AppState>,
    Extension(token): Extension<BearerToken>,
) -> Result<impl IntoResponse, AppError> {
    let conn = &mut state
        .db_pool
        .get()
        .await
        .context("Failed to obtain a DB connection pool")?;

    let actor = middleware::resolve_actor(conn, token).await?;

    Ok(StdResponse::success(actor, "Get profile successfully"))
}

#[derive(Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
struct UpdateProfilePictureReq {
    image_url: String,
}

/// Store the URL returned by the upload widget on the actor's profile.
#[utoipa::path(
    post,
    path = "/profile-picture",
    tags = ["Users"],
    security(("bearerAuth" = [])),
    request_body = UpdateProfilePictureReq,
    responses(
        (status = 200, description = "Updated profile picture", body = StdResponse<UserEntity, String>)
    )
)]
async fn update_profile_picture(
    State(state): State<AppState>,
    Extension(token): Extension<BearerToken>,
    Json(body): Json<UpdateProfilePictureReq>,
) -> Result<impl IntoResponse, AppError> {
    let conn = &mut state
        .db_pool
        .get()
        .await
        .context("Failed to obtain a DB connection pool")?;

    let actor = middleware::resolve_actor(conn, token).await?;

    let user: UserEntity = diesel::update(users::table.find(actor.id))
        .set((
            users::image_url.eq(body.image_url),
            users::updated_at.eq(diesel::dsl::now),
        ))
        .returning(UserEntity::as_returning())
        .get_result(conn)
        .await
        .context("Failed to update profile picture")?;

    Ok(StdResponse::success(user, "Profile Picture is Updated!"))
}

fn hash_password(password: &str) -> Result<String, AppError> {
    let salt = SaltString::generate(&mut OsRng);
    let hash = Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map_err(|err| AppError::Other(anyhow::anyhow!("Failed to hash password: {err}")))?;
    Ok(hash.to_string())
}

fn verify_password(password: &str, hash: &str) -> Result<bool, AppError> {
    let parsed = PasswordHash::new(hash)
        .map_err(|err| AppError::Other(anyhow::anyhow!("Stored password hash is invalid: {err}")))?;
    Ok(Argon2::default()
        .verify_password(password.as_bytes(), &parsed)
        .is_ok())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hashed_password_verifies() {
        let hash = hash_password("hunter2 is weak").unwrap();
        assert!(verify_password("hunter2 is weak", &hash).unwrap());
        assert!(!verify_password("hunter2", &hash).unwrap());
    }

    #[test]
    fn hashes_are_salted() {
        let a = hash_password("same password").unwrap();
        let b = hash_password("same password").unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn garbage_hash_is_an_internal_error() {
        assert!(matches!(
            verify_password("whatever", "not-a-phc-string"),
            Err(AppError::Other(_))
        ));
    }
}
