use axum::{
    extract::Request,
    http::header::AUTHORIZATION,
    middleware::Next,
    response::Response,
};
use diesel::{OptionalExtension, QueryDsl, SelectableHelper};
use diesel_async::RunQueryDsl;
use uuid::Uuid;

use crate::{
    core::{aliases::DbConnection, app_error::AppError},
    models::UserEntity,
    schema::{auth_tokens, users},
};

/// Bearer token carried through request extensions after the routing layer
/// has validated the header shape.
#[derive(Clone, Copy, Debug)]
pub struct BearerToken(pub Uuid);

/// Rejects requests whose `Authorization` header is missing or malformed
/// before any handler runs. The store lookup happens later, inside the
/// handler, via [`resolve_actor`].
pub async fn authorization(mut request: Request, next: Next) -> Result<Response, AppError> {
    let header = request
        .headers()
        .get(AUTHORIZATION)
        .and_then(|value| value.to_str().ok());

    let token = header.and_then(extract_bearer_token).ok_or_else(|| {
        AppError::Unauthorized("Missing or invalid Authorization header".to_owned())
    })?;

    let token = Uuid::parse_str(token)
        .map_err(|_| AppError::Unauthorized("Malformed bearer token".to_owned()))?;

    request.extensions_mut().insert(BearerToken(token));
    Ok(next.run(request).await)
}

fn extract_bearer_token(value: &str) -> Option<&str> {
    let mut parts = value.splitn(2, ' ');

    let scheme = parts.next()?;
    let token = parts.next()?.trim();

    if !scheme.eq_ignore_ascii_case("bearer") || token.is_empty() {
        return None;
    }

    Some(token)
}

/// Resolves the authenticated actor from its bearer token. Every protected
/// operation calls this first; an unknown token always short-circuits with
/// an unauthorized response.
pub async fn resolve_actor(
    conn: &mut DbConnection<'_>,
    token: BearerToken,
) -> Result<UserEntity, AppError> {
    let actor: Option<UserEntity> = auth_tokens::table
        .find(token.0)
        .inner_join(users::table)
        .select(UserEntity::as_select())
        .get_result(conn)
        .await
        .optional()
        .map_err(|err| AppError::Other(err.into()))?;

    actor.ok_or_else(|| AppError::Unauthorized("Invalid bearer token".to_owned()))
}

/// Explicit per-operation role check for admin-only services.
pub fn require_admin(actor: &UserEntity) -> Result<(), AppError> {
    if actor.is_admin || actor.is_super_admin {
        Ok(())
    } else {
        Err(AppError::ForbiddenResource(
            "Admin privileges are required".to_owned(),
        ))
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;

    use super::*;

    #[test]
    fn extracts_valid_bearer_token() {
        assert_eq!(extract_bearer_token("Bearer abc123"), Some("abc123"));
    }

    #[test]
    fn scheme_is_case_insensitive() {
        assert_eq!(extract_bearer_token("bearer abc123"), Some("abc123"));
        assert_eq!(extract_bearer_token("BEARER abc123"), Some("abc123"));
    }

    #[test]
    fn rejects_non_bearer_scheme() {
        assert_eq!(extract_bearer_token("Basic abc123"), None);
    }

    #[test]
    fn rejects_empty_token() {
        assert_eq!(extract_bearer_token("Bearer "), None);
        assert_eq!(extract_bearer_token("Bearer"), None);
    }

    fn actor(is_admin: bool, is_super_admin: bool) -> UserEntity {
        UserEntity {
            id: 1,
            username: "meena".to_owned(),
            email: "meena@example.com".to_owned(),
            is_admin,
            is_super_admin,
            image_url: String::new(),
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn admin_check_accepts_either_role_flag() {
        assert!(require_admin(&actor(true, false)).is_ok());
        assert!(require_admin(&actor(false, true)).is_ok());
    }

    #[test]
    fn admin_check_rejects_plain_users() {
        assert!(matches!(
            require_admin(&actor(false, false)),
            Err(AppError::ForbiddenResource(_))
        ));
    }
}
