use anyhow::{Context, Result, anyhow};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
    core::app_error::{AppError, StdResponse},
    models::{AddressEntity, UserEntity},
};

pub struct ApiUrls;

impl ApiUrls {
    pub fn base_url() -> String {
        std::env::var("SHOPMART_API_URL").unwrap_or("http://localhost:9000/api".to_string())
    }
}

/// Typed HTTP client over the ShopMart API. Holds the bearer token issued
/// at login and attaches it to every subsequent request.
#[derive(Clone, Debug)]
pub struct ApiClient {
    http: reqwest::Client,
    base_url: String,
    token: Option<Uuid>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct LoginReq<'a> {
    email: &'a str,
    password: &'a str,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct LoginRes {
    user: UserEntity,
    token: Uuid,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct UpdateProfilePictureReq<'a> {
    image_url: &'a str,
}

impl ApiClient {
    pub fn new() -> Self {
        Self::with_base_url(ApiUrls::base_url())
    }

    pub fn with_base_url(base_url: impl Into<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: base_url.into(),
            token: None,
        }
    }

    pub fn token(&self) -> Option<Uuid> {
        self.token
    }

    /// Verify credentials against the API and remember the issued token.
    pub async fn login(&mut self, email: &str, password: &str) -> Result<UserEntity> {
        let response: StdResponse<LoginRes, String> = self
            .http
            .post(format!("{}/users/login", self.base_url))
            .json(&LoginReq { email, password })
            .send()
            .await
            .map_err(|_| AppError::ServiceUnreachable("ShopMart API".into()))?
            .json()
            .await
            .context("Failed to parse JSON")?;

        match response.data {
            Some(login) => {
                self.token = Some(login.token);
                Ok(login.user)
            }
            None => Err(anyhow!(message_of(response.msg, "Login failed"))),
        }
    }

    pub async fn get_me(&self) -> Result<UserEntity> {
        let response: StdResponse<UserEntity, String> = self
            .get("/users/me")
            .send()
            .await
            .map_err(|_| AppError::ServiceUnreachable("ShopMart API".into()))?
            .json()
            .await
            .context("Failed to parse JSON")?;

        response
            .data
            .ok_or_else(|| anyhow!(message_of(response.msg, "Profile not found")))
    }

    /// Fetch the actor's address. A success envelope with empty data means
    /// the user simply has no address yet.
    pub async fn get_address(&self) -> Result<Option<AddressEntity>> {
        let response: StdResponse<AddressEntity, String> = self
            .get("/addresses/me")
            .send()
            .await
            .map_err(|_| AppError::ServiceUnreachable("ShopMart API".into()))?
            .json()
            .await
            .context("Failed to parse JSON")?;

        if response.status != crate::core::app_error::SUCCESS {
            return Err(anyhow!(message_of(response.msg, "Failed to get address")));
        }

        Ok(response.data)
    }

    pub async fn delete_address(&self, address_id: i32) -> Result<AddressEntity> {
        let response: StdResponse<AddressEntity, String> = self
            .http
            .delete(format!("{}/addresses/{}", self.base_url, address_id))
            .headers(self.auth_headers())
            .send()
            .await
            .map_err(|_| AppError::ServiceUnreachable("ShopMart API".into()))?
            .json()
            .await
            .context("Failed to parse JSON")?;

        response
            .data
            .ok_or_else(|| anyhow!(message_of(response.msg, "Failed to delete address")))
    }

    pub async fn update_profile_picture(&self, image_url: &str) -> Result<UserEntity> {
        let response: StdResponse<UserEntity, String> = self
            .http
            .post(format!("{}/users/profile-picture", self.base_url))
            .headers(self.auth_headers())
            .json(&UpdateProfilePictureReq { image_url })
            .send()
            .await
            .map_err(|_| AppError::ServiceUnreachable("ShopMart API".into()))?
            .json()
            .await
            .context("Failed to parse JSON")?;

        response
            .data
            .ok_or_else(|| anyhow!(message_of(response.msg, "Failed to update profile picture")))
    }

    fn get(&self, path: &str) -> reqwest::RequestBuilder {
        self.http
            .get(format!("{}{}", self.base_url, path))
            .headers(self.auth_headers())
    }

    fn auth_headers(&self) -> reqwest::header::HeaderMap {
        let mut headers = reqwest::header::HeaderMap::new();
        if let Some(token) = self.token {
            if let Ok(value) = format!("Bearer {token}").parse() {
                headers.insert(reqwest::header::AUTHORIZATION, value);
            }
        }
        headers
    }
}

impl Default for ApiClient {
    fn default() -> Self {
        Self::new()
    }
}

fn message_of(msg: Option<String>, fallback: &str) -> String {
    msg.unwrap_or_else(|| fallback.to_owned())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn base_url_is_kept_verbatim() {
        let client = ApiClient::with_base_url("http://localhost:9000/api");
        assert_eq!(client.base_url, "http://localhost:9000/api");
        assert!(client.token().is_none());
    }

    #[test]
    fn auth_headers_carry_the_bearer_token() {
        let mut client = ApiClient::with_base_url("http://localhost:9000/api");
        client.token = Some(Uuid::nil());
        let headers = client.auth_headers();
        assert_eq!(
            headers
                .get(reqwest::header::AUTHORIZATION)
                .unwrap()
                .to_str()
                .unwrap(),
            format!("Bearer {}", Uuid::nil())
        );
    }

    #[test]
    fn failed_envelope_message_is_surfaced() {
        assert_eq!(
            message_of(Some("No Order found".to_owned()), "fallback"),
            "No Order found"
        );
        assert_eq!(message_of(None, "fallback"), "fallback");
    }
}
