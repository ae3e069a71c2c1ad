use axum::response::IntoResponse;

use crate::core::app_error::StdResponse;

pub mod addresses;
pub mod carts;
pub mod categories;
pub mod orders;
pub mod products;
pub mod users;

/// Root handler, kept for parity with the original server greeting.
pub async fn welcome() -> impl IntoResponse {
    StdResponse::<(), &str>::success_opt(None, "Welcome to ShopMart Server")
}
