//! ShopMart commerce service: an HTTP JSON API over users, addresses,
//! products, categories, carts, and orders, plus a typed client for the
//! profile-view workflow.

pub mod client;
pub mod core;
pub mod models;
pub mod routes;
pub mod schema;
