//! Typed client for the ShopMart API plus the profile-view presentation
//! workflow built on top of it.

pub mod api;
pub mod profile;
pub mod uploads;
