use chrono::{DateTime, Utc};
use diesel::{
    Selectable,
    prelude::{AsChangeset, Identifiable, Insertable, Queryable},
};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

// Users

/// Public projection of a user row. Selects a column subset so the password
/// hash never leaves the database through this type.
#[derive(Queryable, Selectable, Identifiable, Serialize, Deserialize, Debug, Clone, PartialEq, ToSchema)]
#[diesel(table_name = crate::schema::users)]
#[diesel(check_for_backend(diesel::pg::Pg))]
#[serde(rename_all = "camelCase")]
pub struct UserEntity {
    pub id: i32,
    pub username: String,
    pub email: String,
    pub is_admin: bool,
    pub is_super_admin: bool,
    pub image_url: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Full user row including the password hash. Only the login path reads it.
#[derive(Queryable, Selectable, Debug)]
#[diesel(table_name = crate::schema::users)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct UserAuthEntity {
    pub id: i32,
    pub username: String,
    pub email: String,
    pub password_hash: String,
    pub is_admin: bool,
    pub is_super_admin: bool,
    pub image_url: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<UserAuthEntity> for UserEntity {
    fn from(account: UserAuthEntity) -> Self {
        Self {
            id: account.id,
            username: account.username,
            email: account.email,
            is_admin: account.is_admin,
            is_super_admin: account.is_super_admin,
            image_url: account.image_url,
            created_at: account.created_at,
            updated_at: account.updated_at,
        }
    }
}

#[derive(Insertable, Debug)]
#[diesel(table_name = crate::schema::users)]
pub struct CreateUserEntity {
    pub username: String,
    pub email: String,
    pub password_hash: String,
}

// Auth tokens

#[derive(Queryable, Selectable, Debug)]
#[diesel(table_name = crate::schema::auth_tokens)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct AuthTokenEntity {
    pub id: Uuid,
    pub user_id: i32,
    pub created_at: DateTime<Utc>,
}

#[derive(Insertable, Debug)]
#[diesel(table_name = crate::schema::auth_tokens)]
pub struct CreateAuthTokenEntity {
    pub id: Uuid,
    pub user_id: i32,
}

// Addresses

#[derive(Queryable, Selectable, Identifiable, Serialize, Deserialize, Debug, Clone, PartialEq, ToSchema)]
#[diesel(table_name = crate::schema::addresses)]
#[diesel(check_for_backend(diesel::pg::Pg))]
#[serde(rename_all = "camelCase")]
pub struct AddressEntity {
    pub id: i32,
    pub user_id: i32,
    pub mobile: String,
    pub flat: String,
    pub street: String,
    pub landmark: String,
    pub city: String,
    pub state: String,
    pub country: String,
    pub pin_code: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Insertable, Debug)]
#[diesel(table_name = crate::schema::addresses)]
pub struct CreateAddressEntity {
    pub user_id: i32,
    pub mobile: String,
    pub flat: String,
    pub street: String,
    pub landmark: String,
    pub city: String,
    pub state: String,
    pub country: String,
    pub pin_code: String,
}

#[derive(AsChangeset, Debug)]
#[diesel(table_name = crate::schema::addresses)]
pub struct UpdateAddressEntity {
    pub mobile: String,
    pub flat: String,
    pub street: String,
    pub landmark: String,
    pub city: String,
    pub state: String,
    pub country: String,
    pub pin_code: String,
}

// Categories

#[derive(Queryable, Selectable, Identifiable, Serialize, Deserialize, Debug, Clone, ToSchema)]
#[diesel(table_name = crate::schema::categories)]
#[diesel(check_for_backend(diesel::pg::Pg))]
#[serde(rename_all = "camelCase")]
pub struct CategoryEntity {
    pub id: i32,
    pub name: String,
    pub description: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Insertable, Debug)]
#[diesel(table_name = crate::schema::categories)]
pub struct CreateCategoryEntity {
    pub name: String,
    pub description: String,
}

// Products

#[derive(Queryable, Selectable, Identifiable, Serialize, Deserialize, Debug, Clone, ToSchema)]
#[diesel(table_name = crate::schema::products)]
#[diesel(check_for_backend(diesel::pg::Pg))]
#[serde(rename_all = "camelCase")]
pub struct ProductEntity {
    pub id: i32,
    pub name: String,
    pub description: String,
    pub image_url: String,
    pub brand: String,
    pub price: f32,
    pub quantity: i32,
    pub category_id: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Insertable, Debug)]
#[diesel(table_name = crate::schema::products)]
pub struct CreateProductEntity {
    pub name: String,
    pub description: String,
    pub image_url: String,
    pub brand: String,
    pub price: f32,
    pub quantity: i32,
    pub category_id: i32,
}

// Carts

#[derive(Queryable, Selectable, Identifiable, Serialize, Deserialize, Debug, Clone, ToSchema)]
#[diesel(table_name = crate::schema::carts)]
#[diesel(check_for_backend(diesel::pg::Pg))]
#[serde(rename_all = "camelCase")]
pub struct CartEntity {
    pub id: i32,
    pub user_id: i32,
    pub total: f32,
    pub tax: f32,
    pub grand_total: f32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Queryable, Selectable, Serialize, Deserialize, Debug, Clone, ToSchema)]
#[diesel(table_name = crate::schema::cart_items)]
#[diesel(check_for_backend(diesel::pg::Pg))]
#[serde(rename_all = "camelCase")]
pub struct CartItemEntity {
    pub cart_id: i32,
    pub product_id: i32,
    pub price: f32,
    pub quantity: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Insertable, Debug)]
#[diesel(table_name = crate::schema::carts)]
pub struct CreateCartEntity {
    pub user_id: i32,
    pub total: f32,
    pub tax: f32,
    pub grand_total: f32,
}

#[derive(Insertable, Debug)]
#[diesel(table_name = crate::schema::cart_items)]
pub struct CreateCartItemEntity {
    pub cart_id: i32,
    pub product_id: i32,
    pub price: f32,
    pub quantity: i32,
}

// Orders

/// Orders are immutable after creation except for `order_status`.
#[derive(Queryable, Selectable, Identifiable, Serialize, Deserialize, Debug, Clone, ToSchema)]
#[diesel(table_name = crate::schema::orders)]
#[diesel(check_for_backend(diesel::pg::Pg))]
#[serde(rename_all = "camelCase")]
pub struct OrderEntity {
    pub id: i32,
    pub order_by: i32,
    pub total: f32,
    pub tax: f32,
    pub grand_total: f32,
    pub payment_type: String,
    pub order_status: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Queryable, Selectable, Serialize, Deserialize, Debug, Clone, ToSchema)]
#[diesel(table_name = crate::schema::order_items)]
#[diesel(check_for_backend(diesel::pg::Pg))]
#[serde(rename_all = "camelCase")]
pub struct OrderItemEntity {
    pub order_id: i32,
    pub product_id: i32,
    pub price: f32,
    pub quantity: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Insertable, Debug)]
#[diesel(table_name = crate::schema::orders)]
pub struct CreateOrderEntity {
    pub order_by: i32,
    pub total: f32,
    pub tax: f32,
    pub grand_total: f32,
    pub payment_type: String,
    pub order_status: String,
}

#[derive(Insertable, Debug)]
#[diesel(table_name = crate::schema::order_items)]
pub struct CreateOrderItemEntity {
    pub order_id: i32,
    pub product_id: i32,
    pub price: f32,
    pub quantity: i32,
}
