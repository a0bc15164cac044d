//! Wire models for the liveshop API.
//!
//! Only the types the session layer needs are modelled here:
//!
//! - `User`, `UserRole`: the authenticated account
//! - `TokenPair`, `AuthPayload`: credentials issued by login/register/refresh
//! - `LoginCredentials`, `RegisterData`: request bodies
//! - `ApiResponse`: the `{success, data, message, error}` envelope
//!
//! Domain data (streams, products, orders) is passed through untouched as
//! `serde_json::Value`.

pub mod auth;
pub mod response;
pub mod user;

pub use auth::{AuthPayload, LoginCredentials, RegisterData, TokenPair};
pub use response::ApiResponse;
pub use user::{User, UserRole};
