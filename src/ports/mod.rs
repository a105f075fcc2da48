pub mod auth;
pub mod spotify;
