use crate::ports::spotify::ApiError;

/// Supplies a bearer token for Spotify requests.
///
/// How the token is obtained (interactive login, stored refresh token) is up
/// to the implementation; callers only ask for a currently valid one.
#[cfg_attr(test, mockall::automock)]
#[async_trait::async_trait]
pub trait TokenProvider: Send + Sync {
    async fn access_token(&self) -> Result<String, ApiError>;
}
