//! The elevated (channel-owner) credential shared by the enumerator and the metadata fetcher.

use crate::error::AuthFailure;
use eyre::Context;
use oauth2::TokenResponse;
use oauth2::basic::BasicTokenResponse;
use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::{Duration, SystemTime};
use tokio::sync::Mutex;

pub type RefreshFuture<'a> =
    Pin<Box<dyn Future<Output = eyre::Result<Option<BasicTokenResponse>>> + Send + 'a>>;

/// Something that can exchange a refresh token for a new access token.
///
/// Implementations return `Ok(None)` when the grant is no longer valid (or there is no refresh
/// token to use), and `Err` for transport failures.
pub trait TokenRefresher: fmt::Debug + Send + Sync {
    fn refresh_token<'a>(&'a self, token: &'a BasicTokenResponse) -> RefreshFuture<'a>;
}

#[derive(Debug, Clone)]
pub struct TimeBoundAccessToken {
    token: BasicTokenResponse,
    /// When the current access token expires (with safety buffer)
    expires_at: SystemTime,
}

impl TimeBoundAccessToken {
    /// Wraps a token that is already considered expired, forcing a refresh on first use.
    pub fn expired(token: BasicTokenResponse) -> Self {
        Self {
            expires_at: SystemTime::UNIX_EPOCH,
            token,
        }
    }

    /// Wraps a freshly issued token.
    ///
    /// The expiry is derived from the token's `expires_in` minus a 5-minute safety buffer.
    pub fn new(token: BasicTokenResponse) -> Self {
        Self {
            expires_at: Self::calculate_token_expiry(&token),
            token,
        }
    }

    pub fn is_expired(&self) -> bool {
        SystemTime::now() >= self.expires_at
    }

    /// Refreshes this token in place, preserving the refresh token if the new one lacks it.
    ///
    /// Returns `Ok(false)` if the refresher declined (invalid grant, no refresh token).
    pub async fn refresh(&mut self, refresher: &dyn TokenRefresher) -> eyre::Result<bool> {
        tracing::trace!("refreshing token");
        match refresher
            .refresh_token(&self.token)
            .await
            .context("refresh OAuth token")?
        {
            Some(new_token) => {
                let old_token = std::mem::replace(&mut self.token, new_token);

                if self.token.refresh_token().is_none() {
                    tracing::trace!("new token lacks refresh token, preserving original");
                    self.token
                        .set_refresh_token(old_token.refresh_token().cloned());
                }

                self.expires_at = Self::calculate_token_expiry(&self.token);
                Ok(true)
            }
            None => Ok(false),
        }
    }

    /// Uses `now + expires_in - 5 minutes`, or 55 minutes when the server did not say.
    fn calculate_token_expiry(token: &BasicTokenResponse) -> SystemTime {
        let now = SystemTime::now();
        if let Some(expires_in) = token.expires_in() {
            (now + expires_in)
                .checked_sub(Duration::from_secs(300))
                .unwrap_or(now)
        } else {
            now + Duration::from_secs(3300)
        }
    }
}

/// Cloneable handle to the channel owner's OAuth token.
///
/// All clones observe the same token. Refreshing happens lazily, the first time the token is
/// used after it expired, and with the lock held so concurrent users never refresh twice.
#[derive(Debug, Clone)]
pub struct Credential {
    token: Arc<Mutex<TimeBoundAccessToken>>,
    refresher: Arc<dyn TokenRefresher>,
}

impl Credential {
    pub fn new(token: TimeBoundAccessToken, refresher: Arc<dyn TokenRefresher>) -> Self {
        Self {
            token: Arc::new(Mutex::new(token)),
            refresher,
        }
    }

    /// Returns a clone of the current raw token.
    pub async fn token(&self) -> BasicTokenResponse {
        self.token.lock().await.token.clone()
    }

    pub async fn is_expired(&self) -> bool {
        self.token.lock().await.is_expired()
    }

    /// Returns an access token that is valid for at least a few more minutes.
    pub async fn fresh_access_token(&self) -> Result<String, AuthFailure> {
        let mut token = self.token.lock().await;
        if token.is_expired() {
            tracing::debug!("access token expired, attempting refresh");
            Self::refresh_locked(&mut token, &*self.refresher).await?;
            tracing::debug!("access token successfully refreshed");
        }
        Ok(token.token.access_token().secret().to_string())
    }

    async fn refresh_locked(
        token: &mut TimeBoundAccessToken,
        refresher: &dyn TokenRefresher,
    ) -> Result<(), AuthFailure> {
        match token.refresh(refresher).await {
            Ok(true) => Ok(()),
            Ok(false) => {
                tracing::error!("access token refresh was refused");
                Err(AuthFailure {
                    reason: "refresh token missing or no longer valid".to_string(),
                })
            }
            Err(e) => {
                tracing::error!(error = %format!("{e:#}"), "access token refresh failed");
                Err(AuthFailure {
                    reason: format!("{e:#}"),
                })
            }
        }
    }
}
