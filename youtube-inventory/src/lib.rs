//! Full upload inventory of a YouTube channel.
//!
//! The pipeline pages through the channel's uploads playlist, looks every id up in batches of
//! 50 with a public API key, retries whatever that could not see with the channel owner's OAuth
//! token, and reconciles the results into one [`VideoRecord`] per enumerated id, in playlist
//! order. Ids that neither tier could resolve (deleted, restricted, or private without an owner
//! token) stay in the inventory as placeholders.

use crate::credential::{Credential, TimeBoundAccessToken};
use crate::youtube_api::{Access, YouTubeClient};
use eyre::Context;
use std::path::Path;
use std::sync::Arc;
use tracing::instrument;

pub mod config;
pub mod credential;
pub mod duration;
pub mod enumerator;
pub mod error;
pub mod export;
pub mod fetcher;
pub mod oauth;
pub mod output;
pub mod reconcile;
pub mod record;
pub mod youtube_api;

pub use config::{FetchOptions, RetryPolicy};
pub use error::InventoryError;
pub use record::{Privacy, VideoRecord, VideoType};

/// Runs enumeration, tiered metadata lookup and reconciliation for one channel.
///
/// With a `credential`, the uploads playlist is listed as the owner (so private uploads are
/// included) and ids the API key cannot see are looked up again with the owner's token.
/// Without one, only public and unlisted uploads are listed, and anything the key cannot
/// resolve becomes a placeholder.
#[instrument(skip(client, api_key, credential, options), fields(elevated = credential.is_some()))]
pub async fn fetch_channel_inventory(
    client: &YouTubeClient,
    channel_id: &str,
    api_key: &str,
    credential: Option<&Credential>,
    options: &FetchOptions,
) -> Result<Vec<VideoRecord>, InventoryError> {
    let access = match credential {
        Some(credential) => Access::elevated(credential.clone()),
        None => Access::public(api_key),
    };

    let ids = enumerator::enumerate(client, channel_id, &access, options).await?;
    let resolution = fetcher::resolve(client, &ids, api_key, credential, options).await?;
    let records = reconcile::reconcile(&ids, &resolution.found, &resolution.missing_set());

    tracing::info!(
        total = records.len(),
        unresolved = resolution.missing.len(),
        "channel inventory complete"
    );
    Ok(records)
}

/// Has the channel owner authorize this application and wraps the resulting token into a
/// [`Credential`] that refreshes itself through the same OAuth client.
pub async fn authorize_channel_owner(client_secrets: &Path) -> eyre::Result<Credential> {
    let oauth_manager = oauth::OAuthManager::from_client_secrets(client_secrets)?;
    let token = oauth_manager
        .authenticate()
        .await
        .context("authorize user to YouTube")?;
    Ok(Credential::new(
        TimeBoundAccessToken::new(token),
        Arc::new(oauth_manager),
    ))
}
