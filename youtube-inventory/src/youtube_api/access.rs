//! How a request proves it is allowed to see what it asks for.
//!
//! The public tier authenticates with a plain API key and only sees public and unlisted videos.
//! The elevated tier sends the channel owner's OAuth bearer token and sees everything,
//! private uploads included. Both the playlist enumerator and the metadata fetcher take an
//! [`Access`] so neither has to branch on the mode itself.

use crate::credential::Credential;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccessMode {
    Public,
    Elevated,
}

impl fmt::Display for AccessMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AccessMode::Public => f.write_str("public"),
            AccessMode::Elevated => f.write_str("elevated"),
        }
    }
}

#[derive(Clone)]
pub enum Access {
    Public { api_key: String },
    Elevated(Credential),
}

impl fmt::Debug for Access {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Access::Public { .. } => f
                .debug_struct("Public")
                .field("api_key", &"[redacted]")
                .finish(),
            Access::Elevated(credential) => f.debug_tuple("Elevated").field(credential).finish(),
        }
    }
}

impl Access {
    pub fn public(api_key: impl Into<String>) -> Self {
        Access::Public {
            api_key: api_key.into(),
        }
    }

    pub fn elevated(credential: Credential) -> Self {
        Access::Elevated(credential)
    }

    pub fn mode(&self) -> AccessMode {
        match self {
            Access::Public { .. } => AccessMode::Public,
            Access::Elevated(_) => AccessMode::Elevated,
        }
    }

    /// Attaches this tier's credentials to `request`.
    ///
    /// For the elevated tier this refreshes the token first if it has expired; a failed refresh
    /// surfaces as an [`AuthFailure`](crate::error::AuthFailure) inside the report.
    pub async fn authorize(
        &self,
        request: reqwest::RequestBuilder,
    ) -> eyre::Result<reqwest::RequestBuilder> {
        match self {
            Access::Public { api_key } => Ok(request.query(&[("key", api_key.as_str())])),
            Access::Elevated(credential) => {
                let access_token = credential.fresh_access_token().await?;
                Ok(request.header("Authorization", format!("Bearer {}", access_token)))
            }
        }
    }
}
