//! Installed-application OAuth 2.0 for the channel owner's elevated access.
//!
//! Client credentials come from the `client_secrets.json` that the Google Cloud console hands
//! out. Authorization runs the PKCE flow against a loopback redirect server and opens the
//! user's browser; tokens are never written to disk.

use crate::credential::{RefreshFuture, TokenRefresher};
use bytes::Bytes;
use eyre::{Context, OptionExt};
use http_body_util::Full;
use hyper::service::service_fn;
use hyper::{Request, Response, body};
use oauth2::basic::{BasicClient, BasicTokenResponse};
use oauth2::{
    AuthUrl, AuthorizationCode, ClientId, ClientSecret, CsrfToken, PkceCodeChallenge,
    RedirectUrl, Scope, TokenResponse, TokenUrl, reqwest,
};
use serde::Deserialize;
use std::future::Future;
use std::path::Path;

const DEFAULT_AUTH_URI: &str = "https://accounts.google.com/o/oauth2/auth";
const DEFAULT_TOKEN_URI: &str = "https://oauth2.googleapis.com/token";

/// Read-only access is enough for listing, but private uploads of brand and partner channels
/// only show up with the broader scopes as well.
pub const SCOPES: [&str; 3] = [
    "https://www.googleapis.com/auth/youtube.readonly",
    "https://www.googleapis.com/auth/youtube",
    "https://www.googleapis.com/auth/youtubepartner",
];

const OAUTH_DONE_HTML: &str = "<!DOCTYPE html>
<html>
<head><meta charset=\"utf-8\"><title>youtube-inventory</title></head>
<body>
<p>Authorization complete. You can close this tab and return to the terminal.</p>
</body>
</html>
";

/// `client_secrets.json` as downloaded from the Google Cloud console.
#[derive(Debug, Deserialize)]
struct ClientSecretsFile {
    installed: Option<ClientSecrets>,
    web: Option<ClientSecrets>,
}

#[derive(Debug, Deserialize)]
struct ClientSecrets {
    client_id: String,
    client_secret: String,
    auth_uri: Option<String>,
    token_uri: Option<String>,
}

/// Runs the authorization flow and refreshes tokens for one OAuth client.
#[derive(Debug, Clone)]
pub struct OAuthManager {
    client_id: ClientId,
    client_secret: ClientSecret,
    auth_url: AuthUrl,
    token_url: TokenUrl,
}

impl OAuthManager {
    pub fn new(
        client_id: impl Into<String>,
        client_secret: impl Into<String>,
        auth_uri: Option<&str>,
        token_uri: Option<&str>,
    ) -> eyre::Result<Self> {
        let auth_url = AuthUrl::new(auth_uri.unwrap_or(DEFAULT_AUTH_URI).to_string())
            .context("parse authorization endpoint URL")?;
        let token_url = TokenUrl::new(token_uri.unwrap_or(DEFAULT_TOKEN_URI).to_string())
            .context("parse token endpoint URL")?;
        Ok(Self {
            client_id: ClientId::new(client_id.into()),
            client_secret: ClientSecret::new(client_secret.into()),
            auth_url,
            token_url,
        })
    }

    /// Loads client credentials from a `client_secrets.json` file.
    ///
    /// Both the `installed` and the `web` layouts are accepted; `installed` wins if a file
    /// somehow carries both.
    pub fn from_client_secrets(path: &Path) -> eyre::Result<Self> {
        let json = std::fs::read_to_string(path)
            .with_context(|| format!("read client secrets from {}", path.display()))?;
        Self::from_client_secrets_json(&json)
            .with_context(|| format!("load client secrets from {}", path.display()))
    }

    pub fn from_client_secrets_json(json: &str) -> eyre::Result<Self> {
        let file: ClientSecretsFile =
            serde_json::from_str(json).context("parse client secrets JSON")?;
        let secrets = file
            .installed
            .or(file.web)
            .ok_or_eyre("client secrets have neither an 'installed' nor a 'web' section")?;
        Self::new(
            secrets.client_id,
            secrets.client_secret,
            secrets.auth_uri.as_deref(),
            secrets.token_uri.as_deref(),
        )
    }

    pub fn client_id(&self) -> &str {
        self.client_id.as_str()
    }

    /// Walks the user through authorization in their browser and exchanges the resulting
    /// code for a token.
    pub async fn authenticate(&self) -> eyre::Result<BasicTokenResponse> {
        let csrf = CsrfToken::new_random();
        let (redirect_url, eventually_authorization_code) = setup_redirect(csrf.clone())
            .await
            .context("set up redirect endpoint")?;

        let client = BasicClient::new(self.client_id.clone())
            .set_client_secret(self.client_secret.clone())
            .set_auth_uri(self.auth_url.clone())
            .set_token_uri(self.token_url.clone())
            .set_redirect_uri(redirect_url);

        let (pkce_challenge, pkce_verifier) = PkceCodeChallenge::new_random_sha256();
        let (auth_url, _csrf_token) = client
            // The flow runs exactly once, so the CSRF token is never re-used.
            .authorize_url(move || csrf.clone())
            .add_scopes(SCOPES.iter().map(|s| Scope::new(s.to_string())))
            .add_extra_param("access_type", "offline")
            .set_pkce_challenge(pkce_challenge)
            .url();

        tracing::info!(url = %auth_url, "asking user to follow OAuth flow");
        if let Err(e) = webbrowser::open(auth_url.as_ref()) {
            // headless machines can still paste the URL by hand
            tracing::warn!(error = %e, "could not open browser, open the URL above manually");
        }
        let authorization_code = eventually_authorization_code
            .await
            .context("await user authorization code")?;

        let http_client = http_client()?;
        let token = client
            .exchange_code(authorization_code)
            .set_pkce_verifier(pkce_verifier)
            .request_async(&http_client)
            .await
            .context("exchange authorization code with access token")?;

        tracing::info!(
            has_refresh_token = token.refresh_token().is_some(),
            "obtained OAuth token"
        );
        Ok(token)
    }

    /// Exchanges `token`'s refresh token for a new access token.
    ///
    /// Returns `Ok(None)` when there is no refresh token or Google rejects it as an invalid
    /// grant; the user then has to authorize again.
    pub async fn exchange_refresh_token(
        &self,
        token: &BasicTokenResponse,
    ) -> eyre::Result<Option<BasicTokenResponse>> {
        let Some(refresh_token) = token.refresh_token() else {
            tracing::warn!("no refresh token available, cannot refresh");
            return Ok(None);
        };

        tracing::debug!("attempting to refresh OAuth token");
        let client = BasicClient::new(self.client_id.clone())
            .set_client_secret(self.client_secret.clone())
            .set_token_uri(self.token_url.clone());

        let http_client = http_client()?;
        match client
            .exchange_refresh_token(refresh_token)
            .request_async(&http_client)
            .await
        {
            Ok(new_token) => {
                tracing::debug!("successfully refreshed OAuth token");
                Ok(Some(new_token))
            }
            Err(ref e @ oauth2::RequestTokenError::ServerResponse(ref sr))
                if matches!(
                    sr.error(),
                    oauth2::basic::BasicErrorResponseType::InvalidGrant
                ) =>
            {
                tracing::warn!("OAuth refresh token considered invalid grant: {}", e);
                Ok(None)
            }
            Err(e) => Err(e).context("exchange refresh token"),
        }
    }
}

impl TokenRefresher for OAuthManager {
    fn refresh_token<'a>(&'a self, token: &'a BasicTokenResponse) -> RefreshFuture<'a> {
        Box::pin(self.exchange_refresh_token(token))
    }
}

fn http_client() -> eyre::Result<reqwest::Client> {
    reqwest::ClientBuilder::new()
        // SSRF no thank you.
        .redirect(reqwest::redirect::Policy::none())
        .build()
        .context("build OAuth HTTP client")
}

/// Starts a one-shot loopback server for the authorization redirect.
///
/// Returns the redirect URL to register with the flow, and a future that resolves to the
/// authorization code once the browser comes back with a matching `state`.
async fn setup_redirect(
    csrf: CsrfToken,
) -> eyre::Result<(
    RedirectUrl,
    impl Future<Output = eyre::Result<AuthorizationCode>>,
)> {
    let socket = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .context("bind to localhost")?;
    let addr = socket.local_addr().context("get local address")?;
    let url = RedirectUrl::new(format!("http://{}:{}", addr.ip(), addr.port()))
        .context("construct redirect url")?;
    let (tx, rx) = tokio::sync::oneshot::channel();
    tokio::spawn(async move {
        let r = async move {
            let (conn, _) = socket.accept().await.context("accept")?;
            let conn = hyper_util::rt::TokioIo::new(conn);
            let (got, mut gotten) = tokio::sync::mpsc::channel(1);
            let service = service_fn(move |req: Request<body::Incoming>| {
                let csrf = csrf.clone();
                let got = got.clone();
                async move {
                    let mut presented_state = None;
                    let mut presented_code = None;
                    for (k, v) in form_urlencoded::parse(req.uri().query().unwrap_or("").as_bytes())
                    {
                        match &*k {
                            "state" => presented_state = Some(v),
                            "code" => presented_code = Some(v),
                            _ => {}
                        }
                    }
                    if presented_state.as_deref() != Some(csrf.secret().as_str()) {
                        return Err("invalid csrf token");
                    }
                    let Some(code) = presented_code else {
                        return Err("no authorization code found");
                    };
                    let code = AuthorizationCode::new(code.into_owned());
                    if got.send(code).await.is_err() {
                        return Err("authorization code already received");
                    }
                    Ok(Response::new(Full::<Bytes>::from(OAUTH_DONE_HTML)))
                }
            });
            let mut serve = std::pin::pin!(
                hyper::server::conn::http1::Builder::new().serve_connection(conn, service)
            );

            tokio::select! {
                exit = &mut serve => {
                    if let Err(e) = exit {
                        Err(e).context("redirect server got bad request")
                    } else {
                        eyre::bail!("redirect server exit prematurely");
                    }
                }
                code = gotten.recv() => {
                    serve.as_mut().graceful_shutdown();
                    // finish writing the "done" page before closing
                    let _ = serve.await;
                    code.ok_or_eyre("redirect server stopped before receiving a code")
                }
            }
        };
        let _ = tx.send(r.await);
    });
    Ok((url, async move {
        rx.await.context("redirect future dropped prematurely")?
    }))
}
