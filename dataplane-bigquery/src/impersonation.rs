//! Short-lived access tokens for an impersonated service account.
//!
//! The ambient identity of the process (application default credentials) is scoped to IAM and
//! exchanged through the IAM Credentials `generateAccessToken` call for a BigQuery-scoped
//! token of the impersonated account. Tokens are cached and re-issued shortly before they
//! expire.

use async_trait::async_trait;
use chrono::{DateTime, TimeDelta, Utc};
use dataplane::error::{ErrorKind, TransferResult};
use dataplane::{bail, transfer_error};
use futures::FutureExt;
use futures::future::BoxFuture;
use gcp_bigquery_client::auth::Authenticator;
use gcp_bigquery_client::error::BQError;
use gcp_bigquery_client::yup_oauth2::{
    ApplicationDefaultCredentialsAuthenticator, ApplicationDefaultCredentialsFlowOpts,
    authenticator::ApplicationDefaultCredentialsTypes,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::{debug, error, info};

/// Scope requested for the ambient credentials.
const IAM_SCOPE: &str = "https://www.googleapis.com/auth/iam";

/// Scope of the issued BigQuery tokens.
const BIGQUERY_SCOPE: &str = "https://www.googleapis.com/auth/bigquery";

const IAM_CREDENTIALS_BASE_URL: &str = "https://iamcredentials.googleapis.com/v1";

/// Tokens closer than this to their expiry are re-issued.
const REFRESH_MARGIN: TimeDelta = TimeDelta::seconds(30);

/// Produces access tokens of the ambient identity.
pub type SourceTokenFn = Arc<dyn Fn() -> BoxFuture<'static, TransferResult<String>> + Send + Sync>;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateAccessTokenRequest<'a> {
    scope: [&'a str; 1],
    lifetime: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GenerateAccessTokenResponse {
    access_token: String,
    expire_time: DateTime<Utc>,
}

#[derive(Debug, Clone)]
struct CachedToken {
    token: String,
    expires_at: DateTime<Utc>,
}

impl CachedToken {
    fn is_fresh(&self, now: DateTime<Utc>) -> bool {
        now + REFRESH_MARGIN < self.expires_at
    }
}

/// [`Authenticator`] issuing tokens for an impersonated service account.
#[derive(Clone)]
pub struct ImpersonatedAuthenticator {
    service_account: String,
    lifetime: Duration,
    http: reqwest::Client,
    base_url: String,
    source_token: SourceTokenFn,
    cached: Arc<Mutex<Option<CachedToken>>>,
}

impl ImpersonatedAuthenticator {
    /// Creates an authenticator whose ambient identity comes from `source_token`.
    pub fn new(
        service_account: impl Into<String>,
        lifetime: Duration,
        http: reqwest::Client,
        source_token: SourceTokenFn,
    ) -> Self {
        Self {
            service_account: service_account.into(),
            lifetime,
            http,
            base_url: IAM_CREDENTIALS_BASE_URL.to_string(),
            source_token,
            cached: Arc::new(Mutex::new(None)),
        }
    }

    /// Creates an authenticator using the application default credentials as ambient identity.
    pub async fn from_application_default(
        service_account: impl Into<String>,
        lifetime: Duration,
        http: reqwest::Client,
    ) -> TransferResult<Self> {
        let opts = ApplicationDefaultCredentialsFlowOpts::default();
        let authenticator = match ApplicationDefaultCredentialsAuthenticator::builder(opts).await {
            ApplicationDefaultCredentialsTypes::InstanceMetadata(auth) => auth.build().await,
            ApplicationDefaultCredentialsTypes::ServiceAccount(auth) => auth.build().await,
        }
        .map_err(|err| {
            transfer_error!(
                ErrorKind::AuthenticationFailure,
                "Failed to load application default credentials",
                err.to_string(),
                source: err
            )
        })?;

        let source_token: SourceTokenFn = Arc::new(move || {
            let authenticator = authenticator.clone();
            async move {
                let token = authenticator.token(&[IAM_SCOPE]).await.map_err(|err| {
                    transfer_error!(
                        ErrorKind::AuthenticationFailure,
                        "Failed to obtain an ambient access token",
                        err.to_string()
                    )
                })?;

                match token.token() {
                    Some(token) => Ok(token.to_string()),
                    None => bail!(
                        ErrorKind::AuthenticationFailure,
                        "Ambient credentials returned no access token"
                    ),
                }
            }
            .boxed()
        });

        Ok(Self::new(service_account, lifetime, http, source_token))
    }

    /// Overrides the IAM Credentials endpoint.
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    /// Returns a valid token, issuing a new one if the cached token is about to expire.
    pub async fn token(&self) -> TransferResult<String> {
        let mut cached = self.cached.lock().await;
        if let Some(token) = cached.as_ref().filter(|token| token.is_fresh(Utc::now())) {
            return Ok(token.token.clone());
        }

        let token = self.generate_token().await?;
        info!(
            service_account = %self.service_account,
            expires_at = %token.expires_at,
            "issued impersonated access token"
        );
        *cached = Some(token.clone());

        Ok(token.token)
    }

    async fn generate_token(&self) -> TransferResult<CachedToken> {
        let source_token = (self.source_token)().await?;
        let url = format!(
            "{}/projects/-/serviceAccounts/{}:generateAccessToken",
            self.base_url, self.service_account
        );
        let body = GenerateAccessTokenRequest {
            scope: [BIGQUERY_SCOPE],
            lifetime: format!("{}s", self.lifetime.as_secs()),
        };
        debug!(%url, lifetime = %body.lifetime, "requesting impersonated access token");

        let response = self
            .http
            .post(&url)
            .bearer_auth(source_token)
            .json(&body)
            .send()
            .await
            .map_err(|err| {
                transfer_error!(
                    ErrorKind::AuthenticationFailure,
                    "Impersonation request failed",
                    err.to_string(),
                    source: err
                )
            })?;

        let status = response.status();
        if !status.is_success() {
            let detail = response.text().await.unwrap_or_default();
            bail!(
                ErrorKind::AuthenticationFailure,
                "Impersonation was refused",
                format!("{status}: {detail}")
            );
        }

        let response: GenerateAccessTokenResponse = response.json().await.map_err(|err| {
            transfer_error!(
                ErrorKind::AuthenticationFailure,
                "Invalid impersonation response",
                err.to_string(),
                source: err
            )
        })?;

        Ok(CachedToken {
            token: response.access_token,
            expires_at: response.expire_time,
        })
    }
}

#[async_trait]
impl Authenticator for ImpersonatedAuthenticator {
    async fn access_token(&self) -> Result<String, BQError> {
        self.token().await.map_err(|err| {
            error!(service_account = %self.service_account, error = %err, "impersonation failed");
            BQError::NoToken
        })
    }
}
