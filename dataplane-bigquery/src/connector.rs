use async_trait::async_trait;
use dataplane::credentials::CredentialSource;
use dataplane::error::{ErrorKind, TransferResult};
use dataplane::store::{StoreConnector, TableStore};
use gcp_bigquery_client::Client;
use gcp_bigquery_client::client_builder::ClientBuilder;
use std::sync::Arc;
use tracing::info;

use crate::client::BigQueryStore;
use crate::credentials::load_service_account_key;
use crate::error::bq_error_to_transfer_error;
use crate::impersonation::ImpersonatedAuthenticator;

/// Connects [`BigQueryStore`]s with the credential strategy chosen for a request.
#[derive(Debug, Clone, Default)]
pub struct BigQueryConnector {
    http: reqwest::Client,
}

impl BigQueryConnector {
    pub fn new() -> Self {
        Self::default()
    }

    async fn build_client(&self, credentials: &CredentialSource) -> TransferResult<Client> {
        let client = match credentials {
            CredentialSource::Impersonated {
                service_account,
                lifetime,
            } => {
                let authenticator = ImpersonatedAuthenticator::from_application_default(
                    service_account.clone(),
                    *lifetime,
                    self.http.clone(),
                )
                .await?;

                ClientBuilder::new()
                    .build_from_authenticator(Arc::new(authenticator))
                    .await
            }
            CredentialSource::KeyFile(path) => {
                let key = load_service_account_key(path).await?;
                Client::from_service_account_key(key, false).await
            }
            CredentialSource::ApplicationDefault => {
                ClientBuilder::new()
                    .build_from_application_default_credentials()
                    .await
            }
        };

        client.map_err(|err| bq_error_to_transfer_error(err, ErrorKind::AuthenticationFailure))
    }
}

#[async_trait]
impl StoreConnector for BigQueryConnector {
    async fn connect(
        &self,
        project: &str,
        credentials: &CredentialSource,
    ) -> TransferResult<Arc<dyn TableStore>> {
        let client = self.build_client(credentials).await?;
        info!(%project, %credentials, "connected to bigquery");

        Ok(Arc::new(BigQueryStore::new(project, client)))
    }
}
