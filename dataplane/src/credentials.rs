//! Selection of the credential strategy used to reach the table store.

use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

use tracing::warn;

use crate::params::RequestParams;

/// How a store client authenticates.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CredentialSource {
    /// Short-lived tokens issued for `service_account` on behalf of the ambient identity.
    Impersonated {
        service_account: String,
        lifetime: Duration,
    },
    /// A service-account key file.
    KeyFile(PathBuf),
    /// Ambient credentials of the runtime environment.
    ApplicationDefault,
}

impl CredentialSource {
    /// Picks the credential strategy for `params`.
    ///
    /// Impersonation takes precedence over a key file, which takes precedence over the ambient
    /// credentials. `lifetime` bounds impersonated tokens.
    pub fn from_params(params: &RequestParams, lifetime: Duration) -> Self {
        match (&params.service_account_name, &params.service_account_file) {
            (Some(service_account), file) => {
                if let Some(file) = file {
                    warn!(
                        %service_account,
                        file = %file.display(),
                        "both a service account and a key file are configured, using impersonation"
                    );
                }

                CredentialSource::Impersonated {
                    service_account: service_account.clone(),
                    lifetime,
                }
            }
            (None, Some(file)) => CredentialSource::KeyFile(file.clone()),
            (None, None) => CredentialSource::ApplicationDefault,
        }
    }
}

impl fmt::Display for CredentialSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CredentialSource::Impersonated {
                service_account, ..
            } => write!(f, "impersonated({service_account})"),
            CredentialSource::KeyFile(path) => write!(f, "key_file({})", path.display()),
            CredentialSource::ApplicationDefault => f.write_str("application_default"),
        }
    }
}
