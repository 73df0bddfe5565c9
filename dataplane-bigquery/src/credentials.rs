use dataplane::error::{ErrorKind, TransferResult};
use dataplane::transfer_error;
use gcp_bigquery_client::yup_oauth2::{ServiceAccountKey, parse_service_account_key};
use std::path::Path;
use tracing::debug;

/// Reads and parses a service-account key file.
///
/// The file is read in one call so no handle outlives this function. Missing, unreadable and
/// malformed files fail with [`ErrorKind::AuthenticationFailure`].
pub async fn load_service_account_key(path: &Path) -> TransferResult<ServiceAccountKey> {
    let content = tokio::fs::read_to_string(path).await.map_err(|err| {
        transfer_error!(
            ErrorKind::AuthenticationFailure,
            "Failed to read service account key file",
            format!("{}: {err}", path.display()),
            source: err
        )
    })?;

    let key = parse_service_account_key(content).map_err(|err| {
        transfer_error!(
            ErrorKind::AuthenticationFailure,
            "Invalid service account key file",
            format!("{}: {err}", path.display()),
            source: err
        )
    })?;
    debug!(file = %path.display(), client_email = %key.client_email, "loaded service account key");

    Ok(key)
}
