use dataplane::error::{ErrorKind, TransferError};
use dataplane::transfer_error;
use gcp_bigquery_client::error::BQError;

/// Converts a BigQuery client error into a [`TransferError`].
///
/// Authentication problems always map to [`ErrorKind::AuthenticationFailure`]. Error responses
/// returned by the service map to `response_kind`, which depends on the operation that failed.
pub(crate) fn bq_error_to_transfer_error(err: BQError, response_kind: ErrorKind) -> TransferError {
    let (kind, description) = match &err {
        BQError::InvalidServiceAccountKey(_) => (
            ErrorKind::AuthenticationFailure,
            "Invalid BigQuery service account key",
        ),
        BQError::InvalidServiceAccountAuthenticator(_) => (
            ErrorKind::AuthenticationFailure,
            "Invalid BigQuery service account authenticator",
        ),
        BQError::InvalidApplicationDefaultCredentialsAuthenticator(_) => (
            ErrorKind::AuthenticationFailure,
            "Invalid BigQuery application default credentials",
        ),
        BQError::AuthError(_) => (
            ErrorKind::AuthenticationFailure,
            "BigQuery authentication error",
        ),
        BQError::YupAuthError(_) => (
            ErrorKind::AuthenticationFailure,
            "BigQuery OAuth authentication error",
        ),
        BQError::NoToken => (
            ErrorKind::AuthenticationFailure,
            "BigQuery authentication token missing",
        ),
        BQError::RequestError(_) => (ErrorKind::StoreIoError, "BigQuery request failed"),
        BQError::ResponseError { .. } => (response_kind, "BigQuery response error"),
        BQError::SerializationError(_) => (
            ErrorKind::SerializationError,
            "BigQuery JSON serialization error",
        ),
        _ => (ErrorKind::StoreIoError, "BigQuery client error"),
    };

    transfer_error!(kind, description, err.to_string())
}

/// Returns `true` if the error is a `404 Not Found` response.
pub(crate) fn is_not_found(err: &BQError) -> bool {
    matches!(err, BQError::ResponseError { error } if error.error.code == 404)
}
