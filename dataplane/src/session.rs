//! Lazily created, shared store sessions.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::OnceCell;
use tracing::{error, info};

use crate::credentials::CredentialSource;
use crate::error::TransferResult;
use crate::params::TableRef;
use crate::store::{StoreConnector, TableStore};

/// An authenticated store client bound to a target table.
#[derive(Clone)]
pub struct Session {
    pub store: Arc<dyn TableStore>,
    pub table: TableRef,
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("table", &self.table)
            .finish_non_exhaustive()
    }
}

/// Holds the session of one endpoint.
///
/// The session is created on first use. Concurrent first callers wait for the same
/// connection attempt, so the connector runs at most once. A failed attempt is kept and
/// returned to every later caller without connecting again.
pub struct SessionCell {
    connector: Arc<dyn StoreConnector>,
    table: TableRef,
    credentials: CredentialSource,
    session: OnceCell<TransferResult<Session>>,
}

impl SessionCell {
    pub fn new(
        connector: Arc<dyn StoreConnector>,
        table: TableRef,
        credentials: CredentialSource,
    ) -> Self {
        Self {
            connector,
            table,
            credentials,
            session: OnceCell::new(),
        }
    }

    /// Returns the session, connecting if this is the first call.
    pub async fn get(&self) -> TransferResult<&Session> {
        self.get_or_init().await.map(|(session, _)| session)
    }

    /// Returns the session and whether this call created it.
    pub async fn get_or_init(&self) -> TransferResult<(&Session, bool)> {
        let created = AtomicBool::new(false);
        let created_flag = &created;
        let result = self
            .session
            .get_or_init(|| async move {
                created_flag.store(true, Ordering::Release);
                match self
                    .connector
                    .connect(&self.table.project, &self.credentials)
                    .await
                {
                    Ok(store) => {
                        info!(table = %self.table, credentials = %self.credentials, "store session initialized");
                        Ok(Session {
                            store,
                            table: self.table.clone(),
                        })
                    }
                    Err(err) => {
                        error!(table = %self.table, credentials = %self.credentials, error = %err, "store session initialization failed");
                        Err(err)
                    }
                }
            })
            .await;

        match result {
            Ok(session) => Ok((session, created.load(Ordering::Acquire))),
            Err(err) => Err(err.clone()),
        }
    }

    /// Returns the session if it was created successfully.
    pub fn initialized(&self) -> Option<&Session> {
        self.session.get().and_then(|result| result.as_ref().ok())
    }

    pub fn table(&self) -> &TableRef {
        &self.table
    }
}
