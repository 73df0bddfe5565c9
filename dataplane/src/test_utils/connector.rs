use async_trait::async_trait;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tokio::sync::Mutex;

use crate::bail;
use crate::credentials::CredentialSource;
use crate::error::{ErrorKind, TransferResult};
use crate::store::{StoreConnector, TableStore};
use crate::test_utils::memory_store::MemoryStore;

/// [`StoreConnector`] handing out a shared [`MemoryStore`] and counting connections.
#[derive(Debug, Clone)]
pub struct CountingConnector {
    store: MemoryStore,
    delay: Option<Duration>,
    failures_left: Arc<AtomicU64>,
    connects: Arc<AtomicU64>,
    credentials: Arc<Mutex<Vec<(String, CredentialSource)>>>,
}

impl CountingConnector {
    pub fn new(store: MemoryStore) -> Self {
        Self {
            store,
            delay: None,
            failures_left: Arc::new(AtomicU64::new(0)),
            connects: Arc::new(AtomicU64::new(0)),
            credentials: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Sleeps for `delay` inside every connect call.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Fails the next `failures` connect calls.
    pub fn failing(self, failures: u64) -> Self {
        self.failures_left.store(failures, Ordering::SeqCst);
        self
    }

    pub fn store(&self) -> &MemoryStore {
        &self.store
    }

    /// Number of connect calls, failed ones included.
    pub fn connects(&self) -> u64 {
        self.connects.load(Ordering::SeqCst)
    }

    /// Returns the project and credentials of every connect call.
    pub async fn credentials(&self) -> Vec<(String, CredentialSource)> {
        self.credentials.lock().await.clone()
    }
}

#[async_trait]
impl StoreConnector for CountingConnector {
    async fn connect(
        &self,
        project: &str,
        credentials: &CredentialSource,
    ) -> TransferResult<Arc<dyn TableStore>> {
        self.connects.fetch_add(1, Ordering::SeqCst);
        self.credentials
            .lock()
            .await
            .push((project.to_string(), credentials.clone()));

        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }

        let failing = self
            .failures_left
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |left| left.checked_sub(1))
            .is_ok();
        if failing {
            bail!(
                ErrorKind::AuthenticationFailure,
                "Failed to authenticate with the store",
                "connector configured to fail"
            );
        }

        Ok(Arc::new(self.store.clone()))
    }
}
