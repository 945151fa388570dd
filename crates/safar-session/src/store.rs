//! # Rate Store
//!
//! Holds the current rate snapshot shared by every open booking session.
//! A new table is never merged into the old one: it becomes a new
//! [`RateSnapshot`] with the next version number and replaces the previous
//! `Arc` in one step, so a reader sees either the old table or the new one.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use safar_core::rates::RateTable;
use safar_core::{ExchangeRate, RateSnapshot};

use crate::api::RateSource;
use crate::error::{SessionError, SessionResult};

pub struct RateStore {
    current: RwLock<Arc<RateSnapshot>>,
    last_version: AtomicU64,
    fallback_rate: Option<ExchangeRate>,
}

impl RateStore {
    /// Starts from an empty table at version 0.
    pub fn new(fallback_rate: Option<ExchangeRate>) -> Self {
        RateStore {
            current: RwLock::new(Arc::new(RateSnapshot::default())),
            last_version: AtomicU64::new(0),
            fallback_rate,
        }
    }

    pub async fn current(&self) -> Arc<RateSnapshot> {
        self.current.read().await.clone()
    }

    pub fn version(&self) -> u64 {
        self.last_version.load(Ordering::Acquire)
    }

    /// Publishes `rates` as the next snapshot.
    pub async fn install(&self, mut rates: RateTable) -> Arc<RateSnapshot> {
        if rates.exchange.rate.scaled() <= 0 {
            match self.fallback_rate {
                Some(fallback) => {
                    warn!(fallback = fallback.as_decimal(), "Rate feed has no exchange rate, using fallback");
                    rates.exchange.rate = fallback;
                }
                None => warn!("Rate feed has no exchange rate and no fallback is configured"),
            }
        }

        let mut current = self.current.write().await;
        let version = self.last_version.fetch_add(1, Ordering::AcqRel) + 1;
        let snapshot = Arc::new(RateSnapshot::new(version, rates));
        *current = snapshot.clone();

        info!(
            version,
            visa_rates = snapshot.rates.visa_rates.len(),
            packages = snapshot.rates.packages.len(),
            exchange_rate = snapshot.rates.exchange.rate.as_decimal(),
            "Rate snapshot installed"
        );
        snapshot
    }

    /// Fetches a fresh table from `source` and installs it.
    pub async fn refresh(&self, source: &dyn RateSource) -> SessionResult<Arc<RateSnapshot>> {
        debug!(version = self.version(), "Refreshing rates");
        let rates = source.fetch_rates().await.map_err(|e| {
            warn!(error = %e, "Rate refresh failed, keeping current snapshot");
            SessionError::from_remote("rate refresh", e)
        })?;
        Ok(self.install(rates).await)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::RemoteError;
    use async_trait::async_trait;

    struct FixedSource(Result<RateTable, RemoteError>);

    #[async_trait]
    impl RateSource for FixedSource {
        async fn fetch_rates(&self) -> Result<RateTable, RemoteError> {
            self.0.clone()
        }
    }

    #[tokio::test]
    async fn test_install_bumps_version() {
        let store = RateStore::new(None);
        assert_eq!(store.current().await.version, 0);

        let first = store.install(RateTable::default()).await;
        let second = store.install(RateTable::default()).await;
        assert_eq!(first.version, 1);
        assert_eq!(second.version, 2);
        assert_eq!(store.current().await.version, 2);
    }

    #[tokio::test]
    async fn test_fallback_rate_fills_missing_exchange() {
        let store = RateStore::new(Some(ExchangeRate::from_scaled(750_000)));
        let mut table = RateTable::default();
        table.exchange.rate = ExchangeRate::from_scaled(0);

        let snapshot = store.install(table).await;
        assert_eq!(snapshot.rates.exchange.rate, ExchangeRate::from_scaled(750_000));
    }

    #[tokio::test]
    async fn test_failed_refresh_keeps_snapshot() {
        let store = RateStore::new(None);
        store.install(RateTable::default()).await;

        let source = FixedSource(Err(RemoteError::Unavailable("timeout".into())));
        let err = store.refresh(&source).await.unwrap_err();
        assert!(err.is_retryable());
        assert_eq!(store.version(), 1);

        let source = FixedSource(Ok(RateTable::default()));
        assert_eq!(store.refresh(&source).await.unwrap().version, 2);
    }
}
