use std::future::Future;
use thiserror::Error;
use tokio::time::{sleep, Duration};

use crate::api::ApiError;
use crate::constants::POST_RENEWAL_DELAY;
use crate::models::{Credential, RetryConfig};
use crate::modules::credentials::CredentialStore;
use crate::modules::system::logger;

#[derive(Debug, Clone)]
pub struct RetryPolicy {
    pub transient_delay: Duration,
    pub max_transient_attempts: u32,
    pub post_renewal_delay: Duration,
}

impl From<&RetryConfig> for RetryPolicy {
    fn from(config: &RetryConfig) -> Self {
        Self {
            transient_delay: Duration::from_millis(config.transient_delay_ms),
            max_transient_attempts: config.max_transient_attempts.max(1),
            post_renewal_delay: POST_RENEWAL_DELAY,
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from(&RetryConfig::default())
    }
}

/// Whether replaying a call after a transient failure is safe. A repaint
/// that timed out may still have spent a charge, so it is never replayed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Idempotency {
    Idempotent,
    NonIdempotent,
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum RetryError {
    /// The account cannot be used for the rest of the pass.
    #[error("account {account_id} unavailable: {reason}")]
    AccountUnavailable { account_id: String, reason: String },

    #[error("gave up after {attempts} attempts: {last}")]
    RetriesExhausted { attempts: u32, last: ApiError },

    #[error(transparent)]
    Failed(ApiError),
}

impl RetryError {
    pub fn is_account_unavailable(&self) -> bool {
        matches!(self, RetryError::AccountUnavailable { .. })
    }

    pub fn api_error(&self) -> Option<&ApiError> {
        match self {
            RetryError::Failed(e) | RetryError::RetriesExhausted { last: e, .. } => Some(e),
            RetryError::AccountUnavailable { .. } => None,
        }
    }
}

/// Runs one remote call for one account, recovering from expired
/// credentials and transient network failures.
pub struct RetryExecutor<'a> {
    store: &'a CredentialStore,
    policy: &'a RetryPolicy,
}

impl<'a> RetryExecutor<'a> {
    pub fn new(store: &'a CredentialStore, policy: &'a RetryPolicy) -> Self {
        Self { store, policy }
    }

    pub async fn execute<T, F, Fut>(
        &self,
        account_id: &str,
        idempotency: Idempotency,
        mut call: F,
    ) -> Result<T, RetryError>
    where
        F: FnMut(Credential) -> Fut,
        Fut: Future<Output = Result<T, ApiError>>,
    {
        let unavailable = |reason: String| RetryError::AccountUnavailable {
            account_id: account_id.to_string(),
            reason,
        };

        let mut credential = self
            .store
            .get(account_id)
            .ok_or_else(|| unavailable("no credential on record".to_string()))?;
        let mut transient_attempts = 0u32;
        let mut renewed = false;

        loop {
            let error = match call(credential.clone()).await {
                Ok(value) => return Ok(value),
                Err(error) => error,
            };

            if renewed {
                return Err(unavailable(format!(
                    "call failed again after credential refresh: {}",
                    error
                )));
            }

            match error {
                ApiError::AuthExpired { status } => {
                    logger::log_warn(&format!(
                        "[Retry] Account {} credential rejected (HTTP {}), refreshing",
                        account_id, status
                    ));
                    credential = match self.store.refresh(account_id).await {
                        Ok(fresh) => fresh,
                        Err(reason) => {
                            return Err(unavailable(format!("credential refresh failed: {}", reason)))
                        }
                    };
                    renewed = true;
                    sleep(self.policy.post_renewal_delay).await;
                }
                ApiError::TransientNetwork(_) if idempotency == Idempotency::Idempotent => {
                    transient_attempts += 1;
                    if transient_attempts >= self.policy.max_transient_attempts {
                        return Err(RetryError::RetriesExhausted {
                            attempts: transient_attempts,
                            last: error,
                        });
                    }
                    tracing::debug!(
                        "[Retry] Account {} transient failure, attempt {}/{}: {}",
                        account_id,
                        transient_attempts,
                        self.policy.max_transient_attempts,
                        error
                    );
                    sleep(self.policy.transient_delay).await;
                }
                other => return Err(RetryError::Failed(other)),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::AccountRecord;
    use crate::test_utils::StaticRenewer;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    struct Fixture {
        _dir: tempfile::TempDir,
        store: CredentialStore,
        renewer: Arc<StaticRenewer>,
        policy: RetryPolicy,
    }

    fn fixture(renewed_token: Option<&str>) -> Fixture {
        let dir = tempfile::tempdir().expect("temp dir");
        let renewer = StaticRenewer::new(renewed_token);
        let store = CredentialStore::from_records(
            dir.path().join("accounts.json"),
            vec![
                AccountRecord::new("1", Some("old".to_string())),
                AccountRecord::new("2", None),
            ],
            renewer.clone(),
            "UA",
        );
        Fixture {
            _dir: dir,
            store,
            renewer,
            policy: RetryPolicy::default(),
        }
    }

    #[tokio::test(flavor = "current_thread", start_paused = true)]
    async fn transient_failures_stop_at_the_attempt_bound() {
        let f = fixture(None);
        let calls = AtomicUsize::new(0);
        let result: Result<(), _> = RetryExecutor::new(&f.store, &f.policy)
            .execute("1", Idempotency::Idempotent, |_| {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Err(ApiError::TransientNetwork("timeout".to_string())) }
            })
            .await;

        assert_eq!(calls.load(Ordering::SeqCst), 10);
        assert!(matches!(
            result,
            Err(RetryError::RetriesExhausted { attempts: 10, .. })
        ));
    }

    #[tokio::test(flavor = "current_thread", start_paused = true)]
    async fn transient_failures_recover() {
        let f = fixture(None);
        let calls = AtomicUsize::new(0);
        let result = RetryExecutor::new(&f.store, &f.policy)
            .execute("1", Idempotency::Idempotent, |_| {
                let n = calls.fetch_add(1, Ordering::SeqCst);
                async move {
                    if n < 3 {
                        Err(ApiError::TransientNetwork("reset".to_string()))
                    } else {
                        Ok(n)
                    }
                }
            })
            .await;
        assert_eq!(result, Ok(3));
    }

    #[tokio::test(flavor = "current_thread", start_paused = true)]
    async fn expired_credential_is_refreshed_once_and_retried_once() {
        let f = fixture(Some("new"));
        let seen = parking_lot::Mutex::new(Vec::new());
        let result = RetryExecutor::new(&f.store, &f.policy)
            .execute("1", Idempotency::NonIdempotent, |credential| {
                seen.lock().push(credential.token.clone());
                async move {
                    if credential.token == "old" {
                        Err(ApiError::AuthExpired { status: 401 })
                    } else {
                        Ok(credential.token)
                    }
                }
            })
            .await;

        assert_eq!(result, Ok("new".to_string()));
        assert_eq!(*seen.lock(), vec!["old".to_string(), "new".to_string()]);
        assert_eq!(f.renewer.calls(), 1);
        assert_eq!(f.store.get("1").expect("credential").token, "new");

        let persisted = std::fs::read_to_string(f.store.path()).expect("persisted store");
        assert!(persisted.contains("\"queryId\": \"new\""));
    }

    #[tokio::test(flavor = "current_thread", start_paused = true)]
    async fn second_rejection_marks_account_unavailable() {
        let f = fixture(Some("new"));
        let calls = AtomicUsize::new(0);
        let result: Result<(), _> = RetryExecutor::new(&f.store, &f.policy)
            .execute("1", Idempotency::Idempotent, |_| {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Err(ApiError::AuthExpired { status: 403 }) }
            })
            .await;

        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert_eq!(f.renewer.calls(), 1);
        assert!(result.expect_err("unavailable").is_account_unavailable());
    }

    #[tokio::test(flavor = "current_thread", start_paused = true)]
    async fn failed_refresh_marks_account_unavailable() {
        let f = fixture(None);
        let calls = AtomicUsize::new(0);
        let result: Result<(), _> = RetryExecutor::new(&f.store, &f.policy)
            .execute("1", Idempotency::Idempotent, |_| {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Err(ApiError::AuthExpired { status: 401 }) }
            })
            .await;

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(result.expect_err("unavailable").is_account_unavailable());
    }

    #[tokio::test(flavor = "current_thread", start_paused = true)]
    async fn non_idempotent_calls_are_not_replayed_on_transient_failure() {
        let f = fixture(None);
        let calls = AtomicUsize::new(0);
        let result: Result<(), _> = RetryExecutor::new(&f.store, &f.policy)
            .execute("1", Idempotency::NonIdempotent, |_| {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Err(ApiError::TransientNetwork("timeout".to_string())) }
            })
            .await;

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(matches!(
            result,
            Err(RetryError::Failed(ApiError::TransientNetwork(_)))
        ));
    }

    #[tokio::test(flavor = "current_thread", start_paused = true)]
    async fn other_failures_propagate_without_retry() {
        let f = fixture(None);
        let calls = AtomicUsize::new(0);
        let result: Result<(), _> = RetryExecutor::new(&f.store, &f.policy)
            .execute("1", Idempotency::Idempotent, |_| {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Err(ApiError::NotFound) }
            })
            .await;

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(result, Err(RetryError::Failed(ApiError::NotFound)));
    }

    #[tokio::test(flavor = "current_thread", start_paused = true)]
    async fn accounts_without_token_are_unavailable_without_calling() {
        let f = fixture(Some("new"));
        let calls = AtomicUsize::new(0);
        let result: Result<(), _> = RetryExecutor::new(&f.store, &f.policy)
            .execute("2", Idempotency::Idempotent, |_| {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Ok(()) }
            })
            .await;

        assert_eq!(calls.load(Ordering::SeqCst), 0);
        assert!(result.expect_err("no token").is_account_unavailable());
    }
}
