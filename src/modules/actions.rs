use futures::future::join_all;
use serde::Serialize;
use std::future::Future;
use std::sync::Arc;
use tokio::sync::Semaphore;

use crate::api::{ActionOutcome, ApiError, Boost, GameApiClient};
use crate::models::Credential;
use crate::modules::credentials::CredentialStore;
use crate::modules::retry::{Idempotency, RetryError, RetryExecutor, RetryPolicy};
use crate::modules::system::account_context::{with_account_context, AccountContext};
use crate::modules::system::logger;

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ActionSummary {
    pub total: usize,
    pub succeeded: usize,
    pub already_done: usize,
    pub failed: usize,
    pub skipped: usize,
}

impl ActionSummary {
    fn merge(&mut self, other: &ActionSummary) {
        self.total += other.total;
        self.succeeded += other.succeeded;
        self.already_done += other.already_done;
        self.failed += other.failed;
        self.skipped += other.skipped;
    }
}

enum AccountResult {
    Skipped,
    Done(Result<ActionOutcome, RetryError>),
}

/// One-shot account maintenance actions, run for every account with the
/// same concurrency bound as painting.
pub struct ActionRunner {
    api: Arc<GameApiClient>,
    store: Arc<CredentialStore>,
    policy: RetryPolicy,
    concurrency_limit: usize,
}

impl ActionRunner {
    pub fn new(
        api: Arc<GameApiClient>,
        store: Arc<CredentialStore>,
        policy: RetryPolicy,
        concurrency_limit: usize,
    ) -> Self {
        Self {
            api,
            store,
            policy,
            concurrency_limit: concurrency_limit.max(1),
        }
    }

    pub async fn claim_all(&self) -> ActionSummary {
        let api = &self.api;
        self.run_for_all("claim", |credential| async move {
            api.claim_mining_rewards(&credential).await
        })
        .await
    }

    pub async fn boost_all(&self, boost: Boost) -> ActionSummary {
        let api = &self.api;
        self.run_for_all(boost.key(), |credential| async move {
            api.check_boost(&credential, boost).await
        })
        .await
    }

    /// Claims each bonus in turn; the summary counts one unit per account and
    /// key.
    pub async fn tasks_all(&self, task_keys: &[String]) -> ActionSummary {
        let api = &self.api;
        let mut summary = ActionSummary::default();
        for key in task_keys {
            let key = key.as_str();
            let part = self
                .run_for_all(key, |credential| async move {
                    api.check_task(&credential, key).await
                })
                .await;
            summary.merge(&part);
        }
        summary
    }

    /// Logs profile and charges for each account.
    pub async fn status_all(&self) -> ActionSummary {
        let api = &self.api;
        self.run_for_all("status", |credential| async move {
            let profile = api.get_user_info(&credential).await?;
            let mining = api.get_mining_status(&credential).await?;
            Ok::<_, ApiError>(ActionOutcome::Success {
                detail: Some(format!(
                    "{} | balance {:.2} | league {} | squad {} | charges {}/{}",
                    profile.display_name(),
                    profile.balance.or(mining.user_balance).unwrap_or_default(),
                    profile.league.as_deref().unwrap_or("N/A"),
                    profile.squad_name(),
                    mining.charges,
                    mining
                        .max_charges
                        .map(|max| max.to_string())
                        .unwrap_or_else(|| "?".to_string())
                )),
            })
        })
        .await
    }

    async fn run_for_all<F, Fut>(&self, label: &str, action: F) -> ActionSummary
    where
        F: Fn(Credential) -> Fut,
        Fut: Future<Output = Result<ActionOutcome, ApiError>>,
    {
        let account_ids = self.store.account_ids();
        let semaphore = Semaphore::new(self.concurrency_limit);
        let retry = RetryExecutor::new(&self.store, &self.policy);

        let tasks = account_ids.iter().map(|account_id| {
            let semaphore = &semaphore;
            let retry = &retry;
            let action = &action;
            async move {
                let Ok(_permit) = semaphore.acquire().await else {
                    return AccountResult::Skipped;
                };
                if self.store.get(account_id).is_none() {
                    return AccountResult::Skipped;
                }
                let ctx = AccountContext {
                    account_id: account_id.clone(),
                    template_id: None,
                };
                let result = with_account_context(
                    ctx,
                    retry.execute(account_id, Idempotency::Idempotent, action),
                )
                .await;
                AccountResult::Done(result)
            }
        });
        let results = join_all(tasks).await;

        let mut summary = ActionSummary::default();
        for (account_id, result) in account_ids.iter().zip(results) {
            summary.total += 1;
            match result {
                AccountResult::Skipped => {
                    summary.skipped += 1;
                    logger::log_warn(&format!(
                        "[Actions] {}: account {} has no token, skipped",
                        label, account_id
                    ));
                }
                AccountResult::Done(Ok(ActionOutcome::Success { detail })) => {
                    summary.succeeded += 1;
                    logger::log_info(&format!(
                        "[Actions] {}: account {} ok{}",
                        label,
                        account_id,
                        detail.map(|d| format!(" ({})", d)).unwrap_or_default()
                    ));
                }
                AccountResult::Done(Ok(ActionOutcome::AlreadyApplied)) => {
                    summary.already_done += 1;
                    logger::log_info(&format!(
                        "[Actions] {}: account {} already done",
                        label, account_id
                    ));
                }
                AccountResult::Done(Ok(ActionOutcome::Rejected { reason })) => {
                    summary.failed += 1;
                    logger::log_warn(&format!(
                        "[Actions] {}: account {} rejected: {}",
                        label, account_id, reason
                    ));
                }
                AccountResult::Done(Err(e)) => {
                    summary.failed += 1;
                    logger::log_error(&format!(
                        "[Actions] {}: account {} failed - {}",
                        label, account_id, e
                    ));
                }
            }
        }

        logger::log_info(&format!(
            "[Actions] {} finished: total={}, succeeded={}, already_done={}, failed={}, skipped={}",
            label, summary.total, summary.succeeded, summary.already_done, summary.failed, summary.skipped
        ));
        summary
    }
}
