use futures::future::join_all;
use std::collections::HashMap;
use std::ops::ControlFlow;
use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio::time::{sleep, Duration};

use super::assignment::TemplateAssignment;
use super::palette::Palette;
use super::state::{AccountPassState, PassSummary, SchedulerState};
use super::target_set::TargetSetBuilder;
use crate::api::{ActionOutcome, ApiError, GameApiClient, PaintOutcome};
use crate::models::{CellOrder, PaintingConfig, TargetCell, Template};
use crate::modules::credentials::CredentialStore;
use crate::modules::retry::{Idempotency, RetryError, RetryExecutor, RetryPolicy};
use crate::modules::system::account_context::{with_account_context, AccountContext};
use crate::modules::system::logger;

/// Drives painting passes over every account in the credential store.
pub struct PaintingEngine {
    api: Arc<GameApiClient>,
    store: Arc<CredentialStore>,
    templates: Vec<Template>,
    palette: Palette,
    settings: PaintingConfig,
    policy: RetryPolicy,
    assignment: TemplateAssignment,
}

impl PaintingEngine {
    pub fn new(
        api: Arc<GameApiClient>,
        store: Arc<CredentialStore>,
        templates: Vec<Template>,
        palette: Palette,
        settings: PaintingConfig,
        policy: RetryPolicy,
    ) -> Self {
        let assignment = TemplateAssignment::new(settings.template_assignment.clone(), &templates);
        assignment.assign_all(&store.account_ids());
        Self {
            api,
            store,
            templates,
            palette,
            settings,
            policy,
            assignment,
        }
    }

    fn retry(&self) -> RetryExecutor<'_> {
        RetryExecutor::new(&self.store, &self.policy)
    }

    fn template(&self, template_id: u32) -> Option<&Template> {
        self.templates.iter().find(|t| t.id == template_id)
    }

    fn delay(ms: u64) -> Option<Duration> {
        (ms > 0).then(|| Duration::from_millis(ms))
    }

    /// One sweep over all accounts. Ends once every painting account has run
    /// out of charges or cells.
    pub async fn run_pass(&self) -> PassSummary {
        if let Err(e) = self.store.reload() {
            logger::log_warn(&format!(
                "[Engine] Could not re-read credential store, using in-memory state: {}",
                e
            ));
        }

        let mut state = self.discover_charges().await;
        if state.accounts.is_empty() {
            logger::log_warn("[Engine] No accounts have charges left this pass");
            return state.summary();
        }

        let targets = self.build_targets(&state);
        self.execute(&mut state, &targets).await;

        let summary = state.summary();
        logger::log_info(&format!(
            "[Engine] Pass finished: painting={}/{}, painted={}, already_correct={}, not_found={}, failed={}, unavailable={}",
            summary.accounts_painting,
            summary.accounts_discovered,
            summary.cells_painted,
            summary.already_correct,
            summary.not_found,
            summary.failed,
            summary.unavailable
        ));
        summary
    }

    /// Fetches fresh charges for every account. Accounts without a token or
    /// without charges do not take part in the pass.
    pub async fn discover_charges(&self) -> SchedulerState {
        let mut state = SchedulerState::default();
        let retry = self.retry();

        for (index, account_id) in self.store.account_ids().iter().enumerate() {
            if index > 0 {
                if let Some(delay) = Self::delay(self.settings.discovery_delay_ms) {
                    sleep(delay).await;
                }
            }
            if self.store.get(account_id).is_none() {
                logger::log_warn(&format!(
                    "[Engine] Account {} has no credential, skipping",
                    account_id
                ));
                continue;
            }
            state.discovered += 1;

            let template_id = self.assignment.template_for(account_id);
            let ctx = AccountContext {
                account_id: account_id.clone(),
                template_id,
            };
            let api = &self.api;
            let result = with_account_context(
                ctx,
                retry.execute(account_id, Idempotency::Idempotent, |credential| async move {
                    api.get_mining_status(&credential).await
                }),
            )
            .await;

            match result {
                Ok(status) if status.charges == 0 => {
                    state.excluded_no_charges += 1;
                    logger::log_info(&format!(
                        "[Engine] Account {} has no charges right now",
                        account_id
                    ));
                }
                Ok(status) => {
                    logger::log_info(&format!(
                        "[Engine] Account {} has {} charges",
                        account_id, status.charges
                    ));
                    let mut account = AccountPassState::new(account_id.clone(), template_id, status.charges);
                    account.balance = status.user_balance;
                    state.accounts.push(account);
                }
                Err(e) if e.is_account_unavailable() => {
                    state.unavailable_at_discovery += 1;
                    logger::log_warn(&format!("[Engine] {}", e));
                }
                Err(e) => {
                    logger::log_error(&format!(
                        "[Engine] Account {}: fetching charges failed - {}",
                        account_id, e
                    ));
                }
            }
        }
        state
    }

    /// Expands each template in use once, in row-major order. Accounts get
    /// their own ordering of these cells.
    fn build_targets(&self, state: &SchedulerState) -> HashMap<u32, Vec<TargetCell>> {
        let builder = TargetSetBuilder::new(&self.palette, CellOrder::Sequential);
        let mut targets = HashMap::new();
        for template_id in state.accounts.iter().filter_map(|a| a.template_id) {
            if targets.contains_key(&template_id) {
                continue;
            }
            let Some(template) = self.template(template_id) else {
                logger::log_error(&format!("[Engine] Template {} is not configured", template_id));
                continue;
            };
            match builder.build(template) {
                Ok(cells) => {
                    logger::log_info(&format!(
                        "[Engine] Template {} ({}) expands to {} cells",
                        template.id,
                        template.name,
                        cells.len()
                    ));
                    targets.insert(template_id, cells);
                }
                Err(e) => logger::log_error(&format!(
                    "[Engine] Template {} could not be expanded: {}",
                    template.id, e
                )),
            }
        }
        targets
    }

    async fn execute(&self, state: &mut SchedulerState, targets: &HashMap<u32, Vec<TargetCell>>) {
        if self.settings.concurrent {
            let semaphore = Semaphore::new(self.settings.concurrency_limit.max(1));
            let tasks = state.accounts.iter_mut().map(|account| {
                let semaphore = &semaphore;
                async move {
                    let Ok(_permit) = semaphore.acquire().await else {
                        return;
                    };
                    self.process_account(account, targets).await;
                }
            });
            join_all(tasks).await;
        } else {
            for account in state.accounts.iter_mut() {
                self.process_account(account, targets).await;
            }
        }
    }

    async fn process_account(
        &self,
        account: &mut AccountPassState,
        targets: &HashMap<u32, Vec<TargetCell>>,
    ) {
        let ctx = AccountContext {
            account_id: account.account_id.clone(),
            template_id: account.template_id,
        };
        with_account_context(ctx, self.paint_account(account, targets)).await;
    }

    async fn paint_account(
        &self,
        account: &mut AccountPassState,
        targets: &HashMap<u32, Vec<TargetCell>>,
    ) {
        let Some(template) = account.template_id.and_then(|id| self.template(id)) else {
            logger::log_warn(&format!(
                "[Engine] Account {} has no template assigned",
                account.account_id
            ));
            return;
        };
        let Some(base) = targets.get(&template.id) else {
            logger::log_warn(&format!(
                "[Engine] Account {} skipped: template {} has no target cells",
                account.account_id, template.id
            ));
            return;
        };
        let mut cells = base.clone();
        TargetSetBuilder::new(&self.palette, self.settings.cell_order)
            .apply_order(&mut cells, &mut rand::thread_rng());

        logger::log_info(&format!(
            "[Engine] Account {} painting template {} ({}): {} cells, {} charges",
            account.account_id,
            template.id,
            template.name,
            cells.len(),
            account.charges
        ));

        if let Some(remote_id) = template.remote_id {
            if self.subscribe_template(account, remote_id).await.is_break() {
                return;
            }
        }

        for cell in &cells {
            if !account.has_charges() {
                break;
            }
            if self.paint_cell(account, cell).await.is_break() {
                break;
            }
            account.cells_processed += 1;
            if let Some(delay) = Self::delay(self.settings.request_delay_ms) {
                sleep(delay).await;
            }
        }

        logger::log_info(&format!(
            "[Engine] Account {} finished: painted={}, processed={}/{}, remaining charges={}",
            account.account_id,
            account.painted,
            account.cells_processed,
            cells.len(),
            account.charges
        ));
    }

    async fn subscribe_template(
        &self,
        account: &mut AccountPassState,
        remote_id: u64,
    ) -> ControlFlow<()> {
        let api = &self.api;
        let result = self
            .retry()
            .execute(&account.account_id, Idempotency::Idempotent, |credential| async move {
                api.subscribe_template(&credential, remote_id).await
            })
            .await;

        match result {
            Ok(ActionOutcome::Success { .. }) => logger::log_info(&format!(
                "[Engine] Account {} subscribed to template {}",
                account.account_id, remote_id
            )),
            Ok(ActionOutcome::AlreadyApplied) => logger::log_info(&format!(
                "[Engine] Account {} already uses template {}",
                account.account_id, remote_id
            )),
            Ok(ActionOutcome::Rejected { reason }) => logger::log_warn(&format!(
                "[Engine] Account {} could not subscribe to template {}: {}",
                account.account_id, remote_id, reason
            )),
            Err(e) => return self.handle_failure(account, None, e),
        }
        ControlFlow::Continue(())
    }

    async fn paint_cell(&self, account: &mut AccountPassState, cell: &TargetCell) -> ControlFlow<()> {
        let api = &self.api;
        let retry = self.retry();

        if self.settings.double_verify {
            if let Some(delay) = Self::delay(self.settings.verify_delay_ms) {
                sleep(delay).await;
            }
            let details = retry
                .execute(&account.account_id, Idempotency::Idempotent, |credential| async move {
                    api.get_pixel_details(&credential, cell.cell_id).await
                })
                .await;
            match details {
                Ok(pixel)
                    if pixel
                        .color
                        .as_deref()
                        .is_some_and(|c| c.eq_ignore_ascii_case(&cell.desired_color)) =>
                {
                    account.already_correct += 1;
                    logger::log_info(&format!(
                        "[Engine] Cell ({}, {}) already has color {}",
                        cell.x, cell.y, cell.desired_color
                    ));
                    return ControlFlow::Continue(());
                }
                Ok(_) => {}
                Err(e) => return self.handle_failure(account, Some(cell), e),
            }
        }

        let color = cell.desired_color.as_str();
        let outcome = retry
            .execute(&account.account_id, Idempotency::NonIdempotent, |credential| async move {
                api.start_repaint(&credential, color, cell.cell_id).await
            })
            .await;

        match outcome {
            Ok(PaintOutcome::Success { balance }) => {
                account.record_paint(balance);
                logger::log_info(&format!(
                    "[Engine] Cell ({}, {}) painted {}; balance {:.2}, charges left {}",
                    cell.x, cell.y, cell.desired_color, balance, account.charges
                ));
            }
            Ok(PaintOutcome::Rejected { reason }) => {
                account.failed += 1;
                logger::log_warn(&format!(
                    "[Engine] Cell ({}, {}) not repainted: {}",
                    cell.x, cell.y, reason
                ));
            }
            Err(e) => return self.handle_failure(account, Some(cell), e),
        }
        ControlFlow::Continue(())
    }

    /// Stops the account when it became unavailable, otherwise records the
    /// failure against the current cell and moves on.
    fn handle_failure(
        &self,
        account: &mut AccountPassState,
        cell: Option<&TargetCell>,
        error: RetryError,
    ) -> ControlFlow<()> {
        if error.is_account_unavailable() {
            account.unavailable = true;
            logger::log_warn(&format!(
                "[Engine] {}; skipping it for the rest of this pass",
                error
            ));
            return ControlFlow::Break(());
        }

        let location = cell
            .map(|c| format!("cell {} ({}, {})", c.cell_id, c.x, c.y))
            .unwrap_or_else(|| "template subscription".to_string());
        if error.api_error() == Some(&ApiError::NotFound) {
            account.not_found += 1;
            logger::log_warn(&format!(
                "[Engine] Account {}: {} not found, skipping",
                account.account_id, location
            ));
        } else {
            if cell.is_some() {
                account.failed += 1;
            }
            logger::log_error(&format!(
                "[Engine] Account {}: {} failed - {}",
                account.account_id, location, error
            ));
        }
        ControlFlow::Continue(())
    }
}
