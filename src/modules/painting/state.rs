use serde::Serialize;

/// Everything one pass knows about one account. Owned by the task painting
/// for that account; no other task writes to it.
#[derive(Debug, Clone, Serialize)]
pub struct AccountPassState {
    pub account_id: String,
    pub template_id: Option<u32>,
    pub charges: u32,
    pub balance: Option<f64>,
    pub painted: usize,
    pub already_correct: usize,
    pub not_found: usize,
    pub failed: usize,
    pub cells_processed: usize,
    pub unavailable: bool,
}

impl AccountPassState {
    pub fn new(account_id: impl Into<String>, template_id: Option<u32>, charges: u32) -> Self {
        Self {
            account_id: account_id.into(),
            template_id,
            charges,
            balance: None,
            painted: 0,
            already_correct: 0,
            not_found: 0,
            failed: 0,
            cells_processed: 0,
            unavailable: false,
        }
    }

    /// Applies a confirmed paint: exactly one charge is spent.
    pub fn record_paint(&mut self, balance: f64) {
        self.charges = self.charges.saturating_sub(1);
        self.balance = Some(balance);
        self.painted += 1;
    }

    pub fn has_charges(&self) -> bool {
        self.charges > 0 && !self.unavailable
    }
}

/// Per-pass state replacing any process-wide account maps.
#[derive(Debug, Default)]
pub struct SchedulerState {
    pub accounts: Vec<AccountPassState>,
    pub discovered: usize,
    pub excluded_no_charges: usize,
    pub unavailable_at_discovery: usize,
}

impl SchedulerState {
    pub fn summary(&self) -> PassSummary {
        let mut summary = PassSummary {
            accounts_discovered: self.discovered,
            accounts_painting: self.accounts.len(),
            unavailable: self.unavailable_at_discovery,
            ..PassSummary::default()
        };
        for account in &self.accounts {
            summary.cells_painted += account.painted;
            summary.already_correct += account.already_correct;
            summary.not_found += account.not_found;
            summary.failed += account.failed;
            if account.unavailable {
                summary.unavailable += 1;
            }
            summary
                .remaining_charges
                .push((account.account_id.clone(), account.charges));
        }
        summary
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct PassSummary {
    pub accounts_discovered: usize,
    pub accounts_painting: usize,
    pub cells_painted: usize,
    pub already_correct: usize,
    pub not_found: usize,
    pub failed: usize,
    pub unavailable: usize,
    pub remaining_charges: Vec<(String, u32)>,
}
