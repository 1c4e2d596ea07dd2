use serde::{Deserialize, Serialize};

use crate::constants;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default = "default_api_base_url")]
    pub api_base_url: String,
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
    #[serde(default)]
    pub use_proxies: bool,
    #[serde(default)]
    pub painting: PaintingConfig,
    #[serde(default)]
    pub retry: RetryConfig,
    #[serde(default)]
    pub renewal: RenewalConfig,
}

fn default_api_base_url() -> String {
    constants::DEFAULT_API_BASE_URL.to_string()
}

fn default_request_timeout_secs() -> u64 {
    constants::DEFAULT_REQUEST_TIMEOUT_SECS
}

impl AppConfig {
    pub fn new() -> Self {
        Self {
            api_base_url: default_api_base_url(),
            request_timeout_secs: default_request_timeout_secs(),
            use_proxies: false,
            painting: PaintingConfig::default(),
            retry: RetryConfig::default(),
            renewal: RenewalConfig::default(),
        }
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum CellOrder {
    Sequential,
    Shuffled,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum TemplateAssignmentMode {
    Fixed { template_id: u32 },
    Random,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PaintingConfig {
    pub double_verify: bool,
    pub concurrent: bool,
    pub concurrency_limit: usize,
    pub request_delay_ms: u64,
    pub verify_delay_ms: u64,
    pub discovery_delay_ms: u64,
    pub cell_order: CellOrder,
    pub template_assignment: TemplateAssignmentMode,
    pub continuous: bool,
    pub pass_interval_secs: u64,
}

impl PaintingConfig {
    pub fn new() -> Self {
        Self {
            double_verify: false,
            concurrent: true,
            concurrency_limit: constants::DEFAULT_CONCURRENCY_LIMIT,
            request_delay_ms: constants::DEFAULT_REQUEST_DELAY_MS,
            verify_delay_ms: constants::DEFAULT_VERIFY_DELAY_MS,
            discovery_delay_ms: constants::DEFAULT_DISCOVERY_DELAY_MS,
            cell_order: CellOrder::Shuffled,
            template_assignment: TemplateAssignmentMode::Fixed { template_id: 1 },
            continuous: false,
            pass_interval_secs: constants::DEFAULT_PASS_INTERVAL_SECS,
        }
    }
}

impl Default for PaintingConfig {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    pub transient_delay_ms: u64,
    pub max_transient_attempts: u32,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            transient_delay_ms: constants::DEFAULT_TRANSIENT_DELAY_MS,
            max_transient_attempts: constants::DEFAULT_MAX_TRANSIENT_ATTEMPTS,
        }
    }
}

/// External login helper replayed when a credential expires. The first
/// element is the program, the rest are its arguments.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RenewalConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub command: Option<Vec<String>>,
    #[serde(default = "default_renewal_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_renewal_timeout_secs() -> u64 {
    120
}

impl Default for RenewalConfig {
    fn default() -> Self {
        Self {
            command: None,
            timeout_secs: default_renewal_timeout_secs(),
        }
    }
}
