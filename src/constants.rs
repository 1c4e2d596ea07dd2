use std::time::Duration;

pub const DEFAULT_API_BASE_URL: &str = "https://notpx.app/api/v1";

/// The remote canvas addresses cells as `y * WORLD_WIDTH + x`, so no template
/// may extend past column or row 999.
pub const WORLD_WIDTH: u32 = 1000;
pub const WORLD_HEIGHT: u32 = 1000;

pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 15;
pub const DEFAULT_CONCURRENCY_LIMIT: usize = 5;
pub const DEFAULT_REQUEST_DELAY_MS: u64 = 300;
pub const DEFAULT_VERIFY_DELAY_MS: u64 = 100;
pub const DEFAULT_DISCOVERY_DELAY_MS: u64 = 300;
pub const DEFAULT_PASS_INTERVAL_SECS: u64 = 600;
pub const DEFAULT_TRANSIENT_DELAY_MS: u64 = 1000;
pub const DEFAULT_MAX_TRANSIENT_ATTEMPTS: u32 = 10;

/// Pause after a credential renewal before the call is replayed.
pub const POST_RENEWAL_DELAY: Duration = Duration::from_millis(50);

pub const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (Linux; Android 13; Pixel 7) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Mobile Safari/537.36";

/// Bonuses claimed by `tasks` when no keys are given.
pub const DEFAULT_TASK_KEYS: &[&str] = &["leagueBonusSilver", "leagueBonusGold", "leagueBonusPlatinum"];

pub const DATA_DIR_ENV: &str = "PXP_DATA_DIR";
pub const ACCOUNT_ID_ENV: &str = "PXP_ACCOUNT_ID";

pub const CONFIG_FILE: &str = "config.json";
pub const ACCOUNTS_FILE: &str = "accounts.json";
pub const TEMPLATES_FILE: &str = "templates.json";
pub const COLORS_FILE: &str = "colors.json";
pub const PROXIES_FILE: &str = "proxies.txt";
pub const USER_AGENTS_FILE: &str = "user_agents.txt";
