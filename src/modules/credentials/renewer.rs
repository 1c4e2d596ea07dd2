use futures::future::BoxFuture;
use std::path::PathBuf;
use std::process::Stdio;
use std::sync::Arc;
use std::time::Duration;
use tokio::process::Command;

use super::store::read_records;
use crate::constants::ACCOUNT_ID_ENV;
use crate::models::{AccountRecord, RenewalConfig};

/// Produces a fresh token for an account whose credential was rejected.
pub trait CredentialRenewer: Send + Sync {
    fn renew<'a>(&'a self, record: &'a AccountRecord) -> BoxFuture<'a, Result<String, String>>;
}

pub fn renewer_from_config(
    config: &RenewalConfig,
    accounts_path: PathBuf,
) -> Arc<dyn CredentialRenewer> {
    match config.command.as_deref() {
        Some([program, args @ ..]) if !program.trim().is_empty() => Arc::new(CommandRenewer {
            program: program.clone(),
            args: args.to_vec(),
            timeout: Duration::from_secs(config.timeout_secs),
        }),
        _ => Arc::new(ReloadRenewer { path: accounts_path }),
    }
}

/// Replays the external login helper. The account id is passed as the last
/// argument and in `PXP_ACCOUNT_ID`; the first non-empty stdout line is the
/// new token.
pub struct CommandRenewer {
    pub program: String,
    pub args: Vec<String>,
    pub timeout: Duration,
}

impl CredentialRenewer for CommandRenewer {
    fn renew<'a>(&'a self, record: &'a AccountRecord) -> BoxFuture<'a, Result<String, String>> {
        Box::pin(async move {
            let mut command = Command::new(&self.program);
            command
                .args(&self.args)
                .arg(&record.id)
                .env(ACCOUNT_ID_ENV, &record.id)
                .stdin(Stdio::null())
                .stdout(Stdio::piped())
                .stderr(Stdio::piped())
                .kill_on_drop(true);

            let output = tokio::time::timeout(self.timeout, command.output())
                .await
                .map_err(|_| format!("renewal_timed_out_after_{}s", self.timeout.as_secs()))?
                .map_err(|e| format!("failed_to_start_renewal_command: {}", e))?;

            if !output.status.success() {
                let stderr = String::from_utf8_lossy(&output.stderr);
                return Err(format!(
                    "renewal_command_failed: {} {}",
                    output.status,
                    stderr.trim()
                ));
            }

            String::from_utf8_lossy(&output.stdout)
                .lines()
                .map(str::trim)
                .find(|line| !line.is_empty())
                .map(str::to_string)
                .ok_or_else(|| "renewal_command_printed_no_token".to_string())
        })
    }
}

/// Picks up a token some other process wrote to `accounts.json`. Fails when
/// the file still holds the rejected token.
pub struct ReloadRenewer {
    pub path: PathBuf,
}

impl CredentialRenewer for ReloadRenewer {
    fn renew<'a>(&'a self, record: &'a AccountRecord) -> BoxFuture<'a, Result<String, String>> {
        Box::pin(async move {
            let on_disk = read_records(&self.path)?;
            let fresh = on_disk
                .into_iter()
                .find(|r| r.id == record.id)
                .filter(AccountRecord::has_token)
                .and_then(|r| r.query_id)
                .ok_or_else(|| format!("account {} has no token on disk", record.id))?;
            if Some(&fresh) == record.query_id.as_ref() {
                return Err("no_newer_token_on_disk".to_string());
            }
            Ok(fresh)
        })
    }
}
