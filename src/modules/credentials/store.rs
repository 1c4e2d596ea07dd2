use dashmap::DashMap;
use parking_lot::RwLock;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::Mutex;

use super::pools::assign_round_robin;
use super::renewer::CredentialRenewer;
use crate::models::{AccountRecord, Credential};
use crate::modules::system::logger;

pub(crate) fn read_records(path: &Path) -> Result<Vec<AccountRecord>, String> {
    let content = fs::read_to_string(path)
        .map_err(|e| format!("failed_to_read_accounts_file: {}: {}", path.display(), e))?;
    serde_json::from_str(&content).map_err(|e| format!("failed_to_parse_accounts_file: {}", e))
}

fn write_records(path: &Path, records: &[AccountRecord]) -> Result<(), String> {
    let json_str = serde_json::to_string_pretty(records)
        .map_err(|e| format!("failed_to_serialize_accounts: {}", e))?;
    let temp_path = path.with_extension("json.tmp");
    fs::write(&temp_path, json_str)
        .map_err(|e| format!("failed_to_write_accounts_temp_file: {}", e))?;
    fs::rename(temp_path, path).map_err(|e| format!("failed_to_replace_accounts_file: {}", e))
}

/// Accounts and their tokens, backed by `accounts.json`.
///
/// Each account only ever touches its own entry, so concurrent refreshes need
/// no coordination beyond serializing the file rewrite. The snapshot is taken
/// under the write lock so a later rewrite never carries older tokens.
pub struct CredentialStore {
    path: PathBuf,
    records: DashMap<String, AccountRecord>,
    order: RwLock<Vec<String>>,
    renewer: Arc<dyn CredentialRenewer>,
    default_user_agent: String,
    write_lock: Mutex<()>,
}

impl CredentialStore {
    pub fn load(
        path: PathBuf,
        renewer: Arc<dyn CredentialRenewer>,
        default_user_agent: impl Into<String>,
    ) -> Result<Self, String> {
        let records = read_records(&path)?;
        Ok(Self::from_records(path, records, renewer, default_user_agent))
    }

    pub fn from_records(
        path: PathBuf,
        records: Vec<AccountRecord>,
        renewer: Arc<dyn CredentialRenewer>,
        default_user_agent: impl Into<String>,
    ) -> Self {
        let store = Self {
            path,
            records: DashMap::new(),
            order: RwLock::new(Vec::new()),
            renewer,
            default_user_agent: default_user_agent.into(),
            write_lock: Mutex::new(()),
        };
        store.replace_all(records);
        store
    }

    fn replace_all(&self, records: Vec<AccountRecord>) {
        let mut order = Vec::with_capacity(records.len());
        self.records.clear();
        for record in records {
            if self.records.contains_key(&record.id) {
                logger::log_warn(&format!(
                    "[Credentials] Duplicate account id {} ignored",
                    record.id
                ));
                continue;
            }
            order.push(record.id.clone());
            self.records.insert(record.id.clone(), record);
        }
        *self.order.write() = order;
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Account ids in file order.
    pub fn account_ids(&self) -> Vec<String> {
        self.order.read().clone()
    }

    pub fn record(&self, account_id: &str) -> Option<AccountRecord> {
        self.records.get(account_id).map(|r| r.value().clone())
    }

    /// `None` when the account is unknown or has no token.
    pub fn get(&self, account_id: &str) -> Option<Credential> {
        self.records
            .get(account_id)
            .and_then(|r| Credential::from_record(r.value(), &self.default_user_agent))
    }

    /// Obtains a new token through the renewer, stores it and persists the
    /// whole store.
    pub async fn refresh(&self, account_id: &str) -> Result<Credential, String> {
        let record = self
            .record(account_id)
            .ok_or_else(|| format!("unknown_account: {}", account_id))?;

        let token = self.renewer.renew(&record).await?;
        let token = token.trim();
        if token.is_empty() {
            return Err("renewer_returned_empty_token".to_string());
        }

        let updated = {
            let mut entry = self
                .records
                .get_mut(account_id)
                .ok_or_else(|| format!("unknown_account: {}", account_id))?;
            entry.query_id = Some(token.to_string());
            entry.value().clone()
        };
        self.persist().await?;

        logger::log_info(&format!(
            "[Credentials] Token refreshed for account {}",
            account_id
        ));
        Credential::from_record(&updated, &self.default_user_agent)
            .ok_or_else(|| "refreshed_record_has_no_token".to_string())
    }

    /// Re-reads `accounts.json` so tokens written by other processes are seen.
    /// Pool assignments made in memory survive when the file has none.
    pub fn reload(&self) -> Result<usize, String> {
        let mut on_disk = read_records(&self.path)?;
        for record in &mut on_disk {
            if let Some(current) = self.records.get(&record.id) {
                if record.proxy.is_none() {
                    record.proxy = current.proxy.clone();
                }
                if record.user_agent.is_none() {
                    record.user_agent = current.user_agent.clone();
                }
            }
        }
        self.replace_all(on_disk);
        Ok(self.len())
    }

    /// Assigns pool entries to accounts without one and persists the result
    /// so assignments stay stable across runs.
    pub async fn assign_pools(
        &self,
        proxies: &[String],
        user_agents: &[String],
    ) -> Result<usize, String> {
        let mut records = self.snapshot();
        let changed = assign_round_robin(&mut records, proxies, user_agents);
        if changed > 0 {
            for record in records {
                self.records.insert(record.id.clone(), record);
            }
            self.persist().await?;
        }
        Ok(changed)
    }

    fn snapshot(&self) -> Vec<AccountRecord> {
        self.order
            .read()
            .iter()
            .filter_map(|id| self.record(id))
            .collect()
    }

    /// Rewrites `accounts.json` on the blocking pool.
    pub async fn persist(&self) -> Result<(), String> {
        let _guard = self.write_lock.lock().await;
        let path = self.path.clone();
        let records = self.snapshot();
        tokio::task::spawn_blocking(move || write_records(&path, &records))
            .await
            .map_err(|e| format!("accounts_writer_task_failed: {}", e))?
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::StaticRenewer;

    fn write_accounts(dir: &Path, body: &str) -> PathBuf {
        let path = dir.join("accounts.json");
        fs::write(&path, body).expect("write accounts");
        path
    }

    const ACCOUNTS: &str = r#"[
        {"id":"b","queryId":"tb","proxy":"","userAgent":null},
        {"id":"a","queryId":null},
        {"id":"c","queryId":"tc","userAgent":"UA/c"}
    ]"#;

    #[test]
    fn get_requires_a_token_and_keeps_file_order() {
        let dir = tempfile::tempdir().expect("temp dir");
        let renewer = StaticRenewer::new(None);
        let store = CredentialStore::load(write_accounts(dir.path(), ACCOUNTS), renewer, "UA/default")
            .expect("load store");

        assert_eq!(store.account_ids(), vec!["b", "a", "c"]);
        assert!(store.get("a").is_none());
        assert!(store.get("missing").is_none());

        let b = store.get("b").expect("credential b");
        assert_eq!(b.token, "tb");
        assert!(b.proxy.is_none());
        assert_eq!(b.user_agent, "UA/default");
        assert_eq!(store.get("c").expect("credential c").user_agent, "UA/c");
    }

    #[tokio::test(flavor = "current_thread")]
    async fn refresh_persists_only_the_refreshed_account() {
        let dir = tempfile::tempdir().expect("temp dir");
        let path = write_accounts(dir.path(), ACCOUNTS);
        let renewer = StaticRenewer::new(Some(" fresh "));
        let store = CredentialStore::load(path.clone(), renewer.clone(), "UA/default")
            .expect("load store");

        let credential = store.refresh("b").await.expect("refresh");
        assert_eq!(credential.token, "fresh");
        assert_eq!(renewer.calls(), 1);

        let on_disk = read_records(&path).expect("reread");
        let ids: Vec<_> = on_disk.iter().map(|r| r.id.as_str()).collect();
        assert_eq!(ids, vec!["b", "a", "c"]);
        assert_eq!(on_disk[0].query_id.as_deref(), Some("fresh"));
        assert_eq!(on_disk[2].query_id.as_deref(), Some("tc"));
    }

    #[tokio::test(flavor = "current_thread")]
    async fn failed_renewal_leaves_store_unchanged() {
        let dir = tempfile::tempdir().expect("temp dir");
        let renewer = StaticRenewer::new(None);
        let store = CredentialStore::load(write_accounts(dir.path(), ACCOUNTS), renewer, "UA")
            .expect("load store");

        assert!(store.refresh("c").await.is_err());
        assert_eq!(store.get("c").expect("credential").token, "tc");
        assert!(store.refresh("nope").await.is_err());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn concurrent_refreshes_all_reach_the_file() {
        let dir = tempfile::tempdir().expect("temp dir");
        let path = write_accounts(dir.path(), ACCOUNTS);
        let renewer = StaticRenewer::new(Some("fresh"));
        let store = CredentialStore::load(path.clone(), renewer.clone(), "UA")
            .expect("load store");

        let (b, a, c) = tokio::join!(store.refresh("b"), store.refresh("a"), store.refresh("c"));
        assert!(b.is_ok() && a.is_ok() && c.is_ok());
        assert_eq!(renewer.calls(), 3);

        let on_disk = read_records(&path).expect("reread");
        assert!(on_disk
            .iter()
            .all(|record| record.query_id.as_deref() == Some("fresh")));
    }

    #[tokio::test(flavor = "current_thread")]
    async fn reload_sees_external_updates_and_keeps_pool_assignments() {
        let dir = tempfile::tempdir().expect("temp dir");
        let path = write_accounts(dir.path(), ACCOUNTS);
        let renewer = StaticRenewer::new(None);
        let store = CredentialStore::load(path.clone(), renewer, "UA").expect("load store");
        let changed = store
            .assign_pools(&["http://p:1".to_string()], &[])
            .await
            .expect("assign pools");
        assert_eq!(changed, 3);

        fs::write(
            &path,
            r#"[{"id":"a","queryId":"ta"},{"id":"c","queryId":"tc2","proxy":"http://own:2"}]"#,
        )
        .expect("external update");
        assert_eq!(store.reload().expect("reload"), 2);

        assert_eq!(store.account_ids(), vec!["a", "c"]);
        let a = store.get("a").expect("credential a");
        assert_eq!(a.token, "ta");
        assert_eq!(a.proxy.as_deref(), Some("http://p:1"));
        assert_eq!(
            store.get("c").expect("credential c").proxy.as_deref(),
            Some("http://own:2")
        );
    }

    #[test]
    fn missing_accounts_file_is_an_error() {
        let dir = tempfile::tempdir().expect("temp dir");
        let renewer = StaticRenewer::new(None);
        let result = CredentialStore::load(dir.path().join("accounts.json"), renewer, "UA");
        assert!(result.is_err());
    }
}
