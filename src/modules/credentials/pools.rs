use crate::models::AccountRecord;

/// Fills in missing proxies and user agents by account position: the
/// account at index `i` receives `pool[i % pool.len()]`. Accounts that
/// already carry a value keep it. Returns how many records changed.
pub fn assign_round_robin(
    records: &mut [AccountRecord],
    proxies: &[String],
    user_agents: &[String],
) -> usize {
    let mut changed = 0;
    for (index, record) in records.iter_mut().enumerate() {
        let mut touched = false;
        if is_blank(&record.proxy) {
            if let Some(proxy) = pick(proxies, index) {
                record.proxy = Some(proxy.to_string());
                touched = true;
            }
        }
        if is_blank(&record.user_agent) {
            if let Some(ua) = pick(user_agents, index) {
                record.user_agent = Some(ua.to_string());
                touched = true;
            }
        }
        if touched {
            changed += 1;
        }
    }
    changed
}

fn pick(pool: &[String], index: usize) -> Option<&str> {
    if pool.is_empty() {
        None
    } else {
        Some(pool[index % pool.len()].as_str())
    }
}

fn is_blank(value: &Option<String>) -> bool {
    value.as_deref().map_or(true, |v| v.trim().is_empty())
}
