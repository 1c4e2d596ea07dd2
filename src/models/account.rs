use serde::{Deserialize, Serialize};

/// One entry of `accounts.json`. Key names match the file written by the
/// external login helper, hence the camelCase renames.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct AccountRecord {
    pub id: String,
    #[serde(rename = "queryId", default)]
    pub query_id: Option<String>,
    #[serde(default)]
    pub proxy: Option<String>,
    #[serde(rename = "userAgent", default)]
    pub user_agent: Option<String>,
}

impl AccountRecord {
    pub fn new(id: impl Into<String>, query_id: Option<String>) -> Self {
        Self {
            id: id.into(),
            query_id,
            proxy: None,
            user_agent: None,
        }
    }

    pub fn has_token(&self) -> bool {
        self.query_id
            .as_deref()
            .is_some_and(|token| !token.trim().is_empty())
    }
}

/// Everything a single remote call needs to act as one account.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Credential {
    pub account_id: String,
    pub token: String,
    pub proxy: Option<String>,
    pub user_agent: String,
}

impl Credential {
    pub fn from_record(record: &AccountRecord, default_user_agent: &str) -> Option<Self> {
        if !record.has_token() {
            return None;
        }
        Some(Self {
            account_id: record.id.clone(),
            token: record.query_id.clone().unwrap_or_default(),
            proxy: record
                .proxy
                .clone()
                .filter(|proxy| !proxy.trim().is_empty()),
            user_agent: record
                .user_agent
                .clone()
                .filter(|ua| !ua.trim().is_empty())
                .unwrap_or_else(|| default_user_agent.to_string()),
        })
    }
}
