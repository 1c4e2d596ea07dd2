use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserProfile {
    #[serde(default)]
    pub first_name: Option<String>,
    #[serde(default)]
    pub balance: Option<f64>,
    #[serde(default)]
    pub league: Option<String>,
    #[serde(default)]
    pub squad: Option<Squad>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Squad {
    #[serde(default)]
    pub name: Option<String>,
}

impl UserProfile {
    /// First word of the profile name, or `"N/A"`.
    pub fn display_name(&self) -> String {
        self.first_name
            .as_deref()
            .and_then(|name| name.split_whitespace().next())
            .unwrap_or("N/A")
            .to_string()
    }

    pub fn squad_name(&self) -> &str {
        self.squad
            .as_ref()
            .and_then(|squad| squad.name.as_deref())
            .unwrap_or("N/A")
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MiningStatus {
    #[serde(default)]
    pub charges: u32,
    #[serde(default)]
    pub max_charges: Option<u32>,
    #[serde(default)]
    pub user_balance: Option<f64>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RepaintRequest<'a> {
    pub new_color: &'a str,
    pub pixel_id: u32,
}

#[derive(Debug, Clone, Deserialize)]
pub(crate) struct RepaintResponse {
    #[serde(default)]
    pub balance: Option<f64>,
}

#[derive(Debug, Clone, Deserialize)]
pub(crate) struct PixelDetailsResponse {
    pub pixel: PixelDetails,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PixelDetails {
    #[serde(default)]
    pub id: Option<u32>,
    #[serde(default)]
    pub color: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub(crate) struct ClaimResponse {
    #[serde(default)]
    pub claimed: Option<f64>,
}

/// Result of a repaint call as decoded at the API boundary.
#[derive(Debug, Clone, PartialEq)]
pub enum PaintOutcome {
    Success { balance: f64 },
    Rejected { reason: String },
}

impl From<RepaintResponse> for PaintOutcome {
    fn from(response: RepaintResponse) -> Self {
        match response.balance {
            Some(balance) => PaintOutcome::Success { balance },
            None => PaintOutcome::Rejected {
                reason: "response carried no balance".to_string(),
            },
        }
    }
}

/// Result of an idempotent account action (claim, boost, task, subscribe).
#[derive(Debug, Clone, PartialEq)]
pub enum ActionOutcome {
    Success { detail: Option<String> },
    AlreadyApplied,
    Rejected { reason: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Boost {
    PaintReward,
    RechargeSpeed,
    EnergyLimit,
}

impl Boost {
    pub fn key(&self) -> &'static str {
        match self {
            Boost::PaintReward => "paintReward",
            Boost::RechargeSpeed => "reChargeSpeed",
            Boost::EnergyLimit => "energyLimit",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Boost::PaintReward => "Paint Reward",
            Boost::RechargeSpeed => "Recharge Speed",
            Boost::EnergyLimit => "Energy Limit",
        }
    }
}

/// Reads `{ "<key>": true }` style check responses.
pub(crate) fn flag_outcome(body: &serde_json::Value, key: &str) -> ActionOutcome {
    match body.get(key).and_then(|v| v.as_bool()) {
        Some(true) => ActionOutcome::Success { detail: None },
        Some(false) => ActionOutcome::Rejected {
            reason: format!("{} not available yet", key),
        },
        None => ActionOutcome::Rejected {
            reason: format!("response missing '{}'", key),
        },
    }
}
