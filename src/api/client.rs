use reqwest::{header, Method};
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::time::Duration;

use super::errors::{classify_status, classify_transport_error, ApiError};
use super::http::ClientCache;
use super::types::{
    flag_outcome, ActionOutcome, Boost, ClaimResponse, MiningStatus, PaintOutcome, PixelDetails,
    PixelDetailsResponse, RepaintRequest, RepaintResponse, UserProfile,
};
use crate::models::Credential;

/// Stateless request functions against the game API. Every call is bound to
/// one account through the [`Credential`] it receives.
pub struct GameApiClient {
    base_url: String,
    clients: ClientCache,
}

impl GameApiClient {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            clients: ClientCache::new(timeout),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub async fn get_user_info(&self, credential: &Credential) -> Result<UserProfile, ApiError> {
        let body = self
            .request(credential, Method::GET, "/users/me", None, &[])
            .await?;
        decode(body, "users/me")
    }

    pub async fn get_mining_status(
        &self,
        credential: &Credential,
    ) -> Result<MiningStatus, ApiError> {
        let body = self
            .request(credential, Method::GET, "/mining/status", None, &[])
            .await?;
        decode(body, "mining/status")
    }

    /// Spends one charge on the server when it succeeds. A 400 means the
    /// server refused the repaint and is reported as `Rejected`.
    pub async fn start_repaint(
        &self,
        credential: &Credential,
        color: &str,
        cell_id: u32,
    ) -> Result<PaintOutcome, ApiError> {
        let payload = serde_json::to_value(RepaintRequest {
            new_color: color,
            pixel_id: cell_id,
        })
        .map_err(|e| ApiError::Unclassified(format!("failed_to_encode_repaint: {}", e)))?;

        match self
            .request(
                credential,
                Method::POST,
                "/repaint/start",
                Some(payload),
                &[],
            )
            .await
        {
            Ok(body) => {
                let response: RepaintResponse = decode(body, "repaint/start")?;
                Ok(response.into())
            }
            Err(ApiError::AlreadyDone { body, .. }) => Ok(PaintOutcome::Rejected {
                reason: if body.is_empty() {
                    "repaint refused".to_string()
                } else {
                    body
                },
            }),
            Err(e) => Err(e),
        }
    }

    pub async fn get_pixel_details(
        &self,
        credential: &Credential,
        cell_id: u32,
    ) -> Result<PixelDetails, ApiError> {
        let path = format!("/image/get/{}", cell_id);
        let body = self
            .request(credential, Method::GET, &path, None, &[])
            .await?;
        let response: PixelDetailsResponse = decode(body, "image/get")?;
        Ok(response.pixel)
    }

    /// Makes `remote_id` the account's default template. The service answers
    /// 402 when the subscription is already in place.
    pub async fn subscribe_template(
        &self,
        credential: &Credential,
        remote_id: u64,
    ) -> Result<ActionOutcome, ApiError> {
        let path = format!("/image/template/subscribe/{}", remote_id);
        let result = self
            .request(credential, Method::PUT, &path, None, &[402])
            .await;
        action_outcome(result, |_| ActionOutcome::Success { detail: None })
    }

    pub async fn claim_mining_rewards(
        &self,
        credential: &Credential,
    ) -> Result<ActionOutcome, ApiError> {
        let result = self
            .request(credential, Method::GET, "/mining/claim", None, &[])
            .await;
        action_outcome(result, |body| {
            let claimed = serde_json::from_value::<ClaimResponse>(body)
                .ok()
                .and_then(|c| c.claimed);
            ActionOutcome::Success {
                detail: claimed.map(|amount| format!("claimed {:.2}", amount)),
            }
        })
    }

    pub async fn check_boost(
        &self,
        credential: &Credential,
        boost: Boost,
    ) -> Result<ActionOutcome, ApiError> {
        let path = format!("/mining/boost/check/{}", boost.key());
        let result = self
            .request(credential, Method::GET, &path, None, &[])
            .await;
        action_outcome(result, |body| flag_outcome(&body, boost.key()))
    }

    /// Claims a task or league bonus such as `leagueBonusSilver`.
    pub async fn check_task(
        &self,
        credential: &Credential,
        task_key: &str,
    ) -> Result<ActionOutcome, ApiError> {
        let path = format!("/mining/task/check/{}", task_key);
        let result = self
            .request(credential, Method::GET, &path, None, &[])
            .await;
        action_outcome(result, |body| flag_outcome(&body, task_key))
    }

    async fn request(
        &self,
        credential: &Credential,
        method: Method,
        path: &str,
        payload: Option<Value>,
        already_done_statuses: &[u16],
    ) -> Result<Value, ApiError> {
        let client = self
            .clients
            .client_for(credential.proxy.as_deref(), &credential.user_agent)
            .map_err(ApiError::Unclassified)?;

        let url = format!("{}{}", self.base_url, path);
        let mut builder = client
            .request(method, &url)
            .header(header::AUTHORIZATION, format!("initData {}", credential.token));
        if let Some(payload) = payload {
            builder = builder.json(&payload);
        }

        let response = builder
            .send()
            .await
            .map_err(|e| classify_transport_error(&e))?;

        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| classify_transport_error(&e))?;

        if !status.is_success() {
            return Err(classify_status(status, &text, already_done_statuses));
        }
        if text.trim().is_empty() {
            return Ok(Value::Null);
        }
        serde_json::from_str(&text)
            .map_err(|e| ApiError::Unclassified(format!("invalid JSON from {}: {}", path, e)))
    }
}

fn decode<T: DeserializeOwned>(body: Value, endpoint: &str) -> Result<T, ApiError> {
    serde_json::from_value(body)
        .map_err(|e| ApiError::Unclassified(format!("unexpected {} response: {}", endpoint, e)))
}

fn action_outcome(
    result: Result<Value, ApiError>,
    on_success: impl FnOnce(Value) -> ActionOutcome,
) -> Result<ActionOutcome, ApiError> {
    match result {
        Ok(body) => Ok(on_success(body)),
        Err(ApiError::AlreadyDone { .. }) => Ok(ActionOutcome::AlreadyApplied),
        Err(e) => Err(e),
    }
}
