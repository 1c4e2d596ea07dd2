// Classifies remote-call failures once, at the HTTP boundary, so callers only
// ever match on variants.
use reqwest::StatusCode;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ApiError {
    #[error("transient network failure: {0}")]
    TransientNetwork(String),

    #[error("credential rejected (HTTP {status})")]
    AuthExpired { status: u16 },

    #[error("already completed or not eligible (HTTP {status}): {body}")]
    AlreadyDone { status: u16, body: String },

    #[error("not found (HTTP 404)")]
    NotFound,

    #[error("unclassified failure: {0}")]
    Unclassified(String),
}

/// Maps a non-success HTTP status to an [`ApiError`].
///
/// `already_done_statuses` lists extra statuses an endpoint uses to say
/// "nothing to do", on top of 400.
pub fn classify_status(status: StatusCode, body: &str, already_done_statuses: &[u16]) -> ApiError {
    let code = status.as_u16();
    match code {
        401 | 403 => ApiError::AuthExpired { status: code },
        404 => ApiError::NotFound,
        400 => ApiError::AlreadyDone {
            status: code,
            body: truncate_body(body),
        },
        408 | 504 => ApiError::TransientNetwork(format!("HTTP {}", code)),
        _ if already_done_statuses.contains(&code) => ApiError::AlreadyDone {
            status: code,
            body: truncate_body(body),
        },
        _ => ApiError::Unclassified(format!("HTTP {} - {}", code, truncate_body(body))),
    }
}

pub fn classify_transport_error(error: &reqwest::Error) -> ApiError {
    if let Some(status) = error.status() {
        return classify_status(status, "", &[]);
    }
    if error.is_timeout() || error.is_connect() || error.is_request() || error.is_body() {
        ApiError::TransientNetwork(error.to_string())
    } else if error.is_decode() {
        ApiError::Unclassified(format!("undecodable response: {}", error))
    } else {
        ApiError::Unclassified(error.to_string())
    }
}

fn truncate_body(body: &str) -> String {
    const MAX_LEN: usize = 200;
    let trimmed = body.trim();
    if trimmed.len() <= MAX_LEN {
        trimmed.to_string()
    } else {
        let mut end = MAX_LEN;
        while !trimmed.is_char_boundary(end) {
            end -= 1;
        }
        format!("{}...", &trimmed[..end])
    }
}
