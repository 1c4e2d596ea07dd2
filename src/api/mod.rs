pub mod client;
pub mod errors;
pub mod http;
pub mod types;

pub use client::GameApiClient;
pub use errors::ApiError;
pub use types::{ActionOutcome, Boost, MiningStatus, PaintOutcome, PixelDetails, UserProfile};
