pub mod actions;
pub mod credentials;
pub mod painting;
pub mod retry;
pub mod system;
