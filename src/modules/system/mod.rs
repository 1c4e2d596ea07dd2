pub mod account_context;
pub mod config;
pub mod logger;
pub mod scheduler;
pub mod validation;
