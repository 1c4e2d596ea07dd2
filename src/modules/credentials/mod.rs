pub mod pools;
pub mod renewer;
pub mod store;

pub use renewer::{renewer_from_config, CommandRenewer, CredentialRenewer, ReloadRenewer};
pub use store::CredentialStore;
