pub mod account;
pub mod config;
pub mod template;

pub use account::{AccountRecord, Credential};
pub use config::{
    AppConfig, CellOrder, PaintingConfig, RenewalConfig, RetryConfig, TemplateAssignmentMode,
};
pub use template::{BoundingBox, ColorSource, TargetCell, Template};
