pub mod assignment;
pub mod engine;
pub mod palette;
pub mod state;
pub mod target_set;

pub use assignment::TemplateAssignment;
pub use engine::PaintingEngine;
pub use palette::Palette;
pub use state::PassSummary;
pub use target_set::TargetSetBuilder;
