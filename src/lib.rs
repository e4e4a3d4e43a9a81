pub mod authoring;
pub mod backend;
pub mod compare;
pub mod engine;
pub mod error;
pub mod fixture;
pub mod i18n;
pub mod report;
pub mod types;

// Re-export the localization macros
pub use crate::i18n::{t, t_with_args};

pub use crate::engine::evaluate_standard_compliance;
