/// Utility modules for error handling, validation and feature scaling
pub mod error;
pub mod scaling;
pub mod validate;

// Re-export commonly used types
pub use error::OutlierError;
pub use scaling::{min_max_scale, scale_features, standard_scale, ScalingMethod};
pub use validate::{validate_features, validate_threshold};
