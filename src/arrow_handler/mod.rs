pub mod builder;
/// Arrow IPC data processing modules
pub mod parser;

// Re-export commonly used functions
pub use builder::{build_detection_result, build_score_result};
pub use parser::parse_arrow_ipc;
