// Application layer: use cases and the ports they depend on

pub mod extract_use_case;
pub mod interaction_use_case;
pub mod ports;

pub use extract_use_case::{DashboardExtractor, ExtractionRequest};
pub use interaction_use_case::InteractiveStateMerger;
