// Pipeline processing: unification of adapter output, then cleaning

pub mod clean;
pub mod unify;

pub use clean::{CleaningConfig, DataCleaner, MissingValueStrategy, TableSummary};
pub use unify::{ComponentUnifier, ExtractionPhase};
