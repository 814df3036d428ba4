// Dashboard processing pipeline: unification and cleaning

pub mod processing;
