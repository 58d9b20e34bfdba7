//! Statistical analyses over a harmonized dataset

pub mod bootstrap;
pub mod engine;
pub mod hypotheses;
pub mod psychometrics;

pub use engine::AnalysisEngine;
