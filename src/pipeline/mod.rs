// Data pipeline: row processing, cleaning runs and storage

pub mod cleaning;
pub mod processing;
pub mod storage;

pub use cleaning::{CleaningPipeline, CleaningReport, RejectedRow};
