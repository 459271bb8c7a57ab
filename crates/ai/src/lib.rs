//! `stockroom-ai`
//!
//! **Responsibility:** reorder forecasting boundary.
//!
//! Despite the name, nothing here is learned: the reorder signal is a
//! deterministic moving-average heuristic over monthly usage. This crate:
//! - must not depend on the ledger or history storage,
//! - must not mutate domain state,
//! - returns predictions, not domain events.

pub mod job;
pub mod reorder;
pub mod result;

pub use job::AiJob;
pub use reorder::{Confidence, ReorderInput, ReorderJob, ReorderPrediction, DEFAULT_CV_BOUND};
pub use result::AiError;
