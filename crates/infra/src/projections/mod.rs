//! Read models derived from committed history.
//!
//! Projections are:
//! - **Rebuildable** from the history log
//! - **Idempotent** by record id (safe for at-least-once delivery)

pub mod trends;

pub use trends::{
    ApplyOutcome, MaterialUsage, MonthKey, MonthlyBucket, TrendProjection, TrendProjectionError,
};
