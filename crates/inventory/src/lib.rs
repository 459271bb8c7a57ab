//! Inventory domain module.
//!
//! This crate contains business rules for materials, withdrawal requests and
//! committed history, implemented purely as deterministic domain logic (no IO,
//! no HTTP, no storage, no locking).

pub mod history;
pub mod material;
pub mod request;

pub use history::{HistoryDraft, HistoryLine, HistoryRecord};
pub use material::{Material, MaterialPatch, NewMaterial, StockLevel, Thresholds};
pub use request::{PersonRef, RequestLine, Requester, WithdrawalRequest};
