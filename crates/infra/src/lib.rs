//! Infrastructure layer: stock ledger, reservation engine, history, trend
//! projection, background workers, configuration.

pub mod alerts;
pub mod config;
pub mod history;
pub mod ledger;
pub mod projections;
pub mod read_model;
pub mod reservation;
pub mod seed;
pub mod staff;
pub mod workers;

pub use alerts::{StockAlert, stock_alerts};
pub use config::{AppConfig, ConfigError, EngineConfig, LogFormat, NotifyConfig, PredictorConfig};
pub use history::{HistoryError, HistoryLog, InMemoryHistoryLog};
pub use ledger::{DebitOutcome, LedgerError, LedgerTxn, LevelChange, StockLedger};
pub use reservation::{HISTORY_STREAM, HistoryEnvelope, ReservationEngine, ReservationError};
pub use staff::{NewStaffMember, StaffDirectory, StaffError, StaffMember, StaffRole};
