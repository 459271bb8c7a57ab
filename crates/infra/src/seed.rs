//! Startup seed: a JSON array of materials to register.

use std::path::Path;

use thiserror::Error;
use tracing::{info, warn};

use stockroom_events::EventBus;
use stockroom_inventory::NewMaterial;

use crate::history::HistoryLog;
use crate::reservation::{HistoryEnvelope, ReservationEngine, ReservationError};

#[derive(Debug, Error)]
pub enum SeedError {
    #[error("failed to read seed file {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse seed file {path}: {source}")]
    Parse {
        path: String,
        #[source]
        source: serde_json::Error,
    },
}

pub fn load_seed(path: &Path) -> Result<Vec<NewMaterial>, SeedError> {
    let raw = std::fs::read_to_string(path).map_err(|source| SeedError::Io {
        path: path.display().to_string(),
        source,
    })?;
    parse_seed(&raw).map_err(|source| SeedError::Parse {
        path: path.display().to_string(),
        source,
    })
}

pub fn parse_seed(raw: &str) -> Result<Vec<NewMaterial>, serde_json::Error> {
    serde_json::from_str(raw)
}

/// Register every seed entry; rejected entries are logged and skipped.
/// Returns how many were registered.
pub async fn apply_seed<H, B>(engine: &ReservationEngine<H, B>, materials: Vec<NewMaterial>) -> usize
where
    H: HistoryLog,
    B: EventBus<HistoryEnvelope>,
{
    let mut registered = 0;
    for new in materials {
        let name = new.name.clone();
        match engine.register_material(new).await {
            Ok(_) => registered += 1,
            Err(ReservationError::Duplicate(id)) => warn!(material = %id, "seed material already present"),
            Err(e) => warn!(name = %name, error = %e, "seed material rejected"),
        }
    }
    info!(registered, "seed applied");
    registered
}
