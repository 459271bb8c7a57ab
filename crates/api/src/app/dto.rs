use std::fmt;

use serde::de::{self, MapAccess, SeqAccess, Visitor};
use serde::{Deserialize, Deserializer, Serialize};

use stockroom_ai::ReorderPrediction;
use stockroom_core::{MaterialId, PersonId};
use stockroom_infra::StaffRole;
use stockroom_infra::projections::{MaterialUsage, MonthKey, MonthlyBucket};
use stockroom_inventory::{Material, StockLevel};

// -------------------------
// Request DTOs
// -------------------------

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    #[serde(default)]
    pub username: Option<String>,
    pub password: String,
}

/// Body of `POST /requests`.
///
/// `materials` is either a JSON object `{ "<material id>": quantity, ... }`
/// (key order is the request order) or a list of
/// `{ "material_id": ..., "quantity": ... }`.
#[derive(Debug, Deserialize)]
pub struct SubmitRequest {
    pub supervisor_id: PersonId,
    pub agent1_id: PersonId,
    pub agent2_id: PersonId,
    pub materials: RequestedMaterials,
    #[serde(default)]
    pub note: Option<String>,
}

/// Requested quantities in submission order.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct RequestedMaterials(pub Vec<(MaterialId, u64)>);

#[derive(Deserialize)]
struct LineDto {
    material_id: MaterialId,
    quantity: u64,
}

impl<'de> Deserialize<'de> for RequestedMaterials {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct LinesVisitor;

        impl<'de> Visitor<'de> for LinesVisitor {
            type Value = RequestedMaterials;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("a map of material id to quantity, or a list of lines")
            }

            fn visit_map<A: MapAccess<'de>>(self, mut map: A) -> Result<Self::Value, A::Error> {
                let mut lines = Vec::with_capacity(map.size_hint().unwrap_or(0));
                while let Some((key, quantity)) = map.next_entry::<String, u64>()? {
                    let id = key.parse::<MaterialId>().map_err(de::Error::custom)?;
                    lines.push((id, quantity));
                }
                Ok(RequestedMaterials(lines))
            }

            fn visit_seq<A: SeqAccess<'de>>(self, mut seq: A) -> Result<Self::Value, A::Error> {
                let mut lines = Vec::with_capacity(seq.size_hint().unwrap_or(0));
                while let Some(line) = seq.next_element::<LineDto>()? {
                    lines.push((line.material_id, line.quantity));
                }
                Ok(RequestedMaterials(lines))
            }
        }

        deserializer.deserialize_any(LinesVisitor)
    }
}

#[derive(Debug, Deserialize)]
pub struct RestockRequest {
    pub quantity: u64,
}

#[derive(Debug, Default, Deserialize)]
pub struct HistoryQuery {
    pub limit: Option<usize>,
}

#[derive(Debug, Default, Deserialize)]
pub struct TrendsQuery {
    pub top: Option<usize>,
}

#[derive(Debug, Default, Deserialize)]
pub struct StaffQuery {
    pub role: Option<StaffRole>,
}

// -------------------------
// Response DTOs
// -------------------------

#[derive(Debug, Serialize)]
pub struct LoginResponse {
    pub status: &'static str,
    pub role: &'static str,
    pub token: String,
}

/// A material with its derived alert level.
#[derive(Debug, Serialize)]
pub struct MaterialView<'a> {
    #[serde(flatten)]
    pub material: &'a Material,
    pub level: StockLevel,
}

impl<'a> From<&'a Material> for MaterialView<'a> {
    fn from(material: &'a Material) -> Self {
        Self {
            material,
            level: material.level(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct TrendsResponse {
    pub monthly_trends: std::collections::BTreeMap<MonthKey, MonthlyBucket>,
    pub top_materials: Vec<MaterialUsage>,
}

#[derive(Debug, Serialize)]
pub struct PredictionResponse<'a> {
    #[serde(flatten)]
    pub prediction: &'a ReorderPrediction,
    pub current_quantity: u64,
    pub alert_threshold: u64,
    pub monthly_usage: Vec<u64>,
}
