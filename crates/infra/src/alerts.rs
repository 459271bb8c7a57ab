//! Stock alerts: ledger levels combined with reorder predictions.

use serde::Serialize;
use tracing::warn;

use stockroom_ai::ReorderPrediction;
use stockroom_inventory::{Material, StockLevel};

use crate::projections::TrendProjection;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StockAlert {
    pub material: Material,
    pub level: StockLevel,
    pub prediction: Option<ReorderPrediction>,
}

/// Every material with its level and reorder prediction.
///
/// Most severe first, then by material id.
pub fn stock_alerts(materials: impl IntoIterator<Item = Material>, trends: &TrendProjection) -> Vec<StockAlert> {
    let mut alerts: Vec<StockAlert> = materials
        .into_iter()
        .map(|material| {
            let prediction = trends
                .predict(&material)
                .inspect_err(|e| warn!(material = %material.material_id(), error = %e, "prediction unavailable"))
                .ok();
            StockAlert {
                level: material.level(),
                material,
                prediction,
            }
        })
        .collect();

    alerts.sort_by(|a, b| {
        b.level
            .cmp(&a.level)
            .then_with(|| a.material.material_id().cmp(b.material.material_id()))
    });
    alerts
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use stockroom_inventory::NewMaterial;

    fn material(id: &str, qty: u64) -> Material {
        NewMaterial::new(id, qty)
            .with_id(id.parse().unwrap())
            .with_thresholds(20, 10)
            .into_material(Utc::now())
            .unwrap()
    }

    #[test]
    fn alerts_are_ordered_by_severity_then_id() {
        let trends = TrendProjection::default();
        let alerts = stock_alerts(
            vec![material("ok", 100), material("low-b", 15), material("crit", 3), material("low-a", 12)],
            &trends,
        );
        let ids: Vec<String> = alerts.iter().map(|a| a.material.material_id().to_string()).collect();
        assert_eq!(ids, vec!["crit", "low-a", "low-b", "ok"]);
        assert_eq!(alerts[0].level, StockLevel::Critique);
        assert_eq!(alerts[3].level, StockLevel::Normal);
        assert!(alerts.iter().all(|a| a.prediction.is_some()));
    }

    #[test]
    fn normal_materials_are_listed() {
        let trends = TrendProjection::default();
        let alerts = stock_alerts(vec![material("plenty", 100)], &trends);
        assert_eq!(alerts.len(), 1);
        assert_eq!(alerts[0].level, StockLevel::Normal);
        assert!(!alerts[0].prediction.as_ref().unwrap().should_reorder);
    }
}
