use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use stockroom_core::{DomainError, DomainResult, Entity, MaterialId};

/// Default "low" threshold for newly registered materials.
pub const DEFAULT_ALERT_THRESHOLD: u64 = 15;
/// Default "critical" threshold for newly registered materials.
pub const DEFAULT_CRITICAL_THRESHOLD: u64 = 5;

/// Alert thresholds of a material. `critical <= alert` always holds.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Thresholds {
    #[serde(rename = "alert_threshold")]
    alert: u64,
    #[serde(rename = "critical_threshold")]
    critical: u64,
}

impl Thresholds {
    pub fn new(alert: u64, critical: u64) -> DomainResult<Self> {
        if critical > alert {
            return Err(DomainError::validation(format!(
                "critical threshold ({critical}) cannot exceed alert threshold ({alert})"
            )));
        }
        Ok(Self { alert, critical })
    }

    pub fn alert(&self) -> u64 {
        self.alert
    }

    pub fn critical(&self) -> u64 {
        self.critical
    }
}

impl Default for Thresholds {
    fn default() -> Self {
        Self {
            alert: DEFAULT_ALERT_THRESHOLD,
            critical: DEFAULT_CRITICAL_THRESHOLD,
        }
    }
}

/// Derived stock alert level. Never stored.
///
/// Variants are declared from healthiest to most severe so `Ord` reads as
/// severity.
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StockLevel {
    Normal,
    Bas,
    Critique,
}

impl StockLevel {
    pub fn classify(quantity: u64, thresholds: Thresholds) -> Self {
        if quantity <= thresholds.critical {
            StockLevel::Critique
        } else if quantity <= thresholds.alert {
            StockLevel::Bas
        } else {
            StockLevel::Normal
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            StockLevel::Normal => "normal",
            StockLevel::Bas => "bas",
            StockLevel::Critique => "critique",
        }
    }
}

impl core::fmt::Display for StockLevel {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A stock ledger row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Material {
    id: MaterialId,
    name: String,
    quantity: u64,
    /// Minor currency units (cents).
    unit_price: u64,
    #[serde(flatten)]
    thresholds: Thresholds,
    category: String,
    location: String,
    created_at: DateTime<Utc>,
}

impl Entity for Material {
    type Id = MaterialId;

    fn id(&self) -> &Self::Id {
        &self.id
    }
}

impl Material {
    pub fn material_id(&self) -> &MaterialId {
        &self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn quantity(&self) -> u64 {
        self.quantity
    }

    pub fn unit_price(&self) -> u64 {
        self.unit_price
    }

    pub fn thresholds(&self) -> Thresholds {
        self.thresholds
    }

    pub fn category(&self) -> &str {
        &self.category
    }

    pub fn location(&self) -> &str {
        &self.location
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn level(&self) -> StockLevel {
        StockLevel::classify(self.quantity, self.thresholds)
    }

    /// Whether `amount` can be withdrawn without going negative.
    pub fn can_withdraw(&self, amount: u64) -> bool {
        self.quantity >= amount
    }

    /// Remove `amount` units. Fails (and leaves the row untouched) when stock is short.
    pub fn withdraw(&mut self, amount: u64) -> DomainResult<()> {
        let remaining = self.quantity.checked_sub(amount).ok_or_else(|| {
            DomainError::invariant(format!(
                "stock cannot go negative ({}: have {}, need {amount})",
                self.id, self.quantity
            ))
        })?;
        self.quantity = remaining;
        Ok(())
    }

    /// Add `amount` units.
    pub fn restock(&mut self, amount: u64) -> DomainResult<()> {
        if amount == 0 {
            return Err(DomainError::validation("restock amount must be positive"));
        }
        self.quantity = self
            .quantity
            .checked_add(amount)
            .ok_or_else(|| DomainError::invariant("stock quantity overflow"))?;
        Ok(())
    }

    /// Apply descriptive changes. Quantity is not patchable.
    pub fn apply_patch(&mut self, patch: &MaterialPatch) -> DomainResult<()> {
        if patch.is_empty() {
            return Err(DomainError::validation("nothing to update"));
        }
        // Validate everything before touching the row.
        let mut next = self.clone();
        if let Some(name) = &patch.name {
            next.name = non_blank("name", name)?;
        }
        let alert = patch.alert_threshold.unwrap_or(self.thresholds.alert);
        let critical = patch.critical_threshold.unwrap_or(self.thresholds.critical);
        next.thresholds = Thresholds::new(alert, critical)?;
        if let Some(price) = patch.unit_price {
            next.unit_price = price;
        }
        if let Some(category) = &patch.category {
            next.category = category.trim().to_string();
        }
        if let Some(location) = &patch.location {
            next.location = location.trim().to_string();
        }
        *self = next;
        Ok(())
    }
}

/// Registration payload for a new material.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewMaterial {
    #[serde(default)]
    pub id: Option<MaterialId>,
    pub name: String,
    #[serde(default)]
    pub quantity: u64,
    #[serde(default)]
    pub unit_price: u64,
    #[serde(default)]
    pub alert_threshold: Option<u64>,
    #[serde(default)]
    pub critical_threshold: Option<u64>,
    #[serde(default)]
    pub category: String,
    #[serde(default)]
    pub location: String,
}

impl NewMaterial {
    pub fn new(name: impl Into<String>, quantity: u64) -> Self {
        Self {
            id: None,
            name: name.into(),
            quantity,
            unit_price: 0,
            alert_threshold: None,
            critical_threshold: None,
            category: String::new(),
            location: String::new(),
        }
    }

    pub fn with_id(mut self, id: MaterialId) -> Self {
        self.id = Some(id);
        self
    }

    pub fn with_unit_price(mut self, unit_price: u64) -> Self {
        self.unit_price = unit_price;
        self
    }

    pub fn with_thresholds(mut self, alert: u64, critical: u64) -> Self {
        self.alert_threshold = Some(alert);
        self.critical_threshold = Some(critical);
        self
    }

    pub fn with_category(mut self, category: impl Into<String>) -> Self {
        self.category = category.into();
        self
    }

    pub fn with_location(mut self, location: impl Into<String>) -> Self {
        self.location = location.into();
        self
    }

    /// Validate and build the ledger row.
    pub fn into_material(self, created_at: DateTime<Utc>) -> DomainResult<Material> {
        let defaults = Thresholds::default();
        let alert = self.alert_threshold.unwrap_or(defaults.alert);
        let critical = self
            .critical_threshold
            .unwrap_or_else(|| defaults.critical.min(alert));
        Ok(Material {
            id: self.id.unwrap_or_else(MaterialId::generate),
            name: non_blank("name", &self.name)?,
            quantity: self.quantity,
            unit_price: self.unit_price,
            thresholds: Thresholds::new(alert, critical)?,
            category: self.category.trim().to_string(),
            location: self.location.trim().to_string(),
            created_at,
        })
    }
}

/// Partial update of a material's descriptive fields.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MaterialPatch {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub unit_price: Option<u64>,
    #[serde(default)]
    pub alert_threshold: Option<u64>,
    #[serde(default)]
    pub critical_threshold: Option<u64>,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub location: Option<String>,
}

impl MaterialPatch {
    pub fn is_empty(&self) -> bool {
        self.name.is_none()
            && self.unit_price.is_none()
            && self.alert_threshold.is_none()
            && self.critical_threshold.is_none()
            && self.category.is_none()
            && self.location.is_none()
    }
}

fn non_blank(field: &str, value: &str) -> DomainResult<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(DomainError::validation(format!("{field} cannot be empty")));
    }
    Ok(trimmed.to_string())
}
