use std::collections::BTreeMap;
use std::fmt;
use std::sync::RwLock;

use chrono::{DateTime, Datelike, Utc};
use serde::{Serialize, Serializer};
use thiserror::Error;
use tracing::{debug, warn};

use stockroom_ai::{AiError, AiJob, ReorderInput, ReorderJob, ReorderPrediction};
use stockroom_core::MaterialId;
use stockroom_inventory::{HistoryRecord, Material};

use crate::config::{MIN_WINDOW_MONTHS, PredictorConfig};
use crate::reservation::{HISTORY_STREAM, HistoryEnvelope};

/// Calendar month (UTC) used as the trend bucket key. Displays as `YYYY-MM`.
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct MonthKey {
    year: i32,
    month: u32,
}

impl MonthKey {
    pub fn new(year: i32, month: u32) -> Option<Self> {
        (1..=12).contains(&month).then_some(Self { year, month })
    }

    pub fn of(at: DateTime<Utc>) -> Self {
        Self {
            year: at.year(),
            month: at.month(),
        }
    }

    fn index(self) -> i64 {
        i64::from(self.year) * 12 + i64::from(self.month) - 1
    }

    fn from_index(index: i64) -> Self {
        Self {
            year: index.div_euclid(12) as i32,
            month: index.rem_euclid(12) as u32 + 1,
        }
    }
}

impl fmt::Display for MonthKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:04}-{:02}", self.year, self.month)
    }
}

impl Serialize for MonthKey {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// Committed requests in one month.
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq, Serialize)]
pub struct MonthlyBucket {
    pub count: u64,
    pub total_value: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MaterialUsage {
    pub material_id: MaterialId,
    pub name: String,
    pub cumulative_usage: u64,
}

#[derive(Debug, Error, Clone, PartialEq)]
pub enum TrendProjectionError {
    #[error("unexpected stream '{0}'")]
    WrongStream(String),

    #[error("invalid sequence number 0")]
    ZeroSequence,

    #[error("prediction failed: {0}")]
    Prediction(#[from] AiError),

    #[error("trend state lock poisoned")]
    Poisoned,
}

/// What `apply_envelope` / `record_committed` did with an input.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum ApplyOutcome {
    Applied,
    /// At or below the cursor; already counted.
    Duplicate,
    /// Undecodable payload; logged and stepped over.
    Skipped,
}

#[derive(Debug, Default)]
struct MaterialTrend {
    name: String,
    cumulative: u64,
    first_month: Option<MonthKey>,
    /// Only the months still inside the rolling window are kept.
    monthly: BTreeMap<MonthKey, u64>,
}

#[derive(Debug, Default)]
struct TrendState {
    cursor: u64,
    latest_month: Option<MonthKey>,
    months: BTreeMap<MonthKey, MonthlyBucket>,
    materials: BTreeMap<MaterialId, MaterialTrend>,
}

impl TrendState {
    /// First and last month of the usage window.
    ///
    /// The latest month seen is still in progress, so the window is the
    /// `window` completed months before it.
    fn window_bounds(&self, window: usize) -> Option<(MonthKey, MonthKey)> {
        self.latest_month.map(|latest| {
            (
                MonthKey::from_index(latest.index() - window as i64),
                MonthKey::from_index(latest.index() - 1),
            )
        })
    }

    fn apply(&mut self, record: &HistoryRecord, window: usize) {
        let month = MonthKey::of(record.committed_at);

        let bucket = self.months.entry(month).or_default();
        bucket.count += 1;
        bucket.total_value = bucket.total_value.saturating_add(record.total_value);

        for line in &record.lines {
            let trend = self.materials.entry(line.material_id.clone()).or_default();
            trend.name.clone_from(&line.material_name);
            trend.cumulative = trend.cumulative.saturating_add(line.quantity);
            trend.first_month = Some(trend.first_month.map_or(month, |m| m.min(month)));
            *trend.monthly.entry(month).or_default() += line.quantity;
        }

        if self.latest_month.is_none_or(|latest| month > latest) {
            self.latest_month = Some(month);
            if let Some((start, _)) = self.window_bounds(window) {
                for trend in self.materials.values_mut() {
                    trend.monthly.retain(|m, _| *m >= start);
                }
            }
        }
    }
}

/// Trend & reorder predictor state, fed by committed history.
///
/// Single logical writer (the trend worker); any number of readers.
/// Idempotent by record id: anything at or below the cursor is ignored.
/// The whole state is disposable and rebuilt from the history log on start.
#[derive(Debug)]
pub struct TrendProjection {
    config: PredictorConfig,
    state: RwLock<TrendState>,
}

impl Default for TrendProjection {
    fn default() -> Self {
        Self::new(PredictorConfig::default())
    }
}

impl TrendProjection {
    pub fn new(config: PredictorConfig) -> Self {
        let window_months = config.window_months.max(MIN_WINDOW_MONTHS);
        Self {
            config: PredictorConfig { window_months, ..config },
            state: RwLock::new(TrendState::default()),
        }
    }

    pub fn config(&self) -> &PredictorConfig {
        &self.config
    }

    /// Id of the last history record taken into account (0 if none).
    pub fn cursor(&self) -> u64 {
        self.state.read().map(|s| s.cursor).unwrap_or(0)
    }

    /// Fold one committed record into the aggregates.
    pub fn record_committed(&self, record: &HistoryRecord) -> Result<ApplyOutcome, TrendProjectionError> {
        let seq = record.id.value();
        if seq == 0 {
            return Err(TrendProjectionError::ZeroSequence);
        }

        let mut state = self.state.write().map_err(|_| TrendProjectionError::Poisoned)?;
        if seq <= state.cursor {
            return Ok(ApplyOutcome::Duplicate);
        }
        if seq != state.cursor + 1 {
            warn!(last = state.cursor, found = seq, "gap in history stream; trends may undercount until rebuilt");
        }

        state.apply(record, self.config.window_months);
        state.cursor = seq;
        Ok(ApplyOutcome::Applied)
    }

    /// Apply a history-bus envelope.
    pub fn apply_envelope(&self, envelope: &HistoryEnvelope) -> Result<ApplyOutcome, TrendProjectionError> {
        if envelope.stream() != HISTORY_STREAM {
            return Err(TrendProjectionError::WrongStream(envelope.stream().to_string()));
        }
        let seq = envelope.sequence_number();
        if seq == 0 {
            return Err(TrendProjectionError::ZeroSequence);
        }
        if seq <= self.cursor() {
            return Ok(ApplyOutcome::Duplicate);
        }

        match envelope.decode::<HistoryRecord>() {
            Ok(record) if record.id.value() == seq => self.record_committed(&record),
            Ok(record) => self.skip(seq, &format!("record id {} does not match sequence", record.id)),
            Err(e) => self.skip(seq, &e.to_string()),
        }
    }

    fn skip(&self, seq: u64, reason: &str) -> Result<ApplyOutcome, TrendProjectionError> {
        warn!(sequence = seq, reason, "skipping poisoned history record");
        let mut state = self.state.write().map_err(|_| TrendProjectionError::Poisoned)?;
        if seq > state.cursor {
            state.cursor = seq;
        }
        Ok(ApplyOutcome::Skipped)
    }

    /// Drop all aggregates and replay `records` in id order.
    pub fn rebuild_from_scratch(
        &self,
        records: impl IntoIterator<Item = HistoryRecord>,
    ) -> Result<(), TrendProjectionError> {
        let mut records: Vec<_> = records.into_iter().collect();
        records.sort_by_key(|r| r.id);

        {
            let mut state = self.state.write().map_err(|_| TrendProjectionError::Poisoned)?;
            *state = TrendState::default();
        }
        for record in &records {
            self.record_committed(record)?;
        }
        debug!(records = records.len(), "trend projection rebuilt");
        Ok(())
    }

    /// Month → committed request count and value.
    pub fn monthly_trends(&self) -> BTreeMap<MonthKey, MonthlyBucket> {
        self.state.read().map(|s| s.months.clone()).unwrap_or_default()
    }

    /// Most used materials, descending; ties by material id.
    pub fn top_materials(&self, n: usize) -> Vec<MaterialUsage> {
        let Ok(state) = self.state.read() else {
            return Vec::new();
        };
        let mut all: Vec<MaterialUsage> = state
            .materials
            .iter()
            .map(|(id, t)| MaterialUsage {
                material_id: id.clone(),
                name: t.name.clone(),
                cumulative_usage: t.cumulative,
            })
            .collect();
        all.sort_by(|a, b| {
            b.cumulative_usage
                .cmp(&a.cumulative_usage)
                .then_with(|| a.material_id.cmp(&b.material_id))
        });
        all.truncate(n);
        all
    }

    /// Monthly usage in the rolling window, oldest first, zero-filled.
    ///
    /// Only completed months count: the window ends the month before the
    /// latest month seen in history and starts no earlier than the
    /// material's first withdrawal. Empty until a month has closed.
    pub fn usage_window(&self, id: &MaterialId) -> Vec<u64> {
        let Ok(state) = self.state.read() else {
            return Vec::new();
        };
        let Some((window_start, window_end)) = state.window_bounds(self.config.window_months) else {
            return Vec::new();
        };
        let Some(trend) = state.materials.get(id) else {
            return Vec::new();
        };
        let Some(first) = trend.first_month else {
            return Vec::new();
        };

        let start = window_start.max(first);
        (start.index()..=window_end.index())
            .map(|i| trend.monthly.get(&MonthKey::from_index(i)).copied().unwrap_or(0))
            .collect()
    }

    /// Reorder signal for `material` from its current usage window.
    pub fn predict(&self, material: &Material) -> Result<ReorderPrediction, TrendProjectionError> {
        let input = ReorderInput {
            material_id: material.material_id().clone(),
            monthly_usage: self.usage_window(material.material_id()),
            current_quantity: material.quantity(),
            alert_threshold: material.thresholds().alert(),
        };
        Ok(ReorderJob::new(input).with_cv_bound(self.config.cv_bound).run()?)
    }
}
