//! Attention sample aggregation
//!
//! Reduces the samples of one monitoring session to a single [`Percent`],
//! or takes the client's own average when it sent one.

use serde_json::Value;
use thiserror::Error;

use super::scale::Percent;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum ScoreParseError {
    #[error("expected a number, got {0}")]
    NotNumeric(String),

    #[error("score is not finite")]
    NotFinite,
}

/// Strict-ish numeric coercion for client supplied scores.
///
/// Accepts JSON numbers and numeric strings (`"72"`, `" 0.8 "`).
pub fn parse_score(value: &Value) -> Result<f64, ScoreParseError> {
    let parsed = match value {
        Value::Number(n) => n.as_f64().ok_or_else(|| ScoreParseError::NotNumeric(n.to_string()))?,
        Value::String(s) => s
            .trim()
            .parse::<f64>()
            .map_err(|_| ScoreParseError::NotNumeric(format!("{s:?}")))?,
        other => return Err(ScoreParseError::NotNumeric(other.to_string())),
    };

    if !parsed.is_finite() {
        return Err(ScoreParseError::NotFinite);
    }
    Ok(parsed)
}

/// Client supplied session average, in the encoding it arrived in.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum AverageOverride {
    /// 0..100, already weighted by time attentive
    TimeAdjusted(f64),
    /// 0..100 plain average
    Percent(f64),
    /// 0..1 attention fraction
    Fraction(f64),
}

impl AverageOverride {
    pub fn to_percent(self) -> Percent {
        match self {
            Self::TimeAdjusted(v) | Self::Percent(v) => Percent::new(v),
            Self::Fraction(v) => Percent::from_fraction(v),
        }
    }
}

/// Raw override fields as received, before coercion.
#[derive(Debug, Default, Clone, Copy)]
pub struct OverrideFields<'a> {
    pub time_adjusted_avg: Option<&'a Value>,
    pub average_score_100: Option<&'a Value>,
    pub average_score: Option<&'a Value>,
}

impl OverrideFields<'_> {
    /// First usable field in priority order: time-adjusted, 0..100, 0..1.
    ///
    /// A present field that fails to parse is skipped and the next one tried.
    pub fn resolve(&self) -> Option<AverageOverride> {
        let candidates: [(Option<&Value>, fn(f64) -> AverageOverride, &str); 3] = [
            (self.time_adjusted_avg, AverageOverride::TimeAdjusted, "time_adjusted_avg"),
            (self.average_score_100, AverageOverride::Percent, "average_score_100"),
            (self.average_score, AverageOverride::Fraction, "average_score"),
        ];

        for (raw, build, field) in candidates {
            let Some(raw) = raw.filter(|v| !v.is_null()) else {
                continue;
            };
            match parse_score(raw) {
                Ok(v) => return Some(build(v)),
                Err(e) => tracing::warn!("Ignoring {}: {}", field, e),
            }
        }
        None
    }
}

/// Running aggregate of the samples recorded in one session.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AttentionAggregator {
    sum: f64,
    count: u64,
    absent: u64,
}

impl AttentionAggregator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, score: f64, absent: bool) {
        if !score.is_finite() {
            return;
        }
        self.sum += score;
        self.count += 1;
        if absent {
            self.absent += 1;
        }
    }

    pub fn count(&self) -> u64 {
        self.count
    }

    pub fn absent_count(&self) -> u64 {
        self.absent
    }

    /// Arithmetic mean on the 0..100 scale, `None` without samples.
    pub fn mean(&self) -> Option<f64> {
        (self.count > 0).then(|| self.sum / self.count as f64)
    }

    /// Final session average: the override when present, otherwise the
    /// sample mean, otherwise zero.
    pub fn finalize(&self, average: Option<AverageOverride>) -> Percent {
        match average {
            Some(o) => o.to_percent(),
            None => self.mean().map(Percent::new).unwrap_or(Percent::ZERO),
        }
    }
}

impl FromIterator<(f64, bool)> for AttentionAggregator {
    fn from_iter<I: IntoIterator<Item = (f64, bool)>>(iter: I) -> Self {
        let mut agg = Self::new();
        for (score, absent) in iter {
            agg.record(score, absent);
        }
        agg
    }
}
