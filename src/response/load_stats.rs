//! # Estatísticas de Carga
//!
//! Cada chamada feita por um worker vira um `LoadResponse` (status +
//! tempo em microssegundos). Ao final, a sequência inteira é reduzida
//! uma única vez num `LoadStatistics`.
//!
//! ## Para todos entenderem:
//!
//! | Chave              | Significado                                  |
//! |--------------------|----------------------------------------------|
//! | `Total-Call`       | Quantas chamadas foram feitas                |
//! | `Total-Succeeded`  | Quantas voltaram com status 200              |
//! | `Total-Lost`       | Quantas falharam sem resposta (status -1)    |
//! | `Success-Percent`  | Sucessos / total * 100                       |
//! | `Average-TTL-Ms`   | Latência média (só chamadas com sucesso)     |
//! | `Maximum-TTL-Ms`   | Maior latência (só sucesso)                  |
//! | `Minimum-TTL-Ms`   | Menor latência (só sucesso)                  |
//! | `P50/P95/P99-TTL-Ms` | Percentis de latência (só sucesso)         |
//!
//! Se nenhuma chamada teve sucesso, todas as latências valem `0.0`.

use hdrhistogram::Histogram;
use serde::Serialize;
use serde_json::Value;
use std::fmt;

/// Status recorded for a call that never produced a response.
pub const LOST_STATUS: i32 = -1;

/// One load-mode iteration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoadResponse {
    pub status_code: i32,
    /// Wall-clock time of the call in microseconds, `-1` when lost.
    pub elapsed_micros: i64,
}

impl LoadResponse {
    pub fn new(status_code: u16, elapsed_micros: i64) -> Self {
        Self {
            status_code: i32::from(status_code),
            elapsed_micros,
        }
    }

    pub fn lost() -> Self {
        Self {
            status_code: LOST_STATUS,
            elapsed_micros: -1,
        }
    }

    pub fn is_success(&self) -> bool {
        self.status_code == 200
    }

    pub fn is_lost(&self) -> bool {
        self.status_code == LOST_STATUS
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LoadValueType {
    TotalCall,
    TotalSucceeded,
    TotalLost,
    SuccessPercent,
    AverageTtlMs,
    MaximumTtlMs,
    MinimumTtlMs,
    P50TtlMs,
    P95TtlMs,
    P99TtlMs,
}

impl LoadValueType {
    pub const ALL: [LoadValueType; 10] = [
        Self::TotalCall,
        Self::TotalSucceeded,
        Self::TotalLost,
        Self::SuccessPercent,
        Self::AverageTtlMs,
        Self::MaximumTtlMs,
        Self::MinimumTtlMs,
        Self::P50TtlMs,
        Self::P95TtlMs,
        Self::P99TtlMs,
    ];

    pub fn key(&self) -> &'static str {
        match self {
            Self::TotalCall => "Total-Call",
            Self::TotalSucceeded => "Total-Succeeded",
            Self::TotalLost => "Total-Lost",
            Self::SuccessPercent => "Success-Percent",
            Self::AverageTtlMs => "Average-TTL-Ms",
            Self::MaximumTtlMs => "Maximum-TTL-Ms",
            Self::MinimumTtlMs => "Minimum-TTL-Ms",
            Self::P50TtlMs => "P50-TTL-Ms",
            Self::P95TtlMs => "P95-TTL-Ms",
            Self::P99TtlMs => "P99-TTL-Ms",
        }
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            Self::TotalCall => "total call",
            Self::TotalSucceeded => "total succeeded",
            Self::TotalLost => "total lost",
            Self::SuccessPercent => "success percent",
            Self::AverageTtlMs => "average ttl ms",
            Self::MaximumTtlMs => "maximum ttl ms",
            Self::MinimumTtlMs => "minimum ttl ms",
            Self::P50TtlMs => "p50 ttl ms",
            Self::P95TtlMs => "p95 ttl ms",
            Self::P99TtlMs => "p99 ttl ms",
        }
    }

    /// Case-insensitive lookup by key.
    pub fn from_key(key: &str) -> Option<Self> {
        let key = key.trim();
        Self::ALL
            .into_iter()
            .find(|value| value.key().eq_ignore_ascii_case(key))
    }
}

impl fmt::Display for LoadValueType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

/// Aggregates of one load run.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct LoadStatistics {
    pub total_calls: u64,
    pub total_succeeded: u64,
    pub total_lost: u64,
    pub success_percent: f64,
    pub average_ms: f64,
    pub maximum_ms: f64,
    pub minimum_ms: f64,
    pub p50_ms: f64,
    pub p95_ms: f64,
    pub p99_ms: f64,
}

impl LoadStatistics {
    /// `None` for an empty sequence (no load run happened).
    pub fn compute(responses: &[LoadResponse]) -> Option<Self> {
        if responses.is_empty() {
            return None;
        }

        let successes: Vec<i64> = responses
            .iter()
            .filter(|r| r.is_success())
            .map(|r| r.elapsed_micros.max(0))
            .collect();

        let total_calls = responses.len() as u64;
        let total_succeeded = successes.len() as u64;
        let total_lost = responses.iter().filter(|r| r.is_lost()).count() as u64;

        let mut stats = Self {
            total_calls,
            total_succeeded,
            total_lost,
            success_percent: total_succeeded as f64 * 100.0 / total_calls as f64,
            ..Self::default()
        };

        if successes.is_empty() {
            return Some(stats);
        }

        let sum: i128 = successes.iter().map(|m| i128::from(*m)).sum();
        stats.average_ms = micros_to_ms(sum as f64 / successes.len() as f64);
        stats.minimum_ms = successes.iter().min().map_or(0.0, |m| micros_to_ms(*m as f64));
        stats.maximum_ms = successes.iter().max().map_or(0.0, |m| micros_to_ms(*m as f64));

        if let Some(histogram) = latency_histogram(&successes) {
            stats.p50_ms = micros_to_ms(histogram.value_at_quantile(0.50) as f64);
            stats.p95_ms = micros_to_ms(histogram.value_at_quantile(0.95) as f64);
            stats.p99_ms = micros_to_ms(histogram.value_at_quantile(0.99) as f64);
        }

        Some(stats)
    }

    pub fn get(&self, value: LoadValueType) -> f64 {
        match value {
            LoadValueType::TotalCall => self.total_calls as f64,
            LoadValueType::TotalSucceeded => self.total_succeeded as f64,
            LoadValueType::TotalLost => self.total_lost as f64,
            LoadValueType::SuccessPercent => self.success_percent,
            LoadValueType::AverageTtlMs => self.average_ms,
            LoadValueType::MaximumTtlMs => self.maximum_ms,
            LoadValueType::MinimumTtlMs => self.minimum_ms,
            LoadValueType::P50TtlMs => self.p50_ms,
            LoadValueType::P95TtlMs => self.p95_ms,
            LoadValueType::P99TtlMs => self.p99_ms,
        }
    }

    /// Value by key (`"Average-TTL-Ms"`, case-insensitive). Unknown keys read as `0.0`.
    pub fn value(&self, key: &str) -> f64 {
        LoadValueType::from_key(key).map_or(0.0, |value| self.get(value))
    }

    /// Every statistic in declaration order.
    pub fn entries(&self) -> Vec<(LoadValueType, f64)> {
        LoadValueType::ALL
            .into_iter()
            .map(|value| (value, self.get(value)))
            .collect()
    }

    /// Report form, one field per statistic (`total_calls`, `p95_ms`, ...).
    pub fn to_json(&self) -> Value {
        serde_json::to_value(self).unwrap_or_default()
    }
}

fn micros_to_ms(micros: f64) -> f64 {
    micros / 1_000.0
}

// 1 µs .. 1 h, 3 significant digits.
fn latency_histogram(samples: &[i64]) -> Option<Histogram<u64>> {
    let mut histogram = Histogram::<u64>::new_with_bounds(1, 3_600_000_000, 3).ok()?;
    for sample in samples {
        histogram.saturating_record(u64::try_from(*sample).unwrap_or(0).max(1));
    }
    Some(histogram)
}
