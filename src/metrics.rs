use crate::record::LatencySummary;
use itertools::Itertools;

/// Intervals at or above this are pauses, not latency samples
pub const LATENCY_CEILING_MS: u64 = 5000;

pub const PERCENTILES: [f64; 3] = [0.5, 0.9, 0.99];

pub fn round1(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}

pub fn mean(data: &[f64]) -> Option<f64> {
    let sum = data.iter().sum::<f64>();
    let count = data.len();

    match count {
        positive if positive > 0 => Some(sum / count as f64),
        _ => None,
    }
}

/// Share of keystrokes that were correct, 0..=100 with one decimal.
/// No keystrokes yet counts as perfect.
pub fn accuracy(correct: usize, errors: u32) -> f64 {
    let total = correct as f64 + errors as f64;
    if total == 0.0 {
        return 100.0;
    }
    round1((correct as f64 / total * 100.0).max(0.0))
}

/// Words per minute using five characters per word, measured from session
/// start to the last correct keystroke
pub fn wpm(correct: usize, elapsed_ms: u64) -> u32 {
    if correct == 0 {
        return 0;
    }
    let minutes = elapsed_ms as f64 / 60_000.0;
    let value = (correct as f64 / 5.0) / minutes;
    if value.is_finite() {
        value.round() as u32
    } else {
        0
    }
}

pub fn elapsed_seconds(elapsed_ms: Option<u64>) -> u64 {
    elapsed_ms.map_or(0, |ms| ms / 1000)
}

/// Sample at `floor(p * n)` of an ascending slice, clamped to the last index
pub fn percentile(sorted: &[f64], p: f64) -> Option<f64> {
    if sorted.is_empty() {
        return None;
    }
    let idx = ((p * sorted.len() as f64).floor() as usize).min(sorted.len() - 1);
    Some(sorted[idx])
}

pub fn latency_summary(samples: &[u64]) -> Option<LatencySummary> {
    let sorted = samples
        .iter()
        .map(|&ms| ms as f64)
        .sorted_by(|a, b| a.total_cmp(b))
        .collect::<Vec<f64>>();

    let avg = mean(&sorted)?;
    let [p50, p90, p99] = PERCENTILES.map(|p| percentile(&sorted, p).map_or(0.0, round1));

    Some(LatencySummary {
        count: sorted.len(),
        avg: round1(avg),
        p50,
        p90,
        p99,
    })
}
