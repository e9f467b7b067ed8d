use crate::record::{ErrorMap, SessionRecord};
use itertools::Itertools;
use serde::Serialize;
use std::collections::HashMap;

/// Errors in the running session count this much more than historical ones
pub const CURRENT_SESSION_WEIGHT: f64 = 1.2;

/// Whitespace misses are real but make poor drill material
pub const WHITESPACE_FACTOR: f64 = 0.4;

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Suggestion {
    pub character: char,
    pub score: f64,
}

fn is_drill_whitespace(c: char) -> bool {
    matches!(c, ' ' | '\t' | '\n')
}

/// Rank characters by how much practice they need.
///
/// Ties are broken by character code, ascending.
pub fn rank(history: &[SessionRecord], current: &ErrorMap, max: usize) -> Vec<Suggestion> {
    let mut aggregate: HashMap<char, f64> = HashMap::new();

    for record in history {
        for (&c, &count) in record.error_map() {
            *aggregate.entry(c).or_insert(0.0) += count as f64;
        }
    }
    for (&c, &count) in current {
        *aggregate.entry(c).or_insert(0.0) += count as f64 * CURRENT_SESSION_WEIGHT;
    }

    aggregate
        .into_iter()
        .map(|(character, score)| {
            let factor = if is_drill_whitespace(character) {
                WHITESPACE_FACTOR
            } else {
                1.0
            };
            Suggestion {
                character,
                score: score * factor,
            }
        })
        .filter(|s| s.score > 0.0)
        .sorted_by(|a, b| {
            b.score
                .total_cmp(&a.score)
                .then_with(|| a.character.cmp(&b.character))
        })
        .take(max)
        .collect()
}
