use crate::suggest::Suggestion;
use rand::seq::SliceRandom;
use rand::Rng;
use std::collections::HashMap;

const BUILTIN_WORDS: &str = include_str!("../assets/english_200.txt");

/// Share of the highest scoring words that drills are drawn from
const POOL_FRACTION: f64 = 0.3;

/// Builds practice text that leans on the characters a typist misses most
#[derive(Debug, Clone)]
pub struct DrillGenerator {
    words: Vec<String>,
}

impl DrillGenerator {
    pub fn new(words: Vec<String>) -> Self {
        Self { words }
    }

    /// Generator over the embedded English word list
    pub fn builtin() -> Self {
        Self::new(
            BUILTIN_WORDS
                .lines()
                .map(str::trim)
                .filter(|w| !w.is_empty())
                .map(String::from)
                .collect(),
        )
    }

    pub fn words(&self) -> &[String] {
        &self.words
    }

    /// `word_count` words joined by single spaces. Without suggestions the
    /// words are drawn uniformly; otherwise from the top of the word list
    /// ranked by how many weak characters each word exercises.
    pub fn generate<R: Rng + ?Sized>(
        &self,
        suggestions: &[Suggestion],
        word_count: usize,
        rng: &mut R,
    ) -> String {
        if self.words.is_empty() || word_count == 0 {
            return String::new();
        }

        let weights: HashMap<char, f64> = suggestions
            .iter()
            .map(|s| (s.character, s.score))
            .collect();

        let pool: Vec<&String> = if weights.is_empty() {
            self.words.iter().collect()
        } else {
            let mut scored: Vec<(&String, f64)> = self
                .words
                .iter()
                .map(|w| (w, word_score(w, &weights)))
                .collect();
            scored.sort_by(|a, b| b.1.total_cmp(&a.1).then_with(|| a.0.cmp(b.0)));

            let pool_size = ((scored.len() as f64 * POOL_FRACTION) as usize)
                .max(word_count)
                .min(scored.len());
            scored
                .into_iter()
                .take(pool_size)
                .map(|(w, _)| w)
                .collect()
        };

        (0..word_count)
            .filter_map(|_| pool.choose(rng).map(|w| w.as_str()))
            .collect::<Vec<&str>>()
            .join(" ")
    }
}

/// Mean weak-character weight per letter, so long words don't win by length
fn word_score(word: &str, weights: &HashMap<char, f64>) -> f64 {
    let len = word.chars().count();
    if len == 0 {
        return 0.0;
    }
    let total: f64 = word
        .chars()
        .map(|c| {
            let lower = c.to_lowercase().next().unwrap_or(c);
            weights.get(&lower).copied().unwrap_or(0.0)
        })
        .sum();
    total / len as f64
}
