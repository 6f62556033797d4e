// src/patterns/algorithms.rs
//! Building blocks for pattern mining: frequent subsequences, repeating runs,
//! token-set clustering, plus the recency and timing-consistency scores.

use chrono::{DateTime, Utc};
use std::collections::{HashMap, HashSet};

use crate::models::UserInteraction;

// Recency decays per position and fades linearly to zero at this age
const RECENCY_DECAY: f64 = 0.95;
const RECENCY_MAX_AGE_SECS: f64 = 30.0 * 24.0 * 3600.0;

const MAX_MINED_LENGTH: usize = 5;
const MAX_REPEATING_LENGTH: usize = 10;

#[derive(Debug, Clone, PartialEq)]
pub struct FrequentSequence {
    pub items: Vec<String>,
    pub support: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RepeatingSequence {
    pub sequence: Vec<String>,
    pub occurrences: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ValueCluster {
    pub centroid: String,
    pub members: Vec<String>,
    pub cohesion: f64,
}

/// Counts contiguous subsequences of length 2..=5 across all sequences.
pub fn mine_frequent_sequences(sequences: &[Vec<String>], min_support: usize) -> Vec<FrequentSequence> {
    let mut counts: HashMap<Vec<String>, usize> = HashMap::new();

    for sequence in sequences {
        let max_len = sequence.len().min(MAX_MINED_LENGTH);
        for length in 2..=max_len {
            for window in sequence.windows(length) {
                *counts.entry(window.to_vec()).or_insert(0) += 1;
            }
        }
    }

    let mut frequent: Vec<FrequentSequence> = counts
        .into_iter()
        .filter(|(_, support)| *support >= min_support)
        .map(|(items, support)| FrequentSequence { items, support })
        .collect();
    // HashMap order is arbitrary; make output reproducible
    frequent.sort_by(|a, b| b.support.cmp(&a.support).then_with(|| a.items.cmp(&b.items)));
    frequent
}

/// Contiguous runs of length `min_length..=min(n/2, 10)` seen at least `min_occurrences` times.
/// Overlapping occurrences count.
pub fn find_repeating_sequences(
    data: &[String],
    min_length: usize,
    min_occurrences: usize,
) -> Vec<RepeatingSequence> {
    let max_len = (data.len() / 2).min(MAX_REPEATING_LENGTH);
    let mut found = Vec::new();
    let mut seen: HashSet<&[String]> = HashSet::new();

    for length in min_length..=max_len {
        for candidate in data.windows(length) {
            if seen.contains(candidate) {
                continue;
            }
            let occurrences = data.windows(length).filter(|w| *w == candidate).count();
            if occurrences >= min_occurrences {
                seen.insert(candidate);
                found.push(RepeatingSequence {
                    sequence: candidate.to_vec(),
                    occurrences,
                });
            }
        }
    }

    found
}

/// Jaccard similarity of lowercase whitespace tokens. Two empty strings are identical.
pub fn token_similarity(a: &str, b: &str) -> f64 {
    let a_lower = a.to_lowercase();
    let b_lower = b.to_lowercase();
    let set_a: HashSet<&str> = a_lower.split_whitespace().collect();
    let set_b: HashSet<&str> = b_lower.split_whitespace().collect();

    if set_a.is_empty() && set_b.is_empty() {
        return 1.0;
    }

    let intersection = set_a.intersection(&set_b).count();
    let union = set_a.union(&set_b).count();
    intersection as f64 / union as f64
}

impl ValueCluster {
    fn seed(value: &str) -> Self {
        Self {
            centroid: value.to_string(),
            members: vec![value.to_string()],
            cohesion: 0.0,
        }
    }

    /// Most frequent member; earliest member wins ties.
    fn update_centroid(&mut self) {
        let mut counts: HashMap<&str, usize> = HashMap::new();
        for member in &self.members {
            *counts.entry(member.as_str()).or_insert(0) += 1;
        }

        let mut best: Option<(&str, usize)> = None;
        for member in &self.members {
            let count = counts.get(member.as_str()).copied().unwrap_or(0);
            if best.map(|(_, c)| count > c).unwrap_or(true) {
                best = Some((member.as_str(), count));
            }
        }
        if let Some((centroid, _)) = best {
            self.centroid = centroid.to_string();
        }
    }

    fn update_cohesion(&mut self) {
        if self.members.len() <= 1 {
            self.cohesion = 1.0;
            return;
        }

        let mut total = 0.0;
        let mut comparisons = 0usize;
        for i in 0..self.members.len() {
            for j in (i + 1)..self.members.len() {
                total += token_similarity(&self.members[i], &self.members[j]);
                comparisons += 1;
            }
        }
        self.cohesion = total / comparisons as f64;
    }
}

/// Greedy single-pass clustering: each value joins the first cluster whose centroid
/// is at least `threshold` similar, or starts a new one.
pub fn cluster_values(values: &[String], threshold: f64) -> Vec<ValueCluster> {
    let mut clusters: Vec<ValueCluster> = Vec::new();

    for value in values {
        match clusters
            .iter_mut()
            .find(|c| token_similarity(value, &c.centroid) >= threshold)
        {
            Some(cluster) => {
                cluster.members.push(value.clone());
                cluster.update_centroid();
            }
            None => clusters.push(ValueCluster::seed(value)),
        }
    }

    for cluster in &mut clusters {
        cluster.update_cohesion();
    }
    clusters
}

/// Position- and age-weighted recency in [0, 1]. Interactions older than 30 days contribute nothing.
pub fn recency_score(interactions: &[UserInteraction], now: DateTime<Utc>) -> f64 {
    if interactions.is_empty() {
        return 0.0;
    }

    let mut timestamps: Vec<DateTime<Utc>> = interactions.iter().map(|i| i.timestamp).collect();
    timestamps.sort_by(|a, b| b.cmp(a));

    let mut score = 0.0;
    for (index, timestamp) in timestamps.iter().enumerate() {
        let age = (now - *timestamp).num_milliseconds() as f64 / 1000.0;
        if age > RECENCY_MAX_AGE_SECS {
            continue;
        }
        // Future timestamps count as brand new
        let normalized_age = (age.max(0.0) / RECENCY_MAX_AGE_SECS).min(1.0);
        score += RECENCY_DECAY.powi(index as i32) * (1.0 - normalized_age);
    }

    let max_possible = (1.0 - RECENCY_DECAY.powi(timestamps.len() as i32)) / (1.0 - RECENCY_DECAY);
    (score / max_possible).clamp(0.0, 1.0)
}

/// exp(-CV) of the gaps between consecutive interactions. 1.0 for fewer than two.
pub fn interval_consistency(interactions: &[UserInteraction]) -> f64 {
    if interactions.len() <= 1 {
        return 1.0;
    }

    let mut timestamps: Vec<DateTime<Utc>> = interactions.iter().map(|i| i.timestamp).collect();
    timestamps.sort();

    let intervals: Vec<f64> = timestamps
        .windows(2)
        .map(|w| (w[1] - w[0]).num_milliseconds() as f64 / 1000.0)
        .collect();

    let mean = intervals.iter().sum::<f64>() / intervals.len() as f64;
    let variance = intervals.iter().map(|i| (i - mean).powi(2)).sum::<f64>() / intervals.len() as f64;
    let cv = if mean > 0.0 { variance.sqrt() / mean } else { 0.0 };

    (-cv).exp()
}

/// 0.5 * frequency + 0.3 * recency + 0.2 * consistency. Zero when `total` is zero.
pub fn weighted_confidence(
    support: usize,
    total: usize,
    interactions: &[UserInteraction],
    now: DateTime<Utc>,
) -> f64 {
    if total == 0 {
        return 0.0;
    }

    let frequency = support as f64 / total as f64;
    let recency = recency_score(interactions, now);
    let consistency = interval_consistency(interactions);

    (frequency * 0.5 + recency * 0.3 + consistency * 0.2).clamp(0.0, 1.0)
}
