// src/stores.rs
//! Boundaries to the host application: where interactions come from, where
//! patterns are kept, and who answers preference queries.

use anyhow::Result;
use async_trait::async_trait;
use std::collections::{HashMap, VecDeque};
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::models::UserInteraction;
use crate::patterns::{LearnedPreferences, Pattern, PatternContext};

/// Read access to the host's interaction history.
#[async_trait]
pub trait InteractionSource: Send + Sync {
    /// Up to `limit` most recent interactions, oldest first.
    async fn fetch_recent(&self, limit: usize) -> Result<Vec<UserInteraction>>;
}

/// Durable home for learned patterns.
#[async_trait]
pub trait PatternStore: Send + Sync {
    async fn load_all(&self) -> Result<Vec<Pattern>>;
    async fn upsert(&self, pattern: &Pattern) -> Result<()>;
}

#[async_trait]
pub trait PreferenceStore: Send + Sync {
    async fn learned_preferences(&self, context: &PatternContext) -> Result<LearnedPreferences>;
}

/// Bounded in-memory interaction log.
#[derive(Debug)]
pub struct InMemoryInteractionLog {
    entries: RwLock<VecDeque<UserInteraction>>,
    capacity: usize,
}

impl InMemoryInteractionLog {
    pub fn new(capacity: usize) -> Self {
        Self {
            entries: RwLock::new(VecDeque::new()),
            capacity: capacity.max(1),
        }
    }

    pub async fn push(&self, interaction: UserInteraction) {
        let mut entries = self.entries.write().await;
        entries.push_back(interaction);
        while entries.len() > self.capacity {
            entries.pop_front();
        }
    }

    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }
}

impl Default for InMemoryInteractionLog {
    fn default() -> Self {
        Self::new(10_000)
    }
}

#[async_trait]
impl InteractionSource for InMemoryInteractionLog {
    async fn fetch_recent(&self, limit: usize) -> Result<Vec<UserInteraction>> {
        let entries = self.entries.read().await;
        let skip = entries.len().saturating_sub(limit);
        Ok(entries.iter().skip(skip).cloned().collect())
    }
}

#[derive(Debug, Default)]
pub struct InMemoryPatternStore {
    patterns: RwLock<HashMap<Uuid, Pattern>>,
}

impl InMemoryPatternStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_patterns(patterns: Vec<Pattern>) -> Self {
        Self {
            patterns: RwLock::new(patterns.into_iter().map(|p| (p.id, p)).collect()),
        }
    }

    pub async fn get(&self, id: Uuid) -> Option<Pattern> {
        self.patterns.read().await.get(&id).cloned()
    }

    pub async fn len(&self) -> usize {
        self.patterns.read().await.len()
    }
}

#[async_trait]
impl PatternStore for InMemoryPatternStore {
    async fn load_all(&self) -> Result<Vec<Pattern>> {
        let mut patterns: Vec<Pattern> = self.patterns.read().await.values().cloned().collect();
        // Highest confidence first, like a sorted fetch
        patterns.sort_by(|a, b| {
            b.confidence
                .partial_cmp(&a.confidence)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        Ok(patterns)
    }

    async fn upsert(&self, pattern: &Pattern) -> Result<()> {
        self.patterns.write().await.insert(pattern.id, pattern.clone());
        Ok(())
    }
}
