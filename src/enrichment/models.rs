use crate::agents::CapabilityKind;
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntityType {
    Artist,
    Album,
}

impl EntityType {
    pub fn as_str(&self) -> &'static str {
        match self {
            EntityType::Artist => "artist",
            EntityType::Album => "album",
        }
    }
}

impl fmt::Display for EntityType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EnrichmentRequest {
    pub entity_type: EntityType,
    pub entity_id: String,
    #[serde(default)]
    pub force_refresh: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CapabilityOutcome {
    /// A value was fetched and persisted.
    Updated,
    /// At least one agent was attempted and nothing was persisted.
    Failed,
    /// No enabled agent implements the capability.
    NoAgents,
    /// The stored value is within the freshness window; nothing attempted.
    Fresh,
}

impl CapabilityOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            CapabilityOutcome::Updated => "updated",
            CapabilityOutcome::Failed => "failed",
            CapabilityOutcome::NoAgents => "no_agents",
            CapabilityOutcome::Fresh => "fresh",
        }
    }

    pub fn was_attempted(&self) -> bool {
        matches!(self, CapabilityOutcome::Updated | CapabilityOutcome::Failed)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CapabilityReport {
    pub capability: CapabilityKind,
    pub outcome: CapabilityOutcome,
    /// The agent whose answer was persisted.
    pub agent: Option<String>,
    /// Number of agents called for this capability.
    pub attempts: usize,
}

/// Outcome of enriching one entity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EnrichmentResult {
    pub entity_type: EntityType,
    pub entity_id: String,
    pub bio_updated: bool,
    pub images_updated: bool,
    pub cover_updated: bool,
    pub canonical_id_updated: bool,
    /// Soft errors, one per failed agent call or failed persistence step.
    pub errors: Vec<String>,
    pub duration_ms: u64,
    pub skipped_fresh: bool,
    pub capabilities: Vec<CapabilityReport>,
    /// Agents called, grouped by capability in report order. Repeats if an
    /// agent served several capabilities.
    pub providers_called: Vec<String>,
}

impl EnrichmentResult {
    pub fn new(entity_type: EntityType, entity_id: impl Into<String>) -> Self {
        Self {
            entity_type,
            entity_id: entity_id.into(),
            bio_updated: false,
            images_updated: false,
            cover_updated: false,
            canonical_id_updated: false,
            errors: Vec::new(),
            duration_ms: 0,
            skipped_fresh: false,
            capabilities: Vec::new(),
            providers_called: Vec::new(),
        }
    }

    pub fn any_updated(&self) -> bool {
        self.bio_updated || self.images_updated || self.cover_updated || self.canonical_id_updated
    }

    /// True when at least one target capability was attempted and every
    /// attempted target capability failed. Canonical id resolution is a
    /// prerequisite, not a target.
    pub fn is_failure(&self) -> bool {
        let attempted: Vec<_> = self
            .capabilities
            .iter()
            .filter(|c| c.capability != CapabilityKind::CanonicalId && c.outcome.was_attempted())
            .collect();
        !attempted.is_empty() && attempted.iter().all(|c| c.outcome == CapabilityOutcome::Failed)
    }

    pub fn outcome_of(&self, capability: CapabilityKind) -> Option<CapabilityOutcome> {
        self.capabilities
            .iter()
            .find(|c| c.capability == capability)
            .map(|c| c.outcome)
    }
}
