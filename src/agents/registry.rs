use super::{
    AlbumCoverRetriever, ArtistBioRetriever, ArtistImageRetriever, CanonicalIdResolver,
    Capability, CapabilityKind, ProviderGate,
};
use super::AgentError;
use serde::Serialize;
use std::future::Future;
use std::marker::PhantomData;
use std::sync::{Arc, RwLock};
use std::time::Duration;
use tracing::info;

/// Per-agent runtime settings, resolved from configuration at startup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AgentSettings {
    pub enabled: bool,
    /// Lower runs first.
    pub priority: i32,
    pub rate_limit: Duration,
    pub timeout: Duration,
}

impl Default for AgentSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            priority: 100,
            rate_limit: Duration::ZERO,
            timeout: Duration::from_secs(15),
        }
    }
}

/// An agent as handed to the registry: a name, settings and the capability
/// implementations it provides.
pub struct AgentRegistration {
    name: String,
    settings: AgentSettings,
    pub(super) artist_bio: Option<Arc<dyn ArtistBioRetriever>>,
    pub(super) artist_images: Option<Arc<dyn ArtistImageRetriever>>,
    pub(super) album_cover: Option<Arc<dyn AlbumCoverRetriever>>,
    pub(super) canonical_id: Option<Arc<dyn CanonicalIdResolver>>,
}

impl AgentRegistration {
    pub fn new(name: impl Into<String>, settings: AgentSettings) -> Self {
        Self {
            name: name.into(),
            settings,
            artist_bio: None,
            artist_images: None,
            album_cover: None,
            canonical_id: None,
        }
    }

    pub fn with_artist_bio(mut self, retriever: Arc<dyn ArtistBioRetriever>) -> Self {
        self.artist_bio = Some(retriever);
        self
    }

    pub fn with_artist_images(mut self, retriever: Arc<dyn ArtistImageRetriever>) -> Self {
        self.artist_images = Some(retriever);
        self
    }

    pub fn with_album_cover(mut self, retriever: Arc<dyn AlbumCoverRetriever>) -> Self {
        self.album_cover = Some(retriever);
        self
    }

    pub fn with_canonical_id(mut self, resolver: Arc<dyn CanonicalIdResolver>) -> Self {
        self.canonical_id = Some(resolver);
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn settings(&self) -> &AgentSettings {
        &self.settings
    }

    pub fn capabilities(&self) -> Vec<CapabilityKind> {
        let mut capabilities = Vec::new();
        if self.artist_bio.is_some() {
            capabilities.push(CapabilityKind::ArtistBio);
        }
        if self.artist_images.is_some() {
            capabilities.push(CapabilityKind::ArtistImages);
        }
        if self.album_cover.is_some() {
            capabilities.push(CapabilityKind::AlbumCover);
        }
        if self.canonical_id.is_some() {
            capabilities.push(CapabilityKind::CanonicalId);
        }
        capabilities
    }
}

/// Introspection view of a registered agent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AgentInfo {
    pub name: String,
    pub enabled: bool,
    pub priority: i32,
    pub capabilities: Vec<CapabilityKind>,
    pub rate_limit_ms: u64,
    pub timeout_ms: u64,
}

/// A single agent's implementation of capability `C`, bound to its gate.
pub struct ProviderHandle<C: Capability> {
    name: Arc<str>,
    retriever: Arc<C::Retriever>,
    gate: Arc<ProviderGate>,
    _capability: PhantomData<fn() -> C>,
}

impl<C: Capability> Clone for ProviderHandle<C> {
    fn clone(&self) -> Self {
        Self {
            name: self.name.clone(),
            retriever: self.retriever.clone(),
            gate: self.gate.clone(),
            _capability: PhantomData,
        }
    }
}

impl<C: Capability> ProviderHandle<C> {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn min_interval(&self) -> Duration {
        self.gate.min_interval()
    }

    /// Invoke the agent through its gate (rate limit, no overlap, timeout).
    pub async fn call<T, F, Fut>(&self, f: F) -> Result<T, AgentError>
    where
        F: FnOnce(Arc<C::Retriever>) -> Fut,
        Fut: Future<Output = Result<T, AgentError>>,
    {
        self.gate.run(f(self.retriever.clone())).await
    }
}

#[derive(Clone)]
struct RegisteredAgent {
    registration: Arc<AgentRegistration>,
    enabled: bool,
    gate: Arc<ProviderGate>,
}

#[derive(Default)]
struct RegistrySnapshot {
    // Registration order.
    agents: Vec<RegisteredAgent>,
}

/// Holds every provider agent and answers "which agents, in which order,
/// can provide capability C".
///
/// Readers clone an immutable snapshot; writers build a new snapshot and
/// swap it in, so a discovery call never observes a half-applied change.
#[derive(Default)]
pub struct AgentRegistry {
    snapshot: RwLock<Arc<RegistrySnapshot>>,
}

impl AgentRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an agent. A duplicate name replaces the earlier registration
    /// but keeps its original position for tie-breaking, and its gate keeps
    /// serializing with handles discovered before the replacement.
    pub fn register(&self, registration: AgentRegistration) {
        let settings = registration.settings().clone();
        let name = registration.name().to_string();
        info!(
            "Registering agent {} (priority {}, enabled: {}, capabilities: {:?})",
            name,
            settings.priority,
            settings.enabled,
            registration.capabilities()
        );
        let registration = Arc::new(registration);

        self.update(|agents| {
            match agents
                .iter_mut()
                .find(|a| a.registration.name() == name)
            {
                Some(existing) => {
                    *existing = RegisteredAgent {
                        gate: Arc::new(
                            existing
                                .gate
                                .with_limits(settings.rate_limit, settings.timeout),
                        ),
                        enabled: settings.enabled,
                        registration,
                    };
                }
                None => agents.push(RegisteredAgent {
                    gate: Arc::new(ProviderGate::new(
                        name.clone(),
                        settings.rate_limit,
                        settings.timeout,
                    )),
                    enabled: settings.enabled,
                    registration,
                }),
            }
            true
        });
    }

    /// Enabled agents implementing `C`, ascending by priority. Equal
    /// priorities keep registration order.
    pub fn agents_for<C: Capability>(&self) -> Vec<ProviderHandle<C>> {
        let snapshot = self.snapshot();
        let mut candidates: Vec<(i32, ProviderHandle<C>)> = snapshot
            .agents
            .iter()
            .filter(|a| a.enabled)
            .filter_map(|a| {
                C::select(&a.registration).map(|retriever| {
                    (
                        a.registration.settings().priority,
                        ProviderHandle {
                            name: Arc::from(a.registration.name()),
                            retriever,
                            gate: a.gate.clone(),
                            _capability: PhantomData,
                        },
                    )
                })
            })
            .collect();
        // sort_by_key is stable
        candidates.sort_by_key(|(priority, _)| *priority);
        candidates.into_iter().map(|(_, handle)| handle).collect()
    }

    pub fn is_agent_enabled(&self, name: &str) -> bool {
        self.snapshot()
            .agents
            .iter()
            .any(|a| a.registration.name() == name && a.enabled)
    }

    pub fn all_agents(&self) -> Vec<AgentInfo> {
        self.snapshot()
            .agents
            .iter()
            .map(|a| {
                let settings = a.registration.settings();
                AgentInfo {
                    name: a.registration.name().to_string(),
                    enabled: a.enabled,
                    priority: settings.priority,
                    capabilities: a.registration.capabilities(),
                    rate_limit_ms: settings.rate_limit.as_millis() as u64,
                    timeout_ms: settings.timeout.as_millis() as u64,
                }
            })
            .collect()
    }

    /// Toggle an agent. Returns false if no agent has that name.
    pub fn set_enabled(&self, name: &str, enabled: bool) -> bool {
        let found = self.update(|agents| match agents
            .iter_mut()
            .find(|a| a.registration.name() == name)
        {
            Some(agent) => {
                agent.enabled = enabled;
                true
            }
            None => false,
        });
        if found {
            info!("Agent {} is now {}", name, if enabled { "enabled" } else { "disabled" });
        }
        found
    }

    pub fn min_interval_for(&self, name: &str) -> Option<Duration> {
        self.snapshot()
            .agents
            .iter()
            .find(|a| a.registration.name() == name)
            .map(|a| a.gate.min_interval())
    }

    fn snapshot(&self) -> Arc<RegistrySnapshot> {
        self.snapshot
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    /// Copy-on-write update. The closure returns whether anything changed.
    fn update(&self, f: impl FnOnce(&mut Vec<RegisteredAgent>) -> bool) -> bool {
        let mut guard = self
            .snapshot
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        let mut agents = guard.agents.clone();
        let changed = f(&mut agents);
        if changed {
            *guard = Arc::new(RegistrySnapshot { agents });
        }
        changed
    }
}
