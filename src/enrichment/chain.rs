//! Priority-ordered fallback over the agents of one capability.

use super::models::{CapabilityOutcome, CapabilityReport};
use crate::agents::{AgentError, Capability, CapabilityKind, ProviderHandle};
use std::future::Future;
use std::sync::Arc;
use tracing::{debug, warn};

pub(crate) enum ChainOutcome<T> {
    Won { agent: String, value: T },
    Exhausted,
    NoAgents,
}

pub(crate) struct ChainRun<T> {
    pub outcome: ChainOutcome<T>,
    pub errors: Vec<String>,
    pub providers_called: Vec<String>,
}

/// Call `providers` in order until one returns a non-empty answer. Every
/// empty or failing agent before the winner adds exactly one soft error
/// naming it; agents after the winner are never called.
pub(crate) async fn run_chain<C, T, F, Fut>(providers: Vec<ProviderHandle<C>>, mut call: F) -> ChainRun<T>
where
    C: Capability,
    F: FnMut(Arc<C::Retriever>) -> Fut,
    Fut: Future<Output = Result<Option<T>, AgentError>>,
{
    let mut run = ChainRun {
        outcome: ChainOutcome::NoAgents,
        errors: Vec::new(),
        providers_called: Vec::new(),
    };
    if providers.is_empty() {
        debug!("No enabled agents for {}", C::KIND);
        return run;
    }

    for provider in providers {
        let name = provider.name().to_string();
        run.providers_called.push(name.clone());

        match provider.call(&mut call).await {
            Ok(Some(value)) => {
                debug!("{} answered {}", name, C::KIND);
                run.outcome = ChainOutcome::Won { agent: name, value };
                return run;
            }
            Ok(None) => {
                debug!("{} had no {} answer", name, C::KIND);
                run.errors.push(format!("{}: no {} found", name, C::KIND));
            }
            Err(e) => {
                warn!("{} failed for {}: {}", name, C::KIND, e);
                run.errors.push(format!("{}: {}", name, e));
            }
        }
    }

    run.outcome = ChainOutcome::Exhausted;
    run
}

/// One capability's contribution to an [`EnrichmentResult`](super::EnrichmentResult).
#[derive(Debug, Clone)]
pub(crate) struct CapabilityRun {
    pub report: CapabilityReport,
    pub errors: Vec<String>,
    pub providers_called: Vec<String>,
    /// Local path of a materialized asset, if this capability produced one.
    pub asset_path: Option<String>,
    /// The persisted value.
    pub value: Option<String>,
}

impl CapabilityRun {
    pub fn fresh(capability: CapabilityKind) -> Self {
        Self::empty(capability, CapabilityOutcome::Fresh)
    }

    fn empty(capability: CapabilityKind, outcome: CapabilityOutcome) -> Self {
        Self {
            report: CapabilityReport {
                capability,
                outcome,
                agent: None,
                attempts: 0,
            },
            errors: Vec::new(),
            providers_called: Vec::new(),
            asset_path: None,
            value: None,
        }
    }

    pub fn updated(&self) -> bool {
        self.report.outcome == CapabilityOutcome::Updated
    }
}

/// What applying a winning answer produced.
pub(crate) struct Applied {
    pub value: String,
    pub asset_path: Option<String>,
}

/// Turn a chain run into a capability run. `apply` materializes and persists
/// the winner's answer; if it fails the capability is failed with the error
/// recorded, and nothing else is affected.
pub(crate) async fn settle<T, F, Fut>(
    capability: CapabilityKind,
    run: ChainRun<T>,
    apply: F,
) -> CapabilityRun
where
    F: FnOnce(T) -> Fut,
    Fut: Future<Output = Result<Applied, String>>,
{
    let attempts = run.providers_called.len();
    let mut capability_run = CapabilityRun {
        report: CapabilityReport {
            capability,
            outcome: CapabilityOutcome::Failed,
            agent: None,
            attempts,
        },
        errors: run.errors,
        providers_called: run.providers_called,
        asset_path: None,
        value: None,
    };

    match run.outcome {
        ChainOutcome::NoAgents => {
            capability_run.report.outcome = CapabilityOutcome::NoAgents;
        }
        ChainOutcome::Exhausted => {}
        ChainOutcome::Won { agent, value } => match apply(value).await {
            Ok(applied) => {
                capability_run.report.outcome = CapabilityOutcome::Updated;
                capability_run.report.agent = Some(agent);
                capability_run.asset_path = applied.asset_path;
                capability_run.value = Some(applied.value);
            }
            Err(e) => {
                capability_run.errors.push(format!("{}: {}", agent, e));
            }
        },
    }
    capability_run
}
