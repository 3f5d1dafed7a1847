use super::AgentError;
use crate::server::metrics;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::debug;

/// Serializes and spaces calls to one agent.
///
/// The async mutex is held for the whole call, so calls to the same agent
/// never overlap even when several capabilities use it concurrently. The
/// timeout is the only point where a provider call is aborted.
pub struct ProviderGate {
    agent: String,
    min_interval: Duration,
    timeout: Duration,
    last_call: Arc<Mutex<Option<Instant>>>,
}

impl ProviderGate {
    pub fn new(agent: impl Into<String>, min_interval: Duration, timeout: Duration) -> Self {
        Self {
            agent: agent.into(),
            min_interval,
            timeout,
            last_call: Arc::new(Mutex::new(None)),
        }
    }

    /// A gate with new limits that still serializes with this one. Calls made
    /// through either gate never overlap.
    pub fn with_limits(&self, min_interval: Duration, timeout: Duration) -> Self {
        Self {
            agent: self.agent.clone(),
            min_interval,
            timeout,
            last_call: self.last_call.clone(),
        }
    }

    pub fn min_interval(&self) -> Duration {
        self.min_interval
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    pub async fn run<T, Fut>(&self, call: Fut) -> Result<T, AgentError>
    where
        Fut: Future<Output = Result<T, AgentError>>,
    {
        let mut last_call = self.last_call.lock().await;

        if let Some(previous) = *last_call {
            let elapsed = previous.elapsed();
            if elapsed < self.min_interval {
                let wait = self.min_interval - elapsed;
                debug!("Rate limiting {} for {:?}", self.agent, wait);
                tokio::time::sleep(wait).await;
            }
        }
        *last_call = Some(Instant::now());

        let result = match tokio::time::timeout(self.timeout, call).await {
            Ok(result) => result,
            Err(_) => Err(AgentError::Timeout(self.timeout)),
        };

        let label = match &result {
            Ok(_) => "ok",
            Err(AgentError::Timeout(_)) => "timeout",
            Err(AgentError::RateLimited) => "rate_limited",
            Err(_) => "error",
        };
        metrics::record_provider_call(&self.agent, label);

        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[tokio::test(start_paused = true)]
    async fn test_calls_are_spaced_by_min_interval() {
        let gate = ProviderGate::new("test", Duration::from_millis(500), Duration::from_secs(5));

        let start = Instant::now();
        gate.run(async { Ok::<_, AgentError>(()) }).await.unwrap();
        gate.run(async { Ok::<_, AgentError>(()) }).await.unwrap();
        gate.run(async { Ok::<_, AgentError>(()) }).await.unwrap();

        assert!(start.elapsed() >= Duration::from_millis(1000));
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeout_aborts_call() {
        let gate = ProviderGate::new("slow", Duration::ZERO, Duration::from_millis(100));

        let result = gate
            .run(async {
                tokio::time::sleep(Duration::from_secs(10)).await;
                Ok::<_, AgentError>(())
            })
            .await;

        assert!(matches!(result, Err(AgentError::Timeout(_))));
    }

    #[tokio::test(start_paused = true)]
    async fn test_calls_never_overlap() {
        let gate = Arc::new(ProviderGate::new(
            "serial",
            Duration::ZERO,
            Duration::from_secs(5),
        ));
        let active = Arc::new(AtomicUsize::new(0));
        let max_active = Arc::new(AtomicUsize::new(0));

        let mut tasks = Vec::new();
        for _ in 0..4 {
            let gate = gate.clone();
            let active = active.clone();
            let max_active = max_active.clone();
            tasks.push(tokio::spawn(async move {
                gate.run(async {
                    let now = active.fetch_add(1, Ordering::SeqCst) + 1;
                    max_active.fetch_max(now, Ordering::SeqCst);
                    tokio::time::sleep(Duration::from_millis(50)).await;
                    active.fetch_sub(1, Ordering::SeqCst);
                    Ok::<_, AgentError>(())
                })
                .await
            }));
        }
        for task in tasks {
            task.await.unwrap().unwrap();
        }

        assert_eq!(max_active.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_regated_calls_wait_for_earlier_gate() {
        let old = Arc::new(ProviderGate::new("agent", Duration::ZERO, Duration::from_secs(5)));
        let new = old.with_limits(Duration::from_millis(300), Duration::from_secs(1));
        assert_eq!(new.min_interval(), Duration::from_millis(300));
        assert_eq!(new.timeout(), Duration::from_secs(1));

        let start = Instant::now();
        let held = {
            let old = old.clone();
            tokio::spawn(async move {
                old.run(async {
                    tokio::time::sleep(Duration::from_millis(200)).await;
                    Ok::<_, AgentError>(())
                })
                .await
            })
        };
        tokio::task::yield_now().await;

        new.run(async { Ok::<_, AgentError>(()) }).await.unwrap();
        held.await.unwrap().unwrap();

        // Waits for the held call, then for the new interval since it started.
        assert!(start.elapsed() >= Duration::from_millis(300));
    }
}
