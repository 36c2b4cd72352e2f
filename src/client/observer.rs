//! Per-client lifecycle observer

use crate::barrier::CompletionToken;
use crate::client::scheduler::StopScheduler;
use crate::common::Endpoint;
use crate::config::TerminalMode;
use crate::engine::{EngineClient, LifecycleEvent};
use crate::metrics::{MetricsAggregator, Outcome};

use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::mpsc;
use tracing::{debug, error, warn};

/// What the observer does in response to one event
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Reaction {
    pub record: Option<Outcome>,
    pub schedule_stop: bool,
    pub terminal: bool,
}

impl Reaction {
    const NONE: Reaction = Reaction {
        record: None,
        schedule_stop: false,
        terminal: false,
    };

    fn record(outcome: Outcome) -> Self {
        Self {
            record: Some(outcome),
            schedule_stop: false,
            terminal: true,
        }
    }
}

pub fn react(event: &LifecycleEvent, terminal: TerminalMode) -> Reaction {
    match event {
        LifecycleEvent::RegistrationSucceeded { .. } => Reaction {
            record: Some(Outcome::Success),
            schedule_stop: true,
            terminal: terminal == TerminalMode::Registration,
        },
        LifecycleEvent::RegistrationFailed { .. } => Reaction::record(Outcome::Failure),
        LifecycleEvent::RegistrationTimedOut { .. } => Reaction::record(Outcome::Timeout),
        LifecycleEvent::InternalError { .. } => Reaction::record(Outcome::InternalError),
        LifecycleEvent::DeregistrationSucceeded { .. }
        | LifecycleEvent::DeregistrationFailed { .. }
        | LifecycleEvent::DeregistrationTimedOut { .. } => Reaction {
            terminal: terminal == TerminalMode::Deregistration,
            ..Reaction::NONE
        },
    }
}

/// Consumes one client's events, feeding metrics, the scheduler and the barrier
pub struct LifecycleObserver {
    pub endpoint: Endpoint,
    pub started_at: Instant,
    pub metrics: Arc<MetricsAggregator>,
    pub completion: Option<CompletionToken>,
    pub scheduler: StopScheduler,
    pub client: Arc<dyn EngineClient>,
    pub time_alive: Duration,
    pub terminal: TerminalMode,
    /// Registration outcome already recorded for this client
    pub outcome: Option<Outcome>,
}

impl LifecycleObserver {
    pub async fn run(mut self, mut events: mpsc::UnboundedReceiver<LifecycleEvent>) {
        while let Some(event) = events.recv().await {
            self.handle(event);
        }
    }

    pub fn handle(&mut self, event: LifecycleEvent) {
        self.log(&event);
        let reaction = react(&event, self.terminal);

        if let Some(outcome) = reaction.record {
            if let Some(recorded) = self.outcome {
                debug!(
                    "{} already ended registration as {:?}, ignoring {:?}",
                    self.endpoint, recorded, outcome
                );
                return;
            }
            if self.completion.is_none() {
                debug!("{} already completed, ignoring {:?}", self.endpoint, outcome);
                return;
            }
            self.metrics.record(outcome, self.started_at.elapsed());
            self.outcome = Some(outcome);
        }

        if reaction.schedule_stop {
            let client = Arc::clone(&self.client);
            self.scheduler
                .schedule(self.time_alive, self.endpoint.to_string(), async move {
                    client.stop(true).await
                });
        }

        if reaction.terminal
            && let Some(token) = self.completion.take()
        {
            token.complete();
        }
    }

    fn log(&self, event: &LifecycleEvent) {
        match event {
            LifecycleEvent::RegistrationSucceeded {
                registration_id, ..
            } => debug!("{} registered as {}", self.endpoint, registration_id),
            LifecycleEvent::RegistrationFailed { code, message, .. } => {
                warn!("{} registration failed: {} {}", self.endpoint, code, message)
            }
            LifecycleEvent::RegistrationTimedOut { server } => {
                debug!("{} registration to {} timed out", self.endpoint, server)
            }
            LifecycleEvent::DeregistrationSucceeded { .. } => {
                debug!("{} deregistered", self.endpoint)
            }
            LifecycleEvent::DeregistrationFailed { code, message, .. } => {
                debug!("{} deregistration failed: {} {}", self.endpoint, code, message)
            }
            LifecycleEvent::DeregistrationTimedOut { .. } => {
                debug!("{} deregistration timed out", self.endpoint)
            }
            LifecycleEvent::InternalError { message } => {
                error!("{} internal error: {}", self.endpoint, message)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::barrier::CompletionBarrier;
    use crate::engine::EventSink;
    use crate::engine::model::{RegistrationId, ResponseCode, ServerRef};
    use crate::errors::Result;

    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn server() -> ServerRef {
        ServerRef {
            short_id: 12345,
            uri: "coaps://localhost:5684".to_string(),
        }
    }

    fn succeeded() -> LifecycleEvent {
        LifecycleEvent::RegistrationSucceeded {
            server: server(),
            registration_id: RegistrationId::generate(),
        }
    }

    fn deregistered() -> LifecycleEvent {
        LifecycleEvent::DeregistrationSucceeded {
            server: server(),
            registration_id: RegistrationId::generate(),
        }
    }

    struct CountingClient {
        endpoint: Endpoint,
        stops: AtomicUsize,
    }

    #[async_trait]
    impl EngineClient for CountingClient {
        fn endpoint(&self) -> &Endpoint {
            &self.endpoint
        }

        fn attach_observer(&self, _sink: EventSink) {}

        async fn start(&self) -> Result<()> {
            Ok(())
        }

        async fn stop(&self, _graceful: bool) -> Result<()> {
            self.stops.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }

        async fn destroy(&self, _graceful: bool) {}
    }

    fn observer(
        terminal: TerminalMode,
    ) -> (
        LifecycleObserver,
        Arc<CompletionBarrier>,
        Arc<MetricsAggregator>,
        Arc<CountingClient>,
    ) {
        let barrier = Arc::new(CompletionBarrier::new(1));
        let metrics = Arc::new(MetricsAggregator::new());
        let client = Arc::new(CountingClient {
            endpoint: Endpoint::from("sec-device-0"),
            stops: AtomicUsize::new(0),
        });
        let observer = LifecycleObserver {
            endpoint: Endpoint::from("sec-device-0"),
            started_at: Instant::now(),
            metrics: Arc::clone(&metrics),
            completion: Some(barrier.token()),
            scheduler: StopScheduler::new(1),
            client: client.clone(),
            time_alive: Duration::from_millis(10),
            terminal,
            outcome: None,
        };
        (observer, barrier, metrics, client)
    }

    #[test]
    fn test_reaction_table() {
        let mode = TerminalMode::Deregistration;
        assert_eq!(
            react(&succeeded(), mode),
            Reaction {
                record: Some(Outcome::Success),
                schedule_stop: true,
                terminal: false,
            }
        );
        assert!(react(&succeeded(), TerminalMode::Registration).terminal);

        let failed = LifecycleEvent::RegistrationFailed {
            server: server(),
            code: ResponseCode::Forbidden,
            message: "unknown identity".to_string(),
        };
        assert_eq!(react(&failed, mode), Reaction::record(Outcome::Failure));

        let timed_out = LifecycleEvent::RegistrationTimedOut { server: server() };
        assert_eq!(react(&timed_out, mode), Reaction::record(Outcome::Timeout));

        let internal = LifecycleEvent::InternalError {
            message: "refused".to_string(),
        };
        assert_eq!(
            react(&internal, mode),
            Reaction::record(Outcome::InternalError)
        );

        assert!(react(&deregistered(), mode).terminal);
        assert_eq!(
            react(&deregistered(), TerminalMode::Registration),
            Reaction::NONE
        );
        assert!(react(&LifecycleEvent::DeregistrationTimedOut { server: server() }, mode).terminal);
    }

    #[tokio::test]
    async fn test_success_then_deregistration_completes_once() {
        let (mut observer, barrier, metrics, client) = observer(TerminalMode::Deregistration);

        observer.handle(succeeded());
        assert_eq!(metrics.count(Outcome::Success), 1);
        assert_eq!(barrier.remaining(), 1);

        tokio::time::sleep(Duration::from_millis(100)).await;
        assert_eq!(client.stops.load(Ordering::SeqCst), 1);

        observer.handle(deregistered());
        assert_eq!(barrier.remaining(), 0);

        // A late registration outcome neither counts down nor gets recorded
        observer.handle(LifecycleEvent::RegistrationTimedOut { server: server() });
        assert_eq!(barrier.remaining(), 0);
        assert!(observer.completion.is_none());
        assert_eq!(metrics.count(Outcome::Timeout), 0);
        assert_eq!(metrics.total(), 1);
    }

    #[tokio::test]
    async fn test_one_outcome_per_client() {
        let (mut observer, barrier, metrics, _) = observer(TerminalMode::Deregistration);

        observer.handle(LifecycleEvent::RegistrationFailed {
            server: server(),
            code: ResponseCode::Forbidden,
            message: "unknown identity".to_string(),
        });
        observer.handle(LifecycleEvent::RegistrationTimedOut { server: server() });
        observer.handle(LifecycleEvent::InternalError {
            message: "late".to_string(),
        });

        assert_eq!(metrics.count(Outcome::Failure), 1);
        assert_eq!(metrics.total(), 1);
        assert_eq!(barrier.remaining(), 0);
        assert_eq!(observer.outcome, Some(Outcome::Failure));
    }

    #[tokio::test]
    async fn test_late_outcome_after_success_is_ignored() {
        let (mut observer, barrier, metrics, _) = observer(TerminalMode::Deregistration);

        observer.handle(succeeded());
        observer.handle(LifecycleEvent::RegistrationTimedOut { server: server() });

        assert_eq!(metrics.count(Outcome::Success), 1);
        assert_eq!(metrics.count(Outcome::Timeout), 0);
        assert_eq!(barrier.remaining(), 1);

        observer.handle(deregistered());
        assert_eq!(barrier.remaining(), 0);
    }

    #[tokio::test]
    async fn test_registration_terminal_mode_releases_on_success() {
        let (mut observer, barrier, _, _) = observer(TerminalMode::Registration);
        observer.handle(succeeded());
        assert_eq!(barrier.remaining(), 0);
    }

    #[tokio::test]
    async fn test_run_consumes_until_channel_closes() {
        let (observer, barrier, metrics, _) = observer(TerminalMode::Deregistration);
        let (sink, events) = EventSink::channel();

        sink.emit(LifecycleEvent::RegistrationFailed {
            server: server(),
            code: ResponseCode::Forbidden,
            message: "denied".to_string(),
        });
        drop(sink);

        observer.run(events).await;
        assert_eq!(metrics.count(Outcome::Failure), 1);
        assert_eq!(barrier.remaining(), 0);
    }
}
