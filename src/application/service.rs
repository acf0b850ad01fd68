use super::epoch::Epoch;
use super::poller::PollScheduler;
use crate::domain::machine::{Command, Effect, Event, Machine, PaymentContext, State, Step};
use crate::domain::ports::{DiagnosticSinkRef, PaymentGatewayRef};
use crate::error::{Error, Result};
use crate::infrastructure::diagnostics::NullSink;
use crate::interfaces::push::PushSignal;
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

const NAMESPACE: &str = "payment";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PaymentServiceConfig {
    poll_interval: Duration,
}

impl PaymentServiceConfig {
    /// The poll interval has no default and must be positive.
    pub fn new(poll_interval: Duration) -> Result<Self> {
        if poll_interval.is_zero() {
            return Err(Error::InvalidConfig(
                "poll interval must be greater than zero".to_string(),
            ));
        }
        Ok(Self { poll_interval })
    }

    pub fn poll_interval(&self) -> Duration {
        self.poll_interval
    }
}

/// What subscribers observe after every transition.
#[derive(Debug, Clone, Serialize)]
pub struct Snapshot {
    pub state: State,
    #[serde(flatten)]
    pub context: PaymentContext,
}

struct Completion {
    epoch: u64,
    event: Event,
}

/// Drives one payment through its lifecycle.
///
/// Built, subscribed to, then started. Once started, the machine lives in a
/// single task that owns the context exclusively; events reach it through
/// the returned [`PaymentHandle`] and are applied one at a time in arrival
/// order.
pub struct PaymentService {
    gateway: PaymentGatewayRef,
    config: PaymentServiceConfig,
    diagnostics: DiagnosticSinkRef,
    subscribers: Vec<mpsc::UnboundedSender<Snapshot>>,
}

impl PaymentService {
    pub fn new(gateway: PaymentGatewayRef, config: PaymentServiceConfig) -> Self {
        Self {
            gateway,
            config,
            diagnostics: Arc::new(NullSink),
            subscribers: Vec::new(),
        }
    }

    pub fn with_diagnostics(mut self, diagnostics: DiagnosticSinkRef) -> Self {
        self.diagnostics = diagnostics;
        self
    }

    /// Receives the initial `idle` snapshot and one per transition after it.
    /// The stream ends once a terminal state has been delivered.
    pub fn subscribe(&mut self) -> mpsc::UnboundedReceiver<Snapshot> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.subscribers.push(tx);
        rx
    }

    pub fn start(self) -> PaymentHandle {
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let (push_tx, push_rx) = mpsc::unbounded_channel();
        let (completions_tx, completions_rx) = mpsc::unbounded_channel();

        let runtime = Runtime {
            machine: Machine::new(),
            epoch: Epoch::new(),
            scheduler: PollScheduler::new(self.gateway.clone(), self.config.poll_interval),
            gateway: self.gateway,
            diagnostics: self.diagnostics.clone(),
            subscribers: self.subscribers,
            completions: completions_tx,
        };
        let task = tokio::spawn(runtime.run(events_rx, push_rx, completions_rx));

        PaymentHandle {
            events: events_tx,
            push: push_tx,
            diagnostics: self.diagnostics,
            task,
        }
    }
}

pub struct PaymentHandle {
    events: mpsc::UnboundedSender<Event>,
    push: mpsc::UnboundedSender<Event>,
    diagnostics: DiagnosticSinkRef,
    task: JoinHandle<Snapshot>,
}

impl PaymentHandle {
    /// Queues a caller event. Events the current state does not handle are
    /// dropped by the machine.
    pub fn send(&self, command: Command) -> Result<()> {
        self.events
            .send(command.into())
            .map_err(|_| Error::ServiceStopped)
    }

    /// Feeds a push channel into the lifecycle.
    ///
    /// `payment_verified` becomes `PAYMENT_VERIFIED` and `payment_updated` a
    /// context refresh. Connection signals are recorded as diagnostics only.
    /// Push events travel apart from caller events, so an attached channel
    /// never keeps an `idle` lifecycle alive past [`finished`](Self::finished).
    pub fn attach_push(&self, mut signals: mpsc::UnboundedReceiver<PushSignal>) -> JoinHandle<()> {
        let events = self.push.clone();
        let diagnostics = self.diagnostics.clone();
        tokio::spawn(async move {
            while let Some(signal) = signals.recv().await {
                let event = match signal {
                    PushSignal::PaymentVerified(payment) => Event::PaymentVerified(payment),
                    PushSignal::PaymentUpdated(payment) => Event::PaymentUpdated(payment),
                    PushSignal::Open => {
                        diagnostics.record(NAMESPACE, "push channel open");
                        continue;
                    }
                    PushSignal::Close => {
                        diagnostics.record(NAMESPACE, "push channel closed");
                        continue;
                    }
                    PushSignal::Error(err) => {
                        diagnostics.record(NAMESPACE, &format!("push channel error: {err}"));
                        continue;
                    }
                };
                if events.send(event).is_err() {
                    break;
                }
            }
        })
    }

    /// Waits for the lifecycle to end and returns its final snapshot.
    ///
    /// Dropping the handle here means no further caller events; a machine
    /// still in `idle` stops immediately.
    pub async fn finished(self) -> Result<Snapshot> {
        let PaymentHandle { events, task, .. } = self;
        drop(events);
        Ok(task.await?)
    }
}

struct Runtime {
    machine: Machine,
    epoch: Epoch,
    scheduler: PollScheduler,
    gateway: PaymentGatewayRef,
    diagnostics: DiagnosticSinkRef,
    subscribers: Vec<mpsc::UnboundedSender<Snapshot>>,
    completions: mpsc::UnboundedSender<Completion>,
}

impl Runtime {
    async fn run(
        mut self,
        mut events: mpsc::UnboundedReceiver<Event>,
        mut push: mpsc::UnboundedReceiver<Event>,
        mut completions: mpsc::UnboundedReceiver<Completion>,
    ) -> Snapshot {
        self.publish();
        let mut accepting = true;
        let mut pushing = true;

        while !self.machine.state().is_terminal() {
            tokio::select! {
                event = events.recv(), if accepting => match event {
                    Some(event) => self.apply(event),
                    None => {
                        accepting = false;
                        if self.machine.state() == State::Idle {
                            break;
                        }
                    }
                },
                event = push.recv(), if pushing => match event {
                    Some(event) => self.apply(event),
                    None => pushing = false,
                },
                Some(completion) = completions.recv() => {
                    if self.epoch.is_current(completion.epoch) {
                        self.apply(completion.event);
                    } else {
                        self.diagnostics.record(
                            NAMESPACE,
                            &format!(
                                "discarding stale {} from epoch {}",
                                completion.event.name(),
                                completion.epoch
                            ),
                        );
                    }
                }
            }
        }

        self.snapshot()
    }

    fn apply(&mut self, event: Event) {
        let name = event.name();
        let Some(transition) = self.machine.transition(event) else {
            self.diagnostics.record(
                NAMESPACE,
                &format!("ignoring {name} in state {}", self.machine.state()),
            );
            return;
        };

        let from = self.machine.state();
        self.machine = transition.machine;
        self.diagnostics.record(
            NAMESPACE,
            &format!("{from} -> {} on {name}", self.machine.state()),
        );

        match transition.step {
            Step::Enter { effect } => {
                let epoch = self.epoch.advance();
                self.publish();
                if let Some(effect) = effect {
                    self.spawn(effect, epoch);
                }
            }
            Step::Refresh => self.publish(),
        }
    }

    fn spawn(&self, effect: Effect, epoch: u64) {
        let completions = self.completions.clone();
        match effect {
            Effect::CreatePayment(params) => {
                let gateway = self.gateway.clone();
                tokio::spawn(async move {
                    let event = match gateway.create_payment(&params).await {
                        Ok(payment) => Event::Resolved(payment),
                        Err(failure) => Event::Rejected(failure),
                    };
                    let _ = completions.send(Completion { epoch, event });
                });
            }
            Effect::FetchPayment(token) => {
                let gateway = self.gateway.clone();
                tokio::spawn(async move {
                    let event = match gateway.fetch_payment(&token).await {
                        Ok(payment) => Event::Resolved(payment),
                        Err(failure) => Event::Rejected(failure),
                    };
                    let _ = completions.send(Completion { epoch, event });
                });
            }
            Effect::Poll(token) => {
                let scheduler = self.scheduler.clone();
                let guard = self.epoch.guard(epoch);
                tokio::spawn(async move {
                    if let Some(event) = scheduler.tick(&token, &guard).await {
                        let _ = completions.send(Completion { epoch, event });
                    }
                });
            }
        }
    }

    fn snapshot(&self) -> Snapshot {
        Snapshot {
            state: self.machine.state(),
            context: self.machine.context().clone(),
        }
    }

    fn publish(&mut self) {
        let snapshot = self.snapshot();
        self.subscribers
            .retain(|subscriber| subscriber.send(snapshot.clone()).is_ok());
    }
}
