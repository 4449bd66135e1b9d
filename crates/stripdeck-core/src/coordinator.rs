//! Polling coordinator: the async driver around [`Session`].
//!
//! One task owns every piece of mutable state (session, countdown, chart
//! windows) and reacts to events one at a time: calls from a
//! [`CoordinatorHandle`], timer expiries and settled requests. Gateway calls
//! run on their own tasks and report back as events, so the owning task never
//! waits on the network.
//!
//! After each event the coordinator publishes a fresh [`View`] over a
//! `tokio::sync::watch` channel. Readers get cheap `Arc` clones of the chart
//! windows and the last snapshot; nothing they hold can be mutated under them.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::Interval;
use tokio_util::sync::CancellationToken;

use crate::clock::{Clock, Millis, Scheduled, ticker};
use crate::config::{ChartSource, ChartSpec, EngineConfig};
use crate::countdown::CountdownTimer;
use crate::error::GatewayError;
use crate::gateway::{Command, RequestGateway};
use crate::model::{Snapshot, StatSource, Statistics};
use crate::notify::{Notification, NotificationSink};
use crate::sampler::{TimeSeriesSampler, Window};
use crate::session::{Action, Generation, Session, SessionState};

/// Notification source for snapshot and command failures.
pub const SOURCE_DESIGNER: &str = "Designer";
/// Notification source for statistics failures.
pub const SOURCE_STATISTICS: &str = "Statistics";

// ---------------------------------------------------------------------------
// Busy flag
// ---------------------------------------------------------------------------

/// Admission flag for mutations.
///
/// Raising it never blocks or fails. Whichever guard drops first lowers it,
/// so two overlapping programmatic commands are not serialized.
#[derive(Debug, Clone, Default)]
pub struct BusyFlag(Arc<AtomicBool>);

impl BusyFlag {
    pub fn raise(&self) -> BusyGuard {
        self.0.store(true, Ordering::SeqCst);
        BusyGuard(self.0.clone())
    }

    pub fn is_raised(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Lowers the [`BusyFlag`] when dropped, however the command ends.
#[derive(Debug)]
pub struct BusyGuard(Arc<AtomicBool>);

impl Drop for BusyGuard {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

// ---------------------------------------------------------------------------
// View
// ---------------------------------------------------------------------------

/// A chart definition together with its window.
#[derive(Debug, Clone)]
pub struct Chart {
    pub spec: ChartSpec,
    pub sampler: TimeSeriesSampler,
}

impl Chart {
    pub fn new(spec: ChartSpec, clock: Arc<dyn Clock>) -> Self {
        Self {
            spec,
            sampler: TimeSeriesSampler::new(clock),
        }
    }

    pub fn window(&self) -> &Window {
        self.sampler.window()
    }

    pub fn ingest(&mut self, source: &impl StatSource) {
        let picked = self.spec.select(source.stat_fields());
        self.sampler
            .ingest(&picked, &self.spec.ignored, self.spec.max_samples);
    }
}

/// Immutable picture of the coordinator, published after every change.
#[derive(Debug, Clone, Default)]
pub struct View {
    pub state: SessionState,
    pub snapshot: Option<Arc<Snapshot>>,
    pub statistics: Option<Arc<Statistics>>,
    pub busy: bool,
    /// Countdown to the device's next effect change, if running.
    pub countdown: Option<Millis>,
    pub charts: Vec<Arc<Chart>>,
    /// A snapshot fetch is in flight.
    pub fetching: bool,
    /// Bumped on every publish.
    pub revision: u64,
}

impl View {
    pub fn chart(&self, name: &str) -> Option<&Chart> {
        self.charts
            .iter()
            .find(|c| c.spec.name == name)
            .map(|c| c.as_ref())
    }
}

// ---------------------------------------------------------------------------
// Events
// ---------------------------------------------------------------------------

enum Event {
    Open(bool),
    RequestRefresh,
    Reload,
    Command { command: Command, guard: BusyGuard },
    Shutdown,
    DebounceElapsed,
    SafetyElapsed(Generation),
    FetchSettled {
        generation: Generation,
        result: Result<Snapshot, GatewayError>,
    },
    CommandSettled {
        command: Command,
        result: Result<(), GatewayError>,
    },
    StatisticsSettled {
        generation: u64,
        result: Result<Statistics, GatewayError>,
    },
}

// ---------------------------------------------------------------------------
// Handle
// ---------------------------------------------------------------------------

struct Shared {
    tx: mpsc::UnboundedSender<Event>,
    busy: BusyFlag,
    view: watch::Receiver<View>,
}

impl Drop for Shared {
    fn drop(&mut self) {
        let _ = self.tx.send(Event::Shutdown);
    }
}

/// Cloneable front door to a running coordinator.
///
/// Every method returns immediately. Dropping the last handle stops the
/// coordinator.
#[derive(Clone)]
pub struct CoordinatorHandle {
    shared: Arc<Shared>,
}

impl std::fmt::Debug for CoordinatorHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CoordinatorHandle")
            .field("busy", &self.shared.busy.is_raised())
            .finish_non_exhaustive()
    }
}

impl CoordinatorHandle {
    fn send(&self, event: Event) {
        if self.shared.tx.send(event).is_err() {
            log::debug!("coordinator already stopped");
        }
    }

    pub fn open(&self, active: bool) {
        self.send(Event::Open(active));
    }

    pub fn request_refresh(&self) {
        self.send(Event::RequestRefresh);
    }

    /// Fetch now, superseding any fetch in flight.
    pub fn reload(&self) {
        self.send(Event::Reload);
    }

    /// Raise the busy flag and issue `command`.
    ///
    /// The flag is not checked first; interactive callers gate on
    /// [`CoordinatorHandle::is_busy`] themselves.
    pub fn submit(&self, command: Command) {
        let guard = self.shared.busy.raise();
        self.send(Event::Command { command, guard });
    }

    pub fn navigate_to(&self, index: usize) {
        self.submit(Command::NavigateTo(index));
    }

    pub fn set_enabled(&self, index: usize, enable: bool) {
        self.submit(Command::SetEnabled { index, enable });
    }

    pub fn step(&self, forward: bool) {
        self.submit(Command::Step { forward });
    }

    pub fn update_interval(&self, effect_interval: u64) {
        self.submit(Command::UpdateInterval(effect_interval));
    }

    pub fn shutdown(&self) {
        self.send(Event::Shutdown);
    }

    pub fn is_busy(&self) -> bool {
        self.shared.busy.is_raised()
    }

    /// Latest published view.
    pub fn view(&self) -> View {
        self.shared.view.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<View> {
        self.shared.view.clone()
    }
}

// ---------------------------------------------------------------------------
// Coordinator
// ---------------------------------------------------------------------------

struct InFlight {
    generation: u64,
    token: CancellationToken,
}

struct Coordinator<G> {
    gateway: Arc<G>,
    clock: Arc<dyn Clock>,
    sink: Arc<dyn NotificationSink>,
    config: EngineConfig,
    tx: mpsc::UnboundedSender<Event>,
    events: mpsc::UnboundedReceiver<Event>,
    view_tx: watch::Sender<View>,
    busy: BusyFlag,

    session: Session,
    fetch: Option<InFlight>,
    safety: Option<Scheduled>,
    debounce: Option<Scheduled>,

    countdown: CountdownTimer,
    countdown_ticks: Interval,

    polls_statistics: bool,
    statistics_ticks: Interval,
    statistics_seq: u64,
    statistics_fetch: Option<InFlight>,

    snapshot: Option<Arc<Snapshot>>,
    statistics: Option<Arc<Statistics>>,
    charts: Vec<Arc<Chart>>,
    revision: u64,
}

/// Start a coordinator on the current tokio runtime.
///
/// The session starts closed; call [`CoordinatorHandle::open`] to begin
/// polling.
pub fn spawn<G, S>(
    gateway: G,
    sink: S,
    clock: Arc<dyn Clock>,
    config: EngineConfig,
) -> (CoordinatorHandle, JoinHandle<()>)
where
    G: RequestGateway,
    S: NotificationSink,
{
    let (tx, events) = mpsc::unbounded_channel();
    let charts: Vec<Arc<Chart>> = config
        .charts
        .iter()
        .cloned()
        .map(|spec| Arc::new(Chart::new(spec, clock.clone())))
        .collect();
    let (view_tx, view_rx) = watch::channel(View {
        charts: charts.clone(),
        ..View::default()
    });
    let busy = BusyFlag::default();

    let coordinator = Coordinator {
        gateway: Arc::new(gateway),
        sink: Arc::new(sink),
        countdown: CountdownTimer::new(clock.clone(), config.countdown_threshold_ms),
        clock,
        countdown_ticks: ticker(config.countdown_tick()),
        polls_statistics: config.polls_statistics(),
        statistics_ticks: ticker(config.statistics_interval().unwrap_or(config.countdown_tick())),
        statistics_seq: 0,
        statistics_fetch: None,
        config,
        tx: tx.clone(),
        events,
        view_tx,
        busy: busy.clone(),
        session: Session::new(),
        fetch: None,
        safety: None,
        debounce: None,
        snapshot: None,
        statistics: None,
        charts,
        revision: 0,
    };
    let task = tokio::spawn(coordinator.run());

    let handle = CoordinatorHandle {
        shared: Arc::new(Shared {
            tx,
            busy,
            view: view_rx,
        }),
    };
    (handle, task)
}

impl<G: RequestGateway> Coordinator<G> {
    async fn run(mut self) {
        loop {
            tokio::select! {
                event = self.events.recv() => {
                    match event {
                        Some(Event::Shutdown) | None => break,
                        Some(event) => self.handle(event),
                    }
                }
                _ = self.countdown_ticks.tick(), if self.countdown.needs_ticks() => {
                    self.on_countdown_tick();
                }
                _ = self.statistics_ticks.tick(), if self.polls_statistics && self.session.is_open() => {
                    self.poll_statistics();
                }
            }
            self.publish();
        }
        self.close();
        log::debug!("coordinator stopped");
    }

    fn handle(&mut self, event: Event) {
        match event {
            Event::Open(active) => {
                log::info!("session {}", if active { "opened" } else { "closed" });
                if active {
                    let actions = self.session.open(true);
                    self.apply(actions);
                    if self.polls_statistics {
                        self.poll_statistics();
                        self.statistics_ticks.reset();
                    }
                } else {
                    self.close();
                }
            }
            Event::RequestRefresh => {
                let actions = self.session.request_refresh();
                self.apply(actions);
            }
            Event::Reload => {
                let actions = self.session.reload();
                self.apply(actions);
            }
            Event::DebounceElapsed => {
                self.debounce = None;
                let actions = self.session.debounce_elapsed();
                self.apply(actions);
            }
            Event::SafetyElapsed(generation) => {
                log::debug!("fetch #{generation} unresolved after safety timeout");
                let actions = self.session.safety_elapsed(generation);
                self.apply(actions);
            }
            Event::FetchSettled { generation, result } => self.on_fetch(generation, result),
            Event::Command { command, guard } => self.run_command(command, guard),
            Event::CommandSettled { command, result } => match result {
                Ok(()) => {
                    log::debug!("{command} acknowledged");
                    let actions = self.session.request_refresh();
                    self.apply(actions);
                }
                Err(e) if e.is_cancelled() => {}
                Err(e) => {
                    log::warn!("{command} failed: {e}");
                    self.report(SOURCE_DESIGNER, command.operation(), &e);
                }
            },
            Event::StatisticsSettled { generation, result } => {
                self.on_statistics(generation, result)
            }
            Event::Shutdown => {}
        }
    }

    fn close(&mut self) {
        let actions = self.session.open(false);
        self.apply(actions);
        if let Some(stats) = self.statistics_fetch.take() {
            stats.token.cancel();
        }
        self.countdown.deactivate();
    }

    fn apply(&mut self, actions: Vec<Action>) {
        for action in actions {
            match action {
                Action::StartFetch(generation) => self.start_fetch(generation),
                Action::CancelFetch(generation) => {
                    if let Some(fetch) = self.fetch.take() {
                        if fetch.generation == generation {
                            log::debug!("fetch #{generation} superseded");
                            fetch.token.cancel();
                        } else {
                            self.fetch = Some(fetch);
                        }
                    }
                }
                Action::ArmSafetyTimer(generation) => {
                    self.safety = Some(Scheduled::after(
                        self.config.safety_timeout(),
                        self.tx.clone(),
                        Event::SafetyElapsed(generation),
                    ));
                }
                Action::DisarmSafetyTimer => self.safety = None,
                Action::ArmDebounce => {
                    self.debounce = Some(Scheduled::after(
                        self.config.refresh_debounce(),
                        self.tx.clone(),
                        Event::DebounceElapsed,
                    ));
                }
                Action::DisarmDebounce => self.debounce = None,
            }
        }
    }

    fn start_fetch(&mut self, generation: Generation) {
        let token = CancellationToken::new();
        let cancelled = token.clone();
        let gateway = self.gateway.clone();
        let tx = self.tx.clone();
        tokio::spawn(async move {
            // A result that is already in hand is still delivered and meets
            // the generation check like any other.
            let result = tokio::select! {
                biased;
                result = gateway.fetch_snapshot() => result,
                _ = cancelled.cancelled() => Err(GatewayError::Cancelled),
            };
            let _ = tx.send(Event::FetchSettled { generation, result });
        });
        self.fetch = Some(InFlight { generation, token });
    }

    fn on_fetch(&mut self, generation: Generation, result: Result<Snapshot, GatewayError>) {
        if self.fetch.as_ref().is_some_and(|f| f.generation == generation) {
            self.fetch = None;
        }
        match result {
            Ok(snapshot) => {
                let Some(actions) = self.session.snapshot_received(generation) else {
                    log::debug!("discarding stale snapshot #{generation}");
                    return;
                };
                self.apply(actions);
                self.apply_snapshot(snapshot);
            }
            Err(e) => {
                let Some(actions) = self.session.fetch_failed(generation) else {
                    return;
                };
                self.apply(actions);
                if !e.is_cancelled() {
                    log::warn!("snapshot fetch failed: {e}");
                    self.report(SOURCE_DESIGNER, "fetchSnapshot", &e);
                }
            }
        }
    }

    fn apply_snapshot(&mut self, snapshot: Snapshot) {
        if self.countdown.activate(snapshot.milliseconds_remaining) {
            self.countdown_ticks.reset();
        }
        for chart in &mut self.charts {
            if chart.spec.source == ChartSource::Snapshot {
                Arc::make_mut(chart).ingest(&snapshot);
            }
        }
        self.snapshot = Some(Arc::new(snapshot));
    }

    fn on_countdown_tick(&mut self) {
        if self.countdown.tick().expired() {
            log::debug!("countdown expiring, requesting refresh");
            let actions = self.session.request_refresh();
            self.apply(actions);
        }
    }

    fn run_command(&mut self, command: Command, guard: BusyGuard) {
        log::debug!("issuing {command}");
        let gateway = self.gateway.clone();
        let tx = self.tx.clone();
        tokio::spawn(async move {
            let result = command.send(gateway.as_ref()).await;
            drop(guard);
            let _ = tx.send(Event::CommandSettled { command, result });
        });
    }

    fn poll_statistics(&mut self) {
        if self.statistics_fetch.is_some() {
            return;
        }
        self.statistics_seq += 1;
        let generation = self.statistics_seq;
        let token = CancellationToken::new();
        let cancelled = token.clone();
        let gateway = self.gateway.clone();
        let tx = self.tx.clone();
        tokio::spawn(async move {
            let result = tokio::select! {
                _ = cancelled.cancelled() => Err(GatewayError::Cancelled),
                result = gateway.fetch_statistics() => result,
            };
            let _ = tx.send(Event::StatisticsSettled { generation, result });
        });
        self.statistics_fetch = Some(InFlight { generation, token });
    }

    fn on_statistics(&mut self, generation: u64, result: Result<Statistics, GatewayError>) {
        match &self.statistics_fetch {
            Some(f) if f.generation == generation => self.statistics_fetch = None,
            _ => return,
        }
        match result {
            Ok(statistics) => {
                for chart in &mut self.charts {
                    if chart.spec.source == ChartSource::Statistics {
                        Arc::make_mut(chart).ingest(&statistics);
                    }
                }
                self.statistics = Some(Arc::new(statistics));
            }
            Err(e) if e.is_cancelled() => {}
            Err(e) => {
                log::warn!("statistics fetch failed: {e}");
                self.report(SOURCE_STATISTICS, "fetchStatistics", &e);
            }
        }
    }

    fn report(&self, source: &str, operation: &str, error: &GatewayError) {
        let at = self.clock.now();
        self.sink
            .notify(Notification::error(source, operation, error, at));
    }

    fn publish(&mut self) {
        self.revision += 1;
        let view = View {
            state: self.session.state(),
            snapshot: self.snapshot.clone(),
            statistics: self.statistics.clone(),
            busy: self.busy.is_raised(),
            countdown: self.countdown.display(),
            charts: self.charts.clone(),
            fetching: self.session.live().is_some(),
            revision: self.revision,
        };
        self.view_tx.send_replace(view);
    }
}
