//! Drives one session: position tracking, relay polling and the match clock
//! run as independent tasks that all stop the moment the session ends.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use futures_util::{StreamExt, stream::FuturesUnordered};
use tokio::{
    sync::{mpsc, watch},
    task::JoinSet,
    time::{MissedTickBehavior, interval},
};

use crate::{
    clock::Clock,
    game::{
        GameRules, LocalGameSession, Outcome, PlayerIdentity, SessionRequest, StartError,
        evaluate_cycle, evaluate_survival, outcome::Countdown, session::generate_player_id,
    },
    location::{FixQuality, GeolocationProvider, LocationFix, LocationOptions, LocationSubscription, ProviderError},
    relay::RelayClient,
    render::{MapMarkers, MarkerSink},
};

/// Things a UI should tell the player about.
#[derive(Clone, Debug, PartialEq)]
pub enum SessionEvent {
    FixAccepted { fix: LocationFix, quality: FixQuality },
    /// The fix was too inaccurate; the previous position is kept.
    FixRejected { accuracy: f64 },
    ProviderFailed(ProviderError),
    /// A poll cycle was skipped; the next one retries.
    RelayFailed(String),
    PlayerCount(usize),
    OpponentsVisible(usize),
    Countdown(Countdown),
    Ended(Outcome),
}

struct ClientState {
    session: LocalGameSession,
    markers: MapMarkers,
    sink: Box<dyn MarkerSink>,
}

struct Shared {
    state: Mutex<ClientState>,
    rules: GameRules,
    relay: Arc<dyn RelayClient>,
    clock: Arc<dyn Clock>,
    events: mpsc::UnboundedSender<SessionEvent>,
    ended: watch::Sender<Option<Outcome>>,
}

impl Shared {
    fn lock(&self) -> MutexGuard<'_, ClientState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn emit(&self, event: SessionEvent) {
        // nobody listening is fine
        let _ = self.events.send(event);
    }

    /// End the session if it is still active. Markers are cleared and every
    /// task is told to stop.
    fn finish(&self, state: &mut ClientState, outcome: Outcome) {
        if !state.session.end(outcome.clone()) {
            return;
        }

        let ClientState { markers, sink, .. } = state;
        markers.clear(sink.as_mut());

        self.emit(SessionEvent::Ended(outcome.clone()));
        self.ended.send_replace(Some(outcome));
    }
}

/// Handle to a running session. Dropping it stops every task.
pub struct SessionRunner {
    shared: Arc<Shared>,
    identity: PlayerIdentity,
    tasks: JoinSet<()>,
}

pub struct SessionDeps {
    pub provider: Arc<dyn GeolocationProvider>,
    pub relay: Arc<dyn RelayClient>,
    pub sink: Box<dyn MarkerSink>,
    pub clock: Arc<dyn Clock>,
}

impl SessionRunner {
    /// Validate `request`, start the session and spawn its tasks on the
    /// current tokio runtime.
    pub fn start(
        request: &SessionRequest,
        rules: GameRules,
        deps: SessionDeps,
    ) -> Result<(Self, mpsc::UnboundedReceiver<SessionEvent>), StartError> {
        let mut session = LocalGameSession::new();
        let identity = session
            .start(request, generate_player_id(), deps.clock.now_ms())?
            .clone();

        let (events, event_rx) = mpsc::unbounded_channel();
        let (ended, _) = watch::channel(None);

        let subscription = deps.provider.watch(LocationOptions::fresh(rules.fix_timeout()));

        let shared = Arc::new(Shared {
            state: Mutex::new(ClientState {
                session,
                markers: MapMarkers::new(),
                sink: deps.sink,
            }),
            rules,
            relay: deps.relay,
            clock: deps.clock,
            events,
            ended,
        });

        let mut tasks = JoinSet::new();
        tasks.spawn(track_location(Arc::clone(&shared), subscription));
        tasks.spawn(poll_relay(Arc::clone(&shared)));
        tasks.spawn(run_clock(Arc::clone(&shared)));

        Ok((
            Self {
                shared,
                identity,
                tasks,
            },
            event_rx,
        ))
    }

    pub fn identity(&self) -> &PlayerIdentity {
        &self.identity
    }

    /// A copy of the session as it is right now.
    pub fn session(&self) -> LocalGameSession {
        self.shared.lock().session.clone()
    }

    /// Wait for the session to end on its own, then stop all tasks.
    pub async fn finished(&mut self) -> Outcome {
        let mut ended = self.shared.ended.subscribe();
        let outcome = match ended.wait_for(Option::is_some).await {
            Ok(outcome) => outcome.clone(),
            Err(_) => None,
        };
        self.stop();

        // the sender lives in `shared`, so the wait above cannot fail
        outcome.unwrap_or(Outcome::Left)
    }

    /// Quit voluntarily. Tasks are stopped before this returns.
    pub fn leave(&mut self) -> Outcome {
        {
            let mut state = self.shared.lock();
            self.shared.finish(&mut state, Outcome::Left);
        }
        self.stop();

        self.shared
            .lock()
            .session
            .outcome()
            .cloned()
            .unwrap_or(Outcome::Left)
    }

    fn stop(&mut self) {
        self.tasks.abort_all();
    }
}

/// Resolves once the session has ended.
async fn session_ended(shared: &Shared) {
    let mut ended = shared.ended.subscribe();
    let _ = ended.wait_for(Option::is_some).await;
}

async fn track_location(shared: Arc<Shared>, mut subscription: LocationSubscription) {
    loop {
        let sample = tokio::select! {
            sample = subscription.next() => sample,
            () = session_ended(&shared) => break,
        };
        let Some(sample) = sample else {
            tracing::warn!("location provider went away");
            break;
        };

        match sample {
            Ok(fix) => accept_fix(&shared, fix),
            Err(error) => {
                tracing::warn!(%error, "location provider error");
                shared.emit(SessionEvent::ProviderFailed(error));
            }
        }
    }
    // subscription dropped here, releasing the provider
}

fn accept_fix(shared: &Shared, fix: LocationFix) {
    let mut state = shared.lock();
    if !state.session.is_active() {
        return;
    }

    let quality = state.session.accept_fix(fix, &shared.rules);
    if !quality.is_accepted() {
        tracing::debug!(accuracy = fix.accuracy, "discarding inaccurate fix");
        shared.emit(SessionEvent::FixRejected {
            accuracy: fix.accuracy,
        });
        return;
    }

    let ClientState {
        session,
        markers,
        sink,
    } = &mut *state;
    if let Some(identity) = session.identity() {
        markers.show_own(identity, &fix, sink.as_mut());
    }
    shared.emit(SessionEvent::FixAccepted { fix, quality });
}

/// Push then pull on every tick. A slow cycle never delays the next tick;
/// overlapping cycles apply their results in completion order.
async fn poll_relay(shared: Arc<Shared>) {
    let mut ticker = interval(shared.rules.poll_interval());
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    let mut in_flight = FuturesUnordered::new();

    loop {
        tokio::select! {
            _ = ticker.tick() => in_flight.push(run_cycle(Arc::clone(&shared))),
            Some(()) = in_flight.next(), if !in_flight.is_empty() => {}
            () = session_ended(&shared) => break,
        }
    }
}

async fn run_cycle(shared: Arc<Shared>) {
    let (own_record, game_code) = {
        let state = shared.lock();
        let Some(identity) = state.session.identity().filter(|_| state.session.is_active()) else {
            return;
        };
        (state.session.own_record(), identity.game_code.clone())
    };

    if let Some(record) = own_record {
        match shared.relay.update_location(&record).await {
            Ok(response) => shared.emit(SessionEvent::PlayerCount(response.player_count)),
            Err(error) => {
                tracing::warn!(%error, "failed to push position");
                shared.emit(SessionEvent::RelayFailed(error.to_string()));
                return;
            }
        }
    }

    let snapshot = match shared.relay.locations(&game_code).await {
        Ok(snapshot) => snapshot,
        Err(error) => {
            tracing::warn!(%error, "failed to fetch positions");
            shared.emit(SessionEvent::RelayFailed(error.to_string()));
            return;
        }
    };

    let now = shared.clock.now_ms();
    let mut state = shared.lock();
    if !state.session.is_active() {
        return;
    }

    let report = evaluate_cycle(&state.session, &snapshot, &shared.rules, now);
    tracing::debug!(
        total = snapshot.len(),
        visible = report.visible.len(),
        "evaluated snapshot"
    );

    let ClientState { markers, sink, .. } = &mut *state;
    markers.show_opponents(&report.visible, sink.as_mut());
    shared.emit(SessionEvent::OpponentsVisible(report.visible.len()));

    if let Some(outcome) = report.outcome {
        shared.finish(&mut state, outcome);
    }
}

async fn run_clock(shared: Arc<Shared>) {
    let mut ticker = interval(shared.rules.tick_interval());
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        tokio::select! {
            _ = ticker.tick() => {}
            () = session_ended(&shared) => break,
        }

        let now = shared.clock.now_ms();
        let mut state = shared.lock();
        if !state.session.is_active() {
            break;
        }

        let start_time = state.session.start_time();
        shared.emit(SessionEvent::Countdown(Countdown::at(start_time, now, &shared.rules)));

        if evaluate_survival(start_time, now, &shared.rules) {
            shared.finish(&mut state, Outcome::Timeout);
            break;
        }
    }
}

#[cfg(test)]
mod tests {
    use std::{
        collections::HashMap,
        sync::atomic::{AtomicBool, AtomicUsize, Ordering},
        time::Duration,
    };

    use api_types::{PlayerPosition, Role, UpdateLocationResponse};
    use tokio::sync::mpsc::Sender;

    use super::*;
    use crate::{
        clock::ManualClock,
        distance::EARTH_RADIUS_METERS,
        location::LocationSample,
        relay::{NetworkError, RelayFuture},
        render::Marker,
    };

    const T0: i64 = 1_700_000_000_000;

    /// Relay that keeps positions in a map, like the real one. Fetches can be
    /// slowed down to simulate a congested network.
    #[derive(Default)]
    struct MemoryRelay {
        positions: Mutex<HashMap<String, PlayerPosition>>,
        offline: AtomicBool,
        fetch_delay: Mutex<Duration>,
        fetches_started: AtomicUsize,
        fetches_finished: AtomicUsize,
    }

    impl MemoryRelay {
        fn insert(&self, position: PlayerPosition) {
            self.positions
                .lock()
                .unwrap()
                .insert(position.player_id.clone(), position);
        }

        fn offline_error() -> NetworkError {
            NetworkError::Status {
                status: 503,
                message: "offline".into(),
            }
        }

        fn is_offline(&self) -> bool {
            self.offline.load(Ordering::SeqCst)
        }

        fn slow_down(&self, delay: Duration) {
            *self.fetch_delay.lock().unwrap() = delay;
        }

        fn fetches(&self) -> (usize, usize) {
            (
                self.fetches_started.load(Ordering::SeqCst),
                self.fetches_finished.load(Ordering::SeqCst),
            )
        }
    }

    impl RelayClient for MemoryRelay {
        fn update_location<'a>(
            &'a self,
            position: &'a PlayerPosition,
        ) -> RelayFuture<'a, UpdateLocationResponse> {
            Box::pin(async move {
                if self.is_offline() {
                    return Err(Self::offline_error());
                }
                self.insert(position.clone());
                Ok(UpdateLocationResponse {
                    success: true,
                    player_count: self.positions.lock().unwrap().len(),
                })
            })
        }

        fn locations<'a>(&'a self, _game_code: &'a str) -> RelayFuture<'a, Vec<PlayerPosition>> {
            Box::pin(async move {
                self.fetches_started.fetch_add(1, Ordering::SeqCst);
                let delay = *self.fetch_delay.lock().unwrap();
                tokio::time::sleep(delay).await;

                if self.is_offline() {
                    return Err(Self::offline_error());
                }
                let snapshot = self.positions.lock().unwrap().values().cloned().collect();
                self.fetches_finished.fetch_add(1, Ordering::SeqCst);
                Ok(snapshot)
            })
        }
    }

    /// Provider fed by the test through a channel.
    struct ChannelProvider {
        sender: Mutex<Option<Sender<LocationSample>>>,
    }

    impl ChannelProvider {
        fn new() -> Self {
            Self {
                sender: Mutex::new(None),
            }
        }

        fn sender(&self) -> Sender<LocationSample> {
            self.sender.lock().unwrap().clone().unwrap()
        }
    }

    impl GeolocationProvider for ChannelProvider {
        fn watch(&self, options: LocationOptions) -> LocationSubscription {
            assert!(options.high_accuracy);
            assert_eq!(options.maximum_age, Duration::ZERO);

            let (sender, subscription) = LocationSubscription::channel(16);
            *self.sender.lock().unwrap() = Some(sender);
            subscription
        }
    }

    #[derive(Clone, Default)]
    struct SharedSink(Arc<Mutex<Vec<String>>>);

    impl MarkerSink for SharedSink {
        fn add_marker(&mut self, marker: &Marker) {
            self.0.lock().unwrap().push(format!("add {}", marker.id));
        }

        fn update_marker(&mut self, marker: &Marker) {
            self.0.lock().unwrap().push(format!("update {}", marker.id));
        }

        fn remove_marker(&mut self, id: &str) {
            self.0.lock().unwrap().push(format!("remove {id}"));
        }
    }

    struct Harness {
        provider: Arc<ChannelProvider>,
        relay: Arc<MemoryRelay>,
        sink: SharedSink,
        clock: Arc<ManualClock>,
    }

    impl Harness {
        fn new() -> Self {
            Self {
                provider: Arc::new(ChannelProvider::new()),
                relay: Arc::new(MemoryRelay::default()),
                sink: SharedSink::default(),
                clock: Arc::new(ManualClock::new(T0)),
            }
        }

        fn start(
            &self,
            role: Role,
            rules: GameRules,
        ) -> (SessionRunner, mpsc::UnboundedReceiver<SessionEvent>) {
            let request = SessionRequest {
                player_name: "Me".into(),
                game_code: "game1".into(),
                role: Some(role),
            };
            let deps = SessionDeps {
                provider: self.provider.clone(),
                relay: self.relay.clone(),
                sink: Box::new(self.sink.clone()),
                clock: self.clock.clone(),
            };
            SessionRunner::start(&request, rules, deps).unwrap()
        }
    }

    fn hunted(id: &str, lat: f64, timestamp: i64) -> PlayerPosition {
        PlayerPosition {
            player_id: id.into(),
            player_name: id.to_uppercase(),
            role: Role::Hunted,
            game_code: "GAME1".into(),
            lat,
            lon: 0.0,
            accuracy: 10.0,
            timestamp,
        }
    }

    fn drain(events: &mut mpsc::UnboundedReceiver<SessionEvent>) -> Vec<SessionEvent> {
        let mut out = Vec::new();
        while let Ok(event) = events.try_recv() {
            out.push(event);
        }
        out
    }

    #[tokio::test(start_paused = true)]
    async fn test_hunter_captures_delayed_opponent() {
        let harness = Harness::new();
        let five_meters = (5.0 / EARTH_RADIUS_METERS).to_degrees();

        // K reported five meters north, long enough ago to be visible
        harness.relay.insert(hunted("k", five_meters, T0 - 120_000));

        let (mut runner, mut events) = harness.start(Role::Hunter, GameRules::default());
        harness
            .provider
            .sender()
            .send(Ok(LocationFix::new(0.0, 0.0, 10.0, T0)))
            .await
            .unwrap();

        let outcome = tokio::time::timeout(Duration::from_secs(30), runner.finished())
            .await
            .unwrap();

        match &outcome {
            Outcome::Victory {
                opponent_id,
                distance_m,
                ..
            } => {
                assert_eq!(opponent_id, "k");
                assert!((distance_m - 5.0).abs() < 0.01);
            }
            other => panic!("expected victory, got {other:?}"),
        }

        let events = drain(&mut events);
        assert!(events.iter().any(|e| matches!(e, SessionEvent::Ended(Outcome::Victory { .. }))));
        assert!(!runner.session().is_active());

        // H's own position made it to the relay
        assert!(harness.relay.positions.lock().unwrap().contains_key(&runner.identity().player_id));
    }

    #[tokio::test(start_paused = true)]
    async fn test_young_opponent_is_not_captured() {
        let harness = Harness::new();
        harness.relay.insert(hunted("k", 0.0, T0 - 60_000));

        let (runner, mut events) = harness.start(Role::Hunter, GameRules::default());
        harness
            .provider
            .sender()
            .send(Ok(LocationFix::new(0.0, 0.0, 10.0, T0)))
            .await
            .unwrap();

        tokio::time::sleep(Duration::from_secs(12)).await;

        assert!(runner.session().is_active());
        let events = drain(&mut events);
        assert!(events.contains(&SessionEvent::OpponentsVisible(0)));
        assert!(!harness.sink.0.lock().unwrap().contains(&"add opponent:k".to_string()));
    }

    #[tokio::test(start_paused = true)]
    async fn test_inaccurate_fix_is_reported_and_ignored() {
        let harness = Harness::new();
        let (runner, mut events) = harness.start(Role::Hunted, GameRules::default());

        let sender = harness.provider.sender();
        sender
            .send(Ok(LocationFix::new(1.0, 1.0, 250.0, T0)))
            .await
            .unwrap();
        sender.send(Err(ProviderError::Timeout)).await.unwrap();
        tokio::time::sleep(Duration::from_millis(100)).await;

        assert!(runner.session().last_known_position().is_none());
        let events = drain(&mut events);
        assert!(events.contains(&SessionEvent::FixRejected { accuracy: 250.0 }));
        assert!(events.contains(&SessionEvent::ProviderFailed(ProviderError::Timeout)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_hunted_survives_timeout() {
        let harness = Harness::new();
        let rules = GameRules {
            game_duration_ms: 3_000,
            ..GameRules::default()
        };
        let (mut runner, _events) = harness.start(Role::Hunted, rules);

        let clock = harness.clock.clone();
        tokio::spawn(async move {
            for _ in 0..5 {
                tokio::time::sleep(Duration::from_secs(1)).await;
                clock.advance(1_000);
            }
        });

        let outcome = tokio::time::timeout(Duration::from_secs(30), runner.finished())
            .await
            .unwrap();
        assert_eq!(outcome, Outcome::Timeout);
    }

    #[tokio::test(start_paused = true)]
    async fn test_relay_failure_skips_cycle() {
        let harness = Harness::new();
        harness
            .relay
            .offline
            .store(true, Ordering::SeqCst);

        let (runner, mut events) = harness.start(Role::Hunter, GameRules::default());
        tokio::time::sleep(Duration::from_secs(6)).await;

        assert!(runner.session().is_active());
        let events = drain(&mut events);
        assert!(events.iter().any(|e| matches!(e, SessionEvent::RelayFailed(_))));
    }

    #[tokio::test(start_paused = true)]
    async fn test_leave_stops_everything() {
        let harness = Harness::new();
        harness.relay.insert(hunted("k", 0.0, T0 - 500_000));

        let (mut runner, mut events) = harness.start(Role::Hunter, GameRules::default());
        tokio::time::sleep(Duration::from_secs(1)).await;
        assert!(harness.sink.0.lock().unwrap().contains(&"add opponent:k".to_string()));

        assert_eq!(runner.leave(), Outcome::Left);
        tokio::time::sleep(Duration::from_millis(10)).await;

        // provider subscription released
        assert!(harness.provider.sender().is_closed());
        assert!(harness.sink.0.lock().unwrap().contains(&"remove opponent:k".to_string()));

        drain(&mut events);
        tokio::time::sleep(Duration::from_secs(20)).await;
        assert!(drain(&mut events).is_empty());
        assert_eq!(runner.session().outcome(), Some(&Outcome::Left));
    }

    #[tokio::test(start_paused = true)]
    async fn test_slow_relay_does_not_hold_back_next_poll() {
        let harness = Harness::new();
        harness.relay.insert(hunted("k", 0.0, T0 - 500_000));
        harness.relay.slow_down(Duration::from_secs(12));

        let (runner, mut events) = harness.start(Role::Hunter, GameRules::default());

        // the 5s tick fires while the first fetch is still outstanding
        tokio::time::sleep(Duration::from_millis(5_500)).await;
        assert_eq!(harness.relay.fetches(), (2, 0));
        assert!(
            !drain(&mut events)
                .iter()
                .any(|e| matches!(e, SessionEvent::OpponentsVisible(_)))
        );

        // first cycle lands at 12s, with two more still in flight
        tokio::time::sleep(Duration::from_secs(7)).await;
        assert_eq!(harness.relay.fetches(), (3, 1));
        assert!(drain(&mut events).contains(&SessionEvent::OpponentsVisible(1)));
        assert!(harness.sink.0.lock().unwrap().contains(&"add opponent:k".to_string()));
        assert!(runner.session().is_active());
    }

    #[tokio::test(start_paused = true)]
    async fn test_cycle_completing_after_leave_is_discarded() {
        let harness = Harness::new();
        harness.relay.insert(hunted("k", 0.0, T0 - 500_000));
        harness.relay.slow_down(Duration::from_secs(3));

        let (mut runner, mut events) = harness.start(Role::Hunter, GameRules::default());
        // outside the runner's task set, so leaving cannot abort it
        let late = tokio::spawn(run_cycle(Arc::clone(&runner.shared)));

        tokio::time::sleep(Duration::from_secs(1)).await;
        assert_eq!(runner.leave(), Outcome::Left);
        let commands_at_leave = harness.sink.0.lock().unwrap().clone();
        drain(&mut events);

        late.await.unwrap();
        // the runner's own cycle was aborted; only the detached one finished
        assert_eq!(harness.relay.fetches(), (2, 1));
        assert_eq!(*harness.sink.0.lock().unwrap(), commands_at_leave);
        assert!(drain(&mut events).is_empty());
        assert_eq!(runner.session().outcome(), Some(&Outcome::Left));
    }
}
