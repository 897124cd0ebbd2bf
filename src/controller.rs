//! Kiosk display controller
//!
//! Owns the display session, every timer chain and the input gate. All host
//! callbacks, timer firings and shutdown requests are fed through
//! [`Controller::handle`] one at a time by [`run`], so none of this state
//! needs a lock.

use std::panic::{self, AssertUnwindSafe};
use std::time::Duration;

use anyhow::{Context, Result};
use tokio::time::Instant;
use tracing::{debug, error, info, trace, warn};

use crate::config::KioskConfig;
use crate::css::LayoutOverride;
use crate::events::{
    EventReceiver, EventSender, HostEvent, KioskEvent, ProcessGoneDetails, ShutdownReason,
};
use crate::input_gate::{InputGate, InputVerdict, KeyInput};
use crate::recovery::{self, RecoveryAction};
use crate::schedule::{ReloadScheduler, WallClock};
use crate::session::{DisplaySession, ReloadOutcome};
use crate::surface::{DisplaySurface, HostRuntime, SurfaceOptions, WindowOpenDecision};
use crate::timers::{TimerFired, TimerKind, Timers};

/// Timers that belong to one display session
const SESSION_TIMERS: [TimerKind; 3] = [
    TimerKind::LegacyReload,
    TimerKind::LoadRetry,
    TimerKind::LayoutSettle,
];

/// Whether the loop keeps running after an event
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    Continue,
    Exit,
}

pub struct Controller<H: HostRuntime> {
    config: KioskConfig,
    host: H,
    events: EventSender,
    session: Option<DisplaySession<H::Surface>>,
    timers: Timers,
    scheduler: ReloadScheduler,
    gate: InputGate,
    layout: LayoutOverride,
    shutdown: Option<ShutdownReason>,
}

impl<H: HostRuntime> Controller<H> {
    pub fn new(
        config: KioskConfig,
        host: H,
        events: EventSender,
        clock: Box<dyn WallClock>,
    ) -> Self {
        // Selectors are validated once; rejections are logged here.
        let layout = LayoutOverride::from_config(&config);
        info!(
            accepted = config.hide_selectors.len() - layout.rejected.len(),
            rejected = layout.rejected.len(),
            "Built layout override"
        );

        Self {
            scheduler: ReloadScheduler::new(config.reload_schedule.clone(), clock),
            gate: InputGate::from_config(&config),
            timers: Timers::new(events.clone()),
            layout,
            config,
            host,
            events,
            session: None,
            shutdown: None,
        }
    }

    /// Create the display session and start the reload schedule
    pub fn start(&mut self) -> Result<()> {
        self.activate().context("Failed to create display surface")?;
        if self.scheduler.enabled() {
            self.scheduler.tick(&mut self.timers);
        } else {
            info!("[Reload Schedule] Disabled in config");
        }
        Ok(())
    }

    pub fn shutdown_reason(&self) -> Option<&ShutdownReason> {
        self.shutdown.as_ref()
    }

    pub fn handle(&mut self, event: KioskEvent) -> Result<Flow> {
        if self.shutdown.is_some() {
            trace!(event = ?event, "Ignoring event after shutdown");
            return Ok(Flow::Exit);
        }

        match event {
            KioskEvent::Host(event) => self.handle_host(event),
            KioskEvent::Timer(fired) => {
                self.handle_timer(fired);
                Ok(Flow::Continue)
            }
            KioskEvent::Shutdown(reason) => Ok(self.shut_down(reason)),
        }
    }

    fn handle_host(&mut self, event: HostEvent) -> Result<Flow> {
        match event {
            HostEvent::SurfaceReady => self.on_surface_ready(),
            HostEvent::LoadFinished => self.on_load_finished(),
            HostEvent::LoadFailed { code, description } => self.on_load_failed(code, &description),
            HostEvent::ProcessGone(details) => self.on_process_gone(&details),
            HostEvent::Input(input) => return Ok(self.on_input(&input)),
            HostEvent::WindowOpenRequest { url } => self.on_window_open(&url),
            HostEvent::Closed => return Ok(self.on_closed()),
            HostEvent::Activate => self.activate()?,
        }
        Ok(Flow::Continue)
    }

    fn activate(&mut self) -> Result<()> {
        if self.session.is_some() {
            debug!("Activation with live session, nothing to do");
            return Ok(());
        }
        let options = SurfaceOptions::from_config(&self.config);
        let surface = self
            .host
            .create_surface(&options, self.events.clone())
            .context("Host failed to create display surface")?;
        info!(
            width = options.width,
            height = options.height,
            fullscreen = options.fullscreen,
            "Created display surface"
        );
        self.session = Some(DisplaySession::new(surface));
        Ok(())
    }

    fn on_surface_ready(&mut self) {
        let Some(session) = self.session.as_mut() else {
            warn!("Surface ready without a session");
            return;
        };
        session.mark_live();
        info!(url = %self.config.url, "Loading URL: {}", self.config.url);
        self.load_display_url();
    }

    /// Issue the configured load; a load that cannot even start is retried
    fn load_display_url(&mut self) {
        let Some(session) = self.session.as_mut() else {
            return;
        };
        if let Err(e) = session.load(&self.config.url, Instant::now()) {
            error!(url = %self.config.url, error = ?e, "Failed to start load");
            self.timers.arm(TimerKind::LoadRetry, crate::constants::timing::LOAD_RETRY_DELAY);
        }
    }

    fn on_load_finished(&mut self) {
        let Some(session) = self.session.as_mut() else {
            return;
        };
        session.navigation_settled();
        info!("Page loaded successfully");

        self.timers.arm(
            TimerKind::LayoutSettle,
            Duration::from_millis(self.config.layout_settle_delay),
        );

        if self.config.legacy_reload_enabled() {
            // Re-armed on every load; the previous repeat is replaced.
            self.timers.arm(
                TimerKind::LegacyReload,
                Duration::from_millis(self.config.reload_interval),
            );
        }
    }

    fn on_load_failed(&mut self, code: i32, description: &str) {
        if let Some(session) = self.session.as_mut() {
            session.navigation_settled();
        }
        match recovery::on_load_failed(code, description) {
            RecoveryAction::RetryLoadAfter(delay) => self.timers.arm(TimerKind::LoadRetry, delay),
            RecoveryAction::ReloadNow => self.request_reload("load failure"),
            RecoveryAction::Nothing => {}
        }
    }

    fn on_process_gone(&mut self, details: &ProcessGoneDetails) {
        if let Some(session) = self.session.as_mut() {
            session.navigation_settled();
        }
        match recovery::on_process_gone(details, self.session.is_some()) {
            RecoveryAction::ReloadNow => self.request_reload("renderer recovery"),
            RecoveryAction::RetryLoadAfter(delay) => self.timers.arm(TimerKind::LoadRetry, delay),
            RecoveryAction::Nothing => debug!("No surface to recover"),
        }
    }

    fn on_input(&mut self, input: &KeyInput) -> Flow {
        let verdict = self.gate.decide(input);
        match verdict {
            InputVerdict::Terminate => {
                info!(key = %input.key, "Secret exit triggered. Quitting...");
                return self.shut_down(ShutdownReason::DebugExit);
            }
            InputVerdict::Suppress => {
                debug!(
                    key = %input.key,
                    control = input.control,
                    meta = input.meta,
                    alt = input.alt,
                    "Blocked shortcut"
                );
            }
            InputVerdict::Allow => {}
        }
        if let Some(session) = self.session.as_mut() {
            session.surface_mut().resolve_input(input, verdict);
        }
        Flow::Continue
    }

    fn on_window_open(&mut self, url: &str) {
        warn!(url = %url, "Denied window open request");
        if let Some(session) = self.session.as_mut() {
            session
                .surface_mut()
                .resolve_window_open(url, WindowOpenDecision::Deny);
        }
    }

    fn on_closed(&mut self) -> Flow {
        for kind in SESSION_TIMERS {
            self.timers.cancel(kind);
        }
        if let Some(session) = self.session.take() {
            session.close();
        }
        info!("Display surface closed");
        self.shut_down(ShutdownReason::AllSurfacesClosed)
    }

    fn handle_timer(&mut self, fired: TimerFired) {
        if !self.timers.take_if_current(fired) {
            trace!(kind = ?fired.kind, generation = fired.generation, "Stale timer firing ignored");
            return;
        }

        match fired.kind {
            TimerKind::ScheduledReload => {
                if self.scheduler.on_fire() && self.session.is_some() {
                    info!("[Reload Schedule] Executing scheduled reload...");
                    self.request_reload("schedule");
                }
                self.scheduler.tick(&mut self.timers);
            }
            TimerKind::LegacyReload => {
                info!("Auto-reloading page...");
                self.request_reload("reload interval");
                self.timers.arm(
                    TimerKind::LegacyReload,
                    Duration::from_millis(self.config.reload_interval),
                );
            }
            TimerKind::LoadRetry => {
                info!(url = %self.config.url, "Retrying load");
                self.load_display_url();
            }
            TimerKind::LayoutSettle => self.apply_layout(),
        }
    }

    fn apply_layout(&mut self) {
        let Some(session) = self.session.as_mut() else {
            return;
        };
        match session.surface_mut().inject_style(&self.layout.stylesheet) {
            Ok(()) => debug!(bytes = self.layout.stylesheet.len(), "Injected layout CSS"),
            Err(e) => error!(error = ?e, "Failed to inject layout CSS"),
        }
    }

    /// Reload the live surface; errors are logged, never propagated
    fn request_reload(&mut self, origin: &'static str) {
        let Some(session) = self.session.as_mut() else {
            debug!(origin, "No display session, reload skipped");
            return;
        };
        match session.reload(Instant::now()) {
            Ok(ReloadOutcome::Issued) => debug!(origin, "Reload issued"),
            Ok(ReloadOutcome::Coalesced) => debug!(origin, "Reload already in flight"),
            Ok(ReloadOutcome::Skipped) => debug!(origin, "Surface not live, reload skipped"),
            Err(e) => error!(origin, error = ?e, "Reload failed"),
        }
    }

    /// Cancel every timer and close the surface; later events are no-ops
    fn shut_down(&mut self, reason: ShutdownReason) -> Flow {
        info!(reason = ?reason, "Shutting down");
        self.scheduler.stop(&mut self.timers);
        self.timers.cancel_all();
        if let Some(session) = self.session.take() {
            session.close();
        }
        self.shutdown = Some(reason);
        Flow::Exit
    }
}

/// Consume events until the controller asks to exit
///
/// Handler errors and panics are logged and the loop keeps running.
pub async fn run<H: HostRuntime>(
    controller: &mut Controller<H>,
    events: &mut EventReceiver,
) -> Option<ShutdownReason> {
    while let Some(event) = events.recv().await {
        let outcome = panic::catch_unwind(AssertUnwindSafe(|| controller.handle(event)));
        match outcome {
            Ok(Ok(Flow::Exit)) => break,
            Ok(Ok(Flow::Continue)) => {}
            Ok(Err(e)) => error!(error = ?e, "Event handling error"),
            Err(_) => error!("Event handler panicked, continuing"),
        }
    }
    controller.shutdown_reason().cloned()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ScheduleConfig;
    use crate::events::{self, GoneReason};
    use crate::testing::{FakeHost, FixedClock, SurfaceCall};

    const HOUR: Duration = Duration::from_secs(3600);

    struct Harness {
        controller: Controller<FakeHost>,
        rx: EventReceiver,
        log: crate::testing::SurfaceLog,
        clock: FixedClock,
    }

    impl Harness {
        fn new(config: KioskConfig, hour: u32) -> Self {
            let (tx, rx) = events::channel();
            let host = FakeHost::default();
            let log = host.log.clone();
            let clock = FixedClock::at(hour);
            let controller = Controller::new(config, host, tx, Box::new(clock.clone()));
            Self { controller, rx, log, clock }
        }

        fn host(&mut self, event: HostEvent) -> Flow {
            self.controller.handle(KioskEvent::Host(event)).unwrap()
        }

        /// Start, mark ready and finish the initial load
        fn boot(&mut self) {
            self.controller.start().unwrap();
            self.host(HostEvent::SurfaceReady);
            self.host(HostEvent::LoadFinished);
        }

        /// Let paused time run forward and dispatch every event that arrived
        async fn advance(&mut self, duration: Duration) -> usize {
            tokio::time::sleep(duration).await;
            tokio::task::yield_now().await;
            let mut handled = 0;
            while let Ok(event) = self.rx.try_recv() {
                self.controller.handle(event).unwrap();
                handled += 1;
            }
            handled
        }
    }

    fn config() -> KioskConfig {
        KioskConfig {
            url: "http://cams.local:8081".to_string(),
            reload_schedule: ScheduleConfig {
                enabled: true,
                active_start_hour: 7,
                active_end_hour: 22,
                active_interval_ms: 3_600_000,
                off_interval_ms: 0,
            },
            ..KioskConfig::default()
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_ready_loads_display_url() {
        let mut h = Harness::new(config(), 10);
        h.controller.start().unwrap();
        assert!(h.log.calls().is_empty());

        h.host(HostEvent::SurfaceReady);
        assert_eq!(h.log.calls(), vec![SurfaceCall::Load("http://cams.local:8081".to_string())]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_layout_injected_after_settle_delay() {
        let mut h = Harness::new(
            KioskConfig {
                grid_columns: 6.0,
                zoom_level: 1.2,
                hide_selectors: vec!["#ads".to_string(), "bad;selector".to_string()],
                ..config()
            },
            10,
        );
        h.boot();

        h.advance(Duration::from_millis(499)).await;
        assert_eq!(h.log.count(|c| matches!(c, SurfaceCall::InjectStyle(_))), 0);

        h.advance(Duration::from_millis(2)).await;
        let injected: Vec<String> = h
            .log
            .calls()
            .into_iter()
            .filter_map(|call| match call {
                SurfaceCall::InjectStyle(css) => Some(css),
                _ => None,
            })
            .collect();
        assert_eq!(injected.len(), 1);
        assert!(injected[0].contains("repeat(6, 1fr)"));
        assert!(injected[0].contains("zoom: 1.2"));
        assert!(injected[0].contains("#top-bar, #ads {"));
        assert!(!injected[0].contains("bad;selector"));
        assert_eq!(h.controller.layout.rejected.len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_injection_failure_is_not_fatal() {
        let (tx, mut rx) = events::channel();
        let host = FakeHost {
            fail_inject: true,
            ..FakeHost::default()
        };
        let log = host.log.clone();
        let mut controller = Controller::new(config(), host, tx, Box::new(FixedClock::at(10)));
        controller.start().unwrap();
        controller.handle(KioskEvent::Host(HostEvent::SurfaceReady)).unwrap();
        controller.handle(KioskEvent::Host(HostEvent::LoadFinished)).unwrap();

        tokio::time::sleep(Duration::from_secs(1)).await;
        tokio::task::yield_now().await;
        while let Ok(event) = rx.try_recv() {
            assert_eq!(controller.handle(event).unwrap(), Flow::Continue);
        }
        assert_eq!(log.count(|c| matches!(c, SurfaceCall::InjectStyle(_))), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_double_reload_coalesces() {
        let mut h = Harness::new(config(), 10);
        h.boot();
        h.log.clear();

        h.controller.request_reload("test");
        h.controller.request_reload("test");
        assert_eq!(h.log.reloads(), 1);

        // Once the navigation settles a new reload goes through
        h.host(HostEvent::LoadFinished);
        h.controller.request_reload("test");
        assert_eq!(h.log.reloads(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_stuck_navigation_does_not_block_forever() {
        let mut h = Harness::new(config(), 10);
        h.controller.start().unwrap();
        h.host(HostEvent::SurfaceReady);
        h.log.clear();

        h.controller.request_reload("test");
        assert_eq!(h.log.reloads(), 0);

        tokio::time::advance(Duration::from_secs(61)).await;
        h.controller.request_reload("test");
        assert_eq!(h.log.reloads(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_active_schedule_arms_one_timer_and_reloads_once() {
        let mut h = Harness::new(config(), 10);
        h.boot();
        assert_eq!(h.clock.reads.get(), 1);
        assert_eq!(
            h.controller.timers.armed_delay(TimerKind::ScheduledReload),
            Some(Duration::from_millis(3_600_000))
        );
        h.advance(Duration::from_secs(1)).await;
        h.log.clear();

        h.advance(HOUR - Duration::from_secs(2)).await;
        assert_eq!(h.log.reloads(), 0);

        h.advance(Duration::from_secs(2)).await;
        assert_eq!(h.log.reloads(), 1);
        assert_eq!(h.clock.reads.get(), 2);
        assert_eq!(
            h.controller.timers.armed_delay(TimerKind::ScheduledReload),
            Some(Duration::from_millis(3_600_000))
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_off_schedule_rechecks_then_enters_active_window() {
        let mut h = Harness::new(config(), 23);
        h.boot();
        assert_eq!(
            h.controller.timers.armed_delay(TimerKind::ScheduledReload),
            Some(Duration::from_secs(15 * 60))
        );
        h.log.clear();

        h.advance(Duration::from_secs(15 * 60 + 1)).await;
        assert_eq!(h.log.reloads(), 0);
        assert_eq!(h.clock.reads.get(), 2);

        h.clock.hour.set(7);
        h.advance(Duration::from_secs(15 * 60 + 1)).await;
        assert_eq!(h.log.reloads(), 0);
        assert_eq!(
            h.controller.timers.armed_delay(TimerKind::ScheduledReload),
            Some(Duration::from_millis(3_600_000))
        );

        h.advance(HOUR + Duration::from_secs(1)).await;
        assert_eq!(h.log.reloads(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_schedule_fires_without_session_and_keeps_chaining() {
        let mut h = Harness::new(config(), 10);
        h.controller.start().unwrap();
        h.controller.session = None;

        h.advance(HOUR + Duration::from_secs(1)).await;
        assert_eq!(h.log.reloads(), 0);
        assert_eq!(h.clock.reads.get(), 2);
        assert!(h.controller.timers.armed_delay(TimerKind::ScheduledReload).is_some());
    }

    #[tokio::test(start_paused = true)]
    async fn test_disabled_schedule_arms_nothing() {
        let mut cfg = config();
        cfg.reload_schedule.enabled = false;
        let mut h = Harness::new(cfg, 10);
        h.controller.start().unwrap();
        assert_eq!(h.controller.timers.armed_count(), 0);
        assert_eq!(h.clock.reads.get(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_load_failure_retries_every_five_seconds() {
        let mut h = Harness::new(config(), 10);
        h.controller.start().unwrap();
        h.host(HostEvent::SurfaceReady);
        assert_eq!(h.log.loads(), 1);

        for attempt in 2..=4 {
            h.host(HostEvent::LoadFailed {
                code: -102,
                description: "ERR_CONNECTION_REFUSED".to_string(),
            });
            h.advance(Duration::from_millis(4_900)).await;
            assert_eq!(h.log.loads(), attempt - 1);
            h.advance(Duration::from_millis(200)).await;
            assert_eq!(h.log.loads(), attempt);
        }
        assert!(h
            .log
            .calls()
            .iter()
            .filter_map(|c| match c {
                SurfaceCall::Load(url) => Some(url),
                _ => None,
            })
            .all(|url| url == "http://cams.local:8081"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_process_gone_reloads_live_surface() {
        let mut h = Harness::new(config(), 10);
        h.boot();
        h.log.clear();

        h.host(HostEvent::ProcessGone(ProcessGoneDetails {
            reason: GoneReason::Crashed,
            exit_code: Some(11),
            signal: None,
        }));
        assert_eq!(h.log.reloads(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_process_gone_without_session_is_noop() {
        let mut h = Harness::new(config(), 10);
        let flow = h.host(HostEvent::ProcessGone(ProcessGoneDetails {
            reason: GoneReason::Killed,
            exit_code: None,
            signal: Some(9),
        }));
        assert_eq!(flow, Flow::Continue);
        assert!(h.log.calls().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_legacy_interval_repeats_and_is_session_bound() {
        let mut h = Harness::new(
            KioskConfig {
                auto_reload: true,
                reload_interval: 60_000,
                reload_schedule: ScheduleConfig {
                    enabled: false,
                    ..ScheduleConfig::default()
                },
                ..config()
            },
            10,
        );
        h.boot();
        h.log.clear();

        h.advance(Duration::from_secs(61)).await;
        assert_eq!(h.log.reloads(), 1);
        h.host(HostEvent::LoadFinished);
        h.advance(Duration::from_secs(61)).await;
        assert_eq!(h.log.reloads(), 2);

        assert_eq!(h.host(HostEvent::Closed), Flow::Exit);
        assert_eq!(h.controller.timers.armed_count(), 0);
        assert_eq!(h.advance(Duration::from_secs(600)).await, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_debug_exit_stops_everything() {
        let mut h = Harness::new(config(), 10);
        h.boot();
        h.log.clear();

        let flow = h.host(HostEvent::Input(KeyInput::new("X").control().shift()));
        assert_eq!(flow, Flow::Exit);
        assert_eq!(h.controller.shutdown_reason(), Some(&ShutdownReason::DebugExit));
        assert_eq!(h.log.calls(), vec![SurfaceCall::Close]);
        assert_eq!(h.controller.timers.armed_count(), 0);

        // Nothing runs afterwards
        assert_eq!(h.host(HostEvent::Input(KeyInput::new("q").control())), Flow::Exit);
        assert_eq!(h.host(HostEvent::LoadFinished), Flow::Exit);
        h.advance(HOUR * 2).await;
        assert_eq!(h.log.calls(), vec![SurfaceCall::Close]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_timer_after_shutdown_is_noop() {
        let mut h = Harness::new(config(), 10);
        h.boot();
        let stale = TimerFired {
            kind: TimerKind::ScheduledReload,
            generation: 1,
        };
        h.controller
            .handle(KioskEvent::Shutdown(ShutdownReason::Signal(15)))
            .unwrap();
        h.log.clear();

        assert_eq!(h.controller.handle(KioskEvent::Timer(stale)).unwrap(), Flow::Exit);
        assert!(h.log.calls().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_input_verdicts_forwarded_to_surface() {
        let mut h = Harness::new(config(), 10);
        h.boot();
        h.log.clear();

        h.host(HostEvent::Input(KeyInput::new("q").control()));
        h.host(HostEvent::Input(KeyInput::new("F11")));
        h.host(HostEvent::Input(KeyInput::new("a")));
        assert_eq!(
            h.log.calls(),
            vec![
                SurfaceCall::Input(KeyInput::new("q").control(), InputVerdict::Suppress),
                SurfaceCall::Input(KeyInput::new("F11"), InputVerdict::Allow),
                SurfaceCall::Input(KeyInput::new("a"), InputVerdict::Allow),
            ]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_window_open_always_denied() {
        let mut h = Harness::new(config(), 10);
        h.boot();
        h.log.clear();

        h.host(HostEvent::WindowOpenRequest {
            url: "http://example.com/popup".to_string(),
        });
        assert_eq!(
            h.log.calls(),
            vec![SurfaceCall::WindowOpen(
                "http://example.com/popup".to_string(),
                WindowOpenDecision::Deny
            )]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_close_cancels_session_timers_and_exits() {
        let mut h = Harness::new(config(), 10);
        h.controller.start().unwrap();
        h.host(HostEvent::SurfaceReady);
        h.host(HostEvent::LoadFailed {
            code: -6,
            description: "ERR_FILE_NOT_FOUND".to_string(),
        });
        assert!(h.controller.timers.armed_delay(TimerKind::LoadRetry).is_some());

        assert_eq!(h.host(HostEvent::Closed), Flow::Exit);
        assert!(h.controller.session.is_none());
        assert_eq!(h.controller.timers.armed_count(), 0);
        assert_eq!(h.controller.shutdown_reason(), Some(&ShutdownReason::AllSurfacesClosed));
    }

    #[tokio::test(start_paused = true)]
    async fn test_activate_creates_only_one_session() {
        let (tx, _rx) = events::channel();
        let host = FakeHost::default();
        let created = host.created.clone();
        let mut controller = Controller::new(config(), host, tx, Box::new(FixedClock::at(10)));
        controller.start().unwrap();
        controller.handle(KioskEvent::Host(HostEvent::Activate)).unwrap();
        assert_eq!(created.get(), 1);

        controller.session = None;
        controller.handle(KioskEvent::Host(HostEvent::Activate)).unwrap();
        assert_eq!(created.get(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_run_exits_on_shutdown_event() {
        let (tx, mut rx) = events::channel();
        let clock = Box::new(FixedClock::at(10));
        let mut controller = Controller::new(config(), FakeHost::default(), tx.clone(), clock);
        controller.start().unwrap();
        tx.send(KioskEvent::Host(HostEvent::SurfaceReady)).unwrap();
        tx.send(KioskEvent::Shutdown(ShutdownReason::Signal(2))).unwrap();

        let reason = run(&mut controller, &mut rx).await;
        assert_eq!(reason, Some(ShutdownReason::Signal(2)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_run_survives_handler_error() {
        let (tx, mut rx) = events::channel();
        let clock = Box::new(FixedClock::at(10));
        let mut controller = Controller::new(config(), FakeHost::default(), tx.clone(), clock);
        controller.start().unwrap();

        // Without a session, activation goes back to the failing host
        controller.session = None;
        controller.host.fail_create = true;
        tx.send(KioskEvent::Host(HostEvent::Activate)).unwrap();
        tx.send(KioskEvent::Host(HostEvent::Activate)).unwrap();
        tx.send(KioskEvent::Shutdown(ShutdownReason::Signal(15))).unwrap();

        let reason = run(&mut controller, &mut rx).await;
        assert_eq!(reason, Some(ShutdownReason::Signal(15)));
        assert_eq!(controller.host.created.get(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_run_survives_handler_panic() {
        let (tx, mut rx) = events::channel();
        let host = FakeHost {
            panic_inject: true,
            ..FakeHost::default()
        };
        let log = host.log.clone();
        let clock = Box::new(FixedClock::at(10));
        let mut controller = Controller::new(config(), host, tx.clone(), clock);
        controller.start().unwrap();

        // The layout pass panics 500 ms after the load finishes
        tx.send(KioskEvent::Host(HostEvent::SurfaceReady)).unwrap();
        tx.send(KioskEvent::Host(HostEvent::LoadFinished)).unwrap();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_secs(1)).await;
            let crash = ProcessGoneDetails {
                reason: GoneReason::Crashed,
                exit_code: Some(1),
                signal: None,
            };
            tx.send(KioskEvent::Host(HostEvent::ProcessGone(crash))).unwrap();
            tx.send(KioskEvent::Shutdown(ShutdownReason::Signal(15))).unwrap();
        });

        let reason = run(&mut controller, &mut rx).await;
        assert_eq!(reason, Some(ShutdownReason::Signal(15)));
        assert_eq!(log.count(|call| matches!(call, SurfaceCall::InjectStyle(_))), 1);
        assert_eq!(log.reloads(), 1);
    }
}
