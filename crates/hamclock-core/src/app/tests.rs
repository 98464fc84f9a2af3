use super::*;
use crate::{
    config::assign,
    feeds::{FeedBoard, NullFeeds},
    link::{ConnectPoll, NullTransport},
    schedule::{TaskSchedule, WEATHER_INTERVAL_MS},
    screen::ScreenMailbox,
    touch::{NoTouch, TouchPoint},
};
use std::{collections::VecDeque, vec::Vec};

const BOUNDS: ScreenBounds = ScreenBounds::new(320, 240);
const NEXT_ZONE: TouchPoint = TouchPoint { x: 300, y: 230 };
const PREV_ZONE: TouchPoint = TouchPoint { x: 5, y: 235 };

struct ScriptedTouch {
    samples: VecDeque<Result<Option<TouchPoint>, ()>>,
}

impl ScriptedTouch {
    fn new(samples: &[Option<TouchPoint>]) -> Self {
        Self {
            samples: samples.iter().copied().map(Ok).collect(),
        }
    }
}

impl TouchInput for ScriptedTouch {
    type Error = ();

    fn poll_touch(&mut self) -> Result<Option<TouchPoint>, Self::Error> {
        self.samples.pop_front().unwrap_or(Ok(None))
    }
}

/// Counts connect attempts and plays back a fixed outcome.
struct CountingTransport {
    outcome: ConnectPoll,
    attempts: Vec<ClockTick>,
    clock: ClockTick,
    open: bool,
    inbound: VecDeque<u8>,
}

impl CountingTransport {
    fn new(outcome: ConnectPoll) -> Self {
        Self {
            outcome,
            attempts: Vec::new(),
            clock: 0,
            open: false,
            inbound: VecDeque::new(),
        }
    }
}

impl Transport for CountingTransport {
    type Error = ();

    fn begin_connect(&mut self, _host: &str, _port: u16) -> Result<(), Self::Error> {
        self.attempts.push(self.clock);
        Ok(())
    }

    fn poll_connect(&mut self) -> ConnectPoll {
        if self.outcome == ConnectPoll::Established {
            self.open = true;
        }
        self.outcome
    }

    fn connected(&self) -> bool {
        self.open
    }

    fn available(&self) -> usize {
        self.inbound.len()
    }

    fn read(&mut self, buf: &mut [u8]) -> Result<usize, Self::Error> {
        let mut n = 0;
        while n < buf.len() {
            match self.inbound.pop_front() {
                Some(b) => {
                    buf[n] = b;
                    n += 1;
                }
                None => break,
            }
        }
        Ok(n)
    }

    fn write(&mut self, _bytes: &[u8]) -> Result<(), Self::Error> {
        Ok(())
    }

    fn close(&mut self) {
        self.open = false;
    }
}

/// Feed handler that refuses every trigger.
#[derive(Default)]
struct RefusingFeeds {
    refused: Vec<PollTask>,
}

impl FeedHandler for RefusingFeeds {
    fn refresh(&mut self, task: PollTask, _now: ClockTick) -> Result<(), FeedError> {
        self.refused.push(task);
        Err(FeedError::NetworkUnavailable)
    }

    fn on_line(&mut self, _peer: Peer, _line: &str) {}
}

fn dx_config() -> HamConfig {
    let mut config = HamConfig::default();
    assign(&mut config.dx_host, "dx_host", "dx.example.com:7300").unwrap();
    assign(&mut config.callsign, "callsign", "N0CALL").unwrap();
    config
}

fn headless(config: &HamConfig) -> HamClock<NullTransport, NullTransport, NoTouch, FeedBoard> {
    HamClock::new(
        NullTransport::new(),
        NullTransport::new(),
        NoTouch::new(),
        FeedBoard::new(),
        config,
        BOUNDS,
    )
}

#[test]
fn first_pass_runs_every_task_and_renders() {
    let mut config = HamConfig::default();
    assign(&mut config.ow_key, "ow_key", "key").unwrap();
    assign(&mut config.locator, "locator", "JO62").unwrap();
    let mut app = headless(&config);

    let report = app.tick(0, None);

    assert_eq!(report.render, TickResult::RenderRequested);
    assert_eq!(report.polls_triggered, 3);
    for task in PollTask::ALL {
        assert_eq!(app.feeds().last_refresh(task), Some(0));
        assert_eq!(app.timers().poll(task).last_run(), Some(0));
    }
}

#[test]
fn unconfigured_weather_is_skipped_but_marked() {
    let mut app = headless(&HamConfig::default());

    let report = app.tick(0, None);

    assert_eq!(report.polls_triggered, 2);
    assert_eq!(app.feeds().last_refresh(PollTask::Weather), None);
    assert_eq!(app.timers().weather.last_run(), Some(0));
    assert_eq!(app.tick(10, None).polls_triggered, 0);
}

#[test]
fn weather_fires_on_its_interval() {
    let mut config = dx_config();
    assign(&mut config.ow_key, "ow_key", "key").unwrap();
    assign(&mut config.locator, "locator", "JO62").unwrap();

    let mut timers = TaskTimers::new();
    timers.weather = TaskSchedule::new("weather", WEATHER_INTERVAL_MS).with_last_run(0);
    let mut app = headless(&config).with_timers(timers);

    let _ = app.tick(599_999, None);
    assert_eq!(app.feeds().last_refresh(PollTask::Weather), None);

    let _ = app.tick(600_000, None);
    assert_eq!(app.feeds().last_refresh(PollTask::Weather), Some(600_000));

    let _ = app.tick(1_199_999, None);
    assert_eq!(app.feeds().last_refresh(PollTask::Weather), Some(600_000));
}

#[test]
fn display_refresh_is_requested_once_per_second() {
    let mut app = headless(&HamConfig::default());

    assert_eq!(app.tick(0, None).render, TickResult::RenderRequested);
    assert_eq!(app.tick(10, None).render, TickResult::NoRender);
    assert_eq!(app.tick(999, None).render, TickResult::NoRender);
    assert_eq!(app.tick(1_000, None).render, TickResult::RenderRequested);
}

#[test]
fn dx_reconnect_honours_backoff_scenario() {
    let config = dx_config();
    let mut app = HamClock::new(
        CountingTransport::new(ConnectPoll::Failed),
        NullTransport::new(),
        NoTouch::new(),
        NullFeeds,
        &config,
        BOUNDS,
    );

    for now in [0, 10, 5_000, 19_990, 19_999, 20_000, 20_010] {
        app.dx_transport.clock = now;
        let _ = app.tick(now, None);
    }

    assert_eq!(app.dx_transport().attempts, [0, 20_000]);
    assert_eq!(app.link(Peer::DxCluster).attempts(), 2);
    assert_eq!(app.link_status(Peer::DxCluster), LinkStatus::Disconnected);
}

#[test]
fn aprs_without_server_never_attempts() {
    let config = dx_config();
    let mut app = HamClock::new(
        CountingTransport::new(ConnectPoll::Established),
        CountingTransport::new(ConnectPoll::Established),
        NoTouch::new(),
        NullFeeds,
        &config,
        BOUNDS,
    );

    for now in (0..100_000).step_by(1_000) {
        let _ = app.tick(now, None);
    }

    assert!(app.aprs_transport().attempts.is_empty());
    assert_eq!(app.link_status(Peer::AprsIs), LinkStatus::Disconnected);
    assert_eq!(app.link_status(Peer::DxCluster), LinkStatus::Connected);
}

#[test]
fn held_press_navigates_once_and_re_press_navigates_again() {
    let mut samples = Vec::new();
    samples.extend([Some(NEXT_ZONE); 12]);
    samples.push(None);
    samples.extend([Some(NEXT_ZONE); 4]);

    let mut app = HamClock::new(
        NullTransport::new(),
        NullTransport::new(),
        ScriptedTouch::new(&samples),
        NullFeeds,
        &HamConfig::default(),
        BOUNDS,
    );

    let mut changes = 0;
    for pass in 0..samples.len() as u32 {
        if app.tick(pass * 10, None).screen_changed {
            changes += 1;
        }
    }

    assert_eq!(changes, 2);
    assert_eq!(app.current_screen(), ScreenId::Aprs);
}

#[test]
fn previous_gesture_wraps_and_renders_same_pass() {
    let mut app = HamClock::new(
        NullTransport::new(),
        NullTransport::new(),
        ScriptedTouch::new(&[None, Some(PREV_ZONE)]),
        NullFeeds,
        &HamConfig::default(),
        BOUNDS,
    );

    let _ = app.tick(0, None);
    let report = app.tick(10, None);

    assert!(report.screen_changed);
    assert_eq!(report.render, TickResult::RenderRequested);
    assert_eq!(app.current_screen(), ScreenId::Matrix);
}

#[test]
fn touch_read_error_counts_as_release() {
    let mut touch = ScriptedTouch::new(&[Some(NEXT_ZONE)]);
    touch.samples.push_back(Err(()));
    touch.samples.push_back(Ok(Some(NEXT_ZONE)));

    let mut app = HamClock::new(
        NullTransport::new(),
        NullTransport::new(),
        touch,
        NullFeeds,
        &HamConfig::default(),
        BOUNDS,
    );

    for now in [0, 10, 20] {
        let _ = app.tick(now, None);
    }
    assert_eq!(app.current_screen(), ScreenId::Aprs);
}

#[test]
fn mailbox_selection_applies_on_next_pass() {
    let mailbox = ScreenMailbox::new();
    let mut app = HamClock::new(
        NullTransport::new(),
        NullTransport::new(),
        ScriptedTouch::new(&[Some(NEXT_ZONE)]),
        NullFeeds,
        &HamConfig::default(),
        BOUNDS,
    );
    let _ = app.tick(0, None);

    mailbox.post(ScreenId::Weather);
    let report = app.tick(10, mailbox.take());

    assert!(report.screen_changed);
    assert_eq!(report.render, TickResult::RenderRequested);
    assert_eq!(app.current_screen(), ScreenId::Weather);
    assert_eq!(mailbox.take(), None);
}

#[test]
fn failing_feed_does_not_block_dx_link() {
    let config = dx_config();
    let mut app = HamClock::new(
        CountingTransport::new(ConnectPoll::Established),
        NullTransport::new(),
        NoTouch::new(),
        RefusingFeeds::default(),
        &config,
        BOUNDS,
    );

    let report = app.tick(0, None);

    assert_eq!(report.polls_triggered, 0);
    assert_eq!(app.feeds().refused, [PollTask::Propagation, PollTask::Pota]);
    assert_eq!(app.link_status(Peer::DxCluster), LinkStatus::Connected);
    assert_eq!(report.render, TickResult::RenderRequested);

    // Refused triggers are not retried every pass.
    let _ = app.tick(10, None);
    assert_eq!(app.feeds().refused.len(), 2);
}

#[test]
fn dx_lines_reach_feed_board() {
    let config = dx_config();
    let mut app = HamClock::new(
        CountingTransport::new(ConnectPoll::Established),
        NullTransport::new(),
        NoTouch::new(),
        FeedBoard::new(),
        &config,
        BOUNDS,
    );
    let _ = app.tick(0, None);

    app.dx_transport
        .inbound
        .extend(b"DX de W1AW:     14025.0  K1ABC        CW\r\nDX de".iter().copied());
    let report = app.tick(10, None);

    assert_eq!(report.lines, 1);
    let lines: Vec<&str> = app.feeds().lines(Peer::DxCluster).iter_newest().collect();
    assert_eq!(lines, ["DX de W1AW:     14025.0  K1ABC        CW"]);
}

#[test]
fn status_and_view_reflect_scheduler_state() {
    let config = dx_config();
    let board = StatusBoard::new();
    let mut app = HamClock::new(
        CountingTransport::new(ConnectPoll::Established),
        NullTransport::new(),
        NoTouch::new(),
        NullFeeds,
        &config,
        BOUNDS,
    )
    .with_initial_screen(ScreenId::DxCluster);

    let _ = app.tick(5_000, None);
    app.publish_status(&board);

    let snapshot = board.snapshot();
    assert_eq!(snapshot.uptime_s, 5);
    assert_eq!(snapshot.dx, LinkStatus::Connected);
    assert_eq!(snapshot.screen, ScreenId::DxCluster);

    let (screen, callsign) = app.with_screen(5_000, |view, _| (view.screen, view.callsign.len()));
    assert_eq!(screen, ScreenId::DxCluster);
    assert_eq!(callsign, 6);
}
