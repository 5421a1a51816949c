//! Event types and the main event loop driver for the Ulat PH client.
//!
//! This module defines the [`Event`] enum (keyboard input, ticks, and the
//! results of background network work) and the [`EventHandler`], which runs a
//! blocking task that polls crossterm for key events and emits periodic
//! [`Event::Tick`]s. The main loop in `main.rs` receives events via
//! [`EventHandler::next`]; spawned tasks post their results via
//! [`EventHandler::tx`].

use crate::location::{InitialLocation, PinTicket};
use crate::models::{Location, Report, ReportStatus, UserVoteStatus, VoteReceipt};
use crate::votes::VoteKind;
use crossterm::event::{self, Event as CrosstermEvent, KeyEvent, KeyEventKind};
use std::time::{Duration, Instant};
use tokio::sync::mpsc;
use tracing::error;

/// Events processed by the application event loop.
///
/// Failures from background tasks travel as `Err(String)` so they can be shown
/// as a notice without the UI loop ever seeing a typed error.
#[derive(Debug)]
pub enum Event {
    /// Periodic tick used for UI refresh and notice expiry.
    Tick,
    /// User key press from the terminal.
    Input(KeyEvent),
    /// Outcome of the startup location lookup.
    InitialLocation(InitialLocation),
    /// A pin move or place search has been named and awaits validation.
    PinResolved {
        ticket: PinTicket,
        candidate: Location,
    },
    /// A place search could not be forward-geocoded.
    PlaceSearchFailed(String),
    /// Fresh report list for the nearby view. `seq` orders overlapping fetches.
    ReportsLoaded {
        seq: u64,
        result: Result<Vec<Report>, String>,
    },
    /// Fresh report list for the dashboard, tagged with the filter it was asked for.
    DashboardLoaded {
        filter: Option<ReportStatus>,
        result: Result<Vec<Report>, String>,
    },
    VoteFinished {
        report_id: String,
        kind: VoteKind,
        result: Result<VoteReceipt, String>,
    },
    UserStatus {
        report_id: String,
        status: UserVoteStatus,
    },
    SubmitFinished(Result<String, String>),
    StatusUpdated {
        report_id: String,
        status: ReportStatus,
        result: Result<(), String>,
    },
    Deleted {
        report_id: String,
        result: Result<(), String>,
    },
}

/// Multiplexes terminal input, ticks and task results into a single event stream.
///
/// Holds an unbounded channel: the sender ([`tx`](EventHandler::tx)) can be
/// cloned and given to other tasks, while the receiver is consumed by
/// [`next`](EventHandler::next) in the main loop.
pub struct EventHandler {
    /// Sender for posting events from background tasks.
    pub tx: mpsc::UnboundedSender<Event>,
    rx: mpsc::UnboundedReceiver<Event>,
}

impl EventHandler {
    /// Creates a new event handler and spawns the input/tick task.
    ///
    /// The task polls crossterm with a timeout of `tick_rate_ms`; key presses
    /// become [`Event::Input`] and each elapsed interval an [`Event::Tick`].
    /// If the terminal stops answering, the task logs the failure and exits.
    pub fn new(tick_rate_ms: u64) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        let event_tx = tx.clone();

        tokio::task::spawn_blocking(move || {
            let tick_rate = Duration::from_millis(tick_rate_ms);
            let mut last_tick = Instant::now();
            loop {
                let timeout = tick_rate
                    .checked_sub(last_tick.elapsed())
                    .unwrap_or(Duration::from_secs(0));
                match event::poll(timeout) {
                    Ok(true) => match event::read() {
                        Ok(CrosstermEvent::Key(key)) if key.kind == KeyEventKind::Press => {
                            if event_tx.send(Event::Input(key)).is_err() {
                                return;
                            }
                        }
                        Ok(_) => {}
                        Err(e) => {
                            error!("Terminal read failed: {}", e);
                            return;
                        }
                    },
                    Ok(false) => {}
                    Err(e) => {
                        error!("Terminal poll failed: {}", e);
                        return;
                    }
                }
                if last_tick.elapsed() >= tick_rate {
                    if event_tx.send(Event::Tick).is_err() {
                        return;
                    }
                    last_tick = Instant::now();
                }
            }
        });

        Self { tx, rx }
    }

    /// Receives the next event from the channel.
    ///
    /// Returns `None` when all senders have been dropped.
    pub async fn next(&mut self) -> Option<Event> {
        self.rx.recv().await
    }
}
