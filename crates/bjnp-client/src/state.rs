//! Printer state transitions reported to the spooler.

use std::io::{self, Write};

use tracing::{debug, info};

/// A printer condition that flipped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StateEvent {
    Offline(bool),
    PaperOut(bool),
}

impl StateEvent {
    /// The spooler's state line for this event.
    pub fn spooler_line(self) -> &'static str {
        match self {
            StateEvent::Offline(true) => "STATE: +offline-error",
            StateEvent::Offline(false) => "STATE: -offline-error",
            StateEvent::PaperOut(true) => "STATE: +media-empty-error",
            StateEvent::PaperOut(false) => "STATE: -media-empty-error",
        }
    }
}

/// Receives state transitions as they happen.
pub trait StateReporter {
    fn report(&mut self, event: StateEvent);
}

impl StateReporter for Vec<StateEvent> {
    fn report(&mut self, event: StateEvent) {
        self.push(event);
    }
}

/// Writes spooler `STATE:` lines, to stderr by default.
#[derive(Debug)]
pub struct SpoolerStateReporter<W = io::Stderr> {
    out: W,
}

impl SpoolerStateReporter<io::Stderr> {
    pub fn stderr() -> Self {
        Self { out: io::stderr() }
    }
}

impl<W: Write> SpoolerStateReporter<W> {
    pub fn new(out: W) -> Self {
        Self { out }
    }

    pub fn into_inner(self) -> W {
        self.out
    }
}

impl<W: Write> StateReporter for SpoolerStateReporter<W> {
    fn report(&mut self, event: StateEvent) {
        match event {
            StateEvent::Offline(true) => info!("printer is off-line"),
            StateEvent::Offline(false) => info!("printer is on-line"),
            StateEvent::PaperOut(true) => info!("printer is out of paper"),
            StateEvent::PaperOut(false) => info!("printer has paper"),
        }
        if let Err(e) = writeln!(self.out, "{}", event.spooler_line()).and_then(|()| self.out.flush())
        {
            debug!(error = %e, "failed to write state line");
        }
    }
}

/// Offline and paper-out conditions, each unknown until first observed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PrinterState {
    pub offline: Option<bool>,
    pub paper_out: Option<bool>,
}

impl PrinterState {
    /// Record the offline condition, reporting it unless already known.
    pub fn set_offline(&mut self, offline: bool, reporter: &mut dyn StateReporter) {
        if self.offline != Some(offline) {
            self.offline = Some(offline);
            reporter.report(StateEvent::Offline(offline));
        }
    }

    /// Record the paper-out condition, reporting it unless already known.
    pub fn set_paper_out(&mut self, paper_out: bool, reporter: &mut dyn StateReporter) {
        if self.paper_out != Some(paper_out) {
            self.paper_out = Some(paper_out);
            reporter.report(StateEvent::PaperOut(paper_out));
        }
    }
}
