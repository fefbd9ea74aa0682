//! Lifecycle dispatch table
//!
//! Every event the fork observes maps to exactly one action over its sinks.
//! `close`, `end` and `finish` fire at most once; `error` fires every time.

use contracts::{ForkOptions, SinkSignal, StreamError};
use crate::stream::{ErrorEmitter, ErrorListener};

/// Events observed on the fork
#[derive(Debug)]
pub enum LifecycleEvent {
    /// An error was raised on the fork's own error channel
    Error(StreamError),
    /// The fork was closed
    Close,
    /// The fork's readable side ended
    End,
    /// The upstream has no more data
    Finish,
    /// A producer was attached upstream
    Piped(ErrorEmitter),
}

impl LifecycleEvent {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Error(_) => "error",
            Self::Close => "close",
            Self::End => "end",
            Self::Finish => "finish",
            Self::Piped(_) => "pipe",
        }
    }
}

/// What the fork does in response to an event
#[derive(Debug)]
pub enum Action {
    /// Re-emit the signal on every sink
    Mirror(SinkSignal),
    /// Run end-of-stream on every sink
    EndSinks,
    /// Relay errors of the attached producer onto the fork's own channel
    Relay(ErrorListener),
    /// Nothing to do
    Ignore,
}

/// Tracks once-only events and routes each event to its action
#[derive(Debug, Default)]
pub struct Lifecycle {
    closed: bool,
    ended: bool,
    finished: bool,
}

impl Lifecycle {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn route(&mut self, event: LifecycleEvent, options: &ForkOptions) -> Action {
        match event {
            LifecycleEvent::Error(err) => Action::Mirror(SinkSignal::Error(err)),
            LifecycleEvent::Close => once(&mut self.closed, Action::Mirror(SinkSignal::Close)),
            LifecycleEvent::End => once(&mut self.ended, Action::Mirror(SinkSignal::End)),
            LifecycleEvent::Finish => once(&mut self.finished, Action::EndSinks),
            LifecycleEvent::Piped(errors) if options.pass_error => {
                Action::Relay(errors.subscribe())
            }
            LifecycleEvent::Piped(_) => Action::Ignore,
        }
    }
}

fn once(fired: &mut bool, action: Action) -> Action {
    if std::mem::replace(fired, true) {
        Action::Ignore
    } else {
        action
    }
}
