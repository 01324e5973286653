// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Collaborator hooks: progress events and confirmation of destructive
//! operations.

use mk_core::Event;
use std::io::{BufRead, Write};

/// Receives progress events. Purely observational.
pub trait EventSink: Send + Sync {
    fn emit(&self, event: &Event);
}

/// Sink that drops everything.
#[derive(Clone, Copy, Debug, Default)]
pub struct NoopSink;

impl EventSink for NoopSink {
    fn emit(&self, _event: &Event) {}
}

/// Sink that writes each event to the log.
#[derive(Clone, Copy, Debug, Default)]
pub struct LogSink;

impl EventSink for LogSink {
    fn emit(&self, event: &Event) {
        tracing::info!("{}", event.log_summary());
    }
}

/// Asked before clean-all and cascading deletes.
pub trait Confirm: Send + Sync {
    fn confirm(&self, question: &str) -> bool;
}

/// Answer yes without asking; the unattended default.
#[derive(Clone, Copy, Debug, Default)]
pub struct AlwaysYes;

impl Confirm for AlwaysYes {
    fn confirm(&self, _question: &str) -> bool {
        true
    }
}

/// Ask on stderr and read `y`/`yes` from stdin; anything else is a no.
#[derive(Clone, Copy, Debug, Default)]
pub struct StdinConfirm;

impl Confirm for StdinConfirm {
    fn confirm(&self, question: &str) -> bool {
        let mut stderr = std::io::stderr();
        if write!(stderr, "{question} [y/N] ").and_then(|_| stderr.flush()).is_err() {
            return false;
        }
        let mut answer = String::new();
        if std::io::stdin().lock().read_line(&mut answer).is_err() {
            return false;
        }
        matches!(answer.trim().to_ascii_lowercase().as_str(), "y" | "yes")
    }
}

#[cfg(any(test, feature = "test-support"))]
mod fake {
    use super::{Confirm, EventSink};
    use mk_core::{Event, JobId};
    use parking_lot::Mutex;
    use std::sync::Arc;

    /// Fake event sink that records every event
    #[derive(Clone, Default)]
    pub struct FakeEventSink {
        events: Arc<Mutex<Vec<Event>>>,
    }

    impl FakeEventSink {
        pub fn new() -> Self {
            Self::default()
        }

        /// Get all recorded events
        pub fn events(&self) -> Vec<Event> {
            self.events.lock().clone()
        }

        /// Names of recorded events concerning `id`, in order.
        pub fn names_for(&self, id: &str) -> Vec<&'static str> {
            self.events
                .lock()
                .iter()
                .filter(|e| e.job_id().is_some_and(|j| j == id))
                .map(Event::name)
                .collect()
        }

        /// Ids of `job:starting` events, in dispatch order.
        pub fn started(&self) -> Vec<JobId> {
            self.events
                .lock()
                .iter()
                .filter_map(|e| match e {
                    Event::JobStarting { id } => Some(id.clone()),
                    _ => None,
                })
                .collect()
        }
    }

    impl EventSink for FakeEventSink {
        fn emit(&self, event: &Event) {
            self.events.lock().push(event.clone());
        }
    }

    /// Fake confirmation hook with a fixed answer
    #[derive(Clone)]
    pub struct FakeConfirm {
        answer: bool,
        questions: Arc<Mutex<Vec<String>>>,
    }

    impl FakeConfirm {
        pub fn answering(answer: bool) -> Self {
            Self { answer, questions: Arc::default() }
        }

        /// Get all questions asked so far
        pub fn questions(&self) -> Vec<String> {
            self.questions.lock().clone()
        }
    }

    impl Confirm for FakeConfirm {
        fn confirm(&self, question: &str) -> bool {
            self.questions.lock().push(question.to_string());
            self.answer
        }
    }
}

#[cfg(any(test, feature = "test-support"))]
pub use fake::{FakeConfirm, FakeEventSink};

#[cfg(test)]
#[path = "hooks_tests.rs"]
mod tests;
