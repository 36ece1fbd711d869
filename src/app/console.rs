use chrono::Local;
use uuid::Uuid;

use crate::app::models::{ConsoleEntry, ConsoleKind, ConsoleOutput};
use crate::app::observers::{Observer, Observers, SubscriptionId};

/// Append-only record of executed commands and their output.
pub struct ConsoleLog {
    entries: Vec<ConsoleEntry>,
    observers: Observers<ConsoleEntry>,
    timestamp_format: String,
}

impl Default for ConsoleLog {
    fn default() -> Self {
        Self::new("%Y/%m/%d %H:%M")
    }
}

impl ConsoleLog {
    pub fn new(timestamp_format: impl Into<String>) -> Self {
        Self {
            entries: Vec::new(),
            observers: Observers::default(),
            timestamp_format: timestamp_format.into(),
        }
    }

    pub fn entries(&self) -> &[ConsoleEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn subscribe(&mut self, observer: Observer<ConsoleEntry>) -> SubscriptionId {
        self.observers.subscribe(observer)
    }

    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        self.observers.unsubscribe(id)
    }

    pub fn input(&mut self, text: impl Into<String>) -> &ConsoleEntry {
        self.append(ConsoleKind::Input, text.into())
    }

    pub fn output(&mut self, text: impl Into<String>) -> &ConsoleEntry {
        self.append(ConsoleKind::Output, text.into())
    }

    pub fn error(&mut self, text: impl Into<String>) -> &ConsoleEntry {
        self.append(ConsoleKind::Error, text.into())
    }

    pub fn record(&mut self, output: ConsoleOutput) -> &ConsoleEntry {
        match output {
            ConsoleOutput::Success(text) => self.output(text),
            ConsoleOutput::Error(text) => self.error(text),
        }
    }

    fn append(&mut self, kind: ConsoleKind, text: String) -> &ConsoleEntry {
        let entry = ConsoleEntry {
            id: Uuid::new_v4().to_string(),
            timestamp: Local::now().format(&self.timestamp_format).to_string(),
            kind,
            text,
        };
        self.observers.notify(&entry);
        self.entries.push(entry);
        &self.entries[self.entries.len() - 1]
    }
}
