use std::path::PathBuf;
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::{Duration, Instant};

use tracing::{info, warn};
use uuid::Uuid;

use crate::app::adb::locator::resolve_adb_program;
use crate::app::adb::poller::{DeviceListener, DevicePoller};
use crate::app::adb::runner::execute;
use crate::app::config::AppConfig;
use crate::app::console::ConsoleLog;
use crate::app::controller::editor::{Effect, EditorController, EditorEvent};
use crate::app::error::AppError;
use crate::app::models::{ConsoleEntry, ConsoleOutput, Device};
use crate::app::observers::{Observer, Observers, SubscriptionId};
use crate::app::scheme::persist::{from_json, read_scheme_file, write_scheme_file};

/// Runs a command line (`command`, `trace_id`) and classifies what it printed.
pub type CommandExecutor = Arc<dyn Fn(&str, &str) -> Vec<ConsoleOutput> + Send + Sync>;

/// Results of background work, applied on the owning thread by [`AppController::pump`].
#[derive(Debug)]
pub enum Completion {
    CommandFinished {
        trace_id: String,
        outputs: Vec<ConsoleOutput>,
    },
    Saved {
        trace_id: String,
        path: PathBuf,
        result: Result<(), AppError>,
    },
    Loaded {
        trace_id: String,
        path: PathBuf,
        result: Result<String, AppError>,
    },
    Devices(Vec<Device>),
}

#[derive(Debug, Clone, PartialEq)]
pub enum AppUpdate {
    SchemeChanged,
    DevicesChanged(Vec<Device>),
    /// Save needs a target file; answer with `EditorEvent::SaveAs`.
    SaveRequested,
    Saved(PathBuf),
    Loaded(PathBuf),
}

/// Application root. Owns the editor, console log, device list and poller; every mutation
/// happens on the thread that owns this value.
pub struct AppController {
    editor: EditorController,
    console: ConsoleLog,
    devices: Vec<Device>,
    poller: DevicePoller,
    executor: CommandExecutor,
    observers: Observers<AppUpdate>,
    tx: Sender<Completion>,
    rx: Receiver<Completion>,
    pending: usize,
}

impl AppController {
    pub fn new(config: &AppConfig) -> Self {
        let adb_program = resolve_adb_program(&config.adb.command_path);
        let timeout = config.adb.timeout();
        let poller =
            DevicePoller::for_adb(adb_program.clone(), timeout, config.poll_interval());
        let executor: CommandExecutor = Arc::new(move |command: &str, trace_id: &str| {
            execute(command, &adb_program, timeout, trace_id)
        });
        Self::with_parts(
            executor,
            poller,
            ConsoleLog::new(config.console.timestamp_format.clone()),
        )
    }

    pub fn with_parts(executor: CommandExecutor, poller: DevicePoller, console: ConsoleLog) -> Self {
        let (tx, rx) = mpsc::channel();
        let devices_tx = Mutex::new(tx.clone());
        let listener: DeviceListener = Arc::new(move |devices: Vec<Device>| {
            if let Ok(sender) = devices_tx.lock() {
                let _ = sender.send(Completion::Devices(devices));
            }
        });
        poller.set_listener(listener);
        Self {
            editor: EditorController::new(),
            console,
            devices: Vec::new(),
            poller,
            executor,
            observers: Observers::default(),
            tx,
            rx,
            pending: 0,
        }
    }

    pub fn editor(&self) -> &EditorController {
        &self.editor
    }

    pub fn console(&self) -> &ConsoleLog {
        &self.console
    }

    pub fn devices(&self) -> &[Device] {
        &self.devices
    }

    /// Background jobs whose completion has not been applied yet.
    pub fn pending(&self) -> usize {
        self.pending
    }

    pub fn subscribe(&mut self, observer: Observer<AppUpdate>) -> SubscriptionId {
        self.observers.subscribe(observer)
    }

    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        self.observers.unsubscribe(id)
    }

    pub fn subscribe_console(&mut self, observer: Observer<ConsoleEntry>) -> SubscriptionId {
        self.console.subscribe(observer)
    }

    pub fn unsubscribe_console(&mut self, id: SubscriptionId) -> bool {
        self.console.unsubscribe(id)
    }

    pub fn start_polling(&self) {
        self.poller.start();
    }

    pub fn stop_polling(&self) {
        self.poller.stop();
    }

    pub fn is_polling(&self) -> bool {
        self.poller.is_running()
    }

    /// Applies an editor event. Rejected events are also logged to the console.
    pub fn dispatch(&mut self, event: EditorEvent) -> Result<(), AppError> {
        let trace_id = Uuid::new_v4().to_string();
        let changes_scheme = !matches!(
            event,
            EditorEvent::Run | EditorEvent::Save | EditorEvent::SaveAs(_) | EditorEvent::Load(_)
        );
        let effect = match self.editor.handle(event, &trace_id) {
            Ok(effect) => effect,
            Err(err) => {
                warn!(trace_id = %trace_id, error = %err, "editor event rejected");
                self.console.error(err.error.clone());
                return Err(err);
            }
        };
        if changes_scheme {
            self.observers.notify(&AppUpdate::SchemeChanged);
        }
        if let Some(effect) = effect {
            self.perform(effect, trace_id);
        }
        Ok(())
    }

    fn perform(&mut self, effect: Effect, trace_id: String) {
        match effect {
            Effect::RunCommand(command) => {
                info!(trace_id = %trace_id, command = %command, "run broadcast");
                self.console.input(command.clone());
                let executor = Arc::clone(&self.executor);
                self.spawn_job(move || Completion::CommandFinished {
                    outputs: executor(&command, &trace_id),
                    trace_id,
                });
            }
            Effect::CreateFile => self.observers.notify(&AppUpdate::SaveRequested),
            Effect::WriteFile { path, json } => {
                info!(trace_id = %trace_id, path = %path.display(), "save scheme");
                self.spawn_job(move || Completion::Saved {
                    result: write_scheme_file(&path, &json, &trace_id),
                    path,
                    trace_id,
                });
            }
            Effect::ReadFile(path) => {
                info!(trace_id = %trace_id, path = %path.display(), "load scheme");
                self.spawn_job(move || Completion::Loaded {
                    result: read_scheme_file(&path, &trace_id),
                    path,
                    trace_id,
                });
            }
        }
    }

    fn spawn_job(&mut self, job: impl FnOnce() -> Completion + Send + 'static) {
        self.pending += 1;
        let tx = self.tx.clone();
        thread::spawn(move || {
            let _ = tx.send(job());
        });
    }

    /// Applies every completion that has already arrived. Never blocks.
    pub fn pump(&mut self) -> usize {
        let mut applied = 0;
        while let Ok(completion) = self.rx.try_recv() {
            self.apply(completion);
            applied += 1;
        }
        applied
    }

    /// Blocks up to `timeout` for one completion and applies it.
    pub fn wait_next(&mut self, timeout: Duration) -> bool {
        match self.rx.recv_timeout(timeout) {
            Ok(completion) => {
                self.apply(completion);
                true
            }
            Err(RecvTimeoutError::Timeout) | Err(RecvTimeoutError::Disconnected) => false,
        }
    }

    /// Applies completions until no background job is outstanding or `timeout` passes.
    pub fn wait_idle(&mut self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        while self.pending > 0 {
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                return false;
            }
            self.wait_next(remaining);
        }
        true
    }

    fn apply(&mut self, completion: Completion) {
        match completion {
            Completion::CommandFinished { trace_id, outputs } => {
                self.finish_job();
                info!(trace_id = %trace_id, outputs = outputs.len(), "broadcast finished");
                for output in outputs {
                    self.console.record(output);
                }
            }
            Completion::Saved {
                trace_id,
                path,
                result,
            } => {
                self.finish_job();
                match result {
                    Ok(()) => {
                        self.editor.mark_saved(path.clone());
                        self.observers.notify(&AppUpdate::Saved(path));
                    }
                    Err(err) => {
                        warn!(trace_id = %trace_id, error = %err, "save failed");
                        self.console.error(err.error);
                    }
                }
            }
            Completion::Loaded {
                trace_id,
                path,
                result,
            } => {
                self.finish_job();
                match result {
                    Ok(text) => self.install_loaded(path, &text, &trace_id),
                    Err(err) => {
                        warn!(trace_id = %trace_id, error = %err, "load failed");
                        self.console.error(err.error);
                    }
                }
            }
            Completion::Devices(devices) => {
                if devices != self.devices {
                    self.devices = devices;
                    self.observers
                        .notify(&AppUpdate::DevicesChanged(self.devices.clone()));
                }
            }
        }
    }

    fn install_loaded(&mut self, path: PathBuf, text: &str, trace_id: &str) {
        let mut failure = None;
        let scheme = from_json(text, |message| failure = Some(message));
        match failure {
            None => {
                info!(trace_id = %trace_id, params = scheme.len(), "scheme loaded");
                self.editor.replace_scheme(scheme, Some(path.clone()));
                self.observers.notify(&AppUpdate::SchemeChanged);
                self.observers.notify(&AppUpdate::Loaded(path));
            }
            Some(message) => {
                self.console.error(message);
                self.editor.replace_scheme(scheme, None);
                self.observers.notify(&AppUpdate::SchemeChanged);
            }
        }
    }

    fn finish_job(&mut self) {
        self.pending = self.pending.saturating_sub(1);
    }

    /// Stops device polling. In-flight broadcasts are left to finish on their own.
    pub fn shutdown(&mut self) {
        self.poller.shutdown();
    }
}
