use std::sync::{Arc, Condvar, Mutex, MutexGuard};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::app::adb::parse::parse_devices_output;
use crate::app::adb::runner::execute;
use crate::app::models::{ConsoleOutput, Device};

pub const DEVICES_COMMAND: &str = "adb devices -l";
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(1000);
const SHUTDOWN_GRACE: Duration = Duration::from_secs(2);

pub type DeviceListener = Arc<dyn Fn(Vec<Device>) + Send + Sync>;
pub type DeviceProbe = Arc<dyn Fn() -> Vec<ConsoleOutput> + Send + Sync>;

#[derive(Debug, Default)]
struct WorkerState {
    working: bool,
    alive: bool,
}

struct Shared {
    state: Mutex<WorkerState>,
    wake: Condvar,
    listener: Mutex<Option<DeviceListener>>,
    // Held while a listener runs so the list from `stop` is the last one delivered. The
    // `listener` slot itself is never locked across a call.
    delivery: Mutex<()>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Background loop that lists attached devices on a fixed cadence and hands every list to a
/// single listener. At most one worker thread exists per poller.
pub struct DevicePoller {
    shared: Arc<Shared>,
    probe: DeviceProbe,
    interval: Duration,
    worker: Mutex<Option<JoinHandle<()>>>,
}

impl DevicePoller {
    pub fn new(probe: DeviceProbe, interval: Duration) -> Self {
        Self {
            shared: Arc::new(Shared {
                state: Mutex::new(WorkerState::default()),
                wake: Condvar::new(),
                listener: Mutex::new(None),
                delivery: Mutex::new(()),
            }),
            probe,
            interval,
            worker: Mutex::new(None),
        }
    }

    /// Polls `adb devices -l` through the given adb program.
    pub fn for_adb(adb_program: String, timeout: Option<Duration>, interval: Duration) -> Self {
        let probe = traced_probe(move |trace_id: &str| {
            execute(DEVICES_COMMAND, &adb_program, timeout, trace_id)
        });
        Self::new(probe, interval)
    }

    /// Replaces the current listener; only the last registration receives updates.
    pub fn set_listener(&self, listener: DeviceListener) {
        *lock(&self.shared.listener) = Some(listener);
    }

    pub fn clear_listener(&self) {
        *lock(&self.shared.listener) = None;
    }

    pub fn has_listener(&self) -> bool {
        lock(&self.shared.listener).is_some()
    }

    pub fn is_running(&self) -> bool {
        lock(&self.shared.state).alive
    }

    /// Starts polling. Calling it while the worker is alive only keeps it working.
    pub fn start(&self) {
        {
            let mut state = lock(&self.shared.state);
            state.working = true;
            if state.alive {
                return;
            }
            state.alive = true;
        }

        let mut worker = lock(&self.worker);
        if let Some(previous) = worker.take() {
            // `alive` was false, so the previous loop has already left.
            let _ = previous.join();
        }

        let shared = Arc::clone(&self.shared);
        let probe = Arc::clone(&self.probe);
        let interval = self.interval;
        info!(interval_ms = interval.as_millis() as u64, "device poller started");
        *worker = Some(thread::spawn(move || poll_loop(shared, probe, interval)));
    }

    /// Lets the current iteration finish, then the loop exits. The listener sees an empty list.
    pub fn stop(&self) {
        {
            let mut state = lock(&self.shared.state);
            state.working = false;
            self.shared.wake.notify_all();
        }
        let _delivery = lock(&self.shared.delivery);
        if let Some(listener) = current_listener(&self.shared) {
            listener(Vec::new());
        }
        debug!("device poller stopping");
    }

    /// Stops the loop, drops the listener and waits briefly for the worker to exit.
    pub fn shutdown(&self) {
        {
            let mut state = lock(&self.shared.state);
            state.working = false;
            self.shared.wake.notify_all();
        }
        self.clear_listener();

        let Some(handle) = lock(&self.worker).take() else {
            return;
        };
        let deadline = Instant::now() + SHUTDOWN_GRACE;
        while !handle.is_finished() && Instant::now() < deadline {
            thread::sleep(Duration::from_millis(10));
        }
        if handle.is_finished() {
            let _ = handle.join();
            info!("device poller shut down");
        } else {
            // A hung adb call keeps the thread busy; it exits on its own once the call returns.
            warn!("device poller still busy at shutdown; detaching worker");
        }
    }
}

impl Drop for DevicePoller {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn poll_loop(shared: Arc<Shared>, probe: DeviceProbe, interval: Duration) {
    loop {
        {
            let mut state = lock(&shared.state);
            if !state.working {
                state.alive = false;
                return;
            }
        }

        let outputs = probe();
        let stdout = outputs.iter().find_map(|output| match output {
            ConsoleOutput::Success(stdout) => Some(stdout.as_str()),
            ConsoleOutput::Error(_) => None,
        });
        match stdout {
            Some(stdout) => publish(&shared, parse_devices_output(stdout)),
            None => {
                for output in &outputs {
                    debug!(error = %output.text(), "device probe failed");
                }
            }
        }

        let state = lock(&shared.state);
        let _ = shared
            .wake
            .wait_timeout_while(state, interval, |state| state.working)
            .map_err(|_| warn!("device poller state poisoned"));
    }
}

/// Wraps a probe body so every tick runs under its own trace id.
fn traced_probe<F>(run: F) -> DeviceProbe
where
    F: Fn(&str) -> Vec<ConsoleOutput> + Send + Sync + 'static,
{
    Arc::new(move || run(&Uuid::new_v4().to_string()))
}

fn current_listener(shared: &Shared) -> Option<DeviceListener> {
    lock(&shared.listener).clone()
}

fn publish(shared: &Shared, devices: Vec<Device>) {
    let _delivery = lock(&shared.delivery);
    // `stop` clears `working` before taking `delivery`.
    if !lock(&shared.state).working {
        return;
    }
    if let Some(listener) = current_listener(shared) {
        listener(devices);
    }
}
