use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::mpsc;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use fire_broadcast_lib::app::adb::locator::{resolve_adb_program, validate_adb_program};
use fire_broadcast_lib::app::adb::parse::parse_devices_output;
use fire_broadcast_lib::app::adb::poller::{DeviceListener, DevicePoller, DEVICES_COMMAND};
use fire_broadcast_lib::app::adb::runner::execute;
use fire_broadcast_lib::app::config::load_config;
use fire_broadcast_lib::app::controller::app::AppController;
use fire_broadcast_lib::app::controller::editor::EditorEvent;
use fire_broadcast_lib::app::models::{ConsoleKind, ConsoleOutput, Device};
use fire_broadcast_lib::app::scheme::model::{ParamValue, Scheme};
use fire_broadcast_lib::app::scheme::persist::{load_from_path, save_to_path};
use serde::Serialize;
use uuid::Uuid;

const SMOKE_PACKAGE: &str = "com.poud.fire_broadcast.smoke/.Receiver";
const SMOKE_INTENT: &str = "com.poud.fire_broadcast.SMOKE";

#[derive(Debug, Clone)]
struct Args {
    serial: Option<String>,
    out_dir: Option<PathBuf>,
    json: bool,
    package: String,
    intent: String,
}

#[derive(Serialize)]
struct SmokeSummary {
    tool: &'static str,
    status: &'static str,
    trace_id: String,
    serial: Option<String>,
    adb_program: Option<String>,
    out_dir: String,
    artifacts: HashMap<String, String>,
    checks: Vec<SmokeCheck>,
}

#[derive(Serialize)]
struct SmokeCheck {
    name: &'static str,
    status: &'static str, // pass|fail|warn
    duration_ms: u128,
    artifacts: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error_code: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

type CheckResult = Result<(Vec<String>, Option<String>), (&'static str, String)>;

fn parse_args() -> Result<Args, String> {
    let mut args = Args {
        serial: std::env::var("ANDROID_SERIAL")
            .ok()
            .filter(|s| !s.trim().is_empty()),
        out_dir: None,
        json: false,
        package: SMOKE_PACKAGE.to_string(),
        intent: SMOKE_INTENT.to_string(),
    };

    let mut it = std::env::args().skip(1);
    while let Some(arg) = it.next() {
        let mut value = |flag: &str| {
            it.next()
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
                .ok_or_else(|| format!("{flag} requires a value"))
        };
        match arg.as_str() {
            "--serial" => args.serial = Some(value("--serial")?),
            "--out" => args.out_dir = Some(PathBuf::from(value("--out")?)),
            "--package" => args.package = value("--package")?,
            "--intent" => args.intent = value("--intent")?,
            "--json" => args.json = true,
            "-h" | "--help" => {
                return Err(
                    "usage: smoke [--serial S] [--out DIR] [--package P] [--intent I] [--json]"
                        .to_string(),
                )
            }
            other => return Err(format!("unknown argument {other}")),
        }
    }
    Ok(args)
}

/// Runs one check; warnings keep the overall status, failures flip it.
fn run_check<F>(checks: &mut Vec<SmokeCheck>, name: &'static str, f: F) -> Result<(), ()>
where
    F: FnOnce() -> CheckResult,
{
    let start = Instant::now();
    match f() {
        Ok((artifacts, warning)) => {
            checks.push(SmokeCheck {
                name,
                status: if warning.is_some() { "warn" } else { "pass" },
                duration_ms: start.elapsed().as_millis(),
                artifacts,
                error_code: warning.as_ref().map(|_| "WARN"),
                error: warning,
            });
            Ok(())
        }
        Err((code, err)) => {
            checks.push(SmokeCheck {
                name,
                status: "fail",
                duration_ms: start.elapsed().as_millis(),
                artifacts: vec![],
                error_code: Some(code),
                error: Some(err),
            });
            Err(())
        }
    }
}

fn list_devices(adb_program: &str, trace_id: &str) -> Result<Vec<Device>, (&'static str, String)> {
    let outputs = execute(DEVICES_COMMAND, adb_program, Some(Duration::from_secs(10)), trace_id);
    for output in &outputs {
        if let ConsoleOutput::Success(stdout) = output {
            return Ok(parse_devices_output(stdout));
        }
    }
    let message = outputs
        .iter()
        .map(ConsoleOutput::text)
        .collect::<Vec<_>>()
        .join("\n");
    Err(("ERR_DEVICES", message))
}

fn write_artifact(
    artifacts: &mut HashMap<String, String>,
    name: &str,
    path: &Path,
    body: &str,
) -> Result<String, (&'static str, String)> {
    fs::write(path, body)
        .map_err(|err| ("ERR_IO", format!("Failed to write {}: {err}", path.display())))?;
    let path = path.to_string_lossy().to_string();
    artifacts.insert(name.to_string(), path.clone());
    Ok(path)
}

fn finish(summary: SmokeSummary, json: bool) -> ! {
    let output = if json {
        serde_json::to_string_pretty(&summary).unwrap_or_else(|_| "{}".to_string())
    } else {
        let mut lines = vec![
            format!("status: {}", summary.status),
            format!("trace_id: {}", summary.trace_id),
            format!("out: {}", summary.out_dir),
        ];
        for check in &summary.checks {
            lines.push(format!(
                "  {:<16} {:<4} {}ms {}",
                check.name,
                check.status,
                check.duration_ms,
                check.error.as_deref().unwrap_or("")
            ));
        }
        lines.join("\n")
    };
    println!("{output}");
    std::process::exit(if summary.status == "pass" { 0 } else { 1 });
}

fn main() {
    let args = match parse_args() {
        Ok(v) => v,
        Err(msg) => {
            eprintln!("{msg}");
            std::process::exit(2);
        }
    };

    let trace_id = Uuid::new_v4().to_string();
    let out_dir = args.out_dir.clone().unwrap_or_else(|| {
        let mut p = std::env::temp_dir();
        p.push(format!("fire_broadcast_smoke_{trace_id}"));
        p
    });
    if let Err(err) = fs::create_dir_all(&out_dir) {
        eprintln!("Failed to create dir {}: {err}", out_dir.display());
        std::process::exit(1);
    }

    let mut artifacts: HashMap<String, String> = HashMap::new();
    let mut checks: Vec<SmokeCheck> = Vec::new();
    let mut status = "pass";
    let summary = |status: &'static str,
                   serial: Option<String>,
                   adb_program: Option<String>,
                   artifacts: HashMap<String, String>,
                   checks: Vec<SmokeCheck>| SmokeSummary {
        tool: "fire_broadcast_smoke",
        status,
        trace_id: trace_id.clone(),
        serial,
        adb_program,
        out_dir: out_dir.to_string_lossy().to_string(),
        artifacts,
        checks,
    };

    let config = load_config().unwrap_or_default();
    let adb_program = resolve_adb_program(&config.adb.command_path);

    if run_check(&mut checks, "check_adb", || {
        validate_adb_program(&adb_program).map_err(|err| ("ERR_ADB_PATH", err))?;
        let outputs = execute("adb version", &adb_program, Some(Duration::from_secs(10)), &trace_id);
        match outputs.first() {
            Some(ConsoleOutput::Success(version)) if version.contains("Android Debug Bridge") => {
                Ok((vec![], None))
            }
            Some(other) => Err(("ERR_CHECK_ADB", other.text().to_string())),
            None => Err(("ERR_CHECK_ADB", "adb version printed nothing".to_string())),
        }
    })
    .is_err()
    {
        finish(summary("fail", args.serial, Some(adb_program), artifacts, checks), args.json);
    }

    let mut serial = args.serial.clone();
    if run_check(&mut checks, "list_devices", || {
        let devices = list_devices(&adb_program, &trace_id)?;
        let picked = match (serial.as_deref(), devices.as_slice()) {
            (Some(wanted), _) if devices.iter().any(|d| d.id == wanted) => wanted.to_string(),
            (Some(wanted), _) => {
                return Err(("ERR_PICK_DEVICE", format!("{wanted} is not attached")))
            }
            (None, [only]) => only.id.clone(),
            (None, []) => return Err(("ERR_PICK_DEVICE", "No devices attached".to_string())),
            (None, _) => {
                return Err((
                    "ERR_PICK_DEVICE",
                    "Multiple devices attached, pass --serial".to_string(),
                ))
            }
        };
        serial = Some(picked);
        Ok((vec![], None))
    })
    .is_err()
    {
        finish(summary("fail", serial, Some(adb_program), artifacts, checks), args.json);
    }

    if run_check(&mut checks, "device_poller", || {
        let poller = DevicePoller::for_adb(
            adb_program.clone(),
            Some(Duration::from_secs(10)),
            Duration::from_millis(250),
        );
        let (tx, rx) = mpsc::channel();
        let tx = Mutex::new(tx);
        let listener: DeviceListener = Arc::new(move |devices: Vec<Device>| {
            if let Ok(tx) = tx.lock() {
                let _ = tx.send(devices);
            }
        });
        poller.set_listener(listener);
        poller.start();
        let first = rx.recv_timeout(Duration::from_secs(10));
        poller.shutdown();
        let devices = first.map_err(|_| ("ERR_POLLER", "No device list within 10s".to_string()))?;
        if devices.iter().any(|d| Some(&d.id) == serial.as_ref()) {
            Ok((vec![], None))
        } else {
            Err(("ERR_POLLER", "Polled list is missing the device".to_string()))
        }
    })
    .is_err()
    {
        status = "fail";
    }

    let scheme_path = out_dir.join("smoke_scheme.json");
    let mut scheme = Scheme::new(args.intent.clone(), args.package.clone());
    scheme.push_item("note", ParamValue::String("smoke \"test\"".to_string()));
    scheme.push_item("count", ParamValue::Integer(3));
    scheme.push_item("ratio", ParamValue::Float(100.0));
    scheme.push_item("enabled", ParamValue::Boolean(true));
    scheme.push_item("stamp", ParamValue::Long(1_700_000_000_000));

    if run_check(&mut checks, "scheme_round_trip", || {
        save_to_path(&scheme, &scheme_path, &trace_id).map_err(|err| ("ERR_SAVE", err.error))?;
        let loaded = load_from_path(&scheme_path, &trace_id).map_err(|err| ("ERR_LOAD", err.error))?;
        artifacts.insert("scheme".to_string(), scheme_path.to_string_lossy().to_string());
        if loaded.triples() == scheme.triples() {
            Ok((vec![scheme_path.to_string_lossy().to_string()], None))
        } else {
            Err(("ERR_ROUND_TRIP", "Reloaded scheme differs".to_string()))
        }
    })
    .is_err()
    {
        status = "fail";
    }

    let console_path = out_dir.join("console.txt");
    if run_check(&mut checks, "broadcast", || {
        let mut controller = AppController::new(&config);
        let events = [
            EditorEvent::Load(scheme_path.clone()),
            EditorEvent::SelectDevice(serial.clone()),
            EditorEvent::Run,
        ];
        for event in events {
            controller
                .dispatch(event)
                .map_err(|err| ("ERR_BROADCAST", err.error))?;
            if !controller.wait_idle(Duration::from_secs(30)) {
                return Err(("ERR_BROADCAST", "Timed out waiting for adb".to_string()));
            }
        }
        controller.shutdown();

        let console = controller
            .console()
            .entries()
            .iter()
            .map(|entry| format!("[{}] {} {}", entry.timestamp, entry.kind.as_str(), entry.text))
            .collect::<Vec<_>>()
            .join("\n");
        let path = write_artifact(&mut artifacts, "console", &console_path, &console)?;
        let entries = controller.console().entries();
        if let Some(error) = entries.iter().find(|entry| entry.kind == ConsoleKind::Error) {
            return Err(("ERR_BROADCAST", error.text.clone()));
        }
        let completed = entries
            .iter()
            .any(|entry| entry.kind == ConsoleKind::Output && entry.text.contains("Broadcast completed"));
        let warning = (!completed).then(|| "am did not report completion".to_string());
        Ok((vec![path], warning))
    })
    .is_err()
    {
        status = "fail";
    }

    finish(summary(status, serial, Some(adb_program), artifacts, checks), args.json);
}
