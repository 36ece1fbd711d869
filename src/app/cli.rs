use std::io::{BufRead, Write};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use clap::{Parser, Subcommand};
use tracing::{info, warn};
use uuid::Uuid;

use crate::app::adb::locator::{resolve_adb_program, validate_adb_program};
use crate::app::adb::parse::parse_devices_output;
use crate::app::adb::poller::DEVICES_COMMAND;
use crate::app::adb::runner;
use crate::app::broadcast::command::build_command_for;
use crate::app::config::{backup_config_path, save_config_to_path, AppConfig};
use crate::app::controller::app::{AppController, AppUpdate};
use crate::app::controller::editor::{Effect, EditorController, EditorEvent};
use crate::app::error::AppError;
use crate::app::models::{ConsoleEntry, ConsoleKind, ConsoleOutput, Device};
use crate::app::scheme::model::{ParamType, Scheme};
use crate::app::scheme::persist::{load_from_path, write_scheme_file};

const SETTLE_STEP: Duration = Duration::from_millis(100);

const HELP: &str = "\
package <name>         set the receiver component (-n)
intent <action>        set the intent action (-a)
add                    append an empty STRING parameter
key <id> <key>         rename a parameter
value <id> <text>      set a parameter value
type <id> <TYPE>       STRING, INTEGER, FLOAT, BOOLEAN or LONG
remove <id>            delete a parameter
clear                  empty the scheme
show                   print the scheme
command                print the adb command
run                    send the broadcast
devices                list attached devices
poll on|off            start or stop device polling
select <n|serial|none> target a device
save | save-as <path>  write the scheme
open [path]            load a scheme (default: the last one)
recent                 list recently used schemes
console                print the whole console
about | help | quit";

/// Compose and fire `adb shell am broadcast` intents.
#[derive(Debug, Parser)]
#[command(name = "fire_broadcast", version, long_about = None)]
pub struct Cli {
    /// Config file (overrides $FIRE_BROADCAST_CONFIG_PATH and ~/.fire_broadcast_config.json)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: CliCommand,
}

#[derive(Debug, Subcommand)]
pub enum CliCommand {
    /// Print the adb command a scheme file renders to
    Command {
        file: PathBuf,
        /// Target one device (adb -s)
        #[arg(long)]
        serial: Option<String>,
    },
    /// Send a scheme's broadcast and print the console
    Run {
        file: PathBuf,
        #[arg(long)]
        serial: Option<String>,
    },
    /// List attached devices
    Devices {
        /// Keep polling and print every change
        #[arg(long)]
        watch: bool,
        /// Stop watching after this many poll intervals
        #[arg(long, requires = "watch")]
        ticks: Option<u64>,
    },
    /// Print a scheme file
    Show { file: PathBuf },
    /// Write a new scheme file
    New {
        file: PathBuf,
        #[arg(long)]
        package: String,
        #[arg(long)]
        intent: String,
        /// key:TYPE=value, repeatable; TYPE defaults to STRING
        #[arg(long = "param", value_parser = parse_param_arg)]
        params: Vec<ParamArg>,
    },
    /// Edit a scheme interactively on stdin
    Edit { file: Option<PathBuf> },
}

#[derive(Debug, Clone, PartialEq)]
pub struct ParamArg {
    pub key: String,
    pub param_type: ParamType,
    pub value: String,
}

pub fn parse_param_arg(text: &str) -> Result<ParamArg, String> {
    let (head, value) = text
        .split_once('=')
        .ok_or_else(|| format!("expected key:TYPE=value, got {text:?}"))?;
    let (key, param_type) = match head.rsplit_once(':') {
        Some((key, name)) => {
            let param_type =
                ParamType::from_name(name).ok_or_else(|| format!("unknown type {name:?}"))?;
            (key, param_type)
        }
        None => (head, ParamType::String),
    };
    if key.trim().is_empty() {
        return Err(format!("parameter key is empty in {text:?}"));
    }
    Ok(ParamArg {
        key: key.to_string(),
        param_type,
        value: value.to_string(),
    })
}

pub fn run(command: CliCommand, mut config: AppConfig, config_file: &Path) -> Result<ExitCode, AppError> {
    let trace_id = Uuid::new_v4().to_string();
    match command {
        CliCommand::Command { file, serial } => {
            let scheme = load_from_path(&file, &trace_id)?;
            println!("{}", build_command_for(&scheme, serial.as_deref()));
            Ok(ExitCode::SUCCESS)
        }
        CliCommand::Show { file } => {
            let scheme = load_from_path(&file, &trace_id)?;
            println!("{}", render_scheme(&scheme));
            Ok(ExitCode::SUCCESS)
        }
        CliCommand::Run { file, serial } => {
            let mut controller = AppController::new(&config);
            let ok = run_scheme_file(&mut controller, &file, serial);
            for entry in controller.console().entries() {
                println!("{}", render_entry(entry));
            }
            controller.shutdown();
            Ok(if ok { ExitCode::SUCCESS } else { ExitCode::FAILURE })
        }
        CliCommand::Devices { watch: false, .. } => {
            let devices = list_devices(&config, &trace_id)?;
            println!("{}", render_devices(&devices));
            Ok(ExitCode::SUCCESS)
        }
        CliCommand::Devices { watch: true, ticks } => {
            watch_devices(&config, ticks);
            Ok(ExitCode::SUCCESS)
        }
        CliCommand::New {
            file,
            package,
            intent,
            params,
        } => {
            let scheme = create_scheme_file(&file, package, intent, params, &trace_id)?;
            remember_scheme(&mut config, config_file, &file);
            info!(trace_id = %trace_id, path = %file.display(), params = scheme.len(), "scheme created");
            println!("Wrote {}", file.display());
            Ok(ExitCode::SUCCESS)
        }
        CliCommand::Edit { file } => {
            let controller = AppController::new(&config);
            let auto_poll = config.device.auto_start_polling;
            let stdout = std::io::stdout();
            let mut session = EditSession::new(controller, config, config_file.to_path_buf(), stdout.lock());
            if auto_poll {
                session.controller.start_polling();
            }
            if let Some(file) = file {
                session.open(file);
            }
            session.run(std::io::stdin().lock())?;
            Ok(ExitCode::SUCCESS)
        }
    }
}

/// Loads `file` into the controller and fires its broadcast. False when anything was reported
/// as an error.
fn run_scheme_file(controller: &mut AppController, file: &Path, serial: Option<String>) -> bool {
    if controller.dispatch(EditorEvent::Load(file.to_path_buf())).is_err() {
        return false;
    }
    settle(controller);
    if controller.editor().current_file().is_none() {
        return false;
    }
    let _ = controller.dispatch(EditorEvent::SelectDevice(serial));
    if controller.dispatch(EditorEvent::Run).is_err() {
        return false;
    }
    settle(controller);
    !controller
        .console()
        .entries()
        .iter()
        .any(|entry| entry.kind == ConsoleKind::Error)
}

fn list_devices(config: &AppConfig, trace_id: &str) -> Result<Vec<Device>, AppError> {
    let adb_program = resolve_adb_program(&config.adb.command_path);
    validate_adb_program(&adb_program).map_err(|message| AppError::dependency(message, trace_id))?;
    let outputs = runner::execute(DEVICES_COMMAND, &adb_program, config.adb.timeout(), trace_id);
    let stdout = outputs.iter().find_map(|output| match output {
        ConsoleOutput::Success(stdout) => Some(stdout.as_str()),
        ConsoleOutput::Error(_) => None,
    });
    match stdout {
        Some(stdout) => Ok(parse_devices_output(stdout)),
        None => {
            let message = outputs
                .iter()
                .map(ConsoleOutput::text)
                .collect::<Vec<_>>()
                .join("\n");
            Err(AppError::dependency(message, trace_id))
        }
    }
}

fn watch_devices(config: &AppConfig, ticks: Option<u64>) {
    let mut controller = AppController::new(config);
    let interval = config.poll_interval();
    let mut printed: Option<Vec<Device>> = None;
    controller.start_polling();

    let mut tick = 0;
    while ticks.map_or(true, |limit| tick < limit) {
        wait_until(&mut controller, Instant::now() + interval);
        if printed.as_deref() != Some(controller.devices()) {
            println!("{}", render_devices(controller.devices()));
            printed = Some(controller.devices().to_vec());
        }
        tick += 1;
    }
    controller.shutdown();
}

/// Builds the scheme through the editor so values get the same checks as interactive edits.
pub fn create_scheme_file(
    file: &Path,
    package: String,
    intent: String,
    params: Vec<ParamArg>,
    trace_id: &str,
) -> Result<Scheme, AppError> {
    let mut editor = EditorController::new();
    editor.handle(EditorEvent::PackageUpdate(package), trace_id)?;
    editor.handle(EditorEvent::IntentUpdate(intent), trace_id)?;
    for param in params {
        let id = editor.scheme().next_id();
        editor.handle(EditorEvent::AddItem, trace_id)?;
        editor.handle(EditorEvent::KeyUpdate { id, key: param.key }, trace_id)?;
        editor.handle(
            EditorEvent::TypeUpdate {
                id,
                param_type: param.param_type,
            },
            trace_id,
        )?;
        editor.handle(EditorEvent::ValueUpdate { id, text: param.value }, trace_id)?;
    }
    if let Some(Effect::WriteFile { path, json }) =
        editor.handle(EditorEvent::SaveAs(file.to_path_buf()), trace_id)?
    {
        write_scheme_file(&path, &json, trace_id)?;
    }
    Ok(editor.scheme().clone())
}

fn remember_scheme(config: &mut AppConfig, config_file: &Path, scheme_file: &Path) {
    config.remember_scheme(scheme_file);
    if let Err(err) = save_config_to_path(config, config_file, &backup_config_path(config_file)) {
        warn!(error = %err, path = %config_file.display(), "failed to save config");
    }
}

fn settle(controller: &mut AppController) {
    while controller.pending() > 0 {
        controller.wait_next(SETTLE_STEP);
    }
}

fn wait_until(controller: &mut AppController, deadline: Instant) {
    loop {
        let remaining = deadline.saturating_duration_since(Instant::now());
        if remaining.is_zero() {
            return;
        }
        controller.wait_next(remaining);
    }
}

pub fn render_entry(entry: &ConsoleEntry) -> String {
    format!(
        "[{}] {:<6} {}",
        entry.timestamp,
        entry.kind.as_str(),
        entry.text.trim_end()
    )
}

pub fn render_scheme(scheme: &Scheme) -> String {
    let mut lines = vec![
        format!("package: {}", scheme.package),
        format!("intent:  {}", scheme.intent),
    ];
    if scheme.is_empty() {
        lines.push("params:  (none)".to_string());
    } else {
        lines.push("params:".to_string());
        for item in scheme.items() {
            lines.push(format!(
                "  #{} {} {} = {}",
                item.id,
                item.key,
                item.param_type(),
                item.value.to_text()
            ));
        }
    }
    lines.join("\n")
}

pub fn render_devices(devices: &[Device]) -> String {
    if devices.is_empty() {
        return "No devices attached".to_string();
    }
    devices
        .iter()
        .enumerate()
        .map(|(index, device)| format!("  [{index}] {}", device.label()))
        .collect::<Vec<_>>()
        .join("\n")
}

fn about() -> String {
    format!(
        "{} {}\nCompose and fire adb broadcast intents.\nAuthors: {}",
        env!("CARGO_PKG_NAME"),
        env!("CARGO_PKG_VERSION"),
        env!("CARGO_PKG_AUTHORS")
    )
}

pub enum Flow {
    Continue,
    Quit,
}

/// Line-oriented front end over an [`AppController`]. Background results are applied and
/// printed after every line.
pub struct EditSession<W: Write> {
    controller: AppController,
    config: AppConfig,
    config_file: PathBuf,
    updates: Arc<Mutex<Vec<AppUpdate>>>,
    shown: usize,
    out: W,
}

impl<W: Write> EditSession<W> {
    pub fn new(mut controller: AppController, config: AppConfig, config_file: PathBuf, out: W) -> Self {
        let updates = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&updates);
        controller.subscribe(Arc::new(move |update: &AppUpdate| {
            if let Ok(mut pending) = sink.lock() {
                pending.push(update.clone());
            }
        }));
        Self {
            controller,
            config,
            config_file,
            updates,
            shown: 0,
            out,
        }
    }

    pub fn controller(&self) -> &AppController {
        &self.controller
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    pub fn output(&self) -> &W {
        &self.out
    }

    pub fn run(&mut self, mut input: impl BufRead) -> Result<(), AppError> {
        self.say(format!(
            "{} {}, type `help` for commands",
            env!("CARGO_PKG_NAME"),
            env!("CARGO_PKG_VERSION")
        ));
        loop {
            let _ = write!(self.out, "> ");
            let _ = self.out.flush();
            let mut line = String::new();
            let read = input
                .read_line(&mut line)
                .map_err(|err| AppError::system(format!("Failed to read input: {err}"), ""))?;
            if read == 0 {
                break;
            }
            if let Flow::Quit = self.execute_line(&line) {
                break;
            }
        }
        self.controller.shutdown();
        Ok(())
    }

    pub fn execute_line(&mut self, line: &str) -> Flow {
        let line = line.trim();
        let (word, rest) = match line.split_once(char::is_whitespace) {
            Some((word, rest)) => (word, rest.trim()),
            None => (line, ""),
        };
        match word {
            "" => {}
            "package" => self.send(EditorEvent::PackageUpdate(rest.to_string())),
            "intent" => self.send(EditorEvent::IntentUpdate(rest.to_string())),
            "add" => {
                let id = self.controller.editor().scheme().next_id();
                if self.controller.dispatch(EditorEvent::AddItem).is_ok() {
                    self.say(format!("added parameter #{id}"));
                }
            }
            "key" => match item_args(rest) {
                Some((id, key)) => self.send(EditorEvent::KeyUpdate {
                    id,
                    key: key.to_string(),
                }),
                None => self.say("usage: key <id> <key>"),
            },
            "value" => match item_args(rest) {
                Some((id, text)) => self.send(EditorEvent::ValueUpdate {
                    id,
                    text: text.to_string(),
                }),
                None => self.say("usage: value <id> <text>"),
            },
            "type" => match item_args(rest).and_then(|(id, name)| Some((id, ParamType::from_name(name)?))) {
                Some((id, param_type)) => self.send(EditorEvent::TypeUpdate { id, param_type }),
                None => self.say("usage: type <id> <STRING|INTEGER|FLOAT|BOOLEAN|LONG>"),
            },
            "remove" => match rest.parse::<u32>() {
                Ok(id) => self.send(EditorEvent::Remove(id)),
                Err(_) => self.say("usage: remove <id>"),
            },
            "clear" => self.send(EditorEvent::Clear),
            "show" => {
                let text = render_scheme(self.controller.editor().scheme());
                self.say(text);
                if let Some(path) = self.controller.editor().current_file() {
                    let text = format!("file:    {}", path.display());
                    self.say(text);
                }
            }
            "command" => {
                let command = self.controller.editor().command();
                self.say(command);
            }
            "run" => self.send(EditorEvent::Run),
            "devices" => {
                self.controller.pump();
                let text = render_devices(self.controller.devices());
                self.say(text);
                if !self.controller.is_polling() {
                    self.say("(device polling is off)");
                }
            }
            "poll" => match rest {
                "on" => {
                    self.controller.start_polling();
                    self.say("device polling on");
                }
                "off" => {
                    self.controller.stop_polling();
                    self.say("device polling off");
                }
                _ => self.say("usage: poll on|off"),
            },
            "select" => self.select(rest),
            "save" => self.send(EditorEvent::Save),
            "save-as" if !rest.is_empty() => self.send(EditorEvent::SaveAs(PathBuf::from(rest))),
            "save-as" => self.say("usage: save-as <path>"),
            "open" if !rest.is_empty() => self.open(PathBuf::from(rest)),
            "open" if !self.config.last_scheme_path.is_empty() => {
                let path = PathBuf::from(&self.config.last_scheme_path);
                self.open(path);
            }
            "open" => self.say("usage: open <path>"),
            "recent" => {
                let text = if self.config.recent_schemes.is_empty() {
                    "No recent schemes".to_string()
                } else {
                    self.config.recent_schemes.join("\n")
                };
                self.say(text);
            }
            "console" => {
                let text = self
                    .controller
                    .console()
                    .entries()
                    .iter()
                    .map(render_entry)
                    .collect::<Vec<_>>()
                    .join("\n");
                self.say(text);
            }
            "about" => self.say(about()),
            "help" => self.say(HELP),
            "quit" | "exit" => {
                self.sync();
                return Flow::Quit;
            }
            other => self.say(format!("unknown command {other:?}, type `help`")),
        }
        self.sync();
        Flow::Continue
    }

    pub fn open(&mut self, path: PathBuf) {
        self.send(EditorEvent::Load(path));
        self.sync();
    }

    fn select(&mut self, target: &str) {
        let serial = match target {
            "" | "none" => None,
            _ => match target.parse::<usize>() {
                Ok(index) => match self.controller.devices().get(index) {
                    Some(device) => Some(device.id.clone()),
                    None => {
                        self.say(format!("no device at index {index}"));
                        return;
                    }
                },
                Err(_) => Some(target.to_string()),
            },
        };
        self.send(EditorEvent::SelectDevice(serial));
        let text = match self.controller.editor().selected_device() {
            Some(serial) => format!("targeting {serial}"),
            None => "targeting the default device".to_string(),
        };
        self.say(text);
    }

    /// Dispatches an event; rejections are already on the console.
    fn send(&mut self, event: EditorEvent) {
        let _ = self.controller.dispatch(event);
        settle(&mut self.controller);
    }

    /// Applies finished background work, then prints new console entries and updates.
    fn sync(&mut self) {
        self.controller.pump();
        let updates = self
            .updates
            .lock()
            .map(|mut pending| std::mem::take(&mut *pending))
            .unwrap_or_default();
        for update in updates {
            self.on_update(update);
        }
        let fresh: Vec<String> = self.controller.console().entries()[self.shown..]
            .iter()
            .map(render_entry)
            .collect();
        self.shown += fresh.len();
        for line in fresh {
            self.say(line);
        }
    }

    fn on_update(&mut self, update: AppUpdate) {
        match update {
            AppUpdate::SchemeChanged => {}
            AppUpdate::DevicesChanged(devices) => {
                self.say(format!("{} device(s) attached", devices.len()));
            }
            AppUpdate::SaveRequested => {
                self.say("This scheme has no file yet, use `save-as <path>`");
            }
            AppUpdate::Saved(path) => {
                self.say(format!("Saved {}", path.display()));
                remember_scheme(&mut self.config, &self.config_file, &path);
            }
            AppUpdate::Loaded(path) => {
                self.say(format!("Opened {}", path.display()));
                remember_scheme(&mut self.config, &self.config_file, &path);
            }
        }
    }

    fn say(&mut self, text: impl AsRef<str>) {
        let _ = writeln!(self.out, "{}", text.as_ref());
    }
}

fn item_args(rest: &str) -> Option<(u32, &str)> {
    let (id, tail) = match rest.split_once(char::is_whitespace) {
        Some((id, tail)) => (id, tail.trim()),
        None => (rest, ""),
    };
    Some((id.parse().ok()?, tail))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use std::thread;

    use crate::app::adb::poller::DevicePoller;
    use crate::app::console::ConsoleLog;
    use crate::app::controller::app::CommandExecutor;
    use crate::app::config::load_config_from_path;
    use crate::app::scheme::model::ParamValue;

    fn session(dir: &Path) -> EditSession<Vec<u8>> {
        let poller = DevicePoller::new(
            Arc::new(Vec::<ConsoleOutput>::new),
            Duration::from_millis(50),
        );
        session_with_poller(dir, poller)
    }

    fn session_with_poller(dir: &Path, poller: DevicePoller) -> EditSession<Vec<u8>> {
        let executor: CommandExecutor = Arc::new(|command: &str, _trace_id: &str| {
            vec![ConsoleOutput::Success(format!("ran: {command}"))]
        });
        let controller = AppController::with_parts(executor, poller, ConsoleLog::default());
        EditSession::new(
            controller,
            AppConfig::default(),
            dir.join("config.json"),
            Vec::new(),
        )
    }

    fn printed(session: &EditSession<Vec<u8>>) -> String {
        String::from_utf8_lossy(session.output()).to_string()
    }

    #[test]
    fn parses_param_arguments() {
        assert_eq!(
            parse_param_arg("count:INTEGER=42"),
            Ok(ParamArg {
                key: "count".to_string(),
                param_type: ParamType::Integer,
                value: "42".to_string(),
            })
        );
        let plain = parse_param_arg("team=supper=pupper").expect("string param");
        assert_eq!(plain.param_type, ParamType::String);
        assert_eq!(plain.value, "supper=pupper");
        assert!(parse_param_arg("flag:bool=true").is_err());
        assert!(parse_param_arg("novalue").is_err());
        assert!(parse_param_arg(":LONG=1").is_err());
    }

    #[test]
    fn parses_subcommands() {
        let cli = Cli::try_parse_from([
            "fire_broadcast",
            "--config",
            "/tmp/c.json",
            "new",
            "s.json",
            "--package",
            "p/.R",
            "--intent",
            "i.GO",
            "--param",
            "ok:boolean=TRUE",
        ])
        .expect("valid arguments");
        assert_eq!(cli.config, Some(PathBuf::from("/tmp/c.json")));
        match cli.command {
            CliCommand::New { params, .. } => {
                assert_eq!(params.len(), 1);
                assert_eq!(params[0].param_type, ParamType::Boolean);
            }
            other => panic!("unexpected command: {other:?}"),
        }

        assert!(Cli::try_parse_from(["fire_broadcast", "devices", "--ticks", "3"]).is_err());
        assert!(Cli::try_parse_from(["fire_broadcast", "devices", "--watch", "--ticks", "3"]).is_ok());
    }

    #[test]
    fn new_writes_a_validated_scheme() {
        let dir = tempfile::tempdir().expect("tempdir");
        let file = dir.path().join("new.json");
        let params = vec![
            parse_param_arg("team=supper-pupper").expect("param"),
            parse_param_arg("ratio:FLOAT=100").expect("param"),
        ];
        let scheme = create_scheme_file(&file, "p/.R".to_string(), "i.GO".to_string(), params, "t")
            .expect("created");
        assert_eq!(scheme.item(1).map(|item| &item.value), Some(&ParamValue::Float(100.0)));

        let loaded = load_from_path(&file, "t").expect("readable");
        assert_eq!(
            build_command_for(&loaded, None),
            "adb shell am broadcast -n p/.R -a i.GO --es team supper-pupper --ef ratio 100.0"
        );

        let bad = vec![parse_param_arg("count:INTEGER=many").expect("param")];
        let err = create_scheme_file(&dir.path().join("bad.json"), "p".into(), "i".into(), bad, "t")
            .expect_err("invalid integer");
        assert_eq!(err.code, "ERR_VALIDATION");
        assert!(!dir.path().join("bad.json").exists());
    }

    #[test]
    fn session_edits_runs_and_saves() {
        let dir = tempfile::tempdir().expect("tempdir");
        let scheme_file = dir.path().join("edited.json");
        let mut session = session(dir.path());
        let script = format!(
            "package com.app/.Receiver\nintent com.app.GO\nadd\nkey 0 team\nvalue 0 supper-pupper\n\
             run\nsave\nsave-as {}\nquit\nshow\n",
            scheme_file.display()
        );
        session.run(script.as_bytes()).expect("session");

        let output = printed(&session);
        assert!(output.contains("added parameter #0"));
        assert!(output.contains(
            "INPUT  adb shell am broadcast -n com.app/.Receiver -a com.app.GO --es team supper-pupper"
        ));
        assert!(output.contains("OUTPUT ran: adb shell am broadcast"));
        assert!(output.contains("use `save-as <path>`"));
        assert!(output.contains("Saved"));
        // Nothing after `quit` runs.
        assert!(!output.contains("package: com.app/.Receiver"));

        assert!(fs::read_to_string(&scheme_file)
            .expect("scheme written")
            .contains("supper-pupper"));
        let config = load_config_from_path(&dir.path().join("config.json")).expect("config");
        assert_eq!(config.last_scheme_path, scheme_file.to_string_lossy());
        assert_eq!(session.config().recent_schemes.len(), 1);
    }

    #[test]
    fn session_reports_rejections_on_the_console() {
        let dir = tempfile::tempdir().expect("tempdir");
        let mut session = session(dir.path());
        for line in ["add", "type 0 INTEGER", "value 0 forty", "type 9", "remove x", "run"] {
            session.execute_line(line);
        }
        let output = printed(&session);
        assert!(output.contains("ERROR  \"forty\" is not a valid INTEGER value"));
        assert!(output.contains("usage: type <id>"));
        assert!(output.contains("usage: remove <id>"));
        assert!(output.contains("ERROR  Package is required"));
        assert_eq!(session.controller().pending(), 0);
    }

    #[test]
    fn session_opens_files_and_selects_devices() {
        let dir = tempfile::tempdir().expect("tempdir");
        let file = dir.path().join("saved.json");
        create_scheme_file(
            &file,
            "p/.R".to_string(),
            "i.GO".to_string(),
            vec![parse_param_arg("n:LONG=7").expect("param")],
            "t",
        )
        .expect("created");

        let mut session = session(dir.path());
        session.execute_line(&format!("open {}", file.display()));
        session.execute_line("select emulator-5554");
        session.execute_line("command");
        session.execute_line("select 3");
        session.execute_line("recent");

        let output = printed(&session);
        assert!(output.contains("Opened"));
        assert!(output.contains("adb -s emulator-5554 shell am broadcast -n p/.R -a i.GO --el n 7"));
        assert!(output.contains("no device at index 3"));
        assert!(output.contains(&file.to_string_lossy().to_string()));
        assert_eq!(session.controller().editor().current_file(), Some(file.as_path()));
    }

    #[test]
    fn session_toggles_device_polling() {
        let dir = tempfile::tempdir().expect("tempdir");
        let listing = "List of devices attached\n\
                       emulator-5554 device product:sdk model:sdk_x86 device:generic_x86\n";
        let poller = DevicePoller::new(
            Arc::new(move || vec![ConsoleOutput::Success(listing.to_string())]),
            Duration::from_millis(20),
        );
        let mut session = session_with_poller(dir.path(), poller);
        session.execute_line("devices");
        session.execute_line("poll");
        assert!(!session.controller().is_polling());

        session.execute_line("poll on");
        assert!(session.controller().is_polling());
        let deadline = Instant::now() + Duration::from_secs(5);
        while session.controller().devices().is_empty() && Instant::now() < deadline {
            thread::sleep(Duration::from_millis(20));
            session.execute_line("devices");
        }
        session.execute_line("select 0");

        session.execute_line("poll off");
        let deadline = Instant::now() + Duration::from_secs(5);
        while (session.controller().is_polling() || !session.controller().devices().is_empty())
            && Instant::now() < deadline
        {
            thread::sleep(Duration::from_millis(20));
            session.execute_line("devices");
        }
        assert!(!session.controller().is_polling());
        assert!(session.controller().devices().is_empty());

        let output = printed(&session);
        assert!(output.contains("(device polling is off)"));
        assert!(output.contains("usage: poll on|off"));
        assert!(output.contains("device polling on"));
        assert!(output.contains("[0] emulator-5554 (sdk_x86, generic_x86)"));
        assert!(output.contains("targeting emulator-5554"));
        assert!(output.contains("device polling off"));
    }

    #[test]
    fn renders_devices_and_schemes() {
        assert_eq!(render_devices(&[]), "No devices attached");
        assert_eq!(
            render_devices(&[Device::new("R58M", "SM_G973F", "beyond1")]),
            "  [0] R58M (SM_G973F, beyond1)"
        );
        assert!(render_scheme(&Scheme::default()).ends_with("params:  (none)"));
    }
}
