use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use regex::Regex;
use tracing::debug;

use crate::app::broadcast::command::build_command_for;
use crate::app::error::AppError;
use crate::app::scheme::model::{ParamType, ParamValue, Scheme};
use crate::app::scheme::persist::to_json;

/// User intents against the scheme being edited.
#[derive(Debug, Clone, PartialEq)]
pub enum EditorEvent {
    PackageUpdate(String),
    IntentUpdate(String),
    AddItem,
    KeyUpdate { id: u32, key: String },
    ValueUpdate { id: u32, text: String },
    TypeUpdate { id: u32, param_type: ParamType },
    Remove(u32),
    SelectDevice(Option<String>),
    Clear,
    Run,
    Save,
    SaveAs(PathBuf),
    Load(PathBuf),
}

/// Work the editor asks its owner to carry out off the owning thread.
#[derive(Debug, Clone, PartialEq)]
pub enum Effect {
    RunCommand(String),
    /// Save was requested but no file is associated yet; the front end must pick one.
    CreateFile,
    WriteFile { path: PathBuf, json: String },
    ReadFile(PathBuf),
}

/// Owns the live scheme, the file it belongs to and the targeted device.
#[derive(Debug, Default)]
pub struct EditorController {
    scheme: Scheme,
    current_file: Option<PathBuf>,
    selected_device: Option<String>,
}

fn value_pattern(param_type: ParamType) -> Option<&'static Regex> {
    static INTEGER: OnceLock<Option<Regex>> = OnceLock::new();
    static FLOAT: OnceLock<Option<Regex>> = OnceLock::new();
    static BOOLEAN: OnceLock<Option<Regex>> = OnceLock::new();
    let (slot, pattern) = match param_type {
        ParamType::String => return None,
        ParamType::Integer | ParamType::Long => (&INTEGER, r"^[+-]?[0-9]+$"),
        ParamType::Float => (&FLOAT, r"^[+-]?([0-9]*[.])?[0-9]+$"),
        ParamType::Boolean => (&BOOLEAN, r"^(?i:true|false)$"),
    };
    slot.get_or_init(|| Regex::new(pattern).ok()).as_ref()
}

fn ensure_non_empty(value: &str, field: &str, trace_id: &str) -> Result<(), AppError> {
    if value.trim().is_empty() {
        return Err(AppError::validation(format!("{field} is required"), trace_id));
    }
    Ok(())
}

impl EditorController {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn scheme(&self) -> &Scheme {
        &self.scheme
    }

    pub fn current_file(&self) -> Option<&Path> {
        self.current_file.as_deref()
    }

    pub fn selected_device(&self) -> Option<&str> {
        self.selected_device.as_deref()
    }

    pub fn command(&self) -> String {
        build_command_for(&self.scheme, self.selected_device.as_deref())
    }

    /// Applies one event. Returns the follow-up work, if any, for the owner to perform.
    pub fn handle(&mut self, event: EditorEvent, trace_id: &str) -> Result<Option<Effect>, AppError> {
        debug!(trace_id = %trace_id, event = ?event, "editor event");
        match event {
            EditorEvent::PackageUpdate(package) => self.scheme.package = package,
            EditorEvent::IntentUpdate(intent) => self.scheme.intent = intent,
            EditorEvent::AddItem => {
                self.scheme.add_item();
            }
            EditorEvent::KeyUpdate { id, key } => {
                if !self.scheme.update_key(id, key) {
                    return Err(unknown_item(id, trace_id));
                }
            }
            EditorEvent::ValueUpdate { id, text } => self.update_value(id, &text, trace_id)?,
            EditorEvent::TypeUpdate { id, param_type } => {
                if !self.scheme.update_type(id, param_type) {
                    return Err(unknown_item(id, trace_id));
                }
            }
            EditorEvent::Remove(id) => {
                if !self.scheme.remove_item(id) {
                    return Err(unknown_item(id, trace_id));
                }
            }
            EditorEvent::SelectDevice(serial) => {
                self.selected_device = serial.filter(|serial| !serial.trim().is_empty());
            }
            EditorEvent::Clear => self.scheme.clear(),
            EditorEvent::Run => {
                self.validate_for_run(trace_id)?;
                return Ok(Some(Effect::RunCommand(self.command())));
            }
            EditorEvent::Save => {
                return Ok(Some(match &self.current_file {
                    Some(path) => Effect::WriteFile {
                        path: path.clone(),
                        json: to_json(&self.scheme),
                    },
                    None => Effect::CreateFile,
                }));
            }
            EditorEvent::SaveAs(path) => {
                return Ok(Some(Effect::WriteFile {
                    path,
                    json: to_json(&self.scheme),
                }));
            }
            EditorEvent::Load(path) => return Ok(Some(Effect::ReadFile(path))),
        }
        Ok(None)
    }

    /// Installs a freshly loaded scheme. `path` is `None` when the load failed, which detaches
    /// the editor from any file so a later save cannot overwrite it with the empty scheme.
    pub fn replace_scheme(&mut self, scheme: Scheme, path: Option<PathBuf>) {
        self.scheme = scheme;
        self.current_file = path;
    }

    /// Binds the editor to `path` once a write there has succeeded.
    pub fn mark_saved(&mut self, path: PathBuf) {
        self.current_file = Some(path);
    }

    fn update_value(&mut self, id: u32, text: &str, trace_id: &str) -> Result<(), AppError> {
        let param_type = self
            .scheme
            .item(id)
            .map(|item| item.param_type())
            .ok_or_else(|| unknown_item(id, trace_id))?;
        if let Some(pattern) = value_pattern(param_type) {
            if !pattern.is_match(text.trim()) {
                return Err(AppError::validation(
                    format!("{text:?} is not a valid {param_type} value"),
                    trace_id,
                ));
            }
        }
        let value = ParamValue::parse(param_type, text)
            .map_err(|message| AppError::validation(message, trace_id))?;
        self.scheme.update_value(id, value);
        Ok(())
    }

    fn validate_for_run(&self, trace_id: &str) -> Result<(), AppError> {
        ensure_non_empty(&self.scheme.package, "Package", trace_id)?;
        ensure_non_empty(&self.scheme.intent, "Intent", trace_id)?;
        if let Some(item) = self.scheme.items().iter().find(|item| item.key.trim().is_empty()) {
            return Err(AppError::validation(
                format!("Parameter {} has an empty key", item.id),
                trace_id,
            ));
        }
        Ok(())
    }
}

fn unknown_item(id: u32, trace_id: &str) -> AppError {
    AppError::validation(format!("No parameter with id {id}"), trace_id)
}
