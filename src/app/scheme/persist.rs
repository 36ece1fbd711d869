use std::fs;
use std::io::Write;
use std::path::Path;

use serde::Serialize;
use serde_json::Value;
use tracing::warn;

use crate::app::error::AppError;
use crate::app::scheme::model::{ParamType, ParamValue, Scheme};

const INTENT: &str = "intent";
const PACKAGE: &str = "package";
const PARAMS: &str = "params";
const KEY: &str = "key";
const VALUE: &str = "value";
const TYPE: &str = "type";

#[derive(Serialize)]
struct SchemeDocument<'a> {
    intent: &'a str,
    package: &'a str,
    params: Vec<ParamDocument<'a>>,
}

#[derive(Serialize)]
struct ParamDocument<'a> {
    key: &'a str,
    value: String,
    #[serde(rename = "type")]
    param_type: &'static str,
}

pub fn to_json(scheme: &Scheme) -> String {
    let document = SchemeDocument {
        intent: &scheme.intent,
        package: &scheme.package,
        params: scheme
            .items()
            .iter()
            .map(|item| ParamDocument {
                key: &item.key,
                value: item.value.to_text(),
                param_type: item.param_type().as_str(),
            })
            .collect(),
    };
    // A document made only of strings always serializes.
    serde_json::to_string_pretty(&document).unwrap_or_default()
}

/// Parses a scheme document. Only an unreadable document is an error; bad items are defaulted.
pub fn parse_scheme(text: &str) -> Result<Scheme, AppError> {
    let value: Value = serde_json::from_str(text)
        .map_err(|err| AppError::parse(format!("Failed to parse scheme: {err}"), ""))?;
    let Some(object) = value.as_object() else {
        return Err(AppError::parse("Scheme document must be a JSON object", ""));
    };

    let intent = object.get(INTENT).map(value_text).unwrap_or_default();
    let package = object.get(PACKAGE).map(value_text).unwrap_or_default();
    let params = object
        .get(PARAMS)
        .and_then(Value::as_array)
        .map(|params| params.iter().map(parse_param).collect::<Vec<_>>())
        .unwrap_or_default();

    Ok(Scheme::from_parts(intent, package, params))
}

/// Loads a scheme, reporting a malformed document once through `on_error` and yielding an
/// empty scheme in that case.
pub fn from_json(text: &str, on_error: impl FnOnce(String)) -> Scheme {
    match parse_scheme(text) {
        Ok(scheme) => scheme,
        Err(err) => {
            warn!(error = %err, "scheme document rejected");
            on_error(err.error);
            Scheme::default()
        }
    }
}

fn parse_param(param: &Value) -> (String, ParamValue) {
    let key = param.get(KEY).map(value_text).unwrap_or_default();
    let text = param.get(VALUE).map(value_text).unwrap_or_default();
    let param_type = param
        .get(TYPE)
        .and_then(Value::as_str)
        .and_then(ParamType::from_name)
        .unwrap_or(ParamType::String);
    let value = ParamValue::parse(param_type, &text).unwrap_or_else(|err| {
        warn!(key = %key, error = %err, "defaulting unparseable scheme value");
        ParamValue::zero(param_type)
    });
    (key, value)
}

fn value_text(value: &Value) -> String {
    match value {
        Value::String(text) => text.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

pub fn read_scheme_file(path: &Path, trace_id: &str) -> Result<String, AppError> {
    fs::read_to_string(path).map_err(|err| {
        AppError::system(
            format!("Failed to read scheme {}: {err}", path.display()),
            trace_id,
        )
    })
}

/// Replaces the file wholesale: writes a sibling temp file, then renames it over `path`.
pub fn write_scheme_file(path: &Path, json: &str, trace_id: &str) -> Result<(), AppError> {
    let parent = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    let write_err = |err: &dyn std::fmt::Display| {
        AppError::system(
            format!("Failed to write scheme {}: {err}", path.display()),
            trace_id,
        )
    };
    let mut file = tempfile::NamedTempFile::new_in(parent).map_err(|err| write_err(&err))?;
    file.write_all(json.as_bytes()).map_err(|err| write_err(&err))?;
    file.persist(path).map_err(|err| write_err(&err.error))?;
    Ok(())
}

pub fn save_to_path(scheme: &Scheme, path: &Path, trace_id: &str) -> Result<(), AppError> {
    write_scheme_file(path, &to_json(scheme), trace_id)
}

pub fn load_from_path(path: &Path, trace_id: &str) -> Result<Scheme, AppError> {
    let text = read_scheme_file(path, trace_id)?;
    parse_scheme(&text).map_err(|err| AppError::parse(err.error, trace_id))
}
