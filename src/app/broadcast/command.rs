//! Renders a scheme as an `adb shell am broadcast` command line.
//!
//! Extras use the `am` intent argument flags:
//! `--es` string, `--ez` boolean, `--ei` int, `--el` long, `--ef` float.

use crate::app::scheme::model::{ParamItem, ParamType, ParamValue, Scheme};

pub const BROADCAST: &str = "adb shell am broadcast";
const RECEIVER_FLAG: &str = "-n";
const ACTION_FLAG: &str = "-a";

pub fn extra_flag(param_type: ParamType) -> &'static str {
    match param_type {
        ParamType::String => "--es",
        ParamType::Boolean => "--ez",
        ParamType::Integer => "--ei",
        ParamType::Long => "--el",
        ParamType::Float => "--ef",
    }
}

pub fn build_command(scheme: &Scheme) -> String {
    build_command_for(scheme, None)
}

/// Same as [`build_command`], targeting one device with `adb -s <serial>` when given.
pub fn build_command_for(scheme: &Scheme, serial: Option<&str>) -> String {
    let mut command = match serial.map(str::trim).filter(|serial| !serial.is_empty()) {
        Some(serial) => BROADCAST.replacen("adb", &format!("adb -s {serial}"), 1),
        None => BROADCAST.to_string(),
    };
    command.push_str(&format!(
        " {RECEIVER_FLAG} {} {ACTION_FLAG} {}",
        scheme.package, scheme.intent
    ));
    for item in scheme.items() {
        command.push(' ');
        command.push_str(&render_extra(item));
    }
    command
}

fn render_extra(item: &ParamItem) -> String {
    let value = match &item.value {
        ParamValue::String(text) => escape_value(text),
        other => other.to_text(),
    };
    format!("{} {} {}", extra_flag(item.param_type()), item.key, value)
}

/// Backslash-escapes quotes, backslashes, control characters and the U+2000..U+20FF block.
pub fn escape_value(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    for ch in value.chars() {
        match ch {
            '"' => escaped.push_str("\\\""),
            '\\' => escaped.push_str("\\\\"),
            '\u{8}' => escaped.push_str("\\b"),
            '\n' => escaped.push_str("\\n"),
            '\r' => escaped.push_str("\\r"),
            '\t' => escaped.push_str("\\t"),
            '\u{0}'..='\u{1F}' | '\u{7F}'..='\u{9F}' | '\u{2000}'..='\u{20FF}' => {
                escaped.push_str(&format!("\\u{:04X}", ch as u32));
            }
            _ => escaped.push(ch),
        }
    }
    escaped
}
