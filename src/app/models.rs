use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct Device {
    pub id: String,
    pub model: String,
    pub name: String,
}

impl Device {
    pub fn new(id: impl Into<String>, model: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            model: model.into(),
            name: name.into(),
        }
    }

    pub fn label(&self) -> String {
        match (self.model.is_empty(), self.name.is_empty()) {
            (false, false) => format!("{} ({}, {})", self.id, self.model, self.name),
            (false, true) => format!("{} ({})", self.id, self.model),
            (true, false) => format!("{} ({})", self.id, self.name),
            (true, true) => self.id.clone(),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "UPPERCASE")]
pub enum ConsoleKind {
    Input,
    Output,
    Error,
}

impl ConsoleKind {
    pub fn as_str(self) -> &'static str {
        match self {
            ConsoleKind::Input => "INPUT",
            ConsoleKind::Output => "OUTPUT",
            ConsoleKind::Error => "ERROR",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ConsoleEntry {
    pub id: String,
    pub timestamp: String,
    pub kind: ConsoleKind,
    pub text: String,
}

/// Tagged result of running one external command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConsoleOutput {
    Success(String),
    Error(String),
}

impl ConsoleOutput {
    pub fn text(&self) -> &str {
        match self {
            ConsoleOutput::Success(text) | ConsoleOutput::Error(text) => text,
        }
    }

    pub fn kind(&self) -> ConsoleKind {
        match self {
            ConsoleOutput::Success(_) => ConsoleKind::Output,
            ConsoleOutput::Error(_) => ConsoleKind::Error,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn device_label_skips_missing_fields() {
        assert_eq!(
            Device::new("emulator-5554", "sdk_x86", "generic_x86").label(),
            "emulator-5554 (sdk_x86, generic_x86)"
        );
        assert_eq!(Device::new("ABC", "", "").label(), "ABC");
    }

    #[test]
    fn console_kind_serializes_upper_case() {
        let value = serde_json::to_value(ConsoleKind::Error).expect("serialize");
        assert_eq!(value, serde_json::json!("ERROR"));
        assert_eq!(ConsoleKind::Input.as_str(), "INPUT");
    }
}
