use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "UPPERCASE")]
pub enum ParamType {
    String,
    Integer,
    Float,
    Boolean,
    Long,
}

impl ParamType {
    pub const ALL: [ParamType; 5] = [
        ParamType::String,
        ParamType::Integer,
        ParamType::Float,
        ParamType::Boolean,
        ParamType::Long,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            ParamType::String => "STRING",
            ParamType::Integer => "INTEGER",
            ParamType::Float => "FLOAT",
            ParamType::Boolean => "BOOLEAN",
            ParamType::Long => "LONG",
        }
    }

    /// Case-insensitive lookup of a tag name.
    pub fn from_name(name: &str) -> Option<ParamType> {
        let name = name.trim();
        Self::ALL
            .into_iter()
            .find(|candidate| candidate.as_str().eq_ignore_ascii_case(name))
    }
}

impl fmt::Display for ParamType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ParamValue {
    String(String),
    Integer(i32),
    Float(f32),
    Boolean(bool),
    Long(i64),
}

impl ParamValue {
    pub fn zero(param_type: ParamType) -> Self {
        match param_type {
            ParamType::String => ParamValue::String(String::new()),
            ParamType::Integer => ParamValue::Integer(0),
            ParamType::Float => ParamValue::Float(0.0),
            ParamType::Boolean => ParamValue::Boolean(false),
            ParamType::Long => ParamValue::Long(0),
        }
    }

    pub fn param_type(&self) -> ParamType {
        match self {
            ParamValue::String(_) => ParamType::String,
            ParamValue::Integer(_) => ParamType::Integer,
            ParamValue::Float(_) => ParamType::Float,
            ParamValue::Boolean(_) => ParamType::Boolean,
            ParamValue::Long(_) => ParamType::Long,
        }
    }

    /// Parses user or file text as a value of `param_type`.
    pub fn parse(param_type: ParamType, text: &str) -> Result<Self, String> {
        let trimmed = text.trim();
        let invalid = |err: &dyn fmt::Display| format!("{trimmed:?} is not a valid {param_type}: {err}");
        match param_type {
            ParamType::String => Ok(ParamValue::String(text.to_string())),
            ParamType::Integer => trimmed
                .parse::<i32>()
                .map(ParamValue::Integer)
                .map_err(|err| invalid(&err)),
            ParamType::Long => trimmed
                .parse::<i64>()
                .map(ParamValue::Long)
                .map_err(|err| invalid(&err)),
            ParamType::Float => trimmed
                .parse::<f32>()
                .map(ParamValue::Float)
                .map_err(|err| invalid(&err)),
            ParamType::Boolean => match trimmed.to_ascii_lowercase().as_str() {
                "true" => Ok(ParamValue::Boolean(true)),
                "false" => Ok(ParamValue::Boolean(false)),
                _ => Err(invalid(&"expected true or false")),
            },
        }
    }

    /// Plain text form; floats never use exponent notation.
    pub fn to_text(&self) -> String {
        match self {
            ParamValue::String(value) => value.clone(),
            ParamValue::Integer(value) => value.to_string(),
            ParamValue::Long(value) => value.to_string(),
            ParamValue::Boolean(value) => value.to_string(),
            ParamValue::Float(value) => format_float(*value),
        }
    }
}

fn format_float(value: f32) -> String {
    let text = value.to_string();
    if value.is_finite() && !text.contains('.') {
        format!("{text}.0")
    } else {
        text
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ParamItem {
    pub id: u32,
    pub key: String,
    pub value: ParamValue,
}

impl ParamItem {
    pub fn param_type(&self) -> ParamType {
        self.value.param_type()
    }
}

/// Intent + target package + ordered parameters. Item ids are unique within one scheme.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Scheme {
    pub intent: String,
    pub package: String,
    items: Vec<ParamItem>,
    next_id: u32,
}

impl Scheme {
    pub fn new(intent: impl Into<String>, package: impl Into<String>) -> Self {
        Self {
            intent: intent.into(),
            package: package.into(),
            ..Self::default()
        }
    }

    /// Builds a scheme from loaded parts; ids follow the given order starting at zero.
    pub fn from_parts(
        intent: impl Into<String>,
        package: impl Into<String>,
        params: Vec<(String, ParamValue)>,
    ) -> Self {
        let mut scheme = Self::new(intent, package);
        for (key, value) in params {
            scheme.push_item(key, value);
        }
        scheme
    }

    pub fn items(&self) -> &[ParamItem] {
        &self.items
    }

    pub fn item(&self, id: u32) -> Option<&ParamItem> {
        self.items.iter().find(|item| item.id == id)
    }

    fn item_mut(&mut self, id: u32) -> Option<&mut ParamItem> {
        self.items.iter_mut().find(|item| item.id == id)
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn next_id(&self) -> u32 {
        self.next_id
    }

    /// Appends an empty STRING parameter and returns its id.
    pub fn add_item(&mut self) -> u32 {
        self.push_item(String::new(), ParamValue::zero(ParamType::String))
    }

    pub fn push_item(&mut self, key: impl Into<String>, value: ParamValue) -> u32 {
        let id = self.next_id;
        self.next_id += 1;
        self.items.push(ParamItem {
            id,
            key: key.into(),
            value,
        });
        id
    }

    pub fn update_key(&mut self, id: u32, key: impl Into<String>) -> bool {
        match self.item_mut(id) {
            Some(item) => {
                item.key = key.into();
                true
            }
            None => false,
        }
    }

    /// Replaces the value; refuses a value of a different type than the item's.
    pub fn update_value(&mut self, id: u32, value: ParamValue) -> bool {
        match self.item_mut(id) {
            Some(item) if item.param_type() == value.param_type() => {
                item.value = value;
                true
            }
            _ => false,
        }
    }

    /// Switches the item's type, resetting its value to the new type's zero value.
    pub fn update_type(&mut self, id: u32, param_type: ParamType) -> bool {
        match self.item_mut(id) {
            Some(item) => {
                if item.param_type() != param_type {
                    item.value = ParamValue::zero(param_type);
                }
                true
            }
            None => false,
        }
    }

    pub fn remove_item(&mut self, id: u32) -> bool {
        let before = self.items.len();
        self.items.retain(|item| item.id != id);
        self.items.len() != before
    }

    /// Empties intent, package and parameters. Ids keep counting up.
    pub fn clear(&mut self) {
        self.intent.clear();
        self.package.clear();
        self.items.clear();
    }

    /// (key, type, value) triples in order, for comparing content regardless of ids.
    pub fn triples(&self) -> Vec<(String, ParamType, String)> {
        self.items
            .iter()
            .map(|item| (item.key.clone(), item.param_type(), item.value.to_text()))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ids_are_monotonic_and_unique() {
        let mut scheme = Scheme::new("com.intent.UPDATE", "com.app/.Receiver");
        let first = scheme.add_item();
        let second = scheme.add_item();
        assert!(scheme.remove_item(first));
        let third = scheme.add_item();
        assert_eq!((first, second, third), (0, 1, 2));
        assert_eq!(scheme.len(), 2);

        scheme.clear();
        assert!(scheme.is_empty());
        assert!(scheme.intent.is_empty());
        assert_eq!(scheme.add_item(), 3);
    }

    #[test]
    fn type_change_resets_value() {
        let mut scheme = Scheme::default();
        let id = scheme.push_item("count", ParamValue::String("12".to_string()));
        assert!(scheme.update_type(id, ParamType::Integer));
        assert_eq!(scheme.item(id).map(|item| &item.value), Some(&ParamValue::Integer(0)));

        assert!(scheme.update_value(id, ParamValue::Integer(5)));
        assert!(scheme.update_type(id, ParamType::Integer));
        assert_eq!(scheme.item(id).map(|item| &item.value), Some(&ParamValue::Integer(5)));

        assert!(scheme.update_type(id, ParamType::Boolean));
        assert_eq!(
            scheme.item(id).map(|item| &item.value),
            Some(&ParamValue::Boolean(false))
        );
    }

    #[test]
    fn value_updates_keep_the_type() {
        let mut scheme = Scheme::default();
        let id = scheme.push_item("flag", ParamValue::Boolean(false));
        assert!(!scheme.update_value(id, ParamValue::String("true".to_string())));
        assert!(scheme.update_value(id, ParamValue::Boolean(true)));
        assert!(!scheme.update_value(99, ParamValue::Boolean(true)));
        assert!(!scheme.update_key(99, "nope"));
        assert!(!scheme.remove_item(99));
    }

    #[test]
    fn parses_values_by_type() {
        assert_eq!(
            ParamValue::parse(ParamType::Integer, " 100 "),
            Ok(ParamValue::Integer(100))
        );
        assert_eq!(
            ParamValue::parse(ParamType::Long, "9000000000"),
            Ok(ParamValue::Long(9_000_000_000))
        );
        assert_eq!(
            ParamValue::parse(ParamType::Boolean, "TRUE"),
            Ok(ParamValue::Boolean(true))
        );
        assert_eq!(
            ParamValue::parse(ParamType::String, " keep spaces "),
            Ok(ParamValue::String(" keep spaces ".to_string()))
        );
        assert!(ParamValue::parse(ParamType::Integer, "abc").is_err());
        assert!(ParamValue::parse(ParamType::Boolean, "yes").is_err());
        assert!(ParamValue::parse(ParamType::Integer, "9000000000").is_err());
    }

    #[test]
    fn floats_render_without_exponent() {
        assert_eq!(ParamValue::Float(100.1).to_text(), "100.1");
        assert_eq!(ParamValue::Float(100.0).to_text(), "100.0");
        assert_eq!(ParamValue::Float(0.001).to_text(), "0.001");
        assert_eq!(ParamValue::Float(-2.5).to_text(), "-2.5");
        assert_eq!(ParamValue::Float(1.0e10).to_text(), "10000000000.0");
    }

    #[test]
    fn type_names_are_case_insensitive() {
        assert_eq!(ParamType::from_name("integer"), Some(ParamType::Integer));
        assert_eq!(ParamType::from_name(" Long "), Some(ParamType::Long));
        assert_eq!(ParamType::from_name("URI"), None);
        assert_eq!(ParamType::Float.to_string(), "FLOAT");
    }
}
