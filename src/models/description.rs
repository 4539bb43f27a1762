use serde::Serialize;
use serde_json::{Map, Value, ser::PrettyFormatter};
use tracing::warn;

const SEPARATOR: &str = ": ";
const CUSTOMER_MARKER: &str = "Customer: ";

/// N-central's `details` text, split into its "Key: Value" lines.
///
/// The text is free-form, so parsing is best effort: when no line carries a
/// key/value pair the original text is kept as is and callers decide what to
/// do without structured fields.
#[derive(Debug, Clone, PartialEq)]
pub enum ParsedDescription {
    /// Key/value pairs in the order they first appeared
    Structured(Map<String, Value>),
    /// The input, untouched
    Unparsed(String),
}

impl ParsedDescription {
    pub fn parse(text: &str) -> Self {
        let mut fields = Map::new();

        for line in text.split('\n') {
            let Some((key, value)) = line.split_once(SEPARATOR) else {
                continue;
            };
            let (mut key, mut value) = (key.trim(), value.trim());

            // N-central puts the customer behind the description label,
            // e.g. "Description: Customer: Acme Corp".
            if key == "Description" {
                if let Some((_, customer)) = value.split_once(CUSTOMER_MARKER) {
                    value = customer;
                }
                key = "Customer";
            }

            fields.insert(key.to_string(), Value::String(value.to_string()));
        }

        if fields.is_empty() {
            warn!("no key/value pairs in ticket details, keeping raw text");
            return Self::Unparsed(text.to_string());
        }
        Self::Structured(fields)
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        match self {
            Self::Structured(fields) => fields.get(key).and_then(Value::as_str),
            Self::Unparsed(_) => None,
        }
    }

    pub fn customer(&self) -> Option<&str> {
        self.get("Customer")
    }

    /// Pairs in order, empty for unparsed text.
    #[cfg(test)]
    fn pairs(&self) -> Vec<(&str, &str)> {
        match self {
            Self::Structured(fields) => fields
                .iter()
                .filter_map(|(k, v)| v.as_str().map(|v| (k.as_str(), v)))
                .collect(),
            Self::Unparsed(_) => Vec::new(),
        }
    }

    /// JSON object with 4-space indentation, or the raw text when unparsed.
    pub fn to_json(&self) -> serde_json::Result<String> {
        match self {
            Self::Structured(fields) => {
                let mut buf = Vec::new();
                let mut ser =
                    serde_json::Serializer::with_formatter(&mut buf, PrettyFormatter::with_indent(b"    "));
                fields.serialize(&mut ser)?;
                Ok(String::from_utf8_lossy(&buf).into_owned())
            }
            Self::Unparsed(text) => Ok(text.clone()),
        }
    }
}
