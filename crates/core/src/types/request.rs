use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// The top-level request body accepted by `POST /v1/execute`.
///
/// `command` is the only field whose shape is genuinely polymorphic at the
/// wire boundary (a bare string or an array of steps) — everything else has
/// one JSON type. Parsing that polymorphism into [`Commands`] happens once,
/// at the edge, in `execd-server`'s validation layer; every other component
/// only ever sees the typed form.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionRequest {
    pub command: Commands,
    #[serde(default)]
    pub env: BTreeMap<String, String>,
    #[serde(default)]
    pub files: BTreeMap<String, FilePayload>,
    #[serde(default)]
    pub stdin: Option<StdinValue>,
    #[serde(default)]
    pub timeout: Option<f64>,
    #[serde(default)]
    pub track: Option<Vec<String>>,
    #[serde(default)]
    pub continue_on_error: bool,
    #[serde(default)]
    pub force: bool,
    #[serde(default)]
    pub environment: Option<String>,
}

/// `stdin` may be supplied as a single string or a list of lines; the list
/// form is joined with `\n` and a trailing newline is appended.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum StdinValue {
    Single(String),
    Lines(Vec<String>),
}

impl StdinValue {
    pub fn into_string(self) -> String {
        match self {
            StdinValue::Single(s) => s,
            StdinValue::Lines(lines) => {
                let mut joined = lines.join("\n");
                joined.push('\n');
                joined
            }
        }
    }
}

/// The typed form of the request's polymorphic `command` field.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Commands {
    Single(String),
    Chain(Vec<CommandStep>),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommandStep {
    pub cmd: String,
    #[serde(default)]
    pub timeout: Option<f64>,
    #[serde(default)]
    pub required: bool,
}

/// Raw value for one entry of the request's `files` map: the JSON value to
/// encode through the codec for the path's recognized format.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FilePayload(pub Value);
