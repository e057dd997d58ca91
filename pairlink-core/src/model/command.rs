use serde_json::{Map, Value};
use std::collections::BTreeMap;

/// One application message on the command channel.
///
/// On the wire a frame is either a bare token (`CAMERA_ON`) or a JSON object
/// carrying at least a `cmd` field plus optional arguments
/// (`{"cmd":"SMS_SYNC","since":1700000000}`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandFrame {
    pub command: String,
    pub args: BTreeMap<String, String>,
}

impl CommandFrame {
    pub fn token(command: impl Into<String>) -> Self {
        Self {
            command: command.into(),
            args: BTreeMap::new(),
        }
    }

    pub fn with_arg(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.args.insert(key.into(), value.into());
        self
    }

    /// Decodes an inbound message. A JSON object with a string `cmd` yields
    /// that command and its remaining fields as arguments; anything else
    /// (including malformed JSON) is treated as a trimmed bare token.
    pub fn parse(raw: &str) -> Self {
        let trimmed = raw.trim();

        if let Ok(Value::Object(mut map)) = serde_json::from_str::<Value>(trimmed)
            && let Some(Value::String(command)) = map.remove("cmd")
        {
            let args = map
                .into_iter()
                .map(|(key, value)| (key, arg_to_string(value)))
                .collect();
            return Self {
                command: command.trim().to_owned(),
                args,
            };
        }

        Self::token(trimmed)
    }

    /// Encodes the frame, using the bare token form when there are no args.
    pub fn to_wire(&self) -> String {
        if self.args.is_empty() {
            return self.command.clone();
        }

        let mut map = Map::new();
        map.insert("cmd".to_owned(), Value::String(self.command.clone()));
        for (key, value) in &self.args {
            map.insert(key.clone(), Value::String(value.clone()));
        }
        Value::Object(map).to_string()
    }

    /// Lower time bound for replay requests, if present.
    pub fn since(&self) -> Option<i64> {
        self.args.get("since").and_then(|s| s.parse().ok())
    }

    pub fn is_empty(&self) -> bool {
        self.command.is_empty()
    }
}

fn arg_to_string(value: Value) -> String {
    match value {
        Value::String(s) => s,
        other => other.to_string(),
    }
}
