use std::collections::BTreeMap;

use execd_core::{CommandStep, Commands, Error, ExecutionRequest, FilePayload, StdinValue};
use execd_security::validator::validate_env_var_name;
use serde_json::Value;

/// Parses a raw JSON body into a typed [`ExecutionRequest`], surfacing the
/// field-precise error taxonomy from the error table rather than a single
/// generic deserialization failure.
pub fn validate_execution_request(value: &Value) -> Result<ExecutionRequest, Error> {
    let obj = value
        .as_object()
        .ok_or_else(|| Error::invalid_type("$", "request body must be a JSON object"))?;

    let command_value = obj
        .get("command")
        .ok_or_else(|| Error::missing_required_field("command"))?;
    let command = parse_command(command_value)?;

    let env = parse_env(obj.get("env"))?;
    let files = parse_files(obj.get("files"))?;
    let stdin = parse_stdin(obj.get("stdin"))?;
    let timeout = parse_timeout(obj.get("timeout"))?;
    let track = parse_track(obj.get("track"))?;
    let continue_on_error = parse_bool(obj.get("continue_on_error"), "continue_on_error")?;
    let force = parse_bool(obj.get("force"), "force")?;
    let environment = parse_optional_string(obj.get("environment"), "environment")?;

    Ok(ExecutionRequest {
        command,
        env,
        files,
        stdin,
        timeout,
        track,
        continue_on_error: continue_on_error.unwrap_or(false),
        force: force.unwrap_or(false),
        environment,
    })
}

fn parse_command(value: &Value) -> Result<Commands, Error> {
    match value {
        Value::String(s) => {
            if s.is_empty() {
                return Err(Error::invalid_command("command must not be empty"));
            }
            Ok(Commands::Single(s.clone()))
        }
        Value::Array(items) => {
            let mut steps = Vec::with_capacity(items.len());
            for item in items {
                steps.push(parse_step(item)?);
            }
            Ok(Commands::Chain(steps))
        }
        _ => Err(Error::invalid_type(
            "command",
            "command must be a string or an array of steps",
        )),
    }
}

fn parse_step(value: &Value) -> Result<CommandStep, Error> {
    let obj = value
        .as_object()
        .ok_or_else(|| Error::invalid_type("command[]", "each chain step must be an object"))?;
    let cmd = obj
        .get("cmd")
        .and_then(Value::as_str)
        .ok_or_else(|| Error::invalid_command("each chain step requires a non-empty 'cmd'"))?;
    if cmd.is_empty() {
        return Err(Error::invalid_command("chain step 'cmd' must not be empty"));
    }

    let timeout = match obj.get("timeout") {
        None | Some(Value::Null) => None,
        Some(v) => Some(parse_positive_timeout(v)?),
    };

    let required = match obj.get("required") {
        None | Some(Value::Null) => false,
        Some(Value::Bool(b)) => *b,
        Some(_) => {
            return Err(Error::invalid_type(
                "command[].required",
                "must be a boolean",
            ))
        }
    };

    Ok(CommandStep {
        cmd: cmd.to_string(),
        timeout,
        required,
    })
}

fn parse_env(value: Option<&Value>) -> Result<BTreeMap<String, String>, Error> {
    let Some(value) = value else {
        return Ok(BTreeMap::new());
    };
    let obj = value
        .as_object()
        .ok_or_else(|| Error::invalid_type("env", "env must be an object"))?;

    let mut env = BTreeMap::new();
    for (key, v) in obj {
        validate_env_var_name(key)?;
        let value = v
            .as_str()
            .ok_or_else(|| Error::invalid_type("env", format!("value for '{key}' must be a string")))?;
        env.insert(key.clone(), value.to_string());
    }
    Ok(env)
}

fn parse_files(value: Option<&Value>) -> Result<BTreeMap<String, FilePayload>, Error> {
    let Some(value) = value else {
        return Ok(BTreeMap::new());
    };
    let obj = value
        .as_object()
        .ok_or_else(|| Error::invalid_type("files", "files must be an object"))?;

    let mut files = BTreeMap::new();
    for (path, v) in obj {
        files.insert(path.clone(), FilePayload(v.clone()));
    }
    Ok(files)
}

fn parse_stdin(value: Option<&Value>) -> Result<Option<StdinValue>, Error> {
    let Some(value) = value else {
        return Ok(None);
    };
    match value {
        Value::Null => Ok(None),
        Value::String(s) => Ok(Some(StdinValue::Single(s.clone()))),
        Value::Array(items) => {
            let mut lines = Vec::with_capacity(items.len());
            for item in items {
                let s = item
                    .as_str()
                    .ok_or_else(|| Error::invalid_type("stdin", "stdin list entries must be strings"))?;
                lines.push(s.to_string());
            }
            Ok(Some(StdinValue::Lines(lines)))
        }
        _ => Err(Error::invalid_type(
            "stdin",
            "stdin must be a string or an array of strings",
        )),
    }
}

fn parse_timeout(value: Option<&Value>) -> Result<Option<f64>, Error> {
    match value {
        None | Some(Value::Null) => Ok(None),
        Some(v) => Ok(Some(parse_positive_timeout(v)?)),
    }
}

fn parse_positive_timeout(value: &Value) -> Result<f64, Error> {
    let n = value
        .as_f64()
        .ok_or_else(|| Error::invalid_timeout("timeout must be a positive number"))?;
    if n <= 0.0 || !n.is_finite() {
        return Err(Error::invalid_timeout("timeout must be a positive number"));
    }
    Ok(n)
}

fn parse_track(value: Option<&Value>) -> Result<Option<Vec<String>>, Error> {
    let Some(value) = value else {
        return Ok(None);
    };
    if value.is_null() {
        return Ok(None);
    }
    let items = value
        .as_array()
        .ok_or_else(|| Error::invalid_type("track", "track must be an array of glob patterns"))?;
    let mut patterns = Vec::with_capacity(items.len());
    for item in items {
        let s = item
            .as_str()
            .ok_or_else(|| Error::invalid_type("track", "track entries must be strings"))?;
        patterns.push(s.to_string());
    }
    Ok(Some(patterns))
}

fn parse_bool(value: Option<&Value>, field: &str) -> Result<Option<bool>, Error> {
    match value {
        None | Some(Value::Null) => Ok(None),
        Some(Value::Bool(b)) => Ok(Some(*b)),
        Some(_) => Err(Error::invalid_type(field, format!("{field} must be a boolean"))),
    }
}

fn parse_optional_string(value: Option<&Value>, field: &str) -> Result<Option<String>, Error> {
    match value {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(s)) => Ok(Some(s.clone())),
        Some(_) => Err(Error::invalid_type(field, format!("{field} must be a string"))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn missing_command_is_missing_required_field() {
        let err = validate_execution_request(&json!({})).unwrap_err();
        assert!(matches!(err, Error::MissingRequiredField { .. }));
    }

    #[test]
    fn empty_command_string_is_invalid_command() {
        let err = validate_execution_request(&json!({"command": ""})).unwrap_err();
        assert!(matches!(err, Error::InvalidCommand { .. }));
    }

    #[test]
    fn non_positive_timeout_is_invalid_timeout() {
        let err =
            validate_execution_request(&json!({"command": "echo hi", "timeout": 0})).unwrap_err();
        assert!(matches!(err, Error::InvalidTimeout { .. }));
    }

    #[test]
    fn wrong_env_type_is_invalid_type() {
        let err =
            validate_execution_request(&json!({"command": "echo hi", "env": "nope"})).unwrap_err();
        assert!(matches!(err, Error::InvalidType { .. }));
    }

    #[test]
    fn accepts_minimal_request() {
        let request = validate_execution_request(&json!({"command": "echo hi"})).unwrap();
        assert!(matches!(request.command, Commands::Single(ref s) if s == "echo hi"));
    }

    #[test]
    fn accepts_chain_with_required_step() {
        let request = validate_execution_request(&json!({
            "command": [{"cmd": "exit 1"}, {"cmd": "echo ran", "required": true}]
        }))
        .unwrap();
        match request.command {
            Commands::Chain(steps) => {
                assert_eq!(steps.len(), 2);
                assert!(steps[1].required);
            }
            _ => panic!("expected chain"),
        }
    }
}
