use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;
use tracing::{debug, warn};

use super::directive::AgentAction;
use crate::types::{Params, value_to_text};

static ACTION_BLOCK: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)```(?:yaml|yml)(.*?)```").expect("valid action block pattern"));

/// Extracts the action from the first fenced YAML block in `content`.
///
/// `None` means "treat the text as a final answer": either there is no block,
/// or the first block is not a mapping with `thoughts`, `name` and `params`.
pub fn parse_action(content: &str) -> Option<AgentAction> {
    let block = ACTION_BLOCK.captures(content)?.get(1)?;
    let action = parse_block(block.as_str());
    if action.is_none() {
        warn!("Action block found, but it doesn't match the expected format");
    }
    action
}

/// Extracts every well-formed action block, in order of appearance.
pub fn parse_all(content: &str) -> Vec<AgentAction> {
    ACTION_BLOCK
        .captures_iter(content)
        .filter_map(|captures| captures.get(1))
        .filter_map(|block| parse_block(block.as_str()))
        .collect()
}

fn parse_block(block: &str) -> Option<AgentAction> {
    let document: serde_yaml::Value = serde_yaml::from_str(block.trim()).ok()?;
    let mapping = document.as_mapping()?;

    let thoughts = mapping.get("thoughts")?;
    let name = mapping.get("name")?.as_str()?.trim();
    let params = mapping.get("params")?;
    if name.is_empty() {
        return None;
    }

    let thoughts = yaml_to_json(thoughts);
    let action = AgentAction {
        thoughts: value_to_text(&thoughts),
        name: name.to_string(),
        params: normalize_params(yaml_to_json(params)),
    };
    debug!(name = %action.name, "Parsed action block");
    Some(action)
}

/// Coerces any `params` value into a mapping.
pub fn normalize_params(value: Value) -> Params {
    match value {
        Value::Object(map) => map,
        Value::Null => Params::new(),
        Value::String(text) => parse_params_text(&text),
        other => single_entry("value", other),
    }
}

fn parse_params_text(text: &str) -> Params {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return Params::new();
    }
    if let Ok(value) = serde_json::from_str::<Value>(trimmed) {
        return match value {
            Value::Object(map) => map,
            other => single_entry("value", other),
        };
    }
    match serde_yaml::from_str::<serde_yaml::Value>(trimmed) {
        Ok(value) => match yaml_to_json(&value) {
            Value::Object(map) => map,
            Value::Null => Params::new(),
            other => single_entry("value", other),
        },
        Err(_) => single_entry("raw_input", Value::String(trimmed.to_string())),
    }
}

fn yaml_to_json(value: &serde_yaml::Value) -> Value {
    serde_json::to_value(value).unwrap_or_else(|_| {
        Value::String(serde_yaml::to_string(value).unwrap_or_default().trim().to_string())
    })
}

fn single_entry(key: &str, value: Value) -> Params {
    let mut params = Params::new();
    params.insert(key.to_string(), value);
    params
}
