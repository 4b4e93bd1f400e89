use std::sync::Arc;

use chrono::{FixedOffset, Utc};
use serde_json::{Value, json};

use super::error::ToolInvokeError;
use super::interface::{FnTool, Tool, ToolParameter, ToolSpec};
use crate::types::Params;

pub const CURRENT_TIME: &str = "current_time";
pub const BUILTIN_TOOLS: &[&str] = &[CURRENT_TIME];

/// Looks up a catalog tool by its (case-insensitive) name.
pub fn builtin_tool(name: &str) -> Option<Arc<dyn Tool>> {
    match name.to_lowercase().as_str() {
        CURRENT_TIME => Some(Arc::new(current_time_tool())),
        _ => None,
    }
}

pub fn current_time_tool() -> FnTool {
    let spec = ToolSpec::new(
        CURRENT_TIME,
        "Get the current date and time for a UTC offset such as '+05:30'",
    )
    .with_parameter(ToolParameter::optional(
        "utc_offset",
        "Offset from UTC written as +HH:MM or -HH:MM",
        "+00:00",
    ));
    FnTool::blocking(spec, current_time)
}

fn current_time(params: Params) -> Result<Value, ToolInvokeError> {
    let raw = params
        .get("utc_offset")
        .and_then(Value::as_str)
        .unwrap_or("+00:00");
    let offset = parse_offset(raw)
        .ok_or_else(|| ToolInvokeError::Failed(format!("Invalid UTC offset '{raw}'")))?;
    let now = Utc::now().with_timezone(&offset);
    Ok(json!({
        "utc_offset": raw,
        "current_time": now.format("%Y-%m-%d %H:%M:%S %:z").to_string(),
    }))
}

fn parse_offset(raw: &str) -> Option<FixedOffset> {
    let raw = raw.trim();
    if raw.eq_ignore_ascii_case("z") || raw.eq_ignore_ascii_case("utc") {
        return FixedOffset::east_opt(0);
    }
    let (sign, rest) = match raw.as_bytes().first()? {
        b'+' => (1, &raw[1..]),
        b'-' => (-1, &raw[1..]),
        _ => (1, raw),
    };
    let (hours, minutes) = match rest.split_once(':') {
        Some((h, m)) => (h, m),
        None if rest.len() == 4 => (rest.get(..2)?, rest.get(2..)?),
        None => (rest, "0"),
    };
    let hours: i32 = hours.parse().ok()?;
    let minutes: i32 = minutes.parse().ok()?;
    if hours > 14 || minutes >= 60 {
        return None;
    }
    FixedOffset::east_opt(sign * (hours * 3600 + minutes * 60))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_common_offset_spellings() {
        assert_eq!(parse_offset("+05:30").map(|o| o.local_minus_utc()), Some(19_800));
        assert_eq!(parse_offset("-0800").map(|o| o.local_minus_utc()), Some(-28_800));
        assert_eq!(parse_offset("UTC").map(|o| o.local_minus_utc()), Some(0));
        assert!(parse_offset("+25:00").is_none());
        assert!(parse_offset("abc").is_none());
        assert!(parse_offset("+a\u{20ac}").is_none());
    }

    #[tokio::test]
    async fn catalog_tool_reports_time_and_rejects_bad_offsets() {
        let tool = builtin_tool("Current_Time").expect("catalog entry");
        let mut params = Params::new();
        params.insert("utc_offset".into(), json!("+05:30"));
        let output = tool.invoke(params).await.expect("runs");
        assert!(output["current_time"].as_str().expect("text").ends_with("+05:30"));

        let mut params = Params::new();
        params.insert("utc_offset".into(), json!("nowhere"));
        assert!(tool.invoke(params).await.is_err());

        let mut params = Params::new();
        params.insert("utc_offset".into(), json!("+a\u{20ac}"));
        let err = tool.invoke(params).await.expect_err("multibyte offset");
        assert!(matches!(err, ToolInvokeError::Failed(ref m) if m.starts_with("Invalid UTC")));
        assert!(builtin_tool("unknown").is_none());
    }
}
