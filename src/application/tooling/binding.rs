use super::interface::ToolSpec;
use crate::types::Params;

/// Matches a parameter mapping against a tool's declared schema.
///
/// Defaults fill absent optional parameters; unknown names and absent
/// required parameters are rejected with a human-readable reason.
pub fn bind_params(spec: &ToolSpec, mut params: Params) -> Result<Params, String> {
    let unknown: Vec<&str> = params
        .keys()
        .filter(|key| !spec.parameters.iter().any(|p| &p.name == *key))
        .map(String::as_str)
        .collect();
    if !unknown.is_empty() {
        return Err(format!("unexpected parameter(s): {}", unknown.join(", ")));
    }

    let mut missing = Vec::new();
    for parameter in &spec.parameters {
        if params.contains_key(&parameter.name) {
            continue;
        }
        match &parameter.default {
            Some(default) => {
                params.insert(parameter.name.clone(), default.clone());
            }
            None => missing.push(parameter.name.as_str()),
        }
    }
    if !missing.is_empty() {
        return Err(format!("missing required parameter(s): {}", missing.join(", ")));
    }

    Ok(params)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::tooling::ToolParameter;
    use serde_json::json;

    fn weather_spec() -> ToolSpec {
        ToolSpec::new("WeatherTool", "Current weather")
            .with_parameter(ToolParameter::required("city", "City name"))
            .with_parameter(ToolParameter::optional("unit", "Unit", "celsius"))
    }

    #[test]
    fn fills_defaults_for_absent_optional_params() {
        let mut params = Params::new();
        params.insert("city".into(), json!("Delhi"));
        let bound = bind_params(&weather_spec(), params).expect("binds");
        assert_eq!(bound.get("unit"), Some(&json!("celsius")));
        assert_eq!(bound.get("city"), Some(&json!("Delhi")));
    }

    #[test]
    fn rejects_missing_required() {
        let err = bind_params(&weather_spec(), Params::new()).expect_err("missing city");
        assert!(err.contains("city"));
    }

    #[test]
    fn rejects_unknown_names() {
        let mut params = Params::new();
        params.insert("city".into(), json!("Delhi"));
        params.insert("raw_input".into(), json!("??"));
        let err = bind_params(&weather_spec(), params).expect_err("unknown param");
        assert!(err.contains("raw_input"));
    }
}
