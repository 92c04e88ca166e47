use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::env;

/// Parameters of an auth-login block, as supplied by the host.
///
/// Values are strings, booleans or nested mappings.
pub type Params = Map<String, Value>;

/// Get a string param, ignoring values of any other type
pub fn get_string<'a>(params: &'a Params, key: &str) -> Option<&'a str> {
    params.get(key).and_then(Value::as_str)
}

/// Get a string param only when it is set and non-empty
pub fn get_non_empty_string<'a>(params: &'a Params, key: &str) -> Option<&'a str> {
    get_string(params, key).filter(|s| !s.is_empty())
}

/// Coerce a nested mapping into string values, dropping entries of any
/// other type
pub fn string_map(value: Option<&Value>) -> BTreeMap<String, String> {
    value
        .and_then(Value::as_object)
        .map(|map| {
            map.iter()
                .filter_map(|(k, v)| v.as_str().map(|s| (k.clone(), s.to_string())))
                .collect()
        })
        .unwrap_or_default()
}

/// First non-empty value among the given environment variables
pub fn env_first(names: &[&str]) -> Option<String> {
    names
        .iter()
        .filter_map(|name| env::var(name).ok())
        .find(|value| !value.is_empty())
}

/// First non-empty environment variable, or `default`
pub fn env_or(names: &[&str], default: &str) -> String {
    env_first(names).unwrap_or_else(|| default.to_string())
}

/// Collapse runs of whitespace to a single space and trim the ends
pub fn normalize_whitespace(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Whether a value is the zero value of its type.
///
/// A declarative host reports zero values as "unset".
pub fn is_zero(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::Bool(b) => !b,
        Value::Number(n) => n.as_f64() == Some(0.0),
        Value::String(s) => s.is_empty(),
        Value::Array(a) => a.is_empty(),
        Value::Object(o) => o.is_empty(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use serial_test::serial;

    fn params(value: Value) -> Params {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn test_get_string_ignores_other_types() {
        let p = params(json!({"name": "consul", "flag": true, "empty": ""}));

        assert_eq!(get_string(&p, "name"), Some("consul"));
        assert_eq!(get_string(&p, "flag"), None);
        assert_eq!(get_string(&p, "missing"), None);
        assert_eq!(get_string(&p, "empty"), Some(""));
        assert_eq!(get_non_empty_string(&p, "empty"), None);
    }

    #[test]
    fn test_string_map_drops_non_strings() {
        let meta = json!({"team": "platform", "count": 3, "enabled": true});
        let map = string_map(Some(&meta));

        assert_eq!(map.len(), 1);
        assert_eq!(map.get("team").map(String::as_str), Some("platform"));
        assert!(string_map(None).is_empty());
        assert!(string_map(Some(&json!("not-a-map"))).is_empty());
    }

    #[test]
    #[serial]
    fn test_env_first_skips_empty() {
        env::set_var("CONSUL_YAML_TEST_A", "");
        env::set_var("CONSUL_YAML_TEST_B", "second");
        env::remove_var("CONSUL_YAML_TEST_C");

        assert_eq!(
            env_first(&["CONSUL_YAML_TEST_C", "CONSUL_YAML_TEST_A", "CONSUL_YAML_TEST_B"]),
            Some("second".to_string())
        );
        assert_eq!(env_or(&["CONSUL_YAML_TEST_C"], "fallback"), "fallback");

        env::remove_var("CONSUL_YAML_TEST_A");
        env::remove_var("CONSUL_YAML_TEST_B");
    }

    #[test]
    fn test_normalize_whitespace() {
        assert_eq!(
            normalize_whitespace("  Login to\n   Consul\tusing AWS  "),
            "Login to Consul using AWS"
        );
    }

    #[test]
    fn test_is_zero() {
        assert!(is_zero(&json!(null)));
        assert!(is_zero(&json!("")));
        assert!(is_zero(&json!(false)));
        assert!(is_zero(&json!([])));
        assert!(!is_zero(&json!("x")));
        assert!(!is_zero(&json!([{}])));
    }
}
