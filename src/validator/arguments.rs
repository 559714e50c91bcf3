//! Minimal argument synthesis from declared input schemas
//!
//! Each required property gets a fixed representative value for its declared
//! type. Optional properties are left out.

use serde_json::{json, Map, Value};

use crate::protocol::mcp::PromptArgument;

/// Representative value for a JSON Schema `type`
pub fn representative_value(schema_type: &str) -> Value {
    match schema_type {
        "string" => json!("test_value"),
        "integer" => json!(1),
        "number" => json!(1.0),
        "boolean" => json!(true),
        "array" => json!([]),
        "object" => json!({}),
        "null" => Value::Null,
        _ => json!("test_value"),
    }
}

/// Build an arguments object satisfying the schema's `required` list
pub fn synthesize_arguments(schema: Option<&Value>) -> Value {
    let mut args = Map::new();
    let Some(schema) = schema else {
        return Value::Object(args);
    };

    let properties = schema.get("properties").and_then(Value::as_object);
    let required = schema
        .get("required")
        .and_then(Value::as_array)
        .map(|r| r.iter().filter_map(Value::as_str).collect::<Vec<_>>())
        .unwrap_or_default();

    for name in required {
        let prop = properties.and_then(|p| p.get(name));
        args.insert(name.to_string(), value_for_property(prop));
    }

    Value::Object(args)
}

fn value_for_property(prop: Option<&Value>) -> Value {
    let Some(prop) = prop else {
        return representative_value("string");
    };

    // An enum constrains the value more tightly than the type
    if let Some(first) = prop
        .get("enum")
        .and_then(Value::as_array)
        .and_then(|e| e.first())
    {
        return first.clone();
    }

    match prop.get("type") {
        Some(Value::String(t)) => representative_value(t),
        // ["string", "null"] style unions: first non-null member
        Some(Value::Array(types)) => types
            .iter()
            .filter_map(Value::as_str)
            .find(|t| *t != "null")
            .map(representative_value)
            .unwrap_or(Value::Null),
        _ => representative_value("string"),
    }
}

/// Prompt arguments are always strings; fill every required one
pub fn synthesize_prompt_arguments(arguments: Option<&[PromptArgument]>) -> Value {
    let args: Map<String, Value> = arguments
        .unwrap_or_default()
        .iter()
        .filter(|a| a.required.unwrap_or(false))
        .map(|a| (a.name.clone(), representative_value("string")))
        .collect();
    Value::Object(args)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn maps_every_declared_type() {
        let schema = json!({
            "type": "object",
            "properties": {
                "s": {"type": "string"},
                "i": {"type": "integer"},
                "n": {"type": "number"},
                "b": {"type": "boolean"},
                "a": {"type": "array"},
                "o": {"type": "object"},
                "opt": {"type": "string"}
            },
            "required": ["s", "i", "n", "b", "a", "o"]
        });
        let args = synthesize_arguments(Some(&schema));
        assert_eq!(
            args,
            json!({"s": "test_value", "i": 1, "n": 1.0, "b": true, "a": [], "o": {}})
        );
    }

    #[test]
    fn no_schema_gives_empty_object() {
        assert_eq!(synthesize_arguments(None), json!({}));
        assert_eq!(synthesize_arguments(Some(&json!({"type": "object"}))), json!({}));
    }

    #[test]
    fn enum_and_union_types() {
        let schema = json!({
            "properties": {
                "mode": {"type": "string", "enum": ["fast", "slow"]},
                "limit": {"type": ["null", "integer"]}
            },
            "required": ["mode", "limit"]
        });
        let args = synthesize_arguments(Some(&schema));
        assert_eq!(args["mode"], "fast");
        assert_eq!(args["limit"], 1);
    }

    #[test]
    fn required_without_property_is_string() {
        let schema = json!({"required": ["x"]});
        assert_eq!(synthesize_arguments(Some(&schema)), json!({"x": "test_value"}));
    }

    #[test]
    fn prompt_arguments_only_required() {
        let args = vec![
            PromptArgument {
                name: "who".into(),
                description: None,
                required: Some(true),
            },
            PromptArgument {
                name: "tone".into(),
                description: None,
                required: None,
            },
        ];
        assert_eq!(
            synthesize_prompt_arguments(Some(&args)),
            json!({"who": "test_value"})
        );
    }
}
