use serde_json::{Map, Value};

/// Result of looking for a JSON object inside free-form model output.
#[derive(Debug, Clone, PartialEq)]
pub enum JsonRecovery {
    Recovered(Map<String, Value>),
    Absent,
}

impl JsonRecovery {
    pub fn into_option(self) -> Option<Map<String, Value>> {
        match self {
            JsonRecovery::Recovered(object) => Some(object),
            JsonRecovery::Absent => None,
        }
    }
}

/// Parses the span from the first `{` to the last `}` as a JSON object.
///
/// No repair is attempted: text with stray braces around or inside the
/// object simply yields `Absent`.
pub fn recover_json(response_text: &str) -> JsonRecovery {
    let (Some(start), Some(end)) = (response_text.find('{'), response_text.rfind('}')) else {
        return JsonRecovery::Absent;
    };
    if end <= start {
        return JsonRecovery::Absent;
    }

    match serde_json::from_str::<Value>(&response_text[start..=end]) {
        Ok(Value::Object(object)) => JsonRecovery::Recovered(object),
        _ => JsonRecovery::Absent,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_recovers_object_from_surrounding_text() {
        let text = "Note: here it is\n{\"a\":1,\"b\":2}\nthanks";
        let recovered = recover_json(text).into_option().unwrap();
        assert_eq!(Value::Object(recovered), json!({ "a": 1, "b": 2 }));
    }

    #[test]
    fn test_recovers_from_markdown_fence() {
        let text = "```json\n{\"company_name\": \"Rossi S.p.A.\", \"fiscal_year\": \"2023\"}\n```";
        let recovered = recover_json(text).into_option().unwrap();
        assert_eq!(recovered["fiscal_year"], "2023");
    }

    #[test]
    fn test_missing_braces_is_absent() {
        assert_eq!(recover_json(""), JsonRecovery::Absent);
        assert_eq!(recover_json("no json at all"), JsonRecovery::Absent);
        assert_eq!(recover_json("only open {"), JsonRecovery::Absent);
        assert_eq!(recover_json("only close }"), JsonRecovery::Absent);
        assert_eq!(recover_json("} reversed {"), JsonRecovery::Absent);
    }

    #[test]
    fn test_invalid_json_is_absent() {
        assert_eq!(recover_json("{not: valid}"), JsonRecovery::Absent);
        // Two objects: the span between them is not one object.
        assert_eq!(recover_json("{\"a\":1} and {\"b\":2}"), JsonRecovery::Absent);
    }

    #[test]
    fn test_nested_objects_are_kept() {
        let text = "Ecco: {\"EBITDA\": {\"value\": 12.5, \"unit\": \"milioni\"}} fine";
        let recovered = recover_json(text).into_option().unwrap();
        assert_eq!(recovered["EBITDA"]["value"], 12.5);
    }

    #[test]
    fn test_recovery_is_idempotent() {
        let texts = [
            "Note: here it is\n{\"a\":1,\"b\":2}\nthanks",
            "{\"EBIT\": {\"value\": -3.2, \"unit\": \"milioni\"}, \"x\": [1, {\"y\": null}]}",
        ];
        for text in texts {
            let first = recover_json(text).into_option().unwrap();
            let reserialized = serde_json::to_string(&first).unwrap();
            let second = recover_json(&reserialized).into_option().unwrap();
            assert_eq!(first, second);
        }
    }
}
