use serde_json::{Map, Value};

use crate::error::ExtractionError;

pub const SCORE_MIN: f64 = 0.0;
pub const SCORE_MAX: f64 = 100.0;

/// Reads schema fields out of a parsed payload, coercing types and falling back to
/// defaults one field at a time.
///
/// Every lookup takes a list of accepted keys (`["riskScore", "risk_score"]`); the first
/// key present wins. The reader remembers which fields it saw and which it had to
/// default, so [`FieldReader::finish`] can reject payloads that share nothing with the
/// schema.
#[derive(Debug)]
pub struct FieldReader<'a> {
    schema: &'static str,
    map: &'a Map<String, Value>,
    recognised: usize,
    defaulted: Vec<&'static str>,
}

impl<'a> FieldReader<'a> {
    pub fn new(schema: &'static str, map: &'a Map<String, Value>) -> Self {
        Self {
            schema,
            map,
            recognised: 0,
            defaulted: Vec::new(),
        }
    }

    fn lookup(&mut self, keys: &[&'static str]) -> Option<&'a Value> {
        let map = self.map;
        let found = keys
            .iter()
            .find_map(|key| map.get(*key))
            .filter(|value| !value.is_null());
        if found.is_some() {
            self.recognised += 1;
        }
        found
    }

    fn mark_defaulted(&mut self, keys: &[&'static str]) {
        if let Some(key) = keys.first() {
            self.defaulted.push(*key);
        }
    }

    /// A 0–100 score. Numeric strings (`"87"`, `"87%"`) are accepted; anything else
    /// becomes 0. Out-of-range values are clamped.
    pub fn score(&mut self, keys: &[&'static str]) -> f64 {
        let parsed = self.lookup(keys).and_then(|value| match value {
            Value::Number(number) => number.as_f64(),
            Value::String(text) => text.trim().trim_end_matches('%').trim().parse::<f64>().ok(),
            _ => None,
        });
        match parsed.filter(|value| value.is_finite()) {
            Some(value) => clamp_score(value),
            None => {
                self.mark_defaulted(keys);
                SCORE_MIN
            }
        }
    }

    pub fn text(&mut self, keys: &[&'static str], default: &str) -> String {
        match self.lookup(keys).and_then(|value| value_to_text(value, ", ")) {
            Some(text) => text,
            None => {
                self.mark_defaulted(keys);
                default.to_string()
            }
        }
    }

    /// Like [`FieldReader::text`] but without a placeholder; list values are joined one
    /// per line.
    pub fn optional_text(&mut self, keys: &[&'static str]) -> Option<String> {
        self.lookup(keys).and_then(|value| value_to_text(value, "\n"))
    }

    pub fn list(&mut self, keys: &[&'static str]) -> Vec<String> {
        let items = match self.lookup(keys) {
            Some(Value::Array(items)) => items
                .iter()
                .filter_map(|item| value_to_text(item, ", "))
                .collect(),
            Some(other) => value_to_text(other, ", ").into_iter().collect(),
            None => Vec::new(),
        };
        if items.is_empty() {
            self.mark_defaulted(keys);
        }
        items
    }

    /// Object elements of an array field; non-object elements are dropped.
    pub fn objects(&mut self, keys: &[&'static str]) -> Vec<&'a Map<String, Value>> {
        match self.lookup(keys) {
            Some(Value::Array(items)) => items.iter().filter_map(Value::as_object).collect(),
            Some(Value::Object(single)) => vec![single],
            _ => {
                self.mark_defaulted(keys);
                Vec::new()
            }
        }
    }

    pub fn nested(&mut self, keys: &[&'static str]) -> Option<&'a Map<String, Value>> {
        self.lookup(keys).and_then(Value::as_object)
    }

    /// The payload this reader walks.
    pub fn source(&self) -> &'a Map<String, Value> {
        self.map
    }

    /// Folds a sub-reader's bookkeeping into this one.
    pub fn absorb(&mut self, other: FieldReader<'_>) {
        self.recognised += other.recognised;
        self.defaulted.extend(other.defaulted);
    }

    /// Fields that fell back to their defaults. Fails when the payload carried none of
    /// the schema's fields.
    pub fn finish(self) -> Result<Vec<&'static str>, ExtractionError> {
        if self.recognised == 0 {
            return Err(ExtractionError::SchemaMismatch {
                schema: self.schema,
                reason: format!(
                    "none of the expected fields are present (found: {})",
                    self.map.keys().cloned().collect::<Vec<_>>().join(", ")
                ),
            });
        }
        Ok(self.defaulted)
    }
}

pub fn clamp_score(value: f64) -> f64 {
    value.clamp(SCORE_MIN, SCORE_MAX)
}

fn value_to_text(value: &Value, separator: &str) -> Option<String> {
    let text = match value {
        Value::String(text) => text.trim().to_string(),
        Value::Number(number) => number.to_string(),
        Value::Bool(flag) => flag.to_string(),
        Value::Array(items) => items
            .iter()
            .filter_map(|item| value_to_text(item, separator))
            .collect::<Vec<_>>()
            .join(separator),
        Value::Object(_) => value.to_string(),
        Value::Null => String::new(),
    };
    (!text.is_empty()).then_some(text)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn map(value: Value) -> Map<String, Value> {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn scores_are_clamped() {
        let payload = map(json!({"high": 150, "low": -5, "ok": 42.5}));
        let mut reader = FieldReader::new("test", &payload);
        assert_eq!(reader.score(&["high"]), 100.0);
        assert_eq!(reader.score(&["low"]), 0.0);
        assert_eq!(reader.score(&["ok"]), 42.5);
    }

    #[test]
    fn wrong_typed_score_defaults_to_zero() {
        let payload = map(json!({"riskScore": "high", "confidenceScore": "87%"}));
        let mut reader = FieldReader::new("test", &payload);
        assert_eq!(reader.score(&["riskScore"]), 0.0);
        assert_eq!(reader.score(&["confidenceScore"]), 87.0);
        assert_eq!(reader.finish().unwrap(), vec!["riskScore"]);
    }

    #[test]
    fn aliases_are_accepted() {
        let payload = map(json!({"risk_score": 12}));
        let mut reader = FieldReader::new("test", &payload);
        assert_eq!(reader.score(&["riskScore", "risk_score"]), 12.0);
    }

    #[test]
    fn text_and_list_coercion() {
        let payload = map(json!({
            "codes": ["threshold-breach", "vendor-concentration"],
            "blank": "   ",
            "single": "T-100",
            "count": 3
        }));
        let mut reader = FieldReader::new("test", &payload);
        assert_eq!(
            reader.text(&["codes"], "none"),
            "threshold-breach, vendor-concentration"
        );
        assert_eq!(reader.text(&["blank"], "none"), "none");
        assert_eq!(reader.text(&["missing"], "none"), "none");
        assert_eq!(reader.text(&["count"], "none"), "3");
        assert_eq!(reader.list(&["single"]), vec!["T-100"]);
        assert!(reader.list(&["missing"]).is_empty());
    }

    #[test]
    fn unrelated_payload_is_a_schema_mismatch() {
        let payload = map(json!({"answer": "yes"}));
        let mut reader = FieldReader::new("risk assessment", &payload);
        reader.score(&["riskScore"]);
        reader.text(&["explanation"], "none");
        let err = reader.finish().unwrap_err();
        assert!(err.is_validation());
        assert!(err.to_string().contains("answer"));
    }
}
