use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// One query captured by the monitoring backend.
///
/// Only `time` is interpreted here. Every other field the backend sends is
/// kept verbatim in `fields` and serialized back unchanged.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueryRecord {
    pub time: i64,
    #[serde(flatten)]
    pub fields: Map<String, Value>,
}

impl QueryRecord {
    #[must_use]
    pub fn new(time: i64) -> Self {
        Self {
            time,
            fields: Map::new(),
        }
    }

    #[must_use]
    pub fn with_field(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.fields.insert(name.into(), value.into());
        self
    }

    #[must_use]
    pub fn sql(&self) -> Option<&str> {
        self.fields.get("sql").and_then(Value::as_str)
    }

    #[must_use]
    pub fn elapsed_ms(&self) -> Option<i64> {
        self.fields.get("elapsed").and_then(Value::as_i64)
    }

    #[must_use]
    pub fn id(&self) -> Option<&str> {
        self.fields.get("id").and_then(Value::as_str)
    }

    #[must_use]
    pub fn host(&self) -> Option<&str> {
        self.fields.get("host").and_then(Value::as_str)
    }

    #[must_use]
    pub fn data_source(&self) -> Option<&str> {
        self.fields.get("dataSource").and_then(Value::as_str)
    }

    #[must_use]
    pub fn is_error(&self) -> bool {
        self.fields
            .get("error")
            .or_else(|| self.fields.get("isError"))
            .and_then(Value::as_bool)
            .unwrap_or(false)
    }

    #[must_use]
    pub fn error_message(&self) -> Option<&str> {
        self.fields.get("errorMsg").and_then(Value::as_str)
    }
}

pub type DatasourceResultMap = IndexMap<String, Vec<QueryRecord>>;

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SettingsDocument(pub Value);

impl SettingsDocument {
    #[must_use]
    pub fn new(value: Value) -> Self {
        Self(value)
    }

    #[must_use]
    pub fn as_value(&self) -> &Value {
        &self.0
    }

    pub fn as_value_mut(&mut self) -> &mut Value {
        &mut self.0
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        match &self.0 {
            Value::Null => true,
            Value::Object(map) => map.is_empty(),
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::{DatasourceResultMap, QueryRecord, SettingsDocument};

    #[test]
    fn record_keeps_backend_fields_verbatim() {
        let raw = json!({
            "time": 1_700_000_000_123_i64,
            "elapsed": 42,
            "sql": "select 1",
            "id": "q-1",
            "host": "app01:8080",
            "dataSource": "jdbc:h2:mem:test",
            "error": false,
            "errorMsg": null,
            "custom": {"nested": [1, 2]}
        });

        let record: QueryRecord = serde_json::from_value(raw.clone()).expect("record should parse");
        assert_eq!(record.time, 1_700_000_000_123);
        assert_eq!(record.sql(), Some("select 1"));
        assert_eq!(record.elapsed_ms(), Some(42));
        assert_eq!(record.id(), Some("q-1"));
        assert_eq!(record.host(), Some("app01:8080"));
        assert_eq!(record.data_source(), Some("jdbc:h2:mem:test"));
        assert!(!record.is_error());
        assert_eq!(record.error_message(), None);

        let back = serde_json::to_value(&record).expect("record should serialize");
        assert_eq!(back, raw);
    }

    #[test]
    fn result_map_preserves_response_key_order() {
        let map: DatasourceResultMap = serde_json::from_str(
            r#"{"zeta": [{"time": 1}], "alpha": [], "mid": [{"time": 2}]}"#,
        )
        .expect("map should parse");

        let keys = map.keys().map(String::as_str).collect::<Vec<_>>();
        assert_eq!(keys, vec!["zeta", "alpha", "mid"]);
    }

    #[test]
    fn settings_document_emptiness() {
        assert!(SettingsDocument::default().is_empty());
        assert!(SettingsDocument::new(json!({})).is_empty());
        assert!(!SettingsDocument::new(json!({"host": {}})).is_empty());
    }
}
