use qwatch_core::records::SettingsDocument;
use serde_json::Value;

#[derive(Debug, Clone, PartialEq)]
pub struct SettingField {
    pub host: String,
    pub name: String,
    pub value: Value,
}

#[must_use]
pub fn datasource_fields(document: &SettingsDocument, datasource: &str) -> Vec<SettingField> {
    let Some(hosts) = document.as_value().as_object() else {
        return Vec::new();
    };

    hosts
        .iter()
        .filter_map(|(host, datasources)| {
            datasources
                .get(datasource)
                .and_then(Value::as_object)
                .map(|fields| (host, fields))
        })
        .flat_map(|(host, fields)| {
            fields.iter().map(move |(name, value)| SettingField {
                host: host.clone(),
                name: name.clone(),
                value: value.clone(),
            })
        })
        .collect()
}

pub fn set_field(
    document: &mut SettingsDocument,
    host: &str,
    datasource: &str,
    name: &str,
    value: Value,
) -> bool {
    let Some(slot) = document
        .as_value_mut()
        .get_mut(host)
        .and_then(|datasources| datasources.get_mut(datasource))
        .and_then(Value::as_object_mut)
        .and_then(|fields| fields.get_mut(name))
    else {
        return false;
    };
    *slot = value;
    true
}

#[must_use]
pub fn parse_input(raw: &str) -> Value {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Value::Null;
    }
    match serde_json::from_str::<Value>(trimmed) {
        Ok(value @ (Value::Number(_) | Value::Bool(_) | Value::Null)) => value,
        _ => Value::String(trimmed.to_string()),
    }
}

#[must_use]
pub fn display_value(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(text) => text.clone(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use qwatch_core::records::SettingsDocument;
    use serde_json::{json, Value};

    use super::{datasource_fields, display_value, parse_input, set_field};

    fn document() -> SettingsDocument {
        SettingsDocument::new(json!({
            "app01:8080": {
                "jdbc:h2:mem:a": {"timeThreshold": 0, "acceptFilter": null, "format": true},
                "jdbc:h2:mem:b": {"timeThreshold": 10}
            },
            "app02:8080": {
                "jdbc:h2:mem:a": {"timeThreshold": 5}
            }
        }))
    }

    #[test]
    fn lists_fields_for_datasource_across_hosts() {
        let fields = datasource_fields(&document(), "jdbc:h2:mem:a");

        let summary = fields
            .iter()
            .map(|field| (field.host.as_str(), field.name.as_str()))
            .collect::<Vec<_>>();
        assert_eq!(summary.len(), 4);
        assert!(summary.contains(&("app01:8080", "timeThreshold")));
        assert!(summary.contains(&("app02:8080", "timeThreshold")));
        assert!(summary.contains(&("app01:8080", "format")));
    }

    #[test]
    fn fields_follow_document_order() {
        let document: SettingsDocument = serde_json::from_str(
            r#"{"app02:8080": {"db": {"timeThreshold": 1, "acceptFilter": "x"}},
                "app01:8080": {"db": {"format": true}}}"#,
        )
        .expect("settings should decode");

        let order = datasource_fields(&document, "db")
            .into_iter()
            .map(|field| format!("{}/{}", field.host, field.name))
            .collect::<Vec<_>>();
        assert_eq!(
            order,
            vec![
                "app02:8080/timeThreshold",
                "app02:8080/acceptFilter",
                "app01:8080/format",
            ]
        );
    }

    #[test]
    fn unknown_datasource_has_no_fields() {
        assert!(datasource_fields(&document(), "missing").is_empty());
        assert!(datasource_fields(&SettingsDocument::default(), "jdbc:h2:mem:a").is_empty());
    }

    #[test]
    fn set_field_updates_only_existing_paths() {
        let mut doc = document();

        assert!(set_field(
            &mut doc,
            "app02:8080",
            "jdbc:h2:mem:a",
            "timeThreshold",
            json!(250)
        ));
        assert_eq!(
            doc.as_value()["app02:8080"]["jdbc:h2:mem:a"]["timeThreshold"],
            json!(250)
        );
        assert_eq!(
            doc.as_value()["app01:8080"]["jdbc:h2:mem:a"]["timeThreshold"],
            json!(0)
        );

        assert!(!set_field(
            &mut doc,
            "app02:8080",
            "jdbc:h2:mem:b",
            "timeThreshold",
            json!(1)
        ));
    }

    #[test]
    fn input_parsing_keeps_literals_and_strings() {
        assert_eq!(parse_input("250"), json!(250));
        assert_eq!(parse_input("false"), json!(false));
        assert_eq!(parse_input("  "), Value::Null);
        assert_eq!(parse_input("select.*"), json!("select.*"));
        assert_eq!(parse_input("[1]"), json!("[1]"));
    }

    #[test]
    fn display_hides_null_and_quotes() {
        assert_eq!(display_value(&Value::Null), "");
        assert_eq!(display_value(&json!("abc")), "abc");
        assert_eq!(display_value(&json!(12)), "12");
    }
}
