// src/builder.rs - Alarm message rendering (clean and merge modes)
use crate::{
    config::AlarmSettings,
    error::{AlarmError, Result},
    message::Message,
    value::Scalar,
};
use serde_json::{Map, Value as JsonValue};
use std::collections::BTreeMap;

/// Output key of the rendered text
pub const MSG_FIELD: &str = "msg";
/// Output key of the observed value
pub const VALUE_FIELD: &str = "value";
/// Output key of the condition summary
pub const DESCRIPTION_FIELD: &str = "description";
/// Key wrapping a non-object payload in merge mode
pub const WRAPPED_PAYLOAD_FIELD: &str = "payload";

/// Notification text, with the observation appended when `addValue` is set.
pub fn render_text(settings: &AlarmSettings, value: &Scalar) -> String {
    if settings.add_value {
        format!("{}, value: {}", settings.alarm_text, value)
    } else {
        settings.alarm_text.clone()
    }
}

/// Assemble the alarm notification for `source`.
///
/// Clean mode produces a fresh payload with only the alarm block; merge
/// mode writes the block into a copy of the source payload, nested at
/// `alarmJsonStruct` when configured. Every intermediate segment of the
/// nesting path must already be an object, otherwise nothing is built.
pub fn build(settings: &AlarmSettings, source: &Message, value: &Scalar, text: &str) -> Result<Message> {
    let block = alarm_block(settings, value, text);

    if settings.clean_msg {
        let mut payload = block;
        let metadata = if settings.add_meta {
            for (key, val) in &source.metadata {
                payload
                    .entry(key.clone())
                    .or_insert_with(|| JsonValue::String(val.clone()));
            }
            source.metadata.clone()
        } else {
            BTreeMap::new()
        };
        return Ok(Message {
            payload: JsonValue::Object(payload),
            metadata,
        });
    }

    let mut root = match &source.payload {
        JsonValue::Object(map) => map.clone(),
        other => {
            let mut wrapped = Map::new();
            wrapped.insert(WRAPPED_PAYLOAD_FIELD.to_string(), other.clone());
            wrapped
        }
    };

    if settings.add_meta {
        for (key, val) in &source.metadata {
            root.insert(key.clone(), JsonValue::String(val.clone()));
        }
    }

    match &settings.nest_path {
        Some(segments) => insert_nested(&mut root, segments, block)?,
        None => root.extend(block),
    }

    Ok(Message {
        payload: JsonValue::Object(root),
        metadata: source.metadata.clone(),
    })
}

fn alarm_block(settings: &AlarmSettings, value: &Scalar, text: &str) -> Map<String, JsonValue> {
    let mut block = Map::new();
    block.insert(settings.alarm_object.clone(), JsonValue::Bool(true));
    block.insert(MSG_FIELD.to_string(), JsonValue::String(text.to_string()));
    block.insert(VALUE_FIELD.to_string(), value.to_json());
    block.insert(
        DESCRIPTION_FIELD.to_string(),
        JsonValue::String(settings.conditions.describe()),
    );
    block
}

fn insert_nested(
    root: &mut Map<String, JsonValue>,
    segments: &[String],
    block: Map<String, JsonValue>,
) -> Result<()> {
    let Some((last, parents)) = segments.split_last() else {
        return Err(AlarmError::Build("empty nesting path".into()));
    };

    let mut current = root;
    for (depth, segment) in parents.iter().enumerate() {
        current = current
            .get_mut(segment)
            .and_then(JsonValue::as_object_mut)
            .ok_or_else(|| {
                AlarmError::Build(format!(
                    "nesting path '{}' does not resolve to an object",
                    segments[..=depth].join(".")
                ))
            })?;
    }

    current.insert(last.clone(), JsonValue::Object(block));
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AlarmConfig;
    use serde_json::json;

    fn settings(config: AlarmConfig) -> AlarmSettings {
        config.compile().unwrap()
    }

    #[test]
    fn test_render_text() {
        let plain = settings(AlarmConfig::default());
        assert_eq!(render_text(&plain, &Scalar::Number(150.0)), "Alarm");

        let with_value = settings(AlarmConfig {
            add_value: true,
            alarm_text: "Overheat".into(),
            ..AlarmConfig::default()
        });
        assert_eq!(render_text(&with_value, &Scalar::Number(150.5)), "Overheat, value: 150.5");
        assert_eq!(render_text(&with_value, &Scalar::Number(150.0)), "Overheat, value: 150");
    }

    #[test]
    fn test_clean_mode() {
        let settings = settings(AlarmConfig::default());
        let source = Message::new(json!({"temp": 150, "site": "A"})).with_metadata("topic", "plant/1");

        let out = build(&settings, &source, &Scalar::Number(150.0), "Alarm").unwrap();
        assert_eq!(
            out.payload,
            json!({
                "alarm": true,
                "msg": "Alarm",
                "value": 150,
                "description": "alarm: value > 100, reset: value < 0"
            })
        );
        assert!(out.metadata.is_empty());
    }

    #[test]
    fn test_clean_mode_with_metadata() {
        let settings = settings(AlarmConfig {
            add_meta: true,
            alarm_object: "hot".into(),
            ..AlarmConfig::default()
        });
        let source = Message::new(json!(150))
            .with_metadata("topic", "plant/1")
            .with_metadata("msg", "ignored");

        let out = build(&settings, &source, &Scalar::Number(150.0), "Alarm").unwrap();
        assert_eq!(out.payload["hot"], json!(true));
        assert_eq!(out.payload["topic"], json!("plant/1"));
        assert_eq!(out.payload["msg"], json!("Alarm"));
        assert_eq!(out.meta("topic"), Some("plant/1"));
    }

    #[test]
    fn test_merge_mode_top_level() {
        let settings = settings(AlarmConfig {
            clean_msg: false,
            ..AlarmConfig::default()
        });
        let source = Message::new(json!({"temp": 150, "site": "A"})).with_metadata("topic", "t");

        let out = build(&settings, &source, &Scalar::Number(150.0), "Alarm").unwrap();
        assert_eq!(out.payload["site"], json!("A"));
        assert_eq!(out.payload["temp"], json!(150));
        assert_eq!(out.payload["alarm"], json!(true));
        assert_eq!(out.payload["value"], json!(150));
        assert!(out.payload.get("topic").is_none());
        assert_eq!(out.metadata, source.metadata);
    }

    #[test]
    fn test_merge_mode_wraps_scalar_payload() {
        let settings = settings(AlarmConfig {
            clean_msg: false,
            add_meta: true,
            ..AlarmConfig::default()
        });
        let source = Message::new(json!(150)).with_metadata("topic", "t");

        let out = build(&settings, &source, &Scalar::Number(150.0), "Alarm").unwrap();
        assert_eq!(out.payload["payload"], json!(150));
        assert_eq!(out.payload["topic"], json!("t"));
        assert_eq!(out.payload["alarm"], json!(true));
    }

    #[test]
    fn test_merge_mode_nested() {
        let settings = settings(AlarmConfig {
            clean_msg: false,
            add_to_json: true,
            alarm_json_struct: "status.alarm".into(),
            ..AlarmConfig::default()
        });
        let source = Message::new(json!({"temp": 150, "status": {"ok": false}}));

        let out = build(&settings, &source, &Scalar::Number(150.0), "Alarm").unwrap();
        assert_eq!(out.payload["temp"], json!(150));
        assert_eq!(out.payload["status"]["ok"], json!(false));
        assert_eq!(out.payload["status"]["alarm"]["alarm"], json!(true));
        assert_eq!(out.payload["status"]["alarm"]["msg"], json!("Alarm"));
    }

    #[test]
    fn test_unresolvable_nesting_is_a_build_error() {
        let settings = settings(AlarmConfig {
            clean_msg: false,
            add_to_json: true,
            alarm_json_struct: "status.alarm".into(),
            ..AlarmConfig::default()
        });

        let missing = Message::new(json!({"temp": 150}));
        assert!(matches!(
            build(&settings, &missing, &Scalar::Number(150.0), "Alarm"),
            Err(AlarmError::Build(_))
        ));

        let not_object = Message::new(json!({"status": "running"}));
        assert!(matches!(
            build(&settings, &not_object, &Scalar::Number(150.0), "Alarm"),
            Err(AlarmError::Build(_))
        ));
    }

    #[test]
    fn test_clean_mode_ignores_nesting() {
        let settings = settings(AlarmConfig {
            add_to_json: true,
            alarm_json_struct: "missing.path".into(),
            ..AlarmConfig::default()
        });
        let out = build(&settings, &Message::new(json!({})), &Scalar::from("x"), "Alarm").unwrap();
        assert_eq!(out.payload["value"], json!("x"));
    }
}
