// src/config.rs - Declarative alarm settings and their compiled runtime form

use crate::{
    condition::{Conditions, Operator},
    duration::{format_duration, parse_duration},
    error::{AlarmError, Result},
    value::{canonicalize, Scalar},
};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use std::path::Path;
use std::time::Duration;
use tracing::{debug, warn};

// ============================================================================
// ALARM CONFIGURATION
// ============================================================================

/// Alarm configuration, one per engine instance.
///
/// Keys use the camelCase names of the host pipeline (`filterTime`,
/// `sendAlarmOnly`, ...). Every key is optional and falls back to the
/// documented default.
///
/// # Examples
///
/// ```rust
/// use threshold_alarm::AlarmConfig;
///
/// let config = AlarmConfig::from_yaml("value: 80\nfilterTime: 10s\n")?;
/// assert_eq!(config.value, 80.0);
/// assert_eq!(config.operator, ">");
/// assert!(config.send_alarm_only);
/// # Ok::<(), threshold_alarm::AlarmError>(())
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct AlarmConfig {
    /// Alarm threshold
    #[serde(default = "default_value")]
    pub value: f64,

    /// Dotted path to the observed field, empty for the whole payload
    #[serde(default)]
    pub json: String,

    /// Non-empty switches to string-equality mode
    #[serde(default)]
    pub string_value: String,

    /// Alarm comparison
    #[serde(default = "default_operator")]
    pub operator: String,

    /// Reset threshold
    #[serde(default)]
    pub reset: f64,

    /// Reset comparison (numeric mode only)
    #[serde(default = "default_reset_operator")]
    pub reset_operator: String,

    /// Debounce before the first trigger
    #[serde(default = "default_zero_duration")]
    pub filter_time: String,

    /// Resend period while triggered, zero disables
    #[serde(default = "default_zero_duration")]
    pub send_interval: String,

    /// Base notification text
    #[serde(default = "default_alarm_text")]
    pub alarm_text: String,

    /// Output field name for the boolean alarm flag
    #[serde(default = "default_alarm_object")]
    pub alarm_object: String,

    /// Nest the alarm block at `alarmJsonStruct`
    #[serde(default)]
    pub add_to_json: bool,

    /// Dotted nesting path for the alarm block
    #[serde(default)]
    pub alarm_json_struct: String,

    /// Drop non-alarm traffic entirely
    #[serde(default = "default_true")]
    pub send_alarm_only: bool,

    /// Append the observed value to the text
    #[serde(default)]
    pub add_value: bool,

    /// Emit a minimal new message instead of merging
    #[serde(default = "default_true")]
    pub clean_msg: bool,

    /// Carry source metadata into the output
    #[serde(default)]
    pub add_meta: bool,
}

impl Default for AlarmConfig {
    fn default() -> Self {
        Self {
            value: default_value(),
            json: String::new(),
            string_value: String::new(),
            operator: default_operator(),
            reset: 0.0,
            reset_operator: default_reset_operator(),
            filter_time: default_zero_duration(),
            send_interval: default_zero_duration(),
            alarm_text: default_alarm_text(),
            alarm_object: default_alarm_object(),
            add_to_json: false,
            alarm_json_struct: String::new(),
            send_alarm_only: default_true(),
            add_value: false,
            clean_msg: default_true(),
            add_meta: false,
        }
    }
}

impl AlarmConfig {
    /// Parse a YAML document
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        Ok(serde_yaml::from_str(yaml)?)
    }

    /// Parse a JSON document
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Load from a file; `.json` files are JSON, everything else YAML
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path)?;
        if is_json(path) {
            Self::from_json(&contents)
        } else {
            Self::from_yaml(&contents)
        }
    }

    /// Validate the configuration without building an engine.
    pub fn validate(&self) -> Result<()> {
        let operator: Operator = self.operator.parse()?;
        if self.string_value.is_empty() {
            self.reset_operator.parse::<Operator>()?;
        } else if !matches!(operator, Operator::Eq | Operator::Ne) {
            warn!(
                "operator '{}' has no meaning in string mode; the alarm condition will never match",
                operator
            );
        }

        if self.alarm_object.trim().is_empty() {
            return Err(AlarmError::Config("alarmObject cannot be empty".into()));
        }

        if self.add_to_json {
            if self.alarm_json_struct.trim().is_empty() {
                return Err(AlarmError::Config(
                    "addToJson requires a non-empty alarmJsonStruct".into(),
                ));
            }
            if self.alarm_json_struct.split('.').any(|s| s.is_empty()) {
                return Err(AlarmError::Config(format!(
                    "alarmJsonStruct '{}' contains an empty segment",
                    self.alarm_json_struct
                )));
            }
        }

        parse_duration(&self.filter_time)?;
        parse_duration(&self.send_interval)?;

        Ok(())
    }

    /// Resolve operators, durations and paths into [`AlarmSettings`].
    pub fn compile(&self) -> Result<AlarmSettings> {
        self.validate()?;

        let operator: Operator = self.operator.parse()?;
        let conditions = if self.string_value.is_empty() {
            Conditions::Numeric {
                operator,
                threshold: self.value,
                reset_operator: self.reset_operator.parse()?,
                reset_threshold: self.reset,
            }
        } else {
            Conditions::Text {
                operator,
                expected: expected_text(&self.string_value),
            }
        };

        let nest_path = if self.add_to_json {
            Some(self.alarm_json_struct.split('.').map(str::to_string).collect())
        } else {
            None
        };

        let settings = AlarmSettings {
            conditions,
            filter_time: parse_duration(&self.filter_time)?,
            send_interval: parse_duration(&self.send_interval)?,
            observe_path: Some(self.json.trim())
                .filter(|p| !p.is_empty())
                .map(str::to_string),
            alarm_text: self.alarm_text.clone(),
            alarm_object: self.alarm_object.clone(),
            nest_path,
            send_alarm_only: self.send_alarm_only,
            add_value: self.add_value,
            clean_msg: self.clean_msg,
            add_meta: self.add_meta,
        };

        debug!("Compiled alarm settings: {}", settings.summary());
        Ok(settings)
    }
}

// ============================================================================
// COMPILED SETTINGS
// ============================================================================

/// Immutable runtime view of an [`AlarmConfig`].
#[derive(Debug, Clone, PartialEq)]
pub struct AlarmSettings {
    /// Trigger and reset conditions
    pub conditions: Conditions,
    /// Debounce before the first trigger
    pub filter_time: Duration,
    /// Resend period, zero disables
    pub send_interval: Duration,
    /// Dotted path to the observation
    pub observe_path: Option<String>,
    /// Base notification text
    pub alarm_text: String,
    /// Output key of the boolean alarm flag
    pub alarm_object: String,
    /// Segments of `alarmJsonStruct` when `addToJson` is set
    pub nest_path: Option<Vec<String>>,
    /// Drop non-alarm traffic
    pub send_alarm_only: bool,
    /// Append the observation to the text
    pub add_value: bool,
    /// Build a fresh message instead of merging
    pub clean_msg: bool,
    /// Copy source metadata into the output
    pub add_meta: bool,
}

impl AlarmSettings {
    /// Whether the background re-evaluation task is needed
    pub fn needs_timer(&self) -> bool {
        !self.filter_time.is_zero() || !self.send_interval.is_zero()
    }

    /// One-line description for logs
    pub fn summary(&self) -> String {
        format!(
            "{} (filterTime={}, sendInterval={}, path={})",
            self.conditions.describe(),
            format_duration(self.filter_time),
            format_duration(self.send_interval),
            self.observe_path.as_deref().unwrap_or("<root>")
        )
    }
}

// ============================================================================
// HOST CONFIGURATION
// ============================================================================

/// Settings for the stand-alone host: the alarm plus the replay cadence.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct HostConfig {
    /// Period of the synthetic ping messages
    #[serde(default = "default_ping_interval")]
    pub ping_interval: String,

    /// Period of the background re-evaluation
    #[serde(default = "default_tick_interval")]
    pub tick_interval: String,

    /// The alarm itself
    #[serde(default)]
    pub alarm: AlarmConfig,
}

impl Default for HostConfig {
    fn default() -> Self {
        Self {
            ping_interval: default_ping_interval(),
            tick_interval: default_tick_interval(),
            alarm: AlarmConfig::default(),
        }
    }
}

impl HostConfig {
    /// Wrap a bare alarm configuration with default host settings
    pub fn for_alarm(alarm: AlarmConfig) -> Self {
        Self {
            alarm,
            ..Self::default()
        }
    }

    /// Parse a YAML document holding either a host config or a bare alarm config
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        let document: serde_yaml::Value = serde_yaml::from_str(yaml)?;
        if is_host_document(&document) {
            Ok(serde_yaml::from_value(document)?)
        } else {
            Ok(Self::for_alarm(serde_yaml::from_value(document)?))
        }
    }

    /// Parse a JSON document holding either a host config or a bare alarm config
    pub fn from_json(json: &str) -> Result<Self> {
        let document: serde_json::Value = serde_json::from_str(json)?;
        let is_host = document
            .as_object()
            .map(|map| map.contains_key("alarm"))
            .unwrap_or(false);
        if is_host {
            Ok(serde_json::from_value(document)?)
        } else {
            Ok(Self::for_alarm(serde_json::from_value(document)?))
        }
    }

    /// Load from a file; `.json` files are JSON, everything else YAML
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path)?;
        if is_json(path) {
            Self::from_json(&contents)
        } else {
            Self::from_yaml(&contents)
        }
    }

    /// Parsed ping period; must be non-zero
    pub fn ping_period(&self) -> Result<Duration> {
        non_zero("pingInterval", parse_duration(&self.ping_interval)?)
    }

    /// Parsed re-evaluation period; must be non-zero
    pub fn tick_period(&self) -> Result<Duration> {
        non_zero("tickInterval", parse_duration(&self.tick_interval)?)
    }
}

/// `stringValue` normalized like an observation; shapes that cannot be an
/// observation stay literal text.
fn expected_text(literal: &str) -> Scalar {
    canonicalize(&JsonValue::String(literal.to_string()))
        .unwrap_or_else(|_| Scalar::Text(literal.to_string()))
}

fn non_zero(key: &str, duration: Duration) -> Result<Duration> {
    if duration.is_zero() {
        Err(AlarmError::Config(format!("{} must be greater than zero", key)))
    } else {
        Ok(duration)
    }
}

fn is_host_document(document: &serde_yaml::Value) -> bool {
    document
        .as_mapping()
        .map(|map| map.contains_key("alarm"))
        .unwrap_or(false)
}

fn is_json(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.eq_ignore_ascii_case("json"))
        .unwrap_or(false)
}

// ============================================================================
// DEFAULT VALUE FUNCTIONS
// ============================================================================

fn default_value() -> f64 { 100.0 }
fn default_operator() -> String { ">".to_string() }
fn default_reset_operator() -> String { "<".to_string() }
fn default_zero_duration() -> String { "0s".to_string() }
fn default_alarm_text() -> String { "Alarm".to_string() }
fn default_alarm_object() -> String { "alarm".to_string() }
fn default_true() -> bool { true }
fn default_ping_interval() -> String { "1s".to_string() }
fn default_tick_interval() -> String { "1s".to_string() }
