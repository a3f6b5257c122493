use thiserror::Error;

/// Crate level error type shared by the extractor, parser, evaluator and builder.
#[derive(Error, Debug)]
pub enum AlarmError {
    /// I/O related failure
    #[error("Io error: {0}")]
    Io(#[from] std::io::Error),

    /// Invalid or inconsistent configuration
    #[error("Configuration error: {0}")]
    Config(String),

    /// Error while parsing YAML configuration files
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// Error while decoding JSON payloads or configuration
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Observation path did not resolve inside the payload
    #[error("Path not found: {0}")]
    PathNotFound(String),

    /// Observation resolved to a value that is not a scalar
    #[error("Unsupported value shape: {0}")]
    UnsupportedShape(&'static str),

    /// Comparison operator outside `<, <=, >, >=, !=, =`
    #[error("Unknown operator: '{0}'")]
    UnknownOperator(String),

    /// Duration literal that does not follow `<n>d<n>h<n>m<n>s`
    #[error("Invalid duration '{0}'")]
    DurationFormat(String),

    /// Output message could not be assembled
    #[error("Message build error: {0}")]
    Build(String),
}

impl AlarmError {
    /// True for failures raised while turning a payload into a scalar.
    pub fn is_extraction(&self) -> bool {
        matches!(self, AlarmError::PathNotFound(_) | AlarmError::UnsupportedShape(_))
    }

    /// True for failures that prevent an engine from being built.
    pub fn is_construction(&self) -> bool {
        matches!(
            self,
            AlarmError::Config(_)
                | AlarmError::DurationFormat(_)
                | AlarmError::UnknownOperator(_)
                | AlarmError::Yaml(_)
        )
    }
}

/// Convenient alias over [`Result`] using [`AlarmError`]
pub type Result<T> = std::result::Result<T, AlarmError>;
