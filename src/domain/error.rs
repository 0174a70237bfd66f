//! Domain error types.

/// A parse error with position information for field expressions.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[error("parse error at position {position}: {message}")]
pub struct ParseError {
    pub message: String,
    pub position: usize,
}

impl ParseError {
    /// Format the error with a caret pointing at the error position in the input.
    pub fn display_with_context(&self, input: &str) -> String {
        let caret = " ".repeat(self.position) + "^";
        format!(
            "{input}\n{caret}\n{err}",
            input = input,
            caret = caret,
            err = self
        )
    }
}

/// Top-level error type for scenariomap.
///
/// Only the adapters and the CLI produce these. The evaluator itself never
/// fails: unresolvable data degrades to a `NO_BIAS` evaluation instead.
#[derive(Debug, thiserror::Error)]
pub enum ScenarioMapError {
    #[error("config parse error in {file}: {reason}")]
    ConfigParse { file: String, reason: String },

    #[error("missing config key [{section}] {key}")]
    ConfigMissing { section: String, key: String },

    #[error("invalid config value [{section}] {key}: {reason}")]
    ConfigInvalid {
        section: String,
        key: String,
        reason: String,
    },

    #[error("scenario file error in {file}: {reason}")]
    ScenarioParse { file: String, reason: String },

    #[error("invalid scenario {id}: {reason}")]
    ScenarioInvalid { id: String, reason: String },

    #[error("snapshot error: {reason}")]
    SnapshotParse { reason: String },

    #[error("no market data for {symbol}")]
    NoData { symbol: String },

    #[error(transparent)]
    FieldParse(#[from] ParseError),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl From<&ScenarioMapError> for std::process::ExitCode {
    fn from(err: &ScenarioMapError) -> Self {
        let code: u8 = match err {
            ScenarioMapError::Io(_) => 1,
            ScenarioMapError::ConfigParse { .. }
            | ScenarioMapError::ConfigMissing { .. }
            | ScenarioMapError::ConfigInvalid { .. }
            | ScenarioMapError::ScenarioParse { .. }
            | ScenarioMapError::ScenarioInvalid { .. } => 2,
            ScenarioMapError::SnapshotParse { .. } | ScenarioMapError::NoData { .. } => 3,
            ScenarioMapError::FieldParse(_) => 4,
        };
        std::process::ExitCode::from(code)
    }
}
