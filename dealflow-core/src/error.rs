use dealflow_shared::SourceErrorKind;

/// Failure of one source fetch. Only `Transient` is worth retrying inside a cycle.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum SourceError {
    #[error("transient source failure: {0}")]
    Transient(String),
    #[error("fatal source failure: {0}")]
    Fatal(String),
}

impl SourceError {
    pub fn is_transient(&self) -> bool {
        matches!(self, SourceError::Transient(_))
    }

    pub fn kind(&self) -> SourceErrorKind {
        match self {
            SourceError::Transient(_) => SourceErrorKind::Transient,
            SourceError::Fatal(_) => SourceErrorKind::Fatal,
        }
    }

    pub fn message(&self) -> &str {
        match self {
            SourceError::Transient(m) | SourceError::Fatal(m) => m,
        }
    }
}

/// Per-offer normalization failure. Dropped and counted, never aborts a batch.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum NormalizationError {
    #[error("missing required field `{0}`")]
    MissingField(&'static str),
    #[error("field `{field}` is not numeric: {value}")]
    NonNumeric { field: &'static str, value: String },
    #[error("field `{field}` out of range: {value}")]
    OutOfRange { field: &'static str, value: f64 },
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum PublishError {
    #[error("publisher rejected offer: {0}")]
    Rejected(String),
    #[error("publisher unreachable: {0}")]
    Transport(String),
}

/// The dedup ledger could not be read or written. Fatal to the current cycle.
#[derive(Debug, thiserror::Error)]
pub enum LedgerError {
    #[error("ledger unavailable: {0}")]
    Unavailable(String),
    #[error("ledger data corrupt: {0}")]
    Corrupt(String),
}

#[derive(Debug, thiserror::Error)]
pub enum StatsError {
    #[error("stats store unavailable: {0}")]
    Unavailable(String),
    #[error("stats record corrupt: {0}")]
    Corrupt(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_source_error_kind() {
        let t = SourceError::Transient("timed out".into());
        let f = SourceError::Fatal("401 unauthorized".into());

        assert!(t.is_transient());
        assert!(!f.is_transient());
        assert_eq!(f.kind(), SourceErrorKind::Fatal);
        assert_eq!(t.message(), "timed out");
    }
}
