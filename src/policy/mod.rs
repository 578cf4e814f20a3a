//! Engine configuration.
//!
//! Parameters are plain serde structs with `Default`, a `validate()` check
//! run by the engines before every batch, and a `params_hash()` identifying
//! the configuration of a run.

pub mod params;

use serde::{Deserialize, Serialize};

pub use params::{FullCrossingParams, SparseCrossingParams};

/// What to do when a batch cannot be satisfied.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Strictness {
    /// Return `LogicalInconsistency` on the first violation.
    #[default]
    Raise,
    /// Count violations and flag them in the batch report.
    Report,
}

/// Logging verbosity, from most to least verbose.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Verbosity {
    /// Closure rounds, dropped hypotheses, reduction sizes.
    Debug,
    /// Batch progress and model size transitions.
    #[default]
    Info,
    /// Trace warnings.
    Warn,
    /// Violations.
    Error,
    /// Nothing but failures the caller must act on.
    Crit,
}

impl Verbosity {
    /// `EnvFilter` directive for this level.
    pub fn directive(&self) -> &'static str {
        match self {
            Self::Debug => "debug",
            Self::Info => "info",
            Self::Warn => "warn",
            // tracing has no level above error
            Self::Error | Self::Crit => "error",
        }
    }

    /// Parse a level name.
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "debug" => Some(Self::Debug),
            "info" => Some(Self::Info),
            "warn" | "warning" => Some(Self::Warn),
            "error" => Some(Self::Error),
            "crit" | "critical" => Some(Self::Crit),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_verbosity_order() {
        assert!(Verbosity::Debug < Verbosity::Info);
        assert!(Verbosity::Error < Verbosity::Crit);
        assert_eq!(Verbosity::parse("WARNING"), Some(Verbosity::Warn));
        assert_eq!(Verbosity::parse("critical"), Some(Verbosity::Crit));
        assert_eq!(Verbosity::parse("trace"), None);
        assert_eq!(Verbosity::Crit.directive(), "error");
    }

    #[test]
    fn test_strictness_serde() {
        let json = serde_json::to_string(&Strictness::Report).unwrap();
        assert_eq!(json, "\"report\"");
    }
}
