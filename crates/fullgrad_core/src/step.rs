//! Step and mode identifiers for recorded tensors.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::CoreError;

/// One forward/backward pass, the unit of tensor recording granularity.
///
/// # Example
///
/// ```rust
/// use fullgrad_core::Step;
///
/// let step = Step::new(3);
/// assert_eq!(step.value(), 3);
/// assert!(Step::new(2) < step);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Step(u64);

impl Step {
    /// Create a new step.
    #[must_use]
    pub const fn new(value: u64) -> Self {
        Self(value)
    }

    /// Get the step number.
    #[must_use]
    pub const fn value(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u64> for Step {
    fn from(value: u64) -> Self {
        Self::new(value)
    }
}

/// Phase of the run a tensor was recorded in.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    /// Training steps.
    Train,
    /// Evaluation steps.
    #[default]
    Eval,
    /// Steps recorded without a mode.
    Global,
}

impl Mode {
    /// Lowercase name, as used in directory layouts and on the command line.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Train => "train",
            Self::Eval => "eval",
            Self::Global => "global",
        }
    }
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Mode {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "train" => Ok(Self::Train),
            "eval" => Ok(Self::Eval),
            "global" => Ok(Self::Global),
            other => Err(CoreError::UnknownMode(other.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_step_ordering() {
        let mut steps = vec![Step::new(3), Step::new(1), Step::new(2)];
        steps.sort();
        assert_eq!(steps, vec![Step::new(1), Step::new(2), Step::new(3)]);
    }

    #[test]
    fn test_step_serialization() {
        let json = serde_json::to_string(&Step::new(7)).unwrap();
        assert_eq!(json, "7");
        let restored: Step = serde_json::from_str(&json).unwrap();
        assert_eq!(restored, Step::new(7));
    }

    #[test]
    fn test_mode_parse() {
        assert_eq!("eval".parse::<Mode>().unwrap(), Mode::Eval);
        assert_eq!("TRAIN".parse::<Mode>().unwrap(), Mode::Train);
        assert!("predict".parse::<Mode>().is_err());
        assert_eq!(Mode::default(), Mode::Eval);
    }

    #[test]
    fn test_mode_serialization() {
        let json = serde_json::to_string(&Mode::Global).unwrap();
        assert_eq!(json, "\"global\"");
    }
}
