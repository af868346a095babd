use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SchedError {
    /// Bad level list: unknown policy, missing or stray quantum, no levels.
    Configuration(String),
    OutOfRangeLevel { id: String, level: usize, levels: usize },
    InvalidBurst { id: String },
    /// The process would finish past the largest representable time.
    TimeOverflow { id: String },
    EmptyCompletionSet,
}

impl fmt::Display for SchedError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SchedError::Configuration(msg) => write!(f, "invalid level configuration: {}", msg),
            SchedError::OutOfRangeLevel { id, level, levels } => write!(
                f,
                "process {} asks for level {} but only {} levels are configured",
                id,
                level + 1,
                levels
            ),
            SchedError::InvalidBurst { id } => {
                write!(f, "process {} has a burst time of zero", id)
            }
            SchedError::TimeOverflow { id } => {
                write!(f, "process {} would finish past the end of time", id)
            }
            SchedError::EmptyCompletionSet => write!(f, "no process has completed"),
        }
    }
}

impl std::error::Error for SchedError {}
