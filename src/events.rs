use serde::{Deserialize, Serialize};

/// Signals from the generation worker back to the front-end.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum GenerationEvent {
    Started { count: u8 },
    Finished { urls: Vec<String> },
    Failed { error: String },
}

impl GenerationEvent {
    /// True for the events that end a generation.
    pub fn is_terminal(&self) -> bool {
        !matches!(self, GenerationEvent::Started { .. })
    }
}
