use serde::{Deserialize, Serialize};
use std::fmt;

/// The three prompt families a user can be handed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PromptKind {
    Truth,
    Dare,
    Twister,
}

impl PromptKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            PromptKind::Truth => "truth",
            PromptKind::Dare => "dare",
            PromptKind::Twister => "twister",
        }
    }
}

impl fmt::Display for PromptKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The prompt a session is currently expected to respond to. Kept in the
/// session, cleared once the answer or upload has been saved.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssignedPrompt {
    pub kind: PromptKind,
    pub text: String,
}
