use std::fmt::Display;

/// Image returned by the generation provider, already decoded to raw bytes.
#[derive(Debug, Clone, PartialEq)]
pub struct GeneratedImage {
    pub bytes: Vec<u8>,
    pub content_type: String,
    pub revised_prompt: Option<String>,
}

/// Stages of one user-initiated generation attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GenerationState {
    Idle,
    Checking,
    AwaitingCredential,
    Blocked,
    Generating,
    Persisting,
    Done,
    Error,
}

impl Display for GenerationState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = match self {
            GenerationState::Idle => "idle",
            GenerationState::Checking => "checking",
            GenerationState::AwaitingCredential => "awaiting_credential",
            GenerationState::Blocked => "blocked",
            GenerationState::Generating => "generating",
            GenerationState::Persisting => "persisting",
            GenerationState::Done => "done",
            GenerationState::Error => "error",
        };
        f.write_str(state)
    }
}
