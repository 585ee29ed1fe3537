//! Chat message list to Gemini turn conversion
//!
//! Gemini requires `contents` to alternate strictly between `user` and
//! `model`, starting with `user`. OpenAI-style message lists guarantee
//! neither, so the conversion repairs them:
//!
//! - `system` messages never become turns;
//! - a repeated speaker gets a short filler turn from the other side
//!   (`"Okay."` from the model, `"Understood."` from the user);
//! - a history that still does not open with a user turn is replaced by
//!   a single user turn holding the last user message (or `"Hello"`).
//!
//! The last repair drops context. [`TurnHistory::discarded_turns`] reports
//! how much so the caller can log it.

use crate::chat::{ChatMessage, Role};
use serde::Serialize;

/// Filler spoken by the model between two consecutive user turns
pub const MODEL_FILLER: &str = "Okay.";
/// Filler spoken by the user between two consecutive model turns
pub const USER_FILLER: &str = "Understood.";
/// Prompt used when the conversation holds no user message at all
pub const FALLBACK_PROMPT: &str = "Hello";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TurnRole {
    User,
    Model,
}

impl TurnRole {
    fn filler(self) -> GeminiTurn {
        match self {
            TurnRole::User => GeminiTurn::new(TurnRole::Model, MODEL_FILLER),
            TurnRole::Model => GeminiTurn::new(TurnRole::User, USER_FILLER),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Part {
    pub text: String,
}

/// One entry of Gemini's `contents` array
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GeminiTurn {
    pub role: TurnRole,
    pub parts: Vec<Part>,
}

impl GeminiTurn {
    pub fn new(role: TurnRole, text: impl Into<String>) -> Self {
        Self {
            role,
            parts: vec![Part { text: text.into() }],
        }
    }

    /// Concatenated text of all parts
    pub fn text(&self) -> String {
        self.parts.iter().map(|p| p.text.as_str()).collect()
    }
}

/// Result of [`to_gemini_turns`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TurnHistory {
    turns: Vec<GeminiTurn>,
    fillers_inserted: usize,
    discarded_turns: usize,
}

impl TurnHistory {
    /// Turns to send as `contents`; never empty, always starts with a user turn
    pub fn turns(&self) -> &[GeminiTurn] {
        &self.turns
    }

    pub fn into_turns(self) -> Vec<GeminiTurn> {
        self.turns
    }

    /// Number of synthesized filler turns
    pub fn fillers_inserted(&self) -> usize {
        self.fillers_inserted
    }

    /// Number of real conversation turns dropped by the fallback repair
    pub fn discarded_turns(&self) -> usize {
        self.discarded_turns
    }
}

/// Convert chat messages into an alternating Gemini turn list
pub fn to_gemini_turns(messages: &[ChatMessage]) -> TurnHistory {
    let mut turns = Vec::with_capacity(messages.len() * 2);
    let mut fillers_inserted = 0;
    let mut real_turns = 0;
    let mut previous: Option<TurnRole> = None;

    for message in messages {
        let role = match message.role {
            Role::System => continue,
            Role::Assistant => TurnRole::Model,
            Role::User => TurnRole::User,
        };

        if previous == Some(role) {
            turns.push(role.filler());
            fillers_inserted += 1;
        }
        turns.push(GeminiTurn::new(role, message.content.clone()));
        real_turns += 1;
        previous = Some(role);
    }

    if turns.first().map(|turn| turn.role) == Some(TurnRole::User) {
        return TurnHistory {
            turns,
            fillers_inserted,
            discarded_turns: 0,
        };
    }

    let last_user = messages.iter().rev().find(|m| m.role == Role::User);
    let text = last_user
        .map(|m| m.content.clone())
        .unwrap_or_else(|| FALLBACK_PROMPT.to_string());

    TurnHistory {
        turns: vec![GeminiTurn::new(TurnRole::User, text)],
        fillers_inserted: 0,
        discarded_turns: real_turns - usize::from(last_user.is_some()),
    }
}

/// System messages joined for Gemini's `systemInstruction`, if any
pub fn system_instruction(messages: &[ChatMessage]) -> Option<String> {
    let parts: Vec<&str> = messages
        .iter()
        .filter(|m| m.role == Role::System && !m.content.trim().is_empty())
        .map(|m| m.content.as_str())
        .collect();

    if parts.is_empty() {
        None
    } else {
        Some(parts.join("\n\n"))
    }
}
