use serde::Deserialize;
use serde::Serialize;

/// Source metadata attached to an indexed passage
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PassageMeta {
    /// Corpus tag the passage belongs to (e.g. `codecivil`)
    #[serde(default)]
    pub source: String,
    /// Document kind; summary kinds are listed in `retrieval.summary_report_types`
    #[serde(default)]
    pub report_type: String,
    #[serde(default)]
    pub short_name: String,
    #[serde(default)]
    pub page_number: Option<u32>,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub url: String,
    /// Metadata keys this crate does not interpret, kept for logs
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl PassageMeta {
    /// Page number as displayed to users
    pub fn page_label(&self) -> String {
        self.page_number
            .map_or_else(|| "?".to_string(), |page| page.to_string())
    }
}

/// A retrieved text excerpt with its similarity score
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Passage {
    pub content: String,
    pub score: f32,
    #[serde(default)]
    pub meta: PassageMeta,
}

impl Passage {
    /// Whether the passage comes from a summary-type document
    pub fn is_summary(&self, summary_report_types: &[String]) -> bool {
        summary_report_types
            .iter()
            .any(|kind| kind == &self.meta.report_type)
    }
}

/// Message author
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

impl Role {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::System => "system",
            Self::User => "user",
            Self::Assistant => "assistant",
        }
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Chat message in conversation history
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub content: String,
}

impl Message {
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
        }
    }

    pub fn system(content: impl Into<String>) -> Self {
        Self::new(Role::System, content)
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::new(Role::User, content)
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new(Role::Assistant, content)
    }
}

/// Conversation owned by the calling session
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConversationState {
    pub user_id: String,
    pub messages: Vec<Message>,
}

impl ConversationState {
    /// Start a conversation seeded with the system prompt
    pub fn new(user_id: impl Into<String>, system_prompt: &str) -> Self {
        Self {
            user_id: user_id.into(),
            messages: vec![Message::system(system_prompt)],
        }
    }

    /// Display pairs for the current history
    pub fn pairs(&self) -> Vec<(String, String)> {
        make_pairs(&self.messages)
    }
}

/// Make `messages` begin with exactly one system message.
///
/// A history without one gets `system_prompt` prepended; extra leading system
/// messages are dropped, keeping the first.
pub fn ensure_system_prompt(messages: &mut Vec<Message>, system_prompt: &str) {
    let leading = messages
        .iter()
        .take_while(|m| m.role == Role::System)
        .count();

    match leading {
        0 => messages.insert(0, Message::system(system_prompt)),
        1 => {}
        n => {
            messages.drain(1..n);
        }
    }
}

/// Group the non-system messages into (user, assistant) display pairs.
///
/// A trailing user message without a reply is paired with an empty string.
pub fn make_pairs(messages: &[Message]) -> Vec<(String, String)> {
    let turns: Vec<&Message> = messages
        .iter()
        .filter(|m| m.role != Role::System)
        .collect();

    turns
        .chunks(2)
        .map(|pair| {
            let first = pair[0].content.clone();
            let second = pair.get(1).map(|m| m.content.clone()).unwrap_or_default();
            (first, second)
        })
        .collect()
}

/// Random opaque client identifier of `len` hex characters (at most 32)
pub fn create_user_id(len: usize) -> String {
    uuid::Uuid::new_v4()
        .simple()
        .to_string()
        .chars()
        .take(len)
        .collect()
}
