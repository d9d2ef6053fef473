use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Category {
    Admin,
    AdminRestricted,
    VoteChange,
    Registration,
    Login,
    Security,
    ElectionDuration,
    Time,
    Voting,
    Thanks,
    Compliment,
    Help,
    Identity,
    Greeting,
    Fallback,
}

impl Category {
    pub const ALL: [Category; 15] = [
        Self::Admin,
        Self::AdminRestricted,
        Self::VoteChange,
        Self::Registration,
        Self::Login,
        Self::Security,
        Self::ElectionDuration,
        Self::Time,
        Self::Voting,
        Self::Thanks,
        Self::Compliment,
        Self::Help,
        Self::Identity,
        Self::Greeting,
        Self::Fallback,
    ];

    pub fn as_code(self) -> &'static str {
        match self {
            Self::Admin => "admin",
            Self::AdminRestricted => "admin_restricted",
            Self::VoteChange => "vote_change",
            Self::Registration => "registration",
            Self::Login => "login",
            Self::Security => "security",
            Self::ElectionDuration => "election_duration",
            Self::Time => "time",
            Self::Voting => "voting",
            Self::Help => "help",
            Self::Identity => "identity",
            Self::Thanks => "thanks",
            Self::Compliment => "compliment",
            Self::Greeting => "greeting",
            Self::Fallback => "fallback",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        let wanted = value.trim().to_lowercase();
        Self::ALL
            .into_iter()
            .find(|category| category.as_code() == wanted)
    }
}

impl std::fmt::Display for Category {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_code())
    }
}

/// Role signal handed over by the surrounding web application.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserContext {
    pub is_admin: bool,
}

impl UserContext {
    pub fn admin() -> Self {
        Self { is_admin: true }
    }

    pub fn member() -> Self {
        Self { is_admin: false }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReplySource {
    Rules,
    Openai,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Classification {
    pub category: Category,
    pub matched_phrase: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatInput {
    pub session_id: Option<String>,
    pub text: String,
    #[serde(default)]
    pub is_admin: bool,
    pub user_id: Option<String>,
}

impl ChatInput {
    pub fn user_context(&self) -> UserContext {
        UserContext {
            is_admin: self.is_admin,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AssistantReply {
    pub reply_text: String,
    pub category: Category,
    pub variant: usize,
    pub source: ReplySource,
    pub session_id: String,
    pub matched_phrase: Option<String>,
    pub knowledge_sources: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KnowledgeDoc {
    pub id: String,
    pub title: String,
    pub source_path: String,
    pub body: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetrievedChunk {
    pub doc_id: String,
    pub title: String,
    pub snippet: String,
    pub score: f32,
    pub source_path: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConversationTurn {
    pub at: DateTime<Utc>,
    pub user_text: String,
    pub assistant_text: String,
    pub category: Category,
    pub variant: usize,
    pub source: ReplySource,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConversationSession {
    pub session_id: String,
    pub user_id: Option<String>,
    pub is_admin: bool,
    pub expires_at: DateTime<Utc>,
    pub turns: Vec<ConversationTurn>,
}

impl ConversationSession {
    pub fn new(session_id: impl Into<String>, expires_at: DateTime<Utc>) -> Self {
        Self {
            session_id: session_id.into(),
            user_id: None,
            is_admin: false,
            expires_at,
            turns: Vec::new(),
        }
    }

    /// Variant served most recently for `category`, if any.
    pub fn last_variant(&self, category: Category) -> Option<usize> {
        self.turns
            .iter()
            .rev()
            .find(|turn| turn.category == category)
            .map(|turn| turn.variant)
    }

    pub fn recent_turns(&self, limit: usize) -> &[ConversationTurn] {
        let start = self.turns.len().saturating_sub(limit);
        &self.turns[start..]
    }
}
