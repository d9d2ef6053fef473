pub mod config;
pub mod intent;
pub mod models;
pub mod prompt;
pub mod responses;
pub mod selector;

pub use config::{AssistantConfig, ConfigError};
pub use intent::{classify, classify_category, intent_table, normalize_utterance, IntentRule};
pub use models::*;
pub use prompt::{build_system_prompt, PromptContext};
pub use responses::{compose_rule_reply, pool, render};
pub use selector::{ResponseSelector, SelectionPolicy};
