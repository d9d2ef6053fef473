use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;

use crate::models::{Category, Classification, UserContext};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Audience {
    Any,
    AdminOnly,
    NonAdminOnly,
}

impl Audience {
    fn admits(self, ctx: UserContext) -> bool {
        match self {
            Self::Any => true,
            Self::AdminOnly => ctx.is_admin,
            Self::NonAdminOnly => !ctx.is_admin,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize)]
pub struct IntentRule {
    pub category: Category,
    pub audience: Audience,
    pub triggers: &'static [&'static str],
}

const ADMIN_TRIGGERS: &[&str] = &[
    "i'm an admin",
    "i am an admin",
    "im an admin",
    "i'm the admin",
    "i am the admin",
    "as an admin",
    "admin dashboard",
    "admin panel",
    "administrator",
    "manage elections",
    "create election",
    "create an election",
    "add candidate",
    "add a candidate",
    "manage candidates",
];

/// Evaluated top to bottom; the first rule that admits the user and has a
/// trigger contained in the utterance wins.
pub const INTENT_TABLE: &[IntentRule] = &[
    IntentRule {
        category: Category::Admin,
        audience: Audience::AdminOnly,
        triggers: ADMIN_TRIGGERS,
    },
    IntentRule {
        category: Category::AdminRestricted,
        audience: Audience::NonAdminOnly,
        triggers: ADMIN_TRIGGERS,
    },
    IntentRule {
        category: Category::VoteChange,
        audience: Audience::Any,
        triggers: &[
            "change vote",
            "change my vote",
            "modify vote",
            "modify my vote",
            "edit my vote",
            "undo my vote",
            "cancel my vote",
            "vote again",
            "revote",
        ],
    },
    IntentRule {
        category: Category::Registration,
        audience: Audience::Any,
        triggers: &[
            "register",
            "registration",
            "sign up",
            "signup",
            "create account",
            "create an account",
            "new account",
            "verify my email",
            "verify email",
        ],
    },
    IntentRule {
        category: Category::Login,
        audience: Audience::Any,
        triggers: &[
            "login",
            "log in",
            "sign in",
            "signin",
            "logout",
            "log out",
            "password",
            "forgot password",
            "reset password",
        ],
    },
    IntentRule {
        category: Category::Security,
        audience: Audience::Any,
        triggers: &[
            "secure",
            "security",
            "safe",
            "safety",
            "privacy",
            "private",
            "encryption",
            "encrypted",
            "anonymous",
            "anonymity",
            "tamper",
            "audit",
        ],
    },
    IntentRule {
        category: Category::ElectionDuration,
        audience: Audience::Any,
        triggers: &[
            "how long",
            "duration",
            "deadline",
            "end date",
            "start date",
            "closing date",
            "how many days",
            "when does the election",
            "when do elections",
            "when does voting",
        ],
    },
    IntentRule {
        category: Category::Time,
        audience: Audience::Any,
        triggers: &[
            "what time",
            "time is it",
            "current time",
            "the time",
            "what day",
            "day is it",
            "what date",
            "the date",
            "today's date",
            "date today",
            "what's the date",
        ],
    },
    IntentRule {
        category: Category::Voting,
        audience: Audience::Any,
        triggers: &[
            "vote",
            "votes",
            "voting",
            "voted",
            "cast",
            "ballot",
            "election",
            "elections",
            "candidate",
            "candidates",
            "results",
            "poll",
            "polls",
        ],
    },
    IntentRule {
        category: Category::Thanks,
        audience: Audience::Any,
        triggers: &[
            "thank you",
            "thanks",
            "thank u",
            "thx",
            "ty",
            "appreciate",
            "appreciate it",
            "grateful",
            "cheers",
        ],
    },
    IntentRule {
        category: Category::Compliment,
        audience: Audience::Any,
        triggers: &[
            "great job",
            "good job",
            "well done",
            "nice work",
            "awesome",
            "amazing",
            "brilliant",
            "fantastic",
            "you're great",
            "you are great",
            "you're the best",
            "you are the best",
            "love you",
            "love this",
            "helpful",
        ],
    },
    IntentRule {
        category: Category::Help,
        audience: Audience::Any,
        triggers: &[
            "help",
            "hlp",
            "support",
            "assist",
            "assistance",
            "what can you do",
            "how does this work",
            "guide me",
        ],
    },
    IntentRule {
        category: Category::Identity,
        audience: Audience::Any,
        triggers: &[
            "who are you",
            "what are you",
            "your name",
            "are you a bot",
            "are you human",
            "are you real",
            "artificial intelligence",
            "ai",
            "bot",
            "chatbot",
            "robot",
        ],
    },
    IntentRule {
        category: Category::Greeting,
        audience: Audience::Any,
        triggers: &[
            "hello",
            "hi",
            "hey",
            "hiya",
            "howdy",
            "yo",
            "greetings",
            "good morning",
            "good afternoon",
            "good evening",
            "how are you",
            "what's up",
            "whats up",
        ],
    },
];

static NON_WORD: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[^\p{L}\p{Nd}'\s]+").expect("valid utterance regex"));

pub fn intent_table() -> &'static [IntentRule] {
    INTENT_TABLE
}

/// Lower-cases, folds curly apostrophes, turns every character that is not a
/// letter, digit, apostrophe or whitespace into a space and collapses runs of
/// whitespace.
pub fn normalize_utterance(input: &str) -> String {
    let folded = input.replace(['\u{2019}', '\u{2018}'], "'");
    NON_WORD
        .replace_all(&folded, " ")
        .to_lowercase()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

pub fn classify(text: &str, ctx: UserContext) -> Classification {
    classify_normalized(&normalize_utterance(text), ctx)
}

/// `normalized` must already be the output of [`normalize_utterance`].
pub fn classify_normalized(normalized: &str, ctx: UserContext) -> Classification {
    for rule in INTENT_TABLE {
        if !rule.audience.admits(ctx) {
            continue;
        }

        if let Some(phrase) = rule
            .triggers
            .iter()
            .find(|phrase| contains_phrase(normalized, phrase))
        {
            return Classification {
                category: rule.category,
                matched_phrase: Some((*phrase).to_string()),
            };
        }
    }

    Classification {
        category: Category::Fallback,
        matched_phrase: None,
    }
}

pub fn classify_category(text: &str, ctx: UserContext) -> Category {
    classify(text, ctx).category
}

fn contains_phrase(haystack: &str, phrase: &str) -> bool {
    let bytes = haystack.as_bytes();
    haystack.match_indices(phrase).any(|(start, _)| {
        let end = start + phrase.len();
        let starts_on_word = start == 0 || bytes[start - 1] == b' ';
        let ends_on_word = end == bytes.len() || bytes[end] == b' ';
        starts_on_word && ends_on_word
    })
}
