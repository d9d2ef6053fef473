use chrono::{DateTime, TimeZone};

use crate::models::Category;

const ADMIN: &[&str] = &[
    "Welcome back, admin! 👨‍💼 From the Admin Dashboard you can create elections, add candidates and follow results in real time. What would you like to manage first?",
    "Hello, administrator! 🛠️ Need to set up a new election, manage candidates or review turnout? I can walk you through any of it.",
    "Admin mode on! 📊 Quick tips: create elections with clear start and end dates (YYYY-MM-DD HH:MM), add every candidate before voting opens, and check the results page for live counts.",
];

const ADMIN_RESTRICTED: &[&str] = &[
    "Admin tools are only available to administrator accounts. 🔒 If you need access, please contact the NeuroVote team. Meanwhile I'm happy to help you vote!",
    "That area needs admin privileges. 🛡️ Your account can still browse elections, cast votes and view results. Want help with any of those?",
];

const VOTE_CHANGE: &[&str] = &[
    "Votes cannot be changed once submitted to maintain election integrity. 🔏 Please review your choice carefully before confirming.",
    "Once a vote is cast it's final. ✅ That rule keeps every election fair, so take a moment to double-check before you confirm.",
];

const REGISTRATION: &[&str] = &[
    "To register: 1) Click 'Register' in the top navigation 2) Enter your email 3) Create a username and password 4) Verify your email 5) Start voting! 📝 Need help with any step?",
    "Joining NeuroVote takes a minute! ✨ Hit 'Register', pick a username (3-20 characters), add your email and a password of at least 6 characters, then log in.",
];

const LOGIN: &[&str] = &[
    "To log in: 1) Click 'Login' 2) Enter your username 3) Enter your password 4) Click 'Login'. 🔑 Forgot your password? Contact support.",
    "Having trouble signing in? 🔐 Double-check your username and password (they're case-sensitive). If it still fails, support can help you reset access.",
];

const SECURITY: &[&str] = &[
    "Security Features: 🔐 Advanced encryption, 🔒 Anonymous voting, 🛡️ Blockchain-style verification, 🔍 Audit trails, 🚫 No vote modification. Your vote is completely secure!",
    "Your privacy matters! 🛡️ Votes are encrypted, never linked to your personal data, and recorded with an audit trail so results stay trustworthy.",
];

const ELECTION_DURATION: &[&str] = &[
    "Election duration varies: Student Council (7-10 days) 🗓️, Department polls (3-5 days), Quick surveys (24-48 hours).",
    "Most elections run anywhere from 24 hours to 10 days. ⏳ Check each election page for its exact start and end dates.",
];

const TIME: &[&str] = &[
    "It's {time} right now. 🕒 Today is {date}. Perfect time to check the active elections!",
    "The current time is {time} ⏰ on {date}. Anything I can help you with while you're here?",
    "Right now it's {date}, {time}. 📅 Don't forget to vote before your elections close!",
];

const VOTING: &[&str] = &[
    "Voting Process: 1) Login 2) Browse active elections 3) Select an election 4) View the candidates 5) Click 'Vote for [Candidate]' 6) Confirm your choice. 🗳️ Your vote is encrypted and secure!",
    "Ready to vote? 🗳️ Open an active election, read the candidate descriptions, pick your favourite and confirm. Results update in real time!",
    "Every vote counts! ✅ Head to the home page to see which elections are open, then choose a candidate and confirm. You can follow live results afterwards.",
];

const THANKS: &[&str] = &[
    "You're very welcome! 😊 I'm happy to help. Is there anything else you'd like to know about voting or the system?",
    "Anytime! 🙌 Let me know if there's anything else I can do for you.",
    "Glad I could help! 💙 Happy voting!",
];

const COMPLIMENT: &[&str] = &[
    "Aww, thank you! 😊 You just made my day. What else can I help you with?",
    "That's so kind of you! 🌟 I'm always here to make voting easier.",
    "Thanks a lot! 🤗 Compliments like that keep my circuits happy.",
];

const HELP: &[&str] = &[
    "I'm your AI voting assistant! 🤝 I can help with: Registration, the Voting process, Security, Election info and Technical support. What do you need help with?",
    "Happy to help! 💡 Ask me how to register, how to cast a vote, how long elections run or how your vote is protected.",
];

const IDENTITY: &[&str] = &[
    "I'm an AI assistant designed specifically for NeuroVote! 🤖 I help users with voting, registration, security questions and general support.",
    "I'm the NeuroVote assistant 🤖, here to make your voting experience smooth and enjoyable.",
];

const GREETING: &[&str] = &[
    "Hello! 👋 I'm your AI assistant for NeuroVote. How can I help you today? I can assist with voting, registration, or just chat!",
    "Hi there! 😊 Welcome to NeuroVote. Looking for an election to vote in?",
    "Hey! 👋 Great to see you. Ask me anything about voting, elections or your account.",
];

const FALLBACK: &[&str] = &[
    "That's interesting! 🤔 I'm primarily here to help with voting, but I'm happy to chat. Is there anything about the voting system you'd like to know?",
    "Hmm, I'm not sure I follow. 🤔 Try asking about registration, voting, election dates or security!",
    "I may not have an answer for that one. 🙈 I'm best at questions about NeuroVote elections and your account.",
];

pub fn pool(category: Category) -> &'static [&'static str] {
    match category {
        Category::Admin => ADMIN,
        Category::AdminRestricted => ADMIN_RESTRICTED,
        Category::VoteChange => VOTE_CHANGE,
        Category::Registration => REGISTRATION,
        Category::Login => LOGIN,
        Category::Security => SECURITY,
        Category::ElectionDuration => ELECTION_DURATION,
        Category::Time => TIME,
        Category::Voting => VOTING,
        Category::Thanks => THANKS,
        Category::Compliment => COMPLIMENT,
        Category::Help => HELP,
        Category::Identity => IDENTITY,
        Category::Greeting => GREETING,
        Category::Fallback => FALLBACK,
    }
}

/// Fills `{time}` and `{date}` placeholders from `now`.
pub fn render<Tz>(template: &str, now: &DateTime<Tz>) -> String
where
    Tz: TimeZone,
    Tz::Offset: std::fmt::Display,
{
    if !template.contains('{') {
        return template.to_string();
    }

    template
        .replace("{time}", &now.format("%H:%M").to_string())
        .replace("{date}", &now.format("%A, %B %-d, %Y").to_string())
}

/// Renders `variant` of the category pool. Out-of-range variants wrap.
pub fn compose_rule_reply<Tz>(category: Category, variant: usize, now: &DateTime<Tz>) -> String
where
    Tz: TimeZone,
    Tz::Offset: std::fmt::Display,
{
    let templates = pool(category);
    render(templates[variant % templates.len()], now)
}
