use std::collections::BTreeMap;

use crate::models::Category;

const BASE_PROMPT: &str = "You are an AI Assistant for an Online Voting System called NeuroVote. Your role is to help users with:

🎯 Voting Assistant: Help with registration, login, and vote-casting
💬 FAQ Responder: Answer common questions about the voting process
🧠 Interactive Help: Provide step-by-step guidance
🛡️ Security Advisor: Explain security features and privacy
📈 Election Summary: Provide election information and statistics
🗣️ General Conversation: Be friendly and conversational, not just functional
👨‍💼 Admin Support: Provide special assistance for administrators

IMPORTANT GUIDELINES:
- Be friendly, warm, and conversational - not just robotic
- Use emojis and clear formatting to make responses engaging
- If someone asks about non-voting topics, be helpful but gently guide them back to voting-related assistance
- For admins, provide more detailed technical and administrative support
- Never offer admin-only guidance to users who are not admins
- Keep responses concise but comprehensive
- Always maintain a helpful and positive tone
- If you don't understand something, ask for clarification or redirect to voting topics
- Be patient and understanding with users";

#[derive(Debug, Clone)]
pub struct PromptContext {
    pub category: Category,
    pub is_admin: bool,
    pub rule_reply: String,
    pub knowledge: Vec<String>,
    pub extra: BTreeMap<String, String>,
}

impl PromptContext {
    pub fn new(category: Category, is_admin: bool, rule_reply: impl Into<String>) -> Self {
        Self {
            category,
            is_admin,
            rule_reply: rule_reply.into(),
            knowledge: Vec::new(),
            extra: BTreeMap::new(),
        }
    }
}

pub fn build_system_prompt(context: &PromptContext) -> String {
    let mut prompt = String::from(BASE_PROMPT);

    prompt.push_str("\n\nCurrent Context:\n");
    prompt.push_str(&format!("- category: {}\n", context.category));
    prompt.push_str(&format!("- is_admin: {}\n", context.is_admin));
    prompt.push_str(&format!("- rule_reply: {}\n", context.rule_reply));
    for (key, value) in &context.extra {
        prompt.push_str(&format!("- {key}: {value}\n"));
    }

    if !context.knowledge.is_empty() {
        prompt.push_str("\nVoting System Knowledge:\n");
        for snippet in &context.knowledge {
            prompt.push_str(&format!("- {snippet}\n"));
        }
    }

    prompt
}
