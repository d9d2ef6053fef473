use std::sync::Arc;
use std::time::Instant;

use anyhow::{Context, Result};
use ballot_core::intent::classify_normalized;
use ballot_core::{
    build_system_prompt, classify, compose_rule_reply, intent_table, normalize_utterance, pool,
    AssistantConfig, Category, AssistantReply, ChatInput, Classification, ConversationSession,
    ConversationTurn, IntentRule, PromptContext, ReplySource, ResponseSelector, RetrievedChunk,
    UserContext,
};
use ballot_llm::{CompletionRequest, EscalationStatus, Escalator, HistoryMessage, Role};
use ballot_observability::AppMetrics;
use ballot_retrieval::KnowledgeBase;
use ballot_storage::SessionRepository;
use chrono::{Duration, Local, Utc};
use tracing::{info, instrument, warn};
use uuid::Uuid;

#[derive(Clone)]
pub struct AssistantAgent<S>
where
    S: SessionRepository,
{
    knowledge: Arc<KnowledgeBase>,
    selector: Arc<dyn ResponseSelector>,
    escalator: Arc<Escalator>,
    store: Arc<S>,
    metrics: Arc<AppMetrics>,
    config: AssistantConfig,
}

impl<S> AssistantAgent<S>
where
    S: SessionRepository,
{
    pub fn new(
        knowledge: Arc<KnowledgeBase>,
        escalator: Arc<Escalator>,
        store: Arc<S>,
        metrics: Arc<AppMetrics>,
        config: AssistantConfig,
    ) -> Self {
        Self {
            knowledge,
            selector: config.selection.build(),
            escalator,
            store,
            metrics,
            config,
        }
    }

    pub fn with_selector(mut self, selector: Arc<dyn ResponseSelector>) -> Self {
        self.selector = selector;
        self
    }

    #[instrument(skip(self, input), fields(is_admin = input.is_admin))]
    pub async fn handle_chat(&self, input: ChatInput) -> Result<AssistantReply> {
        let started = Instant::now();
        self.metrics.inc_request();

        let ctx = input.user_context();
        let normalized = normalize_utterance(&input.text);
        let classification = classify_normalized(&normalized, ctx);
        let category = classification.category;
        self.metrics.inc_category(category);

        let session_id = input
            .session_id
            .clone()
            .filter(|id| !id.trim().is_empty())
            .unwrap_or_else(|| Uuid::new_v4().to_string());
        let now = Utc::now();
        // an expired session not yet purged starts over
        let mut session = self
            .store
            .load_session(&session_id)
            .await
            .with_context(|| format!("failed loading session {}", session_id))?
            .filter(|session| session.expires_at > now)
            .unwrap_or_else(|| ConversationSession::new(session_id.clone(), now));

        let templates = pool(category);
        let previous = session.last_variant(category);
        let variant = self
            .selector
            .select(category, templates.len(), previous)
            .min(templates.len() - 1);
        let rule_reply = compose_rule_reply(category, variant, &Local::now());

        let mut reply_text = rule_reply.clone();
        let mut source = ReplySource::Rules;
        let mut knowledge_sources = Vec::new();

        if self.escalator.is_available() {
            let retrieved = self
                .knowledge
                .search(&input.text, self.config.knowledge_hits);
            knowledge_sources = retrieved
                .iter()
                .map(|chunk| format!("{} ({})", chunk.title, chunk.source_path))
                .collect();

            let request = self.completion_request(
                &input.text,
                ctx,
                &classification,
                &rule_reply,
                &retrieved,
                &session,
            );
            self.metrics.inc_escalation();
            match self.escalator.complete(&request).await {
                Ok(text) => {
                    reply_text = text;
                    source = ReplySource::Openai;
                }
                Err(error) => {
                    self.metrics.inc_escalation_failure();
                    warn!(
                        session_id = %session_id,
                        error = %error,
                        "escalation failed; answering from rule tables"
                    );
                }
            }
        }

        if source == ReplySource::Rules {
            self.metrics.inc_rule_reply();
        }

        self.persist_turn(
            &mut session,
            &input,
            &reply_text,
            category,
            variant,
            source,
        )
        .await?;

        self.metrics.observe_latency(started.elapsed());
        info!(
            session_id = %session_id,
            category = %category,
            variant,
            source = ?source,
            "chat handled"
        );

        Ok(AssistantReply {
            reply_text,
            category,
            variant,
            source,
            session_id,
            matched_phrase: classification.matched_phrase,
            knowledge_sources,
        })
    }

    pub fn classify(&self, text: &str, is_admin: bool) -> Classification {
        classify(text, UserContext { is_admin })
    }

    pub fn intents(&self) -> &'static [IntentRule] {
        intent_table()
    }

    pub fn kb_search(&self, query: &str, limit: usize) -> Vec<RetrievedChunk> {
        self.knowledge.search(query, limit)
    }

    pub fn knowledge(&self) -> &KnowledgeBase {
        &self.knowledge
    }

    pub fn escalation_status(&self) -> EscalationStatus {
        self.escalator.status()
    }

    pub fn escalation_model(&self) -> Option<&str> {
        self.escalator.model()
    }

    pub fn selector_name(&self) -> &'static str {
        self.selector.name()
    }

    pub async fn purge_expired_sessions(&self) -> Result<u64> {
        self.store.purge_expired(Utc::now()).await
    }

    fn completion_request(
        &self,
        text: &str,
        ctx: UserContext,
        classification: &Classification,
        rule_reply: &str,
        retrieved: &[RetrievedChunk],
        session: &ConversationSession,
    ) -> CompletionRequest {
        let mut prompt_context =
            PromptContext::new(classification.category, ctx.is_admin, rule_reply);
        prompt_context.knowledge = retrieved
            .iter()
            .map(|chunk| chunk.snippet.clone())
            .collect();
        if let Some(phrase) = &classification.matched_phrase {
            prompt_context
                .extra
                .insert("matched_phrase".to_string(), phrase.clone());
        }

        let history = session
            .recent_turns(self.config.history_turns)
            .iter()
            .flat_map(|turn| {
                [
                    HistoryMessage {
                        role: Role::User,
                        text: turn.user_text.clone(),
                    },
                    HistoryMessage {
                        role: Role::Assistant,
                        text: turn.assistant_text.clone(),
                    },
                ]
            })
            .collect();

        CompletionRequest {
            system_prompt: build_system_prompt(&prompt_context),
            history,
            user_message: text.to_string(),
        }
    }

    async fn persist_turn(
        &self,
        session: &mut ConversationSession,
        input: &ChatInput,
        assistant_text: &str,
        category: Category,
        variant: usize,
        source: ReplySource,
    ) -> Result<()> {
        session.is_admin = input.is_admin;
        if let Some(user_id) = input.user_id.as_deref() {
            session.user_id = Some(user_id.to_string());
        }
        session.expires_at = Utc::now() + Duration::hours(self.config.session_ttl_hours);
        session.turns.push(ConversationTurn {
            at: Utc::now(),
            user_text: input.text.clone(),
            assistant_text: assistant_text.to_string(),
            category,
            variant,
            source,
        });

        if session.turns.len() > self.config.max_turns {
            let keep_from = session.turns.len() - self.config.max_turns;
            session.turns = session.turns.split_off(keep_from);
        }

        self.store.upsert_session(session).await
    }
}

#[cfg(test)]
mod tests {
    use ballot_core::SelectionPolicy;
    use ballot_storage::Store;

    use super::*;

    fn agent(config: AssistantConfig) -> AssistantAgent<Store> {
        AssistantAgent::new(
            Arc::new(KnowledgeBase::builtin()),
            Arc::new(Escalator::disabled()),
            Arc::new(Store::memory()),
            AppMetrics::shared(),
            config,
        )
    }

    fn input(text: &str, is_admin: bool, session_id: Option<&str>) -> ChatInput {
        ChatInput {
            session_id: session_id.map(ToString::to_string),
            text: text.to_string(),
            is_admin,
            user_id: None,
        }
    }

    #[tokio::test]
    async fn answers_documented_scenarios_from_pools() {
        let agent = agent(AssistantConfig::default());

        for (text, is_admin, category) in [
            ("Hello", false, Category::Greeting),
            ("Thank you", false, Category::Thanks),
            ("I'm an admin", true, Category::Admin),
            ("What time is it?", false, Category::Time),
        ] {
            let reply = agent.handle_chat(input(text, is_admin, None)).await.unwrap();
            assert_eq!(reply.category, category, "{text}");
            assert_eq!(reply.source, ReplySource::Rules);
            assert!(reply.variant < pool(category).len());
            assert!(!reply.reply_text.is_empty());
            if category != Category::Time {
                assert!(pool(category).contains(&reply.reply_text.as_str()));
            }
        }
    }

    #[tokio::test]
    async fn repeated_utterance_varies_within_same_pool() {
        let agent = agent(AssistantConfig::default());
        let first = agent.handle_chat(input("Hello", false, Some("s1"))).await.unwrap();
        let second = agent.handle_chat(input("Hello", false, Some("s1"))).await.unwrap();

        assert_eq!(first.category, Category::Greeting);
        assert_eq!(second.category, Category::Greeting);
        assert_ne!(first.variant, second.variant);
        assert!(pool(Category::Greeting).contains(&second.reply_text.as_str()));
    }

    #[tokio::test]
    async fn session_keeps_only_latest_turns() {
        let config = AssistantConfig {
            max_turns: 3,
            ..AssistantConfig::default()
        }
        .with_selection(SelectionPolicy::First);
        let agent = agent(config);

        for _ in 0..5 {
            agent.handle_chat(input("thanks", false, Some("s2"))).await.unwrap();
        }
        let session = agent.store.load_session("s2").await.unwrap().unwrap();
        assert_eq!(session.turns.len(), 3);
        assert!(session.turns.iter().all(|turn| turn.variant == 0));
    }

    #[tokio::test]
    async fn non_admin_gets_restricted_pool() {
        let agent = agent(AssistantConfig::default());
        let reply = agent.handle_chat(input("Admin dashboard", false, None)).await.unwrap();
        assert_eq!(reply.category, Category::AdminRestricted);
        assert!(pool(Category::AdminRestricted).contains(&reply.reply_text.as_str()));
    }

    #[tokio::test]
    async fn generates_session_id_when_missing() {
        let agent = agent(AssistantConfig::default());
        let reply = agent.handle_chat(input("hi", false, Some("  "))).await.unwrap();
        assert!(Uuid::parse_str(&reply.session_id).is_ok());
        assert_eq!(agent.escalation_status(), EscalationStatus::DisabledMissingKey);
        assert_eq!(agent.purge_expired_sessions().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn expired_session_starts_over() {
        let agent = agent(AssistantConfig::default());
        let mut stale = ConversationSession::new("old", Utc::now() - Duration::hours(48));
        stale.turns.push(ConversationTurn {
            at: Utc::now() - Duration::hours(72),
            user_text: "Hello".to_string(),
            assistant_text: "Hi there!".to_string(),
            category: Category::Greeting,
            variant: 0,
            source: ReplySource::Rules,
        });
        agent.store.upsert_session(&stale).await.unwrap();

        let reply = agent.handle_chat(input("Hello", false, Some("old"))).await.unwrap();
        assert_eq!(reply.session_id, "old");

        let session = agent.store.load_session("old").await.unwrap().unwrap();
        assert_eq!(session.turns.len(), 1);
        assert!(session.expires_at > Utc::now());
    }

    #[tokio::test]
    async fn stores_what_the_user_typed() {
        let agent = agent(AssistantConfig::default());
        agent
            .handle_chat(input("Hello, NeuroVote! 👋", false, Some("raw")))
            .await
            .unwrap();

        let session = agent.store.load_session("raw").await.unwrap().unwrap();
        assert_eq!(session.turns[0].user_text, "Hello, NeuroVote! 👋");
    }
}
