//! Session Orchestrator
//!
//! Drives one turn end to end:
//!
//! ```text
//! resolve session ─▶ bootstrap / update conversation entry ─▶ assemble prompt
//!        ─▶ model ─▶ parse directive ─▶ result cache / tool provider
//!        ─▶ follow-up ─▶ history + caches
//! ```
//!
//! `turn_count == 0` is the only first-turn signal. Runtime failures (model
//! down, tool timeout, bad directive) end up in [`TurnOutcome::degraded`];
//! `process_turn` itself only fails on invalid input.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use serde::Serialize;

use crate::cache::{CacheKey, CacheStats, Sweep, TtlCache, ToolResultCache};
use crate::config::AnalystConfig;
use crate::conversation::{
    ConversationCache, ConversationEntry, DiversitySelector, Intent, IntentClassifier,
    extract_entities,
};
use crate::directive::{DirectiveError, ParseOutcome, ToolCallParser};
use crate::error::{AnalystError, Result};
use crate::message::Message;
use crate::persona::PersonaSource;
use crate::prompt::{AssembledPrompt, PromptAssembler, PromptMode};
use crate::provider::{GenerationOptions, LlmProvider};
use crate::session::{Session, SessionId, SessionStore};
use crate::sink::{self, InvocationEvent, InvocationSink, ToolInvocation};
use crate::tool::{ToolCall, ToolCategory, ToolProvider, ToolResult, ToolSchema};

const FALLBACK_REPLY: &str =
    "I'm not sure how to help with that. Ask me about an address, a transaction or gas prices.";

/// One inbound user message
#[derive(Clone, Debug, Default)]
pub struct TurnRequest {
    pub session_id: Option<SessionId>,
    pub user_id: Option<String>,
    pub persona_id: Option<String>,
    pub text: String,
}

impl TurnRequest {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            ..Default::default()
        }
    }

    #[must_use]
    pub fn in_session(mut self, id: SessionId) -> Self {
        self.session_id = Some(id);
        self
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DegradationKind {
    /// The query needed data but the model answered without a valid directive
    NoToolCallDetected,
    /// The tool provider failed or timed out
    ToolExecution,
    /// The tool ran but returned nothing
    EmptyResult,
    /// The model failed or timed out
    ModelUnavailable,
}

/// Why a turn fell back to a template reply
#[derive(Clone, Debug, Serialize)]
pub struct Degradation {
    pub kind: DegradationKind,
    pub detail: String,
}

impl Degradation {
    fn new(kind: DegradationKind, detail: impl Into<String>) -> Self {
        Self {
            kind,
            detail: detail.into(),
        }
    }
}

/// Result of one turn
#[derive(Clone, Debug, Serialize)]
pub struct TurnOutcome {
    pub session_id: SessionId,
    pub reply: String,
    pub tools_invoked: Vec<ToolInvocation>,
    pub mode: PromptMode,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub degraded: Option<Degradation>,
}

/// Live counts and cache counters
#[derive(Clone, Debug, Serialize)]
pub struct OrchestratorStats {
    pub sessions: usize,
    pub conversations: usize,
    pub tool_results: CacheStats,
    pub result_cache_degraded: bool,
}

/// Turn state machine and session lifecycle
pub struct SessionOrchestrator {
    model: Arc<dyn LlmProvider>,
    tools: Arc<dyn ToolProvider>,
    personas: Arc<dyn PersonaSource>,
    sinks: Vec<Arc<dyn InvocationSink>>,
    sessions: Arc<SessionStore>,
    conversations: Arc<ConversationCache>,
    results: Arc<ToolResultCache>,
    classifier: IntentClassifier,
    selector: DiversitySelector,
    assembler: PromptAssembler,
    config: AnalystConfig,
}

impl SessionOrchestrator {
    pub fn builder(config: AnalystConfig) -> OrchestratorBuilder {
        OrchestratorBuilder::new(config)
    }

    /// Process one user turn
    pub async fn process_turn(&self, request: TurnRequest) -> Result<TurnOutcome> {
        let text = request.text.trim();
        if text.is_empty() {
            return Err(AnalystError::Other("empty message".into()));
        }

        let mut session = self
            .sessions
            .resolve(request.session_id.as_ref(), request.user_id.as_deref());
        if request.persona_id.is_some() {
            session.persona_id.clone_from(&request.persona_id);
        }

        let first_turn = session.is_first_turn();
        let catalog = self.tools.catalog();
        let entry = self.load_entry(&session, text, first_turn);
        let persona = self.persona_text(session.persona_id.as_deref()).await;

        let prompt = if first_turn {
            self.assembler.full(&persona, &catalog)
        } else {
            let offered = self.selector.select(&entry, &catalog);
            self.assembler.compressed(&persona, &catalog, &offered, &entry)
        };

        tracing::debug!(
            session = %session.id,
            turn = session.turn_count,
            mode = %prompt.mode,
            intent = %entry.current_intent,
            offered = ?prompt.offered_tools,
            "Prompt assembled"
        );

        let mut turn = TurnState {
            entry,
            tools_invoked: Vec::new(),
            degraded: None,
        };
        let reply = self.run_model(&session, &prompt, &catalog, &persona, text, &mut turn).await;

        if let Some(degraded) = &turn.degraded {
            tracing::warn!(
                session = %session.id,
                kind = ?degraded.kind,
                detail = %degraded.detail,
                "Degraded turn"
            );
        }

        session.record_exchange(Message::user(text), Message::assistant(reply.clone()));
        let session_id = session.id.clone();
        self.conversations.put(session_id.clone(), turn.entry);
        self.sessions.put(session_id.clone(), session);

        Ok(TurnOutcome {
            session_id,
            reply,
            tools_invoked: turn.tools_invoked,
            mode: prompt.mode,
            degraded: turn.degraded,
        })
    }

    /// Remove a session and its conversation state
    pub fn end_session(&self, id: &SessionId) -> bool {
        let removed = self.sessions.remove(id).is_some();
        self.conversations.remove(id);
        if removed {
            tracing::info!(session = %id, "Session ended");
        }
        removed
    }

    /// Caches the background sweeper walks
    pub fn sweep_targets(&self) -> Vec<Arc<dyn Sweep>> {
        vec![
            self.sessions.clone() as Arc<dyn Sweep>,
            self.conversations.clone() as Arc<dyn Sweep>,
            self.results.clone() as Arc<dyn Sweep>,
        ]
    }

    pub fn stats(&self) -> OrchestratorStats {
        OrchestratorStats {
            sessions: self.sessions.len(),
            conversations: self.conversations.len(),
            tool_results: self.results.stats(),
            result_cache_degraded: self.results.is_degraded(),
        }
    }

    pub fn sessions(&self) -> &SessionStore {
        &self.sessions
    }

    pub const fn config(&self) -> &AnalystConfig {
        &self.config
    }

    fn load_entry(&self, session: &Session, text: &str, first_turn: bool) -> ConversationEntry {
        let limits = self.conversations.limits();
        if first_turn {
            return ConversationEntry::bootstrap(text, &self.classifier, limits);
        }

        match self.conversations.get(&session.id) {
            Some(mut entry) => {
                entry.observe_query(text, &self.classifier);
                entry
            }
            None => {
                tracing::info!(
                    session = %session.id,
                    "Conversation entry evicted, rebuilding from current turn"
                );
                ConversationEntry::bootstrap(text, &self.classifier, limits)
            }
        }
    }

    /// Persona text, falling back to the default persona then the configured text
    async fn persona_text(&self, requested: Option<&str>) -> String {
        let default_id = self.config.persona.default_id.as_str();
        let id = requested.unwrap_or(default_id);

        match self.personas.persona(id).await {
            Ok(persona) => return persona.full_text,
            Err(e) => {
                tracing::warn!(persona = %id, error = %e, "Persona unavailable, using default");
            }
        }

        if id != default_id {
            if let Ok(persona) = self.personas.persona(default_id).await {
                return persona.full_text;
            }
        }
        self.config.persona.fallback_text.clone()
    }

    async fn run_model(
        &self,
        session: &Session,
        prompt: &AssembledPrompt,
        catalog: &[ToolSchema],
        persona: &str,
        text: &str,
        turn: &mut TurnState,
    ) -> String {
        let mut messages = vec![Message::system(prompt.instructions.clone())];
        match prompt.mode {
            PromptMode::Full => messages.extend(session.history.to_vec()),
            PromptMode::Compressed => {
                let history = self
                    .assembler
                    .compressed_history(&session.history, &turn.entry.aliases);
                messages.extend(history);
            }
        }
        messages.push(Message::user(text));

        let options = self.config.model.generation_options();
        let completion = match self.complete(&messages, &options).await {
            Ok(content) => content,
            Err(e) => {
                turn.degrade(DegradationKind::ModelUnavailable, e.to_string());
                return e.user_message();
            }
        };

        let parser = ToolCallParser::new(&prompt.offered_tools, catalog, &turn.entry.aliases);
        let parsed = parser.parse(&completion);
        match parsed {
            ParseOutcome::Valid { call, .. } => {
                self.run_tool(session, call, catalog, persona, text, turn).await
            }
            ParseOutcome::Invalid { error, prose } => {
                let fragment = match &error {
                    DirectiveError::Parse { fragment, .. } => fragment.as_str(),
                    _ => "",
                };
                tracing::warn!(
                    session = %session.id,
                    error = %error,
                    fragment = %fragment,
                    "Invalid tool directive"
                );
                self.prose_reply(text, prose, Some(error.to_string()), turn)
            }
            ParseOutcome::NoDirective { prose } => self.prose_reply(text, prose, None, turn),
        }
    }

    /// Reply when no call executes. A query that looks like it needed data
    /// is reported as `NoToolCallDetected`.
    fn prose_reply(
        &self,
        text: &str,
        prose: String,
        directive_error: Option<String>,
        turn: &mut TurnState,
    ) -> String {
        let needs_tool =
            self.classifier.classify(text) != Intent::Generic || !extract_entities(text).is_empty();

        if needs_tool {
            let detail =
                directive_error.unwrap_or_else(|| "model answered without a tool call".into());
            turn.degrade(DegradationKind::NoToolCallDetected, detail);
        }

        if prose.is_empty() {
            if needs_tool {
                AnalystError::NoToolCallDetected.user_message()
            } else {
                FALLBACK_REPLY.to_string()
            }
        } else {
            prose
        }
    }

    async fn run_tool(
        &self,
        session: &Session,
        call: ToolCall,
        catalog: &[ToolSchema],
        persona: &str,
        text: &str,
        turn: &mut TurnState,
    ) -> String {
        let category = catalog
            .iter()
            .find(|t| t.name == call.name)
            .map_or(ToolCategory::General, |t| t.category);
        let key = CacheKey::for_call(&call.name, &call.arguments);

        let (result, cached) = match self.execute(&call, &key, category).await {
            Ok(done) => done,
            Err(e) => {
                turn.degrade(DegradationKind::ToolExecution, e.to_string());
                return e.user_message();
            }
        };

        let invocation = ToolInvocation {
            tool: call.name.clone(),
            arguments: call.arguments.clone(),
            result: result.clone(),
            cached,
        };
        sink::dispatch(
            &self.sinks,
            &InvocationEvent {
                session_id: session.id.clone(),
                user_id: session.user_id.clone(),
                invocation: invocation.clone(),
                at: Utc::now(),
            },
            Duration::from_secs(self.config.tools.sink_timeout_secs),
        );
        turn.tools_invoked.push(invocation);

        if !result.success {
            let err = AnalystError::ToolExecution {
                tool: call.name.clone(),
                message: result.output.clone(),
            };
            turn.degrade(DegradationKind::ToolExecution, err.to_string());
            return err.user_message();
        }

        if result.is_empty() {
            turn.degrade(
                DegradationKind::EmptyResult,
                format!("{} returned no data", call.name),
            );
            return format!("No data was returned by {} for that request.", call.name);
        }

        // only real data feeds the carry-forward state
        turn.entry.record_tool_use(&call, &key, &result);

        let messages = self.assembler.follow_up(persona, text, &call, &result);
        let raw_result = || format!("Here is what {} returned:\n{}", call.name, result.output);
        let options = self.config.model.follow_up_options();
        let reply = match self.complete(&messages, &options).await {
            Ok(reply) => reply,
            Err(e) => {
                // the raw result is still real data; only the phrasing is lost
                turn.degrade(DegradationKind::ModelUnavailable, e.to_string());
                return raw_result();
            }
        };

        // no tools are offered for the follow-up, so any directive is stripped
        let parsed = ToolCallParser::new(&[], catalog, &turn.entry.aliases).parse(&reply);
        if !matches!(parsed, ParseOutcome::NoDirective { .. }) {
            tracing::warn!(session = %session.id, "Follow-up answered with a tool directive");
        }
        let prose = parsed.prose().trim();
        if prose.is_empty() {
            turn.degrade(DegradationKind::ModelUnavailable, "follow-up carried no prose");
            return raw_result();
        }
        prose.to_string()
    }

    /// Cached result, or a provider call under the tool timeout
    async fn execute(
        &self,
        call: &ToolCall,
        key: &CacheKey,
        category: ToolCategory,
    ) -> Result<(ToolResult, bool)> {
        if let Some(result) = self.results.lookup(key) {
            return Ok((result, true));
        }

        let budget = Duration::from_secs(self.config.tools.timeout_secs);
        let result = match tokio::time::timeout(budget, self.tools.invoke(call)).await {
            Ok(Ok(result)) => result,
            Ok(Err(e)) => {
                return Err(AnalystError::ToolExecution {
                    tool: call.name.clone(),
                    message: e.to_string(),
                });
            }
            Err(_) => {
                return Err(AnalystError::ToolExecution {
                    tool: call.name.clone(),
                    message: format!("timed out after {}s", budget.as_secs()),
                });
            }
        };

        tracing::debug!(
            tool = %call.name,
            key = %key.short(),
            success = result.success,
            "Tool executed"
        );
        self.results.store(key.clone(), category, &result);
        Ok((result, false))
    }

    async fn complete(&self, messages: &[Message], options: &GenerationOptions) -> Result<String> {
        let budget = Duration::from_secs(self.config.model.timeout_secs);
        match tokio::time::timeout(budget, self.model.complete(messages, options)).await {
            Ok(Ok(completion)) => Ok(completion.content),
            Ok(Err(e)) => Err(AnalystError::ModelUnavailable(e.to_string())),
            Err(_) => Err(AnalystError::ModelUnavailable(format!(
                "{} timed out after {}s",
                self.model.name(),
                budget.as_secs()
            ))),
        }
    }
}

/// Mutable state threaded through one turn
struct TurnState {
    entry: ConversationEntry,
    tools_invoked: Vec<ToolInvocation>,
    degraded: Option<Degradation>,
}

impl TurnState {
    fn degrade(&mut self, kind: DegradationKind, detail: impl Into<String>) {
        self.degraded = Some(Degradation::new(kind, detail));
    }
}

/// Builder for [`SessionOrchestrator`]
pub struct OrchestratorBuilder {
    config: AnalystConfig,
    model: Option<Arc<dyn LlmProvider>>,
    tools: Option<Arc<dyn ToolProvider>>,
    personas: Option<Arc<dyn PersonaSource>>,
    results: Option<Arc<ToolResultCache>>,
    sinks: Vec<Arc<dyn InvocationSink>>,
}

impl OrchestratorBuilder {
    pub fn new(config: AnalystConfig) -> Self {
        Self {
            config,
            model: None,
            tools: None,
            personas: None,
            results: None,
            sinks: Vec::new(),
        }
    }

    #[must_use]
    pub fn model(mut self, model: Arc<dyn LlmProvider>) -> Self {
        self.model = Some(model);
        self
    }

    #[must_use]
    pub fn tools(mut self, tools: Arc<dyn ToolProvider>) -> Self {
        self.tools = Some(tools);
        self
    }

    #[must_use]
    pub fn personas(mut self, personas: Arc<dyn PersonaSource>) -> Self {
        self.personas = Some(personas);
        self
    }

    /// Replace the default in-memory result cache
    #[must_use]
    pub fn result_cache(mut self, results: Arc<ToolResultCache>) -> Self {
        self.results = Some(results);
        self
    }

    #[must_use]
    pub fn sink(mut self, sink: Arc<dyn InvocationSink>) -> Self {
        self.sinks.push(sink);
        self
    }

    pub fn build(self) -> Result<SessionOrchestrator> {
        self.config.validate()?;

        let model = self
            .model
            .ok_or_else(|| AnalystError::Config("model provider is required".into()))?;
        let tools = self
            .tools
            .ok_or_else(|| AnalystError::Config("tool provider is required".into()))?;
        let personas = self
            .personas
            .ok_or_else(|| AnalystError::Config("persona source is required".into()))?;
        let results = self
            .results
            .unwrap_or_else(|| Arc::new(ToolResultCache::in_memory(&self.config.cache)));

        Ok(SessionOrchestrator {
            model,
            tools,
            personas,
            sinks: self.sinks,
            sessions: Arc::new(SessionStore::new(&self.config.session)),
            conversations: Arc::new(ConversationCache::new(&self.config.session)),
            results,
            classifier: IntentClassifier::new(&self.config.intents),
            selector: DiversitySelector::new(self.config.diversity.clone()),
            assembler: PromptAssembler::new(self.config.session.compressed_history_window),
            config: self.config,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::persona::{Persona, StaticPersonaSource};
    use crate::testing::{ADDR, Behavior, CountingTools, Reply, ScriptedModel};

    const PERSONA: &str = "You are a blockchain analyst. Report figures exactly.";

    struct Harness {
        model: Arc<ScriptedModel>,
        tools: Arc<CountingTools>,
        orchestrator: SessionOrchestrator,
    }

    fn harness(replies: Vec<Reply>) -> Harness {
        harness_with(AnalystConfig::default(), replies)
    }

    fn harness_with(config: AnalystConfig, replies: Vec<Reply>) -> Harness {
        let model = Arc::new(ScriptedModel::new(replies));
        let tools = Arc::new(CountingTools::new());
        let personas = StaticPersonaSource::new().with("analyst", Persona::new(PERSONA));
        let orchestrator = SessionOrchestrator::builder(config)
            .model(model.clone())
            .tools(tools.clone())
            .personas(Arc::new(personas))
            .build()
            .unwrap();
        Harness {
            model,
            tools,
            orchestrator,
        }
    }

    fn balance_directive(address: &str) -> Reply {
        Reply::text(format!("TOOL_CALL: get_balance {{\"address\": \"{address}\"}}"))
    }

    #[tokio::test]
    async fn test_scenario_a_first_turn_balance() {
        let h = harness(vec![balance_directive(ADDR), Reply::text("The wallet holds 1.5 ETH.")]);

        let outcome = h
            .orchestrator
            .process_turn(TurnRequest::new(format!("balance of {ADDR}")))
            .await
            .unwrap();

        assert_eq!(outcome.mode, PromptMode::Full);
        assert!(outcome.degraded.is_none());
        assert_eq!(outcome.reply, "The wallet holds 1.5 ETH.");
        assert_eq!(h.tools.count("get_balance"), 1);
        assert_eq!(outcome.tools_invoked.len(), 1);
        assert!(!outcome.tools_invoked[0].cached);
        assert_eq!(outcome.tools_invoked[0].arguments["address"], ADDR);

        // full catalog offered, core tools included
        let instructions = h.model.instructions(0);
        for core in [
            "get_balance",
            "get_gas_price",
            "get_transaction",
            "get_transaction_history",
            "get_contract_abi",
        ] {
            assert!(instructions.contains(core), "missing {core}");
        }
        assert!(instructions.contains(PERSONA));

        // follow-up sees the result, not the catalog
        let follow_up = &h.model.requests()[1];
        assert!(!follow_up[0].content.contains("Available tools"));
        assert!(follow_up.iter().any(|m| m.content.contains("1.5 ETH")));

        assert_eq!(h.orchestrator.stats().tool_results.entries, 1);
    }

    #[tokio::test]
    async fn test_scenario_b_gas_after_balance_stays_available() {
        let h = harness(vec![
            balance_directive(ADDR),
            Reply::text("1.5 ETH."),
            Reply::text("TOOL_CALL: get_gas_price {}"),
            Reply::text("Gas is 12 gwei."),
        ]);

        let first = h
            .orchestrator
            .process_turn(TurnRequest::new(format!("balance of {ADDR}")))
            .await
            .unwrap();
        let second = h
            .orchestrator
            .process_turn(
                TurnRequest::new("what about gas now?").in_session(first.session_id.clone()),
            )
            .await
            .unwrap();

        assert_eq!(second.mode, PromptMode::Compressed);
        assert!(second.degraded.is_none());
        assert_eq!(second.reply, "Gas is 12 gwei.");
        assert_eq!(h.tools.count("get_gas_price"), 1);

        let instructions = h.model.instructions(2);
        assert!(instructions.contains("- get_gas_price("));
        assert!(instructions.contains("addr1"));
        assert!(instructions.contains("get_balance: Balance: 1.5 ETH"));
        // compressed mode never carries the whole catalog
        assert!(!instructions.contains("get_contract_abi"));
    }

    #[tokio::test]
    async fn test_scenario_c_misspelled_tool_degrades_and_session_survives() {
        let h = harness(vec![
            Reply::text(format!("TOOL_CALL: get_balanse {{\"address\": \"{ADDR}\"}}")),
            balance_directive("addr1"),
            Reply::text("1.5 ETH."),
        ]);

        let first = h
            .orchestrator
            .process_turn(TurnRequest::new(format!("balance of {ADDR}")))
            .await
            .unwrap();
        let degraded = first.degraded.clone().unwrap();
        assert_eq!(degraded.kind, DegradationKind::NoToolCallDetected);
        assert!(degraded.detail.contains("get_balanse"));
        assert!(!first.reply.contains("TOOL_CALL"));
        assert!(first.tools_invoked.is_empty());
        assert_eq!(h.tools.calls().len(), 0);

        let second = h
            .orchestrator
            .process_turn(TurnRequest::new("try again please").in_session(first.session_id.clone()))
            .await
            .unwrap();
        assert_eq!(second.mode, PromptMode::Compressed);
        assert!(second.degraded.is_none());
        assert_eq!(h.tools.count("get_balance"), 1);
    }

    #[tokio::test]
    async fn test_scenario_d_identical_requests_hit_the_cache() {
        let h = harness(vec![
            balance_directive(ADDR),
            Reply::text("1.5 ETH."),
            balance_directive(ADDR),
            Reply::text("Still 1.5 ETH."),
        ]);

        let first = h
            .orchestrator
            .process_turn(TurnRequest::new(format!("balance of {ADDR}")))
            .await
            .unwrap();
        let second = h
            .orchestrator
            .process_turn(
                TurnRequest::new(format!("balance of {ADDR} again")).in_session(first.session_id),
            )
            .await
            .unwrap();

        assert_eq!(h.tools.count("get_balance"), 1);
        assert!(second.tools_invoked[0].cached);
        assert_eq!(second.tools_invoked[0].result, first.tools_invoked[0].result);
        assert_eq!(h.orchestrator.stats().tool_results.hits, 1);
    }

    #[tokio::test]
    async fn test_first_turn_semantics_happen_exactly_once() {
        let h = harness(vec![
            Reply::text("Hello."),
            Reply::text("Hi again."),
            Reply::text("Still here."),
        ]);

        let first = h.orchestrator.process_turn(TurnRequest::new("hi")).await.unwrap();
        let id = first.session_id.clone();
        let second = h
            .orchestrator
            .process_turn(TurnRequest::new("hey").in_session(id.clone()))
            .await
            .unwrap();
        let third = h
            .orchestrator
            .process_turn(TurnRequest::new("yo").in_session(id.clone()))
            .await
            .unwrap();

        assert_eq!(first.mode, PromptMode::Full);
        assert_eq!(second.mode, PromptMode::Compressed);
        assert_eq!(third.mode, PromptMode::Compressed);
        assert_eq!(h.orchestrator.sessions().get(&id).unwrap().turn_count, 6);

        // a new session id starts over with full mode
        let other = h
            .orchestrator
            .process_turn(TurnRequest::new("hello").in_session(SessionId::from_string("fresh")))
            .await
            .unwrap();
        assert_eq!(other.mode, PromptMode::Full);
        assert_eq!(other.session_id.as_str(), "fresh");
    }

    #[tokio::test]
    async fn test_alias_from_turn_one_resolves_in_turn_two() {
        let h = harness(vec![
            Reply::text("Which chain do you mean?"),
            balance_directive("addr1"),
            Reply::text("1.5 ETH."),
        ]);

        let first = h
            .orchestrator
            .process_turn(TurnRequest::new(format!("tell me about {ADDR}")))
            .await
            .unwrap();
        h.orchestrator
            .process_turn(TurnRequest::new("ethereum, its balance").in_session(first.session_id))
            .await
            .unwrap();

        let calls = h.tools.calls();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].str_arg("address"), Some(ADDR));
    }

    #[tokio::test]
    async fn test_catalog_tool_outside_diversity_set_is_rejected() {
        let h = harness(vec![
            Reply::text("Hello."),
            Reply::text(format!(
                "TOOL_CALL: get_contract_abi {{\"contract_address\": \"0x{}\"}}",
                "1".repeat(40)
            )),
        ]);

        let first = h.orchestrator.process_turn(TurnRequest::new("hi")).await.unwrap();
        let second = h
            .orchestrator
            .process_turn(TurnRequest::new("what about gas now?").in_session(first.session_id))
            .await
            .unwrap();

        assert_eq!(h.tools.calls().len(), 0);
        assert_eq!(second.degraded.unwrap().kind, DegradationKind::NoToolCallDetected);
    }

    #[tokio::test]
    async fn test_evicted_entry_is_rebuilt_in_compressed_mode() {
        let h = harness(vec![Reply::text("Hello."), Reply::text("Gas is low.")]);
        let first = h.orchestrator.process_turn(TurnRequest::new("hi")).await.unwrap();

        h.orchestrator.conversations.remove(&first.session_id);
        let second = h
            .orchestrator
            .process_turn(TurnRequest::new("gas?").in_session(first.session_id))
            .await
            .unwrap();
        assert_eq!(second.mode, PromptMode::Compressed);
    }

    #[tokio::test]
    async fn test_empty_result_never_reaches_the_model() {
        let h = harness(vec![balance_directive(ADDR)]);
        h.tools.set("get_balance", Behavior::Empty);

        let outcome = h
            .orchestrator
            .process_turn(TurnRequest::new(format!("balance of {ADDR}")))
            .await
            .unwrap();

        assert!(outcome.reply.contains("No data"));
        assert_eq!(outcome.degraded.unwrap().kind, DegradationKind::EmptyResult);
        assert_eq!(h.model.requests().len(), 1);
    }

    #[tokio::test]
    async fn test_failed_tool_is_retried_next_time() {
        let h = harness(vec![
            balance_directive(ADDR),
            balance_directive(ADDR),
            Reply::text("1.5 ETH."),
        ]);
        h.tools.set("get_balance", Behavior::Fail("rpc returned 502".into()));

        let first = h
            .orchestrator
            .process_turn(TurnRequest::new(format!("balance of {ADDR}")))
            .await
            .unwrap();
        assert_eq!(first.degraded.unwrap().kind, DegradationKind::ToolExecution);
        assert!(!first.reply.contains("502"));

        h.tools.set(
            "get_balance",
            Behavior::Ok {
                output: "Balance: 1.5 ETH".into(),
                data: serde_json::json!({"balance_eth": "1.5"}),
            },
        );
        let second = h
            .orchestrator
            .process_turn(
                TurnRequest::new(format!("balance of {ADDR}")).in_session(first.session_id),
            )
            .await
            .unwrap();
        assert!(second.degraded.is_none());
        assert_eq!(h.tools.count("get_balance"), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_tool_timeout_is_structured_error() {
        let h = harness(vec![balance_directive(ADDR)]);
        h.tools.set("get_balance", Behavior::Hang);

        let outcome = h
            .orchestrator
            .process_turn(TurnRequest::new(format!("balance of {ADDR}")))
            .await
            .unwrap();

        let degraded = outcome.degraded.unwrap();
        assert_eq!(degraded.kind, DegradationKind::ToolExecution);
        assert!(degraded.detail.contains("timed out"));
        assert!(!outcome.reply.contains("ETH"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_model_timeout_falls_back_to_template() {
        let h = harness(vec![Reply::Hang]);

        let outcome = h.orchestrator.process_turn(TurnRequest::new("gas?")).await.unwrap();
        assert_eq!(outcome.degraded.unwrap().kind, DegradationKind::ModelUnavailable);
        assert_eq!(outcome.reply, AnalystError::ModelUnavailable(String::new()).user_message());

        // the session still advanced
        assert_eq!(h.orchestrator.sessions().get(&outcome.session_id).unwrap().turn_count, 2);
    }

    #[tokio::test]
    async fn test_prose_for_chit_chat_is_not_degraded() {
        let h = harness(vec![Reply::text("Hello! Ask me about any wallet.")]);
        let outcome = h.orchestrator.process_turn(TurnRequest::new("hello there")).await.unwrap();
        assert!(outcome.degraded.is_none());
        assert_eq!(outcome.reply, "Hello! Ask me about any wallet.");
    }

    #[tokio::test]
    async fn test_unknown_persona_falls_back_to_default() {
        let h = harness(vec![Reply::text("Hi.")]);
        let request = TurnRequest {
            persona_id: Some("pirate".into()),
            ..TurnRequest::new("hello")
        };
        h.orchestrator.process_turn(request).await.unwrap();
        assert!(h.model.instructions(0).contains(PERSONA));
    }

    #[tokio::test]
    async fn test_end_session_forgets_state() {
        let h = harness(vec![Reply::text("Hi."), Reply::text("Hi again.")]);
        let first = h.orchestrator.process_turn(TurnRequest::new("hello")).await.unwrap();

        assert!(h.orchestrator.end_session(&first.session_id));
        let again = h
            .orchestrator
            .process_turn(TurnRequest::new("hello").in_session(first.session_id))
            .await
            .unwrap();
        assert_eq!(again.mode, PromptMode::Full);
    }

    #[test]
    fn test_builder_requires_collaborators() {
        assert!(matches!(
            SessionOrchestrator::builder(AnalystConfig::default()).build(),
            Err(AnalystError::Config(_))
        ));
    }

    #[tokio::test]
    async fn test_empty_message_is_rejected() {
        let h = harness(vec![]);
        assert!(h.orchestrator.process_turn(TurnRequest::new("   ")).await.is_err());
    }

    #[tokio::test]
    async fn test_follow_up_directive_is_never_the_reply() {
        let h = harness(vec![balance_directive(ADDR), Reply::text("TOOL_CALL: get_gas_price {}")]);

        let outcome = h
            .orchestrator
            .process_turn(TurnRequest::new(format!("balance of {ADDR}")))
            .await
            .unwrap();

        assert!(!outcome.reply.contains("TOOL_CALL"));
        assert!(outcome.reply.starts_with("Here is what get_balance returned:"));
        assert!(outcome.reply.contains("1.5 ETH"));
        assert_eq!(outcome.degraded.unwrap().kind, DegradationKind::ModelUnavailable);
        assert_eq!(h.tools.count("get_gas_price"), 0);
    }

    #[tokio::test]
    async fn test_follow_up_prose_around_a_directive_is_kept() {
        let h = harness(vec![
            balance_directive(ADDR),
            Reply::text("The wallet holds 1.5 ETH.\nTOOL_CALL: get_gas_price {}"),
        ]);

        let outcome = h
            .orchestrator
            .process_turn(TurnRequest::new(format!("balance of {ADDR}")))
            .await
            .unwrap();

        assert_eq!(outcome.reply, "The wallet holds 1.5 ETH.");
        assert!(outcome.degraded.is_none());
        assert_eq!(h.tools.count("get_gas_price"), 0);
    }

    #[tokio::test]
    async fn test_failed_follow_up_returns_raw_result() {
        let h = harness(vec![balance_directive(ADDR), Reply::Fail]);

        let outcome = h
            .orchestrator
            .process_turn(TurnRequest::new(format!("balance of {ADDR}")))
            .await
            .unwrap();

        assert!(outcome.reply.starts_with("Here is what get_balance returned:"));
        assert!(outcome.reply.contains("Balance: 1.5 ETH"));
        assert_eq!(outcome.degraded.unwrap().kind, DegradationKind::ModelUnavailable);
    }

    #[tokio::test]
    async fn test_failed_tool_output_stays_out_of_recent_tools() {
        let h = harness(vec![balance_directive(ADDR)]);
        h.tools.set("get_balance", Behavior::Fail("rpc returned 502".into()));

        let first = h
            .orchestrator
            .process_turn(TurnRequest::new(format!("balance of {ADDR}")))
            .await
            .unwrap();
        assert_eq!(first.degraded.unwrap().kind, DegradationKind::ToolExecution);

        h.model.push(Reply::text("TOOL_CALL: get_gas_price {}"));
        h.model.push(Reply::text("Gas is 12 gwei."));
        let second = h
            .orchestrator
            .process_turn(TurnRequest::new("and gas?").in_session(first.session_id))
            .await
            .unwrap();
        assert!(second.degraded.is_none());

        let instructions = h.model.instructions(1);
        assert!(!instructions.contains("502"));
        assert!(instructions.contains("Recent tools: none"));
    }

    #[tokio::test]
    async fn test_provider_error_degrades_and_is_not_cached() {
        let h = harness(vec![balance_directive(ADDR)]);
        h.tools.set("get_balance", Behavior::Error);

        let outcome = h
            .orchestrator
            .process_turn(TurnRequest::new(format!("balance of {ADDR}")))
            .await
            .unwrap();

        let degraded = outcome.degraded.unwrap();
        assert_eq!(degraded.kind, DegradationKind::ToolExecution);
        assert!(degraded.detail.contains("get_balance unavailable"));
        assert!(!outcome.reply.contains("unavailable"));
        assert_eq!(h.orchestrator.stats().tool_results.entries, 0);
        assert_eq!(h.model.requests().len(), 1);
    }
}
