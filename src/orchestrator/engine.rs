//! Turn orchestration engine
//!
//! Drives one user turn through the state machine:
//! `ROUTE → RETRIEVE → GENERATE ⇄ TOOL_EXECUTE → DONE/ABORTED`.
//!
//! Every completed state appends its record to the conversation store
//! before the machine moves on, so the message log is a total order of
//! the interaction. The loop is bounded twice: an iteration guard forces
//! a best-effort `DONE`, and a turn-level timeout forces `ABORTED` (still
//! emitting a final message).

use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::timeout;

use crate::errors::{EngineError, Result};
use crate::llm::{ChatModel, ModelTurn, PromptMessage};
use crate::orchestrator::state::TurnState;
use crate::retrieval::{RetrievedChunk, Retriever};
use crate::router::CategoryRouter;
use crate::store::ConversationStore;
use crate::tools::{ToolExecutor, ToolRegistry};
use crate::types::{CategorySlug, Message, MessageMeta, Role, ToolOutcome, ToolRequest};

/// Canned response for routing misses and empty categories
pub const NO_KNOWLEDGE_MESSAGE: &str =
    "No matching knowledge available for this question.";

/// Prefix of the forced answer when the iteration guard trips
pub const BEST_EFFORT_PREFIX: &str =
    "I couldn't fully resolve this within the allowed steps.";

/// Message emitted when the turn timeout aborts the run
pub const ABORTED_MESSAGE: &str =
    "This request was aborted before an answer could be produced.";

/// Orchestrator configuration
#[derive(Debug, Clone)]
pub struct OrchestratorConfig {
    /// Maximum GENERATE passes per turn before forcing completion
    pub max_iterations: usize,

    /// Wall-clock budget for the whole ROUTE…DONE chain
    pub turn_timeout: Duration,

    /// Chunks to retrieve per turn
    pub top_k: usize,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            max_iterations: 4,
            turn_timeout: Duration::from_secs(60),
            top_k: 5,
        }
    }
}

impl OrchestratorConfig {
    pub fn validate(&self) -> Result<()> {
        if !(1..=8).contains(&self.max_iterations) {
            return Err(EngineError::Config(format!(
                "max_iterations must be in 1..=8, got {}",
                self.max_iterations
            )));
        }
        Ok(())
    }
}

/// What a completed turn produced
#[derive(Debug, Clone)]
pub struct TurnReport {
    pub session_id: String,
    pub answer: String,
    pub routed_category: Option<CategorySlug>,
    pub cited_chunks: Vec<RetrievedChunk>,
    pub tools_invoked: Vec<String>,
    pub aborted: bool,
}

/// Turn orchestrator
pub struct Orchestrator {
    router: CategoryRouter,
    retriever: Retriever,
    model: Arc<dyn ChatModel>,
    registry: ToolRegistry,
    conversations: Arc<ConversationStore>,
    config: OrchestratorConfig,
}

impl Orchestrator {
    pub fn new(
        router: CategoryRouter,
        retriever: Retriever,
        model: Arc<dyn ChatModel>,
        registry: ToolRegistry,
        conversations: Arc<ConversationStore>,
        config: OrchestratorConfig,
    ) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            router,
            retriever,
            model,
            registry,
            conversations,
            config,
        })
    }

    pub fn config(&self) -> &OrchestratorConfig {
        &self.config
    }

    /// Run one user turn against the known category set.
    ///
    /// The turn timeout covers the whole chain; hitting it cancels the
    /// outstanding external call and records an `ABORTED` message so the
    /// log stays complete.
    pub async fn run_turn(
        &self,
        owner_id: &str,
        session_id: &str,
        query: &str,
        known: &BTreeSet<CategorySlug>,
    ) -> Result<TurnReport> {
        self.conversations
            .get_or_create_session(session_id, owner_id)
            .await;
        self.conversations
            .append(session_id, Message::new(Role::User, query))
            .await?;

        match timeout(self.config.turn_timeout, self.drive(session_id, query, known)).await {
            Ok(Ok(report)) => Ok(report),
            Ok(Err(e)) => {
                // Provider failure after retries: keep the log complete,
                // then surface the typed error.
                let note = format!("Request failed: {}", e);
                self.conversations
                    .append(session_id, Message::new(Role::Assistant, note))
                    .await?;
                Err(e)
            }
            Err(_elapsed) => {
                tracing::warn!(session = session_id, "turn timeout, aborting");
                self.conversations
                    .append(session_id, Message::new(Role::Assistant, ABORTED_MESSAGE))
                    .await?;
                Ok(TurnReport {
                    session_id: session_id.to_string(),
                    answer: ABORTED_MESSAGE.to_string(),
                    routed_category: None,
                    cited_chunks: Vec::new(),
                    tools_invoked: Vec::new(),
                    aborted: true,
                })
            }
        }
    }

    /// The state-machine loop. Sequential by design: message ordering in
    /// the conversation store must be deterministic.
    async fn drive(
        &self,
        session_id: &str,
        query: &str,
        known: &BTreeSet<CategorySlug>,
    ) -> Result<TurnReport> {
        let mut state = TurnState::Route;
        let mut executor = ToolExecutor::new(self.registry.clone());
        let mut iterations = 0usize;
        let mut tools_invoked: Vec<String> = Vec::new();
        let mut context_chunks: Vec<RetrievedChunk> = Vec::new();

        loop {
            let next = match &state {
                TurnState::Route => self.step_route(session_id, query, known).await?,

                TurnState::Retrieve { category } => {
                    let next = self
                        .step_retrieve(session_id, query, category.clone())
                        .await?;
                    if let TurnState::Generate { chunks, .. } = &next {
                        context_chunks = chunks.clone();
                    }
                    next
                }

                TurnState::Generate {
                    category,
                    chunks,
                    exchanges,
                } => {
                    iterations += 1;
                    self.step_generate(
                        session_id,
                        query,
                        category.clone(),
                        chunks,
                        exchanges,
                        iterations,
                        &tools_invoked,
                    )
                    .await?
                }

                TurnState::ToolExecute {
                    category,
                    chunks,
                    exchanges,
                    requests,
                } => {
                    self.step_tool_execute(
                        session_id,
                        category.clone(),
                        chunks.clone(),
                        exchanges.clone(),
                        requests,
                        &mut executor,
                        &mut tools_invoked,
                    )
                    .await?
                }

                terminal => {
                    unreachable!("terminal state {} re-entered", terminal.name())
                }
            };

            state.check_transition(&next)?;
            tracing::debug!(from = state.name(), to = next.name(), "transition");
            state = next;

            match &state {
                TurnState::Done {
                    answer,
                    cited_chunk_ids,
                    category,
                    tools_invoked: done_tools,
                } => {
                    let meta = MessageMeta {
                        tool: None,
                        routed_category: category.clone(),
                        cited_chunk_ids: cited_chunk_ids.clone(),
                    };
                    self.conversations
                        .append(
                            session_id,
                            Message::new(Role::Assistant, answer.clone()).with_meta(meta),
                        )
                        .await?;

                    let cited_chunks = context_chunks
                        .iter()
                        .filter(|c| cited_chunk_ids.contains(&c.chunk_id))
                        .cloned()
                        .collect();

                    return Ok(TurnReport {
                        session_id: session_id.to_string(),
                        answer: answer.clone(),
                        routed_category: category.clone(),
                        cited_chunks,
                        tools_invoked: done_tools.clone(),
                        aborted: false,
                    });
                }
                TurnState::Aborted { reason } => {
                    self.conversations
                        .append(session_id, Message::new(Role::Assistant, reason.clone()))
                        .await?;
                    return Ok(TurnReport {
                        session_id: session_id.to_string(),
                        answer: reason.clone(),
                        routed_category: None,
                        cited_chunks: Vec::new(),
                        tools_invoked,
                        aborted: true,
                    });
                }
                _ => {}
            }
        }
    }

    /// ROUTE: classify the query; a miss short-circuits to the canned
    /// no-knowledge answer.
    async fn step_route(
        &self,
        session_id: &str,
        query: &str,
        known: &BTreeSet<CategorySlug>,
    ) -> Result<TurnState> {
        let decision = self.router.route(query, known).await?;

        let routing_note = match &decision.category {
            Some(category) => format!(
                "Routed to category '{}' (confidence {:.2})",
                category, decision.confidence
            ),
            None => format!("No category matched: {}", decision.rationale),
        };
        let meta = MessageMeta {
            routed_category: decision.category.clone(),
            ..MessageMeta::default()
        };
        self.conversations
            .append(
                session_id,
                Message::new(Role::System, routing_note).with_meta(meta),
            )
            .await?;

        Ok(match decision.category {
            Some(category) => TurnState::Retrieve { category },
            None => TurnState::Done {
                answer: NO_KNOWLEDGE_MESSAGE.to_string(),
                cited_chunk_ids: Vec::new(),
                category: None,
                tools_invoked: Vec::new(),
            },
        })
    }

    /// RETRIEVE: fetch context. An empty category is handled like a
    /// routing miss so the user gets the explicit no-knowledge answer
    /// instead of an invitation to hallucinate.
    async fn step_retrieve(
        &self,
        session_id: &str,
        query: &str,
        category: CategorySlug,
    ) -> Result<TurnState> {
        let chunks = self
            .retriever
            .retrieve(&category, query, self.config.top_k)
            .await?;

        let ids: Vec<String> = chunks.iter().map(|c| c.chunk_id.clone()).collect();
        let meta = MessageMeta {
            routed_category: Some(category.clone()),
            cited_chunk_ids: ids,
            ..MessageMeta::default()
        };
        self.conversations
            .append(
                session_id,
                Message::new(
                    Role::System,
                    format!("Retrieved {} passages from '{}'", chunks.len(), category),
                )
                .with_meta(meta),
            )
            .await?;

        Ok(if chunks.is_empty() {
            TurnState::Done {
                answer: NO_KNOWLEDGE_MESSAGE.to_string(),
                cited_chunk_ids: Vec::new(),
                category: Some(category),
                tools_invoked: Vec::new(),
            }
        } else {
            TurnState::Generate {
                category: Some(category),
                chunks,
                exchanges: Vec::new(),
            }
        })
    }

    /// GENERATE: ask the model. Retried once on transport failure — and
    /// only there: once a response has been acted on (tools ran), that
    /// response is never re-requested.
    #[allow(clippy::too_many_arguments)]
    async fn step_generate(
        &self,
        session_id: &str,
        query: &str,
        category: Option<CategorySlug>,
        chunks: &[RetrievedChunk],
        exchanges: &[(ToolRequest, ToolOutcome)],
        iterations: usize,
        tools_invoked: &[String],
    ) -> Result<TurnState> {
        let messages = self.build_prompt(query, chunks, exchanges);
        let schemas = self.registry.schemas();

        let turn = match self.model.generate(&messages, &schemas).await {
            Ok(turn) => turn,
            Err(e) if e.is_retryable() => {
                tracing::debug!(error = %e, "generation transport failure, retrying once");
                self.model.generate(&messages, &schemas).await?
            }
            Err(e) => return Err(e),
        };

        match turn {
            ModelTurn::Answer(answer) => {
                let cited = extract_citations(&answer, chunks);
                Ok(TurnState::Done {
                    answer,
                    cited_chunk_ids: cited,
                    category,
                    tools_invoked: tools_invoked.to_vec(),
                })
            }
            ModelTurn::ToolCalls(requests) => {
                if iterations >= self.config.max_iterations {
                    tracing::warn!(
                        iterations,
                        "iteration budget exhausted, forcing best-effort completion"
                    );
                    return Ok(TurnState::Done {
                        answer: best_effort_answer(exchanges),
                        cited_chunk_ids: Vec::new(),
                        category,
                        tools_invoked: tools_invoked.to_vec(),
                    });
                }

                // One assistant message per requested call; the matching
                // tool-result messages follow in TOOL_EXECUTE.
                for request in &requests {
                    let meta = MessageMeta {
                        tool: Some(request.tool.clone()),
                        ..MessageMeta::default()
                    };
                    self.conversations
                        .append(
                            session_id,
                            Message::new(Role::Assistant, request.args.to_string())
                                .with_meta(meta),
                        )
                        .await?;
                }

                Ok(TurnState::ToolExecute {
                    category,
                    chunks: chunks.to_vec(),
                    exchanges: exchanges.to_vec(),
                    requests,
                })
            }
        }
    }

    /// TOOL_EXECUTE: run each requested tool and feed the outcomes back
    /// into the next GENERATE. Model-level mistakes (unknown tool, bad
    /// input) become error outcomes the model can react to; they do not
    /// kill the turn.
    #[allow(clippy::too_many_arguments)]
    async fn step_tool_execute(
        &self,
        session_id: &str,
        category: Option<CategorySlug>,
        chunks: Vec<RetrievedChunk>,
        mut exchanges: Vec<(ToolRequest, ToolOutcome)>,
        requests: &[ToolRequest],
        executor: &mut ToolExecutor,
        tools_invoked: &mut Vec<String>,
    ) -> Result<TurnState> {
        executor.begin_iteration();

        for request in requests {
            let outcome = match executor.execute(request).await {
                Ok(outcome) => outcome,
                Err(e @ EngineError::UnknownTool(_)) | Err(e @ EngineError::ToolInput { .. }) => {
                    tracing::warn!(tool = %request.tool, error = %e, "rejected tool request");
                    ToolOutcome::err(request.tool.clone(), e.to_string(), 0)
                }
                Err(e) => return Err(e),
            };

            tools_invoked.push(request.tool.clone());

            let meta = MessageMeta {
                tool: Some(request.tool.clone()),
                ..MessageMeta::default()
            };
            self.conversations
                .append(
                    session_id,
                    Message::new(Role::Tool, outcome.render()).with_meta(meta),
                )
                .await?;

            exchanges.push((request.clone(), outcome));
        }

        Ok(TurnState::Generate {
            category,
            chunks,
            exchanges,
        })
    }

    /// Assemble the generation prompt: context passages with citation
    /// ids, then the query, then any completed tool exchanges.
    fn build_prompt(
        &self,
        query: &str,
        chunks: &[RetrievedChunk],
        exchanges: &[(ToolRequest, ToolOutcome)],
    ) -> Vec<PromptMessage> {
        let mut context = String::from(
            "You are a knowledge assistant. Answer using only the context \
             passages below. Cite supporting passages by their bracketed ids. \
             If the context does not answer the question, say so. Use the \
             available tools when the question requires them.\n\nContext:\n",
        );
        for chunk in chunks {
            context.push_str(&format!("[{}] {}\n", chunk.chunk_id, chunk.text));
        }

        let mut messages = vec![
            PromptMessage::new(Role::System, context),
            PromptMessage::new(Role::User, query),
        ];

        for (request, outcome) in exchanges {
            messages.push(PromptMessage::new(
                Role::Assistant,
                format!("Calling tool {} with {}", request.tool, request.args),
            ));
            messages.push(PromptMessage::new(Role::Tool, outcome.render()));
        }

        messages
    }
}

/// Chunk ids the answer cites. Ids referenced in square brackets win;
/// an answer with no markers is attributed to its whole context.
fn extract_citations(answer: &str, chunks: &[RetrievedChunk]) -> Vec<String> {
    let explicit: Vec<String> = chunks
        .iter()
        .filter(|c| answer.contains(&format!("[{}]", c.chunk_id)))
        .map(|c| c.chunk_id.clone())
        .collect();

    if explicit.is_empty() {
        chunks.iter().map(|c| c.chunk_id.clone()).collect()
    } else {
        explicit
    }
}

/// Forced completion text when the iteration guard trips
fn best_effort_answer(exchanges: &[(ToolRequest, ToolOutcome)]) -> String {
    if exchanges.is_empty() {
        return format!("{} Please try rephrasing the question.", BEST_EFFORT_PREFIX);
    }

    let mut answer = format!("{} Tool results gathered so far:\n", BEST_EFFORT_PREFIX);
    for (request, outcome) in exchanges {
        answer.push_str(&format!("- {}: {}\n", request.tool, outcome.render()));
    }
    answer
}
