//! The reasoning loop implementation.

use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, warn};

use tabletalk_core::error::{Error, Result};
use tabletalk_core::grounding::TableId;
use tabletalk_core::model::{GenerationConfig, ModelClient, ModelOutcome, ModelRequest};
use tabletalk_core::turn::{SessionId, ToolCallRecord, Turn};
use tabletalk_grounding::GroundingProvider;
use tabletalk_session::{SessionLockGuard, SessionStore};
use tabletalk_tools::ToolDispatcher;

use crate::prompt::PromptAssembler;
use crate::render::{render, RenderedMessage};

/// States of the reasoning loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopState {
    /// The assembled prompt is with the model
    AwaitingModel,
    /// A tool invocation is with the dispatcher
    ExecutingTool,
    /// Terminal: a final answer was produced
    Done,
    /// Terminal: a clarifying question awaits the user's reply
    AwaitingUser,
}

/// The rendered result of one chat request.
#[derive(Debug, Clone)]
pub struct ChatOutcome {
    pub session_id: SessionId,
    /// `Done` or `AwaitingUser`
    pub state: LoopState,
    pub messages: Vec<RenderedMessage>,
    /// Model calls + tool calls consumed
    pub steps: u32,
}

/// Bounds and model parameters for the loop.
#[derive(Debug, Clone)]
pub struct LoopConfig {
    /// Maximum steps (model calls + tool calls) per request
    pub max_steps: u32,

    /// Maximum tool calls within one request (cycle breaker)
    pub max_tool_calls_per_turn: u32,

    /// Timeout for each model call
    pub model_timeout: Duration,

    /// Sampling parameters forwarded to the model
    pub generation: GenerationConfig,

    /// Tables whose grounding is injected into every prompt
    pub tables: Vec<TableId>,
}

impl Default for LoopConfig {
    fn default() -> Self {
        Self {
            max_steps: 20,
            max_tool_calls_per_turn: 8,
            model_timeout: Duration::from_secs(120),
            generation: GenerationConfig::default(),
            tables: vec![],
        }
    }
}

/// Drives the model-tool cycle for one session at a time.
///
/// Everything the loop touches comes in through this context object —
/// there is no process-wide agent state.
pub struct ReasoningLoop {
    model: Arc<dyn ModelClient>,
    dispatcher: Arc<ToolDispatcher>,
    grounding: Arc<GroundingProvider>,
    store: Arc<dyn SessionStore>,
    assembler: PromptAssembler,
    config: LoopConfig,
}

impl ReasoningLoop {
    pub fn new(
        model: Arc<dyn ModelClient>,
        dispatcher: Arc<ToolDispatcher>,
        grounding: Arc<GroundingProvider>,
        store: Arc<dyn SessionStore>,
        assembler: PromptAssembler,
        config: LoopConfig,
    ) -> Self {
        Self {
            model,
            dispatcher,
            grounding,
            store,
            assembler,
            config,
        }
    }

    /// Handle one inbound user message end to end: resolve the session,
    /// claim its lock, append the user turn, run the loop to a terminal
    /// state, and render the result.
    ///
    /// Fatal errors (`SessionNotFound`, `SessionBusy`,
    /// `PromptBudgetExceeded`, grounding `MetadataUnavailable`) surface to
    /// the caller; the session lock is released on every exit path.
    pub async fn handle_message(
        &self,
        user_id: &str,
        session_id: Option<&SessionId>,
        message: &str,
    ) -> Result<ChatOutcome> {
        let id = match session_id {
            Some(id) => {
                // Fails before any mutation if the session is unknown.
                self.store.get(id).await?;
                id.clone()
            }
            None => {
                let id = self.store.create(user_id).await?;
                info!(session_id = %id, user_id, "Created session");
                id
            }
        };

        let guard = SessionLockGuard::acquire(self.store.clone(), &id).await?;

        // An inbound message answers any pending clarification.
        let session = self.store.get(&id).await?;
        if session.pending_clarification.is_some() {
            debug!(session_id = %id, "Clearing pending clarification");
            self.store.set_pending_clarification(&id, None).await?;
        }
        self.store.append(&id, Turn::user(message)).await?;

        let result = self.run(&id).await;

        // Deterministic release on both paths; cancellation mid-run is
        // covered by the guard's drop handler.
        let released = guard.release().await;
        let (state, final_turn, steps) = result?;
        released?;

        info!(
            session_id = %id,
            steps,
            state = ?state,
            "Request complete"
        );

        Ok(ChatOutcome {
            session_id: id,
            state,
            messages: render(&final_turn),
            steps,
        })
    }

    /// Run the state machine to a terminal state. The caller holds the
    /// session lock.
    async fn run(&self, id: &SessionId) -> Result<(LoopState, Turn, u32)> {
        let mut steps = 0u32;
        let mut tool_calls = 0u32;

        loop {
            // ── AwaitingModel ──────────────────────────────────────────
            steps += 1;
            if steps > self.config.max_steps {
                return self.force_terminate(id, steps).await;
            }
            debug!(session_id = %id, steps, state = ?LoopState::AwaitingModel, "Loop step");

            let grounding = self.grounding.get_context(&self.config.tables).await?;

            let session = self.store.get(id).await?;
            let (prior, current) = match session.history.split_last() {
                Some((current, prior)) => (prior, current),
                None => {
                    return Err(Error::Model {
                        message: "Reasoning loop started on an empty session".into(),
                        retryable: false,
                    });
                }
            };
            let prompt = self.assembler.build(&grounding, prior, current)?;

            let request = ModelRequest {
                system: prompt.system,
                messages: prompt.messages,
                tools: self.dispatcher.registry().definitions(),
                generation: self.config.generation.clone(),
            };

            let outcome =
                match tokio::time::timeout(self.config.model_timeout, self.model.complete(request))
                    .await
                {
                    Ok(Ok(outcome)) => outcome,
                    Ok(Err(e)) if e.is_retryable() => {
                        warn!(session_id = %id, error = %e, "Transient model failure, surfacing to next step");
                        self.store
                            .append(
                                id,
                                Turn::system(format!(
                                    "The previous model call failed transiently ({e}). Continue from the conversation so far."
                                )),
                            )
                            .await?;
                        continue;
                    }
                    Ok(Err(e)) => return self.fail(id, e, steps).await,
                    Err(_) => {
                        let e = Error::Model {
                            message: format!(
                                "Model call timed out after {}s",
                                self.config.model_timeout.as_secs()
                            ),
                            retryable: false,
                        };
                        return self.fail(id, e, steps).await;
                    }
                };

            match outcome {
                ModelOutcome::FinalAnswer(text) => {
                    let turn = Turn::agent(text);
                    self.store.append(id, turn.clone()).await?;
                    return Ok((LoopState::Done, turn, steps));
                }

                ModelOutcome::ClarifyingQuestion(question) => {
                    let turn = Turn::agent(question.clone());
                    self.store.append(id, turn.clone()).await?;
                    self.store
                        .set_pending_clarification(id, Some(question))
                        .await?;
                    return Ok((LoopState::AwaitingUser, turn, steps));
                }

                ModelOutcome::ToolCalls(invocations) => {
                    // ── ExecutingTool ──────────────────────────────────
                    for invocation in invocations {
                        steps += 1;
                        tool_calls += 1;
                        if steps > self.config.max_steps
                            || tool_calls > self.config.max_tool_calls_per_turn
                        {
                            return self.force_terminate(id, steps).await;
                        }
                        debug!(
                            session_id = %id,
                            tool = %invocation.name,
                            state = ?LoopState::ExecutingTool,
                            "Loop step"
                        );

                        match self
                            .dispatcher
                            .dispatch(&invocation.name, &invocation.arguments)
                            .await
                        {
                            Ok(output) => {
                                let record = ToolCallRecord::succeeded(
                                    &invocation.name,
                                    invocation.arguments.clone(),
                                    output.data.clone().unwrap_or(serde_json::Value::Null),
                                );
                                let turn = Turn::system(format!(
                                    "Tool {} result:\n{}",
                                    invocation.name, output.content
                                ))
                                .with_tool_calls(vec![record]);
                                self.store.append(id, turn).await?;
                            }
                            Err(e) if e.is_fatal() => {
                                let record = ToolCallRecord::failed(
                                    &invocation.name,
                                    invocation.arguments.clone(),
                                    &e.to_string(),
                                );
                                self.store
                                    .append(
                                        id,
                                        Turn::system(format!(
                                            "Tool {} failed and the request cannot continue.",
                                            invocation.name
                                        ))
                                        .with_tool_calls(vec![record]),
                                    )
                                    .await?;
                                return self.fail(id, e, steps).await;
                            }
                            Err(e) => {
                                // Recoverable: surface the failure to the
                                // model so it can adapt its plan.
                                let record = ToolCallRecord::failed(
                                    &invocation.name,
                                    invocation.arguments.clone(),
                                    &e.to_string(),
                                );
                                let turn = Turn::system(format!(
                                    "Tool {} failed: {e}. Adjust the query or ask the user a narrower question.",
                                    invocation.name
                                ))
                                .with_tool_calls(vec![record]);
                                self.store.append(id, turn).await?;
                            }
                        }
                    }
                    // Back to AwaitingModel with the tool results in history.
                }
            }
        }
    }

    /// Step bound hit: terminate with a degraded answer instead of looping.
    async fn force_terminate(&self, id: &SessionId, steps: u32) -> Result<(LoopState, Turn, u32)> {
        let limit_error = Error::LoopStepLimitExceeded {
            limit: self.config.max_steps,
        };
        warn!(session_id = %id, steps, error = %limit_error, "Forcing termination");

        let turn = Turn::agent(limit_error.user_message());
        self.store.append(id, turn.clone()).await?;
        Ok((LoopState::Done, turn, steps))
    }

    /// Fatal mid-loop failure: record a plain-language failure answer and
    /// terminate. Internal detail goes to the log only.
    async fn fail(&self, id: &SessionId, e: Error, steps: u32) -> Result<(LoopState, Turn, u32)> {
        error!(session_id = %id, error = %e, "Reasoning loop failed");

        let turn = Turn::agent(e.user_message());
        self.store.append(id, turn.clone()).await?;
        Ok((LoopState::Done, turn, steps))
    }
}
