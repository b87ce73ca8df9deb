//! The turn-by-turn tool loop.

use crate::compactor::ConversationCompactor;
use crate::completion::{Completion, CompletionParser};
use crate::credentials::CredentialCache;
use crate::error::{CredentialError, RunError};
use crate::interfaces::{PromptCatalog, TraceKind, TraceSink};
use crate::metrics::{self, MetricTimer};
use crate::prompt::PromptVariables;
use crate::result::{AutomationRunResult, RunOutcome, RunState};
use chrono::Utc;
use deskpilot_providers::{
    ContentBlock, ConversationMessage, DecodedResponse, EncodeRequest, HistoryMode,
    ProviderAdapter, ProviderError, ToolDefinition, Transport, TransportRetrier,
};
use deskpilot_tools::{tool_definitions, ActionDispatcher, DispatchError};
use std::collections::HashSet;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// Hard upper bound on provider round trips per run.
pub const MAX_TURNS: u32 = 200;

#[derive(Debug, Clone)]
pub struct RunConfig {
    pub prompt_name: String,
    /// Overrides the model named by the prompt config.
    pub model: Option<String>,
    pub max_turns: u32,
    pub os_version: String,
}

impl RunConfig {
    pub fn new(prompt_name: impl Into<String>, os_version: impl Into<String>) -> Self {
        Self {
            prompt_name: prompt_name.into(),
            model: None,
            max_turns: MAX_TURNS,
            os_version: os_version.into(),
        }
    }
}

enum LoopEnd {
    Completed(Completion),
    Exhausted,
    Cancelled,
}

/// Drives one run: prompt, screenshot, provider round trips and tool
/// dispatch until the model reports a result or the turn cap is hit.
///
/// One instance serves exactly one run; [`ToolLoopOrchestrator::run`]
/// consumes it so scale factors and step logs never leak between runs.
pub struct ToolLoopOrchestrator {
    adapter: Arc<dyn ProviderAdapter>,
    transport: Arc<dyn Transport>,
    retrier: TransportRetrier,
    credentials: Arc<CredentialCache>,
    prompts: Arc<dyn PromptCatalog>,
    dispatcher: ActionDispatcher,
    compactor: ConversationCompactor,
    trace: Option<Arc<dyn TraceSink>>,
    config: RunConfig,
}

impl ToolLoopOrchestrator {
    pub fn new(
        adapter: Arc<dyn ProviderAdapter>,
        transport: Arc<dyn Transport>,
        retrier: TransportRetrier,
        credentials: Arc<CredentialCache>,
        prompts: Arc<dyn PromptCatalog>,
        dispatcher: ActionDispatcher,
        config: RunConfig,
    ) -> Self {
        Self {
            adapter,
            transport,
            retrier,
            credentials,
            prompts,
            dispatcher,
            compactor: ConversationCompactor::new(),
            trace: None,
            config,
        }
    }

    pub fn with_trace(mut self, sink: Arc<dyn TraceSink>) -> Self {
        self.trace = Some(sink);
        self
    }

    fn trace(&self, kind: TraceKind, message: &str) {
        if let Some(sink) = &self.trace {
            sink.trace(kind, message);
        }
    }

    pub async fn run(mut self, task: &str, cancel: &CancellationToken) -> AutomationRunResult {
        let started_at = Utc::now();
        let _timer = MetricTimer::new(metrics::RUN_DURATION);
        let mut state = RunState::default();

        info!(
            "Starting run with provider {} ({} turns max)",
            self.adapter.provider_id(),
            self.config.max_turns.clamp(1, MAX_TURNS)
        );
        self.trace(TraceKind::RunStarted, task);

        let result = match self.run_loop(task, cancel, &mut state).await {
            Ok(LoopEnd::Completed(completion)) => {
                info!("Run completed with outcome {:?}", completion.outcome);
                self.trace(
                    TraceKind::Completion,
                    completion.summary.as_deref().unwrap_or_default(),
                );
                state.add_questions(completion.questions);
                state.finish(
                    completion.outcome,
                    completion.summary,
                    completion.error_message,
                    started_at,
                )
            }
            Ok(LoopEnd::Exhausted) => {
                let limit = self.config.max_turns.clamp(1, MAX_TURNS);
                warn!("Run did not converge within {} turns", limit);
                self.trace(TraceKind::Error, "turn limit reached");
                state.add_questions([format!(
                    "The automation loop did not converge within {} turns. How should I proceed?",
                    limit
                )]);
                state.finish(RunOutcome::NeedsClarification, None, None, started_at)
            }
            Ok(LoopEnd::Cancelled) => {
                info!("Run cancelled after {} turns", state.turns);
                self.trace(TraceKind::Cancelled, "run cancelled");
                state.finish(RunOutcome::Cancelled, None, None, started_at)
            }
            Err(e) => {
                error!("Run failed: {}", e);
                self.trace(TraceKind::Error, &e.to_string());
                state.finish(RunOutcome::Failed, None, Some(e.to_string()), started_at)
            }
        };

        metrics::increment_run_outcome(match result.outcome {
            RunOutcome::Success => "success",
            RunOutcome::Failed => "failed",
            RunOutcome::NeedsClarification => "needs_clarification",
            RunOutcome::Cancelled => "cancelled",
        });
        result
    }

    async fn run_loop(
        &mut self,
        task: &str,
        cancel: &CancellationToken,
        state: &mut RunState,
    ) -> Result<LoopEnd, RunError> {
        if cancel.is_cancelled() {
            return Ok(LoopEnd::Cancelled);
        }

        let provider_id = self.adapter.provider_id().to_string();
        let api_key = self
            .credentials
            .read_key(&provider_id)?
            .ok_or(CredentialError::Missing(provider_id))?;

        let prompt = self.prompts.load_prompt(&self.config.prompt_name).await?;
        let model = self
            .config
            .model
            .clone()
            .filter(|m| !m.trim().is_empty())
            .unwrap_or_else(|| prompt.config.model_id.clone());
        debug!(
            "Loaded prompt {} v{} for model {}",
            self.config.prompt_name, prompt.config.version, model
        );

        let initial = self.dispatcher.capture().await?;
        let rendered = prompt.render(&PromptVariables {
            os_version: &self.config.os_version,
            task,
            screen_width: initial.tool.width,
            screen_height: initial.tool.height,
        });
        let tools = tool_definitions(initial.tool);

        let mut conversation = vec![ConversationMessage::user(vec![
            ContentBlock::text(rendered),
            initial.to_content_block(),
        ])];
        let mut continuation: Option<String> = None;
        let max_turns = self.config.max_turns.clamp(1, MAX_TURNS);

        for turn in 1..=max_turns {
            if cancel.is_cancelled() {
                return Ok(LoopEnd::Cancelled);
            }
            state.turns = turn;

            let response = match self
                .round_trip(
                    &tools,
                    &mut conversation,
                    continuation.as_deref(),
                    &model,
                    &api_key,
                    cancel,
                )
                .await
            {
                Ok(response) => response,
                Err(ProviderError::Cancelled) => return Ok(LoopEnd::Cancelled),
                Err(e) => return Err(e.into()),
            };
            check_tool_call_ids(&response)?;

            conversation.push(response.to_assistant_message());
            let mode = self.adapter.history_mode();
            if mode == HistoryMode::Incremental {
                continuation = response.continuation_token.clone();
            }
            retire_sent_messages(mode, &mut conversation);

            if response.tool_calls.is_empty() {
                debug!("Turn {} returned no tool calls, parsing completion", turn);
                return Ok(LoopEnd::Completed(CompletionParser::parse(
                    &response.text_output,
                )));
            }

            let mut results = Vec::with_capacity(response.tool_calls.len());
            for call in &response.tool_calls {
                if cancel.is_cancelled() {
                    return Ok(LoopEnd::Cancelled);
                }
                self.trace(TraceKind::ToolCall, &format!("{} {}", call.name, call.input));

                let outcome = {
                    let _timer = MetricTimer::new(metrics::TOOL_LATENCY);
                    self.dispatcher.dispatch(call, cancel).await
                };
                let outcome = match outcome {
                    Ok(outcome) => outcome,
                    Err(DispatchError::Cancelled) => return Ok(LoopEnd::Cancelled),
                    Err(DispatchError::Screenshot(e)) => return Err(e.into()),
                };

                self.trace(
                    TraceKind::ToolResult,
                    &format!(
                        "{} {}",
                        call.id,
                        if outcome.is_error { "error" } else { "ok" }
                    ),
                );
                results.push(outcome.to_block(&call.id));
                state.record_step(outcome.step);
                state.add_questions(outcome.questions);
            }
            conversation.push(ConversationMessage::user(results));
        }

        Ok(LoopEnd::Exhausted)
    }

    /// Encode, send with retries, decode.
    #[allow(clippy::too_many_arguments)]
    async fn round_trip(
        &self,
        tools: &[ToolDefinition],
        conversation: &mut [ConversationMessage],
        continuation: Option<&str>,
        model: &str,
        api_key: &str,
        cancel: &CancellationToken,
    ) -> Result<DecodedResponse, ProviderError> {
        let outbound: &[ConversationMessage] = match self.adapter.history_mode() {
            HistoryMode::FullHistory => {
                let removed = self.compactor.compact(conversation);
                if removed > 0 {
                    self.trace(
                        TraceKind::Compaction,
                        &format!("removed {} screenshots", removed),
                    );
                }
                &conversation[..]
            }
            HistoryMode::Incremental => &conversation[..],
        };

        let request = self.adapter.build_request(
            EncodeRequest {
                tools,
                conversation: outbound,
                model,
                continuation_token: continuation,
            },
            api_key,
        )?;
        self.trace(
            TraceKind::Request,
            &format!("{} messages to {}", outbound.len(), request.url),
        );

        let outcome = {
            let _timer = MetricTimer::new(metrics::PROVIDER_LATENCY);
            let transport = &self.transport;
            let request = &request;
            self.retrier
                .run(cancel, |attempt| async move {
                    transport.send(request, attempt).await
                })
                .await
        };

        let retries = outcome.attempts.len().saturating_sub(1);
        if retries > 0 {
            metrics::increment_transport_retries(retries);
            self.trace(
                TraceKind::Retry,
                &format!("{} attempts", outcome.attempts.len()),
            );
        }

        let body = outcome.result?;
        let decoded = self.adapter.decode(&body)?;
        self.trace(
            TraceKind::Response,
            &format!(
                "{} tool calls, {} chars of text",
                decoded.tool_calls.len(),
                decoded.text_output.len()
            ),
        );
        Ok(decoded)
    }
}

/// Incremental providers hold the transcript behind the continuation token,
/// so everything already sent is dropped locally.
fn retire_sent_messages(mode: HistoryMode, conversation: &mut Vec<ConversationMessage>) {
    if mode == HistoryMode::Incremental {
        conversation.clear();
    }
}

/// Every tool call needs a non-empty id, unique within its turn.
fn check_tool_call_ids(response: &DecodedResponse) -> Result<(), RunError> {
    let mut seen = HashSet::new();
    for call in &response.tool_calls {
        if call.id.trim().is_empty() {
            return Err(RunError::Protocol(format!(
                "tool call '{}' has no id",
                call.name
            )));
        }
        if call.name.trim().is_empty() {
            return Err(RunError::Protocol(format!(
                "tool call '{}' has no name",
                call.id
            )));
        }
        if !seen.insert(call.id.as_str()) {
            return Err(RunError::Protocol(format!(
                "duplicate tool call id '{}'",
                call.id
            )));
        }
    }
    Ok(())
}
