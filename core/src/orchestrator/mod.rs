pub mod decompose;
pub mod progress;
pub mod synthesis;

pub use decompose::fallback_subtasks;
pub use progress::{ProgressHandle, ProgressStatus, ProgressTracker};
pub use synthesis::{Synthesizer, agent_responses_block, fallback_synthesis};

use crate::agent::{AgentLoop, ContextBuilder, ToolRegistry, registry::panic_message};
use crate::config::{Config, DEFAULT_SYSTEM_PROMPT, OrchestratorConfig};
use crate::traits::Provider;
use decompose::Decomposer;
use futures_util::FutureExt;
use futures_util::stream::{FuturesUnordered, StreamExt};
use std::collections::BTreeMap;
use std::fmt;
use std::panic::AssertUnwindSafe;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{Instrument, debug, error, info, info_span, warn};
use uuid::Uuid;

pub const ALL_AGENTS_FAILED_MESSAGE: &str =
    "All agents failed to provide results. Please try again.";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunStatus {
    Success,
    Error,
    Timeout,
}

#[derive(Debug, Clone)]
pub struct AgentRunResult {
    pub agent_id: usize,
    pub status: RunStatus,
    pub response: String,
    pub execution_time: Duration,
}

impl AgentRunResult {
    pub fn is_success(&self) -> bool {
        self.status == RunStatus::Success
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AggregationStrategy {
    /// One synthesis call merges every successful response.
    #[default]
    Consensus,
}

impl AggregationStrategy {
    /// Unknown names fall back to `Consensus` with a warning.
    pub fn from_name(name: &str) -> Self {
        match name.trim().to_lowercase().as_str() {
            "consensus" => Self::Consensus,
            other => {
                warn!(strategy = other, "Unknown aggregation strategy, using consensus");
                Self::Consensus
            }
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Consensus => "consensus",
        }
    }
}

impl fmt::Display for AggregationStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone)]
pub struct OrchestratorSettings {
    pub num_agents: usize,
    pub task_timeout: Duration,
    pub max_iterations: usize,
    pub aggregation: AggregationStrategy,
    pub system_prompt: String,
    pub question_generation_prompt: String,
    pub synthesis_prompt: String,
    pub workspace_dir: Option<PathBuf>,
}

impl Default for OrchestratorSettings {
    fn default() -> Self {
        let orchestrator = OrchestratorConfig::default();
        Self {
            num_agents: orchestrator.parallel_agents,
            task_timeout: orchestrator.task_timeout(),
            max_iterations: crate::agent::DEFAULT_MAX_ITERATIONS,
            aggregation: AggregationStrategy::Consensus,
            system_prompt: DEFAULT_SYSTEM_PROMPT.to_string(),
            question_generation_prompt: orchestrator.question_generation_prompt,
            synthesis_prompt: orchestrator.synthesis_prompt,
            workspace_dir: None,
        }
    }
}

impl OrchestratorSettings {
    pub fn from_config(config: &Config) -> Self {
        let orchestrator = &config.orchestrator;
        Self {
            num_agents: orchestrator.parallel_agents,
            task_timeout: orchestrator.task_timeout(),
            max_iterations: config.max_iterations,
            aggregation: AggregationStrategy::from_name(&orchestrator.aggregation_strategy),
            system_prompt: config.system_prompt.clone(),
            question_generation_prompt: orchestrator.question_generation_prompt.clone(),
            synthesis_prompt: orchestrator.synthesis_prompt.clone(),
            workspace_dir: Some(config.workspace_dir.clone()),
        }
    }

    fn context(&self) -> ContextBuilder {
        let context = ContextBuilder::new(self.system_prompt.clone());
        match &self.workspace_dir {
            Some(dir) => context.with_workspace(dir),
            None => context,
        }
    }
}

#[derive(Debug, Clone)]
pub struct OrchestrationReport {
    pub run_id: Uuid,
    pub subtasks: Vec<String>,
    /// One entry per agent, sorted by agent id.
    pub results: Vec<AgentRunResult>,
    pub answer: String,
}

/// Splits a request into subtasks, runs one agent per subtask in parallel and merges the
/// answers.
pub struct Orchestrator {
    provider: Arc<dyn Provider>,
    registry: ToolRegistry,
    settings: OrchestratorSettings,
    progress: ProgressTracker,
}

impl Orchestrator {
    pub fn new(
        provider: Arc<dyn Provider>,
        registry: ToolRegistry,
        settings: OrchestratorSettings,
    ) -> Self {
        Self {
            provider,
            registry,
            settings,
            progress: ProgressTracker::new(),
        }
    }

    pub fn from_config(provider: Arc<dyn Provider>, config: &Config) -> Self {
        Self::new(
            provider,
            crate::tools::default_registry(config),
            OrchestratorSettings::from_config(config),
        )
    }

    pub fn num_agents(&self) -> usize {
        self.settings.num_agents
    }

    pub fn settings(&self) -> &OrchestratorSettings {
        &self.settings
    }

    pub fn progress_snapshot(&self) -> BTreeMap<usize, ProgressStatus> {
        self.progress.snapshot()
    }

    pub fn progress_status(&self) -> BTreeMap<usize, String> {
        self.progress
            .snapshot()
            .into_iter()
            .map(|(id, status)| (id, status.to_string()))
            .collect()
    }

    /// Always returns exactly `n` subtasks; falls back to generic angles when the model's
    /// answer is unusable.
    pub async fn decompose(&self, user_input: &str, n: usize) -> Vec<String> {
        let decomposer = Decomposer {
            provider: self.provider.clone(),
            context: self.settings.context(),
            registry: self.registry.clone(),
            template: self.settings.question_generation_prompt.clone(),
            max_iterations: self.settings.max_iterations,
        };
        decomposer.decompose(user_input, n).await
    }

    pub async fn orchestrate(&self, user_input: &str) -> String {
        self.orchestrate_detailed(user_input).await.answer
    }

    pub async fn orchestrate_detailed(&self, user_input: &str) -> OrchestrationReport {
        let run_id = Uuid::new_v4();
        let num_agents = self.settings.num_agents;
        let span = info_span!("orchestrate", %run_id, agents = num_agents);

        async move {
            let generation = self.progress.begin_run();

            info!("Generating {} subtasks", num_agents);
            let subtasks = self.decompose(user_input, num_agents).await;

            self.progress.queue_all(generation, num_agents);
            let results = self.dispatch_and_collect(generation, &subtasks).await;
            let answer = self.aggregate(&results).await;

            info!(
                succeeded = results.iter().filter(|r| r.is_success()).count(),
                "Orchestration finished"
            );

            OrchestrationReport {
                run_id,
                subtasks,
                results,
                answer,
            }
        }
        .instrument(span)
        .await
    }

    async fn dispatch_and_collect(
        &self,
        generation: u64,
        subtasks: &[String],
    ) -> Vec<AgentRunResult> {
        let started = Instant::now();
        let deadline = started + self.settings.task_timeout;

        let mut pending: FuturesUnordered<_> = subtasks
            .iter()
            .enumerate()
            .map(|(agent_id, subtask)| {
                let worker = Worker {
                    agent: AgentLoop::new(
                        self.provider.clone(),
                        self.settings.context(),
                        self.registry.clone(),
                    )
                    .with_max_iterations(self.settings.max_iterations),
                    subtask: subtask.clone(),
                    progress: self.progress.handle(generation, agent_id),
                };
                let span = info_span!("worker", agent_id);
                let handle = tokio::spawn(worker.run().instrument(span));
                async move { (agent_id, handle.await) }
            })
            .collect();

        let mut collected: Vec<Option<AgentRunResult>> = subtasks.iter().map(|_| None).collect();

        loop {
            match tokio::time::timeout_at(deadline, pending.next()).await {
                Ok(Some((agent_id, Ok(result)))) => collected[agent_id] = Some(result),
                Ok(Some((agent_id, Err(join_error)))) => {
                    error!(agent_id, "Worker task ended abnormally: {}", join_error);
                    let reason = format!("worker task ended abnormally: {join_error}");
                    self.progress.handle(generation, agent_id).fail(reason.clone());
                    collected[agent_id] = Some(AgentRunResult {
                        agent_id,
                        status: RunStatus::Error,
                        response: format!("Error: {reason}"),
                        execution_time: started.elapsed(),
                    });
                }
                Ok(None) => break,
                Err(_) => {
                    warn!(
                        remaining = pending.len(),
                        "Collection deadline reached, leaving stragglers running"
                    );
                    break;
                }
            }
        }
        // Dropping the JoinHandles detaches the remaining workers; they are not aborted.
        drop(pending);

        self.settle_uncollected(generation, collected)
    }

    /// Fills in agents whose task was not collected before the deadline. A worker that reached
    /// `Completed` in the progress table keeps its stored response; the rest time out.
    fn settle_uncollected(
        &self,
        generation: u64,
        collected: Vec<Option<AgentRunResult>>,
    ) -> Vec<AgentRunResult> {
        let mut finished = self.progress.completed_responses(generation);
        let timeout_secs = self.settings.task_timeout.as_secs_f64();
        collected
            .into_iter()
            .enumerate()
            .map(|(agent_id, result)| {
                result.unwrap_or_else(|| {
                    if let Some(response) = finished.remove(&agent_id) {
                        debug!(agent_id, "Recovered a response that finished at the deadline");
                        return AgentRunResult {
                            agent_id,
                            status: RunStatus::Success,
                            response,
                            execution_time: self.settings.task_timeout,
                        };
                    }
                    let message = format!("Agent {} timed out after {}s", agent_id + 1, timeout_secs);
                    self.progress
                        .handle(generation, agent_id)
                        .fail(format!("timed out after {timeout_secs}s"));
                    AgentRunResult {
                        agent_id,
                        status: RunStatus::Timeout,
                        response: message,
                        execution_time: self.settings.task_timeout,
                    }
                })
            })
            .collect()
    }

    /// Reduces the per-agent results to the final answer. `results` may arrive in any order.
    pub async fn aggregate(&self, results: &[AgentRunResult]) -> String {
        let mut sorted: Vec<&AgentRunResult> = results.iter().collect();
        sorted.sort_by_key(|r| r.agent_id);

        let responses: Vec<String> = sorted
            .into_iter()
            .filter(|r| r.is_success())
            .map(|r| r.response.clone())
            .collect();

        match responses.len() {
            0 => {
                warn!("No agent produced a result");
                ALL_AGENTS_FAILED_MESSAGE.to_string()
            }
            1 => responses.into_iter().next().unwrap_or_default(),
            n => match self.settings.aggregation {
                AggregationStrategy::Consensus => {
                    info!("Synthesizing {} responses", n);
                    Synthesizer::new(self.provider.clone(), self.settings.synthesis_prompt.clone())
                        .with_context(self.settings.context())
                        .with_max_iterations(self.settings.max_iterations)
                        .synthesize(&responses)
                        .await
                }
            },
        }
    }
}

struct Worker {
    agent: AgentLoop,
    subtask: String,
    progress: ProgressHandle,
}

impl Worker {
    async fn run(self) -> AgentRunResult {
        let agent_id = self.progress.agent_id();
        let started = Instant::now();

        self.progress.set(ProgressStatus::Initializing);
        debug!(tools = self.agent.tool_registry().len(), "Worker starting");
        self.progress.set(ProgressStatus::Processing);

        let outcome = AssertUnwindSafe(self.agent.run(&self.subtask))
            .catch_unwind()
            .await;

        let (status, response) = match outcome {
            Ok(Ok(response)) => {
                self.progress.complete(&response);
                (RunStatus::Success, response)
            }
            Ok(Err(e)) => {
                warn!("Agent failed: {}", e);
                self.progress.fail(e.to_string());
                (RunStatus::Error, format!("Error: {e}"))
            }
            Err(panic) => {
                let message = panic_message(panic.as_ref());
                error!("Agent panicked: {}", message);
                self.progress.fail(format!("panicked: {message}"));
                (RunStatus::Error, format!("Error: agent panicked: {message}"))
            }
        };

        AgentRunResult {
            agent_id,
            status,
            response,
            execution_time: started.elapsed(),
        }
    }
}
