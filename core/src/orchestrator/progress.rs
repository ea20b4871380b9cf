use std::collections::BTreeMap;
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProgressStatus {
    Queued,
    Initializing,
    Processing,
    Completed,
    Failed(String),
}

impl ProgressStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed(_))
    }
}

impl fmt::Display for ProgressStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Queued => write!(f, "QUEUED"),
            Self::Initializing => write!(f, "INITIALIZING..."),
            Self::Processing => write!(f, "PROCESSING..."),
            Self::Completed => write!(f, "COMPLETED"),
            Self::Failed(reason) => write!(f, "FAILED: {reason}"),
        }
    }
}

#[derive(Debug, Default)]
struct ProgressState {
    generation: u64,
    statuses: BTreeMap<usize, ProgressStatus>,
    responses: BTreeMap<usize, String>,
}

/// Per-agent status table shared between the orchestrator, its workers and any display.
///
/// Every run bumps a generation counter. Handles from an older run keep working but their
/// updates are dropped, so a straggler from a previous run cannot touch the current table.
/// Once an entry reaches `Completed` or `Failed` it no longer changes within the run.
#[derive(Debug, Clone, Default)]
pub struct ProgressTracker {
    state: Arc<Mutex<ProgressState>>,
}

impl ProgressTracker {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, ProgressState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Starts a new run with an empty table and returns its generation.
    pub fn begin_run(&self) -> u64 {
        let mut state = self.lock();
        state.generation += 1;
        state.statuses.clear();
        state.responses.clear();
        state.generation
    }

    /// Marks agents `0..num_agents` as queued, provided `generation` is still current.
    pub fn queue_all(&self, generation: u64, num_agents: usize) {
        let mut state = self.lock();
        if state.generation != generation {
            return;
        }
        state.statuses = (0..num_agents)
            .map(|id| (id, ProgressStatus::Queued))
            .collect();
    }

    pub fn handle(&self, generation: u64, agent_id: usize) -> ProgressHandle {
        ProgressHandle {
            tracker: self.clone(),
            generation,
            agent_id,
        }
    }

    pub fn snapshot(&self) -> BTreeMap<usize, ProgressStatus> {
        self.lock().statuses.clone()
    }

    /// Responses stored by agents that completed in `generation`. Empty once a newer run has
    /// started.
    pub fn completed_responses(&self, generation: u64) -> BTreeMap<usize, String> {
        let state = self.lock();
        if state.generation != generation {
            return BTreeMap::new();
        }
        state.responses.clone()
    }

    fn update(&self, generation: u64, agent_id: usize, status: ProgressStatus, response: Option<&str>) {
        let mut guard = self.lock();
        let state = &mut *guard;
        if state.generation != generation {
            tracing::debug!(agent_id, generation, "Ignoring progress update from a previous run");
            return;
        }
        let Some(current) = state.statuses.get_mut(&agent_id) else {
            return;
        };
        if current.is_terminal() {
            return;
        }
        *current = status;
        if let Some(response) = response {
            state.responses.insert(agent_id, response.to_string());
        }
    }
}

/// The only way a worker mutates its own row of the table.
#[derive(Debug, Clone)]
pub struct ProgressHandle {
    tracker: ProgressTracker,
    generation: u64,
    agent_id: usize,
}

impl ProgressHandle {
    pub fn agent_id(&self) -> usize {
        self.agent_id
    }

    pub fn set(&self, status: ProgressStatus) {
        self.tracker
            .update(self.generation, self.agent_id, status, None);
    }

    pub fn complete(&self, response: &str) {
        self.tracker.update(
            self.generation,
            self.agent_id,
            ProgressStatus::Completed,
            Some(response),
        );
    }

    pub fn fail(&self, reason: impl Into<String>) {
        self.set(ProgressStatus::Failed(reason.into()));
    }
}
