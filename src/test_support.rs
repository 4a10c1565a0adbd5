//! Test doubles shared by unit tests.

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;

use crate::execution::{ToolAdapter, ToolError};
use crate::monitoring::MemoryProbe;
use crate::workflow::{Parameters, StepResult, StepType};

/// Memory probe that always reports the same usage.
pub struct FixedMemoryProbe(pub u64);

impl MemoryProbe for FixedMemoryProbe {
    fn used_memory_mb(&self) -> u64 {
        self.0
    }
}

/// Canned answer for one invocation.
pub enum Reply {
    Succeed {
        message: String,
        output: Option<String>,
    },
    Fail(String),
    Error(ToolError),
    Panic,
}

impl Reply {
    pub fn succeed(message: &str) -> Self {
        Self::Succeed {
            message: message.to_string(),
            output: None,
        }
    }

    pub fn fail(message: &str) -> Self {
        Self::Fail(message.to_string())
    }

    pub fn error(reason: &str) -> Self {
        Self::Error(ToolError::Launch(reason.to_string()))
    }

    pub fn with_output(self, raw: &str) -> Self {
        match self {
            Self::Succeed { message, .. } => Self::Succeed {
                message,
                output: Some(raw.to_string()),
            },
            other => other,
        }
    }
}

/// Tool adapter that replays scripted replies and records every call.
///
/// Step types without a queued reply succeed with `"<type> ok"`.
pub struct ScriptedTool {
    replies: Mutex<HashMap<StepType, VecDeque<Reply>>>,
    delay: Duration,
    calls: Mutex<Vec<(StepType, Parameters)>>,
    in_flight: AtomicUsize,
    peak: AtomicUsize,
}

impl ScriptedTool {
    pub fn new() -> Self {
        Self {
            replies: Mutex::new(HashMap::new()),
            delay: Duration::ZERO,
            calls: Mutex::new(Vec::new()),
            in_flight: AtomicUsize::new(0),
            peak: AtomicUsize::new(0),
        }
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn reply(self, step_type: StepType, reply: Reply) -> Self {
        self.replies
            .lock()
            .unwrap()
            .entry(step_type)
            .or_default()
            .push_back(reply);
        self
    }

    pub fn calls(&self) -> Vec<(StepType, Parameters)> {
        self.calls.lock().unwrap().clone()
    }

    pub fn invoked_types(&self) -> Vec<StepType> {
        self.calls().into_iter().map(|(t, _)| t).collect()
    }

    /// Highest number of invocations seen running at once.
    pub fn peak_in_flight(&self) -> usize {
        self.peak.load(Ordering::SeqCst)
    }
}

/// Decrements the in-flight counter even when the invocation is dropped.
struct InFlight<'a>(&'a AtomicUsize);

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

#[async_trait]
impl ToolAdapter for ScriptedTool {
    async fn invoke(&self, step_type: StepType, params: Parameters) -> Result<StepResult, ToolError> {
        self.calls.lock().unwrap().push((step_type, params));

        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);
        let _in_flight = InFlight(&self.in_flight);

        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }

        let reply = self
            .replies
            .lock()
            .unwrap()
            .get_mut(&step_type)
            .and_then(VecDeque::pop_front);

        match reply {
            None => Ok(StepResult::success(step_type, format!("{} ok", step_type))),
            Some(Reply::Succeed { message, output }) => {
                let result = StepResult::success(step_type, message);
                Ok(match output {
                    Some(raw) => result.with_output(raw),
                    None => result,
                })
            }
            Some(Reply::Fail(message)) => Ok(StepResult::failure(step_type, message)),
            Some(Reply::Error(err)) => Err(err),
            Some(Reply::Panic) => panic!("scripted panic in {}", step_type),
        }
    }
}
