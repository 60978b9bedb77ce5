//! In-memory test doubles for the gateway and retrieval seams.
//!
//! Compiled for this crate's tests and for dependents that enable the
//! `test-utils` feature.

use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use minilangflow_shared::{FlowError, Result};

use crate::gateway::ModelGateway;
use crate::retrieval::{ProcessOutput, RetrievalExecutor};

/// Shared, ordered record of calls made across several doubles.
pub type CallJournal = Arc<Mutex<Vec<&'static str>>>;

/// Create an empty [`CallJournal`].
pub fn journal() -> CallJournal {
    Arc::new(Mutex::new(Vec::new()))
}

// ---------------------------------------------------------------------------
// ScriptedGateway
// ---------------------------------------------------------------------------

/// Gateway returning deterministic text keyed by prompt prefix.
///
/// Prompts are matched after leading whitespace is trimmed. Unmatched
/// prompts get `"reply N"` where `N` is the 1-based call number.
#[derive(Default)]
pub struct ScriptedGateway {
    rules: Vec<(String, String)>,
    fail_at: Option<usize>,
    prompts: Mutex<Vec<String>>,
    journal: Option<CallJournal>,
}

impl ScriptedGateway {
    pub fn new() -> Self {
        Self::default()
    }

    /// Answer prompts starting with `prefix` with `text`.
    pub fn reply(mut self, prefix: &str, text: &str) -> Self {
        self.rules.push((prefix.to_string(), text.to_string()));
        self
    }

    /// Fail the `call`-th generation (1-based) with a gateway error.
    pub fn fail_at(mut self, call: usize) -> Self {
        self.fail_at = Some(call);
        self
    }

    /// Append `"gateway"` to `journal` on every call.
    pub fn with_journal(mut self, journal: CallJournal) -> Self {
        self.journal = Some(journal);
        self
    }

    /// Every prompt received, in call order.
    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().map(|p| p.clone()).unwrap_or_default()
    }

    /// Number of generation calls received.
    pub fn call_count(&self) -> usize {
        self.prompts().len()
    }
}

#[async_trait]
impl ModelGateway for ScriptedGateway {
    async fn generate(&self, prompt: &str) -> Result<String> {
        if let Some(journal) = &self.journal {
            if let Ok(mut calls) = journal.lock() {
                calls.push("gateway");
            }
        }

        let call = match self.prompts.lock() {
            Ok(mut prompts) => {
                prompts.push(prompt.to_string());
                prompts.len()
            }
            Err(_) => return Err(FlowError::Gateway("scripted gateway poisoned".into())),
        };

        if self.fail_at == Some(call) {
            return Err(FlowError::Gateway(format!("scripted failure on call {call}")));
        }

        let trimmed = prompt.trim_start();
        let reply = self
            .rules
            .iter()
            .find(|(prefix, _)| trimmed.starts_with(prefix.as_str()))
            .map(|(_, text)| text.clone())
            .unwrap_or_else(|| format!("reply {call}"));
        Ok(reply)
    }
}

// ---------------------------------------------------------------------------
// CannedRetrieval
// ---------------------------------------------------------------------------

/// Retrieval executor returning a fixed process output without spawning anything.
pub struct CannedRetrieval {
    output: ProcessOutput,
    questions: Mutex<Vec<String>>,
    journal: Option<CallJournal>,
}

impl CannedRetrieval {
    pub fn new(output: ProcessOutput) -> Self {
        Self {
            output,
            questions: Mutex::new(Vec::new()),
            journal: None,
        }
    }

    /// Canned exit-0 process printing `stdout`.
    pub fn stdout(stdout: &str) -> Self {
        Self::new(ProcessOutput::success(stdout))
    }

    /// Append `"retrieval"` to `journal` on every call.
    pub fn with_journal(mut self, journal: CallJournal) -> Self {
        self.journal = Some(journal);
        self
    }

    /// Every question received, in call order.
    pub fn questions(&self) -> Vec<String> {
        self.questions.lock().map(|q| q.clone()).unwrap_or_default()
    }
}

#[async_trait]
impl RetrievalExecutor for CannedRetrieval {
    async fn execute(&self, question: &str) -> Result<ProcessOutput> {
        if let Some(journal) = &self.journal {
            if let Ok(mut calls) = journal.lock() {
                calls.push("retrieval");
            }
        }
        if let Ok(mut questions) = self.questions.lock() {
            questions.push(question.to_string());
        }
        Ok(self.output.clone())
    }
}
