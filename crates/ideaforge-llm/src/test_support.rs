//! In-process backend doubles for tests across the workspace.

use async_trait::async_trait;
use ideaforge_utils::error::LlmError;
use std::collections::VecDeque;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use crate::types::{LlmBackend, LlmInvocation, LlmResult};

type Responder = Box<dyn Fn(&LlmInvocation) -> Result<String, LlmError> + Send + Sync>;

/// Backend that answers from a script.
///
/// Each call pops the next scripted reply. Once the script is empty the
/// responder (if any) answers, then the standing reply set by `always_*`.
/// With none of those the call fails with a transport error.
pub struct ScriptedBackend {
    name: String,
    default_model: String,
    delay: Duration,
    script: Mutex<VecDeque<Result<String, LlmError>>>,
    responder: Option<Responder>,
    standing: Option<Result<String, LlmError>>,
    calls: AtomicUsize,
    invocations: Mutex<Vec<LlmInvocation>>,
}

impl ScriptedBackend {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            default_model: "scripted-model".to_string(),
            delay: Duration::ZERO,
            script: Mutex::new(VecDeque::new()),
            responder: None,
            standing: None,
            calls: AtomicUsize::new(0),
            invocations: Mutex::new(Vec::new()),
        }
    }

    #[must_use]
    pub fn with_default_model(mut self, model: impl Into<String>) -> Self {
        self.default_model = model.into();
        self
    }

    /// Sleep this long inside every call.
    #[must_use]
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    #[must_use]
    pub fn then_ok(self, text: impl Into<String>) -> Self {
        self.push(Ok(text.into()))
    }

    #[must_use]
    pub fn then_err(self, err: LlmError) -> Self {
        self.push(Err(err))
    }

    #[must_use]
    pub fn always_ok(mut self, text: impl Into<String>) -> Self {
        self.standing = Some(Ok(text.into()));
        self
    }

    #[must_use]
    pub fn always_err(mut self, err: LlmError) -> Self {
        self.standing = Some(Err(err));
        self
    }

    /// Answer with a function of the invocation.
    #[must_use]
    pub fn with_responder(
        mut self,
        responder: impl Fn(&LlmInvocation) -> Result<String, LlmError> + Send + Sync + 'static,
    ) -> Self {
        self.responder = Some(Box::new(responder));
        self
    }

    fn push(self, reply: Result<String, LlmError>) -> Self {
        if let Ok(mut script) = self.script.lock() {
            script.push_back(reply);
        }
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn invocations(&self) -> Vec<LlmInvocation> {
        self.invocations.lock().map(|i| i.clone()).unwrap_or_default()
    }

    pub fn last_invocation(&self) -> Option<LlmInvocation> {
        self.invocations().pop()
    }

    pub fn models_seen(&self) -> Vec<String> {
        self.invocations().into_iter().map(|i| i.model).collect()
    }

    /// Every message body sent, concatenated per call.
    pub fn prompts(&self) -> Vec<String> {
        self.invocations()
            .into_iter()
            .map(|inv| {
                inv.messages
                    .iter()
                    .map(|m| m.content.as_str())
                    .collect::<Vec<_>>()
                    .join("\n")
            })
            .collect()
    }

    fn next_reply(&self, inv: &LlmInvocation) -> Result<String, LlmError> {
        let scripted = self.script.lock().ok().and_then(|mut s| s.pop_front());
        if let Some(reply) = scripted {
            return reply;
        }
        if let Some(responder) = &self.responder {
            return responder(inv);
        }
        match &self.standing {
            Some(reply) => reply.clone(),
            None => Err(LlmError::Transport(format!("{} script exhausted", self.name))),
        }
    }
}

#[async_trait]
impl LlmBackend for ScriptedBackend {
    fn name(&self) -> &str {
        &self.name
    }

    fn default_model(&self) -> &str {
        &self.default_model
    }

    async fn invoke(&self, inv: LlmInvocation) -> Result<LlmResult, LlmError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Ok(mut invocations) = self.invocations.lock() {
            invocations.push(inv.clone());
        }
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        let model = if inv.model.is_empty() {
            self.default_model.clone()
        } else {
            inv.model.clone()
        };
        self.next_reply(&inv)
            .map(|text| LlmResult::new(text, self.name.clone(), model))
    }
}
