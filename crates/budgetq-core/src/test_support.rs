//! Capability test doubles shared by unit tests.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use budgetq_model::{
    EmbeddingModel, GenerationModel, GenerationRequest, ModelError, ModelResult,
};

/// Embeds text as a 0/1 vector: one dimension per keyword it contains.
#[derive(Debug)]
pub struct KeywordEmbedding {
    pub keywords: Vec<&'static str>,
    pub delay: Option<Duration>,
    pub fail: bool,
    pub calls: AtomicUsize,
}

impl KeywordEmbedding {
    pub fn new(keywords: Vec<&'static str>) -> Self {
        Self {
            keywords,
            delay: None,
            fail: false,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn vector_for(&self, text: &str) -> Vec<f32> {
        let lower = text.to_lowercase();
        self.keywords
            .iter()
            .map(|k| if lower.contains(k) { 1.0 } else { 0.0 })
            .collect()
    }
}

#[async_trait]
impl EmbeddingModel for KeywordEmbedding {
    async fn embed(&self, texts: &[String]) -> ModelResult<Vec<Vec<f32>>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        if self.fail {
            return Err(ModelError::request("keyword-test", "connection refused"));
        }
        Ok(texts.iter().map(|t| self.vector_for(t)).collect())
    }

    fn model_id(&self) -> &str {
        "keyword-test"
    }

    fn dimension(&self) -> Option<usize> {
        Some(self.keywords.len())
    }
}

/// One scripted generator response.
#[derive(Debug, Clone)]
pub enum Step {
    /// Answer with this text.
    Reply(&'static str),
    /// Fail with a transient transport error.
    Fail,
    /// Fail with a non-transient error.
    Fatal,
    /// Sleep, then answer.
    Delay(Duration, &'static str),
}

/// Replays a fixed script of responses, then a fallback reply if set.
#[derive(Debug)]
pub struct ScriptedGenerator {
    steps: Mutex<VecDeque<Step>>,
    fallback: Option<&'static str>,
    calls: AtomicUsize,
    prompts: Mutex<Vec<String>>,
}

impl ScriptedGenerator {
    pub fn new(steps: Vec<Step>) -> Self {
        Self {
            steps: Mutex::new(steps.into()),
            fallback: None,
            calls: AtomicUsize::new(0),
            prompts: Mutex::new(Vec::new()),
        }
    }

    pub fn always(reply: &'static str) -> Self {
        Self::new(Vec::new()).with_fallback(reply)
    }

    pub fn with_fallback(mut self, reply: &'static str) -> Self {
        self.fallback = Some(reply);
        self
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().unwrap().clone()
    }
}

#[async_trait]
impl GenerationModel for ScriptedGenerator {
    async fn complete(&self, request: &GenerationRequest) -> ModelResult<String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.prompts.lock().unwrap().push(request.prompt.clone());

        let step = self.steps.lock().unwrap().pop_front();
        match step {
            Some(Step::Reply(text)) => Ok(text.to_string()),
            Some(Step::Fail) => Err(ModelError::request("scripted", "connection reset")),
            Some(Step::Fatal) => Err(ModelError::MissingApiKey {
                env_var: "OPENAI_API_KEY".to_string(),
            }),
            Some(Step::Delay(delay, text)) => {
                tokio::time::sleep(delay).await;
                Ok(text.to_string())
            }
            None => match self.fallback {
                Some(text) => Ok(text.to_string()),
                None => Err(ModelError::EmptyResponse {
                    model_id: "scripted".to_string(),
                }),
            },
        }
    }

    fn model_id(&self) -> &str {
        "scripted"
    }
}
