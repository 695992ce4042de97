//! Scripted model for deterministic tests.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;

use crate::provider::{GenerationRequest, GenerativeModel, ProviderError, ProviderResult};

/// One scripted reply.
#[derive(Clone, Debug)]
pub enum MockReply {
    /// Return this text.
    Text(String),
    /// Fail with [`ProviderError::Other`] carrying this message.
    Fail(String),
    /// Sleep, then behave like the inner reply.
    Delay(Duration, Box<MockReply>),
}

impl MockReply {
    /// Text reply.
    pub fn text(text: impl Into<String>) -> Self {
        Self::Text(text.into())
    }

    /// Wrap a reply with a delay.
    pub fn delayed(delay: Duration, inner: MockReply) -> Self {
        Self::Delay(delay, Box::new(inner))
    }
}

/// Model returning scripted replies in order and recording every request.
pub struct MockModel {
    replies: Vec<MockReply>,
    call_count: AtomicUsize,
    requests: Mutex<Vec<GenerationRequest>>,
}

impl MockModel {
    /// Replies are consumed one per call; calls past the end fail.
    pub fn new(replies: Vec<MockReply>) -> Self {
        Self {
            replies,
            call_count: AtomicUsize::new(0),
            requests: Mutex::new(Vec::new()),
        }
    }

    /// Single text reply.
    pub fn replying(text: impl Into<String>) -> Self {
        Self::new(vec![MockReply::text(text)])
    }

    /// Number of `generate` calls so far.
    pub fn call_count(&self) -> usize {
        self.call_count.load(Ordering::SeqCst)
    }

    /// Requests received, in call order.
    pub fn requests(&self) -> Vec<GenerationRequest> {
        self.requests.lock().clone()
    }
}

#[async_trait]
impl GenerativeModel for MockModel {
    fn model(&self) -> &str {
        "mock-model"
    }

    async fn generate(&self, request: &GenerationRequest) -> ProviderResult<String> {
        let idx = self.call_count.fetch_add(1, Ordering::SeqCst);
        self.requests.lock().push(request.clone());

        let Some(mut reply) = self.replies.get(idx).cloned() else {
            return Err(ProviderError::Other {
                message: format!("mock model: no reply configured for call {idx}"),
            });
        };

        loop {
            match reply {
                MockReply::Text(text) => return Ok(text),
                MockReply::Fail(message) => return Err(ProviderError::Other { message }),
                MockReply::Delay(delay, inner) => {
                    tokio::time::sleep(delay).await;
                    reply = *inner;
                }
            }
        }
    }
}
