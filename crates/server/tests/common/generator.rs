//! A scripted stand-in for the Gemini client.

use async_trait::async_trait;
use lyrebird_server::{GenerateRequest, Generator, UpstreamError};
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use tokio::sync::{Notify, Semaphore};

/// What the fake generator answers with.
#[derive(Clone, Debug)]
pub enum Reply {
    Text(String),
    Status(u16),
}

/// Generator returning a fixed reply, optionally held until released.
/// Note: #[allow(dead_code)] because each test file compiles common/ separately.
#[allow(dead_code)]
pub struct FakeGenerator {
    reply: Mutex<Reply>,
    calls: AtomicUsize,
    gate: Option<Semaphore>,
    entered: Notify,
}

#[allow(dead_code)]
impl FakeGenerator {
    pub fn replying(text: impl Into<String>) -> Self {
        Self::build(Reply::Text(text.into()), None)
    }

    pub fn failing(status: u16) -> Self {
        Self::build(Reply::Status(status), None)
    }

    /// Blocks every call until [`FakeGenerator::release`] is called.
    pub fn gated(text: impl Into<String>) -> Self {
        Self::build(Reply::Text(text.into()), Some(Semaphore::new(0)))
    }

    fn build(reply: Reply, gate: Option<Semaphore>) -> Self {
        Self {
            reply: Mutex::new(reply),
            calls: AtomicUsize::new(0),
            gate,
            entered: Notify::new(),
        }
    }

    pub fn set_reply(&self, reply: Reply) {
        *self.reply.lock().unwrap() = reply;
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Let one blocked call proceed.
    pub fn release(&self) {
        if let Some(gate) = &self.gate {
            gate.add_permits(1);
        }
    }

    /// Wait until a call has reached the generator.
    pub async fn wait_until_called(&self) {
        self.entered.notified().await;
    }
}

#[async_trait]
impl Generator for FakeGenerator {
    async fn generate(&self, _request: &GenerateRequest<'_>) -> Result<String, UpstreamError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.entered.notify_one();

        if let Some(gate) = &self.gate {
            gate.acquire()
                .await
                .map_err(|_| UpstreamError::Config("gate closed".to_string()))?
                .forget();
        }

        let reply = self.reply.lock().unwrap().clone();
        match reply {
            Reply::Text(text) => Ok(text),
            Reply::Status(status) => Err(UpstreamError::from_status(status)),
        }
    }
}
