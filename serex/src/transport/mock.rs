//! Scripted in-memory transport for unit tests.
//!
//! A `MockTransport` plays the device side of a console exchange: each
//! scripted rule waits for a write containing its trigger text and then
//! queues one or more response chunks. Chunks are delivered one per read so
//! tests can exercise the chunk-by-chunk accumulation of the expect loop.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use super::Transport;
use crate::error::TransportError;

/// One scripted exchange: a write trigger and the chunks it produces.
#[derive(Debug, Clone)]
pub(crate) struct Rule {
    trigger: String,
    chunks: Vec<Vec<u8>>,
}

impl Rule {
    /// Respond with `reply` to the next write containing `trigger`.
    pub(crate) fn on(trigger: &str, reply: &str) -> Self {
        Self {
            trigger: trigger.to_string(),
            chunks: vec![reply.as_bytes().to_vec()],
        }
    }

    /// Respond with several chunks (delivered one per read).
    pub(crate) fn on_chunks(trigger: &str, chunks: &[&str]) -> Self {
        Self {
            trigger: trigger.to_string(),
            chunks: chunks.iter().map(|c| c.as_bytes().to_vec()).collect(),
        }
    }

    /// Swallow the next write containing `trigger` without responding.
    pub(crate) fn silent(trigger: &str) -> Self {
        Self {
            trigger: trigger.to_string(),
            chunks: Vec::new(),
        }
    }
}

#[derive(Debug, Default)]
struct MockState {
    rules: VecDeque<Rule>,
    pending: VecDeque<Vec<u8>>,
    writes: Vec<String>,
}

/// Test handle onto the shared mock state.
#[derive(Debug, Clone)]
pub(crate) struct MockHandle {
    state: Arc<Mutex<MockState>>,
}

impl MockHandle {
    /// Everything written to the transport so far, lossily decoded.
    pub(crate) fn writes(&self) -> Vec<String> {
        self.state.lock().unwrap().writes.clone()
    }

    /// Whether any write so far contains the given text.
    pub(crate) fn wrote(&self, needle: &str) -> bool {
        self.state
            .lock()
            .unwrap()
            .writes
            .iter()
            .any(|w| w.contains(needle))
    }

    /// Queue a chunk for delivery independent of any write.
    pub(crate) fn push_chunk(&self, chunk: &str) {
        self.state
            .lock()
            .unwrap()
            .pending
            .push_back(chunk.as_bytes().to_vec());
    }
}

/// Scripted transport for tests.
#[derive(Debug)]
pub(crate) struct MockTransport {
    identifier: String,
    state: Arc<Mutex<MockState>>,
}

impl MockTransport {
    pub(crate) fn scripted(identifier: &str, rules: Vec<Rule>) -> (Self, MockHandle) {
        let state = Arc::new(Mutex::new(MockState {
            rules: rules.into(),
            ..MockState::default()
        }));
        let handle = MockHandle {
            state: state.clone(),
        };
        (
            Self {
                identifier: identifier.to_string(),
                state,
            },
            handle,
        )
    }

    pub(crate) fn new(identifier: &str) -> (Self, MockHandle) {
        Self::scripted(identifier, Vec::new())
    }
}

#[async_trait]
impl Transport for MockTransport {
    fn identifier(&self) -> &str {
        &self.identifier
    }

    async fn write(&mut self, data: &[u8]) -> Result<(), TransportError> {
        let text = String::from_utf8_lossy(data).to_string();
        let mut state = self.state.lock().unwrap();
        state.writes.push(text.clone());

        let matched = state
            .rules
            .front()
            .is_some_and(|rule| text.contains(rule.trigger.as_str()));
        if matched {
            let rule = state.rules.pop_front().unwrap();
            state
                .pending
                .extend(rule.chunks.into_iter().filter(|c| !c.is_empty()));
        }
        Ok(())
    }

    async fn bytes_available(&mut self) -> Result<usize, TransportError> {
        let state = self.state.lock().unwrap();
        Ok(state.pending.front().map_or(0, Vec::len))
    }

    async fn read(&mut self, count: usize) -> Result<Vec<u8>, TransportError> {
        let mut state = self.state.lock().unwrap();
        match state.pending.pop_front() {
            Some(mut chunk) => {
                if count < chunk.len() {
                    let rest = chunk.split_off(count);
                    state.pending.push_front(rest);
                }
                Ok(chunk)
            }
            None => Ok(Vec::new()),
        }
    }

    async fn close(&mut self) -> Result<(), TransportError> {
        Ok(())
    }
}
