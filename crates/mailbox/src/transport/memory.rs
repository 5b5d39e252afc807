//! In-memory transport implementation
//!
//! Replies are scripted per `(method, path)` and every executed request is
//! recorded. Used by tests and by hosts running without a network.

use std::collections::{HashMap, VecDeque};
use std::sync::{Mutex, MutexGuard, PoisonError};

use serde_json::Value;

use super::{Method, Request, Transport};
use crate::error::{MailboxError, Result};

type Key = (Method, String);

#[derive(Default)]
struct Script {
    /// One-shot replies consumed in order
    queued: HashMap<Key, VecDeque<Result<Value>>>,
    /// Replies returned whenever the queue for a key is empty
    fallback: HashMap<Key, Result<Value>>,
    log: Vec<Request>,
}

/// Scripted transport that records requests
#[derive(Default)]
pub struct RecordingTransport {
    script: Mutex<Script>,
}

fn key(method: Method, path: &str) -> Key {
    (method, path.trim_start_matches('/').to_string())
}

impl RecordingTransport {
    pub fn new() -> Self {
        Self::default()
    }

    fn script(&self) -> MutexGuard<'_, Script> {
        self.script.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Queue a successful reply for the next matching request
    pub fn reply(&self, method: Method, path: &str, body: Value) -> &Self {
        self.script()
            .queued
            .entry(key(method, path))
            .or_default()
            .push_back(Ok(body));
        self
    }

    /// Queue a failure for the next matching request
    pub fn fail(&self, method: Method, path: &str, error: MailboxError) -> &Self {
        self.script()
            .queued
            .entry(key(method, path))
            .or_default()
            .push_back(Err(error));
        self
    }

    /// Reply with `body` to every matching request once the queue is drained
    pub fn always(&self, method: Method, path: &str, body: Value) -> &Self {
        self.script().fallback.insert(key(method, path), Ok(body));
        self
    }

    /// Every request executed so far, in order
    pub fn requests(&self) -> Vec<Request> {
        self.script().log.clone()
    }

    /// Requests sent to one endpoint
    pub fn requests_to(&self, method: Method, path: &str) -> Vec<Request> {
        let (method, path) = key(method, path);
        self.script()
            .log
            .iter()
            .filter(|r| r.method == method && r.path.trim_start_matches('/') == path)
            .cloned()
            .collect()
    }

    pub fn count(&self, method: Method, path: &str) -> usize {
        self.requests_to(method, path).len()
    }

    pub fn clear_log(&self) {
        self.script().log.clear();
    }
}

impl Transport for RecordingTransport {
    fn execute(&self, request: &Request) -> Result<Value> {
        let mut script = self.script();
        script.log.push(request.clone());

        let key = key(request.method, &request.path);
        if let Some(reply) = script.queued.get_mut(&key).and_then(|queue| queue.pop_front()) {
            return reply;
        }
        match script.fallback.get(&key) {
            Some(reply) => reply.clone(),
            None => Ok(Value::Null),
        }
    }
}
