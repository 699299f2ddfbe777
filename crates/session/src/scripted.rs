//! In-memory [`RpcTransport`] for tests and demos.
//!
//! Calls are answered by a handler closure. Faults can be queued in front of
//! the handler, sessions can be expired on demand, and every call is recorded
//! so callers can assert on exactly what reached the backend.

use std::collections::{HashSet, VecDeque};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value as JsonValue;

use crate::config::Credentials;
use crate::fault::RpcFault;
use crate::transport::{RemoteCall, RpcTransport, SessionToken};

type Handler = dyn Fn(&RemoteCall) -> Result<JsonValue, RpcFault> + Send + Sync;

pub struct ScriptedTransport {
    uid: i64,
    handler: Box<Handler>,
    login_delay: Duration,
    login_faults: Mutex<VecDeque<RpcFault>>,
    call_faults: Mutex<VecDeque<RpcFault>>,
    live_sessions: Mutex<HashSet<String>>,
    calls: Mutex<Vec<RemoteCall>>,
    logins: AtomicU32,
    issued: AtomicU32,
}

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

impl ScriptedTransport {
    pub fn new<F>(handler: F) -> Self
    where
        F: Fn(&RemoteCall) -> Result<JsonValue, RpcFault> + Send + Sync + 'static,
    {
        Self {
            uid: 2,
            handler: Box::new(handler),
            login_delay: Duration::ZERO,
            login_faults: Mutex::new(VecDeque::new()),
            call_faults: Mutex::new(VecDeque::new()),
            live_sessions: Mutex::new(HashSet::new()),
            calls: Mutex::new(Vec::new()),
            logins: AtomicU32::new(0),
            issued: AtomicU32::new(0),
        }
    }

    /// Answers every call with the same value.
    pub fn answering(value: JsonValue) -> Self {
        Self::new(move |_| Ok(value.clone()))
    }

    /// Makes every login take a while, to widen race windows in tests.
    pub fn with_login_delay(mut self, delay: Duration) -> Self {
        self.login_delay = delay;
        self
    }

    /// The next login fails with `fault`.
    pub fn fail_next_login(&self, fault: RpcFault) {
        lock(&self.login_faults).push_back(fault);
    }

    /// The next execute fails with `fault` instead of reaching the handler.
    /// Queued faults are consumed in order, one per call.
    pub fn fail_next_call(&self, fault: RpcFault) {
        lock(&self.call_faults).push_back(fault);
    }

    /// Invalidate every session issued so far.
    pub fn expire_sessions(&self) {
        lock(&self.live_sessions).clear();
    }

    /// Successful or failed logins attempted.
    pub fn login_count(&self) -> u32 {
        self.logins.load(Ordering::SeqCst)
    }

    /// Every execute attempt, including failed ones.
    pub fn call_count(&self) -> usize {
        lock(&self.calls).len()
    }

    pub fn calls(&self) -> Vec<RemoteCall> {
        lock(&self.calls).clone()
    }

    /// Calls of one method, in order.
    pub fn calls_to(&self, method: &str) -> Vec<RemoteCall> {
        lock(&self.calls)
            .iter()
            .filter(|c| c.method == method)
            .cloned()
            .collect()
    }
}

#[async_trait]
impl RpcTransport for ScriptedTransport {
    async fn authenticate(&self, _credentials: &Credentials) -> Result<SessionToken, RpcFault> {
        self.logins.fetch_add(1, Ordering::SeqCst);
        if !self.login_delay.is_zero() {
            tokio::time::sleep(self.login_delay).await;
        }
        if let Some(fault) = lock(&self.login_faults).pop_front() {
            return Err(fault);
        }
        let n = self.issued.fetch_add(1, Ordering::SeqCst) + 1;
        let session_id = format!("session-{n}");
        lock(&self.live_sessions).insert(session_id.clone());
        Ok(SessionToken {
            uid: self.uid,
            session_id: Some(session_id),
        })
    }

    async fn execute(
        &self,
        _credentials: &Credentials,
        token: &SessionToken,
        call: &RemoteCall,
    ) -> Result<JsonValue, RpcFault> {
        lock(&self.calls).push(call.clone());

        if let Some(fault) = lock(&self.call_faults).pop_front() {
            return Err(fault);
        }
        let live = token
            .session_id
            .as_ref()
            .is_some_and(|id| lock(&self.live_sessions).contains(id));
        if !live {
            return Err(RpcFault::session_expired("Session expired"));
        }
        (self.handler)(call)
    }
}
