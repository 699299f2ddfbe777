//! The process-wide authenticated session and its call primitives.
//!
//! One [`SessionClient`] is built at startup and shared (behind an `Arc`) by
//! every resolver and executor. It logs in lazily on the first call, retries
//! transient network faults, and transparently re-authenticates once when the
//! backend reports an expired session.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;
use serde_json::{json, Map, Value as JsonValue};
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, info, warn};

use erpbridge_core::query::render_order;
use erpbridge_core::record::records_from;
use erpbridge_core::{BridgeError, BridgeResult, Filter, Projection, QuerySpec, Record, RecordRef};

use crate::config::SessionConfig;
use crate::fault::{FaultKind, RpcFault};
use crate::transport::{RemoteCall, RpcTransport, SessionToken};

#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
    Unauthenticated,
    Authenticated,
    Expired,
}

/// Read-only snapshot of the session.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Session {
    pub endpoint: String,
    pub database: String,
    pub username: String,
    pub uid: Option<i64>,
    /// Bumped on every successful login.
    pub generation: u64,
    pub state: SessionState,
}

/// Transport-level counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ClientStats {
    /// Every `execute` handed to the transport, retries and replays included.
    pub attempts: u64,
    pub retries: u64,
    /// Login round-trips, successful or not.
    pub authentications: u64,
    /// Logins caused by an expired session.
    pub reauthentications: u64,
    pub replays: u64,
}

#[derive(Default)]
struct Counters {
    attempts: AtomicU64,
    retries: AtomicU64,
    authentications: AtomicU64,
    reauthentications: AtomicU64,
    replays: AtomicU64,
}

impl Counters {
    fn bump(counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::Relaxed);
    }

    fn snapshot(&self) -> ClientStats {
        ClientStats {
            attempts: self.attempts.load(Ordering::Relaxed),
            retries: self.retries.load(Ordering::Relaxed),
            authentications: self.authentications.load(Ordering::Relaxed),
            reauthentications: self.reauthentications.load(Ordering::Relaxed),
            replays: self.replays.load(Ordering::Relaxed),
        }
    }
}

struct State {
    token: Option<SessionToken>,
    generation: u64,
    state: SessionState,
}

pub struct SessionClient {
    config: SessionConfig,
    transport: Arc<dyn RpcTransport>,
    state: RwLock<State>,
    /// Held for the whole login round-trip so at most one is in flight.
    auth_lock: Mutex<()>,
    counters: Counters,
}

impl SessionClient {
    pub fn new(config: SessionConfig, transport: Arc<dyn RpcTransport>) -> Self {
        Self {
            config,
            transport,
            state: RwLock::new(State {
                token: None,
                generation: 0,
                state: SessionState::Unauthenticated,
            }),
            auth_lock: Mutex::new(()),
            counters: Counters::default(),
        }
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    pub async fn session(&self) -> Session {
        let state = self.state.read().await;
        let creds = &self.config.credentials;
        Session {
            endpoint: creds.endpoint.to_string(),
            database: creds.database.clone(),
            username: creds.username.clone(),
            uid: state.token.as_ref().map(|t| t.uid),
            generation: state.generation,
            state: state.state,
        }
    }

    pub fn stats(&self) -> ClientStats {
        self.counters.snapshot()
    }

    /// Log in now instead of on the first call.
    ///
    /// Fails with [`BridgeError::Authentication`] when the credentials are
    /// rejected or the endpoint stays unreachable for the whole retry budget.
    pub async fn authenticate(&self) -> BridgeResult<Session> {
        let seen = self.state.read().await.generation;
        self.login(seen, false).await?;
        Ok(self.session().await)
    }

    /// Drop the session; the next call logs in again.
    pub async fn logout(&self) {
        let _guard = self.auth_lock.lock().await;
        let mut state = self.state.write().await;
        state.token = None;
        state.state = SessionState::Unauthenticated;
        info!(database = %self.config.credentials.database, "session closed");
    }

    /// Execute one remote method.
    ///
    /// Transient network faults are retried per the configured policy. An
    /// expired session triggers one re-authentication and one replay; a second
    /// expiry is reported as [`BridgeError::Authentication`].
    pub async fn call(&self, call: RemoteCall) -> BridgeResult<JsonValue> {
        let (token, generation) = self.current_token().await?;

        let fault = match self.execute_with_retry(&token, &call).await {
            Ok(value) => return Ok(value),
            Err(fault) if fault.kind == FaultKind::SessionExpired => fault,
            Err(fault) => return Err(self.surface(fault, &call)),
        };

        warn!(
            collection = %call.collection,
            method = %call.method,
            generation,
            reason = %fault.message,
            "session expired, re-authenticating"
        );
        self.mark_expired(generation).await;
        let (token, renewed) = self.login(generation, true).await?;

        Counters::bump(&self.counters.replays);
        match self.execute_with_retry(&token, &call).await {
            Ok(value) => Ok(value),
            Err(fault) if fault.kind == FaultKind::SessionExpired => {
                self.mark_expired(renewed).await;
                Err(BridgeError::authentication(format!(
                    "session expired again after re-authentication ({}.{})",
                    call.collection, call.method
                )))
            }
            Err(fault) => Err(self.surface(fault, &call)),
        }
    }

    /// `search_read` driven by a [`QuerySpec`].
    pub async fn search_read(&self, spec: &QuerySpec) -> BridgeResult<Vec<Record>> {
        let mut kwargs = Map::new();
        kwargs.insert("domain".into(), spec.filter.to_domain());
        if let Some(fields) = spec.projection.as_fields() {
            kwargs.insert("fields".into(), json!(fields));
        }
        if spec.page.offset > 0 {
            kwargs.insert("offset".into(), json!(spec.page.offset));
        }
        if let Some(limit) = spec.page.limit {
            kwargs.insert("limit".into(), json!(limit));
        }
        if let Some(order) = render_order(&spec.order) {
            kwargs.insert("order".into(), json!(order));
        }

        let value = self
            .call(RemoteCall::new(&spec.collection, "search_read").with_kwargs(kwargs))
            .await?;
        Ok(records_from(value))
    }

    pub async fn search_count(&self, collection: &str, filter: &Filter) -> BridgeResult<u64> {
        let value = self
            .call(RemoteCall::new(collection, "search_count").with_args(vec![filter.to_domain()]))
            .await?;
        value.as_u64().ok_or_else(|| {
            BridgeError::validation(format!("{collection}.search_count returned {value}"))
        })
    }

    /// Read records by id. Missing ids are silently absent from the result.
    pub async fn read(
        &self,
        collection: &str,
        ids: &[i64],
        projection: &Projection,
        context: Option<Map<String, JsonValue>>,
    ) -> BridgeResult<Vec<Record>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let mut kwargs = Map::new();
        if let Some(fields) = projection.as_fields() {
            kwargs.insert("fields".into(), json!(fields));
        }
        if let Some(context) = context {
            kwargs.insert("context".into(), JsonValue::Object(context));
        }
        let value = self
            .call(
                RemoteCall::new(collection, "read")
                    .with_args(vec![json!(ids)])
                    .with_kwargs(kwargs),
            )
            .await?;
        Ok(records_from(value))
    }

    /// Read a single record, failing with `NotFound` when it does not exist.
    pub async fn read_one(&self, reference: &RecordRef, projection: &Projection) -> BridgeResult<Record> {
        self.read(reference.collection(), &[reference.id().get()], projection, None)
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| BridgeError::not_found(format!("{reference} does not exist")))
    }

    /// Create one record and return its id.
    pub async fn create(&self, collection: &str, values: Map<String, JsonValue>) -> BridgeResult<i64> {
        let value = self
            .call(RemoteCall::new(collection, "create").with_args(vec![JsonValue::Object(values)]))
            .await?;
        match &value {
            JsonValue::Number(n) => n.as_i64(),
            JsonValue::Array(ids) if ids.len() == 1 => ids[0].as_i64(),
            _ => None,
        }
        .ok_or_else(|| BridgeError::validation(format!("{collection}.create returned {value}")))
    }

    /// Create several records in one round-trip.
    pub async fn create_many(
        &self,
        collection: &str,
        values: Vec<Map<String, JsonValue>>,
    ) -> BridgeResult<Vec<i64>> {
        let expected = values.len();
        let batch = values.into_iter().map(JsonValue::Object).collect::<Vec<_>>();
        let value = self
            .call(RemoteCall::new(collection, "create").with_args(vec![JsonValue::Array(batch)]))
            .await?;
        let ids: Vec<i64> = value
            .as_array()
            .map(|items| items.iter().filter_map(JsonValue::as_i64).collect())
            .unwrap_or_default();
        if ids.len() != expected {
            return Err(BridgeError::validation(format!(
                "{collection}.create returned {} ids for {expected} records",
                ids.len()
            )));
        }
        Ok(ids)
    }

    pub async fn write(
        &self,
        collection: &str,
        ids: &[i64],
        values: Map<String, JsonValue>,
    ) -> BridgeResult<()> {
        self.call(
            RemoteCall::new(collection, "write")
                .with_args(vec![json!(ids), JsonValue::Object(values)]),
        )
        .await?;
        Ok(())
    }

    /// Invoke a named business method (e.g. `action_confirm`) on records.
    pub async fn call_method(&self, collection: &str, method: &str, ids: &[i64]) -> BridgeResult<JsonValue> {
        self.call(RemoteCall::new(collection, method).with_args(vec![json!(ids)]))
            .await
    }

    async fn current_token(&self) -> BridgeResult<(SessionToken, u64)> {
        let seen = {
            let state = self.state.read().await;
            if let (Some(token), SessionState::Authenticated) = (&state.token, state.state) {
                return Ok((token.clone(), state.generation));
            }
            state.generation
        };
        self.login(seen, false).await
    }

    async fn mark_expired(&self, generation: u64) {
        let mut state = self.state.write().await;
        if state.generation == generation && state.state == SessionState::Authenticated {
            state.state = SessionState::Expired;
        }
    }

    /// Log in unless somebody already did since `seen_generation`.
    async fn login(&self, seen_generation: u64, after_expiry: bool) -> BridgeResult<(SessionToken, u64)> {
        let _guard = self.auth_lock.lock().await;
        {
            let state = self.state.read().await;
            if state.generation != seen_generation && state.state == SessionState::Authenticated {
                if let Some(token) = &state.token {
                    debug!(generation = state.generation, "reusing session established concurrently");
                    return Ok((token.clone(), state.generation));
                }
            }
        }

        let creds = &self.config.credentials;
        let policy = &self.config.retry;
        let mut attempt = 0u32;
        let token = loop {
            attempt += 1;
            Counters::bump(&self.counters.authentications);
            if after_expiry {
                Counters::bump(&self.counters.reauthentications);
            }
            let outcome = tokio::time::timeout(self.config.timeout, self.transport.authenticate(creds))
                .await
                .unwrap_or_else(|_| {
                    Err(RpcFault::transient(format!(
                        "login timed out after {:?}",
                        self.config.timeout
                    )))
                });
            match outcome {
                Ok(token) => break token,
                Err(fault) if fault.retryable && policy.allows_another(attempt) => {
                    warn!(attempt, reason = %fault.message, "login failed, retrying");
                    Counters::bump(&self.counters.retries);
                    tokio::time::sleep(policy.delay_after(attempt)).await;
                }
                Err(fault) => {
                    warn!(
                        attempt,
                        database = %creds.database,
                        username = %creds.username,
                        reason = %fault.message,
                        "authentication failed"
                    );
                    return Err(BridgeError::authentication(match fault.kind {
                        FaultKind::Network => format!(
                            "backend unreachable after {attempt} attempt(s): {}",
                            fault.message
                        ),
                        _ => fault.message,
                    }));
                }
            }
        };

        let mut state = self.state.write().await;
        state.token = Some(token.clone());
        state.generation += 1;
        state.state = SessionState::Authenticated;
        info!(
            uid = token.uid,
            generation = state.generation,
            database = %creds.database,
            "authenticated"
        );
        Ok((token, state.generation))
    }

    async fn execute_with_retry(&self, token: &SessionToken, call: &RemoteCall) -> Result<JsonValue, RpcFault> {
        let policy = &self.config.retry;
        let mut attempt = 0u32;
        loop {
            attempt += 1;
            Counters::bump(&self.counters.attempts);
            debug!(collection = %call.collection, method = %call.method, attempt, "remote call");

            let outcome = tokio::time::timeout(
                self.config.timeout,
                self.transport.execute(&self.config.credentials, token, call),
            )
            .await
            .unwrap_or_else(|_| {
                Err(RpcFault::transient(format!(
                    "call timed out after {:?}",
                    self.config.timeout
                )))
            });

            match outcome {
                Err(fault) if fault.retryable && policy.allows_another(attempt) => {
                    warn!(
                        collection = %call.collection,
                        method = %call.method,
                        attempt,
                        reason = %fault.message,
                        "transient failure, retrying"
                    );
                    Counters::bump(&self.counters.retries);
                    tokio::time::sleep(policy.delay_after(attempt)).await;
                }
                other => return other,
            }
        }
    }

    fn surface(&self, fault: RpcFault, call: &RemoteCall) -> BridgeError {
        warn!(
            collection = %call.collection,
            method = %call.method,
            kind = ?fault.kind,
            reason = %fault.message,
            "remote call failed"
        );
        fault.into_bridge_error(call)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    use erpbridge_core::{RecordId, RemoteErrorKind};
    use url::Url;

    use crate::config::Credentials;
    use crate::retry::RetryPolicy;
    use crate::scripted::ScriptedTransport;

    fn config() -> SessionConfig {
        SessionConfig::new(Credentials::new(
            Url::parse("http://localhost:8069").unwrap(),
            "test",
            "admin",
            "admin",
        ))
        .with_retry(RetryPolicy::immediate(3))
    }

    fn client_with(transport: ScriptedTransport) -> (SessionClient, Arc<ScriptedTransport>) {
        let transport = Arc::new(transport);
        (SessionClient::new(config(), transport.clone()), transport)
    }

    fn ping() -> RemoteCall {
        RemoteCall::new("res.partner", "search_count").with_args(vec![json!([])])
    }

    #[tokio::test]
    async fn logs_in_lazily_on_first_call() {
        let (client, transport) = client_with(ScriptedTransport::answering(json!(7)));
        assert_eq!(client.session().await.state, SessionState::Unauthenticated);

        assert_eq!(client.call(ping()).await.unwrap(), json!(7));
        assert_eq!(transport.login_count(), 1);

        let session = client.session().await;
        assert_eq!(session.state, SessionState::Authenticated);
        assert_eq!(session.generation, 1);
        assert_eq!(session.uid, Some(2));
    }

    #[tokio::test]
    async fn one_transient_failure_then_success_takes_two_attempts() {
        let (client, transport) = client_with(ScriptedTransport::answering(json!(42)));
        client.authenticate().await.unwrap();
        transport.fail_next_call(RpcFault::transient("connection reset by peer"));

        let value = client.call(ping()).await.unwrap();

        assert_eq!(value, json!(42));
        assert_eq!(transport.call_count(), 2);
        assert_eq!(client.stats().attempts, 2);
        assert_eq!(client.stats().retries, 1);
    }

    #[tokio::test]
    async fn retry_budget_is_bounded() {
        let (client, transport) = client_with(ScriptedTransport::answering(json!(1)));
        client.authenticate().await.unwrap();
        for _ in 0..5 {
            transport.fail_next_call(RpcFault::transient("timeout"));
        }

        let err = client.call(ping()).await.unwrap_err();
        assert_eq!(err.kind(), "remote_call_error.network");
        assert_eq!(transport.call_count(), 3);
    }

    #[tokio::test]
    async fn terminal_faults_are_not_retried() {
        let (client, transport) = client_with(ScriptedTransport::answering(json!(1)));
        client.authenticate().await.unwrap();
        let payload = json!({"code": 200, "data": {"name": "odoo.exceptions.ValidationError", "message": "bad"}});
        transport.fail_next_call(RpcFault::from_backend_error(&payload));

        match client.call(ping()).await.unwrap_err() {
            BridgeError::RemoteCall(e) => {
                assert_eq!(e.kind, RemoteErrorKind::Validation);
                assert_eq!(e.payload, payload);
                assert_eq!(e.collection, "res.partner");
            }
            other => panic!("unexpected {other:?}"),
        }
        assert_eq!(transport.call_count(), 1);
    }

    #[tokio::test]
    async fn expired_session_reauthenticates_once_and_replays_once() {
        let (client, transport) = client_with(ScriptedTransport::answering(json!("ok")));
        client.authenticate().await.unwrap();
        transport.expire_sessions();

        assert_eq!(client.call(ping()).await.unwrap(), json!("ok"));
        assert_eq!(transport.login_count(), 2);
        assert_eq!(transport.call_count(), 2);
        let stats = client.stats();
        assert_eq!(stats.reauthentications, 1);
        assert_eq!(stats.replays, 1);
        assert_eq!(client.session().await.generation, 2);
    }

    #[tokio::test]
    async fn second_expiry_surfaces_as_authentication_error() {
        let (client, transport) = client_with(ScriptedTransport::answering(json!("ok")));
        client.authenticate().await.unwrap();
        transport.fail_next_call(RpcFault::session_expired("Session expired"));
        transport.fail_next_call(RpcFault::session_expired("Session expired"));

        let err = client.call(ping()).await.unwrap_err();
        assert!(matches!(err, BridgeError::Authentication(_)));
        assert_eq!(transport.login_count(), 2);
        assert_eq!(transport.call_count(), 2);
        assert_eq!(client.stats().replays, 1);
    }

    #[tokio::test]
    async fn rejected_credentials_are_terminal() {
        let (client, transport) = client_with(ScriptedTransport::answering(json!(1)));
        transport.fail_next_login(RpcFault::authentication("login rejected"));

        let err = client.authenticate().await.unwrap_err();
        assert!(matches!(err, BridgeError::Authentication(_)));
        assert_eq!(transport.login_count(), 1);
        assert_eq!(transport.call_count(), 0);
    }

    #[tokio::test]
    async fn unreachable_endpoint_is_an_authentication_error_after_the_budget() {
        let (client, transport) = client_with(ScriptedTransport::answering(json!(1)));
        for _ in 0..3 {
            transport.fail_next_login(RpcFault::transient("connection refused"));
        }
        let err = client.authenticate().await.unwrap_err();
        assert!(matches!(err, BridgeError::Authentication(m) if m.contains("3 attempt")));
        assert_eq!(transport.login_count(), 3);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_expiry_triggers_a_single_reauthentication() {
        let transport = ScriptedTransport::answering(json!("ok")).with_login_delay(Duration::from_millis(50));
        let (client, transport) = client_with(transport);
        let client = Arc::new(client);
        client.authenticate().await.unwrap();
        transport.expire_sessions();

        let tasks: Vec<_> = (0..8)
            .map(|_| {
                let client = client.clone();
                tokio::spawn(async move { client.call(ping()).await })
            })
            .collect();
        for task in tasks {
            assert_eq!(task.await.unwrap().unwrap(), json!("ok"));
        }

        assert_eq!(transport.login_count(), 2);
        assert_eq!(client.session().await.generation, 2);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_first_calls_share_one_login() {
        let transport = ScriptedTransport::answering(json!(1)).with_login_delay(Duration::from_millis(50));
        let (client, transport) = client_with(transport);
        let client = Arc::new(client);

        let tasks: Vec<_> = (0..8)
            .map(|_| {
                let client = client.clone();
                tokio::spawn(async move { client.current_token().await })
            })
            .collect();
        for task in tasks {
            let (token, generation) = task.await.unwrap().unwrap();
            assert_eq!(generation, 1);
            assert_eq!(token.session_id.as_deref(), Some("session-1"));
        }
        assert_eq!(transport.login_count(), 1);
    }

    #[tokio::test]
    async fn slow_calls_time_out_as_transient_failures() {
        struct Stalled;

        #[async_trait::async_trait]
        impl RpcTransport for Stalled {
            async fn authenticate(&self, _: &Credentials) -> Result<SessionToken, RpcFault> {
                Ok(SessionToken::new(1))
            }
            async fn execute(&self, _: &Credentials, _: &SessionToken, _: &RemoteCall) -> Result<JsonValue, RpcFault> {
                tokio::time::sleep(Duration::from_secs(5)).await;
                Ok(JsonValue::Null)
            }
        }

        let config = config().with_timeout(Duration::from_millis(20));
        let client = SessionClient::new(config, Arc::new(Stalled));
        let err = client.call(ping()).await.unwrap_err();
        assert_eq!(err.kind(), "remote_call_error.network");
        assert_eq!(client.stats().attempts, 3);
    }

    #[tokio::test]
    async fn search_read_renders_the_query() {
        let (client, transport) = client_with(ScriptedTransport::answering(json!([{"id": 1, "name": "SO001"}])));
        let spec = QuerySpec::new("sale.order")
            .with_projection(Projection::fields(["id", "name"]))
            .with_order(vec![erpbridge_core::OrderBy::desc("date_order")])
            .with_page(erpbridge_core::Page::bounded(20, 10));

        let records = client.search_read(&spec).await.unwrap();
        assert_eq!(records.len(), 1);

        let call = &transport.calls_to("search_read")[0];
        assert_eq!(call.kwargs["domain"], json!([]));
        assert_eq!(call.kwargs["fields"], json!(["id", "name"]));
        assert_eq!(call.kwargs["offset"], json!(20));
        assert_eq!(call.kwargs["limit"], json!(10));
        assert_eq!(call.kwargs["order"], json!("date_order desc"));
    }

    #[tokio::test]
    async fn default_projection_omits_fields() {
        let (client, transport) = client_with(ScriptedTransport::answering(json!([])));
        client.search_read(&QuerySpec::new("res.partner")).await.unwrap();
        let call = &transport.calls_to("search_read")[0];
        assert!(!call.kwargs.contains_key("fields"));
        assert!(!call.kwargs.contains_key("limit"));
    }

    #[tokio::test]
    async fn read_one_reports_missing_records() {
        let (client, _) = client_with(ScriptedTransport::answering(json!([])));
        let reference = RecordRef::new("sale.order", RecordId::new(99).unwrap());
        let err = client.read_one(&reference, &Projection::Default).await.unwrap_err();
        assert_eq!(err.kind(), "not_found_error");
    }

    #[tokio::test]
    async fn logout_forces_a_new_login() {
        let (client, transport) = client_with(ScriptedTransport::answering(json!(1)));
        client.call(ping()).await.unwrap();
        client.logout().await;
        assert_eq!(client.session().await.state, SessionState::Unauthenticated);
        client.call(ping()).await.unwrap();
        assert_eq!(transport.login_count(), 2);
    }
}
