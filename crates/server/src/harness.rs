//! Line-delimited JSON front end for [`Bridge`].
//!
//! Each input line is one [`Request`]; each output line is the request `id`
//! merged with its [`Outcome`]. Requests run concurrently, so responses may
//! come back in a different order than they were sent.

use std::sync::Arc;

use serde_json::{json, Value as JsonValue};
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt};
use tokio::sync::mpsc;
use tokio::task::JoinSet;
use tracing::{error, info, info_span, warn, Instrument};
use uuid::Uuid;

use erpbridge_core::BridgeError;

use crate::bridge::Bridge;
use crate::dto::{Operation, Request};
use crate::outcome::Outcome;

/// Run one request against the bridge.
pub async fn dispatch(bridge: &Bridge, op: Operation) -> Outcome {
    match op {
        Operation::ResolveResource { uri } => Outcome::from_result(bridge.resolve_resource(&uri).await),
        Operation::InvokeTool { name, parameters } => {
            Outcome::from_result(bridge.invoke_tool(&name, parameters).await)
        }
        Operation::RenderPrompt { name, parameters } => {
            Outcome::from_result(bridge.render_prompt(&name, &parameters))
        }
        Operation::ListTools { domain } => Outcome::from_result(Ok(bridge.list_tools(domain))),
        Operation::ListResources => Outcome::from_result(Ok(bridge.list_resources())),
        Operation::ListPrompts => Outcome::from_result(Ok(bridge.list_prompts())),
        Operation::Session => Outcome::from_result(Ok(bridge.stats())),
    }
}

fn response(id: JsonValue, outcome: &Outcome) -> JsonValue {
    let mut line = json!({ "id": id });
    if let (Some(target), JsonValue::Object(fields)) = (line.as_object_mut(), outcome.to_json()) {
        target.extend(fields);
    }
    line
}

fn parse(line: &str) -> Result<Request, (JsonValue, BridgeError)> {
    serde_json::from_str::<Request>(line).map_err(|e| {
        // Keep the caller's id when the line is valid JSON with a bad shape.
        let id = serde_json::from_str::<JsonValue>(line)
            .ok()
            .and_then(|v| v.get("id").cloned())
            .unwrap_or(JsonValue::Null);
        (id, BridgeError::validation(format!("malformed request: {e}")))
    })
}

/// Response side of the harness.
///
/// After the first write failure further lines are dropped; the error is kept
/// and returned once every in-flight request has finished.
struct Output<W> {
    writer: W,
    failed: Option<std::io::Error>,
}

impl<W: AsyncWrite + Unpin> Output<W> {
    async fn send(&mut self, value: &JsonValue) {
        if self.failed.is_some() {
            return;
        }
        if let Err(e) = write_line(&mut self.writer, value).await {
            warn!(error = %e, "cannot write response, dropping further output");
            self.failed = Some(e);
        }
    }

    async fn finish(mut self) -> std::io::Result<()> {
        match self.failed.take() {
            Some(e) => Err(e),
            None => self.writer.flush().await,
        }
    }
}

fn decode(raw: Vec<u8>) -> Result<String, BridgeError> {
    let mut line = String::from_utf8(raw)
        .map_err(|e| BridgeError::validation(format!("request line is not valid UTF-8: {e}")))?;
    if line.ends_with('\r') {
        line.pop();
    }
    Ok(line)
}

/// Serve requests from `reader` until end of input, writing responses to `writer`.
///
/// A line that cannot be decoded or parsed is answered with a validation
/// error and reading continues. Reading stops at end of input, on a read
/// error or once the writer fails; in every case the requests already
/// started run to completion and their responses are written before
/// returning.
pub async fn serve<R, W>(bridge: Arc<Bridge>, reader: R, writer: W) -> std::io::Result<()>
where
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let (tx, mut rx) = mpsc::unbounded_channel::<JsonValue>();
    let mut tasks = JoinSet::new();
    let mut segments = reader.split(b'\n');
    let mut out = Output { writer, failed: None };
    let mut read_error = None;

    while read_error.is_none() && out.failed.is_none() {
        tokio::select! {
            segment = segments.next_segment() => {
                let raw = match segment {
                    Ok(Some(raw)) => raw,
                    Ok(None) => break,
                    Err(e) => {
                        warn!(error = %e, "cannot read requests, finishing in-flight work");
                        read_error = Some(e);
                        continue;
                    }
                };
                let request = decode(raw).map_err(|e| (JsonValue::Null, e)).and_then(|line| {
                    if line.trim().is_empty() { Ok(None) } else { parse(&line).map(Some) }
                });
                match request {
                    Ok(None) => {}
                    Ok(Some(Request { id, op })) => {
                        let span = info_span!("request", request_id = %Uuid::now_v7(), op = op.name());
                        let bridge = bridge.clone();
                        let tx = tx.clone();
                        tasks.spawn(
                            async move {
                                let outcome = dispatch(&bridge, op).await;
                                info!(success = outcome.success, "request finished");
                                let _ = tx.send(response(id, &outcome));
                            }
                            .instrument(span),
                        );
                    }
                    Err((id, err)) => {
                        warn!(error = %err, "rejected request line");
                        out.send(&response(id, &Outcome::err(&err))).await;
                    }
                }
            }
            Some(reply) = rx.recv() => out.send(&reply).await,
            Some(joined) = tasks.join_next(), if !tasks.is_empty() => reap(joined),
        }
    }

    drop(tx);
    while let Some(joined) = tasks.join_next().await {
        reap(joined);
    }
    while let Some(reply) = rx.recv().await {
        out.send(&reply).await;
    }
    let written = out.finish().await;
    match read_error {
        Some(e) => Err(e),
        None => written,
    }
}

fn reap(joined: Result<(), tokio::task::JoinError>) {
    if let Err(e) = joined {
        error!(error = %e, "request task did not complete");
    }
}

async fn write_line<W: AsyncWrite + Unpin>(writer: &mut W, value: &JsonValue) -> std::io::Result<()> {
    let mut bytes = serde_json::to_vec(value)?;
    bytes.push(b'\n');
    writer.write_all(&bytes).await?;
    writer.flush().await
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use serde_json::json;

    #[test]
    fn response_merges_id_and_outcome() {
        let out = response(json!(7), &Outcome::ok(json!([1])));
        assert_eq!(out, json!({"id": 7, "success": true, "result": [1]}));
    }

    #[test]
    fn undecodable_bytes_are_a_validation_error() {
        let err = decode(vec![b'{', 0xff, 0xfe, b'}']).unwrap_err();
        assert_eq!(err.kind(), "validation_error");
        assert_eq!(decode(b"{}\r".to_vec()).unwrap(), "{}");
    }

    #[test]
    fn malformed_lines_keep_their_id() {
        let (id, err) = parse(r#"{"id": "x", "op": "drop_tables"}"#).unwrap_err();
        assert_eq!(id, json!("x"));
        assert_eq!(err.kind(), "validation_error");

        let (id, _) = parse("not json").unwrap_err();
        assert!(id.is_null());
    }

    proptest! {
        #[test]
        fn arbitrary_lines_parse_or_reject_cleanly(line in ".{0,64}") {
            if let Err((_, err)) = parse(&line) {
                prop_assert_eq!(err.kind(), "validation_error");
            }
        }
    }
}
