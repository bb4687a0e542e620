//! Call intake and receipts.
//!
//! The reader side turns JSON-lines input into `Inbound` items; the apply
//! side stamps each call with a monotonic timestamp, runs it through the
//! engine and produces one `Receipt` per input line.

use agrotrace_core::call::{Call, CallOutcome};
use agrotrace_core::error::ErrorKind;
use agrotrace_core::types::{Principal, Timestamp};
use agrotrace_state::StateEngine;
use serde::Serialize;
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::sync::mpsc;
use tracing::{debug, warn};

/// One unit of work handed from the reader task to the apply loop.
#[derive(Debug)]
pub enum Inbound {
    Call(Call),
    Malformed { line: u64, error: String },
}

/// Blank lines and `#` comments yield nothing.
pub fn parse_line(line: u64, text: &str) -> Option<Inbound> {
    let text = text.trim();
    if text.is_empty() || text.starts_with('#') {
        return None;
    }
    Some(match serde_json::from_str::<Call>(text) {
        Ok(call) => Inbound::Call(call),
        Err(e) => Inbound::Malformed { line, error: e.to_string() },
    })
}

/// Same as `parse_line` for a raw input line. Invalid UTF-8 becomes a
/// `Malformed` item instead of ending the stream.
pub fn parse_bytes(line: u64, bytes: &[u8]) -> Option<Inbound> {
    match std::str::from_utf8(bytes) {
        Ok(text) => parse_line(line, text),
        Err(e) => Some(Inbound::Malformed { line, error: e.to_string() }),
    }
}

/// Read JSON-lines calls from `reader` until EOF or until the apply loop
/// hangs up.
pub async fn read_calls<R>(reader: R, tx: mpsc::Sender<Inbound>) -> anyhow::Result<()>
where
    R: AsyncRead + Unpin,
{
    let mut reader = BufReader::new(reader);
    let mut buf = Vec::new();
    let mut line_no = 0u64;
    loop {
        buf.clear();
        if reader.read_until(b'\n', &mut buf).await? == 0 {
            break;
        }
        line_no += 1;
        let Some(item) = parse_bytes(line_no, &buf) else {
            continue;
        };
        if tx.send(item).await.is_err() {
            debug!("apply loop closed; reader stopping");
            break;
        }
    }
    Ok(())
}

// ── Clock ─────────────────────────────────────────────────────────────────────

/// Wall-clock stamps that never run backwards, so event timestamps within a
/// product log are non-decreasing even across clock adjustments.
#[derive(Debug, Default)]
pub struct Clock {
    last: Timestamp,
}

impl Clock {
    pub fn stamp(&mut self, wall: Timestamp) -> Timestamp {
        self.last = self.last.max(wall);
        self.last
    }
}

// ── Receipt ───────────────────────────────────────────────────────────────────

#[derive(Debug, Serialize)]
pub struct Receipt {
    pub seq: u64,
    pub ok: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub caller: Option<Principal>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub op: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<Timestamp>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub outcome: Option<CallOutcome>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub kind: Option<ErrorKind>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl Receipt {
    fn rejected(seq: u64, error: String) -> Self {
        Self {
            seq,
            ok: false,
            caller: None,
            op: None,
            timestamp: None,
            outcome: None,
            kind: None,
            error: Some(error),
        }
    }
}

/// Apply one inbound item and describe the result.
pub fn dispatch(
    engine: &StateEngine,
    clock: &mut Clock,
    seq: u64,
    item: Inbound,
    wall: Timestamp,
) -> Receipt {
    let call = match item {
        Inbound::Call(call) => call,
        Inbound::Malformed { line, error } => {
            warn!(line, %error, "malformed call");
            return Receipt::rejected(seq, format!("line {line}: {error}"));
        }
    };

    let now = clock.stamp(wall);
    let op = call.action.name();
    let mut receipt = Receipt {
        seq,
        ok: true,
        caller: Some(call.caller),
        op: Some(op),
        timestamp: Some(now),
        outcome: None,
        kind: None,
        error: None,
    };
    match engine.apply(&call, now) {
        Ok(outcome) => receipt.outcome = Some(outcome),
        Err(e) => {
            warn!(caller = %call.caller, op, error = %e, "call rejected");
            receipt.ok = false;
            receipt.kind = Some(e.kind());
            receipt.error = Some(e.to_string());
        }
    }
    receipt
}
