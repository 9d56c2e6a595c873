//! Transport layer: lifecycle wrapper feeding requests into a [`Dispatcher`]
//! and carrying responses/notifications back to a paired counterpart.
//!
//! The in-process variant pairs two halves that call each other directly and
//! synchronously — no queue, no thread, no serialization step — while also
//! supporting a serialized entry point for parity with out-of-process
//! transports (whose byte-level framing lives outside this crate).

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};

use serde_json::Value;

use crate::capability::BoxError;
use crate::dispatcher::Dispatcher;
use crate::protocol::{JsonRpcError, JsonRpcRequest, JsonRpcResponse, RpcId};

/// Error-reporting hook for failures that are swallowed by design
/// (fire-and-forget notification delivery). Injected at construction so tests
/// stay deterministic; there is no ambient global.
pub type ErrorReporter = Arc<dyn Fn(&str) + Send + Sync>;

/// Default reporter: log through `tracing`.
pub fn tracing_reporter() -> ErrorReporter {
    Arc::new(|msg| tracing::error!(target: "mcp_capability_server::transport", "{msg}"))
}

/// Callback invoked when a notification arrives on a transport half. An `Err`
/// from the sink is treated as a delivery failure: reported on the sending
/// side and converted into a `false` return, never propagated.
pub type NotificationSink = Box<dyn Fn(&str, Option<&Value>) -> Result<(), BoxError> + Send + Sync>;

/// Lifecycle and delivery contract shared by all transports.
pub trait Transport {
    /// Mark the transport ready to exchange messages. Idempotent.
    fn open(&self);

    /// Mark the transport unready. Idempotent; subsequent sends fail soft
    /// (`false`/`None`) rather than raising.
    fn close(&self);

    fn is_open(&self) -> bool;

    /// Deliver a computed response toward the caller. For a synchronous
    /// same-process pairing this simply hands the message back as the call's
    /// result; a closed transport returns `None`.
    fn send_response(&self, response: JsonRpcResponse) -> Option<JsonRpcResponse>;

    /// Best-effort fire-and-forget delivery to the paired counterpart.
    /// Returns whether delivery succeeded; failures are reported through the
    /// injected [`ErrorReporter`] and never propagate.
    fn send_notification(&self, method: &str, params: Option<&Value>) -> bool;

    /// Hand a parsed request to the dispatcher; `None` for notifications or
    /// when the transport cannot reach a dispatcher.
    fn handle_request(&self, req: &JsonRpcRequest) -> Option<JsonRpcResponse>;

    /// Serialized parity entry point: parse, dispatch, serialize. Parse
    /// failures produce a serialized parse-error envelope.
    fn handle_json_request(&self, raw: &str) -> Option<String>;
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// One half of a synchronous same-process transport pair.
///
/// The server half owns the dispatcher; the client half forwards requests to
/// its peer. Calls run to completion on the caller's thread.
pub struct InProcessTransport {
    open: AtomicBool,
    peer: Mutex<Weak<InProcessTransport>>,
    dispatcher: Option<Dispatcher>,
    sink: Mutex<Option<NotificationSink>>,
    received: Mutex<Vec<(String, Option<Value>)>>,
    reporter: ErrorReporter,
}

impl InProcessTransport {
    /// Create a paired (client, server) transport around a dispatcher. Both
    /// halves start open and share the given error reporter.
    pub fn pair(dispatcher: Dispatcher, reporter: ErrorReporter) -> (Arc<Self>, Arc<Self>) {
        let server = Arc::new(Self::new_half(Some(dispatcher), Arc::clone(&reporter)));
        let client = Arc::new(Self::new_half(None, reporter));

        *lock(&server.peer) = Arc::downgrade(&client);
        *lock(&client.peer) = Arc::downgrade(&server);

        (client, server)
    }

    /// A half with no counterpart, for hosts that only need the serialized
    /// entry point into a dispatcher.
    pub fn unpaired(dispatcher: Dispatcher, reporter: ErrorReporter) -> Arc<Self> {
        Arc::new(Self::new_half(Some(dispatcher), reporter))
    }

    fn new_half(dispatcher: Option<Dispatcher>, reporter: ErrorReporter) -> Self {
        Self {
            open: AtomicBool::new(true),
            peer: Mutex::new(Weak::new()),
            dispatcher,
            sink: Mutex::new(None),
            received: Mutex::new(Vec::new()),
            reporter,
        }
    }

    fn peer(&self) -> Option<Arc<Self>> {
        lock(&self.peer).upgrade()
    }

    /// Convenience for the client half: build a request envelope and hand it
    /// to the counterpart synchronously.
    pub fn request(
        &self,
        id: RpcId,
        method: &str,
        params: Option<Value>,
    ) -> Option<JsonRpcResponse> {
        self.handle_request(&JsonRpcRequest::new(id, method, params))
    }

    /// Install a callback observing notifications delivered to this half.
    pub fn set_notification_sink(&self, sink: NotificationSink) {
        *lock(&self.sink) = Some(sink);
    }

    /// Drain the notifications delivered to this half so far.
    pub fn take_notifications(&self) -> Vec<(String, Option<Value>)> {
        std::mem::take(&mut *lock(&self.received))
    }

    /// Receive a notification from the counterpart.
    ///
    /// The sink runs before anything is recorded: a failed delivery leaves no
    /// trace here, so the sender's `false` return means nothing arrived.
    fn deliver_notification(&self, method: &str, params: Option<&Value>) -> Result<(), BoxError> {
        if let Some(sink) = lock(&self.sink).as_ref() {
            sink(method, params)?;
        }

        lock(&self.received).push((method.to_string(), params.cloned()));

        if let Some(dispatcher) = &self.dispatcher {
            // Notifications produce no response by construction.
            let req = JsonRpcRequest::notification(method, params.cloned());
            let _ = dispatcher.handle(&req);
        }

        Ok(())
    }

    /// Dispatch against this half's own dispatcher only (no bounce-back to
    /// the peer).
    fn dispatch_local(&self, req: &JsonRpcRequest) -> Option<JsonRpcResponse> {
        match &self.dispatcher {
            Some(dispatcher) => dispatcher.handle(req),
            None => {
                (self.reporter)(&format!(
                    "request `{}` dropped: no dispatcher on either transport half",
                    req.method
                ));
                None
            }
        }
    }
}

impl Transport for InProcessTransport {
    fn open(&self) {
        self.open.store(true, Ordering::SeqCst);
    }

    fn close(&self) {
        self.open.store(false, Ordering::SeqCst);
    }

    fn is_open(&self) -> bool {
        self.open.load(Ordering::SeqCst)
    }

    fn send_response(&self, response: JsonRpcResponse) -> Option<JsonRpcResponse> {
        if !self.is_open() {
            (self.reporter)("response dropped: transport closed");
            return None;
        }
        Some(response)
    }

    fn send_notification(&self, method: &str, params: Option<&Value>) -> bool {
        if !self.is_open() {
            (self.reporter)(&format!("notification `{method}` dropped: transport closed"));
            return false;
        }
        let Some(peer) = self.peer() else {
            (self.reporter)(&format!("notification `{method}` dropped: no paired counterpart"));
            return false;
        };
        if !peer.is_open() {
            (self.reporter)(&format!("notification `{method}` dropped: counterpart closed"));
            return false;
        }

        match peer.deliver_notification(method, params) {
            Ok(()) => true,
            Err(e) => {
                (self.reporter)(&format!("notification `{method}` delivery failed: {e}"));
                false
            }
        }
    }

    fn handle_request(&self, req: &JsonRpcRequest) -> Option<JsonRpcResponse> {
        if !self.is_open() {
            (self.reporter)(&format!("request `{}` dropped: transport closed", req.method));
            return None;
        }
        if self.dispatcher.is_some() {
            return self.dispatch_local(req);
        }

        match self.peer() {
            Some(peer) if peer.is_open() => peer.dispatch_local(req),
            _ => {
                (self.reporter)(&format!(
                    "request `{}` dropped: no reachable counterpart",
                    req.method
                ));
                None
            }
        }
    }

    fn handle_json_request(&self, raw: &str) -> Option<String> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return None;
        }

        let req: JsonRpcRequest = match serde_json::from_str(trimmed) {
            Ok(r) => r,
            Err(_) => {
                let resp = JsonRpcResponse::error(None, JsonRpcError::parse_error());
                return serialize_response(&resp, &self.reporter);
            }
        };

        if req.jsonrpc != "2.0" {
            let resp = JsonRpcResponse::error(req.id.clone(), JsonRpcError::invalid_request());
            return serialize_response(&resp, &self.reporter);
        }

        let resp = self.handle_request(&req)?;
        serialize_response(&resp, &self.reporter)
    }
}

fn serialize_response(resp: &JsonRpcResponse, reporter: &ErrorReporter) -> Option<String> {
    match serde_json::to_string(resp) {
        Ok(s) => Some(s),
        Err(e) => {
            reporter(&format!("response serialization failed: {e}"));
            None
        }
    }
}
