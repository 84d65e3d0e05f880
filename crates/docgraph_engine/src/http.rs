//! HTTP transport implementation.
//!
//! The remote service speaks JSON over POST. The actual HTTP client is
//! abstracted via a trait so any library (reqwest, ureq, hyper, ...) can
//! be plugged in.

use crate::error::{EngineError, EngineResult};
use crate::transport::RemoteTransport;
use docgraph_protocol::{
    SubmitTransactionRequest, SubtreeRequest, SubtreeResponse, SyncRecordValuesRequest,
    SyncRecordValuesResponse, WireMessage,
};
use parking_lot::RwLock;
use std::sync::atomic::{AtomicBool, Ordering};

/// A failed HTTP exchange.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpFailure {
    /// Response status, if a response arrived at all.
    pub status: Option<u16>,
    /// Error message or response body.
    pub message: String,
}

impl HttpFailure {
    /// A failure before any response arrived.
    pub fn network(message: impl Into<String>) -> Self {
        Self {
            status: None,
            message: message.into(),
        }
    }

    /// A non-success response.
    pub fn status(status: u16, message: impl Into<String>) -> Self {
        Self {
            status: Some(status),
            message: message.into(),
        }
    }

    fn into_engine_error(self) -> EngineError {
        match self.status {
            None => EngineError::transport_retryable(self.message),
            Some(401) | Some(403) => EngineError::AuthenticationFailed(self.message),
            Some(408) | Some(429) => EngineError::transport_retryable(self.message),
            Some(status) if status >= 500 => EngineError::ServerError(self.message),
            Some(_) => EngineError::transport_fatal(self.message),
        }
    }
}

/// HTTP client abstraction.
pub trait HttpClient: Send + Sync {
    /// Sends a JSON POST request and returns the response body.
    ///
    /// `token` is the session token to attach, if any.
    fn post(&self, url: &str, token: Option<&str>, body: Vec<u8>)
        -> Result<Vec<u8>, HttpFailure>;

    /// Checks if the client is connected/healthy.
    fn is_healthy(&self) -> bool;
}

/// HTTP-based remote transport.
pub struct HttpTransport<C: HttpClient> {
    /// Base URL of the service (e.g., "https://www.notion.so").
    base_url: String,
    /// Session token.
    token: Option<String>,
    /// HTTP client implementation.
    client: C,
    /// Cleared by `close`; failed requests leave it set.
    connected: AtomicBool,
    /// Last error message.
    last_error: RwLock<Option<String>>,
}

impl<C: HttpClient> HttpTransport<C> {
    /// Endpoint for subtree loads.
    pub const LOAD_SUBTREE: &'static str = "/api/v3/loadSubtree";
    /// Endpoint for record refreshes.
    pub const SYNC_RECORD_VALUES: &'static str = "/api/v3/syncRecordValues";
    /// Endpoint for operation submission.
    pub const SUBMIT_TRANSACTION: &'static str = "/api/v3/submitTransaction";

    /// Creates a new HTTP transport.
    pub fn new(base_url: impl Into<String>, client: C) -> Self {
        Self {
            base_url: base_url.into(),
            token: None,
            client,
            connected: AtomicBool::new(true),
            last_error: RwLock::new(None),
        }
    }

    /// Sets the session token sent with every request.
    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        self.token = Some(token.into());
        self
    }

    /// Returns the base URL.
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Returns the HTTP client.
    pub fn client(&self) -> &C {
        &self.client
    }

    /// Returns the last error message.
    pub fn last_error(&self) -> Option<String> {
        self.last_error.read().clone()
    }

    fn post_json<Req, Res>(&self, endpoint: &str, request: &Req) -> EngineResult<Res>
    where
        Req: WireMessage,
        Res: WireMessage,
    {
        if !self.is_connected() {
            return Err(EngineError::NotConnected);
        }

        let body = request.encode()?;
        let url = format!("{}{}", self.base_url, endpoint);
        tracing::debug!(%url, bytes = body.len(), "POST");

        let response = self
            .client
            .post(&url, self.token.as_deref(), body)
            .map_err(|failure| {
                tracing::debug!(%url, status = ?failure.status, "POST failed");
                *self.last_error.write() = Some(failure.message.clone());
                failure.into_engine_error()
            })?;

        *self.last_error.write() = None;
        Ok(Res::decode(&response)?)
    }
}

/// Acknowledgement body of a submit call. Its content is ignored.
#[derive(Debug, serde::Serialize, serde::Deserialize)]
struct SubmitAck(serde_json::Value);

impl WireMessage for SubmitAck {}

impl<C: HttpClient> RemoteTransport for HttpTransport<C> {
    fn load_subtree(&self, request: &SubtreeRequest) -> EngineResult<SubtreeResponse> {
        self.post_json(Self::LOAD_SUBTREE, request)
    }

    fn sync_record_values(
        &self,
        request: &SyncRecordValuesRequest,
    ) -> EngineResult<SyncRecordValuesResponse> {
        self.post_json(Self::SYNC_RECORD_VALUES, request)
    }

    fn submit_transaction(&self, request: &SubmitTransactionRequest) -> EngineResult<()> {
        let _: SubmitAck = self.post_json(Self::SUBMIT_TRANSACTION, request)?;
        Ok(())
    }

    fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst) && self.client.is_healthy()
    }

    fn close(&self) -> EngineResult<()> {
        self.connected.store(false, Ordering::SeqCst);
        Ok(())
    }
}
