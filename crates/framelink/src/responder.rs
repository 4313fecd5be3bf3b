//! Child-side dispatch: binds handlers to operation tags.
//!
//! Every inbound envelope gets exactly one reply. A handler's result goes back
//! verbatim; protocol errors (unknown tag, missing handler, undecodable
//! request) and handler failures go back as rejections. The responder never
//! swallows a handler failure; wrap handlers with [`guarded`](crate::boundary::guarded)
//! to turn them into typed failure responses instead.

use std::fmt;
use std::future::Future;
use std::sync::Arc;

use async_trait::async_trait;
use futures::FutureExt;
use futures::future::BoxFuture;

use crate::protocol::{
    Envelope, Operation, OperationName, ProtocolError, ReadCode, ReadCodeRequest,
    ReadCodeResponse, SaveNotebook, SaveNotebookRequest, SaveNotebookResponse,
};
use crate::transport::{MessageHandler, Transport};

/// Boxed future returned by a registered handler.
pub type HandlerFuture<T> = BoxFuture<'static, anyhow::Result<T>>;

type Handler<O> = Arc<
    dyn Fn(<O as Operation>::Request) -> HandlerFuture<<O as Operation>::Response> + Send + Sync,
>;

fn boxed<O, F, Fut>(handler: F) -> Handler<O>
where
    O: Operation,
    F: Fn(O::Request) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = anyhow::Result<O::Response>> + Send + 'static,
{
    Arc::new(move |request| handler(request).boxed())
}

/// At most one handler per operation. Any may be left out; invoking a missing
/// one fails that call only.
#[derive(Clone, Default)]
pub struct Handlers {
    save_notebook: Option<Handler<SaveNotebook>>,
    read_code: Option<Handler<ReadCode>>,
}

impl Handlers {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on_save_notebook<F, Fut>(mut self, handler: F) -> Self
    where
        F: Fn(SaveNotebookRequest) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<SaveNotebookResponse>> + Send + 'static,
    {
        self.save_notebook = Some(boxed::<SaveNotebook, _, _>(handler));
        self
    }

    pub fn on_read_code<F, Fut>(mut self, handler: F) -> Self
    where
        F: Fn(ReadCodeRequest) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<ReadCodeResponse>> + Send + 'static,
    {
        self.read_code = Some(boxed::<ReadCode, _, _>(handler));
        self
    }

    pub fn is_registered(&self, operation: OperationName) -> bool {
        match operation {
            OperationName::SaveNotebook => self.save_notebook.is_some(),
            OperationName::ReadCode => self.read_code.is_some(),
        }
    }

    pub fn registered(&self) -> Vec<OperationName> {
        OperationName::ALL
            .into_iter()
            .filter(|op| self.is_registered(*op))
            .collect()
    }
}

impl fmt::Debug for Handlers {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Handlers")
            .field("registered", &self.registered())
            .finish()
    }
}

#[derive(Debug, thiserror::Error)]
pub enum DispatchError {
    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    #[error("{0} handler not implemented")]
    NotImplemented(OperationName),

    #[error("invalid {operation} request")]
    InvalidRequest {
        operation: OperationName,
        #[source]
        source: serde_json::Error,
    },

    /// The handler ran and failed.
    #[error("{operation} handler failed")]
    Handler {
        operation: OperationName,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync + 'static>,
    },

    #[error("failed to encode {operation} response")]
    EncodeResponse {
        operation: OperationName,
        #[source]
        source: serde_json::Error,
    },
}

impl DispatchError {
    /// True for failures of the request itself, as opposed to the handler.
    pub fn is_protocol(&self) -> bool {
        matches!(
            self,
            Self::Protocol(_) | Self::NotImplemented(_) | Self::InvalidRequest { .. }
        )
    }
}

/// Dispatches envelopes to registered handlers.
#[derive(Clone, Debug)]
pub struct Responder {
    handlers: Handlers,
}

impl Responder {
    pub fn new(handlers: Handlers) -> Self {
        Self { handlers }
    }

    /// Decode one envelope, run its handler, and encode the result.
    pub async fn dispatch(
        &self,
        message: serde_json::Value,
    ) -> Result<serde_json::Value, DispatchError> {
        let envelope = Envelope::from_value(message)?;
        let operation = envelope.operation()?;
        tracing::debug!(%operation, "Dispatching request");

        let request = envelope.into_request();
        match operation {
            OperationName::SaveNotebook => {
                invoke::<SaveNotebook>(self.handlers.save_notebook.as_ref(), request).await
            }
            OperationName::ReadCode => {
                invoke::<ReadCode>(self.handlers.read_code.as_ref(), request).await
            }
        }
    }

    /// Install this responder as the transport's receiver.
    pub fn install(self, transport: &dyn Transport) {
        tracing::info!(
            channel = %transport.channel_id(),
            handlers = ?self.handlers.registered(),
            "Installing responder"
        );
        transport.receive(Arc::new(self));
    }
}

#[async_trait]
impl MessageHandler for Responder {
    async fn handle(&self, message: serde_json::Value) -> anyhow::Result<serde_json::Value> {
        match self.dispatch(message).await {
            Ok(reply) => Ok(reply),
            Err(e) => {
                if e.is_protocol() {
                    tracing::warn!(error = %e, "Rejecting request");
                }
                Err(e.into())
            }
        }
    }
}

/// Register `handlers` on `transport`.
pub fn setup(handlers: Handlers, transport: &dyn Transport) {
    Responder::new(handlers).install(transport);
}

async fn invoke<O: Operation>(
    handler: Option<&Handler<O>>,
    request: serde_json::Value,
) -> Result<serde_json::Value, DispatchError> {
    let operation = O::NAME;
    let handler = handler.ok_or(DispatchError::NotImplemented(operation))?;
    let request: O::Request = serde_json::from_value(request)
        .map_err(|source| DispatchError::InvalidRequest { operation, source })?;

    let response = (**handler)(request)
        .await
        .map_err(|e| DispatchError::Handler {
            operation,
            source: e.into(),
        })?;

    serde_json::to_value(response)
        .map_err(|source| DispatchError::EncodeResponse { operation, source })
}
