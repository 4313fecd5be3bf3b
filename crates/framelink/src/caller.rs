//! Parent-side client: one typed async method per operation.

use std::sync::Arc;

use crate::protocol::{
    Envelope, Operation, OperationName, ReadCode, ReadCodeRequest, ReadCodeResponse,
    SaveNotebook, SaveNotebookRequest, SaveNotebookResponse,
};
use crate::transport::{Transport, TransportError};

#[derive(Debug, thiserror::Error)]
pub enum CallError {
    #[error("{operation} call failed")]
    Transport {
        operation: OperationName,
        #[source]
        source: TransportError,
    },
    #[error("failed to encode {operation} request")]
    Encode {
        operation: OperationName,
        #[source]
        source: serde_json::Error,
    },
    #[error("malformed {operation} response")]
    MalformedResponse {
        operation: OperationName,
        #[source]
        source: serde_json::Error,
    },
}

impl CallError {
    pub fn operation(&self) -> OperationName {
        match self {
            Self::Transport { operation, .. }
            | Self::Encode { operation, .. }
            | Self::MalformedResponse { operation, .. } => *operation,
        }
    }

    /// The transport failure behind this error, if any.
    pub fn transport_error(&self) -> Option<&TransportError> {
        match self {
            Self::Transport { source, .. } => Some(source),
            _ => None,
        }
    }
}

/// Client for a responder on the other end of a transport.
///
/// Cheap to clone; every call is independent and there is no local state.
#[derive(Clone)]
pub struct Caller {
    transport: Arc<dyn Transport>,
}

impl Caller {
    pub fn new(transport: Arc<dyn Transport>) -> Self {
        Self { transport }
    }

    pub fn channel_id(&self) -> &str {
        self.transport.channel_id()
    }

    /// Ask the embedded notebook to save itself. `None` sends `{}`.
    pub async fn save_notebook(
        &self,
        request: Option<SaveNotebookRequest>,
    ) -> Result<SaveNotebookResponse, CallError> {
        self.call::<SaveNotebook>(request.unwrap_or_default()).await
    }

    /// Read the embedded notebook's source. `None` sends `{}`.
    pub async fn read_code(
        &self,
        request: Option<ReadCodeRequest>,
    ) -> Result<ReadCodeResponse, CallError> {
        self.call::<ReadCode>(request.unwrap_or_default()).await
    }

    /// Send one envelope for `O` and decode the reply into its response shape.
    pub async fn call<O: Operation>(&self, request: O::Request) -> Result<O::Response, CallError> {
        let operation = O::NAME;
        let request = serde_json::to_value(&request)
            .map_err(|source| CallError::Encode { operation, source })?;
        let message = serde_json::to_value(Envelope::new(operation, request))
            .map_err(|source| CallError::Encode { operation, source })?;

        tracing::debug!(%operation, channel = %self.transport.channel_id(), "Calling");
        let reply = self
            .transport
            .send(message)
            .await
            .map_err(|source| CallError::Transport { operation, source })?;

        serde_json::from_value(reply)
            .map_err(|source| CallError::MalformedResponse { operation, source })
    }
}
