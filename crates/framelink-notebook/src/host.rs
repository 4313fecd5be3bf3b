//! Host-side wiring: decide whether to serve the bridge and install handlers.

use std::sync::Arc;

use framelink::Transport;

use crate::handlers::notebook_handlers;
use crate::notebook::{KernelClient, NotebookState};

/// Everything the notebook handlers need from the host application.
#[derive(Clone)]
pub struct HostApp {
    pub state: Arc<dyn NotebookState>,
    pub kernel: Arc<dyn KernelClient>,
}

impl HostApp {
    pub fn new(state: Arc<dyn NotebookState>, kernel: Arc<dyn KernelClient>) -> Self {
        Self { state, kernel }
    }
}

impl std::fmt::Debug for HostApp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HostApp")
            .field("connection", &self.state.connection())
            .field("filename", &self.state.filename())
            .finish_non_exhaustive()
    }
}

/// Where the host is running relative to its parent.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Embedding {
    TopLevel,
    Embedded,
}

impl Embedding {
    /// Embedded when the host's own context differs from the top-level one.
    pub fn detect<T: PartialEq + ?Sized>(own: &T, top: &T) -> Self {
        if own == top {
            Self::TopLevel
        } else {
            Self::Embedded
        }
    }

    pub fn is_embedded(&self) -> bool {
        matches!(self, Self::Embedded)
    }
}

/// Install the notebook handlers on `transport` when embedded.
///
/// Returns whether handlers were installed. A top-level host has no parent to
/// answer, so nothing is registered and requests on the transport are
/// rejected as unhandled.
pub fn initialize(embedding: Embedding, transport: &dyn Transport, app: HostApp) -> bool {
    if !embedding.is_embedded() {
        tracing::debug!(
            channel = transport.channel_id(),
            "Running top-level, not installing bridge handlers"
        );
        return false;
    }

    framelink::setup(notebook_handlers(app), transport);
    tracing::debug!(channel = transport.channel_id(), "Notebook handlers registered");
    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::{MemoryKernel, MemoryNotebook};
    use crate::notebook::{Cell, ConnectionState};
    use framelink::{
        CallError, Caller, ChannelConfig, SaveNotebookRequest, TransportError, channel_pair,
    };

    fn app(kernel: Arc<MemoryKernel>) -> HostApp {
        let notebook = MemoryNotebook::new()
            .with_cell(Cell::new("a1", "import marimo as mo"))
            .with_cell(Cell::new("b2", "x = 1"))
            .with_connection(ConnectionState::Open);
        HostApp::new(Arc::new(notebook), kernel)
    }

    #[test]
    fn detect_compares_contexts() {
        assert_eq!(Embedding::detect("window", "window"), Embedding::TopLevel);
        assert_eq!(Embedding::detect("frame", "window"), Embedding::Embedded);
        assert!(Embedding::Embedded.is_embedded());
    }

    #[tokio::test]
    async fn embedded_host_serves_parent() {
        let (parent, child) = channel_pair(&ChannelConfig::default());
        let kernel = Arc::new(MemoryKernel::new("old = 1"));
        assert!(initialize(Embedding::Embedded, &child, app(kernel.clone())));

        let caller = Caller::new(Arc::new(parent));
        assert_eq!(caller.read_code(None).await.unwrap().contents, "old = 1");

        let saved = caller
            .save_notebook(Some(SaveNotebookRequest::default().with_filename("x.py")))
            .await
            .unwrap();
        assert!(saved.success);
        assert_eq!(saved.filename.as_deref(), Some("x.py"));
        assert_eq!(
            caller.read_code(None).await.unwrap().contents,
            "import marimo as mo\n\nx = 1"
        );
        assert_eq!(kernel.saves().len(), 1);
    }

    #[tokio::test]
    async fn top_level_host_installs_nothing() {
        let (parent, child) = channel_pair(&ChannelConfig::default());
        let kernel = Arc::new(MemoryKernel::new(""));
        assert!(!initialize(Embedding::TopLevel, &child, app(kernel.clone())));

        let caller = Caller::new(Arc::new(parent));
        let err = caller.read_code(None).await.unwrap_err();
        assert!(matches!(
            err,
            CallError::Transport {
                source: TransportError::Rejected(_),
                ..
            }
        ));
        assert!(kernel.saves().is_empty());
    }
}
