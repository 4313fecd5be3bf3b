//! Notebook handlers for the bridge operations.
//!
//! Domain failures (nothing to save, kernel not connected, kernel errors) are
//! returned as errors here and converted into typed failure responses by the
//! `guarded` boundary at registration.

use anyhow::Context;
use framelink::{
    Handlers, ReadCode, ReadCodeRequest, ReadCodeResponse, SaveNotebook, SaveNotebookRequest,
    SaveNotebookResponse, guarded,
};

use crate::host::HostApp;
use crate::notebook::{ConnectionState, SaveRequest};

/// Filename used when neither the request nor the notebook names one.
pub const DEFAULT_FILENAME: &str = "notebook.py";

#[derive(Debug, thiserror::Error)]
pub enum SaveError {
    #[error("nothing to save: notebook has no cells")]
    NoCells,
    #[error("not connected to a kernel (connection is {0})")]
    NotConnected(ConnectionState),
    #[error("kernel save failed: {0:#}")]
    Kernel(anyhow::Error),
}

/// Save the notebook through the kernel.
///
/// Nothing is sent to the kernel unless the notebook has cells and the
/// connection is open. `persist` defaults to `true`.
pub async fn save_notebook(
    app: &HostApp,
    request: SaveNotebookRequest,
) -> Result<SaveNotebookResponse, SaveError> {
    let cells = app.state.cells();
    let filename = request
        .filename
        .filter(|name| !name.is_empty())
        .or_else(|| app.state.filename().filter(|name| !name.is_empty()))
        .unwrap_or_else(|| DEFAULT_FILENAME.to_string());

    if cells.is_empty() {
        return Err(SaveError::NoCells);
    }

    let connection = app.state.connection();
    if connection != ConnectionState::Open {
        return Err(SaveError::NotConnected(connection));
    }

    let save = SaveRequest::from_cells(
        &cells,
        filename.clone(),
        app.state.layout(),
        request.persist.unwrap_or(true),
    );
    app.kernel.send_save(save).await.map_err(SaveError::Kernel)?;

    tracing::info!(%filename, "Saved notebook via bridge");
    Ok(SaveNotebookResponse::succeeded(filename))
}

/// Read the notebook source from the kernel.
pub async fn read_code(
    app: &HostApp,
    _request: ReadCodeRequest,
) -> anyhow::Result<ReadCodeResponse> {
    let contents = app
        .kernel
        .read_code()
        .await
        .context("failed to read notebook source")?;
    Ok(ReadCodeResponse::new(contents))
}

/// Handlers for every bridge operation, each behind the error boundary.
pub fn notebook_handlers(app: HostApp) -> Handlers {
    let save_app = app.clone();
    Handlers::new()
        .on_save_notebook(guarded::<SaveNotebook, _, _, _>(move |request| {
            let app = save_app.clone();
            async move { save_notebook(&app, request).await }
        }))
        .on_read_code(guarded::<ReadCode, _, _, _>(move |request| {
            let app = app.clone();
            async move { read_code(&app, request).await }
        }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::{MemoryKernel, MemoryNotebook};
    use crate::notebook::{Cell, KernelClient};
    use async_trait::async_trait;
    use framelink::Responder;
    use serde_json::json;
    use std::sync::Arc;

    struct UnreachableKernel;

    #[async_trait]
    impl KernelClient for UnreachableKernel {
        async fn send_save(&self, _request: SaveRequest) -> anyhow::Result<()> {
            anyhow::bail!("connection reset")
        }

        async fn read_code(&self) -> anyhow::Result<String> {
            anyhow::bail!("connection reset")
        }
    }

    fn open_notebook() -> MemoryNotebook {
        MemoryNotebook::new()
            .with_cell(Cell::new("a1", "import marimo as mo"))
            .with_cell(Cell::new("b2", "mo.md('hi')"))
            .with_connection(ConnectionState::Open)
    }

    fn host_app(notebook: MemoryNotebook) -> (HostApp, Arc<MemoryKernel>) {
        let kernel = Arc::new(MemoryKernel::new(""));
        (HostApp::new(Arc::new(notebook), kernel.clone()), kernel)
    }

    #[tokio::test]
    async fn save_with_filename_succeeds() {
        let (app, kernel) = host_app(open_notebook());

        let response = save_notebook(&app, SaveNotebookRequest::default().with_filename("x.py"))
            .await
            .unwrap();

        assert_eq!(
            serde_json::to_value(&response).unwrap(),
            json!({"success": true, "filename": "x.py"})
        );
        let saves = kernel.saves();
        assert_eq!(saves.len(), 1);
        assert_eq!(saves[0].filename, "x.py");
        assert_eq!(saves[0].cell_ids, vec!["a1", "b2"]);
        assert!(saves[0].persist);
    }

    #[tokio::test]
    async fn save_without_cells_does_not_reach_kernel() {
        let (app, kernel) = host_app(MemoryNotebook::new().with_connection(ConnectionState::Open));

        let err = save_notebook(&app, SaveNotebookRequest::default())
            .await
            .unwrap_err();

        assert!(matches!(err, SaveError::NoCells));
        assert!(kernel.saves().is_empty());
    }

    #[tokio::test]
    async fn save_while_disconnected_does_not_reach_kernel() {
        let notebook = open_notebook();
        notebook.set_connection(ConnectionState::Closed);
        let (app, kernel) = host_app(notebook);

        let err = save_notebook(&app, SaveNotebookRequest::default())
            .await
            .unwrap_err();

        assert!(matches!(err, SaveError::NotConnected(ConnectionState::Closed)));
        assert!(kernel.saves().is_empty());
    }

    #[tokio::test]
    async fn filename_falls_back_to_notebook_then_default() {
        let (app, _) = host_app(open_notebook().with_filename("current.py"));
        let response = save_notebook(&app, SaveNotebookRequest::default().with_filename(""))
            .await
            .unwrap();
        assert_eq!(response.filename.as_deref(), Some("current.py"));

        let (app, _) = host_app(open_notebook());
        let response = save_notebook(&app, SaveNotebookRequest::default())
            .await
            .unwrap();
        assert_eq!(response.filename.as_deref(), Some(DEFAULT_FILENAME));
    }

    #[tokio::test]
    async fn persist_flag_is_forwarded() {
        let (app, kernel) = host_app(open_notebook());
        save_notebook(&app, SaveNotebookRequest::default().with_persist(false))
            .await
            .unwrap();
        assert!(!kernel.saves()[0].persist);
    }

    #[tokio::test]
    async fn layout_is_forwarded() {
        let notebook = open_notebook();
        notebook.set_layout(Some(json!({"type": "grid"})));
        let (app, kernel) = host_app(notebook);

        save_notebook(&app, SaveNotebookRequest::default())
            .await
            .unwrap();
        assert_eq!(kernel.saves()[0].layout, Some(json!({"type": "grid"})));
    }

    #[tokio::test]
    async fn read_code_of_empty_document() {
        let (app, _) = host_app(MemoryNotebook::new());
        let response = read_code(&app, ReadCodeRequest::default()).await.unwrap();
        assert_eq!(response.contents, "");
    }

    #[tokio::test]
    async fn guarded_handlers_reply_with_typed_failures() {
        let app = HostApp::new(Arc::new(open_notebook()), Arc::new(UnreachableKernel));
        let responder = Responder::new(notebook_handlers(app));

        let saved = responder
            .dispatch(json!({"operation": "saveNotebook", "request": {"filename": "x.py"}}))
            .await
            .unwrap();
        assert_eq!(saved, json!({"success": false}));

        let code = responder
            .dispatch(json!({"operation": "readCode", "request": {}}))
            .await
            .unwrap();
        assert_eq!(code, json!({"contents": ""}));
    }

    #[tokio::test]
    async fn guarded_save_without_cells_replies_failure() {
        let (app, kernel) = host_app(MemoryNotebook::new().with_connection(ConnectionState::Open));
        let responder = Responder::new(notebook_handlers(app));

        let saved = responder
            .dispatch(json!({"operation": "saveNotebook", "request": {}}))
            .await
            .unwrap();

        assert_eq!(saved, json!({"success": false}));
        assert!(kernel.saves().is_empty());
    }
}
