//! In-memory notebook and kernel, used by the demo binary and tests.

use std::sync::{Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;

use crate::notebook::{Cell, ConnectionState, KernelClient, NotebookState, SaveRequest};

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

#[derive(Debug, Default)]
struct Snapshot {
    cells: Vec<Cell>,
    filename: Option<String>,
    connection: ConnectionState,
    layout: Option<serde_json::Value>,
}

#[derive(Debug, Default)]
pub struct MemoryNotebook {
    inner: Mutex<Snapshot>,
}

impl MemoryNotebook {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_cell(self, cell: Cell) -> Self {
        self.push_cell(cell);
        self
    }

    pub fn with_filename(self, filename: impl Into<String>) -> Self {
        self.set_filename(Some(filename.into()));
        self
    }

    pub fn with_connection(self, state: ConnectionState) -> Self {
        self.set_connection(state);
        self
    }

    pub fn push_cell(&self, cell: Cell) {
        lock(&self.inner).cells.push(cell);
    }

    pub fn set_filename(&self, filename: Option<String>) {
        lock(&self.inner).filename = filename;
    }

    pub fn set_connection(&self, state: ConnectionState) {
        lock(&self.inner).connection = state;
    }

    pub fn set_layout(&self, layout: Option<serde_json::Value>) {
        lock(&self.inner).layout = layout;
    }
}

impl NotebookState for MemoryNotebook {
    fn cells(&self) -> Vec<Cell> {
        lock(&self.inner).cells.clone()
    }

    fn filename(&self) -> Option<String> {
        lock(&self.inner).filename.clone()
    }

    fn connection(&self) -> ConnectionState {
        lock(&self.inner).connection
    }

    fn layout(&self) -> Option<serde_json::Value> {
        lock(&self.inner).layout.clone()
    }
}

/// Kernel stand-in that keeps the file contents in memory.
///
/// A persisted save replaces the contents with the saved cell codes joined by
/// blank lines. Every save, persisted or not, is recorded.
#[derive(Debug, Default)]
pub struct MemoryKernel {
    contents: Mutex<String>,
    saves: Mutex<Vec<SaveRequest>>,
}

impl MemoryKernel {
    pub fn new(contents: impl Into<String>) -> Self {
        Self {
            contents: Mutex::new(contents.into()),
            saves: Mutex::new(Vec::new()),
        }
    }

    pub fn saves(&self) -> Vec<SaveRequest> {
        lock(&self.saves).clone()
    }

    pub fn contents(&self) -> String {
        lock(&self.contents).clone()
    }
}

#[async_trait]
impl KernelClient for MemoryKernel {
    async fn send_save(&self, request: SaveRequest) -> anyhow::Result<()> {
        if request.persist {
            *lock(&self.contents) = request.codes.join("\n\n");
        }
        tracing::debug!(
            filename = %request.filename,
            cells = request.codes.len(),
            persist = request.persist,
            "Kernel received save"
        );
        lock(&self.saves).push(request);
        Ok(())
    }

    async fn read_code(&self) -> anyhow::Result<String> {
        Ok(self.contents())
    }
}
