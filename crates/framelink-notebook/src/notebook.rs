//! Host application seams: notebook state and the kernel client.
//!
//! Both are owned by the surrounding application; the bridge only reads state
//! and forwards save/read requests.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// State of the host's connection to its kernel.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ConnectionState {
    #[default]
    Connecting,
    Open,
    Closing,
    Closed,
}

impl ConnectionState {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Connecting => "connecting",
            Self::Open => "open",
            Self::Closing => "closing",
            Self::Closed => "closed",
        }
    }
}

impl std::fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CellConfig {
    #[serde(default)]
    pub disabled: bool,
    #[serde(default)]
    pub hide_code: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub column: Option<u32>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Cell {
    pub id: String,
    pub code: String,
    pub name: String,
    #[serde(default)]
    pub config: CellConfig,
}

impl Cell {
    /// Anonymous cell (name `_`) with default config.
    pub fn new(id: impl Into<String>, code: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            code: code.into(),
            name: "_".to_string(),
            config: CellConfig::default(),
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn with_config(mut self, config: CellConfig) -> Self {
        self.config = config;
        self
    }
}

/// Payload the kernel expects for a save.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SaveRequest {
    pub cell_ids: Vec<String>,
    pub codes: Vec<String>,
    pub names: Vec<String>,
    pub filename: String,
    pub configs: Vec<CellConfig>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub layout: Option<serde_json::Value>,
    pub persist: bool,
}

impl SaveRequest {
    pub fn from_cells(
        cells: &[Cell],
        filename: String,
        layout: Option<serde_json::Value>,
        persist: bool,
    ) -> Self {
        Self {
            cell_ids: cells.iter().map(|c| c.id.clone()).collect(),
            codes: cells.iter().map(|c| c.code.clone()).collect(),
            names: cells.iter().map(|c| c.name.clone()).collect(),
            filename,
            configs: cells.iter().map(|c| c.config.clone()).collect(),
            layout,
            persist,
        }
    }
}

/// Read-only view of the host's notebook.
pub trait NotebookState: Send + Sync {
    /// Cells in notebook order.
    fn cells(&self) -> Vec<Cell>;
    fn filename(&self) -> Option<String>;
    fn connection(&self) -> ConnectionState;
    /// Serialized layout, if the notebook uses one.
    fn layout(&self) -> Option<serde_json::Value> {
        None
    }
}

/// Client for the kernel that owns the notebook file.
#[async_trait]
pub trait KernelClient: Send + Sync {
    async fn send_save(&self, request: SaveRequest) -> anyhow::Result<()>;
    async fn read_code(&self) -> anyhow::Result<String>;
}
