//! framelink-notebook: serves the framelink bridge operations from a notebook
//! host.

pub mod handlers;
pub mod host;
pub mod logging;
pub mod memory;
pub mod notebook;

pub use handlers::{DEFAULT_FILENAME, SaveError, notebook_handlers};
pub use host::{Embedding, HostApp, initialize};
pub use logging::init_tracing;
pub use memory::{MemoryKernel, MemoryNotebook};
pub use notebook::{Cell, CellConfig, ConnectionState, KernelClient, NotebookState, SaveRequest};
