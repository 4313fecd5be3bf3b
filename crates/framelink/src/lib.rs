//! framelink: typed request/response bridge between a parent context and an
//! embedded child over an asynchronous message channel.

pub mod boundary;
pub mod bridge;
pub mod caller;
pub mod config;
pub mod protocol;
pub mod responder;
pub mod transport;

pub use boundary::{FailureResponse, guarded};
pub use bridge::{Channel, channel_pair};
pub use caller::{CallError, Caller};
pub use config::{ChannelConfig, DEFAULT_CHANNEL_ID};
pub use protocol::{
    Envelope, Extra, Operation, OperationName, ProtocolError, ReadCode, ReadCodeRequest,
    ReadCodeResponse, SaveNotebook, SaveNotebookRequest, SaveNotebookResponse,
};
pub use responder::{DispatchError, Handlers, Responder, setup};
pub use transport::{MessageHandler, Transport, TransportError};
