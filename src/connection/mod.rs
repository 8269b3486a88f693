//! Connection lifecycle and call correlation

mod dispatcher;
mod status;

pub use dispatcher::{CallDispatcher, Completion, EngineCall, Settled, next_call_id};
pub use status::{ConnectionStatus, UNREACHABLE_MESSAGE};
