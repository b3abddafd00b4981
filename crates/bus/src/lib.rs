//! `keel-bus` — command dispatch, middleware contract and undo/redo history.
//!
//! This crate contains the mechanics only: no built-in middleware, no storage.

pub mod bus;
pub mod command;
pub mod error;
pub mod history;
pub mod middleware;

pub use bus::CommandBus;
pub use command::{Command, Completion, DynCommand, EncodedOutput, InvocationError};
pub use error::{BoxError, BusError, HistoryError, Stack};
pub use history::{CommandHistory, HistoryStats};
pub use middleware::{Invocation, Middleware, MiddlewareError, Verdict};
