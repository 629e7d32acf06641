//! Inbound command handling
//!
//! The dispatcher owns parsing, targeting and duplicate suppression; the
//! handlers own the per-command behavior and reply frames.

mod dispatcher;
pub mod handlers;

pub use dispatcher::Dispatcher;
pub use handlers::HandlerContext;
