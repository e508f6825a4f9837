//! `process`
//!
//! Spawning and supervising the child processes that task and hook bodies
//! run in. A `Child` is started immediately and supervised by its own tokio
//! task; handles can wait for it, stop it gracefully, or kill it outright.

mod child;
mod command;

pub use child::{Child, ChildExit, ShutdownStyle};
pub use command::Command;
