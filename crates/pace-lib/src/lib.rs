mod cli;
mod commands;
mod config;
mod engine;
mod interpolate;
mod logging;
mod process;
mod run;
mod shell;
mod signal;
mod ui;
mod watch;

pub use cli::{main, Args};
pub use config::Config;
pub use run::{Error, RunOpts, Runner};
