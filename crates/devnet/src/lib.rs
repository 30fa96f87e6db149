#![forbid(unsafe_code)]

pub mod accounts;
pub mod api;
pub mod arguments;
pub mod artifact;
pub mod bootstrap;
pub mod chain;
pub mod contracts;
pub mod deploy;
pub mod orchestrator;
pub mod snapshot;
pub mod supervisor;
pub mod watcher;

mod observe;
mod run;

pub use run::{run, start};
