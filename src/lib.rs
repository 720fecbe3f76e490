//! Incremental build-and-reload orchestration.
//!
//! A [`session::Session`] watches a source tree, rebuilds each changed unit
//! into a mirrored output tree through a [`builder::Compiler`], and signals a
//! [`target::ReloadTarget`] to reload in place or restart once the burst of
//! changes has settled.

pub mod builder;
pub mod classify;
pub mod config;
pub mod debounce;
pub mod env;
pub mod error;
pub mod paths;
pub mod resolve;
pub mod router;
pub mod session;
pub mod target;
pub mod walker;
pub mod watcher;

pub use error::{Error, Result};
