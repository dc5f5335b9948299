//! Heat pump bridge library.
//!
//! Polls a heat pump for the coils that registered entities care about and
//! exposes their values as platform entities. The core is the selective
//! refresh [`coordinator`]; sources, entities and configuration sit around it.

pub mod config;
pub mod coordinator;
pub mod device;
pub mod entity;
pub mod error;
pub mod source;
