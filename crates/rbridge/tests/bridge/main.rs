//! Integration tests for rbridge.
//!
//! Every test drives the public API against an in-memory runtime and a
//! scripted host (see `common`), so no interpreter or spreadsheet process is
//! needed.

mod common;
mod marshal;

pub use common::*;
