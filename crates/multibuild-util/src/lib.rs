#![forbid(unsafe_code)]
//! Filesystem and process helpers for multibuild.

pub mod error;
pub mod fs;
pub mod process;
