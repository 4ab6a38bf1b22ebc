//! Shared utilities used by the library and both binaries.

pub mod logger;
