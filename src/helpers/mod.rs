//! Thin wrappers around external tools and services: git, cmake, the remote
//! cache store, release downloads, archive extraction, and tree hashing.

pub mod cache;
pub mod cmake;
pub mod cmd;
pub mod download;
pub mod extract;
pub mod git;
pub mod hash;
