//! hashkv admin tooling
//!
//! Configuration loading for the `hashkv-admin` binary.

pub mod config;
