//! gyatt: a content-addressed version control store with a GitHub Git Data
//! and IPFS synchronization layer. The library exposes every command as an
//! API; the binary in `main.rs` is a thin dispatcher around [`cli`].

pub mod cli;
pub mod command;
pub mod internal;
pub mod utils;
