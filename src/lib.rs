//! Breakpoint and current instruction synchronization bridge between an external debugger
//! and a disassembler.

pub mod bridge;
pub mod config;
pub mod error;
pub mod log;
pub mod rpc;
pub mod view;
