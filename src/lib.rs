//! VotaBot library
//!
//! Core functionality for the VotaBot poll bot: the poll lifecycle state
//! machine, the durable poll store, the periodic expiration/retention
//! sweeps, the command grammar, and the Discord channel adapter.

pub mod channels;
pub mod cli;
pub mod commands;
pub mod config;
pub mod poll;
pub mod scheduler;
pub mod store;
