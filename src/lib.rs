//! Balance Bot Library
//!
//! A Telegram chat bot that keeps a per-user balance ledger.
//!
//! This crate provides the core functionality for:
//! - Storing balances in a JSON file with atomic, serialized updates
//! - Parsing and executing chat commands (`balance`, `earn`, `leaderboard`)
//! - Connecting to Telegram via `MTProto` as a bot

pub mod commands;
pub mod config;
pub mod ledger;
pub mod telegram;
