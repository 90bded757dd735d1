//! A Redis-compatible key-value server with append-only file durability.
//!
//! The server keeps an ordered keyspace in memory and speaks the Redis wire
//! protocol, both the binary multibulk framing and the legacy inline (telnet)
//! framing. Every successful write command is appended verbatim to an
//! append-only file, which is replayed through the same parser and command
//! table at startup to rebuild the keyspace.
//!
//! Supported commands: GET, SET, DEL, plus the connection-level PING and QUIT.

pub mod aof;
pub mod commands;
pub mod config;
pub mod connection;
pub mod input;
pub mod key_value_store;
pub mod resp;
pub mod server;
