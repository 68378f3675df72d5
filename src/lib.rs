//! `SignClash` - two-player sign-clash match server
//!
//! A 16-sign generalization of rock-paper-scissors: two players meet in a
//! lobby by public code, ready up, and play rounds resolved on a cyclic
//! beats ring. This library provides the resolution algorithm, the match
//! state machine, and the HTTP/SSE server around them.

pub mod broadcast;
pub mod cli;
pub mod config;
pub mod error;
pub mod game;
pub mod observability;
pub mod sign;
pub mod store;
pub mod transport;
