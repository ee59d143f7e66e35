//! Nullable infrastructure for deterministic testing.
//!
//! Every external dependency of the engine (clock, storage, the chain RPC,
//! the chat platform) sits behind a trait. This crate provides test-friendly
//! implementations that:
//! - Return deterministic values
//! - Can be controlled programmatically
//! - Never touch the filesystem or network
//!
//! Usage: swap real implementations for nullables in tests.

pub mod balance;
pub mod clock;
pub mod notifier;
pub mod store;

pub use balance::NullBalanceSource;
pub use clock::NullClock;
pub use notifier::{NullNotifier, SentMessage};
pub use store::NullStore;
