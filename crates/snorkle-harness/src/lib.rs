//! Snorkle Harness
//!
//! Fixture programs and request builders shared by the runtime and CLI tests, plus
//! (behind the `testing` feature) in-memory stand-ins for the Aleo SDK and the chain.

pub mod fixtures;

#[cfg(feature = "testing")]
pub mod chain;
#[cfg(feature = "testing")]
pub mod sdk;

pub use fixtures::*;

#[cfg(feature = "testing")]
pub use chain::{MockChainClient, MockConnector};
#[cfg(feature = "testing")]
pub use sdk::{parse_toy_program, toy_record_ciphertext, MockSdk, PostedTransaction};
