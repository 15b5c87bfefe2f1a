//! Core types shared across the bridge

use core::fmt;
use core::str::FromStr;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::errors::SnorkleError;

// ----------------------------------------------------------------------------
// Correlation
// ----------------------------------------------------------------------------

/// Token attached to a request and echoed in its terminal response
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CorrelationId(u64);

impl CorrelationId {
    pub const fn new(value: u64) -> Self {
        Self(value)
    }

    pub fn value(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for CorrelationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

// ----------------------------------------------------------------------------
// Key Material
// ----------------------------------------------------------------------------

/// An account's key strings as stored by the foreground key vault
///
/// The strings are opaque to the bridge; only the SDK interprets them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct KeyMaterial {
    pub id: Uuid,
    pub name: String,
    pub private_key: String,
    pub view_key: String,
    pub address: String,
    /// Milliseconds since the Unix epoch
    pub created_at: u64,
}

impl KeyMaterial {
    pub fn new(
        name: impl Into<String>,
        private_key: impl Into<String>,
        view_key: impl Into<String>,
        address: impl Into<String>,
        created_at: u64,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            private_key: private_key.into(),
            view_key: view_key.into(),
            address: address.into(),
            created_at,
        }
    }
}

// ----------------------------------------------------------------------------
// Network
// ----------------------------------------------------------------------------

/// Aleo network segment used in REST paths
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Network {
    Mainnet,
    #[default]
    Testnet,
    Canary,
}

impl Network {
    pub const ALL: [Network; 3] = [Network::Mainnet, Network::Testnet, Network::Canary];

    pub fn as_str(&self) -> &'static str {
        match self {
            Network::Mainnet => "mainnet",
            Network::Testnet => "testnet",
            Network::Canary => "canary",
        }
    }
}

impl fmt::Display for Network {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Network {
    type Err = SnorkleError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "mainnet" => Ok(Network::Mainnet),
            "testnet" => Ok(Network::Testnet),
            "canary" => Ok(Network::Canary),
            other => Err(SnorkleError::validation(format!("Unknown network: {}", other))),
        }
    }
}

// ----------------------------------------------------------------------------
// Transfer Type
// ----------------------------------------------------------------------------

/// Visibility of a credits transfer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransferType {
    Private,
    PrivateToPublic,
    Public,
    PublicToPrivate,
}

impl TransferType {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransferType::Private => "private",
            TransferType::PrivateToPublic => "private_to_public",
            TransferType::Public => "public",
            TransferType::PublicToPrivate => "public_to_private",
        }
    }
}

impl fmt::Display for TransferType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TransferType {
    type Err = SnorkleError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().replace('-', "_").as_str() {
            "private" => Ok(TransferType::Private),
            "private_to_public" => Ok(TransferType::PrivateToPublic),
            "public" => Ok(TransferType::Public),
            "public_to_private" => Ok(TransferType::PublicToPrivate),
            other => Err(SnorkleError::validation(format!(
                "Unknown transfer type: {}",
                other
            ))),
        }
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
