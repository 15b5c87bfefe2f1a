//! State persistence for the Snorkle CLI
//!
//! Three JSON files live in the data directory: the key vault, the
//! transaction history and the selected network. Each store writes its file
//! after every mutation.

use chrono::Utc;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use snorkle_core::{ChainEndpoint, KeyMaterial, Network, DEFAULT_ENDPOINT_URL, DEVNET_ENDPOINT_URL};
use std::path::{Path, PathBuf};
use std::str::FromStr;
use uuid::Uuid;

use crate::error::{CliError, Result};

const KEY_VAULT_FILE: &str = "key_vault.json";
const HISTORY_FILE: &str = "transaction_history.json";
const NETWORK_FILE: &str = "network.json";

fn load_json<T: DeserializeOwned + Default>(path: &Path) -> Result<T> {
    if !path.exists() {
        return Ok(T::default());
    }

    let contents = std::fs::read_to_string(path).map_err(|e| {
        CliError::StatePersistence(format!("Failed to read {}: {}", path.display(), e))
    })?;
    serde_json::from_str(&contents).map_err(|e| {
        CliError::StatePersistence(format!("Failed to parse {}: {}", path.display(), e))
    })
}

fn save_json<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(|e| {
            CliError::StatePersistence(format!("Failed to create {}: {}", parent.display(), e))
        })?;
    }

    let contents = serde_json::to_string_pretty(value)?;
    std::fs::write(path, contents).map_err(|e| {
        CliError::StatePersistence(format!("Failed to write {}: {}", path.display(), e))
    })
}

/// Milliseconds since the Unix epoch
fn current_timestamp() -> u64 {
    Utc::now().timestamp_millis().max(0) as u64
}

// ----------------------------------------------------------------------------
// Key Vault
// ----------------------------------------------------------------------------

/// Fields to change on a stored key; `None` leaves a field as is
#[derive(Debug, Clone, Default)]
pub struct KeyUpdate {
    pub name: Option<String>,
    pub private_key: Option<String>,
    pub view_key: Option<String>,
    pub address: Option<String>,
}

pub struct KeyVault {
    path: PathBuf,
    keys: Vec<KeyMaterial>,
}

impl KeyVault {
    pub fn open(data_dir: &Path) -> Result<Self> {
        let path = data_dir.join(KEY_VAULT_FILE);
        let keys = load_json(&path)?;
        Ok(Self { path, keys })
    }

    pub fn list(&self) -> &[KeyMaterial] {
        &self.keys
    }

    pub fn find_by_name(&self, name: &str) -> Option<&KeyMaterial> {
        self.keys.iter().find(|key| key.name == name)
    }

    pub fn add(
        &mut self,
        name: &str,
        private_key: &str,
        view_key: &str,
        address: &str,
    ) -> Result<&KeyMaterial> {
        if self.find_by_name(name).is_some() {
            return Err(CliError::InvalidArgument(format!(
                "a key named '{}' already exists",
                name
            )));
        }

        self.keys.push(KeyMaterial::new(
            name,
            private_key,
            view_key,
            address,
            current_timestamp(),
        ));
        self.save()?;
        self.keys
            .last()
            .ok_or_else(|| CliError::StatePersistence("key vault is empty after insert".into()))
    }

    pub fn edit(&mut self, id: Uuid, update: KeyUpdate) -> Result<()> {
        if let Some(new_name) = &update.name {
            if self.keys.iter().any(|k| k.id != id && &k.name == new_name) {
                return Err(CliError::InvalidArgument(format!(
                    "a key named '{}' already exists",
                    new_name
                )));
            }
        }

        let key = self
            .keys
            .iter_mut()
            .find(|key| key.id == id)
            .ok_or_else(|| CliError::KeyNotFound(id.to_string()))?;

        if let Some(name) = update.name {
            key.name = name;
        }
        if let Some(private_key) = update.private_key {
            key.private_key = private_key;
        }
        if let Some(view_key) = update.view_key {
            key.view_key = view_key;
        }
        if let Some(address) = update.address {
            key.address = address;
        }
        self.save()
    }

    pub fn remove(&mut self, id: Uuid) -> Result<bool> {
        let before = self.keys.len();
        self.keys.retain(|key| key.id != id);
        let removed = self.keys.len() < before;
        if removed {
            self.save()?;
        }
        Ok(removed)
    }

    pub fn clear(&mut self) -> Result<()> {
        self.keys.clear();
        self.save()
    }

    fn save(&self) -> Result<()> {
        save_json(&self.path, &self.keys)
    }
}

// ----------------------------------------------------------------------------
// Transaction History
// ----------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransactionRecord {
    pub id: Uuid,
    /// Operation that produced the transaction, e.g. `deploy`
    #[serde(rename = "type")]
    pub kind: String,
    pub transaction_id: String,
    /// RFC 3339
    pub timestamp: String,
    pub network: Network,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub program_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub function_name: Option<String>,
    /// Vault key that signed, if one was used
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub key_name: Option<String>,
}

/// What a command knows about a transaction it just created
#[derive(Debug, Clone)]
pub struct NewTransaction {
    pub kind: String,
    pub transaction_id: String,
    pub network: Network,
    pub program_id: Option<String>,
    pub function_name: Option<String>,
    pub key_name: Option<String>,
}

pub struct TransactionHistory {
    path: PathBuf,
    records: Vec<TransactionRecord>,
}

impl TransactionHistory {
    pub fn open(data_dir: &Path) -> Result<Self> {
        let path = data_dir.join(HISTORY_FILE);
        let records = load_json(&path)?;
        Ok(Self { path, records })
    }

    /// Newest first
    pub fn list(&self) -> &[TransactionRecord] {
        &self.records
    }

    pub fn record(&mut self, transaction: NewTransaction) -> Result<&TransactionRecord> {
        let record = TransactionRecord {
            id: Uuid::new_v4(),
            kind: transaction.kind,
            transaction_id: transaction.transaction_id,
            timestamp: Utc::now().to_rfc3339(),
            network: transaction.network,
            program_id: transaction.program_id,
            function_name: transaction.function_name,
            key_name: transaction.key_name,
        };
        self.records.insert(0, record);
        self.save()?;
        self.records
            .first()
            .ok_or_else(|| CliError::StatePersistence("history is empty after insert".into()))
    }

    pub fn remove(&mut self, id: Uuid) -> Result<bool> {
        let before = self.records.len();
        self.records.retain(|record| record.id != id);
        let removed = self.records.len() < before;
        if removed {
            self.save()?;
        }
        Ok(removed)
    }

    pub fn clear(&mut self) -> Result<()> {
        self.records.clear();
        self.save()
    }

    fn save(&self) -> Result<()> {
        save_json(&self.path, &self.records)
    }
}

// ----------------------------------------------------------------------------
// Network Settings
// ----------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EndpointPreset {
    #[default]
    Provable,
    Devnet,
    Custom,
}

impl EndpointPreset {
    pub fn as_str(&self) -> &'static str {
        match self {
            EndpointPreset::Provable => "provable",
            EndpointPreset::Devnet => "devnet",
            EndpointPreset::Custom => "custom",
        }
    }
}

impl std::fmt::Display for EndpointPreset {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EndpointPreset {
    type Err = CliError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "provable" => Ok(EndpointPreset::Provable),
            "devnet" => Ok(EndpointPreset::Devnet),
            "custom" => Ok(EndpointPreset::Custom),
            other => Err(CliError::InvalidArgument(format!(
                "unknown endpoint '{}', expected provable, devnet or custom",
                other
            ))),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NetworkSettings {
    pub network: Network,
    pub endpoint: EndpointPreset,
    #[serde(default)]
    pub custom_endpoint: String,
}

impl NetworkSettings {
    pub fn load(data_dir: &Path) -> Result<Self> {
        load_json(&data_dir.join(NETWORK_FILE))
    }

    pub fn save(&self, data_dir: &Path) -> Result<()> {
        save_json(&data_dir.join(NETWORK_FILE), self)
    }

    /// A custom endpoint must be an http(s) URL; presets are always valid
    pub fn is_custom_endpoint_valid(&self) -> bool {
        self.endpoint != EndpointPreset::Custom
            || self.custom_endpoint.starts_with("http://")
            || self.custom_endpoint.starts_with("https://")
    }

    pub fn endpoint_url(&self) -> &str {
        match self.endpoint {
            EndpointPreset::Provable => DEFAULT_ENDPOINT_URL,
            EndpointPreset::Devnet => DEVNET_ENDPOINT_URL,
            EndpointPreset::Custom => &self.custom_endpoint,
        }
    }

    pub fn chain_endpoint(&self) -> Result<ChainEndpoint> {
        if !self.is_custom_endpoint_valid() {
            return Err(CliError::InvalidArgument(format!(
                "custom endpoint '{}' must start with http:// or https://",
                self.custom_endpoint
            )));
        }
        ChainEndpoint::new(self.endpoint_url(), self.network)
            .map_err(|e| CliError::InvalidArgument(e.to_string()))
    }
}
