//! Aleo SDK boundary
//!
//! Everything cryptographic (program parsing, key synthesis, proving, account
//! derivation, signing, record decryption, broadcasting) sits behind `AleoSdk`. The bridge never looks inside the
//! strings it passes through.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::chain::ChainEndpoint;
use crate::errors::SnorkleResult;
use crate::operation::FeeOptions;
use crate::types::TransferType;

/// Program id -> source text for every transitive import of a program
pub type Imports = BTreeMap<String, String>;

/// What the SDK reports after parsing a program source
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProgramInfo {
    pub id: String,
    pub functions: Vec<String>,
    #[serde(default)]
    pub imports: Vec<String>,
    #[serde(default)]
    pub mappings: Vec<String>,
}

impl ProgramInfo {
    pub fn has_function(&self, function: &str) -> bool {
        self.functions.iter().any(|f| f == function)
    }
}

/// Proving and verifying key for one function, as opaque strings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct KeyPair {
    pub proving_key: String,
    pub verifying_key: String,
}

/// Result of running a function locally
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LocalRun {
    pub outputs: Vec<String>,
    /// Execution transcript, present when the run produced a proof
    #[serde(default)]
    pub execution: Option<String>,
}

/// Private key with the view key and address derived from it
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccountKeys {
    pub private_key: String,
    pub view_key: String,
    pub address: String,
}

impl AccountKeys {
    /// Vault name used when the user gives none, e.g. `Account aleo1q`
    pub fn default_name(&self) -> String {
        let prefix: String = self.address.chars().take(6).collect();
        format!("Account {}", prefix)
    }
}

/// Arguments identifying one function invocation
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FunctionCall<'a> {
    pub program: &'a str,
    pub program_id: &'a str,
    pub function: &'a str,
    pub inputs: &'a [String],
    pub private_key: &'a str,
    pub imports: &'a Imports,
}

/// Opaque Aleo SDK
#[async_trait]
pub trait AleoSdk: Send + Sync {
    /// Prepare the SDK (thread pools, parameters). Called once before any request.
    async fn initialize(&self) -> SnorkleResult<()>;

    async fn parse_program(&self, source: &str) -> SnorkleResult<ProgramInfo>;

    async fn synthesize_keys(&self, call: &FunctionCall<'_>) -> SnorkleResult<KeyPair>;

    async fn run_local(&self, call: &FunctionCall<'_>, keys: &KeyPair) -> SnorkleResult<LocalRun>;

    async fn verify_execution(
        &self,
        execution: &str,
        verifying_key: &str,
        program: &str,
        function: &str,
    ) -> SnorkleResult<()>;

    /// Build and broadcast an execution; returns the transaction id
    async fn execute(
        &self,
        endpoint: &ChainEndpoint,
        call: &FunctionCall<'_>,
        fee: &FeeOptions,
        keys: &KeyPair,
    ) -> SnorkleResult<String>;

    /// Execution fee in microcredits
    async fn estimate_execution_fee(
        &self,
        endpoint: &ChainEndpoint,
        call: &FunctionCall<'_>,
        keys: &KeyPair,
    ) -> SnorkleResult<u64>;

    /// Deployment fee in microcredits
    async fn estimate_deployment_fee(&self, program: &str, imports: &Imports) -> SnorkleResult<u64>;

    async fn deploy(
        &self,
        endpoint: &ChainEndpoint,
        program: &str,
        imports: &Imports,
        fee: &FeeOptions,
        private_key: &str,
    ) -> SnorkleResult<String>;

    #[allow(clippy::too_many_arguments)]
    async fn transfer(
        &self,
        endpoint: &ChainEndpoint,
        amount_credits: f64,
        recipient: &str,
        transfer_type: TransferType,
        amount_record: Option<&str>,
        fee: &FeeOptions,
        private_key: &str,
    ) -> SnorkleResult<String>;

    async fn split(
        &self,
        endpoint: &ChainEndpoint,
        split_amount: f64,
        record: &str,
        private_key: &str,
    ) -> SnorkleResult<String>;

    async fn join(
        &self,
        endpoint: &ChainEndpoint,
        record_one: &str,
        record_two: &str,
        fee: &FeeOptions,
        private_key: &str,
    ) -> SnorkleResult<String>;

    // ------------------------------------------------------------------------
    // Accounts
    // ------------------------------------------------------------------------

    /// Fresh random private key
    async fn generate_private_key(&self) -> SnorkleResult<String>;

    async fn view_key_from_private_key(&self, private_key: &str) -> SnorkleResult<String>;

    async fn address_from_private_key(&self, private_key: &str) -> SnorkleResult<String>;

    async fn address_from_view_key(&self, view_key: &str) -> SnorkleResult<String>;

    /// Sign `message` with `private_key`; returns the signature string
    async fn sign_message(&self, private_key: &str, message: &str) -> SnorkleResult<String>;

    /// Whether `signature` over `message` was produced by `address`
    async fn verify_message(
        &self,
        address: &str,
        message: &str,
        signature: &str,
    ) -> SnorkleResult<bool>;

    /// Plaintext of a record ciphertext owned by `view_key`
    async fn decrypt_record(&self, view_key: &str, ciphertext: &str) -> SnorkleResult<String>;

    /// Parse `private_key` and derive its view key and address
    async fn derive_account(&self, private_key: &str) -> SnorkleResult<AccountKeys> {
        let view_key = self.view_key_from_private_key(private_key).await?;
        let address = self.address_from_private_key(private_key).await?;
        Ok(AccountKeys {
            private_key: private_key.to_string(),
            view_key,
            address,
        })
    }

    async fn generate_account(&self) -> SnorkleResult<AccountKeys> {
        let private_key = self.generate_private_key().await?;
        self.derive_account(&private_key).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_account_default_name() {
        let account = AccountKeys {
            private_key: "APrivateKey1abc".into(),
            view_key: "AViewKey1abc".into(),
            address: "aleo1qxyz".into(),
        };
        assert_eq!(account.default_name(), "Account aleo1q");
    }
}
