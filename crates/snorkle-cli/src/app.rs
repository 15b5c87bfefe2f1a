//! Snorkle application state shared by the command handlers

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

use snorkle_core::{AccountKeys, AleoSdk, ChainEndpoint, KeyMaterial, Network, OperationKind};
use snorkle_runtime::{start_bridge, BridgeHandle, HttpChainClient, HttpConnector, SidecarSdk};

use crate::cli::SignerArgs;
use crate::config::AppConfig;
use crate::error::{CliError, Result};
use crate::state::{KeyVault, NetworkSettings, NewTransaction, TransactionHistory};

/// Private key chosen for an operation, and the vault entry it came from
#[derive(Debug, Clone)]
pub struct Signer {
    pub private_key: String,
    pub key_name: Option<String>,
}

pub struct SnorkleApp {
    pub config: AppConfig,
    pub data_dir: PathBuf,
    pub keys: KeyVault,
    pub history: TransactionHistory,
    pub network: NetworkSettings,
}

impl SnorkleApp {
    pub fn new(config: AppConfig) -> Result<Self> {
        let data_dir = config.data_dir()?;
        std::fs::create_dir_all(&data_dir)?;
        debug!("Using data directory {}", data_dir.display());

        Ok(Self {
            keys: KeyVault::open(&data_dir)?,
            history: TransactionHistory::open(&data_dir)?,
            network: NetworkSettings::load(&data_dir)?,
            config,
            data_dir,
        })
    }

    pub fn endpoint(&self) -> Result<ChainEndpoint> {
        self.network.chain_endpoint()
    }

    pub fn save_network(&self) -> Result<()> {
        self.network.save(&self.data_dir)
    }

    fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.config.bridge.request_timeout_secs)
    }

    /// REST client for the selected endpoint
    pub fn chain_client(&self) -> Result<HttpChainClient> {
        let connector = HttpConnector::new(self.request_timeout())?;
        Ok(connector.client_for(&self.endpoint()?))
    }

    /// Launch the SDK sidecar and wait for the executor to report ready
    pub async fn start_bridge(&self) -> Result<BridgeHandle> {
        let endpoint = self.endpoint()?;
        info!("Starting bridge against {}", endpoint.network_url());

        let sdk = SidecarSdk::spawn(&self.config.sdk.command, &self.config.sdk.args)?;
        let connector = HttpConnector::new(self.request_timeout())?;
        let handle = start_bridge(
            Arc::new(sdk),
            Arc::new(connector),
            self.config.to_snorkle_config(endpoint),
        )
        .await?;

        handle.wait_ready().await?;
        Ok(handle)
    }

    /// Launch the SDK sidecar alone, for account operations that need no executor
    pub async fn start_sdk(&self) -> Result<SidecarSdk> {
        let sdk = SidecarSdk::spawn(&self.config.sdk.command, &self.config.sdk.args)?;
        sdk.initialize().await?;
        Ok(sdk)
    }

    /// Store `account` in the vault under `name`, or its default name
    pub fn store_account(
        &mut self,
        name: Option<String>,
        account: &AccountKeys,
    ) -> Result<&KeyMaterial> {
        let name = name.unwrap_or_else(|| account.default_name());
        self.keys.add(
            &name,
            &account.private_key,
            &account.view_key,
            &account.address,
        )
    }

    /// `explicit` when given, else `field` of the vault key named `key`
    pub fn key_field<F>(
        &self,
        explicit: Option<String>,
        key: Option<&str>,
        field: F,
        what: &str,
    ) -> Result<String>
    where
        F: Fn(&KeyMaterial) -> &String,
    {
        if let Some(value) = explicit {
            return Ok(value);
        }
        let Some(name) = key else {
            return Err(CliError::InvalidArgument(format!(
                "pass --{} or choose a vault key with --key",
                what
            )));
        };
        self.keys
            .find_by_name(name)
            .map(|material| field(material).clone())
            .ok_or_else(|| CliError::KeyNotFound(name.to_string()))
    }

    /// Pick the signing key: a named vault entry, a raw key, or the only
    /// key in the vault
    pub fn resolve_signer(&self, args: &SignerArgs) -> Result<Signer> {
        if let Some(private_key) = &args.private_key {
            return Ok(Signer {
                private_key: private_key.clone(),
                key_name: None,
            });
        }

        if let Some(name) = &args.key {
            let key = self
                .keys
                .find_by_name(name)
                .ok_or_else(|| CliError::KeyNotFound(name.clone()))?;
            return Ok(Signer {
                private_key: key.private_key.clone(),
                key_name: Some(key.name.clone()),
            });
        }

        match self.keys.list() {
            [only] => Ok(Signer {
                private_key: only.private_key.clone(),
                key_name: Some(only.name.clone()),
            }),
            [] => Err(CliError::InvalidArgument(
                "no keys stored; pass --private-key or add one with `snorkle keys add`".into(),
            )),
            _ => Err(CliError::InvalidArgument(
                "several keys stored; choose one with --key".into(),
            )),
        }
    }

    pub fn current_network(&self) -> Network {
        self.network.network
    }

    /// Append a broadcast transaction to the history
    pub fn record_transaction(
        &mut self,
        kind: OperationKind,
        transaction_id: &str,
        signer: &Signer,
        program_id: Option<String>,
        function_name: Option<String>,
    ) -> Result<()> {
        let network = self.current_network();
        self.history.record(NewTransaction {
            kind: kind.as_str().to_string(),
            transaction_id: transaction_id.to_string(),
            network,
            program_id,
            function_name,
            key_name: signer.key_name.clone(),
        })?;
        Ok(())
    }
}

/// Derive the view key and address of `private_key`
///
/// Parts the user supplied must match what the SDK derives.
pub async fn complete_account(
    sdk: &dyn AleoSdk,
    private_key: &str,
    view_key: Option<String>,
    address: Option<String>,
) -> Result<AccountKeys> {
    let account = sdk.derive_account(private_key).await?;
    for (given, derived, what) in [
        (view_key, &account.view_key, "view key"),
        (address, &account.address, "address"),
    ] {
        if let Some(given) = given {
            if &given != derived {
                return Err(CliError::InvalidArgument(format!(
                    "{} {} does not belong to this private key",
                    what, given
                )));
            }
        }
    }
    Ok(account)
}

#[cfg(test)]
mod tests {
    use super::*;
    use snorkle_harness::{MockSdk, TEST_ADDRESS, TEST_PRIVATE_KEY, TEST_VIEW_KEY};
    use tempfile::TempDir;

    fn app_in(dir: &TempDir) -> SnorkleApp {
        let mut config = AppConfig::default();
        config.storage.data_dir = Some(dir.path().to_path_buf());
        SnorkleApp::new(config).unwrap()
    }

    fn signer_args(key: Option<&str>, private_key: Option<&str>) -> SignerArgs {
        SignerArgs {
            key: key.map(str::to_string),
            private_key: private_key.map(str::to_string),
        }
    }

    #[test]
    fn test_signer_resolution() {
        let dir = TempDir::new().unwrap();
        let mut app = app_in(&dir);

        assert!(app.resolve_signer(&signer_args(None, None)).is_err());

        let raw = app.resolve_signer(&signer_args(None, Some("APrivateKey1raw"))).unwrap();
        assert_eq!(raw.private_key, "APrivateKey1raw");
        assert!(raw.key_name.is_none());

        app.keys.add("alice", "APrivateKey1a", "vk", "aleo1a").unwrap();
        let only = app.resolve_signer(&signer_args(None, None)).unwrap();
        assert_eq!(only.key_name.as_deref(), Some("alice"));

        app.keys.add("bob", "APrivateKey1b", "vk", "aleo1b").unwrap();
        assert!(app.resolve_signer(&signer_args(None, None)).is_err());
        let bob = app.resolve_signer(&signer_args(Some("bob"), None)).unwrap();
        assert_eq!(bob.private_key, "APrivateKey1b");

        assert!(matches!(
            app.resolve_signer(&signer_args(Some("carol"), None)),
            Err(CliError::KeyNotFound(_))
        ));
    }

    #[test]
    fn test_recorded_transactions_keep_network_and_key_name() {
        let dir = TempDir::new().unwrap();
        let mut app = app_in(&dir);
        app.network.network = Network::Mainnet;

        let signer = Signer {
            private_key: "APrivateKey1a".into(),
            key_name: Some("alice".into()),
        };
        app.record_transaction(
            OperationKind::ExecuteOnChain,
            "at1abc",
            &signer,
            Some("hello.aleo".into()),
            Some("main".into()),
        )
        .unwrap();

        let reopened = TransactionHistory::open(dir.path()).unwrap();
        let record = &reopened.list()[0];
        assert_eq!(record.kind, "execute-on-chain");
        assert_eq!(record.network, Network::Mainnet);
        assert_eq!(record.key_name.as_deref(), Some("alice"));
        assert_eq!(record.function_name.as_deref(), Some("main"));
    }

    #[tokio::test]
    async fn test_complete_account_derives_missing_parts() {
        let sdk = MockSdk::new();

        let account = complete_account(&sdk, TEST_PRIVATE_KEY, None, None).await.unwrap();
        assert_eq!(account.view_key, TEST_VIEW_KEY);
        assert_eq!(account.address, TEST_ADDRESS);

        let checked = complete_account(&sdk, TEST_PRIVATE_KEY, None, Some(TEST_ADDRESS.into()))
            .await
            .unwrap();
        assert_eq!(checked, account);

        let mismatch =
            complete_account(&sdk, TEST_PRIVATE_KEY, Some("AViewKey1other".into()), None).await;
        assert!(matches!(mismatch, Err(CliError::InvalidArgument(_))));

        let invalid = complete_account(&sdk, "garbage", None, None).await;
        assert!(matches!(invalid, Err(CliError::Snorkle(_))));
    }

    #[tokio::test]
    async fn test_generated_account_is_stored_under_default_name() {
        let dir = TempDir::new().unwrap();
        let mut app = app_in(&dir);
        let account = MockSdk::new().generate_account().await.unwrap();

        let stored = app.store_account(None, &account).unwrap();
        assert_eq!(stored.name, account.default_name());
        assert_eq!(stored.address, account.address);

        assert!(app.store_account(None, &account).is_err());
        app.store_account(Some("spare".into()), &account).unwrap();
        assert_eq!(app.keys.list().len(), 2);
    }

    #[test]
    fn test_key_field_prefers_explicit_value() {
        let dir = TempDir::new().unwrap();
        let mut app = app_in(&dir);
        app.keys.add("alice", "APrivateKey1a", "AViewKey1a", "aleo1a").unwrap();

        let explicit = app
            .key_field(Some("aleo1b".into()), Some("alice"), |k| &k.address, "address")
            .unwrap();
        assert_eq!(explicit, "aleo1b");

        let from_vault = app
            .key_field(None, Some("alice"), |k| &k.view_key, "view-key")
            .unwrap();
        assert_eq!(from_vault, "AViewKey1a");

        assert!(matches!(
            app.key_field(None, Some("bob"), |k| &k.address, "address"),
            Err(CliError::KeyNotFound(_))
        ));
        assert!(app.key_field(None, None, |k| &k.address, "address").is_err());
    }
}
