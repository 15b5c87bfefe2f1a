//! Command handlers for the Snorkle CLI

use std::path::Path;
use tracing::{info, warn};
use uuid::Uuid;

use snorkle_core::{
    AccountKeys, AleoSdk, ChainClient, DeployParams, DeploymentFeeParams, ExecuteLocalParams, ExecuteOnChainParams,
    ExecutionFeeParams, JoinParams, OperationKind, SnorkleResult, SplitParams, TransferParams,
    TransferType,
};
use snorkle_runtime::BridgeHandle;

use crate::app::{complete_account, Signer, SnorkleApp};
use crate::cli::{
    AccountAction, Commands, FeeArgs, HistoryAction, KeyAction, NetworkAction, RestQuery,
    SignerArgs,
};
use crate::error::{CliError, Result};
use crate::state::{EndpointPreset, KeyUpdate};

pub struct CommandDispatcher;

impl CommandDispatcher {
    pub async fn execute(command: Commands, mut app: SnorkleApp) -> Result<()> {
        match command {
            Commands::Rest { query } => Self::handle_rest(&app, query).await,
            Commands::Keys { action } => Self::handle_keys(&mut app, action).await,
            Commands::Account { action } => Self::handle_account(&app, action).await,
            Commands::History { action } => Self::handle_history(&mut app, action),
            Commands::Network { action } => Self::handle_network(&mut app, action),
            Commands::Deploy {
                program,
                signer,
                fee,
            } => Self::handle_deploy(&mut app, &program, &signer, fee).await,
            Commands::Execute {
                target,
                function,
                inputs,
                local,
                signer,
                fee,
            } => {
                if local {
                    Self::handle_execute_local(&app, Path::new(&target), function, inputs, &signer)
                        .await
                } else {
                    Self::handle_execute_on_chain(&mut app, target, function, inputs, &signer, fee)
                        .await
                }
            }
            Commands::EstimateFee {
                program_id,
                function,
                inputs,
                signer,
            } => Self::handle_estimate_fee(&app, program_id, function, inputs, &signer).await,
            Commands::EstimateDeployFee { program } => {
                Self::handle_estimate_deploy_fee(&app, &program).await
            }
            Commands::Transfer {
                recipient,
                amount,
                transfer_type,
                amount_record,
                signer,
                fee,
            } => {
                Self::handle_transfer(
                    &mut app,
                    recipient,
                    amount,
                    transfer_type,
                    amount_record,
                    &signer,
                    fee,
                )
                .await
            }
            Commands::Split {
                record,
                amount,
                signer,
            } => Self::handle_split(&mut app, record, amount, &signer).await,
            Commands::Join {
                record_one,
                record_two,
                signer,
                fee,
            } => Self::handle_join(&mut app, record_one, record_two, &signer, fee).await,
        }
    }

    // ------------------------------------------------------------------------
    // Chain queries
    // ------------------------------------------------------------------------

    async fn handle_rest(app: &SnorkleApp, query: RestQuery) -> Result<()> {
        let client = app.chain_client()?;
        info!("Querying {}", client.endpoint().network_url());

        match query {
            RestQuery::LatestBlock => print_json(&client.latest_block().await?)?,
            RestQuery::LatestHeight => println!("{}", client.latest_height().await?),
            RestQuery::Block { id } => {
                let block = match id.parse::<u64>() {
                    Ok(height) => client.block_by_height(height).await?,
                    Err(_) => client.block_by_hash(&id).await?,
                };
                print_json(&block)?;
            }
            RestQuery::Program { program_id } => println!("{}", client.program(&program_id).await?),
            RestQuery::MappingNames { program_id } => {
                for name in client.mapping_names(&program_id).await? {
                    println!("{}", name);
                }
            }
            RestQuery::MappingValue {
                program_id,
                mapping,
                key,
            } => match client.mapping_value(&program_id, &mapping, &key).await? {
                Some(value) => print_json(&value)?,
                None => println!("No value for '{}' in {}/{}", key, program_id, mapping),
            },
            RestQuery::Transaction { transaction_id } => {
                print_json(&client.transaction(&transaction_id).await?)?
            }
        }
        Ok(())
    }

    // ------------------------------------------------------------------------
    // Local state
    // ------------------------------------------------------------------------

    async fn handle_keys(app: &mut SnorkleApp, action: KeyAction) -> Result<()> {
        match action {
            KeyAction::List => {
                if app.keys.list().is_empty() {
                    println!("No keys stored");
                }
                for key in app.keys.list() {
                    println!("{}  {}", key.name, key.address);
                }
            }
            KeyAction::Add {
                name,
                private_key,
                view_key,
                address,
            } => {
                let account = match (view_key, address) {
                    (Some(view_key), Some(address)) => AccountKeys {
                        private_key,
                        view_key,
                        address,
                    },
                    (view_key, address) => {
                        let sdk = app.start_sdk().await?;
                        complete_account(&sdk, &private_key, view_key, address).await?
                    }
                };
                let key = app.store_account(Some(name), &account)?;
                println!("Added key '{}' ({})", key.name, key.address);
            }
            KeyAction::Generate { name } => {
                let sdk = app.start_sdk().await?;
                let account = sdk.generate_account().await?;
                let key = app.store_account(name, &account)?;
                println!("Generated key '{}'", key.name);
                println!("Address:  {}", key.address);
            }
            KeyAction::Edit {
                name,
                rename,
                private_key,
                view_key,
                address,
            } => {
                let id = Self::key_id(app, &name)?;
                app.keys.edit(
                    id,
                    KeyUpdate {
                        name: rename,
                        private_key,
                        view_key,
                        address,
                    },
                )?;
                println!("Updated key '{}'", name);
            }
            KeyAction::Remove { name } => {
                let id = Self::key_id(app, &name)?;
                app.keys.remove(id)?;
                println!("Removed key '{}'", name);
            }
            KeyAction::Clear => {
                app.keys.clear()?;
                println!("Key vault cleared");
            }
        }
        Ok(())
    }

    async fn handle_account(app: &SnorkleApp, action: AccountAction) -> Result<()> {
        let sdk = app.start_sdk().await?;

        match action {
            AccountAction::Derive {
                private_key,
                view_key,
            } => match (private_key, view_key) {
                (Some(private_key), _) => {
                    let account = sdk.derive_account(&private_key).await?;
                    println!("Private key: {}", account.private_key);
                    println!("View key:    {}", account.view_key);
                    println!("Address:     {}", account.address);
                }
                (None, Some(view_key)) => {
                    println!("Address: {}", sdk.address_from_view_key(&view_key).await?);
                }
                (None, None) => {
                    return Err(CliError::InvalidArgument(
                        "pass --private-key or --view-key".into(),
                    ))
                }
            },
            AccountAction::Sign { message, signer } => {
                let signer = app.resolve_signer(&signer)?;
                println!("{}", sdk.sign_message(&signer.private_key, &message).await?);
            }
            AccountAction::Verify {
                message,
                signature,
                address,
                key,
            } => {
                let address = app.key_field(address, key.as_deref(), |k| &k.address, "address")?;
                if sdk.verify_message(&address, &message, &signature).await? {
                    println!("Signature is valid for {}", address);
                } else {
                    println!("Signature is NOT valid for {}", address);
                }
            }
            AccountAction::Decrypt {
                ciphertext,
                view_key,
                key,
            } => {
                let view_key =
                    app.key_field(view_key, key.as_deref(), |k| &k.view_key, "view-key")?;
                println!("{}", sdk.decrypt_record(&view_key, &ciphertext).await?);
            }
        }
        Ok(())
    }

    fn key_id(app: &SnorkleApp, name: &str) -> Result<Uuid> {
        app.keys
            .find_by_name(name)
            .map(|key| key.id)
            .ok_or_else(|| CliError::KeyNotFound(name.to_string()))
    }

    fn handle_history(app: &mut SnorkleApp, action: HistoryAction) -> Result<()> {
        match action {
            HistoryAction::List => {
                if app.history.list().is_empty() {
                    println!("No transactions recorded");
                }
                for record in app.history.list() {
                    let target = match (&record.program_id, &record.function_name) {
                        (Some(program), Some(function)) => format!(" {}/{}", program, function),
                        (Some(program), None) => format!(" {}", program),
                        _ => String::new(),
                    };
                    println!(
                        "{}  {}  {:<16} {}{}  [{}]",
                        record.id,
                        record.timestamp,
                        record.kind,
                        record.transaction_id,
                        target,
                        record.network
                    );
                }
            }
            HistoryAction::Remove { id } => {
                let id = Uuid::parse_str(&id)
                    .map_err(|e| CliError::InvalidArgument(format!("invalid id '{}': {}", id, e)))?;
                if app.history.remove(id)? {
                    println!("Removed {}", id);
                } else {
                    println!("No transaction with id {}", id);
                }
            }
            HistoryAction::Clear => {
                app.history.clear()?;
                println!("Transaction history cleared");
            }
        }
        Ok(())
    }

    fn handle_network(app: &mut SnorkleApp, action: NetworkAction) -> Result<()> {
        match action {
            NetworkAction::Show => {}
            NetworkAction::Set {
                network,
                endpoint,
                url,
            } => {
                if let Some(network) = network {
                    app.network.network = network;
                }
                if let Some(url) = url {
                    app.network.custom_endpoint = url;
                    app.network.endpoint = endpoint.unwrap_or(EndpointPreset::Custom);
                } else if let Some(endpoint) = endpoint {
                    app.network.endpoint = endpoint;
                }
                // Refuse to persist an endpoint that cannot be used
                app.endpoint()?;
                app.save_network()?;
            }
        }

        println!("Network:  {}", app.network.network);
        println!("Endpoint: {} ({})", app.network.endpoint_url(), app.network.endpoint);
        Ok(())
    }

    // ------------------------------------------------------------------------
    // Bridge operations
    // ------------------------------------------------------------------------

    async fn handle_deploy(
        app: &mut SnorkleApp,
        program_path: &Path,
        signer_args: &SignerArgs,
        fee: FeeArgs,
    ) -> Result<()> {
        let program = read_program(program_path)?;
        let signer = app.resolve_signer(signer_args)?;

        let handle = app.start_bridge().await?;
        let result = handle
            .bridge()
            .deploy(DeployParams {
                program,
                private_key: signer.private_key.clone(),
                fee: fee.fee,
                private_fee: fee.private_fee,
                fee_record: fee.fee_record,
                endpoint: None,
            })
            .await;
        let transaction_id = finish(handle, result).await?;

        println!("Deployment transaction: {}", transaction_id);
        app.record_transaction(OperationKind::Deploy, &transaction_id, &signer, None, None)
    }

    async fn handle_execute_local(
        app: &SnorkleApp,
        program_path: &Path,
        function: String,
        inputs: Vec<String>,
        signer_args: &SignerArgs,
    ) -> Result<()> {
        let program = read_program(program_path)?;
        let signer = app.resolve_signer(signer_args)?;

        let handle = app.start_bridge().await?;
        let result = handle
            .bridge()
            .execute_local(ExecuteLocalParams {
                program,
                function,
                inputs,
                private_key: signer.private_key,
            })
            .await;
        let execution = finish(handle, result).await?;

        println!("Outputs:");
        for output in &execution.outputs {
            println!("  {}", output);
        }
        if !execution.execution.is_empty() {
            println!("Execution: {}", execution.execution);
        }
        Ok(())
    }

    async fn handle_execute_on_chain(
        app: &mut SnorkleApp,
        program_id: String,
        function: String,
        inputs: Vec<String>,
        signer_args: &SignerArgs,
        fee: FeeArgs,
    ) -> Result<()> {
        let signer = app.resolve_signer(signer_args)?;

        let handle = app.start_bridge().await?;
        let result = handle
            .bridge()
            .execute_on_chain(ExecuteOnChainParams {
                program_id: program_id.clone(),
                function: function.clone(),
                inputs,
                private_key: signer.private_key.clone(),
                fee: fee.fee,
                private_fee: fee.private_fee,
                fee_record: fee.fee_record,
                endpoint: None,
            })
            .await;
        let transaction_id = finish(handle, result).await?;

        println!("Execution transaction: {}", transaction_id);
        app.record_transaction(
            OperationKind::ExecuteOnChain,
            &transaction_id,
            &signer,
            Some(program_id),
            Some(function),
        )
    }

    async fn handle_estimate_fee(
        app: &SnorkleApp,
        program_id: String,
        function: String,
        inputs: Vec<String>,
        signer_args: &SignerArgs,
    ) -> Result<()> {
        let signer = app.resolve_signer(signer_args)?;

        let handle = app.start_bridge().await?;
        let result = handle
            .bridge()
            .estimate_execution_fee(ExecutionFeeParams {
                program_id,
                function,
                inputs,
                private_key: signer.private_key,
                endpoint: None,
            })
            .await;
        let credits = finish(handle, result).await?;

        println!("Estimated execution fee: {:.6} credits", credits);
        Ok(())
    }

    async fn handle_estimate_deploy_fee(app: &SnorkleApp, program_path: &Path) -> Result<()> {
        let program = read_program(program_path)?;

        let handle = app.start_bridge().await?;
        let result = handle
            .bridge()
            .estimate_deployment_fee(DeploymentFeeParams {
                program,
                endpoint: None,
            })
            .await;
        let credits = finish(handle, result).await?;

        println!("Estimated deployment fee: {:.6} credits", credits);
        Ok(())
    }

    async fn handle_transfer(
        app: &mut SnorkleApp,
        recipient: String,
        amount: f64,
        transfer_type: TransferType,
        amount_record: Option<String>,
        signer_args: &SignerArgs,
        fee: FeeArgs,
    ) -> Result<()> {
        let signer = app.resolve_signer(signer_args)?;

        let handle = app.start_bridge().await?;
        let result = handle
            .bridge()
            .transfer(TransferParams {
                amount_credits: amount,
                recipient: recipient.clone(),
                transfer_type,
                amount_record,
                fee: fee.fee,
                private_fee: fee.private_fee,
                fee_record: fee.fee_record,
                private_key: signer.private_key.clone(),
                endpoint: None,
            })
            .await;
        let transaction_id = finish(handle, result).await?;

        println!(
            "Transferred {} credits to {} ({}): {}",
            amount, recipient, transfer_type, transaction_id
        );
        Self::record(app, OperationKind::Transfer, &transaction_id, &signer)
    }

    async fn handle_split(
        app: &mut SnorkleApp,
        record: String,
        amount: f64,
        signer_args: &SignerArgs,
    ) -> Result<()> {
        let signer = app.resolve_signer(signer_args)?;

        let handle = app.start_bridge().await?;
        let result = handle
            .bridge()
            .split(SplitParams {
                split_amount: amount,
                record,
                private_key: signer.private_key.clone(),
                endpoint: None,
            })
            .await;
        let transaction_id = finish(handle, result).await?;

        println!("Split transaction: {}", transaction_id);
        Self::record(app, OperationKind::Split, &transaction_id, &signer)
    }

    async fn handle_join(
        app: &mut SnorkleApp,
        record_one: String,
        record_two: String,
        signer_args: &SignerArgs,
        fee: FeeArgs,
    ) -> Result<()> {
        let signer = app.resolve_signer(signer_args)?;

        let handle = app.start_bridge().await?;
        let result = handle
            .bridge()
            .join(JoinParams {
                record_one,
                record_two,
                fee: fee.fee,
                private_fee: fee.private_fee,
                fee_record: fee.fee_record,
                private_key: signer.private_key.clone(),
                endpoint: None,
            })
            .await;
        let transaction_id = finish(handle, result).await?;

        println!("Join transaction: {}", transaction_id);
        Self::record(app, OperationKind::Join, &transaction_id, &signer)
    }

    /// Credits transfers are recorded against `credits.aleo`
    fn record(
        app: &mut SnorkleApp,
        kind: OperationKind,
        transaction_id: &str,
        signer: &Signer,
    ) -> Result<()> {
        app.record_transaction(
            kind,
            transaction_id,
            signer,
            Some("credits.aleo".to_string()),
            None,
        )
    }
}

/// Shut the bridge down, then surface the operation's result
async fn finish<T>(mut handle: BridgeHandle, result: SnorkleResult<T>) -> Result<T> {
    if let Err(e) = handle.shutdown().await {
        warn!("Bridge shutdown failed: {}", e);
    }
    Ok(result?)
}

fn read_program(path: &Path) -> Result<String> {
    std::fs::read_to_string(path).map_err(|e| {
        CliError::InvalidArgument(format!("cannot read program {}: {}", path.display(), e))
    })
}

fn print_json(value: &serde_json::Value) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
