use std::sync::Arc;

use anyhow::Context;
use colored::Colorize;
use serde::Serialize;
use serde_json::json;

use crudapp_program::entry_address;
use crudapp_rpc::{InMemoryLedger, JsonRpcTransport, KeypairSigner, LedgerTransport, TransactionSigner};
use crudapp_sdk::{
    Address, CreateEntryArgs, JournalService, ProgramResolver, Provider, TracingSink, TxSignature,
    UpdateEntryArgs,
};

use crate::cli::*;
use crate::config::ClientConfig;

pub async fn run_command(cli: Cli) -> anyhow::Result<()> {
    let config = ClientConfig::resolve(cli.config.as_deref())?.with_overrides(
        cli.cluster.as_deref(),
        cli.url.as_deref(),
        cli.keypair.as_deref(),
    );
    let resolver = ProgramResolver::from_embedded()?;
    let format = cli.format;
    let ephemeral = cli.ephemeral;
    let journal = || connect(&resolver, &config, ephemeral);

    match cli.command {
        // Deriving an address needs no node, and no signer when --owner is given.
        Command::Address(args) => cmd_address(&resolver, &config, ephemeral, args, format),
        Command::ProgramId => cmd_program_id(&journal().await?, format).await,
        Command::List => cmd_list(&journal().await?, format).await,
        Command::Show(args) => cmd_show(&journal().await?, args, format).await,
        Command::Create(args) => cmd_create(&journal().await?, args, format).await,
        Command::Update(args) => cmd_update(&journal().await?, args, format).await,
        Command::Delete(args) => cmd_delete(&journal().await?, args, format).await,
    }
}

fn load_signer(config: &ClientConfig, ephemeral: bool) -> anyhow::Result<KeypairSigner> {
    if ephemeral && config.keypair_path.is_none() {
        return Ok(KeypairSigner::generate());
    }
    let path = config
        .effective_keypair_path()
        .context("no keypair configured and HOME is not set")?;
    KeypairSigner::read_keypair_file(&path)
        .with_context(|| format!("loading keypair {}", path.display()))
}

async fn connect(resolver: &ProgramResolver, config: &ClientConfig, ephemeral: bool) -> anyhow::Result<JournalService> {
    let signer = Arc::new(load_signer(config, ephemeral)?);
    let transport: Arc<dyn LedgerTransport> = if ephemeral {
        let program = resolver.resolve_identity(&config.cluster)?;
        tracing::info!(program = %program, "using an in-process ledger; nothing is persisted");
        Arc::new(InMemoryLedger::new(program))
    } else {
        Arc::new(JsonRpcTransport::new(config.rpc_config())?)
    };
    tracing::debug!(cluster = %config.cluster, url = config.effective_rpc_url(), signer = %signer.pubkey(), "connecting");
    let provider = Provider::new(transport, signer);
    Ok(JournalService::connect(resolver, config.cluster.clone(), provider, Arc::new(TracingSink))?)
}

fn print_json<T: Serialize>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

async fn cmd_program_id(journal: &JournalService, format: OutputFormat) -> anyhow::Result<()> {
    let program = journal.client().program_id();
    let deployed = journal
        .program_account_info()
        .await?
        .is_some_and(|acct| acct.executable);
    match format {
        OutputFormat::Json => print_json(&json!({
            "cluster": journal.cluster().as_str(),
            "program_id": program,
            "deployed": deployed,
        })),
        OutputFormat::Text => {
            println!("Cluster: {}", journal.cluster().as_str().cyan());
            println!("Program: {}", program.to_string().yellow().bold());
            if deployed {
                println!("  {} deployed", "✓".green());
            } else {
                println!("  {} no program account found; check the cluster", "✗".red());
            }
            Ok(())
        }
    }
}

async fn cmd_list(journal: &JournalService, format: OutputFormat) -> anyhow::Result<()> {
    let entries = journal.list_entries().await?;
    if format == OutputFormat::Json {
        return print_json(&entries);
    }
    if entries.is_empty() {
        println!("No entries found. Create one with `crudapp create <title> <message>`.");
        return Ok(());
    }
    for e in &entries {
        println!("{}  {}", e.account.title.bold(), e.address.short_id().dimmed());
        println!("  {}", e.account.message);
        println!("  owner: {}", e.account.owner.to_string().cyan());
    }
    Ok(())
}

async fn cmd_show(journal: &JournalService, args: ShowArgs, format: OutputFormat) -> anyhow::Result<()> {
    let address: Address = args
        .address
        .parse()
        .with_context(|| format!("invalid account address {}", args.address))?;
    let entry = journal.get_entry(&address).await?;
    match format {
        OutputFormat::Json => print_json(&entry),
        OutputFormat::Text => {
            println!("{}", entry.title.bold());
            println!("  {}", entry.message);
            println!("  owner:   {}", entry.owner.to_string().cyan());
            println!("  account: {}", address.to_string().dimmed());
            Ok(())
        }
    }
}

fn report_write(verb: &str, title: &str, signature: &TxSignature, address: Option<Address>, format: OutputFormat) -> anyhow::Result<()> {
    match format {
        OutputFormat::Json => print_json(&json!({
            "title": title,
            "signature": signature.to_base58(),
            "address": address,
        })),
        OutputFormat::Text => {
            println!("{} {} entry {}", "✓".green().bold(), verb, title.yellow());
            println!("  Signature: {}", signature.to_string().dimmed());
            if let Some(address) = address {
                println!("  Account:   {}", address.to_string().cyan());
            }
            Ok(())
        }
    }
}

async fn cmd_create(journal: &JournalService, args: EntryArgs, format: OutputFormat) -> anyhow::Result<()> {
    let owner = journal.client().signer();
    let address = journal.entry_address(&args.title, &owner).ok();
    let signature = journal
        .create_entry(CreateEntryArgs { title: args.title.clone(), message: args.message, owner })
        .await?;
    report_write("Created", &args.title, &signature, address, format)
}

async fn cmd_update(journal: &JournalService, args: EntryArgs, format: OutputFormat) -> anyhow::Result<()> {
    let address = journal.entry_address(&args.title, &journal.client().signer()).ok();
    let signature = journal
        .update_entry(UpdateEntryArgs { title: args.title.clone(), message: args.message, owner: None })
        .await?;
    report_write("Updated", &args.title, &signature, address, format)
}

async fn cmd_delete(journal: &JournalService, args: DeleteArgs, format: OutputFormat) -> anyhow::Result<()> {
    let signature = journal.delete_entry(&args.title).await?;
    report_write("Deleted", &args.title, &signature, None, format)
}

/// The owner an address is derived for: `--owner` if given, else the signer.
fn address_owner(args: &AddressArgs, config: &ClientConfig, ephemeral: bool) -> anyhow::Result<Address> {
    match &args.owner {
        Some(raw) => raw.parse().with_context(|| format!("invalid owner address {raw}")),
        None => Ok(load_signer(config, ephemeral)?.pubkey()),
    }
}

fn cmd_address(
    resolver: &ProgramResolver,
    config: &ClientConfig,
    ephemeral: bool,
    args: AddressArgs,
    format: OutputFormat,
) -> anyhow::Result<()> {
    let owner = address_owner(&args, config, ephemeral)?;
    let program = resolver.resolve_identity(&config.cluster)?;
    let (address, bump) = entry_address(&args.title, &owner, &program)?;
    match format {
        OutputFormat::Json => print_json(&json!({
            "title": args.title,
            "owner": owner,
            "program_id": program,
            "address": address,
            "bump": bump,
        })),
        OutputFormat::Text => {
            println!("{}", address.to_string().yellow().bold());
            println!("  title: {}  owner: {}  bump: {}", args.title, owner.short_id(), bump);
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use super::*;

    fn config_with_missing_keypair() -> ClientConfig {
        ClientConfig {
            keypair_path: Some(PathBuf::from("/nonexistent/crudapp/id.json")),
            ..ClientConfig::default()
        }
    }

    fn address_args(owner: Option<String>) -> AddressArgs {
        AddressArgs { title: "day".into(), owner }
    }

    #[test]
    fn explicit_owner_needs_no_keypair() {
        let owner = Address::new([4; 32]);
        let args = address_args(Some(owner.to_base58()));
        let resolved = address_owner(&args, &config_with_missing_keypair(), false).unwrap();
        assert_eq!(resolved, owner);
    }

    #[test]
    fn missing_owner_falls_back_to_signer() {
        let err = address_owner(&address_args(None), &config_with_missing_keypair(), false).unwrap_err();
        assert!(err.to_string().contains("loading keypair"));
    }

    #[test]
    fn ephemeral_without_keypair_generates_owner() {
        let config = ClientConfig { keypair_path: None, ..ClientConfig::default() };
        assert!(address_owner(&address_args(None), &config, true).is_ok());
    }

    #[test]
    fn invalid_owner_is_reported() {
        let err = address_owner(&address_args(Some("not-base58!".into())), &ClientConfig::default(), false)
            .unwrap_err();
        assert!(err.to_string().contains("invalid owner address"));
    }

    #[test]
    fn address_command_runs_without_signer() {
        let resolver = ProgramResolver::from_embedded().unwrap();
        let args = address_args(Some(Address::new([4; 32]).to_base58()));
        cmd_address(&resolver, &config_with_missing_keypair(), false, args, OutputFormat::Json).unwrap();
    }
}
