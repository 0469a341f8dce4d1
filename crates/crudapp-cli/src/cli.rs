use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

#[derive(Parser)]
#[command(
    name = "crudapp",
    about = "Journal entries stored as accounts of a ledger program",
    version,
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Config file (default: ~/.config/crudapp/config.toml when present)
    #[arg(long, global = true, env = "CRUDAPP_CONFIG")]
    pub config: Option<PathBuf>,

    /// devnet, testnet, mainnet-beta, localnet, or a custom endpoint
    #[arg(long, global = true)]
    pub cluster: Option<String>,

    /// RPC endpoint, overriding the cluster default
    #[arg(long, global = true)]
    pub url: Option<String>,

    /// Keypair file in the Solana CLI JSON format
    #[arg(long, global = true)]
    pub keypair: Option<PathBuf>,

    /// Run against a throwaway in-process ledger with a fresh keypair
    #[arg(long, global = true)]
    pub ephemeral: bool,

    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[arg(long, global = true, default_value = "text")]
    pub format: OutputFormat,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, clap::ValueEnum)]
pub enum OutputFormat {
    Text,
    Json,
}

#[derive(Subcommand)]
pub enum Command {
    /// Show the program identity for the cluster and whether it is deployed
    ProgramId,
    /// List all journal entries
    List,
    /// Show one entry by account address
    Show(ShowArgs),
    /// Create an entry owned by the signer
    Create(EntryArgs),
    /// Replace the message of one of the signer's entries
    Update(EntryArgs),
    /// Delete one of the signer's entries
    Delete(DeleteArgs),
    /// Print the account address of an entry
    Address(AddressArgs),
}

#[derive(Args)]
pub struct ShowArgs {
    pub address: String,
}

#[derive(Args)]
pub struct EntryArgs {
    pub title: String,
    pub message: String,
}

#[derive(Args)]
pub struct DeleteArgs {
    pub title: String,
}

#[derive(Args)]
pub struct AddressArgs {
    pub title: String,
    /// Entry owner (default: the signer)
    #[arg(long)]
    pub owner: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_list() {
        let cli = Cli::try_parse_from(["crudapp", "list"]).unwrap();
        assert!(matches!(cli.command, Command::List));
        assert_eq!(cli.format, OutputFormat::Text);
        assert!(!cli.ephemeral);
    }

    #[test]
    fn parse_create_with_globals() {
        let cli = Cli::try_parse_from([
            "crudapp", "create", "day one", "it rained", "--cluster", "localnet", "--ephemeral", "-v",
        ])
        .unwrap();
        if let Command::Create(args) = cli.command {
            assert_eq!(args.title, "day one");
            assert_eq!(args.message, "it rained");
        } else { panic!("wrong command"); }
        assert_eq!(cli.cluster.as_deref(), Some("localnet"));
        assert!(cli.ephemeral);
        assert!(cli.verbose);
    }

    #[test]
    fn parse_address_with_owner() {
        let cli = Cli::try_parse_from(["crudapp", "address", "t", "--owner", "11111111111111111111111111111111"]).unwrap();
        if let Command::Address(args) = cli.command {
            assert_eq!(args.title, "t");
            assert_eq!(args.owner.as_deref(), Some("11111111111111111111111111111111"));
        } else { panic!("wrong command"); }
    }

    #[test]
    fn parse_json_format() {
        let cli = Cli::try_parse_from(["crudapp", "--format", "json", "program-id"]).unwrap();
        assert_eq!(cli.format, OutputFormat::Json);
        assert!(matches!(cli.command, Command::ProgramId));
    }

    #[test]
    fn update_requires_message() {
        assert!(Cli::try_parse_from(["crudapp", "update", "t"]).is_err());
    }

    #[test]
    fn delete_takes_title() {
        let cli = Cli::try_parse_from(["crudapp", "delete", "t", "--keypair", "/tmp/id.json"]).unwrap();
        assert!(matches!(cli.command, Command::Delete(ref a) if a.title == "t"));
        assert_eq!(cli.keypair, Some(PathBuf::from("/tmp/id.json")));
    }
}
