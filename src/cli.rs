//! CLI entry for gyatt: clap subcommands and dispatch to each command
//! handler. Commands other than `init` and `clone` require an existing
//! repository, detected by walking upward from the current directory.

use clap::{Parser, Subcommand};

use crate::command;
use crate::internal::errors::GyattError;
use crate::utils::util;

#[derive(Parser, Debug)]
#[command(
    name = "gyatt",
    about = "A content-addressed version control store",
    version
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    // Init and Clone are the only commands usable outside a repository
    #[command(about = "Initialize a new repository")]
    Init(command::init::InitArgs),
    #[command(about = "Clone a repository into a new directory")]
    Clone(command::clone::CloneArgs),

    #[command(about = "Add file contents to the index")]
    Add(command::add::AddArgs),
    #[command(about = "Show the working tree status")]
    Status(command::status::StatusArgs),
    #[command(about = "Record changes to the repository")]
    Commit(command::commit::CommitArgs),
    #[command(about = "Show commit logs")]
    Log(command::log::LogArgs),
    #[command(about = "Show changes between commits, index and working tree")]
    Diff(command::diff::DiffArgs),
    #[command(about = "List, create, or delete branches")]
    Branch(command::branch::BranchArgs),
    #[command(about = "Switch branches and restore the working tree")]
    Checkout(command::checkout::CheckoutArgs),
    #[command(about = "Show an object")]
    Show(command::show::ShowArgs),
    #[command(about = "Update remote refs along with associated objects")]
    Push(command::push::PushArgs),
    #[command(subcommand, about = "Manage set of tracked repositories")]
    Remote(command::remote::RemoteCmds),
    #[command(subcommand, about = "Synchronize objects with the IPFS network")]
    Ipfs(command::ipfs::IpfsCmds),
}

#[tokio::main]
pub async fn parse(args: Option<&[&str]>) -> Result<(), GyattError> {
    parse_async(args).await
}

pub async fn parse_async(args: Option<&[&str]>) -> Result<(), GyattError> {
    let cli = match args {
        Some(args) => Cli::try_parse_from(args)
            .map_err(|e| GyattError::BadFormat(e.to_string()))?,
        None => Cli::parse(),
    };

    match &cli.command {
        Commands::Init(_) | Commands::Clone(_) => {}
        _ => {
            if !util::check_repo_exist() {
                return Err(GyattError::NotARepository);
            }
        }
    }

    match cli.command {
        Commands::Init(args) => command::init::execute(args).await,
        Commands::Clone(args) => command::clone::execute(args).await,
        Commands::Add(args) => command::add::execute(args).await,
        Commands::Status(args) => command::status::execute(args).await,
        Commands::Commit(args) => command::commit::execute(args).await,
        Commands::Log(args) => command::log::execute(args).await,
        Commands::Diff(args) => command::diff::execute(args).await,
        Commands::Branch(args) => command::branch::execute(args).await,
        Commands::Checkout(args) => command::checkout::execute(args).await,
        Commands::Show(args) => command::show::execute(args).await,
        Commands::Push(args) => command::push::execute(args).await,
        Commands::Remote(cmd) => command::remote::execute(cmd).await,
        Commands::Ipfs(cmd) => command::ipfs::execute(cmd).await,
    }
}

/// clap's derive-level self-check
#[test]
fn verify_cli() {
    use clap::CommandFactory;

    Cli::command().debug_assert()
}
