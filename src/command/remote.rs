//! Manage the set of configured remotes.

use clap::Subcommand;

use crate::internal::config::Config;
use crate::internal::errors::GyattError;

#[derive(Subcommand, Debug)]
pub enum RemoteCmds {
    /// Add a remote
    Add {
        /// Name of the remote
        name: String,
        /// URL of the remote
        url: String,
    },
    /// Remove a remote
    Remove {
        /// Name of the remote
        name: String,
    },
    /// List remotes with their URLs
    #[command(name = "-v")]
    List,
}

pub async fn execute(cmd: RemoteCmds) -> Result<(), GyattError> {
    match cmd {
        RemoteCmds::Add { name, url } => Config::add_remote(&name, &url),
        RemoteCmds::Remove { name } => Config::remove_remote(&name),
        RemoteCmds::List => {
            for remote in Config::all_remote_configs()? {
                println!("{}\t{} (fetch)", remote.name, remote.url);
                println!("{}\t{} (push)", remote.name, remote.url);
            }
            Ok(())
        }
    }
}
