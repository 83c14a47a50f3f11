//! Show commit history, walking parent links from HEAD.

use clap::Parser;
use colored::Colorize;

use crate::internal::errors::GyattError;
use crate::internal::head::Head;
use crate::internal::object::commit::Commit;
use crate::internal::object::signature::Signature;
use crate::utils::object_ext::CommitExt;

#[derive(Parser, Debug, Default)]
pub struct LogArgs {
    /// Limit the number of commits shown
    #[arg(short, long)]
    pub number: Option<usize>,

    /// One line per commit
    #[arg(long)]
    pub oneline: bool,
}

/// Commits reachable from HEAD by first-parent links, newest first.
pub fn get_reachable_commits() -> Result<Vec<Commit>, GyattError> {
    let storage = crate::command::object_storage()?;
    let mut commits = Vec::new();
    let mut cursor = Head::current_commit()?;
    while let Some(id) = cursor {
        let commit = Commit::load(&storage, &id)?;
        cursor = commit.parent_commit_ids.first().copied();
        commits.push(commit);
    }
    Ok(commits)
}

fn format_date(sig: &Signature) -> String {
    use chrono::{DateTime, FixedOffset, Offset, TimeZone, Utc};
    let offset_minutes = sig.tz_offset_minutes();
    let offset =
        FixedOffset::east_opt(offset_minutes * 60).unwrap_or_else(|| Utc.fix());
    let utc: DateTime<chrono::Utc> = Utc
        .timestamp_opt(sig.timestamp as i64, 0)
        .single()
        .unwrap_or_default();
    utc.with_timezone(&offset)
        .format("%a %b %e %H:%M:%S %Y %z")
        .to_string()
}

pub async fn execute(args: LogArgs) -> Result<(), GyattError> {
    let commits = get_reachable_commits()?;
    if commits.is_empty() {
        return Err(GyattError::NoCommitsYet);
    }

    let limit = args.number.unwrap_or(usize::MAX);
    for commit in commits.into_iter().take(limit) {
        if args.oneline {
            println!(
                "{} {}",
                commit.id.to_string()[..7].yellow(),
                commit.summary()
            );
            continue;
        }
        println!("{}", format!("commit {}", commit.id).yellow());
        println!("Author: {} <{}>", commit.author.name, commit.author.email);
        println!("Date:   {}", format_date(&commit.author));
        println!();
        for line in commit.message.lines() {
            println!("    {line}");
        }
        println!();
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use serial_test::serial;
    use tempfile::tempdir;

    use super::*;
    use crate::command::add::{self, AddArgs};
    use crate::command::commit::{self, CommitArgs};
    use crate::utils::test::{setup_with_new_gyatt_in, ChangeDirGuard};

    #[tokio::test]
    #[serial]
    async fn history_is_newest_first() {
        let dir = tempdir().unwrap();
        setup_with_new_gyatt_in(dir.path());
        let _guard = ChangeDirGuard::new(dir.path());

        for (content, message) in [("one\n", "first"), ("two\n", "second")] {
            std::fs::write("a.txt", content).unwrap();
            add::execute(AddArgs {
                pathspec: vec!["a.txt".to_string()],
                ..Default::default()
            })
            .await
            .unwrap();
            commit::execute(CommitArgs {
                message: message.to_string(),
                allow_empty: false,
            })
            .await
            .unwrap();
        }

        let commits = get_reachable_commits().unwrap();
        assert_eq!(commits.len(), 2);
        assert_eq!(commits[0].summary(), "second");
        assert_eq!(commits[1].summary(), "first");
    }

    #[tokio::test]
    #[serial]
    async fn empty_history_is_an_error() {
        let dir = tempdir().unwrap();
        setup_with_new_gyatt_in(dir.path());
        let _guard = ChangeDirGuard::new(dir.path());
        assert!(matches!(
            execute(LogArgs::default()).await,
            Err(GyattError::NoCommitsYet)
        ));
    }
}
