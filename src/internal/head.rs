//! The HEAD pointer: symbolic (`ref: refs/heads/<name>\n`, attached) or a
//! raw commit hash (detached). The core only ever writes the attached form;
//! detached values are still read correctly.

use std::str::FromStr;

use crate::internal::branch::Branch;
use crate::internal::errors::GyattError;
use crate::internal::hash::ObjectHash;
use crate::utils::{path, util};

const SYMBOLIC_PREFIX: &str = "ref: refs/heads/";

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Head {
    Branch(String),
    Detached(ObjectHash),
}

impl Head {
    pub fn current() -> Result<Head, GyattError> {
        let content = std::fs::read_to_string(path::head()?)?;
        let line = content.trim_end();
        if let Some(name) = line.strip_prefix(SYMBOLIC_PREFIX) {
            if name.is_empty() {
                return Err(GyattError::BadFormat("HEAD".to_string()));
            }
            return Ok(Head::Branch(name.to_string()));
        }
        ObjectHash::from_str(line)
            .map(Head::Detached)
            .map_err(|_| GyattError::BadFormat("HEAD".to_string()))
    }

    /// Name of the current branch; `None` when detached.
    pub fn current_branch() -> Result<Option<String>, GyattError> {
        Ok(match Head::current()? {
            Head::Branch(name) => Some(name),
            Head::Detached(_) => None,
        })
    }

    /// Commit hash HEAD resolves to; `None` before the first commit.
    pub fn current_commit() -> Result<Option<ObjectHash>, GyattError> {
        match Head::current()? {
            Head::Detached(commit) => Ok(Some(commit)),
            Head::Branch(name) => Ok(Branch::find_branch(&name, None)?.map(|b| b.commit)),
        }
    }

    /// Atomically rewrite HEAD.
    pub fn update(new_head: Head) -> Result<(), GyattError> {
        let content = match new_head {
            Head::Branch(name) => format!("{SYMBOLIC_PREFIX}{name}\n"),
            Head::Detached(commit) => format!("{commit}\n"),
        };
        util::atomic_write(&path::head()?, content.as_bytes())
    }
}
