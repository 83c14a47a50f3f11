//! Print an object by id: blobs raw, trees as entry listings, commits as
//! header plus message. Ids may be abbreviated to a unique prefix.

use std::io::Write;
use std::str::FromStr;

use clap::Parser;
use colored::Colorize;

use crate::internal::errors::GyattError;
use crate::internal::hash::ObjectHash;
use crate::internal::object::tree::TreeItemMode;
use crate::internal::object::Object;

#[derive(Parser, Debug, Default)]
pub struct ShowArgs {
    /// Object id (full or unique prefix)
    pub object: String,
}

fn resolve(objref: &str) -> Result<ObjectHash, GyattError> {
    if objref.len() == 40 {
        return ObjectHash::from_str(objref);
    }
    if objref.len() < 4 || !objref.chars().all(|c| c.is_ascii_hexdigit()) {
        return Err(GyattError::BadHex(objref.to_string()));
    }
    let storage = crate::command::object_storage()?;
    let mut matches = storage.search(objref);
    match matches.len() {
        0 => Err(GyattError::NotFound(format!("object '{objref}'"))),
        1 => Ok(matches.remove(0)),
        _ => Err(GyattError::BadFormat(format!(
            "ambiguous object id '{objref}'"
        ))),
    }
}

pub async fn execute(args: ShowArgs) -> Result<(), GyattError> {
    let id = resolve(&args.object)?;
    let storage = crate::command::object_storage()?;
    let (data, obj_type) = storage.get(&id)?;
    let object = Object::from_raw(obj_type, &data, id)?;

    match object {
        Object::Blob(blob) => {
            let mut stdout = std::io::stdout();
            stdout.write_all(&blob.data)?;
        }
        Object::Tree(tree) => {
            for item in &tree.tree_items {
                let kind = match item.mode {
                    TreeItemMode::Tree => "tree",
                    _ => "blob",
                };
                println!(
                    "{} {kind} {}\t{}",
                    String::from_utf8_lossy(item.mode.to_bytes()),
                    item.id,
                    item.name
                );
            }
        }
        Object::Commit(commit) => {
            println!("{}", format!("commit {}", commit.id).yellow());
            println!("tree {}", commit.tree_id);
            for parent in &commit.parent_commit_ids {
                println!("parent {parent}");
            }
            println!("Author: {} <{}>", commit.author.name, commit.author.email);
            println!();
            for line in commit.message.lines() {
                println!("    {line}");
            }
        }
    }
    Ok(())
}
