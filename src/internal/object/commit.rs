//! Commit objects. Encoded as UTF-8 text lines: `tree <h>`, optional
//! `parent <h>` lines, `author`, `committer`, a blank line, then the message.

use std::str::FromStr;

use crate::internal::errors::GyattError;
use crate::internal::hash::ObjectHash;
use crate::internal::object::signature::Signature;
use crate::internal::object::types::ObjectType;
use crate::internal::object::ObjectTrait;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Commit {
    pub id: ObjectHash,
    pub tree_id: ObjectHash,
    pub parent_commit_ids: Vec<ObjectHash>,
    pub author: Signature,
    pub committer: Signature,
    /// Message bytes after the blank line, newline-terminated.
    pub message: String,
}

impl Commit {
    pub fn new(
        author: Signature,
        committer: Signature,
        tree_id: ObjectHash,
        parent_commit_ids: Vec<ObjectHash>,
        message: &str,
    ) -> Result<Commit, GyattError> {
        let mut message = message.to_string();
        if !message.ends_with('\n') {
            message.push('\n');
        }
        let mut commit = Commit {
            id: ObjectHash::default(),
            tree_id,
            parent_commit_ids,
            author,
            committer,
            message,
        };
        let data = commit.to_data()?;
        commit.id = ObjectHash::from_type_and_data(ObjectType::Commit, &data);
        Ok(commit)
    }

    /// First line of the message, for one-line log output.
    pub fn summary(&self) -> &str {
        self.message.lines().next().unwrap_or_default()
    }
}

impl ObjectTrait for Commit {
    fn get_type(&self) -> ObjectType {
        ObjectType::Commit
    }

    fn from_bytes(data: &[u8], id: ObjectHash) -> Result<Commit, GyattError> {
        let text = std::str::from_utf8(data)
            .map_err(|_| GyattError::BadFormat("commit: non-utf8 payload".to_string()))?;

        let (header, message) = text
            .split_once("\n\n")
            .ok_or_else(|| GyattError::BadFormat("commit: missing blank line".to_string()))?;

        let mut tree_id = None;
        let mut parent_commit_ids = Vec::new();
        let mut author = None;
        let mut committer = None;

        for line in header.lines() {
            let (tag, value) = line
                .split_once(' ')
                .ok_or_else(|| GyattError::BadFormat(format!("commit header line '{line}'")))?;
            match tag {
                "tree" => tree_id = Some(ObjectHash::from_str(value)?),
                "parent" => parent_commit_ids.push(ObjectHash::from_str(value)?),
                "author" => author = Some(Signature::from_data(line)?),
                "committer" => committer = Some(Signature::from_data(line)?),
                other => {
                    return Err(GyattError::BadFormat(format!(
                        "commit header tag '{other}'"
                    )))
                }
            }
        }

        Ok(Commit {
            id,
            tree_id: tree_id
                .ok_or_else(|| GyattError::BadFormat("commit: missing tree".to_string()))?,
            parent_commit_ids,
            author: author
                .ok_or_else(|| GyattError::BadFormat("commit: missing author".to_string()))?,
            committer: committer
                .ok_or_else(|| GyattError::BadFormat("commit: missing committer".to_string()))?,
            message: message.to_string(),
        })
    }

    fn to_data(&self) -> Result<Vec<u8>, GyattError> {
        let mut text = format!("tree {}\n", self.tree_id);
        for parent in &self.parent_commit_ids {
            text.push_str(&format!("parent {parent}\n"));
        }
        text.push_str(&self.author.to_data());
        text.push('\n');
        text.push_str(&self.committer.to_data());
        text.push('\n');
        text.push('\n');
        text.push_str(&self.message);
        Ok(text.into_bytes())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::internal::object::signature::SignatureType;

    fn sig(t: SignatureType) -> Signature {
        Signature {
            signature_type: t,
            name: "A U Thor".to_string(),
            email: "author@example.com".to_string(),
            timestamp: 1736000000,
            timezone: "+0000".to_string(),
        }
    }

    #[test]
    fn root_commit_round_trip() {
        let tree_id = ObjectHash::from_type_and_data(ObjectType::Tree, &[]);
        let commit = Commit::new(
            sig(SignatureType::Author),
            sig(SignatureType::Committer),
            tree_id,
            vec![],
            "first",
        )
        .unwrap();

        assert_eq!(commit.message, "first\n");
        let data = commit.to_data().unwrap();
        assert!(!String::from_utf8(data.clone()).unwrap().contains("parent"));

        let back = Commit::from_bytes(&data, commit.id).unwrap();
        assert_eq!(back, commit);
        assert_eq!(
            commit.id,
            ObjectHash::from_type_and_data(ObjectType::Commit, &data)
        );
    }

    #[test]
    fn chained_commit_carries_parent() {
        let tree_id = ObjectHash::from_type_and_data(ObjectType::Tree, &[]);
        let first = Commit::new(
            sig(SignatureType::Author),
            sig(SignatureType::Committer),
            tree_id,
            vec![],
            "first",
        )
        .unwrap();
        let second = Commit::new(
            sig(SignatureType::Author),
            sig(SignatureType::Committer),
            tree_id,
            vec![first.id],
            "second\n",
        )
        .unwrap();

        let back = Commit::from_bytes(&second.to_data().unwrap(), second.id).unwrap();
        assert_eq!(back.parent_commit_ids, vec![first.id]);
        assert_eq!(back.summary(), "second");
    }

    #[test]
    fn multi_line_message_survives() {
        let tree_id = ObjectHash::from_type_and_data(ObjectType::Tree, &[]);
        let commit = Commit::new(
            sig(SignatureType::Author),
            sig(SignatureType::Committer),
            tree_id,
            vec![],
            "subject\n\nbody line one\nbody line two\n",
        )
        .unwrap();
        let back = Commit::from_bytes(&commit.to_data().unwrap(), commit.id).unwrap();
        assert_eq!(back.message, "subject\n\nbody line one\nbody line two\n");
        assert_eq!(back.summary(), "subject");
    }

    #[test]
    fn rejects_header_without_tree() {
        let data = b"author A <a@b> 7 +0000\ncommitter A <a@b> 7 +0000\n\nmsg\n";
        assert!(Commit::from_bytes(data, ObjectHash::default()).is_err());
    }
}
