//! End-to-end: init a repository in an empty directory, stage one file,
//! commit it, and verify the exact on-disk state the engine promises.

use gyatt::command::add::{self, AddArgs};
use gyatt::command::commit::{self, CommitArgs};
use gyatt::command::init::{self, InitArgs};
use gyatt::command::log;
use gyatt::internal::head::Head;
use gyatt::internal::index::Index;
use gyatt::internal::object::commit::Commit;
use gyatt::internal::object::tree::Tree;
use gyatt::internal::object::ObjectTrait;
use gyatt::utils::object_ext::{CommitExt, TreeExt};
use gyatt::utils::test::ChangeDirGuard;
use serial_test::serial;
use tempfile::tempdir;

#[tokio::test]
#[serial]
async fn init_then_first_commit() {
    let dir = tempdir().unwrap();
    init::execute(InitArgs {
        repo_directory: dir.path().to_path_buf(),
        quiet: true,
    })
    .await
    .unwrap();
    let _guard = ChangeDirGuard::new(dir.path());

    // init: metadata layout, symbolic HEAD, default ignore file
    assert!(dir.path().join(".gyatt/objects").is_dir());
    assert_eq!(
        std::fs::read_to_string(dir.path().join(".gyatt/HEAD")).unwrap(),
        "ref: refs/heads/main\n"
    );
    assert!(dir.path().join(".gyattignore").exists());

    // stage and commit one file
    std::fs::write("a.txt", "hello\n").unwrap();
    add::execute(AddArgs {
        pathspec: vec!["a.txt".to_string()],
        ..Default::default()
    })
    .await
    .unwrap();
    commit::execute(CommitArgs {
        message: "first".to_string(),
        allow_empty: false,
    })
    .await
    .unwrap();

    // the index was cleared by the commit
    let index = Index::load(dir.path().join(".gyatt/index")).unwrap();
    assert!(index.is_empty());

    // refs/heads/main holds a 40-hex hash
    let ref_content =
        std::fs::read_to_string(dir.path().join(".gyatt/refs/heads/main")).unwrap();
    let hex = ref_content.trim_end();
    assert_eq!(hex.len(), 40);
    assert!(hex.chars().all(|c| c.is_ascii_hexdigit()));

    // the commit is a root commit with the promised message and tree
    let storage = gyatt::command::object_storage().unwrap();
    let commit_id = Head::current_commit().unwrap().unwrap();
    assert_eq!(commit_id.to_string(), hex);

    let commit_obj = Commit::load(&storage, &commit_id).unwrap();
    assert!(commit_obj.parent_commit_ids.is_empty());
    assert_eq!(commit_obj.message, "first\n");
    let raw = String::from_utf8(commit_obj.to_data().unwrap()).unwrap();
    assert!(!raw.contains("parent "));

    let tree = Tree::load(&storage, &commit_obj.tree_id).unwrap();
    assert_eq!(tree.tree_items.len(), 1);
    assert_eq!(tree.tree_items[0].name, "a.txt");
    assert_eq!(
        tree.tree_items[0].id.to_string(),
        "ce013625030ba8dba906f756967f9e9ca394464a"
    );

    // log sees exactly one entry
    assert_eq!(log::get_reachable_commits().unwrap().len(), 1);
}

#[tokio::test]
#[serial]
async fn second_commit_forms_a_chain() {
    let dir = tempdir().unwrap();
    init::execute(InitArgs {
        repo_directory: dir.path().to_path_buf(),
        quiet: true,
    })
    .await
    .unwrap();
    let _guard = ChangeDirGuard::new(dir.path());

    std::fs::write("a.txt", "hello\n").unwrap();
    add::execute(AddArgs {
        pathspec: vec!["a.txt".to_string()],
        ..Default::default()
    })
    .await
    .unwrap();
    commit::execute(CommitArgs {
        message: "first".to_string(),
        allow_empty: false,
    })
    .await
    .unwrap();
    let first = Head::current_commit().unwrap().unwrap();

    std::fs::write("a.txt", "hello\nworld\n").unwrap();
    add::execute(AddArgs {
        pathspec: vec!["a.txt".to_string()],
        ..Default::default()
    })
    .await
    .unwrap();
    commit::execute(CommitArgs {
        message: "second".to_string(),
        allow_empty: false,
    })
    .await
    .unwrap();
    let second = Head::current_commit().unwrap().unwrap();

    let storage = gyatt::command::object_storage().unwrap();
    let first_obj = Commit::load(&storage, &first).unwrap();
    let second_obj = Commit::load(&storage, &second).unwrap();

    assert_eq!(second_obj.parent_commit_ids, vec![first]);
    assert_ne!(second_obj.tree_id, first_obj.tree_id);

    let commits = log::get_reachable_commits().unwrap();
    assert_eq!(commits.len(), 2);
    assert_eq!(commits[0].id, second);
    assert_eq!(commits[1].id, first);
}
