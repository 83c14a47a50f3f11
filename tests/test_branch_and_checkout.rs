//! End-to-end: branch creation, checkout with working-tree restore, and the
//! guarantees around refs while switching.

use gyatt::command::add::{self, AddArgs};
use gyatt::command::branch::{self, BranchArgs};
use gyatt::command::checkout::{self, CheckoutArgs};
use gyatt::command::commit::{self, CommitArgs};
use gyatt::command::init::{self, InitArgs};
use gyatt::internal::branch::Branch;
use gyatt::internal::head::Head;
use gyatt::utils::test::ChangeDirGuard;
use serial_test::serial;
use tempfile::tempdir;

async fn stage_and_commit(file: &str, content: &str, message: &str) {
    std::fs::write(file, content).unwrap();
    add::execute(AddArgs {
        pathspec: vec![file.to_string()],
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

#[tokio::test]
#[serial]
async fn branch_checkout_commit_and_return() {
    let dir = tempdir().unwrap();
    init::execute(InitArgs {
        repo_directory: dir.path().to_path_buf(),
        quiet: true,
    })
    .await
    .unwrap();
    let _guard = ChangeDirGuard::new(dir.path());

    stage_and_commit("a.txt", "hello\n", "first").await;
    let main_commit = Head::current_commit().unwrap().unwrap();

    // create the branch at HEAD and switch to it
    branch::execute(BranchArgs {
        new_branch: Some("feature".to_string()),
        delete: None,
    })
    .await
    .unwrap();
    checkout::execute(CheckoutArgs {
        branch: "feature".to_string(),
        force: false,
    })
    .await
    .unwrap();
    assert_eq!(
        Head::current().unwrap(),
        Head::Branch("feature".to_string())
    );

    stage_and_commit("a.txt", "branched\n", "on feature").await;
    let feature_commit = Head::current_commit().unwrap().unwrap();
    assert_ne!(feature_commit, main_commit);

    // back to main: the working copy is restored, main's ref is unchanged,
    // HEAD is symbolic again
    checkout::execute(CheckoutArgs {
        branch: "main".to_string(),
        force: false,
    })
    .await
    .unwrap();

    assert_eq!(std::fs::read_to_string("a.txt").unwrap(), "hello\n");
    assert_eq!(
        Branch::find_branch("main", None).unwrap().unwrap().commit,
        main_commit
    );
    assert_eq!(
        std::fs::read_to_string(dir.path().join(".gyatt/HEAD")).unwrap(),
        "ref: refs/heads/main\n"
    );
    assert_eq!(
        Branch::find_branch("feature", None)
            .unwrap()
            .unwrap()
            .commit,
        feature_commit
    );
}
