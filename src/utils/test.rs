//! Shared helpers for unit and integration tests: repository scaffolding in
//! a temp directory and a guard restoring the working directory.

use std::path::{Path, PathBuf};

/// Create a fresh repository in `dir` (the same scaffolding `init` performs).
pub fn setup_with_new_gyatt_in(dir: &Path) {
    crate::command::init::init_repo(dir).expect("test repository setup failed");
}

/// Change into a directory for the duration of a test, restoring the
/// previous working directory on drop.
pub struct ChangeDirGuard {
    old: PathBuf,
}

impl ChangeDirGuard {
    pub fn new(path: impl AsRef<Path>) -> ChangeDirGuard {
        let old = std::env::current_dir().expect("current dir");
        std::env::set_current_dir(path.as_ref()).expect("chdir into test dir");
        ChangeDirGuard { old }
    }
}

impl Drop for ChangeDirGuard {
    fn drop(&mut self) {
        let _ = std::env::set_current_dir(&self.old);
    }
}
