//! The storage engine: a loose object database and a loose reference database
//! under a `.gitlet` directory, plus the tag operations built on them.
//!
//! Calls into this layer report failure as a bare [`ErrorCode`]; the detail
//! lives in thread-local state (see [`error`]) and must be read back on the
//! same thread, inside a [`error::ThreadPin`].

pub mod error;
pub mod odb;
pub mod refdb;
pub mod tag;

pub use error::{ErrorClass, ErrorCode, LastError, ThreadPin};

use odb::Odb;
use refdb::RefDb;
use std::path::{Path, PathBuf};

pub struct Store {
    git_dir: PathBuf,
    odb: Odb,
    refdb: RefDb,
}

impl Store {
    pub fn open(git_dir: impl Into<PathBuf>) -> Self {
        let git_dir = git_dir.into();

        Self {
            odb: Odb::new(git_dir.join("objects")),
            refdb: RefDb::new(&git_dir),
            git_dir,
        }
    }

    pub fn git_dir(&self) -> &Path {
        &self.git_dir
    }

    pub fn odb(&self) -> &Odb {
        &self.odb
    }

    pub fn refdb(&self) -> &RefDb {
        &self.refdb
    }
}
