//! Refs are text files containing a hexadecimal representation of an object's hash, encoded in ASCII.
//!
//! Refs can also refer to another reference (`ref: refs/heads/master`), and thus only indirectly to an object.

use crate::oid::Oid;
use crate::store::error::{raise, ErrorClass, ErrorCode, RaiseExt};
use anyhow::Context;
use regex::Regex;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;
use tracing::debug;

/// maximum number of symbolic references followed before giving up
const MAX_NESTING_LEVEL: usize = 10;

/// Loose reference database rooted at the git directory.
pub struct RefDb {
    git_dir: PathBuf,
}

/// control characters, space and `~^:?*[\` are never allowed in a reference name
fn forbidden_chars() -> &'static Regex {
    static FORBIDDEN: OnceLock<Regex> = OnceLock::new();

    FORBIDDEN.get_or_init(|| match Regex::new(r"[\x00-\x20~^:?*\[\\\x7f]") {
        Ok(regex) => regex,
        Err(e) => unreachable!("invalid reference name regex: {}", e),
    })
}

/// Check a full reference name against git's `check-ref-format` rules.
pub fn validate_name(name: &str) -> anyhow::Result<()> {
    anyhow::ensure!(name.starts_with("refs/"), "reference must live under refs/: {}", name);
    anyhow::ensure!(!forbidden_chars().is_match(name), "reference contains a forbidden character: {:?}", name);
    anyhow::ensure!(!name.contains(".."), "reference contains '..': {}", name);
    anyhow::ensure!(!name.contains("@{"), "reference contains '@{{': {}", name);
    anyhow::ensure!(
        !name.ends_with('/') && !name.ends_with('.'),
        "reference ends with '/' or '.': {}",
        name
    );

    for component in name.split('/') {
        anyhow::ensure!(!component.is_empty(), "reference has an empty component: {}", name);
        anyhow::ensure!(!component.starts_with('.'), "reference component starts with '.': {}", name);
        anyhow::ensure!(!component.ends_with(".lock"), "reference component ends with '.lock': {}", name);
        anyhow::ensure!(component != "@", "reference component is '@': {}", name);
    }

    Ok(())
}

impl RefDb {
    pub fn new(git_dir: &Path) -> Self {
        Self {
            git_dir: git_dir.to_path_buf(),
        }
    }

    fn path(&self, name: &str) -> PathBuf {
        self.git_dir.join(name)
    }

    /// resolve a reference to the object id it points at
    ///
    /// returns None if the reference (or one it points through) does not exist
    pub fn lookup(&self, name: &str) -> Result<Option<Oid>, ErrorCode> {
        let mut name = name.to_string();

        for _ in 0..MAX_NESTING_LEVEL {
            let path = self.path(&name);

            if !path.is_file() {
                return Ok(None);
            }

            let data = fs::read_to_string(&path)
                .context(format!("failed to read ref file: {}", path.display()))
                .or_raise(ErrorCode::Generic, ErrorClass::Os)?;
            let data = data.trim_end_matches('\n');

            match data.strip_prefix("ref: ") {
                Some(target) => name = target.to_string(),
                None => {
                    return data
                        .parse::<Oid>()
                        .map(Some)
                        .context(format!("corrupted reference {}", name))
                        .or_raise(ErrorCode::Generic, ErrorClass::Reference)
                }
            }
        }

        raise(
            ErrorCode::Generic,
            ErrorClass::Reference,
            format!("too many levels of symbolic references: {}", name),
        )
    }

    /// point `name` at `oid`
    ///
    /// fails with [`ErrorCode::Exists`] if the reference is present and `force` is false
    pub fn create(&self, name: &str, oid: &Oid, force: bool) -> Result<(), ErrorCode> {
        validate_name(name).or_raise(ErrorCode::InvalidSpec, ErrorClass::Reference)?;

        let path = self.path(name);

        if path.is_dir() {
            return raise(
                ErrorCode::Exists,
                ErrorClass::Reference,
                format!("cannot create '{}': there are references beneath it", name),
            );
        }

        let refs_dir = self.path("refs");
        if let Some(blocking) = path
            .ancestors()
            .skip(1)
            .take_while(|dir| *dir != refs_dir)
            .find(|dir| dir.is_file())
        {
            return raise(
                ErrorCode::Exists,
                ErrorClass::Reference,
                format!(
                    "cannot create '{}': '{}' exists",
                    name,
                    blocking.strip_prefix(&self.git_dir).unwrap_or(blocking).display()
                ),
            );
        }

        if path.exists() && !force {
            return raise(
                ErrorCode::Exists,
                ErrorClass::Reference,
                format!("failed to write reference '{}': a reference with that name already exists", name),
            );
        }

        let parent = path
            .parent()
            .context(format!("failed to get path parent: {}", path.display()))
            .or_raise(ErrorCode::Generic, ErrorClass::Os)?;
        fs::create_dir_all(parent)
            .context(format!("failed to create {}", parent.display()))
            .or_raise(ErrorCode::Generic, ErrorClass::Os)?;

        fs::write(&path, format!("{}\n", oid))
            .context(format!("failed to write ref file: {}", path.display()))
            .or_raise(ErrorCode::Generic, ErrorClass::Os)?;

        debug!(reference = name, %oid, force, "updated reference");

        Ok(())
    }

    /// remove a reference, pruning directories it leaves empty
    pub fn delete(&self, name: &str) -> Result<(), ErrorCode> {
        let path = self.path(name);

        if !path.is_file() {
            return raise(
                ErrorCode::NotFound,
                ErrorClass::Reference,
                format!("reference '{}' not found", name),
            );
        }

        fs::remove_file(&path)
            .context(format!("failed to remove ref file: {}", path.display()))
            .or_raise(ErrorCode::Generic, ErrorClass::Os)?;

        let refs_dir = self.path("refs");
        let mut parent = path.parent();
        while let Some(dir) = parent {
            // keeps refs/ and its namespaces such as refs/tags/
            if !dir.starts_with(&refs_dir) || dir == refs_dir || dir.parent() == Some(refs_dir.as_path()) {
                break;
            }
            if fs::remove_dir(dir).is_err() {
                break;
            }
            parent = dir.parent();
        }

        debug!(reference = name, "deleted reference");

        Ok(())
    }

    /// full names of every reference under `prefix`, e.g. `refs/tags/`
    ///
    /// ordered by path, so the order is stable for a given set of references
    pub fn list(&self, prefix: &str) -> Result<Vec<String>, ErrorCode> {
        let root = self.path(prefix);

        if !root.is_dir() {
            return Ok(vec![]);
        }

        let mut names = vec![];

        for entry in walkdir::WalkDir::new(&root).sort_by_file_name() {
            let entry = entry
                .context(format!("failed to read entry: {}", root.display()))
                .or_raise(ErrorCode::Generic, ErrorClass::Os)?;
            if entry.file_type().is_dir() {
                continue;
            }

            let name = entry
                .path()
                .strip_prefix(&self.git_dir)
                .context("reference outside of the git directory")
                .or_raise(ErrorCode::Generic, ErrorClass::Reference)?;

            let name = name
                .components()
                .map(|c| c.as_os_str().to_string_lossy())
                .collect::<Vec<_>>()
                .join("/");

            names.push(name);
        }

        Ok(names)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::error::ThreadPin;

    const ID: &str = "409f2bf19becc055a2bfb188bcced9d001842b23";

    #[test]
    fn test_forbidden_chars_is_compiled_once() {
        assert!(std::ptr::eq(forbidden_chars(), forbidden_chars()));
        assert!(forbidden_chars().is_match("a\x7fb"));
        assert!(!forbidden_chars().is_match("v1.0.0"));
    }

    #[test]
    fn test_validate_name() {
        for name in ["refs/tags/v1.0.0", "refs/tags/release/2024", "refs/tags/a-b_c+d"] {
            assert!(validate_name(name).is_ok(), "{}", name);
        }

        for name in [
            "refs/tags/",
            "refs/tags/a..b",
            "refs/tags/a b",
            "refs/tags/a\nb",
            "refs/tags/a~1",
            "refs/tags/a^",
            "refs/tags/a:b",
            "refs/tags/a?",
            "refs/tags/a*",
            "refs/tags/a[b",
            "refs/tags/a\\b",
            "refs/tags/.hidden",
            "refs/tags/x.lock",
            "refs/tags/a//b",
            "refs/tags/a.",
            "refs/tags/a@{1}",
            "refs/tags/@",
            "tags/v1",
        ] {
            assert!(validate_name(name).is_err(), "{:?}", name);
        }
    }

    #[test]
    fn test_create_lookup_delete() {
        let dir = tempfile::tempdir().unwrap();
        let refdb = RefDb::new(dir.path());
        let oid: Oid = ID.parse().unwrap();

        assert_eq!(refdb.lookup("refs/tags/v1").unwrap(), None);

        refdb.create("refs/tags/v1", &oid, false).unwrap();
        assert_eq!(refdb.lookup("refs/tags/v1").unwrap(), Some(oid));

        refdb.delete("refs/tags/v1").unwrap();
        assert_eq!(refdb.lookup("refs/tags/v1").unwrap(), None);
    }

    #[test]
    fn test_create_respects_force() {
        let dir = tempfile::tempdir().unwrap();
        let refdb = RefDb::new(dir.path());
        let pin = ThreadPin::pin();
        let first: Oid = ID.parse().unwrap();
        let second = Oid::from_bytes([7; 20]);

        refdb.create("refs/tags/v1", &first, false).unwrap();

        assert_eq!(refdb.create("refs/tags/v1", &second, false), Err(ErrorCode::Exists));
        assert_eq!(pin.take_error().unwrap().class, ErrorClass::Reference);
        assert_eq!(refdb.lookup("refs/tags/v1").unwrap(), Some(first));

        refdb.create("refs/tags/v1", &second, true).unwrap();
        assert_eq!(refdb.lookup("refs/tags/v1").unwrap(), Some(second));
    }

    #[test]
    fn test_create_rejects_invalid_name() {
        let dir = tempfile::tempdir().unwrap();
        let refdb = RefDb::new(dir.path());
        let oid: Oid = ID.parse().unwrap();

        assert_eq!(refdb.create("refs/tags/a..b", &oid, false), Err(ErrorCode::InvalidSpec));
    }

    #[test]
    fn test_create_under_existing_reference() {
        let dir = tempfile::tempdir().unwrap();
        let refdb = RefDb::new(dir.path());
        let oid: Oid = ID.parse().unwrap();

        refdb.create("refs/tags/v1", &oid, false).unwrap();

        assert_eq!(refdb.create("refs/tags/v1/rc", &oid, true), Err(ErrorCode::Exists));
        assert_eq!(refdb.create("refs/tags", &oid, true), Err(ErrorCode::Exists));
    }

    #[test]
    fn test_delete_missing() {
        let dir = tempfile::tempdir().unwrap();
        let refdb = RefDb::new(dir.path());

        assert_eq!(refdb.delete("refs/tags/nope"), Err(ErrorCode::NotFound));
    }

    #[test]
    fn test_delete_prunes_empty_directories() {
        let dir = tempfile::tempdir().unwrap();
        let refdb = RefDb::new(dir.path());
        let oid: Oid = ID.parse().unwrap();

        refdb.create("refs/tags/release/v1", &oid, false).unwrap();
        refdb.delete("refs/tags/release/v1").unwrap();

        assert!(!dir.path().join("refs/tags/release").exists());
        assert!(dir.path().join("refs/tags").is_dir());
    }

    #[test]
    fn test_lookup_follows_symbolic_refs() {
        let dir = tempfile::tempdir().unwrap();
        let refdb = RefDb::new(dir.path());
        let oid: Oid = ID.parse().unwrap();

        refdb.create("refs/heads/master", &oid, false).unwrap();
        fs::write(dir.path().join("HEAD"), "ref: refs/heads/master\n").unwrap();

        assert_eq!(refdb.lookup("HEAD").unwrap(), Some(oid));
    }

    #[test]
    fn test_list_is_sorted_and_prefixed() {
        let dir = tempfile::tempdir().unwrap();
        let refdb = RefDb::new(dir.path());
        let oid: Oid = ID.parse().unwrap();

        for name in ["refs/tags/v2", "refs/tags/v1", "refs/tags/rc/a", "refs/heads/master"] {
            refdb.create(name, &oid, false).unwrap();
        }

        assert_eq!(
            refdb.list("refs/tags/").unwrap(),
            vec!["refs/tags/rc/a", "refs/tags/v1", "refs/tags/v2"]
        );
        assert!(refdb.list("refs/remotes/").unwrap().is_empty());
    }
}
