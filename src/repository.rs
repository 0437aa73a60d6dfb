use crate::error::TagError;
use crate::objects::{Fmt, GitObject, Object};
use crate::oid::Oid;
use crate::signature::Signature;
use crate::store::{Store, ThreadPin};
use crate::tag::Tag;
use crate::tags::TagsCollection;
use anyhow::Context;
use bytes::Bytes;
use std::fs;
use std::io::Write;
use std::ops::Deref;
use std::path::PathBuf;

/// a gitlet repository
pub struct Repository {
    pub work_tree: PathBuf,
    pub git_dir: PathBuf,
    pub config: RepoConfig,
    store: Store,
}

#[derive(Debug)]
pub struct RepoConfig(configparser::ini::Ini);

impl RepoConfig {
    /// `user.name` and `user.email`, if both are set
    pub fn user(&self) -> Option<(String, String)> {
        let name = self.get("user", "name")?;
        let email = self.get("user", "email")?;

        Some((name, email))
    }
}

impl Deref for RepoConfig {
    type Target = configparser::ini::Ini;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl Default for RepoConfig {
    fn default() -> Self {
        let mut config = configparser::ini::Ini::new();

        config.setstr("core", "repositoryformatversion", Some("0"));
        config.setstr("core", "filemode", Some("false"));
        config.setstr("core", "bare", Some("false"));

        Self(config)
    }
}

impl Repository {
    /// Load a repository at path.
    pub fn load(working_dir: impl Into<PathBuf>) -> anyhow::Result<Self> {
        let working_dir = working_dir.into();
        let git_dir = working_dir.join(".gitlet");

        anyhow::ensure!(
            git_dir.exists(),
            "not a gitlet repository (or any of the parent directories): {}",
            working_dir.display()
        );

        // Read configuration file in .gitlet/config
        let mut config = configparser::ini::Ini::new();

        config
            .load(git_dir.join("config"))
            .map_err(|e| anyhow::anyhow!(e))?;

        Ok(Self {
            work_tree: working_dir,
            store: Store::open(&git_dir),
            git_dir,
            config: RepoConfig(config),
        })
    }

    /// Create a new repository at path.
    pub fn init(path: impl Into<PathBuf>) -> anyhow::Result<Self> {
        let work_tree = path.into();
        let git_dir = work_tree.join(".gitlet");

        if git_dir.exists() {
            if !git_dir.is_dir() {
                anyhow::bail!(
                    "not a gitlet repository (or any of the parent directories): {}",
                    work_tree.display()
                );
            }

            if fs::read_dir(&git_dir)?.next().is_some() {
                anyhow::bail!(
                    "gitlet repository has existing files: {}",
                    work_tree.display()
                );
            }
        } else {
            fs::create_dir_all(&git_dir).context("failed to create .gitlet directory")?;
        }

        fs::create_dir_all(git_dir.join("objects"))
            .context("failed to create objects directory")?;
        fs::create_dir_all(git_dir.join("refs/tags")).context("failed to create tags directory")?;
        fs::create_dir_all(git_dir.join("refs/heads"))
            .context("failed to create heads directory")?;

        fs::File::create(git_dir.join("description"))
            .context("failed to create description file")?
            .write_all(
                b"Unnamed repository; edit this file 'description' to name the repository.\n",
            )
            .context("failed to write description file")?;

        fs::File::create(git_dir.join("HEAD"))
            .context("failed to create HEAD file")?
            .write_all(b"ref: refs/heads/master\n")
            .context("failed to write HEAD file")?;

        let config = RepoConfig::default();
        config
            .write(git_dir.join("config"))
            .context("failed to write config file")?;

        Ok(Self {
            work_tree,
            store: Store::open(&git_dir),
            git_dir,
            config,
        })
    }

    pub fn find(work_dir: impl Into<PathBuf>) -> anyhow::Result<Repository> {
        let mut path = work_dir.into().canonicalize()?;

        while !path.join(".gitlet").exists() {
            if !path.pop() {
                anyhow::bail!("No gitlet repository found");
            }
        }

        Repository::load(path)
    }

    pub(crate) fn store(&self) -> &Store {
        &self.store
    }

    pub fn tags(&self) -> TagsCollection<'_> {
        TagsCollection::new(self)
    }

    /// read an object from the object database
    pub fn lookup_object(&self, oid: &Oid) -> Result<Object, TagError> {
        let pin = ThreadPin::pin();

        let raw = self.store.odb().read(oid).map_err(|code| pin.error(code))?;

        Ok(Object::new(*oid, raw))
    }

    /// Look up an annotated tag object.
    ///
    /// Fails with [`TagError::InvalidTarget`] when `oid` names some other kind
    /// of object, which is what a lightweight tag's reference points at.
    pub fn lookup_tag(&self, oid: &Oid) -> Result<Tag<'_>, TagError> {
        let object = self.lookup_object(oid)?;

        Tag::from_object(self, object)
    }

    /// store `data` as an object of kind `fmt`, returning its id
    pub fn write_object(&self, fmt: Fmt, data: impl Into<Bytes>) -> Result<Oid, TagError> {
        let pin = ThreadPin::pin();

        self.store
            .odb()
            .write(&GitObject::new(fmt, data))
            .map_err(|code| pin.error(code))
    }

    /// resolve a full reference name such as `refs/tags/v1.0.0`
    pub fn find_reference(&self, name: &str) -> Result<Option<Oid>, TagError> {
        let pin = ThreadPin::pin();

        self.store.refdb().lookup(name).map_err(|code| pin.error(code))
    }

    /// Configuration merged from the user's git config files and the repository's own.
    pub fn read_config(&self) -> anyhow::Result<RepoConfig> {
        let mut config = configparser::ini::Ini::new();

        let user_home = dirs::home_dir().context("failed to get home directory")?;

        let config_dir = if let Ok(xdg_config_home) = std::env::var("XDG_CONFIG_HOME") {
            PathBuf::from(xdg_config_home)
        } else {
            user_home.join(".config")
        };

        let config_files = [
            config_dir.join("git/config"),
            user_home.join(".gitconfig"),
            self.git_dir.join("config"),
        ];

        for config_file in config_files {
            if config_file.exists() {
                let config_file = config_file.canonicalize().context("invalid path")?;

                config
                    .load_and_append(config_file)
                    .map_err(|e| anyhow::anyhow!(e))?;
            }
        }

        Ok(RepoConfig(config))
    }

    /// The default tagger: `user.name` and `user.email` from the config,
    /// stamped with the current time.
    pub fn signature(&self) -> anyhow::Result<Signature> {
        let config = self.read_config()?;

        let (name, email) = config
            .user()
            .context("user.name and user.email must be set to create a tag")?;

        Ok(Signature::now(name, email))
    }
}
