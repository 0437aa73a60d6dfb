//! The repository's tag collection.
//!
//! No locking is done here: two threads creating or forcing the same tag name
//! race in the reference database and either may win. Callers needing a
//! deterministic outcome must serialize those calls themselves.

use crate::error::TagError;
use crate::handles::{self, CallbackData, Handle};
use crate::objects::tag as codec;
use crate::objects::Object;
use crate::oid::Oid;
use crate::repository::Repository;
use crate::signature::Signature;
use crate::store::refdb::validate_name;
use crate::store::{self, ErrorCode, ThreadPin};
use bytes::Bytes;
use tracing::{info, warn};

pub struct TagsCollection<'repo> {
    repo: &'repo Repository,
}

impl<'repo> TagsCollection<'repo> {
    pub(crate) fn new(repo: &'repo Repository) -> Self {
        Self { repo }
    }

    /// Create an annotated tag and point `refs/tags/<name>` at it.
    ///
    /// Returns the id of the new tag object. Identical inputs produce the
    /// same object, and therefore the same id.
    pub fn create(
        &self,
        name: &str,
        target: &Object,
        tagger: &Signature,
        message: &str,
        force: bool,
    ) -> Result<Oid, TagError> {
        let pin = ThreadPin::pin();

        let oid = store::tag::create(
            self.repo.store(),
            name,
            &target.id(),
            tagger,
            message,
            force,
        )
        .map_err(|code| pin.error(code).into_invalid_target())?;

        info!(tag = name, %oid, target = %target.id(), "created annotated tag");

        Ok(oid)
    }

    /// Build the canonical bytes of an annotated tag without writing anything.
    ///
    /// The result can be signed externally and handed to
    /// [`TagsCollection::create_with_signature`].
    pub fn create_tag_buffer(
        &self,
        name: &str,
        target: &Object,
        tagger: &Signature,
        message: &str,
    ) -> Bytes {
        codec::encode(&target.id(), target.kind(), name, tagger, message)
    }

    /// Create a tag object from pre-built content plus a detached signature.
    ///
    /// The bytes are stored exactly as given, so the returned id is the hash
    /// of what was signed.
    pub fn create_with_signature(
        &self,
        content: &[u8],
        signature: &str,
        force: bool,
    ) -> Result<Oid, TagError> {
        let buffer = codec::encode_with_signature(content, signature);

        self.create_from_buffer(&buffer, force)
    }

    /// Create a tag object from raw canonical bytes, written verbatim.
    pub fn create_from_buffer(&self, buffer: &[u8], force: bool) -> Result<Oid, TagError> {
        let pin = ThreadPin::pin();

        let oid = store::tag::create_from_buffer(self.repo.store(), buffer, force)
            .map_err(|code| pin.error(code).into_invalid_target())?;

        info!(%oid, "created tag from buffer");

        Ok(oid)
    }

    /// Create a lightweight tag: `refs/tags/<name>` pointing straight at `target`.
    ///
    /// Returns the target's id, as there is no tag object. Such a tag can be
    /// looked up with [`TagsCollection::lookup`] or
    /// [`Repository::find_reference`]; [`Repository::lookup_tag`] fails on it.
    pub fn create_lightweight(
        &self,
        name: &str,
        target: &Object,
        force: bool,
    ) -> Result<Oid, TagError> {
        let pin = ThreadPin::pin();

        let oid = store::tag::create_lightweight(self.repo.store(), name, &target.id(), force)
            .map_err(|code| pin.error(code).into_invalid_target())?;

        info!(tag = name, %oid, "created lightweight tag");

        Ok(oid)
    }

    /// Delete `refs/tags/<name>`. The tag object, if any, stays in the object
    /// database.
    pub fn remove(&self, name: &str) -> Result<(), TagError> {
        let pin = ThreadPin::pin();

        store::tag::delete(self.repo.store(), name).map_err(|code| pin.error(code))?;

        info!(tag = name, "removed tag");

        Ok(())
    }

    /// the id `refs/tags/<name>` points at, if the tag exists
    pub fn lookup(&self, name: &str) -> Result<Option<Oid>, TagError> {
        let reference = format!("{}{}", store::tag::TAGS_DIR, name);

        validate_name(&reference).map_err(|e| TagError::InvalidName(format!("{:#}", e)))?;

        self.repo.find_reference(&reference)
    }

    /// Names of all tags, e.g. `["v1.0.1", "v2.0.0"]`.
    pub fn list(&self) -> Result<Vec<String>, TagError> {
        let pin = ThreadPin::pin();

        store::tag::list_match(self.repo.store(), None).map_err(|code| pin.error(code))
    }

    /// Names of the tags matching a glob such as `v1.*`.
    ///
    /// The pattern follows fnmatch(3): `*`, `?` and `[...]`, applied to the
    /// short name.
    pub fn list_match(&self, pattern: &str) -> Result<Vec<String>, TagError> {
        let compiled = glob::Pattern::new(pattern).map_err(|source| TagError::InvalidPattern {
            pattern: pattern.to_string(),
            source,
        })?;

        let pin = ThreadPin::pin();

        store::tag::list_match(self.repo.store(), Some(&compiled)).map_err(|code| pin.error(code))
    }

    /// Call `callback` for every tag, lightweight ones included.
    ///
    /// The callback gets the full ref name (`refs/tags/v1.0.0`) and the id the
    /// ref points at. For annotated tags that is the tag object's id, not the
    /// tagged object; use [`Repository::lookup_tag`] to go further.
    ///
    /// Iteration stops at the first error from `callback`, which is returned
    /// unchanged as [`TagError::Callback`].
    pub fn foreach<F>(&self, mut callback: F) -> Result<(), TagError>
    where
        F: FnMut(&str, &Oid) -> anyhow::Result<()>,
    {
        let data = handles::track(CallbackData::default());

        let pin = ThreadPin::pin();

        let ret = store::tag::foreach(
            self.repo.store(),
            |name: &str, id: &Oid, handle: Handle| {
                let result = callback(name, id);
                handles::dispatch(handle, |data: &mut CallbackData| data.record(result))
            },
            data.handle(),
        );

        let data = data.release();

        match (ret, data.error) {
            (Ok(()), _) => Ok(()),
            (Err(ErrorCode::User), Some(err)) => {
                warn!(error = %err, "tag foreach stopped by callback");
                Err(TagError::Callback(err))
            }
            (Err(code), _) => Err(pin.error(code)),
        }
    }
}
