use crate::error::TagError;
use crate::objects::tag::TagObject;
use crate::objects::{Fmt, Object};
use crate::oid::Oid;
use crate::repository::Repository;
use crate::signature::Signature;

/// maximum length of a tag-to-tag chain followed by [`Tag::peel`]
const MAX_PEEL_DEPTH: usize = 10;

/// An annotated tag read from a repository.
///
/// Fields are decoded once when the tag is looked up. The tag borrows its
/// repository, so it cannot outlive it.
pub struct Tag<'repo> {
    repo: &'repo Repository,
    id: Oid,
    name: String,
    message: String,
    tagger: Option<Signature>,
    target_id: Oid,
    target_type: Fmt,
}

impl<'repo> Tag<'repo> {
    /// decode a tag object; fails with [`TagError::InvalidTarget`] for other kinds
    pub(crate) fn from_object(repo: &'repo Repository, object: Object) -> Result<Self, TagError> {
        if object.kind() != Fmt::Tag {
            return Err(TagError::InvalidTarget(format!(
                "object {} is a {}, not a tag",
                object.id(),
                object.kind()
            )));
        }

        let id = object.id();
        let malformed = |e: anyhow::Error| TagError::MalformedBuffer(format!("tag {}: {:#}", id, e));

        let tag = TagObject::from_bytes(object.data().clone()).map_err(malformed)?;
        let target_id = tag.target_id().map_err(malformed)?;
        let target_type = tag.target_type().map_err(malformed)?;

        Ok(Self {
            repo,
            id,
            name: tag.tag().unwrap_or_default().to_string(),
            message: tag.message().to_string(),
            tagger: tag.tagger_signature(),
            target_id,
            target_type,
        })
    }

    /// id of the tag object itself
    pub fn id(&self) -> Oid {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    /// the tagger, or an empty signature for tags that carry none
    pub fn tagger(&self) -> Signature {
        self.tagger.clone().unwrap_or_default()
    }

    pub fn target_id(&self) -> Oid {
        self.target_id
    }

    pub fn target_type(&self) -> Fmt {
        self.target_type
    }

    /// look the target up in the object database; not cached
    pub fn target(&self) -> Result<Object, TagError> {
        self.repo
            .lookup_object(&self.target_id)
            .map_err(TagError::into_invalid_target)
    }

    /// follow tags pointing at tags until reaching some other object
    pub fn peel(&self) -> Result<Object, TagError> {
        let mut object = self.target()?;

        for _ in 0..MAX_PEEL_DEPTH {
            if object.kind() != Fmt::Tag {
                return Ok(object);
            }
            object = Tag::from_object(self.repo, object)?.target()?;
        }

        Err(TagError::InvalidTarget(format!(
            "tag {} is nested more than {} levels deep",
            self.id, MAX_PEEL_DEPTH
        )))
    }
}

impl std::fmt::Debug for Tag<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Tag")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("target_id", &self.target_id)
            .field("target_type", &self.target_type)
            .finish()
    }
}
