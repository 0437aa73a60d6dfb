//! Tag operations of the storage engine.
//!
//! Every function reports failure as an [`ErrorCode`] with the detail left in
//! the thread's last-error slot.

use crate::handles::Handle;
use crate::objects::tag::{self as codec, TagObject};
use crate::objects::{Fmt, GitObject};
use crate::oid::Oid;
use crate::signature::Signature;
use crate::store::error::{has_error, raise, set_error, ErrorClass, ErrorCode, RaiseExt};
use crate::store::refdb::validate_name;
use crate::store::Store;
use bytes::Bytes;
use tracing::debug;

/// namespace holding tag references
pub const TAGS_DIR: &str = "refs/tags/";

fn reference_name(tag_name: &str) -> String {
    format!("{}{}", TAGS_DIR, tag_name)
}

fn check_name(tag_name: &str) -> Result<String, ErrorCode> {
    let name = reference_name(tag_name);

    match validate_name(&name) {
        Ok(()) => Ok(name),
        Err(e) => raise(
            ErrorCode::InvalidSpec,
            ErrorClass::Tag,
            format!("'{}' is not a valid tag name: {:#}", tag_name, e),
        ),
    }
}

/// the kind of `target`, failing if it is not in this object database
fn target_kind(store: &Store, target: &Oid) -> Result<Fmt, ErrorCode> {
    match store.odb().read(target) {
        Ok(object) => Ok(object.header.fmt),
        Err(ErrorCode::NotFound) => raise(
            ErrorCode::NotFound,
            ErrorClass::Tag,
            format!("the target object {} does not exist in this repository", target),
        ),
        Err(code) => Err(code),
    }
}

fn check_conflict(store: &Store, name: &str, force: bool) -> Result<(), ErrorCode> {
    if !force && store.refdb().lookup(name)?.is_some() {
        return raise(
            ErrorCode::Exists,
            ErrorClass::Tag,
            format!("tag '{}' already exists", name.trim_start_matches(TAGS_DIR)),
        );
    }
    Ok(())
}

/// write an annotated tag object for `target` and point `refs/tags/<name>` at it
///
/// returns the id of the new tag object
pub fn create(
    store: &Store,
    name: &str,
    target: &Oid,
    tagger: &Signature,
    message: &str,
    force: bool,
) -> Result<Oid, ErrorCode> {
    let reference = check_name(name)?;
    let kind = target_kind(store, target)?;
    check_conflict(store, &reference, force)?;

    let buffer = codec::encode(target, kind, name, tagger, message);
    let oid = store.odb().write(&GitObject::new(Fmt::Tag, buffer))?;

    store.refdb().create(&reference, &oid, force)?;

    debug!(tag = name, %oid, %target, "created annotated tag");

    Ok(oid)
}

/// point `refs/tags/<name>` straight at `target`
pub fn create_lightweight(
    store: &Store,
    name: &str,
    target: &Oid,
    force: bool,
) -> Result<Oid, ErrorCode> {
    let reference = check_name(name)?;
    target_kind(store, target)?;
    check_conflict(store, &reference, force)?;

    store.refdb().create(&reference, target, force)?;

    debug!(tag = name, %target, "created lightweight tag");

    Ok(*target)
}

/// write `buffer` verbatim as a tag object and point its tag reference at it
pub fn create_from_buffer(store: &Store, buffer: &[u8], force: bool) -> Result<Oid, ErrorCode> {
    let tag = TagObject::from_bytes(Bytes::copy_from_slice(buffer))
        .map_err(|e| e.context("failed to parse tag buffer"))
        .or_raise(ErrorCode::Invalid, ErrorClass::Tag)?;

    // checked by TagObject::from_bytes
    let (target, declared, name) = match (tag.target_id(), tag.target_type(), tag.tag()) {
        (Ok(target), Ok(declared), Some(name)) => (target, declared, name),
        _ => return raise(ErrorCode::Invalid, ErrorClass::Tag, "failed to parse tag buffer"),
    };

    let reference = check_name(name)?;

    let kind = target_kind(store, &target)?;
    if kind != declared {
        return raise(
            ErrorCode::Peel,
            ErrorClass::Tag,
            format!(
                "the type for the given target is invalid: buffer says {}, {} is a {}",
                declared, target, kind
            ),
        );
    }

    check_conflict(store, &reference, force)?;

    let oid = store.odb().write(&GitObject::new(Fmt::Tag, tag.serialize()))?;

    store.refdb().create(&reference, &oid, force)?;

    debug!(tag = name, %oid, %target, "created tag from buffer");

    Ok(oid)
}

/// remove `refs/tags/<name>`; the tag object itself stays in the database
pub fn delete(store: &Store, name: &str) -> Result<(), ErrorCode> {
    let reference = check_name(name)?;

    match store.refdb().delete(&reference) {
        Err(ErrorCode::NotFound) => raise(
            ErrorCode::NotFound,
            ErrorClass::Tag,
            format!("tag '{}' not found", name),
        ),
        other => other,
    }
}

/// short names of all tags, optionally filtered by a glob on the short name
pub fn list_match(store: &Store, pattern: Option<&glob::Pattern>) -> Result<Vec<String>, ErrorCode> {
    let names = store.refdb().list(TAGS_DIR)?;

    Ok(names
        .iter()
        .map(|name| name.trim_start_matches(TAGS_DIR))
        .filter(|name| pattern.map_or(true, |p| p.matches(name)))
        .map(str::to_string)
        .collect())
}

/// Call `callback` with each tag reference, the id it points at and `payload`.
///
/// Anything but [`ErrorCode::Ok`] from the callback stops iteration and is
/// returned as is.
pub fn foreach<C>(store: &Store, mut callback: C, payload: Handle) -> Result<(), ErrorCode>
where
    C: FnMut(&str, &Oid, Handle) -> ErrorCode,
{
    for name in store.refdb().list(TAGS_DIR)? {
        let Some(oid) = store.refdb().lookup(&name)? else {
            continue;
        };

        let ret = callback(&name, &oid, payload);
        if !ret.is_ok() {
            if !has_error() {
                set_error(
                    ErrorClass::Callback,
                    format!("tag foreach callback returned {}", ret as i32),
                );
            }
            return Err(ret);
        }
    }

    Ok(())
}
