use crate::objects::kvlm::Kvlm;
use crate::objects::Fmt;
use crate::oid::Oid;
use crate::signature::Signature;
use anyhow::Context;
use bytes::{BufMut, Bytes, BytesMut};

/// A parsed annotated tag object. It contains the following fields:
///
/// 1. object: the id of the object the tag points to;
/// 2. type: the kind of that object (commit, tree, blob or tag);
/// 3. tag: the name of the tag;
/// 4. tagger: the identity of the person who created the tag, optional;
/// 5. message: everything after the first blank line, detached signature included.
///
/// The raw bytes are kept so the object re-serializes byte for byte.
pub struct TagObject {
    data: Bytes,
    kvlm: Kvlm,
}

impl TagObject {
    impl_kvlm_getter_single! {
        object => "object",
        kind => "type",
        tag => "tag",
        tagger => "tagger",
    }

    /// Parse and validate a tag object.
    ///
    /// Headers must be exactly `object`, `type`, `tag` and an optional
    /// `tagger`, in that order and each once. A tagger must be a valid
    /// signature.
    pub fn from_bytes(data: Bytes) -> anyhow::Result<Self> {
        let kvlm = Kvlm::parse(data.clone())?;

        let keys: Vec<&str> = kvlm.keys().map(String::as_str).collect();
        anyhow::ensure!(
            matches!(
                keys.as_slice(),
                ["object", "type", "tag"] | ["object", "type", "tag", "tagger"]
            ),
            "unexpected tag headers: {}",
            keys.join(", ")
        );
        anyhow::ensure!(
            kvlm.values().all(|values| values.len() == 1),
            "repeated tag header"
        );

        let tag = Self { data, kvlm };

        tag.target_id()?;
        tag.target_type()?;
        tag.tagger()
            .map(str::parse::<Signature>)
            .transpose()
            .context("invalid field tagger")?;

        Ok(tag)
    }

    /// everything after the headers, detached signature included
    pub fn message(&self) -> &str {
        self.kvlm.message()
    }

    pub fn target_id(&self) -> anyhow::Result<Oid> {
        self.object()
            .context("missing field object")?
            .parse()
            .context("invalid field object")
    }

    pub fn target_type(&self) -> anyhow::Result<Fmt> {
        Fmt::parse(self.kind().context("missing field type")?)
    }

    /// the tagger, if present and well formed
    pub fn tagger_signature(&self) -> Option<Signature> {
        self.tagger()?.parse().ok()
    }

    pub fn serialize(&self) -> Bytes {
        self.data.clone()
    }
}

/// Build the canonical bytes of an annotated tag object.
///
/// The message gets a trailing newline unless it already ends with one. Name
/// and message are not validated here; the object database rejects bad
/// objects when they are written.
pub fn encode(
    target_id: &Oid,
    target_type: Fmt,
    name: &str,
    tagger: &Signature,
    message: &str,
) -> Bytes {
    let mut data = BytesMut::new();

    data.extend_from_slice(b"object ");
    data.extend_from_slice(target_id.to_string().as_bytes());
    data.put_u8(b'\n');

    data.extend_from_slice(b"type ");
    data.extend_from_slice(target_type.to_str().as_bytes());
    data.put_u8(b'\n');

    data.extend_from_slice(b"tag ");
    data.extend_from_slice(name.as_bytes());
    data.put_u8(b'\n');

    data.extend_from_slice(b"tagger ");
    data.extend_from_slice(tagger.to_string().as_bytes());
    data.put_u8(b'\n');

    data.put_u8(b'\n');

    data.extend_from_slice(message.as_bytes());
    if !message.ends_with('\n') {
        data.put_u8(b'\n');
    }

    data.into()
}

/// Append a detached signature to a tag buffer, newline-terminating the
/// signature if it is not already.
pub fn encode_with_signature(buffer: &[u8], signature: &str) -> Bytes {
    let mut data = BytesMut::with_capacity(buffer.len() + signature.len() + 1);

    data.extend_from_slice(buffer);
    data.extend_from_slice(signature.as_bytes());
    if !signature.ends_with('\n') {
        data.put_u8(b'\n');
    }

    data.into()
}
