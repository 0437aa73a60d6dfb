pub mod kvlm;
pub mod tag;

use crate::oid::Oid;
use crate::utils::sha;
use anyhow::Context;
use bytes::{Buf, BufMut, Bytes, BytesMut};
use clap::ValueEnum;
use std::fmt;

/// An object as stored in the object database: a header and its payload.
///
/// The serialized form is `"<fmt> <length>\0<data>"`; the object id is the
/// SHA-1 of exactly those bytes.
#[derive(Clone, Debug)]
pub struct GitObject {
    pub header: Header,
    pub data: Bytes,
}

#[derive(Clone, Debug)]
pub struct Header {
    pub fmt: Fmt,
    pub length: usize,
}

/// The kind of an object.
#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, ValueEnum)]
pub enum Fmt {
    Commit,
    Tree,
    Blob,
    Tag,
}

impl Fmt {
    pub fn to_str(&self) -> &'static str {
        match self {
            Fmt::Commit => "commit",
            Fmt::Tree => "tree",
            Fmt::Blob => "blob",
            Fmt::Tag => "tag",
        }
    }

    /// parse the lowercase name used in object headers and tag `type` lines
    pub fn parse(name: &str) -> anyhow::Result<Self> {
        Ok(match name {
            "commit" => Fmt::Commit,
            "tree" => Fmt::Tree,
            "blob" => Fmt::Blob,
            "tag" => Fmt::Tag,
            _ => anyhow::bail!("unknown object type: {}", name),
        })
    }
}

impl fmt::Display for Fmt {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.to_str())
    }
}

impl GitObject {
    pub fn new(fmt: Fmt, data: impl Into<Bytes>) -> GitObject {
        let data = data.into();
        let length = data.len();

        let header = Header { fmt, length };

        GitObject { header, data }
    }

    /// parse a decompressed object, header included
    pub fn from_bytes(mut data: Bytes) -> anyhow::Result<GitObject> {
        let space = data
            .iter()
            .position(|&x| x == b' ')
            .context("failed to split object fmt")?;
        let nul = data
            .iter()
            .position(|&x| x == b'\0')
            .context("failed to split object length")?;
        anyhow::ensure!(space < nul, "malformed object header");

        let fmt = std::str::from_utf8(&data[..space]).context("failed to parse object fmt")?;
        let fmt = Fmt::parse(fmt)?;

        let length =
            std::str::from_utf8(&data[space + 1..nul]).context("failed to parse object length")?;
        let length = length
            .parse::<usize>()
            .context("failed to parse object length")?;

        data.advance(nul + 1);

        anyhow::ensure!(data.len() == length, "object length mismatch");

        let header = Header { fmt, length };

        Ok(GitObject { header, data })
    }

    pub fn serialize(&self) -> Bytes {
        let mut data = BytesMut::with_capacity(self.data.len() + 32);

        data.extend_from_slice(self.header.fmt.to_str().as_bytes());
        data.put_u8(b' ');
        data.extend_from_slice(self.header.length.to_string().as_bytes());
        data.put_u8(b'\0');
        data.extend_from_slice(&self.data);

        data.into()
    }

    /// the id this object is (or would be) stored under
    pub fn id(&self) -> Oid {
        sha(&self.serialize())
    }
}

/// An object read back from a repository, together with its id.
#[derive(Clone, Debug)]
pub struct Object {
    id: Oid,
    raw: GitObject,
}

impl Object {
    pub(crate) fn new(id: Oid, raw: GitObject) -> Self {
        Self { id, raw }
    }

    pub fn id(&self) -> Oid {
        self.id
    }

    pub fn kind(&self) -> Fmt {
        self.raw.header.fmt
    }

    pub fn data(&self) -> &Bytes {
        &self.raw.data
    }
}

impl fmt::Display for Object {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", String::from_utf8_lossy(&self.raw.data))
    }
}
