use crate::objects::GitObject;
use crate::oid::Oid;
use crate::store::error::{raise, ErrorClass, ErrorCode, RaiseExt};
use crate::utils::sha;
use anyhow::Context;
use bytes::Bytes;
use std::fs;
use std::io::{Read, Write};
use std::path::PathBuf;
use tracing::debug;

/// Loose object database: one zlib-compressed file per object, stored at
/// `objects/<first two hex digits>/<remaining hex digits>`.
pub struct Odb {
    objects_dir: PathBuf,
}

impl Odb {
    pub fn new(objects_dir: impl Into<PathBuf>) -> Self {
        Self {
            objects_dir: objects_dir.into(),
        }
    }

    fn path(&self, oid: &Oid) -> PathBuf {
        let sha = oid.to_string();
        self.objects_dir.join(&sha[..2]).join(&sha[2..])
    }

    pub fn exists(&self, oid: &Oid) -> bool {
        self.path(oid).is_file()
    }

    /// read and decompress an object, checking it hashes to `oid`
    pub fn read(&self, oid: &Oid) -> Result<GitObject, ErrorCode> {
        let path = self.path(oid);

        if !path.is_file() {
            return raise(
                ErrorCode::NotFound,
                ErrorClass::Odb,
                format!("object not found - no match for id ({})", oid),
            );
        }

        let data = inflate(&path).or_raise(ErrorCode::Generic, ErrorClass::Odb)?;

        if sha(&data) != *oid {
            return raise(
                ErrorCode::Mismatch,
                ErrorClass::Odb,
                format!("object hash mismatch for {}", oid),
            );
        }

        GitObject::from_bytes(data)
            .context(format!("corrupted object {}", oid))
            .or_raise(ErrorCode::Generic, ErrorClass::Odb)
    }

    /// write an object, returning its id
    ///
    /// objects are content addressed, writing one that exists is a no-op
    pub fn write(&self, object: &GitObject) -> Result<Oid, ErrorCode> {
        let data = object.serialize();

        let oid = sha(&data);

        let path = self.path(&oid);

        if path.exists() {
            debug!(%oid, "object already present");
            return Ok(oid);
        }

        deflate(&path, &data).or_raise(ErrorCode::Generic, ErrorClass::Os)?;

        debug!(%oid, fmt = %object.header.fmt, "wrote object");

        Ok(oid)
    }
}

fn inflate(path: &PathBuf) -> anyhow::Result<Bytes> {
    let file = fs::File::open(path).context(format!("failed to open {}", path.display()))?;

    let mut data = Vec::new();
    flate2::bufread::ZlibDecoder::new_with_decompress(
        std::io::BufReader::new(file),
        flate2::Decompress::new(true),
    )
    .read_to_end(&mut data)
    .context("failed to read zlib data")?;

    Ok(Bytes::from(data))
}

fn deflate(path: &PathBuf, data: &[u8]) -> anyhow::Result<()> {
    fs::create_dir_all(
        path.parent()
            .context(format!("failed to get path parent: {}", path.display()))?,
    )?;

    let file = fs::File::create(path).context(format!("failed to create {}", path.display()))?;

    let mut encoder = flate2::write::ZlibEncoder::new(file, flate2::Compression::default());

    encoder
        .write_all(data)
        .context("failed to write zlib data")?;

    encoder.finish().context("failed to write zlib data")?;

    Ok(())
}
