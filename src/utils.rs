use crate::oid::{Oid, OID_RAW_SIZE};
use sha1::Digest;

/// hash raw object bytes (header included) into an object id
pub fn sha(data: &[u8]) -> Oid {
    let mut hasher = sha1::Sha1::new();

    hasher.update(data);

    let mut bytes = [0u8; OID_RAW_SIZE];
    bytes.copy_from_slice(&hasher.finalize());

    Oid::from_bytes(bytes)
}
