use std::fmt;
use std::str::FromStr;

/// Length in bytes of a SHA-1 object id.
pub const OID_RAW_SIZE: usize = 20;

/// Length of the lowercase hex form of an object id.
pub const OID_HEX_SIZE: usize = OID_RAW_SIZE * 2;

/// An object id: the SHA-1 of an object's header and content.
#[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Oid([u8; OID_RAW_SIZE]);

impl Oid {
    pub fn from_bytes(bytes: [u8; OID_RAW_SIZE]) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; OID_RAW_SIZE] {
        &self.0
    }
}

impl FromStr for Oid {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> anyhow::Result<Self> {
        anyhow::ensure!(
            s.len() == OID_HEX_SIZE,
            "invalid object id length {}: {}",
            s.len(),
            s
        );

        let mut bytes = [0u8; OID_RAW_SIZE];
        hex::decode_to_slice(s, &mut bytes)
            .map_err(|e| anyhow::anyhow!("invalid object id {}: {}", s, e))?;

        Ok(Self(bytes))
    }
}

impl fmt::Display for Oid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&hex::encode(self.0))
    }
}

impl fmt::Debug for Oid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Oid({})", self)
    }
}
