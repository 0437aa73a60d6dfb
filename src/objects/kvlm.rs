use anyhow::Context;
use bytes::Bytes;
use indexmap::IndexMap;
use std::ops::Deref;

/// A key-value list with message, the layout shared by commit and tag objects.
///
/// Headers come first, one per line, in order of appearance. Continuation
/// lines (starting with a space) fold into the previous value. The first
/// blank line ends the headers; everything after it is the message.
pub struct Kvlm {
    headers: IndexMap<String, Vec<String>>,
    message: String,
}

impl Kvlm {
    /// parse a key-value list with message
    pub fn parse(raw: Bytes) -> anyhow::Result<Self> {
        let mut headers = IndexMap::<String, Vec<String>>::new();
        let mut last: Option<String> = None;
        let mut rest = &raw[..];

        loop {
            let end = rest
                .iter()
                .position(|&b| b == b'\n')
                .context("invalid kvlm: no blank line before the message")?;
            let line = &rest[..end];
            rest = &rest[end + 1..];

            if line.is_empty() {
                break;
            }

            if let Some(continued) = line.strip_prefix(b" ") {
                let value = last
                    .as_ref()
                    .and_then(|key| headers.get_mut(key))
                    .and_then(|values| values.last_mut())
                    .context("invalid kvlm: continuation line without a header")?;
                value.push('\n');
                value.push_str(&String::from_utf8_lossy(continued));
                continue;
            }

            let split = line
                .iter()
                .position(|&b| b == b' ')
                .with_context(|| {
                    format!(
                        "invalid kvlm: header without a value: {:?}",
                        String::from_utf8_lossy(line)
                    )
                })?;
            let key = String::from_utf8_lossy(&line[..split]).to_string();
            let value = String::from_utf8_lossy(&line[split + 1..]).to_string();

            headers.entry(key.clone()).or_default().push(value);
            last = Some(key);
        }

        Ok(Kvlm {
            headers,
            message: String::from_utf8_lossy(rest).to_string(),
        })
    }

    /// get a single value of a key
    ///
    /// returns None if the key does not exist or the key has multiple values
    pub fn get_single(&self, key: &str) -> Option<&String> {
        let values = self.headers.get(key)?;
        if values.len() != 1 {
            return None;
        }
        values.first()
    }

    pub fn get(&self, key: &str) -> Option<&Vec<String>> {
        self.headers.get(key)
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

impl Deref for Kvlm {
    type Target = IndexMap<String, Vec<String>>;

    fn deref(&self) -> &Self::Target {
        &self.headers
    }
}
