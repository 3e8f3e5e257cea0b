//! Bincode shapes of the segment and index descriptors.

use bincode::{Decode, Encode};
use tessera_common::{Error, Result};
use tessera_format::{Features, IndexSegment, SegmentMeta};

#[derive(Debug, Encode, Decode, PartialEq, Eq)]
pub(crate) struct PersistedSegmentMeta {
    pub name: String,
    pub version: u64,
    pub docs_count: u32,
    pub features: u32,
    pub codec: String,
    pub files: Vec<String>,
}

impl From<&SegmentMeta> for PersistedSegmentMeta {
    fn from(meta: &SegmentMeta) -> Self {
        PersistedSegmentMeta {
            name: meta.name.clone(),
            version: meta.version,
            docs_count: meta.docs_count,
            features: meta.features.bits(),
            codec: meta.codec.clone(),
            files: meta.files.iter().cloned().collect(),
        }
    }
}

impl PersistedSegmentMeta {
    pub fn into_meta(self, element: &str) -> Result<SegmentMeta> {
        if self.name.is_empty() || self.codec.is_empty() {
            return Err(Error::invalid_format(element, "segment without name or codec"));
        }
        Ok(SegmentMeta {
            name: self.name,
            version: self.version,
            docs_count: self.docs_count,
            features: Features::from_persisted(self.features, element)?,
            codec: self.codec,
            files: self.files.into_iter().collect(),
        })
    }
}

#[derive(Debug, Encode, Decode, PartialEq, Eq)]
pub(crate) struct PersistedIndexSegment {
    pub filename: String,
    pub meta: PersistedSegmentMeta,
}

#[derive(Debug, Encode, Decode, PartialEq, Eq)]
pub(crate) struct PersistedIndexMeta {
    pub generation: u64,
    pub counter: u64,
    pub segments: Vec<PersistedIndexSegment>,
}

impl PersistedIndexMeta {
    pub fn new(generation: u64, counter: u64, segments: &[IndexSegment]) -> PersistedIndexMeta {
        PersistedIndexMeta {
            generation,
            counter,
            segments: segments
                .iter()
                .map(|s| PersistedIndexSegment {
                    filename: s.filename.clone(),
                    meta: (&s.meta).into(),
                })
                .collect(),
        }
    }

    pub fn into_segments(self, element: &str) -> Result<Vec<IndexSegment>> {
        self.segments
            .into_iter()
            .map(|s| Ok(IndexSegment::new(s.filename, s.meta.into_meta(element)?)))
            .collect()
    }
}

/// Uses the standard bincode configuration with fixed-length integer encoding.
fn binc_config() -> impl bincode::config::Config {
    bincode::config::standard().with_fixed_int_encoding()
}

pub(crate) fn encode<T: Encode>(value: &T, element: &str) -> Result<Vec<u8>> {
    bincode::encode_to_vec(value, binc_config())
        .map_err(|e| Error::external(element, e))
}

/// Decodes a value that must span the whole slice.
pub(crate) fn decode<T: Decode<()>>(bytes: &[u8], element: &str) -> Result<T> {
    let (value, read) = bincode::decode_from_slice(bytes, binc_config())
        .map_err(|e| Error::invalid_format(element, e.to_string()))?;
    if read != bytes.len() {
        return Err(Error::invalid_format(
            element,
            format!("{} trailing bytes", bytes.len() - read),
        ));
    }
    Ok(value)
}
