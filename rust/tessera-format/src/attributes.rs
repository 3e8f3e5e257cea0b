use bytes::Bytes;

use crate::{DocId, Features};

/// One occurrence of a term within a document.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Position {
    pub pos: u32,
    /// Start and end character offsets.
    pub offset: Option<(u32, u32)>,
    pub payload: Option<Bytes>,
}

impl Position {
    pub fn new(pos: u32) -> Position {
        Position {
            pos,
            ..Default::default()
        }
    }

    pub fn with_offset(mut self, start: u32, end: u32) -> Position {
        self.offset = Some((start, end));
        self
    }

    pub fn with_payload(mut self, payload: impl Into<Bytes>) -> Position {
        self.payload = Some(payload.into());
        self
    }
}

/// Per-document attributes of a posting, besides the document id itself.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct PostingAttributes {
    pub freq: u32,
    pub positions: Vec<Position>,
}

impl PostingAttributes {
    pub fn with_freq(freq: u32) -> PostingAttributes {
        PostingAttributes {
            freq,
            positions: Vec::new(),
        }
    }

    /// Builds attributes from positions; the frequency is the number of positions.
    pub fn with_positions(positions: Vec<Position>) -> PostingAttributes {
        PostingAttributes {
            freq: positions.len() as u32,
            positions,
        }
    }

    /// Strips everything outside `features`.
    ///
    /// Empty payloads are indistinguishable from absent ones once persisted,
    /// so they are normalized to `None`.
    pub fn project(&self, features: Features) -> PostingAttributes {
        if !features.contains(Features::FREQUENCY) {
            return PostingAttributes::default();
        }
        let positions = if features.contains(Features::POSITION) {
            self.positions
                .iter()
                .map(|p| Position {
                    pos: p.pos,
                    offset: p.offset.filter(|_| features.contains(Features::OFFSET)),
                    payload: p
                        .payload
                        .clone()
                        .filter(|b| features.contains(Features::PAYLOAD) && !b.is_empty()),
                })
                .collect()
        } else {
            Vec::new()
        };
        PostingAttributes {
            freq: self.freq,
            positions,
        }
    }

    pub fn clear(&mut self) {
        self.freq = 0;
        self.positions.clear();
    }
}

/// A document entry of a term's postings list.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Posting {
    pub doc: DocId,
    pub attributes: PostingAttributes,
}

impl Posting {
    pub fn new(doc: DocId) -> Posting {
        Posting {
            doc,
            attributes: PostingAttributes::with_freq(1),
        }
    }

    pub fn with_attributes(doc: DocId, attributes: PostingAttributes) -> Posting {
        Posting { doc, attributes }
    }

    pub fn project(&self, features: Features) -> Posting {
        Posting {
            doc: self.doc,
            attributes: self.attributes.project(features),
        }
    }
}
