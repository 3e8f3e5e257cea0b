//! # Tessera: pluggable index formats
//!
//! Tessera defines how a segmented inverted index lays its data out on
//! storage. A *format* is a named bundle of codecs, one per kind of segment
//! artifact: postings, term dictionary, field metadata, stored fields,
//! column store, document mask, segment descriptor and index generations.
//! Each segment records the name of the format that wrote it, so readers
//! resolve the matching codecs through a [`FormatRegistry`].
//!
//! ## Module Organization
//!
//! * [`common`] - Error type and validation macros
//! * [`io`] - Byte streams, encoders and artifact framing
//! * [`directory`] - Flat file namespaces (in memory and on the filesystem)
//! * [`format`] - Data model, codec traits, [`Format`] and [`FormatRegistry`]
//! * [`format_v1`] - The reference format `1_0`
//!
//! ## Getting Started
//!
//! [`formats()`] returns the process-wide registry with every built-in format
//! registered; [`default_format()`] returns the format new indexes use.

use std::sync::{Arc, OnceLock};

pub use tessera_common as common;
pub use tessera_directory as directory;
pub use tessera_format as format;
pub use tessera_format_v1 as format_v1;
pub use tessera_io as io;

pub use tessera_common::{Error, ErrorKind, Result};
pub use tessera_format::{Format, FormatRegistry, SegmentMeta};

/// Name of the format used for new segments.
pub const DEFAULT_FORMAT: &str = tessera_format_v1::FORMAT_NAME;

static FORMATS: OnceLock<FormatRegistry> = OnceLock::new();

/// Process-wide format registry, populated with the built-in formats on
/// first use.
pub fn formats() -> &'static FormatRegistry {
    FORMATS.get_or_init(|| {
        let registry = FormatRegistry::new();
        tessera_format_v1::register(&registry);
        log::debug!("built-in formats: {:?}", registry.names());
        registry
    })
}

pub fn default_format() -> Arc<dyn Format> {
    formats()
        .get(DEFAULT_FORMAT)
        .unwrap_or_else(|| Arc::new(tessera_format_v1::FormatV1::new()))
}

/// Resolves the format that wrote `meta`.
pub fn segment_format(meta: &SegmentMeta) -> Result<Arc<dyn Format>> {
    formats().get(&meta.codec).ok_or_else(|| {
        Error::invalid_operation(format!(
            "segment '{}' uses unknown format '{}'",
            meta.name, meta.codec
        ))
    })
}
