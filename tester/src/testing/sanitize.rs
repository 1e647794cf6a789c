//! Record sanitization
//!
//! Canonicalizes captured and expected records so that ordering, duplicate
//! and formatting differences do not affect the verdict.

use std::collections::BTreeSet;

use cluster::{Triple, postprocess::triples_from_json_ld};
use shared::PostProcessMode;

/// Total, deterministic canonicalization of a record sequence into a set
pub trait Sanitizer: Send + Sync {
    fn sanitize(&self, records: &[String]) -> BTreeSet<String>;
}

/// Splits multi-line records, normalizes whitespace and drops blank lines
#[derive(Debug, Clone, Copy, Default)]
pub struct LineSanitizer;

impl LineSanitizer {
    /// Triples are re-rendered, which normalizes spacing between terms but
    /// leaves literal text as is; other lines get their whitespace collapsed
    fn canonical_line(line: &str) -> Option<String> {
        if let Some(triple) = Triple::parse(line.trim()) {
            return Some(triple.to_string());
        }
        let collapsed = line.split_whitespace().collect::<Vec<_>>().join(" ");
        (!collapsed.is_empty()).then_some(collapsed)
    }

    fn sanitize_into(record: &str, out: &mut BTreeSet<String>) {
        out.extend(record.lines().filter_map(Self::canonical_line));
    }
}

impl Sanitizer for LineSanitizer {
    fn sanitize(&self, records: &[String]) -> BTreeSet<String> {
        let mut out = BTreeSet::new();
        for record in records {
            Self::sanitize_into(record, &mut out);
        }
        out
    }
}

/// Expands JSON-LD documents into one canonical statement per triple
///
/// Records that are not JSON-LD are handled like [`LineSanitizer`] does, so
/// N-Triples expectations compare directly against JSON-LD output.
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonLdSanitizer;

impl Sanitizer for JsonLdSanitizer {
    fn sanitize(&self, records: &[String]) -> BTreeSet<String> {
        let mut out = BTreeSet::new();
        for record in records {
            let expanded = serde_json::from_str::<serde_json::Value>(record)
                .ok()
                .and_then(|document| triples_from_json_ld(&document));
            match expanded {
                Some(triples) => out.extend(triples.iter().map(Triple::to_string)),
                None => LineSanitizer::sanitize_into(record, &mut out),
            }
        }
        out
    }
}

/// Sanitizer matching the post-processing applied by the job
pub fn sanitizer_for(mode: PostProcessMode) -> Box<dyn Sanitizer> {
    match mode {
        PostProcessMode::None | PostProcessMode::Bulk => Box::new(LineSanitizer),
        PostProcessMode::JsonLd => Box::new(JsonLdSanitizer),
    }
}
