//! Multi-source license reconciliation
//!
//! **Merge rule:**
//! 1. Sources are folded in fixed precedence order: static < file < remote < cache
//! 2. First record seen for a normalized key is inserted unchanged
//! 3. A later record replaces it only when its `updated` is strictly newer
//!
//! Equal `updated` values (including both missing) keep the record that was
//! folded first, so the lower-precedence source wins ties.

use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;

use super::LicenseRecord;

/// Origin of a source collection, ordered by merge precedence
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum SourceKind {
    Static,
    File,
    Remote,
    Cache,
}

impl SourceKind {
    pub const ALL: [SourceKind; 4] = [
        SourceKind::Static,
        SourceKind::File,
        SourceKind::Remote,
        SourceKind::Cache,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            SourceKind::Static => "static",
            SourceKind::File => "file",
            SourceKind::Remote => "remote",
            SourceKind::Cache => "cache",
        }
    }
}

impl fmt::Display for SourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Raw records read from one origin
#[derive(Debug, Clone, PartialEq)]
pub struct SourceCollection {
    pub kind: SourceKind,
    pub records: Vec<Value>,
}

impl SourceCollection {
    pub fn new(kind: SourceKind, records: Vec<Value>) -> Self {
        Self { kind, records }
    }

    pub fn empty(kind: SourceKind) -> Self {
        Self::new(kind, Vec::new())
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

/// Deduplicated, recency-resolved view of all known licenses
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CanonicalMap {
    entries: BTreeMap<String, LicenseRecord>,
}

impl CanonicalMap {
    /// Lookup by already-normalized key
    pub fn get(&self, normalized_key: &str) -> Option<&LicenseRecord> {
        self.entries.get(normalized_key)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn records(&self) -> impl Iterator<Item = &LicenseRecord> {
        self.entries.values()
    }

    /// Fold one record into the map using the recency rule
    fn absorb(&mut self, kind: SourceKind, record: LicenseRecord) {
        let replace = match self.entries.get(record.normalized_key()) {
            None => true,
            Some(existing) => {
                let existing_updated = existing.updated_millis();
                let incoming_updated = record.updated_millis();
                let newer = incoming_updated > existing_updated;
                if newer {
                    tracing::debug!(
                        key = %record.normalized_key(),
                        source = %kind,
                        incoming = incoming_updated,
                        existing = existing_updated,
                        "Keeping newer version of license"
                    );
                }
                newer
            }
        };

        if replace {
            self.entries.insert(record.normalized_key().to_string(), record);
        }
    }
}

/// Merge source collections into the canonical mapping.
///
/// Input order does not matter; collections are folded by [`SourceKind`]
/// precedence (stable for repeated kinds).
pub fn merge(sources: &[SourceCollection]) -> CanonicalMap {
    let mut ordered: Vec<&SourceCollection> = sources.iter().collect();
    ordered.sort_by_key(|source| source.kind);

    let mut map = CanonicalMap::default();
    for source in ordered {
        let mut skipped = 0usize;
        for raw in &source.records {
            match LicenseRecord::from_value(raw) {
                Some(record) => map.absorb(source.kind, record),
                None => skipped += 1,
            }
        }
        if skipped > 0 {
            tracing::debug!(source = %source.kind, skipped, "Skipped records without a usable key");
        }
    }
    map
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_source_precedence_order() {
        assert!(SourceKind::Static < SourceKind::File);
        assert!(SourceKind::File < SourceKind::Remote);
        assert!(SourceKind::Remote < SourceKind::Cache);
    }

    #[test]
    fn test_merge_empty() {
        assert!(merge(&[]).is_empty());
        let empties: Vec<_> = SourceKind::ALL.iter().map(|k| SourceCollection::empty(*k)).collect();
        assert!(merge(&empties).is_empty());
    }

    #[test]
    fn test_input_order_is_irrelevant() {
        let cache = SourceCollection::new(
            SourceKind::Cache,
            vec![json!({"key": "K", "expiry": "2030-01-01"})],
        );
        let file = SourceCollection::new(
            SourceKind::File,
            vec![json!({"key": "k", "expiry": "2031-01-01"})],
        );

        // Both lack `updated`, so the file copy (folded first) wins either way.
        let a = merge(&[cache.clone(), file.clone()]);
        let b = merge(&[file, cache]);
        assert_eq!(a, b);
        assert_eq!(a.get("K").unwrap().expiry(), Some(&json!("2031-01-01")));
    }
}
