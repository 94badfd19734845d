//! Header-based classification of definition files.
//!
//! Every definition file opens with a header row. A file's kind is detected
//! by checking whether its header is a superset of the kind's required
//! columns. Detection walks a fixed priority list because some required sets
//! are subsets of others (the `tables` columns are a strict subset of the
//! `fields` columns), so the more specific kind must be tested first.

use std::fmt;

/// The recognized definition-file kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FileKind {
    Unknown,
    Fields,
    Tables,
    Schema,
    References,
    Indexes,
    Constraints,
    Mappings,
    Models,
}

impl fmt::Display for FileKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            FileKind::Unknown => "unknown",
            FileKind::Fields => "fields",
            FileKind::Tables => "tables",
            FileKind::Schema => "schema",
            FileKind::References => "references",
            FileKind::Indexes => "indexes",
            FileKind::Constraints => "constraints",
            FileKind::Mappings => "mappings",
            FileKind::Models => "models",
        };
        f.write_str(s)
    }
}

impl FileKind {
    /// Minimum columns a header must contain for this kind to match.
    pub fn required_columns(self) -> &'static [&'static str] {
        match self {
            FileKind::Fields => &["model", "version", "table", "field", "description"],
            FileKind::Tables => &["model", "version", "table", "description"],
            FileKind::Schema => &[
                "model",
                "version",
                "table",
                "field",
                "type",
                "length",
                "precision",
                "scale",
                "default",
            ],
            FileKind::Constraints => &["model", "version", "table", "field", "type", "name"],
            FileKind::Indexes => &["model", "version", "table", "field", "name", "order"],
            FileKind::References => &[
                "version",
                "table",
                "field",
                "ref_table",
                "ref_field",
                "name",
            ],
            FileKind::Mappings => &[
                "source_model",
                "source_version",
                "source_table",
                "source_field",
                "target_model",
                "target_version",
                "target_table",
                "target_field",
                "comment",
            ],
            FileKind::Models => &["model", "version", "label", "description", "url"],
            FileKind::Unknown => &[],
        }
    }
}

// Explicit order: the tables columns are a subset of the fields columns, so
// fields (and the other field-level kinds) must be tested before tables.
const DETECTION_ORDER: [FileKind; 8] = [
    FileKind::Fields,
    FileKind::Schema,
    FileKind::Indexes,
    FileKind::Constraints,
    FileKind::References,
    FileKind::Tables,
    FileKind::Mappings,
    FileKind::Models,
];

fn has_columns(header: &[String], required: &[&str]) -> bool {
    required
        .iter()
        .all(|col| header.iter().any(|h| h == col))
}

/// Detect the kind of a definition file from its header columns.
///
/// Returns [`FileKind::Unknown`] when no required set matches; callers skip
/// such files with a diagnostic rather than treating them as errors.
pub fn detect_file_kind(header: &[String]) -> FileKind {
    for kind in DETECTION_ORDER {
        if has_columns(header, kind.required_columns()) {
            return kind;
        }
    }

    FileKind::Unknown
}
