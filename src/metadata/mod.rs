//! Metadata files and how their rows turn into archive member names.
//!
//! A metadata file is a CSV produced outside this crate (or by the
//! [`filter`](crate::filter) command). Its location under the metadata root
//! says which remote archive it describes, and each row names one member of
//! that archive:
//!
//! - [`mapper`]: pure path and name transforms ([`NameMapper`])
//! - [`indexer`]: reads one file into a [`TargetSet`](crate::TargetSet)
//!
//! Two row schemas are supported, see [`Schema::segments`] and
//! [`Schema::paths`].

mod indexer;
mod mapper;

pub use indexer::{IndexStats, IndexedMetadata, MetadataIndexer};
pub use mapper::{ArchiveDescriptor, ArchiveNaming, CategoryTable, NameMapper};

/// How a metadata line is split into fields.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RowFormat {
    /// Split on the first comma; field 0 is the source path.
    FirstField,
    /// Full CSV parsing with fixed column positions.
    Columns {
        min_columns: usize,
        segment_column: usize,
        source_column: usize,
    },
}

impl RowFormat {
    /// Build a record from already-split fields, or `None` if the row is too
    /// short to carry the fields this format needs.
    pub fn record(&self, fields: Vec<String>) -> Option<MetadataRecord> {
        match *self {
            RowFormat::FirstField => {
                let source_path = fields.first()?.trim().to_string();
                if source_path.is_empty() {
                    return None;
                }
                Some(MetadataRecord {
                    fields,
                    source_path,
                    segment_id: None,
                })
            }
            RowFormat::Columns {
                min_columns,
                segment_column,
                source_column,
            } => {
                if fields.len() < min_columns {
                    return None;
                }
                let source_path = fields.get(source_column)?.trim().to_string();
                let segment_id = fields
                    .get(segment_column)
                    .map(|s| s.trim().to_string())
                    .filter(|s| !s.is_empty());
                Some(MetadataRecord {
                    fields,
                    source_path,
                    segment_id,
                })
            }
        }
    }

    /// Split a raw line the way [`RowFormat::FirstField`] does.
    pub fn split_first_field(line: &str) -> Vec<String> {
        match line.split_once(',') {
            Some((first, rest)) => vec![first.to_string(), rest.to_string()],
            None => vec![line.to_string()],
        }
    }
}

/// How a record becomes the member name searched for in the archive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NamingPolicy {
    /// The base filename of the source path, verbatim.
    Direct,
    /// `{archive stem}{separator}{segment id}{target extension}`.
    Reconstructed {
        separator: String,
        target_extension: String,
    },
}

/// One parsed metadata row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MetadataRecord {
    pub fields: Vec<String>,
    pub source_path: String,
    pub segment_id: Option<String>,
}

/// A row layout together with its naming policy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Schema {
    pub row_format: RowFormat,
    pub policy: NamingPolicy,
    /// Rows whose source path does not end with this are ignored.
    pub source_extension: String,
}

impl Schema {
    /// Segment metadata: 8+ columns, segment id in column 0, source audio path
    /// in column 7, members stored as `{archive stem}/{segment}.wav`.
    pub fn segments() -> Self {
        Self {
            row_format: RowFormat::Columns {
                min_columns: 8,
                segment_column: 0,
                source_column: 7,
            },
            policy: NamingPolicy::Reconstructed {
                separator: "/".to_string(),
                target_extension: ".wav".to_string(),
            },
            source_extension: ".opus".to_string(),
        }
    }

    /// Phrase-filtered rows of the form `/path/to/file.wav,...`, where the
    /// member name is the file's base name.
    pub fn paths() -> Self {
        Self {
            row_format: RowFormat::FirstField,
            policy: NamingPolicy::Direct,
            source_extension: ".wav".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fields(line: &str) -> Vec<String> {
        line.split(',').map(str::to_string).collect()
    }

    #[test]
    fn test_columns_require_min_count() {
        let format = Schema::segments().row_format;
        assert!(format.record(fields("seg1,a,b")).is_none());

        let record = format
            .record(fields("seg1,a,b,c,d,e,f, /a/b/seg1.opus "))
            .unwrap();
        assert_eq!(record.segment_id.as_deref(), Some("seg1"));
        assert_eq!(record.source_path, "/a/b/seg1.opus");
        assert_eq!(record.fields.len(), 8);
    }

    #[test]
    fn test_first_field_split() {
        let split = RowFormat::split_first_field("/x/y.wav,hello, world");
        assert_eq!(split, vec!["/x/y.wav".to_string(), "hello, world".to_string()]);

        let record = RowFormat::FirstField.record(split).unwrap();
        assert_eq!(record.source_path, "/x/y.wav");
        assert!(record.segment_id.is_none());

        assert!(RowFormat::FirstField.record(vec!["  ".to_string()]).is_none());
    }
}
