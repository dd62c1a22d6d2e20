use std::fmt;

use serde::{Deserialize, Serialize};

/// Provenance tag carried by every indexed unit.
///
/// Serialized alongside the unit text in the index bundle; the variant
/// records which modality the text came from and enough of a source
/// reference to point a reader back at the artifact.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum UnitMetadata {
    /// A window of a document's extracted plain text.
    Text { source: String, chunk: usize },
    /// The description of one extracted image.
    Image { source: String },
    /// One canonicalized row of a table export.
    Table { source: String },
}

impl fmt::Display for UnitMetadata {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UnitMetadata::Text { source, chunk } => {
                write!(f, "text:{source}:{chunk}")
            }
            UnitMetadata::Image { source } => write!(f, "image:{source}"),
            UnitMetadata::Table { source } => write!(f, "table:{source}"),
        }
    }
}

/// The atomic object indexed for search: one embeddable string plus its
/// provenance. A unit's position in the bundle is permanently tied to
/// the position of its embedding vector.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetrievableUnit {
    pub text: String,
    pub metadata: UnitMetadata,
}

impl RetrievableUnit {
    pub fn new(text: impl Into<String>, metadata: UnitMetadata) -> Self {
        Self {
            text: text.into(),
            metadata,
        }
    }
}
