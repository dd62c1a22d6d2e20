//! Query-time retrieval over a loaded index bundle.

use crate::{
    error::{Error, Result},
    indexer::IndexBundle,
    services::TextEmbedder,
    unit::UnitMetadata,
};

/// Default number of units returned per question.
pub const DEFAULT_TOP_K: usize = 6;

/// One retrieved unit with its squared-L2 distance to the question.
#[derive(Debug, Clone)]
pub struct Retrieved {
    pub text: String,
    pub metadata: UnitMetadata,
    pub distance: f32,
}

/// Read-only view over an [`IndexBundle`] answering nearest-neighbor
/// queries. The bundle is never mutated after load.
pub struct Retriever<'a, E: TextEmbedder> {
    bundle: &'a IndexBundle,
    embedder: &'a E,
}

impl<'a, E: TextEmbedder> Retriever<'a, E> {
    pub fn new(bundle: &'a IndexBundle, embedder: &'a E) -> Self {
        Self { bundle, embedder }
    }

    /// Embed `question` with the same model used at build time and
    /// return the `k` most similar units, closest first. Returns fewer
    /// than `k` results only when the bundle holds fewer units.
    pub fn retrieve(&self, question: &str, k: usize) -> Result<Vec<Retrieved>> {
        let vectors = self.embedder.embed(&[question.to_string()])?;
        let query = vectors.into_iter().next().ok_or_else(|| {
            Error::Config("embedder returned no vector for the question".into())
        })?;

        let (distances, positions) = self.bundle.index.search(&query, k)?;

        positions
            .into_iter()
            .zip(distances)
            .map(|(position, distance)| {
                let text = self
                    .bundle
                    .sentences
                    .get(position)
                    .ok_or_else(|| bundle_hole("sentence", position))?;
                let metadata = self
                    .bundle
                    .metadata
                    .get(position)
                    .ok_or_else(|| bundle_hole("metadata", position))?;
                Ok(Retrieved {
                    text: text.clone(),
                    metadata: metadata.clone(),
                    distance,
                })
            })
            .collect()
    }
}

fn bundle_hole(collection: &str, position: usize) -> Error {
    Error::Config(format!(
        "index bundle is corrupt: no {collection} at position {position}"
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        indexer::build_bundle,
        unit::RetrievableUnit,
    };

    /// Embeds each known phrase at a fixed point on a line so distances
    /// are predictable.
    struct LineEmbedder;

    impl TextEmbedder for LineEmbedder {
        fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
            Ok(texts
                .iter()
                .map(|t| {
                    let x = match t.as_str() {
                        "apples grow on trees" => 0.0,
                        "bananas are yellow" => 10.0,
                        "cherries are red" => 20.0,
                        // Questions land near the apple unit.
                        _ => 1.0,
                    };
                    vec![x, 0.0]
                })
                .collect())
        }
    }

    fn sample_bundle() -> IndexBundle {
        let units = vec![
            RetrievableUnit::new(
                "apples grow on trees",
                UnitMetadata::Text {
                    source: "fruit".into(),
                    chunk: 0,
                },
            ),
            RetrievableUnit::new(
                "bananas are yellow",
                UnitMetadata::Image {
                    source: "banana.png".into(),
                },
            ),
            RetrievableUnit::new(
                "cherries are red",
                UnitMetadata::Table {
                    source: "cherries.json".into(),
                },
            ),
        ];
        build_bundle(units, &LineEmbedder).unwrap()
    }

    #[test]
    fn closest_unit_comes_first() {
        let bundle = sample_bundle();
        let retriever = Retriever::new(&bundle, &LineEmbedder);

        let hits = retriever.retrieve("what do apples do?", 2).unwrap();
        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].text, "apples grow on trees");
        assert_eq!(hits[1].text, "bananas are yellow");
        assert!(hits[0].distance < hits[1].distance);
    }

    #[test]
    fn k_beyond_bundle_size_returns_everything() {
        let bundle = sample_bundle();
        let retriever = Retriever::new(&bundle, &LineEmbedder);

        let hits = retriever.retrieve("anything", DEFAULT_TOP_K).unwrap();
        assert_eq!(hits.len(), 3);
        for pair in hits.windows(2) {
            assert!(pair[0].distance <= pair[1].distance);
        }
    }

    #[test]
    fn metadata_travels_with_the_text() {
        let bundle = sample_bundle();
        let retriever = Retriever::new(&bundle, &LineEmbedder);

        let hits = retriever.retrieve("cherries are red", 1).unwrap();
        assert_eq!(
            hits[0].metadata,
            UnitMetadata::Table {
                source: "cherries.json".into()
            }
        );
    }
}
