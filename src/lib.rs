//! docrag - multi-modal question answering over PDF documents.
//!
//! docrag drives an external structural converter over a directory of
//! PDFs, normalizes the extracted text, tables, and images into
//! retrievable units, embeds them with an external model, and builds a
//! flat L2 vector index. At query time the question is embedded with
//! the same model, the nearest units are retrieved, and a completion
//! service answers from the assembled context.
//!
//! # Quick start
//!
//! ```no_run
//! use docrag::answer;
//! use docrag::ollama::{OllamaClient, OllamaCompletion, OllamaEmbedder};
//! use docrag::{IndexBundle, Retriever};
//!
//! let bundle = IndexBundle::load("outputs/index.json".as_ref()).unwrap();
//! let client = OllamaClient::new("http://localhost:11434").unwrap();
//! let embedder = OllamaEmbedder::new(client.clone(), "all-minilm");
//! let completion = OllamaCompletion::new(client, "llama3");
//!
//! let retriever = Retriever::new(&bundle, &embedder);
//! let question = "what does the report conclude?";
//! let hits = retriever.retrieve(question, 6).unwrap();
//! let text = answer::compose_answer(question, &hits, &completion).unwrap();
//! println!("{text}");
//! ```

pub mod answer;
pub mod chunking;
pub mod cli;
pub mod convert;
pub mod error;
pub mod flat_index;
pub mod indexer;
pub mod ingest;
pub mod ollama;
pub mod retrieve;
pub mod services;
pub mod tables;
pub mod unit;
pub mod vision;
pub mod workspace;

pub use error::{Error, Result};
pub use flat_index::FlatIndex;
pub use indexer::IndexBundle;
pub use retrieve::Retriever;
pub use unit::{RetrievableUnit, UnitMetadata};
pub use workspace::Workspace;
