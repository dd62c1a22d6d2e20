use std::path::PathBuf;

use clap::{CommandFactory, Parser, Subcommand};
use clap_complete::Shell;

use crate::{
    chunking::{DEFAULT_CHUNK_OVERLAP, DEFAULT_CHUNK_TOKENS},
    convert::DEFAULT_RENDER_DPI,
    retrieve::DEFAULT_TOP_K,
};

#[derive(Debug, Parser)]
#[command(
    name = "docrag",
    about = "Multi-modal retrieval-augmented question answering over PDF documents"
)]
pub struct Cli {
    /// Override the artifact output directory
    #[arg(long, global = true)]
    pub output_dir: Option<PathBuf>,

    /// Increase log verbosity (can be repeated: -v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Only log warnings and errors
    #[arg(short, long, global = true)]
    pub quiet: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Convert a directory of PDFs into text, page, image, and table artifacts
    Ingest(IngestArgs),
    /// Canonicalize raw tabular exports into row-record JSON
    Tables(TablesArgs),
    /// Caption, OCR, and describe extracted images
    Describe(DescribeArgs),
    /// Build the vector index bundle from all extracted content
    Index(IndexArgs),
    /// Answer a question from the indexed content
    Ask(AskArgs),
    /// Show workspace status and index statistics
    Status(StatusArgs),
    /// Generate shell completions
    #[command(hide = true)]
    Completions(CompletionsArgs),
}

// -- Ingest --

#[derive(Debug, Parser)]
pub struct IngestArgs {
    /// Directory of PDF files to ingest
    #[arg(default_value = "data")]
    pub input: PathBuf,

    /// Endpoint of the PDF conversion service
    #[arg(
        long,
        env = "DOCRAG_CONVERTER_URL",
        default_value = "http://localhost:5001"
    )]
    pub converter_url: String,

    /// Page render resolution in DPI
    #[arg(long, default_value_t = DEFAULT_RENDER_DPI)]
    pub dpi: u32,
}

// -- Tables --

#[derive(Debug, Parser)]
pub struct TablesArgs {
    /// Source directory of raw tabular exports
    /// (defaults to the workspace's extracted_tables)
    #[arg(long)]
    pub source: Option<PathBuf>,

    /// Target directory for canonicalized JSON
    /// (defaults to the workspace's tables_json)
    #[arg(long)]
    pub target: Option<PathBuf>,
}

// -- Describe --

#[derive(Debug, Parser)]
pub struct DescribeArgs {
    /// Image directory (defaults to the workspace's extracted_images)
    #[arg(long)]
    pub images: Option<PathBuf>,

    /// Endpoint of the Ollama-compatible model server
    #[arg(
        long,
        env = "DOCRAG_OLLAMA_URL",
        default_value = "http://localhost:11434"
    )]
    pub ollama_url: String,

    /// Multimodal model used for captioning
    #[arg(long, env = "DOCRAG_CAPTION_MODEL", default_value = "llava")]
    pub caption_model: String,

    /// Completion model used for description expansion
    #[arg(long, env = "DOCRAG_LLM_MODEL", default_value = "llama3")]
    pub llm_model: String,

    /// Keep the caption-error placeholder as the long description
    /// instead of expanding it
    #[arg(long)]
    pub no_expand_on_caption_failure: bool,
}

// -- Index --

#[derive(Debug, Parser)]
pub struct IndexArgs {
    /// Endpoint of the Ollama-compatible model server
    #[arg(
        long,
        env = "DOCRAG_OLLAMA_URL",
        default_value = "http://localhost:11434"
    )]
    pub ollama_url: String,

    /// Embedding model
    #[arg(long, env = "DOCRAG_EMBED_MODEL", default_value = "all-minilm")]
    pub embed_model: String,

    /// Chunk window size in tokens
    #[arg(long, default_value_t = DEFAULT_CHUNK_TOKENS)]
    pub chunk_size: usize,

    /// Token overlap between consecutive chunks
    #[arg(long, default_value_t = DEFAULT_CHUNK_OVERLAP)]
    pub chunk_overlap: usize,
}

// -- Ask --

#[derive(Debug, Parser)]
pub struct AskArgs {
    /// The question to answer
    pub question: String,

    /// Number of retrieved units to put in the prompt
    #[arg(short = 'k', long, default_value_t = DEFAULT_TOP_K)]
    pub top_k: usize,

    /// Endpoint of the Ollama-compatible model server
    #[arg(
        long,
        env = "DOCRAG_OLLAMA_URL",
        default_value = "http://localhost:11434"
    )]
    pub ollama_url: String,

    /// Embedding model (must match the one used at index time)
    #[arg(long, env = "DOCRAG_EMBED_MODEL", default_value = "all-minilm")]
    pub embed_model: String,

    /// Completion model
    #[arg(long, env = "DOCRAG_LLM_MODEL", default_value = "llama3")]
    pub llm_model: String,

    /// Print the retrieved context to stderr before answering
    #[arg(long)]
    pub show_context: bool,
}

// -- Status --

#[derive(Debug, Parser)]
pub struct StatusArgs {
    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

// -- Completions --

#[derive(Debug, Parser)]
pub struct CompletionsArgs {
    /// Shell to generate completions for
    #[arg(value_enum)]
    pub shell: Shell,
}

impl CompletionsArgs {
    /// Generate shell completions and print to stdout.
    pub fn generate(&self) {
        let mut cmd = Cli::command();
        clap_complete::generate(
            self.shell,
            &mut cmd,
            "docrag",
            &mut std::io::stdout(),
        );
    }
}

#[cfg(test)]
mod tests {
    use clap::Parser;

    use super::*;

    #[test]
    fn parse_ask_defaults() {
        let cli = Cli::parse_from(["docrag", "ask", "what is this about?"]);
        match cli.command {
            Command::Ask(args) => {
                assert_eq!(args.question, "what is this about?");
                assert_eq!(args.top_k, DEFAULT_TOP_K);
                assert!(!args.show_context);
            }
            _ => panic!("expected ask command"),
        }
    }

    #[test]
    fn parse_index_defaults() {
        let cli = Cli::parse_from(["docrag", "index"]);
        match cli.command {
            Command::Index(args) => {
                assert_eq!(args.chunk_size, DEFAULT_CHUNK_TOKENS);
                assert_eq!(args.chunk_overlap, DEFAULT_CHUNK_OVERLAP);
                assert_eq!(args.embed_model, "all-minilm");
            }
            _ => panic!("expected index command"),
        }
    }

    #[test]
    fn parse_ingest_input_directory() {
        let cli = Cli::parse_from(["docrag", "ingest", "papers"]);
        match cli.command {
            Command::Ingest(args) => {
                assert_eq!(args.input, PathBuf::from("papers"));
                assert_eq!(args.dpi, DEFAULT_RENDER_DPI);
            }
            _ => panic!("expected ingest command"),
        }
    }
}
