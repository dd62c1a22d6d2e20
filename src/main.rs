use clap::Parser;
use tracing_subscriber::EnvFilter;

use docrag::{
    answer,
    chunking::ChunkingConfig,
    cli::{
        AskArgs, Cli, Command, DescribeArgs, IndexArgs, IngestArgs, StatusArgs,
        TablesArgs,
    },
    convert::{HttpConverter, PdftoppmRenderer},
    error,
    indexer::{self, IndexBundle},
    ingest,
    ollama::{OllamaCaptioner, OllamaClient, OllamaCompletion, OllamaEmbedder},
    retrieve::Retriever,
    services::TesseractOcr,
    tables,
    unit::UnitMetadata,
    vision::{self, DescribeOptions},
    workspace::Workspace,
};

fn init_tracing(verbose: u8, quiet: bool) {
    let filter = if let Ok(env) = std::env::var("DOCRAG_LOG") {
        EnvFilter::new(env)
    } else if quiet {
        EnvFilter::new("warn")
    } else {
        match verbose {
            0 => EnvFilter::new("info"),
            1 => EnvFilter::new("debug"),
            _ => EnvFilter::new("trace"),
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .without_time()
        .init();
}

fn main() -> error::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose, cli.quiet);

    if let Command::Completions(args) = &cli.command {
        args.generate();
        return Ok(());
    }

    let workspace = Workspace::resolve(cli.output_dir.as_deref())?;

    match cli.command {
        Command::Ingest(args) => cmd_ingest(&workspace, &args)?,
        Command::Tables(args) => cmd_tables(&workspace, &args)?,
        Command::Describe(args) => cmd_describe(&workspace, &args)?,
        Command::Index(args) => cmd_index(&workspace, &args)?,
        Command::Ask(args) => cmd_ask(&workspace, &args)?,
        Command::Status(args) => cmd_status(&workspace, &args)?,
        Command::Completions(_) => unreachable!("handled above"),
    }

    Ok(())
}

fn cmd_ingest(workspace: &Workspace, args: &IngestArgs) -> error::Result<()> {
    let converter = HttpConverter::new(&args.converter_url)?;
    let renderer = PdftoppmRenderer::new(args.dpi);

    let summary =
        ingest::ingest_directory(&args.input, workspace, &converter, &renderer)?;

    println!(
        "Processed {} PDFs ({} failed) -> {}",
        summary.processed,
        summary.failed,
        workspace.root().display()
    );
    Ok(())
}

fn cmd_tables(workspace: &Workspace, args: &TablesArgs) -> error::Result<()> {
    let source = match &args.source {
        Some(path) => path.clone(),
        None => workspace.tables_dir()?,
    };
    let target = match &args.target {
        Some(path) => path.clone(),
        None => workspace.tables_json_dir()?,
    };

    let written = tables::canonicalize_tables(&source, &target)?;
    println!("Canonicalized {written} table exports -> {}", target.display());
    Ok(())
}

fn cmd_describe(
    workspace: &Workspace,
    args: &DescribeArgs,
) -> error::Result<()> {
    let images = match &args.images {
        Some(path) => path.clone(),
        None => workspace.images_dir()?,
    };

    let client = OllamaClient::new(&args.ollama_url)?;
    let captioner = OllamaCaptioner::new(client.clone(), &args.caption_model);
    let completion = OllamaCompletion::new(client, &args.llm_model);
    let ocr = TesseractOcr::new();
    let options = DescribeOptions {
        expand_on_caption_failure: !args.no_expand_on_caption_failure,
    };

    let results =
        vision::describe_images(&images, &captioner, &ocr, &completion, &options)?;

    if results.is_empty() {
        println!("No images found in {}; nothing to describe.", images.display());
        return Ok(());
    }

    let out = workspace.captions_file();
    vision::save_descriptions(&out, &results)?;
    println!("Described {} images -> {}", results.len(), out.display());
    Ok(())
}

fn cmd_index(workspace: &Workspace, args: &IndexArgs) -> error::Result<()> {
    let config = ChunkingConfig::new(args.chunk_size, args.chunk_overlap)?;

    let client = OllamaClient::new(&args.ollama_url)?;
    let embedder = OllamaEmbedder::new(client, &args.embed_model);

    let units = indexer::gather_units(workspace, &config)?;
    let (texts, images, table_rows) = count_by_type(
        units.iter().map(|u| &u.metadata),
    );

    let bundle = indexer::build_bundle(units, &embedder)?;
    let out = workspace.bundle_file();
    bundle.save(&out)?;

    println!(
        "Indexed {} units ({texts} text chunks, {images} images, {table_rows} table rows) -> {}",
        bundle.len(),
        out.display()
    );
    Ok(())
}

fn cmd_ask(workspace: &Workspace, args: &AskArgs) -> error::Result<()> {
    let bundle = IndexBundle::load(&workspace.bundle_file())?;

    let client = OllamaClient::new(&args.ollama_url)?;
    let embedder = OllamaEmbedder::new(client.clone(), &args.embed_model);
    let completion = OllamaCompletion::new(client, &args.llm_model);

    let retriever = Retriever::new(&bundle, &embedder);
    let hits = retriever.retrieve(&args.question, args.top_k)?;

    if args.show_context {
        eprintln!("{}", answer::compose_context(&hits));
    }

    let text = answer::compose_answer(&args.question, &hits, &completion)?;
    println!("{text}");
    Ok(())
}

fn cmd_status(workspace: &Workspace, args: &StatusArgs) -> error::Result<()> {
    let bundle_path = workspace.bundle_file();
    let counts = if bundle_path.exists() {
        let bundle = IndexBundle::load(&bundle_path)?;
        Some(count_by_type(bundle.metadata.iter()))
    } else {
        None
    };

    let captions = {
        let path = workspace.captions_file();
        if path.exists() {
            vision::load_descriptions(&path)?.len()
        } else {
            0
        }
    };

    if args.json {
        let (texts, images, table_rows) = counts.unwrap_or((0, 0, 0));
        let status = serde_json::json!({
            "output_dir": workspace.root().display().to_string(),
            "indexed": counts.is_some(),
            "text_chunks": texts,
            "image_units": images,
            "table_rows": table_rows,
            "described_images": captions,
        });
        println!("{status}");
    } else {
        println!("Output directory: {}", workspace.root().display());
        match counts {
            Some((texts, images, table_rows)) => {
                println!(
                    "Index: {} units ({texts} text chunks, {images} images, {table_rows} table rows)",
                    texts + images + table_rows
                );
            }
            None => println!("Index: not built"),
        }
        println!("Described images: {captions}");
    }
    Ok(())
}

fn count_by_type<'a, I>(metadata: I) -> (usize, usize, usize)
where
    I: Iterator<Item = &'a UnitMetadata>,
{
    let mut texts = 0;
    let mut images = 0;
    let mut table_rows = 0;
    for meta in metadata {
        match meta {
            UnitMetadata::Text { .. } => texts += 1,
            UnitMetadata::Image { .. } => images += 1,
            UnitMetadata::Table { .. } => table_rows += 1,
        }
    }
    (texts, images, table_rows)
}
