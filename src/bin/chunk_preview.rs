use std::{fmt::Write as _, fs, path::PathBuf};

use anyhow::{Context, Result};
use clap::Parser;
use docsearch::{
    ocr::parse_analysis,
    processing::chunking::{DEFAULT_CHUNK_OVERLAP, DEFAULT_CHUNK_SIZE, TextSegmenter},
};
use serde::Serialize;

#[derive(Parser)]
#[command(
    name = "chunk-preview",
    about = "Preview how extracted text is segmented before embedding"
)]
struct Cli {
    /// OCR analysis JSON (`analyzeResult.content`) or a plain-text file.
    path: PathBuf,
    /// Target chunk length in characters.
    #[arg(long, default_value_t = DEFAULT_CHUNK_SIZE)]
    chunk_size: usize,
    /// Characters shared between neighbouring chunks.
    #[arg(long, default_value_t = DEFAULT_CHUNK_OVERLAP)]
    overlap: usize,
    /// Emit chunks as JSON instead of a text listing.
    #[arg(long)]
    json: bool,
}

#[derive(Serialize)]
struct ChunkRow<'a> {
    index: usize,
    byte_offset: usize,
    chars: usize,
    text: &'a str,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let raw = fs::read_to_string(&cli.path)
        .with_context(|| format!("failed to read {}", cli.path.display()))?;
    let text = load_text(&cli.path, raw)?;

    let segmenter = TextSegmenter::new(cli.chunk_size, cli.overlap)?;
    let chunks = segmenter.split(&text);

    if cli.json {
        let rows: Vec<ChunkRow<'_>> = chunks
            .iter()
            .map(|chunk| ChunkRow {
                index: chunk.index,
                byte_offset: chunk.byte_offset,
                chars: chunk.char_len(),
                text: &chunk.text,
            })
            .collect();
        println!("{}", serde_json::to_string_pretty(&rows)?);
        return Ok(());
    }

    let mut out = String::new();
    writeln!(
        out,
        "{} chunks (chunk_size={}, overlap={}, source chars={})",
        chunks.len(),
        segmenter.chunk_size(),
        segmenter.chunk_overlap(),
        text.chars().count()
    )?;
    for chunk in &chunks {
        writeln!(
            out,
            "\n[{}] offset={} chars={}\n{}",
            chunk.index,
            chunk.byte_offset,
            chunk.char_len(),
            chunk.text
        )?;
    }
    print!("{out}");
    Ok(())
}

fn load_text(path: &std::path::Path, raw: String) -> Result<String> {
    let is_json = path
        .extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case("json"));
    if is_json {
        parse_analysis(&raw)
            .with_context(|| format!("{} is not an OCR analysis document", path.display()))
    } else {
        Ok(raw)
    }
}
