// Pipeline module
// Indexes the document at startup, then answers questions in a request/response loop


use console::style;
use indicatif::{ProgressBar, ProgressStyle};
use std::fs;
use std::io::{BufRead, Write};
use std::path::Path;
use tracing::{debug, info, warn};

use crate::config::{Config, RetrievalConfig};
use crate::database::{Distance, IndexedPoint, VectorStoreClient, build_context};
use crate::embeddings::{EmbeddingClient, chunk_text};
use crate::generation::{Answer, AnswerGenerator};
use crate::{RagError, Result};

/// Number of chunks retrieved per question
pub const DEFAULT_TOP_K: usize = 3;
pub const PROMPT: &str = "You: ";
pub const EXIT_COMMAND: &str = "exit";

/// Outcome of indexing the document
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IndexReport {
    pub chunks: usize,
    pub collection_created: bool,
}

/// One answered question. Never persisted.
#[derive(Debug, Clone, PartialEq)]
pub struct Turn {
    pub query: String,
    pub context: String,
    pub answer: Answer,
}

/// Why an interactive session ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionEnd {
    ExitCommand,
    EndOfInput,
}

#[derive(Debug, PartialEq, Eq)]
enum Command<'a> {
    Empty,
    Exit,
    Query(&'a str),
}

fn parse_input(line: &str) -> Command<'_> {
    let trimmed = line.trim();
    if trimmed.is_empty() {
        Command::Empty
    } else if trimmed.eq_ignore_ascii_case(EXIT_COMMAND) {
        Command::Exit
    } else {
        Command::Query(trimmed)
    }
}

pub struct Pipeline {
    embedder: EmbeddingClient,
    store: VectorStoreClient,
    generator: AnswerGenerator,
    retrieval: RetrievalConfig,
    dimension: usize,
}

impl Pipeline {
    #[inline]
    pub fn new(config: &Config) -> Result<Self> {
        Ok(Self {
            embedder: EmbeddingClient::new(&config.gemini)?,
            store: VectorStoreClient::new(&config.qdrant)?,
            generator: AnswerGenerator::new(&config.gemini)?,
            retrieval: config.retrieval.clone(),
            dimension: config.qdrant.dimension,
        })
    }

    /// Health check, then index the configured document. Any failure is fatal.
    #[inline]
    pub fn startup(&self) -> Result<IndexReport> {
        info!(
            "Using embedding model {} and generation model {}",
            self.embedder.model(),
            self.generator.model()
        );
        self.generator.health_check()?;
        self.index_file(&self.retrieval.document_path)
    }

    #[inline]
    pub fn index_file(&self, path: &Path) -> Result<IndexReport> {
        info!("Loading document from {}", path.display());

        let text = fs::read_to_string(path).map_err(|e| {
            RagError::Io(std::io::Error::new(
                e.kind(),
                format!("Failed to read document {}: {}", path.display(), e),
            ))
        })?;

        self.index_document(&text)
    }

    /// Chunk, embed and upsert `text`. Every run re-indexes the whole document.
    #[inline]
    pub fn index_document(&self, text: &str) -> Result<IndexReport> {
        let chunks = chunk_text(text, self.retrieval.chunk_size)?;
        if chunks.is_empty() {
            warn!("Document is empty, nothing will be retrievable");
        }

        let collection_created = self
            .store
            .ensure_collection(self.dimension, Distance::Cosine)?;

        let texts: Vec<&str> = chunks.iter().map(|c| c.text.as_str()).collect();
        let progress = embedding_progress(texts.len());
        let vectors = self.embedder.embed_each(&texts, |_| progress.inc(1));
        progress.finish_and_clear();
        let vectors = vectors?;

        let points = chunks
            .into_iter()
            .zip(vectors)
            .map(|(chunk, vector)| -> Result<IndexedPoint> {
                check_dimension(&vector, self.dimension)
                    .map_err(|e| e.context(format!("Chunk {}", chunk.id)))?;
                Ok(IndexedPoint::new(chunk.id, vector, chunk.text))
            })
            .collect::<Result<Vec<_>>>()?;

        self.store.upsert(&points)?;

        let report = IndexReport {
            chunks: points.len(),
            collection_created,
        };
        info!(
            "Indexed {} chunks into '{}'",
            report.chunks,
            self.store.collection()
        );
        Ok(report)
    }

    /// Retrieve context for `query` and generate an answer.
    ///
    /// Embedding and search failures are returned; generation failures are
    /// folded into [`Answer::Unavailable`].
    #[inline]
    pub fn ask(&self, query: &str) -> Result<Turn> {
        debug!("Answering query: {}", query);

        let vector = self.embedder.embed_one(query)?;
        check_dimension(&vector, self.dimension)?;

        let hits = self.store.search(&vector, self.retrieval.top_k)?;
        let context = build_context(&hits);
        let answer = self.generator.generate(query, &context);

        Ok(Turn {
            query: query.to_string(),
            context,
            answer,
        })
    }

    /// Read questions from `input` and write answers to `output` until `exit` or end of input
    #[inline]
    pub fn run_session<R, W>(&self, mut input: R, output: &mut W) -> Result<SessionEnd>
    where
        R: BufRead,
        W: Write,
    {
        let mut buffer = Vec::new();

        loop {
            write!(output, "{}", PROMPT)?;
            output.flush()?;

            buffer.clear();
            if input.read_until(b'\n', &mut buffer)? == 0 {
                writeln!(output)?;
                info!("Input closed, ending session");
                return Ok(SessionEnd::EndOfInput);
            }

            // Invalid UTF-8 is replaced rather than rejected
            let line = String::from_utf8_lossy(&buffer);
            match parse_input(&line) {
                Command::Empty => {}
                Command::Exit => {
                    info!("Exit requested, ending session");
                    return Ok(SessionEnd::ExitCommand);
                }
                Command::Query(query) => match self.ask(query) {
                    Ok(turn) => {
                        writeln!(
                            output,
                            "{} {}\n",
                            style("Assistant:").cyan().bold(),
                            turn.answer.display_text()
                        )?;
                    }
                    Err(e) => {
                        warn!("Retrieval failed: {}", e);
                        writeln!(output, "{} {}\n", style("Error:").red().bold(), e)?;
                    }
                },
            }
        }
    }
}

fn check_dimension(vector: &[f32], expected: usize) -> Result<()> {
    if vector.len() == expected {
        Ok(())
    } else {
        Err(RagError::Protocol(format!(
            "embedding has {} dimensions, collection expects {}",
            vector.len(),
            expected
        )))
    }
}

fn embedding_progress(total: usize) -> ProgressBar {
    let progress = ProgressBar::new(total as u64);
    let progress_style =
        ProgressStyle::with_template("{spinner} Embedding chunks [{bar:40}] {pos}/{len} ({eta})")
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("=> ");
    progress.set_style(progress_style);
    progress
}
