use anyhow::Context;
use clap::Parser;
use console::style;
use doc_rag::config::Config;
use doc_rag::pipeline::{Pipeline, SessionEnd};
use std::io;
use std::process::ExitCode;
use tracing::{error, info};

#[derive(Parser)]
#[command(name = "doc-rag")]
#[command(about = "Ask questions about a local document using Gemini and Qdrant")]
#[command(
    long_about = "Indexes document.txt into a Qdrant collection, then answers questions \
                  typed at the prompt. Type 'exit' to quit.\n\n\
                  Requires GEMINI_API_KEY, QDRANT_API_KEY, QDRANT_URL and QDRANT_COLLECTION."
)]
#[command(version)]
struct Cli {}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(io::stderr)
        .init();

    let _cli = Cli::parse();

    match run() {
        Ok(end) => {
            info!("Session ended ({:?})", end);
            ExitCode::SUCCESS
        }
        Err(e) => {
            error!("{:#}", e);
            eprintln!("{} {:#}", style("Fatal:").red().bold(), e);
            ExitCode::FAILURE
        }
    }
}

fn run() -> anyhow::Result<SessionEnd> {
    let config = Config::load().context("Failed to load configuration")?;
    let pipeline = Pipeline::new(&config).context("Failed to initialize clients")?;

    let report = pipeline.startup().context("Failed to index document")?;
    eprintln!(
        "{} {} chunks from {} into '{}'",
        style("Indexed").green(),
        report.chunks,
        config.retrieval.document_path.display(),
        config.qdrant.collection
    );

    let stdin = io::stdin().lock();
    let mut stdout = io::stdout().lock();
    let end = pipeline.run_session(stdin, &mut stdout)?;

    Ok(end)
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::error::ErrorKind;

    #[test]
    fn cli_parsing_without_arguments() {
        let cli = Cli::try_parse_from(["doc-rag"]);
        assert!(cli.is_ok());
    }

    #[test]
    fn unexpected_argument_rejected() {
        let cli = Cli::try_parse_from(["doc-rag", "serve"]);
        assert!(cli.is_err());

        if let Err(err) = cli {
            assert_eq!(err.kind(), ErrorKind::UnknownArgument);
        }
    }

    #[test]
    fn help_message() {
        let cli = Cli::try_parse_from(["doc-rag", "--help"]);
        assert!(cli.is_err());

        if let Err(err) = cli {
            assert_eq!(err.kind(), ErrorKind::DisplayHelp);
        }
    }

    #[test]
    fn version_flag() {
        let cli = Cli::try_parse_from(["doc-rag", "--version"]);

        if let Err(err) = cli {
            assert_eq!(err.kind(), ErrorKind::DisplayVersion);
        } else {
            panic!("--version should short-circuit parsing");
        }
    }
}
