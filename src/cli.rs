use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

use crate::classifier::DEFAULT_WEAK_TEXT_MIN_CHARS;
use crate::export::DEFAULT_ARCHIVE_NAME;

#[derive(Parser, Debug)]
#[command(
    name = "labelsort",
    version,
    about = "Sort shipping-label PDF pages into per-state bundles"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Classify every page and write one PDF per destination state into a ZIP
    Sort(SortArgs),
    /// Show which state/ZIP candidates a piece of label text produces
    Inspect(InspectArgs),
}

#[derive(Args, Debug, Clone)]
pub struct SenderArgs {
    /// Extra sender (return address) ZIP code to ignore; repeatable
    #[arg(long = "sender-zip")]
    pub sender_zips: Vec<String>,

    /// Start from an empty sender set instead of the built-in one
    #[arg(long, default_value_t = false)]
    pub no_default_sender_zips: bool,
}

#[derive(Args, Debug, Clone)]
pub struct SortArgs {
    pub input: PathBuf,

    #[arg(long, default_value = ".")]
    pub output_dir: PathBuf,

    #[arg(long, default_value = DEFAULT_ARCHIVE_NAME)]
    pub archive_name: String,

    /// Run the OCR pass over pages the text layer could not resolve
    #[arg(long, default_value_t = false)]
    pub ocr: bool,

    #[arg(long, default_value = "eng")]
    pub ocr_lang: String,

    #[arg(long, default_value_t = 300)]
    pub dpi: u32,

    #[arg(long, default_value_t = DEFAULT_WEAK_TEXT_MIN_CHARS)]
    pub weak_text_min_chars: usize,

    #[command(flatten)]
    pub senders: SenderArgs,

    /// Classify and print the table without writing the archive or report
    #[arg(long, default_value_t = false)]
    pub dry_run: bool,

    #[arg(long, default_value_t = false)]
    pub json: bool,
}

#[derive(Args, Debug, Clone)]
pub struct InspectArgs {
    #[arg(long, conflicts_with = "file", required_unless_present = "file")]
    pub text: Option<String>,

    #[arg(long)]
    pub file: Option<PathBuf>,

    #[command(flatten)]
    pub senders: SenderArgs,

    #[arg(long, default_value_t = false)]
    pub json: bool,
}
