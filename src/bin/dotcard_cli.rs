//! dotcard CLI
//!
//! Commands: json, description, embed, inspect
//! Warnings go to stderr; set RUST_LOG to change verbosity.
//! Returns 2 when the card text is invalid, 1 on any other failure.

use clap::{Parser, Subcommand};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use dotcard::{
    batch, parse_card, parse_description, read_card_image, write_card_image, Card, CardError,
    CardVersion, Diagnostics,
};

#[derive(Parser)]
#[command(name = "dotcard-cli")]
#[command(about = "dotcard CLI - compile .card files into character cards")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the card as indented JSON
    Json {
        /// .card file
        input: PathBuf,

        /// Export a legacy (V1) card
        #[arg(long)]
        v1: bool,
    },

    /// Print only the minified description
    Description {
        /// .card file
        input: PathBuf,
    },

    /// Embed the card into PNG images
    Embed {
        /// .card file, or a directory of .card files
        input: PathBuf,

        /// Output image for a file, output directory for a directory
        output: PathBuf,

        /// Export a legacy (V1) card
        #[arg(long)]
        v1: bool,

        /// Source image for a single card (default: the .png next to it)
        #[arg(short, long)]
        image: Option<PathBuf>,
    },

    /// Print the card embedded in a PNG
    Inspect {
        /// PNG image
        image: PathBuf,
    },
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .with_writer(io::stderr)
        .init();

    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Json { input, v1 } => print_json(&input, card_version(v1)),
        Commands::Description { input } => print_description(&input),
        Commands::Embed {
            input,
            output,
            v1,
            image,
        } => embed(&input, &output, card_version(v1), image),
        Commands::Inspect { image } => inspect(&image),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {}", e);
            if e.is_parse_error() {
                ExitCode::from(2)
            } else {
                ExitCode::FAILURE
            }
        }
    }
}

fn card_version(v1: bool) -> CardVersion {
    if v1 {
        CardVersion::V1
    } else {
        CardVersion::V2
    }
}

fn invalid_input(message: &str) -> CardError {
    CardError::Io(io::Error::new(io::ErrorKind::InvalidInput, message.to_string()))
}

fn load_card(path: &Path, version: CardVersion) -> Result<Card, CardError> {
    let _span = tracing::warn_span!("card", path = %path.display()).entered();

    let text = fs::read_to_string(path)?;
    let mut diag = Diagnostics::new();
    let card = parse_card(&text, version, &mut diag);
    diag.report();

    let card = card?;
    tracing::debug!(
        name = ?card.data().get("name"),
        modified = card.metadata().modified,
        "parsed card"
    );
    Ok(card)
}

fn print_json(input: &Path, version: CardVersion) -> Result<(), CardError> {
    let card = load_card(input, version)?;
    println!("{}", card.to_json_pretty()?);
    Ok(())
}

fn print_description(input: &Path) -> Result<(), CardError> {
    let text = fs::read_to_string(input)?;
    println!("{}", parse_description(&text)?);
    Ok(())
}

fn inspect(image: &Path) -> Result<(), CardError> {
    let card = read_card_image(image)?;
    println!("{}", serde_json::to_string_pretty(&card)?);
    Ok(())
}

fn embed(
    input: &Path,
    output: &Path,
    version: CardVersion,
    image: Option<PathBuf>,
) -> Result<(), CardError> {
    if input.is_dir() {
        if output.is_file() {
            return Err(invalid_input("If input is a directory, output must not be a file"));
        }
        if image.is_some() {
            return Err(invalid_input("--image only applies to a single card file"));
        }
        return embed_dir(input, output, version);
    }

    if !input.is_file() {
        return Err(invalid_input("Input must be an existing file or directory"));
    }
    if output.is_dir() {
        return Err(invalid_input("If input is a file, output must not be a directory"));
    }

    let card = load_card(input, version)?;
    let image = image.unwrap_or_else(|| batch::image_for(input));
    write_card_image(&image, output, &card)
}

/// Every card is attempted; the first failure is returned at the end.
fn embed_dir(input: &Path, output: &Path, version: CardVersion) -> Result<(), CardError> {
    let targets = batch::discover(input, output)?;
    if !targets.is_empty() {
        fs::create_dir_all(output)?;
    }

    let mut first_error = None;
    for target in targets {
        let outcome = load_card(&target.card, version).and_then(|card| {
            for pair in &target.images {
                write_card_image(&pair.source, &pair.destination, &card)?;
            }
            Ok(target.images.len())
        });

        match outcome {
            Ok(count) => {
                tracing::info!(card = %target.card.display(), images = count, "embedded card");
            }
            Err(e) => {
                eprintln!("error: {}: {}", target.card.display(), e);
                first_error.get_or_insert(e);
            }
        }
    }

    first_error.map_or(Ok(()), Err)
}
