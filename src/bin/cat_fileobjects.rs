//! cat_fileobjects - Extract fileobjects from a DFXML file.
//!
//! This tool reads a DFXML file, or the output of a running DFXML producer,
//! and writes a new DFXML document containing only the fileobjects of the
//! input.
//!
//! # Usage
//!
//! ```bash
//! cat_fileobjects [OPTIONS] <FILENAME>
//! cat_fileobjects [OPTIONS] --exec <COMMAND>...
//! ```
//!
//! # Examples
//!
//! ```bash
//! # Extract all fileobjects from a DFXML file
//! cat_fileobjects input.dfxml > output.dfxml
//!
//! # Read straight from a producer
//! cat_fileobjects --exec fiwalk -X /dev/stdout disk.raw > output.dfxml
//!
//! # Enable debug logging
//! RUST_LOG=debug cat_fileobjects input.dfxml > output.dfxml
//! ```

use std::fs::File;
use std::io::{self, BufReader, BufWriter};

use clap::Parser;
use tracing_subscriber::EnvFilter;

use dfxml_objects::objects::{DFXMLObject, FileObject};
use dfxml_objects::reader::{DFXMLReader, Event, ProcessReader, ReaderConfig};
use dfxml_objects::writer::{StreamWriter, WriterConfig};

const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Extract fileobjects from a DFXML file.
#[derive(Parser, Debug)]
#[command(name = "cat_fileobjects")]
#[command(version = VERSION)]
#[command(about = "Extract fileobjects from a DFXML file")]
struct Args {
    /// Input DFXML file to process
    #[arg(required_unless_present = "exec", conflicts_with = "exec")]
    filename: Option<String>,

    /// Run a DFXML producer and read its standard output
    #[arg(long, num_args = 1.., value_name = "COMMAND", allow_hyphen_values = true)]
    exec: Option<Vec<String>>,

    /// Cache all fileobjects before printing
    #[arg(long)]
    cache: bool,

    /// Log debug output to stderr (overridden by RUST_LOG)
    #[arg(long)]
    debug: bool,

    /// Output compact XML (no indentation)
    #[arg(long)]
    compact: bool,
}

/// Builds the header of the output document.
fn output_header(source: &str, command_line: String) -> DFXMLObject {
    let mut doc = DFXMLObject::new();
    doc.program = Some("cat_fileobjects".to_string());
    doc.program_version = Some(VERSION.to_string());
    doc.command_line = Some(command_line);
    doc.sources.push(source.to_string());
    doc
}

type Events = Box<dyn Iterator<Item = dfxml_objects::Result<Event>>>;

fn open_input(args: &Args) -> Result<Events, Box<dyn std::error::Error>> {
    let config = ReaderConfig::files_only();
    if let Some(ref command) = args.exec {
        let (program, rest) = command
            .split_first()
            .ok_or("--exec needs a command")?;
        let mut cmd = std::process::Command::new(program);
        cmd.args(rest);
        return Ok(Box::new(ProcessReader::from_command(cmd, config)?));
    }
    let filename = args.filename.as_deref().ok_or("no input file")?;
    let file = File::open(filename)?;
    Ok(Box::new(DFXMLReader::with_config(BufReader::new(file), config)))
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    let default_level = if args.debug { "debug" } else { "warn" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .with_writer(io::stderr)
        .init();

    let source = match (&args.exec, &args.filename) {
        (Some(command), _) => command.join(" "),
        (None, Some(filename)) => filename.clone(),
        (None, None) => String::new(),
    };
    let header = output_header(&source, std::env::args().collect::<Vec<_>>().join(" "));
    tracing::debug!(source = %source, cache = args.cache, "Processing");

    let config = if args.compact {
        WriterConfig::compact()
    } else {
        WriterConfig::default()
    };
    let stdout = io::stdout();
    let mut out = StreamWriter::with_config(BufWriter::new(stdout.lock()), config);
    out.begin(&header)?;

    let events = open_input(&args)?;
    let mut cached: Vec<FileObject> = Vec::new();
    for result in events {
        match result {
            Ok(Event::FileObject(file)) => {
                tracing::debug!(filename = ?file.filename, "Read fileobject");
                if args.cache {
                    cached.push(file);
                } else {
                    out.write_file(&file)?;
                }
            }
            Ok(_) => {}
            Err(e) => {
                tracing::error!(error = %e, "Error parsing DFXML");
                return Err(e.into());
            }
        }
    }

    for file in &cached {
        out.write_file(file)?;
    }
    out.finish(&header)?;

    Ok(())
}
