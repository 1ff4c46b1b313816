//! demo_mac_timeline - Produce a MAC-times timeline from a DFXML file.
//!
//! Reads a DFXML file and prints a sorted timeline of file modification,
//! access, change and creation times.
//!
//! # Usage
//!
//! ```bash
//! cargo run --example demo_mac_timeline <filename.xml>
//! ```
//!
//! # Output
//!
//! Tab-separated: timestamp, filename, event type.

use std::cmp::Ordering;
use std::env;
use std::fs::File;
use std::io::BufReader;

use dfxml_objects::objects::{TimestampName, TimestampObject};
use dfxml_objects::reader::{DFXMLReader, Event, ReaderConfig};

/// A timeline entry representing a single timestamp event.
#[derive(Debug)]
struct TimelineEntry {
    time: TimestampObject,
    filename: String,
    event_type: &'static str,
}

impl TimelineEntry {
    /// Orders by instant, then filename, then event type. Precision is
    /// ignored so the order stays total.
    fn timeline_cmp(&self, other: &Self) -> Ordering {
        self.time
            .time()
            .cmp(&other.time.time())
            .then_with(|| self.filename.cmp(&other.filename))
            .then_with(|| self.event_type.cmp(other.event_type))
    }
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args: Vec<String> = env::args().collect();

    if args.len() < 2 {
        eprintln!("Usage: {} <filename.xml>", args[0]);
        std::process::exit(1);
    }

    let file = File::open(&args[1])?;
    let reader = DFXMLReader::with_config(BufReader::new(file), ReaderConfig::files_only());

    let mut timeline: Vec<TimelineEntry> = Vec::new();

    for result in reader {
        let Event::FileObject(fi) = result? else {
            continue;
        };
        let filename = fi.filename.clone().unwrap_or_default();

        for (name, event_type) in [
            (TimestampName::Mtime, "modified"),
            (TimestampName::Crtime, "created"),
            (TimestampName::Ctime, "changed"),
            (TimestampName::Atime, "accessed"),
        ] {
            if let Some(ts) = fi.get_timestamp(name) {
                if ts.time().is_some() {
                    timeline.push(TimelineEntry {
                        time: ts.clone(),
                        filename: filename.clone(),
                        event_type,
                    });
                }
            }
        }
    }

    timeline.sort_by(TimelineEntry::timeline_cmp);

    for entry in &timeline {
        println!("{}\t{}\t{}", entry.time, entry.filename, entry.event_type);
    }

    Ok(())
}
