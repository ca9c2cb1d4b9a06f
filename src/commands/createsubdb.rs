use std::path::PathBuf;

use clap::Parser;
use log::warn;

use seqclust_store::{create_sub_store, OpenMode, SortMode, StoreReader};

use crate::commands::common::parse_args;
use crate::CliError;

#[derive(Parser, Debug)]
#[clap(name = "createsubdb")]
#[clap(about = "Copy the listed entries of a database into a new sub-database", long_about = None)]
struct Args {
    /// file with one key per line (first token counts)
    id_list: PathBuf,
    /// source database
    source_db: PathBuf,
    /// output database
    out_db: PathBuf,
}

pub fn run(args: &[String]) -> Result<(), CliError> {
    let parsed: Args = parse_args("createsubdb", args);
    let text = std::fs::read_to_string(&parsed.id_list)?;
    let mut keys = Vec::new();
    for line in text.lines() {
        let Some(token) = line.split_whitespace().next() else { continue };
        match token.parse::<u32>() {
            Ok(key) => keys.push(key),
            Err(_) => warn!("Ignoring unparsable key '{}'", token),
        }
    }

    let reader = StoreReader::open(&parsed.source_db, OpenMode::DataAndIndex, SortMode::NoSort)?;
    let written = create_sub_store(&reader, &keys, &parsed.out_db)?;
    log::info!("Copied {} of {} entries", written, keys.len());
    Ok(())
}
