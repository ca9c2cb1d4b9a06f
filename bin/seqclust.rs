use std::env;
use std::process::ExitCode;

use seqclust::commands;
use seqclust::registry::{CommandEntry, CommandRegistry};

fn registry() -> CommandRegistry {
    CommandRegistry::new(vec![
        CommandEntry {
            name: "kmermatcher",
            about: "Find bottom-m-hashed k-mer matches within a sequence database",
            runner: commands::kmermatcher::run,
        },
        CommandEntry {
            name: "kmersearch",
            about: "Match a query database against a prebuilt linear k-mer index",
            runner: commands::kmersearch::run,
        },
        CommandEntry {
            name: "createlinindex",
            about: "Extract and sort the k-mers of a database into a linear index",
            runner: commands::createlinindex::run,
        },
        CommandEntry {
            name: "createsubdb",
            about: "Copy the listed entries of a database into a new sub-database",
            runner: commands::createsubdb::run,
        },
        CommandEntry {
            name: "countkmer",
            about: "Count k-mer occurrences over a whole database",
            runner: commands::countkmer::run,
        },
        CommandEntry {
            name: "rescorediagonal",
            about: "Verify prefilter hits with an ungapped rescore and banded gapped extension",
            runner: commands::rescorediagonal::run,
        },
    ])
}

fn main() -> ExitCode {
    if env::var("RUST_LOG").is_err() {
        env::set_var("RUST_LOG", "info");
    }
    env_logger::init();

    let args: Vec<String> = env::args().collect();
    let registry = registry();

    let Some(command) = args.get(1) else {
        eprintln!("Usage: seqclust <command> [options]\n\nCommands:\n{}", registry.usage());
        return ExitCode::FAILURE;
    };
    if command == "-h" || command == "--help" {
        println!("Usage: seqclust <command> [options]\n\nCommands:\n{}", registry.usage());
        return ExitCode::SUCCESS;
    }

    let Some(entry) = registry.get(command) else {
        eprintln!("ERROR: unknown command '{}'", command);
        if let Some(nearest) = registry.suggest(command) {
            eprintln!("Did you mean '{}'?", nearest.name);
        }
        return ExitCode::FAILURE;
    };

    match (entry.runner)(&args[2..]) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("ERROR: {}", err);
            ExitCode::FAILURE
        }
    }
}
