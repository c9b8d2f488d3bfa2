mod commands;

use clap::Parser;
use commands::Cli;
use deleter::{DeleterError, UsageError};

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    if let Err(e) = cli.run().await {
        eprintln!("Error: {e}");
        for cause in e.chain().skip(1) {
            eprintln!("  caused by: {cause}");
        }
        let usage = e.downcast_ref::<UsageError>().is_some()
            || e
                .downcast_ref::<DeleterError>()
                .is_some_and(DeleterError::is_usage);
        std::process::exit(if usage { 2 } else { 1 });
    }
}
