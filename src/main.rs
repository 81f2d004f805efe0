use std::error::Error as StdError;
use std::process::ExitCode;

use clap::Parser;
use log::error;

mod cli;
use crate::cli::Cli;
use crate::cli::Commands;
use crate::cli::Config;

mod decrypt;
mod error;
mod key;
mod locate;
mod pipeline;
mod sql;

use crate::error::Error;

fn main() -> ExitCode {
    let env = env_logger::Env::default().default_filter_or("info");
    env_logger::Builder::from_env(env).init();

    // Parse the cli
    let cli = Cli::parse();

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{}", e);
            let mut source = e.source();
            while let Some(s) = source {
                error!("  caused by: {}", s);
                source = s.source();
            }
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> Result<(), Error> {
    let config = Config::load(cli.config.as_deref())?;

    match &cli.command {
        Commands::Extract { backup, output } => {
            let extraction = pipeline::extract(&config, backup, output)?;

            println!(
                "Backup: {} (version {})",
                extraction.backup.display(),
                extraction.header.version
            );
            println!("Database: {}", extraction.primary(&config)?.display());
            for (label, path) in extraction.secondary(&config) {
                println!("{}: {}", label, path.display());
            }
            match &extraction.report.identifier {
                Some(uin) => println!("UIN: {}", uin),
                None => println!("UIN: not found"),
            }
            println!(
                "Scanned {} entries in {:.1?}",
                extraction.report.scanned, extraction.report.elapsed
            );
        }
        Commands::Decrypt {
            db,
            uin,
            imei,
            output,
        } => {
            let output = output
                .clone()
                .unwrap_or_else(|| decrypt::default_output(db));
            let decrypted = pipeline::decrypt(&config, db, uin, imei, &output)?;

            for attempt in decrypted.attempts.iter() {
                println!(
                    "  {} (token {}): {:?}",
                    attempt.candidate.password, attempt.candidate.device_token, attempt.outcome
                );
            }
            println!("Decrypted: {}", decrypted.path.display());
            println!(
                "Password: {} (token {})",
                decrypted.candidate.password, decrypted.candidate.device_token
            );
        }
        Commands::Run {
            backup,
            output,
            imei,
        } => {
            let (extraction, decrypted) = pipeline::run(&config, backup, output, imei)?;

            println!("UIN: {}", decrypted.candidate.identifier);
            println!("Decrypted: {}", decrypted.path.display());
            for (label, path) in extraction.secondary(&config) {
                println!("{}: {}", label, path.display());
            }
        }
        Commands::List {
            backup,
            pattern,
            limit,
        } => {
            let entries = pipeline::list(&config, backup, pattern.as_deref(), *limit)?;

            println!("Backup contents:");
            for (name, size) in entries.iter() {
                println!("  {} ({} bytes)", name, size);
            }
            if entries.len() == *limit {
                println!("  ... more entries may follow");
            }
        }
        Commands::Password { uin, imei } => {
            for (idx, c) in key::candidates(uin, imei, &config.decrypt.device_tokens)
                .iter()
                .enumerate()
            {
                println!("{}: {} (token {})", idx + 1, c.password, c.device_token);
            }
        }
    }

    Ok(())
}
