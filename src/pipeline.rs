use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};

use log::{info, warn};

use rarc::{ArchiveError, BackupHeader, Container, SearchReport, TargetOutcome};
use rcore::buf::COPY_BUF_SIZE;

use crate::cli::Config;
use crate::decrypt::{Decrypted, Decryptor};
use crate::error::Error;
use crate::key::candidates;
use crate::locate::find_backup;
use crate::sql::SqlCipher;

pub struct Extraction {
    pub backup: PathBuf,
    pub header: BackupHeader,
    pub report: SearchReport,
}

impl Extraction {
    /// Path of the extracted encrypted database
    pub fn primary(&self, config: &Config) -> Result<&Path, Error> {
        self.report
            .found(&config.decrypt.target)
            .map(|e| e.path.as_path())
            .ok_or_else(|| {
                ArchiveError::TargetNotFound {
                    target: config.decrypt.target.clone(),
                    scanned: self.report.scanned,
                }
                .into()
            })
    }

    /// Everything else that was pulled out
    pub fn secondary(&self, config: &Config) -> Vec<(&str, &Path)> {
        self.report
            .targets
            .iter()
            .filter(|t| t.label != config.decrypt.target)
            .filter_map(|t| match &t.outcome {
                TargetOutcome::Found { extracted, .. } => {
                    Some((t.label.as_str(), extracted.path.as_path()))
                }
                _ => None,
            })
            .collect()
    }
}

fn open_backup(path: &Path) -> Result<Container<BufReader<File>>, Error> {
    let file = File::open(path).map_err(Error::at(path))?;
    let len = file.metadata().map_err(Error::at(path))?.len();
    info!(
        "Backup file: {} ({:.2} GB)",
        path.display(),
        len as f64 / 1024.0 / 1024.0 / 1024.0
    );

    let container = Container::open(BufReader::with_capacity(COPY_BUF_SIZE, file))?;
    let header = container.header();
    info!(
        "Backup version {}, compressed: {}, encryption: {}",
        header.version, header.compressed, header.encryption
    );
    Ok(container)
}

pub fn extract(config: &Config, backup: &Path, output: &Path) -> Result<Extraction, Error> {
    let backup = find_backup(backup, config.scan.min_backup_size)?;
    let container = open_backup(&backup)?;
    let header = container.header().clone();

    info!("Scanning backup contents...");
    let search = config.search(output)?;
    let report = search.run(&mut container.into_scanner())?;

    for target in report.targets.iter() {
        match &target.outcome {
            TargetOutcome::Found { .. } => (),
            TargetOutcome::NotSeen => info!("{} not present in backup", target.label),
            TargetOutcome::Failed { entry, message } => warn!(
                "{} ({}) could not be extracted: {}",
                target.label, entry, message
            ),
        }
    }

    Ok(Extraction {
        backup,
        header,
        report,
    })
}

pub fn decrypt(
    config: &Config,
    db: &Path,
    uin: &str,
    extra_tokens: &[String],
    output: &Path,
) -> Result<Decrypted, Error> {
    let list = candidates(uin, extra_tokens, &config.decrypt.device_tokens);
    Decryptor::new(&SqlCipher).decrypt(db, list, output)
}

/// Extract, then decrypt the primary database into `output`.
pub fn run(
    config: &Config,
    backup: &Path,
    output: &Path,
    extra_tokens: &[String],
) -> Result<(Extraction, Decrypted), Error> {
    let extraction = extract(config, backup, output)?;

    let uin = extraction
        .report
        .identifier
        .clone()
        .ok_or(Error::MissingIdentifier {
            scanned: extraction.report.scanned,
        })?;
    let db = extraction.primary(config)?.to_path_buf();

    info!("Decrypting {}...", db.display());
    let decrypted = decrypt(
        config,
        &db,
        &uin,
        extra_tokens,
        &output.join(&config.decrypt.output_name),
    )?;

    Ok((extraction, decrypted))
}

/// Entries whose name contains `pattern`, at most `limit` of them.
pub fn list(
    config: &Config,
    backup: &Path,
    pattern: Option<&str>,
    limit: usize,
) -> Result<Vec<(String, u64)>, Error> {
    let backup = find_backup(backup, config.scan.min_backup_size)?;
    let mut scanner = open_backup(&backup)?.into_scanner();
    let mut entries = scanner.entries()?;
    let mut out = Vec::new();

    while out.len() < limit {
        let entry = match entries.next_entry() {
            Some(entry) => entry?,
            None => break,
        };

        if pattern.map_or(true, |p| entry.name().contains(p)) {
            out.push((entry.name().to_string(), entry.size()));
        }
    }
    entries.stop_early();

    Ok(out)
}
