//! The scan loop tying the scanner, the matchers and the extractor together.
//!
//! Entries are visited until every target is settled and the config value is known, or
//! the archive runs out. On a multi gigabyte container the targets are usually found well
//! before the end so the scan stops the moment the last one is satisfied.
use std::io::Read;
use std::path::PathBuf;
use std::time::{Duration, Instant};

use log::{debug, info, warn};

use rcore::buf::read_capped;

use crate::error::ArchiveError;
use crate::extract::{extract_to, Extracted};
use crate::scanner::{ArchiveEntry, Scanner};
use crate::target::{ConfigProbe, ExtractionTarget};

pub const PROGRESS_EVERY: u64 = 50_000;

// Config entries are tiny, anything past this is not the file we want
pub const PROBE_LIMIT: u64 = 4 * 1024 * 1024;

pub struct Search {
    pub output: PathBuf,
    pub targets: Vec<ExtractionTarget>,
    pub probe: Option<ConfigProbe>,
    /// Keep scanning for optional targets after the required ones are in
    pub await_optional: bool,
    pub progress_every: u64,
    /// Config entries larger than this are not probed
    pub probe_limit: u64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TargetOutcome {
    NotSeen,
    Found { entry: String, extracted: Extracted },
    Failed { entry: String, message: String },
}

#[derive(Debug)]
pub struct TargetReport {
    pub label: String,
    pub required: bool,
    pub outcome: TargetOutcome,
}

#[derive(Debug)]
pub struct SearchReport {
    pub targets: Vec<TargetReport>,
    pub identifier: Option<String>,
    pub scanned: u64,
    pub elapsed: Duration,
    pub stopped_early: bool,
}

impl SearchReport {
    pub fn found(&self, label: &str) -> Option<&Extracted> {
        self.targets
            .iter()
            .filter(|t| t.label == label)
            .find_map(|t| match &t.outcome {
                TargetOutcome::Found { extracted, .. } => Some(extracted),
                _ => None,
            })
    }
}

impl Search {
    pub fn new(
        output: PathBuf,
        targets: Vec<ExtractionTarget>,
        probe: Option<ConfigProbe>,
    ) -> Self {
        Search {
            output,
            targets,
            probe,
            await_optional: false,
            progress_every: PROGRESS_EVERY,
            probe_limit: PROBE_LIMIT,
        }
    }

    pub fn run<R: Read>(&self, scanner: &mut Scanner<R>) -> Result<SearchReport, ArchiveError> {
        let start = Instant::now();
        let mut outcomes = vec![TargetOutcome::NotSeen; self.targets.len()];
        let mut identifier = None;
        let mut stopped_early = false;

        let mut entries = scanner.entries()?;
        while let Some(entry) = entries.next_entry() {
            {
                let mut entry = entry?;
                let count = entry.index() + 1;
                if self.progress_every > 0 && count % self.progress_every == 0 {
                    info!("Scanned {} entries...", count);
                }

                if entry.is_file() {
                    self.visit(&mut entry, &mut outcomes, &mut identifier)?;
                }
            }

            if self.is_done(&outcomes, &identifier) {
                debug!("All targets settled, stopping scan");
                entries.stop_early();
                stopped_early = true;
            }
        }
        let scanned = entries.scanned();

        info!(
            "Scan finished: {} entries in {:.1?}{}",
            scanned,
            start.elapsed(),
            if stopped_early { ", stopped early" } else { "" }
        );

        for (target, outcome) in self.targets.iter().zip(&outcomes) {
            if target.required && !matches!(outcome, TargetOutcome::Found { .. }) {
                return Err(ArchiveError::TargetNotFound {
                    target: target.label.clone(),
                    scanned,
                });
            }
        }

        Ok(SearchReport {
            targets: self
                .targets
                .iter()
                .zip(outcomes)
                .map(|(t, outcome)| TargetReport {
                    label: t.label.clone(),
                    required: t.required,
                    outcome,
                })
                .collect(),
            identifier,
            scanned,
            elapsed: start.elapsed(),
            stopped_early,
        })
    }

    fn visit<R: Read>(
        &self,
        entry: &mut ArchiveEntry<'_, '_, R>,
        outcomes: &mut [TargetOutcome],
        identifier: &mut Option<String>,
    ) -> Result<(), ArchiveError> {
        let name = entry.name().to_string();

        for (target, outcome) in self.targets.iter().zip(outcomes.iter_mut()) {
            // Satisfied targets stay satisfied
            if matches!(outcome, TargetOutcome::Found { .. }) {
                continue;
            }
            if !target.matches(&name, entry.size()) {
                continue;
            }

            info!(
                "Found {}: {} ({} MB)",
                target.label,
                name,
                entry.size() / 1024 / 1024
            );
            let result = target
                .destination(&self.output, &name)
                .and_then(|dest| extract_to(&mut *entry, &dest));

            *outcome = match result {
                Ok(extracted) => {
                    info!("Extracted {} to {}", target.label, extracted.path.display());
                    TargetOutcome::Found {
                        entry: name,
                        extracted,
                    }
                }
                Err(e) if target.required => return Err(e),
                Err(e) => {
                    warn!(
                        "Could not extract optional {} from {}: {}",
                        target.label, name, e
                    );
                    TargetOutcome::Failed {
                        entry: name,
                        message: e.to_string(),
                    }
                }
            };

            // The payload is spent
            return Ok(());
        }

        if let Some(probe) = &self.probe {
            if identifier.is_none() && probe.matches(&name) {
                if entry.size() > self.probe_limit {
                    warn!(
                        "Skipping {} ({} bytes), too large for a config entry",
                        name,
                        entry.size()
                    );
                    return Ok(());
                }

                let data =
                    read_capped(entry, self.probe_limit).map_err(|source| ArchiveError::Entry {
                        index: entry.index(),
                        offset: entry.offset(),
                        source,
                    })?;

                match probe.extract_field(&data) {
                    Some(value) => {
                        info!("Found identifier {} in {}", value, name);
                        *identifier = Some(value);
                    }
                    None => debug!("No identifier in {}", name),
                }
            }
        }
        Ok(())
    }

    fn is_done(&self, outcomes: &[TargetOutcome], identifier: &Option<String>) -> bool {
        let targets_done = self
            .targets
            .iter()
            .zip(outcomes)
            .all(|(t, outcome)| match outcome {
                TargetOutcome::Found { .. } => true,
                TargetOutcome::Failed { .. } => !t.required,
                TargetOutcome::NotSeen => !t.required && !self.await_optional,
            });

        targets_done && (self.probe.is_none() || identifier.is_some())
    }
}
