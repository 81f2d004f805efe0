use std::fs;
use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand};
use regex::Regex;
use serde::Deserialize;

use rarc::{ConfigProbe, ExtractionTarget, Search};

use crate::error::Error;

#[derive(Parser)]
#[command(name = "wxback")]
#[command(about = "Pull the WeChat databases out of an Android backup and decrypt them")]
#[command(author, version, long_about = None)]
pub struct Cli {
    /// Sets a custom config file
    #[arg(short, long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Extract the databases and the account identifier from a backup
    Extract {
        /// Backup file, or the directory holding it
        #[arg(short, long)]
        backup: PathBuf,

        #[arg(short, long, default_value = "./output")]
        output: PathBuf,
    },

    /// Decrypt an already extracted database
    Decrypt {
        /// The encrypted database
        #[arg(short, long)]
        db: PathBuf,

        /// Account identifier (default_uin)
        #[arg(short, long, allow_hyphen_values = true)]
        uin: String,

        /// Extra device tokens to try before the defaults
        #[arg(long)]
        imei: Vec<String>,

        /// Defaults to <db>_decrypted.db
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Extract then decrypt in one go
    Run {
        #[arg(short, long)]
        backup: PathBuf,

        #[arg(short, long, default_value = "./output")]
        output: PathBuf,

        #[arg(long)]
        imei: Vec<String>,
    },

    /// List the entries of a backup
    List {
        #[arg(short, long)]
        backup: PathBuf,

        /// Only show entries containing this
        #[arg(short, long)]
        pattern: Option<String>,

        #[arg(short, long, default_value_t = 100)]
        limit: usize,
    },

    /// Print the password candidates for an identifier
    Password {
        #[arg(short, long, allow_hyphen_values = true)]
        uin: String,

        #[arg(long)]
        imei: Vec<String>,
    },
}

// Default layout of a WeChat install inside a vivo/Android backup
pub const DEFAULT_CONFIG: &str = r#"
[scan]
min_backup_size = 104857600
strip_prefix = "apps/"
await_optional = true
progress_every = 50000

[[targets]]
label = "EnMicroMsg"
suffix = "EnMicroMsg.db"
min_size = 104857600
required = true

[[targets]]
label = "SnsMicroMsg"
suffix = "SnsMicroMsg.db"
min_size = 1048576

[probe]
name_contains = ["system_config_prefs.xml", "MicroMsg"]
pattern = '''default_uin(?:["\s]+value)?="(-?\d+)"'''

[decrypt]
target = "EnMicroMsg"
output_name = "EnMicroMsg_decrypted.db"
device_tokens = ["1234567890ABCDEF", "1234567890abcdef"]
"#;

#[derive(Deserialize, Debug)]
pub struct Config {
    pub scan: Scan,
    pub targets: Vec<Target>,
    pub probe: Probe,
    pub decrypt: Decrypt,
}

#[derive(Deserialize, Debug)]
pub struct Scan {
    /// Smallest file considered when looking for the backup in a directory
    pub min_backup_size: u64,
    #[serde(default)]
    pub strip_prefix: String,
    #[serde(default)]
    pub await_optional: bool,
    #[serde(default = "default_progress")]
    pub progress_every: u64,
}

fn default_progress() -> u64 {
    rarc::search::PROGRESS_EVERY
}

#[derive(Deserialize, Debug)]
pub struct Target {
    pub label: String,
    pub suffix: String,
    /// Entries must be strictly larger than this
    pub min_size: u64,
    #[serde(default)]
    pub required: bool,
}

#[derive(Deserialize, Debug)]
pub struct Probe {
    pub name_contains: Vec<String>,
    pub pattern: String,
}

#[derive(Deserialize, Debug)]
pub struct Decrypt {
    /// Label of the target holding the encrypted database
    pub target: String,
    pub output_name: String,
    pub device_tokens: Vec<String>,
}

impl Config {
    pub fn load(path: Option<&Path>) -> Result<Config, Error> {
        let config = match path {
            None => toml::from_str(DEFAULT_CONFIG)?,
            Some(p) => {
                let text = fs::read_to_string(p).map_err(Error::at(p))?;
                toml::from_str(&text)?
            }
        };
        Ok(config)
    }

    pub fn search(&self, output: &Path) -> Result<Search, Error> {
        let targets = self
            .targets
            .iter()
            .map(|t| ExtractionTarget {
                label: t.label.clone(),
                name_suffix: t.suffix.clone(),
                min_size_exclusive: t.min_size,
                required: t.required,
                strip_prefix: self.scan.strip_prefix.clone(),
            })
            .collect();

        let probe = ConfigProbe {
            name_contains: self.probe.name_contains.clone(),
            pattern: Regex::new(&self.probe.pattern)?,
        };

        let mut search = Search::new(output.to_path_buf(), targets, Some(probe));
        search.await_optional = self.scan.await_optional;
        search.progress_every = self.scan.progress_every;
        Ok(search)
    }
}
