use std::path::{Component, Path, PathBuf};

use regex::Regex;

use crate::error::ArchiveError;

/// A payload to pull out of the archive into its own file.
#[derive(Debug, Clone)]
pub struct ExtractionTarget {
    pub label: String,
    pub name_suffix: String,
    pub min_size_exclusive: u64,
    pub required: bool,
    /// Leading path segment dropped from the entry name before it is reused as the
    /// output path, ie `apps/`
    pub strip_prefix: String,
}

impl ExtractionTarget {
    /// Suffix match and a size strictly over the threshold.
    pub fn matches(&self, name: &str, size: u64) -> bool {
        name.ends_with(&self.name_suffix) && size > self.min_size_exclusive
    }

    pub fn destination(&self, root: &Path, name: &str) -> Result<PathBuf, ArchiveError> {
        let relative = name.strip_prefix(&self.strip_prefix).unwrap_or(name);
        let mut out = root.to_path_buf();
        let mut pushed = false;

        for comp in Path::new(relative).components() {
            match comp {
                Component::Normal(part) => {
                    out.push(part);
                    pushed = true;
                }
                Component::CurDir => (),
                Component::ParentDir | Component::RootDir | Component::Prefix(_) => {
                    return Err(ArchiveError::UnsafePath {
                        name: name.to_string(),
                    })
                }
            }
        }

        if !pushed {
            return Err(ArchiveError::UnsafePath {
                name: name.to_string(),
            });
        }
        Ok(out)
    }
}

/// Finds the small config entry and pulls one value out of its text.
#[derive(Debug, Clone)]
pub struct ConfigProbe {
    pub name_contains: Vec<String>,
    /// First capture group is the value
    pub pattern: Regex,
}

impl ConfigProbe {
    pub fn matches(&self, name: &str) -> bool {
        self.name_contains
            .iter()
            .all(|part| name.contains(part.as_str()))
    }

    /// Lenient decode then first match wins.
    pub fn extract_field(&self, data: &[u8]) -> Option<String> {
        let text = String::from_utf8_lossy(data);
        self.pattern
            .captures(&text)
            .and_then(|caps| caps.get(1))
            .map(|m| m.as_str().to_string())
    }
}
