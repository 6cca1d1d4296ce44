use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context};
use log::{debug, info};
use rayon::iter::{IndexedParallelIterator, IntoParallelRefIterator, ParallelIterator};
use serde::Deserialize;
use simtools::gtc::{GtcFile, GtcSections};

/// One entry of a JSON sample list.
#[derive(Debug, Deserialize)]
struct JsonSample {
    uri: String,
    result: PathBuf,
}

#[derive(Debug, Clone, Eq, PartialEq)]
pub(crate) struct SampleEntry {
    /// Sample name overriding the one stored in the GTC file.
    pub name: Option<String>,
    pub path: PathBuf,
}

/// GTC files to process, read from either a JSON array of `{"uri", "result"}`
/// objects or a whitespace-separated list of paths.
#[derive(Debug, Clone)]
pub(crate) struct SampleList {
    entries: Vec<SampleEntry>,
}

impl SampleList {
    pub fn open(path: &Path) -> anyhow::Result<Self> {
        let data = fs::read_to_string(path)
            .with_context(|| format!("Could not read the sample list {}", path.display()))?;
        let is_json = path.extension().map_or(false, |ext| ext == "json");

        let list = Self::parse(&data, is_json)
            .with_context(|| format!("Invalid sample list {}", path.display()))?;
        info!("Sample list {}: {} GTC files", path.display(), list.len());
        Ok(list)
    }

    fn parse(data: &str, is_json: bool) -> anyhow::Result<Self> {
        let entries: Vec<SampleEntry> = if is_json {
            let samples: Vec<JsonSample> = serde_json::from_str(data)?;
            samples
                .into_iter()
                .map(|sample| SampleEntry {
                    name: Some(sample.uri),
                    path: sample.result,
                })
                .collect()
        } else {
            data.split_whitespace()
                .map(|path| SampleEntry {
                    name: None,
                    path: PathBuf::from(path),
                })
                .collect()
        };

        if entries.is_empty() {
            bail!("No GTC files are specified");
        }
        Ok(Self { entries })
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &SampleEntry> + '_ {
        self.entries.iter()
    }

    /// Checks in parallel that every listed file is a readable GTC file.
    pub fn validate(&self) -> anyhow::Result<()> {
        self.entries.par_iter().enumerate().try_for_each(|(i, entry)| {
            GtcFile::open(&entry.path, GtcSections::NONE).with_context(|| {
                format!(
                    "Sample #{} ({}) is not a valid GTC file",
                    i + 1,
                    entry.path.display()
                )
            })?;
            debug!("Validated {}", entry.path.display());
            anyhow::Ok(())
        })
    }
}

impl SampleEntry {
    /// Name from the sample list, or the name stored in the GTC file.
    pub fn sample_name<'a>(&'a self, gtc: &'a GtcFile) -> &'a str {
        self.name.as_deref().unwrap_or_else(|| gtc.sample_name())
    }
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use crate::sample_list::{SampleEntry, SampleList};

    #[test]
    fn test_plain_list() {
        let list = SampleList::parse("a.gtc\nb.gtc  c.gtc\n", false).unwrap();

        let paths: Vec<_> = list.iter().map(|entry| entry.path.clone()).collect();
        assert_eq!(
            paths,
            [
                PathBuf::from("a.gtc"),
                PathBuf::from("b.gtc"),
                PathBuf::from("c.gtc")
            ]
        );
        assert!(list.iter().all(|entry| entry.name.is_none()));
    }

    #[test]
    fn test_json_list() {
        let data = r#"[
            {"uri": "urn:sample:1", "result": "/data/1.gtc"},
            {"uri": "urn:sample:2", "result": "/data/2.gtc", "extra": true}
        ]"#;
        let list = SampleList::parse(data, true).unwrap();

        assert_eq!(list.len(), 2);
        assert_eq!(
            list.iter().next().unwrap(),
            &SampleEntry {
                name: Some("urn:sample:1".to_owned()),
                path: PathBuf::from("/data/1.gtc"),
            }
        );
    }

    #[test]
    fn test_empty_list() {
        assert!(SampleList::parse(" \n", false).is_err());
        assert!(SampleList::parse("[]", true).is_err());
        assert!(SampleList::parse("{", true).is_err());
    }
}
