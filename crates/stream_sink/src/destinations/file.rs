//! FileDestination - appends events to a JSON lines file

use contracts::{ContractError, Destination, Event, RecordFailure, RecordOutcome, WriteOutcome};
use std::collections::HashMap;
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};
use tracing::{debug, error, instrument};

/// Failure code for events over `max_record_bytes`
pub const RECORD_TOO_LARGE: &str = "RecordTooLarge";

/// Configuration for FileDestination
#[derive(Debug, Clone)]
pub struct FileDestinationConfig {
    /// Base output directory
    pub base_path: PathBuf,
    /// Per-event size ceiling; larger events are rejected individually
    pub max_record_bytes: Option<usize>,
}

impl FileDestinationConfig {
    /// Create config from params map
    ///
    /// # Errors
    /// Returns an error if `max_record_bytes` is not an integer
    pub fn from_params(params: &HashMap<String, String>) -> Result<Self, ContractError> {
        let base_path = params
            .get("base_path")
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from("./output"));

        let max_record_bytes = params
            .get("max_record_bytes")
            .map(|raw| {
                raw.parse::<usize>().map_err(|e| {
                    ContractError::config_validation("params.max_record_bytes", e.to_string())
                })
            })
            .transpose()?;

        Ok(Self {
            base_path,
            max_record_bytes,
        })
    }
}

/// Destination that appends one JSON line per event to `<base_path>/<name>.jsonl`
pub struct FileDestination {
    name: String,
    config: FileDestinationConfig,
    path: PathBuf,
    // Serializes appends from concurrent retry sequences
    append_lock: Mutex<()>,
}

impl FileDestination {
    /// Create a new FileDestination
    pub fn new(name: impl Into<String>, config: FileDestinationConfig) -> std::io::Result<Self> {
        let name = name.into();
        fs::create_dir_all(&config.base_path)?;
        let path = config.base_path.join(format!("{name}.jsonl"));

        Ok(Self {
            name,
            config,
            path,
            append_lock: Mutex::new(()),
        })
    }

    /// Create from params map (for factory)
    pub fn from_params(
        name: impl Into<String>,
        params: &HashMap<String, String>,
    ) -> Result<Self, ContractError> {
        let config = FileDestinationConfig::from_params(params)?;
        Ok(Self::new(name, config)?)
    }

    /// File the events are appended to
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn check_record(&self, event: &Event) -> RecordOutcome {
        match self.config.max_record_bytes {
            Some(limit) if event.size() > limit => Err(RecordFailure::new(
                RECORD_TOO_LARGE,
                format!("record of {} bytes exceeds {limit}", event.size()),
            )),
            _ => Ok(()),
        }
    }

    fn append_lines(&self, events: &[&Event]) -> std::io::Result<()> {
        let mut buf = Vec::new();
        for event in events {
            serde_json::to_writer(&mut buf, event)
                .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;
            buf.push(b'\n');
        }

        let _guard = self.append_lock.lock().unwrap_or_else(PoisonError::into_inner);
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;
        file.write_all(&buf)?;
        file.flush()
    }
}

impl Destination for FileDestination {
    fn name(&self) -> &str {
        &self.name
    }

    #[instrument(
        name = "file_destination_write",
        skip(self, events),
        fields(destination = %self.name, events = events.len())
    )]
    async fn write(&self, events: &[Event]) -> WriteOutcome {
        let outcomes: Vec<RecordOutcome> = events.iter().map(|e| self.check_record(e)).collect();
        let accepted: Vec<&Event> = events
            .iter()
            .zip(&outcomes)
            .filter(|(_, outcome)| outcome.is_ok())
            .map(|(event, _)| event)
            .collect();

        if let Err(e) = self.append_lines(&accepted) {
            error!(destination = %self.name, path = %self.path.display(), error = %e, "Write failed");
            return WriteOutcome::total_failure(
                ContractError::destination_write(&self.name, e.to_string()).to_string(),
            );
        }

        debug!(written = accepted.len(), rejected = events.len() - accepted.len(), "Appended events");
        WriteOutcome::Partial(outcomes)
    }

    async fn probe(&self) -> Result<(), ContractError> {
        if self.config.base_path.is_dir() {
            Ok(())
        } else {
            Err(ContractError::destination_unreachable(
                &self.name,
                format!("{} is not a directory", self.config.base_path.display()),
            ))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn read_lines(path: &Path) -> Vec<Event> {
        fs::read_to_string(path)
            .unwrap()
            .lines()
            .map(|line| serde_json::from_str(line).unwrap())
            .collect()
    }

    #[tokio::test]
    async fn test_file_destination_write() {
        let dir = tempdir().unwrap();
        let config = FileDestinationConfig {
            base_path: dir.path().to_path_buf(),
            max_record_bytes: None,
        };

        let destination = FileDestination::new("test_file", config).unwrap();
        let events = vec![Event::new("one", "k"), Event::new("two", "k")];

        assert_eq!(destination.write(&events).await, WriteOutcome::success(2));
        assert_eq!(destination.write(&events[..1]).await, WriteOutcome::success(1));

        assert_eq!(destination.path(), dir.path().join("test_file.jsonl"));
        let written = read_lines(destination.path());
        assert_eq!(written, vec![events[0].clone(), events[1].clone(), events[0].clone()]);
    }

    #[tokio::test]
    async fn test_oversized_records_rejected() {
        let dir = tempdir().unwrap();
        let mut params = HashMap::new();
        params.insert("base_path".to_string(), dir.path().display().to_string());
        params.insert("max_record_bytes".to_string(), "4".to_string());

        let destination = FileDestination::from_params("limited", &params).unwrap();
        let events = vec![
            Event::new("ok", "k"),
            Event::new("too long", "k"),
            Event::new("fine", "k"),
        ];

        let outcome = destination.write(&events).await;
        assert_eq!(outcome.rejected_count(), Some(1));
        let WriteOutcome::Partial(results) = outcome else {
            panic!("expected partial outcome");
        };
        assert_eq!(results[1].as_ref().unwrap_err().code, RECORD_TOO_LARGE);

        let written = read_lines(destination.path());
        assert_eq!(written, vec![events[0].clone(), events[2].clone()]);
    }

    #[tokio::test]
    async fn test_probe_requires_directory() {
        let dir = tempdir().unwrap();
        let base = dir.path().join("out");
        let destination = FileDestination::new(
            "probe",
            FileDestinationConfig {
                base_path: base.clone(),
                max_record_bytes: None,
            },
        )
        .unwrap();
        assert!(destination.probe().await.is_ok());

        fs::remove_dir_all(&base).unwrap();
        assert!(destination.probe().await.is_err());

        let outcome = destination.write(&[Event::new("x", "k")]).await;
        assert!(!outcome.is_reachable());
    }

    #[test]
    fn test_invalid_max_record_bytes() {
        let mut params = HashMap::new();
        params.insert("max_record_bytes".to_string(), "lots".to_string());
        assert!(FileDestinationConfig::from_params(&params).is_err());
    }
}
