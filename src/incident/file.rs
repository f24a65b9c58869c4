//! Append-only JSON-lines incident log

use std::path::{Path, PathBuf};

use tokio::fs::{File, OpenOptions};
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;

use super::notifier::{IncidentError, IncidentNotifier};
use super::record::IncidentRecord;

/// Notifier that appends one JSON object per line to a file
pub struct JsonLinesIncidentLog {
    path: PathBuf,
    file: Mutex<File>,
}

impl JsonLinesIncidentLog {
    /// Open `path` for appending, creating it if needed
    pub async fn open(path: impl AsRef<Path>) -> Result<Self, IncidentError> {
        let path = path.as_ref().to_path_buf();
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .await?;

        tracing::info!(path = %path.display(), "Incident log opened");

        Ok(Self {
            path,
            file: Mutex::new(file),
        })
    }

    /// Path of the log file
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl IncidentNotifier for JsonLinesIncidentLog {
    async fn persist(&self, record: &IncidentRecord) -> Result<(), IncidentError> {
        let mut line = serde_json::to_vec(record)?;
        line.push(b'\n');

        let mut file = self.file.lock().await;
        file.write_all(&line).await?;
        file.flush().await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::incident::AlertType;
    use crate::registry::ClientIdentity;

    #[tokio::test]
    async fn test_appends_one_line_per_record() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("incidents.jsonl");

        let log = JsonLinesIncidentLog::open(&path).await.unwrap();
        log.persist(&IncidentRecord::panic(ClientIdentity::new("u1"), Some("High")))
            .await
            .unwrap();
        log.persist(&IncidentRecord::auto_dispatch(ClientIdentity::new("u2"), None))
            .await
            .unwrap();

        let contents = tokio::fs::read_to_string(&path).await.unwrap();
        let records: Vec<IncidentRecord> = contents
            .lines()
            .map(|l| serde_json::from_str(l).unwrap())
            .collect();

        assert_eq!(records.len(), 2);
        assert_eq!(records[0].severity_level, "High");
        assert_eq!(records[1].alert_type, AlertType::AutoDispatch);
    }

    #[tokio::test]
    async fn test_reopen_appends() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("incidents.jsonl");

        {
            let log = JsonLinesIncidentLog::open(&path).await.unwrap();
            log.persist(&IncidentRecord::panic(ClientIdentity::new("u1"), None))
                .await
                .unwrap();
        }

        let log = JsonLinesIncidentLog::open(&path).await.unwrap();
        log.persist(&IncidentRecord::panic(ClientIdentity::new("u1"), None))
            .await
            .unwrap();

        let contents = tokio::fs::read_to_string(log.path()).await.unwrap();
        assert_eq!(contents.lines().count(), 2);
    }
}
