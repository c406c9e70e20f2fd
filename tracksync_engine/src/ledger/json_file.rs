use std::{
    collections::BTreeSet,
    io::ErrorKind,
    path::{Path, PathBuf},
};

use log::*;

use crate::{
    sync_types::ExternalOrderRef,
    traits::{LedgerError, ProcessedLedger},
};

/// A ledger stored as a JSON array of strings, e.g. `["8123456789", "8123456790"]`.
///
/// Every change rewrites the whole file via a temporary file and a rename, so a crash mid-write leaves the previous
/// version intact.
#[derive(Debug, Clone)]
pub struct JsonFileLedger {
    path: PathBuf,
    ids: BTreeSet<ExternalOrderRef>,
}

impl JsonFileLedger {
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        Self { path: path.as_ref().to_path_buf(), ids: BTreeSet::new() }
    }

    /// Creates the ledger and loads it in one step.
    pub async fn open<P: AsRef<Path>>(path: P) -> Result<Self, LedgerError> {
        let mut ledger = Self::new(path);
        ledger.load().await?;
        Ok(ledger)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn io_error(&self, e: std::io::Error) -> LedgerError {
        LedgerError::Io { path: self.path.display().to_string(), reason: e.to_string() }
    }

    async fn persist(&self) -> Result<(), LedgerError> {
        let ids = self.ids.iter().map(ExternalOrderRef::as_str).collect::<Vec<&str>>();
        let json = serde_json::to_string_pretty(&ids)
            .map_err(|e| LedgerError::Backend(format!("Could not serialize the ledger. {e}")))?;
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await.map_err(|e| self.io_error(e))?;
        }
        let mut tmp = self.path.clone().into_os_string();
        tmp.push(".tmp");
        let tmp = PathBuf::from(tmp);
        tokio::fs::write(&tmp, json).await.map_err(|e| self.io_error(e))?;
        tokio::fs::rename(&tmp, &self.path).await.map_err(|e| self.io_error(e))?;
        trace!("📒️ Ledger saved to {} ({} entries)", self.path.display(), self.ids.len());
        Ok(())
    }
}

impl ProcessedLedger for JsonFileLedger {
    async fn load(&mut self) -> Result<usize, LedgerError> {
        let contents = match tokio::fs::read_to_string(&self.path).await {
            Ok(s) => s,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                info!("📒️ No ledger at {}. Starting with an empty one.", self.path.display());
                self.ids.clear();
                return Ok(0);
            },
            Err(e) => return Err(self.io_error(e)),
        };
        if contents.trim().is_empty() {
            self.ids.clear();
            return Ok(0);
        }
        let ids = serde_json::from_str::<Vec<String>>(&contents).map_err(|e| LedgerError::Corrupt {
            path: self.path.display().to_string(),
            reason: e.to_string(),
        })?;
        self.ids = ids.into_iter().map(ExternalOrderRef::new).filter(|id| !id.is_empty()).collect();
        debug!("📒️ Loaded {} processed references from {}", self.ids.len(), self.path.display());
        Ok(self.ids.len())
    }

    async fn contains(&self, id: &ExternalOrderRef) -> Result<bool, LedgerError> {
        Ok(self.ids.contains(id))
    }

    async fn add(&mut self, id: &ExternalOrderRef) -> Result<bool, LedgerError> {
        if !self.ids.insert(id.clone()) {
            return Ok(false);
        }
        if let Err(e) = self.persist().await {
            self.ids.remove(id);
            return Err(e);
        }
        Ok(true)
    }

    async fn remove(&mut self, id: &ExternalOrderRef) -> Result<bool, LedgerError> {
        if !self.ids.remove(id) {
            return Ok(false);
        }
        if let Err(e) = self.persist().await {
            self.ids.insert(id.clone());
            return Err(e);
        }
        Ok(true)
    }

    async fn entries(&self) -> Result<Vec<ExternalOrderRef>, LedgerError> {
        Ok(self.ids.iter().cloned().collect())
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[tokio::test]
    async fn missing_file_is_an_empty_ledger() {
        let dir = tempfile::tempdir().unwrap();
        let mut ledger = JsonFileLedger::new(dir.path().join("processed_orders.json"));
        assert_eq!(ledger.load().await.unwrap(), 0);
        assert!(!ledger.path().exists());
    }

    #[tokio::test]
    async fn additions_are_persisted_immediately() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("state").join("processed_orders.json");
        let mut ledger = JsonFileLedger::open(&path).await.unwrap();
        assert!(ledger.add(&"8123456790".into()).await.unwrap());
        assert!(ledger.add(&"8123456789".into()).await.unwrap());
        assert!(!ledger.add(&"8123456789".into()).await.unwrap());
        let on_disk: Vec<String> = serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(on_disk, vec!["8123456789", "8123456790"]);

        let reopened = JsonFileLedger::open(&path).await.unwrap();
        assert!(reopened.contains(&"8123456789".into()).await.unwrap());
        assert_eq!(reopened.entries().await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn reads_ledgers_written_by_hand() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("processed_orders.json");
        std::fs::write(&path, r#"["8123456789", " 42 ", ""]"#).unwrap();
        let mut ledger = JsonFileLedger::new(&path);
        assert_eq!(ledger.load().await.unwrap(), 2);
        assert!(ledger.contains(&"42".into()).await.unwrap());
        assert!(ledger.remove(&"42".into()).await.unwrap());
        let reopened = JsonFileLedger::open(&path).await.unwrap();
        assert!(!reopened.contains(&"42".into()).await.unwrap());
    }

    #[tokio::test]
    async fn corrupt_ledger_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("processed_orders.json");
        std::fs::write(&path, "{ not json").unwrap();
        let err = JsonFileLedger::open(&path).await.unwrap_err();
        assert!(matches!(err, LedgerError::Corrupt { .. }));
    }
}
