use std::collections::BTreeSet;

use crate::{
    sync_types::ExternalOrderRef,
    traits::{LedgerError, ProcessedLedger},
};

#[derive(Debug, Clone, Default)]
pub struct MemoryLedger {
    ids: BTreeSet<ExternalOrderRef>,
}

impl MemoryLedger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_entries<I, S>(ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self { ids: ids.into_iter().map(ExternalOrderRef::new).filter(|id| !id.is_empty()).collect() }
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }
}

impl ProcessedLedger for MemoryLedger {
    async fn load(&mut self) -> Result<usize, LedgerError> {
        Ok(self.ids.len())
    }

    async fn contains(&self, id: &ExternalOrderRef) -> Result<bool, LedgerError> {
        Ok(self.ids.contains(id))
    }

    async fn add(&mut self, id: &ExternalOrderRef) -> Result<bool, LedgerError> {
        Ok(self.ids.insert(id.clone()))
    }

    async fn remove(&mut self, id: &ExternalOrderRef) -> Result<bool, LedgerError> {
        Ok(self.ids.remove(id))
    }

    async fn entries(&self) -> Result<Vec<ExternalOrderRef>, LedgerError> {
        Ok(self.ids.iter().cloned().collect())
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[tokio::test]
    async fn add_contains_remove() {
        let mut ledger = MemoryLedger::with_entries(["111", " 222 ", ""]);
        assert_eq!(ledger.load().await.unwrap(), 2);
        assert!(ledger.contains(&"222".into()).await.unwrap());
        assert!(ledger.add(&"333".into()).await.unwrap());
        assert!(!ledger.add(&"333".into()).await.unwrap());
        assert!(ledger.remove(&"111".into()).await.unwrap());
        assert!(!ledger.remove(&"111".into()).await.unwrap());
        let entries = ledger.entries().await.unwrap();
        assert_eq!(entries, vec![ExternalOrderRef::new("222"), ExternalOrderRef::new("333")]);
    }
}
