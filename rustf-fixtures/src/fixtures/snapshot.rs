use crate::error::Result;
use crate::store::{Record, RecordStore};
use std::collections::BTreeMap;

/// Every record of every catalog table, read once after the migrations ran
///
/// Ignored tables are captured too, so references into them still resolve
/// to a label.
#[derive(Debug, Clone, Default)]
pub struct FixtureSnapshot {
    tables: BTreeMap<String, BTreeMap<i64, Record>>,
}

impl FixtureSnapshot {
    pub async fn capture(store: &dyn RecordStore) -> Result<Self> {
        let mut snapshot = Self::default();
        for table in store.models().tables() {
            let records = store.all(&table).await?;
            log::debug!("Captured {} records from {}", records.len(), table);
            snapshot.insert_all(table, records);
        }
        Ok(snapshot)
    }

    pub fn insert_all(&mut self, table: impl Into<String>, records: Vec<Record>) {
        let rows = self.tables.entry(table.into()).or_default();
        for record in records {
            rows.insert(record.id, record);
        }
    }

    pub fn find(&self, table: &str, id: i64) -> Option<&Record> {
        self.tables.get(table).and_then(|rows| rows.get(&id))
    }

    /// Records of `table` in primary key order
    pub fn records(&self, table: &str) -> impl Iterator<Item = &Record> {
        self.tables.get(table).into_iter().flat_map(|rows| rows.values())
    }

    pub fn record_count(&self) -> usize {
        self.tables.values().map(BTreeMap::len).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ModelCatalog;
    use crate::store::{MemoryStore, Row, SqlValue};

    #[tokio::test]
    async fn test_capture_orders_by_id() {
        let models = ModelCatalog::from_yaml_str("Level:\n  table: levels\n").unwrap();
        let store = MemoryStore::new(models, 0);
        for id in [30, 10, 20] {
            let mut row = Row::new();
            row.insert("id".into(), SqlValue::BigInt(id));
            store.insert("levels", row).await.unwrap();
        }

        let snapshot = FixtureSnapshot::capture(&store).await.unwrap();
        let ids: Vec<i64> = snapshot.records("levels").map(|r| r.id).collect();
        assert_eq!(ids, vec![10, 20, 30]);
        assert!(snapshot.find("levels", 20).is_some());
        assert_eq!(snapshot.records("planets").count(), 0);
        assert_eq!(snapshot.record_count(), 3);
    }
}
