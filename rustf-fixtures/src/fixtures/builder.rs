use super::{FixtureRecord, FixtureSet, FixtureSnapshot, FixtureTableData, Labeler, RecordSerializer};
use crate::config::Configuration;
use crate::error::{Error, Result};
use crate::models::ModelCatalog;

/// Builds the complete fixture set from a snapshot of the scratch store
///
/// One entry per physical table that has records and is not ignored. Labels
/// must be unique within a table.
pub struct FixtureSetBuilder<'a> {
    models: &'a ModelCatalog,
    config: &'a Configuration,
    labeler: &'a Labeler<'a>,
}

impl<'a> FixtureSetBuilder<'a> {
    pub fn new(
        models: &'a ModelCatalog,
        config: &'a Configuration,
        labeler: &'a Labeler<'a>,
    ) -> Self {
        Self {
            models,
            config,
            labeler,
        }
    }

    pub fn build(&self, snapshot: &FixtureSnapshot) -> Result<FixtureSet> {
        let serializer = RecordSerializer::new(self.models, self.labeler, snapshot);
        let mut set = FixtureSet::new();

        for fixture_table in self.models.fixture_tables()? {
            if self.config.is_ignored(&fixture_table.table) {
                log::debug!("Skipping ignored table {}", fixture_table.table);
                continue;
            }

            let mut data = FixtureTableData::new(&fixture_table.fixture_name);
            for record in snapshot.records(&fixture_table.table) {
                let fixture = FixtureRecord {
                    table: fixture_table.table.clone(),
                    label: self.labeler.label_for(&fixture_table.table, record)?,
                    attributes: serializer.serialize(&fixture_table.table, record)?,
                };

                if data.records.contains_key(&fixture.label) {
                    return Err(Error::RepeatedFixtureLabel {
                        table: fixture.table,
                        label: fixture.label,
                    });
                }
                data.records.insert(fixture.label, fixture.attributes);
            }

            if data.records.is_empty() {
                continue;
            }
            log::debug!(
                "Built {} fixtures for {}",
                data.records.len(),
                fixture_table.table
            );
            set.insert(fixture_table.table, data);
        }

        Ok(set)
    }
}
