use chrono::Utc;
use std::collections::HashMap;

use super::{decide_run_status, StatusDecision};
use crate::changelog::{ChangeSet, ChangeSetKey, CheckSum, ExecType, RanChangeSet};
use crate::common::{CURRENT_CHECKSUM_VERSION, TAG_MARKER_AUTHOR, TAG_MARKER_PATH};
use crate::errors::{ErrorKind, ShiftError, ShiftResult};
use crate::store::Database;

/// Read and write access to the change history.
///
/// This is the only writer of history rows. Rows are appended when a
/// changeset runs, rewritten when it reruns, and otherwise only touched to
/// backfill a checksum, assign a tag, or delete the row on rollback.
#[derive(Clone)]
pub struct ChangeHistoryStore {
    database: Database,
}

impl ChangeHistoryStore {
    pub fn new(database: Database) -> Self {
        ChangeHistoryStore { database }
    }

    pub fn init(&self) -> ShiftResult<()> {
        self.database.init_history()
    }

    /// Every row, oldest first.
    pub fn ran_change_sets(&self) -> ShiftResult<Vec<RanChangeSet>> {
        let mut rows = self.database.ran_change_sets()?;
        rows.sort_by_key(|it| (it.order_executed(), it.executed_at()));
        Ok(rows)
    }

    /// Rows keyed by changeset identity.
    pub fn ran_by_key(&self) -> ShiftResult<HashMap<ChangeSetKey, RanChangeSet>> {
        Ok(self
            .ran_change_sets()?
            .into_iter()
            .map(|it| (it.key().clone(), it))
            .collect())
    }

    /// Order value for the next appended row.
    pub fn next_order(&self) -> ShiftResult<i64> {
        Ok(self
            .ran_change_sets()?
            .iter()
            .map(|it| it.order_executed())
            .max()
            .unwrap_or(0)
            + 1)
    }

    /// Run status of `change_set` given its history row. Writes nothing.
    pub fn run_status(
        &self,
        change_set: &ChangeSet,
        ran: Option<&RanChangeSet>,
    ) -> ShiftResult<StatusDecision> {
        decide_run_status(change_set, ran)
    }

    /// Writes the current checksum of `change_set` over a missing one.
    pub fn backfill_checksum(&self, change_set: &ChangeSet) -> ShiftResult<()> {
        let checksum = change_set.checksum()?;
        log::info!("Updating NULL checksum for {} to {}", change_set, checksum);
        self.update_checksum(change_set.key(), Some(&checksum))
    }

    /// Builds the row recorded for `change_set`.
    pub fn record_for(
        &self,
        change_set: &ChangeSet,
        exec_type: ExecType,
        order_executed: i64,
        deployment_id: &str,
    ) -> ShiftResult<RanChangeSet> {
        let description = change_set.description();
        Ok(RanChangeSet::new(
            change_set.key().clone(),
            Some(change_set.checksum()?),
            Utc::now(),
            order_executed,
            exec_type,
        )
        .with_description((!description.is_empty()).then_some(description))
        .with_tag(change_set.declared_tag().map(|it| it.to_string()))
        .with_deployment_id(Some(deployment_id.to_string())))
    }

    pub fn append(&self, record: &RanChangeSet) -> ShiftResult<()> {
        log::debug!("Recording {} as {}", record.key(), record.exec_type());
        self.database.append(record)
    }

    pub fn rewrite(&self, record: &RanChangeSet) -> ShiftResult<()> {
        log::debug!("Rewriting history of {} as {}", record.key(), record.exec_type());
        self.database.rewrite(record)
    }

    pub fn update_checksum(&self, key: &ChangeSetKey, checksum: Option<&CheckSum>) -> ShiftResult<()> {
        self.database.update_checksum(key, checksum)
    }

    pub fn delete(&self, key: &ChangeSetKey) -> ShiftResult<()> {
        log::debug!("Removing {} from history", key);
        self.database.delete(key)
    }

    /// Nulls checksums written by an older algorithm so the next run
    /// recomputes them through the backfill path.
    pub fn upgrade_legacy_checksums(&self) -> ShiftResult<usize> {
        let upgraded = self
            .database
            .upgrade_legacy_checksums(CURRENT_CHECKSUM_VERSION)?;
        if upgraded > 0 {
            log::info!("Cleared {} legacy checksums for recomputation", upgraded);
        }
        Ok(upgraded)
    }

    pub fn clear_checksums(&self) -> ShiftResult<()> {
        log::info!("Clearing all stored checksums");
        self.database.clear_checksums()
    }

    /// Tags the most recent row. On an empty history a marker row is
    /// written to carry the tag.
    pub fn tag(&self, tag: &str) -> ShiftResult<()> {
        if tag.trim().is_empty() {
            return Err(ShiftError::new(
                "Tag cannot be empty",
                ErrorKind::ValidationError,
            ));
        }

        let rows = self.ran_change_sets()?;
        match rows.last() {
            Some(last) => {
                log::info!("Tagging {} with {}", last.key(), tag);
                self.database.update_tag(last.key(), tag)
            }
            None => {
                let now = Utc::now();
                let key = ChangeSetKey::new(
                    &now.timestamp_millis().to_string(),
                    TAG_MARKER_AUTHOR,
                    TAG_MARKER_PATH,
                );
                let marker = RanChangeSet::new(key, None, now, 1, ExecType::Executed)
                    .with_description(Some(format!("tagDatabase tag={}", tag)))
                    .with_tag(Some(tag.to_string()));
                log::info!("Tagging empty history with {}", tag);
                self.database.append(&marker)
            }
        }
    }

    /// Whether `key` is a marker row written by [`tag`](ChangeHistoryStore::tag)
    /// rather than by a changeset.
    pub fn is_tag_marker(key: &ChangeSetKey) -> bool {
        key.author() == TAG_MARKER_AUTHOR && key.path() == TAG_MARKER_PATH
    }

    pub fn tag_exists(&self, tag: &str) -> ShiftResult<bool> {
        Ok(self
            .ran_change_sets()?
            .iter()
            .any(|it| it.tag() == Some(tag)))
    }
}
