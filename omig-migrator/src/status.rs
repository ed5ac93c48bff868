use std::{fmt, time::Duration};

use omig_store::Record;
use serde_json::Value;

/// Field holding the per-record migration state.
pub const MIGRATION_KEY: &str = "migrationStatus";

/// Records queried per sweep page.
pub const IMPORT_BATCH_SIZE: usize = 1000;

/// Records sent per `save_all` call.
pub const SAVE_BATCH_SIZE: usize = 50;

/// Wall-clock budget of one sweep invocation; the host kills jobs at ~15m.
pub const MAX_JOB_DURATION: Duration = Duration::from_millis(870_000);

/// Migration state stored on a record under [`MIGRATION_KEY`].
///
/// A record without the field has never been evaluated.
///
/// Live writes normally leave a record at `IsMigrated`. New records have
/// no identifier during their first write, so they take a second pass:
/// the post-write trigger stores `NeedsSecondPass`, which re-enters the
/// pre-write trigger with the identifier available, and migration then
/// ends at `FinishedSecondPass`. Records stamped by the sweep carry
/// `JustImported`, which the next live write lets through untouched.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MigrationStatus {
    IsMigrated,
    FinishedSecondPass,
    NeedsSecondPass,
    JustImported,
}

impl MigrationStatus {
    pub const ALL: [MigrationStatus; 4] = [
        MigrationStatus::IsMigrated,
        MigrationStatus::FinishedSecondPass,
        MigrationStatus::NeedsSecondPass,
        MigrationStatus::JustImported,
    ];

    /// Wire code stored in the record.
    pub const fn code(self) -> i64 {
        match self {
            MigrationStatus::IsMigrated => 1,
            MigrationStatus::FinishedSecondPass => 2,
            MigrationStatus::NeedsSecondPass => 3,
            MigrationStatus::JustImported => 4,
        }
    }

    pub fn from_code(code: i64) -> Option<Self> {
        Self::ALL.into_iter().find(|s| s.code() == code)
    }

    pub fn from_value(value: &Value) -> Option<Self> {
        value.as_i64().and_then(Self::from_code)
    }

    /// Codes the sweep skips: every known state.
    pub fn swept_values() -> Vec<Value> {
        Self::ALL.into_iter().map(Value::from).collect()
    }
}

impl From<MigrationStatus> for Value {
    fn from(status: MigrationStatus) -> Self {
        Value::from(status.code())
    }
}

impl fmt::Display for MigrationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            MigrationStatus::IsMigrated => "IS_MIGRATED",
            MigrationStatus::FinishedSecondPass => "FINISHED_SECOND_PASS",
            MigrationStatus::NeedsSecondPass => "NEEDS_SECOND_PASS",
            MigrationStatus::JustImported => "JUST_IMPORTED",
        };
        f.write_str(name)
    }
}

/// Typed access to the migration field of a [`Record`].
pub trait MigrationRecordExt {
    fn migration_status(&self) -> Option<MigrationStatus>;
    fn set_migration_status(&mut self, status: MigrationStatus);
}

impl MigrationRecordExt for Record {
    fn migration_status(&self) -> Option<MigrationStatus> {
        self.get(MIGRATION_KEY).and_then(MigrationStatus::from_value)
    }

    fn set_migration_status(&mut self, status: MigrationStatus) {
        self.set(MIGRATION_KEY, status);
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn test_codes() {
        let codes: Vec<i64> =
            MigrationStatus::ALL.iter().map(|s| s.code()).collect();
        assert_eq!(codes, vec![1, 2, 3, 4]);
        assert_eq!(MigrationStatus::from_code(0), None);
        assert_eq!(
            MigrationStatus::from_value(&json!(3)),
            Some(MigrationStatus::NeedsSecondPass)
        );
        assert_eq!(MigrationStatus::from_value(&json!("3")), None);
    }

    #[test]
    fn test_record_ext_marks_dirty() {
        let mut record =
            Record::from_fields("Foo", Some("1".into()), Default::default());
        assert_eq!(record.migration_status(), None);
        record.set_migration_status(MigrationStatus::JustImported);
        assert!(record.only_dirty(MIGRATION_KEY));
        assert_eq!(record.get(MIGRATION_KEY), Some(&json!(4)));
        assert_eq!(
            record.migration_status(),
            Some(MigrationStatus::JustImported)
        );
    }
}
