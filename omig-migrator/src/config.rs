use std::collections::{BTreeMap, BTreeSet};
use std::convert::Infallible;
use std::str::FromStr;
use std::time::Duration;

use envconfig::Envconfig;

use crate::MigratorError;
use crate::status::{IMPORT_BATCH_SIZE, MAX_JOB_DURATION, SAVE_BATCH_SIZE};

#[derive(Envconfig, Clone, Debug)]
pub struct MigratorConfig {
    #[envconfig(from = "OMIG_IMPORT_BATCH_SIZE", default = "1000")]
    pub import_batch_size: usize,
    #[envconfig(from = "OMIG_SAVE_BATCH_SIZE", default = "50")]
    pub save_batch_size: usize,
    #[envconfig(from = "OMIG_MAX_JOB_DURATION_MS", default = "870000")]
    pub max_job_duration_ms: u64,
    /// Reject every write and delete with a maintenance message.
    #[envconfig(from = "OMIG_READ_ONLY", default = "false")]
    pub read_only: bool,
    /// Classes that are locked in read-only mode even though no hook is
    /// registered for them.
    #[envconfig(from = "OMIG_READ_ONLY_CLASSES", default = "")]
    pub read_only_classes: ClassNames,
    #[envconfig(from = "OMIG_JOB_NAME", default = "import")]
    pub job_name: String,
    /// Per app, the first version that migrates its own writes. Writes from
    /// such clients are not migrated by the live triggers.
    #[envconfig(from = "OMIG_DO_NOT_MIGRATE_VERSIONS", default = "")]
    pub do_not_migrate_versions: VersionGates,
}

impl Default for MigratorConfig {
    fn default() -> Self {
        Self {
            import_batch_size: IMPORT_BATCH_SIZE,
            save_batch_size: SAVE_BATCH_SIZE,
            max_job_duration_ms: MAX_JOB_DURATION.as_millis() as u64,
            read_only: false,
            read_only_classes: ClassNames::default(),
            job_name: "import".into(),
            do_not_migrate_versions: VersionGates::default(),
        }
    }
}

impl MigratorConfig {
    pub fn max_job_duration(&self) -> Duration {
        Duration::from_millis(self.max_job_duration_ms)
    }

    /// Page size of the sweep, never zero.
    pub(crate) fn page_size(&self) -> usize {
        self.import_batch_size.max(1)
    }

    pub(crate) fn save_chunk_size(&self) -> usize {
        self.save_batch_size.max(1)
    }
}

/// Comma separated class names, e.g. `_User,_Installation`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ClassNames(BTreeSet<String>);

impl ClassNames {
    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(String::as_str)
    }
}

impl<S: Into<String>> FromIterator<S> for ClassNames {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        Self(iter.into_iter().map(Into::into).collect())
    }
}

impl FromStr for ClassNames {
    type Err = Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(s.split(',')
            .map(str::trim)
            .filter(|name| !name.is_empty())
            .collect())
    }
}

/// Minimum app version per app name, parsed from `app=version` pairs
/// separated by commas, e.g. `myapp.ios=1.2.3,myapp.android=1.4`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VersionGates(BTreeMap<String, String>);

impl VersionGates {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with<A, V>(mut self, app_name: A, min_version: V) -> Self
    where
        A: Into<String>,
        V: Into<String>,
    {
        self.0.insert(app_name.into(), min_version.into());
        self
    }

    pub fn min_version(&self, app_name: &str) -> Option<&str> {
        self.0.get(app_name).map(String::as_str)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl FromStr for VersionGates {
    type Err = MigratorError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut gates = Self::new();
        for entry in s.split(',').map(str::trim).filter(|e| !e.is_empty()) {
            let Some((app, version)) = entry.split_once('=') else {
                return Err(MigratorError::invalid_argument(format!(
                    "Expected app=version, got `{}`",
                    entry
                )));
            };
            gates = gates.with(app.trim(), version.trim());
        }
        Ok(gates)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_matches_env_defaults() {
        let config = MigratorConfig::default();
        assert_eq!(config.import_batch_size, 1000);
        assert_eq!(config.save_batch_size, 50);
        assert_eq!(config.max_job_duration(), Duration::from_secs(870));
        assert!(!config.read_only);
        assert_eq!(config.read_only_classes.iter().count(), 0);
        assert_eq!(config.job_name, "import");
        assert!(config.do_not_migrate_versions.is_empty());
    }

    #[test]
    fn test_parse_lists() {
        let classes: ClassNames = " _User, ,_Installation".parse().unwrap();
        assert_eq!(
            classes.iter().collect::<Vec<_>>(),
            vec!["_Installation", "_User"]
        );

        let gates: VersionGates =
            "myapp.ios=1.2.3, myapp.android = 2.0".parse().unwrap();
        assert_eq!(gates.min_version("myapp.ios"), Some("1.2.3"));
        assert_eq!(gates.min_version("myapp.android"), Some("2.0"));
        assert_eq!(gates.min_version("other"), None);
        assert!("".parse::<VersionGates>().unwrap().is_empty());
        assert!("myapp.ios".parse::<VersionGates>().is_err());
    }

    #[test]
    fn test_zero_sizes_are_clamped() {
        let config = MigratorConfig {
            import_batch_size: 0,
            save_batch_size: 0,
            ..Default::default()
        };
        assert_eq!(config.page_size(), 1);
        assert_eq!(config.save_chunk_size(), 1);
    }
}
