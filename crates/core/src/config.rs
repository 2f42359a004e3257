//! Core runtime configuration.
//!
//! Configuration is resolved once at process startup and then passed into core services.
//! Request handling never reads process-wide environment variables.

use crate::constants::{
    CLINICS_DIR_NAME, DEFAULT_MAX_FORM_DATA_BYTES, SUBMISSIONS_DIR_NAME, USERS_DIR_NAME,
};
use crate::{ClinicError, ClinicResult};
use std::path::{Path, PathBuf};
use std::str::FromStr;

/// Which storage backend the process should open.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StoreKind {
    /// JSON records under sharded directories in the data directory.
    File,
    /// Process-local maps; everything is lost on exit.
    Memory,
}

impl FromStr for StoreKind {
    type Err = ClinicError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "file" => Ok(StoreKind::File),
            "memory" => Ok(StoreKind::Memory),
            other => Err(ClinicError::InvalidArgument(format!(
                "unknown store kind '{other}' (expected 'file' or 'memory')"
            ))),
        }
    }
}

/// Core configuration resolved at startup.
#[derive(Clone, Debug)]
pub struct CoreConfig {
    data_dir: PathBuf,
    store_kind: StoreKind,
    max_form_data_bytes: usize,
}

impl CoreConfig {
    /// Create a new `CoreConfig`.
    ///
    /// # Errors
    ///
    /// Returns [`ClinicError::InvalidArgument`] if a file store is requested with an empty
    /// data directory path.
    pub fn new(data_dir: PathBuf, store_kind: StoreKind) -> ClinicResult<Self> {
        if store_kind == StoreKind::File && data_dir.as_os_str().is_empty() {
            return Err(ClinicError::InvalidArgument(
                "data directory cannot be empty for the file store".into(),
            ));
        }

        Ok(Self {
            data_dir,
            store_kind,
            max_form_data_bytes: DEFAULT_MAX_FORM_DATA_BYTES,
        })
    }

    /// Override the exam form data size limit.
    pub fn with_max_form_data_bytes(mut self, limit: usize) -> Self {
        self.max_form_data_bytes = limit;
        self
    }

    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    pub fn clinics_dir(&self) -> PathBuf {
        self.data_dir.join(CLINICS_DIR_NAME)
    }

    pub fn users_dir(&self) -> PathBuf {
        self.data_dir.join(USERS_DIR_NAME)
    }

    pub fn submissions_dir(&self) -> PathBuf {
        self.data_dir.join(SUBMISSIONS_DIR_NAME)
    }

    pub fn store_kind(&self) -> StoreKind {
        self.store_kind
    }

    pub fn max_form_data_bytes(&self) -> usize {
        self.max_form_data_bytes
    }
}

/// Parse the store kind from an optional environment value.
///
/// `None` or blank selects the file store.
pub fn store_kind_from_env_value(value: Option<String>) -> ClinicResult<StoreKind> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
        .map(|v| v.parse::<StoreKind>())
        .transpose()
        .map(|kind| kind.unwrap_or(StoreKind::File))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn store_kind_defaults_to_file() {
        assert_eq!(store_kind_from_env_value(None).unwrap(), StoreKind::File);
        assert_eq!(
            store_kind_from_env_value(Some("  ".into())).unwrap(),
            StoreKind::File
        );
    }

    #[test]
    fn store_kind_parses_case_insensitively() {
        assert_eq!(
            store_kind_from_env_value(Some("Memory".into())).unwrap(),
            StoreKind::Memory
        );
        assert!(store_kind_from_env_value(Some("postgres".into())).is_err());
    }

    #[test]
    fn file_store_requires_data_dir() {
        let err = CoreConfig::new(PathBuf::new(), StoreKind::File).expect_err("empty dir");
        assert!(matches!(err, ClinicError::InvalidArgument(_)));
        assert!(CoreConfig::new(PathBuf::new(), StoreKind::Memory).is_ok());
    }

    #[test]
    fn record_dirs_hang_off_data_dir() {
        let cfg = CoreConfig::new(PathBuf::from("/srv/clinic"), StoreKind::File).unwrap();
        assert_eq!(cfg.submissions_dir(), PathBuf::from("/srv/clinic/submissions"));
        assert_eq!(cfg.users_dir(), PathBuf::from("/srv/clinic/users"));
        assert_eq!(cfg.clinics_dir(), PathBuf::from("/srv/clinic/clinics"));
        assert_eq!(cfg.max_form_data_bytes(), DEFAULT_MAX_FORM_DATA_BYTES);
    }
}
