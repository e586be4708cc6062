use std::{
    fs,
    path::{Path, PathBuf},
};

use log::error;
use serde::{de::DeserializeOwned, Serialize};
use u810::{CalibrationSnapshot, ParamStore, Params};

use crate::errors::{AppError, Result};

pub const DEFAULT_PARAMS_PATH: &str = "/var/lib/u810-touch/params";
pub const DEFAULT_CALIBRATION_PATH: &str = "/var/lib/u810-touch/calibration";

/// Parameter store shared between the daemon and `touchctl`.
///
/// `params` is written by the helper and read by the daemon; `calibration` the
/// other way round. Both are postcard blobs replaced atomically on write.
#[derive(Debug, Clone)]
pub struct FileParamStore {
    params_path: PathBuf,
    calibration_path: PathBuf,
}

impl FileParamStore {
    pub fn new(params_path: impl Into<PathBuf>, calibration_path: impl Into<PathBuf>) -> Self {
        Self {
            params_path: params_path.into(),
            calibration_path: calibration_path.into(),
        }
    }

    pub fn params_path(&self) -> &Path {
        &self.params_path
    }

    pub fn save(&self, params: &Params) -> Result<()> {
        write_postcard(&self.params_path, params)
    }

    pub fn load_calibration(&self) -> Result<Option<CalibrationSnapshot>> {
        read_postcard(&self.calibration_path)
    }
}

impl ParamStore for FileParamStore {
    type Error = AppError;

    /// Missing or unreadable-as-postcard files fall back to the factory
    /// parameters.
    fn load(&self) -> Result<Params> {
        Ok(read_postcard(&self.params_path)?.unwrap_or_default())
    }

    fn store_calibration(&self, snapshot: &CalibrationSnapshot) -> Result<()> {
        write_postcard(&self.calibration_path, snapshot)
    }
}

fn read_postcard<T: DeserializeOwned>(path: &Path) -> Result<Option<T>> {
    if !path.exists() {
        return Ok(None);
    }
    let data = fs::read(path)?;
    match postcard::from_bytes::<T>(&data) {
        Ok(value) => Ok(Some(value)),
        Err(e) => {
            error!("Failed to deserialize {}: {e}", path.display());
            Ok(None)
        }
    }
}

fn write_postcard<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let staging = path.with_extension("new");
    fs::write(&staging, postcard::to_stdvec(value)?)?;
    fs::rename(&staging, path)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store(dir: &tempfile::TempDir) -> FileParamStore {
        FileParamStore::new(dir.path().join("params"), dir.path().join("calibration"))
    }

    #[test]
    fn missing_params_are_the_defaults() {
        let dir = tempfile::tempdir().unwrap();
        assert_eq!(store(&dir).load().unwrap(), Params::default());
        assert_eq!(store(&dir).load_calibration().unwrap(), None);
    }

    #[test]
    fn saved_params_are_loaded_back() {
        let dir = tempfile::tempdir().unwrap();
        let store = store(&dir);
        let params = Params {
            orientation: 2,
            calibrate: true,
            touch_min_x: 90,
            ..Default::default()
        };
        store.save(&params).unwrap();
        assert_eq!(store.load().unwrap(), params);
        assert!(!dir.path().join("params.new").exists());
    }

    #[test]
    fn garbage_params_fall_back_to_defaults() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("params"), [0xff; 3]).unwrap();
        assert_eq!(store(&dir).load().unwrap(), Params::default());
    }

    #[test]
    fn calibration_snapshot_is_persisted() {
        let dir = tempfile::tempdir().unwrap();
        let store = store(&dir);
        let snapshot = CalibrationSnapshot {
            min_x: 121,
            min_y: 233,
            max_x: 3841,
            max_y: 3907,
        };
        store.store_calibration(&snapshot).unwrap();
        assert_eq!(store.load_calibration().unwrap(), Some(snapshot));
    }

    #[test]
    fn parent_directories_are_created() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileParamStore::new(dir.path().join("a/b/params"), dir.path().join("cal"));
        store.save(&Params::default()).unwrap();
        assert!(dir.path().join("a/b/params").exists());
    }
}
