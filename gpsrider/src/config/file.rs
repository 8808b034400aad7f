//! JSON preferences file shared between the companion app and hooked processes

use std::{
    fs,
    io::{self, Write},
    path::{Path, PathBuf},
    sync::{Mutex, PoisonError},
    time::SystemTime,
};

use tracing::{debug, trace};

use super::{ConfigSource, ConfigStore, SpoofConfig};
use crate::GpsRiderError;

#[derive(Debug)]
struct Cached {
    modified: SystemTime,
    len: u64,
    config: SpoofConfig,
}

/// Preferences document on disk
///
/// Reads are cached against the file's modification time and length, so the
/// per-call kill-switch check costs a single `stat`. Writes land in a
/// temporary sibling and are renamed over the document.
#[derive(Debug)]
pub struct FileConfig {
    path: PathBuf,
    cache: Mutex<Option<Cached>>,
}

impl FileConfig {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            cache: Mutex::new(None),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn temp_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_else(|| "gpsrider.json".into());
        name.push(".tmp");
        self.path.with_file_name(name)
    }

    fn invalidate(&self) {
        *self.cache.lock().unwrap_or_else(PoisonError::into_inner) = None;
    }
}

impl ConfigSource for FileConfig {
    fn load(&self) -> Result<SpoofConfig, GpsRiderError> {
        let meta = match fs::metadata(&self.path) {
            Ok(m) => m,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                trace!("No preferences at {}", self.path.display());
                return Ok(SpoofConfig::default());
            }
            Err(e) => return Err(e.into()),
        };
        let modified = meta.modified()?;
        let len = meta.len();

        let mut cache = self.cache.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(cached) = cache
            .as_ref()
            .filter(|c| c.modified == modified && c.len == len)
        {
            return Ok(cached.config.clone());
        }

        let bytes = fs::read(&self.path)?;
        let config: SpoofConfig = if bytes.iter().all(u8::is_ascii_whitespace) {
            SpoofConfig::default()
        } else {
            serde_json::from_slice(&bytes)?
        };
        debug!("Reloaded preferences from {}", self.path.display());

        *cache = Some(Cached {
            modified,
            len,
            config: config.clone(),
        });
        Ok(config)
    }
}

impl ConfigStore for FileConfig {
    fn save(&self, config: &SpoofConfig) -> Result<(), GpsRiderError> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }

        let data = serde_json::to_vec_pretty(config)?;
        let temp = self.temp_path();
        {
            let mut f = fs::File::create(&temp)?;
            f.write_all(&data)?;
            f.sync_all()?;
        }
        fs::rename(&temp, &self.path)?;
        self.invalidate();
        Ok(())
    }
}
