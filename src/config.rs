//! Device record file handling

use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use color_eyre::eyre::{Result, WrapErr};
use tracing::{debug, info};
use tvwake_control::DeviceRecord;

/// Used when neither `--config` nor `TVWAKE_CONFIG` is given
pub const DEFAULT_CONFIG_FILE: &str = "tvwake.json";

pub fn resolve_path(explicit: Option<PathBuf>) -> PathBuf {
    explicit.unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_FILE))
}

/// Read the record, treating a missing file as an empty record
pub fn load(path: &Path) -> Result<DeviceRecord> {
    let text = match fs::read_to_string(path) {
        Ok(text) => text,
        Err(e) if e.kind() == ErrorKind::NotFound => {
            debug!(path = %path.display(), "No device record yet");
            return Ok(DeviceRecord::default());
        }
        Err(e) => {
            return Err(e).wrap_err_with(|| format!("Failed to read {}", path.display()));
        }
    };

    if text.trim().is_empty() {
        return Ok(DeviceRecord::default());
    }
    serde_json::from_str(&text).wrap_err_with(|| format!("Failed to parse {}", path.display()))
}

pub fn save(path: &Path, record: &DeviceRecord) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)
            .wrap_err_with(|| format!("Failed to create directory: {}", parent.display()))?;
    }

    let mut json = serde_json::to_string_pretty(record)?;
    json.push('\n');
    fs::write(path, json).wrap_err_with(|| format!("Failed to write {}", path.display()))?;

    info!(path = %path.display(), "Device record saved");
    Ok(())
}
