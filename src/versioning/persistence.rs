//! On-disk format of the version registry.

use std::fs;
use std::io;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{LifecycleError, LifecycleResult};
use crate::types::EventVersion;
use crate::utils::atomic_write;

/// Format revision written to every registry file
const FORMAT_VERSION: u32 = 1;

/// Top-level registry persistence format.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(super) struct RegistryData {
    pub format_version: u32,
    pub versions: Vec<EventVersion>,
}

/// Load every persisted version; a missing file is an empty registry.
pub(super) fn load(path: &Path) -> LifecycleResult<Vec<EventVersion>> {
    let bytes = match fs::read(path) {
        Ok(bytes) => bytes,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(LifecycleError::Io(e)),
    };

    let data: RegistryData = serde_json::from_slice(&bytes)?;
    if data.format_version != FORMAT_VERSION {
        return Err(LifecycleError::Validation(format!(
            "unsupported version registry format {} in {}",
            data.format_version,
            path.display()
        )));
    }
    Ok(data.versions)
}

pub(super) fn save(path: &Path, versions: Vec<EventVersion>) -> LifecycleResult<()> {
    let data = RegistryData {
        format_version: FORMAT_VERSION,
        versions,
    };
    let bytes = serde_json::to_vec_pretty(&data)?;
    atomic_write(path, &bytes)?;
    Ok(())
}
