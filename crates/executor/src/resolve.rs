//! Executable lookup: absolute paths are checked directly, bare names scan PATH.

use crate::error::SandboxError;
use std::ffi::OsStr;
use std::path::{Path, PathBuf};

#[cfg(unix)]
fn is_executable(path: &Path) -> bool {
    use std::os::unix::fs::PermissionsExt;
    std::fs::metadata(path)
        .map(|meta| meta.is_file() && meta.permissions().mode() & 0o111 != 0)
        .unwrap_or(false)
}

#[cfg(not(unix))]
fn is_executable(path: &Path) -> bool {
    path.is_file()
}

/// Resolve `name` to an executable path. First PATH match wins.
pub fn resolve_executable(name: &str, path_var: Option<&OsStr>) -> Result<PathBuf, SandboxError> {
    let candidate = Path::new(name);

    if candidate.is_absolute() || name.contains('/') {
        return if is_executable(candidate) {
            Ok(candidate.to_path_buf())
        } else {
            Err(SandboxError::ExecutableNotFound(name.to_string()))
        };
    }

    if let Some(path_var) = path_var {
        for dir in std::env::split_paths(path_var) {
            if dir.as_os_str().is_empty() {
                continue;
            }
            let full = dir.join(name);
            if is_executable(&full) {
                return Ok(full);
            }
        }
    }

    Err(SandboxError::ExecutableNotFound(name.to_string()))
}
