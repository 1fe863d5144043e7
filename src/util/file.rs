use std::{
    env,
    fs::File,
    io::Read,
    path::{Path, PathBuf},
};

use crate::error::IoError;

/// Resolves a user supplied path to an absolute path.
///
/// A leading `~/` is replaced by the home directory, relative paths are taken
/// relative to the current working directory. The path is not required to
/// exist.
pub fn abs_path(path: &Path) -> Result<PathBuf, IoError> {
    let expanded = match path.strip_prefix("~") {
        Ok(rest) => match env::var_os("HOME") {
            Some(home) => PathBuf::from(home).join(rest),
            None => path.to_path_buf(),
        },
        Err(_) => path.to_path_buf(),
    };

    std::path::absolute(&expanded)
        .map_err(|e| IoError::new(format!("Could not resolve path '{}'", path.to_string_lossy()), e))
}

/// Reads the complete file at the given path.
pub fn read(path: &Path) -> Result<Vec<u8>, IoError> {
    let mut f = File::open(path).map_err(|e| IoError::new(format!("Could not open: '{}'", path.to_string_lossy()), e))?;
    let mut bytes = Vec::new();
    f.read_to_end(&mut bytes)
        .map_err(|e| IoError::new(format!("Could not read: '{}'", path.to_string_lossy()), e))?;

    trace!("Read {} bytes from {}", bytes.len(), path.to_string_lossy());
    Ok(bytes)
}

//------------ Tests ---------------------------------------------------------
