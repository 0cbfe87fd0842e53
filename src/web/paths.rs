// Image path resolution for `POST /analyze`.
//
// Callers send either an absolute path or one relative to the upload root.
// The path is tried as given first, then under `image_root`.

use std::path::{Path, PathBuf};

/// Where a requested path was looked for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolved {
    Found(PathBuf),
    /// Not found anywhere. Carries the last candidate tried, reported back
    /// to the caller as `ruta_resuelta`.
    Missing(PathBuf),
}

pub fn resolve_image_path(requested: &str, image_root: &Path) -> Resolved {
    let as_given = PathBuf::from(requested);
    if as_given.is_file() {
        return Resolved::Found(as_given);
    }

    if as_given.is_absolute() {
        return Resolved::Missing(as_given);
    }

    let under_root = image_root.join(&as_given);
    if under_root.is_file() {
        Resolved::Found(under_root)
    } else {
        Resolved::Missing(under_root)
    }
}
