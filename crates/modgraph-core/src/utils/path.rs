//! Import path classification.
//!
//! Import paths are slash-separated and never filesystem paths, but local and
//! absolute forms still show up in source and must be rejected in module mode.

use camino::Utf8Path;

use crate::error::{ModError, ModResult};

/// Check for `.`/`..` relative imports
pub fn is_local_import(path: &str) -> bool {
    path == "." || path == ".." || path.starts_with("./") || path.starts_with("../")
}

/// Imports that never correspond to real packages: the foreign-interface
/// pseudo-package "C" and the legacy appengine shims.
pub fn is_pseudo_import(path: &str) -> bool {
    path == "C"
        || path == "appengine"
        || path.starts_with("appengine/")
        || path == "appengine_internal"
        || path.starts_with("appengine_internal/")
}

/// Check whether `path` equals `prefix` or lies beneath it
pub fn has_path_prefix(path: &str, prefix: &str) -> bool {
    match path.strip_prefix(prefix) {
        Some(rest) => rest.is_empty() || rest.starts_with('/') || prefix.ends_with('/'),
        None => false,
    }
}

/// Reject import paths that cannot be resolved against the build list
pub fn check_import_path(path: &str) -> ModResult<()> {
    let reason = if path.is_empty() {
        "empty import path"
    } else if path.contains('@') {
        "import path must not carry a version"
    } else if is_local_import(path) {
        "local import not allowed in module mode"
    } else if path.starts_with('/') || Utf8Path::new(path).is_absolute() {
        "absolute import path not allowed"
    } else {
        return Ok(());
    };

    Err(ModError::InvalidImport {
        path: path.to_string(),
        reason: reason.to_string(),
    })
}
