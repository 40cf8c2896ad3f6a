//! Resource path normalization.
//!
//! Paths are the identity of a resource, so equivalent spellings must
//! collapse to a single canonical form: `.` and `..` components are resolved
//! lexically, separators are unified to `/`, and trailing separators are
//! dropped. Case is preserved; whether two paths differing only in case are
//! the same resource is a platform concern left to the caller.

use crate::error::{Error, Result};

/// Normalize a raw path string into its canonical form.
///
/// Normalization is idempotent: `normalize_path(&normalize_path(p)?) == normalize_path(p)`.
///
/// Returns [`Error::InvalidPath`] for empty input, for relative paths that
/// escape their root (e.g. `../x`), and for paths that normalize to nothing.
pub fn normalize_path(raw: &str) -> Result<String> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(Error::InvalidPath(raw.to_string()));
    }

    let unified = trimmed.replace('\\', "/");
    let absolute = unified.starts_with('/');

    let mut parts: Vec<&str> = Vec::new();
    for component in unified.split('/') {
        match component {
            "" | "." => {}
            ".." => {
                if parts.pop().is_none() {
                    if absolute {
                        // Parent of the root is the root.
                        continue;
                    }
                    return Err(Error::InvalidPath(raw.to_string()));
                }
            }
            other => parts.push(other),
        }
    }

    if parts.is_empty() {
        if absolute {
            return Ok("/".to_string());
        }
        return Err(Error::InvalidPath(raw.to_string()));
    }

    let joined = parts.join("/");
    if absolute {
        Ok(format!("/{joined}"))
    } else {
        Ok(joined)
    }
}
