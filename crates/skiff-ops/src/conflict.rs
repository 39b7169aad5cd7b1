//! Destination-name conflict resolution.

use std::path::{Path, PathBuf};

use skiff_core::OpsError;

/// Split a file name into stem and extension (extension keeps its dot).
///
/// The split point is the last `.`, except that the leading dot of a
/// dotfile is never a separator: `.gitignore` has no extension, while
/// `.config.yml` splits into `.config` / `.yml`.
fn split_name(name: &str) -> (&str, &str) {
    let search = name.strip_prefix('.').unwrap_or(name);
    match search.rfind('.') {
        Some(idx) => {
            let split = name.len() - search.len() + idx;
            (&name[..split], &name[split..])
        }
        None => (name, ""),
    }
}

/// An entry occupies a name even when it is a broken symlink.
fn occupied(path: &Path) -> bool {
    path.symlink_metadata().is_ok()
}

/// Compute a destination path in `dir` that does not collide with an
/// existing entry.
///
/// `name` is returned unchanged when it is free; otherwise `stem(n).ext`
/// is tried for n = 1, 2, … up to `max_attempts`. The existence check and
/// the eventual create are not atomic, so a racing writer can still claim
/// the name; that surfaces later as a write error rather than an overwrite.
pub fn resolve_collision(
    dir: &Path,
    name: &str,
    max_attempts: u32,
) -> Result<PathBuf, OpsError> {
    let direct = dir.join(name);
    if !occupied(&direct) {
        return Ok(direct);
    }

    let (stem, ext) = split_name(name);
    for n in 1..=max_attempts {
        let candidate = dir.join(format!("{stem}({n}){ext}"));
        if !occupied(&candidate) {
            return Ok(candidate);
        }
    }

    Err(OpsError::ConflictResolutionExhausted {
        path: direct,
        attempts: max_attempts,
    })
}
