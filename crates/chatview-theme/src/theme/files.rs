//! File lookup inside a theme bundle.

use std::path::{Component, Path, PathBuf};

/// Resolve `rel` to a file under `base`.
///
/// Leading slashes are ignored. Paths with `..` or a root, and paths whose
/// canonical form (symlinks resolved) leaves `base`, resolve to `None`. With
/// `case_insensitive` each missing component is matched against the
/// directory listing ignoring case.
pub fn resolve_file(base: &Path, rel: &str, case_insensitive: bool) -> Option<PathBuf> {
    let clean = rel.trim_start_matches('/');
    if clean.is_empty() {
        return None;
    }
    let rel_path = Path::new(clean);
    if !rel_path
        .components()
        .all(|c| matches!(c, Component::Normal(_) | Component::CurDir))
    {
        return None;
    }

    let direct = base.join(rel_path);
    let candidate = if direct.is_file() {
        direct
    } else if case_insensitive {
        find_ignoring_case(base, rel_path)?
    } else {
        return None;
    };

    // Prevent directory traversal (including symlink bypass).
    let canonical_base = std::fs::canonicalize(base).ok()?;
    let canonical_file = std::fs::canonicalize(&candidate).ok()?;
    if !canonical_file.starts_with(&canonical_base) || !canonical_file.is_file() {
        return None;
    }
    Some(canonical_file)
}

fn find_ignoring_case(base: &Path, rel: &Path) -> Option<PathBuf> {
    let mut current = base.to_path_buf();
    for component in rel.components() {
        let Component::Normal(wanted) = component else {
            continue;
        };
        let exact = current.join(wanted);
        if exact.exists() {
            current = exact;
            continue;
        }
        let wanted = wanted.to_str()?.to_lowercase();
        let found = std::fs::read_dir(&current)
            .ok()?
            .flatten()
            .find(|entry| {
                entry
                    .file_name()
                    .to_str()
                    .is_some_and(|name| name.to_lowercase() == wanted)
            })?;
        current = found.path();
    }
    Some(current)
}

/// Read the file `rel` resolves to, see [`resolve_file`].
pub fn read_file(base: &Path, rel: &str, case_insensitive: bool) -> Option<Vec<u8>> {
    let path = resolve_file(base, rel, case_insensitive)?;
    match std::fs::read(&path) {
        Ok(data) => Some(data),
        Err(e) => {
            tracing::debug!(path = %path.display(), error = %e, "failed to read theme file");
            None
        }
    }
}

/// Guess MIME type from file extension.
pub fn mime_from_extension(path: &str) -> &'static str {
    let ext = Path::new(path)
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase);
    match ext.as_deref() {
        Some("html") | Some("htm") => "text/html",
        Some("css") => "text/css",
        Some("js") | Some("mjs") => "application/javascript",
        Some("json") => "application/json",
        Some("png") => "image/png",
        Some("jpg") | Some("jpeg") => "image/jpeg",
        Some("gif") => "image/gif",
        Some("svg") => "image/svg+xml",
        Some("ico") => "image/x-icon",
        Some("webp") => "image/webp",
        Some("woff") => "font/woff",
        Some("woff2") => "font/woff2",
        Some("ttf") => "font/ttf",
        Some("otf") => "font/otf",
        Some("mp3") => "audio/mpeg",
        Some("ogg") => "audio/ogg",
        Some("wav") => "audio/wav",
        Some("txt") => "text/plain",
        Some("xml") => "application/xml",
        _ => "application/octet-stream",
    }
}
