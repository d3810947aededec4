//! Result selection for salvaged and fallback outputs
//!
//! Picks the primary file among the side files a retrieval left behind,
//! by extension and size only. File contents are never inspected.

use std::path::{Path, PathBuf};

/// Pick the most plausible final artifact among `candidates`
///
/// Paths ending in `partial_suffix` and paths that are not existing regular
/// files are skipped. Among the rest, the largest file whose extension
/// equals `preferred_ext` (case-insensitive, without the dot) wins; if none
/// has that extension, the largest file overall wins. Ties keep the
/// earliest candidate.
pub fn choose_primary_file<P: AsRef<Path>>(
    candidates: &[P],
    preferred_ext: &str,
    partial_suffix: &str,
) -> Option<PathBuf> {
    let preferred_ext = preferred_ext.trim_start_matches('.');

    let sized: Vec<(&Path, u64)> = candidates
        .iter()
        .map(AsRef::<Path>::as_ref)
        .filter(|path| !is_partial(path, partial_suffix))
        .filter_map(|path| match std::fs::metadata(path) {
            Ok(meta) if meta.is_file() => Some((path, meta.len())),
            _ => None,
        })
        .collect();

    let preferred = largest(
        sized
            .iter()
            .copied()
            .filter(|(path, _)| has_extension(path, preferred_ext)),
    );

    preferred
        .or_else(|| largest(sized.iter().copied()))
        .map(Path::to_path_buf)
}

/// Whether `path` still carries the in-progress suffix
pub fn is_partial(path: &Path, partial_suffix: &str) -> bool {
    !partial_suffix.is_empty() && path.to_string_lossy().ends_with(partial_suffix)
}

fn has_extension(path: &Path, ext: &str) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case(ext))
}

fn largest<'a>(files: impl Iterator<Item = (&'a Path, u64)>) -> Option<&'a Path> {
    let mut best: Option<(&Path, u64)> = None;
    for (path, size) in files {
        if best.is_none_or(|(_, best_size)| size > best_size) {
            best = Some((path, size));
        }
    }
    best.map(|(path, _)| path)
}
