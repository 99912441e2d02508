//! `#include` search-path resolution: quoted includes search the including file's own
//! directory before the configured search paths; angle includes skip straight to the
//! configured paths. `#include_next` reuses the same candidate list but starts searching past
//! whichever directory satisfied the including file's own `#include`.

use std::path::{Path, PathBuf};

/// Builds the ordered list of directories a `#include` (quoted or angled) searches.
pub fn candidates(is_system: bool, including_dir: Option<&Path>, user_dirs: &[PathBuf], system_dirs: &[PathBuf]) -> Vec<PathBuf> {
    let mut v = Vec::new();
    if !is_system {
        if let Some(d) = including_dir {
            v.push(d.to_path_buf());
        }
    }
    v.extend(user_dirs.iter().cloned());
    v.extend(system_dirs.iter().cloned());
    v
}

/// Searches `dirs` starting at index `start_at` for a regular file named `name`. Returns the
/// resolved path and the index of the directory it was found in (so a later `#include_next`
/// from the same file can resume past it).
pub fn find(name: &str, dirs: &[PathBuf], start_at: usize) -> Option<(PathBuf, usize)> {
    dirs.iter()
        .enumerate()
        .skip(start_at)
        .map(|(i, d)| (i, d.join(name)))
        .find(|(_, candidate)| candidate.is_file())
        .map(|(i, candidate)| (candidate, i))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn quoted_include_prefers_including_directory() {
        let dirs = candidates(false, Some(Path::new("/src")), &[PathBuf::from("/usr/include")], &[]);
        assert_eq!(dirs[0], PathBuf::from("/src"));
    }

    #[test]
    fn angle_include_skips_including_directory() {
        let dirs = candidates(true, Some(Path::new("/src")), &[PathBuf::from("/usr/include")], &[]);
        assert_eq!(dirs, vec![PathBuf::from("/usr/include")]);
    }
}
