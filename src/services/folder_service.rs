use std::path::Path;

use tracing::debug;

/// Synthetic first entry of every folder listing; selecting it disables folder filtering.
pub const ALL_FOLDERS_LABEL: &str = "All Folders";

/// Turns a screenshots root into folder-filter labels.
pub trait FolderLabeler {
    fn labels(&self, root: &Path) -> Vec<String>;
}

/// Lists subdirectories down to `depth` levels as `/`-joined labels, each level sorted in
/// reverse name order. With the default depth of 2 and `YYYY/MM` folders this gives
/// `2024`, `2024/03`, `2024/02`, ..., `2023`, ... newest first.
#[derive(Debug, Clone, Copy)]
pub struct NestedDirLabeler {
    pub depth: usize,
}

impl Default for NestedDirLabeler {
    fn default() -> Self {
        Self { depth: 2 }
    }
}

impl FolderLabeler for NestedDirLabeler {
    fn labels(&self, root: &Path) -> Vec<String> {
        let mut out = Vec::new();
        collect_labels(root, None, self.depth, &mut out);
        out
    }
}

fn sorted_subdirs(dir: &Path) -> Vec<String> {
    let entries = match std::fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) => {
            debug!(dir = %dir.display(), error = %e, "cannot list folder");
            return Vec::new();
        }
    };

    let mut names: Vec<String> = entries
        .filter_map(|e| e.ok())
        .filter(|e| e.path().is_dir())
        .map(|e| e.file_name().to_string_lossy().to_string())
        .collect();
    names.sort_by(|a, b| b.cmp(a));
    names
}

fn collect_labels(dir: &Path, prefix: Option<&str>, remaining: usize, out: &mut Vec<String>) {
    if remaining == 0 {
        return;
    }

    for name in sorted_subdirs(dir) {
        let label = match prefix {
            Some(prefix) => format!("{prefix}/{name}"),
            None => name.clone(),
        };
        out.push(label.clone());
        collect_labels(&dir.join(&name), Some(&label), remaining - 1, out);
    }
}

/// "All Folders" followed by the labeler's entries for `root`, if it exists.
pub fn list_folders(root: Option<&Path>, labeler: &dyn FolderLabeler) -> Vec<String> {
    let mut folders = vec![ALL_FOLDERS_LABEL.to_string()];
    if let Some(root) = root.filter(|r| r.is_dir()) {
        folders.extend(labeler.labels(root));
    }
    folders
}
