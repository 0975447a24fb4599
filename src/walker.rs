use std::{
    collections::BTreeSet,
    path::{Path, PathBuf},
};

use crate::descriptor::DESCRIPTOR_FILE;

/// Image extensions that can be sent as-is.
const IMAGE_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "webp"];

/// Image extensions that need conversion before they can be displayed.
const HEIC_EXTENSIONS: &[&str] = &["heic", "heif"];

/// List the names of the immediate child directories of `root`.
///
/// Symlinks are not followed. Names starting with `.` are skipped unless
/// `include_hidden` is set, and names that are not valid UTF-8 are skipped
/// since they could not be carried in a change event. Entries that vanish
/// or become unreadable mid-scan are skipped, and an unreadable or missing
/// root yields an empty set.
pub fn list_child_folders(
    root: &Path,
    include_hidden: bool,
) -> BTreeSet<String> {
    let entries = match std::fs::read_dir(root) {
        Ok(entries) => entries,
        Err(e) => {
            tracing::debug!(root = %root.display(), "cannot list root: {e}");
            return BTreeSet::new();
        }
    };

    let mut names = BTreeSet::new();
    for entry in entries.flatten() {
        match entry.file_type() {
            Ok(t) if t.is_dir() => {}
            _ => continue,
        }

        let Ok(name) = entry.file_name().into_string() else {
            tracing::debug!(
                path = %entry.path().display(),
                "skipping non UTF-8 name"
            );
            continue;
        };

        if !include_hidden && name.starts_with('.') {
            continue;
        }
        names.insert(name);
    }
    names
}

/// List the regular files directly inside `dir`, sorted by path.
pub fn list_files(dir: &Path) -> std::io::Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    for entry in std::fs::read_dir(dir)? {
        let entry = entry?;
        if entry.file_type()?.is_file() {
            files.push(entry.path());
        }
    }
    files.sort();
    Ok(files)
}

/// What an attachment inside an archive folder is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttachmentKind {
    Image,
    /// HEIC/HEIF photo, typically from a phone camera.
    HeicImage,
    Descriptor,
    Other,
}

impl AttachmentKind {
    pub fn of(path: &Path) -> Self {
        if path.file_name().and_then(|n| n.to_str()) == Some(DESCRIPTOR_FILE) {
            return Self::Descriptor;
        }

        let Some(ext) = path
            .extension()
            .and_then(|ext| ext.to_str())
            .map(str::to_ascii_lowercase)
        else {
            return Self::Other;
        };

        if IMAGE_EXTENSIONS.contains(&ext.as_str()) {
            Self::Image
        } else if HEIC_EXTENSIONS.contains(&ext.as_str()) {
            Self::HeicImage
        } else {
            Self::Other
        }
    }

    pub fn is_image(self) -> bool {
        matches!(self, Self::Image | Self::HeicImage)
    }
}
