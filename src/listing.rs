//! Directory listing: entry construction, extension classification and the
//! static lookup tables for language tags and icons.
//!
//! Entries are built fresh on every browse; nothing is cached. Hidden entries
//! (dot-prefixed) and broken symlinks are excluded. Lookup tables are loaded
//! once and queried by exact lowercase extension; misses fall back to a
//! default category rather than failing.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::UNIX_EPOCH;

use once_cell::sync::Lazy;
use serde::Serialize;

use crate::fsops::{self, FsResult};
use crate::security::Allowlist;

pub const VIEWABLE_EXTENSIONS: &[&str] = &[
    ".md", ".json", ".yaml", ".yml", ".txt", ".py", ".sh", ".js",
    ".html", ".css", ".xml", ".ini", ".conf", ".log", ".toml",
    ".cfg", ".env", ".rs", ".go", ".java", ".c", ".cpp", ".h",
    ".ts", ".tsx", ".jsx", ".sql", ".r", ".rb", ".php", ".pl",
    ".lua", ".vim", ".csv", ".diff", ".patch", ".bat", ".ps1",
];

pub const IMAGE_EXTENSIONS: &[&str] = &[
    ".png", ".jpg", ".jpeg", ".gif", ".bmp", ".webp", ".svg", ".ico", ".tiff", ".tif",
];

static LANG_MAP: Lazy<HashMap<&'static str, &'static str>> = Lazy::new(|| {
    HashMap::from([
        (".json", "json"), (".yaml", "yaml"), (".yml", "yaml"),
        (".py", "python"), (".sh", "bash"), (".js", "javascript"),
        (".html", "html"), (".css", "css"), (".txt", "text"),
        (".xml", "xml"), (".ini", "ini"), (".conf", "ini"),
        (".log", "text"), (".toml", "toml"), (".cfg", "ini"),
        (".env", "bash"), (".rs", "rust"), (".go", "go"),
        (".java", "java"), (".c", "c"), (".cpp", "cpp"), (".h", "c"),
        (".ts", "typescript"), (".tsx", "typescript"), (".jsx", "javascript"),
        (".sql", "sql"), (".r", "r"), (".rb", "ruby"), (".php", "php"),
        (".pl", "perl"), (".lua", "lua"), (".vim", "vim"),
        (".csv", "text"), (".diff", "diff"), (".patch", "diff"),
        (".bat", "batch"), (".ps1", "powershell"),
    ])
});

static ICON_MAP: Lazy<HashMap<&'static str, &'static str>> = Lazy::new(|| {
    HashMap::from([
        (".md", "📄"), (".json", "📋"), (".yaml", "⚙️"), (".yml", "⚙️"),
        (".py", "🐍"), (".sh", "🔧"), (".js", "📜"), (".html", "🌐"),
        (".css", "🎨"), (".txt", "📝"), (".log", "📊"),
        (".db", "🗄️"), (".sqlite", "🗄️"),
        (".png", "🖼️"), (".jpg", "🖼️"), (".jpeg", "🖼️"), (".gif", "🖼️"),
        (".pdf", "📕"), (".rs", "🦀"), (".go", "🐹"), (".java", "☕"),
        (".ts", "📜"), (".tsx", "📜"), (".jsx", "📜"),
    ])
});

/// Lowercased extension including the leading dot, or "" when the name has
/// none. A leading dot alone (hidden files) does not count as an extension.
pub fn extension_of(name: &str) -> String {
    match name.rfind('.') {
        Some(idx) if idx > 0 => name[idx..].to_lowercase(),
        _ => String::new(),
    }
}

pub fn lang_for(ext: &str) -> &'static str {
    LANG_MAP.get(ext).copied().unwrap_or("text")
}

pub fn icon_for(ext: &str) -> &'static str {
    ICON_MAP.get(ext).copied().unwrap_or("📄")
}

pub fn is_text_viewable(ext: &str) -> bool {
    VIEWABLE_EXTENSIONS.contains(&ext)
}

pub fn is_image_extension(ext: &str) -> bool {
    IMAGE_EXTENSIONS.contains(&ext)
}

/// Viewable: recognized by the text renderer, by the image renderer, or
/// carrying no extension at all.
pub fn is_viewable(ext: &str) -> bool {
    ext.is_empty() || is_text_viewable(ext) || is_image_extension(ext)
}

/// Human-readable size, one decimal place.
pub fn format_size(size: u64) -> String {
    let mut s = size as f64;
    for unit in ["B", "KB", "MB", "GB"] {
        if s < 1024.0 {
            return format!("{s:.1} {unit}");
        }
        s /= 1024.0;
    }
    format!("{s:.1} TB")
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum EntryKind {
    File,
    Directory,
    Parent,
}

#[derive(Debug, Clone, Serialize)]
pub struct DirectoryEntry {
    pub name: String,
    #[serde(rename = "type")]
    pub kind: EntryKind,
    pub path: String,
    pub size: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub size_human: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mtime: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub extension: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub viewable: Option<bool>,
    pub icon: &'static str,
}

#[derive(Debug, Clone, Serialize)]
pub struct BrowseStats {
    pub directories: usize,
    pub files: usize,
    pub viewable: usize,
}

#[derive(Debug)]
pub struct BrowseListing {
    pub items: Vec<DirectoryEntry>,
    pub parent: Option<PathBuf>,
    pub stats: BrowseStats,
}

fn mtime_secs(md: &std::fs::Metadata) -> f64 {
    md.modified()
        .ok()
        .and_then(|t| t.duration_since(UNIX_EPOCH).ok())
        .map(|d| d.as_secs_f64())
        .unwrap_or(0.0)
}

/// Build the full listing for an authorized directory: parent entry first
/// (only when the parent itself is allowed), then entries sorted by name,
/// hidden entries and broken symlinks dropped.
pub fn browse(dir: &Path, allow: &Allowlist) -> FsResult<BrowseListing> {
    let mut items: Vec<DirectoryEntry> = Vec::new();

    let parent = dir.parent().map(Path::to_path_buf);
    let parent_allowed = parent
        .as_ref()
        .map(|p| allow.is_allowed(p))
        .unwrap_or(false);
    if let Some(p) = parent.as_ref() {
        if parent_allowed && p.as_path() != dir {
            items.push(DirectoryEntry {
                name: "..".to_string(),
                kind: EntryKind::Parent,
                path: p.to_string_lossy().into_owned(),
                size: 0,
                size_human: None,
                mtime: None,
                extension: None,
                viewable: None,
                icon: "⬆️",
            });
        }
    }

    let mut raw = fsops::list(dir)?;
    raw.sort_by(|a, b| a.name.cmp(&b.name));

    for entry in raw {
        if entry.name.starts_with('.') {
            continue;
        }
        let Some(md) = entry.metadata else {
            continue; // broken symlink
        };
        if md.is_dir() {
            items.push(DirectoryEntry {
                name: entry.name,
                kind: EntryKind::Directory,
                path: entry.path.to_string_lossy().into_owned(),
                size: 0,
                size_human: None,
                mtime: Some(mtime_secs(&md)),
                extension: None,
                viewable: None,
                icon: "📁",
            });
        } else {
            let ext = extension_of(&entry.name);
            let size = md.len();
            items.push(DirectoryEntry {
                name: entry.name,
                kind: EntryKind::File,
                path: entry.path.to_string_lossy().into_owned(),
                size,
                size_human: Some(format_size(size)),
                mtime: Some(mtime_secs(&md)),
                viewable: Some(is_viewable(&ext)),
                icon: icon_for(&ext),
                extension: Some(ext),
            });
        }
    }

    let stats = BrowseStats {
        directories: items.iter().filter(|i| i.kind == EntryKind::Directory).count(),
        files: items.iter().filter(|i| i.kind == EntryKind::File).count(),
        viewable: items.iter().filter(|i| i.viewable == Some(true)).count(),
    };

    Ok(BrowseListing {
        items,
        parent: parent_allowed.then(|| parent.unwrap()),
        stats,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn extension_of_mirrors_splitext() {
        assert_eq!(extension_of("a.md"), ".md");
        assert_eq!(extension_of("Readme.MD"), ".md");
        assert_eq!(extension_of("archive.tar.gz"), ".gz");
        assert_eq!(extension_of("Makefile"), "");
        assert_eq!(extension_of(".gitignore"), "");
    }

    #[test]
    fn lookup_tables_fall_back() {
        assert_eq!(lang_for(".py"), "python");
        assert_eq!(lang_for(".unknown"), "text");
        assert_eq!(icon_for(".rs"), "🦀");
        assert_eq!(icon_for(".zzz"), "📄");
    }

    #[test]
    fn viewability_classification() {
        assert!(is_viewable(".md"));
        assert!(is_viewable(".png"));
        assert!(is_viewable(""));
        assert!(!is_viewable(".exe"));
        assert!(!is_text_viewable(".png"));
    }

    #[test]
    fn format_size_units() {
        assert_eq!(format_size(0), "0.0 B");
        assert_eq!(format_size(512), "512.0 B");
        assert_eq!(format_size(2048), "2.0 KB");
        assert_eq!(format_size(5 * 1024 * 1024), "5.0 MB");
    }

    #[test]
    fn browse_filters_and_sorts() {
        let tmp = tempdir().unwrap();
        let root = tmp.path();
        fs::create_dir(root.join(".git")).unwrap();
        fs::write(root.join("a.md"), "a").unwrap();
        fs::write(root.join("z.py"), "z").unwrap();
        fs::write(root.join("Readme.MD"), "r").unwrap();

        let allow = Allowlist::new([root.to_string_lossy()]);
        let listing = browse(root, &allow).unwrap();

        let names: Vec<&str> = listing.items.iter().map(|i| i.name.as_str()).collect();
        assert_eq!(names, vec!["Readme.MD", "a.md", "z.py"]);
        assert!(listing.items.iter().all(|i| i.viewable == Some(true)));
        assert_eq!(listing.stats.files, 3);
        assert_eq!(listing.stats.directories, 0);
        assert_eq!(listing.stats.viewable, 3);
        // tempdir parent is outside the allowlist
        assert!(listing.parent.is_none());
    }

    #[test]
    fn browse_lists_parent_when_allowed() {
        let tmp = tempdir().unwrap();
        let root = tmp.path();
        let sub = root.join("sub");
        fs::create_dir(&sub).unwrap();

        let allow = Allowlist::new([root.to_string_lossy()]);
        let listing = browse(&sub, &allow).unwrap();
        assert_eq!(listing.items.first().map(|i| i.name.as_str()), Some(".."));
        assert_eq!(listing.items[0].kind, EntryKind::Parent);
        assert_eq!(listing.parent.as_deref(), Some(root));
    }

    #[test]
    fn browse_skips_broken_symlinks() {
        #[cfg(unix)]
        {
            let tmp = tempdir().unwrap();
            let root = tmp.path();
            fs::write(root.join("real.txt"), "x").unwrap();
            std::os::unix::fs::symlink(root.join("gone"), root.join("dangling")).unwrap();

            let allow = Allowlist::new([root.to_string_lossy()]);
            let listing = browse(root, &allow).unwrap();
            let names: Vec<&str> = listing.items.iter().map(|i| i.name.as_str()).collect();
            assert_eq!(names, vec!["real.txt"]);
        }
    }
}
