//! Path resolution: rewrite rule application and lexical normalization.
//!
//! Every caller-supplied path string passes through [`PathResolver::resolve`]
//! before anything else looks at it. Resolution never touches the filesystem
//! and never fails; whether the result is usable is decided afterwards by the
//! allowlist and by per-endpoint existence checks. The order is load-bearing:
//! the rewrite rule must see the raw head of the input, so it runs before
//! separators are unified and `.`/`..` segments are collapsed.

use std::path::{Path, PathBuf};

use path_absolutize::Absolutize;

use crate::config::PathConversion;

pub struct PathResolver {
    rule: Option<PathConversion>,
}

impl PathResolver {
    pub fn new(rule: Option<PathConversion>) -> Self {
        Self { rule }
    }

    /// Turn a raw path string into an absolute, lexically normalized path.
    /// The configured prefix rule matches case-insensitively and substitutes
    /// its replacement verbatim.
    pub fn resolve(&self, raw: &str) -> PathBuf {
        let mut s = raw.to_string();
        if let Some(rule) = &self.rule {
            if !rule.from.is_empty() && head_matches_ci(&s, &rule.from) {
                s = format!("{}{}", rule.to, &s[rule.from.len()..]);
            }
        }
        let s = s.replace('\\', "/");
        lexical_absolute(Path::new(&s))
    }
}

/// Collapse `.`/`..`, drop redundant separators and anchor relative paths at
/// the working directory, without consulting the filesystem.
pub fn lexical_absolute(p: &Path) -> PathBuf {
    p.absolutize()
        .map(|c| c.into_owned())
        .unwrap_or_else(|_| p.to_path_buf())
}

fn head_matches_ci(s: &str, prefix: &str) -> bool {
    s.len() >= prefix.len()
        && s.is_char_boundary(prefix.len())
        && s[..prefix.len()].to_uppercase() == prefix.to_uppercase()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn resolver(rule: Option<(&str, &str)>) -> PathResolver {
        PathResolver::new(rule.map(|(from, to)| PathConversion {
            from: from.to_string(),
            to: to.to_string(),
        }))
    }

    #[test]
    fn no_rule_normalizes_only() {
        let r = resolver(None);
        assert_eq!(r.resolve("/a/b/../c"), PathBuf::from("/a/c"));
        assert_eq!(r.resolve("/a//b/./c"), PathBuf::from("/a/b/c"));
    }

    #[test]
    fn backslashes_are_unified() {
        let r = resolver(None);
        assert_eq!(r.resolve("/srv\\docs\\readme.md"), PathBuf::from("/srv/docs/readme.md"));
    }

    #[test]
    fn rule_matches_prefix_case_insensitively() {
        let r = resolver(Some(("C:\\", "/mnt/c/")));
        assert_eq!(r.resolve("C:\\docs\\a.md"), PathBuf::from("/mnt/c/docs/a.md"));
        assert_eq!(r.resolve("c:\\docs\\a.md"), PathBuf::from("/mnt/c/docs/a.md"));
    }

    #[test]
    fn rule_substitutes_replacement_verbatim() {
        // The match is case-insensitive but the configured replacement is
        // spliced in exactly as written.
        let r = resolver(Some(("/Data/", "/SRV/Data/")));
        assert_eq!(r.resolve("/data/x.txt"), PathBuf::from("/SRV/Data/x.txt"));
    }

    #[test]
    fn unmatched_rule_leaves_path_alone() {
        let r = resolver(Some(("C:\\", "/mnt/c/")));
        assert_eq!(r.resolve("/srv/docs/a.md"), PathBuf::from("/srv/docs/a.md"));
    }

    #[test]
    fn rewrite_happens_before_normalization() {
        // The raw head must match the rule before separators are unified;
        // after rewriting, dot segments still collapse.
        let r = resolver(Some(("C:\\", "/mnt/c/")));
        assert_eq!(r.resolve("C:\\docs\\..\\notes\\b.md"), PathBuf::from("/mnt/c/notes/b.md"));
    }

    #[test]
    fn resolve_is_idempotent() {
        let r = resolver(Some(("C:\\", "/mnt/c/")));
        for raw in ["C:\\docs\\a.md", "/a/b/../c", "relative/x.txt", "/x\\y"] {
            let once = r.resolve(raw);
            let twice = r.resolve(&once.to_string_lossy());
            assert_eq!(once, twice, "resolve not idempotent for {raw}");
        }
    }

    #[test]
    fn relative_paths_become_absolute() {
        let r = resolver(None);
        assert!(r.resolve("some/relative.md").is_absolute());
    }

    #[test]
    fn traversal_collapses_lexically_without_filesystem() {
        let r = resolver(None);
        // None of these paths exist; resolution must still succeed.
        assert_eq!(
            r.resolve("/srv/docs/../../etc/passwd"),
            PathBuf::from("/etc/passwd")
        );
    }
}
