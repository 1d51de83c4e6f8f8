//! Architectural Enforcement Integration Tests
//!
//! Source-level policy tests for the warlink workspace:
//! - All I/O in async code must be async (no `std::fs`, `std::net`,
//!   `reqwest::blocking` inside `async fn`)
//! - No sleeping outside reconnect backoff and armed timers
//!
//! This library holds the line-scanning toolkit the policy tests share.
//! The scan is a text heuristic, not a parser: it truncates each file at
//! its `#[cfg(test)]` module and classifies the nearest enclosing `fn`
//! by walking backwards through the lines.

use std::path::{Path, PathBuf};

/// Directories holding production code, relative to the workspace root
pub const PRODUCTION_DIRS: &[&str] = &["warlink/core/src", "warlink/console/src"];

/// Resolve the workspace root from this package's manifest directory
#[must_use]
pub fn workspace_root() -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR"))
        .ancestors()
        .nth(2)
        .expect("enforcement package sits two levels below the workspace root")
        .to_path_buf()
}

/// Every production `.rs` file under [`PRODUCTION_DIRS`]
#[must_use]
pub fn production_sources() -> Vec<PathBuf> {
    let root = workspace_root();
    let mut sources = Vec::new();

    for dir in PRODUCTION_DIRS {
        let path = root.join(dir);
        if !path.exists() {
            continue;
        }

        for entry in walkdir::WalkDir::new(&path).into_iter().filter_map(Result::ok) {
            if entry.path().extension().and_then(|s| s.to_str()) == Some("rs") {
                sources.push(entry.path().to_path_buf());
            }
        }
    }

    sources
}

/// Strip trailing test modules: everything from the first `#[cfg(test)]` on
/// is test code and exempt from production policies
#[must_use]
pub fn production_code(content: &str) -> &str {
    match content.find("#[cfg(test)]") {
        Some(idx) => &content[..idx],
        None => content,
    }
}

/// The code portion of a line, with any trailing `//` comment removed
#[must_use]
pub fn code_part(line: &str) -> &str {
    line.split("//").next().unwrap_or(line)
}

/// How a function declaration was spelled
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FnKind {
    Async,
    Sync,
}

/// Parse a line as a function declaration, visibility modifiers included
#[must_use]
pub fn fn_signature(line: &str) -> Option<FnKind> {
    let mut rest = line.trim_start();

    if let Some(after) = rest.strip_prefix("pub") {
        // pub, pub(crate), pub(super), pub(in ...)
        rest = match after.strip_prefix('(') {
            Some(inner) => inner.split_once(')')?.1.trim_start(),
            None => after.strip_prefix(' ')?,
        };
    }

    let is_async = match rest.strip_prefix("async ") {
        Some(after) => {
            rest = after;
            true
        }
        None => false,
    };
    rest = rest.strip_prefix("unsafe ").unwrap_or(rest);

    if rest.starts_with("fn ") {
        Some(if is_async { FnKind::Async } else { FnKind::Sync })
    } else {
        None
    }
}

/// Classify the function enclosing `lines[idx]`, walking backwards
///
/// Returns `None` outside any function (module items) or when a module or
/// impl boundary is reached first.
#[must_use]
pub fn enclosing_fn(lines: &[&str], idx: usize) -> Option<FnKind> {
    for i in (0..idx).rev() {
        if let Some(kind) = fn_signature(lines[i]) {
            return Some(kind);
        }

        let trimmed = lines[i].trim();
        if trimmed.starts_with("mod ") || (trimmed.starts_with("impl") && trimmed.contains('{')) {
            return None;
        }
    }
    None
}

/// Whether any of `words` appears within `before` lines above or `after`
/// lines below `idx`, case-insensitively
#[must_use]
pub fn nearby_context(lines: &[&str], idx: usize, before: usize, after: usize, words: &[&str]) -> bool {
    let start = idx.saturating_sub(before);
    let end = (idx + after).min(lines.len());

    lines[start..end].iter().any(|line| {
        let lowered = line.to_lowercase();
        words.iter().any(|word| lowered.contains(word))
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fn_signature_handles_visibility() {
        assert_eq!(fn_signature("fn plain() {"), Some(FnKind::Sync));
        assert_eq!(fn_signature("pub fn loader() -> Result<()> {"), Some(FnKind::Sync));
        assert_eq!(fn_signature("pub(crate) fn helper() {"), Some(FnKind::Sync));
        assert_eq!(fn_signature("async fn fetch() {"), Some(FnKind::Async));
        assert_eq!(fn_signature("pub async fn fetch() {"), Some(FnKind::Async));
        assert_eq!(fn_signature("    pub async fn indented() {"), Some(FnKind::Async));
        assert_eq!(fn_signature("let fn_count = 3;"), None);
        assert_eq!(fn_signature("// fn commented_out() {"), None);
    }

    #[test]
    fn test_enclosing_fn_finds_nearest_declaration() {
        let lines = vec![
            "pub async fn outer() {",
            "    let x = compute();",
            "    std::fs::read_to_string(path)",
            "}",
        ];
        assert_eq!(enclosing_fn(&lines, 2), Some(FnKind::Async));

        let lines = vec![
            "pub fn load_config(path: &Path) -> Result<Config> {",
            "    let raw = std::fs::read_to_string(path)?;",
            "}",
        ];
        assert_eq!(enclosing_fn(&lines, 1), Some(FnKind::Sync));
    }

    #[test]
    fn test_enclosing_fn_stops_at_boundaries() {
        let lines = vec!["async fn earlier() {}", "mod inner {", "    use std::fs;"];
        assert_eq!(enclosing_fn(&lines, 2), None);
    }

    #[test]
    fn test_production_code_truncates_test_modules() {
        let content = "fn real() {}\n#[cfg(test)]\nmod tests {\n    fn fake() {}\n}\n";
        assert_eq!(production_code(content), "fn real() {}\n");
    }

    #[test]
    fn test_nearby_context_window() {
        let lines = vec!["// reconnect delay", "let sleep = time::sleep(delay);", "other"];
        assert!(nearby_context(&lines, 1, 5, 2, &["reconnect"]));
        assert!(!nearby_context(&lines, 1, 5, 2, &["heartbeat"]));
    }
}
