//! Integration Test: Blocking I/O Prohibition
//!
//! **Policy**: async production code must not perform blocking I/O.
//! **Required**: `tokio::fs`, `tokio::net`, `tokio::io` inside `async fn`,
//! never `std::fs`, `std::net`, or `reqwest::blocking`.
//!
//! Synchronous functions are exempt: configuration loading and CLI setup
//! run before the runtime and may use `std::fs` freely. Test modules are
//! exempt too.

use std::fs;

use architectural_enforcement::{code_part, enclosing_fn, production_code, production_sources, FnKind};

#[test]
fn test_no_blocking_io_in_async_code() {
    let violations = find_blocking_io_violations();

    if !violations.is_empty() {
        eprintln!("\nBlocking I/O found inside async production code!\n");

        for violation in &violations {
            eprintln!("  {violation}");
        }

        eprintln!("\nFORBIDDEN inside async fn:");
        eprintln!("  - std::fs::read(), std::fs::write(), std::fs::File");
        eprintln!("  - std::net::TcpStream, std::net::TcpListener");
        eprintln!("  - std::process::Command::output()");
        eprintln!("  - reqwest::blocking::*");
        eprintln!("  - std::io::stdin(), std::io::stdout() reads/writes");
        eprintln!("\nREQUIRED instead:");
        eprintln!("  - tokio::fs::read().await, tokio::fs::write().await");
        eprintln!("  - tokio::net::TcpStream::connect().await");
        eprintln!("  - tokio::process::Command::output().await");
        eprintln!("  - the shared reqwest::Client");
        eprintln!("\nACCEPTABLE:");
        eprintln!("  - Synchronous functions (config loading before the runtime)");
        eprintln!("  - Test code");

        panic!(
            "\nFound {} blocking I/O violation(s) in async production code.",
            violations.len()
        );
    }
}

fn find_blocking_io_violations() -> Vec<String> {
    let mut violations = Vec::new();

    for path in production_sources() {
        let Ok(content) = fs::read_to_string(&path) else {
            continue;
        };

        let lines: Vec<&str> = production_code(&content).lines().collect();

        let blocking = [
            ("std::fs::", "blocking file I/O"),
            ("std::net::", "blocking network I/O"),
            ("std::process::Command", "blocking process I/O"),
            ("reqwest::blocking", "blocking HTTP client"),
            ("std::io::stdin()", "blocking stdin"),
            ("std::io::stdout()", "blocking stdout"),
        ];

        for (idx, line) in lines.iter().enumerate() {
            let code = code_part(line);

            for (needle, label) in blocking {
                if code.contains(needle) && enclosing_fn(&lines, idx) == Some(FnKind::Async) {
                    violations.push(format!(
                        "{}:{} - {label}: {}",
                        path.display(),
                        idx + 1,
                        line.trim()
                    ));
                }
            }
        }
    }

    violations
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_detector_flags_async_violations_only() {
        let lines = vec![
            "pub async fn bad() {",
            "    let contents = std::fs::read_to_string(\"file.txt\")?;",
            "}",
        ];
        assert_eq!(enclosing_fn(&lines, 1), Some(FnKind::Async));

        let lines = vec![
            "pub fn acceptable(path: &Path) -> Result<String> {",
            "    std::fs::read_to_string(path)",
            "}",
        ];
        assert_eq!(enclosing_fn(&lines, 1), Some(FnKind::Sync));
    }
}
