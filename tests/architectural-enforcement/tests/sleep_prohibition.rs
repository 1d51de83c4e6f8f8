//! Integration Test: Sleep Prohibition
//!
//! Production code waits on I/O, not on the clock. The link task owns the
//! only two legitimate clock waits: the reconnect backoff between failed
//! connection attempts and the armed grace timer that clears a finished
//! response. Anything else sleeping is a polling loop in disguise.
//!
//! **Policy**: Production code in warlink-core and warlink-console MUST NOT
//! call sleep methods.
//! **Exceptions**: reconnect backoff, armed timers raced in select!, test code.

use architectural_enforcement::{code_part, nearby_context, production_code, production_sources};
use std::fs;

/// Context words that mark a sleep as part of reconnect backoff
const BACKOFF_WORDS: &[&str] = &["backoff", "retry", "reconnect", "delay"];

/// Context words that mark a sleep as a disarmable timer raced in select!
const TIMER_WORDS: &[&str] = &["timer", "grace"];

/// Test that production code does not contain sleep() calls
#[test]
fn test_no_sleep_in_production_code() {
    let violations = find_sleep_violations();

    if !violations.is_empty() {
        eprintln!("\n❌ CRITICAL: Sleep calls found in production code!\n");

        for violation in &violations {
            eprintln!("  ❌ {}", violation);
        }

        eprintln!("\n✅ ACCEPTABLE sleep uses:");
        eprintln!("  - Reconnect backoff between failed connection attempts");
        eprintln!("  - Armed timers raced inside a select! loop");
        eprintln!("  - Test code (#[cfg(test)] modules and tests/ harnesses)");
        eprintln!("  - Periodic tasks using tokio::time::interval()");
        eprintln!("\n❌ FORBIDDEN:");
        eprintln!("  - Sleep in polling loops");
        eprintln!("  - Sleep as poor man's synchronization");
        eprintln!("  - Sleep to 'wait' for events (use async I/O!)");

        panic!(
            "\nFound {} sleep violation(s) in production code.\nFix these before merging!",
            violations.len()
        );
    }
}

/// Find all sleep() calls in production code
fn find_sleep_violations() -> Vec<String> {
    let mut violations = Vec::new();

    for path in production_sources() {
        let content = match fs::read_to_string(&path) {
            Ok(c) => c,
            Err(_) => continue,
        };

        let lines: Vec<&str> = production_code(&content).lines().collect();

        for (idx, line) in lines.iter().enumerate() {
            let code = code_part(line);
            if !code.contains("::sleep(") && !code.contains(".sleep(") {
                continue;
            }

            if is_backoff_context(&lines, idx) || is_armed_timer_context(&lines, idx) {
                continue;
            }

            violations.push(format!(
                "{}:{} - sleep outside backoff or timer context: {}",
                path.display(),
                idx + 1,
                line.trim()
            ));
        }
    }

    violations
}

/// Check if this sleep sits inside reconnect backoff logic
fn is_backoff_context(lines: &[&str], idx: usize) -> bool {
    nearby_context(lines, idx, 15, 5, BACKOFF_WORDS)
}

/// Check if this sleep is a disarmable timer armed and reset by the event loop
fn is_armed_timer_context(lines: &[&str], idx: usize) -> bool {
    nearby_context(lines, idx, 5, 2, TIMER_WORDS)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_backoff_detection() {
        let code = vec![
            "/// Wait out the reconnect delay, still answering commands",
            "async fn wait_backoff(&mut self, wait: Duration) {",
            "    let sleep = time::sleep(wait);",
            "}",
        ];

        assert!(
            is_backoff_context(&code, 2),
            "Should recognize reconnect backoff from surrounding context"
        );
    }

    #[test]
    fn test_armed_timer_detection() {
        let code = vec![
            "// Grace period before the accumulator clears.",
            "let clear_timer = time::sleep(Duration::ZERO);",
            "tokio::pin!(clear_timer);",
        ];

        assert!(
            is_armed_timer_context(&code, 1),
            "Should recognize an armed timer from surrounding context"
        );
    }

    #[test]
    fn test_bare_sleep_is_flagged() {
        let code = vec![
            "async fn poll_until_ready(&self) {",
            "    loop {",
            "        time::sleep(Duration::from_millis(50)).await;",
            "        if self.ready() { break; }",
            "    }",
            "}",
        ];

        assert!(!is_backoff_context(&code, 2), "Polling loop is not backoff");
        assert!(!is_armed_timer_context(&code, 2), "Polling loop is not a timer");
    }
}
