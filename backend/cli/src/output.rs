//! Terminal notes and the `check` summary table.

pub const RESET: &str = "\x1b[0m";
pub const BOLD: &str = "\x1b[1m";
pub const RED: &str = "\x1b[31m";
pub const GREEN: &str = "\x1b[32m";
pub const CYAN: &str = "\x1b[36m";

/// Check if the terminal supports color output.
pub fn supports_color() -> bool {
    std::env::var("NO_COLOR").is_err()
        && (std::env::var("COLORTERM").is_ok()
            || std::env::var("TERM").map(|t| t != "dumb").unwrap_or(false))
}

pub fn note_info(msg: &str) {
    if supports_color() {
        println!("{CYAN}{BOLD}ℹ{RESET} {msg}");
    } else {
        println!("INFO: {msg}");
    }
}

pub fn note_success(msg: &str) {
    if supports_color() {
        println!("{GREEN}{BOLD}✓{RESET} {msg}");
    } else {
        println!("OK: {msg}");
    }
}

/// Errors go to stderr.
pub fn note_error(msg: &str) {
    if supports_color() {
        eprintln!("{RED}{BOLD}✗{RESET} {msg}");
    } else {
        eprintln!("ERROR: {msg}");
    }
}

/// Two aligned columns, labels padded to the widest one.
pub fn render_summary(rows: &[(&str, String)]) -> String {
    let width = rows.iter().map(|(label, _)| label.chars().count()).max().unwrap_or(0);
    rows.iter()
        .map(|(label, value)| format!("  {label:<width$}  {value}\n"))
        .collect()
}
