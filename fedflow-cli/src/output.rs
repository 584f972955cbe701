// Output formatting helpers for CLI commands

/// Print a status message: "  Status message"
pub fn status(action: &str, message: &str) {
    eprintln!("\x1b[1;36m{:>12}\x1b[0m {}", action, message);
}

/// Print a success message with checkmark
pub fn success(message: &str) {
    eprintln!("\x1b[1;32m  \u{2713}\x1b[0m {}", message);
}

/// Print a failure message with X
pub fn failure(message: &str) {
    eprintln!("\x1b[1;31m  \u{2717}\x1b[0m {}", message);
}

/// Print an info message
pub fn info(message: &str) {
    eprintln!("\x1b[36m  i\x1b[0m {}", message);
}

/// Print a stage header
pub fn stage_header(component: &str, kind: &str, parties: usize) {
    eprintln!(
        "\x1b[1;34m  Stage\x1b[0m '{}' [{}] ({} parties)",
        component, kind, parties
    );
}

/// Print a per-party task line (indented)
pub fn task_line(role: &str, party: &str, message: &str) {
    eprintln!("        | {}[{}] {}", role, party, message);
}

/// Print a result value block
pub fn result_block(title: &str, body: &str) {
    println!("{}:", title);
    for line in body.lines() {
        println!("  {}", line);
    }
}
