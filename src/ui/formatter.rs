//! Pure formatting functions for UI output.
//!
//! This module contains all display/formatting logic separated from user interaction.
//! Styling goes through `console`, which drops colours when the stream is not a terminal.

use console::style;

/// Format and print an error message in red.
pub fn display_error(message: &str) {
    eprintln!("{} {}", style("ERROR:").red().bold(), message);
}

/// Format and print a success message with green checkmark.
pub fn display_success(message: &str) {
    println!("{} {}", style("✓").green(), message);
}

/// Format and print a status message with yellow arrow.
pub fn display_status(message: &str) {
    println!("{} {}", style("→").yellow(), message);
}

/// Colour a unified diff line by line
pub fn styled_diff(diff: &str) -> String {
    diff.lines()
        .map(|line| {
            if line.starts_with("+++") || line.starts_with("---") || line.starts_with("diff ") {
                style(line).bold().to_string()
            } else if line.starts_with('+') {
                style(line).green().to_string()
            } else if line.starts_with('-') {
                style(line).red().to_string()
            } else if line.starts_with("@@") {
                style(line).cyan().to_string()
            } else {
                line.to_string()
            }
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// Display the staged changes ahead of the confirmation prompt
pub fn display_diff(diff: &str) {
    println!("\n{}", style("Staged changes:").bold());
    if diff.trim().is_empty() {
        println!("  (no changes)");
    } else {
        println!("{}", styled_diff(diff));
    }
}

/// Tell the operator how to finish a release that stopped half way.
///
/// # Arguments
/// * `stage` - Last step that completed before the failure
pub fn display_recovery_hint(stage: &str) {
    eprintln!(
        "\n{} The release stopped after '{}'. Nothing was rolled back; check branches, tags and the remote, then finish the remaining steps by hand.",
        style("→").yellow(),
        stage
    );
}
