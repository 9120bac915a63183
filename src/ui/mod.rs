//! User interface module - interaction (prompts) and formatting.
//!
//! Separates concerns:
//! - `formatter` - Pure formatting functions
//! - This module - The [`Operator`] seam and its terminal implementation

use std::io::{self, Write};

use console::Term;

use crate::error::{BumpError, Result};

pub mod formatter;

// Re-export formatter functions for convenience
pub use formatter::{
    display_diff, display_error, display_recovery_hint, display_status, display_success,
};

/// The person driving a bump.
///
/// The orchestrator only talks to the operator through this trait, so tests
/// can script answers instead of reading a terminal.
pub trait Operator {
    /// Pick one of the labelled candidates; returns its index
    fn select_bump(&self, current_tag: &str, options: &[String]) -> Result<usize>;

    fn show_diff(&self, diff: &str);

    fn confirm(&self, prompt: &str) -> Result<bool>;

    /// Ask for a secret; input is not echoed
    fn request_api_key(&self, prompt: &str) -> Result<String>;
}

/// Operator on stdin/stdout
#[derive(Debug, Default, Clone, Copy)]
pub struct TerminalOperator;

impl TerminalOperator {
    pub fn new() -> Self {
        TerminalOperator
    }
}

fn read_line() -> Result<Option<String>> {
    io::stdout().flush()?;

    let mut input = String::new();
    if io::stdin().read_line(&mut input)? == 0 {
        return Ok(None);
    }
    Ok(Some(input))
}

/// Parse a 1-based menu choice.
///
/// # Returns
/// * `Ok(Some(index))` - 0-based index of the chosen entry
/// * `Ok(None)` - Empty input, the operator backed out
/// * `Err` - If the input is not one of the listed numbers
pub fn parse_selection(input: &str, count: usize) -> Result<Option<usize>> {
    let selection = input.trim();
    if selection.is_empty() {
        return Ok(None);
    }

    match selection.parse::<usize>() {
        Ok(index) if index > 0 && index <= count => Ok(Some(index - 1)),
        _ => Err(BumpError::validation(format!(
            "invalid version bump selection '{}'",
            selection
        ))),
    }
}

/// "y" or "yes" (case-insensitive) confirms; anything else declines.
pub fn parse_confirmation(input: &str) -> bool {
    let response = input.trim().to_lowercase();
    response == "y" || response == "yes"
}

impl Operator for TerminalOperator {
    fn select_bump(&self, current_tag: &str, options: &[String]) -> Result<usize> {
        println!(
            "\n{}",
            console::style(format!("Current version: {}", current_tag)).bold()
        );
        for (i, option) in options.iter().enumerate() {
            println!("  {}. {}", i + 1, option);
        }
        print!("\nSelect version bump (1-{}): ", options.len());

        let input = read_line()?.unwrap_or_default();
        parse_selection(&input, options.len())?
            .ok_or_else(|| BumpError::Cancelled("no version bump selected".to_string()))
    }

    fn show_diff(&self, diff: &str) {
        display_diff(diff);
    }

    fn confirm(&self, prompt: &str) -> Result<bool> {
        print!("\n{} (y/N): ", prompt);

        Ok(read_line()?.is_some_and(|input| parse_confirmation(&input)))
    }

    fn request_api_key(&self, prompt: &str) -> Result<String> {
        let term = Term::stderr();
        term.write_str(&format!("{}: ", prompt))?;
        let key = term.read_secure_line()?;
        Ok(key.trim().to_string())
    }
}
