//! Terminal prompts.

use console::style;
use std::io::{self, BufRead, Write};
use story_core::Dialog;

/// Asks a yes/no question on stdin. Empty input picks `default`.
pub fn confirm(question: &str, default: bool) -> io::Result<bool> {
    let hint = if default { "[Y/n]" } else { "[y/N]" };
    print!("{} {} ", question, hint);
    io::stdout().flush()?;

    let mut input = String::new();
    io::stdin().lock().read_line(&mut input)?;

    let answer = input.trim();
    if answer.is_empty() {
        return Ok(default);
    }
    Ok(answer.eq_ignore_ascii_case("y") || answer.eq_ignore_ascii_case("yes"))
}

/// Dialog backed by the terminal.
///
/// A choice prints both options and reads `1` or `2`; anything unreadable
/// counts as the second (non-destructive) option.
pub struct TerminalDialog;

impl Dialog for TerminalDialog {
    fn choice(&self, title: &str, message: &str, option_a: &str, option_b: &str) -> bool {
        println!();
        println!("{}", style(title).bold());
        println!("{}", message);
        println!();
        println!("  {} {}", style("1)").cyan(), option_a);
        println!("  {} {}", style("2)").cyan(), option_b);
        print!("Choose [1/2]: ");
        if io::stdout().flush().is_err() {
            return false;
        }

        let mut input = String::new();
        match io::stdin().lock().read_line(&mut input) {
            Ok(_) => {
                let answer = input.trim();
                answer == "1" || answer.eq_ignore_ascii_case(option_a)
            }
            Err(_) => false,
        }
    }

    fn alert(&self, title: &str, message: &str) {
        println!();
        println!("{} {}", style("⚠").yellow().bold(), style(title).yellow().bold());
        println!("  {}", message);
        println!();
    }
}
