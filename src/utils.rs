use anyhow::{Context, Result};
use colored::*;
use std::io::{BufRead, Write};

fn prompt(msg: &str) -> Result<String> {
    print!("{}", msg);
    std::io::stdout()
        .flush()
        .context("Failed to flush stdout")?;
    let mut buffer = String::new();
    std::io::stdin()
        .read_line(&mut buffer)
        .context("Failed to read input")?;
    Ok(buffer.trim().to_string())
}

pub fn prompt_yes_no(message: &str, default_yes: bool) -> Result<bool> {
    let default_char = if default_yes { "y" } else { "n" };
    loop {
        let input = prompt(&format!("{} (y/n) [{}]: ", message, default_char))?;
        if input.is_empty() {
            return Ok(default_yes);
        }
        match input.to_lowercase().as_str() {
            "y" | "yes" => return Ok(true),
            "n" | "no" => return Ok(false),
            _ => println!("{}", "[!] Please respond with y or n.".yellow()),
        }
    }
}

/// Read lines until two consecutive blank lines (or EOF). The terminating blank
/// line is dropped; a single blank line is kept.
pub fn prompt_multiline() -> Result<String> {
    let stdin = std::io::stdin();
    read_block(stdin.lock())
}

fn read_block<R: BufRead>(reader: R) -> Result<String> {
    let mut lines: Vec<String> = Vec::new();
    for line in reader.lines() {
        let line = line.context("Failed to read input")?;
        let line = line.trim_end_matches('\r').to_string();
        if line.is_empty() && lines.last().is_some_and(|l| l.is_empty()) {
            break;
        }
        lines.push(line);
    }
    if lines.last().is_some_and(|l| l.is_empty()) {
        lines.pop();
    }
    Ok(lines.join("\n"))
}
