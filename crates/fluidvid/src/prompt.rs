use std::io::{BufRead, Write};
use anyhow::{Context, Result};

/// Ask a yes/no question where an empty answer means yes
pub fn confirm<R: BufRead, W: Write>(question: &str, input: &mut R, output: &mut W) -> Result<bool> {
    write!(output, "{} (y/n, default: y) > ", question)?;
    output.flush()?;

    let mut answer = String::new();
    input.read_line(&mut answer).context("Failed to read confirmation")?;

    Ok(matches!(answer.trim().to_lowercase().as_str(), "" | "y" | "yes"))
}

/// Ask for a free-form value, falling back to `default` on an empty answer
pub fn ask<R: BufRead, W: Write>(
    question: &str,
    default: Option<&str>,
    input: &mut R,
    output: &mut W,
) -> Result<String> {
    match default {
        Some(d) => write!(output, "{} (press Enter to use default '{}'): ", question, d)?,
        None => write!(output, "{}: ", question)?,
    }
    output.flush()?;

    let mut answer = String::new();
    input.read_line(&mut answer).context("Failed to read answer")?;
    let answer = answer.trim().trim_matches('"').to_string();

    Ok(match default {
        Some(d) if answer.is_empty() => d.to_string(),
        _ => answer,
    })
}
