/*
 * SPDX-FileCopyrightText: 2026 RedHunt07 - FEDI3 Project
 * SPDX-License-Identifier: AGPL-3.0-only
 */

//! Operator-facing summaries and the confirmation prompt in front of every
//! destructive batch.

use std::io::{self, BufRead, Write};
use tokio::task;

pub fn plural(n: usize) -> &'static str {
    if n == 1 {
        ""
    } else {
        "s"
    }
}

pub fn found_summary(n: usize, verb: &str) -> String {
    format!("Found {n} post{} to {verb}.", plural(n))
}

/// Asks until the answer is exactly `Y` or `n`. `auto_confirm` skips the
/// prompt; end of input counts as a refusal.
pub fn confirm<R: BufRead, W: Write>(
    verb: &str,
    n: usize,
    auto_confirm: bool,
    input: &mut R,
    output: &mut W,
) -> io::Result<bool> {
    if auto_confirm {
        return Ok(true);
    }
    let mut line = String::new();
    loop {
        write!(
            output,
            "\nProceed to {verb} {n} post{}? WARNING: THIS IS DESTRUCTIVE AND CANNOT BE UNDONE. Y/n: ",
            plural(n)
        )?;
        output.flush()?;
        line.clear();
        if input.read_line(&mut line)? == 0 {
            return Ok(false);
        }
        match line.trim_end_matches(['\r', '\n']) {
            "Y" => return Ok(true),
            "n" => return Ok(false),
            _ => {}
        }
    }
}

/// [`confirm`] on a blocking thread, so the runtime thread never sits in
/// `read_line`.
pub async fn confirm_off_thread<R, W>(
    verb: &'static str,
    n: usize,
    auto_confirm: bool,
    mut input: R,
    mut output: W,
) -> io::Result<bool>
where
    R: BufRead + Send + 'static,
    W: Write + Send + 'static,
{
    if auto_confirm {
        return Ok(true);
    }
    task::spawn_blocking(move || confirm(verb, n, false, &mut input, &mut output))
        .await
        .map_err(|e| io::Error::new(io::ErrorKind::Other, e))?
}

/// Prompts on the process terminal.
pub async fn confirm_on_terminal(
    verb: &'static str,
    n: usize,
    auto_confirm: bool,
) -> io::Result<bool> {
    confirm_off_thread(
        verb,
        n,
        auto_confirm,
        io::BufReader::new(io::stdin()),
        io::stdout(),
    )
    .await
}
