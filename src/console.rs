//! Line input from the terminal
//!
//! One buffered reader over stdin is shared by every prompt (decision loop,
//! OAuth code paste, API key entry) so piped input is never lost between
//! readers. Each read races the run's cancel flag.

use once_cell::sync::Lazy;
use std::io::Write;
use tokio::io::{AsyncBufReadExt, BufReader, Stdin};
use tokio::sync::Mutex;

use crate::cancel::CancelFlag;

static STDIN: Lazy<Mutex<BufReader<Stdin>>> =
    Lazy::new(|| Mutex::new(BufReader::new(tokio::io::stdin())));

/// What a prompt read produced
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Input {
    /// A line with the trailing newline removed
    Line(String),
    Eof,
    Cancelled,
}

/// Print `prompt` without a newline and wait for one line of input
pub async fn read_line(prompt: &str, cancel: &CancelFlag) -> std::io::Result<Input> {
    print!("{}", prompt);
    std::io::stdout().flush()?;

    if cancel.is_cancelled() {
        return Ok(Input::Cancelled);
    }

    let mut stdin = STDIN.lock().await;
    let mut line = String::new();
    tokio::select! {
        read = stdin.read_line(&mut line) => {
            if read? == 0 {
                Ok(Input::Eof)
            } else {
                Ok(Input::Line(line.trim_end_matches(['\r', '\n']).to_string()))
            }
        }
        _ = cancel.cancelled() => Ok(Input::Cancelled),
    }
}
