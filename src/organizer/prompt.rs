//! Terminal seam of the decision loop

use async_trait::async_trait;

use crate::cancel::CancelFlag;
use crate::console::{self, Input};

/// Where the driver prints to and reads user answers from
#[async_trait]
pub trait Prompter: Send + Sync {
    fn show(&self, text: &str);

    /// Print `prompt` and wait for one line
    async fn ask(&self, prompt: &str) -> std::io::Result<Input>;
}

/// Stdout / stdin prompter; reads are cut short by the run's cancel flag
pub struct TerminalPrompter {
    cancel: CancelFlag,
}

impl TerminalPrompter {
    pub fn new(cancel: CancelFlag) -> Self {
        Self { cancel }
    }
}

#[async_trait]
impl Prompter for TerminalPrompter {
    fn show(&self, text: &str) {
        println!("{}", text);
    }

    async fn ask(&self, prompt: &str) -> std::io::Result<Input> {
        console::read_line(prompt, &self.cancel).await
    }
}

#[cfg(test)]
pub use scripted::ScriptedPrompter;

#[cfg(test)]
mod scripted {
    use super::*;
    use std::collections::VecDeque;
    use std::sync::Mutex;

    /// Answers prompts from a fixed list, then reports end of input
    pub struct ScriptedPrompter {
        lines: Mutex<VecDeque<String>>,
        output: Mutex<Vec<String>>,
        unreadable: bool,
    }

    impl ScriptedPrompter {
        pub fn new(lines: &[&str]) -> Self {
            Self {
                lines: Mutex::new(lines.iter().map(|l| l.to_string()).collect()),
                output: Mutex::new(Vec::new()),
                unreadable: false,
            }
        }

        /// Every read fails, like a terminal sending invalid UTF-8
        pub fn unreadable() -> Self {
            Self {
                unreadable: true,
                ..Self::new(&[])
            }
        }

        pub fn output(&self) -> String {
            self.output.lock().unwrap().join("\n")
        }

        pub fn remaining(&self) -> usize {
            self.lines.lock().unwrap().len()
        }
    }

    #[async_trait]
    impl Prompter for ScriptedPrompter {
        fn show(&self, text: &str) {
            self.output.lock().unwrap().push(text.to_string());
        }

        async fn ask(&self, prompt: &str) -> std::io::Result<Input> {
            self.output.lock().unwrap().push(prompt.to_string());
            if self.unreadable {
                return Err(std::io::Error::new(
                    std::io::ErrorKind::InvalidData,
                    "stream did not contain valid UTF-8",
                ));
            }
            Ok(match self.lines.lock().unwrap().pop_front() {
                Some(line) => Input::Line(line),
                None => Input::Eof,
            })
        }
    }
}
