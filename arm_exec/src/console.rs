//! # Operator Console
//!
//! Line based input from, and text output to, the operator.

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use rustyline::{error::ReadlineError, DefaultEditor};

// ------------------------------------------------------------------------------------------------
// TRAITS
// ------------------------------------------------------------------------------------------------

/// Something the operator can be prompted through.
pub trait Console {
    /// Show `prompt` and read one line of input, without the trailing newline.
    fn read_line(&mut self, prompt: &str) -> Result<String, ConsoleError>;

    /// Show a line of text to the operator.
    fn say(&mut self, text: &str);
}

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

/// Terminal console with line editing and in-memory history.
pub struct TermConsole {
    editor: DefaultEditor,
}

// ------------------------------------------------------------------------------------------------
// ENUMS
// ------------------------------------------------------------------------------------------------

#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum ConsoleError {
    #[error("Interrupted by the operator")]
    Interrupted,

    #[error("End of input")]
    Eof,

    #[error("Could not read from the terminal: {0}")]
    Io(String),
}

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl TermConsole {
    pub fn new() -> Result<Self, ConsoleError> {
        let editor = DefaultEditor::new().map_err(|e| ConsoleError::Io(e.to_string()))?;
        Ok(Self { editor })
    }
}

impl Console for TermConsole {
    fn read_line(&mut self, prompt: &str) -> Result<String, ConsoleError> {
        match self.editor.readline(prompt) {
            Ok(line) => {
                if !line.trim().is_empty() {
                    let _ = self.editor.add_history_entry(line.as_str());
                }
                Ok(line)
            }
            Err(ReadlineError::Interrupted) => Err(ConsoleError::Interrupted),
            Err(ReadlineError::Eof) => Err(ConsoleError::Eof),
            Err(e) => Err(ConsoleError::Io(e.to_string())),
        }
    }

    fn say(&mut self, text: &str) {
        println!("{}", text);
    }
}

// ------------------------------------------------------------------------------------------------
// TEST CONSOLE
// ------------------------------------------------------------------------------------------------

/// A console which replays scripted operator input and records everything shown.
#[cfg(test)]
pub(crate) struct ScriptedConsole {
    input: std::collections::VecDeque<String>,

    /// Error returned once the script runs out.
    end: ConsoleError,

    /// Every prompt and line of output, in order.
    pub output: Vec<String>,
}

#[cfg(test)]
impl ScriptedConsole {
    /// Replay `lines` then report end of input.
    pub fn new(lines: &[&str]) -> Self {
        Self {
            input: lines.iter().map(|l| l.to_string()).collect(),
            end: ConsoleError::Eof,
            output: Vec::new(),
        }
    }

    /// Replay `lines` then report a Ctrl+C.
    pub fn interrupted_after(lines: &[&str]) -> Self {
        Self {
            end: ConsoleError::Interrupted,
            ..Self::new(lines)
        }
    }

    /// Returns true if any output line contains `text`.
    pub fn shown(&self, text: &str) -> bool {
        self.output.iter().any(|l| l.contains(text))
    }
}

#[cfg(test)]
impl Console for ScriptedConsole {
    fn read_line(&mut self, prompt: &str) -> Result<String, ConsoleError> {
        self.output.push(prompt.to_string());
        self.input.pop_front().ok_or_else(|| self.end.clone())
    }

    fn say(&mut self, text: &str) {
        self.output.push(text.to_string());
    }
}
