//! rustyline helper: command and persona-name completion, hints and mention
//! highlighting.

use crate::command::{COMMANDS, PERSONA_COMMANDS};
use chorus_core::selection::RoundTextScanner;
use colored::Colorize;
use rustyline::completion::{Completer, Pair};
use rustyline::highlight::Highlighter;
use rustyline::hint::Hinter;
use rustyline::validate::Validator;
use rustyline::{Context, Helper};
use std::borrow::Cow::{self, Borrowed, Owned};

/// ANSI codes wrapped around highlighted mentions.
pub const MENTION_OPEN: &str = "\x1b[1;33m";
pub const MENTION_CLOSE: &str = "\x1b[0m";

#[derive(Clone)]
pub struct CliHelper {
    commands: Vec<String>,
    persona_names: Vec<String>,
    scanner: RoundTextScanner,
}

impl CliHelper {
    pub fn new(persona_names: Vec<String>, scanner: RoundTextScanner) -> Self {
        let mut commands: Vec<String> = COMMANDS.iter().map(|c| c.to_string()).collect();
        commands.push("quit".to_string());
        Self {
            commands,
            persona_names,
            scanner,
        }
    }

    fn command_candidates(&self, line: &str) -> Vec<Pair> {
        self.commands
            .iter()
            .filter(|cmd| cmd.starts_with(line))
            .map(|cmd| Pair {
                display: cmd.clone(),
                replacement: cmd.clone(),
            })
            .collect()
    }

    /// Completes the persona argument of `/mute`, `/exclude` and `/invite`.
    fn persona_candidates(&self, line: &str) -> Option<(usize, Vec<Pair>)> {
        let (command, partial) = line.split_once(' ')?;
        if !PERSONA_COMMANDS.contains(&command) {
            return None;
        }
        let candidates = self
            .persona_names
            .iter()
            .filter(|name| name.starts_with(partial))
            .map(|name| Pair {
                display: name.clone(),
                replacement: name.clone(),
            })
            .collect();
        Some((command.len() + 1, candidates))
    }
}

impl Helper for CliHelper {}

impl Completer for CliHelper {
    type Candidate = Pair;

    fn complete(
        &self,
        line: &str,
        pos: usize,
        _ctx: &Context<'_>,
    ) -> rustyline::Result<(usize, Vec<Pair>)> {
        let line = &line[..pos];

        if let Some(found) = self.persona_candidates(line) {
            Ok(found)
        } else if line.starts_with('/') && !line.contains(' ') {
            Ok((0, self.command_candidates(line)))
        } else {
            Ok((0, vec![]))
        }
    }
}

impl Highlighter for CliHelper {
    fn highlight<'l>(&self, line: &'l str, _pos: usize) -> Cow<'l, str> {
        if line.starts_with('/') {
            Owned(line.bright_cyan().to_string())
        } else if line.contains('@') {
            Owned(self.scanner.highlight(line, MENTION_OPEN, MENTION_CLOSE))
        } else {
            Borrowed(line)
        }
    }

    fn highlight_char(&self, _line: &str, _pos: usize, _forced: bool) -> bool {
        true
    }
}

impl Hinter for CliHelper {
    type Hint = String;

    fn hint(&self, line: &str, pos: usize, _ctx: &Context<'_>) -> Option<String> {
        let line = &line[..pos];

        if line.starts_with('/') && !line.contains(' ') {
            self.commands
                .iter()
                .find(|cmd| cmd.starts_with(line) && cmd.len() > line.len())
                .map(|cmd| cmd[line.len()..].to_string())
        } else {
            None
        }
    }
}

impl Validator for CliHelper {}
