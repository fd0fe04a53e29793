//! REPL command parsing.

use chorus_application::ImportMode;
use std::path::PathBuf;
use thiserror::Error;

/// Slash commands offered for completion, in help order.
pub const COMMANDS: &[&str] = &[
    "/help",
    "/sessions",
    "/new",
    "/switch",
    "/delete",
    "/mute",
    "/exclude",
    "/invite",
    "/status",
    "/image",
    "/export",
    "/import",
];

/// Commands whose argument is a persona name.
pub const PERSONA_COMMANDS: &[&str] = &["/mute", "/exclude", "/invite"];

pub const HELP_TEXT: &str = "\
/sessions                       list sessions
/new                            start a new session
/switch <id>                    switch to a session
/delete <id>                    delete a session
/mute <name>                    toggle a persistent mute
/exclude <name>                 toggle an exclusion for the next round
/invite <name>                  ask one persona to speak
/status                         show mute, exclusion and opt-out state
/image <path> [text]            send an image with optional text
/export [all] <file>            export the current (or every) session
/import <replace|merge> <file>  import sessions from one or more files
quit                            leave";

/// One parsed input line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Help,
    Quit,
    Sessions,
    New,
    Switch(String),
    Delete(String),
    Mute(String),
    Exclude(String),
    Invite(String),
    Status,
    Image { path: PathBuf, text: Option<String> },
    Export { all: bool, path: PathBuf },
    Import { mode: ImportMode, paths: Vec<PathBuf> },
    /// Anything that is not a command is chat text.
    Message(String),
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum CommandError {
    #[error("Unknown command: {0} (try /help)")]
    Unknown(String),

    #[error("Usage: {0}")]
    Usage(&'static str),

    #[error("Import mode must be 'replace' or 'merge', got '{0}'")]
    ImportMode(String),
}

/// Parses a trimmed, non-empty line.
pub fn parse(line: &str) -> Result<Command, CommandError> {
    let line = line.trim();
    if line == "quit" || line == "exit" {
        return Ok(Command::Quit);
    }
    if !line.starts_with('/') {
        return Ok(Command::Message(line.to_string()));
    }

    let (name, rest) = match line.split_once(char::is_whitespace) {
        Some((name, rest)) => (name, rest.trim()),
        None => (line, ""),
    };

    match name {
        "/help" => Ok(Command::Help),
        "/sessions" => Ok(Command::Sessions),
        "/new" => Ok(Command::New),
        "/status" => Ok(Command::Status),
        "/switch" => required(rest, "/switch <id>").map(Command::Switch),
        "/delete" => required(rest, "/delete <id>").map(Command::Delete),
        "/mute" => required(rest, "/mute <name>").map(Command::Mute),
        "/exclude" => required(rest, "/exclude <name>").map(Command::Exclude),
        "/invite" => required(rest, "/invite <name>").map(Command::Invite),
        "/image" => {
            let (path, text) = match rest.split_once(char::is_whitespace) {
                Some((path, text)) => (path, Some(text.trim().to_string())),
                None => (rest, None),
            };
            let path = required(path, "/image <path> [text]")?;
            Ok(Command::Image {
                path: PathBuf::from(path),
                text: text.filter(|text| !text.is_empty()),
            })
        }
        "/export" => {
            let mut args = rest.split_whitespace();
            let (all, path) = match (args.next(), args.next()) {
                (Some("all"), Some(path)) => (true, path),
                (Some(path), None) => (false, path),
                _ => return Err(CommandError::Usage("/export [all] <file>")),
            };
            Ok(Command::Export {
                all,
                path: PathBuf::from(path),
            })
        }
        "/import" => {
            let mut args = rest.split_whitespace();
            let mode = match args.next() {
                Some("replace") => ImportMode::Replace,
                Some("merge") => ImportMode::Merge,
                Some(other) => return Err(CommandError::ImportMode(other.to_string())),
                None => return Err(CommandError::Usage("/import <replace|merge> <file>...")),
            };
            let paths: Vec<PathBuf> = args.map(PathBuf::from).collect();
            if paths.is_empty() {
                return Err(CommandError::Usage("/import <replace|merge> <file>..."));
            }
            Ok(Command::Import { mode, paths })
        }
        other => Err(CommandError::Unknown(other.to_string())),
    }
}

fn required(arg: &str, usage: &'static str) -> Result<String, CommandError> {
    if arg.is_empty() {
        Err(CommandError::Usage(usage))
    } else {
        Ok(arg.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plain_text_and_quit() {
        assert_eq!(parse("@Ann hello"), Ok(Command::Message("@Ann hello".into())));
        assert_eq!(parse("  quit "), Ok(Command::Quit));
        assert_eq!(parse("exit"), Ok(Command::Quit));
    }

    #[test]
    fn test_persona_names_keep_spaces() {
        assert_eq!(parse("/mute Dr. Who"), Ok(Command::Mute("Dr. Who".into())));
        assert_eq!(parse("/invite 小明"), Ok(Command::Invite("小明".into())));
        assert_eq!(parse("/exclude"), Err(CommandError::Usage("/exclude <name>")));
    }

    #[test]
    fn test_image_with_optional_text() {
        assert_eq!(
            parse("/image cat.png what is this?"),
            Ok(Command::Image {
                path: PathBuf::from("cat.png"),
                text: Some("what is this?".into())
            })
        );
        assert_eq!(
            parse("/image cat.png"),
            Ok(Command::Image {
                path: PathBuf::from("cat.png"),
                text: None
            })
        );
        assert!(parse("/image").is_err());
    }

    #[test]
    fn test_export_forms() {
        assert_eq!(
            parse("/export out.json"),
            Ok(Command::Export {
                all: false,
                path: PathBuf::from("out.json")
            })
        );
        assert_eq!(
            parse("/export all backup.json"),
            Ok(Command::Export {
                all: true,
                path: PathBuf::from("backup.json")
            })
        );
        assert!(parse("/export").is_err());
        assert!(parse("/export a b c").is_err());
    }

    #[test]
    fn test_import_forms() {
        assert_eq!(
            parse("/import merge a.json b.json"),
            Ok(Command::Import {
                mode: ImportMode::Merge,
                paths: vec![PathBuf::from("a.json"), PathBuf::from("b.json")]
            })
        );
        assert_eq!(
            parse("/import append a.json"),
            Err(CommandError::ImportMode("append".into()))
        );
        assert!(parse("/import replace").is_err());
    }

    #[test]
    fn test_unknown_command() {
        assert_eq!(parse("/plan"), Err(CommandError::Unknown("/plan".into())));
    }
}
