//! Terminal rendering of chat bubbles.

use crate::helper::{MENTION_CLOSE, MENTION_OPEN};
use chorus_core::render::{BubbleUpdate, ChatRenderer};
use chorus_core::selection::RoundTextScanner;
use chorus_core::session::MessageContent;
use chorus_interaction::request::IMAGE_PLACEHOLDER;
use colored::Colorize;
use std::io::{self, Write};
use std::sync::Mutex;

/// The loading bubble currently being written to.
struct OpenBubble {
    speaker: String,
    shown: String,
    /// `shown` is a status notice, not reply text
    showing_status: bool,
}

impl OpenBubble {
    fn new(speaker: &str) -> Self {
        Self {
            speaker: speaker.to_string(),
            shown: String::new(),
            showing_status: false,
        }
    }
}

struct State {
    out: Box<dyn Write + Send>,
    open: Option<OpenBubble>,
}

/// Prints bubbles as `[speaker]` headers followed by text.
///
/// Reply text is written incrementally: when it extends what is already on
/// screen only the tail is printed. Status notices and text that does not
/// extend the screen start a fresh line.
pub struct TerminalRenderer {
    state: Mutex<State>,
    scanner: Option<RoundTextScanner>,
}

impl TerminalRenderer {
    pub fn new(out: Box<dyn Write + Send>, scanner: Option<RoundTextScanner>) -> Self {
        Self {
            state: Mutex::new(State { out, open: None }),
            scanner,
        }
    }

    pub fn stdout(scanner: RoundTextScanner) -> Self {
        Self::new(Box::new(io::stdout()), Some(scanner))
    }

    fn header(speaker: &str, is_user: bool) -> String {
        let label = format!("[{}]", speaker);
        if is_user {
            label.green().bold().to_string()
        } else {
            label.bright_magenta().bold().to_string()
        }
    }

    fn body(&self, text: &str, is_user: bool) -> String {
        if is_user {
            match &self.scanner {
                Some(scanner) if colored::control::SHOULD_COLORIZE.should_colorize() => {
                    scanner.highlight(text, MENTION_OPEN, MENTION_CLOSE)
                }
                _ => text.to_string(),
            }
        } else {
            text.bright_blue().to_string()
        }
    }

    fn write(&self, f: impl FnOnce(&mut State) -> io::Result<()>) {
        let mut state = match self.state.lock() {
            Ok(state) => state,
            Err(poisoned) => poisoned.into_inner(),
        };
        let result = f(&mut state).and_then(|_| state.out.flush());
        if let Err(e) = result {
            tracing::warn!("[Terminal] Failed to write to terminal: {}", e);
        }
    }
}

fn close_open(state: &mut State) -> io::Result<()> {
    if state.open.take().is_some() {
        writeln!(state.out)?;
    }
    Ok(())
}

impl ChatRenderer for TerminalRenderer {
    fn append_message(&self, speaker: &str, content: &MessageContent, is_user: bool, is_loading: bool) {
        let header = Self::header(speaker, is_user);
        let body = content.non_empty_text().map(|text| self.body(text, is_user));
        let has_image = content.non_empty_image().is_some();

        self.write(|state| {
            close_open(state)?;
            if is_loading {
                write!(state.out, "{} ", header)?;
                state.open = Some(OpenBubble::new(speaker));
                return Ok(());
            }

            writeln!(state.out, "{}", header)?;
            if has_image {
                writeln!(state.out, "{}", IMAGE_PLACEHOLDER.bright_black())?;
            }
            if let Some(body) = &body {
                writeln!(state.out, "{}", body)?;
            }
            writeln!(state.out)
        });
    }

    fn update_message(&self, speaker: &str, text: &str, update: BubbleUpdate) {
        let is_status = update == BubbleUpdate::Status;
        let styled = if is_status {
            text.bright_black().to_string()
        } else {
            text.bright_blue().to_string()
        };

        self.write(|state| {
            let same_bubble = state
                .open
                .as_ref()
                .is_some_and(|open| open.speaker == speaker);
            if !same_bubble {
                close_open(state)?;
                write!(state.out, "{} ", Self::header(speaker, false))?;
                state.open = Some(OpenBubble::new(speaker));
            }

            let State { out, open } = &mut *state;
            if let Some(bubble) = open.as_mut() {
                let extends = !is_status && !bubble.showing_status;
                match text.strip_prefix(bubble.shown.as_str()).filter(|_| extends) {
                    Some(tail) => write!(out, "{}", tail.bright_blue())?,
                    None if bubble.shown.is_empty() => write!(out, "{}", styled)?,
                    None => write!(out, "\n{}", styled)?,
                }
                bubble.shown = text.to_string();
                bubble.showing_status = is_status;
            }

            if update == BubbleUpdate::Final {
                state.open = None;
                writeln!(state.out)?;
                writeln!(state.out)?;
            }
            Ok(())
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[derive(Clone, Default)]
    struct SharedBuffer(Arc<Mutex<Vec<u8>>>);

    impl SharedBuffer {
        fn contents(&self) -> String {
            String::from_utf8(self.0.lock().unwrap().clone()).unwrap()
        }
    }

    impl Write for SharedBuffer {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    fn renderer() -> (TerminalRenderer, SharedBuffer) {
        colored::control::set_override(false);
        let buffer = SharedBuffer::default();
        (TerminalRenderer::new(Box::new(buffer.clone()), None), buffer)
    }

    #[test]
    fn test_user_bubble_with_image() {
        let (renderer, buffer) = renderer();
        renderer.append_message(
            "Ryan",
            &MessageContent::with_image(Some("look".into()), Some("data:image/png;base64,AA".into())),
            true,
            false,
        );
        assert_eq!(buffer.contents(), "[Ryan]\n[图片]\nlook\n\n");
    }

    #[test]
    fn test_streaming_prints_only_new_text() {
        let (renderer, buffer) = renderer();
        renderer.append_message("Ann", &MessageContent::text("..."), false, true);
        renderer.update_message("Ann", "Hi", BubbleUpdate::Partial);
        renderer.update_message("Ann", "Hi there", BubbleUpdate::Partial);
        renderer.update_message("Ann", "Hi there!", BubbleUpdate::Final);

        assert_eq!(buffer.contents(), "[Ann] Hi there!\n\n");
    }

    #[test]
    fn test_trailing_dots_in_reply_are_shown_while_streaming() {
        let (renderer, buffer) = renderer();
        renderer.append_message("Ann", &MessageContent::text("..."), false, true);
        renderer.update_message("Ann", "Hold on...", BubbleUpdate::Partial);
        assert_eq!(buffer.contents(), "[Ann] Hold on...");

        renderer.update_message("Ann", "Hold on... ok", BubbleUpdate::Partial);
        renderer.update_message("Ann", "Hold on... ok", BubbleUpdate::Final);
        assert_eq!(buffer.contents(), "[Ann] Hold on... ok\n\n");
    }

    #[test]
    fn test_status_then_reply_starts_a_new_line() {
        let (renderer, buffer) = renderer();
        renderer.append_message("Ann", &MessageContent::text("..."), false, true);
        renderer.update_message("Ann", "重新连接中(重试 1/2)...", BubbleUpdate::Status);
        renderer.update_message("Ann", "错误: API 请求超时 (已重试2次)", BubbleUpdate::Final);

        assert_eq!(
            buffer.contents(),
            "[Ann] 重新连接中(重试 1/2)...\n错误: API 请求超时 (已重试2次)\n\n"
        );
    }

    #[test]
    fn test_new_bubble_closes_unfinished_one() {
        let (renderer, buffer) = renderer();
        renderer.append_message("Ann", &MessageContent::text("..."), false, true);
        renderer.update_message("Ann", "half", BubbleUpdate::Partial);
        renderer.append_message("Bob", &MessageContent::text("..."), false, true);
        renderer.update_message("Bob", "done", BubbleUpdate::Final);

        assert_eq!(buffer.contents(), "[Ann] half\n[Bob] done\n\n");
    }
}
