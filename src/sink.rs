//! Display sinks: where the conversation is rendered.
//!
//! The coordinator talks to a [`DisplaySink`] and never to a terminal or widget directly.
//! [`PlainTextSink`] renders to any writer with optional ANSI styling; [`RecordingSink`]
//! keeps every call for inspection.

use std::io::{self, Stdout, Write};

use crate::types::{DEFAULT_BOT_NAME, Role};

/// ANSI escape code for dim text (used for the pending indicator and notices).
const ANSI_DIM: &str = "\x1b[2m";

/// ANSI escape code for bold text (used for speaker labels).
const ANSI_BOLD: &str = "\x1b[1m";

/// ANSI escape code to reset all styling.
const ANSI_RESET: &str = "\x1b[0m";

/// ANSI escape code for cyan text (used for the assistant label).
const ANSI_CYAN: &str = "\x1b[36m";

/// ANSI escape code for red text (used for errors).
const ANSI_RED: &str = "\x1b[31m";

/// ANSI escape code to erase the current line.
const ANSI_CLEAR_LINE: &str = "\r\x1b[2K";

/// Receives rendering commands from the stream coordinator.
///
/// A sink owns no conversation state.  Text handed to it is the raw stored content; any
/// conversion to a display format happens here.
pub trait DisplaySink: Send {
    /// Render a finalized message.
    fn show_turn(&mut self, text: &str, role: Role);

    /// Show the typing/loading affordance.
    fn show_pending_indicator(&mut self);

    /// Remove the typing/loading affordance.
    fn hide_pending_indicator(&mut self);

    /// Replace the streaming bubble's content with `full_text`.
    ///
    /// Each call carries the complete text so far, never a delta.
    fn update_streaming_bubble(&mut self, full_text: &str);

    /// Best effort; called after every update.
    fn scroll_to_latest(&mut self) {}

    /// Create an empty assistant bubble for the reply being streamed.
    fn begin_streaming_bubble(&mut self) {}

    /// The streamed reply is complete.
    fn finish_streaming_bubble(&mut self) {}

    /// Enable or disable the input surface.
    fn set_input_enabled(&mut self, enabled: bool) {
        _ = enabled;
    }

    /// The active session's title changed.
    fn title_changed(&mut self, title: &str) {
        _ = title;
    }

    /// Print an informational message.
    fn show_info(&mut self, info: &str) {
        _ = info;
    }

    /// Print an error message.
    fn show_error(&mut self, error: &str) {
        _ = error;
    }
}

/// Plain text sink with optional ANSI styling.
///
/// Streamed text is printed incrementally: every update prints only the part of the full
/// text that has not been written yet.
pub struct PlainTextSink<W: Write + Send = Stdout> {
    out: W,
    use_color: bool,
    bot_name: String,
    echo_user_turns: bool,
    indicator_visible: bool,
    streamed: usize,
}

impl PlainTextSink<Stdout> {
    /// Creates a sink on stdout with ANSI colors enabled.
    pub fn new() -> Self {
        Self::with_color(true)
    }

    /// Creates a sink on stdout with the specified color setting.
    pub fn with_color(use_color: bool) -> Self {
        Self::with_writer(io::stdout(), use_color)
    }
}

impl<W: Write + Send> PlainTextSink<W> {
    /// Creates a sink on an arbitrary writer.
    pub fn with_writer(out: W, use_color: bool) -> Self {
        Self {
            out,
            use_color,
            bot_name: DEFAULT_BOT_NAME.to_string(),
            echo_user_turns: true,
            indicator_visible: false,
            streamed: 0,
        }
    }

    /// Label assistant turns with `name`.
    pub fn with_bot_name(mut self, name: impl Into<String>) -> Self {
        self.bot_name = name.into();
        self
    }

    /// Whether user turns are printed.
    ///
    /// A line editor already shows what the user typed, so interactive use turns this
    /// off and switches it back on to replay a history.
    pub fn set_echo_user_turns(&mut self, echo: bool) {
        self.echo_user_turns = echo;
    }

    pub fn into_inner(self) -> W {
        self.out
    }

    fn flush(&mut self) {
        let _ = self.out.flush();
    }

    fn styled(&self, style: &str, text: &str) -> String {
        if self.use_color {
            format!("{style}{text}{ANSI_RESET}")
        } else {
            text.to_string()
        }
    }

    fn label(&self, role: Role) -> String {
        match role {
            Role::User => self.styled(ANSI_BOLD, "you: "),
            Role::Assistant => self.styled(ANSI_CYAN, &format!("{}: ", self.bot_name)),
        }
    }
}

impl Default for PlainTextSink<Stdout> {
    fn default() -> Self {
        Self::new()
    }
}

impl<W: Write + Send> DisplaySink for PlainTextSink<W> {
    fn show_turn(&mut self, text: &str, role: Role) {
        if role == Role::User && !self.echo_user_turns {
            return;
        }
        let label = self.label(role);
        let _ = writeln!(self.out, "{label}{text}");
        self.flush();
    }

    fn show_pending_indicator(&mut self) {
        let indicator = self.styled(ANSI_DIM, &format!("{} is typing...", self.bot_name));
        let _ = write!(self.out, "{indicator}");
        self.indicator_visible = true;
        self.flush();
    }

    fn hide_pending_indicator(&mut self) {
        if !self.indicator_visible {
            return;
        }
        if self.use_color {
            let _ = write!(self.out, "{ANSI_CLEAR_LINE}");
        } else {
            let width = self.bot_name.chars().count() + " is typing...".len();
            let _ = write!(self.out, "\r{}\r", " ".repeat(width));
        }
        self.indicator_visible = false;
        self.flush();
    }

    fn begin_streaming_bubble(&mut self) {
        let label = self.label(Role::Assistant);
        let _ = write!(self.out, "{label}");
        self.streamed = 0;
        self.flush();
    }

    fn update_streaming_bubble(&mut self, full_text: &str) {
        match full_text.get(self.streamed..) {
            Some(unseen) => {
                let _ = write!(self.out, "{unseen}");
            }
            None => {
                let label = self.label(Role::Assistant);
                let _ = write!(self.out, "\n{label}{full_text}");
            }
        }
        self.streamed = full_text.len();
        self.flush();
    }

    fn finish_streaming_bubble(&mut self) {
        let _ = writeln!(self.out);
        self.streamed = 0;
        self.flush();
    }

    fn title_changed(&mut self, title: &str) {
        let notice = self.styled(ANSI_DIM, &format!("[{title}]"));
        let _ = writeln!(self.out, "{notice}");
        self.flush();
    }

    fn show_info(&mut self, info: &str) {
        let _ = writeln!(self.out, "{info}");
        self.flush();
    }

    fn show_error(&mut self, error: &str) {
        let error = self.styled(ANSI_RED, &format!("Error: {error}"));
        let _ = writeln!(self.out, "{error}");
        self.flush();
    }
}

/// One call made on a [`RecordingSink`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SinkEvent {
    Turn { text: String, role: Role },
    PendingShown,
    PendingHidden,
    BubbleStarted,
    BubbleUpdated(String),
    BubbleFinished,
    Scrolled,
    InputEnabled(bool),
    TitleChanged(String),
    Info(String),
    Error(String),
}

/// A sink that records every call in order.
#[derive(Debug, Default, Clone)]
pub struct RecordingSink {
    pub events: Vec<SinkEvent>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// The full texts passed to `update_streaming_bubble`, in order.
    pub fn bubble_updates(&self) -> Vec<&str> {
        self.events
            .iter()
            .filter_map(|event| match event {
                SinkEvent::BubbleUpdated(text) => Some(text.as_str()),
                _ => None,
            })
            .collect()
    }

    /// True if the last input-surface change enabled it.
    pub fn input_enabled(&self) -> bool {
        self.events
            .iter()
            .rev()
            .find_map(|event| match event {
                SinkEvent::InputEnabled(enabled) => Some(*enabled),
                _ => None,
            })
            .unwrap_or(true)
    }
}

impl DisplaySink for RecordingSink {
    fn show_turn(&mut self, text: &str, role: Role) {
        self.events.push(SinkEvent::Turn {
            text: text.to_string(),
            role,
        });
    }

    fn show_pending_indicator(&mut self) {
        self.events.push(SinkEvent::PendingShown);
    }

    fn hide_pending_indicator(&mut self) {
        self.events.push(SinkEvent::PendingHidden);
    }

    fn update_streaming_bubble(&mut self, full_text: &str) {
        self.events
            .push(SinkEvent::BubbleUpdated(full_text.to_string()));
    }

    fn scroll_to_latest(&mut self) {
        self.events.push(SinkEvent::Scrolled);
    }

    fn begin_streaming_bubble(&mut self) {
        self.events.push(SinkEvent::BubbleStarted);
    }

    fn finish_streaming_bubble(&mut self) {
        self.events.push(SinkEvent::BubbleFinished);
    }

    fn set_input_enabled(&mut self, enabled: bool) {
        self.events.push(SinkEvent::InputEnabled(enabled));
    }

    fn title_changed(&mut self, title: &str) {
        self.events.push(SinkEvent::TitleChanged(title.to_string()));
    }

    fn show_info(&mut self, info: &str) {
        self.events.push(SinkEvent::Info(info.to_string()));
    }

    fn show_error(&mut self, error: &str) {
        self.events.push(SinkEvent::Error(error.to_string()));
    }
}
