use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

/// `2`, `2.5`, `2 seconds`, `500ms`, `3秒`: amount then optional unit.
static DURATION_TEXT: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\s*(\d+(?:\.\d+)?)\s*(\S*)\s*$").unwrap());

/// A position on the 0–1000 virtual screen scale. Values outside the range are
/// kept as given; the model is not trusted to stay in bounds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Point {
    pub x: i32,
    pub y: i32,
}

impl Point {
    pub fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }
}

/// One decoded model directive.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Command {
    Launch { app: String },
    /// `sensitive` carries the confirmation text the model attached to a risky tap.
    Tap { point: Point, sensitive: Option<String> },
    Type { text: String, by_name: bool },
    Swipe { from: Point, to: Point },
    Back,
    Home,
    DoubleTap { point: Point },
    /// `duration` absent means [`DEFAULT_LONG_PRESS_MS`].
    LongPress { point: Point, duration: Option<DurationArg> },
    /// `duration` absent means [`DEFAULT_WAIT_SECONDS`].
    Wait { duration: Option<DurationArg> },
    TakeOver { reason: String },
    Note { text: String },
    CallApi { instruction: String },
    Interact,
    Finish { message: String },
}

pub const DEFAULT_LONG_PRESS_MS: u64 = 3000;
pub const DEFAULT_WAIT_SECONDS: f64 = 1.0;
/// Take_over reason when the model gives none.
pub const DEFAULT_TAKEOVER_REASON: &str = "User intervention required";

/// A `duration=` value exactly as written: a bare number or a quoted string.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum DurationArg {
    Number(f64),
    Text(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TimeUnit {
    Millis,
    Seconds,
}

impl DurationArg {
    /// Amount plus explicit unit, `None` for negative or unreadable values.
    fn parts(&self) -> Option<(f64, Option<TimeUnit>)> {
        match self {
            DurationArg::Number(n) if *n >= 0.0 && n.is_finite() => Some((*n, None)),
            DurationArg::Number(_) => None,
            DurationArg::Text(text) => {
                let caps = DURATION_TEXT.captures(text)?;
                let amount = caps[1].parse::<f64>().ok()?;
                let unit = match caps[2].to_lowercase().as_str() {
                    "" => None,
                    "ms" | "msec" | "millis" | "millisecond" | "milliseconds" | "毫秒" => {
                        Some(TimeUnit::Millis)
                    }
                    "s" | "sec" | "secs" | "second" | "seconds" | "秒" => Some(TimeUnit::Seconds),
                    _ => return None,
                };
                Some((amount, unit))
            }
        }
    }

    /// Seconds; a value without a unit is already seconds.
    pub fn as_seconds(&self) -> Option<f64> {
        let (amount, unit) = self.parts()?;
        Some(match unit {
            Some(TimeUnit::Millis) => amount / 1000.0,
            Some(TimeUnit::Seconds) | None => amount,
        })
    }

    /// Milliseconds; a value without a unit is already milliseconds.
    pub fn as_millis(&self) -> Option<u64> {
        let (amount, unit) = self.parts()?;
        let ms = match unit {
            Some(TimeUnit::Seconds) => amount * 1000.0,
            Some(TimeUnit::Millis) | None => amount,
        };
        Some(ms.round() as u64)
    }

    fn literal(&self) -> String {
        match self {
            DurationArg::Number(n) => n.to_string(),
            DurationArg::Text(t) => quoted(t),
        }
    }
}

impl Command {
    /// `Finish` is the only variant that ends the task by itself.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Command::Finish { .. })
    }

    /// Wire name used in the `action=` slot of a `do(...)` directive.
    pub fn name(&self) -> &'static str {
        match self {
            Command::Launch { .. } => "Launch",
            Command::Tap { .. } => "Tap",
            Command::Type { by_name: false, .. } => "Type",
            Command::Type { by_name: true, .. } => "Type_Name",
            Command::Swipe { .. } => "Swipe",
            Command::Back => "Back",
            Command::Home => "Home",
            Command::DoubleTap { .. } => "Double Tap",
            Command::LongPress { .. } => "Long Press",
            Command::Wait { .. } => "Wait",
            Command::TakeOver { .. } => "Take_over",
            Command::Note { .. } => "Note",
            Command::CallApi { .. } => "Call_API",
            Command::Interact => "Interact",
            Command::Finish { .. } => "finish",
        }
    }

    /// Canonical directive text. Decoding the result yields `self` again.
    pub fn to_directive(&self) -> String {
        let args: Vec<(&str, String)> = match self {
            Command::Finish { message } => {
                return format!("finish(message=\"{}\")", escape(message));
            }
            Command::Launch { app } => vec![("app", quoted(app))],
            Command::Tap { point, sensitive } => {
                let mut a = vec![("element", point_literal(point))];
                if let Some(msg) = sensitive {
                    a.push(("message", quoted(msg)));
                }
                a
            }
            // text goes last: the dedicated Type pattern reads up to the closing paren
            Command::Type { text, .. } => vec![("text", quoted(text))],
            Command::Swipe { from, to } => vec![
                ("start", point_literal(from)),
                ("end", point_literal(to)),
            ],
            Command::Back | Command::Home | Command::Interact => Vec::new(),
            Command::DoubleTap { point } => vec![("element", point_literal(point))],
            Command::LongPress { point, duration } => {
                let mut a = vec![("element", point_literal(point))];
                if let Some(d) = duration {
                    a.push(("duration", d.literal()));
                }
                a
            }
            Command::Wait { duration } => duration
                .iter()
                .map(|d| ("duration", d.literal()))
                .collect(),
            // optional arguments left at their decoded defaults are omitted
            Command::TakeOver { reason } if reason == DEFAULT_TAKEOVER_REASON => Vec::new(),
            Command::TakeOver { reason } => vec![("message", quoted(reason))],
            Command::Note { text } if text.is_empty() => Vec::new(),
            Command::Note { text } => vec![("message", quoted(text))],
            Command::CallApi { instruction } if instruction.is_empty() => Vec::new(),
            Command::CallApi { instruction } => vec![("instruction", quoted(instruction))],
        };

        let mut out = format!("do(action=\"{}\"", self.name());
        for (key, value) in args {
            out.push_str(&format!(", {key}={value}"));
        }
        out.push(')');
        out
    }
}

/// Which directive shape produced a command. The task loop branches on this,
/// never on the command name alone.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DirectiveKind {
    Do,
    Finish,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParsedAction {
    pub kind: DirectiveKind,
    pub command: Command,
}

impl ParsedAction {
    pub fn is_finish(&self) -> bool {
        self.kind == DirectiveKind::Finish && self.command.is_terminal()
    }
}

/// Reasoning and directive halves of one model completion.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SplitResponse {
    pub reasoning: String,
    pub action: String,
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum DecodeError {
    #[error("unrecognized directive: {0}")]
    UnknownDirective(String),
    #[error("unknown action name: {0}")]
    UnknownAction(String),
    #[error("directive is missing the `action` keyword: {0}")]
    MissingActionName(String),
    #[error("action {action} is missing argument `{arg}`")]
    MissingArgument { action: String, arg: &'static str },
    #[error("action {action} has an invalid `{arg}` argument: {value}")]
    InvalidArgument {
        action: String,
        arg: &'static str,
        value: String,
    },
}

fn escape(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '"' => out.push_str("\\\""),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            other => out.push(other),
        }
    }
    out
}

fn quoted(s: &str) -> String {
    format!("\"{}\"", escape(s))
}

fn point_literal(p: &Point) -> String {
    format!("[{},{}]", p.x, p.y)
}
