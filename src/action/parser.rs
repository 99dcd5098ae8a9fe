//! Decodes one action directive into a typed [`Command`].
//!
//! Two shapes are accepted: `finish(message="...")` and
//! `do(action="Name", key=value, ...)`. Each is read with a strict pattern
//! first and a best-effort fallback second; anything else is a decode error.

use once_cell::sync::Lazy;
use regex::Regex;

use crate::action::types::{
    Command, DecodeError, DirectiveKind, DurationArg, ParsedAction, Point,
    DEFAULT_TAKEOVER_REASON,
};

static FINISH_PREFIX: Lazy<Regex> = Lazy::new(|| Regex::new(r"^finish\s*\(").unwrap());
static DO_PREFIX: Lazy<Regex> = Lazy::new(|| Regex::new(r"^do\s*\(").unwrap());

static FINISH_STRICT: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r#"^finish\s*\(\s*message\s*=\s*(?:"((?:[^"\\]|\\.)*)"|'((?:[^'\\]|\\.)*)')\s*\)$"#,
    )
    .unwrap()
});

static ACTION_NAME: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"^do\s*\(\s*action\s*=\s*(?:"([^"]*)"|'([^']*)')"#).unwrap()
});

/// key=value where value is "str", 'str', [list] or a bare number.
static KWARG: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r#"(\w+)\s*=\s*("(?:[^"\\]|\\.)*"|'(?:[^'\\]|\\.)*'|\[[^\]]*\]|-?\d+(?:\.\d+)?)"#,
    )
    .unwrap()
});

/// `text=` followed by its opening quote.
static TYPE_TEXT_OPEN: Lazy<Regex> = Lazy::new(|| Regex::new(r#"\btext\s*=\s*(["'])"#).unwrap());

/// A literal keyword-argument value inside a `do(...)` call.
#[derive(Debug, Clone, PartialEq)]
pub enum ArgValue {
    Str(String),
    Num(f64),
    List(Vec<ArgValue>),
}

impl ArgValue {
    fn as_str(&self) -> Option<&str> {
        match self {
            ArgValue::Str(s) => Some(s),
            _ => None,
        }
    }
}

/// Decode a directive produced by the response splitter.
pub fn parse_action(directive: &str) -> Result<ParsedAction, DecodeError> {
    let normalized = escape_control_chars(directive.trim());

    if FINISH_PREFIX.is_match(&normalized) {
        let message = parse_finish_message(&normalized);
        return Ok(ParsedAction {
            kind: DirectiveKind::Finish,
            command: Command::Finish { message },
        });
    }

    if DO_PREFIX.is_match(&normalized) {
        let command = parse_do(&normalized)?;
        return Ok(ParsedAction {
            kind: DirectiveKind::Do,
            command,
        });
    }

    Err(DecodeError::UnknownDirective(normalized))
}

/// Literal line breaks and tabs become their two-character escapes so the
/// directive reads as one logical line.
pub fn escape_control_chars(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            other => out.push(other),
        }
    }
    out
}

fn unescape(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut chars = s.chars().peekable();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.peek().copied() {
            Some('n') => out.push('\n'),
            Some('r') => out.push('\r'),
            Some('t') => out.push('\t'),
            Some('"') => out.push('"'),
            Some('\'') => out.push('\''),
            Some('\\') => out.push('\\'),
            _ => {
                out.push('\\');
                continue;
            }
        }
        chars.next();
    }
    out
}

// ── finish(...) ──────────────────────────────────────────────────────────────

fn parse_finish_message(directive: &str) -> String {
    if let Some(caps) = FINISH_STRICT.captures(directive) {
        let raw = caps.get(1).or_else(|| caps.get(2)).map_or("", |m| m.as_str());
        return unescape(raw);
    }

    tracing::debug!(directive, "finish directive failed strict match; using fallback");

    let rest = match directive.find("message=") {
        Some(idx) => &directive[idx + "message=".len()..],
        None => {
            // finish(...) without a keyword: take whatever is inside the parens
            let open = directive.find('(').map_or(0, |i| i + 1);
            &directive[open..]
        }
    };
    let rest = rest.trim_start().trim_start_matches(['"', '\'']);
    let end = rest.find(['"', '\'', ')']).unwrap_or(rest.len());
    unescape(rest[..end].trim())
}

// ── do(...) ──────────────────────────────────────────────────────────────────

fn parse_do(directive: &str) -> Result<Command, DecodeError> {
    let name = ACTION_NAME
        .captures(directive)
        .and_then(|caps| caps.get(1).or_else(|| caps.get(2)))
        .map(|m| m.as_str().trim().to_string())
        .ok_or_else(|| DecodeError::MissingActionName(directive.to_string()))?;

    if name == "Type" || name == "Type_Name" {
        let text = extract_type_text(directive).ok_or(DecodeError::MissingArgument {
            action: name.clone(),
            arg: "text",
        })?;
        return Ok(Command::Type {
            text,
            by_name: name == "Type_Name",
        });
    }

    let args = scan_kwargs(directive);
    build_command(&name, &args)
}

fn extract_type_text(directive: &str) -> Option<String> {
    if let Some(caps) = TYPE_TEXT_OPEN.captures(directive) {
        let (Some(open), Some(quote)) = (caps.get(0), caps.get(1)) else {
            return None;
        };
        let quote = quote.as_str().chars().next()?;
        if let Some(raw) = quoted_text_body(&directive[open.end()..], quote) {
            return Some(unescape(raw));
        }
    }
    // near-miss quoting: everything after text= minus the closing paren and quotes
    let idx = directive.find("text=")?;
    let rest = directive[idx + "text=".len()..].trim();
    let rest = rest.strip_suffix(')').unwrap_or(rest).trim();
    let rest = rest.trim_matches(['"', '\'']);
    Some(unescape(rest))
}

/// Body of a quoted `text` value. The value ends at an unescaped `quote`
/// followed by `)`. Free text may contain unescaped quotes, so when one such
/// close sits at the very end of the input it wins; otherwise the first one
/// does and anything after the call is ignored.
fn quoted_text_body(rest: &str, quote: char) -> Option<&str> {
    let mut closes = Vec::new();
    let mut escaped = false;
    for (i, c) in rest.char_indices() {
        if escaped {
            escaped = false;
            continue;
        }
        if c == '\\' {
            escaped = true;
        } else if c == quote {
            let after = rest[i + c.len_utf8()..].trim_start();
            if let Some(tail) = after.strip_prefix(')') {
                closes.push((i, tail.trim().is_empty()));
            }
        }
    }
    let end = closes
        .iter()
        .rev()
        .find(|(_, at_end)| *at_end)
        .or_else(|| closes.first())
        .map(|(i, _)| *i)?;
    Some(&rest[..end])
}

/// Keyword arguments in source order, `action` included.
pub fn scan_kwargs(directive: &str) -> Vec<(String, ArgValue)> {
    KWARG
        .captures_iter(directive)
        .map(|caps| (caps[1].to_string(), parse_value(&caps[2])))
        .collect()
}

fn parse_value(raw: &str) -> ArgValue {
    if raw.len() >= 2
        && ((raw.starts_with('"') && raw.ends_with('"'))
            || (raw.starts_with('\'') && raw.ends_with('\'')))
    {
        return ArgValue::Str(unescape(&raw[1..raw.len() - 1]));
    }
    if raw.starts_with('[') {
        return parse_list(raw);
    }
    raw.parse::<f64>()
        .map(ArgValue::Num)
        .unwrap_or_else(|_| ArgValue::Str(raw.to_string()))
}

fn parse_list(raw: &str) -> ArgValue {
    if let Ok(nums) = serde_json::from_str::<Vec<f64>>(raw) {
        return ArgValue::List(nums.into_iter().map(ArgValue::Num).collect());
    }

    let inner = raw.trim_start_matches('[').trim_end_matches(']');
    let items = inner
        .split(',')
        .map(str::trim)
        .filter(|item| !item.is_empty())
        .map(|item| {
            let item = item.trim_matches(['"', '\'']).trim();
            item.parse::<f64>()
                .map(ArgValue::Num)
                .unwrap_or_else(|_| ArgValue::Str(item.to_string()))
        })
        .collect();
    ArgValue::List(items)
}

fn find<'a>(args: &'a [(String, ArgValue)], key: &str) -> Option<&'a ArgValue> {
    args.iter().find(|(k, _)| k == key).map(|(_, v)| v)
}

fn required_str(
    name: &str,
    args: &[(String, ArgValue)],
    key: &'static str,
) -> Result<String, DecodeError> {
    match find(args, key) {
        Some(ArgValue::Str(s)) => Ok(s.clone()),
        Some(ArgValue::Num(n)) => Ok(n.to_string()),
        Some(other) => Err(DecodeError::InvalidArgument {
            action: name.to_string(),
            arg: key,
            value: format!("{other:?}"),
        }),
        None => Err(DecodeError::MissingArgument {
            action: name.to_string(),
            arg: key,
        }),
    }
}

fn required_point(
    name: &str,
    args: &[(String, ArgValue)],
    key: &'static str,
) -> Result<Point, DecodeError> {
    let value = find(args, key).ok_or(DecodeError::MissingArgument {
        action: name.to_string(),
        arg: key,
    })?;
    to_point(value).ok_or_else(|| DecodeError::InvalidArgument {
        action: name.to_string(),
        arg: key,
        value: format!("{value:?}"),
    })
}

fn to_point(value: &ArgValue) -> Option<Point> {
    let ArgValue::List(items) = value else {
        return None;
    };
    match items.as_slice() {
        [ArgValue::Num(x), ArgValue::Num(y), ..] => Some(Point::new(x.round() as i32, y.round() as i32)),
        _ => None,
    }
}

/// `duration=` kept as written, provided `convert` can read it.
fn optional_duration<T>(
    name: &str,
    args: &[(String, ArgValue)],
    convert: fn(&DurationArg) -> Option<T>,
) -> Result<Option<DurationArg>, DecodeError> {
    let Some(value) = find(args, "duration") else {
        return Ok(None);
    };
    let duration = match value {
        ArgValue::Num(n) => Some(DurationArg::Number(*n)),
        ArgValue::Str(s) => Some(DurationArg::Text(s.clone())),
        ArgValue::List(_) => None,
    };
    match duration {
        Some(d) if convert(&d).is_some() => Ok(Some(d)),
        _ => Err(DecodeError::InvalidArgument {
            action: name.to_string(),
            arg: "duration",
            value: format!("{value:?}"),
        }),
    }
}

fn build_command(name: &str, args: &[(String, ArgValue)]) -> Result<Command, DecodeError> {
    let command = match name {
        "Launch" => Command::Launch {
            app: required_str(name, args, "app")?,
        },
        "Tap" => Command::Tap {
            point: required_point(name, args, "element")?,
            sensitive: find(args, "message").and_then(ArgValue::as_str).map(str::to_string),
        },
        "Swipe" => Command::Swipe {
            from: required_point(name, args, "start")?,
            to: required_point(name, args, "end")?,
        },
        "Back" => Command::Back,
        "Home" => Command::Home,
        "Double Tap" => Command::DoubleTap {
            point: required_point(name, args, "element")?,
        },
        "Long Press" => {
            let duration = optional_duration(name, args, DurationArg::as_millis)?;
            Command::LongPress {
                point: required_point(name, args, "element")?,
                duration,
            }
        }
        "Wait" => Command::Wait {
            duration: optional_duration(name, args, DurationArg::as_seconds)?,
        },
        "Take_over" => Command::TakeOver {
            reason: optional_str(args, "message").unwrap_or_else(|| DEFAULT_TAKEOVER_REASON.into()),
        },
        "Note" => Command::Note {
            text: optional_str(args, "message").unwrap_or_default(),
        },
        "Call_API" => Command::CallApi {
            instruction: optional_str(args, "instruction").unwrap_or_default(),
        },
        "Interact" => Command::Interact,
        other => return Err(DecodeError::UnknownAction(other.to_string())),
    };
    Ok(command)
}

fn optional_str(args: &[(String, ArgValue)], key: &str) -> Option<String> {
    find(args, key).and_then(ArgValue::as_str).map(str::to_string)
}
