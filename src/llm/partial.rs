//! Best-effort parsing of incomplete JSON
//!
//! Streaming extraction sees the model's JSON answer one delta at a time.
//! [`parse_partial`] turns any prefix of a JSON document into the most
//! complete value it can: open strings are closed, open arrays and objects
//! are closed, and dangling keys, commas or half-written literals are dropped.

use serde_json::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Expect {
    Key,
    Colon,
    Value,
    Comma,
}

#[derive(Debug, Clone, Copy)]
struct Frame {
    closer: char,
    expect: Expect,
}

/// Last prefix of the input that can be closed into valid JSON
#[derive(Debug, Clone)]
struct SafePoint {
    end: usize,
    closers: String,
}

fn closers(stack: &[Frame]) -> String {
    stack.iter().rev().map(|f| f.closer).collect()
}

/// Pull the JSON payload out of a model answer
///
/// Accepts fenced ```json blocks (closed or still streaming) and bare JSON
/// surrounded by prose.
pub fn extract_json_block(text: &str) -> &str {
    if let Some(start) = text.find("```") {
        let after_fence = &text[start + 3..];
        // Skip the info string (`json`, `JSON`, ...) up to the end of line
        let body = match after_fence.find('\n') {
            Some(nl) => &after_fence[nl + 1..],
            None => return "",
        };
        return match body.find("```") {
            Some(end) => body[..end].trim(),
            None => body.trim(),
        };
    }

    match text.find(|c| c == '{' || c == '[') {
        Some(start) => {
            let body = &text[start..];
            match document_end(body) {
                Some(end) => &body[..end],
                None => body.trim(),
            }
        }
        None => text.trim(),
    }
}

/// Byte offset just past the bracket closing the one `body` opens with
///
/// `None` while the document is still open.
fn document_end(body: &str) -> Option<usize> {
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;

    for (i, c) in body.char_indices() {
        if in_string {
            match c {
                _ if escaped => escaped = false,
                '\\' => escaped = true,
                '"' => in_string = false,
                _ => {}
            }
            continue;
        }
        match c {
            '"' => in_string = true,
            '{' | '[' => depth += 1,
            '}' | ']' => {
                depth = depth.saturating_sub(1);
                if depth == 0 {
                    return Some(i + 1);
                }
            }
            _ => {}
        }
    }
    None
}

/// Parse a possibly truncated JSON document
pub fn parse_partial(input: &str) -> Option<Value> {
    let input = input.trim();
    if input.is_empty() {
        return None;
    }
    if let Ok(value) = serde_json::from_str(input) {
        return Some(value);
    }

    let mut stack: Vec<Frame> = Vec::new();
    let mut safe: Option<SafePoint> = None;
    let mut in_string = false;
    let mut string_is_key = false;
    let mut escaped = false;
    let mut scalar_start: Option<usize> = None;
    let mut finished = false;

    let complete_value = |stack: &mut Vec<Frame>, safe: &mut Option<SafePoint>, end: usize| {
        if let Some(top) = stack.last_mut() {
            top.expect = Expect::Comma;
        }
        *safe = Some(SafePoint {
            end,
            closers: closers(stack),
        });
        stack.is_empty()
    };

    for (i, c) in input.char_indices() {
        if in_string {
            if escaped {
                escaped = false;
            } else if c == '\\' {
                escaped = true;
            } else if c == '"' {
                in_string = false;
                if string_is_key {
                    if let Some(top) = stack.last_mut() {
                        top.expect = Expect::Colon;
                    }
                } else if complete_value(&mut stack, &mut safe, i + 1) {
                    finished = true;
                    break;
                }
            }
            continue;
        }

        if let Some(start) = scalar_start {
            if c.is_whitespace() || matches!(c, ',' | '}' | ']') {
                if serde_json::from_str::<Value>(&input[start..i]).is_err() {
                    return None;
                }
                scalar_start = None;
                if complete_value(&mut stack, &mut safe, i) {
                    finished = true;
                    break;
                }
            } else {
                continue;
            }
        }

        match c {
            c if c.is_whitespace() => {}
            '{' | '[' => {
                stack.push(Frame {
                    closer: if c == '{' { '}' } else { ']' },
                    expect: if c == '{' { Expect::Key } else { Expect::Value },
                });
                safe = Some(SafePoint {
                    end: i + 1,
                    closers: closers(&stack),
                });
            }
            '}' | ']' => {
                stack.pop()?;
                if complete_value(&mut stack, &mut safe, i + 1) {
                    finished = true;
                    break;
                }
            }
            ':' => {
                let top = stack.last_mut()?;
                top.expect = Expect::Value;
            }
            ',' => {
                let top = stack.last_mut()?;
                top.expect = if top.closer == '}' {
                    Expect::Key
                } else {
                    Expect::Value
                };
            }
            '"' => {
                in_string = true;
                string_is_key = matches!(stack.last(), Some(f) if f.expect == Expect::Key);
            }
            _ => scalar_start = Some(i),
        }
    }

    let at_safe_point = |safe: Option<&SafePoint>| -> Option<Value> {
        let point = safe?;
        serde_json::from_str(&format!("{}{}", &input[..point.end], point.closers)).ok()
    };

    if finished {
        return at_safe_point(safe.as_ref());
    }

    let repaired = if in_string && !string_is_key {
        let mut text = input.to_string();
        if escaped {
            text.pop();
        }
        text.push('"');
        text.push_str(&closers(&stack));
        Some(text)
    } else if scalar_start.is_some_and(|s| serde_json::from_str::<Value>(&input[s..]).is_ok()) {
        Some(format!("{}{}", input, closers(&stack)))
    } else {
        None
    };

    repaired
        .and_then(|text| serde_json::from_str(&text).ok())
        .or_else(|| at_safe_point(safe.as_ref()))
}
