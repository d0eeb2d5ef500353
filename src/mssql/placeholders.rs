use std::borrow::Cow;

/// Rewrite positional `?` binds into the `@P1..@Pn` names tiberius binds.
///
/// Question marks inside string literals, quoted or bracketed identifiers and
/// comments are left alone.
#[must_use]
pub fn rewrite_placeholders(sql: &str) -> Cow<'_, str> {
    let bytes = sql.as_bytes();
    let mut out: Option<String> = None;
    let mut copied = 0;
    let mut next = 1usize;
    let mut state = State::Normal;
    let mut idx = 0;

    while idx < bytes.len() {
        let b = bytes[idx];
        match state {
            State::Normal => match b {
                b'\'' => state = State::SingleQuoted,
                b'"' => state = State::DoubleQuoted,
                b'[' => state = State::Bracketed,
                b'-' if bytes.get(idx + 1) == Some(&b'-') => {
                    state = State::LineComment;
                    idx += 1;
                }
                b'/' if bytes.get(idx + 1) == Some(&b'*') => {
                    state = State::BlockComment(1);
                    idx += 1;
                }
                b'?' => {
                    let buf = out.get_or_insert_with(|| String::with_capacity(sql.len() + 8));
                    buf.push_str(&sql[copied..idx]);
                    buf.push_str(&format!("@P{next}"));
                    next += 1;
                    copied = idx + 1;
                }
                _ => {}
            },
            State::SingleQuoted => {
                if b == b'\'' {
                    if bytes.get(idx + 1) == Some(&b'\'') {
                        idx += 1; // escaped quote
                    } else {
                        state = State::Normal;
                    }
                }
            }
            State::DoubleQuoted => {
                if b == b'"' {
                    if bytes.get(idx + 1) == Some(&b'"') {
                        idx += 1;
                    } else {
                        state = State::Normal;
                    }
                }
            }
            State::Bracketed => {
                if b == b']' {
                    if bytes.get(idx + 1) == Some(&b']') {
                        idx += 1;
                    } else {
                        state = State::Normal;
                    }
                }
            }
            State::LineComment => {
                if b == b'\n' {
                    state = State::Normal;
                }
            }
            State::BlockComment(depth) => {
                if b == b'/' && bytes.get(idx + 1) == Some(&b'*') {
                    state = State::BlockComment(depth + 1);
                    idx += 1;
                } else if b == b'*' && bytes.get(idx + 1) == Some(&b'/') {
                    state = if depth == 1 {
                        State::Normal
                    } else {
                        State::BlockComment(depth - 1)
                    };
                    idx += 1;
                }
            }
        }
        idx += 1;
    }

    match out {
        Some(mut buf) => {
            buf.push_str(&sql[copied..]);
            Cow::Owned(buf)
        }
        None => Cow::Borrowed(sql),
    }
}

#[derive(Clone, Copy)]
enum State {
    Normal,
    SingleQuoted,
    DoubleQuoted,
    Bracketed,
    LineComment,
    BlockComment(u32),
}
