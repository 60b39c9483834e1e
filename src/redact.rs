use std::borrow::Cow;

const JWT_PREFIX: &str = "eyJ";

fn is_token_char(ch: char) -> bool {
    ch.is_ascii_alphanumeric() || ch == '_' || ch == '-' || ch == '.'
}

/// Replaces JWT-shaped tokens (`eyJ...` with at least two dots) with a marker.
pub fn redact_jwts(input: &str) -> Cow<'_, str> {
    if !input.contains(JWT_PREFIX) {
        return Cow::Borrowed(input);
    }

    let mut out = String::with_capacity(input.len());
    let mut rest = input;
    while let Some(idx) = rest.find(JWT_PREFIX) {
        out.push_str(&rest[..idx]);
        rest = &rest[idx..];

        let mut consumed = 0;
        for ch in rest.chars() {
            if !is_token_char(ch) {
                break;
            }
            consumed += ch.len_utf8();
        }
        let candidate = &rest[..consumed];
        if candidate.matches('.').count() >= 2 {
            out.push_str("REDACTED");
        } else {
            out.push_str(candidate);
        }
        rest = &rest[consumed..];
    }
    out.push_str(rest);

    if out == input {
        Cow::Borrowed(input)
    } else {
        Cow::Owned(out)
    }
}

fn find_ascii_case_insensitive(haystack: &str, needle: &str) -> Option<usize> {
    let hay = haystack.as_bytes();
    let nee = needle.as_bytes();
    if nee.is_empty() {
        return Some(0);
    }
    if nee.len() > hay.len() {
        return None;
    }

    (0..=hay.len() - nee.len()).find(|&i| {
        hay[i..i + nee.len()]
            .iter()
            .zip(nee)
            .all(|(a, b)| a.to_ascii_lowercase() == b.to_ascii_lowercase())
    })
}

fn redact_after_marker(text: String, marker: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut rest = text.as_str();
    loop {
        let Some(idx) = find_ascii_case_insensitive(rest, marker) else {
            out.push_str(rest);
            break;
        };
        let end = idx + marker.len();
        out.push_str(&rest[..end]);
        rest = &rest[end..];

        if let Some(first) = rest.chars().next() {
            if first == ' ' {
                out.push(' ');
                rest = &rest[1..];
            }
        }

        let mut consumed = 0;
        for ch in rest.chars() {
            if ch.is_whitespace() || ch == '"' || ch == '\'' || ch == ',' {
                break;
            }
            consumed += ch.len_utf8();
        }
        if consumed > 0 {
            out.push_str("REDACTED");
        }
        rest = &rest[consumed..];
    }
    out
}

/// Strips bearer credentials and token fields from free text before it is
/// logged or handed to a caller.
pub fn redact_secrets(input: &str) -> Cow<'_, str> {
    let mut value = redact_jwts(input).into_owned();

    value = redact_after_marker(value, "Bearer");
    value = redact_after_marker(value, "access_token=");
    value = redact_after_marker(value, "refresh_token=");

    if value == input {
        Cow::Borrowed(input)
    } else {
        Cow::Owned(value)
    }
}
