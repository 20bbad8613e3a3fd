//! Depth-tracking tag scanner.
//!
//! The scanner understands exactly three things about the markup: where a tag
//! starts and ends, whether it is self-closing, and how same-named elements
//! nest. Everything else (attributes, processing instructions, doctype
//! declarations) is skipped over.

const COMMENT_OPEN: &str = "<!--";
const COMMENT_CLOSE: &str = "-->";

/// An opening tag located in the scanned text.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) struct OpenTag<'a> {
    /// Element name.
    pub name: &'a str,
    /// Offset of the `<`.
    pub start: usize,
    /// Offset just past the closing `>`.
    pub end: usize,
    /// Whether the tag closes itself (`<true/>`).
    pub self_closing: bool,
}

/// Blanks every `<!-- ... -->` span, preserving byte length and newlines so
/// offsets computed on the result are valid for the original text.
///
/// Returns the offset of the opening marker when a comment never closes.
pub(crate) fn blank_comments(text: &str) -> Result<String, usize> {
    let mut output = String::with_capacity(text.len());
    let mut cursor = 0;

    while let Some(found) = text.get(cursor..).and_then(|rest| rest.find(COMMENT_OPEN)) {
        let open = cursor + found;
        output.push_str(&text[cursor..open]);
        let body_start = open + COMMENT_OPEN.len();
        let close = text[body_start..]
            .find(COMMENT_CLOSE)
            .map(|idx| body_start + idx + COMMENT_CLOSE.len())
            .ok_or(open)?;
        for ch in text[open..close].chars() {
            if ch == '\n' {
                output.push('\n');
            } else {
                output.extend(std::iter::repeat_n(' ', ch.len_utf8()));
            }
        }
        cursor = close;
    }

    output.push_str(&text[cursor..]);
    Ok(output)
}

fn is_name_boundary(byte: Option<u8>) -> bool {
    matches!(byte, Some(b'>' | b'/') | Some(b' ' | b'\t' | b'\r' | b'\n'))
}

/// Parses the opening tag starting at `at`, which must point at `<`.
///
/// Closing tags, comments, declarations, and processing instructions are not
/// opening tags and yield `None`.
pub(crate) fn open_tag_at(text: &str, at: usize) -> Option<OpenTag<'_>> {
    let rest = text.get(at..)?;
    let after = rest.strip_prefix('<')?;
    if after.starts_with(['/', '!', '?']) {
        return None;
    }
    let name_len = after
        .find(|c: char| c == '>' || c == '/' || c.is_whitespace())
        .unwrap_or(after.len());
    if name_len == 0 {
        return None;
    }
    let close = rest.find('>')?;
    let self_closing = rest[..close].ends_with('/');
    Some(OpenTag {
        name: &after[..name_len],
        start: at,
        end: at + close + 1,
        self_closing,
    })
}

fn closes(text: &str, at: usize, name: &str) -> Option<usize> {
    let rest = text.get(at..)?;
    let after = rest.strip_prefix("</")?.strip_prefix(name)?;
    if !is_name_boundary(after.bytes().next()) {
        return None;
    }
    rest.find('>').map(|idx| at + idx + 1)
}

fn opens<'a>(text: &'a str, at: usize, name: &str) -> Option<OpenTag<'a>> {
    open_tag_at(text, at).filter(|tag| tag.name == name)
}

/// Finds the end offset (just past the closing tag) of the element opened by
/// `tag`, counting nested same-named elements so that an inner close tag does
/// not end the outer element early.
///
/// Scanning stops at `limit`. Returns `None` when the element never closes.
pub(crate) fn element_end(text: &str, tag: &OpenTag<'_>, limit: usize) -> Option<usize> {
    if tag.self_closing {
        return Some(tag.end);
    }

    let mut depth = 1_usize;
    let mut cursor = tag.end;
    while cursor < limit {
        let lt = cursor + text.get(cursor..limit)?.find('<')?;
        if let Some(after_close) = closes(text, lt, tag.name) {
            depth -= 1;
            if depth == 0 {
                return Some(after_close);
            }
            cursor = after_close;
        } else if let Some(inner) = opens(text, lt, tag.name) {
            if !inner.self_closing {
                depth += 1;
            }
            cursor = inner.end;
        } else {
            cursor = lt + 1;
        }
    }
    None
}

/// Finds the first opening tag at or after `from` and before `limit`.
pub(crate) fn next_open_tag(text: &str, from: usize, limit: usize) -> Option<OpenTag<'_>> {
    let mut cursor = from;
    while cursor < limit {
        let lt = cursor + text.get(cursor..limit)?.find('<')?;
        if let Some(tag) = open_tag_at(text, lt) {
            return Some(tag);
        }
        cursor = lt + 1;
    }
    None
}

/// Returns the opening tag that immediately follows `from`, skipping only
/// whitespace. Anything else in between (text, a closing tag) means there is
/// no directly following element.
pub(crate) fn following_open_tag(text: &str, from: usize, limit: usize) -> Option<OpenTag<'_>> {
    let rest = text.get(from..limit)?;
    let skipped = rest.len() - rest.trim_start().len();
    open_tag_at(text, from + skipped).filter(|tag| tag.end <= limit)
}

/// Offset of the first `<name ...>` marker whose trimmed text equals `key`,
/// searching from `from` up to `limit`. Returns the span of the whole marker.
pub(crate) fn find_key(text: &str, key: &str, from: usize, limit: usize) -> Option<(usize, usize)> {
    let mut cursor = from;
    while cursor < limit {
        let open = cursor + text.get(cursor..limit)?.find("<key>")?;
        let body = open + "<key>".len();
        let close = body + text.get(body..limit)?.find("</key>")?;
        let end = close + "</key>".len();
        if decode_entities(text[body..close].trim()) == key {
            return Some((open, end));
        }
        cursor = end;
    }
    None
}

/// Decodes the predefined XML entities and numeric character references.
///
/// Unknown or malformed references are kept verbatim.
pub(crate) fn decode_entities(raw: &str) -> String {
    if !raw.contains('&') {
        return raw.to_owned();
    }

    let mut output = String::with_capacity(raw.len());
    let mut rest = raw;
    while let Some(amp) = rest.find('&') {
        output.push_str(&rest[..amp]);
        let candidate = &rest[amp..];
        let decoded = candidate
            .find(';')
            .and_then(|semi| resolve_entity(&candidate[1..semi]).map(|ch| (ch, semi)));
        match decoded {
            Some((ch, semi)) => {
                output.push(ch);
                rest = &candidate[semi + 1..];
            }
            None => {
                output.push('&');
                rest = &candidate[1..];
            }
        }
    }
    output.push_str(rest);
    output
}

fn resolve_entity(name: &str) -> Option<char> {
    match name {
        "amp" => Some('&'),
        "lt" => Some('<'),
        "gt" => Some('>'),
        "quot" => Some('"'),
        "apos" => Some('\''),
        _ => {
            let numeric = name.strip_prefix('#')?;
            let code = match numeric.strip_prefix(['x', 'X']) {
                Some(hex) => u32::from_str_radix(hex, 16).ok()?,
                None => numeric.parse().ok()?,
            };
            char::from_u32(code)
        }
    }
}
