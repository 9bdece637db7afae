//! Small string-level helpers for patching OOXML parts in place

use std::borrow::Cow;

use quick_xml::events::Event;
use quick_xml::Reader;
use regex::Regex;

/// Byte span `[start, end)` of the first `<tag …>…</tag>` or `<tag …/>` at or after `from`
pub(crate) fn find_element(xml: &str, tag: &str, from: usize) -> Option<(usize, usize)> {
    let open = format!("<{}", tag);
    let mut search = from;
    while let Some(found) = xml.get(search..)?.find(&open) {
        let start = search + found;
        let after = start + open.len();
        match xml.as_bytes().get(after) {
            Some(b' ' | b'\t' | b'\r' | b'\n' | b'>' | b'/') => {}
            _ => {
                search = after;
                continue;
            }
        }
        let tag_end = start_tag_end(xml, start)?;
        if xml.as_bytes()[tag_end - 2] == b'/' {
            return Some((start, tag_end));
        }
        let close = format!("</{}>", tag);
        let close_at = xml[tag_end..].find(&close)?;
        return Some((start, tag_end + close_at + close.len()));
    }
    None
}

/// Every non-nested `tag` element, in document order
pub(crate) fn find_all(xml: &str, tag: &str) -> Vec<(usize, usize)> {
    let mut spans = Vec::new();
    let mut from = 0;
    while let Some((start, end)) = find_element(xml, tag, from) {
        spans.push((start, end));
        from = end;
    }
    spans
}

/// Name and span of each element at the top level of `fragment`, stopping at the
/// first end tag that closes the enclosing element
pub(crate) fn top_level_elements(fragment: &str) -> Vec<(String, usize, usize)> {
    let mut elements = Vec::new();
    let mut pos = 0;
    while let Some(found) = fragment[pos..].find('<') {
        let start = pos + found;
        let rest = &fragment[start + 1..];
        if rest.starts_with('/') {
            break;
        }
        if rest.starts_with('?') || rest.starts_with('!') {
            pos = start + 1 + rest.find('>').map_or(rest.len(), |i| i + 1);
            continue;
        }
        let name_len = rest
            .find(|c: char| c.is_whitespace() || c == '>' || c == '/')
            .unwrap_or(rest.len());
        let name = &rest[..name_len];
        match find_element(fragment, name, start) {
            Some((s, e)) if s == start => {
                elements.push((name.to_string(), s, e));
                pos = e;
            }
            _ => break,
        }
    }
    elements
}

/// Index just past the `>` closing the start tag that begins at `start`
pub(crate) fn start_tag_end(xml: &str, start: usize) -> Option<usize> {
    let mut quote: Option<u8> = None;
    for (offset, b) in xml.as_bytes()[start..].iter().enumerate() {
        match (quote, *b) {
            (Some(q), c) if c == q => quote = None,
            (Some(_), _) => {}
            (None, b'"' | b'\'') => quote = Some(*b),
            (None, b'>') => return Some(start + offset + 1),
            _ => {}
        }
    }
    None
}

/// Attributes of the first start tag in `element`, unescaped
pub(crate) fn attributes(element: &str) -> Vec<(String, String)> {
    let mut reader = Reader::from_str(element);
    loop {
        match reader.read_event() {
            Ok(Event::Start(e)) | Ok(Event::Empty(e)) => {
                return e
                    .attributes()
                    .flatten()
                    .map(|attr| {
                        let key = String::from_utf8_lossy(attr.key.as_ref()).into_owned();
                        let value = attr
                            .unescape_value()
                            .map(Cow::into_owned)
                            .unwrap_or_default();
                        (key, value)
                    })
                    .collect();
            }
            Ok(Event::Eof) | Err(_) => return Vec::new(),
            _ => {}
        }
    }
}

pub(crate) fn attr(element: &str, key: &str) -> Option<String> {
    attributes(element)
        .into_iter()
        .find(|(k, _)| k == key)
        .map(|(_, v)| v)
}

/// Set `key="value"` on the first start tag of `element`, replacing any existing value
pub(crate) fn set_attr(element: &str, key: &str, value: &str) -> String {
    let escaped = escape(value);
    let pattern = format!(r#"(\s){}=("[^"]*"|'[^']*')"#, regex::escape(key));
    let Some(tag_end) = start_tag_end(element, 0) else {
        return element.to_string();
    };
    let (head, tail) = element.split_at(tag_end);

    if let Ok(re) = Regex::new(&pattern) {
        if re.is_match(head) {
            let replaced = re.replace(head, |caps: &regex::Captures| {
                format!(r#"{}{}="{}""#, &caps[1], key, escaped)
            });
            return format!("{}{}", replaced, tail);
        }
    }

    let insert_at = if head.ends_with("/>") {
        head.len() - 2
    } else {
        head.len() - 1
    };
    let before = head[..insert_at].trim_end();
    format!(
        r#"{} {}="{}"{}{}"#,
        before,
        key,
        escaped,
        &head[insert_at..],
        tail
    )
}

pub(crate) fn escape(text: &str) -> Cow<'_, str> {
    quick_xml::escape::escape(text)
}
