//! Minimal tag slicing for the schedule markup. Only what the cargo pages
//! need: class-filtered element lookup with nesting, text extraction.

pub fn to_lower(s: &str) -> String {
    // ASCII-only lowering keeps byte offsets aligned with the original.
    s.chars()
        .map(|c| if c.is_ascii() { c.to_ascii_lowercase() } else { c })
        .collect()
}

/// Outermost `<tag>` elements whose class list contains `class` (any element
/// of that tag when `class` is `None`), in document order.
pub fn elements<'a>(html: &'a str, tag: &str, class: Option<&str>) -> Vec<&'a str> {
    let lc = to_lower(html);
    let tag = to_lower(tag);
    let mut out = Vec::new();
    let mut pos = 0usize;
    while let Some(start) = find_open(&lc, &tag, pos) {
        let Some(open_end) = lc[start..].find('>').map(|i| start + i + 1) else {
            break;
        };
        let open_tag = &lc[start..open_end];
        if let Some(class) = class {
            if !has_class(open_tag, class) {
                pos = open_end;
                continue;
            }
        }
        let end = if open_tag.ends_with("/>") {
            open_end
        } else {
            find_close(&lc, &tag, open_end).unwrap_or(html.len())
        };
        out.push(&html[start..end]);
        pos = end;
    }
    out
}

pub fn first<'a>(html: &'a str, tag: &str, class: Option<&str>) -> Option<&'a str> {
    elements(html, tag, class).into_iter().next()
}

/// Drops every matching element, content included.
pub fn remove_elements(html: &str, tag: &str, class: Option<&str>) -> String {
    let mut out = html.to_string();
    for block in elements(html, tag, class) {
        out = out.replacen(block, "", 1);
    }
    out
}

pub fn inner(block: &str) -> &str {
    if let (Some(open_end), Some(close_start)) = (block.find('>'), block.rfind('<')) {
        if close_start > open_end {
            return &block[open_end + 1..close_start];
        }
    }
    ""
}

/// Visible text of an element: screen-reader spans removed, tags stripped,
/// entities decoded, whitespace collapsed.
pub fn text(block: &str) -> String {
    let visible = remove_elements(inner(block), "i", Some("hidden-text"));
    normalize_ws(&decode_entities(&strip_tags(&visible)))
}

pub fn contains_ci(haystack: &str, needle: &str) -> bool {
    to_lower(haystack).contains(&to_lower(needle))
}

pub fn strip_tags(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut in_tag = false;
    for ch in s.chars() {
        match ch {
            '<' => in_tag = true,
            '>' => in_tag = false,
            _ if !in_tag => out.push(ch),
            _ => {}
        }
    }
    out
}

pub fn decode_entities(s: &str) -> String {
    s.replace("&nbsp;", " ")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&amp;", "&")
}

pub fn normalize_ws(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut prev_space = false;
    for ch in s.chars() {
        if ch.is_whitespace() {
            if !prev_space {
                out.push(' ');
                prev_space = true;
            }
        } else {
            out.push(ch);
            prev_space = false;
        }
    }
    out.trim().to_string()
}

fn find_open(lc: &str, tag: &str, from: usize) -> Option<usize> {
    let pattern = format!("<{tag}");
    let mut pos = from;
    loop {
        let start = lc.get(pos..)?.find(&pattern)? + pos;
        let after = start + pattern.len();
        // `<i` must not match `<img`.
        match lc[after..].chars().next() {
            Some(c) if c.is_whitespace() || c == '>' || c == '/' => return Some(start),
            Some(_) => pos = after,
            None => return None,
        }
    }
}

fn find_close(lc: &str, tag: &str, from: usize) -> Option<usize> {
    let close = format!("</{tag}>");
    let mut depth = 1usize;
    let mut cursor = from;
    loop {
        let next_close = lc.get(cursor..)?.find(&close)? + cursor;
        match find_open(lc, tag, cursor) {
            Some(open) if open < next_close => {
                depth += 1;
                cursor = open + 1;
            }
            _ => {
                depth -= 1;
                cursor = next_close + close.len();
                if depth == 0 {
                    return Some(cursor);
                }
            }
        }
    }
}

fn has_class(open_tag: &str, class: &str) -> bool {
    let Some(idx) = open_tag.find("class=") else {
        return false;
    };
    let rest = &open_tag[idx + "class=".len()..];
    let value = match rest.chars().next() {
        Some(quote @ ('"' | '\'')) => rest[1..].split(quote).next().unwrap_or(""),
        _ => rest
            .split(|c: char| c.is_whitespace() || c == '>')
            .next()
            .unwrap_or(""),
    };
    let class = to_lower(class);
    value.split_whitespace().any(|c| c == class)
}
