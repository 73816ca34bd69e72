//! One-line statement previews for messages.

/// Strip comments, collapse whitespace, and truncate to `width` with a
/// trailing `...`. Quoted string contents are preserved verbatim.
pub fn preview(sql: &str, width: usize) -> String {
    let stripped = strip_comments(sql);
    let mut collapsed = String::with_capacity(stripped.len());
    let mut last_space = true;
    for ch in stripped.chars() {
        if ch.is_whitespace() {
            if !last_space {
                collapsed.push(' ');
                last_space = true;
            }
        } else {
            collapsed.push(ch);
            last_space = false;
        }
    }
    let collapsed = collapsed.trim();

    if collapsed.chars().count() <= width {
        return collapsed.to_string();
    }
    let truncated: String = collapsed.chars().take(width).collect();
    format!("{}...", truncated.trim_end())
}

fn strip_comments(sql: &str) -> String {
    let mut out = String::with_capacity(sql.len());
    let bytes = sql.as_bytes();
    let mut i = 0;
    let mut in_string = false;
    let mut block_depth = 0usize;

    while i < bytes.len() {
        let rest = &sql[i..];

        if block_depth > 0 {
            if rest.starts_with("*/") {
                block_depth -= 1;
                i += 2;
            } else if rest.starts_with("/*") {
                // PostgreSQL block comments nest.
                block_depth += 1;
                i += 2;
            } else {
                i += next_char_len(rest);
            }
            continue;
        }

        if in_string {
            if rest.starts_with("''") {
                out.push_str("''");
                i += 2;
                continue;
            }
            if rest.starts_with('\'') {
                in_string = false;
            }
            let len = next_char_len(rest);
            out.push_str(&rest[..len]);
            i += len;
            continue;
        }

        if rest.starts_with("/*") {
            block_depth += 1;
            out.push(' ');
            i += 2;
        } else if rest.starts_with("--") {
            let eol = rest.find('\n').map(|p| p + 1).unwrap_or(rest.len());
            out.push(' ');
            i += eol;
        } else if rest.starts_with('\'') {
            in_string = true;
            out.push('\'');
            i += 1;
        } else {
            let len = next_char_len(rest);
            out.push_str(&rest[..len]);
            i += len;
        }
    }

    out
}

fn next_char_len(rest: &str) -> usize {
    rest.chars().next().map(char::len_utf8).unwrap_or(1)
}
