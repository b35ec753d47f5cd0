/// Replaces each `:key` in `pattern` in a single left-to-right pass, so
/// substituted values are never scanned again.
pub fn apply_pattern_string(pattern: &str, vars: &[(&str, &str)]) -> String {
    let mut result = String::with_capacity(pattern.len());
    let mut rest = pattern;
    while let Some(pos) = rest.find(':') {
        result.push_str(&rest[..pos]);
        let after = &rest[pos + 1..];
        let matched = vars
            .iter()
            .filter(|(key, _)| !key.is_empty() && after.starts_with(key))
            .max_by_key(|(key, _)| key.len());
        match matched {
            Some((key, value)) => {
                result.push_str(value);
                rest = &after[key.len()..];
            }
            None => {
                result.push(':');
                rest = after;
            }
        }
    }
    result.push_str(rest);
    result
}

/// Splits `text` into chunks of at most `max_bytes` bytes without cutting a UTF-8 sequence.
pub fn split_on_char_boundary(text: &str, max_bytes: usize) -> Vec<&str> {
    if max_bytes == 0 || text.len() <= max_bytes {
        return vec![text];
    }

    let mut chunks = Vec::new();
    let mut rest = text;
    while rest.len() > max_bytes {
        let mut end = max_bytes;
        while end > 0 && !rest.is_char_boundary(end) {
            end -= 1;
        }
        if end == 0 {
            end = rest
                .char_indices()
                .nth(1)
                .map(|(idx, _)| idx)
                .unwrap_or(rest.len());
        }
        let (head, tail) = rest.split_at(end);
        chunks.push(head);
        rest = tail;
    }
    if !rest.is_empty() {
        chunks.push(rest);
    }
    chunks
}
