/// First line of `text`, cut to `max_chars` characters with an ellipsis.
pub fn snippet(text: &str, max_chars: usize) -> String {
    let line = text.lines().next().unwrap_or("").trim();
    if line.chars().count() <= max_chars {
        return line.to_owned();
    }

    let mut cut = line
        .chars()
        .take(max_chars.saturating_sub(1))
        .collect::<String>();
    cut.push('…');
    cut
}

/// Label for a record in lists: its text when it has one, else its id.
pub fn record_label(id: &str, text: &str, max_chars: usize) -> String {
    if text.trim().is_empty() {
        snippet(id, max_chars)
    } else {
        snippet(text, max_chars)
    }
}
