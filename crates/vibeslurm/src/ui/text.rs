const TAB_WIDTH: usize = 4;

/// Hard-wraps every line of `text` at `width` characters.
pub(super) fn wrap_text_lines(text: &str, width: usize) -> Vec<String> {
    let width = width.max(1);
    let mut lines = Vec::new();
    for raw in text.split('\n') {
        let chars: Vec<char> = raw.chars().collect();
        if chars.is_empty() {
            lines.push(String::new());
            continue;
        }
        lines.extend(chars.chunks(width).map(|chunk| chunk.iter().collect::<String>()));
    }
    lines
}

/// Strips ANSI escapes, expands tabs and replaces other control characters so job output
/// renders as plain text.
pub(super) fn sanitize_text_for_tui(text: &str) -> String {
    let stripped = strip_ansi_sequences(text);
    let mut out = String::with_capacity(stripped.len());
    let mut col = 0usize;
    for ch in stripped.chars() {
        match ch {
            '\n' => {
                out.push('\n');
                col = 0;
            }
            '\r' => {}
            '\t' => {
                let spaces = TAB_WIDTH - col % TAB_WIDTH;
                out.extend(std::iter::repeat(' ').take(spaces));
                col += spaces;
            }
            _ if ch.is_control() => {
                out.push(' ');
                col += 1;
            }
            _ => {
                out.push(ch);
                col += 1;
            }
        }
    }
    out
}

fn strip_ansi_sequences(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut chars = text.chars().peekable();
    while let Some(ch) = chars.next() {
        if ch != '\u{1b}' {
            out.push(ch);
            continue;
        }
        match chars.peek().copied() {
            Some('[') => {
                chars.next();
                for seq_ch in chars.by_ref() {
                    if ('@'..='~').contains(&seq_ch) {
                        break;
                    }
                }
            }
            Some(']') => {
                chars.next();
                while let Some(seq_ch) = chars.next() {
                    if seq_ch == '\u{7}' {
                        break;
                    }
                    if seq_ch == '\u{1b}' {
                        if chars.peek() == Some(&'\\') {
                            chars.next();
                        }
                        break;
                    }
                }
            }
            _ => {}
        }
    }
    out
}

pub(super) fn truncate_with_ellipsis(text: &str, max_len: usize) -> String {
    let count = text.chars().count();
    if count <= max_len {
        return text.to_string();
    }
    if max_len <= 3 {
        return text.chars().take(max_len).collect();
    }
    let mut out: String = text.chars().take(max_len - 3).collect();
    out.push_str("...");
    out
}

/// The window of `lines` ending `scroll_back` lines above the bottom.
pub(super) fn visible_window<T>(lines: &[T], height: usize, scroll_back: usize) -> &[T] {
    let end = lines.len().saturating_sub(scroll_back);
    let start = end.saturating_sub(height);
    &lines[start..end]
}

/// Wraps only the logical lines needed to fill `height` rows ending `scroll_back` lines above the
/// last one, so the cost does not grow with the length of `lines`.
pub(super) fn tail_window(
    lines: &[String],
    width: usize,
    height: usize,
    scroll_back: usize,
) -> Vec<String> {
    let end = lines.len().saturating_sub(scroll_back);
    let mut rows: Vec<String> = Vec::new();
    for line in lines[..end].iter().rev() {
        if rows.len() >= height {
            break;
        }
        let mut wrapped = wrap_text_lines(line, width);
        wrapped.append(&mut rows);
        rows = wrapped;
    }
    let skip = rows.len().saturating_sub(height);
    rows.split_off(skip)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wrap_splits_long_lines_and_keeps_blank_ones() {
        let lines = wrap_text_lines("abcdef\n\nxy", 4);
        assert_eq!(lines, ["abcd", "ef", "", "xy"]);
    }

    #[test]
    fn sanitize_drops_colour_codes_and_carriage_returns() {
        let cleaned = sanitize_text_for_tui("\u{1b}[32mok\u{1b}[0m\r\n\tdone");
        assert_eq!(cleaned, "ok\n    done");
    }

    #[test]
    fn truncate_adds_ellipsis_only_when_needed() {
        assert_eq!(truncate_with_ellipsis("short", 10), "short");
        assert_eq!(truncate_with_ellipsis("a-very-long-name", 8), "a-ver...");
    }

    #[test]
    fn visible_window_follows_bottom_and_scrolls_back() {
        let lines: Vec<String> = (0..10).map(|n| n.to_string()).collect();
        assert_eq!(visible_window(&lines, 3, 0), ["7", "8", "9"]);
        assert_eq!(visible_window(&lines, 3, 2), ["5", "6", "7"]);
        assert_eq!(visible_window(&lines, 3, 50), Vec::<String>::new().as_slice());
    }

    #[test]
    fn tail_window_wraps_from_the_end() {
        let lines: Vec<String> = ["first", "second-line", "third"]
            .iter()
            .map(|line| line.to_string())
            .collect();
        assert_eq!(tail_window(&lines, 6, 3, 0), ["second", "-line", "third"]);
        assert_eq!(tail_window(&lines, 6, 2, 1), ["second", "-line"]);
        assert_eq!(tail_window(&lines, 20, 5, 2), ["first"]);
        assert!(tail_window(&lines, 20, 5, 9).is_empty());
    }
}
