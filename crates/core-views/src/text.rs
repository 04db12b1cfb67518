/// Truncate `text` to `columns` characters, marking the cut with `~`.
pub fn fit(text: &str, columns: usize) -> String {
    if text.chars().count() <= columns {
        return text.to_string();
    }
    if columns == 0 {
        return String::new();
    }
    let mut out: String = text.chars().take(columns - 1).collect();
    out.push('~');
    out
}

/// Greedy word wrap into lines of at most `columns` characters. Words longer
/// than a line are split hard. Blank input lines are kept as paragraph breaks.
pub fn wrap(text: &str, columns: usize) -> Vec<String> {
    let columns = columns.max(1);
    let mut lines = Vec::new();
    for paragraph in text.lines() {
        let mut line = String::new();
        let mut len = 0usize;
        for word in paragraph.split_whitespace() {
            let mut word: Vec<char> = word.chars().collect();
            while word.len() > columns {
                if len > 0 {
                    lines.push(std::mem::take(&mut line));
                    len = 0;
                }
                let rest = word.split_off(columns);
                lines.push(word.into_iter().collect());
                word = rest;
            }
            let needed = if len == 0 { word.len() } else { len + 1 + word.len() };
            if needed > columns {
                lines.push(std::mem::take(&mut line));
                len = 0;
            }
            if len > 0 {
                line.push(' ');
                len += 1;
            }
            line.extend(word.iter());
            len += word.len();
        }
        lines.push(line);
    }
    lines
}
