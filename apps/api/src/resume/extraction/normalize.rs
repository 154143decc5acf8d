/// Cleans extracted text so every stage hands the parser the same shape:
/// LF line endings, plain spaces, no control characters besides `\n` and `\t`,
/// no trailing whitespace, at most two consecutive blank lines, and `- ` for bullet glyphs.
pub fn normalize_text(raw: &str) -> String {
    let unified = raw
        .replace("\r\n", "\n")
        .replace('\r', "\n")
        .replace(['\u{00A0}', '\u{202F}'], " ")
        .replace(|c: char| c.is_control() && c != '\n' && c != '\t', "");

    let mut out: Vec<String> = Vec::new();
    let mut blank_run = 0;

    for line in unified.lines() {
        let line = normalize_bullet(line.trim_end());
        if line.trim().is_empty() {
            blank_run += 1;
            if blank_run > 2 {
                continue;
            }
            out.push(String::new());
        } else {
            blank_run = 0;
            out.push(line);
        }
    }

    while out.last().is_some_and(|l| l.is_empty()) {
        out.pop();
    }
    let start = out.iter().position(|l| !l.is_empty()).unwrap_or(out.len());
    out[start..].join("\n")
}

const BULLET_GLYPHS: [char; 5] = ['•', '▪', '●', '◦', '‣'];

fn normalize_bullet(line: &str) -> String {
    let trimmed = line.trim_start();
    let indent = &line[..line.len() - trimmed.len()];
    match trimmed.strip_prefix(BULLET_GLYPHS) {
        Some(rest) => format!("{indent}- {}", rest.trim_start()),
        None => line.to_string(),
    }
}
