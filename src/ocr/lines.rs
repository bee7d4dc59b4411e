use regex::Regex;
use std::sync::LazyLock;

static WORD: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\p{L}{2,}").expect("valid regex"));

/// Splits recognizer output into trimmed, non-blank lines. `&` also breaks a line.
pub fn split_lines(text: &str) -> Vec<String> {
    text.split(['\n', '&'])
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .map(str::to_string)
        .collect()
}

pub fn non_blank_count(text: &str) -> usize {
    text.lines().filter(|l| !l.trim().is_empty()).count()
}

/// At least half of the non-space characters are alphanumeric and a word of two letters exists.
pub fn looks_like_text(line: &str) -> bool {
    let mut total = 0usize;
    let mut alnum = 0usize;
    for ch in line.chars().filter(|c| !c.is_whitespace()) {
        total += 1;
        if ch.is_alphanumeric() {
            alnum += 1;
        }
    }
    if total == 0 || alnum * 2 < total {
        return false;
    }
    WORD.is_match(line)
}

pub fn filter_noise(lines: Vec<String>) -> Vec<String> {
    lines.into_iter().filter(|l| looks_like_text(l)).collect()
}

/// Index of the attempt with the most non-blank lines. Ties keep the earliest attempt.
pub fn best_attempt<'a, I>(attempts: I) -> Option<usize>
where
    I: IntoIterator<Item = &'a str>,
{
    let mut best: Option<(usize, usize)> = None;
    for (idx, text) in attempts.into_iter().enumerate() {
        let score = non_blank_count(text);
        match best {
            Some((_, top)) if top >= score => {}
            _ => best = Some((idx, score)),
        }
    }
    best.map(|(idx, _)| idx)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn splits_on_newline_and_ampersand() {
        let lines = split_lines("  ООО Ромашка \n\nIvan Petrov & CEO\n   \n+7 (999) 123-45-67\n");
        assert_eq!(
            lines,
            ["ООО Ромашка", "Ivan Petrov", "CEO", "+7 (999) 123-45-67"]
        );
    }

    #[test]
    fn empty_output_has_no_lines() {
        assert!(split_lines("\n \n&&").is_empty());
        assert_eq!(non_blank_count(""), 0);
    }

    #[test]
    fn keeps_real_text_drops_noise() {
        assert!(looks_like_text("Иван Петров"));
        assert!(looks_like_text("ivan@example.com"));
        assert!(looks_like_text("Tel 8 800 555"));
        assert!(!looks_like_text("|| -- ~~ ."));
        assert!(!looks_like_text("1234 5678"));
        assert!(!looks_like_text("a.b.c.d"));
        assert!(!looks_like_text("   "));
    }

    #[test]
    fn filter_keeps_order() {
        let lines = vec![
            "Acme Corp".to_string(),
            "~~~".to_string(),
            "sales@acme.io".to_string(),
        ];
        assert_eq!(filter_noise(lines), ["Acme Corp", "sales@acme.io"]);
    }

    #[test]
    fn best_attempt_prefers_more_lines_then_earliest() {
        let attempts = ["a\nb", "a\nb\nc", "x\ny\nz", ""];
        assert_eq!(best_attempt(attempts), Some(1));
        assert_eq!(best_attempt(["", ""]), Some(0));
        assert_eq!(best_attempt(Vec::<&str>::new()), None);
    }
}
