//! OCR character-confusion fixes for single text lines

use lazy_static::lazy_static;
use regex::Regex;

/// Upper bound on correction passes; real lines settle in two or three
const MAX_PASSES: usize = 8;

lazy_static! {
    static ref RE_TRAILING_STOP: Regex = Regex::new(r"([A-Za-z0-9])\s*[.;,]\s*$").unwrap();
    static ref RE_SPACED_COLON: Regex = Regex::new(r"\s+:\s+").unwrap();
    static ref RE_TRAILING_COLON: Regex = Regex::new(r"\s*:\s*$").unwrap();
    static ref RE_EMPTY_BRACKETS: Regex = Regex::new(r"\[\s*\]").unwrap();
    static ref RE_EMPTY_PARENS: Regex = Regex::new(r"\(\s*\)").unwrap();
    static ref RE_DOT_RUN: Regex = Regex::new(r"\.{3,}").unwrap();
    static ref RE_SPACED_DOT: Regex = Regex::new(r"\s+\.\s+").unwrap();
    static ref RE_TRAILING_SPACED_DOT: Regex = Regex::new(r"\s+\.$").unwrap();
}

/// Correct common OCR confusions in one line
///
/// Passes repeat until the line stops changing, so normalizing an already
/// normalized line is a no-op.
pub fn normalize_line(line: &str) -> String {
    let mut current = line.trim().to_string();
    for _ in 0..MAX_PASSES {
        let next = correction_pass(&current);
        if next == current {
            break;
        }
        current = next;
    }
    current
}

fn correction_pass(line: &str) -> String {
    let line = line.replace('|', "I");
    let line = disambiguate_glyphs(&line);
    let line = canonical_brackets(&line);

    let line = RE_TRAILING_STOP.replace(&line, "${1}:");
    let line = RE_SPACED_COLON.replace_all(&line, ": ");
    let line = RE_TRAILING_COLON.replace(&line, ":");

    let line = RE_EMPTY_BRACKETS.replace_all(&line, "[ ]");
    let line = RE_EMPTY_PARENS.replace_all(&line, "( )");

    let line = RE_DOT_RUN.replace_all(&line, "...");
    let line = RE_SPACED_DOT.replace_all(&line, ". ");
    let line = RE_TRAILING_SPACED_DOT.replace(&line, ".");

    line.trim().to_string()
}

/// Characters OCR confuses with each other; they never serve as context
fn is_ambiguous(c: char) -> bool {
    matches!(c, '0' | 'O' | '1' | 'l')
}

fn is_letter_context(c: char) -> bool {
    c.is_ascii_alphabetic() && !is_ambiguous(c)
}

fn is_digit_context(c: char) -> bool {
    c.is_ascii_digit() && !is_ambiguous(c)
}

/// Resolve 0/O and 1/l from their immediate neighbours
///
/// A letter neighbour wins over a digit neighbour; with neither, the glyph
/// is left alone.
fn disambiguate_glyphs(line: &str) -> String {
    let chars: Vec<char> = line.chars().collect();
    chars
        .iter()
        .enumerate()
        .map(|(i, &c)| {
            let (letter, digit) = match c {
                '0' | 'O' => ('O', '0'),
                '1' | 'l' => ('l', '1'),
                _ => return c,
            };
            let prev = i.checked_sub(1).and_then(|p| chars.get(p)).copied();
            let next = chars.get(i + 1).copied();
            let neighbours = [prev, next];

            if neighbours.iter().flatten().any(|&n| is_letter_context(n)) {
                letter
            } else if neighbours.iter().flatten().any(|&n| is_digit_context(n)) {
                digit
            } else {
                c
            }
        })
        .collect()
}

/// Map full-width and CJK bracket glyphs to ASCII
fn canonical_brackets(line: &str) -> String {
    line.chars()
        .map(|c| match c {
            '（' | '﹙' => '(',
            '）' | '﹚' => ')',
            '［' | '【' | '〔' | '〖' => '[',
            '］' | '】' | '〕' | '〗' => ']',
            '｛' | '﹛' => '{',
            '｝' | '﹜' => '}',
            _ => c,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_vertical_bar_becomes_i() {
        assert_eq!(normalize_line("|D Number:"), "ID Number:");
    }

    #[test]
    fn test_zero_and_o_from_context() {
        assert_eq!(normalize_line("R0om Number:"), "ROom Number:");
        assert_eq!(normalize_line("Year 2O24"), "Year 2024");
        // Only ambiguous neighbours: left unchanged
        assert_eq!(normalize_line("Room 101"), "Room 101");
    }

    #[test]
    fn test_one_and_l_from_context() {
        assert_eq!(normalize_line("Emai1 Address:"), "Email Address:");
        assert_eq!(normalize_line("Age: 3l"), "Age: 31");
        assert_eq!(normalize_line("Hello"), "Hello");
    }

    #[test]
    fn test_brackets_canonicalized() {
        assert_eq!(normalize_line("Gender （M/F）:"), "Gender (M/F):");
        assert_eq!(normalize_line("Male []  Female (   )"), "Male [ ]  Female ( )");
    }

    #[test]
    fn test_trailing_stop_becomes_colon() {
        assert_eq!(normalize_line("Date of Birth."), "Date of Birth:");
        assert_eq!(normalize_line("Address ;"), "Address:");
        assert_eq!(normalize_line("Name ,"), "Name:");
        assert_eq!(normalize_line("Phone :"), "Phone:");
    }

    #[test]
    fn test_dot_runs() {
        assert_eq!(normalize_line("Name..........."), "Name...");
        assert_eq!(normalize_line("No . of rooms"), "No. of rooms");
        assert_eq!(normalize_line("......"), "...");
    }

    #[test]
    fn test_idempotent() {
        let samples = [
            "Patient Name:",
            "a . b .",
            "R0om N0. 1l0",
            "Date of Birth ........ (dd/mm/yyyy)",
            "|ssue date ;",
            "Gender [  ]  M  [ ] F",
            "Signature of Warden :  ",
            "1. Name",
            "  O  ",
            "Fee paid: Rs 5OO0l.",
            "...",
            "",
        ];
        for sample in samples {
            let once = normalize_line(sample);
            let twice = normalize_line(&once);
            assert_eq!(once, twice, "not idempotent for {:?}", sample);
        }
    }
}
