//! English cardinal words to numbers ("twenty-five" -> 25).

const UNITS: [(&str, u64); 20] = [
    ("zero", 0),
    ("one", 1),
    ("two", 2),
    ("three", 3),
    ("four", 4),
    ("five", 5),
    ("six", 6),
    ("seven", 7),
    ("eight", 8),
    ("nine", 9),
    ("ten", 10),
    ("eleven", 11),
    ("twelve", 12),
    ("thirteen", 13),
    ("fourteen", 14),
    ("fifteen", 15),
    ("sixteen", 16),
    ("seventeen", 17),
    ("eighteen", 18),
    ("nineteen", 19),
];

const TENS: [(&str, u64); 8] = [
    ("twenty", 20),
    ("thirty", 30),
    ("forty", 40),
    ("fifty", 50),
    ("sixty", 60),
    ("seventy", 70),
    ("eighty", 80),
    ("ninety", 90),
];

/// Parses a cardinal number written out in English words. Tokens may be
/// separated by spaces or hyphens; "and" is ignored. Returns `None` for
/// anything that is not a well-formed cardinal ("onehundred", "many").
pub fn cardinal_to_number(text: &str) -> Option<u64> {
    let lower = text.to_lowercase();
    let tokens: Vec<&str> = lower
        .split(|c: char| c.is_whitespace() || c == '-')
        .filter(|t| !t.is_empty() && *t != "and")
        .collect();
    if tokens.is_empty() {
        return None;
    }

    let mut total: u64 = 0;
    let mut current: u64 = 0;
    for token in tokens {
        if let Some(&(_, v)) = UNITS.iter().find(|(w, _)| *w == token) {
            current += v;
        } else if let Some(&(_, v)) = TENS.iter().find(|(w, _)| *w == token) {
            current += v;
        } else if token == "hundred" {
            current = current.max(1) * 100;
        } else if token == "thousand" {
            total += current.max(1) * 1_000;
            current = 0;
        } else if token == "million" {
            total += current.max(1) * 1_000_000;
            current = 0;
        } else {
            return None;
        }
    }
    Some(total + current)
}
