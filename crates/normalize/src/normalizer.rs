use deunicode::deunicode;
use once_cell::sync::Lazy;
use regex::Regex;

static WHITESPACE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").expect("invalid WHITESPACE"));
static NON_LATIN_LETTER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[\p{L}&&\P{Latin}]").expect("invalid NON_LATIN_LETTER"));

/// "u." that is not the start of a dotted two-letter abbreviation such as "u.s."
static DOTTED_LETTER_AHEAD: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^ ?[a-z]\.").expect("invalid DOTTED_LETTER_AHEAD"));

struct Expansion {
    pattern: Regex,
    replacement: &'static str,
    /// Extra condition on the text following the match.
    guard: Option<fn(&str) -> bool>,
}

impl Expansion {
    fn new(pattern: &str, replacement: &'static str) -> Self {
        Self {
            pattern: Regex::new(pattern).expect("invalid expansion pattern"),
            replacement,
            guard: None,
        }
    }

    fn guarded(pattern: &str, replacement: &'static str, guard: fn(&str) -> bool) -> Self {
        Self {
            guard: Some(guard),
            ..Self::new(pattern, replacement)
        }
    }

    /// Replace every match that is not glued to a preceding ascii letter.
    fn apply(&self, text: &str) -> String {
        let mut out = String::with_capacity(text.len() + 16);
        let mut last = 0;

        for m in self.pattern.find_iter(text) {
            let glued = text[..m.start()]
                .chars()
                .next_back()
                .is_some_and(|c| c.is_ascii_lowercase());
            if glued {
                continue;
            }
            if let Some(guard) = self.guard {
                if !guard(&text[m.end()..]) {
                    continue;
                }
            }
            out.push_str(&text[last..m.start()]);
            out.push_str(self.replacement);
            last = m.end();
        }

        out.push_str(&text[last..]);
        out
    }
}

/// Abbreviation expansions, in application order. Later rules see the output
/// of earlier ones.
static EXPANSIONS: Lazy<Vec<Expansion>> = Lazy::new(|| {
    vec![
        Expansion::guarded(r"u\.", "university ", |rest| {
            !DOTTED_LETTER_AHEAD.is_match(rest)
        }),
        Expansion::new(r"univ[. ]", "university "),
        Expansion::new(r"univ$", "university"),
        Expansion::new(r"lab[^a-z]", "laboratory "),
        Expansion::new(r"lab$", "laboratory"),
        Expansion::new(r"inst[^a-z]", "institute "),
        Expansion::new(r"inst$", "institute"),
        Expansion::new(r"tech[^a-z]", "technology "),
        Expansion::new(r"tech$", "technology"),
        Expansion::new(r"u\. ?s\.", "united states"),
    ]
});

/// True when every alphabetic character belongs to the Latin script.
pub fn is_latin(text: &str) -> bool {
    !NON_LATIN_LETTER.is_match(text)
}

/// Collapse whitespace runs to a single space and trim.
pub fn collapse_whitespace(text: &str) -> String {
    WHITESPACE.replace_all(text.trim(), " ").into_owned()
}

/// Canonical form of an organization name or affiliation substring.
///
/// Latin-only text is transliterated to ascii; other scripts are only
/// lowercased. Common abbreviations (univ, lab, inst, tech, u.s.) are
/// expanded, ampersands become "and" and a leading "the" is dropped.
pub fn normalize(text: &str) -> String {
    let mut s = if is_latin(text) {
        collapse_whitespace(&deunicode(text).to_lowercase())
    } else {
        collapse_whitespace(&text.to_lowercase())
    };

    // An expansion can lift the guard on an earlier "u." ("u.u." -> "u.university"),
    // so rewrite until the text settles. Every pass that changes the text
    // consumes an abbreviation, an ampersand or a leading article.
    loop {
        let next = rewrite(&s);
        if next == s {
            return next;
        }
        s = next;
    }
}

fn rewrite(text: &str) -> String {
    let mut s = text.to_string();
    for expansion in EXPANSIONS.iter() {
        s = expansion.apply(&s);
    }

    s = s.replace("&amp;", " and ").replace('&', " and ");
    s = collapse_whitespace(&s);
    while let Some(rest) = s.strip_prefix("the ") {
        s = rest.trim_start().to_string();
    }

    collapse_whitespace(&s.to_lowercase())
}
