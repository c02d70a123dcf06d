//! Human name parsing
//!
//! Accepts `Last, First Middle` (member listings) and `First Middle Last`
//! (direct order names), with generational suffixes and quoted nicknames.

/// Components of a person's name
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PersonName {
    /// Given name
    pub first: String,
    /// Middle names or initials
    pub middle: Option<String>,
    /// Family name
    pub last: String,
    /// Generational suffix as written, e.g. `Jr.`
    pub suffix: Option<String>,
    /// Quoted nickname, e.g. `Chuck`
    pub nickname: Option<String>,
}

impl PersonName {
    /// `First Middle Last Suffix`
    pub fn display(&self) -> String {
        [
            Some(self.first.as_str()),
            self.middle.as_deref(),
            Some(self.last.as_str()),
            self.suffix.as_deref(),
        ]
        .into_iter()
        .flatten()
        .filter(|part| !part.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
    }
}

const SUFFIXES: [&str; 7] = ["jr", "sr", "ii", "iii", "iv", "v", "vi"];

fn is_suffix(token: &str) -> bool {
    let key = token.trim_matches(|c: char| c == '.' || c == ',').to_lowercase();
    SUFFIXES.contains(&key.as_str())
}

fn clean_suffix(token: &str) -> String {
    token.trim_end_matches(',').to_string()
}

/// Remove a `"quoted"` nickname, returning the rest and the nickname
fn take_nickname(input: &str) -> (String, Option<String>) {
    let quotes: [(char, char); 2] = [('"', '"'), ('\u{201c}', '\u{201d}')];
    for (open, close) in quotes {
        if let Some(start) = input.find(open) {
            let after = start + open.len_utf8();
            if let Some(len) = input[after..].find(close) {
                let nickname = input[after..after + len].trim().to_string();
                let rest = format!("{} {}", &input[..start], &input[after + len + close.len_utf8()..]);
                let nickname = (!nickname.is_empty()).then_some(nickname);
                return (rest, nickname);
            }
        }
    }
    (input.to_string(), None)
}

fn split_given(tokens: &[&str]) -> (String, Option<String>) {
    match tokens.split_first() {
        Some((first, rest)) if !rest.is_empty() => (first.to_string(), Some(rest.join(" "))),
        Some((first, _)) => (first.to_string(), None),
        None => (String::new(), None),
    }
}

/// Parse a display name into its components; never fails
pub fn parse_name(input: &str) -> PersonName {
    let (rest, nickname) = take_nickname(input.trim());

    if let Some((last_part, given_part)) = rest.split_once(',') {
        // Last, First Middle[, Suffix]
        let mut suffix = None;
        let mut last_tokens: Vec<&str> = last_part.split_whitespace().collect();
        if last_tokens.len() > 1 && last_tokens.last().is_some_and(|t| is_suffix(t)) {
            suffix = last_tokens.pop().map(clean_suffix);
        }

        let mut given_tokens = Vec::new();
        for token in given_part.split([',', ' ']).filter(|t| !t.is_empty()) {
            if is_suffix(token) && suffix.is_none() && !given_tokens.is_empty() {
                suffix = Some(clean_suffix(token));
            } else {
                given_tokens.push(token);
            }
        }

        let (first, middle) = split_given(&given_tokens);
        return PersonName {
            first,
            middle,
            last: last_tokens.join(" "),
            suffix,
            nickname,
        };
    }

    // First Middle Last [Suffix]
    let mut tokens: Vec<&str> = rest.split_whitespace().collect();
    let mut suffix = None;
    if tokens.len() > 2 && tokens.last().is_some_and(|t| is_suffix(t)) {
        suffix = tokens.pop().map(clean_suffix);
    }

    let last = match tokens.pop() {
        Some(last) => last.to_string(),
        None => {
            return PersonName {
                nickname,
                ..PersonName::default()
            }
        }
    };
    let (first, middle) = split_given(&tokens);

    PersonName {
        first,
        middle,
        last,
        suffix,
        nickname,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn name(first: &str, middle: Option<&str>, last: &str, suffix: Option<&str>) -> PersonName {
        PersonName {
            first: first.to_string(),
            middle: middle.map(String::from),
            last: last.to_string(),
            suffix: suffix.map(String::from),
            nickname: None,
        }
    }

    #[test]
    fn test_last_comma_first() {
        assert_eq!(parse_name("Pelosi, Nancy"), name("Nancy", None, "Pelosi", None));
        assert_eq!(
            parse_name("Ocasio-Cortez, Alexandria M."),
            name("Alexandria", Some("M."), "Ocasio-Cortez", None)
        );
        assert_eq!(
            parse_name("Van Hollen, Chris"),
            name("Chris", None, "Van Hollen", None)
        );
    }

    #[test]
    fn test_first_middle_last() {
        assert_eq!(
            parse_name("Alexandria Ocasio-Cortez"),
            name("Alexandria", None, "Ocasio-Cortez", None)
        );
        assert_eq!(
            parse_name("John Paul Smith"),
            name("John", Some("Paul"), "Smith", None)
        );
    }

    #[test]
    fn test_suffixes() {
        assert_eq!(
            parse_name("Cruz, Rafael Edward, Jr."),
            name("Rafael", Some("Edward"), "Cruz", Some("Jr."))
        );
        assert_eq!(
            parse_name("Smith Jr., John"),
            name("John", None, "Smith", Some("Jr."))
        );
        assert_eq!(
            parse_name("Thomas R. Carper III"),
            name("Thomas", Some("R."), "Carper", Some("III"))
        );
    }

    #[test]
    fn test_quoted_nickname() {
        let parsed = parse_name("Schumer, Charles \"Chuck\" E.");
        assert_eq!(parsed.first, "Charles");
        assert_eq!(parsed.middle.as_deref(), Some("E."));
        assert_eq!(parsed.last, "Schumer");
        assert_eq!(parsed.nickname.as_deref(), Some("Chuck"));
    }

    #[test]
    fn test_degenerate_inputs() {
        assert_eq!(parse_name(""), PersonName::default());
        assert_eq!(parse_name("   "), PersonName::default());
        assert_eq!(parse_name("Cher"), name("", None, "Cher", None));
        assert_eq!(parse_name("Smith,"), name("", None, "Smith", None));
    }

    #[test]
    fn test_display() {
        assert_eq!(
            parse_name("Cruz, Rafael Edward, Jr.").display(),
            "Rafael Edward Cruz Jr."
        );
        assert_eq!(parse_name("Cher").display(), "Cher");
    }
}
