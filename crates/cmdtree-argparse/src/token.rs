/// One classified raw argument.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Token<'a> {
    /// `--name` or `--name=value`.
    Long { name: &'a str, value: Option<&'a str> },
    /// `-abc`, without the leading dash. Also covers `-name` single-dash
    /// long spellings and negative numbers; the matcher tells them apart.
    ShortCluster(&'a str),
    Positional(&'a str),
    /// `--`
    Terminator,
}

/// Classify `arg` on its own, outside literal mode.
pub fn classify(arg: &str) -> Token<'_> {
    if arg == "--" {
        return Token::Terminator;
    }
    if let Some(rest) = arg.strip_prefix("--") {
        return match rest.split_once('=') {
            Some((name, value)) => Token::Long {
                name,
                value: Some(value),
            },
            None => Token::Long {
                name: rest,
                value: None,
            },
        };
    }
    match arg.strip_prefix('-') {
        Some(rest) if !rest.is_empty() => Token::ShortCluster(rest),
        _ => Token::Positional(arg),
    }
}

/// Whether `arg` reads as a negative number (`-5`, `-0.25`).
pub(crate) fn is_negative_number(arg: &str) -> bool {
    arg.strip_prefix('-').is_some_and(|rest| {
        rest.starts_with(|c: char| c.is_ascii_digit()) && rest.parse::<f64>().is_ok()
    })
}

/// Lazy, index-addressable token stream over raw arguments.
///
/// After a [`Token::Terminator`] every remaining argument is positional.
/// The matcher may pull raw arguments directly (option values) and
/// [`Tokenizer::seek`] back to any index.
#[derive(Debug, Clone)]
pub struct Tokenizer<'a, S> {
    args: &'a [S],
    pos: usize,
    literal: bool,
}

impl<'a, S: AsRef<str>> Tokenizer<'a, S> {
    pub fn new(args: &'a [S]) -> Self {
        Self {
            args,
            pos: 0,
            literal: false,
        }
    }

    /// Index of the next argument to be read.
    pub fn position(&self) -> usize {
        self.pos
    }

    pub fn is_literal(&self) -> bool {
        self.literal
    }

    /// Restart at `index`. Literal mode is recomputed from the arguments
    /// before it.
    pub fn seek(&mut self, index: usize) {
        let index = index.min(self.args.len());
        self.literal = self.args[..index].iter().any(|a| a.as_ref() == "--");
        self.pos = index;
    }

    pub fn raw_at(&self, index: usize) -> Option<&'a str> {
        self.args.get(index).map(AsRef::as_ref)
    }

    pub fn peek_raw(&self) -> Option<&'a str> {
        self.raw_at(self.pos)
    }

    /// Take the next argument verbatim, without classifying it.
    pub fn next_raw(&mut self) -> Option<&'a str> {
        let raw = self.peek_raw()?;
        self.pos += 1;
        Some(raw)
    }
}

impl<'a, S: AsRef<str>> Iterator for Tokenizer<'a, S> {
    type Item = (usize, Token<'a>);

    fn next(&mut self) -> Option<Self::Item> {
        let index = self.pos;
        let raw = self.next_raw()?;
        if self.literal {
            return Some((index, Token::Positional(raw)));
        }
        let token = classify(raw);
        if token == Token::Terminator {
            self.literal = true;
        }
        Some((index, token))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classifies_each_shape() {
        assert_eq!(classify("--"), Token::Terminator);
        assert_eq!(
            classify("--out=a=b"),
            Token::Long {
                name: "out",
                value: Some("a=b")
            }
        );
        assert_eq!(
            classify("--verbose"),
            Token::Long {
                name: "verbose",
                value: None
            }
        );
        assert_eq!(
            classify("--out="),
            Token::Long {
                name: "out",
                value: Some("")
            }
        );
        assert_eq!(classify("-vf"), Token::ShortCluster("vf"));
        assert_eq!(classify("-"), Token::Positional("-"));
        assert_eq!(classify("file.txt"), Token::Positional("file.txt"));
    }

    #[test]
    fn terminator_switches_to_literal_mode() {
        let args = ["-v", "--", "--build", "--"];
        let tokens: Vec<_> = Tokenizer::new(&args).collect();
        assert_eq!(
            tokens,
            [
                (0, Token::ShortCluster("v")),
                (1, Token::Terminator),
                (2, Token::Positional("--build")),
                (3, Token::Positional("--")),
            ]
        );
    }

    #[test]
    fn seek_restores_literal_mode() {
        let args = vec!["a".to_string(), "--".to_string(), "-x".to_string()];
        let mut tokens = Tokenizer::new(&args);
        tokens.seek(2);
        assert!(tokens.is_literal());
        assert_eq!(tokens.next(), Some((2, Token::Positional("-x"))));
        tokens.seek(0);
        assert!(!tokens.is_literal());
        assert_eq!(tokens.next_raw(), Some("a"));
        assert_eq!(tokens.position(), 1);
    }

    #[test]
    fn negative_numbers() {
        assert!(is_negative_number("-5"));
        assert!(is_negative_number("-0.25"));
        assert!(!is_negative_number("-v"));
        assert!(!is_negative_number("-inf"));
        assert!(!is_negative_number("5"));
    }
}
