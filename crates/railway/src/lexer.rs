//! Tokenisation of Railway source text
//!
//! The stream is line-oriented: `NEWLINE` tokens are significant (one per
//! logical line, consecutive blank lines collapsed), a trailing `\`
//! continues a logical line, and `$ … $` comments are skipped wholesale.

use crate::error::ParseError;

/// Token categories.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenKind {
    /// Identifier or keyword (a leading `.` marks a mono identifier)
    Name,
    /// Numeric literal: `\d+(/\d+)?`, the fraction slash included
    Number,
    /// String literal, quotes stripped
    Str,
    /// Punctuator or operator
    Sym,
    /// Logical line terminator
    Newline,
}

/// One token with its source position.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token {
    /// The category
    pub kind: TokenKind,
    /// The token text (for strings, the content without quotes)
    pub text: String,
    /// 1-based source line
    pub line: usize,
    /// 0-based source column
    pub col: usize,
}

impl Token {
    fn new(kind: TokenKind, text: impl Into<String>, line: usize, col: usize) -> Self {
        Token {
            kind,
            text: text.into(),
            line,
            col,
        }
    }

    /// Whether this token is the symbol or keyword `text`.
    pub fn is(&self, text: &str) -> bool {
        self.text == text && self.kind != TokenKind::Str
    }
}

/// Operator and punctuator spellings, longest first so that maximal munch
/// resolves `<=>` before `<=` before `<`.
const SYMBOLS: &[&str] = &[
    "<=>", "**=", "//=", "+=", "-=", "*=", "/=", "%=", "^=", "|=", "&=", "=>", "<=", ">=", "!=",
    "==", "//", "**", "(", ")", "[", "]", "{", "}", ",", "#", "!", "<", ">", "=", "+", "-", "*",
    "/", "%", "^", "|", "&",
];

fn is_name_start(b: u8) -> bool {
    b.is_ascii_alphabetic() || b == b'_'
}

fn is_name_char(b: u8) -> bool {
    b.is_ascii_alphanumeric() || b == b'_'
}

/// Tokenise a complete source file.
///
/// # Example
///
/// ```
/// use railway::lexer::{tokenise, TokenKind};
///
/// let tokens = tokenise("let x = 1/3 $ exact $\n").unwrap();
/// let texts: Vec<&str> = tokens.iter().map(|t| t.text.as_str()).collect();
/// assert_eq!(texts, ["let", "x", "=", "1/3", "\n"]);
/// assert_eq!(tokens[3].kind, TokenKind::Number);
/// ```
pub fn tokenise(src: &str) -> Result<Vec<Token>, ParseError> {
    let bytes = src.as_bytes();
    let mut tokens = Vec::new();
    let mut pos = 0;
    let mut line = 1;
    let mut col = 0;
    // Suppress NEWLINE tokens for leading and consecutive blank lines.
    let mut skip_newline = true;

    'outer: while pos < bytes.len() {
        let b = bytes[pos];

        if b == b'\n' {
            if !skip_newline {
                tokens.push(Token::new(TokenKind::Newline, "\n", line, col));
            }
            skip_newline = true;
            line += 1;
            col = 0;
            pos += 1;
            continue;
        }

        if b == b' ' || b == b'\t' || b == b'\r' {
            pos += 1;
            col += 1;
            continue;
        }

        // $ … $ comments, possibly spanning lines
        if b == b'$' {
            let start_line = line;
            let start_col = col;
            let mut end = pos + 1;
            while end < bytes.len() && bytes[end] != b'$' {
                if bytes[end] == b'\n' {
                    line += 1;
                    col = 0;
                }
                end += 1;
            }
            if end >= bytes.len() {
                return Err(ParseError::Lexing {
                    line: start_line,
                    col: start_col,
                });
            }
            pos = end + 1;
            col += 1;
            continue;
        }

        // Escaped newline continues the logical line
        if b == b'\\' {
            let mut end = pos + 1;
            while end < bytes.len() && matches!(bytes[end], b' ' | b'\t' | b'\r') {
                end += 1;
            }
            if end < bytes.len() && bytes[end] == b'\n' {
                line += 1;
                col = 0;
                pos = end + 1;
                continue;
            }
            return Err(ParseError::Lexing { line, col });
        }

        // String literals, single- or double-quoted, no escapes
        if b == b'"' || b == b'\'' {
            let quote = b;
            let mut end = pos + 1;
            while end < bytes.len() && bytes[end] != quote && bytes[end] != b'\n' {
                end += 1;
            }
            if end >= bytes.len() || bytes[end] != quote {
                return Err(ParseError::Lexing { line, col });
            }
            let text = &src[pos + 1..end];
            tokens.push(Token::new(TokenKind::Str, text, line, col));
            skip_newline = false;
            col += end + 1 - pos;
            pos = end + 1;
            continue;
        }

        // Operators and punctuators, maximal munch
        for sym in SYMBOLS {
            if src[pos..].starts_with(sym) {
                tokens.push(Token::new(TokenKind::Sym, *sym, line, col));
                skip_newline = false;
                col += sym.len();
                pos += sym.len();
                continue 'outer;
            }
        }

        // Numbers: digits with an optional /digits fraction part
        if b.is_ascii_digit() {
            let mut end = pos + 1;
            while end < bytes.len() && bytes[end].is_ascii_digit() {
                end += 1;
            }
            if end + 1 < bytes.len() && bytes[end] == b'/' && bytes[end + 1].is_ascii_digit() {
                end += 2;
                while end < bytes.len() && bytes[end].is_ascii_digit() {
                    end += 1;
                }
            }
            tokens.push(Token::new(TokenKind::Number, &src[pos..end], line, col));
            skip_newline = false;
            col += end - pos;
            pos = end;
            continue;
        }

        // Names, with an optional leading `.` for mono identifiers
        if is_name_start(b) || (b == b'.' && pos + 1 < bytes.len() && is_name_start(bytes[pos + 1]))
        {
            let mut end = pos + 1;
            while end < bytes.len() && is_name_char(bytes[end]) {
                end += 1;
            }
            tokens.push(Token::new(TokenKind::Name, &src[pos..end], line, col));
            skip_newline = false;
            col += end - pos;
            pos = end;
            continue;
        }

        return Err(ParseError::Lexing { line, col });
    }

    if !skip_newline {
        tokens.push(Token::new(TokenKind::Newline, "\n", line, col));
    }
    Ok(tokens)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn texts(src: &str) -> Vec<String> {
        tokenise(src)
            .unwrap()
            .into_iter()
            .map(|t| t.text)
            .collect()
    }

    #[test]
    fn maximal_munch_on_operators() {
        assert_eq!(texts("a <=> b"), ["a", "<=>", "b", "\n"]);
        assert_eq!(texts("a <= b"), ["a", "<=", "b", "\n"]);
        assert_eq!(texts("x **= 2"), ["x", "**=", "2", "\n"]);
        assert_eq!(texts("x ** 2"), ["x", "**", "2", "\n"]);
        assert_eq!(texts("x //= 2"), ["x", "//=", "2", "\n"]);
    }

    #[test]
    fn fraction_literals_are_one_token() {
        let tokens = tokenise("10/8").unwrap();
        assert_eq!(tokens[0].kind, TokenKind::Number);
        assert_eq!(tokens[0].text, "10/8");
        // but a spaced slash is division
        assert_eq!(texts("10 / 8"), ["10", "/", "8", "\n"]);
    }

    #[test]
    fn mono_names_keep_their_dot() {
        let tokens = tokenise(".best = 1").unwrap();
        assert_eq!(tokens[0].kind, TokenKind::Name);
        assert_eq!(tokens[0].text, ".best");
    }

    #[test]
    fn comments_and_continuations() {
        assert_eq!(texts("let x $ comment $ = 1"), ["let", "x", "=", "1", "\n"]);
        assert_eq!(texts("let x = \\\n    1"), ["let", "x", "=", "1", "\n"]);
        // a comment spanning lines does not terminate the logical line
        let tokens = tokenise("let x = $ multi\nline $ 1\n").unwrap();
        let kinds: Vec<TokenKind> = tokens.iter().map(|t| t.kind).collect();
        assert_eq!(
            kinds,
            [
                TokenKind::Name,
                TokenKind::Name,
                TokenKind::Sym,
                TokenKind::Number,
                TokenKind::Newline
            ]
        );
        assert_eq!(tokens.last().unwrap().line, 2);
    }

    #[test]
    fn blank_lines_collapse() {
        assert_eq!(texts("\n\na\n\n\nb\n"), ["a", "\n", "b", "\n"]);
    }

    #[test]
    fn strings_for_barrier_and_mutex_names() {
        let tokens = tokenise("barrier \"sync point\"").unwrap();
        assert_eq!(tokens[1].kind, TokenKind::Str);
        assert_eq!(tokens[1].text, "sync point");
        let tokens = tokenise("mutex 'm'").unwrap();
        assert_eq!(tokens[1].text, "m");
    }

    #[test]
    fn unterminated_comment_is_a_lex_error() {
        assert!(matches!(
            tokenise("let x = 1 $ oops"),
            Err(ParseError::Lexing { .. })
        ));
    }

    #[test]
    fn positions_are_tracked() {
        let tokens = tokenise("let x\nx += 1\n").unwrap();
        let plus = tokens.iter().find(|t| t.is("+=")).unwrap();
        assert_eq!(plus.line, 2);
        assert_eq!(plus.col, 2);
    }
}
