//! Streaming tokenizer.
//!
//! The lexer reads raw source bytes and produces one token per call with
//! a single token of lookahead. Literal payloads (decoded integers,
//! floats, strings, interned identifier ids) travel inside the token.
//! Physical newlines produce [`Token::Separator`] unless separator
//! suppression is on; the compiler enables it inside bracketed
//! expressions. After the first error, the lexer latches it and every
//! further call returns `Eof`.

use crate::consts::MAX_IDENTIFIER_LENGTH;
use crate::error::{CompileError, ErrorKind};
use crate::symbol::{IdentifierId, SymbolTable};

/// A lexical token, carrying its decoded payload where applicable.
#[derive(Debug, Clone, PartialEq)]
pub enum Token {
    /// End of input.
    Eof,
    /// Statement separator: a physical newline or `;`.
    Separator,

    /// Integer literal.
    Integer(i64),
    /// Float literal.
    Float(f64),
    /// String literal, escapes decoded.
    Str(String),
    /// Identifier starting with a lowercase letter or underscore.
    Identifier(IdentifierId),
    /// Identifier starting with an uppercase letter.
    TypeIdentifier(IdentifierId),

    // Keywords
    And,
    Or,
    In,
    Is,
    If,
    Elif,
    Else,
    For,
    Import,
    Export,
    As,
    Defer,
    Fn,
    Return,
    Raise,
    Break,
    Continue,
    Step,
    Struct,
    True,
    False,

    // Punctuation
    Plus,
    Minus,
    Star,
    DoubleStar,
    Slash,
    DoubleSlash,
    Percent,
    Ampersand,
    VerticalBar,
    Caret,
    Tilde,
    Bang,
    Question,
    QuestionDot,
    Colon,
    Semicolon,
    Assign,
    Declare,
    EqEq,
    NotEq,
    Lt,
    Le,
    Shl,
    Gt,
    Ge,
    Shr,
    Comma,
    Dot,
    DotDot,
    OpenParen,
    CloseParen,
    OpenBrace,
    CloseBrace,
    OpenBracket,
    CloseBracket,
}

/// Streaming lexer over one source buffer.
#[derive(Debug)]
pub struct Lexer<'a> {
    source: &'a [u8],
    pos: usize,
    line: u32,
    ignore_separators: bool,
    peeked: Option<Token>,
    error: Option<CompileError>,
    validated: bool,
}

impl<'a> Lexer<'a> {
    /// Create a lexer, skipping a UTF-8 BOM and a shebang line if present.
    pub fn new(source: &'a [u8]) -> Self {
        let mut lexer = Self {
            source,
            pos: 0,
            line: 1,
            ignore_separators: false,
            peeked: None,
            error: None,
            validated: false,
        };

        if lexer.source.starts_with(&[0xef, 0xbb, 0xbf]) {
            lexer.pos = 3;
        }
        if lexer.source[lexer.pos..].starts_with(b"#!") {
            while let Some(byte) = lexer.current() {
                lexer.pos += 1;
                if byte == b'\n' {
                    lexer.line += 1;
                    break;
                }
            }
        }

        lexer
    }

    /// Current 1-based source line.
    pub const fn line(&self) -> u32 {
        self.line
    }

    /// The latched error, if any.
    pub const fn error(&self) -> Option<CompileError> {
        self.error
    }

    /// Toggle newline-as-separator suppression.
    pub fn set_ignore_separators(&mut self, ignore: bool) {
        self.ignore_separators = ignore;
    }

    /// Produce the next token.
    ///
    /// The first failure is returned and latched; every call after that
    /// yields `Eof`.
    pub fn next_token(&mut self, symbols: &mut SymbolTable) -> Result<Token, CompileError> {
        if self.error.is_some() {
            return Ok(Token::Eof);
        }
        if let Some(token) = self.peeked.take() {
            return Ok(token);
        }

        match self.scan(symbols) {
            Ok(token) => Ok(token),
            Err(kind) => {
                let error = CompileError::new(kind, self.line);
                self.error = Some(error);
                Err(error)
            }
        }
    }

    /// Look at the next token without consuming it.
    pub fn peek_token(&mut self, symbols: &mut SymbolTable) -> Result<Token, CompileError> {
        if self.peeked.is_none() {
            let token = self.next_token(symbols)?;
            self.peeked = Some(token);
        }

        Ok(self.peeked.clone().unwrap_or(Token::Eof))
    }

    fn current(&self) -> Option<u8> {
        self.source.get(self.pos).copied()
    }

    fn lookahead(&self, offset: usize) -> Option<u8> {
        self.source.get(self.pos + offset).copied()
    }

    fn bump(&mut self) -> Option<u8> {
        let byte = self.current();
        if byte.is_some() {
            self.pos += 1;
        }
        byte
    }

    /// Consume the second byte of a two-byte operator when it matches.
    fn eat(&mut self, byte: u8) -> bool {
        if self.current() == Some(byte) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    /// Validate the entire buffer once, lazily, so that every later scan
    /// can treat the bytes as known-good UTF-8. On failure the reported
    /// line is derived from the valid prefix.
    fn validate_utf8(&mut self) -> Result<(), ErrorKind> {
        if self.validated {
            return Ok(());
        }

        if let Err(error) = std::str::from_utf8(self.source) {
            let prefix = &self.source[..error.valid_up_to()];
            self.line += bytecount_newlines(prefix);
            return Err(ErrorKind::InvalidUtf8);
        }

        self.validated = true;
        Ok(())
    }

    fn scan(&mut self, symbols: &mut SymbolTable) -> Result<Token, ErrorKind> {
        self.validate_utf8()?;

        loop {
            let Some(byte) = self.current() else {
                return Ok(Token::Eof);
            };

            match byte {
                b' ' | b'\t' => {
                    self.pos += 1;
                }
                b'\n' | b'\r' => {
                    self.pos += 1;
                    if byte == b'\r' {
                        self.eat(b'\n');
                    }
                    self.line += 1;
                    if !self.ignore_separators {
                        return Ok(Token::Separator);
                    }
                }
                b'#' => {
                    while let Some(byte) = self.current() {
                        if byte == b'\n' || byte == b'\r' {
                            break;
                        }
                        self.pos += 1;
                    }
                }
                _ => break,
            }
        }

        let byte = self.bump().ok_or(ErrorKind::InternalError)?;
        match byte {
            b'+' => Ok(Token::Plus),
            b'-' => Ok(Token::Minus),
            b'*' => Ok(if self.eat(b'*') {
                Token::DoubleStar
            } else {
                Token::Star
            }),
            b'/' => Ok(if self.eat(b'/') {
                Token::DoubleSlash
            } else {
                Token::Slash
            }),
            b'%' => Ok(Token::Percent),
            b'&' => Ok(Token::Ampersand),
            b'|' => Ok(Token::VerticalBar),
            b'^' => Ok(Token::Caret),
            b'~' => Ok(Token::Tilde),
            b'!' => Ok(if self.eat(b'=') {
                Token::NotEq
            } else {
                Token::Bang
            }),
            b'?' => Ok(if self.eat(b'.') {
                Token::QuestionDot
            } else {
                Token::Question
            }),
            b':' => Ok(if self.eat(b'=') {
                Token::Declare
            } else {
                Token::Colon
            }),
            b';' => Ok(Token::Semicolon),
            b'=' => Ok(if self.eat(b'=') {
                Token::EqEq
            } else {
                Token::Assign
            }),
            b'<' => Ok(if self.eat(b'=') {
                Token::Le
            } else if self.eat(b'<') {
                Token::Shl
            } else {
                Token::Lt
            }),
            b'>' => Ok(if self.eat(b'=') {
                Token::Ge
            } else if self.eat(b'>') {
                Token::Shr
            } else {
                Token::Gt
            }),
            b',' => Ok(Token::Comma),
            b'.' => Ok(if self.eat(b'.') {
                Token::DotDot
            } else {
                Token::Dot
            }),
            b'(' => Ok(Token::OpenParen),
            b')' => Ok(Token::CloseParen),
            b'{' => Ok(Token::OpenBrace),
            b'}' => Ok(Token::CloseBrace),
            b'[' => Ok(Token::OpenBracket),
            b']' => Ok(Token::CloseBracket),
            b'"' => self.scan_string(),
            b'0'..=b'9' => self.scan_number(byte),
            b'a'..=b'z' | b'A'..=b'Z' | b'_' => self.scan_identifier(byte, symbols),
            _ => Err(ErrorKind::UnexpectedToken),
        }
    }

    fn scan_string(&mut self) -> Result<Token, ErrorKind> {
        let mut content = String::new();

        loop {
            let Some(byte) = self.bump() else {
                return Err(ErrorKind::UnclosedString);
            };

            match byte {
                b'"' => return Ok(Token::Str(content)),
                b'\n' | b'\r' | 0 => return Err(ErrorKind::UnclosedString),
                b'\\' => {
                    let Some(escape) = self.bump() else {
                        return Err(ErrorKind::IncompleteStirngEscape);
                    };
                    let decoded = match escape {
                        b'\\' => '\\',
                        b'"' => '"',
                        b'\'' => '\'',
                        b'n' => '\n',
                        b'r' => '\r',
                        b't' => '\t',
                        b'0' => '\0',
                        _ => return Err(ErrorKind::UnknownStirngEscape),
                    };
                    content.push(decoded);
                }
                _ if byte < 0x80 => content.push(byte as char),
                _ => {
                    // Re-slice the full multi-byte sequence; the buffer
                    // was validated up front.
                    let start = self.pos - 1;
                    while self.current().is_some_and(|b| b & 0xc0 == 0x80) {
                        self.pos += 1;
                    }
                    let chunk = std::str::from_utf8(&self.source[start..self.pos])
                        .map_err(|_| ErrorKind::InvalidUtf8)?;
                    content.push_str(chunk);
                }
            }
        }
    }

    fn scan_number(&mut self, first: u8) -> Result<Token, ErrorKind> {
        if first == b'0' {
            match self.current() {
                Some(b'b') | Some(b'B') => {
                    self.pos += 1;
                    return self.scan_radix_digits(2, false);
                }
                Some(b'o') | Some(b'O') => {
                    self.pos += 1;
                    return self.scan_radix_digits(8, true);
                }
                Some(b'x') | Some(b'X') => {
                    self.pos += 1;
                    return self.scan_radix_digits(16, true);
                }
                _ => {}
            }
        }

        let mut digits = String::new();
        digits.push(first as char);
        self.collect_decimal_digits(&mut digits)?;

        let mut is_float = false;

        // A dot starts a fraction only when a digit follows; two dots are
        // the range operator and a bare trailing dot is malformed.
        if self.current() == Some(b'.') {
            match self.lookahead(1) {
                Some(b'.') => {}
                Some(b'0'..=b'9') => {
                    self.pos += 1;
                    is_float = true;
                    digits.push('.');
                    self.collect_decimal_digits(&mut digits)?;
                }
                _ => return Err(ErrorKind::InvalidNumberLiteral),
            }
        }

        if matches!(self.current(), Some(b'e') | Some(b'E')) {
            self.pos += 1;
            is_float = true;
            digits.push('e');

            if matches!(self.current(), Some(b'+') | Some(b'-')) {
                digits.push(self.bump().unwrap_or(b'+') as char);
            }

            let before = digits.len();
            self.collect_decimal_digits(&mut digits)?;
            if digits.len() == before {
                return Err(ErrorKind::InvalidNumberLiteral);
            }
        }

        // Reject junk glued to the literal; a second dot is fine only as
        // the start of the range operator.
        match self.current() {
            Some(b'.') if self.lookahead(1) != Some(b'.') => {
                return Err(ErrorKind::InvalidNumberLiteral);
            }
            Some(b) if b.is_ascii_alphanumeric() || b == b'_' => {
                return Err(ErrorKind::InvalidNumberLiteral);
            }
            _ => {}
        }

        if is_float {
            digits
                .parse::<f64>()
                .map(Token::Float)
                .map_err(|_| ErrorKind::InvalidNumberLiteral)
        } else {
            digits
                .parse::<i64>()
                .map(Token::Integer)
                .map_err(|_| ErrorKind::InvalidNumberLiteral)
        }
    }

    /// Digits of a prefixed literal. Underscores are permitted between
    /// digits, and directly after the prefix for octal/hex but not
    /// binary.
    fn scan_radix_digits(&mut self, radix: u32, underscore_after_prefix: bool) -> Result<Token, ErrorKind> {
        let mut digits = String::new();
        let mut last_was_digit = underscore_after_prefix;

        while let Some(byte) = self.current() {
            match byte {
                b'_' => {
                    if !last_was_digit {
                        return Err(ErrorKind::InvalidNumberLiteral);
                    }
                    self.pos += 1;
                    last_was_digit = underscore_after_prefix;
                }
                _ if (byte as char).is_digit(radix) => {
                    digits.push(byte as char);
                    self.pos += 1;
                    last_was_digit = true;
                }
                _ if byte.is_ascii_alphanumeric() => {
                    return Err(ErrorKind::InvalidNumberLiteral);
                }
                _ => break,
            }
        }

        if digits.is_empty() {
            return Err(ErrorKind::InvalidNumberLiteral);
        }

        i64::from_str_radix(&digits, radix)
            .map(Token::Integer)
            .map_err(|_| ErrorKind::InvalidNumberLiteral)
    }

    fn collect_decimal_digits(&mut self, out: &mut String) -> Result<(), ErrorKind> {
        while let Some(byte) = self.current() {
            match byte {
                b'0'..=b'9' => {
                    out.push(byte as char);
                    self.pos += 1;
                }
                b'_' => {
                    // Underscores sit between digits only.
                    if !out.ends_with(|c: char| c.is_ascii_digit())
                        || !matches!(self.lookahead(1), Some(b'0'..=b'9'))
                    {
                        return Err(ErrorKind::InvalidNumberLiteral);
                    }
                    self.pos += 1;
                }
                _ => break,
            }
        }

        Ok(())
    }

    fn scan_identifier(
        &mut self,
        first: u8,
        symbols: &mut SymbolTable,
    ) -> Result<Token, ErrorKind> {
        let start = self.pos - 1;

        while self
            .current()
            .is_some_and(|b| b.is_ascii_alphanumeric() || b == b'_')
        {
            self.pos += 1;
        }

        let text = &self.source[start..self.pos];
        if text.len() > MAX_IDENTIFIER_LENGTH {
            return Err(ErrorKind::IdentifierTooLong);
        }

        let text = std::str::from_utf8(text).map_err(|_| ErrorKind::InvalidUtf8)?;
        if let Some(keyword) = keyword(text) {
            return Ok(keyword);
        }

        let id = symbols.intern(text).ok_or(ErrorKind::InternalError)?;
        if first.is_ascii_uppercase() {
            Ok(Token::TypeIdentifier(id))
        } else {
            Ok(Token::Identifier(id))
        }
    }
}

fn keyword(text: &str) -> Option<Token> {
    let token = match text {
        "and" => Token::And,
        "or" => Token::Or,
        "in" => Token::In,
        "is" => Token::Is,
        "if" => Token::If,
        "elif" => Token::Elif,
        "else" => Token::Else,
        "for" => Token::For,
        "import" => Token::Import,
        "export" => Token::Export,
        "as" => Token::As,
        "defer" => Token::Defer,
        "fn" => Token::Fn,
        "return" => Token::Return,
        "raise" => Token::Raise,
        "break" => Token::Break,
        "continue" => Token::Continue,
        "step" => Token::Step,
        "struct" => Token::Struct,
        "true" => Token::True,
        "false" => Token::False,
        _ => return None,
    };

    Some(token)
}

fn bytecount_newlines(bytes: &[u8]) -> u32 {
    let mut lines = 0;
    let mut i = 0;
    while i < bytes.len() {
        match bytes[i] {
            b'\n' => lines += 1,
            b'\r' => {
                lines += 1;
                if bytes.get(i + 1) == Some(&b'\n') {
                    i += 1;
                }
            }
            _ => {}
        }
        i += 1;
    }

    lines
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lex_all(source: &[u8]) -> (Vec<Token>, Option<CompileError>) {
        let mut symbols = SymbolTable::new();
        let mut lexer = Lexer::new(source);
        let mut tokens = Vec::new();

        loop {
            match lexer.next_token(&mut symbols) {
                Ok(Token::Eof) => break,
                Ok(token) => tokens.push(token),
                Err(_) => break,
            }
        }

        (tokens, lexer.error())
    }

    fn kinds(source: &[u8]) -> Vec<Token> {
        let (tokens, error) = lex_all(source);
        assert!(error.is_none(), "unexpected lex error: {error:?}");
        tokens
    }

    #[test]
    fn single_character_operators() {
        let tokens = kinds(b"+ - * / % & | ^ ~ ! ? : ; = , . ( ) { } [ ] < >");
        assert_eq!(
            tokens,
            vec![
                Token::Plus,
                Token::Minus,
                Token::Star,
                Token::Slash,
                Token::Percent,
                Token::Ampersand,
                Token::VerticalBar,
                Token::Caret,
                Token::Tilde,
                Token::Bang,
                Token::Question,
                Token::Colon,
                Token::Semicolon,
                Token::Assign,
                Token::Comma,
                Token::Dot,
                Token::OpenParen,
                Token::CloseParen,
                Token::OpenBrace,
                Token::CloseBrace,
                Token::OpenBracket,
                Token::CloseBracket,
                Token::Lt,
                Token::Gt,
            ]
        );
    }

    #[test]
    fn multi_character_operators() {
        let tokens = kinds(b"** // == != <= >= ?. >> << := ..");
        assert_eq!(
            tokens,
            vec![
                Token::DoubleStar,
                Token::DoubleSlash,
                Token::EqEq,
                Token::NotEq,
                Token::Le,
                Token::Ge,
                Token::QuestionDot,
                Token::Shr,
                Token::Shl,
                Token::Declare,
                Token::DotDot,
            ]
        );
    }

    #[test]
    fn keywords_and_identifiers() {
        let tokens = kinds(b"and or in is if elif else for defer fn return break continue step true false");
        assert_eq!(
            tokens,
            vec![
                Token::And,
                Token::Or,
                Token::In,
                Token::Is,
                Token::If,
                Token::Elif,
                Token::Else,
                Token::For,
                Token::Defer,
                Token::Fn,
                Token::Return,
                Token::Break,
                Token::Continue,
                Token::Step,
                Token::True,
                Token::False,
            ]
        );

        let tokens = kinds(b"foo Bar _baz");
        assert!(matches!(tokens[0], Token::Identifier(_)));
        assert!(matches!(tokens[1], Token::TypeIdentifier(_)));
        assert!(matches!(tokens[2], Token::Identifier(_)));
    }

    #[test]
    fn newline_produces_separator_unless_suppressed() {
        let tokens = kinds(b"a\nb");
        assert!(matches!(
            tokens.as_slice(),
            [Token::Identifier(_), Token::Separator, Token::Identifier(_)]
        ));

        let mut symbols = SymbolTable::new();
        let mut lexer = Lexer::new(b"a\nb");
        lexer.set_ignore_separators(true);
        assert!(matches!(
            lexer.next_token(&mut symbols).unwrap(),
            Token::Identifier(_)
        ));
        assert!(matches!(
            lexer.next_token(&mut symbols).unwrap(),
            Token::Identifier(_)
        ));
    }

    #[test]
    fn number_literals_decode() {
        assert_eq!(
            kinds(b"0 42 0b101 0o17 0xFF 1_000 0x_FF_FF"),
            vec![
                Token::Integer(0),
                Token::Integer(42),
                Token::Integer(5),
                Token::Integer(15),
                Token::Integer(255),
                Token::Integer(1000),
                Token::Integer(0xffff),
            ]
        );

        assert_eq!(
            kinds(b"3.14 1e10 1.5e-3 2.5e+2 0e0"),
            vec![
                Token::Float(3.14),
                Token::Float(1e10),
                Token::Float(1.5e-3),
                Token::Float(2.5e2),
                Token::Float(0.0),
            ]
        );
    }

    #[test]
    fn integer_range_lexes_as_two_integers() {
        assert_eq!(
            kinds(b"0..10"),
            vec![Token::Integer(0), Token::DotDot, Token::Integer(10)]
        );
        assert_eq!(
            kinds(b"0.1..0.4"),
            vec![Token::Float(0.1), Token::DotDot, Token::Float(0.4)]
        );
    }

    #[test]
    fn malformed_numbers_are_rejected() {
        for source in [
            b"0b2" as &[u8],
            b"0o8",
            b"0xG",
            b"1.",
            b"1e",
            b"1e+",
            b"0b_1",
            b"1._5",
        ] {
            let (_, error) = lex_all(source);
            assert_eq!(
                error.map(|e| e.kind),
                Some(ErrorKind::InvalidNumberLiteral),
                "source {:?}",
                std::str::from_utf8(source).unwrap()
            );
        }
    }

    #[test]
    fn string_literals_decode_escapes() {
        assert_eq!(
            kinds(br#""hello" "a\nb" "q\"q" "\0""#),
            vec![
                Token::Str("hello".into()),
                Token::Str("a\nb".into()),
                Token::Str("q\"q".into()),
                Token::Str("\0".into()),
            ]
        );
    }

    #[test]
    fn string_errors_are_classified() {
        let cases: [(&[u8], ErrorKind); 4] = [
            (b"\"unclosed", ErrorKind::UnclosedString),
            (b"\"bad\nline\"", ErrorKind::UnclosedString),
            (b"\"cut\\", ErrorKind::IncompleteStirngEscape),
            (b"\"what\\z\"", ErrorKind::UnknownStirngEscape),
        ];

        for (source, expected) in cases {
            let (_, error) = lex_all(source);
            assert_eq!(error.map(|e| e.kind), Some(expected));
        }
    }

    #[test]
    fn identifier_length_is_capped() {
        let ok = vec![b'a'; 255];
        assert_eq!(kinds(&ok).len(), 1);

        let too_long = vec![b'a'; 256];
        let (_, error) = lex_all(&too_long);
        assert_eq!(error.map(|e| e.kind), Some(ErrorKind::IdentifierTooLong));
    }

    #[test]
    fn invalid_utf8_is_rejected_everywhere() {
        let (_, error) = lex_all(&[b'a', 0xff, b'b']);
        assert_eq!(error.map(|e| e.kind), Some(ErrorKind::InvalidUtf8));

        let (_, error) = lex_all(&[b'#', b' ', 0xc3, 0x28, b'\n']);
        assert_eq!(error.map(|e| e.kind), Some(ErrorKind::InvalidUtf8));
    }

    #[test]
    fn errors_latch_and_later_calls_return_eof() {
        let mut symbols = SymbolTable::new();
        let mut lexer = Lexer::new(b"\"unclosed");

        assert!(lexer.next_token(&mut symbols).is_err());
        assert_eq!(lexer.next_token(&mut symbols).unwrap(), Token::Eof);
        assert_eq!(lexer.next_token(&mut symbols).unwrap(), Token::Eof);
        assert_eq!(
            lexer.error().map(|e| e.kind),
            Some(ErrorKind::UnclosedString)
        );
    }

    #[test]
    fn comments_are_discarded_and_lines_counted() {
        let tokens = kinds(b"a # trailing comment\nb");
        assert!(matches!(
            tokens.as_slice(),
            [Token::Identifier(_), Token::Separator, Token::Identifier(_)]
        ));

        let mut symbols = SymbolTable::new();
        let mut lexer = Lexer::new(b"# one\n# two\nx");
        loop {
            match lexer.next_token(&mut symbols).unwrap() {
                Token::Identifier(_) => break,
                Token::Eof => panic!("identifier not reached"),
                _ => {}
            }
        }
        assert_eq!(lexer.line(), 3);
    }

    #[test]
    fn shebang_and_bom_are_skipped() {
        let tokens = kinds(b"#!/usr/bin/env rill\nx");
        assert!(matches!(
            tokens.as_slice(),
            [Token::Identifier(_)]
        ));

        let mut source = vec![0xef, 0xbb, 0xbf];
        source.extend_from_slice(b"42");
        assert_eq!(kinds(&source), vec![Token::Integer(42)]);
    }

    #[test]
    fn large_literals_survive() {
        assert_eq!(
            kinds(b"9223372036854775807"),
            vec![Token::Integer(i64::MAX)]
        );
    }
}
