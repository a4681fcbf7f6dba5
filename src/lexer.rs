use chumsky::prelude::*;
use std::rc::Rc;

use crate::diagnostic::{Diagnostic, LineIndex, Reporter};
use crate::token::{Token, TokenKind};

/// Lexer output before line numbers are attached. Problems are tokens too so
/// that one bad character never stops the scan.
#[derive(Debug, Clone, PartialEq)]
pub enum RawToken {
    Token(TokenKind),
    Unexpected(char),
    UnterminatedString,
}

pub fn lexer<'a>()
-> impl Parser<'a, &'a str, Vec<(RawToken, SimpleSpan)>, extra::Err<Simple<'a, char>>> {
    let number = text::digits(10)
        .then(just('.').then(text::digits(10)).or_not())
        .to_slice()
        .map(|s: &str| RawToken::Token(TokenKind::Number(s.parse().unwrap_or_default())));

    let string = just('"')
        .ignore_then(none_of("\"").repeated().to_slice())
        .then_ignore(just('"'))
        .map(|s: &str| RawToken::Token(TokenKind::String(Rc::from(s))));

    // Only reached when the closing quote is missing; swallows the rest of the input.
    let unterminated = just('"')
        .then(any().repeated())
        .to(RawToken::UnterminatedString);

    let ident = any()
        .filter(|c: &char| c.is_ascii_alphabetic() || *c == '_')
        .then(
            any()
                .filter(|c: &char| c.is_ascii_alphanumeric() || *c == '_')
                .repeated(),
        )
        .to_slice()
        .map(|s: &str| RawToken::Token(TokenKind::keyword(s).unwrap_or(TokenKind::Identifier)));

    let op_double = choice((
        just("!=").to(TokenKind::BangEqual),
        just("==").to(TokenKind::EqualEqual),
        just("<=").to(TokenKind::LessEqual),
        just(">=").to(TokenKind::GreaterEqual),
    ));

    let op_single = choice((
        just('(').to(TokenKind::LeftParen),
        just(')').to(TokenKind::RightParen),
        just('{').to(TokenKind::LeftBrace),
        just('}').to(TokenKind::RightBrace),
        just(',').to(TokenKind::Comma),
        just('.').to(TokenKind::Dot),
        just('-').to(TokenKind::Minus),
        just('+').to(TokenKind::Plus),
        just(';').to(TokenKind::Semicolon),
        just('/').to(TokenKind::Slash),
        just('*').to(TokenKind::Star),
        just('!').to(TokenKind::Bang),
        just('=').to(TokenKind::Equal),
        just('<').to(TokenKind::Less),
        just('>').to(TokenKind::Greater),
    ));

    let op = op_double.or(op_single).map(RawToken::Token);

    let unexpected = any().map(RawToken::Unexpected);

    let token = choice((number, string, unterminated, ident, op, unexpected));

    // Only ASCII blanks separate tokens; other whitespace is an unexpected character.
    let whitespace = one_of(" \r\t\n").repeated();

    let comment = just("//")
        .then(any().and_is(just('\n').not()).repeated())
        .padded_by(whitespace.clone());

    let trivia = comment.repeated().padded_by(whitespace);

    trivia
        .clone()
        .ignore_then(
            token
                .map_with(|tok, e| (tok, e.span()))
                .then_ignore(trivia)
                .repeated()
                .collect(),
        )
        .then_ignore(end())
}

/// Scan `source` into tokens terminated by `Eof`, reporting lexical errors to
/// `reporter` as they are found.
pub fn scan_tokens(source: &str, reporter: &mut Reporter) -> Vec<Token> {
    let lines = LineIndex::new(source);
    let (output, errors) = lexer().parse(source).into_output_errors();

    for error in errors {
        reporter.report(Diagnostic::lexical(
            lines.line_of(error.span().start),
            "Unexpected character.",
        ));
    }

    let mut tokens = Vec::new();
    for (raw, span) in output.unwrap_or_default() {
        let lexeme = &source[span.start..span.end];
        match raw {
            RawToken::Token(kind) => {
                // Multi-line strings report the line they end on.
                let line = lines.line_of(span.end.saturating_sub(1).max(span.start));
                tokens.push(Token::new(kind, lexeme, line));
            }
            RawToken::Unexpected(_) => {
                reporter.report(Diagnostic::lexical(
                    lines.line_of(span.start),
                    "Unexpected character.",
                ));
            }
            RawToken::UnterminatedString => {
                reporter.report(Diagnostic::lexical(
                    lines.line_of(span.start),
                    "Unterminated string.",
                ));
            }
        }
    }

    tokens.push(Token::eof(lines.last_line()));
    tracing::debug!(count = tokens.len(), "scanned tokens");
    tokens
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lex(source: &str) -> Vec<TokenKind> {
        let mut reporter = Reporter::new();
        let tokens = scan_tokens(source, &mut reporter);
        assert!(!reporter.had_error(), "unexpected lexical errors: {:?}", reporter.diagnostics());
        tokens.into_iter().map(|token| token.kind).collect()
    }

    fn lex_errors(source: &str) -> (Vec<TokenKind>, Vec<String>) {
        let mut reporter = Reporter::new();
        let tokens = scan_tokens(source, &mut reporter);
        let messages = reporter.diagnostics().iter().map(|d| d.to_string()).collect();
        (tokens.into_iter().map(|token| token.kind).collect(), messages)
    }

    #[test]
    fn test_keywords() {
        assert_eq!(lex("var"), vec![TokenKind::Var, TokenKind::Eof]);
        assert_eq!(lex("class"), vec![TokenKind::Class, TokenKind::Eof]);
        assert_eq!(lex("nil"), vec![TokenKind::Nil, TokenKind::Eof]);
        assert_eq!(lex("fun"), vec![TokenKind::Fun, TokenKind::Eof]);
    }

    #[test]
    fn test_identifiers() {
        let mut reporter = Reporter::new();
        let tokens = scan_tokens("foo bar123 _test orchid", &mut reporter);
        let lexemes: Vec<&str> = tokens.iter().map(|t| t.lexeme.as_str()).collect();
        assert_eq!(lexemes, vec!["foo", "bar123", "_test", "orchid", ""]);
        assert!(tokens[..4].iter().all(|t| t.kind == TokenKind::Identifier));
    }

    #[test]
    fn test_numbers() {
        assert_eq!(lex("42"), vec![TokenKind::Number(42.0), TokenKind::Eof]);
        assert_eq!(lex("3.14"), vec![TokenKind::Number(3.14), TokenKind::Eof]);
        assert_eq!(lex("007"), vec![TokenKind::Number(7.0), TokenKind::Eof]);
    }

    #[test]
    fn test_no_leading_or_trailing_dot() {
        assert_eq!(
            lex(".5"),
            vec![TokenKind::Dot, TokenKind::Number(5.0), TokenKind::Eof]
        );
        assert_eq!(
            lex("5."),
            vec![TokenKind::Number(5.0), TokenKind::Dot, TokenKind::Eof]
        );
    }

    #[test]
    fn test_strings_are_raw() {
        assert_eq!(
            lex(r#""hello\n""#),
            vec![TokenKind::String(Rc::from("hello\\n")), TokenKind::Eof]
        );
        assert_eq!(lex(r#""""#), vec![TokenKind::String(Rc::from("")), TokenKind::Eof]);
    }

    #[test]
    fn test_two_char_operators() {
        assert_eq!(
            lex("!= == <= >= ! = < >"),
            vec![
                TokenKind::BangEqual,
                TokenKind::EqualEqual,
                TokenKind::LessEqual,
                TokenKind::GreaterEqual,
                TokenKind::Bang,
                TokenKind::Equal,
                TokenKind::Less,
                TokenKind::Greater,
                TokenKind::Eof
            ]
        );
    }

    #[test]
    fn test_comments_are_skipped() {
        assert_eq!(
            lex("// leading\nprint 1; // trailing\n// only comment"),
            vec![
                TokenKind::Print,
                TokenKind::Number(1.0),
                TokenKind::Semicolon,
                TokenKind::Eof
            ]
        );
        assert_eq!(lex("a / b"), vec![
            TokenKind::Identifier,
            TokenKind::Slash,
            TokenKind::Identifier,
            TokenKind::Eof
        ]);
    }

    #[test]
    fn test_line_tracking() {
        let mut reporter = Reporter::new();
        let tokens = scan_tokens("var a;\n\"one\ntwo\"\nb", &mut reporter);
        let lines: Vec<usize> = tokens.iter().map(|t| t.line).collect();
        assert_eq!(lines, vec![1, 1, 1, 3, 4, 4]);
    }

    #[test]
    fn test_unexpected_characters_keep_scanning() {
        let (kinds, messages) = lex_errors("1 @ 2\n#");
        assert_eq!(
            kinds,
            vec![TokenKind::Number(1.0), TokenKind::Number(2.0), TokenKind::Eof]
        );
        assert_eq!(
            messages,
            vec![
                "[line 1] Error: Unexpected character.".to_string(),
                "[line 2] Error: Unexpected character.".to_string()
            ]
        );
    }

    #[test]
    fn test_only_ascii_blanks_are_whitespace() {
        assert_eq!(
            lex(" \t\r\n1"),
            vec![TokenKind::Number(1.0), TokenKind::Eof]
        );
        let (kinds, messages) = lex_errors("\u{a0}print 1;\u{3000}");
        assert_eq!(
            kinds,
            vec![TokenKind::Print, TokenKind::Number(1.0), TokenKind::Semicolon, TokenKind::Eof]
        );
        assert_eq!(
            messages,
            vec![
                "[line 1] Error: Unexpected character.".to_string(),
                "[line 1] Error: Unexpected character.".to_string()
            ]
        );
    }

    #[test]
    fn test_unterminated_string_reports_start_line() {
        let (kinds, messages) = lex_errors("print 1;\n\"abc\ndef");
        assert_eq!(
            kinds,
            vec![
                TokenKind::Print,
                TokenKind::Number(1.0),
                TokenKind::Semicolon,
                TokenKind::Eof
            ]
        );
        assert_eq!(messages, vec!["[line 2] Error: Unterminated string.".to_string()]);
    }

    #[test]
    fn test_empty_source() {
        assert_eq!(lex(""), vec![TokenKind::Eof]);
        assert_eq!(lex("  \n\t "), vec![TokenKind::Eof]);
    }
}
