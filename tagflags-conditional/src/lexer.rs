use crate::ConditionalParseError;
use crate::ast::MAX_MINUTES;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Token<'a> {
    Number(u32),
    Word(&'a str),
    /// A time of day in minutes since midnight (`hh:mm`, up to `48:00`).
    Time(u32),
    Colon,
    Comma,
    Semicolon,
    Dash,
    LParen,
    RParen,
    LBracket,
    RBracket,
    Symbol(char),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Spanned<'a> {
    pub token: Token<'a>,
    pub position: usize,
}

pub(crate) fn tokenize(input: &str) -> Result<Vec<Spanned<'_>>, ConditionalParseError> {
    let bytes = input.as_bytes();
    let mut tokens = Vec::new();
    let mut i = 0;

    while i < bytes.len() {
        let c = bytes[i];
        let position = i;
        let token = match c {
            b' ' | b'\t' | b'\n' | b'\r' => {
                i += 1;
                continue;
            }
            b'0'..=b'9' => {
                let end = scan(bytes, i, u8::is_ascii_digit);
                let number = parse_number(&input[i..end], position)?;
                // hh:mm (a colon directly followed by a digit)
                if bytes.get(end) == Some(&b':') && bytes.get(end + 1).is_some_and(u8::is_ascii_digit)
                {
                    let minutes_end = scan(bytes, end + 1, u8::is_ascii_digit);
                    let text = &input[i..minutes_end];
                    let minutes = parse_number(&input[end + 1..minutes_end], position)?;
                    i = minutes_end;
                    Token::Time(time_of_day(number, minutes, text)?)
                } else {
                    i = end;
                    Token::Number(number)
                }
            }
            c if c.is_ascii_alphabetic() => {
                let end = scan(bytes, i, |b| b.is_ascii_alphabetic() || *b == b'_');
                let word = &input[i..end];
                i = end;
                Token::Word(word)
            }
            _ => {
                // Multi-byte characters are passed through whole
                let ch = input[i..].chars().next().unwrap_or_default();
                i += ch.len_utf8();
                match ch {
                    ':' => Token::Colon,
                    ',' => Token::Comma,
                    ';' => Token::Semicolon,
                    '-' => Token::Dash,
                    '(' => Token::LParen,
                    ')' => Token::RParen,
                    '[' => Token::LBracket,
                    ']' => Token::RBracket,
                    other => Token::Symbol(other),
                }
            }
        };
        tokens.push(Spanned { token, position });
    }

    Ok(tokens)
}

fn scan(bytes: &[u8], start: usize, accept: impl Fn(&u8) -> bool) -> usize {
    bytes[start..]
        .iter()
        .position(|b| !accept(b))
        .map_or(bytes.len(), |offset| start + offset)
}

fn parse_number(text: &str, position: usize) -> Result<u32, ConditionalParseError> {
    text.parse()
        .map_err(|_| ConditionalParseError::UnexpectedToken {
            found: text.to_string(),
            position,
        })
}

fn time_of_day(hours: u32, minutes: u32, text: &str) -> Result<u32, ConditionalParseError> {
    let total = hours.saturating_mul(60).saturating_add(minutes);
    if minutes >= 60 || total > MAX_MINUTES {
        return Err(ConditionalParseError::InvalidTime {
            value: text.to_string(),
        });
    }
    Ok(total)
}
