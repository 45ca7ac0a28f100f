//! Recursive-descent parser for the restricted POSIX-ERE surface with the
//! meta-language's fixed escape grammar:
//! `\d \D \w \W \s \S \n \t \r \\ \. \* \+ \? \( \) \[ \] \{ \} \| \^ \$`.
use super::ast::{CharClass, RegexAst};

struct Parser<'a> {
    bytes: &'a [u8],
    pos: usize,
}

pub fn parse(source: &str) -> Result<RegexAst, String> {
    let mut parser = Parser {
        bytes: source.as_bytes(),
        pos: 0,
    };
    let ast = parser.parse_alt()?;
    if parser.pos != parser.bytes.len() {
        return Err(format!("unexpected trailing input at byte {}", parser.pos));
    }
    Ok(ast)
}

impl<'a> Parser<'a> {
    fn peek(&self) -> Option<u8> {
        self.bytes.get(self.pos).copied()
    }

    fn bump(&mut self) -> Option<u8> {
        let byte = self.peek();
        if byte.is_some() {
            self.pos += 1;
        }
        byte
    }

    fn parse_alt(&mut self) -> Result<RegexAst, String> {
        let mut branches = vec![self.parse_concat()?];
        while self.peek() == Some(b'|') {
            self.bump();
            branches.push(self.parse_concat()?);
        }
        Ok(if branches.len() == 1 {
            branches.pop().unwrap()
        } else {
            RegexAst::Alt(branches)
        })
    }

    fn parse_concat(&mut self) -> Result<RegexAst, String> {
        let mut items = Vec::new();
        while let Some(byte) = self.peek() {
            if byte == b'|' || byte == b')' {
                break;
            }
            items.push(self.parse_quantified()?);
        }
        Ok(match items.len() {
            0 => RegexAst::Concat(Vec::new()),
            1 => items.pop().unwrap(),
            _ => RegexAst::Concat(items),
        })
    }

    fn parse_quantified(&mut self) -> Result<RegexAst, String> {
        let atom = self.parse_atom()?;
        match self.peek() {
            Some(b'*') => {
                self.bump();
                Ok(RegexAst::star(atom))
            }
            Some(b'+') => {
                self.bump();
                Ok(RegexAst::plus(atom))
            }
            Some(b'?') => {
                self.bump();
                Ok(RegexAst::opt(atom))
            }
            Some(b'{') => self.parse_bounded(atom),
            _ => Ok(atom),
        }
    }

    fn parse_bounded(&mut self, atom: RegexAst) -> Result<RegexAst, String> {
        self.bump(); // '{'
        let min = self.parse_number()?;
        let (min, max) = if self.peek() == Some(b',') {
            self.bump();
            if self.peek() == Some(b'}') {
                (min, None)
            } else {
                let max = self.parse_number()?;
                (min, Some(max))
            }
        } else {
            (min, Some(min))
        };
        if self.bump() != Some(b'}') {
            return Err("expected `}` to close a bounded quantifier".to_string());
        }
        if let Some(max) = max {
            if max < min {
                return Err("bounded quantifier has max below min".to_string());
            }
        }
        Ok(RegexAst::Repeat {
            inner: Box::new(atom),
            min,
            max,
        })
    }

    fn parse_number(&mut self) -> Result<u32, String> {
        let start = self.pos;
        while matches!(self.peek(), Some(b) if b.is_ascii_digit()) {
            self.bump();
        }
        if self.pos == start {
            return Err("expected a number in a bounded quantifier".to_string());
        }
        std::str::from_utf8(&self.bytes[start..self.pos])
            .unwrap()
            .parse::<u32>()
            .map_err(|e| e.to_string())
    }

    fn parse_atom(&mut self) -> Result<RegexAst, String> {
        match self.bump() {
            Some(b'(') => {
                let inner = self.parse_alt()?;
                if self.bump() != Some(b')') {
                    return Err("unbalanced group: expected `)`".to_string());
                }
                Ok(inner)
            }
            Some(b'.') => Ok(RegexAst::Any),
            Some(b'[') => self.parse_class(),
            Some(b'\\') => self.parse_escape().map(RegexAst::Char).or_else(|name| {
                class_escape(&name).map(RegexAst::Class)
            }),
            Some(byte) => Ok(RegexAst::Char(byte)),
            None => Err("unexpected end of pattern".to_string()),
        }
    }

    fn parse_escape(&mut self) -> Result<u8, String> {
        match self.bump() {
            Some(b'n') => Ok(b'\n'),
            Some(b't') => Ok(b'\t'),
            Some(b'r') => Ok(b'\r'),
            Some(b @ (b'\\' | b'.' | b'*' | b'+' | b'?' | b'(' | b')' | b'[' | b']' | b'{'
            | b'}' | b'|' | b'^' | b'$' | b'/')) => Ok(b),
            Some(other) => Err(std::str::from_utf8(&[other]).unwrap_or("?").to_string()),
            None => Err("dangling `\\` at end of pattern".to_string()),
        }
    }

    fn parse_class(&mut self) -> Result<RegexAst, String> {
        let negated = self.peek() == Some(b'^');
        if negated {
            self.bump();
        }
        let mut ranges = Vec::new();
        if self.peek() == Some(b']') {
            ranges.push((b']', b']'));
            self.bump();
        }
        while let Some(byte) = self.peek() {
            if byte == b']' {
                break;
            }
            let lo = self.parse_class_byte()?;
            if self.peek() == Some(b'-') && self.bytes.get(self.pos + 1) != Some(&b']') {
                self.bump();
                let hi = self.parse_class_byte()?;
                ranges.push((lo, hi));
            } else {
                ranges.push((lo, lo));
            }
        }
        if self.bump() != Some(b']') {
            return Err("unbalanced character class: expected `]`".to_string());
        }
        Ok(RegexAst::Class(CharClass { ranges, negated }))
    }

    fn parse_class_byte(&mut self) -> Result<u8, String> {
        match self.bump() {
            Some(b'\\') => self.parse_escape(),
            Some(byte) => Ok(byte),
            None => Err("unexpected end of character class".to_string()),
        }
    }
}

/// `\d \D \w \W \s \S` expand to multi-range character classes rather than a
/// single byte.
fn class_escape(name: &str) -> Result<CharClass, String> {
    match name {
        "d" => Ok(CharClass {
            ranges: vec![(b'0', b'9')],
            negated: false,
        }),
        "D" => Ok(CharClass {
            ranges: vec![(b'0', b'9')],
            negated: true,
        }),
        "w" => Ok(CharClass {
            ranges: vec![(b'a', b'z'), (b'A', b'Z'), (b'0', b'9'), (b'_', b'_')],
            negated: false,
        }),
        "W" => Ok(CharClass {
            ranges: vec![(b'a', b'z'), (b'A', b'Z'), (b'0', b'9'), (b'_', b'_')],
            negated: true,
        }),
        "s" => Ok(CharClass {
            ranges: vec![(b' ', b' '), (b'\t', b'\t'), (b'\n', b'\n'), (b'\r', b'\r')],
            negated: false,
        }),
        "S" => Ok(CharClass {
            ranges: vec![(b' ', b' '), (b'\t', b'\t'), (b'\n', b'\n'), (b'\r', b'\r')],
            negated: true,
        }),
        other => Err(format!("unsupported escape `\\{}`", other)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_literal_concat() {
        let ast = parse("ab").unwrap();
        assert_eq!(
            ast,
            RegexAst::Concat(vec![RegexAst::Char(b'a'), RegexAst::Char(b'b')])
        );
    }

    #[test]
    fn parses_bounded_quantifier() {
        let ast = parse("a{2,4}").unwrap();
        assert_eq!(
            ast,
            RegexAst::Repeat {
                inner: Box::new(RegexAst::Char(b'a')),
                min: 2,
                max: Some(4),
            }
        );
    }

    #[test]
    fn parses_character_class() {
        let ast = parse("[A-Za-z_]+").unwrap();
        match ast {
            RegexAst::Repeat { inner, min: 1, max: None } => match *inner {
                RegexAst::Class(class) => {
                    assert!(class.matches(b'Q'));
                    assert!(class.matches(b'_'));
                    assert!(!class.matches(b'5'));
                }
                _ => panic!("expected a character class"),
            },
            _ => panic!("expected a `+` repetition"),
        }
    }
}
