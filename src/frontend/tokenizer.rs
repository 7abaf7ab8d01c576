use crate::error::Result;
use crate::frontend::parse_error;

#[derive(Debug, Clone, PartialEq)]
pub enum Token {
    Number(f64),
    Identifier(String),
    Plus,
    Minus,
    Multiply,
    Divide,
    Less,
    Greater,
    Equal,
    Comma,
    LeftParen,
    RightParen,
    Semicolon,
}

/// A token and the byte offset it starts at.
#[derive(Debug, Clone, PartialEq)]
pub struct Lexeme {
    pub token: Token,
    pub position: usize,
}

pub struct Tokenizer;

impl Tokenizer {
    pub fn tokenize(input: &str) -> Result<Vec<Lexeme>> {
        if input.trim().is_empty() {
            return Err(parse_error("empty program", 0));
        }

        let mut position = 0;
        let mut lexemes = Vec::new();

        while position < input.len() {
            position = Self::next_token(input, position, &mut lexemes)?;
        }

        Self::validate_parentheses(&lexemes)?;

        Ok(lexemes)
    }

    // Extract the next token starting at position, returning where the
    // following one starts
    fn next_token(input: &str, position: usize, lexemes: &mut Vec<Lexeme>) -> Result<usize> {
        let rest = &input[position..];
        let Some(next_char) = rest.chars().next() else {
            return Ok(position);
        };

        if next_char.is_whitespace() {
            return Ok(position + next_char.len_utf8());
        }

        if next_char.is_ascii_alphabetic() || next_char == '_' {
            let len = rest
                .find(|c: char| !(c.is_ascii_alphanumeric() || c == '_'))
                .unwrap_or(rest.len());
            lexemes.push(Lexeme {
                token: Token::Identifier(rest[..len].to_string()),
                position,
            });
            return Ok(position + len);
        }

        if next_char.is_ascii_digit() || next_char == '.' {
            let len = rest
                .find(|c: char| !(c.is_ascii_digit() || c == '.'))
                .unwrap_or(rest.len());
            let text = &rest[..len];
            let value = text
                .parse::<f64>()
                .map_err(|_| parse_error(format!("invalid number '{text}'"), position))?;
            lexemes.push(Lexeme {
                token: Token::Number(value),
                position,
            });
            return Ok(position + len);
        }

        let token = match next_char {
            '+' => Token::Plus,
            '-' => Token::Minus,
            '*' => Token::Multiply,
            '/' => Token::Divide,
            '<' => Token::Less,
            '>' => Token::Greater,
            '=' => Token::Equal,
            ',' => Token::Comma,
            '(' => Token::LeftParen,
            ')' => Token::RightParen,
            ';' => Token::Semicolon,
            _ => {
                return Err(parse_error(
                    format!("invalid character '{next_char}'"),
                    position,
                ));
            }
        };
        lexemes.push(Lexeme { token, position });
        Ok(position + 1)
    }

    fn validate_parentheses(lexemes: &[Lexeme]) -> Result<()> {
        let mut open = Vec::new();
        for lexeme in lexemes {
            match lexeme.token {
                Token::LeftParen => open.push(lexeme.position),
                Token::RightParen => {
                    if open.pop().is_none() {
                        return Err(parse_error("unbalanced parentheses", lexeme.position));
                    }
                }
                _ => {}
            }
        }
        match open.last() {
            Some(position) => Err(parse_error("unbalanced parentheses", *position)),
            None => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;

    fn tokens(input: &str) -> Vec<Token> {
        Tokenizer::tokenize(input)
            .unwrap()
            .into_iter()
            .map(|lexeme| lexeme.token)
            .collect()
    }

    #[test]
    fn test_tokenize_simple() {
        assert_eq!(tokens("123"), vec![Token::Number(123.0)]);
        assert_eq!(tokens("0.25"), vec![Token::Number(0.25)]);
    }

    #[test]
    fn test_tokenize_division() {
        assert_eq!(
            tokens("x / 4.0"),
            vec![
                Token::Identifier("x".to_string()),
                Token::Divide,
                Token::Number(4.0)
            ]
        );
    }

    #[test]
    fn test_tokenize_statements() {
        assert_eq!(
            tokens("y=a_1<2;y"),
            vec![
                Token::Identifier("y".to_string()),
                Token::Equal,
                Token::Identifier("a_1".to_string()),
                Token::Less,
                Token::Number(2.0),
                Token::Semicolon,
                Token::Identifier("y".to_string()),
            ]
        );
    }

    #[test]
    fn test_tokenize_call() {
        assert_eq!(
            tokens("cast(x, fp16)"),
            vec![
                Token::Identifier("cast".to_string()),
                Token::LeftParen,
                Token::Identifier("x".to_string()),
                Token::Comma,
                Token::Identifier("fp16".to_string()),
                Token::RightParen,
            ]
        );
    }

    #[test]
    fn test_tokenize_positions() {
        let lexemes = Tokenizer::tokenize("  x +\n 1").unwrap();
        let positions: Vec<usize> = lexemes.iter().map(|l| l.position).collect();
        assert_eq!(positions, vec![2, 4, 7]);
    }

    #[test]
    fn test_tokenize_invalid_character() {
        let err = Tokenizer::tokenize("x $ 1").unwrap_err();
        assert!(matches!(err, Error::Parse { position: 2, .. }));
    }

    #[test]
    fn test_tokenize_invalid_number() {
        assert!(Tokenizer::tokenize("1.2.3").is_err());
    }

    #[test]
    fn test_tokenize_unbalanced_parentheses() {
        assert!(Tokenizer::tokenize("(123 + 456").is_err());
        assert!(Tokenizer::tokenize("123 + 456)").is_err());
    }

    #[test]
    fn test_tokenize_empty() {
        assert!(Tokenizer::tokenize("   ").is_err());
    }
}
