/// SQL Lexer - converts statement text into tokens

use super::token::{Token, TokenType};
use crate::error::{GatewayError, Result};

pub struct Lexer {
    input: Vec<char>,
    position: usize,
    line: usize,
    column: usize,
}

impl Lexer {
    pub fn new(input: &str) -> Self {
        Self {
            input: input.chars().collect(),
            position: 0,
            line: 1,
            column: 1,
        }
    }

    pub fn tokenize(&mut self) -> Result<Vec<Token>> {
        let mut tokens = Vec::new();

        loop {
            let token = self.next_token()?;
            let is_eof = matches!(token.token_type, TokenType::Eof);
            tokens.push(token);
            if is_eof {
                break;
            }
        }

        Ok(tokens)
    }

    pub fn next_token(&mut self) -> Result<Token> {
        self.skip_whitespace();

        let line = self.line;
        let column = self.column;

        if self.is_eof() {
            return Ok(Token::new(TokenType::Eof, line, column));
        }

        let ch = self.current_char();

        if ch == '-' && self.peek_char() == Some('-') {
            self.skip_line_comment();
            return self.next_token();
        }

        if ch == '/' && self.peek_char() == Some('*') {
            self.skip_block_comment()?;
            return self.next_token();
        }

        let token_type = match ch {
            '\'' => self.read_string()?,
            '"' => self.read_quoted_identifier()?,
            '0'..='9' => self.read_number()?,
            'a'..='z' | 'A'..='Z' | '_' => self.read_identifier(),

            '=' => {
                self.advance();
                TokenType::Eq
            }
            '!' => {
                self.advance();
                if self.current_char() == '=' {
                    self.advance();
                    TokenType::Ne
                } else {
                    return Err(GatewayError::ParseError(format!(
                        "Unexpected character '!' at {}:{}", line, column
                    )));
                }
            }
            '<' => {
                self.advance();
                if self.current_char() == '=' {
                    self.advance();
                    TokenType::Le
                } else if self.current_char() == '>' {
                    self.advance();
                    TokenType::Ne
                } else {
                    TokenType::Lt
                }
            }
            '>' => {
                self.advance();
                if self.current_char() == '=' {
                    self.advance();
                    TokenType::Ge
                } else {
                    TokenType::Gt
                }
            }
            '+' => {
                self.advance();
                TokenType::Plus
            }
            '-' => {
                self.advance();
                TokenType::Minus
            }
            '*' => {
                self.advance();
                TokenType::Star
            }
            '/' => {
                self.advance();
                TokenType::Slash
            }
            '(' => {
                self.advance();
                TokenType::LParen
            }
            ')' => {
                self.advance();
                TokenType::RParen
            }
            ',' => {
                self.advance();
                TokenType::Comma
            }
            ';' => {
                self.advance();
                TokenType::Semicolon
            }
            '.' => {
                self.advance();
                TokenType::Dot
            }
            '?' => {
                self.advance();
                TokenType::Placeholder
            }
            _ => {
                return Err(GatewayError::ParseError(format!(
                    "Unexpected character '{}' at {}:{}", ch, line, column
                )));
            }
        };

        Ok(Token::new(token_type, line, column))
    }

    fn current_char(&self) -> char {
        if self.is_eof() {
            '\0'
        } else {
            self.input[self.position]
        }
    }

    fn peek_char(&self) -> Option<char> {
        self.input.get(self.position + 1).copied()
    }

    fn advance(&mut self) {
        if !self.is_eof() {
            if self.input[self.position] == '\n' {
                self.line += 1;
                self.column = 1;
            } else {
                self.column += 1;
            }
            self.position += 1;
        }
    }

    fn is_eof(&self) -> bool {
        self.position >= self.input.len()
    }

    fn skip_whitespace(&mut self) {
        while !self.is_eof() && self.current_char().is_whitespace() {
            self.advance();
        }
    }

    fn skip_line_comment(&mut self) {
        while !self.is_eof() && self.current_char() != '\n' {
            self.advance();
        }
        if !self.is_eof() {
            self.advance();
        }
    }

    fn skip_block_comment(&mut self) -> Result<()> {
        self.advance(); // '/'
        self.advance(); // '*'

        while !self.is_eof() {
            if self.current_char() == '*' && self.peek_char() == Some('/') {
                self.advance();
                self.advance();
                return Ok(());
            }
            self.advance();
        }

        Err(GatewayError::ParseError("Unterminated block comment".to_string()))
    }

    /// Single-quoted literal; `''` and backslash escapes are both accepted.
    fn read_string(&mut self) -> Result<TokenType> {
        self.advance(); // opening quote
        let mut value = String::new();

        loop {
            if self.is_eof() {
                return Err(GatewayError::ParseError("Unterminated string".to_string()));
            }
            match self.current_char() {
                '\'' if self.peek_char() == Some('\'') => {
                    value.push('\'');
                    self.advance();
                    self.advance();
                }
                '\'' => {
                    self.advance();
                    break;
                }
                '\\' => {
                    self.advance();
                    if self.is_eof() {
                        return Err(GatewayError::ParseError("Unterminated string".to_string()));
                    }
                    let escaped = match self.current_char() {
                        'n' => '\n',
                        't' => '\t',
                        'r' => '\r',
                        c => c,
                    };
                    value.push(escaped);
                    self.advance();
                }
                c => {
                    value.push(c);
                    self.advance();
                }
            }
        }

        Ok(TokenType::String(value))
    }

    /// Double-quoted identifier; case is preserved and `""` escapes a quote.
    fn read_quoted_identifier(&mut self) -> Result<TokenType> {
        self.advance();
        let mut value = String::new();

        loop {
            if self.is_eof() {
                return Err(GatewayError::ParseError("Unterminated quoted identifier".to_string()));
            }
            match self.current_char() {
                '"' if self.peek_char() == Some('"') => {
                    value.push('"');
                    self.advance();
                    self.advance();
                }
                '"' => {
                    self.advance();
                    break;
                }
                c => {
                    value.push(c);
                    self.advance();
                }
            }
        }

        if value.is_empty() {
            return Err(GatewayError::ParseError("Empty quoted identifier".to_string()));
        }
        Ok(TokenType::QuotedIdentifier(value))
    }

    fn read_number(&mut self) -> Result<TokenType> {
        let mut value = String::new();
        let mut is_float = false;

        while !self.is_eof() && (self.current_char().is_ascii_digit() || self.current_char() == '.') {
            if self.current_char() == '.' {
                is_float = true;
            }
            value.push(self.current_char());
            self.advance();
        }

        // Scientific notation (e.g., 1.5e10)
        if !self.is_eof() && (self.current_char() == 'e' || self.current_char() == 'E') {
            is_float = true;
            value.push(self.current_char());
            self.advance();
            if !self.is_eof() && (self.current_char() == '+' || self.current_char() == '-') {
                value.push(self.current_char());
                self.advance();
            }
            while !self.is_eof() && self.current_char().is_ascii_digit() {
                value.push(self.current_char());
                self.advance();
            }
        }

        if !is_float {
            if let Ok(i) = value.parse::<i64>() {
                return Ok(TokenType::Integer(i));
            }
        }

        value.parse::<f64>()
            .map(TokenType::Float)
            .map_err(|_| GatewayError::ParseError(format!("Invalid number: {}", value)))
    }

    fn read_identifier(&mut self) -> TokenType {
        let mut value = String::new();

        while !self.is_eof() {
            let ch = self.current_char();
            if ch.is_alphanumeric() || ch == '_' || ch == '$' {
                value.push(ch);
                self.advance();
            } else {
                break;
            }
        }

        TokenType::from_keyword(&value)
            .unwrap_or(TokenType::Identifier(value))
    }
}
