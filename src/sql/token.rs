/// Token types for the embedded warehouse lexer
use phf::phf_map;

// Reserved words only; object kinds after USE and type names stay identifiers
static KEYWORDS: phf::Map<&'static str, TokenType> = phf_map! {
    "select" => TokenType::Select,
    "from" => TokenType::From,
    "where" => TokenType::Where,
    "insert" => TokenType::Insert,
    "into" => TokenType::Into,
    "values" => TokenType::Values,
    "update" => TokenType::Update,
    "set" => TokenType::Set,
    "delete" => TokenType::Delete,
    "create" => TokenType::Create,
    "table" => TokenType::Table,
    "describe" => TokenType::Describe,
    "desc" => TokenType::Describe,
    "use" => TokenType::Use,
    "and" => TokenType::And,
    "or" => TokenType::Or,
    "not" => TokenType::Not,
    "is" => TokenType::Is,
    "null" => TokenType::Null,
    "if" => TokenType::If,
    "exists" => TokenType::Exists,
    "true" => TokenType::True,
    "false" => TokenType::False,
};

#[derive(Debug, Clone, PartialEq)]
pub enum TokenType {
    // Keywords
    Select,
    From,
    Where,
    Insert,
    Into,
    Values,
    Update,
    Set,
    Delete,
    Create,
    Table,
    Describe, // DESCRIBE or DESC
    Use,
    And,
    Or,
    Not,
    Is,
    Null,
    If,
    Exists,

    // Operators
    Eq,           // =
    Ne,           // != or <>
    Lt,           // <
    Gt,           // >
    Le,           // <=
    Ge,           // >=
    Plus,         // +
    Minus,        // -
    Star,         // *
    Slash,        // /

    // Delimiters
    LParen,       // (
    RParen,       // )
    Comma,        // ,
    Semicolon,    // ;
    Dot,          // .
    Placeholder,  // ?

    // Literals
    Integer(i64),
    Float(f64),
    String(String),
    Identifier(String),
    QuotedIdentifier(String),
    True,
    False,

    // Special
    Eof,
}

#[derive(Debug, Clone)]
pub struct Token {
    pub token_type: TokenType,
    pub line: usize,
    pub column: usize,
}

impl Token {
    pub fn new(token_type: TokenType, line: usize, column: usize) -> Self {
        Self { token_type, line, column }
    }
}

impl TokenType {
    /// Case-insensitive keyword lookup
    pub fn from_keyword(s: &str) -> Option<Self> {
        let lowercase = s.to_lowercase();
        KEYWORDS.get(lowercase.as_str()).cloned()
    }
}
