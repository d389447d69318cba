/// Identifier normalization
use std::fmt;

/// A normalized SQL identifier (or structural type text).
///
/// Only [`normalize`] constructs one, so anything the statement builder
/// interpolates as text has gone through case folding first.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Ident(String);

impl Ident {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Ident {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Fold a user-supplied name to the warehouse's unquoted-identifier case.
///
/// Permissive: spaces and metacharacters pass through untouched and surface
/// as warehouse execution errors.
pub fn normalize(name: &str) -> Ident {
    Ident(name.to_uppercase())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_uppercases_only() {
        assert_eq!(normalize("orders").as_str(), "ORDERS");
        assert_eq!(normalize("Order Items").as_str(), "ORDER ITEMS");
        assert_eq!(normalize("varchar(255)").as_str(), "VARCHAR(255)");
        assert_eq!(normalize("a;drop").as_str(), "A;DROP");
    }

    #[test]
    fn test_normalize_is_idempotent() {
        let once = normalize("MixedCase_1");
        assert_eq!(normalize(once.as_str()), once);
    }
}
