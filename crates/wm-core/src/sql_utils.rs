//! SQL text helpers for building tracking-table statements and scanning
//! migration bodies.

use sqlparser::dialect::PostgreSqlDialect;
use sqlparser::tokenizer::{Token, Tokenizer};

/// Quote a SQL identifier.
///
/// Wraps the identifier in double quotes and doubles any embedded double
/// quote, following the SQL standard.
///
/// # Examples
/// ```
/// use wm_core::sql_utils::quote_ident;
/// assert_eq!(quote_ident("schema_migrations"), r#""schema_migrations""#);
/// assert_eq!(quote_ident(r#"odd"name"#), r#""odd""name""#);
/// ```
pub fn quote_ident(ident: &str) -> String {
    format!("\"{}\"", ident.replace('"', "\"\""))
}

/// Quote a potentially schema-qualified name (e.g. `ops.schema_migrations`).
///
/// # Examples
/// ```
/// use wm_core::sql_utils::quote_qualified;
/// assert_eq!(quote_qualified("schema_migrations"), r#""schema_migrations""#);
/// assert_eq!(quote_qualified("ops.schema_migrations"), r#""ops"."schema_migrations""#);
/// ```
pub fn quote_qualified(name: &str) -> String {
    name.split('.')
        .map(quote_ident)
        .collect::<Vec<_>>()
        .join(".")
}

/// Split a potentially schema-qualified table name into (schema, table).
///
/// Unqualified names land in DuckDB's `main` schema.
pub fn split_qualified_name(name: &str) -> (&str, &str) {
    if let Some(pos) = name.rfind('.') {
        (&name[..pos], &name[pos + 1..])
    } else {
        ("main", name)
    }
}

/// Render a single-quoted SQL string literal.
///
/// # Examples
/// ```
/// use wm_core::sql_utils::quote_literal;
/// assert_eq!(quote_literal("001"), "'001'");
/// assert_eq!(quote_literal("it's"), "'it''s'");
/// ```
pub fn quote_literal(value: &str) -> String {
    format!("'{}'", value.replace('\'', "''"))
}

/// Whether `name` is a plain identifier, optionally schema-qualified once.
///
/// Used to validate the configured tracking table before it is spliced into
/// DDL.
pub fn is_simple_qualified_name(name: &str) -> bool {
    let parts: Vec<&str> = name.split('.').collect();
    if parts.is_empty() || parts.len() > 2 {
        return false;
    }
    parts.iter().all(|part| {
        let mut chars = part.chars();
        match chars.next() {
            Some(c) if c.is_ascii_alphabetic() || c == '_' => {
                chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
            }
            _ => false,
        }
    })
}

/// Tokenize `sql` and keep only the tokens that carry meaning.
///
/// Whitespace and comments are dropped. The body of a `DO $$ ... $$` block
/// is tokenized in place of its quoted string so statements inside anonymous
/// blocks stay visible; every other literal remains a single token. Returns
/// `None` when the text does not tokenize (an unterminated literal, say).
pub fn significant_tokens(sql: &str) -> Option<Vec<Token>> {
    let dialect = PostgreSqlDialect {};
    let tokens = match Tokenizer::new(&dialect, sql).tokenize() {
        Ok(tokens) => tokens,
        Err(e) => {
            log::debug!("SQL does not tokenize: {}", e);
            return None;
        }
    };

    let mut out = Vec::with_capacity(tokens.len());
    for token in tokens {
        match token {
            Token::Whitespace(_) | Token::EOF => {}
            Token::DollarQuotedString(block) if out.last().is_some_and(|t| is_word(t, "do")) => {
                out.extend(significant_tokens(&block.value)?);
            }
            other => out.push(other),
        }
    }
    Some(out)
}

/// Whether `token` is the unquoted word `word`, ignoring case.
pub fn is_word(token: &Token, word: &str) -> bool {
    matches!(token, Token::Word(w) if w.quote_style.is_none() && w.value.eq_ignore_ascii_case(word))
}

/// Whether the body contains anything besides comments, whitespace and
/// stray semicolons.
///
/// Text that does not tokenize counts as a statement; the database reports
/// the real error when it runs.
pub fn has_statements(sql: &str) -> bool {
    match significant_tokens(sql) {
        Some(tokens) => tokens.iter().any(|t| !matches!(t, Token::SemiColon)),
        None => true,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_quote_ident_with_embedded_quotes() {
        assert_eq!(quote_ident(r#"my"table"#), r#""my""table""#);
    }

    #[test]
    fn test_quote_qualified_two_parts() {
        assert_eq!(
            quote_qualified("ops.schema_migrations"),
            r#""ops"."schema_migrations""#
        );
    }

    #[test]
    fn test_split_qualified_name() {
        assert_eq!(split_qualified_name("bookings"), ("main", "bookings"));
        assert_eq!(split_qualified_name("ops.locks"), ("ops", "locks"));
    }

    #[test]
    fn test_quote_literal_escapes() {
        assert_eq!(quote_literal("O'Brien's"), "'O''Brien''s'");
    }

    #[test]
    fn test_simple_qualified_name() {
        assert!(is_simple_qualified_name("schema_migrations"));
        assert!(is_simple_qualified_name("ops.schema_migrations"));
        assert!(is_simple_qualified_name("_t1"));
        assert!(!is_simple_qualified_name(""));
        assert!(!is_simple_qualified_name("1table"));
        assert!(!is_simple_qualified_name("a.b.c"));
        assert!(!is_simple_qualified_name("drop table x; --"));
    }

    #[test]
    fn test_significant_tokens_drop_comments() {
        let tokens = significant_tokens("-- header\nSELECT 1; /* note */ SELECT 2;").unwrap();
        assert_eq!(tokens.len(), 6);
        assert!(is_word(&tokens[0], "select"));
        assert_eq!(tokens[2], Token::SemiColon);
    }

    #[test]
    fn test_literal_is_one_token() {
        let tokens = significant_tokens("SELECT '--not a comment; create table x' AS x").unwrap();
        assert_eq!(tokens.len(), 4);
        assert!(matches!(tokens[1], Token::SingleQuotedString(_)));
    }

    #[test]
    fn test_do_block_body_is_expanded() {
        let tokens = significant_tokens("DO $$ BEGIN ALTER TABLE t ADD COLUMN c TEXT; END $$;").unwrap();
        assert!(tokens.iter().any(|t| is_word(t, "alter")));
        let plain = significant_tokens("SELECT $$ALTER TABLE t$$").unwrap();
        assert!(!plain.iter().any(|t| is_word(t, "alter")));
    }

    #[test]
    fn test_quoted_identifier_is_not_a_word() {
        let tokens = significant_tokens(r#"SELECT "create""#).unwrap();
        assert!(!is_word(&tokens[1], "create"));
    }

    #[test]
    fn test_has_statements() {
        assert!(!has_statements(""));
        assert!(!has_statements("-- only a comment\n  ;\n"));
        assert!(!has_statements("/* block */"));
        assert!(has_statements("-- c\nALTER TABLE bookings ADD COLUMN x TEXT;"));
        assert!(has_statements("SELECT 'unterminated"));
    }
}
