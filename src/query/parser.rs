//! Query text parser
//!
//! Grammar:
//!
//! ```text
//! query <prefix> [where <conditions>] [orderby <field>] [limit <n>] [offset <n>]
//! ```
//!
//! Tokens are split on whitespace and parentheses. A token may be quoted
//! with `"`; inside quotes only `"` and `\` need escaping. Outside quotes
//! `\` escapes the next character. Positions in errors are 1-based byte
//! offsets into the query text.

use super::condition::Condition;
use super::errors::{QueryError, QueryResult};
use super::operator::{Operand, Operator};
use super::query::Query;

/// A token and where it starts
#[derive(Debug, Clone, PartialEq, Eq)]
struct Snippet {
    text: String,
    position: usize,
}

impl Snippet {
    fn new(text: String, position: usize) -> Self {
        Self { text, position }
    }
}

/// Parse a query from its text form; the result is already checked
pub fn parse_query(text: &str) -> QueryResult<Query> {
    let mut parser = Parser {
        snippets: extract_snippets(text)?,
        pos: 0,
        text_len: text.len(),
    };

    let keyword = parser.next()?;
    if keyword.text != "query" {
        return Err(QueryError::MissingQueryKeyword);
    }

    let prefix = parser.next()?;
    let mut query = Query::new(prefix.text);
    let mut seen_where = false;

    while parser.remaining() > 0 {
        let command = parser.next()?;
        let duplicate = || QueryError::DuplicateClause {
            clause: command.text.clone(),
            position: command.position,
        };

        match command.text.as_str() {
            "where" => {
                if seen_where {
                    return Err(duplicate());
                }
                seen_where = true;
                let condition = parser.parse_and_or(true)?;
                // parse_and_or consumes one snippet past its end
                parser.pos -= 1;
                query = query.with_condition(condition);
            }
            "orderby" => {
                if !query.order_by().is_empty() {
                    return Err(duplicate());
                }
                let field = parser.next()?;
                query = query.with_order_by(field.text);
            }
            "limit" => {
                if query.limit() != 0 {
                    return Err(duplicate());
                }
                let n = parser.next_integer()?;
                query = query.with_limit(n);
            }
            "offset" => {
                if query.offset() != 0 {
                    return Err(duplicate());
                }
                let n = parser.next_integer()?;
                query = query.with_offset(n);
            }
            _ => {
                return Err(QueryError::UnknownClause {
                    clause: command.text.clone(),
                    position: command.position,
                })
            }
        }
    }

    query.checked()
}

struct Parser {
    snippets: Vec<Snippet>,
    pos: usize,
    text_len: usize,
}

impl Parser {
    fn next(&mut self) -> QueryResult<Snippet> {
        self.pos += 1;
        self.snippets
            .get(self.pos - 1)
            .cloned()
            .ok_or(QueryError::UnexpectedEnd(self.text_len))
    }

    fn remaining(&self) -> usize {
        self.snippets.len().saturating_sub(self.pos)
    }

    fn next_integer(&mut self) -> QueryResult<usize> {
        let snippet = self.next()?;
        snippet
            .text
            .parse::<u32>()
            .ok()
            .filter(|n| *n <= i32::MAX as u32)
            .map(|n| n as usize)
            .ok_or(QueryError::InvalidInteger {
                text: snippet.text,
                position: snippet.position,
            })
    }

    /// Parse a group of clauses joined by a single kind of connective.
    ///
    /// The root group ends at the end of input or at the next clause
    /// keyword and always consumes one snippet too many. Nested groups end
    /// at their closing `)`.
    fn parse_and_or(&mut self, root: bool) -> QueryResult<Condition> {
        let mut is_or = false;
        let mut kind_set = false;
        let mut wrap_in_not = false;
        let mut expecting_more = true;
        let mut conditions: Vec<Condition> = Vec::new();

        loop {
            if !expecting_more && root && self.remaining() == 0 {
                self.pos += 1;
                return Ok(combine(conditions, is_or));
            }

            let first = self.next()?;

            if !expecting_more && root {
                if let "orderby" | "limit" | "offset" = first.text.as_str() {
                    return Ok(combine(conditions, is_or));
                }
            }

            match first.text.as_str() {
                "(" => {
                    let group = self.parse_and_or(false)?;
                    conditions.push(negate_if(group, &mut wrap_in_not));
                    expecting_more = false;
                }
                ")" => return Ok(combine(conditions, is_or)),
                "and" => {
                    if kind_set && is_or {
                        return Err(QueryError::MixedAndOr(first.position));
                    }
                    is_or = false;
                    kind_set = true;
                    expecting_more = true;
                }
                "or" => {
                    if kind_set && !is_or {
                        return Err(QueryError::MixedAndOr(first.position));
                    }
                    is_or = true;
                    kind_set = true;
                    expecting_more = true;
                }
                "not" => {
                    wrap_in_not = true;
                    expecting_more = true;
                }
                _ => {
                    let condition = self.parse_condition(first)?;
                    conditions.push(negate_if(condition, &mut wrap_in_not));
                    expecting_more = false;
                }
            }
        }
    }

    fn parse_condition(&mut self, key: Snippet) -> QueryResult<Condition> {
        let mut negate = false;

        let mut op_name = self.next()?;
        if op_name.text == "not" {
            negate = true;
            op_name = self.next()?;
        }

        let operator =
            Operator::from_name(&op_name.text).ok_or(QueryError::UnknownOperator(op_name.position))?;

        let condition = if operator == Operator::Exists {
            Condition::field(key.text, operator, Operand::None)
        } else {
            let value = self.next()?;
            Condition::field(key.text, operator, value.text)
        };

        Ok(negate_if(condition, &mut negate))
    }
}

fn negate_if(condition: Condition, flag: &mut bool) -> Condition {
    if std::mem::take(flag) {
        Condition::not(condition)
    } else {
        condition
    }
}

fn combine(mut conditions: Vec<Condition>, is_or: bool) -> Condition {
    if conditions.len() == 1 {
        return conditions.remove(0);
    }
    if is_or {
        Condition::or(conditions)
    } else {
        Condition::and(conditions)
    }
}

fn extract_snippets(text: &str) -> QueryResult<Vec<Snippet>> {
    let mut snippets = Vec::new();
    let mut skip = false;
    let mut start: Option<usize> = None;
    let mut in_quotes = false;

    for (pos, c) in text.char_indices() {
        if skip {
            skip = false;
            continue;
        }
        if c == '\\' {
            skip = true;
        }

        if in_quotes {
            if c == '"' {
                let open = start.take().unwrap_or(pos);
                snippets.push(Snippet::new(unescape(&text[open + 1..pos]), open + 1));
                in_quotes = false;
            }
            continue;
        }

        match c {
            '\t' | '\n' | '\r' | ' ' | '(' | ')' => {
                if let Some(s) = start.take() {
                    snippets.push(Snippet::new(unescape(&text[s..pos]), s + 1));
                }
            }
            _ => {
                if start.is_none() {
                    start = Some(pos);
                }
            }
        }

        match c {
            '(' | ')' => snippets.push(Snippet::new(c.to_string(), pos + 1)),
            '"' => {
                if start.is_some_and(|s| s < pos) {
                    return Err(QueryError::QuoteWithinWord(pos + 1));
                }
                in_quotes = true;
            }
            _ => {}
        }
    }

    match start {
        Some(s) if in_quotes => snippets.push(Snippet::new(unescape(&text[s + 1..]), s + 1)),
        Some(s) => snippets.push(Snippet::new(unescape(&text[s..]), s + 1)),
        None => {}
    }

    Ok(snippets)
}

/// Drop escape characters
fn unescape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut chars = text.chars();
    while let Some(c) = chars.next() {
        if c == '\\' {
            match chars.next() {
                Some(next) => out.push(next),
                None => out.push(c),
            }
        } else {
            out.push(c);
        }
    }
    out
}

/// Quote a token for the text form if it contains special characters
pub(crate) fn escape_token(token: &str) -> String {
    if !token.contains(['(', ')', '"', '\\', '\t', '\r', '\n', ' ']) && !token.is_empty() {
        return token.to_string();
    }
    let mut out = String::with_capacity(token.len() + 2);
    out.push('"');
    for c in token.chars() {
        if c == '"' || c == '\\' {
            out.push('\\');
        }
        out.push(c);
    }
    out.push('"');
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query::Operator::*;

    fn snippets(pairs: &[(&str, usize)]) -> Vec<Snippet> {
        pairs
            .iter()
            .map(|(t, p)| Snippet::new(t.to_string(), *p))
            .collect()
    }

    #[test]
    fn test_extract_snippets() {
        let text = r#"query test: where ( "bananas" > 100 and monkeys.# <= "12")or(coconuts < 10 "and" area > 50) or name sameas Julian or name matches ^King\ "#;
        let expected = snippets(&[
            ("query", 1),
            ("test:", 7),
            ("where", 13),
            ("(", 19),
            ("bananas", 21),
            (">", 31),
            ("100", 33),
            ("and", 37),
            ("monkeys.#", 41),
            ("<=", 51),
            ("12", 54),
            (")", 58),
            ("or", 59),
            ("(", 61),
            ("coconuts", 62),
            ("<", 71),
            ("10", 73),
            ("and", 76),
            ("area", 82),
            (">", 87),
            ("50", 89),
            (")", 91),
            ("or", 93),
            ("name", 96),
            ("sameas", 101),
            ("Julian", 108),
            ("or", 115),
            ("name", 118),
            ("matches", 123),
            ("^King ", 131),
        ]);

        assert_eq!(extract_snippets(text).unwrap(), expected);
    }

    #[test]
    fn test_quote_within_word() {
        assert_eq!(
            extract_snippets(r#"query te"st"#).unwrap_err(),
            QueryError::QuoteWithinWord(9)
        );
    }

    fn assert_parses(text: &str, expected: Query) {
        let expected = expected.checked().unwrap();
        let parsed = parse_query(text).unwrap();
        assert_eq!(parsed.print(), text);
        assert_eq!(parsed, expected);
    }

    #[test]
    fn test_parse_full_query() {
        let text = r#"query test: where (bananas > 100 and monkeys.# <= 12) or not (coconuts < 10 and area not > 50) or name sameas Julian or name matches "^King " orderby name limit 10 offset 20"#;
        let expected = Query::new("test:")
            .with_condition(Condition::or(vec![
                Condition::and(vec![
                    Condition::field("bananas", GreaterThan, 100),
                    Condition::field("monkeys.#", LessThanOrEqual, 12),
                ]),
                Condition::not(Condition::and(vec![
                    Condition::field("coconuts", LessThan, 10),
                    Condition::not(Condition::field("area", GreaterThan, 50)),
                ])),
                Condition::field("name", SameAs, "Julian"),
                Condition::field("name", Matches, "^King "),
            ]))
            .with_order_by("name")
            .with_limit(10)
            .with_offset(20);
        assert_parses(text, expected);
    }

    #[test]
    fn test_parse_clauses() {
        assert_parses("query test: orderby name", Query::new("test:").with_order_by("name"));
        assert_parses("query test: limit 10", Query::new("test:").with_limit(10));
        assert_parses("query test: offset 10", Query::new("test:").with_offset(10));
        assert_parses(
            "query test: where banana not exists",
            Query::new("test:").with_condition(Condition::not(Condition::exists("banana"))),
        );
    }

    #[test]
    fn test_parse_all_operators() {
        let cases: Vec<(&str, Condition)> = vec![
            ("banana == 1", Condition::field("banana", Equals, 1)),
            ("banana > 1", Condition::field("banana", GreaterThan, 1)),
            ("banana >= 1", Condition::field("banana", GreaterThanOrEqual, 1)),
            ("banana < 1", Condition::field("banana", LessThan, 1)),
            ("banana <= 1", Condition::field("banana", LessThanOrEqual, 1)),
            ("banana f== 1.1", Condition::field("banana", FloatEquals, 1.1)),
            ("banana f> 1.1", Condition::field("banana", FloatGreaterThan, 1.1)),
            ("banana f>= 1.1", Condition::field("banana", FloatGreaterThanOrEqual, 1.1)),
            ("banana f< 1.1", Condition::field("banana", FloatLessThan, 1.1)),
            ("banana f<= 1.1", Condition::field("banana", FloatLessThanOrEqual, 1.1)),
            ("banana sameas banana", Condition::field("banana", SameAs, "banana")),
            ("banana contains banana", Condition::field("banana", Contains, "banana")),
            ("banana startswith banana", Condition::field("banana", StartsWith, "banana")),
            ("banana endswith banana", Condition::field("banana", EndsWith, "banana")),
            ("banana in banana,coconut", Condition::field("banana", In, vec!["banana", "coconut"])),
            ("banana matches banana", Condition::field("banana", Matches, "banana")),
            ("banana is true", Condition::field("banana", Is, true)),
            ("banana exists", Condition::exists("banana")),
        ];

        for (clause, condition) in cases {
            let text = format!("query test: where {}", clause);
            assert_parses(&text, Query::new("test:").with_condition(condition));
        }
    }

    #[test]
    fn test_parse_group_at_end() {
        let q = parse_query("query test: where (a exists or b exists)").unwrap();
        assert_eq!(q.print(), "query test: where a exists or b exists");

        let q = parse_query("query test: where not (a exists) limit 3").unwrap();
        assert_eq!(q.limit(), 3);
    }

    #[test]
    fn test_parse_aliases_print_canonical() {
        let q = parse_query("query test: where name s== Julian and name co uli").unwrap();
        assert_eq!(q.print(), "query test: where name sameas Julian and name contains uli");
    }

    fn assert_parse_error(text: &str, expected: &str) {
        let err = parse_query(text).unwrap_err();
        assert_eq!(err.to_string(), expected, "query: {}", text);
    }

    #[test]
    fn test_syntax_errors() {
        assert_parse_error("query", "unexpected end at position 5");
        assert_parse_error("query test: where", "unexpected end at position 17");
        assert_parse_error("query test: where (", "unexpected end at position 19");
        assert_parse_error("query test: where )", "unknown clause \")\" at position 19");
        assert_parse_error("query test: where not", "unexpected end at position 21");
        assert_parse_error("query test: where banana", "unexpected end at position 24");
        assert_parse_error("query test: where banana >", "unexpected end at position 26");
        assert_parse_error("query test: where banana nope", "unknown operator at position 26");
        assert_parse_error("query test: where banana exists or", "unexpected end at position 34");
        assert_parse_error("query test: where banana exists and", "unexpected end at position 35");
        assert_parse_error("query test: where banana exists and (", "unexpected end at position 37");
        assert_parse_error(
            "query test: where banana exists and banana is true or",
            "you may not mix \"and\" and \"or\" (position: 52)",
        );
        assert_parse_error(
            "query test: where banana exists or banana is true and",
            "you may not mix \"and\" and \"or\" (position: 51)",
        );
        assert_parse_error("select test:", "queries must start with \"query\"");
        assert_parse_error("query test: limit 5 limit 6", "duplicate \"limit\" clause found at position 21");
        assert_parse_error("query test: limit x", "could not parse integer (x) at position 19");
        assert_parse_error("query test: offset -1", "could not parse integer (-1) at position 20");
    }

    #[test]
    fn test_value_errors() {
        assert!(parse_query("query test: where banana == banana")
            .unwrap_err()
            .to_string()
            .starts_with("could not parse banana to int64"));
        assert!(parse_query("query test: where banana f== banana")
            .unwrap_err()
            .to_string()
            .starts_with("could not parse banana to float64"));
        assert_parse_error(
            "query test: where banana in banana",
            "could not parse \"banana\" to []string",
        );
        assert!(matches!(
            parse_query("query test: where banana matches [banana").unwrap_err(),
            QueryError::InvalidRegex { .. }
        ));
        assert_parse_error(
            "query test: where banana is great",
            "could not parse \"great\" to bool",
        );
    }

    #[test]
    fn test_escape_token() {
        assert_eq!(escape_token("plain"), "plain");
        assert_eq!(escape_token("two words"), "\"two words\"");
        assert_eq!(escape_token("a\"b"), "\"a\\\"b\"");
        assert_eq!(escape_token("back\\slash"), "\"back\\\\slash\"");
        assert_eq!(escape_token(""), "\"\"");
    }

    #[test]
    fn test_quoted_token_ending_in_escaped_quote() {
        let snippets = extract_snippets(r#"query "a\"""#).unwrap();
        assert_eq!(snippets[1].text, "a\"");
    }

    #[test]
    fn test_escaped_values_roundtrip() {
        let q = Query::new("path/")
            .with_condition(Condition::field("say", SameAs, "he said \"hi\" (twice)"))
            .checked()
            .unwrap();
        let parsed = parse_query(&q.print()).unwrap();
        assert_eq!(parsed, q);
    }
}
