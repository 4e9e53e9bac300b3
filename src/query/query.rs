//! Compiled queries
//!
//! A query pairs a key prefix and an optional condition tree with paging
//! hints and the permission level it was granted. Builders may be chained
//! freely; `check()` validates the tree once and freezes the query for
//! matching.

use std::fmt;

use super::condition::Condition;
use super::errors::QueryResult;
use super::parser::escape_token;
use crate::record::{Permission, Record};

/// Key prefix, condition and permission threshold
#[derive(Debug, Clone, PartialEq)]
pub struct Query {
    checked: bool,
    key_prefix: String,
    condition: Option<Condition>,
    order_by: String,
    limit: usize,
    offset: usize,
    access_permission: Permission,
}

impl Query {
    /// Create a query over all keys starting with `prefix`.
    ///
    /// The access permission defaults to `SELF_` (first-party access).
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            checked: false,
            key_prefix: prefix.into(),
            condition: None,
            order_by: String::new(),
            limit: 0,
            offset: 0,
            access_permission: Permission::SELF_,
        }
    }

    // ==================
    // Builders
    // ==================

    /// Set the condition tree
    pub fn with_condition(mut self, condition: Condition) -> Self {
        self.condition = Some(condition);
        self.checked = false;
        self
    }

    /// Maximum number of records to return; 0 means unlimited
    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = limit;
        self
    }

    /// Number of matching records to skip
    pub fn with_offset(mut self, offset: usize) -> Self {
        self.offset = offset;
        self
    }

    /// Field to order by. Ordering is left to the backend.
    pub fn with_order_by(mut self, field: impl Into<String>) -> Self {
        self.order_by = field.into();
        self
    }

    /// Grant a permission level; negative levels are ignored
    pub fn with_access_permission(mut self, permission: Permission) -> Self {
        if permission.level() >= 0 {
            self.access_permission = permission;
        }
        self
    }

    // ==================
    // Validation
    // ==================

    /// Validate the condition tree. Repeated calls are no-ops.
    pub fn check(&mut self) -> QueryResult<()> {
        if self.checked {
            return Ok(());
        }
        if let Some(condition) = &self.condition {
            condition.check()?;
        }
        self.checked = true;
        Ok(())
    }

    /// Consume and return the checked query
    pub fn checked(mut self) -> QueryResult<Self> {
        self.check()?;
        Ok(self)
    }

    /// Check the query and panic if it is invalid.
    ///
    /// Meant for queries built from constants at startup.
    pub fn must_be_valid(self) -> Self {
        match self.checked() {
            Ok(q) => q,
            Err(e) => panic!("invalid query: {}", e),
        }
    }

    pub fn is_checked(&self) -> bool {
        self.checked
    }

    // ==================
    // Accessors
    // ==================

    pub fn key_prefix(&self) -> &str {
        &self.key_prefix
    }

    pub fn condition(&self) -> Option<&Condition> {
        self.condition.as_ref()
    }

    pub fn order_by(&self) -> &str {
        &self.order_by
    }

    pub fn limit(&self) -> usize {
        self.limit
    }

    pub fn offset(&self) -> usize {
        self.offset
    }

    pub fn access_permission(&self) -> Permission {
        self.access_permission
    }

    // ==================
    // Matching
    // ==================

    /// Whether the key falls under the prefix
    pub fn matches_key(&self, key: &str) -> bool {
        key.starts_with(&self.key_prefix)
    }

    /// Whether the granted level meets the level the record requires
    pub fn matches_permission(&self, required: Permission) -> bool {
        self.access_permission.satisfies(required)
    }

    /// Whether the record payload satisfies the condition tree.
    ///
    /// Records without an accessor only match condition-less queries. An
    /// unchecked query with an invalid tree matches nothing.
    pub fn matches_record(&self, record: &dyn Record) -> bool {
        let Some(condition) = &self.condition else {
            return true;
        };
        if !self.checked && condition.check().is_err() {
            return false;
        }
        match record.accessor() {
            Some(acc) => condition.complies(acc.as_ref()),
            None => false,
        }
    }

    /// Full predicate: key, permission and condition
    pub fn matches(&self, record: &dyn Record) -> bool {
        self.matches_key(record.key())
            && self.matches_permission(record.permission())
            && self.matches_record(record)
    }

    /// Canonical text form, parseable by `parse_query`
    pub fn print(&self) -> String {
        let mut out = format!("query {}", escape_token(&self.key_prefix));
        if let Some(condition) = &self.condition {
            let text = condition.to_text();
            // the where clause is one group already; empty groups keep their parens
            let text = match condition {
                Condition::And(c) | Condition::Or(c) if !c.is_empty() => text
                    .strip_prefix('(')
                    .and_then(|t| t.strip_suffix(')'))
                    .unwrap_or(text.as_str())
                    .to_string(),
                _ => text,
            };
            out.push_str(" where ");
            out.push_str(&text);
        }
        if !self.order_by.is_empty() {
            out.push_str(" orderby ");
            out.push_str(&escape_token(&self.order_by));
        }
        if self.limit > 0 {
            out.push_str(&format!(" limit {}", self.limit));
        }
        if self.offset > 0 {
            out.push_str(&format!(" offset {}", self.offset));
        }
        out
    }
}

impl fmt::Display for Query {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.print())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query::Operator;
    use crate::record::{DeletedRecord, MemRecord};
    use serde_json::json;

    fn record(key: &str, permission: Permission) -> MemRecord {
        MemRecord::new(key, permission).with_object(json!({"S": "banana", "I": 42}))
    }

    #[test]
    fn test_defaults() {
        let q = Query::new("path/to/");
        assert_eq!(q.key_prefix(), "path/to/");
        assert_eq!(q.access_permission(), Permission::SELF_);
        assert_eq!(q.limit(), 0);
        assert_eq!(q.offset(), 0);
        assert!(q.condition().is_none());
        assert!(!q.is_checked());
    }

    #[test]
    fn test_negative_permission_ignored() {
        let q = Query::new("a").with_access_permission(Permission::new(-1));
        assert_eq!(q.access_permission(), Permission::SELF_);

        let q = Query::new("a").with_access_permission(Permission::USER);
        assert_eq!(q.access_permission(), Permission::USER);
    }

    #[test]
    fn test_check_is_idempotent() {
        let mut q = Query::new("a").with_condition(Condition::exists("S"));
        q.check().unwrap();
        assert!(q.is_checked());
        q.check().unwrap();
        assert!(q.is_checked());
    }

    #[test]
    fn test_invalid_condition_fails_check() {
        let q = Query::new("a").with_condition(Condition::and(vec![
            Condition::exists("S"),
            Condition::field("I", Operator::Equals, "many"),
        ]));
        assert!(q.clone().checked().is_err());
        // fails closed when used unchecked
        assert!(!q.matches(&record("a/1", Permission::ANYONE)));
    }

    #[test]
    #[should_panic(expected = "invalid query")]
    fn test_must_be_valid_panics() {
        Query::new("a")
            .with_condition(Condition::field("I", Operator::Is, "maybe"))
            .must_be_valid();
    }

    #[test]
    fn test_matches_combines_all_predicates() {
        let q = Query::new("path/to/")
            .with_condition(Condition::field("I", Operator::GreaterThan, 40))
            .with_access_permission(Permission::USER)
            .must_be_valid();

        assert!(q.matches(&record("path/to/A", Permission::ANYONE)));
        assert!(q.matches(&record("path/to/A", Permission::USER)));
        assert!(!q.matches(&record("path/to/A", Permission::ADMIN)));
        assert!(!q.matches(&record("path/from/A", Permission::ANYONE)));

        let small = MemRecord::new("path/to/B", Permission::ANYONE).with_object(json!({"I": 1}));
        assert!(!q.matches(&small));
    }

    #[test]
    fn test_records_without_accessor() {
        let tombstone = DeletedRecord::of(&record("path/to/A", Permission::ANYONE));
        let plain = Query::new("path/").must_be_valid();
        let filtered = Query::new("path/")
            .with_condition(Condition::exists("S"))
            .must_be_valid();

        assert!(plain.matches(&tombstone));
        assert!(!filtered.matches(&tombstone));
    }

    #[test]
    fn test_print() {
        let q = Query::new("test:")
            .with_condition(Condition::and(vec![
                Condition::field("a", Operator::SameAs, "two words"),
                Condition::not(Condition::exists("b")),
            ]))
            .with_order_by("a")
            .with_limit(5);
        assert_eq!(
            q.print(),
            "query test: where a sameas \"two words\" and b not exists orderby a limit 5"
        );
        assert_eq!(q.to_string(), q.print());

        let q = Query::new("test:").with_condition(Condition::not(Condition::or(vec![
            Condition::exists("a"),
            Condition::exists("b"),
        ])));
        assert_eq!(q.print(), "query test: where not (a exists or b exists)");
    }
}
