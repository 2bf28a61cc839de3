//! IMAP `SEARCH` criteria builder
//!
//! Each predicate method appends tokens to an internal list; `build()`
//! joins them with spaces, or renders `"ALL"` if the query is empty. This
//! mirrors the token-accumulation design of the query builder this crate
//! is grounded on, generalized with the fuller predicate set (negations,
//! `header`, `uid`, `or_`/`and_`) the newer reference implementation adds.

use chrono::NaiveDate;

/// A composable IMAP `SEARCH` criteria expression.
#[derive(Debug, Clone, Default)]
pub struct IMAPQuery {
    tokens: Vec<String>,
}

impl IMAPQuery {
    pub fn new() -> Self {
        Self::default()
    }

    /// Render the accumulated tokens, or `"ALL"` if none were added.
    pub fn build(&self) -> String {
        if self.tokens.is_empty() {
            "ALL".to_owned()
        } else {
            self.tokens.join(" ")
        }
    }

    fn push(mut self, token: impl Into<String>) -> Self {
        self.tokens.push(token.into());
        self
    }

    fn push_field(self, field: &str, value: &str) -> Self {
        self.push(field).push(quote(value))
    }

    pub fn from(self, value: &str) -> Self {
        self.push_field("FROM", value)
    }

    pub fn to(self, value: &str) -> Self {
        self.push_field("TO", value)
    }

    pub fn cc(self, value: &str) -> Self {
        self.push_field("CC", value)
    }

    pub fn bcc(self, value: &str) -> Self {
        self.push_field("BCC", value)
    }

    pub fn subject(self, value: &str) -> Self {
        self.push_field("SUBJECT", value)
    }

    pub fn text(self, value: &str) -> Self {
        self.push_field("TEXT", value)
    }

    pub fn body(self, value: &str) -> Self {
        self.push_field("BODY", value)
    }

    /// `HEADER <name> <value>`; an empty `value` matches any header with
    /// `name` present (per RFC 3501 §6.4.4).
    pub fn header(self, name: &str, value: &str) -> Self {
        self.push("HEADER").push(quote(name)).push(quote(value))
    }

    /// `UID <range>`, e.g. `"100:200"` or `"355"`. Used internally by the
    /// progressive search engine to bound each round's window; exposed so
    /// callers can hand-restrict a query too.
    pub fn uid(self, range: &str) -> Self {
        self.push("UID").push(range.to_owned())
    }

    /// `SINCE <date>`, `date` formatted `YYYY-MM-DD`.
    pub fn since(self, iso_date: &str) -> Result<Self, chrono::ParseError> {
        Ok(self.push("SINCE").push(to_imap_date(iso_date)?))
    }

    /// `BEFORE <date>`.
    pub fn before(self, iso_date: &str) -> Result<Self, chrono::ParseError> {
        Ok(self.push("BEFORE").push(to_imap_date(iso_date)?))
    }

    /// `ON <date>`.
    pub fn on(self, iso_date: &str) -> Result<Self, chrono::ParseError> {
        Ok(self.push("ON").push(to_imap_date(iso_date)?))
    }

    pub fn seen(self) -> Self {
        self.push("SEEN")
    }

    pub fn unseen(self) -> Self {
        self.push("UNSEEN")
    }

    pub fn answered(self) -> Self {
        self.push("ANSWERED")
    }

    pub fn unanswered(self) -> Self {
        self.push("UNANSWERED")
    }

    pub fn flagged(self) -> Self {
        self.push("FLAGGED")
    }

    pub fn unflagged(self) -> Self {
        self.push("UNFLAGGED")
    }

    pub fn deleted(self) -> Self {
        self.push("DELETED")
    }

    pub fn undeleted(self) -> Self {
        self.push("UNDELETED")
    }

    pub fn draft(self) -> Self {
        self.push("DRAFT")
    }

    pub fn undraft(self) -> Self {
        self.push("UNDRAFT")
    }

    /// Escape hatch for advanced criteria not covered by a named method.
    pub fn raw(self, tokens: &[&str]) -> Self {
        let mut q = self;
        for t in tokens {
            q = q.push((*t).to_owned());
        }
        q
    }

    /// `OR <a> <b>`. IMAP's `OR` takes exactly two search-key arguments;
    /// each side is rendered as its own parenthesized criteria group so
    /// `or_`/`and_` compose without tokens bleeding into each other.
    pub fn or_(a: &IMAPQuery, b: &IMAPQuery) -> Self {
        let mut q = Self::new().push("OR");
        q.tokens.push(format!("({})", a.build()));
        q.tokens.push(format!("({})", b.build()));
        q
    }

    /// `AND` is implicit concatenation in IMAP `SEARCH`; `and_` exists for
    /// symmetry with `or_` and for combining two already-built queries.
    pub fn and_(a: &IMAPQuery, b: &IMAPQuery) -> Self {
        let mut q = Self::new();
        q.tokens.push(format!("({})", a.build()));
        q.tokens.push(format!("({})", b.build()));
        q
    }
}

/// Escape `\` and `"`, in that order, then wrap in double quotes.
///
/// Escaping backslash first is load-bearing: escaping the quote first
/// would double-escape the backslashes that escaping introduces.
pub fn quote(s: &str) -> String {
    let escaped = s.replace('\\', "\\\\").replace('"', "\\\"");
    format!("\"{escaped}\"")
}

/// `YYYY-MM-DD` -> `DD-Mon-YYYY`, per RFC 3501's `date` production.
pub fn to_imap_date(iso_date: &str) -> Result<String, chrono::ParseError> {
    let date = NaiveDate::parse_from_str(iso_date, "%Y-%m-%d")?;
    Ok(date.format("%d-%b-%Y").to_string())
}
