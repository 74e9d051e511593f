//! PII redaction (spec §4.2). An optional export-time pass, never applied at
//! ingestion: emails, phone numbers and SSN-like sequences are replaced with
//! stable, per-export-counted tokens.

use once_cell::sync::Lazy;
use regex::Regex;

static EMAIL_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"[A-Za-z0-9._%+-]+@[A-Za-z0-9.-]+\.[A-Za-z]{2,}").unwrap()
});

static SSN_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\b\d{3}-\d{2}-\d{4}\b").unwrap());

static PHONE_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?:\+1[-.\s]?)?\(?\d{3}\)?[-.\s]\d{3}[-.\s]\d{4}\b").unwrap()
});

/// Per-export counters so repeated redaction of the same text within one run
/// produces stable, distinguishable tokens (`[REDACTED_EMAIL_1]`, `_2`, ...).
#[derive(Debug, Default)]
pub struct Redactor {
    email_count: usize,
}

impl Redactor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Redact emails (counted), phone numbers and SSNs (uncounted, per spec's
    /// fixed `[REDACTED_PHONE]` / `[REDACTED_SSN]` tokens) in `text`.
    pub fn redact(&mut self, text: &str) -> String {
        // SSNs first: a phone-shaped 3-3-4 run would otherwise also match the
        // looser phone pattern.
        let text = SSN_RE.replace_all(text, "[REDACTED_SSN]");
        let text = PHONE_RE.replace_all(&text, "[REDACTED_PHONE]");

        let mut out = String::with_capacity(text.len());
        let mut last = 0;
        for m in EMAIL_RE.find_iter(&text) {
            out.push_str(&text[last..m.start()]);
            self.email_count += 1;
            out.push_str(&format!("[REDACTED_EMAIL_{}]", self.email_count));
            last = m.end();
        }
        out.push_str(&text[last..]);
        out
    }
}
