use chrono::{DateTime, Utc};
use regex::Regex;
use std::sync::OnceLock;

/// Header fields of a message, enough to list and search a mailbox
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MailSummary {
    /// `From` header, unfolded
    pub from: Option<String>,

    /// `Subject` header, unfolded
    pub subject: Option<String>,

    /// `Date` header parsed as RFC 2822, if it parses
    pub date: Option<DateTime<Utc>>,

    /// Whether the message is multipart/mixed or declares an attachment part
    pub has_attachments: bool,
}

fn attachment_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"(?im)^content-disposition:[ \t]*attachment").expect("static attachment pattern")
    })
}

impl MailSummary {
    /// Parses the header block of a raw message
    ///
    /// Headers end at the first empty line. Continuation lines (leading space or tab)
    /// are joined to the previous header. Header names match case-insensitively and
    /// the first occurrence wins.
    pub fn parse(message: &str) -> Self {
        let mut summary = Self::default();
        let mut content_type: Option<String> = None;

        for (name, value) in headers(message) {
            match name.to_ascii_lowercase().as_str() {
                "from" if summary.from.is_none() => summary.from = Some(value),
                "subject" if summary.subject.is_none() => summary.subject = Some(value),
                "date" if summary.date.is_none() => summary.date = parse_date(&value),
                "content-type" if content_type.is_none() => content_type = Some(value),
                _ => {}
            }
        }

        summary.has_attachments = content_type
            .map(|ct| ct.to_ascii_lowercase().starts_with("multipart/mixed"))
            .unwrap_or(false)
            || attachment_pattern().is_match(message);

        summary
    }

    /// A message is recognizable when it carries a `From` or a `Subject`
    pub fn is_recognizable(&self) -> bool {
        self.from.is_some() || self.subject.is_some()
    }
}

fn headers(message: &str) -> Vec<(String, String)> {
    let mut headers: Vec<(String, String)> = Vec::new();

    for line in message.lines() {
        if line.is_empty() {
            break;
        }
        if line.starts_with([' ', '\t']) {
            if let Some((_, value)) = headers.last_mut() {
                value.push(' ');
                value.push_str(line.trim());
            }
            continue;
        }
        if let Some((name, value)) = line.split_once(':') {
            let name = name.trim();
            if !name.is_empty() && !name.contains(' ') {
                headers.push((name.to_string(), value.trim().to_string()));
            }
        }
    }

    headers
}

fn parse_date(value: &str) -> Option<DateTime<Utc>> {
    // Trailing comments such as "(UTC)" are common and not part of the grammar chrono accepts
    let value = match value.rfind('(') {
        Some(idx) if value.trim_end().ends_with(')') => value[..idx].trim_end(),
        _ => value,
    };

    DateTime::parse_from_rfc2822(value)
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}
