//! HTTP status line parsing.

/// Status code and reason phrase of a response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusLine {
    pub code: u32,
    pub reason: String,
}

impl StatusLine {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.code)
    }
}

impl std::fmt::Display for StatusLine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.reason.is_empty() {
            write!(f, "{}", self.code)
        } else {
            write!(f, "{} {}", self.code, self.reason)
        }
    }
}

/// Parses `HTTP/1.1 404 Not Found` (or `HTTP/2 200`). Returns `None` for
/// ordinary header lines. With redirects curl reports one status line per hop;
/// callers keep the last.
pub fn parse_status_line(line: &str) -> Option<StatusLine> {
    let line = line.trim_end();
    if !line.starts_with("HTTP/") {
        return None;
    }
    let mut parts = line.splitn(3, ' ');
    let _version = parts.next()?;
    let code = parts.next()?.trim().parse::<u32>().ok()?;
    let reason = parts.next().unwrap_or("").trim().to_string();
    Some(StatusLine { code, reason })
}
