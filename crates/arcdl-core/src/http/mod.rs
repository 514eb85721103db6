//! HTTP access to the archive via the curl crate (libcurl).
//!
//! Every request carries the browser-like User-Agent and the Referer the
//! service's anti-automation checks expect. Both the one-shot GET used for
//! metadata and the streamed body used for files run in the calling thread
//! or a dedicated one; call from `spawn_blocking` if used from async code.

mod body;
mod status;

pub use body::{HttpBody, OpenError};
pub use status::{parse_status_line, StatusLine};

use crate::config::ArchiveEndpoints;
use std::str;

/// Apply the shared request profile: headers, redirects and timeouts.
pub(crate) fn configure(
    easy: &mut curl::easy::Easy,
    url: &str,
    endpoints: &ArchiveEndpoints,
) -> Result<(), curl::Error> {
    easy.url(url)?;
    easy.get(true)?;
    easy.useragent(&endpoints.user_agent)?;
    easy.referer(&endpoints.referer)?;
    easy.follow_location(true)?;
    easy.max_redirections(endpoints.max_redirects)?;
    easy.connect_timeout(endpoints.connect_timeout)?;
    // Abort stalled transfers instead of using a wall-clock timeout, so large files on slow links survive.
    easy.low_speed_limit(endpoints.low_speed_limit)?;
    easy.low_speed_time(endpoints.low_speed_time)?;
    Ok(())
}

/// Response of a buffered GET.
#[derive(Debug, Clone)]
pub struct Response {
    pub status: StatusLine,
    pub body: Vec<u8>,
}

/// Performs a GET and buffers the whole body. Meant for small documents (metadata JSON).
pub fn get(url: &str, endpoints: &ArchiveEndpoints) -> Result<Response, curl::Error> {
    let mut body = Vec::new();
    let mut last_status: Option<StatusLine> = None;

    let mut easy = curl::easy::Easy::new();
    configure(&mut easy, url, endpoints)?;
    {
        let mut transfer = easy.transfer();
        transfer.header_function(|data| {
            if let Some(status) = str::from_utf8(data).ok().and_then(parse_status_line) {
                last_status = Some(status);
            }
            true
        })?;
        transfer.write_function(|data| {
            body.extend_from_slice(data);
            Ok(data.len())
        })?;
        transfer.perform()?;
    }

    let code = easy.response_code()?;
    let status = match last_status {
        Some(s) if s.code == code => s,
        _ => StatusLine {
            code,
            reason: String::new(),
        },
    };
    Ok(Response { status, body })
}
