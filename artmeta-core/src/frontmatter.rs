//! Header extraction.
//!
//! A header is a YAML block opened by a `---` line at the very start of the
//! document and closed by the next `---` line:
//!
//! ```text
//! ---
//! title: Hello
//! tags: [travel, food]
//! ---
//! body...
//! ```
//!
//! Documents without an opening or closing delimiter have no header; that is
//! not an error.

use crate::error::FrontmatterError;
use crate::types::Metadata;

const DELIMITER: &[u8] = b"---";
const OPENING: &[u8] = b"---\n";

/// Result of [`extract`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Extracted<'a> {
    /// `None` when the document carries no header.
    pub metadata: Option<Metadata>,
    /// Bytes after the closing delimiter line, or the whole input when there
    /// is no header.
    pub body: &'a [u8],
}

/// Split `content` into decoded header metadata and body.
pub fn extract(content: &[u8]) -> Result<Extracted<'_>, FrontmatterError> {
    let Some(rest) = content.strip_prefix(OPENING) else {
        return Ok(no_header(content));
    };
    let Some((header, body)) = split_at_closing(rest) else {
        return Ok(no_header(content));
    };

    let header = std::str::from_utf8(header)?;
    let metadata = if header.trim().is_empty() {
        Metadata::default()
    } else {
        serde_yaml::from_str(header)?
    };

    Ok(Extracted {
        metadata: Some(metadata),
        body,
    })
}

fn no_header(content: &[u8]) -> Extracted<'_> {
    Extracted {
        metadata: None,
        body: content,
    }
}

/// Find the first line that is exactly the delimiter. The closing line may
/// end at EOF without a newline.
fn split_at_closing(rest: &[u8]) -> Option<(&[u8], &[u8])> {
    let mut line_start = 0;
    loop {
        let line_end = rest[line_start..]
            .iter()
            .position(|&b| b == b'\n')
            .map(|i| line_start + i);
        let line = &rest[line_start..line_end.unwrap_or(rest.len())];

        if line == DELIMITER {
            let body_start = line_end.map_or(rest.len(), |end| end + 1);
            return Some((&rest[..line_start], &rest[body_start..]));
        }

        line_start = line_end? + 1;
    }
}
