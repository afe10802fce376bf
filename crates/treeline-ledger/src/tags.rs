//! Release tag validation.
//!
//! Valid tags:
//! - Must be non-empty and at most 64 characters
//! - Must not contain whitespace, `~`, `^`, `:`, `?`, `*`, `[`, `\`, `,`
//! - Must not contain `..`
//! - Must not start or end with `.` or `-`

use treeline_types::NodeId;

use crate::error::{LedgerError, Result};

const MAX_TAG_LEN: usize = 64;

/// Characters that are forbidden anywhere in a tag.
const FORBIDDEN_CHARS: &[char] = &[' ', '\t', '\n', '\r', '~', '^', ':', '?', '*', '[', '\\', ','];

/// Validate a release tag for `node`, returning `Ok(())` if valid.
///
/// # Examples
///
/// ```
/// use treeline_ledger::validate_release_tag;
/// use treeline_types::NodeId;
///
/// let node = NodeId::new("gm-1").unwrap();
/// assert!(validate_release_tag(&node, "q3-approved").is_ok());
/// assert!(validate_release_tag(&node, "").is_err());
/// assert!(validate_release_tag(&node, "bad..tag").is_err());
/// ```
pub fn validate_release_tag(node: &NodeId, tag: &str) -> Result<()> {
    let reject = |reason: String| LedgerError::InvalidArgument {
        node: node.clone(),
        reason: format!("invalid release tag {tag:?}: {reason}"),
    };

    if tag.is_empty() {
        return Err(reject("must not be empty".into()));
    }
    if tag.chars().count() > MAX_TAG_LEN {
        return Err(reject(format!("longer than {MAX_TAG_LEN} characters")));
    }
    if let Some(ch) = tag.chars().find(|c| FORBIDDEN_CHARS.contains(c)) {
        return Err(reject(format!("contains forbidden character: {ch:?}")));
    }
    if tag.contains("..") {
        return Err(reject("must not contain '..'".into()));
    }
    if tag.starts_with(['.', '-']) || tag.ends_with(['.', '-']) {
        return Err(reject("must not start or end with '.' or '-'".into()));
    }

    Ok(())
}
