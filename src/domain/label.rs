//! Label identifiers for the output format.

use std::borrow::Cow;

/// Colons are not allowed in output identifiers; each one becomes `..`.
///
/// Returns `Cow::Borrowed` when nothing had to change.
pub fn sanitize_label(label: &str) -> Cow<'_, str> {
    if label.contains(':') {
        Cow::Owned(label.replace(':', ".."))
    } else {
        Cow::Borrowed(label)
    }
}
