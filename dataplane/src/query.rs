//! `@@name` placeholder substitution for source queries.
//!
//! A placeholder is `@@` followed by the longest run of alphanumeric characters and
//! underscores. Substitution is a single left-to-right pass: replacement text is never
//! scanned again, so values containing `@@` are inserted verbatim.

use tracing::{debug, warn};

/// Marker introducing a placeholder.
const PLACEHOLDER_MARKER: &str = "@@";

fn is_name_char(c: char) -> bool {
    c == '_' || c.is_alphanumeric()
}

/// Returns the byte length of the placeholder name starting at the beginning of `rest`.
fn name_len(rest: &str) -> usize {
    rest.char_indices()
        .find(|(_, c)| !is_name_char(*c))
        .map(|(index, _)| index)
        .unwrap_or(rest.len())
}

/// Replaces every resolvable `@@name` placeholder in `template`.
///
/// Names for which `lookup` returns `None` are left in place and reported with a warning.
pub fn substitute<F>(template: &str, lookup: F) -> String
where
    F: Fn(&str) -> Option<String>,
{
    let mut output = String::with_capacity(template.len());
    let mut rest = template;

    while let Some(start) = rest.find(PLACEHOLDER_MARKER) {
        output.push_str(&rest[..start]);

        let after_marker = &rest[start + PLACEHOLDER_MARKER.len()..];
        let len = name_len(after_marker);
        let name = &after_marker[..len];

        match lookup(name) {
            Some(value) => {
                debug!(parameter = name, "substituted query parameter");
                output.push_str(&value);
            }
            None => {
                warn!(parameter = name, "query parameter has no value, leaving it in place");
                output.push_str(PLACEHOLDER_MARKER);
                output.push_str(name);
            }
        }

        rest = &after_marker[len..];
    }

    output.push_str(rest);
    output
}

/// Returns the placeholder names referenced by `template`, in order of appearance.
pub fn parameter_names(template: &str) -> Vec<&str> {
    let mut names = Vec::new();
    let mut rest = template;

    while let Some(start) = rest.find(PLACEHOLDER_MARKER) {
        let after_marker = &rest[start + PLACEHOLDER_MARKER.len()..];
        let len = name_len(after_marker);
        names.push(&after_marker[..len]);
        rest = &after_marker[len..];
    }

    names
}
