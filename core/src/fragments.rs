//! Extraction and reassembly of the split-host fragments carried in gate
//! responses.
//!
//! The backend deliberately ships the destination host as two string
//! fragments. The preferred keys are tried first; failing that, the first
//! two non-empty string values win, in the document's decode order
//! (`serde_json` is built with `preserve_order`, so decode order is the
//! object's own key order rather than an arbitrary hash order).

use serde_json::Value;

const PART_A_KEYS: [&str; 2] = ["bat", "beam"];
const PART_B_KEYS: [&str; 2] = ["man", "cyan"];

/// Two trimmed, non-empty fragments in encounter order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FragmentPair {
    pub first: String,
    pub second: String,
}

fn trimmed(value: &Value) -> Option<String> {
    let text = value.as_str()?.trim();
    if text.is_empty() {
        None
    } else {
        Some(text.to_string())
    }
}

impl FragmentPair {
    /// Preferred-key extraction with the decode-order fallback.
    pub fn extract(body: &Value) -> Option<Self> {
        let map = body.as_object()?;

        let part_a = PART_A_KEYS.iter().find_map(|key| map.get(*key).and_then(trimmed));
        let part_b = PART_B_KEYS.iter().find_map(|key| map.get(*key).and_then(trimmed));
        if let (Some(first), Some(second)) = (part_a, part_b) {
            return Some(Self { first, second });
        }

        let mut strings = map.values().filter_map(trimmed);
        let first = strings.next()?;
        let second = strings.next()?;
        Some(Self { first, second })
    }

    /// Strict extraction used by the POST fallback and the secondary probe:
    /// both preferred keys must be present as strings, nothing else counts.
    pub fn extract_exact(body: &Value) -> Option<Self> {
        let map = body.as_object()?;
        let first = map.get("bat")?.as_str()?.to_string();
        let second = map.get("man")?.as_str()?.to_string();
        Some(Self { first, second })
    }

    /// Reassembles a hostname: the fragment starting with `.` is the
    /// suffix, the other the prefix; if neither qualifies, fragments join
    /// in encounter order. One trailing slash is stripped.
    pub fn into_host(self) -> String {
        let mut combined = if self.first.starts_with('.') && !self.second.starts_with('.') {
            format!("{}{}", self.second, self.first)
        } else {
            format!("{}{}", self.first, self.second)
        };
        if combined.ends_with('/') {
            combined.truncate(combined.len() - 1);
        }
        combined
    }

    /// Direct concatenation in encounter order, trimmed. No prefix/suffix
    /// heuristic and no slash stripping.
    pub fn concat_host(self) -> String {
        format!("{}{}", self.first, self.second).trim().to_string()
    }
}

/// Prepends `https://` unless the candidate already carries an `http`
/// scheme. Never double-prefixes.
pub fn normalize_scheme(candidate: &str) -> String {
    if candidate.starts_with("http") {
        candidate.to_string()
    } else {
        format!("https://{candidate}")
    }
}
