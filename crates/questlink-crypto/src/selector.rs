use questlink_core::error::QuestError;
use questlink_core::types::Selector;

use crate::hash::keccak256;

/// Compute the 4-byte selector of a canonical Solidity function signature.
///
/// The signature must be canonical (`name(type1,type2)`, no spaces, no
/// parameter names, no return clause); otherwise the selector would not match
/// what the contract exposes, so it is rejected with `InvalidSignature`.
pub fn compute_function_selector(signature: &str) -> Result<Selector, QuestError> {
    validate_signature(signature)?;
    let digest = keccak256(signature.as_bytes());
    let mut sel = [0u8; 4];
    sel.copy_from_slice(&digest[..4]);
    Ok(Selector::from_bytes(sel))
}

/// Check that `signature` is in canonical form.
pub fn validate_signature(signature: &str) -> Result<(), QuestError> {
    let invalid = || QuestError::InvalidSignature(signature.to_string());

    if signature.is_empty() || signature.chars().any(char::is_whitespace) {
        return Err(invalid());
    }
    let open = signature.find('(').ok_or_else(invalid)?;
    let (name, rest) = signature.split_at(open);
    if !is_identifier(name) || !rest.ends_with(')') {
        return Err(invalid());
    }
    let params = &rest[1..rest.len() - 1];
    if params.is_empty() {
        return Ok(());
    }
    for param in split_top_level(params).ok_or_else(invalid)? {
        if !is_canonical_type(param) {
            return Err(invalid());
        }
    }
    Ok(())
}

fn is_identifier(s: &str) -> bool {
    let mut chars = s.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' || c == '$' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '$')
}

/// Split on commas that are not nested inside a tuple. `None` on unbalanced
/// parentheses.
fn split_top_level(s: &str) -> Option<Vec<&str>> {
    let mut parts = Vec::new();
    let mut depth = 0usize;
    let mut start = 0;
    for (i, c) in s.char_indices() {
        match c {
            '(' => depth += 1,
            ')' => depth = depth.checked_sub(1)?,
            ',' if depth == 0 => {
                parts.push(&s[start..i]);
                start = i + 1;
            }
            _ => {}
        }
    }
    if depth != 0 {
        return None;
    }
    parts.push(&s[start..]);
    Some(parts)
}

/// `uint256`, `address[]`, `bytes32[2][]`, `(uint256,address)[]`, ...
fn is_canonical_type(ty: &str) -> bool {
    let (base, suffix) = match ty.find('[') {
        Some(i) if !ty.starts_with('(') => ty.split_at(i),
        _ if ty.starts_with('(') => match ty.rfind(')') {
            Some(close) => ty.split_at(close + 1),
            None => return false,
        },
        _ => (ty, ""),
    };

    if !is_array_suffix(suffix) {
        return false;
    }

    if let Some(inner) = base.strip_prefix('(') {
        let inner = match inner.strip_suffix(')') {
            Some(i) => i,
            None => return false,
        };
        if inner.is_empty() {
            return true;
        }
        return match split_top_level(inner) {
            Some(members) => members.iter().all(|m| is_canonical_type(m)),
            None => false,
        };
    }

    let mut chars = base.chars();
    matches!(chars.next(), Some(c) if c.is_ascii_lowercase())
        && chars.all(|c| c.is_ascii_lowercase() || c.is_ascii_digit())
}

fn is_array_suffix(s: &str) -> bool {
    let mut rest = s;
    while !rest.is_empty() {
        let Some(body) = rest.strip_prefix('[') else { return false };
        let Some(close) = body.find(']') else { return false };
        if !body[..close].chars().all(|c| c.is_ascii_digit()) {
            return false;
        }
        rest = &body[close + 1..];
    }
    true
}
