use sha2::{Digest, Sha256};

/// Reduce a task description to its alphanumeric skeleton: trimmed,
/// lowercased, everything outside `[a-z0-9]` removed.
pub fn normalize(description: &str) -> String {
    description
        .trim()
        .to_lowercase()
        .chars()
        .filter(|c| c.is_ascii_alphanumeric())
        .collect()
}

/// Content identity of a task description.
///
/// Intentionally lossy: "Feed dog:" and "Feed Dog" collapse to the same
/// skeleton and therefore the same fingerprint, which is how reworded
/// duplicates are caught. Two unrelated tasks that share a skeleton will be
/// treated as duplicates; that is an accepted limitation, not a bug to fix
/// here.
pub fn fingerprint(description: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(normalize(description).as_bytes());
    format!("{:x}", hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn punctuation_and_case_do_not_matter() {
        assert_eq!(fingerprint("Feed dog:"), fingerprint("Feed Dog"));
        assert_eq!(fingerprint("feed, dog!!"), fingerprint("Feed dog"));
    }

    #[test]
    fn whitespace_does_not_matter() {
        assert_eq!(fingerprint(" Buy  milk "), fingerprint("buy milk"));
    }

    #[test]
    fn different_skeletons_do_not_collide() {
        assert_ne!(fingerprint("Call Mom"), fingerprint("Call Dad"));
    }

    #[test]
    fn normalize_keeps_only_ascii_alphanumerics() {
        assert_eq!(normalize("  Renew passport (2026)! "), "renewpassport2026");
        assert_eq!(normalize("café"), "caf");
    }

    #[test]
    fn fingerprint_is_stable_hex() {
        let digest = fingerprint("Buy milk");
        assert_eq!(digest.len(), 64);
        assert_eq!(digest, fingerprint("Buy milk"));
    }
}
