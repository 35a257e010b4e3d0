use rand::distributions::Alphanumeric;
use rand::Rng;

/// Mint a random alphanumeric pickup code of `length` characters.
pub fn generate_claim_code(length: usize) -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(length)
        .map(char::from)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn codes_are_alphanumeric_and_sized() {
        let code = generate_claim_code(24);
        assert_eq!(code.len(), 24);
        assert!(code.chars().all(|c| c.is_ascii_alphanumeric()));
    }

    #[test]
    fn codes_do_not_repeat() {
        assert_ne!(generate_claim_code(24), generate_claim_code(24));
    }
}
