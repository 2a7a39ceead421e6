use base64::{engine::general_purpose::STANDARD, Engine as _};
use sha2::{Digest, Sha256};

/// Answer to the host's `Hello` challenge:
/// `base64(sha256(base64(sha256(password + salt)) + challenge))`.
pub fn authentication_string(password: &str, salt: &str, challenge: &str) -> String {
    let secret = STANDARD.encode(Sha256::digest(format!("{password}{salt}").as_bytes()));
    STANDARD.encode(Sha256::digest(format!("{secret}{challenge}").as_bytes()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn answer_is_a_base64_sha256_digest() {
        let answer = authentication_string("supersecret", "salt", "challenge");
        assert_eq!(answer.len(), 44);
        assert!(answer.ends_with('='));
        assert_eq!(
            STANDARD.decode(&answer).expect("valid base64").len(),
            32
        );
    }

    #[test]
    fn answer_depends_on_every_input() {
        let base = authentication_string("pw", "salt", "challenge");
        assert_eq!(base, authentication_string("pw", "salt", "challenge"));
        assert_ne!(base, authentication_string("pw2", "salt", "challenge"));
        assert_ne!(base, authentication_string("pw", "salt2", "challenge"));
        assert_ne!(base, authentication_string("pw", "salt", "challenge2"));
    }
}
