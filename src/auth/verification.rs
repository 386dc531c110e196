use std::collections::HashMap;
use std::time::{Duration, Instant};

use rand::Rng;

const CODE_TTL_SECS: u64 = 300; // 5 minutes
const MAX_ATTEMPTS: u32 = 5;

/// A one-time SMS verification code issued to a phone number.
#[derive(Debug, Clone)]
pub struct PendingCode {
    pub code: String,
    pub expires_at: Instant,
    pub attempts: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CodeCheck {
    Ok,
    Missing,
    Expired,
    Mismatch,
}

impl CodeCheck {
    pub fn message(&self) -> &'static str {
        match self {
            CodeCheck::Ok => "Verification code confirmed",
            CodeCheck::Missing => "No verification code was sent or it has expired",
            CodeCheck::Expired => "Verification code has expired",
            CodeCheck::Mismatch => "Verification code does not match",
        }
    }
}

/// In-memory store for SMS verification codes, keyed by normalized phone.
pub struct VerificationStore {
    pub(crate) codes: HashMap<String, PendingCode>,
    ttl: Duration,
}

impl Default for VerificationStore {
    fn default() -> Self {
        Self::new()
    }
}

impl VerificationStore {
    pub fn new() -> Self {
        Self::with_ttl(Duration::from_secs(CODE_TTL_SECS))
    }

    pub fn with_ttl(ttl: Duration) -> Self {
        Self {
            codes: HashMap::new(),
            ttl,
        }
    }

    /// Issue a fresh code for `phone`, replacing any previous one.
    pub fn issue(&mut self, phone: &str) -> String {
        self.clear_stale();

        let code = generate_code();
        self.codes.insert(
            phone.to_string(),
            PendingCode {
                code: code.clone(),
                expires_at: Instant::now() + self.ttl,
                attempts: 0,
            },
        );
        code
    }

    /// Check a code without consuming it.
    pub fn verify(&mut self, phone: &str, code: &str) -> CodeCheck {
        self.check(phone, code)
    }

    /// Check a code and remove it on success (single-use).
    pub fn consume(&mut self, phone: &str, code: &str) -> CodeCheck {
        let result = self.check(phone, code);
        if result == CodeCheck::Ok {
            self.codes.remove(phone);
        }
        result
    }

    pub fn remove(&mut self, phone: &str) {
        self.codes.remove(phone);
    }

    fn check(&mut self, phone: &str, code: &str) -> CodeCheck {
        let Some(pending) = self.codes.get_mut(phone) else {
            return CodeCheck::Missing;
        };

        if Instant::now() >= pending.expires_at {
            self.codes.remove(phone);
            return CodeCheck::Expired;
        }

        if pending.code != code.trim() {
            pending.attempts += 1;
            if pending.attempts >= MAX_ATTEMPTS {
                tracing::warn!("Too many wrong verification attempts for {}", mask_phone(phone));
                self.codes.remove(phone);
            }
            return CodeCheck::Mismatch;
        }

        CodeCheck::Ok
    }

    /// Remove expired codes
    fn clear_stale(&mut self) {
        let now = Instant::now();
        self.codes.retain(|_, pending| now < pending.expires_at);
    }
}

/// Strip hyphens and whitespace from a phone number.
pub fn normalize_phone(phone: &str) -> String {
    phone
        .chars()
        .filter(|c| *c != '-' && !c.is_whitespace())
        .collect()
}

/// Keep only the last four digits for logging.
pub fn mask_phone(phone: &str) -> String {
    let tail: String = phone
        .chars()
        .rev()
        .take(4)
        .collect::<Vec<_>>()
        .into_iter()
        .rev()
        .collect();
    format!("***{}", tail)
}

/// Six random digits, never starting with zero.
fn generate_code() -> String {
    rand::thread_rng().gen_range(100_000..1_000_000).to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn issued_code_is_six_digits() {
        let mut store = VerificationStore::new();
        let code = store.issue("01012345678");
        assert_eq!(code.len(), 6);
        assert!(code.chars().all(|c| c.is_ascii_digit()));
    }

    #[test]
    fn verify_does_not_consume() {
        let mut store = VerificationStore::new();
        let code = store.issue("010");
        assert_eq!(store.verify("010", &code), CodeCheck::Ok);
        assert_eq!(store.verify("010", &code), CodeCheck::Ok);
        assert_eq!(store.consume("010", &code), CodeCheck::Ok);
        assert_eq!(store.consume("010", &code), CodeCheck::Missing);
    }

    #[test]
    fn wrong_code_is_a_mismatch() {
        let mut store = VerificationStore::new();
        let code = store.issue("010");
        let wrong = if code == "123456" { "654321" } else { "123456" };
        assert_eq!(store.verify("010", wrong), CodeCheck::Mismatch);
        assert_eq!(store.consume("010", &code), CodeCheck::Ok);
    }

    #[test]
    fn unknown_phone_is_missing() {
        let mut store = VerificationStore::new();
        assert_eq!(store.verify("010", "123456"), CodeCheck::Missing);
    }

    #[test]
    fn expired_code_is_removed() {
        let mut store = VerificationStore::with_ttl(Duration::from_millis(0));
        let code = store.issue("010");
        assert_eq!(store.verify("010", &code), CodeCheck::Expired);
        assert!(store.codes.is_empty());
    }

    #[test]
    fn too_many_attempts_invalidates_code() {
        let mut store = VerificationStore::new();
        let code = store.issue("010");
        let wrong = if code == "999999" { "100000" } else { "999999" };
        for _ in 0..MAX_ATTEMPTS {
            assert_eq!(store.verify("010", wrong), CodeCheck::Mismatch);
        }
        assert_eq!(store.verify("010", &code), CodeCheck::Missing);
    }

    #[test]
    fn reissue_replaces_previous_code() {
        let mut store = VerificationStore::new();
        store.issue("010");
        let second = store.issue("010");
        assert_eq!(store.codes.len(), 1);
        assert_eq!(store.codes["010"].code, second);
    }

    #[test]
    fn normalize_phone_strips_separators() {
        assert_eq!(normalize_phone("010-1234-5678"), "01012345678");
        assert_eq!(normalize_phone(" 010 1234 5678 "), "01012345678");
    }

    #[test]
    fn mask_phone_keeps_last_four() {
        assert_eq!(mask_phone("01012345678"), "***5678");
        assert_eq!(mask_phone("12"), "***12");
    }
}
