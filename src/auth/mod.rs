pub mod accounts;
pub mod token;
pub mod verification;

pub use verification::{normalize_phone, CodeCheck, VerificationStore};
