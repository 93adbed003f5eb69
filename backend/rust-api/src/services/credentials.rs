//! Generators for the login credentials handed out to provisioned accounts.

use rand::{distr::Alphanumeric, Rng};

pub const GENERATED_PASSWORD_LENGTH: usize = 8;

/// Random alphanumeric password (`[A-Za-z0-9]`)
pub fn generate_password(length: usize) -> String {
    rand::rng()
        .sample_iter(&Alphanumeric)
        .take(length)
        .map(char::from)
        .collect()
}

/// Lower-cased ASCII letters and digits of the name; `user` when nothing is left
pub fn clean_name(name: &str) -> String {
    let cleaned: String = name
        .chars()
        .filter(|c| c.is_ascii_alphanumeric())
        .map(|c| c.to_ascii_lowercase())
        .collect();
    if cleaned.is_empty() {
        "user".to_string()
    } else {
        cleaned
    }
}

/// `{cleanname}{1000..=9999}` with `_{attempt}` appended on retries
pub fn generate_user_id(name: &str, attempt: u32) -> String {
    let number: u32 = rand::rng().random_range(1000..=9999);
    if attempt == 0 {
        format!("{}{}", clean_name(name), number)
    } else {
        format!("{}{}_{}", clean_name(name), number, attempt)
    }
}

/// Local part of the email, used as the first username candidate
pub fn username_base(email: &str) -> String {
    email
        .split('@')
        .next()
        .map(str::trim)
        .filter(|local| !local.is_empty())
        .unwrap_or("user")
        .to_lowercase()
}

/// `base`, then `base1`, `base2`, ...
pub fn username_candidate(base: &str, attempt: u32) -> String {
    if attempt == 0 {
        base.to_string()
    } else {
        format!("{}{}", base, attempt)
    }
}
