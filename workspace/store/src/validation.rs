//! Account field rules shared by the HTTP layer and the CLI.

/// Maximum length of a username, in characters.
pub const USERNAME_MAX_LENGTH: usize = 150;

/// Minimum length of a plaintext password accepted at registration or change.
pub const PASSWORD_MIN_LENGTH: usize = 8;

/// Message reported when a username breaks [`is_valid_username`].
pub const USERNAME_HELP: &str =
    "Enter a valid username. This value may contain only letters, numbers, and @/./+/-/_ characters.";

/// Trims and lower-cases an email address.
pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

/// Letters, digits and `@ . + - _` only, between 1 and 150 characters.
pub fn is_valid_username(username: &str) -> bool {
    let length = username.chars().count();
    (1..=USERNAME_MAX_LENGTH).contains(&length)
        && username
            .chars()
            .all(|c| c.is_alphanumeric() || matches!(c, '@' | '.' | '+' | '-' | '_'))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_email() {
        assert_eq!(normalize_email("A@B.COM"), "a@b.com");
        assert_eq!(normalize_email("  test@EXAMPLE.com "), "test@example.com");
        assert_eq!(normalize_email(""), "");
    }

    #[test]
    fn test_username_rules() {
        assert!(is_valid_username("gamertag123"));
        assert!(is_valid_username("first.last+tag@site-name_x"));
        assert!(is_valid_username("jürgen"));
        assert!(is_valid_username(&"a".repeat(150)));

        assert!(!is_valid_username(""));
        assert!(!is_valid_username(&"a".repeat(151)));
        assert!(!is_valid_username("has space"));
        assert!(!is_valid_username("semi;colon"));
        assert!(!is_valid_username("slash/"));
    }
}
