//! Wire texts exchanged with clients
//!
//! Every server notice is a single line; the terminator is added when the
//! line is written (see [`super::line::encode_line`]).

use crate::error::RegisterError;

/// Maximum display name length in characters
pub const MAX_NAME_LEN: usize = 12;

/// Sent to every new connection before anything else
pub const NAME_PROMPT: &str = "Enter your name:";

/// Sent when a requested name is malformed or already held
pub const NAME_REJECTED: &str = "Selected name is invalid or already taken.";

/// Follows [`NAME_REJECTED`]
pub const NAME_RETRY: &str = "Please select a different one:";

/// Check a requested display name against the format rule.
///
/// Accepts 1 to [`MAX_NAME_LEN`] ASCII letters or digits and nothing else.
pub fn validate_name(name: &str) -> Result<(), RegisterError> {
    let well_formed = !name.is_empty()
        && name.len() <= MAX_NAME_LEN
        && name.bytes().all(|b| b.is_ascii_alphanumeric());

    if well_formed {
        Ok(())
    } else {
        Err(RegisterError::InvalidFormat)
    }
}

/// Broadcast when `name` registers
pub fn user_joined(name: &str) -> String {
    format!("{} has joined the chat room.", name)
}

/// Broadcast when `name` disconnects
pub fn user_left(name: &str) -> String {
    format!("{} has left the chat room.", name)
}

/// Relayed to everyone except the author
pub fn chat_line(name: &str, text: &str) -> String {
    format!("{}: {}", name, text)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_names() {
        assert!(validate_name("Alice").is_ok());
        assert!(validate_name("a").is_ok());
        assert!(validate_name("Bob42").is_ok());
        assert!(validate_name("ABCDEFGHIJKL").is_ok());
    }

    #[test]
    fn test_invalid_names() {
        for name in ["", "Alice!", "ABCDEFGHIJKLM", "two words", " Bob", "Bob\r", "Zoë", "a_b"] {
            assert_eq!(
                validate_name(name),
                Err(RegisterError::InvalidFormat),
                "{:?} should be rejected",
                name
            );
        }
    }

    #[test]
    fn test_notice_texts() {
        assert_eq!(user_joined("Bob"), "Bob has joined the chat room.");
        assert_eq!(user_left("Bob"), "Bob has left the chat room.");
        assert_eq!(chat_line("Bob", "hi"), "Bob: hi");
        assert_eq!(chat_line("Bob", ""), "Bob: ");
    }
}
