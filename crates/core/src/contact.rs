use std::sync::LazyLock;

use regex::Regex;

use crate::domain::booking::ContactInfo;

const HANDLE: &str = r"([a-zA-Z0-9_]{5,32})";

static USERNAME_PATTERNS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    [
        format!(r"(?i)@{HANDLE}"),
        format!(r"(?i)https?://t\.me/{HANDLE}"),
        format!(r"(?i)t\.me/{HANDLE}"),
        format!(r"(?i)telegram\s*[:.]?\s*@?{HANDLE}"),
        format!(r"(?i)\btg\s*[:.]?\s*@?{HANDLE}"),
        r"(?i)\b([a-zA-Z][a-zA-Z0-9_]{4,31})\b".to_string(),
    ]
    .iter()
    .map(|pattern| Regex::new(pattern).expect("Invalid username pattern"))
    .collect()
});

/// Splits one free-text contact line into a username and a phone number.
///
/// Username patterns are tried in order and the first match wins; every spelling of the found
/// handle is removed before the rest is reduced to digits. Text that yields neither value is
/// kept verbatim as the phone so the caller still has something to show an administrator.
pub fn extract_contact(raw: &str) -> ContactInfo {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return ContactInfo::default();
    }

    let username = find_username(trimmed);
    let remainder = match &username {
        Some(handle) => strip_handle(trimmed, handle),
        None => trimmed.to_string(),
    };

    let phone = normalize_phone(&remainder);
    match (username, phone) {
        (None, None) => ContactInfo { username: None, phone: Some(trimmed.to_string()) },
        (username, phone) => ContactInfo { username, phone },
    }
}

fn find_username(text: &str) -> Option<String> {
    USERNAME_PATTERNS.iter().find_map(|pattern| {
        pattern.captures(text).and_then(|captures| captures.get(1)).map(|handle| handle.as_str().to_string())
    })
}

fn strip_handle(text: &str, handle: &str) -> String {
    let escaped = regex::escape(handle);
    let variants = [
        format!(r"(?i)https?://t\.me/{escaped}\b"),
        format!(r"(?i)t\.me/{escaped}\b"),
        format!(r"(?i)@{escaped}\b"),
        format!(r"(?i)\b{escaped}\b"),
    ];

    variants.iter().fold(text.to_string(), |current, pattern| match Regex::new(pattern) {
        Ok(regex) => regex.replace_all(&current, "").into_owned(),
        Err(error) => {
            tracing::warn!(
                event_name = "contact.strip_pattern_invalid",
                error = %error,
                "skipping handle strip pattern"
            );
            current
        }
    })
}

/// Keeps digits and a leading `+`; a local 11-digit number starting with `8` becomes `+7...`.
fn normalize_phone(text: &str) -> Option<String> {
    let compact = text.trim();
    let digits: String = compact.chars().filter(char::is_ascii_digit).collect();
    if digits.is_empty() {
        return None;
    }

    let has_plus = compact.trim_start_matches(|ch: char| !ch.is_ascii_digit() && ch != '+').starts_with('+');
    if !has_plus && digits.len() >= 11 && digits.starts_with('8') {
        return Some(format!("+7{}", &digits[1..]));
    }

    Some(if has_plus { format!("+{digits}") } else { digits })
}

#[cfg(test)]
mod tests {
    use super::extract_contact;

    #[test]
    fn username_and_phone_are_separated() {
        let contact = extract_contact("@ivan_2024 +7 999 123-45-67");

        assert_eq!(contact.username.as_deref(), Some("ivan_2024"));
        assert_eq!(contact.phone.as_deref(), Some("+79991234567"));
    }

    #[test]
    fn local_eight_prefix_is_rewritten() {
        let contact = extract_contact("89991234567");

        assert_eq!(contact.username, None);
        assert_eq!(contact.phone.as_deref(), Some("+79991234567"));
    }

    #[test]
    fn unrecognized_text_is_kept_as_phone() {
        let contact = extract_contact("  звоните вечером  ");

        assert_eq!(contact.username, None);
        assert_eq!(contact.phone.as_deref(), Some("звоните вечером"));
    }

    #[test]
    fn link_forms_are_recognized_and_stripped() {
        let contact = extract_contact("https://t.me/Petr_Rider 8 (912) 000-11-22");
        assert_eq!(contact.username.as_deref(), Some("Petr_Rider"));
        assert_eq!(contact.phone.as_deref(), Some("+79120001122"));

        let contact = extract_contact("t.me/petr_rider");
        assert_eq!(contact.username.as_deref(), Some("petr_rider"));
        assert_eq!(contact.phone, None);
    }

    #[test]
    fn labelled_handles_are_recognized() {
        assert_eq!(extract_contact("Telegram: maria_k").username.as_deref(), Some("maria_k"));
        assert_eq!(extract_contact("tg @maria_k").username.as_deref(), Some("maria_k"));
    }

    #[test]
    fn handle_digits_do_not_leak_into_phone() {
        let contact = extract_contact("rider2024 +7 900 000 00 00");

        assert_eq!(contact.username.as_deref(), Some("rider2024"));
        assert_eq!(contact.phone.as_deref(), Some("+79000000000"));
    }

    #[test]
    fn short_handles_are_ignored() {
        let contact = extract_contact("@abc 89001112233");

        assert_eq!(contact.username, None);
        assert_eq!(contact.phone.as_deref(), Some("+79001112233"));
    }

    #[test]
    fn blank_input_yields_nothing() {
        assert!(extract_contact("   ").is_empty());
    }
}
