use super::violation::{Field, Reason, Violation};

pub const CUSTOMER_EMAIL_MAX_LEN: usize = 500;
pub const ROOM_NAME_MAX_LEN: usize = 100;

/// A single `@` that is neither the first nor the last character.
pub fn looks_like_email(value: &str) -> bool {
    match (value.find('@'), value.rfind('@')) {
        (Some(first), Some(last)) => first == last && first > 0 && first < value.len() - 1,
        _ => false,
    }
}

/// Customer email rules, each evaluated on its own.
pub fn customer_email(value: Option<&str>) -> Vec<Violation> {
    let mut violations = Vec::new();
    let Some(value) = value else {
        violations.push(Violation::new(
            Field::CustomerEmail,
            Reason::Required,
            "customer email is required",
        ));
        return violations;
    };

    if value.trim().is_empty() {
        violations.push(Violation::new(
            Field::CustomerEmail,
            Reason::Required,
            "customer email is required",
        ));
    }
    if value.chars().count() > CUSTOMER_EMAIL_MAX_LEN {
        violations.push(Violation::new(
            Field::CustomerEmail,
            Reason::TooLong,
            format!("customer email can't be longer than {CUSTOMER_EMAIL_MAX_LEN} characters"),
        ));
    }
    if !looks_like_email(value) {
        violations.push(Violation::new(
            Field::CustomerEmail,
            Reason::InvalidEmail,
            "customer email must be a valid email address",
        ));
    }
    violations
}

pub fn room_name(value: &str) -> Vec<Violation> {
    let mut violations = Vec::new();
    if value.trim().is_empty() {
        violations.push(Violation::new(
            Field::RoomName,
            Reason::Required,
            "room name is required",
        ));
    }
    if value.chars().count() > ROOM_NAME_MAX_LEN {
        violations.push(Violation::new(
            Field::RoomName,
            Reason::TooLong,
            format!("room name can't be longer than {ROOM_NAME_MAX_LEN} characters"),
        ));
    }
    violations
}

#[cfg(test)]
mod tests {
    use super::*;

    fn reasons(v: Vec<Violation>) -> Vec<Reason> {
        v.into_iter().map(|v| v.reason).collect()
    }

    #[test]
    fn valid_email_passes() {
        assert!(customer_email(Some("guest@example.com")).is_empty());
    }

    #[test]
    fn missing_email_is_required_only() {
        assert_eq!(reasons(customer_email(None)), vec![Reason::Required]);
    }

    #[test]
    fn blank_email_is_required_and_invalid() {
        assert_eq!(
            reasons(customer_email(Some(""))),
            vec![Reason::Required, Reason::InvalidEmail]
        );
        assert_eq!(
            reasons(customer_email(Some("   "))),
            vec![Reason::Required, Reason::InvalidEmail]
        );
    }

    #[test]
    fn email_length_limit() {
        let local = "x".repeat(CUSTOMER_EMAIL_MAX_LEN - "@example.com".len());
        let at_limit = format!("{local}@example.com");
        assert_eq!(at_limit.len(), CUSTOMER_EMAIL_MAX_LEN);
        assert!(customer_email(Some(&at_limit)).is_empty());

        let over = format!("y{at_limit}");
        assert_eq!(reasons(customer_email(Some(&over))), vec![Reason::TooLong]);
    }

    #[test]
    fn email_shape() {
        assert!(looks_like_email("a@b"));
        assert!(!looks_like_email("@example.com"));
        assert!(!looks_like_email("guest@"));
        assert!(!looks_like_email("guest.example.com"));
        assert!(!looks_like_email("a@b@c"));
    }

    #[test]
    fn room_name_rules() {
        assert!(room_name("Ocean view").is_empty());
        assert_eq!(reasons(room_name(" ")), vec![Reason::Required]);
        assert_eq!(
            reasons(room_name(&"r".repeat(ROOM_NAME_MAX_LEN + 1))),
            vec![Reason::TooLong]
        );
        assert!(room_name(&"r".repeat(ROOM_NAME_MAX_LEN)).is_empty());
    }

    #[test]
    fn room_name_violations_target_room_name() {
        assert!(room_name("").iter().all(|v| v.field == Field::RoomName));
    }
}
