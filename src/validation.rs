//! Input validation for storefront credentials and payment fields.
//!
//! Pure functions with no shared state and no I/O. Validation failures are
//! ordinary return values, never fatal errors.

use std::fmt;
use std::sync::LazyLock;

use regex::Regex;
use thiserror::Error;

/// Minimum password length.
pub const MIN_PASSWORD_LENGTH: usize = 8;

/// Punctuation set accepted as password symbols.
pub const PASSWORD_SYMBOLS: &str = "!@#$%^&*(),.?\":{}|<>";

static EMAIL_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").unwrap());

static PHONE_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^\+?[1-9]\d{0,15}$").unwrap());

static JS_SCHEME_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?i)javascript:").unwrap());

static EVENT_HANDLER_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?i)on\w+=").unwrap());

/// Validation errors.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    /// Email does not match the basic `local@domain.tld` shape.
    #[error("invalid email format")]
    EmailInvalidFormat,

    /// Phone number is not a plausible international number.
    #[error("invalid phone number")]
    PhoneInvalidFormat,
}

/// Password strength rules.
///
/// Rules are evaluated independently so a caller can show every failing
/// rule at once.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum PasswordRule {
    /// Minimum length not met.
    #[error("password must be at least {MIN_PASSWORD_LENGTH} characters")]
    MinLength,

    /// No uppercase letter.
    #[error("password must contain an uppercase letter")]
    Uppercase,

    /// No lowercase letter.
    #[error("password must contain a lowercase letter")]
    Lowercase,

    /// No digit.
    #[error("password must contain a digit")]
    Digit,

    /// No symbol from the accepted punctuation set.
    #[error("password must contain a symbol")]
    Symbol,
}

/// Result of a password strength check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PasswordCheck {
    /// Whether the password satisfies every rule.
    pub valid: bool,
    /// Violated rules, in rule order.
    pub violations: Vec<PasswordRule>,
}

/// Card network classified from the leading digits.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CardType {
    Visa,
    Mastercard,
    Amex,
    Unknown,
}

impl CardType {
    /// Display name for the card network.
    pub fn as_str(&self) -> &'static str {
        match self {
            CardType::Visa => "Visa",
            CardType::Mastercard => "Mastercard",
            CardType::Amex => "Amex",
            CardType::Unknown => "Unknown",
        }
    }
}

impl fmt::Display for CardType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Result of a credit card number check.
///
/// The card type is classified from the leading digits independently of
/// whether the number passes validation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CardCheck {
    /// Whether the number is well-formed and passes the Luhn checksum.
    pub valid: bool,
    /// Card network classified from the leading digits.
    pub card_type: CardType,
}

/// Validate an email address.
///
/// Accepts the basic `local@domain.tld` shape and nothing else.
///
/// # Examples
///
/// ```
/// use storefront_auth::validate_email;
///
/// assert!(validate_email("shopper@example.com").is_ok());
/// assert!(validate_email("not-an-email").is_err());
/// ```
pub fn validate_email(email: &str) -> Result<(), ValidationError> {
    if EMAIL_RE.is_match(email) {
        Ok(())
    } else {
        Err(ValidationError::EmailInvalidFormat)
    }
}

/// Check a password against the strength rules.
///
/// All rules are evaluated; nothing short-circuits, so the caller gets the
/// full list of violations in one pass.
///
/// # Examples
///
/// ```
/// use storefront_auth::validate_password;
///
/// let check = validate_password("Abc123!@");
/// assert!(check.valid);
/// assert!(check.violations.is_empty());
/// ```
pub fn validate_password(password: &str) -> PasswordCheck {
    let mut violations = Vec::new();

    if password.chars().count() < MIN_PASSWORD_LENGTH {
        violations.push(PasswordRule::MinLength);
    }
    if !password.chars().any(|c| c.is_ascii_uppercase()) {
        violations.push(PasswordRule::Uppercase);
    }
    if !password.chars().any(|c| c.is_ascii_lowercase()) {
        violations.push(PasswordRule::Lowercase);
    }
    if !password.chars().any(|c| c.is_ascii_digit()) {
        violations.push(PasswordRule::Digit);
    }
    if !password.chars().any(|c| PASSWORD_SYMBOLS.contains(c)) {
        violations.push(PasswordRule::Symbol);
    }

    PasswordCheck {
        valid: violations.is_empty(),
        violations,
    }
}

/// Strip common script-injection patterns from free-form text.
///
/// Removes angle brackets, `javascript:` scheme prefixes, and inline
/// `on*=` event-handler patterns (all case-insensitive), then trims
/// whitespace. This is a defense-in-depth filter, not an HTML sanitizer.
pub fn sanitize_text(input: &str) -> String {
    let without_brackets: String = input.chars().filter(|c| *c != '<' && *c != '>').collect();
    let without_scheme = JS_SCHEME_RE.replace_all(&without_brackets, "");
    let without_handlers = EVENT_HANDLER_RE.replace_all(&without_scheme, "");
    without_handlers.trim().to_string()
}

/// Luhn checksum: double every second digit from the right, subtract 9 when
/// the doubled value exceeds 9, and require the digit sum to be divisible
/// by 10.
fn luhn_valid(digits: &str) -> bool {
    let mut sum = 0u32;
    let mut double = false;

    for c in digits.chars().rev() {
        let Some(mut d) = c.to_digit(10) else {
            return false;
        };
        if double {
            d *= 2;
            if d > 9 {
                d -= 9;
            }
        }
        sum += d;
        double = !double;
    }

    sum % 10 == 0
}

/// Classify the card network from the leading digits.
fn classify_card(digits: &str) -> CardType {
    if digits.starts_with('4') {
        CardType::Visa
    } else if matches!(digits.get(0..2), Some(p) if ("51"..="55").contains(&p)) {
        CardType::Mastercard
    } else if digits.starts_with("34") || digits.starts_with("37") {
        CardType::Amex
    } else {
        CardType::Unknown
    }
}

/// Validate a credit card number.
///
/// Whitespace is stripped before checking. A valid number has 13-19 digits
/// and passes the Luhn checksum. The network is classified either way.
///
/// # Examples
///
/// ```
/// use storefront_auth::{validate_credit_card, CardType};
///
/// let check = validate_credit_card("4111 1111 1111 1111");
/// assert!(check.valid);
/// assert_eq!(check.card_type, CardType::Visa);
/// ```
pub fn validate_credit_card(input: &str) -> CardCheck {
    let digits: String = input.chars().filter(|c| !c.is_whitespace()).collect();

    let card_type = classify_card(&digits);
    let well_formed =
        (13..=19).contains(&digits.len()) && digits.chars().all(|c| c.is_ascii_digit());

    CardCheck {
        valid: well_formed && luhn_valid(&digits),
        card_type,
    }
}

/// Validate a phone number.
///
/// Separators (spaces, hyphens, parentheses) are stripped; what remains
/// must be an optional `+` followed by a non-zero digit and up to 15
/// further digits.
pub fn validate_phone(input: &str) -> Result<(), ValidationError> {
    let stripped: String = input
        .chars()
        .filter(|c| !matches!(c, ' ' | '-' | '(' | ')'))
        .collect();

    if PHONE_RE.is_match(&stripped) {
        Ok(())
    } else {
        Err(ValidationError::PhoneInvalidFormat)
    }
}
