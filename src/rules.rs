//! Built-in rule constructors. Each returns a [`Rule`] carrying a
//! rule-specific default message; [`Rule::with_message`] substitutes a
//! custom one. Presence-style rules pass on empty values so they compose
//! with [`required`].

use std::future::Future;
use std::sync::OnceLock;

use chrono::{DateTime, NaiveDate, NaiveDateTime, TimeZone, Utc};
use regex::Regex;
use rust_decimal::Decimal;

use crate::schema::Rule;
use crate::value::{Value, ValueMap};

/// Sentinel option value treated as "nothing selected" by [`dropdown`].
pub const UNSELECTED_OPTION: &str = "default";

const STRONG_PASSWORD_SYMBOLS: &str = "!@#$%^&*()_+-=[]{}|;:'\",.<>/?";

fn email_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").expect("invalid built-in email pattern")
    })
}

fn alpha_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"^[A-Za-z]+$").expect("invalid built-in alpha pattern"))
}

fn alpha_numeric_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"^[A-Za-z0-9]+$").expect("invalid built-in alphanumeric pattern")
    })
}

/// Rendered text of a present value; `None` when unset, null, or empty.
fn present_text(value: &Value) -> Option<String> {
    if value.is_empty() {
        None
    } else {
        Some(value.to_string())
    }
}

fn parse_date(text: &str) -> Option<DateTime<Utc>> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return None;
    }
    if let Ok(parsed) = DateTime::parse_from_rfc3339(trimmed) {
        return Some(parsed.with_timezone(&Utc));
    }
    if let Ok(parsed) = NaiveDateTime::parse_from_str(trimmed, "%Y-%m-%d %H:%M:%S") {
        return Some(Utc.from_utc_datetime(&parsed));
    }
    for format in ["%Y-%m-%d", "%m/%d/%Y"] {
        if let Ok(parsed) = NaiveDate::parse_from_str(trimmed, format) {
            return Some(Utc.from_utc_datetime(&parsed.and_hms_opt(0, 0, 0)?));
        }
    }
    None
}

/// Fails when the value is unset, null, or empty text. `false` and `0` are
/// present.
pub fn required() -> Rule {
    Rule::check("required", "This field is required", |value, _| {
        !value.is_empty()
    })
}

/// Fails when a present value does not look like `local@domain.tld`.
pub fn email() -> Rule {
    Rule::check(
        "email",
        "Please enter a valid email address",
        |value, _| match present_text(value) {
            Some(text) => email_pattern().is_match(&text),
            None => true,
        },
    )
}

/// Fails when present text is shorter than `min` characters.
pub fn min_length(min: usize) -> Rule {
    Rule::check(
        "min_length",
        format!("Must be at least {min} characters"),
        move |value, _| match value.as_text() {
            Some(text) if !text.is_empty() => text.chars().count() >= min,
            _ => true,
        },
    )
}

/// Fails when present text is longer than `max` characters.
pub fn max_length(max: usize) -> Rule {
    Rule::check(
        "max_length",
        format!("Must be no more than {max} characters"),
        move |value, _| match value.as_text() {
            Some(text) if !text.is_empty() => text.chars().count() <= max,
            _ => true,
        },
    )
}

/// Fails when a present value does not satisfy `pattern`. The caller
/// supplies a compiled [`Regex`], so malformed patterns surface at the
/// caller, not here.
pub fn pattern(pattern: Regex) -> Rule {
    Rule::check("pattern", "Invalid format", move |value, _| {
        match present_text(value) {
            Some(text) => pattern.is_match(&text),
            None => true,
        }
    })
}

/// Passes when empty, or when at least 8 characters with one lowercase,
/// one uppercase, one digit, and one symbol from the allowed set.
pub fn strong_password() -> Rule {
    Rule::check(
        "strong_password",
        "Password must be at least 8 characters with lowercase, uppercase, number, and symbol",
        |value, _| {
            let Some(text) = present_text(value) else {
                return true;
            };
            text.chars().count() >= 8
                && text.chars().any(|c| c.is_ascii_lowercase())
                && text.chars().any(|c| c.is_ascii_uppercase())
                && text.chars().any(|c| c.is_ascii_digit())
                && text.chars().any(|c| STRONG_PASSWORD_SYMBOLS.contains(c))
        },
    )
}

pub fn alpha() -> Rule {
    Rule::check("alpha", "Only letters are allowed", |value, _| {
        match present_text(value) {
            Some(text) => alpha_pattern().is_match(&text),
            None => true,
        }
    })
}

pub fn alpha_numeric() -> Rule {
    Rule::check(
        "alpha_numeric",
        "Only letters and numbers are allowed",
        |value, _| match present_text(value) {
            Some(text) => alpha_numeric_pattern().is_match(&text),
            None => true,
        },
    )
}

/// Fails when a present value is not parseable by [`url::Url`].
pub fn url() -> Rule {
    Rule::check("url", "Please enter a valid URL", |value, _| {
        match present_text(value) {
            Some(text) => ::url::Url::parse(&text).is_ok(),
            None => true,
        }
    })
}

/// Fails when nothing is selected: unset, empty, or the
/// [`UNSELECTED_OPTION`] sentinel. A non-empty options list additionally
/// requires membership.
pub fn dropdown<I>(options: I) -> Rule
where
    I: IntoIterator,
    I::Item: Into<String>,
{
    let options: Vec<String> = options.into_iter().map(Into::into).collect();
    Rule::check("dropdown", "Please select an option", move |value, _| {
        if value.is_empty() {
            return false;
        }
        let text = value.to_string();
        if text == UNSELECTED_OPTION {
            return false;
        }
        options.is_empty() || options.iter().any(|option| option == &text)
    })
}

/// Fails when a present value is not numeric.
pub fn number() -> Rule {
    Rule::check("number", "Must be a number", |value, _| {
        value.is_empty() || value.as_decimal().is_some()
    })
}

/// Fails when the value is non-empty, numeric, and below `min`. Non-numeric
/// and empty values pass; compose with [`number`] or [`required`].
pub fn min_value_allowed(min: impl Into<Decimal>) -> Rule {
    let min = min.into();
    Rule::check(
        "min_value_allowed",
        format!("Must be at least {min}"),
        move |value, _| value.as_decimal().is_none_or(|n| n >= min),
    )
}

/// Fails when the value is non-empty, numeric, and above `max`.
pub fn max_value_allowed(max: impl Into<Decimal>) -> Rule {
    let max = max.into();
    Rule::check(
        "max_value_allowed",
        format!("Must be no more than {max}"),
        move |value, _| value.as_decimal().is_none_or(|n| n <= max),
    )
}

/// Fails when a present value is not a parseable date (RFC 3339,
/// `%Y-%m-%d %H:%M:%S`, `%Y-%m-%d`, or `%m/%d/%Y`).
pub fn date() -> Rule {
    Rule::check("date", "Please enter a valid date", |value, _| {
        match present_text(value) {
            Some(text) => parse_date(&text).is_some(),
            None => true,
        }
    })
}

/// Fails when a present value parses to an instant at or before now, or
/// does not parse at all.
pub fn future_date() -> Rule {
    Rule::check("future_date", "Date must be in the future", |value, _| {
        match present_text(value) {
            Some(text) => parse_date(&text).is_some_and(|instant| instant > Utc::now()),
            None => true,
        }
    })
}

/// Fails when the value differs from `all_values[other]` under strict
/// equality.
pub fn matches_field(other: impl Into<String>) -> Rule {
    let other = other.into();
    Rule::check("matches_field", "Fields do not match", move |value, all_values| {
        value == all_values.get(&other).unwrap_or(&Value::Null)
    })
}

/// Fails when `all_values[other]` equals `expected` and the field's own
/// value is falsy.
pub fn required_if(other: impl Into<String>, expected: impl Into<Value>) -> Rule {
    let other = other.into();
    let expected = expected.into();
    Rule::check(
        "required_if",
        "This field is required",
        move |value, all_values| {
            let triggered = all_values.get(&other).unwrap_or(&Value::Null) == &expected;
            !(triggered && value.is_falsy())
        },
    )
}

/// Fails when the value strictly equals `all_values[other]`.
pub fn different_from(other: impl Into<String>) -> Rule {
    let other = other.into();
    Rule::check(
        "different_from",
        "Values must be different",
        move |value, all_values| value != all_values.get(&other).unwrap_or(&Value::Null),
    )
}

/// Fails unless the value is exactly `true` or exactly `false`.
pub fn boolean() -> Rule {
    Rule::check("boolean", "Must be true or false", |value, _| {
        matches!(value, Value::Bool(_))
    })
}

/// Fails when the caller-supplied predicate returns false.
pub fn custom<F>(predicate: F) -> Rule
where
    F: Fn(&Value, &ValueMap) -> bool + Send + Sync + 'static,
{
    Rule::check("custom", "Invalid value", predicate)
}

/// Asynchronous form of [`custom`], for predicates that suspend (e.g. a
/// remote lookup).
pub fn custom_async<F, Fut>(predicate: F) -> Rule
where
    F: Fn(Value, ValueMap) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = bool> + Send + 'static,
{
    Rule::check_async("custom", "Invalid value", predicate)
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::executor::block_on;

    fn eval(rule: &Rule, value: Value) -> Option<String> {
        let all_values = ValueMap::new();
        block_on(rule.evaluate(&value, &all_values))
    }

    fn eval_with(rule: &Rule, value: Value, all_values: &ValueMap) -> Option<String> {
        block_on(rule.evaluate(&value, all_values))
    }

    #[test]
    fn required_fails_only_on_unset_null_and_empty_text() {
        let rule = required();
        assert!(eval(&rule, Value::Null).is_some());
        assert!(eval(&rule, Value::text("")).is_some());
        assert!(eval(&rule, Value::Bool(false)).is_none());
        assert!(eval(&rule, Value::from(0i64)).is_none());
        assert!(eval(&rule, Value::text("x")).is_none());
    }

    #[test]
    fn email_requires_local_domain_and_tld() {
        let rule = email();
        assert!(eval(&rule, Value::text("user@example.com")).is_none());
        assert!(eval(&rule, Value::text("user+tag@sub.example.org")).is_none());
        assert!(eval(&rule, Value::text("not-an-email")).is_some());
        assert!(eval(&rule, Value::text("user@example")).is_some());
        assert!(eval(&rule, Value::text("@example.com")).is_some());
        assert!(eval(&rule, Value::text("a b@example.com")).is_some());
    }

    #[test]
    fn email_passes_when_empty() {
        assert!(eval(&email(), Value::text("")).is_none());
        assert!(eval(&email(), Value::Null).is_none());
    }

    #[test]
    fn length_bounds_apply_to_present_text_only() {
        let min = min_length(3);
        assert!(eval(&min, Value::text("ab")).is_some());
        assert!(eval(&min, Value::text("abc")).is_none());
        assert!(eval(&min, Value::text("")).is_none());
        assert!(eval(&min, Value::from(1i64)).is_none());

        let max = max_length(3);
        assert!(eval(&max, Value::text("abcd")).is_some());
        assert!(eval(&max, Value::text("abc")).is_none());
        assert!(eval(&max, Value::Null).is_none());
    }

    #[test]
    fn length_counts_characters_not_bytes() {
        assert!(eval(&min_length(4), Value::text("café")).is_none());
        assert!(eval(&max_length(4), Value::text("café")).is_none());
    }

    #[test]
    fn pattern_checks_present_values() {
        let rule = pattern(Regex::new(r"^\d{5}$").expect("test pattern"));
        assert!(eval(&rule, Value::text("12345")).is_none());
        assert!(eval(&rule, Value::text("1234")).is_some());
        assert!(eval(&rule, Value::text("")).is_none());
    }

    #[test]
    fn strong_password_requires_all_character_classes() {
        let rule = strong_password();
        assert!(eval(&rule, Value::text("Aa1!aaaa")).is_none());
        assert!(eval(&rule, Value::text("")).is_none());
        assert!(eval(&rule, Value::text("Aa1!aaa")).is_some()); // 7 chars
        assert!(eval(&rule, Value::text("aa1!aaaa")).is_some()); // no uppercase
        assert!(eval(&rule, Value::text("AA1!AAAA")).is_some()); // no lowercase
        assert!(eval(&rule, Value::text("Aaa!aaaa")).is_some()); // no digit
        assert!(eval(&rule, Value::text("Aa1aaaaa")).is_some()); // no symbol
    }

    #[test]
    fn alpha_rules_reject_out_of_set_characters() {
        assert!(eval(&alpha(), Value::text("abcDEF")).is_none());
        assert!(eval(&alpha(), Value::text("abc1")).is_some());
        assert!(eval(&alpha(), Value::text("")).is_none());

        assert!(eval(&alpha_numeric(), Value::text("abc123")).is_none());
        assert!(eval(&alpha_numeric(), Value::text("abc 123")).is_some());
    }

    #[test]
    fn url_accepts_parseable_urls_only() {
        let rule = url();
        assert!(eval(&rule, Value::text("https://example.com/path?q=1")).is_none());
        assert!(eval(&rule, Value::text("not a url")).is_some());
        assert!(eval(&rule, Value::Null).is_none());
    }

    #[test]
    fn dropdown_rejects_the_unselected_sentinel() {
        let rule = dropdown::<[&str; 0]>([]);
        assert!(eval(&rule, Value::text(UNSELECTED_OPTION)).is_some());
        assert!(eval(&rule, Value::text("")).is_some());
        assert!(eval(&rule, Value::Null).is_some());
        assert!(eval(&rule, Value::text("anything")).is_none());
    }

    #[test]
    fn dropdown_enforces_membership_when_options_are_supplied() {
        let rule = dropdown(["red", "green"]);
        assert!(eval(&rule, Value::text("red")).is_none());
        assert!(eval(&rule, Value::text("blue")).is_some());
    }

    #[test]
    fn number_accepts_numeric_values_and_numeric_text() {
        let rule = number();
        assert!(eval(&rule, Value::from(3i64)).is_none());
        assert!(eval(&rule, Value::text("3.25")).is_none());
        assert!(eval(&rule, Value::text("abc")).is_some());
        assert!(eval(&rule, Value::Bool(true)).is_some());
        assert!(eval(&rule, Value::text("")).is_none());
    }

    #[test]
    fn value_bounds_ignore_non_numeric_values() {
        let min = min_value_allowed(10i64);
        assert!(eval(&min, Value::from(9i64)).is_some());
        assert!(eval(&min, Value::from(10i64)).is_none());
        assert!(eval(&min, Value::text("abc")).is_none());
        assert!(eval(&min, Value::Null).is_none());

        let max = max_value_allowed(10i64);
        assert!(eval(&max, Value::text("11")).is_some());
        assert!(eval(&max, Value::text("10")).is_none());
    }

    #[test]
    fn date_parses_the_supported_forms() {
        let rule = date();
        assert!(eval(&rule, Value::text("2031-01-15")).is_none());
        assert!(eval(&rule, Value::text("2031-01-15 10:30:00")).is_none());
        assert!(eval(&rule, Value::text("2031-01-15T10:30:00Z")).is_none());
        assert!(eval(&rule, Value::text("01/15/2031")).is_none());
        assert!(eval(&rule, Value::text("not a date")).is_some());
        assert!(eval(&rule, Value::text("")).is_none());
    }

    #[test]
    fn future_date_rejects_past_instants() {
        let rule = future_date();
        assert!(eval(&rule, Value::text("2001-01-01")).is_some());
        assert!(eval(&rule, Value::text("2999-01-01")).is_none());
        assert!(eval(&rule, Value::text("garbage")).is_some());
        assert!(eval(&rule, Value::Null).is_none());
    }

    #[test]
    fn matches_field_uses_strict_equality() {
        let rule = matches_field("password");
        let mut all_values = ValueMap::new();
        all_values.insert("password".to_string(), Value::text("abc"));
        assert!(eval_with(&rule, Value::text("abc"), &all_values).is_none());
        assert!(eval_with(&rule, Value::text("abcd"), &all_values).is_some());
        // Both unset compare equal.
        assert!(eval_with(&rule, Value::Null, &ValueMap::new()).is_none());
    }

    #[test]
    fn required_if_triggers_on_the_expected_value() {
        let rule = required_if("has_license", true);
        let mut all_values = ValueMap::new();
        all_values.insert("has_license".to_string(), Value::Bool(true));
        assert!(eval_with(&rule, Value::text(""), &all_values).is_some());
        assert!(eval_with(&rule, Value::text("B123"), &all_values).is_none());

        all_values.insert("has_license".to_string(), Value::Bool(false));
        assert!(eval_with(&rule, Value::text(""), &all_values).is_none());
    }

    #[test]
    fn different_from_rejects_equal_values() {
        let rule = different_from("old_password");
        let mut all_values = ValueMap::new();
        all_values.insert("old_password".to_string(), Value::text("secret"));
        assert!(eval_with(&rule, Value::text("secret"), &all_values).is_some());
        assert!(eval_with(&rule, Value::text("other"), &all_values).is_none());
    }

    #[test]
    fn boolean_accepts_exactly_bool_values() {
        let rule = boolean();
        assert!(eval(&rule, Value::Bool(true)).is_none());
        assert!(eval(&rule, Value::Bool(false)).is_none());
        assert!(eval(&rule, Value::text("true")).is_some());
        assert!(eval(&rule, Value::Null).is_some());
    }

    #[test]
    fn custom_rules_report_the_configured_message() {
        let rule = custom(|value, _| value.as_text() == Some("ok")).with_message("not ok");
        assert_eq!(eval(&rule, Value::text("nope")), Some("not ok".to_string()));
        assert_eq!(eval(&rule, Value::text("ok")), None);
    }

    #[test]
    fn custom_async_awaits_the_predicate() {
        let rule = custom_async(|value, _| async move { !value.is_falsy() });
        assert!(eval(&rule, Value::Bool(true)).is_none());
        assert!(eval(&rule, Value::Bool(false)).is_some());
    }
}
