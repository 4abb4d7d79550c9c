//! Masking of personal data before it reaches logs.

use crate::context::TrustContext;
use crate::logging::get_logger;

const MASK_CHAR: char = '*';
const FALLBACK_TEXT: &str = "*NA*";

/// Mask an email address, keeping the first and last character of the user
/// part and of the first domain label.
///
/// `abc@gmail.com` becomes `a*c@g***l.com`. Blank values and values without
/// an `@` become `*NA*`; a part too short to mask is replaced by `*NA*`.
#[must_use]
pub fn mask_email(ctx: Option<&dyn TrustContext>, value: &str) -> String {
    let logger = get_logger(ctx).with_field("component", "mask");
    if value.trim().is_empty() {
        logger.error("cannot mask empty string, returning fallback text");
        return FALLBACK_TEXT.to_string();
    }
    let Some((user, domain)) = value.split_once('@') else {
        logger.error("value is not an email address, returning fallback text");
        return FALLBACK_TEXT.to_string();
    };

    let (label, suffix) = domain.split_once('.').map_or((domain, None), |(l, s)| (l, Some(s)));
    let mut masked = format!("{}@{}", mask_string(user, 1, 1), mask_string(label, 1, 1));
    if let Some(suffix) = suffix {
        masked.push('.');
        masked.push_str(suffix);
    }
    masked
}

fn mask_string(target: &str, keep_first: usize, keep_last: usize) -> String {
    let chars: Vec<char> = target.chars().collect();
    if keep_first + keep_last > chars.len() {
        return FALLBACK_TEXT.to_string();
    }
    let hidden = chars.len() - keep_first - keep_last;
    chars[..keep_first]
        .iter()
        .copied()
        .chain(std::iter::repeat_n(MASK_CHAR, hidden))
        .chain(chars[chars.len() - keep_last..].iter().copied())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_mask_email() {
        assert_eq!(mask_email(None, "abc@gmail.com"), "a*c@g***l.com");
        assert_eq!(mask_email(None, "gobinath@yahoo.co.in"), "g******h@y***o.co.in");
    }

    #[test]
    fn test_fallbacks() {
        assert_eq!(mask_email(None, ""), FALLBACK_TEXT);
        assert_eq!(mask_email(None, "   "), FALLBACK_TEXT);
        assert_eq!(mask_email(None, "no-at-sign"), FALLBACK_TEXT);
        assert_eq!(mask_email(None, "a@gmail.com"), "*NA*@g***l.com");
    }

    #[test]
    fn test_domain_without_suffix() {
        assert_eq!(mask_email(None, "abc@localhost"), "a*c@l*******t");
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(100))]

        #[test]
        fn prop_mask_keeps_length_and_ends(user in "[a-z]{2,12}", label in "[a-z]{2,12}") {
            let masked = mask_email(None, &format!("{user}@{label}.com"));
            let (masked_user, rest) = masked.split_once('@').unwrap();
            prop_assert_eq!(masked_user.len(), user.len());
            prop_assert!(masked_user.starts_with(&user[..1]));
            prop_assert!(masked_user.ends_with(&user[user.len() - 1..]));
            prop_assert!(rest.ends_with(".com"));
        }
    }
}
