//! Centralized message formatting utilities.
//!
//! All player-facing text goes through this module so that placeholder
//! substitution and legacy `&` color codes behave the same everywhere.

/// Section sign used by the client to introduce a formatting code.
pub const SECTION_SIGN: char = '§';

/// Characters accepted after `&` as a color or style code.
const COLOR_CODES: &str = "0123456789abcdefklmnorABCDEFKLMNOR";

/// Replace `{name}` placeholders with the matching value.
///
/// Placeholders without a replacement are left untouched.
///
/// # Examples
/// ```
/// use regionflags_types::formatting::apply_replacements;
/// assert_eq!(
///     apply_replacements("Min: {required}, you: {current}", &[("required", "5"), ("current", "3")]),
///     "Min: 5, you: 3"
/// );
/// assert_eq!(apply_replacements("{unknown}", &[("required", "5")]), "{unknown}");
/// ```
pub fn apply_replacements(template: &str, replacements: &[(&str, &str)]) -> String {
    let mut message = template.to_string();
    for (name, value) in replacements {
        message = message.replace(&format!("{{{name}}}"), value);
    }
    message
}

/// Translate `&`-prefixed color codes into section-sign codes.
///
/// Only valid codes are translated; a lone `&` or `&` followed by anything
/// else is kept as typed. Codes are lower-cased.
///
/// # Examples
/// ```
/// use regionflags_types::formatting::translate_color_codes;
/// assert_eq!(translate_color_codes("&cDenied &7(min 5)"), "§cDenied §7(min 5)");
/// assert_eq!(translate_color_codes("&LBold"), "§lBold");
/// assert_eq!(translate_color_codes("fish & chips"), "fish & chips");
/// ```
pub fn translate_color_codes(s: &str) -> String {
    let mut result = String::with_capacity(s.len());
    let mut chars = s.chars().peekable();
    while let Some(c) = chars.next() {
        if c == '&'
            && let Some(&code) = chars.peek()
            && COLOR_CODES.contains(code)
        {
            result.push(SECTION_SIGN);
            result.push(code.to_ascii_lowercase());
            chars.next();
            continue;
        }
        result.push(c);
    }
    result
}

/// Remove section-sign formatting codes, leaving plain text.
///
/// # Examples
/// ```
/// use regionflags_types::formatting::strip_formatting;
/// assert_eq!(strip_formatting("§cDenied §7(min 5)"), "Denied (min 5)");
/// ```
pub fn strip_formatting(s: &str) -> String {
    let mut result = String::with_capacity(s.len());
    let mut chars = s.chars();
    while let Some(c) = chars.next() {
        if c == SECTION_SIGN {
            chars.next();
            continue;
        }
        result.push(c);
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn replacements_apply_every_occurrence() {
        let out = apply_replacements("{a}-{a}-{b}", &[("a", "1"), ("b", "2")]);
        assert_eq!(out, "1-1-2");
    }

    #[test]
    fn trailing_ampersand_is_kept() {
        assert_eq!(translate_color_codes("done &"), "done &");
    }

    #[test]
    fn translate_then_strip_yields_plain_text() {
        let colored = translate_color_codes("&cYour level (3) is too low. &7Min: 5");
        assert_eq!(strip_formatting(&colored), "Your level (3) is too low. Min: 5");
    }
}
