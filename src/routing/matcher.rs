//! Handler matching rules
//!
//! Pure comparison functions used by the router's linear scans.

/// Text handler matching mode
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TextMatch {
    /// Exact, case-sensitive
    Exact,
    /// Exact, ASCII case-insensitive
    IgnoreCase,
}

/// Check a parsed command token against a registered command name
pub fn match_command(registered: &str, command: &str) -> bool {
    registered.eq_ignore_ascii_case(command)
}

/// Check message text against a registered text pattern
pub fn match_text(pattern: &str, mode: TextMatch, text: &str) -> bool {
    match mode {
        TextMatch::Exact => text == pattern,
        TextMatch::IgnoreCase => text.eq_ignore_ascii_case(pattern),
    }
}

/// Find the first item in `routes` whose key satisfies `predicate`
pub fn first_match<'a, T>(routes: &'a [T], predicate: impl Fn(&T) -> bool) -> Option<&'a T> {
    routes.iter().find(|route| predicate(route))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_match_command_case_insensitive() {
        assert!(match_command("/Start", "/start"));
        assert!(match_command("/start", "/start"));
        assert!(!match_command("/start", "/stop"));
        assert!(!match_command("/start", "/starting"));
    }

    #[test]
    fn test_match_text_exact() {
        assert!(match_text("Hello", TextMatch::Exact, "Hello"));
        assert!(!match_text("Hello", TextMatch::Exact, "hello"));
        assert!(!match_text("Hello", TextMatch::Exact, "Hello there"));
    }

    #[test]
    fn test_match_text_ignore_case() {
        assert!(match_text("Hello", TextMatch::IgnoreCase, "hELLO"));
        assert!(!match_text("Hello", TextMatch::IgnoreCase, "Hello!"));
    }

    #[test]
    fn test_first_match_order() {
        let routes = vec!["a", "ab", "abc"];
        let result = first_match(&routes, |r| r.starts_with("ab"));
        assert_eq!(result, Some(&"ab"));
        assert_eq!(first_match(&routes, |r| r.is_empty()), None);
    }
}
