//! Punctuator table, longest-match first.

/// Every C punctuator this front end recognizes, longest spellings first so a linear scan
/// picks the longest match. Includes digraphs (`<:`, `:>`, `<%`, `%>`, `%:`, `%:%:`).
pub const PUNCTUATORS: &[&str] = &[
    "%:%:", "...", "<<=", ">>=", "->", "++", "--", "<<", ">>", "<=", ">=", "==", "!=", "&&", "||",
    "*=", "/=", "%=", "+=", "-=", "&=", "^=", "|=", "##", "<:", ":>", "<%", "%>", "%:",
    "(", ")", "{", "}", "[", "]", ".", "&", "*", "+", "-", "~", "!", "/", "%", "<", ">", "^", "|",
    "?", ":", ";", "=", ",", "#",
];

/// Returns the longest punctuator spelling matching a prefix of `s`, if any.
pub fn match_longest(s: &str) -> Option<&'static str> {
    PUNCTUATORS.iter().find(|p| s.starts_with(**p)).copied()
}
