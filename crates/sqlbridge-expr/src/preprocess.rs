//! Column-shorthand preprocessing.
//!
//! Mapping expressions may refer to row columns with a leading dot:
//! `.user_id` is shorthand for `cols["user_id"]`. The rewrite runs before
//! compilation and must not touch dots that continue an identifier
//! (`foo.bar`), dots inside string or character literals, or leading-dot
//! decimal literals (`.5`).

fn is_ident_char(c: u8) -> bool {
    c.is_ascii_alphanumeric() || c == b'_'
}

/// Expand `.name` column shorthand into `cols["name"]` map accesses.
///
/// The scan tracks string and character literals so their contents are
/// copied verbatim, and only rewrites a dot whose preceding character is
/// not part of an identifier.
#[must_use]
pub fn preprocess(expr: &str) -> String {
    let bytes = expr.as_bytes();
    let mut out: Vec<u8> = Vec::with_capacity(bytes.len() + 16);
    let mut i = 0;

    #[derive(PartialEq)]
    enum State {
        Normal,
        DoubleQuoted,
        SingleQuoted,
    }
    let mut state = State::Normal;

    while i < bytes.len() {
        let c = bytes[i];
        match state {
            State::DoubleQuoted => {
                out.push(c);
                if c == b'\\' && i + 1 < bytes.len() {
                    out.push(bytes[i + 1]);
                    i += 1;
                } else if c == b'"' {
                    state = State::Normal;
                }
            }
            State::SingleQuoted => {
                out.push(c);
                if c == b'\\' && i + 1 < bytes.len() {
                    out.push(bytes[i + 1]);
                    i += 1;
                } else if c == b'\'' {
                    state = State::Normal;
                }
            }
            State::Normal => {
                if c == b'"' {
                    out.push(c);
                    state = State::DoubleQuoted;
                } else if c == b'\'' {
                    out.push(c);
                    state = State::SingleQuoted;
                } else if c == b'.'
                    && (i == 0 || !is_ident_char(bytes[i - 1]))
                    && i + 1 < bytes.len()
                    && is_ident_char(bytes[i + 1])
                {
                    let start = i + 1;
                    let mut end = start;
                    while end < bytes.len() && is_ident_char(bytes[end]) {
                        end += 1;
                    }
                    let name = &bytes[start..end];
                    if name.iter().all(u8::is_ascii_digit) {
                        // A leading-dot decimal literal such as `.5`.
                        out.extend_from_slice(&bytes[i..end]);
                    } else {
                        out.extend_from_slice(b"cols[\"");
                        out.extend_from_slice(name);
                        out.extend_from_slice(b"\"]");
                    }
                    i = end;
                    continue;
                } else {
                    out.push(c);
                }
            }
        }
        i += 1;
    }

    String::from_utf8_lossy(&out).into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_simple_column() {
        assert_eq!(preprocess(".user_id"), "cols[\"user_id\"]");
    }

    #[test]
    fn test_column_in_comparison() {
        assert_eq!(
            preprocess(".role_name == \"Admin\""),
            "cols[\"role_name\"] == \"Admin\""
        );
    }

    #[test]
    fn test_member_access_not_rewritten() {
        assert_eq!(preprocess("foo.bar"), "foo.bar");
        assert_eq!(preprocess("resource.DisplayName"), "resource.DisplayName");
    }

    #[test]
    fn test_rewrite_inside_call() {
        assert_eq!(
            preprocess("phpDeserializeStringArray(.role_name)[0]"),
            "phpDeserializeStringArray(cols[\"role_name\"])[0]"
        );
    }

    #[test]
    fn test_multiple_columns() {
        assert_eq!(
            preprocess(".first + \" \" + .last"),
            "cols[\"first\"] + \" \" + cols[\"last\"]"
        );
    }

    #[test]
    fn test_string_literal_untouched() {
        assert_eq!(preprocess("\".user_id\""), "\".user_id\"");
        assert_eq!(
            preprocess("\"a.b\" + .c"),
            "\"a.b\" + cols[\"c\"]"
        );
    }

    #[test]
    fn test_escaped_quote_in_string() {
        assert_eq!(
            preprocess("\"say \\\".hi\\\"\" + .x"),
            "\"say \\\".hi\\\"\" + cols[\"x\"]"
        );
    }

    #[test]
    fn test_decimal_literal_untouched() {
        assert_eq!(preprocess(".5 * 2"), ".5 * 2");
        assert_eq!(preprocess("1.5 + .25"), "1.5 + .25");
    }

    #[test]
    fn test_rewrite_after_operator() {
        assert_eq!(preprocess("a + .b"), "a + cols[\"b\"]");
        assert_eq!(preprocess("(.a)"), "(cols[\"a\"])");
    }

    #[test]
    fn test_trailing_dot_untouched() {
        assert_eq!(preprocess("x."), "x.");
        assert_eq!(preprocess("."), ".");
    }
}
