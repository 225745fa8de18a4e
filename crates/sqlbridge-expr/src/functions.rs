//! Domain functions registered into the expression engine.
//!
//! Configurations call these by their registered (camelCase) names, e.g.
//! `toUpper(.name)` or `phpDeserializeStringArray(.role_names)[0]`.

use rhai::{Array, Blob, Dynamic, Engine, EvalAltResult};

/// Register all domain functions on an engine.
pub(crate) fn register(engine: &mut Engine) {
    engine.register_fn("toUpper", to_upper);
    engine.register_fn("toLower", to_lower);
    engine.register_fn("titleCase", title_case);
    engine.register_fn("phpDeserializeStringArray", php_deserialize_str);
    engine.register_fn("phpDeserializeStringArray", php_deserialize_blob);
}

fn to_upper(s: &str) -> String {
    s.to_uppercase()
}

fn to_lower(s: &str) -> String {
    s.to_lowercase()
}

fn title_case(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut at_word_start = true;
    for c in s.chars() {
        if c.is_whitespace() {
            at_word_start = true;
            out.push(c);
        } else if at_word_start {
            out.extend(c.to_uppercase());
            at_word_start = false;
        } else {
            out.extend(c.to_lowercase());
        }
    }
    out
}

fn php_deserialize_str(s: &str) -> Result<Array, Box<EvalAltResult>> {
    php_array(s.as_bytes())
}

fn php_deserialize_blob(b: Blob) -> Result<Array, Box<EvalAltResult>> {
    php_array(&b)
}

fn php_array(input: &[u8]) -> Result<Array, Box<EvalAltResult>> {
    parse_php_string_array(input)
        .map(|values| values.into_iter().map(Dynamic::from).collect())
        .map_err(|e| format!("phpDeserializeStringArray: {e}").into())
}

/// Parse a PHP-serialized array of strings, e.g.
/// `a:2:{i:0;s:5:"admin";i:1;s:4:"user";}`.
///
/// String lengths are byte lengths, so values may contain any byte
/// sequence including quotes. Only integer-keyed string entries are
/// accepted.
pub fn parse_php_string_array(input: &[u8]) -> Result<Vec<String>, String> {
    let mut p = Parser { input, pos: 0 };

    p.expect(b"a:")?;
    let count = p.read_usize()?;
    p.expect(b":{")?;

    let mut values = Vec::with_capacity(count);
    for _ in 0..count {
        p.expect(b"i:")?;
        let _index = p.read_usize()?;
        p.expect(b";s:")?;
        let len = p.read_usize()?;
        p.expect(b":\"")?;
        let raw = p.take(len)?;
        p.expect(b"\";")?;
        values.push(String::from_utf8_lossy(raw).into_owned());
    }
    p.expect(b"}")?;

    if p.pos != p.input.len() {
        return Err(format!("trailing data at byte {}", p.pos));
    }

    Ok(values)
}

struct Parser<'a> {
    input: &'a [u8],
    pos: usize,
}

impl<'a> Parser<'a> {
    fn expect(&mut self, token: &[u8]) -> Result<(), String> {
        let end = self.pos + token.len();
        if self.input.len() < end || &self.input[self.pos..end] != token {
            return Err(format!(
                "expected '{}' at byte {}",
                String::from_utf8_lossy(token),
                self.pos
            ));
        }
        self.pos = end;
        Ok(())
    }

    fn read_usize(&mut self) -> Result<usize, String> {
        let start = self.pos;
        while self.pos < self.input.len() && self.input[self.pos].is_ascii_digit() {
            self.pos += 1;
        }
        if self.pos == start {
            return Err(format!("expected integer at byte {start}"));
        }
        std::str::from_utf8(&self.input[start..self.pos])
            .map_err(|e| e.to_string())?
            .parse()
            .map_err(|e| format!("invalid integer at byte {start}: {e}"))
    }

    fn take(&mut self, len: usize) -> Result<&'a [u8], String> {
        let end = self.pos + len;
        if self.input.len() < end {
            return Err(format!(
                "string of length {len} at byte {} overruns input",
                self.pos
            ));
        }
        let raw = &self.input[self.pos..end];
        self.pos = end;
        Ok(raw)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_title_case() {
        assert_eq!(title_case("one fish two fish"), "One Fish Two Fish");
        assert_eq!(title_case("ALREADY UPPER"), "Already Upper");
        assert_eq!(title_case(""), "");
        assert_eq!(title_case("x"), "X");
    }

    #[test]
    fn test_to_upper_lower() {
        assert_eq!(to_upper("hello"), "HELLO");
        assert_eq!(to_lower("HeLLo"), "hello");
    }

    #[test]
    fn test_php_array_basic() {
        let values =
            parse_php_string_array(b"a:2:{i:0;s:5:\"admin\";i:1;s:4:\"user\";}").unwrap();
        assert_eq!(values, vec!["admin".to_string(), "user".to_string()]);
    }

    #[test]
    fn test_php_array_empty() {
        let values = parse_php_string_array(b"a:0:{}").unwrap();
        assert!(values.is_empty());
    }

    #[test]
    fn test_php_array_value_with_quote() {
        // Lengths are byte counts, so quotes inside values parse cleanly.
        let values = parse_php_string_array(b"a:1:{i:0;s:4:\"a\"b\\\";}").unwrap();
        assert_eq!(values, vec!["a\"b\\".to_string()]);
    }

    #[test]
    fn test_php_array_malformed() {
        assert!(parse_php_string_array(b"a:1:{i:0;s:99:\"short\";}").is_err());
        assert!(parse_php_string_array(b"not serialized").is_err());
        assert!(parse_php_string_array(b"a:1:{i:0;s:1:\"x\";}extra").is_err());
        assert!(parse_php_string_array(b"a:1:{i:0;i:5;}").is_err());
    }
}
