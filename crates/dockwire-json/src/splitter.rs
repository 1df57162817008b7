use bytes::{Buf, Bytes, BytesMut};
use tracing::{debug, trace};

use crate::error::{JsonError, Result};

/// Incremental splitter for a stream of concatenated JSON values.
///
/// Engines write progress and event records back to back with arbitrary
/// whitespace and no separator. The splitter tracks bracket depth outside
/// of string literals and emits a unit each time depth returns to zero.
///
/// Quote state flips on `"` unless the byte immediately before it was a
/// backslash. That one-byte lookback misreads a string ending in an escaped
/// backslash (`"x\\"`) as still open.
#[derive(Debug, Default)]
pub struct JsonSplitter {
    unit: BytesMut,
    in_quote: bool,
    level: i64,
    prev: Option<u8>,
    max_unit_size: Option<usize>,
}

impl JsonSplitter {
    /// Create a splitter with no unit size limit.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a splitter that rejects units longer than `max` bytes.
    pub fn with_max_unit_size(max: Option<usize>) -> Self {
        Self {
            max_unit_size: max,
            ..Self::default()
        }
    }

    /// Feed one byte. Returns the unit text when this byte completes one.
    pub fn push(&mut self, byte: u8) -> Result<Option<Bytes>> {
        let prev = self.prev.replace(byte);

        if byte == b'"' && prev != Some(b'\\') {
            self.in_quote = !self.in_quote;
            self.append(byte)?;
            return Ok(None);
        }

        if self.in_quote {
            self.append(byte)?;
            return Ok(None);
        }

        match byte {
            b' ' | b'\r' | b'\n' | b'\t' => Ok(None),
            b'{' | b'[' => {
                self.level += 1;
                self.append(byte)?;
                Ok(None)
            }
            b'}' | b']' => {
                self.level -= 1;
                self.append(byte)?;
                if self.level == 0 {
                    Ok(Some(self.take_unit()))
                } else {
                    Ok(None)
                }
            }
            _ => {
                self.append(byte)?;
                Ok(None)
            }
        }
    }

    /// Consume bytes from `src` until a unit completes or `src` is empty.
    ///
    /// Bytes are removed from `src` as they are processed; a partial unit is
    /// carried inside the splitter until more input arrives.
    pub fn split(&mut self, src: &mut BytesMut) -> Result<Option<Bytes>> {
        let mut consumed = 0usize;
        let mut outcome = Ok(None);

        for &byte in src.iter() {
            consumed += 1;
            match self.push(byte) {
                Ok(None) => {}
                other => {
                    outcome = other;
                    break;
                }
            }
        }

        src.advance(consumed);
        outcome
    }

    /// Signal end of input. Any unbalanced unit is dropped.
    ///
    /// Returns the number of bytes discarded.
    pub fn finish(&mut self) -> usize {
        let pending = self.unit.len();
        if pending > 0 {
            debug!(
                pending,
                level = self.level,
                in_quote = self.in_quote,
                "discarding unterminated json unit at end of stream"
            );
        }
        self.reset();
        pending
    }

    /// Bytes buffered for the unit in progress.
    pub fn pending_len(&self) -> usize {
        self.unit.len()
    }

    fn append(&mut self, byte: u8) -> Result<()> {
        if let Some(max) = self.max_unit_size {
            if self.unit.len() >= max {
                let size = self.unit.len() + 1;
                self.reset();
                return Err(JsonError::UnitTooLarge { size, max });
            }
        }
        self.unit.extend_from_slice(&[byte]);
        Ok(())
    }

    fn take_unit(&mut self) -> Bytes {
        let unit = self.unit.split().freeze();
        trace!(len = unit.len(), "json unit complete");
        self.reset();
        unit
    }

    fn reset(&mut self) {
        self.unit.clear();
        self.in_quote = false;
        self.level = 0;
        self.prev = None;
    }
}

/// Split a complete buffer into unit texts, dropping any unterminated tail.
pub fn split_all(input: &[u8]) -> Result<Vec<Bytes>> {
    let mut splitter = JsonSplitter::new();
    let mut units = Vec::new();
    for &byte in input {
        if let Some(unit) = splitter.push(byte)? {
            units.push(unit);
        }
    }
    splitter.finish();
    Ok(units)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn texts(input: &str) -> Vec<String> {
        split_all(input.as_bytes())
            .unwrap()
            .into_iter()
            .map(|unit| String::from_utf8(unit.to_vec()).unwrap())
            .collect()
    }

    #[test]
    fn back_to_back_objects() {
        assert_eq!(texts(r#"{}{"abc":"def"}"#), vec!["{}", r#"{"abc":"def"}"#]);
    }

    #[test]
    fn escaped_quotes_stay_inside_string() {
        assert_eq!(
            texts(r#"{"test": "abc\"\""}"#),
            vec![r#"{"test":"abc\"\""}"#]
        );
    }

    #[test]
    fn brackets_inside_strings_are_ignored() {
        assert_eq!(
            texts(r#"{"test": "abc\"{{-}"}"#),
            vec![r#"{"test":"abc\"{{-}"}"#]
        );
    }

    #[test]
    fn unterminated_unit_is_dropped() {
        assert!(texts(r#"{"a":1"#).is_empty());
        assert!(texts("").is_empty());
    }

    #[test]
    fn whitespace_outside_strings_is_elided() {
        assert_eq!(
            texts("\r\n {\n\t\"status\" : \"Pulling fs layer\" ,\n \"id\": \"a1\" }\n\n[1, 2]\n"),
            vec![r#"{"status":"Pulling fs layer","id":"a1"}"#, "[1,2]"]
        );
    }

    #[test]
    fn nested_values_complete_at_outer_level() {
        assert_eq!(
            texts(r#"{"aux":{"ID":"sha256:1"},"list":[[],{}]} {"x":[]}"#),
            vec![r#"{"aux":{"ID":"sha256:1"},"list":[[],{}]}"#, r#"{"x":[]}"#]
        );
    }

    #[test]
    fn trailing_escaped_backslash_keeps_string_open() {
        // The closing quote follows a backslash, so the string never closes
        // and the remaining input is swallowed into an unterminated unit.
        assert!(texts(r#"{"a":"x\\"}{"b":1}"#).is_empty());
    }

    #[test]
    fn split_consumes_only_through_unit_end() {
        let mut splitter = JsonSplitter::new();
        let mut src = BytesMut::from(&br#"{"a":1} {"b""#[..]);

        let unit = splitter.split(&mut src).unwrap().unwrap();
        assert_eq!(unit.as_ref(), br#"{"a":1}"#);
        assert_eq!(src.as_ref(), br#" {"b""#);

        assert!(splitter.split(&mut src).unwrap().is_none());
        assert!(src.is_empty());
        assert_eq!(splitter.pending_len(), 4);

        let mut rest = BytesMut::from(&b":2}"[..]);
        let unit = splitter.split(&mut rest).unwrap().unwrap();
        assert_eq!(unit.as_ref(), br#"{"b":2}"#);
    }

    #[test]
    fn finish_reports_discarded_bytes() {
        let mut splitter = JsonSplitter::new();
        let mut src = BytesMut::from(&br#"{"partial":"#[..]);
        assert!(splitter.split(&mut src).unwrap().is_none());
        assert_eq!(splitter.finish(), 11);
        assert_eq!(splitter.pending_len(), 0);
    }

    #[test]
    fn state_resets_between_units() {
        let mut splitter = JsonSplitter::new();
        let mut src = BytesMut::from(&br#"{"k":"\\"}"#[..]);
        // Quote never closes, so no unit yet.
        assert!(splitter.split(&mut src).unwrap().is_none());
        splitter.finish();

        let mut src = BytesMut::from(&br#"{"k":"v"}"#[..]);
        let unit = splitter.split(&mut src).unwrap().unwrap();
        assert_eq!(unit.as_ref(), br#"{"k":"v"}"#);
    }

    #[test]
    fn unit_size_limit() {
        let mut splitter = JsonSplitter::with_max_unit_size(Some(8));
        let mut src = BytesMut::from(&br#"{"long":"value"}{}"#[..]);

        let err = splitter.split(&mut src).unwrap_err();
        assert!(matches!(err, JsonError::UnitTooLarge { size: 9, max: 8 }));
        assert_eq!(splitter.pending_len(), 0);
    }
}
