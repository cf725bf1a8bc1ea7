//! A structural JSON scanner that walks a document token by token while tracking byte offsets.
//!
//! The scanner only understands the structure of a document: where values begin and end,
//! where arrays and objects open and close. Decoding values is delegated to `serde_json`, which
//! receives the raw bytes of one value at a time, so memory use is bounded by the largest single
//! value rather than by the document.

use std::fmt::{Display, Formatter};
use std::io::BufRead;

use jsontab_error::{JsonTabError, JsonTabResult, jsontab_bail, jsontab_err};
use jsontab_io::{FileRange, InputStream, ReadAt};
use serde::de::IgnoredAny;
use serde_json::Value;

/// The kind of a JSON value, as determined by its first byte.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ValueKind {
    Object,
    Array,
    String,
    Number,
    Bool,
    Null,
}

impl ValueKind {
    fn from_lead(byte: u8) -> Option<Self> {
        match byte {
            b'{' => Some(Self::Object),
            b'[' => Some(Self::Array),
            b'"' => Some(Self::String),
            b'-' | b'0'..=b'9' => Some(Self::Number),
            b't' | b'f' => Some(Self::Bool),
            b'n' => Some(Self::Null),
            _ => None,
        }
    }

    pub fn of(value: &Value) -> Self {
        match value {
            Value::Null => Self::Null,
            Value::Bool(_) => Self::Bool,
            Value::Number(_) => Self::Number,
            Value::String(_) => Self::String,
            Value::Array(_) => Self::Array,
            Value::Object(_) => Self::Object,
        }
    }
}

impl Display for ValueKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Object => "object",
            Self::Array => "array",
            Self::String => "string",
            Self::Number => "number",
            Self::Bool => "boolean",
            Self::Null => "null",
        };
        f.write_str(name)
    }
}

fn is_whitespace(byte: u8) -> bool {
    matches!(byte, b' ' | b'\t' | b'\n' | b'\r')
}

fn is_atom_byte(byte: u8) -> bool {
    byte.is_ascii_alphanumeric() || matches!(byte, b'+' | b'-' | b'.')
}

fn describe(byte: u8) -> String {
    if byte.is_ascii_graphic() {
        format!("'{}'", char::from(byte))
    } else {
        format!("byte 0x{byte:02x}")
    }
}

/// A pull scanner over a JSON document held by a [`ReadAt`] source.
pub struct JsonScanner<R> {
    input: InputStream<R>,
    base_offset: u64,
    scratch: Vec<u8>,
}

impl<R: ReadAt> JsonScanner<R> {
    pub fn new(source: R) -> Self {
        Self {
            input: InputStream::new(source),
            base_offset: 0,
            scratch: Vec::new(),
        }
    }

    /// Report error offsets relative to `offset` instead of the start of the source.
    ///
    /// Used when the source is itself a window into a larger document.
    pub fn with_base_offset(mut self, offset: u64) -> Self {
        self.base_offset = offset;
        self
    }

    /// The offset of the next unread byte, relative to the start of the source.
    pub fn position(&self) -> u64 {
        self.input.position()
    }

    /// Move to `pos`. Fails if the source can no longer be positioned there.
    pub fn seek(&mut self, pos: u64) -> JsonTabResult<()> {
        Ok(self.input.seek_to(pos)?)
    }

    /// The kind of the next value, or `None` at the end of the input.
    pub fn peek_kind(&mut self) -> JsonTabResult<Option<ValueKind>> {
        self.skip_whitespace()?;
        match self.input.peek()? {
            None => Ok(None),
            Some(byte) => ValueKind::from_lead(byte)
                .map(Some)
                .ok_or_else(|| self.invalid(format!("unexpected {}", describe(byte)))),
        }
    }

    /// Consume the `[` opening an array, returning its offset.
    pub fn begin_array(&mut self) -> JsonTabResult<u64> {
        self.expect(b'[')
    }

    /// Consume the `{` opening an object, returning its offset.
    pub fn begin_object(&mut self) -> JsonTabResult<u64> {
        self.expect(b'{')
    }

    /// Advance to the next element of the current array.
    ///
    /// Returns `false` after consuming the closing `]`. `first` must be `true` for the first
    /// call after [`JsonScanner::begin_array`] and is maintained by this method.
    pub fn next_element(&mut self, first: &mut bool) -> JsonTabResult<bool> {
        self.skip_whitespace()?;
        match self.input.peek()? {
            None => Err(self.invalid("unterminated array")),
            Some(b']') => {
                self.input.consume(1);
                Ok(false)
            }
            Some(_) if *first => {
                *first = false;
                Ok(true)
            }
            Some(b',') => {
                self.input.consume(1);
                Ok(true)
            }
            Some(byte) => Err(self.invalid(format!(
                "expected ',' or ']' in array, found {}",
                describe(byte)
            ))),
        }
    }

    /// Advance to the next member of the current object, consuming its key and the `:`.
    ///
    /// Returns `None` after consuming the closing `}`.
    pub fn next_key(&mut self, first: &mut bool) -> JsonTabResult<Option<String>> {
        self.skip_whitespace()?;
        match self.input.peek()? {
            None => return Err(self.invalid("unterminated object")),
            Some(b'}') => {
                self.input.consume(1);
                return Ok(None);
            }
            Some(_) if *first => *first = false,
            Some(b',') => self.input.consume(1),
            Some(byte) => {
                return Err(self.invalid(format!(
                    "expected ',' or '}}' in object, found {}",
                    describe(byte)
                )));
            }
        }

        self.skip_whitespace()?;
        if self.input.peek()? != Some(b'"') {
            return Err(self.invalid("expected a string object key"));
        }
        let start = self.capture()?;
        let key = serde_json::from_slice::<String>(&self.scratch)
            .map_err(|err| self.invalid_at(start, err.to_string()))?;
        self.expect(b':')?;
        Ok(Some(key))
    }

    /// Read and decode the next value.
    pub fn read_value(&mut self) -> JsonTabResult<Value> {
        let start = self.capture()?;
        serde_json::from_slice::<Value>(&self.scratch)
            .map_err(|err| self.invalid_at(start, err.to_string()))
    }

    /// Validate and skip the next value, returning its kind and the bytes it spans.
    pub fn skip_value(&mut self) -> JsonTabResult<(ValueKind, FileRange)> {
        let start = self.capture()?;
        serde_json::from_slice::<IgnoredAny>(&self.scratch)
            .map_err(|err| self.invalid_at(start, err.to_string()))?;
        let kind = self
            .scratch
            .first()
            .copied()
            .and_then(ValueKind::from_lead)
            .ok_or_else(|| self.invalid_at(start, "empty value"))?;
        Ok((kind, FileRange::from_bounds(start, self.position())))
    }

    /// Check that nothing but whitespace follows the top-level value.
    pub fn finish(&mut self) -> JsonTabResult<()> {
        self.skip_whitespace()?;
        match self.input.peek()? {
            None => Ok(()),
            Some(byte) => Err(self.invalid(format!(
                "trailing {} after the top-level value",
                describe(byte)
            ))),
        }
    }

    fn skip_whitespace(&mut self) -> JsonTabResult<()> {
        loop {
            let buffer = self.input.fill_buf()?;
            if buffer.is_empty() {
                return Ok(());
            }
            let skipped = buffer.iter().take_while(|b| is_whitespace(**b)).count();
            let exhausted = skipped == buffer.len();
            self.input.consume(skipped);
            if !exhausted {
                return Ok(());
            }
        }
    }

    fn expect(&mut self, expected: u8) -> JsonTabResult<u64> {
        self.skip_whitespace()?;
        let offset = self.position();
        match self.input.next_byte()? {
            Some(byte) if byte == expected => Ok(offset),
            Some(byte) => Err(self.invalid_at(
                offset,
                format!("expected {}, found {}", describe(expected), describe(byte)),
            )),
            None => Err(self.invalid_at(
                offset,
                format!("expected {}, found end of input", describe(expected)),
            )),
        }
    }

    /// Copy the raw bytes of the next value into the scratch buffer, returning its offset.
    fn capture(&mut self) -> JsonTabResult<u64> {
        self.skip_whitespace()?;
        self.scratch.clear();
        let start = self.position();
        match self.input.peek()? {
            None => Err(self.invalid("unexpected end of input, expected a value")),
            Some(b'"') => {
                self.capture_string()?;
                Ok(start)
            }
            Some(b'{' | b'[') => {
                self.capture_container()?;
                Ok(start)
            }
            Some(byte) if is_atom_byte(byte) => {
                self.capture_atom()?;
                Ok(start)
            }
            Some(byte) => Err(self.invalid(format!("unexpected {}", describe(byte)))),
        }
    }

    fn capture_atom(&mut self) -> JsonTabResult<()> {
        loop {
            let buffer = self.input.fill_buf()?;
            if buffer.is_empty() {
                return Ok(());
            }
            let taken = buffer.iter().take_while(|b| is_atom_byte(**b)).count();
            self.scratch.extend_from_slice(&buffer[..taken]);
            let exhausted = taken == buffer.len();
            self.input.consume(taken);
            if !exhausted {
                return Ok(());
            }
        }
    }

    /// Copy a string including both quotes. The cursor must be on the opening quote.
    fn capture_string(&mut self) -> JsonTabResult<()> {
        let start = self.position();
        self.take_byte(start)?;
        self.capture_string_tail(start)
    }

    /// Copy the rest of a string whose opening quote (at `start`) was already copied.
    fn capture_string_tail(&mut self, start: u64) -> JsonTabResult<()> {
        let mut escaped = false;
        loop {
            let buffer = self.input.fill_buf()?;
            if buffer.is_empty() {
                return Err(self.invalid_at(start, "unterminated string"));
            }
            let mut taken = 0;
            let mut closed = false;
            for &byte in buffer {
                taken += 1;
                if escaped {
                    escaped = false;
                } else if byte == b'\\' {
                    escaped = true;
                } else if byte == b'"' {
                    closed = true;
                    break;
                }
            }
            self.scratch.extend_from_slice(&buffer[..taken]);
            self.input.consume(taken);
            if closed {
                return Ok(());
            }
        }
    }

    /// Copy an array or object, matching brackets. The cursor must be on the opening bracket.
    fn capture_container(&mut self) -> JsonTabResult<()> {
        let start = self.position();
        let mut closers = Vec::new();
        loop {
            let offset = self.position();
            let byte = self.take_byte(start)?;
            match byte {
                b'"' => self.capture_string_tail(offset)?,
                b'{' => closers.push(b'}'),
                b'[' => closers.push(b']'),
                b'}' | b']' => {
                    if closers.pop() != Some(byte) {
                        return Err(
                            self.invalid_at(offset, format!("mismatched {}", describe(byte)))
                        );
                    }
                    if closers.is_empty() {
                        return Ok(());
                    }
                }
                _ => {}
            }
        }
    }

    fn take_byte(&mut self, start: u64) -> JsonTabResult<u8> {
        match self.input.next_byte()? {
            Some(byte) => {
                self.scratch.push(byte);
                Ok(byte)
            }
            None => Err(self.invalid_at(start, "unterminated value")),
        }
    }

    fn invalid<S: Into<String>>(&self, message: S) -> JsonTabError {
        self.invalid_at(self.position(), message)
    }

    fn invalid_at<S: Into<String>>(&self, offset: u64, message: S) -> JsonTabError {
        jsontab_err!(InvalidJson: self.base_offset + offset, "{}", message.into())
    }
}

/// Read the whole of a small document into a [`Value`], for tests and diagnostics.
pub fn read_document<R: ReadAt>(source: R) -> JsonTabResult<Value> {
    let mut scanner = JsonScanner::new(source);
    if scanner.peek_kind()?.is_none() {
        jsontab_bail!(InvalidJson: 0, "empty document");
    }
    let value = scanner.read_value()?;
    scanner.finish()?;
    Ok(value)
}
