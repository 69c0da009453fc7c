// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! Node.js `Buffer` class
//!
//! `Buffer` is a `Uint8Array` subclass; the string codecs behind
//! `Buffer.from(string, encoding)` and `buf.toString(encoding)` are native.

use base64::Engine as _;
use base64::prelude::{BASE64_STANDARD, BASE64_URL_SAFE_NO_PAD};
use rquickjs::{Ctx, Exception, Function, TypedArray, Value};

/// Class body; called with the native `decode` and `encode` functions
const BUFFER_CLASS: &str = r#"(function (decode, encode) {
  class Buffer extends Uint8Array {
    static from(value, encoding) {
      if (typeof value === 'string') return wrap(decode(value, encoding));
      if (value instanceof ArrayBuffer) return new Buffer(value);
      return wrap(Uint8Array.from(value));
    }
    static alloc(size, fill, encoding) {
      const buffer = new Buffer(size);
      if (typeof fill === 'string') {
        const pattern = decode(fill, encoding);
        for (let i = 0; pattern.length > 0 && i < size; i++) buffer[i] = pattern[i % pattern.length];
      } else if (fill !== undefined) {
        buffer.fill(fill);
      }
      return buffer;
    }
    static isBuffer(value) {
      return value instanceof Buffer;
    }
    static byteLength(value, encoding) {
      return typeof value === 'string' ? decode(value, encoding).length : value.byteLength;
    }
    static concat(list, totalLength) {
      const length = totalLength ?? list.reduce((sum, item) => sum + item.length, 0);
      const result = new Buffer(length);
      let offset = 0;
      for (const item of list) {
        if (offset >= length) break;
        result.set(item.subarray(0, length - offset), offset);
        offset += item.length;
      }
      return result;
    }
    toString(encoding, start, end) {
      return encode(Uint8Array.prototype.subarray.call(this, start, end), encoding);
    }
    toJSON() {
      return { type: 'Buffer', data: Array.from(this) };
    }
    equals(other) {
      return this.length === other.length && this.every((byte, i) => byte === other[i]);
    }
  }
  function wrap(bytes) {
    return new Buffer(bytes.buffer, bytes.byteOffset, bytes.length);
  }
  return Buffer;
})"#;

/// String encodings understood by `Buffer`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Encoding {
    /// UTF-8, the default
    Utf8,
    /// Lowercase hexadecimal pairs
    Hex,
    /// Standard base64 with padding
    Base64,
    /// URL-safe base64 without padding
    Base64Url,
    /// 7-bit ASCII
    Ascii,
    /// One byte per code unit
    Latin1,
}

impl Encoding {
    /// Parse a Node.js encoding name; `None` for unknown names
    pub fn parse(name: &str) -> Option<Self> {
        match name.to_ascii_lowercase().as_str() {
            "utf8" | "utf-8" => Some(Self::Utf8),
            "hex" => Some(Self::Hex),
            "base64" => Some(Self::Base64),
            "base64url" => Some(Self::Base64Url),
            "ascii" => Some(Self::Ascii),
            "latin1" | "binary" => Some(Self::Latin1),
            _ => None,
        }
    }

    /// Decode `text` into bytes.
    ///
    /// Like Node, malformed hex stops at the first bad pair and base64
    /// ignores characters outside its alphabet.
    pub fn decode(self, text: &str) -> Vec<u8> {
        match self {
            Self::Utf8 => text.as_bytes().to_vec(),
            Self::Hex => {
                let valid = text
                    .as_bytes()
                    .chunks_exact(2)
                    .take_while(|pair| pair.iter().all(u8::is_ascii_hexdigit))
                    .count();
                hex::decode(&text[..valid * 2]).unwrap_or_default()
            }
            Self::Base64 | Self::Base64Url => {
                let cleaned: String = text
                    .chars()
                    .filter_map(|c| match c {
                        '-' => Some('+'),
                        '_' => Some('/'),
                        c if c.is_ascii_alphanumeric() || c == '+' || c == '/' => Some(c),
                        _ => None,
                    })
                    .collect();
                let padded = format!("{cleaned}{}", "=".repeat((4 - cleaned.len() % 4) % 4));
                BASE64_STANDARD.decode(padded).unwrap_or_default()
            }
            Self::Ascii | Self::Latin1 => text.chars().map(|c| c as u32 as u8).collect(),
        }
    }

    /// Encode `bytes` as a string
    pub fn encode(self, bytes: &[u8]) -> String {
        match self {
            Self::Utf8 => String::from_utf8_lossy(bytes).into_owned(),
            Self::Hex => hex::encode(bytes),
            Self::Base64 => BASE64_STANDARD.encode(bytes),
            Self::Base64Url => BASE64_URL_SAFE_NO_PAD.encode(bytes),
            Self::Ascii => bytes.iter().map(|&b| (b & 0x7f) as char).collect(),
            Self::Latin1 => bytes.iter().map(|&b| b as char).collect(),
        }
    }
}

fn encoding_arg(ctx: &Ctx<'_>, name: Option<String>) -> rquickjs::Result<Encoding> {
    match name {
        None => Ok(Encoding::Utf8),
        Some(name) => {
            Encoding::parse(&name).ok_or_else(|| Exception::throw_type(ctx, &format!("Unknown encoding: {name}")))
        }
    }
}

/// Create the `Buffer` constructor for `ctx`
pub fn create_buffer_class<'js>(ctx: &Ctx<'js>) -> rquickjs::Result<Value<'js>> {
    let decode = Function::new(ctx.clone(), |ctx: Ctx<'js>, text: String, encoding: Option<String>| {
        let bytes = encoding_arg(&ctx, encoding)?.decode(&text);
        TypedArray::<u8>::new(ctx, bytes)
    })?
    .with_name("decode")?;

    let encode = Function::new(
        ctx.clone(),
        |ctx: Ctx<'js>, bytes: TypedArray<'js, u8>, encoding: Option<String>| {
            let encoding = encoding_arg(&ctx, encoding)?;
            Ok::<_, rquickjs::Error>(encoding.encode(bytes.as_bytes().unwrap_or_default()))
        },
    )?
    .with_name("encode")?;

    let factory: Function = ctx.eval(BUFFER_CLASS)?;
    factory.call((decode, encode))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_encoding() {
        assert_eq!(Encoding::parse("UTF-8"), Some(Encoding::Utf8));
        assert_eq!(Encoding::parse("binary"), Some(Encoding::Latin1));
        assert_eq!(Encoding::parse("ucs9"), None);
    }

    #[test]
    fn test_base64() {
        assert_eq!(Encoding::Base64.encode(b"hi"), "aGk=");
        assert_eq!(Encoding::Base64.decode("aGk="), b"hi");
        assert_eq!(Encoding::Base64.decode("aGk"), b"hi");
        assert_eq!(Encoding::Base64Url.encode(&[0xfb, 0xff]), "-_8");
        assert_eq!(Encoding::Base64Url.decode("-_8"), vec![0xfb, 0xff]);
    }

    #[test]
    fn test_hex_stops_at_bad_pair() {
        assert_eq!(Encoding::Hex.encode(&[0xde, 0xad, 0xbe, 0xef]), "deadbeef");
        assert_eq!(Encoding::Hex.decode("deadzz01"), vec![0xde, 0xad]);
        assert_eq!(Encoding::Hex.decode("abc"), vec![0xab]);
    }

    #[test]
    fn test_single_byte_encodings() {
        assert_eq!(Encoding::Latin1.decode("é"), vec![0xe9]);
        assert_eq!(Encoding::Latin1.encode(&[0xe9]), "é");
        assert_eq!(Encoding::Ascii.encode(&[0xc1]), "A");
    }
}
