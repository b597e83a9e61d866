//! Restricted CBOR profile used for inscription metadata.
//!
//! The encoder is canonical: integer arguments and lengths use the
//! smallest width that fits, strings and collections are always
//! definite-length, and finite floats are emitted at the narrowest IEEE
//! width that preserves them. The decoder is permissive: it accepts any
//! argument width, indefinite-length strings, arrays, and maps, and
//! surfaces tagged values, which the encoder refuses to produce.

use super::*;

const BREAK: u8 = 0xFF;

/// A decoded CBOR data item.
///
/// Maps preserve insertion order and permit any value as key. Integers
/// are carried uniformly as `i128`, covering the full major-type-0 and
/// major-type-1 range `[-2^64, 2^64 - 1]`.
#[derive(Debug, PartialEq, Clone)]
pub enum Value {
  Array(Vec<Value>),
  Bool(bool),
  Bytes(Vec<u8>),
  Float(f64),
  Integer(i128),
  Map(Vec<(Value, Value)>),
  Null,
  Tag(u64, Box<Value>),
  Text(String),
  Undefined,
}

impl From<u64> for Value {
  fn from(n: u64) -> Self {
    Self::Integer(n.into())
  }
}

impl From<i64> for Value {
  fn from(n: i64) -> Self {
    Self::Integer(n.into())
  }
}

impl From<&str> for Value {
  fn from(text: &str) -> Self {
    Self::Text(text.into())
  }
}

impl From<bool> for Value {
  fn from(value: bool) -> Self {
    Self::Bool(value)
  }
}

impl From<f64> for Value {
  fn from(value: f64) -> Self {
    Self::Float(value)
  }
}

#[derive(Debug, PartialEq, Error)]
pub enum Error {
  #[error("unknown additional information {0}")]
  AdditionalInfo(u8),
  #[error("indefinite-length chunk is not a definite string of the enclosing type")]
  Chunk,
  #[error("integer {0} does not fit in a CBOR argument")]
  Oversize(i128),
  #[error("unrecognized simple value {0}")]
  Simple(u8),
  #[error("tagged values cannot be encoded")]
  TagEncode,
  #[error("trailing bytes after data item")]
  TrailingBytes,
  #[error("unexpected end of input")]
  Truncated,
  #[error("unexpected break code")]
  UnexpectedBreak,
  #[error("text string is not valid UTF-8")]
  Utf8,
}

/// Encode `value` as a single canonical CBOR data item.
pub fn encode(value: &Value) -> Result<Vec<u8>, Error> {
  let mut bytes = Vec::new();
  encode_into(value, &mut bytes)?;
  Ok(bytes)
}

/// Decode a single CBOR data item occupying the whole of `bytes`.
pub fn decode(bytes: &[u8]) -> Result<Value, Error> {
  let mut decoder = Decoder { bytes, position: 0 };

  let value = decoder.value()?;

  if decoder.position != bytes.len() {
    return Err(Error::TrailingBytes);
  }

  Ok(value)
}

fn encode_into(value: &Value, bytes: &mut Vec<u8>) -> Result<(), Error> {
  match value {
    Value::Integer(n) => {
      if *n >= 0 {
        head(0, u64::try_from(*n).map_err(|_| Error::Oversize(*n))?, bytes);
      } else {
        head(1, u64::try_from(-1 - *n).map_err(|_| Error::Oversize(*n))?, bytes);
      }
    }
    Value::Bytes(payload) => {
      head(2, payload.len().try_into().unwrap(), bytes);
      bytes.extend_from_slice(payload);
    }
    Value::Text(text) => {
      head(3, text.len().try_into().unwrap(), bytes);
      bytes.extend_from_slice(text.as_bytes());
    }
    Value::Array(items) => {
      head(4, items.len().try_into().unwrap(), bytes);
      for item in items {
        encode_into(item, bytes)?;
      }
    }
    Value::Map(entries) => {
      head(5, entries.len().try_into().unwrap(), bytes);
      for (key, value) in entries {
        encode_into(key, bytes)?;
        encode_into(value, bytes)?;
      }
    }
    Value::Tag(..) => return Err(Error::TagEncode),
    Value::Bool(false) => bytes.push(0xF4),
    Value::Bool(true) => bytes.push(0xF5),
    Value::Null => bytes.push(0xF6),
    Value::Undefined => bytes.push(0xF7),
    Value::Float(value) => encode_float(*value, bytes),
  }

  Ok(())
}

fn head(major: u8, argument: u64, bytes: &mut Vec<u8>) {
  let major = major << 5;

  if argument < 24 {
    bytes.push(major | argument.to_le_bytes()[0]);
  } else if argument <= u8::MAX.into() {
    bytes.push(major | 24);
    bytes.push(argument.to_le_bytes()[0]);
  } else if argument <= u16::MAX.into() {
    bytes.push(major | 25);
    bytes.extend_from_slice(&argument.to_be_bytes()[6..]);
  } else if argument <= u32::MAX.into() {
    bytes.push(major | 26);
    bytes.extend_from_slice(&argument.to_be_bytes()[4..]);
  } else {
    bytes.push(major | 27);
    bytes.extend_from_slice(&argument.to_be_bytes());
  }
}

// NaN, the infinities, and negative zero get the canonical half-precision
// bit patterns. Other finite values use single precision when it is exact
// and double precision otherwise; half precision would round.
fn encode_float(value: f64, bytes: &mut Vec<u8>) {
  #[allow(clippy::cast_possible_truncation)]
  let single = value as f32;

  if value.is_nan() {
    bytes.push(0xF9);
    bytes.extend_from_slice(&0x7E00u16.to_be_bytes());
  } else if value == f64::INFINITY {
    bytes.push(0xF9);
    bytes.extend_from_slice(&0x7C00u16.to_be_bytes());
  } else if value == f64::NEG_INFINITY {
    bytes.push(0xF9);
    bytes.extend_from_slice(&0xFC00u16.to_be_bytes());
  } else if value == 0.0 && value.is_sign_negative() {
    bytes.push(0xF9);
    bytes.extend_from_slice(&0x8000u16.to_be_bytes());
  } else if f64::from(single) == value {
    bytes.push(0xFA);
    bytes.extend_from_slice(&single.to_be_bytes());
  } else {
    bytes.push(0xFB);
    bytes.extend_from_slice(&value.to_be_bytes());
  }
}

fn decode_half(half: u16) -> f64 {
  let exponent = (half >> 10) & 0x1F;
  let mantissa = f64::from(half & 0x3FF);

  let magnitude = match exponent {
    0 => mantissa * (-24f64).exp2(),
    31 => {
      if mantissa == 0.0 {
        f64::INFINITY
      } else {
        f64::NAN
      }
    }
    _ => (1.0 + mantissa / 1024.0) * f64::from(i32::from(exponent) - 15).exp2(),
  };

  if half & 0x8000 == 0 {
    magnitude
  } else {
    -magnitude
  }
}

enum Argument {
  Length(u64),
  Indefinite,
}

struct Decoder<'a> {
  bytes: &'a [u8],
  position: usize,
}

impl<'a> Decoder<'a> {
  fn take(&mut self, length: usize) -> Result<&'a [u8], Error> {
    let end = self.position.checked_add(length).ok_or(Error::Truncated)?;
    let bytes = self.bytes.get(self.position..end).ok_or(Error::Truncated)?;
    self.position = end;
    Ok(bytes)
  }

  fn byte(&mut self) -> Result<u8, Error> {
    Ok(self.take(1)?[0])
  }

  fn accept_break(&mut self) -> bool {
    if self.bytes.get(self.position).copied() == Some(BREAK) {
      self.position += 1;
      true
    } else {
      false
    }
  }

  fn argument(&mut self, info: u8) -> Result<Argument, Error> {
    match info {
      0..=23 => Ok(Argument::Length(info.into())),
      24 => Ok(Argument::Length(self.byte()?.into())),
      25 => {
        let bytes = self.take(2)?;
        Ok(Argument::Length(
          u16::from_be_bytes([bytes[0], bytes[1]]).into(),
        ))
      }
      26 => {
        let bytes: [u8; 4] = self.take(4)?.try_into().unwrap();
        Ok(Argument::Length(u32::from_be_bytes(bytes).into()))
      }
      27 => {
        let bytes: [u8; 8] = self.take(8)?.try_into().unwrap();
        Ok(Argument::Length(u64::from_be_bytes(bytes)))
      }
      31 => Ok(Argument::Indefinite),
      _ => Err(Error::AdditionalInfo(info)),
    }
  }

  fn length(&mut self, info: u8) -> Result<Option<usize>, Error> {
    match self.argument(info)? {
      Argument::Length(length) => Ok(Some(
        usize::try_from(length).map_err(|_| Error::Truncated)?,
      )),
      Argument::Indefinite => Ok(None),
    }
  }

  // One chunk of an indefinite-length string. Chunks must be
  // definite-length strings of the enclosing major type.
  fn chunk(&mut self, major: u8) -> Result<&'a [u8], Error> {
    let initial = self.byte()?;

    if initial >> 5 != major {
      return Err(Error::Chunk);
    }

    match self.length(initial & 0b0001_1111)? {
      Some(length) => self.take(length),
      None => Err(Error::Chunk),
    }
  }

  fn string(&mut self, major: u8, info: u8) -> Result<Vec<u8>, Error> {
    match self.length(info)? {
      Some(length) => Ok(self.take(length)?.to_vec()),
      None => {
        let mut buffer = Vec::new();
        while !self.accept_break() {
          buffer.extend_from_slice(self.chunk(major)?);
        }
        Ok(buffer)
      }
    }
  }

  fn value(&mut self) -> Result<Value, Error> {
    let initial = self.byte()?;

    if initial == BREAK {
      return Err(Error::UnexpectedBreak);
    }

    let major = initial >> 5;
    let info = initial & 0b0001_1111;

    match major {
      0 => match self.argument(info)? {
        Argument::Length(n) => Ok(Value::Integer(n.into())),
        Argument::Indefinite => Err(Error::AdditionalInfo(info)),
      },
      1 => match self.argument(info)? {
        Argument::Length(n) => Ok(Value::Integer(-1 - i128::from(n))),
        Argument::Indefinite => Err(Error::AdditionalInfo(info)),
      },
      2 => Ok(Value::Bytes(self.string(major, info)?)),
      3 => String::from_utf8(self.string(major, info)?)
        .map(Value::Text)
        .map_err(|_| Error::Utf8),
      4 => {
        let mut items = Vec::new();
        match self.length(info)? {
          Some(length) => {
            for _ in 0..length {
              items.push(self.value()?);
            }
          }
          None => {
            while !self.accept_break() {
              items.push(self.value()?);
            }
          }
        }
        Ok(Value::Array(items))
      }
      5 => {
        let mut entries = Vec::new();
        match self.length(info)? {
          Some(length) => {
            for _ in 0..length {
              let key = self.value()?;
              let value = self.value()?;
              entries.push((key, value));
            }
          }
          None => {
            while !self.accept_break() {
              let key = self.value()?;
              let value = self.value()?;
              entries.push((key, value));
            }
          }
        }
        Ok(Value::Map(entries))
      }
      6 => match self.argument(info)? {
        Argument::Length(tag) => Ok(Value::Tag(tag, Box::new(self.value()?))),
        Argument::Indefinite => Err(Error::AdditionalInfo(info)),
      },
      _ => match info {
        20 => Ok(Value::Bool(false)),
        21 => Ok(Value::Bool(true)),
        22 => Ok(Value::Null),
        23 => Ok(Value::Undefined),
        24 => Err(Error::Simple(self.byte()?)),
        25 => {
          let bytes = self.take(2)?;
          Ok(Value::Float(decode_half(u16::from_be_bytes([
            bytes[0], bytes[1],
          ]))))
        }
        26 => {
          let bytes: [u8; 4] = self.take(4)?.try_into().unwrap();
          Ok(Value::Float(f32::from_be_bytes(bytes).into()))
        }
        27 => {
          let bytes: [u8; 8] = self.take(8)?.try_into().unwrap();
          Ok(Value::Float(f64::from_be_bytes(bytes)))
        }
        28..=30 => Err(Error::AdditionalInfo(info)),
        _ => Err(Error::Simple(info)),
      },
    }
  }
}
