// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Scalar and numeric behavior of bound instances.
//!
//! Reads are display-hint-aware: a string-hinted scalar stops at the first
//! NUL terminator, a binary-hinted one preserves embedded NULs and the full
//! declared length, a boolean hint maps any non-zero stored value to true,
//! and an enum hint emits the symbolic label when the stored value
//! round-trips through the label table.
//!
//! Writes run a coercion ladder: byte-like, text, boolean, integer, float,
//! then generic numeric conversion, and as a last resort a textual parse of
//! the source's display form. Binary-typed destinations always take a raw
//! byte copy with zero padding instead of numeric or textual parsing.

use crate::error::{Error, Result};
use crate::object::Instance;
use crate::registry::ElemFormat;
use crate::schema::DisplayHint;
use crate::value::Value;

/// A numeric value loaded from buffer memory, before representation
/// conversion.
#[derive(Debug, Clone, Copy)]
pub(crate) enum RawNum {
    I(i64),
    U(u64),
    F(f64),
}

impl RawNum {
    fn is_zero(self) -> bool {
        match self {
            Self::I(v) => v == 0,
            Self::U(v) => v == 0,
            Self::F(v) => v == 0.0,
        }
    }

    fn into_value(self) -> Value {
        match self {
            Self::I(v) => Value::Int(v),
            Self::U(v) => Value::UInt(v),
            Self::F(v) => Value::Float(v),
        }
    }

    fn as_label_value(self) -> Option<i64> {
        match self {
            Self::I(v) => Some(v),
            Self::U(v) => i64::try_from(v).ok(),
            Self::F(_) => None,
        }
    }
}

impl Instance {
    /// Load the generic numeric value stored in this scalar.
    pub(crate) fn load_num(&self) -> Result<RawNum> {
        let format = self.dtype().format();
        let Some(size) = format.size() else {
            return Err(Error::InvalidOperation(format!(
                "'{}' is not a numeric scalar",
                self.dtype().name()
            )));
        };
        self.with_bytes(|bytes| {
            if bytes.len() < size {
                return Err(Error::BufferTooSmall {
                    need: size,
                    have: bytes.len(),
                });
            }
            let num = match format {
                ElemFormat::U8 => RawNum::U(u64::from(bytes[0])),
                ElemFormat::I8 => RawNum::I(i64::from(bytes[0] as i8)),
                ElemFormat::U16 => {
                    RawNum::U(u64::from(u16::from_ne_bytes([bytes[0], bytes[1]])))
                }
                ElemFormat::I16 => {
                    RawNum::I(i64::from(i16::from_ne_bytes([bytes[0], bytes[1]])))
                }
                ElemFormat::U32 => RawNum::U(u64::from(u32::from_ne_bytes([
                    bytes[0], bytes[1], bytes[2], bytes[3],
                ]))),
                ElemFormat::I32 => RawNum::I(i64::from(i32::from_ne_bytes([
                    bytes[0], bytes[1], bytes[2], bytes[3],
                ]))),
                ElemFormat::U64 => RawNum::U(u64::from_ne_bytes([
                    bytes[0], bytes[1], bytes[2], bytes[3], bytes[4], bytes[5], bytes[6],
                    bytes[7],
                ])),
                ElemFormat::I64 => RawNum::I(i64::from_ne_bytes([
                    bytes[0], bytes[1], bytes[2], bytes[3], bytes[4], bytes[5], bytes[6],
                    bytes[7],
                ])),
                ElemFormat::F32 => RawNum::F(f64::from(f32::from_ne_bytes([
                    bytes[0], bytes[1], bytes[2], bytes[3],
                ]))),
                ElemFormat::F64 => RawNum::F(f64::from_ne_bytes([
                    bytes[0], bytes[1], bytes[2], bytes[3], bytes[4], bytes[5], bytes[6],
                    bytes[7],
                ])),
                ElemFormat::Bytes => unreachable!("checked above"),
            };
            Ok(num)
        })?
    }

    /// Numeric-protocol conversion to a signed integer.
    pub fn as_i64(&self) -> Result<i64> {
        match self.load_num()? {
            RawNum::I(v) => Ok(v),
            RawNum::U(v) => i64::try_from(v).map_err(|_| {
                Error::InvalidValue(format!("stored value {} exceeds signed range", v))
            }),
            RawNum::F(v) => {
                let t = v.trunc();
                if !t.is_finite() || t < i64::MIN as f64 || t > i64::MAX as f64 {
                    return Err(Error::InvalidValue(format!(
                        "stored value {} has no integer representation",
                        v
                    )));
                }
                Ok(t as i64)
            }
        }
    }

    /// Numeric-protocol conversion to an unsigned integer.
    pub fn as_u64(&self) -> Result<u64> {
        match self.load_num()? {
            RawNum::U(v) => Ok(v),
            RawNum::I(v) => u64::try_from(v).map_err(|_| {
                Error::InvalidValue(format!("stored value {} is negative", v))
            }),
            RawNum::F(v) => {
                let t = v.trunc();
                if !t.is_finite() || t < 0.0 || t > u64::MAX as f64 {
                    return Err(Error::InvalidValue(format!(
                        "stored value {} has no unsigned representation",
                        v
                    )));
                }
                Ok(t as u64)
            }
        }
    }

    /// Numeric-protocol conversion to a float.
    pub fn as_f64(&self) -> Result<f64> {
        Ok(match self.load_num()? {
            RawNum::I(v) => v as f64,
            RawNum::U(v) => v as f64,
            RawNum::F(v) => v,
        })
    }

    /// Numeric-protocol conversion to a boolean: any non-zero stored value
    /// is true.
    pub fn as_bool(&self) -> Result<bool> {
        Ok(!self.load_num()?.is_zero())
    }

    /// Display-hint-aware scalar decode.
    pub(crate) fn read_scalar(&self) -> Result<Value> {
        let hint = self.dtype().display_hint();
        if self.dtype().format() == ElemFormat::Bytes {
            return self.with_bytes(|bytes| match hint {
                DisplayHint::String => {
                    let end = bytes.iter().position(|&b| b == 0).unwrap_or(bytes.len());
                    Value::Str(String::from_utf8_lossy(&bytes[..end]).into_owned())
                }
                _ => Value::Bytes(bytes.to_vec()),
            });
        }
        let num = self.load_num()?;
        Ok(match hint {
            DisplayHint::Boolean => Value::Bool(!num.is_zero()),
            DisplayHint::EnumLabel => match num.as_label_value() {
                Some(stored) => {
                    match self
                        .dtype()
                        .labels()
                        .iter()
                        .find(|label| label.value == stored)
                    {
                        Some(label) => Value::Enum(stored, label.name.clone()),
                        None => num.into_value(),
                    }
                }
                None => num.into_value(),
            },
            _ => num.into_value(),
        })
    }

    /// Coercion-ladder scalar write.
    pub(crate) fn write_scalar(&self, value: &Value) -> Result<()> {
        if self.dtype().format() == ElemFormat::Bytes {
            return self.write_binary(value);
        }
        match value {
            Value::Bytes(bytes) => {
                let size = self.dtype().format().size().unwrap_or(0);
                if bytes.len() == size {
                    return self.store_raw(bytes);
                }
                match std::str::from_utf8(bytes) {
                    Ok(text) => self.parse_text(text),
                    Err(_) => Err(self.mismatch(value)),
                }
            }
            Value::Str(text) => self.parse_text(text),
            Value::Bool(b) => self.store_int(i64::from(*b)),
            Value::Int(v) => self.store_int(*v),
            Value::UInt(v) => self.store_uint(*v),
            Value::Float(v) => self.store_float(*v),
            Value::Enum(v, _) => self.store_int(*v),
            Value::Object(other) => {
                // Generic numeric-protocol conversion from another bound
                // scalar; the decoded value cannot itself be an instance.
                let decoded = other.read_scalar()?;
                self.write_scalar(&decoded)
            }
            _ => Err(self.mismatch(value)),
        }
    }

    /// Raw copy with zero padding for binary-typed destinations.
    fn write_binary(&self, value: &Value) -> Result<()> {
        let rendered;
        let src: &[u8] = match value {
            Value::Bytes(b) => b,
            Value::Packed(b) => b,
            Value::Str(s) => s.as_bytes(),
            Value::Enum(_, label) => label.as_bytes(),
            // Last resort: the textual representation of the source.
            Value::Int(v) => {
                rendered = v.to_string();
                rendered.as_bytes()
            }
            Value::UInt(v) => {
                rendered = v.to_string();
                rendered.as_bytes()
            }
            Value::Float(v) => {
                rendered = v.to_string();
                rendered.as_bytes()
            }
            _ => return Err(self.mismatch(value)),
        };
        self.with_bytes_mut(|dst| {
            // Oversized sources truncate to the declared capacity; shorter
            // ones zero-pad the tail.
            let n = src.len().min(dst.len());
            dst[..n].copy_from_slice(&src[..n]);
            dst[n..].fill(0);
            Ok(())
        })
    }

    /// Textual parse into the scalar, honoring the enum label table first.
    fn parse_text(&self, text: &str) -> Result<()> {
        if self.dtype().display_hint() == DisplayHint::EnumLabel {
            if let Some(label) = self
                .dtype()
                .labels()
                .iter()
                .find(|label| label.name == text)
            {
                return self.store_int(label.value);
            }
        }
        let trimmed = text.trim();
        match self.dtype().format() {
            ElemFormat::F32 | ElemFormat::F64 => match trimmed.parse::<f64>() {
                Ok(v) => self.store_float(v),
                Err(_) => Err(self.mismatch(&Value::Str(text.to_string()))),
            },
            ElemFormat::U8 | ElemFormat::U16 | ElemFormat::U32 | ElemFormat::U64 => {
                match trimmed.parse::<u64>() {
                    Ok(v) => self.store_uint(v),
                    Err(_) => Err(self.mismatch(&Value::Str(text.to_string()))),
                }
            }
            _ => match trimmed.parse::<i64>() {
                Ok(v) => self.store_int(v),
                Err(_) => Err(self.mismatch(&Value::Str(text.to_string()))),
            },
        }
    }

    fn mismatch(&self, value: &Value) -> Error {
        Error::TypeMismatch {
            expected: self.dtype().name().to_string(),
            got: value.kind_name().to_string(),
        }
    }

    /// Store an exact-size raw image.
    fn store_raw(&self, src: &[u8]) -> Result<()> {
        self.with_bytes_mut(|dst| {
            if dst.len() < src.len() {
                return Err(Error::BufferTooSmall {
                    need: src.len(),
                    have: dst.len(),
                });
            }
            dst[..src.len()].copy_from_slice(src);
            Ok(())
        })
    }

    fn store_int(&self, v: i64) -> Result<()> {
        let out_of_range = || {
            Error::InvalidValue(format!(
                "integer {} out of range for '{}'",
                v,
                self.dtype().name()
            ))
        };
        match self.dtype().format() {
            ElemFormat::I8 => {
                let v = i8::try_from(v).map_err(|_| out_of_range())?;
                self.store_raw(&v.to_ne_bytes())
            }
            ElemFormat::I16 => {
                let v = i16::try_from(v).map_err(|_| out_of_range())?;
                self.store_raw(&v.to_ne_bytes())
            }
            ElemFormat::I32 => {
                let v = i32::try_from(v).map_err(|_| out_of_range())?;
                self.store_raw(&v.to_ne_bytes())
            }
            ElemFormat::I64 => self.store_raw(&v.to_ne_bytes()),
            ElemFormat::U8 | ElemFormat::U16 | ElemFormat::U32 | ElemFormat::U64 => {
                let v = u64::try_from(v).map_err(|_| out_of_range())?;
                self.store_uint(v)
            }
            ElemFormat::F32 | ElemFormat::F64 => self.store_float(v as f64),
            ElemFormat::Bytes => Err(self.mismatch(&Value::Int(v))),
        }
    }

    fn store_uint(&self, v: u64) -> Result<()> {
        let out_of_range = || {
            Error::InvalidValue(format!(
                "integer {} out of range for '{}'",
                v,
                self.dtype().name()
            ))
        };
        match self.dtype().format() {
            ElemFormat::U8 => {
                let v = u8::try_from(v).map_err(|_| out_of_range())?;
                self.store_raw(&v.to_ne_bytes())
            }
            ElemFormat::U16 => {
                let v = u16::try_from(v).map_err(|_| out_of_range())?;
                self.store_raw(&v.to_ne_bytes())
            }
            ElemFormat::U32 => {
                let v = u32::try_from(v).map_err(|_| out_of_range())?;
                self.store_raw(&v.to_ne_bytes())
            }
            ElemFormat::U64 => self.store_raw(&v.to_ne_bytes()),
            ElemFormat::I8 | ElemFormat::I16 | ElemFormat::I32 | ElemFormat::I64 => {
                let v = i64::try_from(v).map_err(|_| out_of_range())?;
                self.store_int(v)
            }
            ElemFormat::F32 | ElemFormat::F64 => self.store_float(v as f64),
            ElemFormat::Bytes => Err(self.mismatch(&Value::UInt(v))),
        }
    }

    fn store_float(&self, v: f64) -> Result<()> {
        match self.dtype().format() {
            ElemFormat::F32 => self.store_raw(&(v as f32).to_ne_bytes()),
            ElemFormat::F64 => self.store_raw(&v.to_ne_bytes()),
            // Integer destination: generic numeric conversion truncates the
            // fractional part, range-checked.
            _ => {
                let t = v.trunc();
                if !t.is_finite() || t < i64::MIN as f64 || t > u64::MAX as f64 {
                    return Err(Error::InvalidValue(format!(
                        "float {} has no integer representation for '{}'",
                        v,
                        self.dtype().name()
                    )));
                }
                if t < 0.0 {
                    self.store_int(t as i64)
                } else {
                    self.store_uint(t as u64)
                }
            }
        }
    }
}
