//! Scan predicates: compare one attribute of a record against a constant.

use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

use crate::common::{Error, Result};

/// Attribute type a filter interprets its bytes as.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Datatype {
    /// NUL-terminated or fixed-length bytes, compared like `strncmp`.
    String,
    /// 4-byte little-endian `i32`.
    Integer,
    /// 4-byte little-endian `f32`.
    Float,
}

impl Datatype {
    /// Required attribute length, `None` for variable-length strings.
    pub fn fixed_width(self) -> Option<usize> {
        match self {
            Datatype::String => None,
            Datatype::Integer => Some(std::mem::size_of::<i32>()),
            Datatype::Float => Some(std::mem::size_of::<f32>()),
        }
    }
}

/// Comparison between a record attribute (left) and the filter value (right).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operator {
    Lt,
    Lte,
    Eq,
    Gte,
    Gt,
    Ne,
}

impl Operator {
    /// Whether `attr <op> filter` holds given `attr.cmp(filter)`.
    ///
    /// An unordered comparison (a NaN operand) satisfies only `Ne`.
    pub fn holds(self, ordering: Option<Ordering>) -> bool {
        let Some(ord) = ordering else {
            return self == Operator::Ne;
        };
        match self {
            Operator::Lt => ord == Ordering::Less,
            Operator::Lte => ord != Ordering::Greater,
            Operator::Eq => ord == Ordering::Equal,
            Operator::Gte => ord != Ordering::Less,
            Operator::Gt => ord == Ordering::Greater,
            Operator::Ne => ord != Ordering::Equal,
        }
    }
}

impl FromStr for Operator {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "<" => Ok(Operator::Lt),
            "<=" => Ok(Operator::Lte),
            "=" => Ok(Operator::Eq),
            ">=" => Ok(Operator::Gte),
            ">" => Ok(Operator::Gt),
            "<>" | "!=" => Ok(Operator::Ne),
            other => Err(Error::BadScanParam(format!("unknown operator {other:?}"))),
        }
    }
}

impl fmt::Display for Operator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Operator::Lt => "<",
            Operator::Lte => "<=",
            Operator::Eq => "=",
            Operator::Gte => ">=",
            Operator::Gt => ">",
            Operator::Ne => "<>",
        };
        f.write_str(s)
    }
}

/// A validated scan filter.
#[derive(Debug, Clone, PartialEq)]
pub struct ScanFilter {
    offset: usize,
    length: usize,
    datatype: Datatype,
    value: Vec<u8>,
    op: Operator,
}

impl ScanFilter {
    /// Build a filter on `length` bytes at `offset`.
    ///
    /// # Errors
    /// `Error::BadScanParam` if `length` is zero, does not match the fixed
    /// width of `datatype`, or `value` is too short for a numeric type.
    pub fn new(
        offset: usize,
        length: usize,
        datatype: Datatype,
        value: &[u8],
        op: Operator,
    ) -> Result<Self> {
        if length == 0 {
            return Err(Error::BadScanParam("length must be at least 1".into()));
        }
        if let Some(width) = datatype.fixed_width() {
            if length != width {
                return Err(Error::BadScanParam(format!(
                    "{datatype:?} attribute must be {width} bytes, got {length}"
                )));
            }
            if value.len() < width {
                return Err(Error::BadScanParam(format!(
                    "{datatype:?} filter value must be {width} bytes, got {}",
                    value.len()
                )));
            }
        }
        Ok(Self {
            offset,
            length,
            datatype,
            value: value.to_vec(),
            op,
        })
    }

    #[inline]
    pub fn operator(&self) -> Operator {
        self.op
    }

    /// Whether `record` satisfies the filter. A record too short to hold the
    /// attribute never matches.
    pub fn matches(&self, record: &[u8]) -> bool {
        let end = match self.offset.checked_add(self.length) {
            Some(end) if end <= record.len() => end,
            _ => return false,
        };
        let attr = &record[self.offset..end];

        let ordering = match self.datatype {
            Datatype::Integer => Some(read_i32(attr).cmp(&read_i32(&self.value))),
            Datatype::Float => read_f32(attr).partial_cmp(&read_f32(&self.value)),
            Datatype::String => Some(strncmp(attr, &self.value, self.length)),
        };
        self.op.holds(ordering)
    }
}

fn read_i32(b: &[u8]) -> i32 {
    i32::from_le_bytes([b[0], b[1], b[2], b[3]])
}

fn read_f32(b: &[u8]) -> f32 {
    f32::from_le_bytes([b[0], b[1], b[2], b[3]])
}

/// Compare at most `n` bytes, stopping after a NUL; bytes past the end of a
/// slice read as NUL.
fn strncmp(a: &[u8], b: &[u8], n: usize) -> Ordering {
    for i in 0..n {
        let x = a.get(i).copied().unwrap_or(0);
        let y = b.get(i).copied().unwrap_or(0);
        if x != y {
            return x.cmp(&y);
        }
        if x == 0 {
            break;
        }
    }
    Ordering::Equal
}
