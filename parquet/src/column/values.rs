// Licensed to the Apache Software Foundation (ASF) under one
// or more contributor license agreements.  See the NOTICE file
// distributed with this work for additional information
// regarding copyright ownership.  The ASF licenses this file
// to you under the Apache License, Version 2.0 (the
// "License"); you may not use this file except in compliance
// with the License.  You may obtain a copy of the License at
//
//   http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing,
// software distributed under the License is distributed on an
// "AS IS" BASIS, WITHOUT WARRANTIES OR CONDITIONS OF ANY
// KIND, either express or implied.  See the License for the
// specific language governing permissions and limitations
// under the License.

//! In-memory column values and their PLAIN and dictionary encodings.

use std::collections::HashMap;

use bytes::{Buf, BufMut};

use crate::basic::Type;
use crate::errors::{ParquetError, Result};

/// Values of one column, one variant per physical type
#[derive(Debug, Clone, PartialEq)]
pub enum ColumnValues {
    Boolean(Vec<bool>),
    Int32(Vec<i32>),
    Int64(Vec<i64>),
    Float(Vec<f32>),
    Double(Vec<f64>),
    ByteArray(Vec<Vec<u8>>),
}

macro_rules! map_values {
    ($values:expr, $v:ident => $body:expr) => {
        match $values {
            ColumnValues::Boolean($v) => ColumnValues::Boolean($body),
            ColumnValues::Int32($v) => ColumnValues::Int32($body),
            ColumnValues::Int64($v) => ColumnValues::Int64($body),
            ColumnValues::Float($v) => ColumnValues::Float($body),
            ColumnValues::Double($v) => ColumnValues::Double($body),
            ColumnValues::ByteArray($v) => ColumnValues::ByteArray($body),
        }
    };
}

impl ColumnValues {
    /// Creates an empty column of `physical_type`
    pub fn new(physical_type: Type) -> Self {
        match physical_type {
            Type::BOOLEAN => ColumnValues::Boolean(vec![]),
            Type::INT32 => ColumnValues::Int32(vec![]),
            Type::INT64 => ColumnValues::Int64(vec![]),
            Type::FLOAT => ColumnValues::Float(vec![]),
            Type::DOUBLE => ColumnValues::Double(vec![]),
            Type::BYTE_ARRAY => ColumnValues::ByteArray(vec![]),
        }
    }

    pub fn physical_type(&self) -> Type {
        match self {
            ColumnValues::Boolean(_) => Type::BOOLEAN,
            ColumnValues::Int32(_) => Type::INT32,
            ColumnValues::Int64(_) => Type::INT64,
            ColumnValues::Float(_) => Type::FLOAT,
            ColumnValues::Double(_) => Type::DOUBLE,
            ColumnValues::ByteArray(_) => Type::BYTE_ARRAY,
        }
    }

    pub fn len(&self) -> usize {
        match self {
            ColumnValues::Boolean(v) => v.len(),
            ColumnValues::Int32(v) => v.len(),
            ColumnValues::Int64(v) => v.len(),
            ColumnValues::Float(v) => v.len(),
            ColumnValues::Double(v) => v.len(),
            ColumnValues::ByteArray(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Copies `len` values starting at `offset`
    pub(crate) fn slice(&self, offset: usize, len: usize) -> Self {
        map_values!(self, v => v[offset..offset + len].to_vec())
    }

    /// Gathers the values at `indices`
    pub(crate) fn take(&self, indices: &[u32]) -> Result<Self> {
        let len = self.len();
        if let Some(i) = indices.iter().find(|i| **i as usize >= len) {
            return Err(ParquetError::IndexOutOfBound(*i as usize, len));
        }
        Ok(map_values!(self, v => indices.iter().map(|i| v[*i as usize].clone()).collect()))
    }

    /// Appends `other`, which must have the same physical type
    pub(crate) fn append(&mut self, other: ColumnValues) -> Result<()> {
        match (self, other) {
            (ColumnValues::Boolean(a), ColumnValues::Boolean(b)) => a.extend(b),
            (ColumnValues::Int32(a), ColumnValues::Int32(b)) => a.extend(b),
            (ColumnValues::Int64(a), ColumnValues::Int64(b)) => a.extend(b),
            (ColumnValues::Float(a), ColumnValues::Float(b)) => a.extend(b),
            (ColumnValues::Double(a), ColumnValues::Double(b)) => a.extend(b),
            (ColumnValues::ByteArray(a), ColumnValues::ByteArray(b)) => a.extend(b),
            (a, b) => {
                return Err(general_err!(
                    "Cannot append {} values to a {} column",
                    b.physical_type(),
                    a.physical_type()
                ))
            }
        }
        Ok(())
    }

    fn encode_value(&self, i: usize, buf: &mut Vec<u8>) {
        match self {
            ColumnValues::Boolean(v) => buf.put_u8(v[i] as u8),
            ColumnValues::Int32(v) => buf.put_i32_le(v[i]),
            ColumnValues::Int64(v) => buf.put_i64_le(v[i]),
            ColumnValues::Float(v) => buf.put_f32_le(v[i]),
            ColumnValues::Double(v) => buf.put_f64_le(v[i]),
            ColumnValues::ByteArray(v) => {
                buf.put_u32_le(v[i].len() as u32);
                buf.put_slice(&v[i]);
            }
        }
    }

    /// PLAIN encodes all values
    pub(crate) fn encode_plain(&self) -> Vec<u8> {
        let mut buf = Vec::new();
        for i in 0..self.len() {
            self.encode_value(i, &mut buf);
        }
        buf
    }

    /// Splits the values into a dictionary of distinct values, in order of first
    /// appearance, and the index of each value in that dictionary
    pub(crate) fn dictionary_encode(&self) -> Result<(ColumnValues, Vec<u32>)> {
        let mut positions: HashMap<Vec<u8>, u32> = HashMap::new();
        let mut first_seen = Vec::new();
        let mut indices = Vec::with_capacity(self.len());
        let mut key = Vec::new();
        for i in 0..self.len() {
            key.clear();
            self.encode_value(i, &mut key);
            let next = u32::try_from(positions.len())?;
            let index = *positions.entry(key.clone()).or_insert_with(|| {
                first_seen.push(i as u32);
                next
            });
            indices.push(index);
        }
        Ok((self.take(&first_seen)?, indices))
    }

    /// Decodes `num_values` PLAIN encoded values of `physical_type`
    pub(crate) fn decode_plain(physical_type: Type, buf: &[u8], num_values: usize) -> Result<Self> {
        let mut buf = buf;
        let mut values = ColumnValues::new(physical_type);
        let width = match physical_type {
            Type::BOOLEAN => 1,
            Type::INT32 | Type::FLOAT => 4,
            Type::INT64 | Type::DOUBLE => 8,
            Type::BYTE_ARRAY => 4,
        };
        for _ in 0..num_values {
            if buf.remaining() < width {
                return Err(eof_err!("Not enough bytes to decode {} values", num_values));
            }
            match &mut values {
                ColumnValues::Boolean(v) => v.push(buf.get_u8() != 0),
                ColumnValues::Int32(v) => v.push(buf.get_i32_le()),
                ColumnValues::Int64(v) => v.push(buf.get_i64_le()),
                ColumnValues::Float(v) => v.push(buf.get_f32_le()),
                ColumnValues::Double(v) => v.push(buf.get_f64_le()),
                ColumnValues::ByteArray(v) => {
                    let len = buf.get_u32_le() as usize;
                    if buf.remaining() < len {
                        return Err(eof_err!("Not enough bytes to decode byte array of {}", len));
                    }
                    v.push(buf[..len].to_vec());
                    buf.advance(len);
                }
            }
        }
        Ok(values)
    }
}

/// Encodes dictionary indices as little-endian `u32`
pub(crate) fn encode_indices(indices: &[u32]) -> Vec<u8> {
    let mut buf = Vec::with_capacity(indices.len() * 4);
    for index in indices {
        buf.put_u32_le(*index);
    }
    buf
}

pub(crate) fn decode_indices(buf: &[u8], num_values: usize) -> Result<Vec<u32>> {
    if buf.len() < num_values * 4 {
        return Err(eof_err!("Not enough bytes to decode {} indices", num_values));
    }
    let mut buf = buf;
    Ok((0..num_values).map(|_| buf.get_u32_le()).collect())
}
