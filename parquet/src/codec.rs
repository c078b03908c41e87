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

//! Binary codec for the structures in [`crate::format`].
//!
//! Values are encoded with fixed-width little-endian integers. Decoding reports how many
//! bytes were consumed so callers can locate data that trails a serialized structure,
//! such as the signature of a plaintext footer.

use bincode::Options;
use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::errors::{ParquetError, Result};

fn options() -> impl Options {
    bincode::DefaultOptions::new()
        .with_fixint_encoding()
        .with_little_endian()
        .allow_trailing_bytes()
}

/// Serializes `value` into a new buffer
pub fn serialize<T: Serialize>(value: &T) -> Result<Vec<u8>> {
    options()
        .serialize(value)
        .map_err(|e| general_err!("Could not serialize metadata: {}", e))
}

/// Deserializes a value from the start of `buf`, returning it with the number of bytes read
pub fn deserialize<T: DeserializeOwned>(buf: &[u8]) -> Result<(T, usize)> {
    let mut remaining = buf;
    let value = options()
        .with_limit(buf.len() as u64)
        .deserialize_from(&mut remaining)
        .map_err(|e| corrupt_err!("Could not parse metadata: {}", e))?;
    Ok((value, buf.len() - remaining.len()))
}
