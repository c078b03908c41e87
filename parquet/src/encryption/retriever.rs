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

//! In-memory [`KeyRetriever`] implementations keyed by key id.

use std::collections::HashMap;
use std::sync::RwLock;

use crate::encryption::decrypt::KeyRetriever;
use crate::errors::{ParquetError, Result};

/// Retrieves keys whose metadata is a UTF-8 key id, e.g. `"kf"`
#[derive(Default)]
pub struct StringKeyIdRetriever {
    keys: RwLock<HashMap<String, Vec<u8>>>,
}

impl StringKeyIdRetriever {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_key(self, key_id: &str, key: Vec<u8>) -> Self {
        self.put_key(key_id, key);
        self
    }

    /// Adds or replaces the key of `key_id`
    pub fn put_key(&self, key_id: &str, key: Vec<u8>) {
        let mut keys = self.keys.write().unwrap_or_else(|e| e.into_inner());
        keys.insert(key_id.to_string(), key);
    }
}

impl KeyRetriever for StringKeyIdRetriever {
    fn retrieve_key(&self, key_metadata: &[u8]) -> Result<Vec<u8>> {
        let key_id = std::str::from_utf8(key_metadata).map_err(|e| {
            key_err!("Could not convert key metadata to string: {}", e)
        })?;
        let keys = self.keys.read().unwrap_or_else(|e| e.into_inner());
        keys.get(key_id)
            .cloned()
            .ok_or_else(|| key_err!("Could not retrieve key for id {:?}", key_id))
    }
}

/// Retrieves keys whose metadata is a 4 byte little-endian integer key id
#[derive(Default)]
pub struct IntegerKeyIdRetriever {
    keys: RwLock<HashMap<u32, Vec<u8>>>,
}

impl IntegerKeyIdRetriever {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_key(self, key_id: u32, key: Vec<u8>) -> Self {
        self.put_key(key_id, key);
        self
    }

    /// Adds or replaces the key of `key_id`
    pub fn put_key(&self, key_id: u32, key: Vec<u8>) {
        let mut keys = self.keys.write().unwrap_or_else(|e| e.into_inner());
        keys.insert(key_id, key);
    }

    /// Key metadata to store in a file for `key_id`
    pub fn key_metadata(key_id: u32) -> Vec<u8> {
        key_id.to_le_bytes().to_vec()
    }
}

impl KeyRetriever for IntegerKeyIdRetriever {
    fn retrieve_key(&self, key_metadata: &[u8]) -> Result<Vec<u8>> {
        let key_id: [u8; 4] = key_metadata.try_into().map_err(|_| {
            key_err!(
                "Integer key id must be 4 bytes, got {}",
                key_metadata.len()
            )
        })?;
        let key_id = u32::from_le_bytes(key_id);
        let keys = self.keys.read().unwrap_or_else(|e| e.into_inner());
        keys.get(&key_id)
            .cloned()
            .ok_or_else(|| key_err!("Could not retrieve key for id {}", key_id))
    }
}
