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

//! Contains structs and methods to build Parquet schema and schema descriptors.

use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;

use crate::basic::Type as PhysicalType;
use crate::errors::{ParquetError, Result};
use crate::format::SchemaElement;

// ----------------------------------------------------------------------
// Column path

/// Represents the location of a column in a Parquet schema
///
/// Paths are ordered segment by segment, which makes them usable as keys of ordered maps.
#[derive(Clone, PartialEq, Debug, Eq, Hash, PartialOrd, Ord)]
pub struct ColumnPath {
    parts: Vec<String>,
}

impl ColumnPath {
    /// Creates new column path from vector of field names.
    pub fn new(parts: Vec<String>) -> Self {
        ColumnPath { parts }
    }

    /// Creates a column path by splitting `path` on `.`
    ///
    /// Use [`ColumnPath::new`] when a field name itself contains a dot.
    pub fn from_dot_string(path: &str) -> Self {
        ColumnPath {
            parts: path.split('.').map(String::from).collect(),
        }
    }

    /// Returns string representation of this column path.
    /// ```rust
    /// use parquet_crypto::schema::types::ColumnPath;
    ///
    /// let path = ColumnPath::new(vec!["a".to_string(), "b".to_string(), "c".to_string()]);
    /// assert_eq!(&path.string(), "a.b.c");
    /// ```
    pub fn string(&self) -> String {
        self.parts.join(".")
    }

    /// Appends more components to end of column path.
    pub fn append(&mut self, mut tail: Vec<String>) {
        self.parts.append(&mut tail);
    }

    /// Returns a slice of path components.
    pub fn parts(&self) -> &[String] {
        &self.parts
    }
}

impl fmt::Display for ColumnPath {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.string())
    }
}

impl From<Vec<String>> for ColumnPath {
    fn from(parts: Vec<String>) -> Self {
        ColumnPath { parts }
    }
}

impl From<&str> for ColumnPath {
    fn from(path: &str) -> Self {
        ColumnPath::from_dot_string(path)
    }
}

impl From<String> for ColumnPath {
    fn from(path: String) -> Self {
        ColumnPath::from_dot_string(&path)
    }
}

impl AsRef<[String]> for ColumnPath {
    fn as_ref(&self) -> &[String] {
        &self.parts
    }
}

// ----------------------------------------------------------------------
// Column descriptor

/// Reference counted pointer for [`ColumnDescriptor`].
pub type ColumnDescPtr = Arc<ColumnDescriptor>;

/// A descriptor for leaf-level primitive columns.
#[derive(Debug, PartialEq, Eq)]
pub struct ColumnDescriptor {
    path: ColumnPath,
    physical_type: PhysicalType,
}

impl ColumnDescriptor {
    /// Creates new descriptor for leaf-level column.
    pub fn new(path: impl Into<ColumnPath>, physical_type: PhysicalType) -> Self {
        Self {
            path: path.into(),
            physical_type,
        }
    }

    /// Returns [`ColumnPath`] for this column.
    pub fn path(&self) -> &ColumnPath {
        &self.path
    }

    /// Returns column name, the last segment of its path.
    pub fn name(&self) -> &str {
        self.path.parts().last().map(String::as_str).unwrap_or("")
    }

    /// Returns physical type for this column.
    pub fn physical_type(&self) -> PhysicalType {
        self.physical_type
    }
}

// ----------------------------------------------------------------------
// Schema descriptor

/// Reference counted pointer for [`SchemaDescriptor`].
pub type SchemaDescPtr = Arc<SchemaDescriptor>;

/// Schema of a Parquet file: a name plus its leaf columns in file order.
#[derive(Debug, PartialEq, Eq)]
pub struct SchemaDescriptor {
    name: String,
    leaves: Vec<ColumnDescPtr>,
}

impl SchemaDescriptor {
    /// Creates new schema descriptor, rejecting duplicate column paths.
    pub fn new(name: impl Into<String>, leaves: Vec<ColumnDescriptor>) -> Result<Self> {
        let mut seen = HashSet::with_capacity(leaves.len());
        for leaf in &leaves {
            if leaf.path().parts().is_empty() {
                return Err(general_err!("Column path must not be empty"));
            }
            if !seen.insert(leaf.path().clone()) {
                return Err(general_err!("Duplicate column in schema: {}", leaf.path()));
            }
        }
        Ok(Self {
            name: name.into(),
            leaves: leaves.into_iter().map(Arc::new).collect(),
        })
    }

    /// Returns schema name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns number of leaf-level columns.
    pub fn num_columns(&self) -> usize {
        self.leaves.len()
    }

    /// Returns column descriptor for `i`th leaf column.
    pub fn column(&self, i: usize) -> Result<ColumnDescPtr> {
        self.leaves
            .get(i)
            .cloned()
            .ok_or(ParquetError::IndexOutOfBound(i, self.leaves.len()))
    }

    /// Returns slice of column descriptors.
    pub fn columns(&self) -> &[ColumnDescPtr] {
        &self.leaves
    }

    /// Returns the ordinal of the column with the given path, if any.
    pub fn column_index(&self, path: &ColumnPath) -> Option<usize> {
        self.leaves.iter().position(|leaf| leaf.path() == path)
    }
}

/// Converts a schema descriptor into its serialized form.
pub(crate) fn to_format(schema: &SchemaDescriptor) -> Vec<SchemaElement> {
    schema
        .columns()
        .iter()
        .map(|leaf| SchemaElement {
            path: leaf.path().parts().to_vec(),
            type_: leaf.physical_type(),
        })
        .collect()
}

/// Rebuilds a schema descriptor from its serialized form.
pub(crate) fn from_format(name: &str, elements: &[SchemaElement]) -> Result<SchemaDescriptor> {
    let leaves = elements
        .iter()
        .map(|e| ColumnDescriptor::new(ColumnPath::new(e.path.clone()), e.type_))
        .collect();
    SchemaDescriptor::new(name, leaves).map_err(|e| corrupt_err!("Invalid schema: {}", e))
}
