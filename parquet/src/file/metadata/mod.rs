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

//! Parquet metadata API
//!
//! * [`ParquetMetaData`]: Top level metadata container, read from the Parquet
//!   file footer.
//!
//! * [`FileMetaData`]: File level metadata such as schema, row counts and
//!   version.
//!
//! * [`RowGroupMetaData`]: Metadata for each Row Group with a File, such as
//!   location and number of rows, and column chunks.
//!
//! * [`ColumnChunkMetaData`]: Metadata for each column chunk (primitive leaf)
//!   within a Row Group including encoding and compression information,
//!   number of values, and the crypto metadata of encrypted columns.
//!
//! Column chunk metadata of encrypted columns may itself be encrypted. It is
//! decrypted on access by [`ParquetMetaData::column_chunk`], so columns whose
//! keys are unavailable can be skipped while the rest of the file is read.

mod parser;
mod reader;
mod writer;

use std::sync::Arc;

use tracing::trace;

use crate::basic::{Encoding, Type};
use crate::codec;
use crate::encryption::decrypt::FileDecryptor;
use crate::encryption::modules::{create_module_aad, ModuleType};
use crate::encryption::ParquetCipher;
use crate::errors::{ParquetError, Result};
use crate::format::{ColumnChunk, ColumnCryptoMetaData, ColumnMetaData};
use crate::schema::types::{ColumnDescPtr, ColumnPath, SchemaDescPtr};

pub use reader::{FooterMode, FooterState, FooterTail, ParquetMetaDataReader};
pub(crate) use writer::{start_magic, ParquetMetaDataWriter};

/// Global Parquet metadata, including [`FileMetaData`] and [`RowGroupMetaData`].
///
/// Holds the decryption state of the file when it was opened with decryption
/// properties.
#[derive(Debug, Clone)]
pub struct ParquetMetaData {
    file_metadata: FileMetaData,
    row_groups: Vec<RowGroupMetaData>,
    file_decryptor: Option<Arc<FileDecryptor>>,
}

impl ParquetMetaData {
    pub(crate) fn new(
        file_metadata: FileMetaData,
        row_groups: Vec<RowGroupMetaData>,
        file_decryptor: Option<Arc<FileDecryptor>>,
    ) -> Self {
        Self {
            file_metadata,
            row_groups,
            file_decryptor,
        }
    }

    /// Returns file metadata as reference.
    pub fn file_metadata(&self) -> &FileMetaData {
        &self.file_metadata
    }

    /// Returns number of row groups in this file.
    pub fn num_row_groups(&self) -> usize {
        self.row_groups.len()
    }

    /// Returns row group metadata for `i`th position.
    /// Position should be less than number of row groups `num_row_groups`.
    pub fn row_group(&self, i: usize) -> &RowGroupMetaData {
        &self.row_groups[i]
    }

    /// Returns slice of row groups in this file.
    pub fn row_groups(&self) -> &[RowGroupMetaData] {
        &self.row_groups
    }

    /// Returns the encryption algorithm of the file, or `None` if it was read without
    /// decryption properties or is not encrypted
    pub fn encryption_algorithm(&self) -> Option<ParquetCipher> {
        self.file_decryptor.as_ref().map(|d| d.algorithm())
    }

    pub(crate) fn file_decryptor(&self) -> Option<&Arc<FileDecryptor>> {
        self.file_decryptor.as_ref()
    }

    /// Returns the metadata of column `column` in row group `row_group`, decrypting it
    /// if it is encrypted and the file was opened with decryption properties.
    pub fn column_chunk(&self, row_group: usize, column: usize) -> Result<ColumnChunkMetaData> {
        let rg = self
            .row_groups
            .get(row_group)
            .ok_or(ParquetError::IndexOutOfBound(row_group, self.row_groups.len()))?;
        let chunk = rg
            .columns
            .get(column)
            .ok_or(ParquetError::IndexOutOfBound(column, rg.columns.len()))?;
        let descr = self.file_metadata.schema_descr.column(column)?;

        let meta_data = match (
            &chunk.crypto_metadata,
            &chunk.encrypted_column_metadata,
            &self.file_decryptor,
        ) {
            (Some(crypto_metadata), Some(encrypted), Some(file_decryptor)) => {
                trace!(row_group, column, "decrypting column metadata");
                let mut decryptor =
                    file_decryptor.get_column_meta_decryptor(descr.path(), crypto_metadata)?;
                decryptor.set_aad(create_module_aad(
                    file_decryptor.file_aad(),
                    ModuleType::ColumnMetaData,
                    row_group,
                    column,
                    None,
                )?);
                let buf = decryptor.decrypt(encrypted)?;
                codec::deserialize::<ColumnMetaData>(&buf)?.0
            }
            (_, Some(_), None) if chunk.meta_data.is_none() => {
                return Err(config_err!(
                    "Column '{}' metadata is encrypted but no decryption properties were provided",
                    descr.path()
                ))
            }
            _ => chunk.meta_data.clone().ok_or_else(|| {
                corrupt_err!("Column '{}' metadata is missing", descr.path())
            })?,
        };

        if meta_data.type_ != descr.physical_type() {
            return Err(corrupt_err!(
                "Column '{}' has type {} in the schema but {} in its metadata",
                descr.path(),
                descr.physical_type(),
                meta_data.type_
            ));
        }
        ColumnChunkMetaData::new(descr, chunk, meta_data)
    }
}

/// File level metadata for a Parquet file.
///
/// Includes the version of the file, the number of rows, the application that
/// created the file and the schema.
#[derive(Debug, Clone, PartialEq)]
pub struct FileMetaData {
    version: i32,
    num_rows: i64,
    created_by: Option<String>,
    schema_descr: SchemaDescPtr,
}

impl FileMetaData {
    /// Create new file metadata
    pub fn new(
        version: i32,
        num_rows: i64,
        created_by: Option<String>,
        schema_descr: SchemaDescPtr,
    ) -> Self {
        FileMetaData {
            version,
            num_rows,
            created_by,
            schema_descr,
        }
    }

    /// Returns version of this file.
    pub fn version(&self) -> i32 {
        self.version
    }

    /// Returns number of rows in the file.
    pub fn num_rows(&self) -> i64 {
        self.num_rows
    }

    /// String message for application that wrote this file.
    ///
    /// This should have the following format:
    /// `<application> version <application version> (build <application build hash>)`.
    ///
    /// ```shell
    /// parquet-mr version 1.8.0 (build 0fda28af84b9746396014ad6a415b90592a98b3b)
    /// ```
    pub fn created_by(&self) -> Option<&str> {
        self.created_by.as_deref()
    }

    /// Returns the parsed writer version, if `created_by` can be parsed
    pub fn writer_version(&self) -> Option<ApplicationVersion> {
        self.created_by.as_deref().and_then(ApplicationVersion::parse)
    }

    /// Returns Parquet schema descriptor.
    pub fn schema_descr(&self) -> &SchemaDescPtr {
        &self.schema_descr
    }
}

/// Metadata for a row group
///
/// Column chunk metadata is kept in its serialized form, see
/// [`ParquetMetaData::column_chunk`].
#[derive(Debug, Clone, PartialEq)]
pub struct RowGroupMetaData {
    columns: Vec<ColumnChunk>,
    num_rows: i64,
    total_byte_size: i64,
    file_offset: Option<i64>,
    ordinal: i16,
    schema_descr: SchemaDescPtr,
}

impl RowGroupMetaData {
    pub(crate) fn new(
        columns: Vec<ColumnChunk>,
        num_rows: i64,
        total_byte_size: i64,
        file_offset: Option<i64>,
        ordinal: i16,
        schema_descr: SchemaDescPtr,
    ) -> Self {
        Self {
            columns,
            num_rows,
            total_byte_size,
            file_offset,
            ordinal,
            schema_descr,
        }
    }

    /// Number of columns in this row group.
    pub fn num_columns(&self) -> usize {
        self.columns.len()
    }

    /// Number of rows in this row group.
    pub fn num_rows(&self) -> i64 {
        self.num_rows
    }

    /// Total byte size of all the uncompressed column data in this row group.
    pub fn total_byte_size(&self) -> i64 {
        self.total_byte_size
    }

    /// Byte offset of the first page of this row group
    pub fn file_offset(&self) -> Option<i64> {
        self.file_offset
    }

    /// Returns ordinal position of this row group in file.
    pub fn ordinal(&self) -> i16 {
        self.ordinal
    }

    /// Returns reference to a schema descriptor.
    pub fn schema_descr(&self) -> &SchemaDescPtr {
        &self.schema_descr
    }

    /// Returns the crypto metadata of column `i`, or `None` if it is not encrypted
    pub fn column_crypto_metadata(&self, i: usize) -> Option<&ColumnCryptoMetaData> {
        self.columns.get(i).and_then(|c| c.crypto_metadata.as_ref())
    }
}

/// Metadata for a column chunk.
#[derive(Debug, Clone, PartialEq)]
pub struct ColumnChunkMetaData {
    column_descr: ColumnDescPtr,
    encodings: Vec<Encoding>,
    num_values: i64,
    total_compressed_size: i64,
    total_uncompressed_size: i64,
    data_page_offset: i64,
    dictionary_page_offset: Option<i64>,
    offset_index_offset: Option<i64>,
    offset_index_length: Option<i32>,
    crypto_metadata: Option<ColumnCryptoMetaData>,
}

impl ColumnChunkMetaData {
    fn new(column_descr: ColumnDescPtr, chunk: &ColumnChunk, meta_data: ColumnMetaData) -> Result<Self> {
        if meta_data.num_values < 0
            || meta_data.total_compressed_size < 0
            || meta_data.data_page_offset < 0
            || meta_data.dictionary_page_offset.is_some_and(|o| o < 0)
        {
            return Err(corrupt_err!(
                "Column '{}' has negative sizes or offsets in its metadata",
                column_descr.path()
            ));
        }
        Ok(Self {
            column_descr,
            encodings: meta_data.encodings,
            num_values: meta_data.num_values,
            total_compressed_size: meta_data.total_compressed_size,
            total_uncompressed_size: meta_data.total_uncompressed_size,
            data_page_offset: meta_data.data_page_offset,
            dictionary_page_offset: meta_data.dictionary_page_offset,
            offset_index_offset: chunk.offset_index_offset,
            offset_index_length: chunk.offset_index_length,
            crypto_metadata: chunk.crypto_metadata.clone(),
        })
    }

    /// Path (or identifier) of this column.
    pub fn column_path(&self) -> &ColumnPath {
        self.column_descr.path()
    }

    /// Descriptor for this column.
    pub fn column_descr(&self) -> &ColumnDescPtr {
        &self.column_descr
    }

    /// Type of this column. Must be primitive.
    pub fn column_type(&self) -> Type {
        self.column_descr.physical_type()
    }

    /// All encodings used for this column.
    pub fn encodings(&self) -> &[Encoding] {
        &self.encodings
    }

    /// Total number of values in this column chunk.
    pub fn num_values(&self) -> i64 {
        self.num_values
    }

    /// Returns the total compressed data size of this column chunk.
    pub fn compressed_size(&self) -> i64 {
        self.total_compressed_size
    }

    /// Returns the total uncompressed data size of this column chunk.
    pub fn uncompressed_size(&self) -> i64 {
        self.total_uncompressed_size
    }

    /// Returns the offset for the column data.
    pub fn data_page_offset(&self) -> i64 {
        self.data_page_offset
    }

    /// Returns the offset for the dictionary page, if any.
    pub fn dictionary_page_offset(&self) -> Option<i64> {
        self.dictionary_page_offset
    }

    /// Returns the offset and length in bytes of the column chunk within the file
    pub fn byte_range(&self) -> (u64, u64) {
        let col_start = match self.dictionary_page_offset() {
            Some(dictionary_page_offset) => dictionary_page_offset,
            None => self.data_page_offset(),
        };
        let col_len = self.compressed_size();
        assert!(
            col_start >= 0 && col_len >= 0,
            "column start and length should not be negative"
        );
        (col_start as u64, col_len as u64)
    }

    /// Returns the offset for the offset index.
    pub fn offset_index_offset(&self) -> Option<i64> {
        self.offset_index_offset
    }

    /// Returns the length for the offset index.
    pub fn offset_index_length(&self) -> Option<i32> {
        self.offset_index_length
    }

    /// Returns the crypto metadata, or `None` if the column is not encrypted
    pub fn crypto_metadata(&self) -> Option<&ColumnCryptoMetaData> {
        self.crypto_metadata.as_ref()
    }

    /// Returns whether the column chunk is encrypted
    pub fn is_encrypted(&self) -> bool {
        self.crypto_metadata.is_some()
    }
}

/// Application and version that wrote a file, parsed from `created_by`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApplicationVersion {
    application: String,
    version: (u32, u32, u32),
}

impl ApplicationVersion {
    /// Parses strings such as `parquet-mr version 1.2.8 (build abcd)`
    pub fn parse(created_by: &str) -> Option<Self> {
        let mut parts = created_by.split_whitespace();
        let application = parts.next()?.to_lowercase();
        if parts.next()? != "version" {
            return None;
        }
        let mut numbers = parts.next()?.split('.').map(|n| {
            let digits: String = n.chars().take_while(|c| c.is_ascii_digit()).collect();
            digits.parse::<u32>().ok()
        });
        let major = numbers.next()??;
        let minor = numbers.next().flatten().unwrap_or(0);
        let patch = numbers.next().flatten().unwrap_or(0);
        Some(Self {
            application,
            version: (major, minor, patch),
        })
    }

    /// Returns the application name, in lower case
    pub fn application(&self) -> &str {
        &self.application
    }

    /// Returns the `(major, minor, patch)` version
    pub fn version(&self) -> (u32, u32, u32) {
        self.version
    }

    /// Returns whether the writer left the dictionary page header out of the column
    /// chunk sizes (PARQUET-816), which parquet-mr fixed in 1.2.9
    pub fn is_affected_by_parquet_816(&self) -> bool {
        self.application == "parquet-mr" && self.version < (1, 2, 9)
    }
}
