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

//! Serialized structures of the Parquet file metadata.
//!
//! These mirror the Parquet format definitions that matter for modular encryption and
//! are encoded with [`crate::codec`].

use serde::{Deserialize, Serialize};

use crate::basic::{Encoding, PageType, Type};

/// A leaf column of the schema.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SchemaElement {
    pub path: Vec<String>,
    pub type_: Type,
}

/// Description for file metadata
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FileMetaData {
    /// Version of this file
    pub version: i32,
    pub schema_name: String,
    pub schema: Vec<SchemaElement>,
    pub num_rows: i64,
    pub row_groups: Vec<RowGroup>,
    /// String for application that wrote this file, e.g. `parquet-mr version 1.8.0 (build abcd)`
    pub created_by: Option<String>,
    /// Encryption algorithm. This field is set only in encrypted files
    /// with plaintext footer. Files with encrypted footer store algorithm id
    /// in [`FileCryptoMetaData`].
    pub encryption_algorithm: Option<EncryptionAlgorithm>,
    /// Retrieval metadata of key used for signing the footer.
    /// Used only in encrypted files with plaintext footer.
    pub footer_signing_key_metadata: Option<Vec<u8>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RowGroup {
    /// Metadata for each column chunk in this row group.
    pub columns: Vec<ColumnChunk>,
    pub total_byte_size: i64,
    pub num_rows: i64,
    /// Byte offset from beginning of file to first page (data or dictionary) in this row group
    pub file_offset: Option<i64>,
    pub total_compressed_size: Option<i64>,
    /// Row group ordinal in the file
    pub ordinal: Option<i16>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColumnChunk {
    /// Byte offset in file_path to the ColumnMetaData
    pub file_offset: i64,
    /// Column metadata for this chunk. Absent for columns encrypted with their own key
    /// in files with an encrypted footer.
    pub meta_data: Option<ColumnMetaData>,
    /// File offset of ColumnChunk's OffsetIndex
    pub offset_index_offset: Option<i64>,
    /// Size of ColumnChunk's OffsetIndex, in bytes
    pub offset_index_length: Option<i32>,
    /// Crypto metadata of encrypted columns
    pub crypto_metadata: Option<ColumnCryptoMetaData>,
    /// Encrypted column metadata for this chunk
    pub encrypted_column_metadata: Option<Vec<u8>>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnMetaData {
    pub type_: Type,
    /// Set of all encodings used for this column.
    pub encodings: Vec<Encoding>,
    pub path_in_schema: Vec<String>,
    /// Number of values in this column
    pub num_values: i64,
    /// total byte size of all uncompressed pages in this column chunk (including the headers)
    pub total_uncompressed_size: i64,
    /// total byte size of all pages in this column chunk (including the headers)
    pub total_compressed_size: i64,
    /// Byte offset from beginning of file to first data page
    pub data_page_offset: i64,
    /// Byte offset from the beginning of file to first (only) dictionary page
    pub dictionary_page_offset: Option<i64>,
}

#[allow(non_camel_case_types)]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ColumnCryptoMetaData {
    ENCRYPTION_WITH_FOOTER_KEY,
    ENCRYPTION_WITH_COLUMN_KEY(EncryptionWithColumnKey),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EncryptionWithColumnKey {
    /// Column path in schema
    pub path_in_schema: Vec<String>,
    /// Retrieval metadata of column encryption key
    pub key_metadata: Option<Vec<u8>>,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct AesGcmV1 {
    /// AAD prefix
    pub aad_prefix: Option<Vec<u8>>,
    /// Unique file identifier part of AAD suffix
    pub aad_file_unique: Option<Vec<u8>>,
    /// In files encrypted with AAD prefix without storing it,
    /// readers must supply the prefix
    pub supply_aad_prefix: Option<bool>,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct AesGcmCtrV1 {
    /// AAD prefix
    pub aad_prefix: Option<Vec<u8>>,
    /// Unique file identifier part of AAD suffix
    pub aad_file_unique: Option<Vec<u8>>,
    /// In files encrypted with AAD prefix without storing it,
    /// readers must supply the prefix
    pub supply_aad_prefix: Option<bool>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum EncryptionAlgorithm {
    AesGcmV1(AesGcmV1),
    AesGcmCtrV1(AesGcmCtrV1),
}

/// Crypto metadata for files with encrypted footer
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileCryptoMetaData {
    /// Encryption algorithm. This field is only used for files
    /// with encrypted footer. Files with plaintext footer store algorithm id
    /// inside footer ([`FileMetaData`] structure).
    pub encryption_algorithm: EncryptionAlgorithm,
    /// Retrieval metadata of key used for encryption of footer,
    /// and (possibly) columns
    pub key_metadata: Option<Vec<u8>>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageHeader {
    pub type_: PageType,
    /// Uncompressed page size in bytes (not including this header)
    pub uncompressed_page_size: i32,
    /// Stored page size in bytes (not including this header), after encryption
    pub compressed_page_size: i32,
    pub num_values: i32,
    pub encoding: Encoding,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageLocation {
    /// Offset of the page in the file
    pub offset: i64,
    /// Size of the page, including header. Sum of compressed_page_size and header length
    pub compressed_page_size: i32,
    /// Index within the RowGroup of the first row of the page
    pub first_row_index: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OffsetIndex {
    /// PageLocations, ordered by increasing PageLocation.offset
    pub page_locations: Vec<PageLocation>,
}
