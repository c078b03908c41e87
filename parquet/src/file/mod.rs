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

//! Low level APIs for reading and writing encrypted and plaintext parquet files.
//!
//! Provides access to file and row group readers and writers, and to file metadata.
//!
//! # See Also:
//! * [`SerializedFileReader`] and [`SerializedFileWriter`] for reading / writing parquet
//! * [`metadata`]: for working with metadata such as schema
//!
//! [`SerializedFileReader`]: serialized_reader::SerializedFileReader
//! [`SerializedFileWriter`]: writer::SerializedFileWriter
//!
//! # Example of writing and reading an encrypted file
//!
//! ```rust
//! use std::sync::Arc;
//! use bytes::Bytes;
//! use parquet_crypto::{
//!     basic::Type,
//!     column::values::ColumnValues,
//!     encryption::decrypt::FileDecryptionProperties,
//!     encryption::encrypt::FileEncryptionProperties,
//!     file::{
//!         properties::{ReaderProperties, WriterProperties},
//!         reader::{FileReader, RowGroupReader},
//!         serialized_reader::SerializedFileReader,
//!         writer::SerializedFileWriter,
//!     },
//!     schema::types::{ColumnDescriptor, SchemaDescriptor},
//! };
//!
//! let footer_key = b"0123456789012345".to_vec();
//! let schema = SchemaDescriptor::new("schema", vec![ColumnDescriptor::new("b", Type::INT32)])
//!     .unwrap();
//! let encryption = FileEncryptionProperties::builder(footer_key.clone()).build().unwrap();
//! let props = WriterProperties::builder()
//!     .with_file_encryption_properties(encryption)
//!     .build();
//!
//! let mut writer = SerializedFileWriter::new(vec![], Arc::new(schema), Arc::new(props)).unwrap();
//! writer.write_row_group(vec![ColumnValues::Int32(vec![1, 2, 3])]).unwrap();
//! let bytes = Bytes::from(writer.into_inner().unwrap());
//! assert_eq!(&bytes[0..4], b"PARE");
//!
//! let decryption = FileDecryptionProperties::builder()
//!     .with_footer_key(footer_key)
//!     .build()
//!     .unwrap();
//! let options = ReaderProperties::builder()
//!     .with_file_decryption_properties(decryption)
//!     .build();
//! let reader = SerializedFileReader::new_with_options(bytes, options).unwrap();
//! let row_group = reader.get_row_group(0).unwrap();
//! assert_eq!(
//!     row_group.read_column(0).unwrap(),
//!     ColumnValues::Int32(vec![1, 2, 3])
//! );
//! ```

pub mod metadata;
pub mod properties;
pub mod reader;
pub mod serialized_reader;
pub mod writer;

/// The length of the parquet footer in bytes
pub const FOOTER_SIZE: usize = 8;
/// Number of bytes read from the end of the file when locating the footer
pub const DEFAULT_FOOTER_READ_SIZE: usize = 64 * 1024;
const PARQUET_MAGIC: [u8; 4] = [b'P', b'A', b'R', b'1'];
const PARQUET_MAGIC_ENCR_FOOTER: [u8; 4] = [b'P', b'A', b'R', b'E'];
