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

//!
//! This crate implements [Parquet Modular Encryption] for the
//! [Apache Parquet](https://parquet.apache.org/) file format.
//!
//! # Format Overview
//!
//! Parquet files contain metadata, along with zero or more "row groups", each
//! row group containing one or more columns. Each column chunk is a sequence of
//! pages, and the file metadata is stored in a footer at the end of the file.
//!
//! Modular encryption encrypts each of these parts as a separate *module*:
//! page headers, page bodies, column metadata, offset indexes and the footer.
//! Every module is bound to its position in the file through additional
//! authenticated data (AAD), so modules cannot be swapped, reordered or moved
//! between files without detection.
//!
//! Columns may be encrypted with the footer key or with their own keys, and
//! columns can be left unencrypted. The footer is either encrypted (`PARE`
//! files) or stored in plaintext and signed (`PAR1` files), which lets legacy
//! readers access the unencrypted columns.
//!
//! [Parquet Modular Encryption]: https://github.com/apache/parquet-format/blob/master/Encryption.md
//!
//! # APIs
//!
//! ## Encryption and Decryption Properties
//!
//! The [`encryption`] module provides [`FileEncryptionProperties`] and
//! [`FileDecryptionProperties`], which configure keys, algorithms and AAD
//! prefixes, as well as the [`KeyRetriever`] and [`AadPrefixVerifier`] traits.
//!
//! ## Metadata and Schema
//!
//! The [`schema`] module provides APIs to work with Parquet schemas. The
//! [`file::metadata`] module provides APIs to work with Parquet metadata.
//!
//! ## Read/Write Parquet
//!
//! [`SerializedFileWriter`] writes row groups of [`ColumnValues`], and
//! [`SerializedFileReader`] reads them back. See [`mod@file`] for an example.
//!
//! [`FileEncryptionProperties`]: encryption::encrypt::FileEncryptionProperties
//! [`FileDecryptionProperties`]: encryption::decrypt::FileDecryptionProperties
//! [`KeyRetriever`]: encryption::decrypt::KeyRetriever
//! [`AadPrefixVerifier`]: encryption::decrypt::AadPrefixVerifier
//! [`SerializedFileWriter`]: file::writer::SerializedFileWriter
//! [`SerializedFileReader`]: file::serialized_reader::SerializedFileReader
//! [`ColumnValues`]: column::values::ColumnValues

#[macro_use]
pub mod errors;
pub mod basic;
pub mod codec;
pub mod format;

pub mod column;
pub mod encryption;
pub mod file;
pub mod schema;
