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

//! Common Parquet errors and macros.

use core::num::TryFromIntError;
use std::error::Error;
use std::{io, result, str};

/// Parquet error enumeration
// Note: we don't implement PartialEq as the semantics for the
// external variant are not well defined (#3134)
#[derive(Debug)]
#[non_exhaustive]
pub enum ParquetError {
    /// General Parquet error.
    /// Returned when code violates normal workflow of working with Parquet files.
    General(String),
    /// "End of file" Parquet error.
    /// Returned when IO related failures occur, e.g. when there are not enough bytes to
    /// decode.
    EOF(String),
    /// Error when the requested index is more than the
    /// number of items expected
    IndexOutOfBound(usize, usize),
    /// An external error variant
    External(Box<dyn Error + Send + Sync>),
    /// Malformed or contradictory encryption or decryption properties.
    EncryptionConfig(String),
    /// Footer, magic or length invariants of the file are violated.
    CorruptFile(String),
    /// An authenticated module failed tag verification.
    /// No plaintext is released when this is returned.
    AuthenticationFailure(String),
    /// No key could be resolved for the footer or a column.
    KeyNotFound(String),
    /// The AAD prefix stored in the file differs from the one supplied by the caller.
    AadPrefixMismatch(String),
    /// The file requires an AAD prefix that neither the file nor the caller provides.
    MissingAadPrefix(String),
    /// The signature of a plaintext footer does not match its content.
    FooterIntegrity(String),
}

impl std::fmt::Display for ParquetError {
    fn fmt(&self, fmt: &mut std::fmt::Formatter) -> std::fmt::Result {
        match &self {
            ParquetError::General(message) => {
                write!(fmt, "Parquet error: {message}")
            }
            ParquetError::EOF(message) => write!(fmt, "EOF: {message}"),
            ParquetError::IndexOutOfBound(index, bound) => {
                write!(fmt, "Index {index} out of bound: {bound}")
            }
            ParquetError::External(e) => write!(fmt, "External: {e}"),
            ParquetError::EncryptionConfig(message) => {
                write!(fmt, "Encryption configuration error: {message}")
            }
            ParquetError::CorruptFile(message) => write!(fmt, "Corrupt file: {message}"),
            ParquetError::AuthenticationFailure(message) => {
                write!(fmt, "Authentication failure: {message}")
            }
            ParquetError::KeyNotFound(message) => write!(fmt, "Key not found: {message}"),
            ParquetError::AadPrefixMismatch(message) => {
                write!(fmt, "AAD prefix mismatch: {message}")
            }
            ParquetError::MissingAadPrefix(message) => {
                write!(fmt, "Missing AAD prefix: {message}")
            }
            ParquetError::FooterIntegrity(message) => {
                write!(fmt, "Footer integrity error: {message}")
            }
        }
    }
}

impl Error for ParquetError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            ParquetError::External(e) => Some(e.as_ref()),
            _ => None,
        }
    }
}

impl From<TryFromIntError> for ParquetError {
    fn from(e: TryFromIntError) -> ParquetError {
        ParquetError::General(format!("Integer overflow: {e}"))
    }
}

impl From<io::Error> for ParquetError {
    fn from(e: io::Error) -> ParquetError {
        ParquetError::External(Box::new(e))
    }
}

impl From<str::Utf8Error> for ParquetError {
    fn from(e: str::Utf8Error) -> ParquetError {
        ParquetError::External(Box::new(e))
    }
}

impl From<ring::error::Unspecified> for ParquetError {
    fn from(e: ring::error::Unspecified) -> ParquetError {
        ParquetError::External(Box::new(e))
    }
}

/// A specialized `Result` for Parquet errors.
pub type Result<T, E = ParquetError> = result::Result<T, E>;

// ----------------------------------------------------------------------
// Conversion from `ParquetError` to other types of `Error`s

impl From<ParquetError> for io::Error {
    fn from(e: ParquetError) -> Self {
        io::Error::other(e)
    }
}

// ----------------------------------------------------------------------
// Convenient macros for different errors

macro_rules! general_err {
    ($fmt:expr) => (ParquetError::General($fmt.to_owned()));
    ($fmt:expr, $($args:expr),*) => (ParquetError::General(format!($fmt, $($args),*)));
}

macro_rules! eof_err {
    ($fmt:expr) => (ParquetError::EOF($fmt.to_owned()));
    ($fmt:expr, $($args:expr),*) => (ParquetError::EOF(format!($fmt, $($args),*)));
}

macro_rules! config_err {
    ($fmt:expr) => (ParquetError::EncryptionConfig($fmt.to_owned()));
    ($fmt:expr, $($args:expr),*) => (ParquetError::EncryptionConfig(format!($fmt, $($args),*)));
}

macro_rules! corrupt_err {
    ($fmt:expr) => (ParquetError::CorruptFile($fmt.to_owned()));
    ($fmt:expr, $($args:expr),*) => (ParquetError::CorruptFile(format!($fmt, $($args),*)));
}

macro_rules! auth_err {
    ($fmt:expr) => (ParquetError::AuthenticationFailure($fmt.to_owned()));
    ($fmt:expr, $($args:expr),*) => (ParquetError::AuthenticationFailure(format!($fmt, $($args),*)));
}

macro_rules! key_err {
    ($fmt:expr) => (ParquetError::KeyNotFound($fmt.to_owned()));
    ($fmt:expr, $($args:expr),*) => (ParquetError::KeyNotFound(format!($fmt, $($args),*)));
}
