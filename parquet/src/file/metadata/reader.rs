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

use std::sync::Arc;

use bytes::Bytes;
use tracing::{debug, trace};

use crate::encryption::decrypt::FileDecryptionProperties;
use crate::errors::{ParquetError, Result};
use crate::file::metadata::parser::{decode_encrypted_footer, decode_plaintext_footer};
use crate::file::metadata::ParquetMetaData;
use crate::file::reader::ChunkReader;
use crate::file::{
    DEFAULT_FOOTER_READ_SIZE, FOOTER_SIZE, PARQUET_MAGIC, PARQUET_MAGIC_ENCR_FOOTER,
};

/// Whether the footer of a file is stored in plaintext or encrypted
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FooterMode {
    /// `PAR1` trailer. Encrypted files in this mode carry a footer signature
    Plaintext,
    /// `PARE` trailer. The footer is preceded by the file crypto metadata
    Encrypted,
}

/// Lifecycle of a file reader
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FooterState {
    /// Nothing has been read yet
    Unopened,
    /// The trailer was read and identified the footer mode
    FooterDetected(FooterMode),
    /// The footer was decoded, verified or decrypted
    MetadataParsed,
    /// Row groups can be read
    Ready,
    /// The reader was closed and its key material released
    Closed,
    /// Opening the file failed
    Failed,
}

/// Parsed representation of the trailer of a Parquet file: the length of the metadata
/// and the magic identifying the footer mode
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FooterTail {
    metadata_length: usize,
    encrypted_footer: bool,
}

impl FooterTail {
    /// Decodes the last [`FOOTER_SIZE`] bytes of a Parquet file
    pub fn try_new(slice: &[u8; FOOTER_SIZE]) -> Result<FooterTail> {
        let magic = &slice[4..];
        let encrypted_footer = if magic == PARQUET_MAGIC_ENCR_FOOTER {
            true
        } else if magic == PARQUET_MAGIC {
            false
        } else {
            return Err(corrupt_err!("Invalid Parquet file. Corrupt footer"));
        };
        let mut metadata_len = [0u8; 4];
        metadata_len.copy_from_slice(&slice[..4]);
        Ok(FooterTail {
            metadata_length: u32::from_le_bytes(metadata_len) as usize,
            encrypted_footer,
        })
    }

    /// The length of the footer metadata in bytes
    pub fn metadata_length(&self) -> usize {
        self.metadata_length
    }

    /// Whether the footer metadata is encrypted
    pub fn is_encrypted_footer(&self) -> bool {
        self.encrypted_footer
    }

    /// The footer mode indicated by the trailing magic
    pub fn mode(&self) -> FooterMode {
        if self.encrypted_footer {
            FooterMode::Encrypted
        } else {
            FooterMode::Plaintext
        }
    }
}

/// Reads [`ParquetMetaData`] from the end of a [`ChunkReader`]
///
/// A single window of [`Self::with_footer_read_size`] bytes is read from the end of the
/// file. If the footer is larger than that window, a second read fetches the rest.
///
/// # Example
/// ```no_run
/// # use parquet_crypto::file::metadata::ParquetMetaDataReader;
/// # fn open_parquet_file(path: &str) -> std::fs::File { unimplemented!(); }
/// let file = open_parquet_file("some_path.parquet");
/// let metadata = ParquetMetaDataReader::new().parse_and_finish(&file).unwrap();
/// println!("{} row groups", metadata.num_row_groups());
/// ```
#[derive(Debug)]
pub struct ParquetMetaDataReader {
    state: FooterState,
    metadata: Option<ParquetMetaData>,
    footer_read_size: usize,
    file_decryption_properties: Option<Arc<FileDecryptionProperties>>,
}

impl Default for ParquetMetaDataReader {
    fn default() -> Self {
        Self::new()
    }
}

impl ParquetMetaDataReader {
    /// Create a new [`ParquetMetaDataReader`]
    pub fn new() -> Self {
        Self {
            state: FooterState::Unopened,
            metadata: None,
            footer_read_size: DEFAULT_FOOTER_READ_SIZE,
            file_decryption_properties: None,
        }
    }

    /// Sets the number of bytes read from the end of the file in the first read
    pub fn with_footer_read_size(mut self, footer_read_size: usize) -> Self {
        self.footer_read_size = footer_read_size;
        self
    }

    /// Provide the FileDecryptionProperties to use when decrypting the file.
    ///
    /// This is only necessary when the file is encrypted.
    pub fn with_decryption_properties(
        mut self,
        properties: Option<Arc<FileDecryptionProperties>>,
    ) -> Self {
        self.file_decryption_properties = properties;
        self
    }

    /// Returns the state reached by the last parse
    pub fn state(&self) -> FooterState {
        self.state
    }

    /// Return the parsed [`ParquetMetaData`] struct and leave `None` in its place.
    pub fn finish(&mut self) -> Result<ParquetMetaData> {
        self.metadata
            .take()
            .ok_or_else(|| general_err!("could not parse parquet metadata"))
    }

    /// Given a [`ChunkReader`], parse and return the [`ParquetMetaData`] in a single pass.
    pub fn parse_and_finish<R: ChunkReader>(mut self, reader: &R) -> Result<ParquetMetaData> {
        self.try_parse(reader)?;
        self.finish()
    }

    /// Attempts to parse the footer metadata of `reader`.
    ///
    /// On failure the reader moves to [`FooterState::Failed`] and cannot be reused.
    pub fn try_parse<R: ChunkReader>(&mut self, reader: &R) -> Result<()> {
        if self.state != FooterState::Unopened {
            return Err(general_err!(
                "Cannot parse metadata in state {:?}",
                self.state
            ));
        }
        match self.parse_metadata(reader) {
            Ok(metadata) => {
                self.metadata = Some(metadata);
                self.state = FooterState::MetadataParsed;
                Ok(())
            }
            Err(e) => {
                debug!(error = %e, "failed to parse parquet footer");
                self.state = FooterState::Failed;
                Err(e)
            }
        }
    }

    fn parse_metadata<R: ChunkReader>(&mut self, chunk_reader: &R) -> Result<ParquetMetaData> {
        let file_size = chunk_reader.len();
        if file_size < FOOTER_SIZE as u64 {
            return Err(corrupt_err!(
                "Invalid Parquet file. Size is smaller than footer: {}",
                file_size
            ));
        }

        let read_size = file_size.min(self.footer_read_size.max(FOOTER_SIZE) as u64);
        let window = chunk_reader.get_bytes(file_size - read_size, read_size as usize)?;
        let mut footer = [0u8; FOOTER_SIZE];
        footer.copy_from_slice(&window[window.len() - FOOTER_SIZE..]);

        let tail = Self::decode_footer_tail(&footer)?;
        self.state = FooterState::FooterDetected(tail.mode());
        let metadata_len = tail.metadata_length();
        debug!(mode = ?tail.mode(), metadata_len, "detected parquet footer");
        let footer_metadata_len = FOOTER_SIZE + metadata_len;
        if footer_metadata_len as u64 > file_size {
            return Err(corrupt_err!(
                "Invalid Parquet file. Reported metadata length of {} + {} byte footer, but file is only {} bytes",
                metadata_len,
                FOOTER_SIZE,
                file_size
            ));
        }

        let metadata_bytes: Bytes = if footer_metadata_len > window.len() {
            trace!(
                metadata_len,
                read_size,
                "footer larger than initial read, fetching remainder"
            );
            let start = file_size - footer_metadata_len as u64;
            chunk_reader.get_bytes(start, metadata_len)?
        } else {
            window.slice(window.len() - footer_metadata_len..window.len() - FOOTER_SIZE)
        };

        let properties = self.file_decryption_properties.as_ref();
        match tail.mode() {
            FooterMode::Plaintext => decode_plaintext_footer(&metadata_bytes, properties),
            FooterMode::Encrypted => decode_encrypted_footer(&metadata_bytes, properties),
        }
    }

    /// Decodes the last [`FOOTER_SIZE`] bytes of a Parquet file
    pub fn decode_footer_tail(slice: &[u8; FOOTER_SIZE]) -> Result<FooterTail> {
        FooterTail::try_new(slice)
    }
}
