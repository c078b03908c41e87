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

//! Contains implementations of the reader traits FileReader, RowGroupReader and PageReader
//! Also contains implementations of the ChunkReader for files (with buffering) and byte arrays (RAM)

use std::sync::Arc;

use bytes::Bytes;
use tracing::{debug, trace};

use crate::basic::PageType;
use crate::codec;
use crate::column::page::{Page, PageReader};
use crate::encryption::decrypt::CryptoContext;
use crate::errors::{ParquetError, Result};
use crate::file::metadata::*;
use crate::file::properties::{ReaderProperties, ReaderPropertiesPtr};
use crate::file::reader::*;
use crate::format::{OffsetIndex, PageHeader};

/// Upper bound of the dictionary page header size left out of the column chunk
/// length by writers affected by PARQUET-816
const MAX_DICT_HEADER_SIZE: u64 = 100;

/// A serialized implementation for Parquet [`FileReader`].
///
/// The footer is located, verified or decrypted when the reader is created. Calling
/// [`Self::close`] releases the key material cached for the file.
pub struct SerializedFileReader<R: ChunkReader> {
    chunk_reader: Arc<R>,
    metadata: Arc<ParquetMetaData>,
    props: ReaderPropertiesPtr,
    state: FooterState,
}

impl<R: 'static + ChunkReader> SerializedFileReader<R> {
    /// Creates file reader from a Parquet file.
    /// Returns an error if the Parquet file does not exist or is corrupt.
    pub fn new(chunk_reader: R) -> Result<Self> {
        Self::new_with_options(chunk_reader, ReaderProperties::default())
    }

    /// Creates file reader from a Parquet file with read options.
    /// Returns an error if the Parquet file does not exist, is corrupt or cannot be
    /// decrypted with the provided properties.
    pub fn new_with_options(chunk_reader: R, options: ReaderProperties) -> Result<Self> {
        let metadata = ParquetMetaDataReader::new()
            .with_footer_read_size(options.footer_read_size())
            .with_decryption_properties(options.file_decryption_properties().cloned())
            .parse_and_finish(&chunk_reader)?;
        debug!(
            num_row_groups = metadata.num_row_groups(),
            encryption = ?metadata.encryption_algorithm(),
            "opened parquet file"
        );
        Ok(Self {
            chunk_reader: Arc::new(chunk_reader),
            metadata: Arc::new(metadata),
            props: Arc::new(options),
            state: FooterState::Ready,
        })
    }
}

impl<R: ChunkReader> SerializedFileReader<R> {
    /// Returns the lifecycle state of this reader
    pub fn footer_state(&self) -> FooterState {
        self.state
    }

    /// Returns the properties this reader was created with
    pub fn properties(&self) -> &ReaderPropertiesPtr {
        &self.props
    }

    /// Releases the keys and decryption engines of the file.
    ///
    /// Row groups can no longer be read once the reader is closed, and column metadata
    /// that is stored encrypted can no longer be decrypted.
    pub fn close(&mut self) {
        if let Some(file_decryptor) = self.metadata.file_decryptor() {
            file_decryptor.wipe_out();
        }
        self.state = FooterState::Closed;
    }
}

impl<R: 'static + ChunkReader> FileReader for SerializedFileReader<R> {
    fn metadata(&self) -> &ParquetMetaData {
        &self.metadata
    }

    fn num_row_groups(&self) -> usize {
        self.metadata.num_row_groups()
    }

    fn get_row_group(&self, i: usize) -> Result<Box<dyn RowGroupReader + '_>> {
        if self.state != FooterState::Ready {
            return Err(general_err!(
                "Cannot read row group {} in state {:?}",
                i,
                self.state
            ));
        }
        let num_row_groups = self.num_row_groups();
        if i >= num_row_groups {
            return Err(ParquetError::IndexOutOfBound(i, num_row_groups));
        }
        Ok(Box::new(SerializedRowGroupReader::new(
            Arc::clone(&self.chunk_reader),
            Arc::clone(&self.metadata),
            i,
        )))
    }
}

/// A serialized implementation for Parquet [`RowGroupReader`].
pub struct SerializedRowGroupReader<R: ChunkReader> {
    chunk_reader: Arc<R>,
    metadata: Arc<ParquetMetaData>,
    row_group: usize,
}

impl<R: ChunkReader> SerializedRowGroupReader<R> {
    fn new(chunk_reader: Arc<R>, metadata: Arc<ParquetMetaData>, row_group: usize) -> Self {
        Self {
            chunk_reader,
            metadata,
            row_group,
        }
    }

    /// Creates the decryption context of column `i`, or `None` if it is not encrypted
    fn crypto_context(&self, i: usize, col: &ColumnChunkMetaData) -> Result<Option<CryptoContext>> {
        let Some(crypto_metadata) = col.crypto_metadata() else {
            return Ok(None);
        };
        let file_decryptor = self.metadata.file_decryptor().ok_or_else(|| {
            config_err!(
                "Column '{}' is encrypted but no decryption properties were provided",
                col.column_path()
            )
        })?;
        let metadata_decryptor =
            file_decryptor.get_column_meta_decryptor(col.column_path(), crypto_metadata)?;
        let data_decryptor =
            file_decryptor.get_column_data_decryptor(col.column_path(), crypto_metadata)?;
        Ok(Some(CryptoContext::new(
            self.row_group,
            i,
            metadata_decryptor,
            data_decryptor,
        )))
    }
}

impl<R: 'static + ChunkReader> RowGroupReader for SerializedRowGroupReader<R> {
    fn metadata(&self) -> &RowGroupMetaData {
        self.metadata.row_group(self.row_group)
    }

    fn num_columns(&self) -> usize {
        self.metadata().num_columns()
    }

    fn column_chunk(&self, i: usize) -> Result<ColumnChunkMetaData> {
        self.metadata.column_chunk(self.row_group, i)
    }

    fn get_column_page_reader(&self, i: usize) -> Result<Box<dyn PageReader>> {
        let col = self.column_chunk(i)?;
        let (col_start, mut col_length) = col.byte_range();

        let writer_version = self.metadata.file_metadata().writer_version();
        if writer_version.is_some_and(|v| v.is_affected_by_parquet_816()) {
            let bytes_remaining = self
                .chunk_reader
                .len()
                .saturating_sub(col_start + col_length);
            let padding = bytes_remaining.min(MAX_DICT_HEADER_SIZE);
            trace!(column = i, padding, "padding column chunk of legacy writer");
            col_length += padding;
        }

        let crypto_context = self.crypto_context(i, &col)?;
        let buf = self
            .chunk_reader
            .get_bytes(col_start, usize::try_from(col_length)?)?;
        Ok(Box::new(SerializedPageReader::new(
            buf,
            col.num_values(),
            col.dictionary_page_offset().is_some(),
            crypto_context,
        )))
    }

    fn read_offset_index(&self, i: usize) -> Result<Option<OffsetIndex>> {
        let col = self.column_chunk(i)?;
        let (Some(offset), Some(length)) = (col.offset_index_offset(), col.offset_index_length())
        else {
            return Ok(None);
        };
        let buf = self
            .chunk_reader
            .get_bytes(u64::try_from(offset)?, usize::try_from(length)?)?;
        let buf = match self.crypto_context(i, &col)? {
            Some(mut crypto_context) => Bytes::from(crypto_context.decrypt_offset_index(&buf)?),
            None => buf,
        };
        Ok(Some(codec::deserialize::<OffsetIndex>(&buf)?.0))
    }
}

/// A serialized implementation for Parquet [`PageReader`].
///
/// Reads pages until the number of values of the column chunk has been seen.
pub struct SerializedPageReader {
    buf: Bytes,
    offset: usize,
    remaining_values: i64,
    require_dictionary: bool,
    page_index: usize,
    crypto_context: Option<CryptoContext>,
}

impl SerializedPageReader {
    /// Creates a reader over the bytes of a column chunk
    pub(crate) fn new(
        buf: Bytes,
        num_values: i64,
        has_dictionary_page: bool,
        crypto_context: Option<CryptoContext>,
    ) -> Self {
        Self {
            buf,
            offset: 0,
            remaining_values: num_values,
            require_dictionary: has_dictionary_page,
            page_index: 0,
            crypto_context,
        }
    }

    fn read_page_header(&mut self) -> Result<PageHeader> {
        let mut input = &self.buf[self.offset..];
        let available = input.len();
        let header = match self.crypto_context.as_mut() {
            Some(crypto_context) => {
                let buf =
                    crypto_context.read_page_header(&mut input, self.page_index, self.require_dictionary)?;
                codec::deserialize::<PageHeader>(&buf)?.0
            }
            None => {
                let (header, consumed) = codec::deserialize::<PageHeader>(input)?;
                input = &input[consumed..];
                header
            }
        };
        self.offset += available - input.len();
        Ok(header)
    }
}

impl Iterator for SerializedPageReader {
    type Item = Result<Page>;

    fn next(&mut self) -> Option<Self::Item> {
        self.get_next_page().transpose()
    }
}

impl PageReader for SerializedPageReader {
    fn get_next_page(&mut self) -> Result<Option<Page>> {
        if self.remaining_values <= 0 && !self.require_dictionary {
            return Ok(None);
        }
        if self.offset >= self.buf.len() {
            return Err(eof_err!(
                "Column chunk ended with {} values remaining",
                self.remaining_values
            ));
        }

        let header = self.read_page_header()?;
        let dictionary_page = header.type_ == PageType::DICTIONARY_PAGE;
        if dictionary_page != self.require_dictionary {
            return Err(corrupt_err!(
                "Unexpected {} at page {} of column chunk",
                header.type_,
                self.page_index
            ));
        }

        let data_len = usize::try_from(header.compressed_page_size)?;
        let num_values = u32::try_from(header.num_values)?;
        if data_len > self.buf.len() - self.offset {
            return Err(eof_err!(
                "Page of {} bytes exceeds the {} bytes left in the column chunk",
                data_len,
                self.buf.len() - self.offset
            ));
        }
        let buf = self.buf.slice(self.offset..self.offset + data_len);
        self.offset += data_len;

        let buf = match self.crypto_context.as_mut() {
            Some(crypto_context) => {
                Bytes::from(crypto_context.decrypt_page(&buf, self.page_index, dictionary_page)?)
            }
            None => buf,
        };

        let page = if dictionary_page {
            self.require_dictionary = false;
            Page::DictionaryPage {
                buf,
                num_values,
                encoding: header.encoding,
            }
        } else {
            self.page_index += 1;
            self.remaining_values -= i64::from(num_values);
            Page::DataPage {
                buf,
                num_values,
                encoding: header.encoding,
            }
        };
        Ok(Some(page))
    }
}
