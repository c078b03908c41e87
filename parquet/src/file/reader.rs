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

//! File reader API and methods to access file metadata, row group
//! readers to read individual column chunks, and the offset index.

use bytes::Bytes;
use std::fs::File;
use std::io::{Read, Seek, SeekFrom};

use crate::column::page::PageReader;
use crate::column::reader::ColumnReader;
use crate::column::values::ColumnValues;
use crate::errors::{ParquetError, Result};
use crate::file::metadata::*;
use crate::format::OffsetIndex;

/// Length should return the total number of bytes in the input source.
/// It's mainly used to read the metadata, which is at the end of the source.
#[allow(clippy::len_without_is_empty)]
pub trait Length {
    /// Returns the amount of bytes of the inner source.
    fn len(&self) -> u64;
}

/// The ChunkReader trait returns ranges of bytes of a source.
///
/// For more information see [`File::try_clone`]
pub trait ChunkReader: Length + Send + Sync {
    /// Get a range as bytes
    ///
    /// Concurrent calls to [`Self::get_bytes`] may result in interleaved output
    ///
    /// See [`File::try_clone`] for more information
    fn get_bytes(&self, start: u64, length: usize) -> Result<Bytes>;
}

impl Length for File {
    fn len(&self) -> u64 {
        self.metadata().map(|m| m.len()).unwrap_or(0u64)
    }
}

impl ChunkReader for File {
    fn get_bytes(&self, start: u64, length: usize) -> Result<Bytes> {
        let mut buffer = Vec::with_capacity(length);
        let mut reader = self.try_clone()?;
        reader.seek(SeekFrom::Start(start))?;
        let read = reader.take(length as _).read_to_end(&mut buffer)?;

        if read != length {
            return Err(eof_err!(
                "Expected to read {} bytes, read only {}",
                length,
                read
            ));
        }
        Ok(buffer.into())
    }
}

impl Length for Bytes {
    fn len(&self) -> u64 {
        self.len() as u64
    }
}

impl ChunkReader for Bytes {
    fn get_bytes(&self, start: u64, length: usize) -> Result<Bytes> {
        let start = usize::try_from(start)?;
        let end = start
            .checked_add(length)
            .filter(|end| *end <= Bytes::len(self))
            .ok_or_else(|| {
                eof_err!(
                    "Expected to read {} bytes at offset {}, but source has {} bytes",
                    length,
                    start,
                    Bytes::len(self)
                )
            })?;
        Ok(self.slice(start..end))
    }
}

// ----------------------------------------------------------------------
// APIs for file & row group readers

/// Parquet file reader API. With this, user can get metadata information about the
/// Parquet file and can get reader for each row group.
pub trait FileReader: Send + Sync {
    /// Get metadata information about this file.
    fn metadata(&self) -> &ParquetMetaData;

    /// Get the total number of row groups for this file.
    fn num_row_groups(&self) -> usize;

    /// Get the `i`th row group reader.
    fn get_row_group(&self, i: usize) -> Result<Box<dyn RowGroupReader + '_>>;
}

/// Parquet row group reader API. With this, user can get metadata information about the
/// row group, as well as readers for each individual column chunk.
pub trait RowGroupReader: Send + Sync {
    /// Get metadata information about this row group.
    fn metadata(&self) -> &RowGroupMetaData;

    /// Get the total number of column chunks in this row group.
    fn num_columns(&self) -> usize;

    /// Get the metadata of the `i`th column chunk, decrypting it if necessary.
    fn column_chunk(&self, i: usize) -> Result<ColumnChunkMetaData>;

    /// Get page reader for the `i`th column chunk.
    fn get_column_page_reader(&self, i: usize) -> Result<Box<dyn PageReader>>;

    /// Read the offset index of the `i`th column chunk, or `None` if it has none.
    fn read_offset_index(&self, i: usize) -> Result<Option<OffsetIndex>>;

    /// Get value reader for the `i`th column chunk.
    fn get_column_reader(&self, i: usize) -> Result<ColumnReader> {
        let col_descr = self.metadata().schema_descr().column(i)?;
        let col_page_reader = self.get_column_page_reader(i)?;
        Ok(ColumnReader::new(col_descr.physical_type(), col_page_reader))
    }

    /// Read all values of the `i`th column chunk.
    fn read_column(&self, i: usize) -> Result<ColumnValues> {
        self.get_column_reader(i)?.read_all()
    }
}
