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

//! Contains file writer API, and provides methods to write row groups and columns by
//! using row group writers and column writers respectively.

use std::io::{BufWriter, IoSlice, Write};
use std::sync::Arc;

use tracing::{debug, trace};

use crate::codec;
use crate::column::values::ColumnValues;
use crate::column::writer::ColumnChunkWriter;
use crate::encryption::encrypt::FileEncryptor;
use crate::encryption::page_encryptor::PageEncryptor;
use crate::errors::{ParquetError, Result};
use crate::file::metadata::{start_magic, ParquetMetaDataWriter};
use crate::file::properties::WriterPropertiesPtr;
use crate::format::{self, ColumnChunk, ColumnCryptoMetaData, ColumnMetaData};
use crate::schema::types::{to_format, ColumnDescPtr, SchemaDescPtr};

/// A wrapper around a [`Write`] that keeps track of the number
/// of bytes that have been written. The given [`Write`] is wrapped
/// with a [`BufWriter`] to optimize writing performance.
pub struct TrackedWrite<W: Write> {
    inner: BufWriter<W>,
    bytes_written: usize,
}

impl<W: Write> TrackedWrite<W> {
    /// Create a new [`TrackedWrite`] from a [`Write`]
    pub fn new(inner: W) -> Self {
        let buf_write = BufWriter::new(inner);
        Self {
            inner: buf_write,
            bytes_written: 0,
        }
    }

    /// Returns the number of bytes written to this instance
    pub fn bytes_written(&self) -> usize {
        self.bytes_written
    }

    /// Returns a reference to the underlying writer.
    pub fn inner(&self) -> &W {
        self.inner.get_ref()
    }

    /// Returns the underlying writer.
    pub fn into_inner(self) -> Result<W> {
        self.inner.into_inner().map_err(|err| {
            ParquetError::General(format!("fail to get inner writer: {:?}", err.to_string()))
        })
    }
}

impl<W: Write> Write for TrackedWrite<W> {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        let bytes = self.inner.write(buf)?;
        self.bytes_written += bytes;
        Ok(bytes)
    }

    fn write_vectored(&mut self, bufs: &[IoSlice<'_>]) -> std::io::Result<usize> {
        let bytes = self.inner.write_vectored(bufs)?;
        self.bytes_written += bytes;
        Ok(bytes)
    }

    fn write_all(&mut self, buf: &[u8]) -> std::io::Result<()> {
        self.inner.write_all(buf)?;
        self.bytes_written += buf.len();

        Ok(())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        self.inner.flush()
    }
}

/// Parquet file writer API.
///
/// Each call to [`Self::write_row_group`] writes the pages of one row group, encrypting
/// the columns configured in the [`WriterProperties`] encryption properties. The footer
/// and offset indexes are written when the writer is closed.
///
/// A row group that fails after some of its pages were written leaves the writer failed:
/// further row groups and the footer are rejected.
///
/// [`WriterProperties`]: crate::file::properties::WriterProperties
pub struct SerializedFileWriter<W: Write> {
    buf: TrackedWrite<W>,
    schema: SchemaDescPtr,
    props: WriterPropertiesPtr,
    row_groups: Vec<format::RowGroup>,
    offset_indexes: Vec<Vec<Vec<u8>>>,
    file_encryptor: Option<FileEncryptor>,
    finished: bool,
    failed: bool,
}

impl<W: Write> std::fmt::Debug for SerializedFileWriter<W> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // implement Debug so this can be used with #[derive(Debug)]
        // in client code rather than actually listing all the fields
        f.debug_struct("SerializedFileWriter")
            .field("descr", &self.schema)
            .field("row_group_index", &self.row_groups.len())
            .field("encrypted", &self.file_encryptor.is_some())
            .field("failed", &self.failed)
            .finish_non_exhaustive()
    }
}

impl<W: Write + Send> SerializedFileWriter<W> {
    /// Creates new file writer.
    ///
    /// Fails if the encryption properties name columns that are not in `schema`.
    pub fn new(buf: W, schema: SchemaDescPtr, properties: WriterPropertiesPtr) -> Result<Self> {
        let file_encryptor = match properties.file_encryption_properties() {
            Some(encryption) => {
                encryption.validate_encrypted_column_names(&schema)?;
                Some(FileEncryptor::new(Arc::clone(encryption))?)
            }
            None => None,
        };

        let mut buf = TrackedWrite::new(buf);
        buf.write_all(&start_magic(file_encryptor.as_ref()))?;
        debug!(
            schema = schema.name(),
            encrypted = file_encryptor.is_some(),
            "created parquet file writer"
        );
        Ok(Self {
            buf,
            schema,
            props: properties,
            row_groups: vec![],
            offset_indexes: vec![],
            file_encryptor,
            finished: false,
            failed: false,
        })
    }

    /// Writes a row group holding one [`ColumnValues`] per leaf column of the schema,
    /// in schema order.
    pub fn write_row_group(&mut self, columns: Vec<ColumnValues>) -> Result<()> {
        self.assert_writable()?;
        if columns.len() != self.schema.num_columns() {
            return Err(general_err!(
                "Column length mismatch: {} != {}",
                self.schema.num_columns(),
                columns.len()
            ));
        }
        let num_rows = columns.first().map(|c| c.len()).unwrap_or(0);
        for (descr, values) in self.schema.columns().iter().zip(&columns) {
            if values.len() != num_rows {
                return Err(general_err!(
                    "Incorrect number of rows in column '{}', expected {} != {} rows",
                    descr.path(),
                    num_rows,
                    values.len()
                ));
            }
        }

        let row_group_ordinal = self.row_groups.len();
        let ordinal = i16::try_from(row_group_ordinal).ok();
        if ordinal.is_none() && self.file_encryptor.is_some() {
            return Err(general_err!(
                "Encrypted parquet files can't have more than 32767 row groups: {}",
                row_group_ordinal
            ));
        }

        let result = self.write_columns(row_group_ordinal, ordinal, num_rows, &columns);
        if let Err(e) = &result {
            debug!(row_group_ordinal, error = %e, "failed to write row group");
            self.failed = true;
        }
        result
    }

    fn write_columns(
        &mut self,
        row_group_ordinal: usize,
        ordinal: Option<i16>,
        num_rows: usize,
        columns: &[ColumnValues],
    ) -> Result<()> {
        let row_group_start = self.buf.bytes_written();
        let mut chunks = Vec::with_capacity(columns.len());
        let mut offset_indexes = Vec::with_capacity(columns.len());
        let schema = Arc::clone(&self.schema);
        for (column_ordinal, (descr, values)) in schema.columns().iter().zip(columns).enumerate()
        {
            let mut page_encryptor = PageEncryptor::create_if_column_encrypted(
                self.file_encryptor.as_ref(),
                row_group_ordinal,
                column_ordinal,
                descr.path(),
            )?;
            let writer = ColumnChunkWriter::new(
                &mut self.buf,
                Arc::clone(descr),
                Arc::clone(&self.props),
                page_encryptor.as_mut(),
            );
            let result = writer.write(values)?;

            let offset_index = match page_encryptor.as_mut() {
                Some(page_encryptor) => page_encryptor.encrypt_offset_index(&result.offset_index)?,
                None => codec::serialize(&result.offset_index)?,
            };
            offset_indexes.push(offset_index);
            chunks.push(self.column_chunk(descr, result.metadata, page_encryptor.as_mut())?);
        }

        let total_byte_size = chunks
            .iter()
            .filter_map(|c| c.meta_data.as_ref())
            .map(|m| m.total_uncompressed_size)
            .sum();
        let total_compressed_size = i64::try_from(self.buf.bytes_written() - row_group_start)?;
        self.row_groups.push(format::RowGroup {
            columns: chunks,
            total_byte_size,
            num_rows: i64::try_from(num_rows)?,
            file_offset: Some(i64::try_from(row_group_start)?),
            total_compressed_size: Some(total_compressed_size),
            ordinal,
        });
        self.offset_indexes.push(offset_indexes);
        trace!(row_group_ordinal, num_rows, "wrote row group");
        Ok(())
    }

    /// Builds the column chunk entry of the footer.
    ///
    /// Columns encrypted with their own key keep their metadata only in encrypted form
    /// when the footer is encrypted. In files with a plaintext footer the metadata of
    /// encrypted columns is stored both encrypted and in plaintext.
    fn column_chunk(
        &self,
        descr: &ColumnDescPtr,
        metadata: ColumnMetaData,
        page_encryptor: Option<&mut PageEncryptor>,
    ) -> Result<ColumnChunk> {
        let file_offset = metadata
            .dictionary_page_offset
            .unwrap_or(metadata.data_page_offset);
        let crypto_metadata = self
            .file_encryptor
            .as_ref()
            .and_then(|e| e.column_crypto_metadata(descr.path()));
        let encrypted_footer = self
            .file_encryptor
            .as_ref()
            .is_some_and(|e| e.properties().encrypted_footer());

        let (meta_data, encrypted_column_metadata) = match (&crypto_metadata, page_encryptor) {
            (Some(ColumnCryptoMetaData::ENCRYPTION_WITH_COLUMN_KEY(_)), Some(page_encryptor))
                if encrypted_footer =>
            {
                (None, Some(page_encryptor.encrypt_column_metadata(&metadata)?))
            }
            (Some(_), Some(page_encryptor)) if !encrypted_footer => {
                let encrypted = page_encryptor.encrypt_column_metadata(&metadata)?;
                (Some(metadata), Some(encrypted))
            }
            _ => (Some(metadata), None),
        };

        Ok(ColumnChunk {
            file_offset,
            meta_data,
            offset_index_offset: None,
            offset_index_length: None,
            crypto_metadata,
            encrypted_column_metadata,
        })
    }

    fn assert_writable(&self) -> Result<()> {
        if self.finished {
            return Err(general_err!("SerializedFileWriter already finished"));
        }
        if self.failed {
            return Err(general_err!(
                "SerializedFileWriter failed while writing a row group"
            ));
        }
        Ok(())
    }

    /// Writes the offset indexes and the footer, returning the file metadata.
    ///
    /// The key material of the file is released once the footer is written.
    pub fn finish(&mut self) -> Result<format::FileMetaData> {
        self.assert_writable()?;
        self.finished = true;

        for (row_group, offset_indexes) in self.row_groups.iter_mut().zip(&self.offset_indexes) {
            for (column, offset_index) in row_group.columns.iter_mut().zip(offset_indexes) {
                let start_pos = self.buf.bytes_written();
                self.buf.write_all(offset_index)?;
                column.offset_index_offset = Some(i64::try_from(start_pos)?);
                column.offset_index_length = Some(i32::try_from(offset_index.len())?);
            }
        }

        let mut file_metadata = format::FileMetaData {
            version: 1,
            schema_name: self.schema.name().to_string(),
            schema: to_format(&self.schema),
            num_rows: self.row_groups.iter().map(|rg| rg.num_rows).sum(),
            row_groups: self.row_groups.clone(),
            created_by: Some(self.props.created_by().to_string()),
            encryption_algorithm: None,
            footer_signing_key_metadata: None,
        };
        if let Some(file_encryptor) = self.file_encryptor.as_ref() {
            let properties = file_encryptor.properties();
            if !properties.encrypted_footer() {
                file_metadata.encryption_algorithm = Some(file_encryptor.encryption_algorithm());
                file_metadata.footer_signing_key_metadata =
                    properties.footer_signing_key_metadata().map(|m| m.to_vec());
            }
        }

        ParquetMetaDataWriter::new(&mut self.buf, &file_metadata, self.file_encryptor.as_ref())
            .finish()?;
        self.buf.flush()?;

        if let Some(file_encryptor) = self.file_encryptor.as_ref() {
            file_encryptor.wipe_out();
        }
        debug!(
            num_row_groups = file_metadata.row_groups.len(),
            num_rows = file_metadata.num_rows,
            bytes_written = self.buf.bytes_written(),
            "closed parquet file writer"
        );
        Ok(file_metadata)
    }

    /// Closes and finalises file writer, returning the file metadata.
    pub fn close(mut self) -> Result<format::FileMetaData> {
        self.finish()
    }

    /// Returns metadata for the row groups written so far.
    pub fn flushed_row_groups(&self) -> &[format::RowGroup] {
        &self.row_groups
    }

    /// Returns a reference to schema descriptor.
    pub fn schema_descr(&self) -> &SchemaDescPtr {
        &self.schema
    }

    /// Returns a reference to the writer properties
    pub fn properties(&self) -> &WriterPropertiesPtr {
        &self.props
    }

    /// Returns a reference to the underlying writer.
    pub fn inner(&self) -> &W {
        self.buf.inner()
    }

    /// Finishes the file if necessary and returns the underlying writer.
    pub fn into_inner(mut self) -> Result<W> {
        if !self.finished {
            self.finish()?;
        }
        self.buf.into_inner()
    }

    /// Returns the number of bytes written to this instance
    pub fn bytes_written(&self) -> usize {
        self.buf.bytes_written()
    }
}
