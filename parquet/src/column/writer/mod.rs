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

//! Contains column writer API.

use std::io::Write;

use bytes::Bytes;
use tracing::trace;

use crate::basic::{Encoding, PageType};
use crate::codec;
use crate::column::page::{Page, PageWriteSpec};
use crate::column::values::{encode_indices, ColumnValues};
use crate::encryption::page_encryptor::PageEncryptor;
use crate::errors::{ParquetError, Result};
use crate::file::properties::WriterPropertiesPtr;
use crate::file::writer::TrackedWrite;
use crate::format::{ColumnMetaData, OffsetIndex, PageHeader, PageLocation};
use crate::schema::types::ColumnDescPtr;

/// Metadata returned by [`ColumnChunkWriter::close`]
#[derive(Debug, Clone)]
pub struct ColumnCloseResult {
    /// The column chunk metadata
    pub metadata: ColumnMetaData,
    /// Location of each data page of the chunk
    pub offset_index: OffsetIndex,
}

/// Writes the pages of a single column chunk to a [`TrackedWrite`]
///
/// Page headers and bodies are encrypted when a [`PageEncryptor`] is provided.
pub(crate) struct ColumnChunkWriter<'a, W: Write> {
    sink: &'a mut TrackedWrite<W>,
    descr: ColumnDescPtr,
    props: WriterPropertiesPtr,
    page_encryptor: Option<&'a mut PageEncryptor>,
    encodings: Vec<Encoding>,
    total_uncompressed_size: u64,
    total_compressed_size: u64,
    dictionary_page_offset: Option<u64>,
    data_page_offset: Option<u64>,
    page_locations: Vec<PageLocation>,
}

impl<'a, W: Write> ColumnChunkWriter<'a, W> {
    pub(crate) fn new(
        sink: &'a mut TrackedWrite<W>,
        descr: ColumnDescPtr,
        props: WriterPropertiesPtr,
        page_encryptor: Option<&'a mut PageEncryptor>,
    ) -> Self {
        Self {
            sink,
            descr,
            props,
            page_encryptor,
            encodings: vec![],
            total_uncompressed_size: 0,
            total_compressed_size: 0,
            dictionary_page_offset: None,
            data_page_offset: None,
            page_locations: vec![],
        }
    }

    /// Writes all `values` of the column chunk and returns its metadata
    pub(crate) fn write(mut self, values: &ColumnValues) -> Result<ColumnCloseResult> {
        if values.physical_type() != self.descr.physical_type() {
            return Err(general_err!(
                "Column '{}' expects {} values, got {}",
                self.descr.path(),
                self.descr.physical_type(),
                values.physical_type()
            ));
        }
        let start_pos = self.sink.bytes_written() as u64;
        let page_rows = self.props.data_page_row_count_limit().max(1);
        let use_dictionary = !values.is_empty() && self.props.dictionary_enabled(self.descr.path());

        if use_dictionary {
            let (dictionary, indices) = values.dictionary_encode()?;
            let dict_page = Page::DictionaryPage {
                buf: Bytes::from(dictionary.encode_plain()),
                num_values: u32::try_from(dictionary.len())?,
                encoding: Encoding::PLAIN,
            };
            self.write_dictionary_page(dict_page)?;

            for (page_idx, chunk) in indices.chunks(page_rows).enumerate() {
                let page = Page::DataPage {
                    buf: Bytes::from(encode_indices(chunk)),
                    num_values: u32::try_from(chunk.len())?,
                    encoding: Encoding::RLE_DICTIONARY,
                };
                self.write_data_page(page, page_idx * page_rows)?;
            }
        } else {
            let mut first_row = 0;
            while first_row < values.len() {
                let len = page_rows.min(values.len() - first_row);
                let page = Page::DataPage {
                    buf: Bytes::from(values.slice(first_row, len).encode_plain()),
                    num_values: u32::try_from(len)?,
                    encoding: Encoding::PLAIN,
                };
                self.write_data_page(page, first_row)?;
                first_row += len;
            }
        }

        self.close(values.len(), start_pos)
    }

    fn write_dictionary_page(&mut self, page: Page) -> Result<()> {
        let spec = self.write_page(page)?;
        self.dictionary_page_offset = Some(spec.offset);
        self.update_metrics_for_page(&spec);
        Ok(())
    }

    fn write_data_page(&mut self, page: Page, first_row_index: usize) -> Result<()> {
        let spec = self.write_page(page)?;
        if let Some(page_encryptor) = self.page_encryptor.as_mut() {
            page_encryptor.increment_page();
        }
        self.data_page_offset.get_or_insert(spec.offset);
        self.page_locations.push(PageLocation {
            offset: i64::try_from(spec.offset)?,
            compressed_page_size: i32::try_from(spec.compressed_size)?,
            first_row_index: i64::try_from(first_row_index)?,
        });
        self.update_metrics_for_page(&spec);
        Ok(())
    }

    /// Serializes the page header followed by the page body, encrypting both if the
    /// column is encrypted
    fn write_page(&mut self, page: Page) -> Result<PageWriteSpec> {
        let start_pos = self.sink.bytes_written() as u64;
        let uncompressed_size = page.buffer().len();
        let body = match self.page_encryptor.as_mut() {
            Some(page_encryptor) => Bytes::from(page_encryptor.encrypt_page(&page)?),
            None => page.buffer().clone(),
        };

        let header = PageHeader {
            type_: page.page_type(),
            uncompressed_page_size: i32::try_from(uncompressed_size)?,
            compressed_page_size: i32::try_from(body.len())?,
            num_values: i32::try_from(page.num_values())?,
            encoding: page.encoding(),
        };
        let header = match self.page_encryptor.as_mut() {
            Some(page_encryptor) => page_encryptor.encrypt_page_header(&header)?,
            None => codec::serialize(&header)?,
        };

        self.sink.write_all(&header)?;
        self.sink.write_all(&body)?;
        if !self.encodings.contains(&page.encoding()) {
            self.encodings.push(page.encoding());
        }
        trace!(
            column = %self.descr.path(),
            page_type = %page.page_type(),
            offset = start_pos,
            size = header.len() + body.len(),
            "wrote page"
        );

        Ok(PageWriteSpec {
            offset: start_pos,
            uncompressed_size: header.len() + uncompressed_size,
            compressed_size: header.len() + body.len(),
            num_values: page.num_values(),
        })
    }

    fn update_metrics_for_page(&mut self, spec: &PageWriteSpec) {
        self.total_uncompressed_size += spec.uncompressed_size as u64;
        self.total_compressed_size += spec.compressed_size as u64;
    }

    fn close(mut self, num_values: usize, start_pos: u64) -> Result<ColumnCloseResult> {
        self.encodings.sort();
        let metadata = ColumnMetaData {
            type_: self.descr.physical_type(),
            encodings: self.encodings,
            path_in_schema: self.descr.path().parts().to_vec(),
            num_values: i64::try_from(num_values)?,
            total_uncompressed_size: i64::try_from(self.total_uncompressed_size)?,
            total_compressed_size: i64::try_from(self.total_compressed_size)?,
            data_page_offset: i64::try_from(self.data_page_offset.unwrap_or(start_pos))?,
            dictionary_page_offset: self.dictionary_page_offset.map(i64::try_from).transpose()?,
        };
        Ok(ColumnCloseResult {
            metadata,
            offset_index: OffsetIndex {
                page_locations: self.page_locations,
            },
        })
    }
}
