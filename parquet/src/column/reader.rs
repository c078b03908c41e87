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

//! Contains column reader API.

use crate::basic::{Encoding, Type};
use crate::column::page::{Page, PageReader};
use crate::column::values::{decode_indices, ColumnValues};
use crate::errors::{ParquetError, Result};

/// Decodes the pages of a column chunk into [`ColumnValues`]
pub struct ColumnReader {
    physical_type: Type,
    page_reader: Box<dyn PageReader>,
    dictionary: Option<ColumnValues>,
}

impl ColumnReader {
    /// Creates a reader decoding values of `physical_type` from `page_reader`
    pub fn new(physical_type: Type, page_reader: Box<dyn PageReader>) -> Self {
        Self {
            physical_type,
            page_reader,
            dictionary: None,
        }
    }

    /// Decodes the values of the next data page, or returns `None` once the
    /// column chunk is exhausted
    pub fn read_page(&mut self) -> Result<Option<ColumnValues>> {
        while let Some(page) = self.page_reader.get_next_page()? {
            match page {
                Page::DictionaryPage {
                    buf,
                    num_values,
                    encoding,
                } => {
                    if encoding != Encoding::PLAIN {
                        return Err(corrupt_err!(
                            "Unsupported dictionary page encoding {}",
                            encoding
                        ));
                    }
                    if self.dictionary.is_some() {
                        return Err(corrupt_err!("Column chunk has more than one dictionary page"));
                    }
                    let dictionary =
                        ColumnValues::decode_plain(self.physical_type, &buf, num_values as usize)?;
                    self.dictionary = Some(dictionary);
                }
                Page::DataPage {
                    buf,
                    num_values,
                    encoding,
                } => {
                    let values = match encoding {
                        Encoding::PLAIN => ColumnValues::decode_plain(
                            self.physical_type,
                            &buf,
                            num_values as usize,
                        )?,
                        Encoding::RLE_DICTIONARY => {
                            let dictionary = self.dictionary.as_ref().ok_or_else(|| {
                                corrupt_err!("Dictionary encoded page without a dictionary page")
                            })?;
                            let indices = decode_indices(&buf, num_values as usize)?;
                            dictionary.take(&indices)?
                        }
                    };
                    return Ok(Some(values));
                }
            }
        }
        Ok(None)
    }

    /// Decodes all remaining values of the column chunk
    pub fn read_all(mut self) -> Result<ColumnValues> {
        let mut values = ColumnValues::new(self.physical_type);
        while let Some(page_values) = self.read_page()? {
            values.append(page_values)?;
        }
        Ok(values)
    }
}
