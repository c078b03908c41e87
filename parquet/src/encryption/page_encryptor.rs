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

use crate::basic::PageType;
use crate::column::page::Page;
use crate::encryption::encrypt::{encrypt_object, Encryptor, FileEncryptor};
use crate::encryption::modules::{create_module_aad, ModuleType, PageAad};
use crate::errors::Result;
use crate::format::{ColumnMetaData, OffsetIndex, PageHeader};
use crate::schema::types::ColumnPath;

#[derive(Debug)]
/// Encrypts page headers, page data and metadata of one column chunk
pub(crate) struct PageEncryptor {
    metadata_encryptor: Encryptor,
    data_encryptor: Encryptor,
    row_group_ordinal: usize,
    column_ordinal: usize,
    page_ordinal: usize,
    data_page_header_aad: PageAad,
    data_page_aad: PageAad,
}

impl PageEncryptor {
    /// Create a [`PageEncryptor`] for a column if it should be encrypted
    pub fn create_if_column_encrypted(
        file_encryptor: Option<&FileEncryptor>,
        row_group_ordinal: usize,
        column_ordinal: usize,
        column_path: &ColumnPath,
    ) -> Result<Option<Self>> {
        let Some(file_encryptor) = file_encryptor else {
            return Ok(None);
        };
        let metadata_encryptor = file_encryptor.get_column_meta_encryptor(column_path)?;
        let data_encryptor = file_encryptor.get_column_data_encryptor(column_path)?;
        match (metadata_encryptor, data_encryptor) {
            (Some(metadata_encryptor), Some(data_encryptor)) => Ok(Some(Self {
                metadata_encryptor,
                data_encryptor,
                row_group_ordinal,
                column_ordinal,
                page_ordinal: 0,
                data_page_header_aad: PageAad::new(
                    ModuleType::DataPageHeader,
                    row_group_ordinal,
                    column_ordinal,
                ),
                data_page_aad: PageAad::new(ModuleType::DataPage, row_group_ordinal, column_ordinal),
            })),
            _ => Ok(None),
        }
    }

    /// Update the page index after a data page has been processed
    pub fn increment_page(&mut self) {
        self.page_ordinal += 1;
    }

    fn module_aad(&self, module_type: ModuleType) -> Result<Vec<u8>> {
        create_module_aad(
            self.metadata_encryptor.file_aad(),
            module_type,
            self.row_group_ordinal,
            self.column_ordinal,
            None,
        )
    }

    /// Encrypt the body of a page
    pub fn encrypt_page(&mut self, page: &Page) -> Result<Vec<u8>> {
        let aad = if page.is_data_page() {
            self.data_page_aad
                .for_page(self.data_encryptor.file_aad(), self.page_ordinal)?
        } else {
            self.module_aad(ModuleType::DictionaryPage)?
        };
        self.data_encryptor.set_aad(aad);
        self.data_encryptor.encrypt(page.buffer())
    }

    /// Encrypt a column page header
    pub fn encrypt_page_header(&mut self, page_header: &PageHeader) -> Result<Vec<u8>> {
        let aad = match page_header.type_ {
            PageType::DATA_PAGE => self
                .data_page_header_aad
                .for_page(self.metadata_encryptor.file_aad(), self.page_ordinal)?,
            PageType::DICTIONARY_PAGE => self.module_aad(ModuleType::DictionaryPageHeader)?,
        };
        self.metadata_encryptor.set_aad(aad);
        encrypt_object(page_header, &self.metadata_encryptor)
    }

    /// Encrypt the metadata of the column chunk
    pub fn encrypt_column_metadata(&mut self, metadata: &ColumnMetaData) -> Result<Vec<u8>> {
        let aad = self.module_aad(ModuleType::ColumnMetaData)?;
        self.metadata_encryptor.set_aad(aad);
        encrypt_object(metadata, &self.metadata_encryptor)
    }

    /// Encrypt the offset index of the column chunk
    pub fn encrypt_offset_index(&mut self, offset_index: &OffsetIndex) -> Result<Vec<u8>> {
        let aad = self.module_aad(ModuleType::OffsetIndex)?;
        self.metadata_encryptor.set_aad(aad);
        encrypt_object(offset_index, &self.metadata_encryptor)
    }
}
