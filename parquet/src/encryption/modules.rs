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

//! Additional authenticated data (AAD) for each encrypted module of a file.
//!
//! A module AAD is the file AAD, followed by a one byte module type and, for modules
//! scoped to a column chunk, little-endian `i16` row group and column ordinals. Data pages
//! and data page headers additionally carry the page ordinal.

use crate::errors::{ParquetError, Result};

/// Kinds of encrypted modules in a Parquet file
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModuleType {
    Footer = 0,
    ColumnMetaData = 1,
    DataPage = 2,
    DictionaryPage = 3,
    DataPageHeader = 4,
    DictionaryPageHeader = 5,
    ColumnIndex = 6,
    OffsetIndex = 7,
}

impl ModuleType {
    fn has_page_ordinal(self) -> bool {
        matches!(self, ModuleType::DataPage | ModuleType::DataPageHeader)
    }
}

/// Creates the AAD of the file footer
pub fn create_footer_aad(file_aad: &[u8]) -> Result<Vec<u8>> {
    create_module_aad(file_aad, ModuleType::Footer, 0, 0, None)
}

fn check_ordinal(ordinal: usize, what: &str) -> Result<i16> {
    i16::try_from(ordinal).map_err(|_| {
        general_err!(
            "Encrypted parquet files can't have more than {} {}: {}",
            i16::MAX,
            what,
            ordinal
        )
    })
}

/// Creates the AAD of a module.
///
/// `page_ordinal` is required for [`ModuleType::DataPage`] and
/// [`ModuleType::DataPageHeader`] and ignored otherwise.
pub fn create_module_aad(
    file_aad: &[u8],
    module_type: ModuleType,
    row_group_ordinal: usize,
    column_ordinal: usize,
    page_ordinal: Option<usize>,
) -> Result<Vec<u8>> {
    let module_buf = [module_type as u8];

    if module_type == ModuleType::Footer {
        let mut aad = Vec::with_capacity(file_aad.len() + 1);
        aad.extend_from_slice(file_aad);
        aad.extend_from_slice(module_buf.as_ref());
        return Ok(aad);
    }

    let row_group_ordinal = check_ordinal(row_group_ordinal, "row groups")?;
    let column_ordinal = check_ordinal(column_ordinal, "columns")?;

    if !module_type.has_page_ordinal() {
        let mut aad = Vec::with_capacity(file_aad.len() + 5);
        aad.extend_from_slice(file_aad);
        aad.extend_from_slice(module_buf.as_ref());
        aad.extend_from_slice(row_group_ordinal.to_le_bytes().as_ref());
        aad.extend_from_slice(column_ordinal.to_le_bytes().as_ref());
        return Ok(aad);
    }

    let page_ordinal =
        page_ordinal.ok_or_else(|| general_err!("Page ordinal must be set for data pages"))?;
    let page_ordinal = check_ordinal(page_ordinal, "pages per column chunk")?;

    let mut aad = Vec::with_capacity(file_aad.len() + 7);
    aad.extend_from_slice(file_aad);
    aad.extend_from_slice(module_buf.as_ref());
    aad.extend_from_slice(row_group_ordinal.to_le_bytes().as_ref());
    aad.extend_from_slice(column_ordinal.to_le_bytes().as_ref());
    aad.extend_from_slice(page_ordinal.to_le_bytes().as_ref());
    Ok(aad)
}

/// Overwrites the page ordinal of a data page (header) AAD in place.
///
/// Produces the same bytes as rebuilding the AAD with [`create_module_aad`].
pub fn quick_update_page_aad(aad: &mut [u8], page_ordinal: usize) -> Result<()> {
    let page_ordinal = check_ordinal(page_ordinal, "pages per column chunk")?;
    let len = aad.len();
    if len < 7 {
        return Err(general_err!("AAD of {} bytes has no page ordinal", len));
    }
    aad[len - 2..].copy_from_slice(&page_ordinal.to_le_bytes());
    Ok(())
}

/// AAD of the data pages (or data page headers) of one column chunk.
///
/// The first page builds the full AAD, following pages only overwrite the page ordinal.
#[derive(Debug, Clone)]
pub(crate) struct PageAad {
    module_type: ModuleType,
    row_group_ordinal: usize,
    column_ordinal: usize,
    aad: Option<Vec<u8>>,
}

impl PageAad {
    pub(crate) fn new(module_type: ModuleType, row_group_ordinal: usize, column_ordinal: usize) -> Self {
        Self {
            module_type,
            row_group_ordinal,
            column_ordinal,
            aad: None,
        }
    }

    pub(crate) fn for_page(&mut self, file_aad: &[u8], page_ordinal: usize) -> Result<Vec<u8>> {
        let aad = match self.aad.take() {
            Some(mut aad) => {
                quick_update_page_aad(&mut aad, page_ordinal)?;
                aad
            }
            None => create_module_aad(
                file_aad,
                self.module_type,
                self.row_group_ordinal,
                self.column_ordinal,
                Some(page_ordinal),
            )?,
        };
        Ok(self.aad.insert(aad).clone())
    }
}
