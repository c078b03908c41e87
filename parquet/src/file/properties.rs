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

//! Configuration via [`WriterProperties`] and [`ReaderProperties`]
use std::{collections::HashMap, sync::Arc};

use crate::encryption::decrypt::FileDecryptionProperties;
use crate::encryption::encrypt::FileEncryptionProperties;
use crate::file::DEFAULT_FOOTER_READ_SIZE;
use crate::schema::types::ColumnPath;

/// Default value for [`WriterProperties::data_page_row_count_limit`]
pub const DEFAULT_DATA_PAGE_ROW_COUNT_LIMIT: usize = 1024;
/// Default value for [`WriterProperties::dictionary_enabled`]
pub const DEFAULT_DICTIONARY_ENABLED: bool = true;
/// Default value for [`WriterProperties::created_by`]
pub const DEFAULT_CREATED_BY: &str = concat!("parquet-crypto version ", env!("CARGO_PKG_VERSION"));

/// Reference counted writer properties.
pub type WriterPropertiesPtr = Arc<WriterProperties>;

/// Configuration settings for writing parquet files.
///
/// All properties are immutable, use [`WriterPropertiesBuilder`] to assemble these
/// properties.
///
/// # Example
///
/// ```rust
/// use parquet_crypto::encryption::encrypt::FileEncryptionProperties;
/// use parquet_crypto::file::properties::WriterProperties;
/// use parquet_crypto::schema::types::ColumnPath;
///
/// let encryption = FileEncryptionProperties::builder(b"0123456789012345".to_vec())
///     .build()
///     .unwrap();
///
/// let props = WriterProperties::builder()
///     .set_data_page_row_count_limit(100)
///     .set_column_dictionary_enabled(ColumnPath::from("col1"), false)
///     .with_file_encryption_properties(encryption)
///     .build();
///
/// assert_eq!(props.data_page_row_count_limit(), 100);
/// assert!(!props.dictionary_enabled(&ColumnPath::from("col1")));
/// assert!(props.dictionary_enabled(&ColumnPath::from("col2")));
/// assert!(props.file_encryption_properties().is_some());
/// ```
#[derive(Debug, Clone)]
pub struct WriterProperties {
    data_page_row_count_limit: usize,
    created_by: String,
    dictionary_enabled: bool,
    column_dictionary_enabled: HashMap<ColumnPath, bool>,
    file_encryption_properties: Option<Arc<FileEncryptionProperties>>,
}

impl Default for WriterProperties {
    fn default() -> Self {
        Self::builder().build()
    }
}

impl WriterProperties {
    /// Create a new [`WriterProperties`] with the default settings
    ///
    /// See [`WriterProperties::builder`] for customising settings
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns builder for writer properties with default values.
    pub fn builder() -> WriterPropertiesBuilder {
        WriterPropertiesBuilder::with_defaults()
    }

    /// Returns the maximum number of rows in a data page.
    pub fn data_page_row_count_limit(&self) -> usize {
        self.data_page_row_count_limit
    }

    /// Returns `created_by` string.
    pub fn created_by(&self) -> &str {
        &self.created_by
    }

    /// Returns `true` if dictionary encoding is enabled for a column.
    pub fn dictionary_enabled(&self, col: &ColumnPath) -> bool {
        self.column_dictionary_enabled
            .get(col)
            .copied()
            .unwrap_or(self.dictionary_enabled)
    }

    /// Returns the encryption properties, or `None` if the file is written unencrypted
    pub fn file_encryption_properties(&self) -> Option<&Arc<FileEncryptionProperties>> {
        self.file_encryption_properties.as_ref()
    }
}

/// Builder for parquet file writer configuration. See example on
/// [`WriterProperties`]
pub struct WriterPropertiesBuilder {
    data_page_row_count_limit: usize,
    created_by: String,
    dictionary_enabled: bool,
    column_dictionary_enabled: HashMap<ColumnPath, bool>,
    file_encryption_properties: Option<Arc<FileEncryptionProperties>>,
}

impl WriterPropertiesBuilder {
    /// Returns default state of the builder.
    fn with_defaults() -> Self {
        Self {
            data_page_row_count_limit: DEFAULT_DATA_PAGE_ROW_COUNT_LIMIT,
            created_by: DEFAULT_CREATED_BY.to_string(),
            dictionary_enabled: DEFAULT_DICTIONARY_ENABLED,
            column_dictionary_enabled: HashMap::new(),
            file_encryption_properties: None,
        }
    }

    /// Finalizes the configuration and returns immutable writer properties struct.
    pub fn build(self) -> WriterProperties {
        WriterProperties {
            data_page_row_count_limit: self.data_page_row_count_limit,
            created_by: self.created_by,
            dictionary_enabled: self.dictionary_enabled,
            column_dictionary_enabled: self.column_dictionary_enabled,
            file_encryption_properties: self.file_encryption_properties,
        }
    }

    /// Sets best effort maximum number of rows in a data page (defaults to `1024`).
    ///
    /// # Panics
    /// If the value is set to 0.
    pub fn set_data_page_row_count_limit(mut self, value: usize) -> Self {
        assert!(value > 0, "Cannot have a 0 data page row count limit");
        self.data_page_row_count_limit = value;
        self
    }

    /// Sets "created by" property (defaults to `parquet-crypto version <VERSION>`).
    pub fn set_created_by(mut self, value: String) -> Self {
        self.created_by = value;
        self
    }

    /// Sets default flag to enable/disable dictionary encoding for all columns (defaults to `true`).
    pub fn set_dictionary_enabled(mut self, value: bool) -> Self {
        self.dictionary_enabled = value;
        self
    }

    /// Sets flag to enable/disable dictionary encoding for a specific column.
    ///
    /// Takes precedence over [`Self::set_dictionary_enabled`].
    pub fn set_column_dictionary_enabled(mut self, col: ColumnPath, value: bool) -> Self {
        self.column_dictionary_enabled.insert(col, value);
        self
    }

    /// Sets the properties used to encrypt the file
    pub fn with_file_encryption_properties(
        mut self,
        file_encryption_properties: Arc<FileEncryptionProperties>,
    ) -> Self {
        self.file_encryption_properties = Some(file_encryption_properties);
        self
    }
}

/// Reference counted reader properties.
pub type ReaderPropertiesPtr = Arc<ReaderProperties>;

/// Configuration settings for reading parquet files.
///
/// All properties are immutable and `Send` + `Sync`.
/// Use [`ReaderPropertiesBuilder`] to assemble these properties.
///
/// # Example
///
/// ```rust
/// use parquet_crypto::encryption::decrypt::FileDecryptionProperties;
/// use parquet_crypto::file::properties::ReaderProperties;
///
/// // Create properties with default configuration.
/// let props = ReaderProperties::builder().build();
/// assert!(props.file_decryption_properties().is_none());
///
/// let decryption = FileDecryptionProperties::builder()
///     .with_footer_key(b"0123456789012345".to_vec())
///     .build()
///     .unwrap();
/// let props = ReaderProperties::builder()
///     .set_footer_read_size(1024)
///     .with_file_decryption_properties(decryption)
///     .build();
/// assert_eq!(props.footer_read_size(), 1024);
/// ```
#[derive(Debug, Clone)]
pub struct ReaderProperties {
    footer_read_size: usize,
    file_decryption_properties: Option<Arc<FileDecryptionProperties>>,
}

impl Default for ReaderProperties {
    fn default() -> Self {
        Self::builder().build()
    }
}

impl ReaderProperties {
    /// Returns builder for reader properties with default values.
    pub fn builder() -> ReaderPropertiesBuilder {
        ReaderPropertiesBuilder::with_defaults()
    }

    /// Returns the number of bytes read from the end of the file to locate the footer
    pub fn footer_read_size(&self) -> usize {
        self.footer_read_size
    }

    /// Returns the decryption properties, or `None` if none were configured
    pub fn file_decryption_properties(&self) -> Option<&Arc<FileDecryptionProperties>> {
        self.file_decryption_properties.as_ref()
    }
}

/// Builder for parquet file reader configuration. See example on
/// [`ReaderProperties`]
pub struct ReaderPropertiesBuilder {
    footer_read_size: usize,
    file_decryption_properties: Option<Arc<FileDecryptionProperties>>,
}

/// Reader properties builder.
impl ReaderPropertiesBuilder {
    /// Returns default state of the builder.
    fn with_defaults() -> Self {
        Self {
            footer_read_size: DEFAULT_FOOTER_READ_SIZE,
            file_decryption_properties: None,
        }
    }

    /// Finalizes the configuration and returns immutable reader properties struct.
    pub fn build(self) -> ReaderProperties {
        ReaderProperties {
            footer_read_size: self.footer_read_size,
            file_decryption_properties: self.file_decryption_properties,
        }
    }

    /// Sets the size of the initial read from the end of the file (defaults to 64 KiB).
    ///
    /// Footers larger than this require a second read.
    pub fn set_footer_read_size(mut self, value: usize) -> Self {
        self.footer_read_size = value;
        self
    }

    /// Sets the properties used to decrypt encrypted files
    pub fn with_file_decryption_properties(
        mut self,
        file_decryption_properties: Arc<FileDecryptionProperties>,
    ) -> Self {
        self.file_decryption_properties = Some(file_decryption_properties);
        self
    }
}
