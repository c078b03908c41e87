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

//! Configuration and utilities for Parquet Modular Encryption

use std::collections::{BTreeMap, HashMap};
use std::io::Write;
use std::sync::{Arc, Mutex};

use ring::rand::{SecureRandom, SystemRandom};
use serde::Serialize;
use tracing::debug;

use crate::codec;
use crate::encryption::ciphers::{
    AesEncryptor, EngineKey, ParquetCipher, SecretKey, DEFAULT_ENCRYPTION_ALGORITHM, NONCE_LEN,
    SIZE_LEN, TAG_LEN,
};
use crate::encryption::modules::create_footer_aad;
use crate::errors::{ParquetError, Result};
use crate::format::{
    AesGcmCtrV1, AesGcmV1, ColumnCryptoMetaData, EncryptionAlgorithm, EncryptionWithColumnKey,
    FileCryptoMetaData,
};
use crate::schema::types::{ColumnPath, SchemaDescriptor};

/// Footers are encrypted unless a plaintext footer is requested
pub const DEFAULT_ENCRYPTED_FOOTER: bool = true;

/// Length of the random part of the file AAD
pub const AAD_FILE_UNIQUE_LENGTH: usize = 8;

/// Encryption settings of a single column
///
/// ```
/// # use parquet_crypto::encryption::encrypt::ColumnEncryptionProperties;
/// let properties = ColumnEncryptionProperties::builder("double_field")
///     .with_key(b"1234567890123450".to_vec())
///     .with_key_id("kc1")?
///     .build()?;
/// assert!(!properties.is_encrypted_with_footer_key());
/// # Ok::<(), parquet_crypto::errors::ParquetError>(())
/// ```
#[derive(Debug, Clone)]
pub struct ColumnEncryptionProperties {
    column_path: ColumnPath,
    encrypted: bool,
    encrypted_with_footer_key: bool,
    key: Option<SecretKey>,
    key_metadata: Option<Vec<u8>>,
}

impl ColumnEncryptionProperties {
    /// Creates a builder for the column at `column_path`
    pub fn builder(column_path: impl Into<ColumnPath>) -> ColumnEncryptionPropertiesBuilder {
        ColumnEncryptionPropertiesBuilder::new(column_path.into())
    }

    pub fn column_path(&self) -> &ColumnPath {
        &self.column_path
    }

    pub fn is_encrypted(&self) -> bool {
        self.encrypted
    }

    /// True when no column specific key was given, so the footer key protects the column
    pub fn is_encrypted_with_footer_key(&self) -> bool {
        self.encrypted_with_footer_key
    }

    pub fn key(&self) -> Option<&[u8]> {
        self.key.as_ref().map(SecretKey::as_bytes)
    }

    pub fn key_metadata(&self) -> Option<&[u8]> {
        self.key_metadata.as_deref()
    }
}

/// Builder for [`ColumnEncryptionProperties`]
#[derive(Debug)]
pub struct ColumnEncryptionPropertiesBuilder {
    column_path: ColumnPath,
    key: Option<SecretKey>,
    key_metadata: Option<Vec<u8>>,
}

impl ColumnEncryptionPropertiesBuilder {
    fn new(column_path: ColumnPath) -> Self {
        Self {
            column_path,
            key: None,
            key_metadata: None,
        }
    }

    /// Sets a key specific to this column. An empty key leaves the column encrypted
    /// with the footer key.
    pub fn with_key(mut self, key: Vec<u8>) -> Self {
        if !key.is_empty() {
            self.key = Some(SecretKey::new(key));
        }
        self
    }

    /// Sets the key retrieval metadata of the column key
    pub fn with_key_metadata(mut self, key_metadata: Vec<u8>) -> Result<Self> {
        if key_metadata.is_empty() {
            return Ok(self);
        }
        if self.key_metadata.is_some() {
            return Err(config_err!(
                "Key metadata already set for column {}",
                self.column_path
            ));
        }
        self.key_metadata = Some(key_metadata);
        Ok(self)
    }

    /// Sets the key id, stored as UTF-8 key metadata
    pub fn with_key_id(self, key_id: &str) -> Result<Self> {
        self.with_key_metadata(key_id.as_bytes().to_vec())
    }

    pub fn build(self) -> Result<ColumnEncryptionProperties> {
        let key = self.key.map(SecretKey::validated).transpose()?;
        if key.is_none() && self.key_metadata.is_some() {
            return Err(config_err!(
                "Key metadata set for column {} without a column key",
                self.column_path
            ));
        }
        Ok(ColumnEncryptionProperties {
            column_path: self.column_path,
            encrypted: true,
            encrypted_with_footer_key: key.is_none(),
            key,
            key_metadata: self.key_metadata,
        })
    }
}

/// Defines how data in a Parquet file should be encrypted
///
/// The `FileEncryptionProperties` should be included in the [`WriterProperties`](crate::file::properties::WriterProperties)
/// used to write a file by using [`WriterPropertiesBuilder::with_file_encryption_properties`](crate::file::properties::WriterPropertiesBuilder::with_file_encryption_properties).
///
/// # Examples
///
/// Create `FileEncryptionProperties` for a file encrypted with uniform encryption,
/// where all metadata and data are encrypted with the footer key:
/// ```
/// # use parquet_crypto::encryption::encrypt::FileEncryptionProperties;
/// let file_encryption_properties = FileEncryptionProperties::builder(b"0123456789012345".into())
///     .build()?;
/// # Ok::<(), parquet_crypto::errors::ParquetError>(())
/// ```
///
/// Create properties for a file where columns are encrypted with different keys.
/// Any columns without properties will be unencrypted:
/// ```
/// # use parquet_crypto::encryption::encrypt::{ColumnEncryptionProperties, FileEncryptionProperties};
/// let columns = vec![
///     ColumnEncryptionProperties::builder("x").with_key(b"1234567890123450".into()).build()?,
///     ColumnEncryptionProperties::builder("y").with_key(b"1234567890123451".into()).build()?,
/// ];
/// let file_encryption_properties = FileEncryptionProperties::builder(b"0123456789012345".into())
///     .with_column_properties(columns)?
///     .build()?;
/// # Ok::<(), parquet_crypto::errors::ParquetError>(())
/// ```
///
/// Specify additional authenticated data, used to protect against data replacement.
/// This should represent the file identity:
/// ```
/// # use parquet_crypto::encryption::encrypt::FileEncryptionProperties;
/// let file_encryption_properties = FileEncryptionProperties::builder(b"0123456789012345".into())
///     .with_aad_prefix("example_file".into())
///     .build()?;
/// # Ok::<(), parquet_crypto::errors::ParquetError>(())
/// ```
#[derive(Debug)]
pub struct FileEncryptionProperties {
    algorithm: ParquetCipher,
    encrypted_footer: bool,
    footer_key: SecretKey,
    footer_key_metadata: Option<Vec<u8>>,
    aad_prefix: Option<Vec<u8>>,
    store_aad_prefix_in_file: bool,
    column_properties: BTreeMap<ColumnPath, ColumnEncryptionProperties>,
}

impl FileEncryptionProperties {
    /// Create a new builder for encryption properties with the given footer encryption key
    pub fn builder(footer_key: Vec<u8>) -> EncryptionPropertiesBuilder {
        EncryptionPropertiesBuilder::new(footer_key)
    }

    pub fn algorithm(&self) -> ParquetCipher {
        self.algorithm
    }

    /// Should the footer be encrypted
    pub fn encrypted_footer(&self) -> bool {
        self.encrypted_footer
    }

    /// Key used for encryption of footer and (possibly) columns
    pub fn footer_key(&self) -> &[u8] {
        self.footer_key.as_bytes()
    }

    /// Retrieval metadata of key used for encryption of footer and (possibly) columns
    pub fn footer_key_metadata(&self) -> Option<&[u8]> {
        self.footer_key_metadata.as_deref()
    }

    /// The footer key, if the footer is encrypted
    pub fn footer_encryption_key(&self) -> Option<&[u8]> {
        self.encrypted_footer.then(|| self.footer_key())
    }

    pub fn footer_encryption_key_metadata(&self) -> Option<&[u8]> {
        self.encrypted_footer
            .then(|| self.footer_key_metadata())
            .flatten()
    }

    /// The footer key, if the footer is plaintext and signed with it
    pub fn footer_signing_key(&self) -> Option<&[u8]> {
        (!self.encrypted_footer).then(|| self.footer_key())
    }

    pub fn footer_signing_key_metadata(&self) -> Option<&[u8]> {
        (!self.encrypted_footer)
            .then(|| self.footer_key_metadata())
            .flatten()
    }

    /// AAD prefix string uniquely identifies the file and prevents file swapping
    pub fn aad_prefix(&self) -> Option<&[u8]> {
        self.aad_prefix.as_deref()
    }

    /// Should the AAD prefix be stored in the file
    pub fn store_aad_prefix_in_file(&self) -> bool {
        self.store_aad_prefix_in_file && self.aad_prefix.is_some()
    }

    /// True when every column is encrypted with the footer key
    pub fn is_uniform(&self) -> bool {
        self.column_properties.is_empty()
    }

    /// Properties of an explicitly configured column
    pub fn column_properties(&self, column_path: &ColumnPath) -> Option<&ColumnEncryptionProperties> {
        self.column_properties.get(column_path)
    }

    /// Columns with explicit encryption properties, in path order
    pub fn encrypted_columns(&self) -> impl Iterator<Item = &ColumnEncryptionProperties> {
        self.column_properties.values()
    }

    /// Returns whether data for the specified column should be encrypted
    pub fn is_column_encrypted(&self, column_path: &ColumnPath) -> bool {
        self.is_uniform() || self.column_properties.contains_key(column_path)
    }

    /// Checks if columns that are to be encrypted are present in schema
    pub(crate) fn validate_encrypted_column_names(&self, schema: &SchemaDescriptor) -> Result<()> {
        let missing: Vec<String> = self
            .column_properties
            .keys()
            .filter(|path| schema.column_index(path).is_none())
            .map(ColumnPath::string)
            .collect();
        if !missing.is_empty() {
            return Err(config_err!(
                "The following columns with encryption keys specified were not found in the schema: {}",
                missing.join(", ")
            ));
        }
        Ok(())
    }
}

/// Builder for [`FileEncryptionProperties`]
///
/// See [`FileEncryptionProperties`] for example usage.
#[derive(Debug)]
pub struct EncryptionPropertiesBuilder {
    algorithm: ParquetCipher,
    encrypted_footer: bool,
    footer_key: SecretKey,
    footer_key_metadata: Option<Vec<u8>>,
    aad_prefix: Option<Vec<u8>>,
    store_aad_prefix_in_file: bool,
    column_properties: BTreeMap<ColumnPath, ColumnEncryptionProperties>,
}

impl EncryptionPropertiesBuilder {
    /// Create a new [`EncryptionPropertiesBuilder`] with the given footer encryption key
    pub fn new(footer_key: Vec<u8>) -> EncryptionPropertiesBuilder {
        Self {
            algorithm: DEFAULT_ENCRYPTION_ALGORITHM,
            encrypted_footer: DEFAULT_ENCRYPTED_FOOTER,
            footer_key: SecretKey::new(footer_key),
            footer_key_metadata: None,
            aad_prefix: None,
            store_aad_prefix_in_file: false,
            column_properties: BTreeMap::new(),
        }
    }

    /// Set if the footer should be stored in plaintext (not encrypted). Defaults to false.
    ///
    /// Plaintext footers are signed with the footer key.
    pub fn with_plaintext_footer(mut self, plaintext_footer: bool) -> Self {
        self.encrypted_footer = !plaintext_footer;
        self
    }

    /// Set the encryption algorithm. Defaults to [`ParquetCipher::AES_GCM_V1`].
    pub fn with_algorithm(mut self, algorithm: ParquetCipher) -> Self {
        self.algorithm = algorithm;
        self
    }

    /// Set retrieval metadata of key used for encryption of footer and (possibly) columns
    pub fn with_footer_key_metadata(mut self, metadata: Vec<u8>) -> Result<Self> {
        if metadata.is_empty() {
            return Ok(self);
        }
        if self.footer_key_metadata.is_some() {
            return Err(config_err!("Footer key metadata already set"));
        }
        self.footer_key_metadata = Some(metadata);
        Ok(self)
    }

    /// Set the footer key id, stored as UTF-8 key metadata
    pub fn with_footer_key_id(self, key_id: &str) -> Result<Self> {
        self.with_footer_key_metadata(key_id.as_bytes().to_vec())
    }

    /// The AAD prefix uniquely identifies the file and allows to differentiate it e.g. from
    /// older versions of the file or from other partition files in the same data set (table).
    /// The prefix is stored in the file unless [`Self::disable_aad_prefix_storage`] is called.
    pub fn with_aad_prefix(mut self, aad_prefix: Vec<u8>) -> Self {
        if !aad_prefix.is_empty() {
            self.aad_prefix = Some(aad_prefix);
            self.store_aad_prefix_in_file = true;
        }
        self
    }

    /// Do not store the AAD prefix in the file. Readers will need to supply it.
    pub fn disable_aad_prefix_storage(mut self) -> Result<Self> {
        if self.aad_prefix.is_none() {
            return Err(config_err!("AAD prefix not yet set"));
        }
        self.store_aad_prefix_in_file = false;
        Ok(self)
    }

    /// Set the properties of encrypted columns. Columns without properties are left
    /// unencrypted; when no properties are set every column is encrypted with the footer key.
    ///
    /// Must be called at most once with a non-empty list.
    pub fn with_column_properties(
        mut self,
        column_properties: Vec<ColumnEncryptionProperties>,
    ) -> Result<Self> {
        if column_properties.is_empty() {
            return Ok(self);
        }
        if !self.column_properties.is_empty() {
            return Err(config_err!("Column properties already set"));
        }
        for properties in column_properties {
            let path = properties.column_path().clone();
            if self.column_properties.insert(path.clone(), properties).is_some() {
                return Err(config_err!(
                    "Column {} has more than one set of encryption properties",
                    path
                ));
            }
        }
        Ok(self)
    }

    /// Build the encryption properties
    pub fn build(self) -> Result<Arc<FileEncryptionProperties>> {
        let footer_key = self.footer_key.validated()?;
        Ok(Arc::new(FileEncryptionProperties {
            algorithm: self.algorithm,
            encrypted_footer: self.encrypted_footer,
            footer_key,
            footer_key_metadata: self.footer_key_metadata,
            aad_prefix: self.aad_prefix,
            store_aad_prefix_in_file: self.store_aad_prefix_in_file,
            column_properties: self.column_properties,
        }))
    }
}

/// Encrypts modules under one key, scoped by the AAD set before each call
///
/// Obtained from the encryptor registry of a file. A handle is not synchronized: set the AAD
/// and encrypt from one thread at a time.
#[derive(Debug, Clone)]
pub struct Encryptor {
    engine: Arc<AesEncryptor>,
    key: SecretKey,
    file_aad: Vec<u8>,
    aad: Vec<u8>,
}

impl Encryptor {
    fn new(engine: Arc<AesEncryptor>, key: SecretKey, file_aad: &[u8]) -> Self {
        Self {
            engine,
            key,
            file_aad: file_aad.to_vec(),
            aad: Vec::new(),
        }
    }

    pub fn file_aad(&self) -> &[u8] {
        &self.file_aad
    }

    /// Sets the module AAD used by following calls
    pub fn set_aad(&mut self, aad: Vec<u8>) {
        self.aad = aad;
    }

    pub fn aad(&self) -> &[u8] {
        &self.aad
    }

    pub fn ciphertext_size_delta(&self) -> usize {
        self.engine.ciphertext_size_delta()
    }

    pub fn encrypt(&self, plaintext: &[u8]) -> Result<Vec<u8>> {
        self.engine.encrypt(plaintext, self.key.as_bytes(), &self.aad)
    }

    pub(crate) fn signed_footer_encrypt(&self, footer: &[u8], nonce: &[u8]) -> Result<Vec<u8>> {
        self.engine
            .signed_footer_encrypt(footer, self.key.as_bytes(), &self.aad, nonce)
    }
}

/// The encryption configuration for a single Parquet file
///
/// Owns the engines used to write the file. Engines are created on first use for each
/// key length and module kind.
#[derive(Debug)]
pub(crate) struct FileEncryptor {
    properties: Arc<FileEncryptionProperties>,
    aad_file_unique: Vec<u8>,
    file_aad: Vec<u8>,
    engines: Mutex<HashMap<EngineKey, Arc<AesEncryptor>>>,
}

impl FileEncryptor {
    pub(crate) fn new(properties: Arc<FileEncryptionProperties>) -> Result<Self> {
        // Generate unique AAD for file
        let rng = SystemRandom::new();
        let mut aad_file_unique = vec![0u8; AAD_FILE_UNIQUE_LENGTH];
        rng.fill(&mut aad_file_unique)?;

        let file_aad = match properties.aad_prefix() {
            None => aad_file_unique.clone(),
            Some(aad_prefix) => [aad_prefix, aad_file_unique.as_slice()].concat(),
        };

        Ok(Self {
            properties,
            aad_file_unique,
            file_aad,
            engines: Mutex::new(HashMap::new()),
        })
    }

    /// Get the encryptor's file encryption properties
    pub fn properties(&self) -> &Arc<FileEncryptionProperties> {
        &self.properties
    }

    /// Combined AAD prefix and suffix for the file generated
    pub fn file_aad(&self) -> &[u8] {
        &self.file_aad
    }

    /// Unique file identifier part of AAD suffix. The full AAD suffix is generated per module by
    /// concatenating aad_file_unique, module type, row group ordinal (all except
    /// footer), column ordinal (all except footer) and page ordinal (data page and
    /// header only).
    pub fn aad_file_unique(&self) -> &[u8] {
        &self.aad_file_unique
    }

    /// Returns whether data for the specified column should be encrypted
    pub fn is_column_encrypted(&self, column_path: &ColumnPath) -> bool {
        self.properties.is_column_encrypted(column_path)
    }

    /// Algorithm description stored in the file
    pub fn encryption_algorithm(&self) -> EncryptionAlgorithm {
        let supply_aad_prefix = self
            .properties
            .aad_prefix()
            .map(|_| !self.properties.store_aad_prefix_in_file());
        let aad_prefix = if self.properties.store_aad_prefix_in_file() {
            self.properties.aad_prefix().map(<[u8]>::to_vec)
        } else {
            None
        };
        let aad_file_unique = Some(self.aad_file_unique.clone());
        match self.properties.algorithm() {
            ParquetCipher::AES_GCM_V1 => EncryptionAlgorithm::AesGcmV1(AesGcmV1 {
                aad_prefix,
                aad_file_unique,
                supply_aad_prefix,
            }),
            ParquetCipher::AES_GCM_CTR_V1 => EncryptionAlgorithm::AesGcmCtrV1(AesGcmCtrV1 {
                aad_prefix,
                aad_file_unique,
                supply_aad_prefix,
            }),
        }
    }

    /// Crypto metadata written before an encrypted footer
    pub fn file_crypto_metadata(&self) -> FileCryptoMetaData {
        FileCryptoMetaData {
            encryption_algorithm: self.encryption_algorithm(),
            key_metadata: self.properties.footer_key_metadata().map(<[u8]>::to_vec),
        }
    }

    fn engine(&self, key_length: usize, metadata: bool) -> Result<Arc<AesEncryptor>> {
        let engine_key = EngineKey {
            algorithm: self.properties.algorithm(),
            key_length,
            metadata,
        };
        let mut engines = self
            .engines
            .lock()
            .map_err(|_| general_err!("Encryptor registry lock poisoned"))?;
        if let Some(engine) = engines.get(&engine_key) {
            return Ok(Arc::clone(engine));
        }
        debug!(?engine_key, "creating encryption engine");
        let engine = Arc::new(AesEncryptor::new(
            engine_key.algorithm,
            key_length,
            metadata,
        )?);
        engines.insert(engine_key, Arc::clone(&engine));
        Ok(engine)
    }

    fn footer_handle(&self) -> Result<Encryptor> {
        let key = self.properties.footer_key.clone();
        let mut encryptor = Encryptor::new(self.engine(key.len(), true)?, key, &self.file_aad);
        encryptor.set_aad(create_footer_aad(&self.file_aad)?);
        Ok(encryptor)
    }

    /// Get the encryptor for an encrypted footer
    pub fn get_footer_encryptor(&self) -> Result<Encryptor> {
        if !self.properties.encrypted_footer() {
            return Err(general_err!("Footer is not encrypted"));
        }
        self.footer_handle()
    }

    /// Get the encryptor used to sign a plaintext footer
    pub fn get_footer_signing_encryptor(&self) -> Result<Encryptor> {
        if self.properties.encrypted_footer() {
            return Err(general_err!("Footer is encrypted, not signed"));
        }
        self.footer_handle()
    }

    fn column_key(&self, column_path: &ColumnPath) -> Option<SecretKey> {
        if self.properties.is_uniform() {
            return Some(self.properties.footer_key.clone());
        }
        let properties = self.properties.column_properties(column_path)?;
        match &properties.key {
            Some(key) => Some(key.clone()),
            None => Some(self.properties.footer_key.clone()),
        }
    }

    fn column_handle(&self, column_path: &ColumnPath, metadata: bool) -> Result<Option<Encryptor>> {
        match self.column_key(column_path) {
            None => Ok(None),
            Some(key) => {
                let engine = self.engine(key.len(), metadata)?;
                Ok(Some(Encryptor::new(engine, key, &self.file_aad)))
            }
        }
    }

    /// Get the encryptor for the metadata of a column, or `None` if the column is not encrypted
    pub fn get_column_meta_encryptor(&self, column_path: &ColumnPath) -> Result<Option<Encryptor>> {
        self.column_handle(column_path, true)
    }

    /// Get the encryptor for the pages of a column, or `None` if the column is not encrypted
    pub fn get_column_data_encryptor(&self, column_path: &ColumnPath) -> Result<Option<Encryptor>> {
        self.column_handle(column_path, false)
    }

    /// Get the crypto metadata of a column, or `None` if the column is not encrypted
    pub fn column_crypto_metadata(&self, column_path: &ColumnPath) -> Option<ColumnCryptoMetaData> {
        if self.properties.is_uniform() {
            return Some(ColumnCryptoMetaData::ENCRYPTION_WITH_FOOTER_KEY);
        }
        let properties = self.properties.column_properties(column_path)?;
        if properties.is_encrypted_with_footer_key() {
            Some(ColumnCryptoMetaData::ENCRYPTION_WITH_FOOTER_KEY)
        } else {
            Some(ColumnCryptoMetaData::ENCRYPTION_WITH_COLUMN_KEY(
                EncryptionWithColumnKey {
                    path_in_schema: column_path.parts().to_vec(),
                    key_metadata: properties.key_metadata.clone(),
                },
            ))
        }
    }

    /// Releases all engines of this file
    pub fn wipe_out(&self) {
        if let Ok(mut engines) = self.engines.lock() {
            engines.clear();
        }
    }

    #[cfg(test)]
    fn num_engines(&self) -> usize {
        self.engines.lock().map(|e| e.len()).unwrap_or_default()
    }
}

/// Serialize and encrypt an object with the AAD already set on `encryptor`
pub(crate) fn encrypt_object<T: Serialize>(object: &T, encryptor: &Encryptor) -> Result<Vec<u8>> {
    let buffer = codec::serialize(object)?;
    encryptor.encrypt(&buffer)
}

/// Write a serialized object followed by its signature: the nonce and GCM tag of
/// encrypting it with the footer signing encryptor. Returns the number of bytes written.
pub(crate) fn write_signed_plaintext_object<T: Serialize, W: Write>(
    object: &T,
    encryptor: &Encryptor,
    sink: &mut W,
) -> Result<usize> {
    let buffer = codec::serialize(object)?;
    sink.write_all(&buffer)?;
    let encrypted = encryptor.encrypt(&buffer)?;

    // Format of encrypted buffer is: [ciphertext size, nonce, ciphertext, authentication tag]
    let nonce = &encrypted[SIZE_LEN..SIZE_LEN + NONCE_LEN];
    let tag = &encrypted[encrypted.len() - TAG_LEN..];
    sink.write_all(nonce)?;
    sink.write_all(tag)?;

    Ok(buffer.len() + NONCE_LEN + TAG_LEN)
}
