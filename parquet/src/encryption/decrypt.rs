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

//! Configuration and utilities for decryption of files using Parquet Modular Encryption

use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::io::Read;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use tracing::{debug, trace};

use crate::encryption::ciphers::{
    AesDecryptor, AesEncryptor, EngineKey, ParquetCipher, SecretKey, FOOTER_SIGNATURE_LEN,
    NONCE_LEN, SIZE_LEN, TAG_LEN,
};
use crate::encryption::modules::{create_footer_aad, create_module_aad, ModuleType, PageAad};
use crate::errors::{ParquetError, Result};
use crate::format::ColumnCryptoMetaData;
use crate::schema::types::ColumnPath;

/// Signatures of plaintext footers are checked unless disabled
pub const DEFAULT_CHECK_SIGNATURE: bool = true;

/// Trait for retrieving an encryption key using the key's metadata
///
/// Implementations may look keys up locally or call out to a key management service.
/// Failures are reported to readers as [`ParquetError::KeyNotFound`].
pub trait KeyRetriever: Send + Sync {
    /// Retrieve a decryption key given the key metadata
    fn retrieve_key(&self, key_metadata: &[u8]) -> Result<Vec<u8>>;
}

/// Trait for verifying the AAD prefix stored in a file, e.g. against the
/// identity of the table partition the file was read from
pub trait AadPrefixVerifier: Send + Sync {
    /// Returns an error if `aad_prefix` is not acceptable
    fn check(&self, aad_prefix: &[u8]) -> Result<()>;
}

/// Read `ciphertext` prefixed by its 4 byte length from `input` and decrypt it
pub(crate) fn read_and_decrypt<T: Read>(decryptor: &Decryptor, input: &mut T) -> Result<Vec<u8>> {
    let mut len_bytes = [0; SIZE_LEN];
    input.read_exact(&mut len_bytes)?;
    let ciphertext_len = u32::from_le_bytes(len_bytes) as usize;
    let mut ciphertext = len_bytes.to_vec();
    let read = input
        .by_ref()
        .take(ciphertext_len as u64)
        .read_to_end(&mut ciphertext)?;
    if read != ciphertext_len {
        return Err(eof_err!(
            "Expected {} bytes of ciphertext, got {}",
            ciphertext_len,
            read
        ));
    }
    decryptor.decrypt(&ciphertext)
}

/// Decryption key of a single column
#[derive(Debug, Clone)]
pub struct ColumnDecryptionProperties {
    column_path: ColumnPath,
    key: Option<SecretKey>,
}

impl ColumnDecryptionProperties {
    pub fn builder(column_path: impl Into<ColumnPath>) -> ColumnDecryptionPropertiesBuilder {
        ColumnDecryptionPropertiesBuilder {
            column_path: column_path.into(),
            key: None,
        }
    }

    pub fn column_path(&self) -> &ColumnPath {
        &self.column_path
    }

    pub fn key(&self) -> Option<&[u8]> {
        self.key.as_ref().map(SecretKey::as_bytes)
    }
}

/// Builder for [`ColumnDecryptionProperties`]
#[derive(Debug)]
pub struct ColumnDecryptionPropertiesBuilder {
    column_path: ColumnPath,
    key: Option<SecretKey>,
}

impl ColumnDecryptionPropertiesBuilder {
    /// Sets the explicit key of this column. Ignored if empty.
    pub fn with_key(mut self, key: Vec<u8>) -> Self {
        if !key.is_empty() {
            self.key = Some(SecretKey::new(key));
        }
        self
    }

    pub fn build(self) -> Result<ColumnDecryptionProperties> {
        Ok(ColumnDecryptionProperties {
            column_path: self.column_path,
            key: self.key.map(SecretKey::validated).transpose()?,
        })
    }
}

/// FileDecryptionProperties hold keys and AAD data required to decrypt a Parquet file.
///
/// Explicit keys always take precedence: the key retriever is only consulted for
/// keys that were not given explicitly.
///
/// ```
/// # use std::sync::Arc;
/// # use parquet_crypto::encryption::decrypt::FileDecryptionProperties;
/// # use parquet_crypto::encryption::retriever::StringKeyIdRetriever;
/// let retriever = StringKeyIdRetriever::new()
///     .with_key("kf", b"0123456789012345".to_vec());
/// let decryption_properties = FileDecryptionProperties::builder()
///     .with_key_retriever(Arc::new(retriever))
///     .with_aad_prefix(b"tester".to_vec())
///     .build()?;
/// # Ok::<(), parquet_crypto::errors::ParquetError>(())
/// ```
pub struct FileDecryptionProperties {
    footer_key: Option<SecretKey>,
    column_properties: BTreeMap<ColumnPath, ColumnDecryptionProperties>,
    key_retriever: Option<Arc<dyn KeyRetriever>>,
    check_plaintext_footer_integrity: bool,
    aad_prefix: Option<Vec<u8>>,
    aad_prefix_verifier: Option<Arc<dyn AadPrefixVerifier>>,
}

impl fmt::Debug for FileDecryptionProperties {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FileDecryptionProperties")
            .field("footer_key", &self.footer_key)
            .field("column_properties", &self.column_properties)
            .field("key_retriever", &self.key_retriever.is_some())
            .field(
                "check_plaintext_footer_integrity",
                &self.check_plaintext_footer_integrity,
            )
            .field("aad_prefix", &self.aad_prefix)
            .field("aad_prefix_verifier", &self.aad_prefix_verifier.is_some())
            .finish()
    }
}

impl FileDecryptionProperties {
    /// Returns a new FileDecryptionProperties builder
    pub fn builder() -> DecryptionPropertiesBuilder {
        DecryptionPropertiesBuilder::new()
    }

    /// Explicit footer key, if any
    pub fn footer_key(&self) -> Option<&[u8]> {
        self.footer_key.as_ref().map(SecretKey::as_bytes)
    }

    /// Explicit key of a column, if any
    pub fn column_key(&self, column_path: &ColumnPath) -> Option<&[u8]> {
        self.column_properties
            .get(column_path)
            .and_then(ColumnDecryptionProperties::key)
    }

    pub fn key_retriever(&self) -> Option<&Arc<dyn KeyRetriever>> {
        self.key_retriever.as_ref()
    }

    /// Whether plaintext footer signatures are verified
    pub fn check_plaintext_footer_integrity(&self) -> bool {
        self.check_plaintext_footer_integrity
    }

    pub fn aad_prefix(&self) -> Option<&[u8]> {
        self.aad_prefix.as_deref()
    }

    pub fn aad_prefix_verifier(&self) -> Option<&Arc<dyn AadPrefixVerifier>> {
        self.aad_prefix_verifier.as_ref()
    }
}

/// Builder for [`FileDecryptionProperties`]
pub struct DecryptionPropertiesBuilder {
    footer_key: Option<SecretKey>,
    column_properties: BTreeMap<ColumnPath, ColumnDecryptionProperties>,
    key_retriever: Option<Arc<dyn KeyRetriever>>,
    check_plaintext_footer_integrity: bool,
    aad_prefix: Option<Vec<u8>>,
    aad_prefix_verifier: Option<Arc<dyn AadPrefixVerifier>>,
}

impl fmt::Debug for DecryptionPropertiesBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DecryptionPropertiesBuilder")
            .field("footer_key", &self.footer_key)
            .field("column_properties", &self.column_properties)
            .field("key_retriever", &self.key_retriever.is_some())
            .field("aad_prefix", &self.aad_prefix)
            .finish_non_exhaustive()
    }
}

impl Default for DecryptionPropertiesBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl DecryptionPropertiesBuilder {
    pub fn new() -> DecryptionPropertiesBuilder {
        Self {
            footer_key: None,
            column_properties: BTreeMap::new(),
            key_retriever: None,
            check_plaintext_footer_integrity: DEFAULT_CHECK_SIGNATURE,
            aad_prefix: None,
            aad_prefix_verifier: None,
        }
    }

    /// Sets the explicit footer key. Ignored if empty.
    pub fn with_footer_key(mut self, footer_key: Vec<u8>) -> Self {
        if !footer_key.is_empty() {
            self.footer_key = Some(SecretKey::new(footer_key));
        }
        self
    }

    /// Sets explicit column keys. Must be called at most once with a non-empty list.
    pub fn with_column_properties(
        mut self,
        column_properties: Vec<ColumnDecryptionProperties>,
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
                    "Column {} has more than one set of decryption properties",
                    path
                ));
            }
        }
        Ok(self)
    }

    /// Sets the retriever used for keys that are not given explicitly
    pub fn with_key_retriever(mut self, key_retriever: Arc<dyn KeyRetriever>) -> Self {
        self.key_retriever = Some(key_retriever);
        self
    }

    /// Skip verification of plaintext footer signatures
    pub fn disable_footer_signature_verification(mut self) -> Self {
        self.check_plaintext_footer_integrity = false;
        self
    }

    /// Sets the AAD prefix, needed for files that were written without storing it.
    /// Ignored if empty.
    pub fn with_aad_prefix(mut self, aad_prefix: Vec<u8>) -> Self {
        if !aad_prefix.is_empty() {
            self.aad_prefix = Some(aad_prefix);
        }
        self
    }

    /// Sets a verifier for AAD prefixes stored in files
    pub fn with_aad_prefix_verifier(mut self, verifier: Arc<dyn AadPrefixVerifier>) -> Self {
        self.aad_prefix_verifier = Some(verifier);
        self
    }

    pub fn build(self) -> Result<Arc<FileDecryptionProperties>> {
        Ok(Arc::new(FileDecryptionProperties {
            footer_key: self.footer_key.map(SecretKey::validated).transpose()?,
            column_properties: self.column_properties,
            key_retriever: self.key_retriever,
            check_plaintext_footer_integrity: self.check_plaintext_footer_integrity,
            aad_prefix: self.aad_prefix,
            aad_prefix_verifier: self.aad_prefix_verifier,
        }))
    }
}

/// Decrypts modules under one key, scoped by the AAD set before each call
///
/// A handle is not synchronized: set the AAD and decrypt from one thread at a time.
#[derive(Debug, Clone)]
pub struct Decryptor {
    engine: Arc<AesDecryptor>,
    key: SecretKey,
    file_aad: Vec<u8>,
    aad: Vec<u8>,
}

impl Decryptor {
    fn new(engine: Arc<AesDecryptor>, key: SecretKey, file_aad: &[u8]) -> Self {
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

    pub fn decrypt(&self, ciphertext: &[u8]) -> Result<Vec<u8>> {
        self.engine.decrypt(ciphertext, self.key.as_bytes(), &self.aad)
    }
}

/// Decryption state of a single Parquet file
///
/// Resolves keys for the footer and columns and owns the engines used to read the file.
/// Once wiped out, no further keys are resolved.
#[derive(Debug)]
pub(crate) struct FileDecryptor {
    properties: Arc<FileDecryptionProperties>,
    algorithm: ParquetCipher,
    file_aad: Vec<u8>,
    footer_key_metadata: Option<Vec<u8>>,
    footer_key: Mutex<Option<SecretKey>>,
    engines: Mutex<HashMap<EngineKey, Arc<AesDecryptor>>>,
    wiped_out: AtomicBool,
}

impl FileDecryptor {
    pub(crate) fn new(
        properties: Arc<FileDecryptionProperties>,
        algorithm: ParquetCipher,
        aad_prefix: &[u8],
        aad_file_unique: &[u8],
        footer_key_metadata: Option<Vec<u8>>,
    ) -> Self {
        Self {
            properties,
            algorithm,
            file_aad: [aad_prefix, aad_file_unique].concat(),
            footer_key_metadata,
            footer_key: Mutex::new(None),
            engines: Mutex::new(HashMap::new()),
            wiped_out: AtomicBool::new(false),
        }
    }

    pub(crate) fn file_aad(&self) -> &[u8] {
        &self.file_aad
    }

    pub(crate) fn algorithm(&self) -> ParquetCipher {
        self.algorithm
    }

    pub(crate) fn properties(&self) -> &Arc<FileDecryptionProperties> {
        &self.properties
    }

    fn check_not_wiped_out(&self) -> Result<()> {
        if self.wiped_out.load(Ordering::Acquire) {
            return Err(general_err!("Decryption keys of the file have been wiped out"));
        }
        Ok(())
    }

    fn retrieve_key(&self, key_metadata: Option<&[u8]>, what: &dyn fmt::Display) -> Result<SecretKey> {
        let retriever = self
            .properties
            .key_retriever()
            .ok_or_else(|| key_err!("No key or key retriever available for {}", what))?;
        let key_metadata = key_metadata
            .filter(|m| !m.is_empty())
            .ok_or_else(|| key_err!("No key metadata available to retrieve key for {}", what))?;
        debug!(%what, "retrieving key");
        let key = retriever.retrieve_key(key_metadata).map_err(|e| match e {
            ParquetError::KeyNotFound(_) => e,
            other => key_err!("Could not retrieve key for {}: {}", what, other),
        })?;
        SecretKey::try_new(key)
    }

    fn footer_key(&self) -> Result<SecretKey> {
        let mut cached = self
            .footer_key
            .lock()
            .map_err(|_| general_err!("Decryptor registry lock poisoned"))?;
        self.check_not_wiped_out()?;
        if let Some(key) = cached.as_ref() {
            return Ok(key.clone());
        }
        let key = match &self.properties.footer_key {
            Some(key) => key.clone(),
            None => self.retrieve_key(self.footer_key_metadata.as_deref(), &"footer")?,
        };
        *cached = Some(key.clone());
        Ok(key)
    }

    fn engine(&self, key_length: usize, metadata: bool) -> Result<Arc<AesDecryptor>> {
        let engine_key = EngineKey {
            algorithm: self.algorithm,
            key_length,
            metadata,
        };
        let mut engines = self
            .engines
            .lock()
            .map_err(|_| general_err!("Decryptor registry lock poisoned"))?;
        if let Some(engine) = engines.get(&engine_key) {
            return Ok(Arc::clone(engine));
        }
        debug!(?engine_key, "creating decryption engine");
        let engine = Arc::new(AesDecryptor::new(self.algorithm, key_length, metadata)?);
        engines.insert(engine_key, Arc::clone(&engine));
        Ok(engine)
    }

    fn handle(&self, key: SecretKey, metadata: bool) -> Result<Decryptor> {
        let engine = self.engine(key.len(), metadata)?;
        Ok(Decryptor::new(engine, key, &self.file_aad))
    }

    /// Get the decryptor of an encrypted footer
    pub(crate) fn get_footer_decryptor(&self) -> Result<Decryptor> {
        let mut decryptor = self.handle(self.footer_key()?, true)?;
        decryptor.set_aad(create_footer_aad(&self.file_aad)?);
        Ok(decryptor)
    }

    fn column_key(&self, column_path: &ColumnPath, crypto_metadata: &ColumnCryptoMetaData) -> Result<SecretKey> {
        self.check_not_wiped_out()?;
        match crypto_metadata {
            ColumnCryptoMetaData::ENCRYPTION_WITH_FOOTER_KEY => self.footer_key(),
            ColumnCryptoMetaData::ENCRYPTION_WITH_COLUMN_KEY(column_key) => {
                match self.properties.column_properties.get(column_path).and_then(|p| p.key.clone()) {
                    Some(key) => Ok(key),
                    None => self.retrieve_key(
                        column_key.key_metadata.as_deref(),
                        &format!("column '{}'", column_path),
                    ),
                }
            }
        }
    }

    /// Get the decryptor of the metadata, page headers and indexes of a column
    pub(crate) fn get_column_meta_decryptor(
        &self,
        column_path: &ColumnPath,
        crypto_metadata: &ColumnCryptoMetaData,
    ) -> Result<Decryptor> {
        self.handle(self.column_key(column_path, crypto_metadata)?, true)
    }

    /// Get the decryptor of the page bodies of a column
    pub(crate) fn get_column_data_decryptor(
        &self,
        column_path: &ColumnPath,
        crypto_metadata: &ColumnCryptoMetaData,
    ) -> Result<Decryptor> {
        self.handle(self.column_key(column_path, crypto_metadata)?, false)
    }

    /// Checks the signature that follows a plaintext footer
    pub(crate) fn verify_plaintext_footer_signature(&self, footer: &[u8], signature: &[u8]) -> Result<()> {
        if signature.len() != FOOTER_SIGNATURE_LEN {
            return Err(corrupt_err!(
                "Footer signature of {} bytes, expected {}",
                signature.len(),
                FOOTER_SIGNATURE_LEN
            ));
        }
        let key = self.footer_key()?;
        let aad = create_footer_aad(&self.file_aad)?;
        let (nonce, tag) = signature.split_at(NONCE_LEN);

        let engine = AesEncryptor::new(ParquetCipher::AES_GCM_V1, key.len(), true)?;
        let encrypted = engine.signed_footer_encrypt(footer, key.as_bytes(), &aad, nonce)?;
        debug_assert_eq!(encrypted.len(), SIZE_LEN + footer.len() + FOOTER_SIGNATURE_LEN);
        let computed_tag = &encrypted[encrypted.len() - TAG_LEN..];

        ring::constant_time::verify_slices_are_equal(computed_tag, tag).map_err(|_| {
            ParquetError::FooterIntegrity("Signature mismatch in plaintext footer".to_string())
        })
    }

    /// Drops cached keys and engines and refuses to resolve keys afterwards
    pub(crate) fn wipe_out(&self) {
        self.wiped_out.store(true, Ordering::Release);
        if let Ok(mut key) = self.footer_key.lock() {
            key.take();
        }
        if let Ok(mut engines) = self.engines.lock() {
            engines.clear();
        }
        trace!("decryptor registry wiped");
    }

    #[cfg(test)]
    fn num_engines(&self) -> usize {
        self.engines.lock().map(|e| e.len()).unwrap_or_default()
    }
}

/// Decryption context of one column chunk
///
/// Builds the module AADs of the chunk's pages and offset index and decrypts them with the
/// column's metadata and data decryptors.
#[derive(Debug)]
pub(crate) struct CryptoContext {
    row_group_ordinal: usize,
    column_ordinal: usize,
    metadata_decryptor: Decryptor,
    data_decryptor: Decryptor,
    data_page_header_aad: PageAad,
    data_page_aad: PageAad,
}

impl CryptoContext {
    pub(crate) fn new(
        row_group_ordinal: usize,
        column_ordinal: usize,
        metadata_decryptor: Decryptor,
        data_decryptor: Decryptor,
    ) -> Self {
        Self {
            row_group_ordinal,
            column_ordinal,
            metadata_decryptor,
            data_decryptor,
            data_page_header_aad: PageAad::new(
                ModuleType::DataPageHeader,
                row_group_ordinal,
                column_ordinal,
            ),
            data_page_aad: PageAad::new(ModuleType::DataPage, row_group_ordinal, column_ordinal),
        }
    }

    fn module_aad(&self, module_type: ModuleType) -> Result<Vec<u8>> {
        create_module_aad(
            self.metadata_decryptor.file_aad(),
            module_type,
            self.row_group_ordinal,
            self.column_ordinal,
            None,
        )
    }

    /// Reads and decrypts a length prefixed page header from `input`
    pub(crate) fn read_page_header<T: Read>(
        &mut self,
        input: &mut T,
        page_ordinal: usize,
        dictionary_page: bool,
    ) -> Result<Vec<u8>> {
        let aad = if dictionary_page {
            self.module_aad(ModuleType::DictionaryPageHeader)?
        } else {
            self.data_page_header_aad
                .for_page(self.metadata_decryptor.file_aad(), page_ordinal)?
        };
        self.metadata_decryptor.set_aad(aad);
        read_and_decrypt(&self.metadata_decryptor, input)
    }

    /// Decrypts a page body
    pub(crate) fn decrypt_page(
        &mut self,
        buf: &[u8],
        page_ordinal: usize,
        dictionary_page: bool,
    ) -> Result<Vec<u8>> {
        let aad = if dictionary_page {
            self.module_aad(ModuleType::DictionaryPage)?
        } else {
            self.data_page_aad
                .for_page(self.data_decryptor.file_aad(), page_ordinal)?
        };
        self.data_decryptor.set_aad(aad);
        self.data_decryptor.decrypt(buf)
    }

    /// Decrypts the offset index of the column chunk
    pub(crate) fn decrypt_offset_index(&mut self, buf: &[u8]) -> Result<Vec<u8>> {
        let aad = self.module_aad(ModuleType::OffsetIndex)?;
        self.metadata_decryptor.set_aad(aad);
        self.metadata_decryptor.decrypt(buf)
    }
}
