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

//! Decoding of the serialized footer into [`ParquetMetaData`], including the
//! verification or decryption of the footer of encrypted files.

use std::sync::Arc;

use tracing::debug;

use crate::codec;
use crate::encryption::ciphers::FOOTER_SIGNATURE_LEN;
use crate::encryption::decrypt::{read_and_decrypt, FileDecryptionProperties, FileDecryptor};
use crate::encryption::ParquetCipher;
use crate::errors::{ParquetError, Result};
use crate::file::metadata::{FileMetaData, ParquetMetaData, RowGroupMetaData};
use crate::format::{self, EncryptionAlgorithm, FileCryptoMetaData};
use crate::schema::types::from_format;

/// Decodes a plaintext footer.
///
/// The footer of an encrypted file may be followed by its signature, which is verified
/// when decryption properties are provided and require it.
pub(crate) fn decode_plaintext_footer(
    buf: &[u8],
    file_decryption_properties: Option<&Arc<FileDecryptionProperties>>,
) -> Result<ParquetMetaData> {
    let (file_metadata, consumed) = codec::deserialize::<format::FileMetaData>(buf)?;

    let file_decryptor = match (&file_metadata.encryption_algorithm, file_decryption_properties) {
        (Some(algorithm), Some(properties)) => {
            let file_decryptor = get_file_decryptor(
                algorithm,
                file_metadata.footer_signing_key_metadata.as_deref(),
                properties,
            )?;
            if properties.check_plaintext_footer_integrity() {
                let signature = &buf[consumed..];
                if signature.len() != FOOTER_SIGNATURE_LEN {
                    return Err(corrupt_err!(
                        "Plaintext footer is followed by {} bytes, expected a {} byte signature",
                        signature.len(),
                        FOOTER_SIGNATURE_LEN
                    ));
                }
                file_decryptor.verify_plaintext_footer_signature(&buf[..consumed], signature)?;
                debug!("verified plaintext footer signature");
            }
            Some(Arc::new(file_decryptor))
        }
        (Some(_), None) => {
            debug!("reading encrypted file with plaintext footer without decryption properties");
            None
        }
        (None, _) => {
            if consumed != buf.len() {
                return Err(corrupt_err!(
                    "Footer metadata has {} trailing bytes",
                    buf.len() - consumed
                ));
            }
            None
        }
    };

    build_metadata(file_metadata, file_decryptor)
}

/// Decodes an encrypted footer: the file crypto metadata followed by the encrypted
/// file metadata.
pub(crate) fn decode_encrypted_footer(
    buf: &[u8],
    file_decryption_properties: Option<&Arc<FileDecryptionProperties>>,
) -> Result<ParquetMetaData> {
    let properties = file_decryption_properties.ok_or_else(|| {
        config_err!("Parquet file has an encrypted footer but decryption properties were not provided")
    })?;

    let (crypto_metadata, consumed) = codec::deserialize::<FileCryptoMetaData>(buf)?;
    let file_decryptor = get_file_decryptor(
        &crypto_metadata.encryption_algorithm,
        crypto_metadata.key_metadata.as_deref(),
        properties,
    )?;

    let footer_decryptor = file_decryptor.get_footer_decryptor()?;
    let mut input = &buf[consumed..];
    let decrypted = read_and_decrypt(&footer_decryptor, &mut input).map_err(|e| match e {
        ParquetError::AuthenticationFailure(_) => {
            auth_err!("Provided footer key and AAD were unable to decrypt parquet footer")
        }
        ParquetError::EOF(_) | ParquetError::External(_) => {
            corrupt_err!("Encrypted footer is truncated: {}", e)
        }
        other => other,
    })?;
    if !input.is_empty() {
        return Err(corrupt_err!(
            "Encrypted footer has {} trailing bytes",
            input.len()
        ));
    }

    let (file_metadata, _) = codec::deserialize::<format::FileMetaData>(&decrypted)?;
    build_metadata(file_metadata, Some(Arc::new(file_decryptor)))
}

/// Creates the decryption state of a file, reconciling the AAD prefix stored in the file
/// with the one supplied in the decryption properties.
fn get_file_decryptor(
    encryption_algorithm: &EncryptionAlgorithm,
    footer_key_metadata: Option<&[u8]>,
    properties: &Arc<FileDecryptionProperties>,
) -> Result<FileDecryptor> {
    let (algorithm, stored_aad_prefix, aad_file_unique, supply_aad_prefix) =
        match encryption_algorithm {
            EncryptionAlgorithm::AesGcmV1(a) => (
                ParquetCipher::AES_GCM_V1,
                a.aad_prefix.as_deref(),
                a.aad_file_unique.as_deref(),
                a.supply_aad_prefix.unwrap_or(false),
            ),
            EncryptionAlgorithm::AesGcmCtrV1(a) => (
                ParquetCipher::AES_GCM_CTR_V1,
                a.aad_prefix.as_deref(),
                a.aad_file_unique.as_deref(),
                a.supply_aad_prefix.unwrap_or(false),
            ),
        };
    let aad_file_unique = aad_file_unique
        .ok_or_else(|| corrupt_err!("AAD unique file identifier is not set"))?;

    let aad_prefix: &[u8] = match (stored_aad_prefix, properties.aad_prefix()) {
        (Some(stored), Some(supplied)) if stored != supplied => {
            return Err(ParquetError::AadPrefixMismatch(
                "AAD prefix used for file encryption does not match the AAD prefix supplied \
                 in decryption properties"
                    .to_string(),
            ))
        }
        (Some(stored), _) => {
            if let Some(verifier) = properties.aad_prefix_verifier() {
                verifier.check(stored)?;
            }
            stored
        }
        (None, Some(supplied)) => supplied,
        (None, None) if supply_aad_prefix => {
            return Err(ParquetError::MissingAadPrefix(
                "AAD prefix used for file encryption, but not stored in file and not supplied \
                 in decryption properties"
                    .to_string(),
            ))
        }
        (None, None) => &[],
    };

    debug!(?algorithm, aad_prefix_len = aad_prefix.len(), "created file decryptor");
    Ok(FileDecryptor::new(
        Arc::clone(properties),
        algorithm,
        aad_prefix,
        aad_file_unique,
        footer_key_metadata.map(|m| m.to_vec()),
    ))
}

fn build_metadata(
    file_metadata: format::FileMetaData,
    file_decryptor: Option<Arc<FileDecryptor>>,
) -> Result<ParquetMetaData> {
    let schema_descr = Arc::new(from_format(
        &file_metadata.schema_name,
        &file_metadata.schema,
    )?);

    let mut row_groups = Vec::with_capacity(file_metadata.row_groups.len());
    for (i, rg) in file_metadata.row_groups.into_iter().enumerate() {
        if rg.columns.len() != schema_descr.num_columns() {
            return Err(corrupt_err!(
                "Row group {} has {} columns, schema has {}",
                i,
                rg.columns.len(),
                schema_descr.num_columns()
            ));
        }
        let ordinal = match rg.ordinal {
            Some(ordinal) => ordinal,
            None => i16::try_from(i).map_err(|_| {
                corrupt_err!("Encrypted parquet files can't have more than 32767 row groups: {}", i)
            })?,
        };
        row_groups.push(RowGroupMetaData::new(
            rg.columns,
            rg.num_rows,
            rg.total_byte_size,
            rg.file_offset,
            ordinal,
            schema_descr.clone(),
        ));
    }

    let file_metadata = FileMetaData::new(
        file_metadata.version,
        file_metadata.num_rows,
        file_metadata.created_by,
        schema_descr,
    );
    Ok(ParquetMetaData::new(file_metadata, row_groups, file_decryptor))
}
