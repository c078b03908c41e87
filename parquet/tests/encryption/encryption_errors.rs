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

//! Tests of misconfigured keys and of tampered or truncated encrypted files

use std::sync::Arc;

use bytes::Bytes;
use parquet_crypto::encryption::decrypt::{
    AadPrefixVerifier, ColumnDecryptionProperties, FileDecryptionProperties,
};
use parquet_crypto::encryption::encrypt::{ColumnEncryptionProperties, FileEncryptionProperties};
use parquet_crypto::errors::{ParquetError, Result};
use parquet_crypto::file::reader::{FileReader, RowGroupReader};

use crate::encryption_util::{
    column_encryption_properties, explicit_key_decryption_properties, init_tracing, open_file,
    test_columns, verify_test_data, write_test_file, writer_properties, COLUMN_1_KEY,
    COLUMN_2_KEY, FOOTER_KEY, NUM_ROWS,
};

const WRONG_KEY: &[u8] = b"5432109876543210";

fn uniform_encryption(plaintext_footer: bool) -> Arc<FileEncryptionProperties> {
    FileEncryptionProperties::builder(FOOTER_KEY.to_vec())
        .with_plaintext_footer(plaintext_footer)
        .build()
        .unwrap()
}

fn footer_key_decryption(footer_key: &[u8]) -> Arc<FileDecryptionProperties> {
    FileDecryptionProperties::builder()
        .with_footer_key(footer_key.to_vec())
        .build()
        .unwrap()
}

fn flip_byte(bytes: &Bytes, position: usize) -> Bytes {
    let mut tampered = bytes.to_vec();
    tampered[position] ^= 0x01;
    Bytes::from(tampered)
}

macro_rules! assert_err {
    ($result:expr, $variant:ident) => {
        match $result {
            Err(ParquetError::$variant(message)) => message,
            Err(e) => panic!("unexpected error: {e}"),
            Ok(_) => panic!("expected an error"),
        }
    };
}

#[test]
fn test_wrong_footer_key_encrypted_footer() {
    init_tracing();
    let bytes = write_test_file(writer_properties(uniform_encryption(false))).unwrap();
    let message = assert_err!(
        open_file(bytes, Some(footer_key_decryption(WRONG_KEY))),
        AuthenticationFailure
    );
    assert_eq!(
        message,
        "Provided footer key and AAD were unable to decrypt parquet footer"
    );
}

#[test]
fn test_wrong_footer_key_plaintext_footer() {
    init_tracing();
    let bytes = write_test_file(writer_properties(uniform_encryption(true))).unwrap();
    assert_err!(
        open_file(bytes, Some(footer_key_decryption(WRONG_KEY))),
        FooterIntegrity
    );
}

#[test]
fn test_wrong_footer_key_with_signature_check_disabled() {
    let bytes = write_test_file(writer_properties(uniform_encryption(true))).unwrap();
    let decryption = FileDecryptionProperties::builder()
        .with_footer_key(WRONG_KEY.to_vec())
        .disable_footer_signature_verification()
        .build()
        .unwrap();

    // The footer opens but the uniformly encrypted columns cannot be authenticated
    let reader = open_file(bytes, Some(decryption)).unwrap();
    let row_group = reader.get_row_group(0).unwrap();
    assert_err!(row_group.read_column(0), AuthenticationFailure);
}

#[test]
fn test_wrong_column_key() {
    init_tracing();
    for plaintext_footer in [false, true] {
        let encryption = column_encryption_properties(plaintext_footer).unwrap();
        let bytes = write_test_file(writer_properties(encryption)).unwrap();

        let decryption = FileDecryptionProperties::builder()
            .with_footer_key(FOOTER_KEY.to_vec())
            .with_column_properties(vec![
                ColumnDecryptionProperties::builder("double_field")
                    .with_key(COLUMN_2_KEY.to_vec())
                    .build()
                    .unwrap(),
                ColumnDecryptionProperties::builder("float_field")
                    .with_key(COLUMN_2_KEY.to_vec())
                    .build()
                    .unwrap(),
            ])
            .unwrap()
            .build()
            .unwrap();
        let reader = open_file(bytes, Some(decryption)).unwrap();
        let row_group = reader.get_row_group(0).unwrap();
        assert_eq!(
            row_group.read_column(2).unwrap(),
            test_columns(0, NUM_ROWS / 2)[2]
        );
        assert_err!(row_group.read_column(3), AuthenticationFailure);
    }
}

#[test]
fn test_tampered_plaintext_footer() {
    init_tracing();
    let bytes = write_test_file(writer_properties(uniform_encryption(true))).unwrap();
    let created_by = b"parquet-crypto version";
    let position = bytes
        .windows(created_by.len())
        .rposition(|w| w == created_by)
        .unwrap();
    let tampered = flip_byte(&bytes, position);

    assert_err!(
        open_file(tampered.clone(), Some(footer_key_decryption(FOOTER_KEY))),
        FooterIntegrity
    );

    // Unsigned readers do not detect the change
    let decryption = FileDecryptionProperties::builder()
        .with_footer_key(FOOTER_KEY.to_vec())
        .disable_footer_signature_verification()
        .build()
        .unwrap();
    let reader = open_file(tampered, Some(decryption)).unwrap();
    let created_by = reader.metadata().file_metadata().created_by().unwrap();
    assert!(created_by.starts_with("qarquet-crypto version"));
    verify_test_data(&reader, NUM_ROWS);
}

#[test]
fn test_tampered_footer_signature() {
    let bytes = write_test_file(writer_properties(uniform_encryption(true))).unwrap();
    // The last byte of the signature tag precedes the length and magic
    let tampered = flip_byte(&bytes, bytes.len() - 9);
    assert_err!(
        open_file(tampered, Some(footer_key_decryption(FOOTER_KEY))),
        FooterIntegrity
    );
}

#[test]
fn test_tampered_encrypted_footer() {
    init_tracing();
    let bytes = write_test_file(writer_properties(uniform_encryption(false))).unwrap();
    // Last byte of the footer's authentication tag
    let tampered = flip_byte(&bytes, bytes.len() - 9);
    assert_err!(
        open_file(tampered, Some(footer_key_decryption(FOOTER_KEY))),
        AuthenticationFailure
    );
}

#[test]
fn test_tampered_data_page() {
    init_tracing();
    for plaintext_footer in [false, true] {
        let bytes = write_test_file(writer_properties(uniform_encryption(plaintext_footer))).unwrap();
        let reader = open_file(bytes.clone(), Some(footer_key_decryption(FOOTER_KEY))).unwrap();
        let (start, length) = reader.metadata().column_chunk(0, 0).unwrap().byte_range();

        // Last byte of the tag of the last data page
        let tampered = flip_byte(&bytes, (start + length - 1) as usize);
        let reader = open_file(tampered, Some(footer_key_decryption(FOOTER_KEY))).unwrap();
        let row_group = reader.get_row_group(0).unwrap();
        assert_err!(row_group.read_column(0), AuthenticationFailure);

        // Other columns are unaffected
        let expected = test_columns(0, NUM_ROWS / 2);
        assert_eq!(row_group.read_column(1).unwrap(), expected[1]);
        let row_group = reader.get_row_group(1).unwrap();
        assert_eq!(
            row_group.read_column(0).unwrap(),
            test_columns(NUM_ROWS / 2, NUM_ROWS / 2)[0]
        );
    }
}

#[test]
fn test_column_chunk_replaced_from_other_file() {
    init_tracing();
    // Same keys and layout, but a different AAD file identifier
    let original = write_test_file(writer_properties(uniform_encryption(false))).unwrap();
    let other = write_test_file(writer_properties(uniform_encryption(false))).unwrap();
    assert_eq!(original.len(), other.len());

    let reader = open_file(original.clone(), Some(footer_key_decryption(FOOTER_KEY))).unwrap();
    let (start, length) = reader.metadata().column_chunk(0, 0).unwrap().byte_range();
    let range = start as usize..(start + length) as usize;

    let mut replaced = original.to_vec();
    replaced[range.clone()].copy_from_slice(&other[range]);
    let reader = open_file(Bytes::from(replaced), Some(footer_key_decryption(FOOTER_KEY))).unwrap();
    let row_group = reader.get_row_group(0).unwrap();
    assert_err!(row_group.read_column(0), AuthenticationFailure);
}

#[test]
fn test_row_group_pages_are_bound_to_their_position() {
    let bytes = write_test_file(writer_properties(uniform_encryption(false))).unwrap();
    let reader = open_file(bytes.clone(), Some(footer_key_decryption(FOOTER_KEY))).unwrap();
    let (start_0, length_0) = reader.metadata().column_chunk(0, 0).unwrap().byte_range();
    let (start_1, length_1) = reader.metadata().column_chunk(1, 0).unwrap().byte_range();
    assert_eq!(length_0, length_1);

    // Swap the first column chunks of both row groups
    let mut swapped = bytes.to_vec();
    let chunk_0 = bytes[start_0 as usize..(start_0 + length_0) as usize].to_vec();
    let chunk_1 = bytes[start_1 as usize..(start_1 + length_1) as usize].to_vec();
    swapped[start_0 as usize..(start_0 + length_0) as usize].copy_from_slice(&chunk_1);
    swapped[start_1 as usize..(start_1 + length_1) as usize].copy_from_slice(&chunk_0);

    let reader = open_file(Bytes::from(swapped), Some(footer_key_decryption(FOOTER_KEY))).unwrap();
    for i in 0..reader.num_row_groups() {
        let row_group = reader.get_row_group(i).unwrap();
        assert_err!(row_group.read_column(0), AuthenticationFailure);
    }
}

#[test]
fn test_aad_prefix_mismatch() {
    init_tracing();
    for plaintext_footer in [false, true] {
        let encryption = FileEncryptionProperties::builder(FOOTER_KEY.to_vec())
            .with_plaintext_footer(plaintext_footer)
            .with_aad_prefix(b"tester".to_vec())
            .build()
            .unwrap();
        let bytes = write_test_file(writer_properties(encryption)).unwrap();

        let decryption = FileDecryptionProperties::builder()
            .with_footer_key(FOOTER_KEY.to_vec())
            .with_aad_prefix(b"wrong_aad_prefix".to_vec())
            .build()
            .unwrap();
        assert_err!(open_file(bytes, Some(decryption)), AadPrefixMismatch);
    }
}

#[test]
fn test_missing_aad_prefix() {
    init_tracing();
    for plaintext_footer in [false, true] {
        let encryption = FileEncryptionProperties::builder(FOOTER_KEY.to_vec())
            .with_plaintext_footer(plaintext_footer)
            .with_aad_prefix(b"tester".to_vec())
            .disable_aad_prefix_storage()
            .unwrap()
            .build()
            .unwrap();
        let bytes = write_test_file(writer_properties(encryption)).unwrap();

        assert_err!(
            open_file(bytes, Some(footer_key_decryption(FOOTER_KEY))),
            MissingAadPrefix
        );
    }
}

#[test]
fn test_wrong_supplied_aad_prefix() {
    let encryption = FileEncryptionProperties::builder(FOOTER_KEY.to_vec())
        .with_aad_prefix(b"tester".to_vec())
        .disable_aad_prefix_storage()
        .unwrap()
        .build()
        .unwrap();
    let bytes = write_test_file(writer_properties(encryption)).unwrap();

    let decryption = FileDecryptionProperties::builder()
        .with_footer_key(FOOTER_KEY.to_vec())
        .with_aad_prefix(b"wrong_aad_prefix".to_vec())
        .build()
        .unwrap();
    assert_err!(
        open_file(bytes, Some(decryption)),
        AuthenticationFailure
    );
}

struct RejectingVerifier;

impl AadPrefixVerifier for RejectingVerifier {
    fn check(&self, aad_prefix: &[u8]) -> Result<()> {
        Err(ParquetError::AadPrefixMismatch(format!(
            "unexpected prefix {aad_prefix:?}"
        )))
    }
}

#[test]
fn test_aad_prefix_verifier() {
    let encryption = FileEncryptionProperties::builder(FOOTER_KEY.to_vec())
        .with_aad_prefix(b"tester".to_vec())
        .build()
        .unwrap();
    let bytes = write_test_file(writer_properties(encryption)).unwrap();

    let decryption = FileDecryptionProperties::builder()
        .with_footer_key(FOOTER_KEY.to_vec())
        .with_aad_prefix_verifier(Arc::new(RejectingVerifier))
        .build()
        .unwrap();
    let message = assert_err!(open_file(bytes, Some(decryption)), AadPrefixMismatch);
    assert!(message.contains(&format!("{:?}", b"tester")));
}

#[test]
fn test_encrypted_footer_without_decryption_properties() {
    let bytes = write_test_file(writer_properties(uniform_encryption(false))).unwrap();
    assert_err!(open_file(bytes, None), EncryptionConfig);
}

#[test]
fn test_missing_column_key_without_retriever() {
    let encryption = column_encryption_properties(false).unwrap();
    let bytes = write_test_file(writer_properties(encryption)).unwrap();
    let reader = open_file(bytes, Some(footer_key_decryption(FOOTER_KEY))).unwrap();
    let row_group = reader.get_row_group(0).unwrap();
    assert_err!(row_group.read_column(2), KeyNotFound);
    assert_err!(row_group.read_column(3), KeyNotFound);
}

#[test]
fn test_invalid_key_lengths() {
    assert_err!(
        FileEncryptionProperties::builder(b"short".to_vec()).build(),
        EncryptionConfig
    );
    assert_err!(
        ColumnEncryptionProperties::builder("double_field")
            .with_key(vec![0; 17])
            .build(),
        EncryptionConfig
    );
    assert_err!(
        FileDecryptionProperties::builder()
            .with_footer_key(vec![0; 33])
            .build(),
        EncryptionConfig
    );
}

#[test]
fn test_truncated_files() {
    init_tracing();
    let bytes = write_test_file(writer_properties(uniform_encryption(false))).unwrap();

    // Smaller than the footer
    assert_err!(
        open_file(bytes.slice(..4), Some(footer_key_decryption(FOOTER_KEY))),
        CorruptFile
    );
    // Trailing magic cut off
    assert_err!(
        open_file(
            bytes.slice(..bytes.len() - 1),
            Some(footer_key_decryption(FOOTER_KEY))
        ),
        CorruptFile
    );
    // Trailer removed entirely
    assert_err!(
        open_file(
            bytes.slice(..bytes.len() - 8),
            Some(footer_key_decryption(FOOTER_KEY))
        ),
        CorruptFile
    );
}

#[test]
fn test_metadata_length_exceeds_file() {
    let mut bytes = b"PARE".to_vec();
    bytes.extend_from_slice(&1000u32.to_le_bytes());
    bytes.extend_from_slice(b"PARE");
    let message = assert_err!(
        open_file(Bytes::from(bytes), Some(explicit_key_decryption_properties().unwrap())),
        CorruptFile
    );
    assert_eq!(
        message,
        "Invalid Parquet file. Reported metadata length of 1000 + 8 byte footer, but file is only 12 bytes"
    );
}

#[test]
fn test_column_key_metadata_requires_key() {
    assert_err!(
        ColumnEncryptionProperties::builder("double_field")
            .with_key_id("kc1")
            .unwrap()
            .build(),
        EncryptionConfig
    );
    // An explicit column key is still accepted alongside its id
    ColumnEncryptionProperties::builder("double_field")
        .with_key(COLUMN_1_KEY.to_vec())
        .with_key_id("kc1")
        .unwrap()
        .build()
        .unwrap();
}
