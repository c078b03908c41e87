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

//! Round trip tests of encrypted files written and read with this crate

use std::sync::Arc;

use bytes::Bytes;
use parquet_crypto::basic::Type;
use parquet_crypto::column::values::ColumnValues;
use parquet_crypto::encryption::decrypt::{ColumnDecryptionProperties, FileDecryptionProperties};
use parquet_crypto::encryption::encrypt::{ColumnEncryptionProperties, FileEncryptionProperties};
use parquet_crypto::encryption::ParquetCipher;
use parquet_crypto::errors::ParquetError;
use parquet_crypto::file::properties::{ReaderProperties, WriterProperties};
use parquet_crypto::file::reader::{FileReader, RowGroupReader};
use parquet_crypto::file::serialized_reader::SerializedFileReader;
use parquet_crypto::file::writer::SerializedFileWriter;
use parquet_crypto::format::ColumnCryptoMetaData;
use parquet_crypto::schema::types::{ColumnDescriptor, SchemaDescriptor};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::encryption_util::{
    column_encryption_properties, explicit_key_decryption_properties, init_tracing, open_file,
    read_all_columns, test_columns, test_key_retriever, test_schema, verify_test_data,
    write_test_file, write_test_file_with_row_groups, writer_properties, PanickingKeyRetriever,
    COLUMN_1_KEY, COLUMN_2_KEY, FOOTER_KEY, NUM_ROWS,
};

const ALGORITHMS: [ParquetCipher; 2] = [ParquetCipher::AES_GCM_V1, ParquetCipher::AES_GCM_CTR_V1];

fn footer_key_decryption_properties() -> Arc<FileDecryptionProperties> {
    FileDecryptionProperties::builder()
        .with_footer_key(FOOTER_KEY.to_vec())
        .build()
        .unwrap()
}

fn assert_magic(bytes: &Bytes, magic: &[u8; 4]) {
    assert_eq!(&bytes[..4], magic);
    assert_eq!(&bytes[bytes.len() - 4..], magic);
}

#[test]
fn test_uniform_encryption_roundtrip() {
    init_tracing();
    for algorithm in ALGORITHMS {
        for plaintext_footer in [false, true] {
            let encryption = FileEncryptionProperties::builder(FOOTER_KEY.to_vec())
                .with_algorithm(algorithm)
                .with_plaintext_footer(plaintext_footer)
                .build()
                .unwrap();
            let bytes = write_test_file(writer_properties(encryption)).unwrap();
            assert_magic(&bytes, if plaintext_footer { b"PAR1" } else { b"PARE" });

            let reader = open_file(bytes, Some(footer_key_decryption_properties())).unwrap();
            assert_eq!(reader.metadata().encryption_algorithm(), Some(algorithm));
            assert_eq!(reader.num_row_groups(), 2);
            verify_test_data(&reader, NUM_ROWS);
        }
    }
}

#[test]
fn test_column_encryption_roundtrip() {
    init_tracing();
    for algorithm in ALGORITHMS {
        for plaintext_footer in [false, true] {
            let encryption = FileEncryptionProperties::builder(FOOTER_KEY.to_vec())
                .with_algorithm(algorithm)
                .with_plaintext_footer(plaintext_footer)
                .with_column_properties(vec![
                    ColumnEncryptionProperties::builder("double_field")
                        .with_key(COLUMN_1_KEY.to_vec())
                        .build()
                        .unwrap(),
                    ColumnEncryptionProperties::builder("float_field")
                        .with_key(COLUMN_2_KEY.to_vec())
                        .build()
                        .unwrap(),
                ])
                .unwrap()
                .build()
                .unwrap();
            let bytes = write_test_file(writer_properties(encryption)).unwrap();

            let reader = open_file(bytes, Some(explicit_key_decryption_properties().unwrap()))
                .unwrap();
            verify_test_data(&reader, NUM_ROWS);
        }
    }
}

#[test]
fn test_column_encryption_with_key_retriever() {
    init_tracing();
    for plaintext_footer in [false, true] {
        let encryption = column_encryption_properties(plaintext_footer).unwrap();
        let bytes = write_test_file(writer_properties(encryption)).unwrap();

        let decryption = FileDecryptionProperties::builder()
            .with_key_retriever(Arc::new(test_key_retriever()))
            .build()
            .unwrap();
        let reader = open_file(bytes, Some(decryption)).unwrap();
        verify_test_data(&reader, NUM_ROWS);
    }
}

#[test]
fn test_explicit_keys_take_precedence_over_retriever() {
    init_tracing();
    for plaintext_footer in [false, true] {
        let encryption = column_encryption_properties(plaintext_footer).unwrap();
        let bytes = write_test_file(writer_properties(encryption)).unwrap();

        let decryption = FileDecryptionProperties::builder()
            .with_footer_key(FOOTER_KEY.to_vec())
            .with_column_properties(vec![
                ColumnDecryptionProperties::builder("double_field")
                    .with_key(COLUMN_1_KEY.to_vec())
                    .build()
                    .unwrap(),
                ColumnDecryptionProperties::builder("float_field")
                    .with_key(COLUMN_2_KEY.to_vec())
                    .build()
                    .unwrap(),
            ])
            .unwrap()
            .with_key_retriever(Arc::new(PanickingKeyRetriever))
            .build()
            .unwrap();
        let reader = open_file(bytes, Some(decryption)).unwrap();
        verify_test_data(&reader, NUM_ROWS);
    }
}

#[test]
fn test_retriever_supplies_missing_column_key() {
    let encryption = column_encryption_properties(false).unwrap();
    let bytes = write_test_file(writer_properties(encryption)).unwrap();

    // Footer key explicit, column keys from the retriever
    let decryption = FileDecryptionProperties::builder()
        .with_footer_key(FOOTER_KEY.to_vec())
        .with_key_retriever(Arc::new(test_key_retriever()))
        .build()
        .unwrap();
    let reader = open_file(bytes, Some(decryption)).unwrap();
    verify_test_data(&reader, NUM_ROWS);
}

#[test]
fn test_partial_keys_read_accessible_columns() {
    init_tracing();
    for plaintext_footer in [false, true] {
        let encryption = column_encryption_properties(plaintext_footer).unwrap();
        let bytes = write_test_file(writer_properties(encryption)).unwrap();

        // No key for double_field
        let decryption = FileDecryptionProperties::builder()
            .with_footer_key(FOOTER_KEY.to_vec())
            .with_column_properties(vec![
                ColumnDecryptionProperties::builder("float_field")
                    .with_key(COLUMN_2_KEY.to_vec())
                    .build()
                    .unwrap(),
            ])
            .unwrap()
            .build()
            .unwrap();
        let reader = open_file(bytes, Some(decryption)).unwrap();

        let expected = test_columns(0, NUM_ROWS / 2);
        let row_group = reader.get_row_group(0).unwrap();
        for col in 0..3 {
            assert_eq!(row_group.read_column(col).unwrap(), expected[col]);
        }

        let err = row_group.read_column(3).unwrap_err();
        assert!(
            matches!(err, ParquetError::KeyNotFound(_)),
            "unexpected error: {err}"
        );
        let err = reader.metadata().column_chunk(0, 3).unwrap_err();
        assert!(
            matches!(err, ParquetError::KeyNotFound(_)),
            "unexpected error: {err}"
        );
    }
}

#[test]
fn test_plaintext_footer_readable_without_keys() {
    init_tracing();
    let encryption = column_encryption_properties(true).unwrap();
    let bytes = write_test_file(writer_properties(encryption)).unwrap();

    let reader = open_file(bytes, None).unwrap();
    assert_eq!(reader.metadata().encryption_algorithm(), None);
    assert_eq!(reader.metadata().file_metadata().num_rows(), NUM_ROWS as i64);

    let expected = test_columns(0, NUM_ROWS / 2);
    let row_group = reader.get_row_group(0).unwrap();
    assert_eq!(row_group.read_column(0).unwrap(), expected[0]);
    assert_eq!(row_group.read_column(1).unwrap(), expected[1]);

    // Column metadata of encrypted columns is readable, their pages are not
    let float_column = row_group.column_chunk(2).unwrap();
    assert!(float_column.is_encrypted());
    assert_eq!(float_column.num_values(), (NUM_ROWS / 2) as i64);
    let err = row_group.read_column(2).unwrap_err();
    assert!(
        matches!(err, ParquetError::EncryptionConfig(_)),
        "unexpected error: {err}"
    );
}

/// Encryption with the AAD prefix `tester`, either uniform or with `double_field` and
/// `float_field` encrypted with their own keys
fn aad_prefix_encryption_properties(
    algorithm: ParquetCipher,
    plaintext_footer: bool,
    column_keys: bool,
    store_aad_prefix: bool,
) -> Arc<FileEncryptionProperties> {
    let mut builder = FileEncryptionProperties::builder(FOOTER_KEY.to_vec())
        .with_algorithm(algorithm)
        .with_plaintext_footer(plaintext_footer)
        .with_aad_prefix(b"tester".to_vec());
    if !store_aad_prefix {
        builder = builder.disable_aad_prefix_storage().unwrap();
    }
    if column_keys {
        builder = builder
            .with_column_properties(vec![
                ColumnEncryptionProperties::builder("double_field")
                    .with_key(COLUMN_1_KEY.to_vec())
                    .build()
                    .unwrap(),
                ColumnEncryptionProperties::builder("float_field")
                    .with_key(COLUMN_2_KEY.to_vec())
                    .build()
                    .unwrap(),
            ])
            .unwrap();
    }
    builder.build().unwrap()
}

fn aad_prefix_decryption_properties(aad_prefix: &[u8]) -> Arc<FileDecryptionProperties> {
    FileDecryptionProperties::builder()
        .with_footer_key(FOOTER_KEY.to_vec())
        .with_column_properties(vec![
            ColumnDecryptionProperties::builder("double_field")
                .with_key(COLUMN_1_KEY.to_vec())
                .build()
                .unwrap(),
            ColumnDecryptionProperties::builder("float_field")
                .with_key(COLUMN_2_KEY.to_vec())
                .build()
                .unwrap(),
        ])
        .unwrap()
        .with_aad_prefix(aad_prefix.to_vec())
        .build()
        .unwrap()
}

#[test]
fn test_aad_prefix_stored_in_file() {
    init_tracing();
    for algorithm in ALGORITHMS {
        for plaintext_footer in [false, true] {
            for column_keys in [false, true] {
                let encryption =
                    aad_prefix_encryption_properties(algorithm, plaintext_footer, column_keys, true);
                let bytes = write_test_file(writer_properties(encryption)).unwrap();

                // Stored prefix is used when none is supplied
                let reader =
                    open_file(bytes.clone(), Some(aad_prefix_decryption_properties(b"")))
                        .unwrap();
                assert_eq!(reader.metadata().encryption_algorithm(), Some(algorithm));
                verify_test_data(&reader, NUM_ROWS);

                // A matching supplied prefix is accepted
                let reader =
                    open_file(bytes.clone(), Some(aad_prefix_decryption_properties(b"tester")))
                        .unwrap();
                verify_test_data(&reader, NUM_ROWS);

                let err = open_file(bytes, Some(aad_prefix_decryption_properties(b"other")))
                    .err()
                    .unwrap();
                assert!(
                    matches!(err, ParquetError::AadPrefixMismatch(_)),
                    "unexpected error: {err}"
                );
            }
        }
    }
}

#[test]
fn test_aad_prefix_supplied_by_reader() {
    init_tracing();
    for algorithm in ALGORITHMS {
        for plaintext_footer in [false, true] {
            for column_keys in [false, true] {
                let encryption = aad_prefix_encryption_properties(
                    algorithm,
                    plaintext_footer,
                    column_keys,
                    false,
                );
                let bytes = write_test_file(writer_properties(encryption)).unwrap();

                let reader =
                    open_file(bytes.clone(), Some(aad_prefix_decryption_properties(b"tester")))
                        .unwrap();
                assert_eq!(reader.metadata().encryption_algorithm(), Some(algorithm));
                verify_test_data(&reader, NUM_ROWS);

                let err = open_file(bytes, Some(aad_prefix_decryption_properties(b"")))
                    .err()
                    .unwrap();
                assert!(
                    matches!(err, ParquetError::MissingAadPrefix(_)),
                    "unexpected error: {err}"
                );
            }
        }
    }
}

#[test]
fn test_aes_256_keys() {
    init_tracing();
    let mut rng = StdRng::seed_from_u64(42);
    let mut footer_key = [0u8; 32];
    let mut column_key = [0u8; 24];
    rng.fill(&mut footer_key[..]);
    rng.fill(&mut column_key[..]);

    let encryption = FileEncryptionProperties::builder(footer_key.to_vec())
        .with_algorithm(ParquetCipher::AES_GCM_CTR_V1)
        .with_column_properties(vec![ColumnEncryptionProperties::builder("int32_field")
            .with_key(column_key.to_vec())
            .build()
            .unwrap()])
        .unwrap()
        .build()
        .unwrap();
    let bytes = write_test_file(writer_properties(encryption)).unwrap();

    let decryption = FileDecryptionProperties::builder()
        .with_footer_key(footer_key.to_vec())
        .with_column_properties(vec![
            ColumnDecryptionProperties::builder("int32_field")
                .with_key(column_key.to_vec())
                .build()
                .unwrap(),
        ])
        .unwrap()
        .build()
        .unwrap();
    let reader = open_file(bytes, Some(decryption)).unwrap();
    verify_test_data(&reader, NUM_ROWS);
}

#[test]
fn test_byte_array_column_with_dictionary() {
    init_tracing();
    let mut rng = StdRng::seed_from_u64(7);
    let schema = Arc::new(
        SchemaDescriptor::new(
            "schema",
            vec![
                ColumnDescriptor::new("id", Type::INT64),
                ColumnDescriptor::new("payload", Type::BYTE_ARRAY),
            ],
        )
        .unwrap(),
    );
    // Few distinct values so that the dictionary is reused across pages
    let distinct: Vec<Vec<u8>> = (0..10)
        .map(|_| (0..rng.gen_range(0..32)).map(|_| rng.gen()).collect())
        .collect();
    let payload: Vec<Vec<u8>> = (0..1000)
        .map(|_| distinct[rng.gen_range(0..distinct.len())].clone())
        .collect();
    let ids: Vec<i64> = (0..1000).collect();

    for algorithm in ALGORITHMS {
        let encryption = FileEncryptionProperties::builder(FOOTER_KEY.to_vec())
            .with_algorithm(algorithm)
            .with_column_properties(vec![ColumnEncryptionProperties::builder("payload")
                .with_key(COLUMN_1_KEY.to_vec())
                .build()
                .unwrap()])
            .unwrap()
            .build()
            .unwrap();
        let mut writer =
            SerializedFileWriter::new(vec![], schema.clone(), Arc::new(writer_properties(encryption)))
                .unwrap();
        writer
            .write_row_group(vec![
                ColumnValues::Int64(ids.clone()),
                ColumnValues::ByteArray(payload.clone()),
            ])
            .unwrap();
        let bytes = Bytes::from(writer.into_inner().unwrap());

        let decryption = FileDecryptionProperties::builder()
            .with_footer_key(FOOTER_KEY.to_vec())
            .with_column_properties(vec![
                ColumnDecryptionProperties::builder("payload")
                    .with_key(COLUMN_1_KEY.to_vec())
                    .build()
                    .unwrap(),
            ])
            .unwrap()
            .build()
            .unwrap();
        let reader = open_file(bytes, Some(decryption)).unwrap();
        let row_group = reader.get_row_group(0).unwrap();
        let payload_column = row_group.column_chunk(1).unwrap();
        assert!(payload_column.dictionary_page_offset().is_some());
        assert_eq!(row_group.read_column(0).unwrap(), ColumnValues::Int64(ids.clone()));
        assert_eq!(
            row_group.read_column(1).unwrap(),
            ColumnValues::ByteArray(payload.clone())
        );
    }
}

#[test]
fn test_dictionary_disabled() {
    let encryption = column_encryption_properties(false).unwrap();
    let properties = WriterProperties::builder()
        .set_dictionary_enabled(false)
        .set_data_page_row_count_limit(64)
        .with_file_encryption_properties(encryption)
        .build();
    let bytes = write_test_file_with_row_groups(properties, &[NUM_ROWS]).unwrap();

    let reader = open_file(bytes, Some(explicit_key_decryption_properties().unwrap())).unwrap();
    let row_group = reader.get_row_group(0).unwrap();
    for col in 0..row_group.num_columns() {
        assert_eq!(row_group.column_chunk(col).unwrap().dictionary_page_offset(), None);
    }
    verify_test_data(&reader, NUM_ROWS);
}

#[test]
fn test_column_metadata_placement() {
    for plaintext_footer in [false, true] {
        let encryption = FileEncryptionProperties::builder(FOOTER_KEY.to_vec())
            .with_plaintext_footer(plaintext_footer)
            .with_column_properties(vec![
                ColumnEncryptionProperties::builder("float_field")
                    .build()
                    .unwrap(),
                ColumnEncryptionProperties::builder("double_field")
                    .with_key(COLUMN_1_KEY.to_vec())
                    .build()
                    .unwrap(),
            ])
            .unwrap()
            .build()
            .unwrap();
        let mut writer =
            SerializedFileWriter::new(vec![], test_schema(), Arc::new(writer_properties(encryption)))
                .unwrap();
        writer.write_row_group(test_columns(0, 10)).unwrap();
        let metadata = writer.close().unwrap();

        let columns = &metadata.row_groups[0].columns;
        // Unencrypted
        for column in &columns[..2] {
            assert!(column.meta_data.is_some());
            assert!(column.crypto_metadata.is_none());
            assert!(column.encrypted_column_metadata.is_none());
        }
        // Encrypted with the footer key
        assert_eq!(
            columns[2].crypto_metadata,
            Some(ColumnCryptoMetaData::ENCRYPTION_WITH_FOOTER_KEY)
        );
        assert!(columns[2].meta_data.is_some());
        assert_eq!(columns[2].encrypted_column_metadata.is_some(), plaintext_footer);
        // Encrypted with a column key
        assert!(matches!(
            columns[3].crypto_metadata,
            Some(ColumnCryptoMetaData::ENCRYPTION_WITH_COLUMN_KEY(_))
        ));
        assert!(columns[3].encrypted_column_metadata.is_some());
        assert_eq!(columns[3].meta_data.is_some(), plaintext_footer);
    }
}

#[test]
fn test_offset_index_roundtrip() {
    init_tracing();
    let encryption = column_encryption_properties(false).unwrap();
    let bytes = write_test_file(writer_properties(encryption)).unwrap();
    let reader = open_file(bytes, Some(explicit_key_decryption_properties().unwrap())).unwrap();

    for i in 0..reader.num_row_groups() {
        let row_group = reader.get_row_group(i).unwrap();
        for col in 0..row_group.num_columns() {
            let column = row_group.column_chunk(col).unwrap();
            let offset_index = row_group.read_offset_index(col).unwrap().unwrap();
            // 250 rows in pages of 100
            assert_eq!(offset_index.page_locations.len(), 3);
            let first_rows: Vec<i64> = offset_index
                .page_locations
                .iter()
                .map(|p| p.first_row_index)
                .collect();
            assert_eq!(first_rows, vec![0, 100, 200]);
            assert_eq!(offset_index.page_locations[0].offset, column.data_page_offset());
        }
    }
}

#[test]
fn test_many_row_groups() {
    let encryption = column_encryption_properties(false).unwrap();
    let sizes = [1, 99, 100, 101, 199];
    let bytes = write_test_file_with_row_groups(writer_properties(encryption), &sizes).unwrap();

    let reader = open_file(bytes, Some(explicit_key_decryption_properties().unwrap())).unwrap();
    assert_eq!(reader.num_row_groups(), sizes.len());
    for (i, rg) in reader.metadata().row_groups().iter().enumerate() {
        assert_eq!(rg.ordinal(), i as i16);
    }
    verify_test_data(&reader, sizes.iter().sum());
    assert_eq!(read_all_columns(&reader).unwrap().len(), sizes.len());
}

#[test]
fn test_file_roundtrip() {
    init_tracing();
    let encryption = column_encryption_properties(false).unwrap();
    let file = tempfile::tempfile().unwrap();
    let mut writer = SerializedFileWriter::new(
        file,
        test_schema(),
        Arc::new(writer_properties(encryption)),
    )
    .unwrap();
    writer.write_row_group(test_columns(0, NUM_ROWS)).unwrap();
    let file = writer.into_inner().unwrap();

    let options = ReaderProperties::builder()
        .set_footer_read_size(16)
        .with_file_decryption_properties(explicit_key_decryption_properties().unwrap())
        .build();
    let reader = SerializedFileReader::new_with_options(file, options).unwrap();
    verify_test_data(&reader, NUM_ROWS);
}

#[test]
fn test_non_uniform_encryption_with_key_ids() {
    init_tracing();
    let encryption = column_encryption_properties(false).unwrap();
    let bytes =
        write_test_file_with_row_groups(writer_properties(encryption), &[NUM_ROWS]).unwrap();

    let decryption = FileDecryptionProperties::builder()
        .with_key_retriever(Arc::new(test_key_retriever()))
        .build()
        .unwrap();
    let reader = open_file(bytes, Some(decryption)).unwrap();

    assert_eq!(reader.num_row_groups(), 1);
    let row_group = reader.get_row_group(0).unwrap();
    assert_eq!(row_group.num_columns(), 4);
    assert!(!row_group.column_chunk(0).unwrap().is_encrypted());
    assert!(!row_group.column_chunk(1).unwrap().is_encrypted());
    assert!(row_group.column_chunk(2).unwrap().is_encrypted());
    assert!(row_group.column_chunk(3).unwrap().is_encrypted());
    verify_test_data(&reader, NUM_ROWS);
}
