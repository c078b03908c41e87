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

//! Tests of the reader lifecycle, footer detection and key retrieval

use std::sync::Arc;

use bytes::Bytes;
use parquet_crypto::encryption::decrypt::FileDecryptionProperties;
use parquet_crypto::encryption::encrypt::{ColumnEncryptionProperties, FileEncryptionProperties};
use parquet_crypto::encryption::retriever::{IntegerKeyIdRetriever, StringKeyIdRetriever};
use parquet_crypto::errors::ParquetError;
use parquet_crypto::file::metadata::{FooterMode, FooterState, FooterTail, ParquetMetaDataReader};
use parquet_crypto::file::properties::WriterProperties;
use parquet_crypto::file::reader::{FileReader, RowGroupReader};
use parquet_crypto::file::FOOTER_SIZE;

use crate::encryption_util::{
    column_encryption_properties, explicit_key_decryption_properties, init_tracing, open_file,
    test_columns, test_key_retriever, verify_test_data, write_test_file,
    write_test_file_with_row_groups, writer_properties, COLUMN_1_KEY, COLUMN_2_KEY, FOOTER_KEY,
    NUM_ROWS,
};

fn footer_tail(bytes: &Bytes) -> FooterTail {
    let mut footer = [0u8; FOOTER_SIZE];
    footer.copy_from_slice(&bytes[bytes.len() - FOOTER_SIZE..]);
    FooterTail::try_new(&footer).unwrap()
}

#[test]
fn test_footer_detection() {
    for plaintext_footer in [false, true] {
        let encryption = column_encryption_properties(plaintext_footer).unwrap();
        let bytes = write_test_file(writer_properties(encryption)).unwrap();

        let tail = footer_tail(&bytes);
        assert_eq!(tail.is_encrypted_footer(), !plaintext_footer);
        let expected_mode = if plaintext_footer {
            FooterMode::Plaintext
        } else {
            FooterMode::Encrypted
        };
        assert_eq!(tail.mode(), expected_mode);
        assert!(tail.metadata_length() + FOOTER_SIZE < bytes.len());
    }

    let bytes = write_test_file(WriterProperties::default()).unwrap();
    assert_eq!(footer_tail(&bytes).mode(), FooterMode::Plaintext);
}

#[test]
fn test_metadata_reader_states() {
    init_tracing();
    let encryption = column_encryption_properties(false).unwrap();
    let bytes = write_test_file(writer_properties(encryption)).unwrap();

    let mut reader = ParquetMetaDataReader::new()
        .with_decryption_properties(Some(explicit_key_decryption_properties().unwrap()));
    assert_eq!(reader.state(), FooterState::Unopened);
    reader.try_parse(&bytes).unwrap();
    assert_eq!(reader.state(), FooterState::MetadataParsed);

    // Only unopened readers can parse
    let err = reader.try_parse(&bytes).unwrap_err();
    assert!(matches!(err, ParquetError::General(_)), "unexpected error: {err}");

    let metadata = reader.finish().unwrap();
    assert_eq!(metadata.num_row_groups(), 2);
    assert!(reader.finish().is_err());
}

#[test]
fn test_metadata_reader_failure_is_final() {
    let bytes = write_test_file(writer_properties(column_encryption_properties(false).unwrap()))
        .unwrap();

    // Encrypted footer without decryption properties
    let mut reader = ParquetMetaDataReader::new();
    let err = reader.try_parse(&bytes).unwrap_err();
    assert!(
        matches!(err, ParquetError::EncryptionConfig(_)),
        "unexpected error: {err}"
    );
    assert_eq!(reader.state(), FooterState::Failed);
    assert!(reader.try_parse(&bytes).is_err());
    assert_eq!(reader.state(), FooterState::Failed);
}

#[test]
fn test_small_footer_read_size() {
    let encryption = column_encryption_properties(false).unwrap();
    let bytes = write_test_file(writer_properties(encryption)).unwrap();

    for footer_read_size in [0, FOOTER_SIZE, FOOTER_SIZE + 1, 100, bytes.len() * 2] {
        let metadata = ParquetMetaDataReader::new()
            .with_footer_read_size(footer_read_size)
            .with_decryption_properties(Some(explicit_key_decryption_properties().unwrap()))
            .parse_and_finish(&bytes)
            .unwrap();
        assert_eq!(metadata.file_metadata().num_rows(), NUM_ROWS as i64);
    }
}

#[test]
fn test_file_reader_lifecycle() {
    init_tracing();
    let encryption = column_encryption_properties(false).unwrap();
    let bytes = write_test_file(writer_properties(encryption)).unwrap();

    let mut reader = open_file(bytes, Some(explicit_key_decryption_properties().unwrap())).unwrap();
    assert_eq!(reader.footer_state(), FooterState::Ready);
    verify_test_data(&reader, NUM_ROWS);

    let err = reader.get_row_group(2).err().unwrap();
    assert!(
        matches!(err, ParquetError::IndexOutOfBound(2, 2)),
        "unexpected error: {err}"
    );
    assert!(reader.metadata().column_chunk(0, 3).unwrap().is_encrypted());

    reader.close();
    assert_eq!(reader.footer_state(), FooterState::Closed);
    let err = reader.get_row_group(0).err().unwrap();
    assert_eq!(
        err.to_string(),
        "Parquet error: Cannot read row group 0 in state Closed"
    );
    // Metadata stays available after closing, but nothing more is decrypted
    assert_eq!(reader.metadata().num_row_groups(), 2);
    assert!(!reader.metadata().column_chunk(0, 0).unwrap().is_encrypted());
    let err = reader.metadata().column_chunk(0, 3).unwrap_err();
    assert_eq!(
        err.to_string(),
        "Parquet error: Decryption keys of the file have been wiped out"
    );
}

#[test]
fn test_closed_reader_does_not_retrieve_keys() {
    let encryption = column_encryption_properties(false).unwrap();
    let bytes = write_test_file(writer_properties(encryption)).unwrap();

    let decryption = FileDecryptionProperties::builder()
        .with_key_retriever(Arc::new(test_key_retriever()))
        .build()
        .unwrap();
    let mut reader = open_file(bytes, Some(decryption)).unwrap();
    reader.close();
    for column in [2, 3] {
        assert!(reader.metadata().column_chunk(1, column).is_err());
    }
}

#[test]
fn test_legacy_writer_column_chunk_padding() {
    init_tracing();
    for (created_by, affected) in [
        ("parquet-mr version 1.2.8", true),
        ("parquet-mr version 1.2.9", false),
        ("parquet-mr version 1.10.0 (build abcd)", false),
    ] {
        let encryption = column_encryption_properties(false).unwrap();
        let properties = WriterProperties::builder()
            .set_created_by(created_by.to_string())
            .set_data_page_row_count_limit(100)
            .with_file_encryption_properties(encryption)
            .build();
        let bytes = write_test_file_with_row_groups(properties, &[NUM_ROWS]).unwrap();

        let reader =
            open_file(bytes, Some(explicit_key_decryption_properties().unwrap())).unwrap();
        let file_metadata = reader.metadata().file_metadata();
        assert_eq!(file_metadata.created_by(), Some(created_by));
        let version = file_metadata.writer_version().unwrap();
        assert_eq!(version.application(), "parquet-mr");
        assert_eq!(version.is_affected_by_parquet_816(), affected);
        verify_test_data(&reader, NUM_ROWS);
    }
}

#[test]
fn test_string_key_id_retriever() {
    let encryption = column_encryption_properties(true).unwrap();
    let bytes = write_test_file(writer_properties(encryption)).unwrap();

    let retriever = StringKeyIdRetriever::new()
        .with_key("kf", FOOTER_KEY.to_vec())
        .with_key("kc1", COLUMN_1_KEY.to_vec());
    // Keys can be registered after the retriever is shared
    let retriever = Arc::new(retriever);
    retriever.put_key("kc2", COLUMN_2_KEY.to_vec());

    let decryption = FileDecryptionProperties::builder()
        .with_key_retriever(retriever)
        .build()
        .unwrap();
    let reader = open_file(bytes, Some(decryption)).unwrap();
    verify_test_data(&reader, NUM_ROWS);
}

#[test]
fn test_integer_key_id_retriever() {
    init_tracing();
    let encryption = FileEncryptionProperties::builder(FOOTER_KEY.to_vec())
        .with_footer_key_metadata(IntegerKeyIdRetriever::key_metadata(1))
        .unwrap()
        .with_column_properties(vec![ColumnEncryptionProperties::builder("double_field")
            .with_key(COLUMN_1_KEY.to_vec())
            .with_key_metadata(IntegerKeyIdRetriever::key_metadata(2))
            .unwrap()
            .build()
            .unwrap()])
        .unwrap()
        .build()
        .unwrap();
    let bytes = write_test_file(writer_properties(encryption)).unwrap();

    let retriever = IntegerKeyIdRetriever::new()
        .with_key(1, FOOTER_KEY.to_vec())
        .with_key(2, COLUMN_1_KEY.to_vec());
    let decryption = FileDecryptionProperties::builder()
        .with_key_retriever(Arc::new(retriever))
        .build()
        .unwrap();
    let reader = open_file(bytes.clone(), Some(decryption)).unwrap();
    verify_test_data(&reader, NUM_ROWS);

    // Unknown key id for the column
    let retriever = IntegerKeyIdRetriever::new().with_key(1, FOOTER_KEY.to_vec());
    let decryption = FileDecryptionProperties::builder()
        .with_key_retriever(Arc::new(retriever))
        .build()
        .unwrap();
    let reader = open_file(bytes, Some(decryption)).unwrap();
    let row_group = reader.get_row_group(0).unwrap();
    assert_eq!(
        row_group.read_column(0).unwrap(),
        test_columns(0, NUM_ROWS / 2)[0]
    );
    let err = row_group.read_column(3).unwrap_err();
    assert!(matches!(err, ParquetError::KeyNotFound(_)), "unexpected error: {err}");
}

#[test]
fn test_unencrypted_file() {
    let bytes = write_test_file(WriterProperties::default()).unwrap();
    assert_eq!(&bytes[..4], b"PAR1");

    // Decryption properties are not needed, and ignored if given
    let reader = open_file(bytes.clone(), None).unwrap();
    assert_eq!(reader.metadata().encryption_algorithm(), None);
    verify_test_data(&reader, NUM_ROWS);

    let reader = open_file(bytes, Some(explicit_key_decryption_properties().unwrap())).unwrap();
    let row_group = reader.get_row_group(0).unwrap();
    for col in 0..row_group.num_columns() {
        assert!(!row_group.column_chunk(col).unwrap().is_encrypted());
    }
    verify_test_data(&reader, NUM_ROWS);
}
