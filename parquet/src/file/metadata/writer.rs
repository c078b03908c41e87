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

use std::io::Write;

use tracing::debug;

use crate::codec;
use crate::encryption::encrypt::{encrypt_object, write_signed_plaintext_object, FileEncryptor};
use crate::errors::Result;
use crate::file::writer::TrackedWrite;
use crate::file::{PARQUET_MAGIC, PARQUET_MAGIC_ENCR_FOOTER};
use crate::format;

/// Writes the footer of a Parquet file: the file metadata, its length and the trailing
/// magic.
///
/// # Output Format
///
/// Depending on the encryption of the file the metadata is written as
///
/// * plaintext: the serialized [`format::FileMetaData`], followed by `PAR1`
/// * signed plaintext: the serialized metadata followed by the 12 byte nonce and
///   16 byte tag of its encryption with the footer key, followed by `PAR1`
/// * encrypted: the serialized [`format::FileCryptoMetaData`] followed by the encrypted
///   metadata, followed by `PARE`
///
/// In every case the magic is preceded by the 4 byte little-endian length of the
/// metadata section.
pub(crate) struct ParquetMetaDataWriter<'a, W: Write> {
    buf: &'a mut TrackedWrite<W>,
    file_metadata: &'a format::FileMetaData,
    file_encryptor: Option<&'a FileEncryptor>,
}

impl<'a, W: Write> ParquetMetaDataWriter<'a, W> {
    pub(crate) fn new(
        buf: &'a mut TrackedWrite<W>,
        file_metadata: &'a format::FileMetaData,
        file_encryptor: Option<&'a FileEncryptor>,
    ) -> Self {
        Self {
            buf,
            file_metadata,
            file_encryptor,
        }
    }

    /// Writes the footer and returns the length of the metadata section
    pub(crate) fn finish(self) -> Result<usize> {
        let start_pos = self.buf.bytes_written();
        let magic = match self.file_encryptor {
            Some(file_encryptor) if file_encryptor.properties().encrypted_footer() => {
                let crypto_metadata = codec::serialize(&file_encryptor.file_crypto_metadata())?;
                self.buf.write_all(&crypto_metadata)?;
                let footer_encryptor = file_encryptor.get_footer_encryptor()?;
                let encrypted = encrypt_object(self.file_metadata, &footer_encryptor)?;
                self.buf.write_all(&encrypted)?;
                PARQUET_MAGIC_ENCR_FOOTER
            }
            Some(file_encryptor) => {
                let signing_encryptor = file_encryptor.get_footer_signing_encryptor()?;
                write_signed_plaintext_object(
                    self.file_metadata,
                    &signing_encryptor,
                    &mut *self.buf,
                )?;
                PARQUET_MAGIC
            }
            None => {
                self.buf.write_all(&codec::serialize(self.file_metadata)?)?;
                PARQUET_MAGIC
            }
        };

        let metadata_len = self.buf.bytes_written() - start_pos;
        self.buf.write_all(&u32::try_from(metadata_len)?.to_le_bytes())?;
        self.buf.write_all(&magic)?;
        debug!(metadata_len, "wrote footer");
        Ok(metadata_len)
    }
}

/// Returns the magic written at the start of a file
pub(crate) fn start_magic(file_encryptor: Option<&FileEncryptor>) -> [u8; 4] {
    match file_encryptor {
        Some(e) if e.properties().encrypted_footer() => PARQUET_MAGIC_ENCR_FOOTER,
        _ => PARQUET_MAGIC,
    }
}
