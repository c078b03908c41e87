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

//! AES cipher engines used for Parquet modular encryption.
//!
//! An engine is bound to one algorithm, one key length and one module kind (metadata or
//! data). Keys are passed on every call and cipher contexts only live for the duration of
//! that call, so no keyed state outlives an operation.
//!
//! Every encrypted module is laid out as
//! `[4 byte little-endian length][12 byte nonce][ciphertext][16 byte tag]`,
//! where the length covers everything after itself. Modules encrypted in CTR mode carry
//! no tag.

use std::fmt;

use aes::{Aes128, Aes192, Aes256};
use aes_gcm::aead::consts::U12;
use aes_gcm::aead::generic_array::GenericArray;
use aes_gcm::aead::{AeadInPlace, KeyInit};
use aes_gcm::{Aes128Gcm, Aes256Gcm, AesGcm};
use ctr::cipher::{KeyIvInit, StreamCipher};
use ring::rand::{SecureRandom, SystemRandom};
use zeroize::{Zeroize, ZeroizeOnDrop};

use crate::errors::{ParquetError, Result};

type Aes192Gcm = AesGcm<Aes192, U12>;

pub(crate) const NONCE_LEN: usize = 12;
pub(crate) const TAG_LEN: usize = 16;
pub(crate) const SIZE_LEN: usize = 4;
const CTR_IV_LEN: usize = 16;

/// Byte length of the signature appended to a signed plaintext footer
pub(crate) const FOOTER_SIGNATURE_LEN: usize = NONCE_LEN + TAG_LEN;

/// Encryption algorithms defined by Parquet modular encryption
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[allow(non_camel_case_types)]
pub enum ParquetCipher {
    /// AES-GCM for every module
    #[default]
    AES_GCM_V1,
    /// AES-GCM for metadata and page headers, AES-CTR for page bodies
    AES_GCM_CTR_V1,
}

/// Default algorithm for new files
pub const DEFAULT_ENCRYPTION_ALGORITHM: ParquetCipher = ParquetCipher::AES_GCM_V1;

/// Checks that `len` is a valid AES key length
pub(crate) fn validate_key_length(len: usize) -> Result<()> {
    match len {
        16 | 24 | 32 => Ok(()),
        _ => Err(config_err!(
            "Wrong key length: {}. Keys must be 16, 24 or 32 bytes",
            len
        )),
    }
}

/// Key bytes that are overwritten with zeros when dropped
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub(crate) struct SecretKey(Vec<u8>);

impl SecretKey {
    /// Wraps `key` without checking its length
    pub(crate) fn new(key: Vec<u8>) -> Self {
        SecretKey(key)
    }

    /// Wraps `key`, failing if it is not a valid AES key
    pub(crate) fn try_new(key: Vec<u8>) -> Result<Self> {
        SecretKey(key).validated()
    }

    /// Fails if this is not a valid AES key
    pub(crate) fn validated(self) -> Result<Self> {
        validate_key_length(self.len())?;
        Ok(self)
    }

    pub(crate) fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    pub(crate) fn len(&self) -> usize {
        self.0.len()
    }
}

impl fmt::Debug for SecretKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SecretKey({} bytes)", self.0.len())
    }
}

/// Identifies one engine in the per-file pools
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub(crate) struct EngineKey {
    pub(crate) algorithm: ParquetCipher,
    pub(crate) key_length: usize,
    pub(crate) metadata: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mode {
    Gcm,
    Ctr,
}

impl Mode {
    fn new(algorithm: ParquetCipher, metadata: bool) -> Self {
        match algorithm {
            ParquetCipher::AES_GCM_CTR_V1 if !metadata => Mode::Ctr,
            _ => Mode::Gcm,
        }
    }

    fn size_delta(self) -> usize {
        match self {
            Mode::Gcm => NONCE_LEN + TAG_LEN,
            Mode::Ctr => NONCE_LEN,
        }
    }
}

fn check_key(expected: usize, key: &[u8]) -> Result<()> {
    if key.len() != expected {
        return Err(config_err!(
            "Wrong key length {}, engine expects {} bytes",
            key.len(),
            expected
        ));
    }
    Ok(())
}

fn gcm_seal<C: KeyInit + AeadInPlace>(
    key: &[u8],
    nonce: &[u8],
    aad: &[u8],
    buffer: &mut [u8],
) -> Result<Vec<u8>> {
    let cipher = C::new_from_slice(key).map_err(|_| config_err!("Invalid AES-GCM key"))?;
    let tag = cipher
        .encrypt_in_place_detached(GenericArray::from_slice(nonce), aad, buffer)
        .map_err(|_| general_err!("AES-GCM encryption failed"))?;
    Ok(tag.to_vec())
}

fn gcm_open<C: KeyInit + AeadInPlace>(
    key: &[u8],
    nonce: &[u8],
    aad: &[u8],
    buffer: &mut [u8],
    tag: &[u8],
) -> Result<()> {
    let cipher = C::new_from_slice(key).map_err(|_| config_err!("Invalid AES-GCM key"))?;
    cipher
        .decrypt_in_place_detached(
            GenericArray::from_slice(nonce),
            aad,
            buffer,
            GenericArray::from_slice(tag),
        )
        .map_err(|_| auth_err!("Failed to decrypt module: tag mismatch"))
}

fn ctr_apply<C: KeyIvInit + StreamCipher>(key: &[u8], iv: &[u8], buffer: &mut [u8]) -> Result<()> {
    let mut cipher =
        C::new_from_slices(key, iv).map_err(|_| config_err!("Invalid AES-CTR key"))?;
    cipher
        .try_apply_keystream(buffer)
        .map_err(|_| general_err!("AES-CTR keystream exhausted"))
}

/// Seals `buffer` in place under AES-GCM, returning the tag
fn seal(key: &[u8], nonce: &[u8], aad: &[u8], buffer: &mut [u8]) -> Result<Vec<u8>> {
    match key.len() {
        16 => gcm_seal::<Aes128Gcm>(key, nonce, aad, buffer),
        24 => gcm_seal::<Aes192Gcm>(key, nonce, aad, buffer),
        32 => gcm_seal::<Aes256Gcm>(key, nonce, aad, buffer),
        n => Err(config_err!("Wrong key length: {}", n)),
    }
}

fn open(key: &[u8], nonce: &[u8], aad: &[u8], buffer: &mut [u8], tag: &[u8]) -> Result<()> {
    match key.len() {
        16 => gcm_open::<Aes128Gcm>(key, nonce, aad, buffer, tag),
        24 => gcm_open::<Aes192Gcm>(key, nonce, aad, buffer, tag),
        32 => gcm_open::<Aes256Gcm>(key, nonce, aad, buffer, tag),
        n => Err(config_err!("Wrong key length: {}", n)),
    }
}

/// Applies the AES-CTR keystream. The IV is the nonce followed by a 32 bit big-endian
/// block counter that starts at 1.
fn ctr_transform(key: &[u8], nonce: &[u8], buffer: &mut [u8]) -> Result<()> {
    let mut iv = [0u8; CTR_IV_LEN];
    iv[..NONCE_LEN].copy_from_slice(nonce);
    iv[CTR_IV_LEN - 1] = 1;
    match key.len() {
        16 => ctr_apply::<ctr::Ctr32BE<Aes128>>(key, &iv, buffer),
        24 => ctr_apply::<ctr::Ctr32BE<Aes192>>(key, &iv, buffer),
        32 => ctr_apply::<ctr::Ctr32BE<Aes256>>(key, &iv, buffer),
        n => Err(config_err!("Wrong key length: {}", n)),
    }
}

/// Encrypting engine for one algorithm, key length and module kind
pub struct AesEncryptor {
    mode: Mode,
    key_length: usize,
    rng: SystemRandom,
}

impl fmt::Debug for AesEncryptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AesEncryptor")
            .field("mode", &self.mode)
            .field("key_length", &self.key_length)
            .finish()
    }
}

impl AesEncryptor {
    /// Creates an engine. Metadata engines always use GCM, data engines use CTR
    /// when `algorithm` is [`ParquetCipher::AES_GCM_CTR_V1`].
    pub fn new(algorithm: ParquetCipher, key_length: usize, metadata: bool) -> Result<Self> {
        validate_key_length(key_length)?;
        Ok(Self {
            mode: Mode::new(algorithm, metadata),
            key_length,
            rng: SystemRandom::new(),
        })
    }

    /// Bytes added to the plaintext by nonce and tag, not counting the length prefix
    pub fn ciphertext_size_delta(&self) -> usize {
        self.mode.size_delta()
    }

    /// Encrypts `plaintext` under a fresh random nonce
    pub fn encrypt(&self, plaintext: &[u8], key: &[u8], aad: &[u8]) -> Result<Vec<u8>> {
        let mut nonce = [0u8; NONCE_LEN];
        self.rng.fill(&mut nonce)?;
        self.encrypt_with_nonce(plaintext, key, aad, &nonce)
    }

    /// Encrypts a footer with a caller supplied nonce, used to verify plaintext footer
    /// signatures. Plaintext footers are always signed with GCM.
    pub fn signed_footer_encrypt(
        &self,
        footer: &[u8],
        key: &[u8],
        aad: &[u8],
        nonce: &[u8],
    ) -> Result<Vec<u8>> {
        if self.mode != Mode::Gcm {
            return Err(general_err!("Must use AES-GCM cipher for footer signing"));
        }
        if nonce.len() != NONCE_LEN {
            return Err(general_err!("Wrong nonce length {}", nonce.len()));
        }
        self.encrypt_with_nonce(footer, key, aad, nonce)
    }

    fn encrypt_with_nonce(
        &self,
        plaintext: &[u8],
        key: &[u8],
        aad: &[u8],
        nonce: &[u8],
    ) -> Result<Vec<u8>> {
        check_key(self.key_length, key)?;
        let written_len = plaintext.len() + self.ciphertext_size_delta();
        let size = u32::try_from(written_len)
            .map_err(|_| general_err!("Module of {} bytes is too large to encrypt", written_len))?;

        let mut out = Vec::with_capacity(SIZE_LEN + written_len);
        out.extend_from_slice(&size.to_le_bytes());
        out.extend_from_slice(nonce);
        out.extend_from_slice(plaintext);

        let body = &mut out[SIZE_LEN + NONCE_LEN..];
        match self.mode {
            Mode::Gcm => {
                let tag = seal(key, nonce, aad, body)?;
                out.extend_from_slice(&tag);
            }
            Mode::Ctr => ctr_transform(key, nonce, body)?,
        }
        Ok(out)
    }
}

/// Decrypting engine for one algorithm, key length and module kind
#[derive(Debug)]
pub struct AesDecryptor {
    mode: Mode,
    key_length: usize,
}

impl AesDecryptor {
    /// Creates an engine, see [`AesEncryptor::new`]
    pub fn new(algorithm: ParquetCipher, key_length: usize, metadata: bool) -> Result<Self> {
        validate_key_length(key_length)?;
        Ok(Self {
            mode: Mode::new(algorithm, metadata),
            key_length,
        })
    }

    /// Bytes added to the plaintext by nonce and tag, not counting the length prefix
    pub fn ciphertext_size_delta(&self) -> usize {
        self.mode.size_delta()
    }

    /// Decrypts a module including its length prefix.
    ///
    /// Nothing is returned unless the whole module authenticates.
    pub fn decrypt(&self, ciphertext: &[u8], key: &[u8], aad: &[u8]) -> Result<Vec<u8>> {
        check_key(self.key_length, key)?;
        let min_len = SIZE_LEN + self.ciphertext_size_delta();
        if ciphertext.len() < min_len {
            return Err(auth_err!(
                "Ciphertext of {} bytes is shorter than the minimum of {}",
                ciphertext.len(),
                min_len
            ));
        }
        let mut size = [0u8; SIZE_LEN];
        size.copy_from_slice(&ciphertext[..SIZE_LEN]);
        let written_len = u32::from_le_bytes(size) as usize;
        if written_len != ciphertext.len() - SIZE_LEN {
            return Err(auth_err!(
                "Wrong ciphertext length {}, expected {}",
                written_len,
                ciphertext.len() - SIZE_LEN
            ));
        }

        let nonce = &ciphertext[SIZE_LEN..SIZE_LEN + NONCE_LEN];
        match self.mode {
            Mode::Gcm => {
                let tag_start = ciphertext.len() - TAG_LEN;
                let mut plaintext = ciphertext[SIZE_LEN + NONCE_LEN..tag_start].to_vec();
                if let Err(e) = open(key, nonce, aad, &mut plaintext, &ciphertext[tag_start..]) {
                    plaintext.zeroize();
                    return Err(e);
                }
                Ok(plaintext)
            }
            Mode::Ctr => {
                let mut plaintext = ciphertext[SIZE_LEN + NONCE_LEN..].to_vec();
                ctr_transform(key, nonce, &mut plaintext)?;
                Ok(plaintext)
            }
        }
    }
}
