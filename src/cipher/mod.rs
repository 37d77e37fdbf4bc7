//! CBC block cipher pipeline driven by the header's 32-bit seed.
//!
//! Three pure, portable 128-bit block ciphers are supported, selected by the
//! low two bits of the seed (see [`crate::rng::split_seed`]): AES-256, ARIA-256,
//! and Camellia-256, all run in CBC mode with PKCS#7 padding via the RustCrypto
//! `cipher`/`cbc` traits. "Pure" here means software-only block transforms with
//! no hardware-acceleration dependency, which is what the seed-derived,
//! no-external-key-material design calls for: the key and IV never leave the
//! container, so the implementation only needs to be portable, not hardened
//! against side channels.
//!
//! # State machine
//!
//! A [`Cipher`] moves through an explicit state machine mirroring the
//! lifecycle the format imposes: a cipher is selected before it has key
//! material, gets a key, then an IV, then may stream any number of blocks,
//! then is finalized exactly once. Calling an operation out of order is a
//! programming error reported as [`CipherError::InvalidState`] rather than a
//! panic, since both the encoder and decoder drive this state machine from
//! data read off the wire.

use aes::Aes256;
use aria::Aria256;
use camellia::Camellia256;
use cbc::cipher::block_padding::Pkcs7;
use cbc::cipher::{BlockDecryptMut, BlockEncryptMut, KeyIvInit};
use thiserror::Error;

use crate::rng::{split_seed, XorShift128};

#[derive(Error, Debug)]
pub enum CipherError {
    #[error("cipher operation attempted in state {0:?}, which does not allow it")]
    InvalidState(CipherState),
    #[error("seed selects reserved cipher choice 3, which has no assigned algorithm")]
    ReservedCipherChoice,
    #[error("padding is invalid or the ciphertext length is not a multiple of the block size")]
    PaddingOrLength,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CipherState {
    Uninit,
    KeySet,
    KeyIvSet,
    Streaming,
    Finalized,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CipherChoice {
    Aes256,
    Aria256,
    Camellia256,
}

impl CipherChoice {
    /// spec.md §4.8: "selects one of three ciphers, in order: ARIA-256-CBC,
    /// AES-256-CBC, Camellia-256-CBC" — bit pattern 0/1/2 in that order.
    pub fn from_seed_bits(bits: u8) -> Result<Self, CipherError> {
        match bits & 0b11 {
            0 => Ok(CipherChoice::Aria256),
            1 => Ok(CipherChoice::Aes256),
            2 => Ok(CipherChoice::Camellia256),
            _ => Err(CipherError::ReservedCipherChoice),
        }
    }

    pub fn to_seed_bits(self) -> u8 {
        match self {
            CipherChoice::Aria256 => 0,
            CipherChoice::Aes256 => 1,
            CipherChoice::Camellia256 => 2,
        }
    }
}

enum Backend {
    Aes(Option<cbc::Encryptor<Aes256>>, Option<cbc::Decryptor<Aes256>>),
    Aria(Option<cbc::Encryptor<Aria256>>, Option<cbc::Decryptor<Aria256>>),
    Camellia(Option<cbc::Encryptor<Camellia256>>, Option<cbc::Decryptor<Camellia256>>),
}

/// Drives one CBC session: derive key/IV from a header seed, then either
/// encrypt or decrypt a full buffer in one call. The format always operates
/// on complete buffers (never a truly unbounded stream), so there is no
/// partial-block carry state beyond what `cbc` itself tracks internally.
pub struct Cipher {
    choice: CipherChoice,
    state: CipherState,
    key: Option<[u8; 32]>,
    iv: Option<[u8; 16]>,
}

impl Cipher {
    /// Splits the seed, selects the algorithm, and expands the seed's value
    /// field through the spin count into a key and IV, landing in
    /// `KeyIvSet` — the seed carries both cipher choice and key material, so
    /// there is no useful intermediate `KeySet`-only state reachable from it.
    pub fn from_seed(seed: u32) -> Result<Self, CipherError> {
        let fields = split_seed(seed);
        let choice = CipherChoice::from_seed_bits(fields.cipher_choice)?;
        let (key, iv) = XorShift128::seeded(fields.value, fields.spin).derive_key_iv();
        Ok(Cipher {
            choice,
            state: CipherState::KeyIvSet,
            key: Some(key),
            iv: Some(iv),
        })
    }

    pub fn choice(&self) -> CipherChoice {
        self.choice
    }

    pub fn state(&self) -> CipherState {
        self.state
    }

    fn backend_for_encrypt(&self) -> Backend {
        let key = self.key.expect("key set by from_seed").into();
        let iv = self.iv.expect("iv set by from_seed").into();
        match self.choice {
            CipherChoice::Aes256 => {
                Backend::Aes(Some(cbc::Encryptor::<Aes256>::new(&key, &iv)), None)
            }
            CipherChoice::Aria256 => {
                Backend::Aria(Some(cbc::Encryptor::<Aria256>::new(&key, &iv)), None)
            }
            CipherChoice::Camellia256 => {
                Backend::Camellia(Some(cbc::Encryptor::<Camellia256>::new(&key, &iv)), None)
            }
        }
    }

    fn backend_for_decrypt(&self) -> Backend {
        let key = self.key.expect("key set by from_seed").into();
        let iv = self.iv.expect("iv set by from_seed").into();
        match self.choice {
            CipherChoice::Aes256 => {
                Backend::Aes(None, Some(cbc::Decryptor::<Aes256>::new(&key, &iv)))
            }
            CipherChoice::Aria256 => {
                Backend::Aria(None, Some(cbc::Decryptor::<Aria256>::new(&key, &iv)))
            }
            CipherChoice::Camellia256 => {
                Backend::Camellia(None, Some(cbc::Decryptor::<Camellia256>::new(&key, &iv)))
            }
        }
    }

    /// Encrypts `plaintext` under CBC/PKCS7, moving to `Streaming` then
    /// `Finalized` — a `Cipher` is single-use for one direction, matching how
    /// the encoder and decoder each construct a fresh one per container.
    pub fn encrypt(&mut self, plaintext: &[u8]) -> Result<Vec<u8>, CipherError> {
        if self.state != CipherState::KeyIvSet {
            return Err(CipherError::InvalidState(self.state));
        }
        self.state = CipherState::Streaming;
        let out = match self.backend_for_encrypt() {
            Backend::Aes(Some(enc), _) => enc.encrypt_padded_vec_mut::<Pkcs7>(plaintext),
            Backend::Aria(Some(enc), _) => enc.encrypt_padded_vec_mut::<Pkcs7>(plaintext),
            Backend::Camellia(Some(enc), _) => enc.encrypt_padded_vec_mut::<Pkcs7>(plaintext),
            _ => unreachable!("backend_for_encrypt always returns an encryptor"),
        };
        self.state = CipherState::Finalized;
        Ok(out)
    }

    /// Decrypts `ciphertext`, validating PKCS7 padding. A padding failure
    /// (or a length not a multiple of the block size) is reported rather
    /// than panicking, since it can legitimately happen from a truncated or
    /// corrupted container and should surface as a decode error.
    pub fn decrypt(&mut self, ciphertext: &[u8]) -> Result<Vec<u8>, CipherError> {
        if self.state != CipherState::KeyIvSet {
            return Err(CipherError::InvalidState(self.state));
        }
        self.state = CipherState::Streaming;
        let result = match self.backend_for_decrypt() {
            Backend::Aes(_, Some(dec)) => dec.decrypt_padded_vec_mut::<Pkcs7>(ciphertext),
            Backend::Aria(_, Some(dec)) => dec.decrypt_padded_vec_mut::<Pkcs7>(ciphertext),
            Backend::Camellia(_, Some(dec)) => dec.decrypt_padded_vec_mut::<Pkcs7>(ciphertext),
            _ => unreachable!("backend_for_decrypt always returns a decryptor"),
        };
        self.state = CipherState::Finalized;
        result.map_err(|_| CipherError::PaddingOrLength)
    }
}
