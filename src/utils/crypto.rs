//! # Crypto Capabilities
//!
//! The session only needs four capabilities: stream encryption, stream decryption, key pair
//! generation and symmetric key generation. [`Encryptor`] and [`Decryptor`] are the seams;
//! the key types below are the default implementations.
//!
//! - **Asymmetric**: RSA-1024 with OAEP/SHA-1 padding and public exponent 17. Public keys
//!   travel as X.509 SubjectPublicKeyInfo DER, which is exactly 160 bytes for such a key and
//!   fills the wire slot. Private keys persist as PKCS#8 DER.
//! - **Symmetric**: AES-128-CBC with PKCS#7 padding and an all-zero IV.
//!
//! The zero IV is part of the observed wire contract with compatible peers. Changing it
//! requires a protocol version bump on both ends.

use aes::cipher::generic_array::GenericArray;
use aes::cipher::{BlockDecryptMut, BlockEncryptMut, KeyIvInit};
use rand_core::OsRng;
use rsa::pkcs8::{DecodePrivateKey, DecodePublicKey, EncodePrivateKey, EncodePublicKey};
use rsa::{BigUint, Oaep, RsaPrivateKey, RsaPublicKey};
use std::fmt;
use std::io::{Read, Write};
use zeroize::{Zeroize, ZeroizeOnDrop};

use crate::core::types::{PublicKeyBlob, BLOCK_SIZE, PUBLIC_KEY_SIZE};
use crate::error::{constants, CryptoError};

/// RSA modulus size in bits.
pub const MODULUS_BITS: usize = 1024;

/// RSA public exponent. A larger exponent pushes the encoded key past the wire slot.
pub const PUBLIC_EXPONENT: u32 = 17;

/// AES-128 key length in bytes.
pub const SYMMETRIC_KEY_SIZE: usize = 16;

const AES_BLOCK: usize = 16;

/// Largest plaintext RSA-1024 OAEP/SHA-1 accepts.
const OAEP_MAX_PLAINTEXT: usize = MODULUS_BITS / 8 - 2 * 20 - 2;

type Aes128CbcEnc = cbc::Encryptor<aes::Aes128>;
type Aes128CbcDec = cbc::Decryptor<aes::Aes128>;

pub type CryptoResult<T> = std::result::Result<T, CryptoError>;

/// Encrypts everything `input` yields into `output`.
pub trait Encryptor: Send + Sync {
    fn encrypt(&self, input: &mut dyn Read, output: &mut dyn Write) -> CryptoResult<()>;
}

/// Decrypts everything `input` yields into `output`.
pub trait Decryptor: Send + Sync {
    fn decrypt(&self, input: &mut dyn Read, output: &mut dyn Write) -> CryptoResult<()>;
}

/// Read `input` to the end, refusing anything larger than `limit`.
fn read_bounded(input: &mut dyn Read, limit: usize) -> CryptoResult<Vec<u8>> {
    let mut data = Vec::with_capacity(limit.min(BLOCK_SIZE));
    input.take(limit as u64 + 1).read_to_end(&mut data)?;
    if data.len() > limit {
        return Err(CryptoError::InputTooLarge(data.len()));
    }
    Ok(data)
}

/// Length of the DER SEQUENCE at the start of `bytes`, header included.
fn der_sequence_len(bytes: &[u8]) -> Option<usize> {
    if bytes.first() != Some(&0x30) {
        return None;
    }
    let first = *bytes.get(1)? as usize;
    if first < 0x80 {
        return Some(2 + first);
    }
    let octets = first & 0x7F;
    if octets == 0 || octets > 2 {
        return None;
    }
    let mut len = 0usize;
    for i in 0..octets {
        len = (len << 8) | *bytes.get(2 + i)? as usize;
    }
    Some(2 + octets + len)
}

/// A peer's public key.
#[derive(Clone, PartialEq, Eq)]
pub struct PublicKey(RsaPublicKey);

impl PublicKey {
    /// Export into the fixed wire slot.
    pub fn export(&self) -> CryptoResult<PublicKeyBlob> {
        let der = self
            .0
            .to_public_key_der()
            .map_err(|e| CryptoError::Encoding(e.to_string()))?;
        let der = der.as_bytes();
        if der.len() > PUBLIC_KEY_SIZE {
            return Err(CryptoError::InvalidKeyLength(der.len()));
        }
        let mut slot = [0u8; PUBLIC_KEY_SIZE];
        slot[..der.len()].copy_from_slice(der);
        Ok(PublicKeyBlob::new(slot))
    }

    /// Load a key received from the server.
    pub fn import(blob: &PublicKeyBlob) -> CryptoResult<Self> {
        let bytes = blob.as_bytes();
        let len = der_sequence_len(bytes)
            .filter(|&len| len <= PUBLIC_KEY_SIZE)
            .ok_or_else(|| CryptoError::Encoding("public key is not a DER sequence".into()))?;
        let key = RsaPublicKey::from_public_key_der(&bytes[..len])
            .map_err(|e| CryptoError::Encoding(e.to_string()))?;
        Ok(Self(key))
    }
}

impl fmt::Debug for PublicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("PublicKey(..)")
    }
}

impl Encryptor for PublicKey {
    fn encrypt(&self, input: &mut dyn Read, output: &mut dyn Write) -> CryptoResult<()> {
        let plaintext = read_bounded(input, OAEP_MAX_PLAINTEXT)?;
        let ciphertext = self
            .0
            .encrypt(&mut OsRng, Oaep::new::<sha1::Sha1>(), &plaintext)?;
        output.write_all(&ciphertext)?;
        Ok(())
    }
}

/// Our own private key.
#[derive(Clone)]
pub struct PrivateKey(RsaPrivateKey);

impl PrivateKey {
    pub fn public_key(&self) -> PublicKey {
        PublicKey(RsaPublicKey::from(&self.0))
    }

    /// PKCS#8 DER encoding, for persistence.
    pub fn export(&self) -> CryptoResult<Vec<u8>> {
        let der = self
            .0
            .to_pkcs8_der()
            .map_err(|e| CryptoError::Encoding(e.to_string()))?;
        Ok(der.as_bytes().to_vec())
    }

    pub fn import(der: &[u8]) -> CryptoResult<Self> {
        RsaPrivateKey::from_pkcs8_der(der)
            .map(Self)
            .map_err(|e| CryptoError::Encoding(e.to_string()))
    }
}

impl fmt::Debug for PrivateKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("PrivateKey(..)")
    }
}

impl Decryptor for PrivateKey {
    fn decrypt(&self, input: &mut dyn Read, output: &mut dyn Write) -> CryptoResult<()> {
        let ciphertext = read_bounded(input, MODULUS_BITS / 8)?;
        let mut plaintext = self.0.decrypt(Oaep::new::<sha1::Sha1>(), &ciphertext)?;
        output.write_all(&plaintext)?;
        plaintext.zeroize();
        Ok(())
    }
}

/// Generate a fresh asymmetric key pair.
pub fn generate_key_pair() -> CryptoResult<(PublicKey, PrivateKey)> {
    let exponent = BigUint::from(PUBLIC_EXPONENT);
    let private = RsaPrivateKey::new_with_exp(&mut OsRng, MODULUS_BITS, &exponent)?;
    let private = PrivateKey(private);
    Ok((private.public_key(), private))
}

/// Shared AES key for one peer.
#[derive(Clone, PartialEq, Eq, Zeroize, ZeroizeOnDrop)]
pub struct SymmetricKey([u8; SYMMETRIC_KEY_SIZE]);

impl SymmetricKey {
    pub fn generate() -> CryptoResult<Self> {
        let mut key = [0u8; SYMMETRIC_KEY_SIZE];
        getrandom::fill(&mut key).map_err(|e| CryptoError::Random(e.to_string()))?;
        Ok(Self(key))
    }

    pub fn from_slice(bytes: &[u8]) -> CryptoResult<Self> {
        let key: [u8; SYMMETRIC_KEY_SIZE] = bytes
            .try_into()
            .map_err(|_| CryptoError::InvalidKeyLength(bytes.len()))?;
        Ok(Self(key))
    }

    pub fn as_bytes(&self) -> &[u8; SYMMETRIC_KEY_SIZE] {
        &self.0
    }

    fn zero_iv() -> [u8; AES_BLOCK] {
        [0u8; AES_BLOCK]
    }
}

impl fmt::Debug for SymmetricKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("SymmetricKey(..)")
    }
}

impl Encryptor for SymmetricKey {
    fn encrypt(&self, input: &mut dyn Read, output: &mut dyn Write) -> CryptoResult<()> {
        let mut cipher = Aes128CbcEnc::new(&self.0.into(), &Self::zero_iv().into());
        let mut block = [0u8; BLOCK_SIZE];
        let mut pending: Vec<u8> = Vec::with_capacity(BLOCK_SIZE + AES_BLOCK);

        loop {
            let n = input.read(&mut block)?;
            if n == 0 {
                break;
            }
            pending.extend_from_slice(&block[..n]);
            let whole = pending.len() - pending.len() % AES_BLOCK;
            for chunk in pending[..whole].chunks_exact_mut(AES_BLOCK) {
                cipher.encrypt_block_mut(GenericArray::from_mut_slice(chunk));
            }
            output.write_all(&pending[..whole])?;
            pending.drain(..whole);
        }

        // PKCS#7: always append between 1 and 16 bytes of padding.
        let pad = AES_BLOCK - pending.len();
        pending.resize(AES_BLOCK, pad as u8);
        cipher.encrypt_block_mut(GenericArray::from_mut_slice(&mut pending));
        output.write_all(&pending)?;
        block.zeroize();
        Ok(())
    }
}

impl Decryptor for SymmetricKey {
    fn decrypt(&self, input: &mut dyn Read, output: &mut dyn Write) -> CryptoResult<()> {
        let mut cipher = Aes128CbcDec::new(&self.0.into(), &Self::zero_iv().into());
        let mut block = [0u8; BLOCK_SIZE];
        let mut pending: Vec<u8> = Vec::with_capacity(BLOCK_SIZE + AES_BLOCK);

        loop {
            let n = input.read(&mut block)?;
            if n == 0 {
                break;
            }
            pending.extend_from_slice(&block[..n]);
            // Hold back the final block until the padding can be checked.
            if pending.len() > AES_BLOCK {
                let whole = (pending.len() - 1) / AES_BLOCK * AES_BLOCK;
                for chunk in pending[..whole].chunks_exact_mut(AES_BLOCK) {
                    cipher.decrypt_block_mut(GenericArray::from_mut_slice(chunk));
                }
                output.write_all(&pending[..whole])?;
                pending.drain(..whole);
            }
        }

        if pending.len() != AES_BLOCK {
            return Err(CryptoError::Malformed(constants::ERR_TRUNCATED_CIPHERTEXT));
        }
        cipher.decrypt_block_mut(GenericArray::from_mut_slice(&mut pending));

        let pad = pending[AES_BLOCK - 1] as usize;
        if pad == 0 || pad > AES_BLOCK || pending[AES_BLOCK - pad..].iter().any(|&b| b as usize != pad)
        {
            return Err(CryptoError::Malformed(constants::ERR_INVALID_PADDING));
        }
        output.write_all(&pending[..AES_BLOCK - pad])?;
        pending.zeroize();
        block.zeroize();
        Ok(())
    }
}
