//! Módulo de criptografia para dados clínicos
//!
//! Anotações de histórico médico e de atendimentos são gravadas cifradas com
//! AES-256-GCM. A chave de dados (chave mestra) é guardada no banco embrulhada
//! com ChaCha20-Poly1305 sob uma chave derivada da frase-senha via Argon2id.

use aes_gcm::{
    aead::{Aead, AeadCore, KeyInit, OsRng},
    Aes256Gcm, Key, Nonce,
};
use argon2::Argon2;
use chacha20poly1305::{ChaCha20Poly1305, Key as ChaChaKey, Nonce as ChaChaNonce};
use rand::{rngs::OsRng as RandOsRng, RngCore};
use serde::{de::DeserializeOwned, Serialize};
use thiserror::Error;
use zeroize::{Zeroize, ZeroizeOnDrop};

#[derive(Error, Debug)]
pub enum CryptoError {
    #[error("Não foi possível cifrar: {0}")]
    EncryptionFailed(String),
    #[error("Não foi possível decifrar: {0}")]
    DecryptionFailed(String),
    #[error("Conteúdo cifrado malformado: {0}")]
    InvalidData(String),
    #[error("Frase-senha ou parâmetros de derivação inválidos: {0}")]
    InvalidConfiguration(String),
}

const KEY_SIZE: usize = 32;

/// Nonce de 96 bits, igual para AES-GCM e ChaCha20-Poly1305
const NONCE_SIZE: usize = 12;

/// Tamanho do salt usado na derivação Argon2id
pub const KDF_SALT_SIZE: usize = 16;

/// Chave simétrica de 256 bits, apagada da memória ao sair de escopo
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct EncryptionKey([u8; KEY_SIZE]);

impl EncryptionKey {
    pub fn generate() -> Self {
        let mut bytes = [0u8; KEY_SIZE];
        RandOsRng.fill_bytes(&mut bytes);
        Self(bytes)
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, CryptoError> {
        let array: [u8; KEY_SIZE] = bytes.try_into().map_err(|_| {
            CryptoError::InvalidData(format!("chave com {} bytes, esperado {}", bytes.len(), KEY_SIZE))
        })?;
        Ok(Self(array))
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }
}

impl std::fmt::Debug for EncryptionKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("EncryptionKey(***)")
    }
}

/// Dados criptografados e seu nonce
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncryptedData {
    pub ciphertext: Vec<u8>,
    pub nonce: Vec<u8>,
}

fn check_nonce(nonce: &[u8]) -> Result<(), CryptoError> {
    if nonce.len() != NONCE_SIZE {
        return Err(CryptoError::InvalidData(format!(
            "Nonce inválido: esperado {} bytes, recebido {}",
            NONCE_SIZE,
            nonce.len()
        )));
    }
    Ok(())
}

fn aes(key: &EncryptionKey) -> Aes256Gcm {
    Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(key.as_bytes()))
}

/// AES-256-GCM com nonce aleatório por mensagem
pub fn encrypt(data: &[u8], key: &EncryptionKey) -> Result<EncryptedData, CryptoError> {
    let nonce = Aes256Gcm::generate_nonce(&mut OsRng);
    aes(key)
        .encrypt(&nonce, data)
        .map(|ciphertext| EncryptedData {
            ciphertext,
            nonce: nonce.to_vec(),
        })
        .map_err(|e| CryptoError::EncryptionFailed(e.to_string()))
}

pub fn decrypt(encrypted: &EncryptedData, key: &EncryptionKey) -> Result<Vec<u8>, CryptoError> {
    check_nonce(&encrypted.nonce)?;
    aes(key)
        .decrypt(Nonce::from_slice(&encrypted.nonce), encrypted.ciphertext.as_ref())
        .map_err(|e| CryptoError::DecryptionFailed(e.to_string()))
}

/// Gera um salt aleatório para a derivação da chave de embrulho
pub fn generate_salt() -> Vec<u8> {
    let mut salt = vec![0u8; KDF_SALT_SIZE];
    RandOsRng.fill_bytes(&mut salt);
    salt
}

/// Deriva a chave de embrulho a partir da frase-senha (Argon2id, parâmetros padrão)
pub fn derive_wrapping_key(passphrase: &str, salt: &[u8]) -> Result<EncryptionKey, CryptoError> {
    if passphrase.is_empty() {
        return Err(CryptoError::InvalidConfiguration(
            "frase-senha vazia".to_string(),
        ));
    }

    let mut out = [0u8; KEY_SIZE];
    Argon2::default()
        .hash_password_into(passphrase.as_bytes(), salt, &mut out)
        .map_err(|e| CryptoError::InvalidConfiguration(e.to_string()))?;

    let key = EncryptionKey(out);
    out.zeroize();
    Ok(key)
}

/// Embrulha uma chave usando ChaCha20-Poly1305 com chave derivada da frase-senha
pub fn wrap_key(
    key: &EncryptionKey,
    passphrase: &str,
    salt: &[u8],
) -> Result<EncryptedData, CryptoError> {
    let wrapping_key = derive_wrapping_key(passphrase, salt)?;
    let cipher = ChaCha20Poly1305::new(ChaChaKey::from_slice(wrapping_key.as_bytes()));

    let mut nonce = [0u8; NONCE_SIZE];
    RandOsRng.fill_bytes(&mut nonce);

    let ciphertext = cipher
        .encrypt(ChaChaNonce::from_slice(&nonce), key.as_bytes())
        .map_err(|e| CryptoError::EncryptionFailed(e.to_string()))?;

    Ok(EncryptedData {
        ciphertext,
        nonce: nonce.to_vec(),
    })
}

/// Desembrulha uma chave; falha se a frase-senha não for a usada no embrulho
pub fn unwrap_key(
    wrapped: &EncryptedData,
    passphrase: &str,
    salt: &[u8],
) -> Result<EncryptionKey, CryptoError> {
    check_nonce(&wrapped.nonce)?;

    let wrapping_key = derive_wrapping_key(passphrase, salt)?;
    let cipher = ChaCha20Poly1305::new(ChaChaKey::from_slice(wrapping_key.as_bytes()));

    let mut plaintext = cipher
        .decrypt(ChaChaNonce::from_slice(&wrapped.nonce), wrapped.ciphertext.as_ref())
        .map_err(|_| CryptoError::DecryptionFailed("frase-senha incorreta".to_string()))?;

    let key = EncryptionKey::from_bytes(&plaintext);
    plaintext.zeroize();
    key
}

/// Cifra de campos: serializa estruturas em JSON e as grava cifradas
#[derive(Clone, Debug)]
pub struct FieldCipher {
    key: EncryptionKey,
}

impl FieldCipher {
    pub fn new(key: EncryptionKey) -> Self {
        Self { key }
    }

    pub fn seal_json<T: Serialize>(&self, value: &T) -> Result<EncryptedData, CryptoError> {
        let mut plain = serde_json::to_vec(value)
            .map_err(|e| CryptoError::InvalidData(e.to_string()))?;
        let sealed = encrypt(&plain, &self.key);
        plain.zeroize();
        sealed
    }

    pub fn open_json<T: DeserializeOwned>(&self, encrypted: &EncryptedData) -> Result<T, CryptoError> {
        let mut plain = decrypt(encrypted, &self.key)?;
        let value = serde_json::from_slice(&plain)
            .map_err(|e| CryptoError::InvalidData(e.to_string()));
        plain.zeroize();
        value
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[test]
    fn clinical_text_round_trips_through_aes() -> Result<(), CryptoError> {
        let note = b"Paciente alergico a penicilina";
        let key = EncryptionKey::generate();

        let sealed = encrypt(note, &key)?;
        assert_ne!(&sealed.ciphertext, note);
        assert_eq!(decrypt(&sealed, &key)?, note.to_vec());
        Ok(())
    }

    #[test]
    fn master_key_unwraps_only_with_its_phrase() -> Result<(), CryptoError> {
        let master = EncryptionKey::generate();
        let salt = generate_salt();

        let wrapped = wrap_key(&master, "frase da clinica", &salt)?;
        assert_eq!(
            unwrap_key(&wrapped, "frase da clinica", &salt)?.as_bytes(),
            master.as_bytes()
        );
        assert!(matches!(
            unwrap_key(&wrapped, "outra frase", &salt),
            Err(CryptoError::DecryptionFailed(_))
        ));
        Ok(())
    }

    #[test]
    fn other_key_cannot_open_note() -> Result<(), CryptoError> {
        let sealed = encrypt(b"exodontia do 48", &EncryptionKey::generate())?;
        assert!(decrypt(&sealed, &EncryptionKey::generate()).is_err());
        Ok(())
    }

    #[test]
    fn malformed_nonce_is_invalid_data() {
        let key = EncryptionKey::generate();
        let bogus = EncryptedData {
            ciphertext: vec![1, 2, 3],
            nonce: vec![0; 4],
        };
        assert!(matches!(decrypt(&bogus, &key), Err(CryptoError::InvalidData(_))));
    }

    #[test]
    fn empty_phrase_cannot_derive_key() {
        assert!(matches!(
            derive_wrapping_key("", &generate_salt()),
            Err(CryptoError::InvalidConfiguration(_))
        ));
        assert!(EncryptionKey::from_bytes(&[7u8; 16]).is_err());
    }

    #[test]
    fn field_cipher_seals_structs() -> Result<(), CryptoError> {
        #[derive(Serialize, Deserialize, PartialEq, Debug)]
        struct Notes {
            diagnosis: String,
        }

        let cipher = FieldCipher::new(EncryptionKey::generate());
        let sealed = cipher.seal_json(&Notes {
            diagnosis: "cárie oclusal 36".into(),
        })?;
        let opened: Notes = cipher.open_json(&sealed)?;
        assert_eq!(opened.diagnosis, "cárie oclusal 36");
        Ok(())
    }
}
