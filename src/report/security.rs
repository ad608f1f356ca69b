//! PDF Standard Security Handler, revision 3 (128-bit RC4)
//!
//! ```text
//! O   = RC4^20(MD5^51(pad(owner)), pad(user))
//! key = MD5^51(pad(user) || O || P(le32) || ID0)
//! U   = RC4^20(key, MD5(PAD || ID0)) || 16 x 0x00
//! obj = MD5(key || num(le24) || gen(le16))        per-object RC4 key
//! ```
//!
//! `RC4^20` is one pass with the key followed by 19 passes with the key
//! XOR-ed bytewise with the pass number.

use lopdf::{Dictionary, Document, Object, ObjectId, StringFormat};
use md5::{Digest, Md5};
use rc4::{consts::U16, KeyInit, Rc4, StreamCipher};
use sha2::Sha256;
use tracing::debug;

use crate::error::SealError;

const PASSWORD_PAD: [u8; 32] = [
    0x28, 0xBF, 0x4E, 0x5E, 0x4E, 0x75, 0x8A, 0x41, 0x64, 0x00, 0x4E, 0x56, 0xFF, 0xFA, 0x01, 0x08, 0x2E, 0x2E,
    0x00, 0xB6, 0xD0, 0x68, 0x3E, 0x80, 0x2F, 0x0C, 0xA9, 0xFE, 0x64, 0x53, 0x69, 0x7A,
];

/// Print, copy and high-quality print allowed; modification denied
pub const PERMISSIONS: i32 = -1836;

const KEY_LEN: usize = 16;

fn pad_password(password: &str) -> [u8; 32] {
    let bytes = password.as_bytes();
    let take = bytes.len().min(32);
    let mut padded = [0u8; 32];
    padded[..take].copy_from_slice(&bytes[..take]);
    padded[take..].copy_from_slice(&PASSWORD_PAD[..32 - take]);
    padded
}

fn rc4_apply(key: &[u8; KEY_LEN], data: &mut [u8]) {
    let mut cipher = Rc4::<U16>::new(key.into());
    cipher.apply_keystream(data);
}

/// One pass with `key`, then passes 1..=19 with `key ^ pass`
fn rc4_twenty(key: &[u8; KEY_LEN], data: &mut [u8]) {
    rc4_apply(key, data);
    for pass in 1..=19u8 {
        let round_key = key.map(|b| b ^ pass);
        rc4_apply(&round_key, data);
    }
}

fn md5_rehash(mut digest: [u8; KEY_LEN]) -> [u8; KEY_LEN] {
    for _ in 0..50 {
        digest = Md5::digest(digest).into();
    }
    digest
}

fn owner_entry(owner_password: &str, user_password: &str) -> [u8; 32] {
    let owner_key = md5_rehash(Md5::digest(pad_password(owner_password)).into());
    let mut entry = pad_password(user_password);
    rc4_twenty(&owner_key, &mut entry);
    entry
}

fn file_key(user_password: &str, owner_entry: &[u8], permissions: i32, id0: &[u8]) -> [u8; KEY_LEN] {
    let mut hasher = Md5::new();
    hasher.update(pad_password(user_password));
    hasher.update(owner_entry);
    hasher.update(permissions.to_le_bytes());
    hasher.update(id0);
    md5_rehash(hasher.finalize().into())
}

fn user_entry(key: &[u8; KEY_LEN], id0: &[u8]) -> [u8; 32] {
    let mut hasher = Md5::new();
    hasher.update(PASSWORD_PAD);
    hasher.update(id0);
    let mut check: [u8; KEY_LEN] = hasher.finalize().into();
    rc4_twenty(key, &mut check);

    let mut entry = [0u8; 32];
    entry[..KEY_LEN].copy_from_slice(&check);
    entry
}

/// Owner password used when only a user password is configured
pub fn derive_owner_password(user_password: &str) -> String {
    let digest = Sha256::digest(format!("ffx-owner:{}", user_password));
    hex::encode(digest)[..32].to_string()
}

/// File-level security parameters for one sealed document
pub struct Rc4Security {
    key: [u8; KEY_LEN],
    owner_entry: [u8; 32],
    user_entry: [u8; 32],
    id0: [u8; 16],
}

impl Rc4Security {
    pub fn new(user_password: &str, owner_password: &str, id0: [u8; 16]) -> Self {
        let owner_entry = owner_entry(owner_password, user_password);
        let key = file_key(user_password, &owner_entry, PERMISSIONS, &id0);
        let user_entry = user_entry(&key, &id0);
        Self {
            key,
            owner_entry,
            user_entry,
            id0,
        }
    }

    pub fn encrypt_dictionary(&self) -> Dictionary {
        let mut dict = Dictionary::new();
        dict.set("Filter", Object::Name(b"Standard".to_vec()));
        dict.set("V", Object::Integer(2));
        dict.set("R", Object::Integer(3));
        dict.set("Length", Object::Integer(128));
        dict.set("P", Object::Integer(PERMISSIONS as i64));
        dict.set("O", Object::String(self.owner_entry.to_vec(), StringFormat::Hexadecimal));
        dict.set("U", Object::String(self.user_entry.to_vec(), StringFormat::Hexadecimal));
        dict
    }

    fn object_key(&self, (number, generation): ObjectId) -> [u8; KEY_LEN] {
        let mut hasher = Md5::new();
        hasher.update(self.key);
        hasher.update(&number.to_le_bytes()[..3]);
        hasher.update(generation.to_le_bytes());
        hasher.finalize().into()
    }

    /// Encrypt every string and stream in place, then register the Encrypt dictionary
    pub fn apply(&self, doc: &mut Document) -> Result<(), SealError> {
        if doc.trailer.get(b"Encrypt").is_ok() {
            return Err(SealError::Encrypt("document is already encrypted".into()));
        }

        let mut encrypted = 0usize;
        for (id, object) in doc.objects.iter_mut() {
            let key = self.object_key(*id);
            encrypted += encrypt_object(&key, object);
        }

        let encrypt_id = doc.add_object(self.encrypt_dictionary());
        doc.trailer.set("Encrypt", Object::Reference(encrypt_id));
        let id = Object::String(self.id0.to_vec(), StringFormat::Hexadecimal);
        doc.trailer.set("ID", Object::Array(vec![id.clone(), id]));

        debug!(objects = doc.objects.len(), encrypted, "Document encrypted");
        Ok(())
    }
}

/// Returns how many strings and streams were encrypted
fn encrypt_object(key: &[u8; KEY_LEN], object: &mut Object) -> usize {
    match object {
        Object::String(bytes, format) => {
            rc4_apply(key, bytes);
            *format = StringFormat::Hexadecimal;
            1
        }
        Object::Array(items) => items.iter_mut().map(|item| encrypt_object(key, item)).sum(),
        Object::Dictionary(dict) => encrypt_dictionary_values(key, dict),
        Object::Stream(stream) => {
            rc4_apply(key, &mut stream.content);
            1 + encrypt_dictionary_values(key, &mut stream.dict)
        }
        _ => 0,
    }
}

fn encrypt_dictionary_values(key: &[u8; KEY_LEN], dict: &mut Dictionary) -> usize {
    dict.iter_mut().map(|(_, value)| encrypt_object(key, value)).sum()
}

/// Standard user-password check against an Encrypt dictionary
pub fn authenticate_user_password(encrypt: &Dictionary, id0: &[u8], password: &str) -> bool {
    let (Ok(owner), Ok(user), Ok(permissions)) = (
        encrypt.get(b"O").and_then(Object::as_str),
        encrypt.get(b"U").and_then(Object::as_str),
        encrypt.get(b"P").and_then(Object::as_i64),
    ) else {
        return false;
    };
    if user.len() < KEY_LEN {
        return false;
    }
    let key = file_key(password, owner, permissions as i32, id0);
    user_entry(&key, id0)[..KEY_LEN] == user[..KEY_LEN]
}

#[cfg(test)]
mod tests {
    use super::*;
    use lopdf::{dictionary, Stream};

    const ID0: [u8; 16] = [0, 1, 2, 3, 4, 5, 6, 7, 8, 9, 10, 11, 12, 13, 14, 15];

    #[test]
    fn test_object_string_cipher() {
        let security = Rc4Security::new("secret", &derive_owner_password("secret"), ID0);
        let mut data = *b"hello";
        rc4_apply(&security.object_key((5, 0)), &mut data);
        assert_eq!(hex::encode(data), "105b989cb3");
    }

    #[test]
    fn test_known_answer() {
        let owner = derive_owner_password("secret");
        assert_eq!(owner, "82b3c8669db4f44e4a3752f1c71e9fff");

        let security = Rc4Security::new("secret", &owner, ID0);
        assert_eq!(
            hex::encode(security.owner_entry),
            "9499945dbb8930dabba18d6b9dbb140bcbd17ef4db50cf8b3b55999bb80a9392"
        );
        assert_eq!(hex::encode(security.key), "c4cef08b3b4e4d515a37716e4567d80c");
        assert_eq!(
            hex::encode(security.user_entry),
            "bbef01c55e05e81504b52645372dde7000000000000000000000000000000000"
        );
        assert_eq!(hex::encode(security.object_key((5, 0))), "c31d50e6321db255a9364cb70629e5fb");
    }

    #[test]
    fn test_password_check() {
        let security = Rc4Security::new("secret", &derive_owner_password("secret"), ID0);
        let dict = security.encrypt_dictionary();
        assert!(authenticate_user_password(&dict, &ID0, "secret"));
        assert!(!authenticate_user_password(&dict, &ID0, "Secret"));
        assert!(!authenticate_user_password(&dict, &ID0, ""));
        assert!(!authenticate_user_password(&Dictionary::new(), &ID0, "secret"));
    }

    #[test]
    fn test_apply_encrypts_strings_and_streams() {
        let mut doc = Document::with_version("1.5");
        let info_id = doc.add_object(dictionary! {
            "Title" => Object::String(b"hello".to_vec(), StringFormat::Literal),
        });
        let stream_id = doc.add_object(Stream::new(dictionary! {}, b"BT ET".to_vec()));
        assert_eq!(info_id, (1, 0));

        let security = Rc4Security::new("secret", &derive_owner_password("secret"), ID0);
        security.apply(&mut doc).unwrap();

        let title = doc.get_dictionary(info_id).unwrap().get(b"Title").unwrap().as_str().unwrap();
        assert_ne!(title, b"hello");
        let Ok(Object::Stream(stream)) = doc.get_object(stream_id) else {
            panic!("stream missing");
        };
        assert_ne!(stream.content, b"BT ET");

        let encrypt_id = doc.trailer.get(b"Encrypt").unwrap().as_reference().unwrap();
        let dict = doc.get_dictionary(encrypt_id).unwrap();
        assert!(authenticate_user_password(dict, &ID0, "secret"));
        assert!(security.apply(&mut doc).is_err());
    }
}
