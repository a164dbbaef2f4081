//! Typed settings registry with AEAD-encrypted secrets.
//!
//! Settings are persisted as strings and validated against a fixed
//! [`registry::STATIC_REGISTRY`]. Reads mask `sensitive` keys unless the
//! caller is root and explicitly asks to reveal them; `storage.s3.access_key`
//! and `storage.s3.secret_key` are additionally encrypted at rest.

mod master_key;
mod registry;
mod secret;

pub use master_key::{load_or_create as load_or_create_master_key, KEY_LEN};
pub use registry::{
    decrypt_stored, encrypt_if_sensitive, lookup, mask_for_read, merge_boot_settings,
    validate_value, ENCRYPTED_KEYS, STATIC_REGISTRY,
};
pub use secret::{decrypt as decrypt_secret, encrypt as encrypt_secret, is_encrypted, ENCRYPTED_PREFIX};
