//! The static settings registry, value validation, masking, and the boot
//! merge sequence.

use ldf_types::{LdfError, Role, Setting, SettingMeta, SettingType};

use crate::master_key::KEY_LEN;
use crate::secret;

/// Keys whose `sensitive` flag the registry enforces encryption-at-rest for.
pub const ENCRYPTED_KEYS: &[&str] = &["storage.s3.access_key", "storage.s3.secret_key"];

const fn meta(
    key: &'static str,
    ty: SettingType,
    description: &'static str,
    reboot_required: bool,
    category: &'static str,
    sensitive: bool,
) -> SettingMeta {
    SettingMeta {
        key,
        ty,
        description,
        reboot_required,
        category,
        sensitive,
    }
}

/// Non-exhaustive sample of recognized settings and their reload behavior.
pub const STATIC_REGISTRY: &[SettingMeta] = &[
    meta("server.port", SettingType::Int, "listening port", true, "server", false),
    meta("server.bind", SettingType::String, "bind address", true, "server", false),
    meta("log.output", SettingType::String, "log destination", false, "log", false),
    meta("log.level", SettingType::String, "log severity", false, "log", false),
    meta("database.path", SettingType::String, "persistence path", true, "database", false),
    meta("storage.type", SettingType::String, "local|s3", true, "storage", false),
    meta("storage.local.path", SettingType::String, "local storage root", true, "storage", false),
    meta("webui.devmode", SettingType::Bool, "enable dev-mode UI", false, "webui", false),
    meta("webui.app_name", SettingType::String, "display name, <=32 chars", false, "webui", false),
    meta("storage.s3.provider", SettingType::String, "S3-compatible provider name", true, "storage", false),
    meta("storage.s3.endpoint", SettingType::String, "S3-compatible endpoint", true, "storage", false),
    meta("storage.s3.region", SettingType::String, "bucket region", true, "storage", false),
    meta("storage.s3.bucket", SettingType::String, "bucket name", true, "storage", false),
    meta("storage.s3.access_key", SettingType::String, "access key id", true, "storage", true),
    meta("storage.s3.secret_key", SettingType::String, "secret access key", true, "storage", true),
    meta("sync.cache_duration", SettingType::Int, "minutes", false, "sync", false),
    meta("build.workspace", SettingType::String, "build working directory", true, "build", false),
    meta("build.workers", SettingType::Int, "worker count", true, "build", false),
];

/// Looks up a key's metadata in the static registry.
pub fn lookup(key: &str) -> Option<&'static SettingMeta> {
    STATIC_REGISTRY.iter().find(|m| m.key == key)
}

/// Validates `raw` against `meta.ty`, and the `webui.app_name` length cap.
pub fn validate_value(meta: &SettingMeta, raw: &str) -> Result<(), LdfError> {
    match meta.ty {
        SettingType::Int => {
            raw.parse::<i64>()
                .map_err(|_| LdfError::validation(format!("{} must be an integer", meta.key)))?;
        }
        SettingType::Bool => {
            raw.parse::<bool>()
                .map_err(|_| LdfError::validation(format!("{} must be a boolean", meta.key)))?;
        }
        SettingType::String => {}
    }

    if meta.key == "webui.app_name" && raw.chars().count() > 32 {
        return Err(LdfError::validation("webui.app_name must be 32 characters or fewer"));
    }

    Ok(())
}

/// Masks `value` as `********` unless the caller is root and explicitly
/// asked to reveal it.
pub fn mask_for_read(meta: &SettingMeta, value: &str, caller_role: Role, reveal: bool) -> String {
    if meta.sensitive && !(caller_role.is_root() && reveal) {
        "********".to_string()
    } else {
        value.to_string()
    }
}

/// Encrypts a value at rest if its key is in [`ENCRYPTED_KEYS`], otherwise
/// returns it unchanged.
pub fn encrypt_if_sensitive(key: &str, raw: &str, master_key: &[u8; KEY_LEN]) -> anyhow::Result<String> {
    if ENCRYPTED_KEYS.contains(&key) {
        secret::encrypt(raw, master_key)
    } else {
        Ok(raw.to_string())
    }
}

/// Decrypts a stored value if it carries the `enc:v1:` prefix.
pub fn decrypt_stored(raw: &str, master_key: &[u8; KEY_LEN]) -> anyhow::Result<String> {
    secret::decrypt(raw, master_key)
}

/// Applies the boot-time merge: DB-persisted settings override in-memory
/// defaults; any default key absent from `persisted` is appended so it
/// gets synced back, without touching keys the user has already edited.
pub fn merge_boot_settings(defaults: &[Setting], persisted: &[Setting]) -> Vec<Setting> {
    let mut merged: Vec<Setting> = persisted.to_vec();
    for default in defaults {
        if !merged.iter().any(|s| s.key == default.key) {
            merged.push(default.clone());
        }
    }
    merged
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn registry_lookup_finds_known_keys() {
        assert!(lookup("server.port").is_some());
        assert!(lookup("does.not.exist").is_none());
    }

    #[test]
    fn validates_int_and_bool_types() {
        let port = lookup("server.port").unwrap();
        assert!(validate_value(port, "8080").is_ok());
        assert!(validate_value(port, "not-a-number").is_err());

        let devmode = lookup("webui.devmode").unwrap();
        assert!(validate_value(devmode, "true").is_ok());
        assert!(validate_value(devmode, "sort-of").is_err());
    }

    #[test]
    fn app_name_over_32_chars_is_rejected() {
        let app_name = lookup("webui.app_name").unwrap();
        let too_long = "x".repeat(33);
        assert!(validate_value(app_name, &too_long).is_err());
        assert!(validate_value(app_name, "LDF").is_ok());
    }

    #[test]
    fn sensitive_values_are_masked_unless_root_reveals() {
        let secret_key = lookup("storage.s3.secret_key").unwrap();
        assert_eq!(mask_for_read(secret_key, "actual-value", Role::Admin, true), "********");
        assert_eq!(mask_for_read(secret_key, "actual-value", Role::Root, false), "********");
        assert_eq!(mask_for_read(secret_key, "actual-value", Role::Root, true), "actual-value");
    }

    #[test]
    fn non_sensitive_values_are_never_masked() {
        let port = lookup("server.port").unwrap();
        assert_eq!(mask_for_read(port, "8080", Role::Viewer, false), "8080");
    }

    #[test]
    fn encrypt_if_sensitive_only_touches_registered_keys() {
        let key = [1u8; KEY_LEN];
        let encrypted = encrypt_if_sensitive("storage.s3.secret_key", "shh", &key).unwrap();
        assert!(secret::is_encrypted(&encrypted));

        let plain = encrypt_if_sensitive("server.port", "8080", &key).unwrap();
        assert_eq!(plain, "8080");
    }

    #[test]
    fn boot_merge_prefers_persisted_over_defaults() {
        let defaults = vec![
            Setting { key: "log.level".into(), string_value: "info".into() },
            Setting { key: "server.port".into(), string_value: "8080".into() },
        ];
        let persisted = vec![Setting { key: "log.level".into(), string_value: "debug".into() }];

        let merged = merge_boot_settings(&defaults, &persisted);
        assert_eq!(merged.len(), 2);
        assert!(merged.iter().any(|s| s.key == "log.level" && s.string_value == "debug"));
        assert!(merged.iter().any(|s| s.key == "server.port" && s.string_value == "8080"));
    }
}
