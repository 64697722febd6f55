use color_eyre::eyre::{
    Result,
    WrapErr,
    eyre,
};
use eth_keystore::decrypt_key;
use fuels::{
    crypto::SecretKey,
    prelude::{
        Provider,
        Wallet,
        derivation::DEFAULT_DERIVATION_PATH,
        private_key::PrivateKeySigner,
    },
};
use itertools::Itertools;
use rpassword::prompt_password;
use std::{
    fs,
    path::{
        Path,
        PathBuf,
    },
};
use tracing::{
    info,
    warn,
};

pub const DEFAULT_WALLET_DIR: &str = "~/.fuel/wallets";
const KEYSTORE_EXTENSION: &str = "wallet";
const MIN_MNEMONIC_WORDS: usize = 12;
const MAX_PASSWORD_ATTEMPTS: usize = 3;

/// A forc-wallet keystore file on disk.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct KeystoreEntry {
    pub name: String,
    pub path: PathBuf,
}

/// Directory holding forc-wallet keystores, `~/.fuel/wallets` unless given.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct KeystoreDir {
    path: PathBuf,
}

impl KeystoreDir {
    /// Expands `~` and `$VARS` in `dir`, falling back to the forc default.
    pub fn resolve(dir: Option<&str>) -> Result<Self> {
        let raw = dir.unwrap_or(DEFAULT_WALLET_DIR);
        let expanded = shellexpand::full(raw)
            .wrap_err_with(|| format!("Cannot expand wallet directory '{raw}'"))?;
        Ok(Self::at(expanded.as_ref()))
    }

    pub fn at(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Keystores sorted by name; a missing directory has none.
    pub fn entries(&self) -> Result<Vec<KeystoreEntry>> {
        if !self.path.is_dir() {
            return Ok(Vec::new());
        }
        let listing = fs::read_dir(&self.path).wrap_err_with(|| {
            format!("Failed to read wallet directory {}", self.path.display())
        })?;
        let mut entries = Vec::new();
        for item in listing {
            let path = item.wrap_err("Failed to read wallet entry")?.path();
            if let Some(name) = keystore_name(&path) {
                entries.push(KeystoreEntry { name, path });
            }
        }
        entries.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(entries)
    }

    pub fn open(&self, name: &str) -> Result<KeystoreEntry> {
        let entries = self.entries()?;
        if let Some(entry) = entries.iter().find(|e| e.name == name) {
            return Ok(entry.clone());
        }
        let known = if entries.is_empty() {
            "none".to_string()
        } else {
            entries.iter().map(|e| e.name.as_str()).join(", ")
        };
        Err(eyre!(
            "Wallet '{name}' not found in {} (available: {known})",
            self.path.display()
        ))
    }
}

fn keystore_name(path: &Path) -> Option<String> {
    if !path.is_file() || path.extension()? != KEYSTORE_EXTENSION {
        return None;
    }
    match path.file_stem()?.to_str() {
        Some(stem) => Some(stem.to_owned()),
        None => {
            warn!(?path, "skipping keystore with a non UTF-8 name");
            None
        }
    }
}

/// Prompts for the keystore password, allowing a few attempts, and builds
/// a signing wallet.
pub fn unlock_keystore(entry: &KeystoreEntry, provider: &Provider) -> Result<Wallet> {
    let prompt = format!("Enter password for wallet '{}': ", entry.name);
    let mut attempt = 1;
    let secret = loop {
        let password = prompt_password(&prompt).wrap_err("Failed to read wallet password")?;
        match decrypt_key(&entry.path, password.as_bytes()) {
            Ok(secret) => break secret,
            Err(err) if attempt < MAX_PASSWORD_ATTEMPTS => {
                warn!(wallet = %entry.name, attempt, error = %err, "keystore unlock failed");
                eprintln!("Wrong password, try again.");
                attempt += 1;
            }
            Err(_) => {
                return Err(eyre!(
                    "Could not unlock wallet '{}' after {MAX_PASSWORD_ATTEMPTS} attempts",
                    entry.name
                ));
            }
        }
    };
    let secret_key = secret_key_from_material(&secret)
        .wrap_err_with(|| format!("Wallet '{}' could not be unlocked", entry.name))?;
    info!(wallet = %entry.name, "wallet unlocked");
    Ok(Wallet::new(
        PrivateKeySigner::new(secret_key),
        provider.clone(),
    ))
}

/// Keystores hold either a raw 32 byte key or a mnemonic phrase.
fn secret_key_from_material(secret: &[u8]) -> Result<SecretKey> {
    if let Ok(secret_key) = SecretKey::try_from(secret) {
        return Ok(secret_key);
    }
    if let Ok(mnemonic) = std::str::from_utf8(secret)
        && mnemonic.split_whitespace().count() >= MIN_MNEMONIC_WORDS
    {
        return Ok(SecretKey::new_from_mnemonic_phrase_with_path(
            mnemonic,
            DEFAULT_DERIVATION_PATH,
        )?);
    }
    Err(eyre!("unsupported key material"))
}

#[cfg(test)]
mod tests {
    #![allow(non_snake_case)]
    use super::*;
    use tempdir::TempDir;

    #[test]
    fn entries__only_returns_wallet_files_sorted_by_name() {
        // given
        let dir = TempDir::new("wallets").unwrap();
        fs::write(dir.path().join("zed.wallet"), "{}").unwrap();
        fs::write(dir.path().join("alice.wallet"), "{}").unwrap();
        fs::write(dir.path().join("notes.txt"), "").unwrap();
        fs::create_dir(dir.path().join("nested.wallet")).unwrap();

        // when
        let names: Vec<String> = KeystoreDir::at(dir.path())
            .entries()
            .unwrap()
            .into_iter()
            .map(|w| w.name)
            .collect();

        // then
        assert_eq!(names, vec!["alice".to_string(), "zed".to_string()]);
    }

    #[test]
    fn open__names_the_available_wallets_when_missing() {
        // given
        let dir = TempDir::new("wallets").unwrap();
        fs::write(dir.path().join("alice.wallet"), "{}").unwrap();
        fs::write(dir.path().join("carol.wallet"), "{}").unwrap();

        // when
        let err = KeystoreDir::at(dir.path()).open("bob").unwrap_err();

        // then
        let message = err.to_string();
        assert!(message.contains("Wallet 'bob' not found"));
        assert!(message.contains("available: alice, carol"));
    }

    #[test]
    fn open__finds_the_named_keystore() {
        let dir = TempDir::new("wallets").unwrap();
        fs::write(dir.path().join("alice.wallet"), "{}").unwrap();
        let entry = KeystoreDir::at(dir.path()).open("alice").unwrap();
        assert_eq!(entry.path, dir.path().join("alice.wallet"));
    }

    #[test]
    fn entries__missing_directory_is_empty() {
        let dir = TempDir::new("wallets").unwrap();
        let missing = KeystoreDir::at(dir.path().join("absent"));
        assert!(missing.entries().unwrap().is_empty());
        assert!(missing.open("alice").unwrap_err().to_string().contains("available: none"));
    }

    #[test]
    fn resolve__keeps_explicit_paths() {
        let dir = KeystoreDir::resolve(Some("/tmp/keys")).unwrap();
        assert_eq!(dir.path(), Path::new("/tmp/keys"));
    }

    #[test]
    fn resolve__rejects_unknown_variables() {
        assert!(KeystoreDir::resolve(Some("$CRYPTO_ROULETTE_UNSET_DIR/keys")).is_err());
    }

    #[test]
    fn secret_key_from_material__accepts_raw_keys_and_rejects_short_text() {
        assert!(secret_key_from_material(&[7u8; 32]).is_ok());
        assert!(secret_key_from_material(b"two words").is_err());
    }
}
