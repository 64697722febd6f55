use chrono::Utc;
use color_eyre::eyre::{
    Result,
    WrapErr,
    eyre,
};
use fuels::prelude::ContractId;
use serde::{
    Deserialize,
    Serialize,
};
use std::{
    fmt,
    fs,
    io::Write,
    path::{
        Path,
        PathBuf,
    },
    str::FromStr,
};

pub const DEPLOYMENTS_ROOT: &str = ".deployments";
const DEPLOYMENTS_FILE: &str = "deployments.json";

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum DeploymentEnv {
    Dev,
    Test,
    Local,
}

impl DeploymentEnv {
    pub fn dir_name(self) -> &'static str {
        match self {
            DeploymentEnv::Dev => "dev",
            DeploymentEnv::Test => "test",
            DeploymentEnv::Local => "local",
        }
    }
}

impl fmt::Display for DeploymentEnv {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            DeploymentEnv::Dev => "Devnet",
            DeploymentEnv::Test => "Testnet",
            DeploymentEnv::Local => "Local",
        };
        write!(f, "{name}")
    }
}

/// Where the roulette and lottery contracts of one network live.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeploymentRecord {
    pub deployed_at: String,
    pub roulette_contract_id: String,
    pub lottery_contract_id: String,
    pub network_url: String,
    #[serde(default)]
    pub deployment_block_height: Option<u32>,
}

impl DeploymentRecord {
    pub fn new(
        roulette_contract_id: impl Into<String>,
        lottery_contract_id: impl Into<String>,
        network_url: impl Into<String>,
        deployment_block_height: Option<u32>,
    ) -> Self {
        Self {
            deployed_at: Utc::now().to_rfc3339(),
            roulette_contract_id: roulette_contract_id.into(),
            lottery_contract_id: lottery_contract_id.into(),
            network_url: network_url.into(),
            deployment_block_height,
        }
    }

    pub fn roulette_id(&self) -> Result<ContractId> {
        parse_contract_id(&self.roulette_contract_id)
    }

    pub fn lottery_id(&self) -> Result<ContractId> {
        parse_contract_id(&self.lottery_contract_id)
    }
}

pub fn parse_contract_id(raw: &str) -> Result<ContractId> {
    ContractId::from_str(raw.trim())
        .map_err(|e| eyre!("Invalid contract id '{raw}': {e}"))
}

#[derive(Debug)]
pub struct DeploymentStore {
    path: PathBuf,
}

impl DeploymentStore {
    pub fn new(env: DeploymentEnv) -> Result<Self> {
        Self::in_root(DEPLOYMENTS_ROOT, env)
    }

    pub fn in_root(root: impl AsRef<Path>, env: DeploymentEnv) -> Result<Self> {
        let path = ensure_store(root.as_ref(), env)?;
        Ok(Self { path })
    }

    pub fn load(&self) -> Result<Vec<DeploymentRecord>> {
        read_records(&self.path)
    }

    /// Most recently appended record, if any.
    pub fn latest(&self) -> Result<Option<DeploymentRecord>> {
        Ok(self.load()?.pop())
    }

    pub fn append(&self, record: DeploymentRecord) -> Result<()> {
        let mut records = self.load()?;
        records.push(record);
        write_records(&self.path, &records)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

pub fn ensure_structure() -> Result<()> {
    for env in [
        DeploymentEnv::Dev,
        DeploymentEnv::Test,
        DeploymentEnv::Local,
    ] {
        let _ = ensure_store(Path::new(DEPLOYMENTS_ROOT), env)?;
    }
    Ok(())
}

fn ensure_store(root: &Path, env: DeploymentEnv) -> Result<PathBuf> {
    let env_dir = root.join(env.dir_name());
    if !env_dir.exists() {
        fs::create_dir_all(&env_dir).wrap_err_with(|| {
            format!("Failed to create {} directory", env_dir.display())
        })?;
    }

    let file_path = env_dir.join(DEPLOYMENTS_FILE);
    if !file_path.exists() {
        let mut file = fs::File::create(&file_path).wrap_err_with(|| {
            format!(
                "Failed to create deployment record file for {} at {:?}",
                env, file_path
            )
        })?;
        file.write_all(b"[]").wrap_err_with(|| {
            format!("Failed to initialize deployment record file for {}", env)
        })?;
    }

    Ok(file_path)
}

fn read_records(path: impl AsRef<Path>) -> Result<Vec<DeploymentRecord>> {
    let data = fs::read(path.as_ref()).wrap_err("Failed to read deployment records")?;
    if data.is_empty() {
        return Ok(Vec::new());
    }
    let records = serde_json::from_slice::<Vec<DeploymentRecord>>(&data)
        .wrap_err("Failed to parse deployment records JSON")?;
    Ok(records)
}

fn write_records(path: impl AsRef<Path>, records: &[DeploymentRecord]) -> Result<()> {
    let json = serde_json::to_vec_pretty(records)
        .wrap_err("Failed to serialize deployment records")?;
    fs::write(path.as_ref(), json).wrap_err("Failed to write deployment records")?;
    Ok(())
}

#[cfg(test)]
mod tests {
    #![allow(non_snake_case)]
    use super::*;
    use tempdir::TempDir;

    const ROULETTE: &str =
        "0x1111111111111111111111111111111111111111111111111111111111111111";
    const LOTTERY: &str =
        "2222222222222222222222222222222222222222222222222222222222222222";

    #[test]
    fn in_root__creates_an_empty_record_file() {
        // given
        let dir = TempDir::new("deployments").unwrap();

        // when
        let store = DeploymentStore::in_root(dir.path(), DeploymentEnv::Local).unwrap();

        // then
        assert!(store.path().ends_with("local/deployments.json"));
        assert!(store.load().unwrap().is_empty());
        assert_eq!(store.latest().unwrap(), None);
    }

    #[test]
    fn latest__returns_the_last_appended_record() {
        // given
        let dir = TempDir::new("deployments").unwrap();
        let store = DeploymentStore::in_root(dir.path(), DeploymentEnv::Test).unwrap();
        store
            .append(DeploymentRecord::new(LOTTERY, ROULETTE, "http://old", None))
            .unwrap();
        store
            .append(DeploymentRecord::new(ROULETTE, LOTTERY, "http://new", Some(42)))
            .unwrap();

        // when
        let latest = store.latest().unwrap().unwrap();

        // then
        assert_eq!(latest.network_url, "http://new");
        assert_eq!(latest.deployment_block_height, Some(42));
        assert_eq!(latest.roulette_id().unwrap(), ContractId::from([0x11; 32]));
        assert_eq!(latest.lottery_id().unwrap(), ContractId::from([0x22; 32]));
    }

    #[test]
    fn load__accepts_records_without_block_height() {
        // given
        let dir = TempDir::new("deployments").unwrap();
        let store = DeploymentStore::in_root(dir.path(), DeploymentEnv::Dev).unwrap();
        let json = format!(
            r#"[{{"deployed_at":"2025-01-01T00:00:00Z","roulette_contract_id":"{ROULETTE}","lottery_contract_id":"{LOTTERY}","network_url":"https://devnet.fuel.network"}}]"#
        );
        fs::write(store.path(), json).unwrap();

        // when
        let records = store.load().unwrap();

        // then
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].deployment_block_height, None);
    }

    #[test]
    fn parse_contract_id__rejects_garbage() {
        assert!(parse_contract_id("not-an-id").is_err());
    }
}
