//! Per-variant settings: compiled-in defaults for the doodle variant,
//! overridable by an optional TOML file and environment variables.

use std::{fs, path::PathBuf};

use anyhow::{Context, Result};
use chain_rpc::ContractSpec;
use mint_flow::MintFlowConfig;
use serde::Deserialize;
use shared::domain::{Address, ChainId};
use url::Url;

const SETTINGS_FILE_NAME: &str = "doodle_mint.toml";

#[derive(Debug, Clone)]
pub struct VariantSettings {
    pub rpc_url: String,
    pub contract_address: String,
    pub required_chain_id: String,
    pub total_supply: u64,
    pub mint_signature: String,
    pub total_minted_signature: String,
    pub mint_event_signature: String,
    pub marketplace_base_url: String,
    pub collection_slug: String,
    pub explorer_base_url: String,
    pub creator_handle: String,
}

impl Default for VariantSettings {
    fn default() -> Self {
        Self {
            rpc_url: "http://127.0.0.1:8545".into(),
            contract_address: "0xe606a90181235ecA2af8fA1D69e5e1659eDc1501".into(),
            // Sepolia
            required_chain_id: "0xaa36a7".into(),
            total_supply: 50,
            mint_signature: "mintDoodle(string)".into(),
            total_minted_signature: "getTotalMinted()".into(),
            mint_event_signature: "DoodleMinted(address,uint256)".into(),
            marketplace_base_url: "https://testnets.opensea.io/assets".into(),
            collection_slug: "doodle-nft-collection".into(),
            explorer_base_url: "https://sepolia.etherscan.io".into(),
            creator_handle: "kuriakinzeng".into(),
        }
    }
}

#[derive(Debug, Default, Deserialize)]
struct TomlOverrides {
    rpc_url: Option<String>,
    contract_address: Option<String>,
    required_chain_id: Option<String>,
    total_supply: Option<u64>,
    mint_signature: Option<String>,
    total_minted_signature: Option<String>,
    mint_event_signature: Option<String>,
    marketplace_base_url: Option<String>,
    collection_slug: Option<String>,
    explorer_base_url: Option<String>,
    creator_handle: Option<String>,
}

pub fn load_settings() -> VariantSettings {
    let mut settings = VariantSettings::default();

    for path in candidate_settings_files() {
        if let Ok(raw) = fs::read_to_string(&path) {
            apply_toml(&mut settings, &raw);
            break;
        }
    }

    apply_env(&mut settings, |key| std::env::var(key).ok());
    settings
}

fn candidate_settings_files() -> Vec<PathBuf> {
    let mut candidates = vec![PathBuf::from(SETTINGS_FILE_NAME)];
    if let Some(home) = dirs::home_dir() {
        candidates.push(home.join(".doodle_mint").join(SETTINGS_FILE_NAME));
    }
    candidates
}

fn apply_toml(settings: &mut VariantSettings, raw: &str) {
    let Ok(overrides) = toml::from_str::<TomlOverrides>(raw) else {
        return;
    };
    let TomlOverrides {
        rpc_url,
        contract_address,
        required_chain_id,
        total_supply,
        mint_signature,
        total_minted_signature,
        mint_event_signature,
        marketplace_base_url,
        collection_slug,
        explorer_base_url,
        creator_handle,
    } = overrides;

    if let Some(v) = rpc_url {
        settings.rpc_url = v;
    }
    if let Some(v) = contract_address {
        settings.contract_address = v;
    }
    if let Some(v) = required_chain_id {
        settings.required_chain_id = v;
    }
    if let Some(v) = total_supply {
        settings.total_supply = v;
    }
    if let Some(v) = mint_signature {
        settings.mint_signature = v;
    }
    if let Some(v) = total_minted_signature {
        settings.total_minted_signature = v;
    }
    if let Some(v) = mint_event_signature {
        settings.mint_event_signature = v;
    }
    if let Some(v) = marketplace_base_url {
        settings.marketplace_base_url = v;
    }
    if let Some(v) = collection_slug {
        settings.collection_slug = v;
    }
    if let Some(v) = explorer_base_url {
        settings.explorer_base_url = v;
    }
    if let Some(v) = creator_handle {
        settings.creator_handle = v;
    }
}

fn apply_env<F>(settings: &mut VariantSettings, lookup: F)
where
    F: Fn(&str) -> Option<String>,
{
    if let Some(v) = lookup("DOODLE_MINT__RPC_URL") {
        settings.rpc_url = v;
    }
    if let Some(v) = lookup("DOODLE_MINT__CONTRACT_ADDRESS") {
        settings.contract_address = v;
    }
    if let Some(v) = lookup("DOODLE_MINT__REQUIRED_CHAIN_ID") {
        settings.required_chain_id = v;
    }
    if let Some(v) = lookup("DOODLE_MINT__MARKETPLACE_BASE_URL") {
        settings.marketplace_base_url = v;
    }
    if let Some(v) = lookup("DOODLE_MINT__EXPLORER_BASE_URL") {
        settings.explorer_base_url = v;
    }
}

impl VariantSettings {
    pub fn rpc_endpoint(&self) -> Result<Url> {
        Url::parse(&self.rpc_url).with_context(|| format!("invalid rpc url '{}'", self.rpc_url))
    }

    pub fn mint_flow_config(&self, requires_doodle: bool) -> Result<MintFlowConfig> {
        let contract_address: Address = self
            .contract_address
            .parse()
            .with_context(|| format!("invalid contract address '{}'", self.contract_address))?;
        let required_chain: ChainId = self
            .required_chain_id
            .parse()
            .with_context(|| format!("invalid chain id '{}'", self.required_chain_id))?;
        Ok(MintFlowConfig {
            contract_address,
            required_chain,
            total_supply: self.total_supply,
            marketplace_base_url: self.marketplace_base_url.clone(),
            collection_slug: self.collection_slug.clone(),
            explorer_base_url: self.explorer_base_url.clone(),
            requires_doodle,
        })
    }

    pub fn contract_spec(&self) -> Result<ContractSpec> {
        let address: Address = self
            .contract_address
            .parse()
            .with_context(|| format!("invalid contract address '{}'", self.contract_address))?;
        Ok(ContractSpec {
            address,
            mint_signature: self.mint_signature.clone(),
            total_minted_signature: self.total_minted_signature.clone(),
            mint_event_signature: self.mint_event_signature.clone(),
        })
    }

    pub fn creator_link(&self) -> String {
        format!("https://github.com/{}", self.creator_handle)
    }
}
