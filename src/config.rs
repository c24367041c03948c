//! Startup configuration.
//!
//! Everything the core needs from the process environment is collected into
//! one immutable [`Config`] value, built once in `main` and passed down.

use std::{ffi::OsString, fmt, path::Path, str::FromStr, time::Duration};

use alloy::{
    primitives::{address, Address},
    signers::local::PrivateKeySigner,
};
use tracing::{error, warn};

use crate::{
    error::{Result, WalletError},
    utils::{is_valid_private_key, DEFAULT_EXPLORER_TX_URL, DEFAULT_RPC_URL, SEPOLIA_CHAIN_ID},
};

/// Token and contract addresses of the deployment the bot operates against.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Contracts {
    pub usdc: Address,
    pub r2usd: Address,
    pub sr2usd: Address,
    pub forward_swap: Address,
    pub reverse_swap: Address,
    pub staking: Address,
}

impl Default for Contracts {
    fn default() -> Self {
        Self {
            usdc: address!("ef84994ef411c4981328ffce5fda41cd3803fae4"),
            r2usd: address!("20c54c5f742f123abb49a982bfe0af47edb38756"),
            sr2usd: address!("bd6b25c4132f09369c354bee0f7be777d7d434fa"),
            // The R2USD token contract doubles as the USDC -> R2USD swap entry point
            forward_swap: address!("20c54c5f742f123abb49a982bfe0af47edb38756"),
            reverse_swap: address!("07abd582df3d3472aa687a0489729f9f0424b1e3"),
            // sR2USD is minted by its own token contract
            staking: address!("bd6b25c4132f09369c354bee0f7be777d7d434fa"),
        }
    }
}

/// An outbound HTTP proxy parsed from a `[scheme://][user[:pass]@]host:port` line.
#[derive(Clone, PartialEq, Eq)]
pub struct ProxyDescriptor {
    pub host: String,
    pub port: u16,
    pub auth: Option<(String, String)>,
}

impl ProxyDescriptor {
    pub fn to_url(&self) -> String {
        match &self.auth {
            Some((user, pass)) => format!("http://{}:{}@{}:{}", user, pass, self.host, self.port),
            None => format!("http://{}:{}", self.host, self.port),
        }
    }
}

impl FromStr for ProxyDescriptor {
    type Err = WalletError;

    fn from_str(line: &str) -> Result<Self> {
        let line = line.trim();
        let rest = line.split_once("://").map_or(line, |(_, rest)| rest);
        let (auth, host_port) = match rest.rsplit_once('@') {
            Some((auth, host_port)) => (Some(auth), host_port),
            None => (None, rest),
        };

        let (host, port) = host_port
            .split_once(':')
            .ok_or_else(|| WalletError::InvalidInput(format!("proxy '{line}' has no port")))?;
        let port = port
            .trim_end_matches('/')
            .parse::<u16>()
            .map_err(|_| WalletError::InvalidInput(format!("proxy '{line}' has an invalid port")))?;
        if host.is_empty() {
            return Err(WalletError::InvalidInput(format!("proxy '{line}' has no host")));
        }

        let auth = auth.map(|auth| match auth.split_once(':') {
            Some((user, pass)) => (user.to_string(), pass.to_string()),
            None => (auth.to_string(), String::new()),
        });

        Ok(Self {
            host: host.to_string(),
            port,
            auth,
        })
    }
}

// Credentials stay out of logs.
impl fmt::Debug for ProxyDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.host, self.port)
    }
}

impl fmt::Display for ProxyDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// Configuration for the bot loaded from environment variables
#[derive(Debug, Clone)]
pub struct Config {
    pub rpc_url: String,
    pub chain_id: u64,
    /// Prefix the transaction hash is appended to for explorer links
    pub explorer_tx_url: String,
    pub signers: Vec<PrivateKeySigner>,
    pub proxies: Vec<ProxyDescriptor>,
    pub contracts: Contracts,
    /// Upper bound on how long a submitted transaction is awaited
    pub confirmation_timeout: Duration,
    /// Consecutive receipt-query failures tolerated while waiting
    pub max_retries: u32,
    /// Base delay in milliseconds between receipt polls
    pub retry_base_delay_ms: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            rpc_url: DEFAULT_RPC_URL.to_string(),
            chain_id: SEPOLIA_CHAIN_ID,
            explorer_tx_url: DEFAULT_EXPLORER_TX_URL.to_string(),
            signers: Vec::new(),
            proxies: Vec::new(),
            contracts: Contracts::default(),
            confirmation_timeout: Duration::from_secs(180),
            max_retries: 3,
            retry_base_delay_ms: 1000,
        }
    }
}

impl Config {
    /// Creates a new Config instance by loading values from environment variables.
    /// This should be called only once during startup.
    pub fn from_env() -> Result<Self> {
        dotenv::dotenv().ok();
        let defaults = Self::default();

        let signers = load_signers(utf8_vars(std::env::vars_os()))?;

        let proxy_file = dotenv::var("PROXY_FILE").unwrap_or_else(|_| "proxies.txt".to_string());
        let proxies = load_proxies(Path::new(&proxy_file))?;

        let chain_id = match dotenv::var("CHAIN_ID") {
            Ok(v) => v.parse::<u64>().map_err(|_| {
                WalletError::InvalidEnvVar("CHAIN_ID must be a positive integer".to_string())
            })?,
            Err(_) => defaults.chain_id,
        };

        let confirmation_timeout = match dotenv::var("CONFIRMATION_TIMEOUT") {
            Ok(v) => humantime::parse_duration(&v).map_err(|e| {
                WalletError::InvalidEnvVar(format!("CONFIRMATION_TIMEOUT: {}", e))
            })?,
            Err(_) => defaults.confirmation_timeout,
        };

        let max_retries = dotenv::var("MAX_RETRIES")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(defaults.max_retries);

        let retry_base_delay_ms = dotenv::var("RETRY_BASE_DELAY_MS")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(defaults.retry_base_delay_ms);

        Ok(Self {
            rpc_url: dotenv::var("RPC_URL").unwrap_or(defaults.rpc_url),
            chain_id,
            explorer_tx_url: dotenv::var("EXPLORER_TX_URL").unwrap_or(defaults.explorer_tx_url),
            signers,
            proxies,
            contracts: defaults.contracts,
            confirmation_timeout,
            max_retries,
            retry_base_delay_ms,
        })
    }
}

/// Environment entries whose name and value are both valid UTF-8.
pub fn utf8_vars(
    vars: impl IntoIterator<Item = (OsString, OsString)>,
) -> impl Iterator<Item = (String, String)> {
    vars.into_iter()
        .filter_map(|(name, value)| Some((name.into_string().ok()?, value.into_string().ok()?)))
}

/// Collects signers from `PRIVATE_KEY_*` variables, ordered by variable name.
/// Invalid keys are logged and skipped; no valid key at all is fatal.
pub fn load_signers(
    vars: impl IntoIterator<Item = (String, String)>,
) -> Result<Vec<PrivateKeySigner>> {
    let mut entries: Vec<(String, String)> = vars
        .into_iter()
        .filter(|(name, value)| name.starts_with("PRIVATE_KEY_") && !value.trim().is_empty())
        .collect();
    entries.sort_by(|a, b| a.0.cmp(&b.0));

    let mut signers = Vec::with_capacity(entries.len());
    for (name, value) in entries {
        if !is_valid_private_key(&value) {
            error!(var = %name, "Invalid private key format: must be 64 hex characters");
            continue;
        }
        match value.trim().parse::<PrivateKeySigner>() {
            Ok(signer) => signers.push(signer),
            Err(e) => error!(var = %name, error = %e, "Rejected private key"),
        }
    }

    if signers.is_empty() {
        return Err(WalletError::NoValidKeys);
    }
    Ok(signers)
}

/// Reads one proxy per non-empty line. A missing file means direct connections.
pub fn load_proxies(path: &Path) -> Result<Vec<ProxyDescriptor>> {
    if !path.exists() {
        warn!(file = %path.display(), "Proxy file not found, connecting directly");
        return Ok(Vec::new());
    }
    let contents = std::fs::read_to_string(path)?;
    Ok(parse_proxy_list(&contents))
}

pub fn parse_proxy_list(contents: &str) -> Vec<ProxyDescriptor> {
    contents
        .lines()
        .filter(|line| !line.trim().is_empty())
        .filter_map(|line| match line.parse::<ProxyDescriptor>() {
            Ok(proxy) => Some(proxy),
            Err(e) => {
                warn!(error = %e, "Skipping proxy entry");
                None
            }
        })
        .collect()
}
