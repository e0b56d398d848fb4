//! Configuration loading from files and environment.

use crate::{Config, ConfigError};
use auction_types::{is_hex_address, is_http_url};
use regex::Regex;
use std::env;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// On-disk format, picked from the file extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Format {
	Toml,
	Json,
	Yaml,
}

/// Configuration loader with environment variable substitution.
pub struct ConfigLoader {
	file_path: Option<PathBuf>,
	env_prefix: String,
}

impl Default for ConfigLoader {
	fn default() -> Self {
		Self::new()
	}
}

impl ConfigLoader {
	pub fn new() -> Self {
		Self {
			file_path: None,
			env_prefix: "AUCTION_".to_string(),
		}
	}

	pub fn with_file<P: AsRef<Path>>(mut self, path: P) -> Self {
		self.file_path = Some(path.as_ref().to_path_buf());
		self
	}

	pub fn with_env_prefix(mut self, prefix: impl Into<String>) -> Self {
		self.env_prefix = prefix.into();
		self
	}

	/// Reads, substitutes, parses, overrides and validates the configuration.
	pub async fn load(&self) -> Result<Config, ConfigError> {
		let path = self.file_path.as_ref().ok_or_else(|| {
			ConfigError::FileNotFound("No configuration file specified".to_string())
		})?;
		info!("Loading configuration from {:?}", path);

		if !tokio::fs::try_exists(path).await? {
			return Err(ConfigError::FileNotFound(path.display().to_string()));
		}
		let content = tokio::fs::read_to_string(path).await?;

		let format = match path.extension().and_then(|s| s.to_str()) {
			Some("toml") => Format::Toml,
			Some("json") => Format::Json,
			Some("yaml") | Some("yml") => Format::Yaml,
			_ => {
				return Err(ConfigError::ParseError(format!(
					"Unsupported config format: {:?}",
					path
				)))
			}
		};

		let mut config = Self::parse(&substitute_env_vars(&content)?, format)?;
		self.apply_env_overrides(&mut config)?;
		validate_config(&config)?;
		Ok(config)
	}

	/// Parses and validates a TOML document without touching the filesystem.
	pub fn from_toml_str(content: &str) -> Result<Config, ConfigError> {
		let config = Self::parse(&substitute_env_vars(content)?, Format::Toml)?;
		validate_config(&config)?;
		Ok(config)
	}

	fn parse(content: &str, format: Format) -> Result<Config, ConfigError> {
		match format {
			Format::Toml => toml::from_str(content).map_err(|e| ConfigError::ParseError(e.to_string())),
			Format::Json => {
				serde_json::from_str(content).map_err(|e| ConfigError::ParseError(e.to_string()))
			}
			Format::Yaml => {
				serde_yaml::from_str(content).map_err(|e| ConfigError::ParseError(e.to_string()))
			}
		}
	}

	fn apply_env_overrides(&self, config: &mut Config) -> Result<(), ConfigError> {
		if let Ok(log_level) = env::var(format!("{}LOG_LEVEL", self.env_prefix)) {
			debug!("Overriding log level from environment");
			config.relay.log_level = log_level;
		}

		if let Ok(port) = env::var(format!("{}API_PORT", self.env_prefix)) {
			let port = port
				.parse()
				.map_err(|e| ConfigError::ValidationError(format!("Invalid API port: {}", e)))?;
			if let Some(api) = config.api.as_mut() {
				api.port = port;
			}
		}

		if let Ok(url) = env::var(format!("{}PAYMASTER_URL", self.env_prefix)) {
			debug!("Overriding paymaster URL from environment");
			config.sponsor = Some(crate::SponsorConfig { paymaster_url: url });
		}

		Ok(())
	}
}

/// Replaces `${VAR_NAME}` references with environment values.
///
/// Comment lines are left untouched, so commented-out sections may keep their
/// placeholders.
fn substitute_env_vars(content: &str) -> Result<String, ConfigError> {
	let re = Regex::new(r"\$\{([^}]+)\}").map_err(|e| ConfigError::ParseError(e.to_string()))?;
	let mut result = String::with_capacity(content.len());

	for line in content.split_inclusive('\n') {
		if line.trim_start().starts_with('#') {
			result.push_str(line);
			continue;
		}

		let mut substituted = line.to_string();
		for cap in re.captures_iter(line) {
			let var_name = &cap[1];
			let value = env::var(var_name)
				.map_err(|_| ConfigError::EnvVarNotFound(var_name.to_string()))?;
			substituted = substituted.replace(&cap[0], &value);
		}
		result.push_str(&substituted);
	}

	Ok(result)
}

fn validate_config(config: &Config) -> Result<(), ConfigError> {
	let fail = |msg: String| Err(ConfigError::ValidationError(msg));

	if config.network.chain_id == 0 {
		return fail("network.chain_id must be non-zero".to_string());
	}
	if !is_http_url(&config.network.rpc_url) {
		return fail("network.rpc_url must start with http:// or https://".to_string());
	}
	if !is_hex_address(&config.auction.house_address) {
		return fail(format!(
			"auction.house_address is not a valid address: {}",
			config.auction.house_address
		));
	}
	if config.auction.poll_interval_secs == 0 {
		return fail("auction.poll_interval_secs must be non-zero".to_string());
	}
	if let Some(dao) = &config.auction.dao_address {
		if !is_hex_address(dao) {
			return fail(format!("auction.dao_address is not a valid address: {}", dao));
		}
	}

	if let Some(indexer) = &config.indexer {
		if !is_http_url(&indexer.url) {
			return fail("indexer.url must start with http:// or https://".to_string());
		}
		if config.auction.dao_address.is_none() {
			return fail("indexer requires auction.dao_address".to_string());
		}
	}

	if let Some(sponsor) = &config.sponsor {
		if !is_http_url(&sponsor.paymaster_url) {
			return fail("sponsor.paymaster_url must start with http:// or https://".to_string());
		}
	}

	if !is_http_url(&config.account.wallet_rpc_url) {
		return fail("account.wallet_rpc_url must start with http:// or https://".to_string());
	}
	if let Some(address) = &config.account.address {
		if !is_hex_address(address) {
			return fail(format!("account.address is not a valid address: {}", address));
		}
	}

	if config.delivery.poll_interval_ms == 0 {
		return fail("delivery.poll_interval_ms must be non-zero".to_string());
	}
	if config.delivery.confirmation_timeout_ms <= config.delivery.poll_interval_ms {
		return fail("delivery.confirmation_timeout_ms must exceed poll_interval_ms".to_string());
	}

	Ok(())
}
