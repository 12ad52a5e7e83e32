//! Configuração do servidor.
//!
//! Carregada do ambiente (e de um `.env`, se existir). Variáveis obrigatórias ausentes e
//! valores malformados são fatais.

use crate::logging::LogFormat;
use ethereum_types::Address;
use pitwall_core::{error::Result, utils::hex_to_address, Error};
use pitwall_rpc::{signer::parse_wallet, FeedMode};
use std::fmt;
use std::net::SocketAddr;
use std::str::FromStr;
use std::time::Duration;

#[derive(Clone)]
pub struct ServerConfig {
    /// WebSocket do node: feed, busca e envio reativo
    pub wss_url: String,
    /// Node usado pelo relay para o bloco alvo; `None` reaproveita `wss_url`
    pub rpc_url: Option<String>,
    pub private_key: String,
    pub target_token: Address,
    pub router: Address,
    pub relay_url: String,
    pub listen_addr: SocketAddr,
    pub risk_medium_gwei: f64,
    pub risk_high_gwei: f64,
    pub reactive_mode: bool,
    pub reaction_max_gwei: f64,
    pub reaction_gas_increment_gwei: f64,
    pub reaction_gas_limit: u64,
    pub reaction_deadline_secs: u64,
    pub feed_mode: FeedMode,
    pub event_history: usize,
    pub observer_buffer: usize,
    pub dedup_cache_size: usize,
    /// Candidatos em processamento simultâneo no watcher
    pub max_in_flight: usize,
    pub fetch_timeout: Duration,
    pub submit_timeout: Duration,
    pub relay_timeout: Duration,
    pub max_reconnect_attempts: u32,
    pub reconnect_delay: Duration,
    pub log_format: LogFormat,
}

impl fmt::Debug for ServerConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServerConfig")
            .field("wss_url", &self.wss_url)
            .field("rpc_url", &self.rpc_url)
            .field("private_key", &"<redacted>")
            .field("target_token", &self.target_token)
            .field("router", &self.router)
            .field("relay_url", &self.relay_url)
            .field("listen_addr", &self.listen_addr)
            .field("risk_medium_gwei", &self.risk_medium_gwei)
            .field("risk_high_gwei", &self.risk_high_gwei)
            .field("reactive_mode", &self.reactive_mode)
            .field("reaction_max_gwei", &self.reaction_max_gwei)
            .field("reaction_gas_increment_gwei", &self.reaction_gas_increment_gwei)
            .field("reaction_gas_limit", &self.reaction_gas_limit)
            .field("reaction_deadline_secs", &self.reaction_deadline_secs)
            .field("feed_mode", &self.feed_mode)
            .field("event_history", &self.event_history)
            .field("observer_buffer", &self.observer_buffer)
            .field("dedup_cache_size", &self.dedup_cache_size)
            .field("max_in_flight", &self.max_in_flight)
            .field("fetch_timeout", &self.fetch_timeout)
            .field("submit_timeout", &self.submit_timeout)
            .field("relay_timeout", &self.relay_timeout)
            .field("max_reconnect_attempts", &self.max_reconnect_attempts)
            .field("reconnect_delay", &self.reconnect_delay)
            .field("log_format", &self.log_format)
            .finish()
    }
}

impl ServerConfig {
    /// Lê a configuração do ambiente do processo
    pub fn from_env() -> Result<Self> {
        let _ = dotenvy::dotenv();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Lê a configuração a partir de uma função de consulta
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let env = Env(lookup);

        let wss_url = env.required("SEPOLIA_WSS_URL")?;
        let private_key = env.required("WALLET_PRIVATE_KEY")?;
        parse_wallet(&private_key)?;
        let target_token = env.address("TARGET_TOKEN_ADDRESS")?;
        let router = env.address("ROUTER_ADDRESS")?;
        let relay_url = env.required("RELAY_URL")?;

        let config = Self {
            wss_url,
            rpc_url: env.optional("SEPOLIA_RPC_URL"),
            private_key,
            target_token,
            router,
            relay_url,
            listen_addr: env.parse_or("LISTEN_ADDR", SocketAddr::from(([0, 0, 0, 0], 8080)))?,
            risk_medium_gwei: env.parse_or("RISK_MEDIUM_GWEI", 10.0)?,
            risk_high_gwei: env.parse_or("RISK_HIGH_GWEI", 15.0)?,
            reactive_mode: env.parse_or("REACTIVE_MODE", false)?,
            reaction_max_gwei: env.parse_or("REACTION_MAX_GWEI", 15.0)?,
            reaction_gas_increment_gwei: env.parse_or("REACTION_GAS_INCREMENT_GWEI", 2.0)?,
            reaction_gas_limit: env.parse_or("REACTION_GAS_LIMIT", 300_000)?,
            reaction_deadline_secs: env.parse_or("REACTION_DEADLINE_SECS", 600)?,
            feed_mode: env.parse_or("FEED_MODE", FeedMode::Alchemy)?,
            event_history: env.parse_or("EVENT_HISTORY", 20)?,
            observer_buffer: env.parse_or("OBSERVER_BUFFER", 256)?,
            dedup_cache_size: env.parse_or("DEDUP_CACHE_SIZE", 10_000)?,
            max_in_flight: env.parse_or("MAX_IN_FLIGHT", 64)?,
            fetch_timeout: Duration::from_secs(env.parse_or("FETCH_TIMEOUT_SECS", 10)?),
            submit_timeout: Duration::from_secs(env.parse_or("SUBMIT_TIMEOUT_SECS", 15)?),
            relay_timeout: Duration::from_secs(env.parse_or("RELAY_TIMEOUT_SECS", 15)?),
            max_reconnect_attempts: env.parse_or("MAX_RECONNECT_ATTEMPTS", 5)?,
            reconnect_delay: Duration::from_secs(env.parse_or("RECONNECT_DELAY_SECS", 3)?),
            log_format: env.parse_or("LOG_FORMAT", LogFormat::Compact)?,
        };
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        if !self.wss_url.starts_with("ws") {
            return Err(Error::ConfigError(
                "SEPOLIA_WSS_URL deve ser um endpoint ws:// ou wss://".to_string(),
            ));
        }
        let gwei = [
            ("RISK_MEDIUM_GWEI", self.risk_medium_gwei),
            ("RISK_HIGH_GWEI", self.risk_high_gwei),
            ("REACTION_MAX_GWEI", self.reaction_max_gwei),
            ("REACTION_GAS_INCREMENT_GWEI", self.reaction_gas_increment_gwei),
        ];
        for (key, value) in gwei {
            if !value.is_finite() || value < 0.0 {
                return Err(Error::ConfigError(format!("{} deve ser um número não negativo", key)));
            }
        }
        if self.risk_medium_gwei > self.risk_high_gwei {
            return Err(Error::ConfigError(
                "RISK_MEDIUM_GWEI não pode exceder RISK_HIGH_GWEI".to_string(),
            ));
        }
        let sizes = [
            ("EVENT_HISTORY", self.event_history),
            ("OBSERVER_BUFFER", self.observer_buffer),
            ("DEDUP_CACHE_SIZE", self.dedup_cache_size),
            ("MAX_IN_FLIGHT", self.max_in_flight),
        ];
        for (key, value) in sizes {
            if value == 0 {
                return Err(Error::ConfigError(format!("{} deve ser maior que zero", key)));
            }
        }
        Ok(())
    }
}

struct Env<F>(F);

impl<F: Fn(&str) -> Option<String>> Env<F> {
    fn optional(&self, key: &str) -> Option<String> {
        (self.0)(key)
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
    }

    fn required(&self, key: &str) -> Result<String> {
        self.optional(key)
            .ok_or_else(|| Error::ConfigError(format!("variável obrigatória ausente: {}", key)))
    }

    fn address(&self, key: &str) -> Result<Address> {
        let raw = self.required(key)?;
        hex_to_address(&raw)
            .ok_or_else(|| Error::ConfigError(format!("{} não é um endereço válido: {}", key, raw)))
    }

    fn parse_or<T: FromStr>(&self, key: &str, default: T) -> Result<T> {
        match self.optional(key) {
            Some(raw) => raw
                .parse()
                .map_err(|_| Error::ConfigError(format!("valor inválido para {}: {}", key, raw))),
            None => Ok(default),
        }
    }
}
