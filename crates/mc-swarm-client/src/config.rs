use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

use mc_swarm_proto::packets::PROTOCOL_VERSION;

#[derive(Debug, Deserialize)]
pub struct SwarmConfig {
    pub server: ServerSection,
    #[serde(default)]
    pub bots: BotsSection,
    /// Explicit accounts. Bots beyond this list get generated offline names.
    #[serde(default)]
    pub accounts: Vec<AccountSection>,
    #[serde(default)]
    pub proxy: Option<ProxySection>,
    #[serde(default)]
    pub timeouts: TimeoutsSection,
    #[serde(default)]
    pub client: ClientSection,
    pub logging: LoggingSection,
}

#[derive(Debug, Deserialize)]
pub struct ServerSection {
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default = "default_protocol_version")]
    pub protocol_version: i32,
    #[serde(default)]
    pub intent: ConnectIntent,
}

fn default_port() -> u16 {
    25565
}

fn default_protocol_version() -> i32 {
    PROTOCOL_VERSION
}

/// What the bots do after the handshake.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConnectIntent {
    #[default]
    Login,
    Status,
}

#[derive(Debug, Deserialize)]
pub struct BotsSection {
    #[serde(default = "default_amount")]
    pub amount: usize,
    /// `{}` is replaced by the bot index, starting at 1.
    #[serde(default = "default_name_format")]
    pub name_format: String,
    /// Delay between two consecutive connects, in milliseconds.
    #[serde(default = "default_join_delay")]
    pub join_delay_ms: u64,
    /// Respawn immediately on death.
    #[serde(default = "default_true")]
    pub auto_respawn: bool,
    #[serde(default = "default_thread_prefix")]
    pub thread_prefix: String,
}

fn default_amount() -> usize {
    1
}

fn default_name_format() -> String {
    "Bot_{}".into()
}

fn default_join_delay() -> u64 {
    1000
}

fn default_true() -> bool {
    true
}

fn default_thread_prefix() -> String {
    "mc-swarm".into()
}

impl Default for BotsSection {
    fn default() -> Self {
        Self {
            amount: default_amount(),
            name_format: default_name_format(),
            join_delay_ms: default_join_delay(),
            auto_respawn: true,
            thread_prefix: default_thread_prefix(),
        }
    }
}

impl BotsSection {
    pub fn bot_name(&self, index: usize) -> String {
        self.name_format.replace("{}", &index.to_string())
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct AccountSection {
    pub name: String,
    /// Profile id; derived from the name for offline accounts when absent.
    #[serde(default)]
    pub uuid: Option<String>,
    /// Session token. Accounts without one join offline.
    #[serde(default)]
    pub access_token: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ProxySection {
    /// SOCKS5 proxy as `host:port`.
    pub address: String,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub password: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TimeoutsSection {
    #[serde(default = "default_connect_timeout")]
    pub connect_ms: u64,
    #[serde(default = "default_read_timeout")]
    pub read_ms: u64,
    #[serde(default = "default_write_timeout")]
    pub write_ms: u64,
}

fn default_connect_timeout() -> u64 {
    5000
}

fn default_read_timeout() -> u64 {
    30000
}

fn default_write_timeout() -> u64 {
    10000
}

impl Default for TimeoutsSection {
    fn default() -> Self {
        Self {
            connect_ms: default_connect_timeout(),
            read_ms: default_read_timeout(),
            write_ms: default_write_timeout(),
        }
    }
}

impl TimeoutsSection {
    pub fn connect(&self) -> Duration {
        Duration::from_millis(self.connect_ms)
    }

    pub fn read(&self) -> Duration {
        Duration::from_millis(self.read_ms)
    }

    pub fn write(&self) -> Duration {
        Duration::from_millis(self.write_ms)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ClientSection {
    #[serde(default = "default_brand")]
    pub brand: String,
    #[serde(default = "default_locale")]
    pub locale: String,
    #[serde(default = "default_view_distance")]
    pub view_distance: i8,
    /// Generated collision shape table (gzip JSON). The bundled table is
    /// used when unset.
    #[serde(default)]
    pub block_shapes: Option<PathBuf>,
}

fn default_brand() -> String {
    "vanilla".into()
}

fn default_locale() -> String {
    "en_us".into()
}

fn default_view_distance() -> i8 {
    8
}

impl Default for ClientSection {
    fn default() -> Self {
        Self {
            brand: default_brand(),
            locale: default_locale(),
            view_distance: default_view_distance(),
            block_shapes: None,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct LoggingSection {
    pub level: String,
}

impl SwarmConfig {
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, Box<dyn std::error::Error>> {
        let contents = std::fs::read_to_string(path)?;
        let config: Self = toml::from_str(&contents)?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_minimal_config() {
        let toml_str = r#"
            [server]
            host = "play.example.net"

            [logging]
            level = "debug"
        "#;
        let config: SwarmConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(config.server.host, "play.example.net");
        assert_eq!(config.server.port, 25565); // default
        assert_eq!(config.server.protocol_version, 769);
        assert_eq!(config.server.intent, ConnectIntent::Login);
        assert_eq!(config.logging.level, "debug");
        // bots section defaults when absent
        assert_eq!(config.bots.amount, 1);
        assert_eq!(config.bots.join_delay_ms, 1000);
        assert!(config.bots.auto_respawn);
        assert_eq!(config.bots.thread_prefix, "mc-swarm");
        assert!(config.accounts.is_empty());
        assert!(config.proxy.is_none());
        // timeouts
        assert_eq!(config.timeouts.connect(), Duration::from_secs(5));
        assert_eq!(config.timeouts.read(), Duration::from_secs(30));
        assert_eq!(config.timeouts.write(), Duration::from_secs(10));
        // client
        assert_eq!(config.client.brand, "vanilla");
        assert_eq!(config.client.locale, "en_us");
        assert_eq!(config.client.view_distance, 8);
    }

    #[test]
    fn parse_full_config() {
        let toml_str = r#"
            [server]
            host = "127.0.0.1"
            port = 25570
            intent = "status"

            [bots]
            amount = 50
            name_format = "Swarm{}"
            join_delay_ms = 250
            auto_respawn = false

            [[accounts]]
            name = "Alice"

            [[accounts]]
            name = "Bob"
            uuid = "069a79f4-44e9-4726-a5be-fca90e38aaf5"
            access_token = "token"

            [proxy]
            address = "127.0.0.1:1080"
            username = "user"
            password = "pass"

            [timeouts]
            read_ms = 1000

            [logging]
            level = "info"
        "#;
        let config: SwarmConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(config.server.port, 25570);
        assert_eq!(config.server.intent, ConnectIntent::Status);
        assert_eq!(config.bots.amount, 50);
        assert_eq!(config.bots.bot_name(7), "Swarm7");
        assert!(!config.bots.auto_respawn);
        assert_eq!(config.accounts.len(), 2);
        assert!(config.accounts[0].access_token.is_none());
        assert_eq!(config.accounts[1].access_token.as_deref(), Some("token"));
        let proxy = config.proxy.unwrap();
        assert_eq!(proxy.address, "127.0.0.1:1080");
        assert_eq!(proxy.username.as_deref(), Some("user"));
        assert_eq!(config.timeouts.read_ms, 1000);
        assert_eq!(config.timeouts.connect_ms, 5000);
    }

    #[test]
    fn unknown_intent_rejected() {
        let toml_str = r#"
            [server]
            host = "localhost"
            intent = "transfer"

            [logging]
            level = "info"
        "#;
        assert!(toml::from_str::<SwarmConfig>(toml_str).is_err());
    }
}
