use clap::Parser;
use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};

/// PIX notification relay server
#[derive(Parser, Serialize, Deserialize, Clone, Debug)]
#[command(name = "pix-relay-server", version, about = "Real-time PIX notification relay")]
pub struct Config {
    /// Port to listen on
    #[arg(long, env = "PIX_RELAY_PORT", default_value = "3000")]
    pub port: u16,

    /// Bind address
    #[arg(long, env = "PIX_RELAY_BIND_ADDRESS", default_value = "0.0.0.0")]
    pub bind_address: String,

    /// Path to TOML config file
    #[arg(long, default_value = "./pix-relay.toml")]
    pub config: String,

    /// Enable structured JSON logging (for Docker/production)
    #[arg(long, env = "PIX_RELAY_JSON_LOGS")]
    pub json_logs: bool,

    /// Output a commented TOML config template and exit
    #[arg(long)]
    pub generate_config: bool,

    /// URL that every routed payment notification is forwarded to
    /// (fire-and-forget). Forwarding is disabled when unset.
    #[arg(long, env = "PIX_RELAY_FORWARD_URL")]
    pub forward_url: Option<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            port: 3000,
            bind_address: "0.0.0.0".to_string(),
            config: "./pix-relay.toml".to_string(),
            json_logs: false,
            generate_config: false,
            forward_url: None,
        }
    }
}

impl Config {
    /// Load config with layered precedence:
    /// built-in defaults < TOML file < env vars (PIX_RELAY_*) < CLI args
    pub fn load() -> Result<Self, figment::Error> {
        let cli = Config::parse();
        let config_path = cli.config.clone();

        Figment::new()
            .merge(Serialized::defaults(Config::default()))
            .merge(Toml::file(&config_path))
            .merge(Env::prefixed("PIX_RELAY_"))
            .merge(Serialized::defaults(cli))
            .extract()
    }
}

/// Generate a commented TOML config template
pub fn generate_config_template() -> String {
    r#"# PIX Relay Server Configuration
# Place this file at ./pix-relay.toml or specify with --config <path>
# All settings can be overridden via environment variables (PIX_RELAY_PORT, etc.)
# or CLI flags (--port, etc.)

# Server port (default: 3000)
# port = 3000

# Bind address (default: 0.0.0.0 — all interfaces)
# bind_address = "0.0.0.0"

# Enable structured JSON logging for Docker/production
# json_logs = false

# Forward every routed payment notification to this URL (fire-and-forget,
# failures logged and never retried). Disabled when unset.
# forward_url = "https://example.com/webhooks/pix"
"#
    .to_string()
}
