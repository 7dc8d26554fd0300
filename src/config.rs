use std::env;

use anyhow::{Context, Result};

#[derive(Debug, Clone)]
pub struct Config {
    pub bind_address: String,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        let port = env::var("PORT").unwrap_or_else(|_| "8080".to_string());
        let port: u16 = port
            .parse()
            .with_context(|| format!("invalid PORT value: {port}"))?;
        Ok(Config {
            bind_address: format!("0.0.0.0:{port}"),
        })
    }
}
