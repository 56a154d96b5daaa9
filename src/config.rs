//! Environment-driven configuration, collected once at startup.

use crate::error::{Error, Result};
use std::path::PathBuf;

#[derive(Clone, Debug)]
pub struct Config {
    pub port: u16,
    pub data_dir: PathBuf,
    /// Optional; without it status-change notifications are logged only.
    pub nats_url: Option<String>,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        let port = match std::env::var("PORT") {
            Ok(v) => v
                .parse()
                .map_err(|_| Error::Validation(format!("invalid PORT value: {v}")))?,
            Err(_) => 8083,
        };
        let data_dir = std::env::var("DATA_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("data"));
        let nats_url = std::env::var("NATS_URL").ok();
        Ok(Self {
            port,
            data_dir,
            nats_url,
        })
    }
}
