/*!
Command-line (and environment) configuration.
*/
use std::{
    net::{IpAddr, Ipv4Addr, SocketAddr},
    path::{Path, PathBuf},
    sync::Arc,
};

use clap::Parser;

use crate::{error::Error, hub::Limits};

#[derive(Debug, Parser)]
#[command(name = "tcpchat", version, about = "Line-based TCP chat relay")]
pub struct Config {
    /// Port to listen on.
    #[arg(env = "TCPCHAT_PORT", default_value_t = 8989)]
    pub port: u16,

    /// Address to listen on.
    #[arg(long, env = "TCPCHAT_HOST", default_value_t = IpAddr::V4(Ipv4Addr::UNSPECIFIED))]
    pub host: IpAddr,

    /// File whose contents greet every new connection.
    #[arg(long, env = "TCPCHAT_BANNER", default_value = "logo.txt")]
    pub banner: PathBuf,

    /// Most clients connected at once.
    #[arg(
        long, env = "TCPCHAT_MAX_CLIENTS", default_value_t = 10,
        value_parser = clap::value_parser!(u32).range(1..)
    )]
    pub max_clients: u32,

    /// Most undelivered lines a client may have before it is dropped.
    #[arg(
        long, env = "TCPCHAT_MAILBOX_CAPACITY", default_value_t = 10,
        value_parser = clap::value_parser!(u32).range(1..)
    )]
    pub mailbox_capacity: u32,

    /// Keep only this many lines of history for newcomers (default: all).
    #[arg(long, env = "TCPCHAT_HISTORY_LIMIT")]
    pub history_limit: Option<usize>,
}

impl Config {
    pub fn addr(&self) -> SocketAddr {
        SocketAddr::new(self.host, self.port)
    }

    pub fn limits(&self) -> Limits {
        Limits {
            max_clients: self.max_clients as usize,
            mailbox_capacity: self.mailbox_capacity as usize,
            history_limit: self.history_limit,
        }
    }
}

/// Read the banner shown to every new connection.
pub fn load_banner(path: &Path) -> Result<Arc<str>, Error> {
    std::fs::read_to_string(path)
        .map(Arc::from)
        .map_err(|source| Error::Banner { path: path.to_owned(), source })
}
