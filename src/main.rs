/*!
TCP Chat

A line-based chat relay. Clients connect, give a name, and every line they
send is stamped and relayed to everyone else. Newcomers are shown the
conversation so far.
*/
mod config;
mod error;
mod history;
mod hub;
mod line;
mod message;
mod registry;
mod server;
mod session;
#[cfg(test)]
mod testlog;

use anyhow::Context;
use clap::Parser;
use tokio::net::TcpListener;
use tracing::{event, Level};
use tracing_subscriber::{
    fmt::layer,
    filter::EnvFilter,
    prelude::*,
};

use crate::{
    config::Config,
    hub::Hub,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(layer())
        .with(EnvFilter::from_default_env())
        .init();

    let cfg = Config::parse();
    let banner = config::load_banner(&cfg.banner)?;
    event!(Level::DEBUG, "banner:\n{}", &banner);

    let (hub, broadcaster) = Hub::new(cfg.limits());
    tokio::spawn(broadcaster.run());

    let addr = cfg.addr();
    let listener = TcpListener::bind(addr).await
        .with_context(|| format!("unable to listen on {}", addr))?;
    event!(Level::INFO, "listening on {:?}", &listener.local_addr()?);

    let mut conn_n: usize = 0;
    loop {
        match listener.accept().await {
            Ok((stream, addr)) => {
                event!(Level::DEBUG,
                    "accepted connection {} from {:?}", &conn_n, &addr
                );
                tokio::spawn(server::handle_connection(
                    hub.clone(), banner.clone(), stream, conn_n
                ));
                conn_n += 1;
            },
            Err(e) => {
                event!(Level::WARN, "error accepting connection: {}", &e);
            },
        }
    }
}
