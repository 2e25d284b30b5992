use std::net::{Ipv4Addr, SocketAddr};
use std::path::PathBuf;
use std::process::ExitCode;

use clap::error::ErrorKind;
use clap::Parser;
use log::{error, info};

use streamhttp::{endpoints, HttpServer, ServerConfig};

/// Serve `/multipart`, `/multi2` and the files under DIR.
#[derive(Parser, Debug)]
#[command(name = "simplesvr", version, override_usage = "simplesvr [PORT] [DIR]")]
struct Cli {
    /// Port to listen on
    #[arg(default_value_t = 8080)]
    port: u16,

    /// Directory served for requests no route matches
    #[arg(default_value = "./")]
    dir: PathBuf,

    /// PEM certificate chain; enables HTTPS together with --key
    #[cfg(feature = "tls")]
    #[arg(long, requires = "key")]
    cert: Option<PathBuf>,

    /// PEM private key
    #[cfg(feature = "tls")]
    #[arg(long, requires = "cert")]
    key: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(e) if e.kind() == ErrorKind::DisplayHelp => {
            let _ = e.print();
            return ExitCode::from(1);
        }
        Err(e) => e.exit(),
    };

    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let config = ServerConfig {
        addr: SocketAddr::from((Ipv4Addr::LOCALHOST, cli.port)),
        base_dir: Some(cli.dir),
        #[cfg(feature = "tls")]
        tls: cli
            .cert
            .zip(cli.key)
            .map(|(cert_path, key_path)| streamhttp::server::TlsConfig { cert_path, key_path }),
        ..ServerConfig::default()
    };

    let mut server = HttpServer::new(config);
    endpoints::register(&mut server).await;

    info!("The server started at port {}...", cli.port);
    if let Err(e) = server.start().await {
        error!("Server error: {e}");
        return ExitCode::FAILURE;
    }
    ExitCode::SUCCESS
}
