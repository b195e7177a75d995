use clap::{Parser, Subcommand};
use geotopic_daemon_shared::*;
use interprocess::local_socket::{tokio::Stream, traits::tokio::Stream as _};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};

#[derive(Parser)]
struct Cli {
    /// Name of the local socket the daemon is listening on
    socket: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start location updates
    Start,
    /// Stop location updates
    Stop,
    /// Send a location to the daemon
    Push {
        /// Latitude in degrees
        #[arg(allow_hyphen_values = true)]
        lat: f64,
        /// Longitude in degrees
        #[arg(allow_hyphen_values = true)]
        long: f64,
    },
    /// Print the current subscription state
    Status,
}

impl From<Commands> for DaemonRequest {
    fn from(value: Commands) -> Self {
        match value {
            Commands::Start => DaemonRequest::Start,
            Commands::Stop => DaemonRequest::Stop,
            Commands::Push { lat, long } => DaemonRequest::PushLocation {
                lat,
                long,
                timestamp: None,
            },
            Commands::Status => DaemonRequest::Status,
        }
    }
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result {
    let cli = Cli::parse();

    let socket_name = get_socket_name(cli.socket.clone()).context("Failed to get socket name")?;

    let stream = Stream::connect(socket_name)
        .await
        .context("Failed to connect to socket")?;

    let mut recv = BufReader::new(&stream);
    let mut send = &stream;

    let req = DaemonRequest::from(cli.command);
    send.write_all(&encode_line(&req)?)
        .await
        .context("Failed to send request")?;

    let mut line = String::new();
    recv.read_line(&mut line)
        .await
        .context("Failed to read response")?;

    let resp = serde_json::from_str::<DaemonResponse>(&line).context("Invalid response")?;
    let pretty = serde_json::to_string_pretty(&resp).context("Failed to encode response")?;
    println!("{pretty}");

    if let DaemonResponse::Error(why) = resp {
        bail!("Daemon returned an error: {why}");
    }

    Ok(())
}
