use std::{path::PathBuf, sync::Arc, time::Duration};

use clap::Parser;
use geotopic_daemon_shared::*;
use geotopic_logic::{
    LocationRequest, LocationSample, LocationService, LocationUpdates, TopicMessaging,
};
use geotopic_messaging::{DryRunMessaging, IidTopicClient};
use interprocess::local_socket::{ListenerOptions, tokio::prelude::*};
use log::{error, info};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};

#[derive(Parser)]
struct Cli {
    /// Name of the local socket to listen on
    socket: String,

    /// JSON file the subscription state is kept in
    #[arg(long, env = "GEOTOPIC_SETTINGS")]
    settings: PathBuf,

    /// Registration token of this device
    #[arg(long, env = "GEOTOPIC_REGISTRATION_TOKEN", required_unless_present = "dry_run")]
    token: Option<String>,

    /// OAuth access token used to authorize topic requests
    #[arg(long, env = "GEOTOPIC_ACCESS_TOKEN", required_unless_present = "dry_run")]
    access_token: Option<String>,

    /// Seconds between location polls
    #[arg(long, default_value_t = 20)]
    interval: u64,

    /// Minimum seconds between processed locations
    #[arg(long, default_value_t = 10)]
    fastest_interval: u64,

    /// Log topic changes instead of sending them
    #[arg(long)]
    dry_run: bool,
}

/// Locations only come in through [DaemonRequest::PushLocation]
struct PushOnlyLocation;

impl LocationService for PushOnlyLocation {
    fn get_loc(&self) -> Option<LocationSample> {
        None
    }
}

enum DaemonMessaging {
    Iid(IidTopicClient),
    DryRun(DryRunMessaging),
}

impl TopicMessaging for DaemonMessaging {
    async fn subscribe(&self, topic: &str) -> Result {
        match self {
            Self::Iid(client) => client.subscribe(topic).await,
            Self::DryRun(client) => client.subscribe(topic).await,
        }
    }

    async fn unsubscribe(&self, topic: &str) -> Result {
        match self {
            Self::Iid(client) => client.unsubscribe(topic).await,
            Self::DryRun(client) => client.unsubscribe(topic).await,
        }
    }
}

type Updates = LocationUpdates<PushOnlyLocation, DaemonMessaging, JsonFileStore>;

struct DaemonState {
    updates: Arc<Updates>,
}

impl DaemonState {
    fn new(cli: &Cli) -> Result<Self> {
        let request = LocationRequest::new(
            Duration::from_secs(cli.interval),
            Duration::from_secs(cli.fastest_interval),
        )
        .context("Invalid location request")?;

        let messaging = if cli.dry_run {
            DaemonMessaging::DryRun(DryRunMessaging)
        } else {
            let token = cli.token.clone().context("Missing registration token")?;
            let access_token = cli.access_token.clone().context("Missing access token")?;
            DaemonMessaging::Iid(IidTopicClient::new(token, access_token)?)
        };

        let store = JsonFileStore::open(&cli.settings).context("Failed to open settings")?;
        info!("Using settings at {}", store.path().display());

        let updates = Updates::new(
            request,
            PushOnlyLocation,
            Arc::new(messaging),
            Arc::new(store),
        );

        Ok(Self {
            updates: Arc::new(updates),
        })
    }

    async fn status(&self) -> DaemonStatus {
        DaemonStatus {
            requesting: self.updates.requesting_location_updates(),
            running: self.updates.is_running().await,
            current_bucket: self.updates.tracker().subscription_state().current_bucket,
            last_location: self.updates.last_location().await,
        }
    }

    async fn process_req(&self, req: DaemonRequest) -> Result<DaemonResponse> {
        match req {
            DaemonRequest::Start => self.updates.request_location_updates().await,
            DaemonRequest::Stop => self.updates.remove_location_updates().await,
            DaemonRequest::PushLocation {
                lat,
                long,
                timestamp,
            } => {
                let sample = match timestamp {
                    Some(timestamp) => LocationSample::new(lat, long, timestamp),
                    None => LocationSample::now(lat, long),
                };
                self.updates.push_sample(sample).await?;
            }
            DaemonRequest::Status => return Ok(self.status().await.into()),
        }
        Ok(DaemonResponse::Complete)
    }

    async fn handle_line(&self, line: &str) -> DaemonResponse {
        let res = serde_json::from_str::<DaemonRequest>(line).context("Failed to parse request");
        match res {
            Ok(req) => self.process_req(req).await.unwrap_or_else(Into::into),
            Err(why) => why.into(),
        }
    }
}

#[tokio::main(flavor = "current_thread")]
pub async fn main() -> Result {
    colog::init();

    let cli = Cli::parse();

    let state = DaemonState::new(&cli)?;
    if state.updates.resume_if_requested().await {
        info!("Location updates were on before shutdown, resumed them");
    }

    let socket_name = get_socket_name(cli.socket.clone())?;
    let opts = ListenerOptions::new().name(socket_name);
    let listener = opts.create_tokio().context("Failed to bind to socket")?;

    info!("geotopic daemon {} ready", env!("CARGO_PKG_VERSION"));

    'server: loop {
        let res = tokio::select! {
            res = listener.accept() => {
                res
            },
            Ok(_) = tokio::signal::ctrl_c() => {
                break 'server;
            }
        };

        match res {
            Ok(stream) => {
                let mut recv = BufReader::new(&stream);
                let mut send = &stream;

                let mut buffer = String::with_capacity(256);

                loop {
                    tokio::select! {
                        Ok(_) = tokio::signal::ctrl_c() => {
                            break 'server;
                        }
                        res = recv.read_line(&mut buffer) => {
                            match res {
                                Ok(0) => {
                                    break;
                                }
                                Ok(_amnt) => {
                                    let resp = state.handle_line(buffer.trim()).await;
                                    buffer.clear();
                                    let written = match encode_line(&resp) {
                                        Ok(encoded) => send.write_all(&encoded).await.context("Failed to send response"),
                                        Err(why) => Err(why),
                                    };
                                    if let Err(why) = written {
                                        error!("{why:?}");
                                        break;
                                    }
                                }
                                Err(why) => {
                                    error!("Read Error: {why:?}");
                                    break;
                                }
                            }
                        }
                    }
                }
            }
            Err(why) => error!("Error from connection: {why:?}"),
        }
    }

    info!("Shutting down");

    Ok(())
}
