pub mod alerts;
pub mod console;
pub mod error;
pub mod render;
pub mod screen;

use alerts::TerminalAlerts;
use anyhow::Context;
use console::{Command, Console, ViewState, HELP};
use dispatch_core::EventChannel;
use dispatch_offer::{CountdownHandle, CountdownScheduler, OfferFeed, OfferStore, StoreSettings};
use dispatch_store::app_config::Config;
use dispatch_store::open_storage;
use dispatch_transport::{SocketClient, TransportConfig};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{info, warn};

const RING_EVERY: Duration = Duration::from_secs(2);

pub fn transport_config(config: &Config) -> TransportConfig {
    let mut transport = TransportConfig::new(config.server.url.clone(), config.mechanic.id.clone());
    transport.register_ack_timeout = Duration::from_millis(config.timing.register_ack_timeout_ms);
    transport.reconnect_initial_ms = config.timing.reconnect_initial_ms;
    transport.reconnect_max_ms = config.timing.reconnect_max_ms;
    transport
}

pub fn store_settings(config: &Config) -> StoreSettings {
    StoreSettings {
        namespace: config.storage.namespace.clone(),
        default_sla_seconds: config.timing.default_sla_seconds,
        decision_ack_timeout: Duration::from_millis(config.timing.decision_ack_timeout_ms),
    }
}

/// Everything running for one mechanic session.
pub struct App {
    pub store: OfferStore,
    pub socket: SocketClient,
    feed: OfferFeed,
    countdown: CountdownHandle,
    screen: JoinHandle<()>,
    registration_log: JoinHandle<()>,
    view_tx: watch::Sender<ViewState>,
}

impl App {
    pub async fn start(config: Config) -> anyhow::Result<Self> {
        let storage = open_storage(&config.storage, &config.mechanic.id)
            .await
            .context("Failed to open offer storage")?;

        let socket = SocketClient::new(transport_config(&config));
        let channel: Arc<dyn EventChannel> = Arc::new(socket.clone());
        let alerts = Arc::new(TerminalAlerts::new(RING_EVERY));
        let store = OfferStore::new(channel.clone(), storage, alerts, store_settings(&config));

        let restored = store.restore().await;
        info!("Restored {} offer(s) from storage", restored);

        // Subscribe before connecting so no push is missed.
        let feed = OfferFeed::attach(store.clone(), channel);
        let countdown = CountdownScheduler::new(config.timing.tick_interval_ms).start(store.clone());

        let (view_tx, view_rx) = watch::channel(ViewState::default());
        let screen = screen::spawn_screen(store.subscribe(), view_rx);

        let registration_log = log_registrations(&socket);
        socket.connect();

        Ok(Self {
            store,
            socket,
            feed,
            countdown,
            screen,
            registration_log,
            view_tx,
        })
    }

    /// Read commands from stdin until `quit`, end of input or Ctrl-C.
    pub async fn run_console(&self) -> anyhow::Result<()> {
        let mut console = Console::new(self.store.clone(), self.view_tx.clone());
        let mut lines = BufReader::new(tokio::io::stdin()).lines();
        println!("{}", HELP);

        loop {
            let line = tokio::select! {
                line = lines.next_line() => line.context("Failed to read stdin")?,
                _ = tokio::signal::ctrl_c() => {
                    info!("Interrupted");
                    return Ok(());
                }
            };
            let Some(line) = line else {
                return Ok(());
            };

            let command = match Command::parse(&line) {
                Ok(Some(Command::Quit)) => return Ok(()),
                Ok(Some(command)) => command,
                Ok(None) => continue,
                Err(e) => {
                    println!("{}", e.user_message());
                    continue;
                }
            };

            match console.execute(command).await {
                Ok(Some(text)) => println!("{}", text),
                Ok(None) => {}
                Err(e) => println!("{}", e.user_message()),
            }
        }
    }

    pub async fn shutdown(self) {
        self.feed.detach();
        self.countdown.stop();
        self.screen.abort();
        self.registration_log.abort();
        self.socket.shutdown();
        if self.store.storage_degraded() {
            warn!("Offers were kept in memory only this session");
        }
        info!("Dispatch client stopped");
    }
}

fn log_registrations(socket: &SocketClient) -> JoinHandle<()> {
    let mut rx = socket.watch_registration();
    tokio::spawn(async move {
        while rx.changed().await.is_ok() {
            match *rx.borrow_and_update() {
                Some(registration) if registration.ok => info!("Registered with dispatch"),
                Some(_) => warn!("Dispatch did not confirm registration, offers may not arrive"),
                None => {}
            }
        }
    })
}
