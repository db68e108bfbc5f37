//! telegino daemon
//!
//! Loads the configuration, opens the serial link and runs the poll/log
//! scheduler until interrupted. Notifications go to the log; with
//! `--console`, command lines typed on stdin are handled like chat
//! messages.

use std::path::PathBuf;

use chrono::Local;
use clap::Parser;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{error, info};
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

use telegino::{
    ChartWindow, CommandReply, CommandRequest, Config, Event, Hub, Scheduler, SerialConfig,
    SerialTransport, ShutdownFlag, TracingSink, Transport, forward_notifications, list_ports,
    read_history,
};

/// Default tracing filter.
const DEFAULT_FILTER: &str = "telegino=info";

/// Serial bridge to controller outputs and temperature sensors
#[derive(Parser, Debug)]
#[command(name = "telegino")]
#[command(about = "Serial bridge to controller outputs and temperature sensors", long_about = None)]
struct Args {
    /// Path to the JSON configuration file
    #[arg(short, long, default_value = "config.json")]
    config: PathBuf,

    /// Serial port, overriding the configuration
    #[arg(short, long)]
    port: Option<String>,

    /// Read commands from stdin
    #[arg(long)]
    console: bool,

    /// Print the available serial ports and exit
    #[arg(long)]
    list_ports: bool,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    if args.list_ports {
        for port in list_ports()? {
            println!("{port}");
        }
        return Ok(());
    }

    let mut config = Config::load(&args.config)?;
    if let Some(port) = args.port {
        config.port = port;
    }

    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(config.log_filter_or(DEFAULT_FILTER))),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("starting telegino v{}", env!("CARGO_PKG_VERSION"));
    info!(
        "{} devices on {} at {} baud",
        config.devices.len(),
        config.port,
        config.baud_rate
    );

    let link = SerialTransport::new(SerialConfig::new(&config.port).baud_rate(config.baud_rate));
    let hub = Hub::from_config(link, &config);

    let notifier = tokio::spawn(forward_notifications(hub.subscribe(), TracingSink));
    hub.dispatcher().dispatch(Event::Started);

    let shutdown = ShutdownFlag::new();
    let scheduler =
        tokio::spawn(Scheduler::from_config(hub.clone(), &config, shutdown.clone()).run());

    if args.console {
        tokio::select! {
            () = read_commands(&hub) => info!("console input closed"),
            () = wait_for_interrupt() => {}
        }
    } else {
        wait_for_interrupt().await;
    }

    shutdown.trigger();
    scheduler.await?;
    notifier.abort();
    info!("stopped");
    Ok(())
}

async fn wait_for_interrupt() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => info!("interrupted"),
        Err(e) => error!("failed to listen for Ctrl-C: {}", e),
    }
}

/// Console stand-in for the chat front-end.
async fn read_commands<T: Transport>(hub: &Hub<T>) {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        let line = match lines.next_line().await {
            Ok(Some(line)) => line,
            Ok(None) => return,
            Err(e) => {
                error!("failed to read console: {}", e);
                return;
            }
        };

        match line.trim() {
            "" => {}
            "status" => println!("{}", hub.describe_all_state().await),
            "commands" => println!("{}", hub.available_commands().await.join("\n")),
            "chart day" => print_chart(hub, ChartWindow::Day).await,
            "chart week" => print_chart(hub, ChartWindow::Week).await,
            "chart month" => print_chart(hub, ChartWindow::Month).await,
            text => {
                let request = CommandRequest {
                    author: "console".to_owned(),
                    text: text.to_owned(),
                    origin: None,
                };
                match hub.submit(request).await {
                    CommandReply::Applied { state } => println!("{state}"),
                    CommandReply::Unknown => println!("Unknown command"),
                    CommandReply::Unavailable { message } => println!("{message}"),
                }
            }
        }
    }
}

async fn print_chart<T: Transport>(hub: &Hub<T>, window: ChartWindow) {
    let names = hub.chart_devices().await;
    let now = Local::now().naive_local();
    match read_history(hub.log().path(), &names, window.duration(), now).await {
        Ok(history) => {
            println!(
                "{} records in the last {} hours",
                history.timestamps.len(),
                window.hours()
            );
            for series in &history.series {
                let values = series.points.iter().flatten().copied();
                let (min, max) = values.fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), v| {
                    (lo.min(v), hi.max(v))
                });
                if min.is_finite() {
                    println!("{}: min {:.1}, max {:.1}", series.name, min, max);
                } else {
                    println!("{}: no data", series.name);
                }
            }
        }
        Err(e) => error!("failed to read device log: {}", e),
    }
}
