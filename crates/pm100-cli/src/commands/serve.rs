//! Serve command implementation.

use std::io::{self, Write};

use chrono::Local;
use pm100_core::config::ServerConfig;
use pm100_core::events::ServerEvent;
use pm100_core::server::FrameServer;

use crate::cli::ServeArgs;
use crate::error::CliError;
use crate::output::{get_formatter, OutputFormatter};

/// Run the serve command
pub async fn run_serve(args: ServeArgs, config: ServerConfig, json: bool) -> Result<(), CliError> {
    let formatter = get_formatter(json);

    let port = args.port.unwrap_or(config.port);
    let host = args
        .host
        .clone()
        .unwrap_or_else(|| config.bind_address.to_string());

    let (server, mut events) = FrameServer::new(config);
    if !server.start(port, &host).await {
        return Err(CliError::Network(format!(
            "could not start the telemetry server on {}:{}",
            host, port
        )));
    }

    if !json {
        println!("Waiting for device frames (press Ctrl+C to stop)...\n");
    }

    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);

    loop {
        tokio::select! {
            signal = &mut ctrl_c => {
                signal?;
                break;
            }
            event = events.recv() => match event {
                Some(event) => print_event(formatter.as_ref(), &event),
                None => break,
            },
        }
    }

    if !json {
        println!("\nStopping...");
    }
    server.stop().await;

    // Whatever the shutdown produced, the final status included.
    while let Ok(event) = events.try_recv() {
        print_event(formatter.as_ref(), &event);
    }

    Ok(())
}

fn print_event(formatter: &dyn OutputFormatter, event: &ServerEvent) {
    let line = match event {
        ServerEvent::Frame(frame) => formatter.format_frame(frame, Local::now()),
        ServerEvent::Status(status) => formatter.format_status(status, Local::now()),
        // Already written through tracing.
        ServerEvent::Log(_) => return,
    };
    println!("{}", line);
    io::stdout().flush().ok();
}
