use clap::Parser;
use client::input::InputSampler;
use client::network::spawn_transport;
use client::rendering::Renderer;
use client::scheduler::Millis;
use client::session::{Session, SessionConfig};
use log::{error, info, warn};
use macroquad::prelude::*;
use std::time::Instant;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// WebSocket URL of the battle room
    #[arg(short = 'u', long, default_value = "ws://127.0.0.1:8080/ws")]
    url: String,

    /// Window width
    #[arg(short = 'w', long, default_value = "832")]
    width: u32,

    /// Window height (no short flag to avoid conflict with --help)
    #[arg(long, default_value = "832")]
    height: u32,

    /// Minimum milliseconds between two movement intents
    #[arg(long, default_value = "200")]
    move_interval: u64,
}

fn window_conf() -> Conf {
    let args = Args::parse();
    Conf {
        window_title: "Tank Battle".to_owned(),
        window_width: args.width as i32,
        window_height: args.height as i32,
        window_resizable: false,
        ..Default::default()
    }
}

async fn run(args: Args) -> Result<(), Box<dyn std::error::Error>> {
    let config = SessionConfig {
        screen_width: args.width as f32,
        screen_height: args.height as f32,
        move_interval_ms: args.move_interval,
        ..SessionConfig::default()
    };

    let mut session = Session::new(&config);
    let mut transport = spawn_transport(args.url)?;
    let mut input = InputSampler::new();
    let mut renderer = Renderer::new(config.screen_width, config.screen_height);
    let clock = Instant::now();

    loop {
        let now = clock.elapsed().as_millis() as Millis;

        for event in transport.poll() {
            session.handle_transport(event, now);
        }

        if input.dismiss_pressed() {
            session.dismiss_notice();
        }
        if input.quit_pressed() {
            session.teardown();
            break;
        }

        let controls = input.sample();
        for intent in session.frame(&controls, now) {
            if !transport.send(intent) {
                warn!("Connection gone, intent dropped");
            }
        }

        renderer.render(&session, input.drag_origin(), now);
        next_frame().await;
    }

    info!("Client shut down");
    Ok(())
}

#[macroquad::main(window_conf)]
async fn main() {
    env_logger::init();

    if std::env::var("RUST_LOG").is_err() {
        eprintln!("Set RUST_LOG=info for detailed logging");
    }

    let args = Args::parse();

    info!("Starting client...");
    info!("Connecting to: {}", args.url);
    info!("Controls: WASD/arrows or drag to move, Space/F to fire, Enter to dismiss, Esc to quit");

    if let Err(e) = run(args).await {
        error!("Client error: {}", e);
    }
}
