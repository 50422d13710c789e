//! quadseg control tool
//!
//! Drives an HT16K33 alphanumeric display directly over a Firmata serial link.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use quadseg_hw::{
    glyph, scroll::DEFAULT_SCROLL_INTERVAL, BlinkRate, Display, FirmataBus, ScrollSession,
    DISPLAY_WIDTH, MAX_BRIGHTNESS,
};
use std::time::Duration;
use tracing::debug;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "quadsegctl")]
#[command(about = "Control tool for HT16K33 alphanumeric displays")]
#[command(version)]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    /// Serial port of the Firmata board
    #[arg(long, default_value = "/dev/ttyACM0")]
    port: String,

    /// Serial baud rate
    #[arg(long, default_value_t = quadseg_hw::firmata::DEFAULT_BAUD_RATE)]
    baud: u32,

    /// I2C address of the display (e.g., 0x70)
    #[arg(long, default_value = "0x70", value_parser = parse_address)]
    address: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show up to four characters
    Text {
        text: String,

        /// Slots with the decimal point lit (e.g., 0,3)
        #[arg(long, value_delimiter = ',')]
        dots: Vec<usize>,
    },
    /// Scroll text across the display
    Scroll {
        text: String,

        /// Step interval in milliseconds
        #[arg(long, default_value_t = DEFAULT_SCROLL_INTERVAL.as_millis() as u64)]
        interval_ms: u64,

        /// Stop after one pass instead of looping until interrupted
        #[arg(long)]
        once: bool,
    },
    /// Blank the display
    Clear,
    /// Set brightness
    Brightness {
        /// Level (0-15, clamped)
        #[arg(allow_negative_numbers = true)]
        level: i32,
    },
    /// Set blink rate
    Blink {
        /// Rate: off, 2hz, 1hz, 0.5hz
        rate: BlinkRate,
    },
    /// Print the segment mask of a character
    Glyph { character: char },
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Setup logging
    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("warn")
    };
    tracing_subscriber::fmt().with_env_filter(filter).init();

    if let Commands::Glyph { character } = cli.command {
        print_glyph(character);
        return Ok(());
    }

    let bus = FirmataBus::open(&cli.port, cli.baud)
        .with_context(|| format!("Failed to open display link on {}", cli.port))?;
    let mut display = Display::new(bus, cli.address);
    display
        .initialize(i32::from(MAX_BRIGHTNESS))
        .context("Failed to initialize display")?;
    debug!("Display at 0x{:02X} ready", cli.address);

    let result = run(cli.command, &mut display).await;

    // Queued writes are lost if the process exits first.
    display
        .bus()
        .flush()
        .await
        .context("Display link closed before all writes were sent")?;
    result
}

async fn run(command: Commands, display: &mut Display<FirmataBus>) -> Result<()> {
    match command {
        Commands::Text { text, dots } => {
            display.write_text(&text, &dots_for(&dots))?;
            println!("Showing: {}", display.frame());
        }
        Commands::Scroll {
            text,
            interval_ms,
            once,
        } => {
            let session = ScrollSession::new(&text, Duration::from_millis(interval_ms), &[], once);
            if once {
                session.run(&mut *display).await?;
            } else {
                let interrupted = tokio::select! {
                    result = session.run(&mut *display) => {
                        result?;
                        false
                    }
                    _ = tokio::signal::ctrl_c() => true,
                };
                if interrupted {
                    display.clear()?;
                }
            }
        }
        Commands::Clear => {
            display.clear()?;
            println!("Display cleared");
        }
        Commands::Brightness { level } => {
            display.set_brightness(level)?;
            println!(
                "Brightness set to: {}",
                display.brightness().unwrap_or_default()
            );
        }
        Commands::Blink { rate } => {
            display.set_blink_rate(rate)?;
            println!("Blink rate set to: {}", rate);
        }
        Commands::Glyph { character } => print_glyph(character),
    }

    Ok(())
}

fn print_glyph(character: char) {
    let mask = glyph::glyph(character);
    println!("{:?}: 0x{:04X} ({:#018b})", character, mask, mask);
}

/// Turns slot indices into a decimal point map; indices past the display are ignored.
fn dots_for(slots: &[usize]) -> [bool; DISPLAY_WIDTH] {
    let mut dots = [false; DISPLAY_WIDTH];
    for &slot in slots {
        if let Some(dot) = dots.get_mut(slot) {
            *dot = true;
        }
    }
    dots
}

fn parse_address(s: &str) -> Result<u8, String> {
    let parsed = match s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
        Some(hex) => u8::from_str_radix(hex, 16),
        None => s.parse(),
    };
    match parsed {
        Ok(address) if address <= 0x7F => Ok(address),
        Ok(address) => Err(format!("0x{:02X} is not a 7-bit I2C address", address)),
        Err(e) => Err(format!("invalid address {:?}: {}", s, e)),
    }
}
