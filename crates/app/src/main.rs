mod microphone;
mod window;

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;
use vibe_visualiser_core::{AppConfig, ColorMode, Palette, Visualizer, VisualStyle};

fn main() -> vibe_visualiser_core::Result<()> {
    init_tracing();

    let cli = Cli::parse();

    match cli.command {
        Commands::Live {
            config,
            style,
            palette,
        } => run_live(config.as_ref(), style, palette),
        Commands::Palettes => {
            print_palettes();
            Ok(())
        }
        Commands::Devices => run_devices(),
    }
}

fn run_live(
    config_path: Option<&PathBuf>,
    style: Option<VisualStyle>,
    palette: Option<ColorMode>,
) -> vibe_visualiser_core::Result<()> {
    let mut config = match config_path {
        Some(path) => AppConfig::load(path)?,
        None => AppConfig::default(),
    };
    if let Some(style) = style {
        config.visual.style = style;
    }
    if let Some(mode) = palette {
        config.visual.color_mode = mode;
    }
    tracing::info!(
        config = ?config_path,
        style = %config.visual.style,
        palette = %config.visual.color_mode,
        "starting live mode"
    );

    let visualizer = Visualizer::new(&config, microphone::default_source());
    window::run(visualizer, config.visual.width, config.visual.height)
}

fn print_palettes() {
    println!(
        "{:<8} {:<8} {:<8} {:<8} {:<8} {:<8} {:<8}",
        "name", "glow", "bars", "core", "text", "bg-start", "bg-end"
    );
    for palette in Palette::ALL {
        let cells: Vec<String> = palette
            .colors()
            .as_array()
            .iter()
            .map(|rgba| format!("{:<8}", rgba.to_string()))
            .collect();
        println!("{:<8} {}", palette.name(), cells.join(" "));
    }
}

fn run_devices() -> vibe_visualiser_core::Result<()> {
    let devices = microphone::list_devices()?;
    if devices.is_empty() {
        println!("no input devices found");
    }
    for name in devices {
        println!("{name}");
    }
    Ok(())
}

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .try_init();
}

#[derive(Parser, Debug)]
#[command(author, version, about = "Audio-reactive visualiser", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Open the visualiser window and listen to the default microphone.
    Live {
        /// JSON configuration file.
        #[arg(short, long)]
        config: Option<PathBuf>,
        /// Initial style: orb, bars, wave or spiral.
        #[arg(short, long)]
        style: Option<VisualStyle>,
        /// Initial colour mode: auto or a palette name.
        #[arg(short, long)]
        palette: Option<ColorMode>,
    },
    /// Print the palette table.
    Palettes,
    /// List capture devices.
    Devices,
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_is_well_formed() {
        Cli::command().debug_assert();
    }

    #[test]
    fn live_flags_parse_into_core_types() {
        let cli = Cli::parse_from([
            "vibe-visualiser",
            "live",
            "--style",
            "spiral",
            "--palette",
            "fire",
        ]);
        match cli.command {
            Commands::Live { style, palette, .. } => {
                assert_eq!(style, Some(VisualStyle::Spiral));
                assert_eq!(palette, Some(ColorMode::Fixed(Palette::Fire)));
            }
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn unknown_style_is_rejected() {
        assert!(Cli::try_parse_from(["vibe-visualiser", "live", "--style", "laser"]).is_err());
    }
}
