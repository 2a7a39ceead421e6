mod backend_bridge;
mod controller;
mod os_bridge;
mod ui;

use std::path::PathBuf;

use anyhow::{bail, Context};
use clap::Parser;
use control_core::PanelConfig;
use crossbeam_channel::bounded;
use eframe::egui;
use tracing_subscriber::EnvFilter;

use crate::{
    backend_bridge::{
        commands::PanelCommand,
        runtime::{self, BackendSettings},
    },
    controller::events::PanelEvent,
    ui::ControlPanelApp,
};

const APP_TITLE: &str = "OBS control panel";

#[derive(Debug, Parser)]
#[command(name = "control_panel", about = "Control surface for a shared OBS production")]
struct Args {
    /// OBS websocket address as `hostname:port`; defaults to the config file's host.
    hostname_port: Option<String>,

    /// obs-websocket password.
    #[arg(env = "OBS_PASSWORD", hide_env_values = true)]
    password: Option<String>,

    /// Window title regex of the notes document to scroll (see `xwininfo -tree -root`).
    #[arg(long)]
    notes_window: Option<String>,

    /// Panel config file; defaults to `<config dir>/obs-control/panel.toml` when present.
    #[arg(long)]
    config: Option<PathBuf>,

    #[arg(long)]
    verbose: bool,
}

fn init_tracing(verbose: bool) {
    let default_level = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

fn split_host_port(raw: &str) -> anyhow::Result<(String, u16)> {
    let Some((host, port)) = raw.rsplit_once(':') else {
        bail!("expected hostname:port, got '{raw}'");
    };
    if host.is_empty() {
        bail!("missing hostname in '{raw}'");
    }
    let port = port
        .parse()
        .with_context(|| format!("invalid port in '{raw}'"))?;
    Ok((host.to_string(), port))
}

fn load_config(args: &Args) -> anyhow::Result<PanelConfig> {
    let fallback = dirs::config_dir().map(|dir| dir.join("obs-control").join("panel.toml"));
    load_config_with(args, fallback, |key| std::env::var(key).ok())
}

fn load_config_with(
    args: &Args,
    fallback: Option<PathBuf>,
    env: impl Fn(&str) -> Option<String>,
) -> anyhow::Result<PanelConfig> {
    let mut config = PanelConfig::load_with(args.config.as_deref(), fallback, env)
        .context("failed to load panel configuration")?;
    if let Some(raw) = &args.hostname_port {
        let (host, port) = split_host_port(raw)?;
        config.host = host;
        config.port = port;
    }
    if args.password.is_some() {
        config.password = args.password.clone();
    }
    Ok(config)
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    init_tracing(args.verbose);

    let config = load_config(&args)?;
    tracing::info!(host = %config.host, port = config.port, "starting control panel");

    let (cmd_tx, cmd_rx) = bounded::<PanelCommand>(256);
    let (ui_tx, ui_rx) = bounded::<PanelEvent>(2048);
    runtime::launch(
        BackendSettings {
            config: config.clone(),
            notes_window: args.notes_window.clone(),
        },
        cmd_rx,
        ui_tx,
    );

    let options = eframe::NativeOptions {
        viewport: egui::ViewportBuilder::default()
            .with_title(APP_TITLE)
            .with_inner_size([760.0, 360.0])
            .with_min_inner_size([560.0, 300.0]),
        ..Default::default()
    };
    eframe::run_native(
        APP_TITLE,
        options,
        Box::new(move |cc| {
            cc.egui_ctx.set_visuals(ui::theme::visuals());
            Ok(Box::new(ControlPanelApp::new(cmd_tx, ui_rx, config)))
        }),
    )
    .map_err(|err| anyhow::anyhow!("control panel window failed: {err}"))
}
