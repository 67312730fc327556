use anyhow::{anyhow, bail, Context, Result};
use chrono::{Local, Utc};
use courtside_markup::markup::model::Color;
use courtside_markup::markup::persist::{build_filename, timestamped_stem};
use courtside_markup::markup::raster::RasterSurface;
use courtside_markup::markup::replay::{self, ReplayScript};
use courtside_markup::markup::{
    settings_store, AnalysisSink, DirectorySink, HttpSink, MarkupCanvas, PersistenceGateway,
};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};

const USAGE: &str =
    "usage: courtside-markup <script.json> [--settings FILE] [--base IMAGE] [--out DIR] [--debug]";

struct Args {
    script: PathBuf,
    settings: Option<PathBuf>,
    base: Option<PathBuf>,
    out: Option<PathBuf>,
    debug: bool,
}

fn parse_args() -> Result<Args> {
    let mut script = None;
    let mut settings = None;
    let mut base = None;
    let mut out = None;
    let mut debug = false;

    let mut args = std::env::args().skip(1);
    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--settings" => settings = Some(PathBuf::from(next_value(&mut args, &arg)?)),
            "--base" => base = Some(PathBuf::from(next_value(&mut args, &arg)?)),
            "--out" => out = Some(PathBuf::from(next_value(&mut args, &arg)?)),
            "--debug" => debug = true,
            "-h" | "--help" => {
                println!("{USAGE}");
                std::process::exit(0);
            }
            other if other.starts_with("--") => bail!("unknown option {other}\n{USAGE}"),
            other => script = Some(PathBuf::from(other)),
        }
    }

    Ok(Args {
        script: script.ok_or_else(|| anyhow!("missing replay script\n{USAGE}"))?,
        settings,
        base,
        out,
        debug,
    })
}

fn next_value(args: &mut impl Iterator<Item = String>, flag: &str) -> Result<String> {
    args.next().ok_or_else(|| anyhow!("{flag} needs a value\n{USAGE}"))
}

/// Writes the current frame next to the saved analyses. `index` keeps
/// frames exported within the same second apart.
fn export_frame(
    canvas: &mut MarkupCanvas<RasterSurface>,
    out_dir: &Path,
    asset_id: &str,
    index: usize,
) -> Result<PathBuf> {
    let stem = format!("{}_{index}", timestamped_stem(Local::now()));
    let png = out_dir.join(build_filename(&stem, asset_id, "png"));
    canvas.redraw();
    canvas.surface().save_png(&png)?;
    Ok(png)
}

fn main() -> Result<()> {
    let args = parse_args()?;
    let settings = match &args.settings {
        Some(path) => settings_store::load_from_path(path)?,
        None => settings_store::load()?,
    };

    let out_dir = args
        .out
        .clone()
        .or_else(|| settings.storage.export_dir.as_ref().map(PathBuf::from))
        .unwrap_or_else(|| PathBuf::from("analyses"));
    courtside_markup::logging::init(
        args.debug || settings.debug_logging,
        Some(out_dir.join("courtside-markup.log")),
    );

    let script = ReplayScript::from_path(&args.script)?;
    let native = script.asset.native_size();
    let surface = match &args.base {
        Some(path) => {
            let base = image::open(path)
                .with_context(|| format!("open base image {}", path.display()))?
                .to_rgba8();
            RasterSurface::with_base(&base, native)?
        }
        None => RasterSurface::new(native, Color::BLACK)?,
    };

    let sink: Arc<dyn AnalysisSink> = match &settings.storage.endpoint {
        Some(endpoint) => Arc::new(HttpSink::new(
            endpoint.clone(),
            Duration::from_secs(settings.storage.timeout_secs),
        )?),
        None => Arc::new(DirectorySink::new(out_dir.clone())),
    };
    let gateway = PersistenceGateway::new(sink);

    let mut canvas = MarkupCanvas::new(&settings, surface);
    let mut frames = Vec::new();
    let summary = replay::run_with_export(
        &mut canvas,
        &script,
        Some(&gateway),
        Instant::now(),
        |canvas| {
            let index = frames.len();
            frames.push(export_frame(canvas, &out_dir, &script.asset.id, index)?);
            Ok(())
        },
    )?;
    tracing::info!(
        events = summary.events,
        saves = summary.saves.len(),
        "replay complete"
    );

    let mut saves: Vec<String> = summary
        .saves
        .iter()
        .map(|report| report.ack.reference.clone())
        .collect();
    if canvas.session().is_some() {
        let index = frames.len();
        frames.push(export_frame(&mut canvas, &out_dir, &script.asset.id, index)?);
        let report = gateway.try_save(canvas.controller_mut(), Utc::now())?;
        saves.push(report.ack.reference);
    }
    for png in &frames {
        println!("frame: {}", png.display());
    }
    for reference in &saves {
        println!("saved: {reference}");
    }
    Ok(())
}
