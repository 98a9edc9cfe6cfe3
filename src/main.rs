use std::fs;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::{anyhow, Context, Result};
use clap::{ArgAction, Args, Parser, Subcommand};
use image::{ImageFormat, RgbaImage};
use serde::Serialize;
use tracing::{debug, Level};

use chat_gif::card::{load_card, CardOverrides};
use chat_gif::error_codes::{envelope_for, find_coded_error, CodedErrorKind};
use chat_gif::reply::DEFAULT_PAIRS;
use chat_gif::sequence::FrameState;
use chat_gif::{
    generate_gif, render_frame_rgba, GenerateOptions, GifSummary, RenderPlan, RoastProvider,
};

#[derive(Debug, Parser)]
#[command(name = "chat-gif")]
#[command(version = env!("CHAT_GIF_VERSION"))]
#[command(about = "Render a scripted chat exchange as an animated GIF")]
struct Cli {
    /// Increase log detail (-v info, -vv debug, -vvv trace).
    #[arg(short = 'v', long = "verbose", action = ArgAction::Count, global = true)]
    verbose: u8,
    /// Print results and errors as JSON.
    #[arg(long = "json", global = true, default_value_t = false)]
    json: bool,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Args)]
struct ConversationArgs {
    /// User message. Empty picks a canned exchange by seed.
    #[arg(long = "msg")]
    msg: Option<String>,
    /// Assistant reply; `{msg}` is replaced with the user message.
    #[arg(long = "reply")]
    reply: Option<String>,
    #[arg(long = "seed")]
    seed: Option<u64>,
    #[arg(long = "width")]
    width: Option<u32>,
    #[arg(long = "height")]
    height: Option<u32>,
    #[arg(long = "scale")]
    scale: Option<u32>,
    /// YAML card with any of the options above; flags win.
    #[arg(long = "card")]
    card: Option<PathBuf>,
}

impl ConversationArgs {
    fn resolve(self) -> Result<GenerateOptions> {
        let base = match &self.card {
            Some(path) => load_card(path)?,
            None => GenerateOptions::default(),
        };
        let overrides = CardOverrides {
            msg: self.msg,
            reply: self.reply,
            seed: self.seed,
            width: self.width,
            height: self.height,
            scale: self.scale,
        };
        Ok(overrides.apply(base).normalized())
    }
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Write the animated GIF.
    Render {
        #[command(flatten)]
        conversation: ConversationArgs,
        #[arg(short = 'o', long = "output")]
        output: PathBuf,
    },
    /// Print the per-frame animation states as JSON.
    Frames {
        #[command(flatten)]
        conversation: ConversationArgs,
    },
    /// Write one frame as a PNG.
    Preview {
        #[command(flatten)]
        conversation: ConversationArgs,
        #[arg(long = "frame")]
        frame: usize,
        #[arg(short = 'o', long = "output")]
        output: PathBuf,
    },
    /// Render every canned exchange into a directory.
    Defaults {
        #[arg(short = 'o', long = "output-dir")]
        output_dir: PathBuf,
    },
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.verbose);
    let json = cli.json;

    match run(cli.command, json) {
        Ok(()) => ExitCode::SUCCESS,
        Err(error) => report_error(&error, json),
    }
}

fn init_tracing(verbose: u8) {
    let level = match verbose {
        0 => Level::WARN,
        1 => Level::INFO,
        2 => Level::DEBUG,
        _ => Level::TRACE,
    };
    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn report_error(error: &anyhow::Error, json: bool) -> ExitCode {
    if json {
        match serde_json::to_string_pretty(&envelope_for(error)) {
            Ok(text) => eprintln!("{text}"),
            Err(_) => eprintln!("error: {error:#}"),
        }
    } else {
        eprintln!("error: {error:#}");
    }

    match find_coded_error(error).map(|coded| coded.kind) {
        Some(CodedErrorKind::Usage) => ExitCode::from(2),
        _ => ExitCode::FAILURE,
    }
}

fn run(command: Commands, json: bool) -> Result<()> {
    match command {
        Commands::Render {
            conversation,
            output,
        } => run_render(conversation.resolve()?, &output, json),
        Commands::Frames { conversation } => run_frames(conversation.resolve()?),
        Commands::Preview {
            conversation,
            frame,
            output,
        } => run_preview(conversation.resolve()?, frame, &output, json),
        Commands::Defaults { output_dir } => run_defaults(&output_dir, json),
    }
}

fn write_gif(options: &GenerateOptions, output: &Path) -> Result<GifSummary> {
    let generated = generate_gif(options, &RoastProvider)?;
    if let Some(parent) = output.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)
            .with_context(|| format!("failed to create directory {}", parent.display()))?;
    }
    fs::write(output, &generated.bytes)
        .with_context(|| format!("failed to write {}", output.display()))?;
    debug!(path = %output.display(), "wrote gif");
    Ok(generated.summary)
}

#[derive(Debug, Serialize)]
struct RenderReport<'a> {
    ok: bool,
    output: String,
    #[serde(flatten)]
    summary: &'a GifSummary,
}

fn run_render(options: GenerateOptions, output: &Path, json: bool) -> Result<()> {
    let summary = write_gif(&options, output)?;
    if json {
        let report = RenderReport {
            ok: true,
            output: output.display().to_string(),
            summary: &summary,
        };
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        println!(
            "Wrote {} ({} frames, {}x{}, {} bytes)",
            output.display(),
            summary.frame_count,
            summary.width,
            summary.height,
            summary.bytes
        );
        println!("sha256 {}", summary.sha256);
    }
    Ok(())
}

#[derive(Debug, Serialize)]
struct FramesReport<'a> {
    width: u32,
    height: u32,
    user: &'a str,
    reply: &'a str,
    frame_count: usize,
    frames: &'a [FrameState],
}

fn run_frames(options: GenerateOptions) -> Result<()> {
    let plan = RenderPlan::new(&options, &RoastProvider);
    let report = FramesReport {
        width: plan.width,
        height: plan.height,
        user: &plan.conversation.user,
        reply: &plan.conversation.reply,
        frame_count: plan.frame_count(),
        frames: &plan.frames,
    };
    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}

fn run_preview(options: GenerateOptions, frame: usize, output: &Path, json: bool) -> Result<()> {
    let fb = render_frame_rgba(&options, &RoastProvider, frame)?;
    let (width, height) = (fb.width(), fb.height());
    let image = RgbaImage::from_raw(width, height, fb.into_rgba())
        .ok_or_else(|| anyhow!("frame buffer does not match {width}x{height}"))?;
    image
        .save_with_format(output, ImageFormat::Png)
        .with_context(|| format!("failed to write {}", output.display()))?;

    if json {
        let value = serde_json::json!({
            "ok": true,
            "output": output.display().to_string(),
            "frame": frame,
            "width": width,
            "height": height,
        });
        println!("{}", serde_json::to_string_pretty(&value)?);
    } else {
        println!(
            "Wrote frame {} to {} ({}x{})",
            frame,
            output.display(),
            width,
            height
        );
    }
    Ok(())
}

fn run_defaults(output_dir: &Path, json: bool) -> Result<()> {
    fs::create_dir_all(output_dir)
        .with_context(|| format!("failed to create directory {}", output_dir.display()))?;

    let mut reports = Vec::with_capacity(DEFAULT_PAIRS.len());
    for (index, pair) in DEFAULT_PAIRS.iter().enumerate() {
        let options = GenerateOptions {
            seed: index as u64,
            ..GenerateOptions::default()
        };
        let output = output_dir.join(format!("{index}.gif"));
        let summary = write_gif(&options, &output)
            .with_context(|| format!("failed rendering canned exchange '{}'", pair.user))?;
        if !json {
            println!(
                "Wrote {} ({} frames) \"{}\"",
                output.display(),
                summary.frame_count,
                pair.user
            );
        }
        reports.push((output, summary));
    }

    if json {
        let list = reports
            .iter()
            .map(|(output, summary)| RenderReport {
                ok: true,
                output: output.display().to_string(),
                summary,
            })
            .collect::<Vec<_>>();
        println!("{}", serde_json::to_string_pretty(&list)?);
    }
    Ok(())
}
