use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand};

use videoforge::assemble::{assemble, burn_subtitles, AssemblyOptions};
use videoforge::captions::write_srt;
use videoforge::config::Config;
use videoforge::imagen::{
    generate_scene_images, AssetManifest, ImageCache, ImageClient, ImageParams, ImagenError,
    FAL_API_KEY_ENV, MANIFEST_FILE,
};
use videoforge::probe::{audio_duration_secs, Capabilities};
use videoforge::publish::{PublishClient, VideoMeta, CREDENTIALS_FILE, TOKEN_FILE};
use videoforge::render::{
    monitor_render, Edit, EditSpec, MonitorOptions, MonitorOutcome, RenderClient,
    SHOTSTACK_API_KEY_ENV,
};
use videoforge::script::{Script, DEFAULT_TARGET_WORDS};
use videoforge::storage::{AssetStore, StorageTarget, UploadedAssets, UPLOADED_ASSETS_FILE};
use videoforge::transcode::setup_interrupt_handler;
use videoforge::tts::{TtsClient, ELEVENLABS_API_KEY_ENV};

/// videoforge: AI video production pipeline
#[derive(Parser)]
#[command(name = "videoforge")]
#[command(version, about = "AI video production pipeline")]
#[command(long_about = "Generate scene images, synthesize narration, and assemble \
    them into a published video, either remotely through a rendering API or \
    locally with ffmpeg.")]
#[command(after_help = "EXAMPLES:
    # Check which external tools and API keys are available
    videoforge doctor

    # Generate scene images for a script
    videoforge images --script script.json

    # Synthesize narration
    videoforge narrate --script script.json

    # Assemble locally with ffmpeg
    videoforge assemble

    # Full local pipeline
    videoforge pipeline --script script.json

    # Remote rendering
    videoforge upload && videoforge render
    videoforge monitor --render-id <id>")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Config file path
    #[arg(long, short, global = true)]
    config: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Show detected tools and configured credentials
    Doctor,
    /// Generate scene images from a script
    Images {
        /// Script JSON file
        #[arg(long)]
        script: PathBuf,
    },
    /// Synthesize narration audio from a script
    Narrate {
        /// Script JSON file
        #[arg(long)]
        script: PathBuf,
    },
    /// Generate SRT captions from a script and narration
    Captions {
        /// Script JSON file
        #[arg(long)]
        script: PathBuf,
        /// Narration audio (default: <output>/narration.mp3)
        #[arg(long)]
        audio: Option<PathBuf>,
    },
    /// Assemble the video locally with ffmpeg
    Assemble {
        /// Images directory (default: <output>/generated_images)
        #[arg(long)]
        images_dir: Option<PathBuf>,
        /// Narration audio (default: <output>/narration.mp3)
        #[arg(long)]
        narration: Option<PathBuf>,
        /// Output video path (default: <output>/final_video.mp4)
        #[arg(long)]
        output: Option<PathBuf>,
        /// SRT file to burn into the video
        #[arg(long)]
        subtitles: Option<PathBuf>,
    },
    /// Upload generated assets to storage for remote rendering
    Upload,
    /// Submit a remote render job from uploaded assets
    Render,
    /// Poll a render job and download the result
    Monitor {
        /// Render job ID from `videoforge render`
        #[arg(long)]
        render_id: String,
        /// Output video path (default: <output>/final_video.mp4)
        #[arg(long)]
        output: Option<PathBuf>,
    },
    /// Publish a video to YouTube
    Publish {
        /// Video file to upload
        #[arg(long)]
        video: PathBuf,
        /// Video title
        #[arg(long)]
        title: String,
        /// Video description
        #[arg(long)]
        description: Option<String>,
        /// Comma-separated tags
        #[arg(long, value_delimiter = ',')]
        tags: Vec<String>,
        /// Privacy status: public, unlisted or private
        #[arg(long, default_value = "unlisted")]
        privacy: String,
    },
    /// Run the full local pipeline: images, narration, captions, assembly
    Pipeline {
        /// Script JSON file
        #[arg(long)]
        script: PathBuf,
        /// Publish to YouTube after assembly
        #[arg(long)]
        publish: bool,
    },
}

fn load_env() {
    // Load .env file, don't override existing env vars.
    // dotenv() returns Err if .env doesn't exist, which is fine.
    let _ = dotenv::dotenv();
}

fn load_config(path: Option<&Path>) -> Config {
    match Config::load(path) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Warning: {}", e);
            eprintln!("Using default settings.\n");
            Config::default()
        }
    }
}

fn images_dir(cfg: &Config) -> PathBuf {
    cfg.output.dir.join("generated_images")
}

fn narration_path(cfg: &Config) -> PathBuf {
    cfg.output.dir.join("narration.mp3")
}

fn captions_path(cfg: &Config) -> PathBuf {
    cfg.output.dir.join("captions.srt")
}

fn final_video_path(cfg: &Config) -> PathBuf {
    cfg.output.dir.join("final_video.mp4")
}

fn runtime() -> Result<tokio::runtime::Runtime, String> {
    tokio::runtime::Runtime::new().map_err(|e| format!("Failed to create async runtime: {}", e))
}

fn run_doctor(cfg: &Config) -> Result<(), String> {
    let caps = Capabilities::detect();

    println!("videoforge v{}", env!("CARGO_PKG_VERSION"));
    println!();
    println!("Tools:");
    match &caps.ffmpeg {
        Some(path) => println!("  ffmpeg:   {}", path.display()),
        None => println!("  ffmpeg:   NOT FOUND (local assembly unavailable)"),
    }
    match &caps.ffprobe {
        Some(path) => println!("  ffprobe:  {}", path.display()),
        None => println!("  ffprobe:  NOT FOUND (durations will be estimated from file size)"),
    }

    println!();
    println!("Credentials:");
    for (name, env) in [
        ("image generation", FAL_API_KEY_ENV),
        ("narration", ELEVENLABS_API_KEY_ENV),
        ("remote rendering", SHOTSTACK_API_KEY_ENV),
    ] {
        let state = if std::env::var(env).is_ok() {
            "set"
        } else {
            "NOT SET"
        };
        println!("  {:18} {} = {}", name, env, state);
    }

    println!();
    println!("Output directory: {}", cfg.output.dir.display());
    println!(
        "Target: {}x{} @ {} fps",
        cfg.output.width, cfg.output.height, cfg.output.fps
    );
    Ok(())
}

fn run_images(cfg: &Config, script_path: &Path) -> Result<(), String> {
    let script = Script::load(script_path).map_err(|e| e.to_string())?;
    let prompts = script.image_prompts();
    println!("Script: {} ({} image prompts)", script.title, prompts.len());

    let rt = runtime()?;
    rt.block_on(async {
        let client = ImageClient::new()
            .map_err(|e| match e {
                ImagenError::MissingApiKey => format!(
                    "{} environment variable is not set.\n\n\
                     Add your API key to a .env file:\n\
                         echo '{}=your-api-key-here' >> .env",
                    FAL_API_KEY_ENV, FAL_API_KEY_ENV
                ),
                other => format!("Failed to create image client: {}", other),
            })?
            .model(cfg.images.model.clone());
        let cache = ImageCache::with_default_dir();
        let params = ImageParams {
            width: Some(cfg.output.width),
            height: Some(cfg.output.height),
            seed: None,
        };

        let dir = images_dir(cfg);
        let produced = generate_scene_images(&client, &cache, &prompts, &params, &dir)
            .await
            .map_err(|e| format!("Image generation failed: {}", e))?;

        println!(
            "Generated {}/{} images in {}",
            produced.len(),
            prompts.len(),
            dir.display()
        );
        Ok(())
    })
}

fn run_narrate(cfg: &Config, script_path: &Path) -> Result<(), String> {
    let script = Script::load(script_path).map_err(|e| e.to_string())?;
    let text = script.narration_text(DEFAULT_TARGET_WORDS);
    println!(
        "Script: {} ({} words of narration)",
        script.title,
        text.split_whitespace().count()
    );

    let rt = runtime()?;
    rt.block_on(async {
        let mut client = TtsClient::new().map_err(|e| match e {
            videoforge::tts::TtsError::MissingApiKey => format!(
                "{} environment variable is not set.\n\n\
                 Add your API key to a .env file:\n\
                     echo '{}=your-api-key-here' >> .env",
                ELEVENLABS_API_KEY_ENV, ELEVENLABS_API_KEY_ENV
            ),
            other => format!("Failed to create TTS client: {}", other),
        })?;
        if let Some(voice) = &cfg.tts.voice_id {
            client = client.voice(voice.clone());
        }
        if let Some(model) = &cfg.tts.model_id {
            client = client.model(model.clone());
        }

        let dest = narration_path(cfg);
        client
            .synthesize_with_quota_fallback(&text, &dest)
            .await
            .map_err(|e| format!("Narration synthesis failed: {}", e))?;

        let caps = Capabilities::detect();
        let duration = audio_duration_secs(&caps, &dest).map_err(|e| e.to_string())?;
        println!("Narration saved: {} ({:.1}s)", dest.display(), duration);
        Ok(())
    })
}

fn run_captions(cfg: &Config, script_path: &Path, audio: Option<&Path>) -> Result<(), String> {
    let script = Script::load(script_path).map_err(|e| e.to_string())?;

    let default_audio = narration_path(cfg);
    let audio = audio.unwrap_or(&default_audio);
    if !audio.exists() {
        return Err(format!(
            "Narration not found: {}\nRun `videoforge narrate` first.",
            audio.display()
        ));
    }

    let caps = Capabilities::detect();
    let duration = audio_duration_secs(&caps, audio).map_err(|e| e.to_string())?;
    let dest = captions_path(cfg);
    write_srt(&dest, &script.sections, duration).map_err(|e| e.to_string())?;
    println!(
        "Captions saved: {} ({} sections over {:.1}s)",
        dest.display(),
        script.sections.len(),
        duration
    );
    Ok(())
}

/// Collect scene images: manifest order when present, directory scan otherwise.
fn collect_images(dir: &Path) -> Vec<PathBuf> {
    let manifest = AssetManifest::load(&dir.join(MANIFEST_FILE));
    if !manifest.images.is_empty() {
        return manifest
            .local_paths()
            .into_iter()
            .filter(|p| p.exists())
            .collect();
    }

    let mut images: Vec<PathBuf> = std::fs::read_dir(dir)
        .map(|entries| {
            entries
                .filter_map(|e| e.ok())
                .map(|e| e.path())
                .filter(|p| p.extension().and_then(|e| e.to_str()) == Some("png"))
                .collect()
        })
        .unwrap_or_default();
    images.sort();
    images
}

fn run_assemble(
    cfg: &Config,
    images_override: Option<&Path>,
    narration_override: Option<&Path>,
    output_override: Option<&Path>,
    subtitles: Option<&Path>,
) -> Result<(), String> {
    let images_from = images_override
        .map(Path::to_path_buf)
        .unwrap_or_else(|| images_dir(cfg));
    let narration = narration_override
        .map(Path::to_path_buf)
        .unwrap_or_else(|| narration_path(cfg));
    let output = output_override
        .map(Path::to_path_buf)
        .unwrap_or_else(|| final_video_path(cfg));

    let images = collect_images(&images_from);
    let narration = if narration.exists() {
        println!(
            "Narration: {} ({:.1} MB)",
            narration.display(),
            std::fs::metadata(&narration)
                .map(|m| m.len() as f64 / 1024.0 / 1024.0)
                .unwrap_or(0.0)
        );
        Some(narration)
    } else {
        println!("Narration: not found, assembling without audio");
        None
    };
    println!("Images: {} found in {}", images.len(), images_from.display());

    let caps = Capabilities::detect();
    let opts = AssemblyOptions {
        width: cfg.output.width,
        height: cfg.output.height,
        fps: cfg.output.fps,
        per_image_secs: cfg.images.per_image_secs,
    };

    let report = assemble(&caps, &images, narration.as_deref(), &output, &opts).map_err(|e| {
        let mut msg = format!("Video assembly failed: {}", e);
        if let videoforge::assemble::AssembleError::Chain(chain) = &e {
            for failure in chain.failures() {
                msg.push_str(&format!("\n  {} failed: {}", failure.name, failure.reason));
            }
            msg.push_str("\n\nInstall ffmpeg to enable local assembly.");
        }
        msg
    })?;

    for failure in &report.failures {
        println!("  method {} failed: {}", failure.name, failure.reason);
    }
    println!(
        "Video assembled with method '{}': {} ({:.1}s)",
        report.method,
        report.output.display(),
        report.duration_secs
    );

    if let Some(srt) = subtitles {
        let subbed = output.with_file_name("final_video_subbed.mp4");
        match burn_subtitles(&caps, &output, srt, &subbed) {
            Ok(()) => println!("Subtitled video: {}", subbed.display()),
            Err(e) => println!("Subtitle burn-in failed (keeping plain video): {}", e),
        }
    }

    Ok(())
}

fn run_upload(cfg: &Config) -> Result<(), String> {
    let dir = images_dir(cfg);
    let images = collect_images(&dir);
    let narration = narration_path(cfg);

    if images.is_empty() && !narration.exists() {
        return Err("Nothing to upload: run `videoforge images` and `videoforge narrate` first."
            .to_string());
    }

    let rt = runtime()?;
    rt.block_on(async {
        let store = AssetStore::connect(StorageTarget {
            bucket: cfg.storage.bucket.clone(),
            region: cfg.storage.region.clone(),
            prefix: cfg.storage.prefix.clone(),
        })
        .await;

        store
            .ensure_bucket()
            .await
            .map_err(|e| format!("Storage setup failed: {}", e))?;

        let mut uploaded = UploadedAssets::default();

        for image in &images {
            let url = store
                .upload_file(image)
                .await
                .map_err(|e| format!("Upload failed for {}: {}", image.display(), e))?;
            println!("  uploaded {}", url);
            uploaded.images.push(url);
        }

        if narration.exists() {
            let url = store
                .upload_file(&narration)
                .await
                .map_err(|e| format!("Upload failed for {}: {}", narration.display(), e))?;
            println!("  uploaded {}", url);
            uploaded.narration = Some(url);
        }

        let path = cfg.output.dir.join(UPLOADED_ASSETS_FILE);
        uploaded.save(&path).map_err(|e| e.to_string())?;
        println!(
            "Uploaded {} assets; manifest written to {}",
            uploaded.images.len() + uploaded.narration.iter().count(),
            path.display()
        );
        Ok(())
    })
}

fn run_render(cfg: &Config) -> Result<(), String> {
    let assets_path = cfg.output.dir.join(UPLOADED_ASSETS_FILE);
    let assets = UploadedAssets::load(&assets_path).map_err(|_| {
        format!(
            "Uploaded assets manifest not found: {}\nRun `videoforge upload` first.",
            assets_path.display()
        )
    })?;

    let spec = EditSpec {
        width: cfg.output.width,
        height: cfg.output.height,
        fps: cfg.output.fps,
        bitrate: cfg.render.bitrate.clone(),
        per_image_secs: cfg.images.per_image_secs,
    };
    let edit = Edit::slideshow(&assets.images, assets.narration.as_deref(), &spec);
    println!(
        "Submitting render: {} clips, {:.1}s timeline",
        assets.images.len(),
        edit.duration_secs()
    );

    let rt = runtime()?;
    rt.block_on(async {
        let mut client = RenderClient::new().map_err(|e| {
            format!(
                "Failed to create render client: {}\nSet {} in .env or the environment.",
                e, SHOTSTACK_API_KEY_ENV
            )
        })?;
        if let Some(base) = &cfg.render.base_url {
            client = client.base_url(base.clone());
        }

        let render_id = client
            .submit(&edit)
            .await
            .map_err(|e| format!("Render submission failed: {}", e))?;

        let job_path = cfg.output.dir.join("render_job.json");
        let doc = serde_json::json!({ "render_id": render_id });
        let encoded = serde_json::to_string_pretty(&doc).map_err(|e| e.to_string())?;
        std::fs::write(&job_path, encoded).map_err(|e| e.to_string())?;

        println!("Render job submitted: {}", render_id);
        println!("Track it with: videoforge monitor --render-id {}", render_id);
        Ok(())
    })
}

fn run_monitor(cfg: &Config, render_id: &str, output_override: Option<&Path>) -> Result<(), String> {
    let output = output_override
        .map(Path::to_path_buf)
        .unwrap_or_else(|| final_video_path(cfg));

    let rt = runtime()?;
    rt.block_on(async {
        let mut client = RenderClient::new().map_err(|e| {
            format!(
                "Failed to create render client: {}\nSet {} in .env or the environment.",
                e, SHOTSTACK_API_KEY_ENV
            )
        })?;
        if let Some(base) = &cfg.render.base_url {
            client = client.base_url(base.clone());
        }

        let opts = MonitorOptions {
            interval: std::time::Duration::from_secs(cfg.render.poll_interval_secs),
            max_checks: cfg.render.max_checks,
        };

        let outcome = monitor_render(&client, render_id, &output, &opts)
            .await
            .map_err(|e| format!("Monitoring failed: {}", e))?;

        match outcome {
            MonitorOutcome::Completed { path } => {
                println!("Render complete: {}", path.display());
                Ok(())
            }
            MonitorOutcome::Failed { error } => Err(format!("Render failed: {}", error)),
            MonitorOutcome::TimedOut { checks } => Err(format!(
                "Render did not finish within {} checks.\n\
                 Check again later with: videoforge monitor --render-id {}",
                checks, render_id
            )),
        }
    })
}

fn run_publish(
    video: &Path,
    title: &str,
    description: Option<&str>,
    tags: Vec<String>,
    privacy: &str,
) -> Result<(), String> {
    if !video.exists() {
        return Err(format!("Video file not found: {}", video.display()));
    }

    let rt = runtime()?;
    rt.block_on(async {
        let mut client = PublishClient::load(Path::new(CREDENTIALS_FILE), Path::new(TOKEN_FILE))
            .map_err(|e| e.to_string())?;

        let meta = VideoMeta {
            title: title.to_string(),
            description: description.unwrap_or_default().to_string(),
            tags,
            privacy: privacy.to_string(),
        };

        let video_id = client
            .upload(video, &meta)
            .await
            .map_err(|e| format!("Publish failed: {}", e))?;

        println!("Published: https://youtu.be/{}", video_id);
        Ok(())
    })
}

fn run_pipeline(cfg: &Config, script_path: &Path, publish: bool) -> Result<(), String> {
    println!("=== videoforge pipeline ===");
    println!();

    // Step 1: images (optional: missing key just skips the step)
    if std::env::var(FAL_API_KEY_ENV).is_ok() {
        println!("[1/4] Generating scene images...");
        if let Err(e) = run_images(cfg, script_path) {
            println!("  image generation failed, continuing without images: {}", e);
        }
    } else {
        println!("[1/4] Skipping images ({} not set)", FAL_API_KEY_ENV);
    }

    // Step 2: narration (optional the same way)
    if std::env::var(ELEVENLABS_API_KEY_ENV).is_ok() {
        println!("[2/4] Synthesizing narration...");
        if let Err(e) = run_narrate(cfg, script_path) {
            println!("  narration failed, continuing without audio: {}", e);
        }
    } else {
        println!("[2/4] Skipping narration ({} not set)", ELEVENLABS_API_KEY_ENV);
    }

    // Step 3: captions need narration on disk
    let narration = narration_path(cfg);
    let srt = captions_path(cfg);
    if narration.exists() {
        println!("[3/4] Generating captions...");
        if let Err(e) = run_captions(cfg, script_path, Some(&narration)) {
            println!("  captions failed, continuing without subtitles: {}", e);
        }
    } else {
        println!("[3/4] Skipping captions (no narration)");
    }

    // Step 4: local assembly through the fallback chain
    println!("[4/4] Assembling video...");
    let subtitles = if srt.exists() { Some(srt.as_path()) } else { None };
    run_assemble(cfg, None, None, None, subtitles)?;

    if publish {
        let script = Script::load(script_path).map_err(|e| e.to_string())?;
        let video = final_video_path(cfg);
        println!();
        println!("Publishing...");
        run_publish(
            &video,
            &script.title,
            Some(&script.summary),
            Vec::new(),
            "unlisted",
        )?;
    }

    println!();
    println!("Pipeline complete.");
    Ok(())
}

fn main() {
    // Load .env file before anything else
    load_env();

    if let Err(e) = setup_interrupt_handler() {
        eprintln!("Warning: failed to install Ctrl-C handler: {}", e);
    }

    let cli = Cli::parse();
    let cfg = load_config(cli.config.as_deref());

    let result = match cli.command {
        Commands::Doctor => run_doctor(&cfg),
        Commands::Images { script } => run_images(&cfg, &script),
        Commands::Narrate { script } => run_narrate(&cfg, &script),
        Commands::Captions { script, audio } => {
            run_captions(&cfg, &script, audio.as_deref())
        }
        Commands::Assemble {
            images_dir,
            narration,
            output,
            subtitles,
        } => run_assemble(
            &cfg,
            images_dir.as_deref(),
            narration.as_deref(),
            output.as_deref(),
            subtitles.as_deref(),
        ),
        Commands::Upload => run_upload(&cfg),
        Commands::Render => run_render(&cfg),
        Commands::Monitor { render_id, output } => {
            run_monitor(&cfg, &render_id, output.as_deref())
        }
        Commands::Publish {
            video,
            title,
            description,
            tags,
            privacy,
        } => run_publish(&video, &title, description.as_deref(), tags, &privacy),
        Commands::Pipeline { script, publish } => run_pipeline(&cfg, &script, publish),
    };

    if let Err(e) = result {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}
