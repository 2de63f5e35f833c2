use clap::Parser;
use picam::config::cli::{CaptureArgs, Command, OverlayAction, OverlayTarget};
use picam::core::boot_config::{apply_disable, apply_enable, OverlayStatus, WriteOutcome};
use picam::core::doctor::{self, CheckOutcome};
use picam::core::CaptureSettings;
use picam::domain::model::{DeviceCapabilities, IntervalSupport, ResolutionSupport};
use picam::utils::error::PicamError;
use picam::utils::{logger, validation::Validate};
use picam::{
    describe_device, BootConfig, CaptureEngine, CapturePipeline, CliConfig, LocalStorage,
    Result, V4l2Source,
};

#[tokio::main]
async fn main() {
    let config = CliConfig::parse();

    // 初始化日誌
    if config.log_json {
        logger::init_json_logger(config.verbose);
    } else {
        logger::init_cli_logger(config.verbose);
    }

    tracing::info!("Starting picam");
    tracing::debug!("CLI config: {:?}", config);

    let result = match &config.command {
        Command::Formats { device, json } => run_formats(device, *json).await,
        Command::Capture(args) => run_capture(args, config.monitor).await,
        Command::Overlay { action } => run_overlay(action),
        Command::Doctor => run_doctor().await,
    };

    if let Err(e) = result {
        tracing::error!(
            "❌ picam failed: {} (Category: {:?}, Severity: {:?})",
            e,
            e.category(),
            e.severity()
        );
        tracing::error!("💡 Recovery suggestion: {}", e.recovery_suggestion());

        eprintln!("❌ {}", e.user_friendly_message());
        eprintln!("💡 Suggestion: {}", e.recovery_suggestion());

        let exit_code = e.exit_code();
        if exit_code > 0 {
            std::process::exit(exit_code);
        }
    }
}

async fn run_formats(device: &str, json: bool) -> Result<()> {
    picam::utils::validation::validate_device_path("device", device)?;
    let capabilities = describe_device(V4l2Source::new(device)).await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&capabilities)?);
    } else {
        print_capabilities(&capabilities);
    }
    Ok(())
}

fn print_capabilities(capabilities: &DeviceCapabilities) {
    println!("📷 {}", capabilities.device);
    if capabilities.formats.is_empty() {
        println!("  (no formats reported)");
    }

    for format in &capabilities.formats {
        let mut flags = Vec::new();
        if format.compressed {
            flags.push("compressed");
        }
        if format.emulated {
            flags.push("emulated");
        }
        println!(
            "{} ({}){}",
            format.fourcc,
            format.description,
            if flags.is_empty() {
                String::new()
            } else {
                format!(" [{}]", flags.join(", "))
            }
        );

        match &format.resolutions {
            ResolutionSupport::Discrete { modes } => {
                for mode in modes {
                    let intervals = match &mode.intervals {
                        IntervalSupport::Discrete { intervals } => intervals
                            .iter()
                            .map(|i| format!("{:.1} fps", i.fps()))
                            .collect::<Vec<_>>()
                            .join(", "),
                        IntervalSupport::Stepwise { min, max, .. } => {
                            format!("{:.1}-{:.1} fps", max.fps(), min.fps())
                        }
                        IntervalSupport::Unknown => "intervals unknown".to_string(),
                    };
                    println!("  {}  {}", mode.resolution, intervals);
                }
            }
            ResolutionSupport::Stepwise { min, max, step } => {
                println!("  {} to {} in steps of {}", min, max, step);
            }
            ResolutionSupport::Unknown => println!("  resolutions unknown"),
        }
    }
}

async fn run_capture(args: &CaptureArgs, monitor: bool) -> Result<()> {
    let profile = args.resolve(monitor)?;

    // 驗證配置
    profile.validate()?;
    tracing::info!("✅ Capture profile validated");

    let request = profile.request();
    println!("📋 Capture Summary:");
    println!("  Device: {}", CaptureSettings::device(&profile));
    println!(
        "  Format: {} {} @ {:.1} fps",
        request.format,
        request.resolution,
        request.interval.fps()
    );
    println!("  Frames: {}", request.frame_count);
    println!("  Output: {}", profile.output_path());
    println!();

    let monitor_enabled = profile.monitoring_enabled();
    if monitor_enabled {
        tracing::info!("🔍 System monitoring enabled");
    }

    let storage = LocalStorage::new(profile.output_path().to_string());
    let source = V4l2Source::new(CaptureSettings::device(&profile));
    let pipeline = CapturePipeline::new(storage, source, profile);
    let engine = CaptureEngine::new_with_monitoring(pipeline, monitor_enabled);

    let report = engine.run().await?;

    println!("✅ Captured {} frames ({} bytes)", report.frames_written, report.bytes_written);
    if report.frames_skipped > 0 {
        println!("⚠️  Skipped {} empty frames", report.frames_skipped);
    }
    match &report.archive {
        Some(archive) => println!("📁 Archive saved to: {}", archive),
        None => {
            for file in &report.files {
                println!("📁 {}", file);
            }
        }
    }
    Ok(())
}

fn load_boot_config(target: &OverlayTarget) -> Result<BootConfig> {
    picam::utils::validation::validate_overlay_name("overlay", &target.overlay)?;
    tracing::debug!("Reading boot config from {}", target.config);
    BootConfig::load(&target.config)
}

fn save_boot_config(config: &BootConfig, target: &OverlayTarget, dry_run: bool) -> Result<()> {
    match config.commit(&target.config, dry_run)? {
        WriteOutcome::DryRun(text) => print!("{}", text),
        WriteOutcome::Written { backup } => {
            if let Some(backup) = backup {
                println!("💾 Previous config saved to {}", backup.display());
            }
            println!("✅ Updated {}", target.config);
            println!("🔄 Reboot for the change to take effect");
        }
    }
    Ok(())
}

fn run_overlay(action: &OverlayAction) -> Result<()> {
    match action {
        OverlayAction::Status { target } => {
            let config = load_boot_config(target)?;
            match config.overlay_status(&target.overlay) {
                OverlayStatus::Present => println!("✅ dtoverlay={} is enabled", target.overlay),
                OverlayStatus::PresentUnderFilter { section } => println!(
                    "⚠️  dtoverlay={} is only enabled under [{}]",
                    target.overlay, section
                ),
                OverlayStatus::Absent => println!("❌ dtoverlay={} is not enabled", target.overlay),
            }
            match config.camera_auto_detect() {
                Some(true) => println!("ℹ️  camera_auto_detect=1 (auto-detection overrides manual overlays)"),
                Some(false) => println!("ℹ️  camera_auto_detect=0"),
                None => println!("ℹ️  camera_auto_detect not set"),
            }
            Ok(())
        }
        OverlayAction::Enable {
            target,
            keep_auto_detect,
            dry_run,
        } => {
            let mut config = load_boot_config(target)?;
            if !apply_enable(&mut config, &target.overlay, *keep_auto_detect) {
                println!("✅ dtoverlay={} is already enabled", target.overlay);
                return Ok(());
            }
            save_boot_config(&config, target, *dry_run)
        }
        OverlayAction::Disable { target, dry_run } => {
            let mut config = load_boot_config(target)?;
            if !apply_disable(&mut config, &target.overlay) {
                println!("✅ dtoverlay={} is not enabled, nothing to do", target.overlay);
                return Ok(());
            }
            save_boot_config(&config, target, *dry_run)
        }
    }
}

async fn run_doctor() -> Result<()> {
    let path_var = std::env::var_os("PATH").unwrap_or_default();
    let report = doctor::run_checks(doctor::default_checks(), &path_var).await?;

    println!("🩺 Camera toolchain:");
    for (check, outcome) in &report.results {
        match outcome {
            CheckOutcome::Ok { version } => println!(
                "  ✅ {} ({}) {}",
                check.name,
                check.program,
                version.as_deref().unwrap_or("")
            ),
            CheckOutcome::Missing => {
                println!("  ❌ {} ({}) not found", check.name, check.program)
            }
            CheckOutcome::Failed { status, stderr } => println!(
                "  ❌ {} ({}) failed{}: {}",
                check.name,
                check.program,
                status.map(|c| format!(" with status {}", c)).unwrap_or_default(),
                stderr
            ),
        }
    }

    match report.install_hint() {
        None => {
            println!("✅ All tools available");
            Ok(())
        }
        Some(hint) => {
            println!("💡 {}", hint);
            Err(PicamError::ToolCheckError {
                tool: report.missing_packages().join(", "),
                message: "required packages are missing".to_string(),
            })
        }
    }
}
