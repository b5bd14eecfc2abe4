use anyhow::{bail, Context};
use clap::{Arg, ArgAction, ArgGroup, Command};
use log::{info, warn};
use std::io::{BufRead, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use radio_edit::edl::format_timestamp;
use radio_edit::lyrics::read_lyrics;
use radio_edit::{dependencies, BatchSummary, ConfigBuilder, ConfigFile, DemucsModel, WhisperModel};
use radio_edit::{Pipeline, PipelineResult, ProfanityMatch, ProgressOperation, RunOptions, RunStatus, Workflow};

fn build_cli() -> Command {
    Command::new("radio-edit")
        .about("Mutes profanity in songs while the instrumental keeps playing")
        .version(env!("CARGO_PKG_VERSION"))
        .arg(
            Arg::new("files")
                .value_name("FILES")
                .help("Audio files to process")
                .num_args(1..)
                .required_unless_present("list-profiles")
                .value_parser(clap::value_parser!(PathBuf)),
        )
        .arg(
            Arg::new("output-dir")
                .short('o')
                .long("output-dir")
                .value_name("DIR")
                .help("Directory for cleaned files (defaults to each input's directory)")
                .value_parser(clap::value_parser!(PathBuf)),
        )
        .arg(
            Arg::new("overwrite")
                .short('w')
                .long("overwrite")
                .help("Overwrite originals instead of writing '(clean)' copies")
                .action(ArgAction::SetTrue),
        )
        .arg(
            Arg::new("preview")
                .short('p')
                .long("preview")
                .help("List detected profanity and confirm before editing")
                .action(ArgAction::SetTrue),
        )
        .arg(
            Arg::new("profanity-list")
                .short('l')
                .long("profanity-list")
                .value_name("FILE")
                .help("Word list file, one word per line")
                .value_parser(clap::value_parser!(PathBuf)),
        )
        .arg(
            Arg::new("whisper-model")
                .short('m')
                .long("whisper-model")
                .value_name("MODEL")
                .help("Whisper model size; larger is more accurate but slower [default: base]")
                .value_parser(["tiny", "base", "small", "medium", "large"]),
        )
        .arg(
            Arg::new("demucs-model")
                .long("demucs-model")
                .value_name("MODEL")
                .help("Demucs model for stem separation [default: htdemucs]")
                .value_parser(["htdemucs", "htdemucs_ft", "mdx_extra"]),
        )
        .arg(
            Arg::new("keep-temp")
                .long("keep-temp")
                .help("Keep intermediate stems and mixes for debugging")
                .action(ArgAction::SetTrue),
        )
        .arg(
            Arg::new("detect-only")
                .short('d')
                .long("detect-only")
                .help("Only report profanity, never write audio")
                .action(ArgAction::SetTrue),
        )
        .arg(
            Arg::new("generate-edl")
                .short('e')
                .long("generate-edl")
                .help("Write an editable EDL and keep stems for a later --apply-edl")
                .action(ArgAction::SetTrue),
        )
        .arg(
            Arg::new("apply-edl")
                .long("apply-edl")
                .value_name("PATH")
                .help("Apply an EDL; defaults to <name>.edl.json next to each input")
                .num_args(0..=1)
                .require_equals(true)
                .default_missing_value(""),
        )
        .group(
            ArgGroup::new("workflow")
                .args(["detect-only", "generate-edl", "apply-edl"])
                .multiple(false),
        )
        .arg(
            Arg::new("lyrics")
                .long("lyrics")
                .value_name("FILE")
                .help("Reference lyrics to correct the transcript against")
                .value_parser(clap::value_parser!(PathBuf)),
        )
        .arg(
            Arg::new("jobs")
                .short('j')
                .long("jobs")
                .value_name("N")
                .help("Files to process concurrently [default: 1]")
                .value_parser(clap::value_parser!(usize)),
        )
        .arg(
            Arg::new("config")
                .short('c')
                .long("config")
                .value_name("FILE")
                .help("Configuration file (YAML/JSON)")
                .value_parser(clap::value_parser!(PathBuf)),
        )
        .arg(
            Arg::new("profile")
                .long("profile")
                .value_name("NAME")
                .help("Configuration profile to use (from config file)"),
        )
        .arg(
            Arg::new("list-profiles")
                .long("list-profiles")
                .help("List available configuration profiles")
                .action(ArgAction::SetTrue),
        )
        .arg(
            Arg::new("no-progress")
                .long("no-progress")
                .help("Disable progress indicators")
                .action(ArgAction::SetTrue),
        )
        .arg(
            Arg::new("verbose")
                .long("verbose")
                .help("Enable verbose logging")
                .action(ArgAction::SetTrue),
        )
}

async fn load_config_file(matches: &clap::ArgMatches) -> anyhow::Result<Option<ConfigFile>> {
    Ok(match matches.get_one::<PathBuf>("config") {
        Some(path) => Some(
            ConfigFile::load(path)
                .await
                .with_context(|| format!("Failed to load config file {}", path.display()))?,
        ),
        None => ConfigFile::load_from_default_locations().await,
    })
}

fn print_profiles(config_file: &ConfigFile) {
    println!("Available configuration profiles:");
    for name in config_file.list_profiles() {
        println!(
            "  {}: {}",
            name,
            config_file.profile_description(&name).unwrap_or("No description")
        );
    }
}

fn build_config(
    matches: &clap::ArgMatches,
    config_file: Option<&ConfigFile>,
) -> anyhow::Result<radio_edit::Config> {
    let mut builder = ConfigBuilder::new();

    match (config_file, matches.get_one::<String>("profile")) {
        (Some(cf), Some(profile)) => builder = cf.apply_profile_to_builder(profile, builder)?,
        (Some(cf), None) => builder = cf.apply_to_builder(builder)?,
        (None, Some(profile)) => {
            builder = ConfigFile::default().apply_profile_to_builder(profile, builder)?;
        }
        (None, None) => {}
    }

    if let Some(model) = matches.get_one::<String>("whisper-model") {
        builder = builder.whisper_model(model.parse::<WhisperModel>()?);
    }
    if let Some(model) = matches.get_one::<String>("demucs-model") {
        builder = builder.demucs_model(model.parse::<DemucsModel>()?);
    }
    if let Some(list) = matches.get_one::<PathBuf>("profanity-list") {
        builder = builder.profanity_list(list.clone());
    }
    if matches.get_flag("keep-temp") {
        builder = builder.keep_temp_files(true);
    }
    if let Some(&jobs) = matches.get_one::<usize>("jobs") {
        builder = builder.jobs(jobs)?;
    }

    Ok(builder.build()?)
}

fn workflow_from(matches: &clap::ArgMatches) -> Workflow {
    if matches.get_flag("detect-only") {
        Workflow::DetectOnly
    } else if matches.get_flag("generate-edl") {
        Workflow::GenerateEdl
    } else if let Some(path) = matches.get_one::<String>("apply-edl") {
        Workflow::ApplyEdl((!path.is_empty()).then(|| PathBuf::from(path)))
    } else {
        Workflow::Filter
    }
}

fn print_profanities(matches: &[ProfanityMatch]) {
    println!("\nDetected profanities:");
    println!("{}", "-".repeat(50));
    for (i, m) in matches.iter().enumerate() {
        println!(
            "  {:3}. [{} - {}] {:?}",
            i + 1,
            format_timestamp(m.start),
            format_timestamp(m.end),
            m.observed_word
        );
    }
    println!("{}", "-".repeat(50));
    println!("Total: {} profanities found\n", matches.len());
}

/// Ask on stdin; anything but an explicit "n" proceeds
fn confirm_on_stdin(input: &Path, matches: &[ProfanityMatch]) -> bool {
    tokio::task::block_in_place(|| {
        println!("\n{}", input.display());
        print_profanities(matches);
        print!("Proceed with cleaning? [Y/n] ");
        if std::io::stdout().flush().is_err() {
            return false;
        }
        let mut answer = String::new();
        match std::io::stdin().lock().read_line(&mut answer) {
            Ok(_) => !answer.trim().eq_ignore_ascii_case("n") && !answer.trim().eq_ignore_ascii_case("no"),
            Err(_) => false,
        }
    })
}

fn report(result: &PipelineResult, workflow: &Workflow) {
    println!("\n{}", "=".repeat(60));
    println!("{}", result.input_path.display());
    println!("{}", "=".repeat(60));

    if let (RunStatus::Failed, Some(error)) = (result.status, &result.error) {
        eprintln!("Error: {}", error);
        return;
    }
    if result.status == RunStatus::Cancelled {
        println!("Cancelled, file left untouched.");
        return;
    }

    match workflow {
        Workflow::DetectOnly => {
            if result.matches.is_empty() {
                println!("No profanity detected!");
            } else {
                print_profanities(&result.matches);
            }
        }
        Workflow::GenerateEdl => match (&result.edl_path, &result.cache_dir) {
            (Some(edl), Some(stems)) => {
                print_profanities(&result.matches);
                println!("EDL saved to: {}", edl.display());
                println!("Stems saved to: {}", stems.display());
            }
            _ => println!("No profanity found, no EDL generated."),
        },
        Workflow::ApplyEdl(_) => match &result.output_path {
            Some(output) => println!("Applied {} edits -> {}", result.matches.len(), output.display()),
            None => println!("No edits in EDL file."),
        },
        Workflow::Filter => match &result.output_path {
            Some(output) => {
                println!("Cleaned {} profanities -> {}", result.matches.len(), output.display());
                if let Some(audit) = &result.edl_path {
                    println!("Edit log: {}", audit.display());
                }
            }
            None => println!("No profanity found, file unchanged."),
        },
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let matches = build_cli().get_matches();

    let default_filter = if matches.get_flag("verbose") { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_filter)).init();

    let config_file = load_config_file(&matches).await?;

    if matches.get_flag("list-profiles") {
        print_profiles(config_file.as_ref().unwrap_or(&ConfigFile::default()));
        return Ok(());
    }

    let mut config = build_config(&matches, config_file.as_ref())?;
    let preview = matches.get_flag("preview");
    if preview && config.jobs > 1 {
        warn!("--preview prompts for each file, running one file at a time");
        config.jobs = 1;
    }

    let files: Vec<PathBuf> = matches
        .get_many::<PathBuf>("files")
        .map(|files| files.cloned().collect())
        .unwrap_or_default();
    let workflow = workflow_from(&matches);

    let lyrics = match matches.get_one::<PathBuf>("lyrics") {
        Some(path) => {
            let text = read_lyrics(path).await?;
            info!("Loaded lyrics from {}", path.display());
            Some(text)
        }
        None => None,
    };

    let options = RunOptions {
        output_path: None,
        output_dir: matches
            .get_one::<PathBuf>("output-dir")
            .cloned()
            .or_else(|| config_file.as_ref().and_then(|cf| cf.output_directory.clone())),
        overwrite: matches.get_flag("overwrite"),
        lyrics,
    };

    let show_progress = !matches.get_flag("no-progress")
        && !preview
        && config_file.as_ref().and_then(|cf| cf.show_progress).unwrap_or(true);
    let progress = ProgressOperation::new(show_progress);

    progress
        .with_spinner("Validating system dependencies", dependencies::validate_dependencies())
        .await?;

    info!("Starting radio-edit with config: {:?}", config);
    let mut pipeline = Pipeline::new(config)?;
    if preview {
        pipeline = pipeline.with_preview(Arc::new(confirm_on_stdin));
    }
    if let Some(observer) = progress.observer() {
        pipeline = pipeline.with_observer(observer);
    }

    let pipeline = Arc::new(pipeline);
    let results = pipeline.run_batch(&files, workflow.clone(), options).await;
    progress.finish();

    for result in &results {
        report(result, &workflow);
    }

    let summary = BatchSummary::from_results(&results);
    if results.len() > 1 && workflow != Workflow::DetectOnly {
        println!("\n{}", "=".repeat(60));
        println!("Summary");
        println!("{}", "=".repeat(60));
        println!("Files processed: {}/{}", summary.succeeded, summary.processed);
        if summary.cancelled > 0 {
            println!("Cancelled: {}", summary.cancelled);
        }
        if workflow == Workflow::GenerateEdl {
            println!("Total profanities detected: {}", summary.total_matches);
        } else {
            println!("Total profanities cleaned: {}", summary.total_matches);
        }
    }

    if summary.failed > 0 {
        bail!("{} of {} files failed", summary.failed, summary.processed);
    }
    Ok(())
}
