mod logging;
mod watch;

use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;

use lesswatch::cli::{Cli, Command, OutputFormat};
use lesswatch::collector::collect_less_files;
use lesswatch::coordinator::Coordinator;
use lesswatch::reporter::{JsonReporter, Reporter, TextReporter};
use lesswatch::{LesscCompiler, LesswatchError, Project, open_project};

use logging::{LogConfig, init_logging};

fn build_coordinator(cli: &Cli, project: &Project) -> Result<Coordinator, LesswatchError> {
    // CLI args override file config
    let lessc = match (&cli.lessc, &project.config.lessc) {
        (Some(program), _) => program.clone(),
        (None, Some(program)) => PathBuf::from(program),
        (None, None) => PathBuf::from("lessc"),
    };

    let reporter: Arc<dyn Reporter> = match cli.format {
        OutputFormat::Text => Arc::new(TextReporter::new(project.context.root())),
        OutputFormat::Json => Arc::new(JsonReporter),
    };

    let mut builder = Coordinator::builder(Arc::clone(&project.context), Arc::new(LesscCompiler::with_program(lessc)))
        .reporter(reporter);
    if let Some(workers) = cli.workers.or(project.config.workers) {
        builder = builder.workers(workers);
    }
    builder.build()
}

fn compile(cli: &Cli, project: &Project, paths: &[PathBuf]) -> Result<bool, LesswatchError> {
    let root = project.context.root();
    let selection: Vec<PathBuf> = if paths.is_empty() {
        project
            .context
            .store()
            .all_profiles()
            .iter()
            .filter(|p| !p.less_dir().as_os_str().is_empty())
            .map(|p| p.less_dir().to_path_buf())
            .collect()
    } else {
        paths.iter().map(|p| root.join(p)).collect()
    };

    let files = collect_less_files(&selection);
    if files.is_empty() {
        eprintln!("Error: No LESS files found in selection");
        std::process::exit(1);
    }

    let coordinator = build_coordinator(cli, project)?;
    coordinator.submit_batch(&files);
    coordinator.wait_idle();

    let stats = coordinator.stats();
    match cli.format {
        OutputFormat::Text => {
            println!(
                "\n{} compiled, {} failed, {} skipped ({} LESS files)",
                stats.compiled,
                stats.failed,
                stats.skipped,
                files.len()
            );
        }
        OutputFormat::Json => {
            let summary = serde_json::json!({ "kind": "summary", "files": files.len(), "stats": stats });
            println!("{summary}");
        }
    }

    Ok(stats.failed == 0)
}

fn list_profiles(cli: &Cli, project: &Project) -> Result<(), Box<dyn std::error::Error>> {
    let config = project.config.with_context(&project.context);

    match cli.format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&config.profiles)?),
        OutputFormat::Text => {
            if config.profiles.is_empty() {
                println!("No profiles configured in {}", project.config_path.display());
                return Ok(());
            }
            for entry in &config.profiles {
                let draft = &entry.draft;
                let outputs: Vec<String> =
                    draft.css_dirs.iter().map(|d| d.path().display().to_string()).collect();
                let outputs = if outputs.is_empty() { "(no CSS output directories)".to_string() } else { outputs.join(", ") };

                println!("{:>3}  {}", entry.id, draft.name);
                println!("     {} -> {}", draft.less_dir.display(), outputs);
                if !draft.include_pattern.is_empty() {
                    println!("     include: {}", draft.include_pattern);
                }
                if !draft.exclude_pattern.is_empty() {
                    println!("     exclude: {}", draft.exclude_pattern);
                }
                println!(
                    "     compile on save: {}, compress: {}",
                    if draft.compile_automatically { "yes" } else { "no" },
                    if draft.compress_output { "yes" } else { "no" }
                );
            }
        }
    }
    Ok(())
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    init_logging(&LogConfig::from_verbosity(cli.verbose));

    if let Some(config_path) = &cli.config {
        if !cli.cwd.join(config_path).exists() {
            eprintln!("Error: Config file not found: {}", config_path.display());
            std::process::exit(1);
        }
    }

    let project = match open_project(&cli.cwd, cli.config.as_deref()) {
        Ok(project) => project,
        Err(e) => {
            eprintln!("Error: {e}");
            std::process::exit(1);
        }
    };

    match &cli.command {
        Command::Compile { paths } => match compile(&cli, &project, paths) {
            Ok(true) => {}
            // Exit with error code if any target failed
            Ok(false) => std::process::exit(1),
            Err(e) => {
                eprintln!("Error: {e}");
                std::process::exit(1);
            }
        },
        Command::Watch => {
            let coordinator = build_coordinator(&cli, &project)?;
            watch::watch(&coordinator)?;
        }
        Command::Profiles => list_profiles(&cli, &project)?,
        Command::ResetPrompts => {
            project.context.reset_prompts();
            project.save()?;
            println!("Notifications re-enabled in {}", project.config_path.display());
        }
    }

    Ok(())
}
