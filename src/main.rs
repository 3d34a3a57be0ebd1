//! GradeMate - quiz grading and plagiarism reports from the command line
//!
//! A CLI client for the GradeMate backend: uploads solution and submission
//! images for grading and turns the backend's pairwise similarity results
//! into per-student plagiarism reports.
//!
//! Exit codes:
//!   0 - Success
//!   1 - Runtime error (connection, config, invalid input, etc.)
//!   2 - Flagged students found with --fail-on-flagged

mod analysis;
mod cli;
mod client;
mod config;
mod error;
mod models;
mod report;
mod scanner;

use anyhow::{Context, Result};
use chrono::Utc;
use cli::{Args, Command, GradeArgs, OutputFormat, PlagiarismArgs};
use client::{ClientConfig, GradeMateClient};
use config::Config;
use indicatif::{ProgressBar, ProgressStyle};
use models::{
    GradingReport, GradingRequest, MatchInput, PlagiarismReport, PlagiarismResponse, Submission,
};
use std::path::Path;
use std::time::{Duration, Instant};
use tracing::{debug, error, info, warn};
use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::{EnvFilter, FmtSubscriber};

#[tokio::main]
async fn main() -> Result<()> {
    // Parse command-line arguments
    let args = Args::parse_args();

    // Validate arguments
    if let Err(e) = args.validate() {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }

    // Handle init-config early (no logging needed)
    if matches!(args.command, Command::InitConfig) {
        return handle_init_config();
    }

    init_logging(&args);

    info!("GradeMate v{}", env!("CARGO_PKG_VERSION"));
    debug!("Arguments: {:?}", args.command);

    match run(args).await {
        Ok(exit_code) => {
            std::process::exit(exit_code);
        }
        Err(e) => {
            error!("Command failed: {:#}", e);
            eprintln!("\n❌ Error: {:#}", e);
            std::process::exit(1);
        }
    }
}

/// Handle init-config: generate a default .grademate.toml.
fn handle_init_config() -> Result<()> {
    let path = Path::new(config::CONFIG_FILE_NAME);

    if path.exists() {
        eprintln!(
            "⚠️  {} already exists. Remove it first or edit it manually.",
            config::CONFIG_FILE_NAME
        );
        std::process::exit(1);
    }

    let content = Config::default_toml();
    std::fs::write(path, &content)
        .with_context(|| format!("Failed to write {}", config::CONFIG_FILE_NAME))?;

    println!("✅ Created {} with default settings.", config::CONFIG_FILE_NAME);
    println!("   Edit it to set the backend URL, token, and grading defaults.");
    Ok(())
}

/// Initialize logging based on verbosity settings. `RUST_LOG` takes precedence.
fn init_logging(args: &Args) {
    let filter = EnvFilter::builder()
        .with_default_directive(LevelFilter::from_level(args.log_level()).into())
        .from_env_lossy();

    let subscriber = FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .compact()
        .finish();

    if let Err(e) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("Failed to set tracing subscriber: {}", e);
    }
}

/// Dispatch a command. Returns the process exit code.
async fn run(args: Args) -> Result<i32> {
    let mut config = load_config(&args)?;
    config.merge_with_args(&args);

    match args.command.clone() {
        Command::Plagiarism(p) => run_plagiarism(&args, &config, &p).await,
        Command::Grade(g) => run_grade(&args, config, &g).await,
        Command::Quizzes => {
            let client = make_client(&config)?;
            let pb = spinner("Fetching quizzes...", args.quiet);
            let quizzes = client.list_quizzes().await;
            finish(pb);
            let quizzes = quizzes.context("Failed to load quizzes")?;

            let output = match args.format {
                OutputFormat::Json => report::generate_json_report(&quizzes)?,
                OutputFormat::Markdown => report::generate_quiz_list_markdown(&quizzes),
            };
            emit(&args, &output)?;
            Ok(0)
        }
        Command::Dashboard => {
            let client = make_client(&config)?;
            let pb = spinner("Fetching dashboard...", args.quiet);
            let fetched =
                futures::future::try_join(client.dashboard_stats(), client.list_quizzes()).await;
            finish(pb);
            let (stats, quizzes) = fetched.context("Failed to load dashboard")?;

            let output = match args.format {
                OutputFormat::Json => report::generate_json_report(&serde_json::json!({
                    "stats": stats,
                    "quizzes": quizzes,
                }))?,
                OutputFormat::Markdown => format!(
                    "{}\n{}",
                    report::generate_dashboard_markdown(&stats),
                    report::generate_quiz_list_markdown(&quizzes)
                ),
            };
            emit(&args, &output)?;
            Ok(0)
        }
        Command::QuizView { quiz_id } => {
            let client = make_client(&config)?;
            let pb = spinner("Fetching quiz details...", args.quiet);
            let details = client.quiz_view(&quiz_id).await;
            finish(pb);
            let details =
                details.with_context(|| format!("Failed to load quiz details for {}", quiz_id))?;

            emit(&args, &report::generate_json_report(&details)?)?;
            Ok(0)
        }
        Command::Login { email, password } => {
            let client = make_client(&config)?;
            let login = client.login(&email, &password).await.context("Login failed")?;

            info!("Logged in as {}", email);
            debug!("User profile: {}", login.user);
            println!("{}", login.token);
            if !args.quiet {
                eprintln!("✅ Logged in. Export the token above as GRADEMATE_TOKEN.");
            }
            Ok(0)
        }
        Command::InitConfig => {
            handle_init_config()?;
            Ok(0)
        }
    }
}

/// Build a plagiarism report from a file or the backend.
async fn run_plagiarism(args: &Args, config: &Config, p: &PlagiarismArgs) -> Result<i32> {
    let start_time = Instant::now();

    let response: PlagiarismResponse = match (&p.input, &p.quiz_id) {
        (Some(input), _) => {
            info!("Reading pairwise results from {}", input.display());
            let content = std::fs::read_to_string(input)
                .with_context(|| format!("Failed to read {}", input.display()))?;
            let parsed: MatchInput = serde_json::from_str(&content)
                .with_context(|| format!("Failed to parse {}", input.display()))?;
            parsed.into()
        }
        (None, Some(quiz_id)) => {
            let client = make_client(config)?;
            let pb = spinner(&format!("Checking plagiarism for quiz {}...", quiz_id), args.quiet);
            let response = client.check_plagiarism(quiz_id).await;
            finish(pb);
            response.with_context(|| format!("Plagiarism check failed for quiz {}", quiz_id))?
        }
        (None, None) => anyhow::bail!("Either --input or --quiz-id is required"),
    };

    let records = analysis::validate_records(&response.plagiarism_results)
        .context("Plagiarism results rejected")?;
    let mut graph = analysis::aggregate_matches(&records);
    let high_similarity_count = analysis::high_similarity_count(&graph.students);
    let flagged_count = analysis::flagged_student_count(&graph.students);

    // Filters narrow the listing; totals keep describing the whole class.
    let mut listed = analysis::filter_students(&graph.students, &p.search, p.min_similarity);
    analysis::sort_by_similarity(&mut listed, p.sort);
    if listed.len() < graph.students.len() {
        debug!(
            "Listing {} of {} students after filters",
            listed.len(),
            graph.students.len()
        );
    }
    graph.students = listed;

    let quiz_id = response
        .quiz_id
        .as_ref()
        .map(models::value_to_label)
        .filter(|id| !id.is_empty())
        .or_else(|| p.quiz_id.clone());

    let report = PlagiarismReport {
        quiz_name: response
            .quiz_name
            .unwrap_or_else(|| "Unknown Quiz".to_string()),
        quiz_id,
        generated_at: Utc::now(),
        high_similarity_count,
        flagged_pairs: analysis::flagged_pairs(&records),
        graph,
    };

    let output = match args.format {
        OutputFormat::Json => report::generate_json_report(&report)?,
        OutputFormat::Markdown => report::generate_plagiarism_markdown(&report),
    };
    emit(args, &output)?;

    if !args.quiet {
        eprintln!("\n📊 Plagiarism Summary:");
        eprintln!("   Students: {}", report.graph.total_students);
        eprintln!(
            "   Average similarity: {:.0}%",
            report.graph.average_similarity * 100.0
        );
        eprintln!("   High similarity (>= 50%): {}", report.high_similarity_count);
        eprintln!("   Flagged: {}", flagged_count);
        eprintln!("   Duration: {:.1}s", start_time.elapsed().as_secs_f64());
    }

    if p.fail_on_flagged && flagged_count > 0 {
        eprintln!(
            "\n⛔ {} flagged students found. Failing (exit code 2).",
            flagged_count
        );
        return Ok(2);
    }

    Ok(0)
}

/// Scan submissions, upload them, and report the normalized grades.
async fn run_grade(args: &Args, mut config: Config, g: &GradeArgs) -> Result<i32> {
    config.merge_grading(g.logic_weight, g.similarity_threshold, g.total);

    let scan_config = scanner::ScanConfig::from(&config.scanner);
    let submission_scanner = scanner::SubmissionScanner::new(g.submissions.clone(), scan_config);
    let solution = std::fs::canonicalize(&g.solution)
        .with_context(|| format!("Solution image not found: {}", g.solution.display()))?;

    let found: Vec<_> = submission_scanner
        .scan()?
        .into_iter()
        .filter(|s| std::fs::canonicalize(&s.path).map_or(true, |p| p != solution))
        .collect();

    if g.dry_run {
        return handle_dry_run(&found);
    }

    if found.is_empty() {
        anyhow::bail!(
            "No submission images found in {}",
            g.submissions.display()
        );
    }

    let request = GradingRequest {
        quiz_name: g.name.clone(),
        logic_weight: config.grading.logic_weight,
        similarity_threshold: config.grading.similarity_threshold,
        total: config.grading.total,
        solution_image: g.solution.clone(),
        submissions: found
            .into_iter()
            .map(|s| Submission {
                student_name: s.student_name,
                image: s.path,
            })
            .collect(),
    };
    request.validate().context("Invalid grading request")?;

    if !args.quiet {
        eprintln!("🤖 Grading '{}'", request.quiz_name);
        eprintln!("   Backend: {}", config.api.base_url);
        eprintln!("   Submissions: {}", request.submissions.len());
        eprintln!(
            "   Logic weight: {} | Similarity threshold: {} | Total: {}",
            request.logic_weight, request.similarity_threshold, request.total
        );
    }

    let client = make_client(&config)?;
    let pb = spinner("Uploading and grading submissions...", args.quiet);
    let raw = client.upload_quiz(&request).await;
    finish(pb);
    let raw = raw.context("Grading failed")?;

    let mut results =
        analysis::normalize_grading(raw, request.total, request.similarity_threshold);
    if results.quiz_name.is_empty() {
        results.quiz_name = request.quiz_name.clone();
    }
    if results.students.len() != request.submissions.len() {
        warn!(
            "Uploaded {} submissions but received {} graded results",
            request.submissions.len(),
            results.students.len()
        );
    }

    let report = GradingReport {
        generated_at: Utc::now(),
        similarity_threshold: request.similarity_threshold,
        total_marks: request.total,
        results,
    };

    let output = match args.format {
        OutputFormat::Json => report::generate_json_report(&report)?,
        OutputFormat::Markdown => report::generate_grading_markdown(&report, &config.report),
    };
    emit(args, &output)?;

    if !args.quiet {
        eprintln!("\n📊 Grading Summary:");
        eprintln!("   Students: {}", report.results.total_students);
        eprintln!("   Average score: {:.1}", report.results.average_score);
        eprintln!(
            "   Plagiarism flags: {}",
            analysis::plagiarism_flag_count(&report.results.students)
        );
    }

    Ok(0)
}

/// Handle grade --dry-run: list what would be uploaded, exit.
fn handle_dry_run(found: &[scanner::ScannedSubmission]) -> Result<i32> {
    println!("\n🔍 Dry run: scanning submissions (no upload)...\n");

    if found.is_empty() {
        println!("   No matching submission images found.");
    } else {
        println!("   Found {} submissions that would be uploaded:\n", found.len());
        for submission in found {
            println!(
                "     📄 {} → {} ({} bytes)",
                submission.path.display(),
                submission.student_name,
                submission.size
            );
        }
    }

    println!("\n✅ Dry run complete. Nothing was uploaded.");
    Ok(0)
}

/// Load configuration from file or use defaults.
fn load_config(args: &Args) -> Result<Config> {
    // Try explicit config path
    if let Some(ref config_path) = args.config {
        info!("Loading config from: {}", config_path.display());
        return Config::load(config_path);
    }

    // Try default location
    match Config::load_default() {
        Ok(Some(config)) => {
            info!("Loaded default config from {}", config::CONFIG_FILE_NAME);
            Ok(config)
        }
        Ok(None) => {
            debug!("No config file found, using defaults");
            Ok(Config::default())
        }
        Err(e) => {
            warn!("Failed to load config: {:#}", e);
            Ok(Config::default())
        }
    }
}

fn make_client(config: &Config) -> Result<GradeMateClient> {
    GradeMateClient::new(ClientConfig::from(config.api.clone()))
        .context("Failed to create HTTP client")
}

/// Write command output to `--output` or stdout.
fn emit(args: &Args, content: &str) -> Result<()> {
    match args.output {
        Some(ref path) => {
            std::fs::write(path, content)
                .with_context(|| format!("Failed to write report to {}", path.display()))?;
            if !args.quiet {
                eprintln!("✅ Report saved to: {}", path.display());
            }
        }
        None => println!("{}", content),
    }
    Ok(())
}

/// Spinner shown while waiting on the backend.
fn spinner(message: &str, quiet: bool) -> Option<ProgressBar> {
    if quiet {
        return None;
    }

    let pb = ProgressBar::new_spinner();
    pb.set_style(
        ProgressStyle::default_spinner()
            .template("{spinner:.green} [{elapsed_precise}] {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner()),
    );
    pb.set_message(message.to_string());
    pb.enable_steady_tick(Duration::from_millis(120));
    Some(pb)
}

fn finish(pb: Option<ProgressBar>) {
    if let Some(pb) = pb {
        pb.finish_and_clear();
    }
}
