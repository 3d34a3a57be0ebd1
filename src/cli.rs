//! Command-line interface argument parsing.
//!
//! This module handles all CLI argument parsing using clap,
//! including validation and default values.

use crate::models::SortOrder;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// GradeMate - quiz grading and plagiarism reports from the command line
///
/// Upload solution and submission images for automatic grading, inspect
/// plagiarism similarity between students, and browse past quizzes.
///
/// Examples:
///   grademate plagiarism --quiz-id 12
///   grademate plagiarism --input results.json --min-similarity 0.5 --fail-on-flagged
///   grademate grade --name "Loops Quiz" --solution key.png --submissions ./scans
///   grademate quizzes
///   grademate init-config
#[derive(Parser, Debug, Clone)]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Args {
    #[command(subcommand)]
    pub command: Command,

    /// Path to configuration file
    ///
    /// If not specified, looks for .grademate.toml in the current directory
    #[arg(short, long, value_name = "FILE", global = true)]
    pub config: Option<PathBuf>,

    /// Grading backend base URL
    #[arg(long, value_name = "URL", env = "GRADEMATE_API_URL", global = true)]
    pub api_url: Option<String>,

    /// Bearer token for the backend
    #[arg(long, value_name = "TOKEN", env = "GRADEMATE_TOKEN", global = true, hide_env_values = true)]
    pub token: Option<String>,

    /// Request timeout in seconds
    #[arg(long, value_name = "SECS", global = true)]
    pub timeout: Option<u64>,

    /// Write the report to this file instead of stdout
    #[arg(short, long, value_name = "FILE", global = true)]
    pub output: Option<PathBuf>,

    /// Output format (markdown, json)
    #[arg(long, default_value = "markdown", value_name = "FORMAT", global = true)]
    pub format: OutputFormat,

    /// Enable verbose logging output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Run in quiet mode (minimal output)
    #[arg(short, long, global = true)]
    pub quiet: bool,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Aggregate pairwise similarity into a per-student plagiarism report
    Plagiarism(PlagiarismArgs),

    /// Upload a solution and student submissions for grading
    Grade(GradeArgs),

    /// List quizzes stored on the backend
    Quizzes,

    /// Show dashboard statistics
    Dashboard,

    /// Show stored details and grades for one quiz
    QuizView {
        /// Quiz identifier
        quiz_id: String,
    },

    /// Log in and print a token for GRADEMATE_TOKEN
    Login {
        /// Account email
        #[arg(long)]
        email: String,

        /// Account password
        #[arg(long, env = "GRADEMATE_PASSWORD", hide_env_values = true)]
        password: String,
    },

    /// Generate a default .grademate.toml configuration file
    InitConfig,
}

#[derive(clap::Args, Debug, Clone)]
pub struct PlagiarismArgs {
    /// Read pairwise results from a JSON file instead of the backend
    #[arg(long, value_name = "FILE", conflicts_with = "quiz_id", required_unless_present = "quiz_id")]
    pub input: Option<PathBuf>,

    /// Ask the backend to check this quiz
    #[arg(long, value_name = "ID")]
    pub quiz_id: Option<String>,

    /// Only list students whose name contains this text
    #[arg(long, default_value = "")]
    pub search: String,

    /// Only list students at or above this similarity (0.0 - 1.0)
    #[arg(long, default_value = "0.0", value_name = "X")]
    pub min_similarity: f64,

    /// Sort order by similarity
    #[arg(long, default_value = "desc")]
    pub sort: SortOrder,

    /// Exit with code 2 if any student is flagged
    ///
    /// Useful for CI pipelines and scheduled checks.
    #[arg(long)]
    pub fail_on_flagged: bool,
}

#[derive(clap::Args, Debug, Clone)]
pub struct GradeArgs {
    /// Quiz name
    #[arg(long)]
    pub name: String,

    /// Solution (answer key) image
    #[arg(long, value_name = "IMAGE")]
    pub solution: PathBuf,

    /// Directory of student submission images, one per student
    #[arg(long, value_name = "DIR")]
    pub submissions: PathBuf,

    /// Weight of logic correctness versus similarity (0.0 - 1.0); alone, sets the threshold to 1 - W
    #[arg(long, value_name = "W")]
    pub logic_weight: Option<f64>,

    /// Similarity at or above which a student is flagged (0.0 - 1.0); alone, sets the weight to 1 - T
    #[arg(long, value_name = "T")]
    pub similarity_threshold: Option<f64>,

    /// Maximum marks for the quiz
    #[arg(long, value_name = "MARKS")]
    pub total: Option<f64>,

    /// Dry run: scan submissions and exit without uploading
    #[arg(long)]
    pub dry_run: bool,
}

/// Output format for the report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum OutputFormat {
    /// Markdown format (default)
    #[default]
    Markdown,
    /// JSON format
    Json,
}

impl Args {
    /// Parse command-line arguments.
    pub fn parse_args() -> Self {
        Self::parse()
    }

    /// Validate the parsed arguments.
    pub fn validate(&self) -> Result<(), String> {
        if self.verbose && self.quiet {
            return Err("Cannot use both --verbose and --quiet".to_string());
        }

        if let Some(ref url) = self.api_url {
            if !url.starts_with("http://") && !url.starts_with("https://") {
                return Err("API URL must start with 'http://' or 'https://'".to_string());
            }
        }

        if let Some(timeout) = self.timeout {
            if timeout == 0 {
                return Err("Timeout must be at least 1 second".to_string());
            }
        }

        match &self.command {
            Command::Plagiarism(p) => {
                if !(0.0..=1.0).contains(&p.min_similarity) {
                    return Err("Minimum similarity must be between 0.0 and 1.0".to_string());
                }
                if let Some(ref input) = p.input {
                    if !input.is_file() {
                        return Err(format!("Input file does not exist: {}", input.display()));
                    }
                }
            }
            Command::Grade(g) => {
                for (name, value) in [
                    ("Logic weight", g.logic_weight),
                    ("Similarity threshold", g.similarity_threshold),
                ] {
                    if let Some(v) = value {
                        if !(0.0..=1.0).contains(&v) {
                            return Err(format!("{} must be between 0.0 and 1.0", name));
                        }
                    }
                }
                if let Some(total) = g.total {
                    if total <= 0.0 {
                        return Err("Total marks must be positive".to_string());
                    }
                }
                if !g.submissions.is_dir() {
                    return Err(format!(
                        "Submissions directory does not exist: {}",
                        g.submissions.display()
                    ));
                }
            }
            _ => {}
        }

        Ok(())
    }

    /// Returns the log level based on verbosity settings.
    pub fn log_level(&self) -> tracing::Level {
        if self.quiet {
            tracing::Level::ERROR
        } else if self.verbose {
            tracing::Level::DEBUG
        } else {
            tracing::Level::INFO
        }
    }
}
