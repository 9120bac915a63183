use std::path::PathBuf;
use std::process;

use anyhow::Result;
use clap::Parser;

use bumper::cli::{run_bump_workflow, BumpWorkflowArgs};
use bumper::{config, ui, BumpError};

#[derive(clap::Parser)]
#[command(
    name = "bumper",
    version,
    about = "Bump versions using git flow and publish GitLab / GitHub releases"
)]
struct Args {
    #[arg(
        short = 't',
        long = "type",
        value_name = "TYPE",
        help = "Type of version bump (major, minor, patch); prompts when omitted"
    )]
    bump_type: Option<String>,

    #[arg(short, long, help = "Run without confirmation")]
    force: bool,

    #[arg(short, long, help = "Custom configuration file path")]
    config: Option<PathBuf>,

    #[arg(short, long, help = "Show debug output")]
    verbose: bool,

    #[arg(
        short = 'C',
        long,
        value_name = "DIR",
        default_value = ".",
        help = "Project directory"
    )]
    directory: PathBuf,
}

fn init_logging(verbose: bool) {
    let default_level = if verbose { "debug" } else { "info" };

    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_level))
        .format_timestamp(None)
        .format_target(false)
        .init();
}

fn main() {
    let args = Args::parse();
    init_logging(args.verbose);

    let exit_code = match run(args) {
        Ok(()) => 0,
        Err(e) => {
            ui::display_error(&format!("Failed to bump version: {}", e));
            1
        }
    };

    process::exit(exit_code);
}

fn run(args: Args) -> Result<()> {
    let config = config::load_config(args.config.as_deref())?;

    let workflow_args = BumpWorkflowArgs {
        bump_type: args.bump_type,
        force: args.force,
        project_dir: args.directory,
    };

    match run_bump_workflow(workflow_args, config) {
        Ok(result) => {
            ui::display_success(&format!(
                "Released {} ({} bump from {})",
                result.new_tag, result.bump, result.previous_tag
            ));
            ui::display_success(&format!(
                "{} release: {}",
                result.publisher, result.release_url
            ));
            Ok(())
        }
        Err(e) if !e.is_failure() => {
            ui::display_status(&e.to_string());
            Ok(())
        }
        Err(e) => {
            if let BumpError::PartiallyCompleted { stage, .. } = &e {
                ui::display_recovery_hint(stage);
            }
            Err(e.into())
        }
    }
}
