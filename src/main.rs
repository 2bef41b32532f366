use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use tracing_subscriber::EnvFilter;

// Use mimalloc as the global allocator for the binary (non-Windows only)
#[cfg(not(windows))]
#[global_allocator]
static ALLOC: mimalloc::MiMalloc = mimalloc::MiMalloc;

use meshcert::{scenario, TestContext, Timing, WaitStyle};

/// Timing profile selection.
#[derive(Clone, Copy, Debug, clap::ValueEnum)]
enum Profile {
    /// Conformance intervals (3s settle, 140s convergence).
    Cert,
    /// Scaled-down intervals for quick local runs.
    Fast,
}

#[derive(Parser, Debug)]
#[command(
    name = "meshcert",
    author,
    version,
    disable_version_flag = true,
    about = "Mesh role-election conformance runner",
    override_usage = "meshcert [OPTIONS]"
)]
struct Cli {
    /// Print the version and exit
    #[arg(short = 'v', long = "version", action = clap::ArgAction::SetTrue)]
    print_version: bool,

    /// Timing profile for waits and the simulated protocol
    #[arg(long = "profile", value_enum, default_value = "cert")]
    profile: Profile,

    /// Override the settle interval, in milliseconds
    #[arg(long = "settle-ms")]
    settle_ms: Option<u64>,

    /// Override the convergence wait, in milliseconds
    #[arg(long = "convergence-ms")]
    convergence_ms: Option<u64>,

    /// Use fixed-duration sleeps instead of polled role waits
    #[arg(long = "fixed-waits")]
    fixed_waits: bool,

    /// Write a JSON report to this path
    #[arg(long = "report")]
    report: Option<PathBuf>,
}

fn main() -> Result<ExitCode> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_target(false)
        .init();

    let args = Cli::parse();
    if args.print_version {
        let version = env!("CARGO_PKG_VERSION");
        let git_hash = env!("GIT_HASH");
        let git_branch = env!("GIT_BRANCH");
        let git_dirty = env!("GIT_DIRTY");

        println!(
            "{} ({}@{}{}) [{}]",
            version,
            git_branch,
            git_hash,
            git_dirty,
            env!("CARGO_PKG_NAME")
        );
        return Ok(ExitCode::SUCCESS);
    }

    let mut timing = match args.profile {
        Profile::Cert => Timing::cert(),
        Profile::Fast => Timing::fast(),
    };
    if let Some(ms) = args.settle_ms {
        timing.settle = Duration::from_millis(ms);
    }
    if let Some(ms) = args.convergence_ms {
        timing.convergence = Duration::from_millis(ms);
    }
    let style = if args.fixed_waits {
        WaitStyle::Fixed
    } else {
        WaitStyle::Poll
    };

    let plan = scenario::split_weight(&timing, style);
    let mut ctx =
        TestContext::with_simulated_devices(3, timing).context("bring up harness context")?;
    let outcome = ctx.run(&plan);

    // Teardown is unconditional: it runs before the scenario result is
    // even inspected.
    ctx.tear_down();

    let report = outcome.context("scenario aborted")?;
    print!("{report}");

    if let Some(path) = &args.report {
        let body = serde_json::json!({
            "generated_at": chrono::Utc::now().to_rfc3339(),
            "report": report,
        });
        std::fs::write(path, serde_json::to_string_pretty(&body)?)
            .with_context(|| format!("write report to {}", path.display()))?;
    }

    Ok(if report.passed() {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}
