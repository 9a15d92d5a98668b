// src/main.rs
// =============================================================================
// This is the entry point of our CLI application.
//
// What happens here:
// 1. Parse command-line arguments into Settings
// 2. Set up logging (stderr) and the GitHub client
// 3. Run the chosen subcommand on every selected repository concurrently
// 4. Print results and exit (0 = all good, 1 = something failed, 2 = error)
//
// A failure in one repository is reported and never stops the others.
// =============================================================================

mod checker; // src/checker/ - URL extraction and link probing
mod cli; // src/cli.rs - command-line parsing and settings
mod error; // src/error.rs - error types
mod github; // src/github/ - remote object store
mod mutator; // src/mutator/ - branch and file operations
#[cfg(test)]
mod testutil;

use anyhow::{Context, Result};
use clap::Parser;
use futures::future::join_all;
use serde::Serialize;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use checker::{LinkCheckResult, LinkChecker, ProbeResult};
use cli::{Action, Cli, LinkOptions, Settings, UpdatePlan};
use github::{GithubClient, ObjectStore, RepositoryHandle};
use mutator::{ContentMutator, LootVersionCondition, UrlRewrite};

#[tokio::main]
async fn main() {
    let exit_code = match run().await {
        Ok(code) => code,
        Err(e) => {
            // Unexpected error: print the whole chain and exit with code 2
            eprintln!("Error: {:#}", e);
            2
        }
    };

    std::process::exit(exit_code);
}

// Returns:
//   Ok(0) = every operation succeeded / every link is OK
//   Ok(1) = some repository failed or some link is not OK
//   Err = unexpected error
async fn run() -> Result<i32> {
    let settings = Settings::from_cli(Cli::parse())?;
    init_logging(settings.verbose)?;

    let client = GithubClient::new(&settings.api_url, &settings.token)
        .context("Failed to create GitHub client")?;

    let repositories: Vec<RepositoryHandle> = settings
        .repositories
        .iter()
        .map(|name| RepositoryHandle::new(settings.owner.clone(), name.clone()))
        .collect();

    match &settings.action {
        Action::Update(plan) => handle_update(&client, &repositories, plan).await,
        Action::Links(options) => handle_links(&client, &repositories, options).await,
    }
}

// Logs go to stderr so that --json output on stdout stays clean.
// RUST_LOG overrides the default filter.
fn init_logging(verbose: bool) -> Result<()> {
    let default_filter = if verbose { "lomad=debug" } else { "lomad=info" };
    let filter = EnvFilter::try_from_default_env().or_else(|_| EnvFilter::try_new(default_filter))?;

    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(filter)
        .try_init()?;
    Ok(())
}

// Handles the 'update' subcommand
async fn handle_update<S: ObjectStore>(store: &S, repositories: &[RepositoryHandle], plan: &UpdatePlan) -> Result<i32> {
    let outcomes = join_all(
        repositories
            .iter()
            .map(|repo| update_repository(store, repo, plan)),
    )
    .await;

    let failed = outcomes.iter().filter(|ok| !**ok).count();

    println!();
    println!("📊 Summary:");
    println!("   ✅ OK: {}", outcomes.len() - failed);
    println!("   ❌ Failed: {}", failed);

    Ok(if failed > 0 { 1 } else { 0 })
}

// Runs the requested steps on one repository, in order:
// branch creation, default branch change, version update, URL replacement.
//
// Returns false if any step failed. A failed branch creation is reported
// and the later steps still run; any other failure ends this repository's run.
async fn update_repository<S: ObjectStore>(store: &S, repo: &RepositoryHandle, plan: &UpdatePlan) -> bool {
    let mutator = ContentMutator::new(store, repo);
    let mut ok = true;

    if let Some(branch) = &plan.branch {
        match mutator.create_branch_from_default(branch).await {
            Ok(commit) => println!("✅ {}: created branch {} at {}", repo, branch, commit),
            Err(e) => {
                tracing::warn!(%repo, error = %e, "branch creation failed");
                println!("❌ {}: error creating new branch \"{}\": {}", repo, branch, e);
                ok = false;
            }
        }
    }

    if let Some(default_branch) = &plan.default_branch {
        match mutator.set_default_branch(default_branch).await {
            Ok(()) => println!("✅ {}: default branch is now {}", repo, default_branch),
            Err(e) => {
                tracing::warn!(%repo, error = %e, "setting default branch failed");
                println!("❌ {}: {}", repo, e);
                return false;
            }
        }
    }

    if let Some(version) = &plan.new_version {
        match mutator
            .update_file(&plan.file, &plan.message, &LootVersionCondition, version)
            .await
        {
            Ok(commit) => println!("✅ {}: {} updated for LOOT {} in {}", repo, plan.file, version, commit),
            Err(e) => {
                tracing::warn!(%repo, error = %e, "version update failed");
                println!("❌ {}: {}", repo, e);
                return false;
            }
        }
    }

    if let Some((old, new)) = &plan.replace_url {
        let message = format!("Replace {} with {}", old, new);
        match mutator
            .update_file(&plan.file, &message, &UrlRewrite::new(old.as_str()), new)
            .await
        {
            Ok(commit) => println!("✅ {}: {} now links to {} in {}", repo, plan.file, new, commit),
            Err(e) => {
                tracing::warn!(%repo, error = %e, "URL replacement failed");
                println!("❌ {}: {}", repo, e);
                return false;
            }
        }
    }

    ok
}

// Link results for one repository
#[derive(Debug, Serialize)]
struct RepositoryLinks {
    repository: String,
    file: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    commit: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
    links: Vec<LinkCheckResult>,
}

impl RepositoryLinks {
    fn is_ok(&self) -> bool {
        self.error.is_none() && self.links.iter().all(|r| r.is_ok())
    }
}

// Handles the 'links' subcommand
async fn handle_links<S: ObjectStore>(
    store: &S,
    repositories: &[RepositoryHandle],
    options: &LinkOptions,
) -> Result<i32> {
    let checker = LinkChecker::new(options.timeout, options.concurrency)
        .context("Failed to create HTTP client for link checks")?;

    let reports = join_all(
        repositories
            .iter()
            .map(|repo| check_repository_links(store, &checker, repo, &options.file)),
    )
    .await;

    if options.json {
        println!("{}", serde_json::to_string_pretty(&reports)?);
    } else {
        for report in &reports {
            print_table(report);
        }
    }

    Ok(if reports.iter().all(RepositoryLinks::is_ok) { 0 } else { 1 })
}

async fn check_repository_links<S: ObjectStore>(
    store: &S,
    checker: &LinkChecker,
    repo: &RepositoryHandle,
    file: &str,
) -> RepositoryLinks {
    let mutator = ContentMutator::new(store, repo);

    match mutator.fetch_file(file).await {
        Ok(snapshot) => {
            let links = checker.check_all(&snapshot.content).await;
            tracing::info!(%repo, file, links = links.len(), "links checked");
            RepositoryLinks {
                repository: repo.to_string(),
                file: file.to_string(),
                commit: Some(snapshot.commit.to_string()),
                error: None,
                links,
            }
        }
        Err(e) => {
            tracing::warn!(%repo, error = %e, "could not read file");
            RepositoryLinks {
                repository: repo.to_string(),
                file: file.to_string(),
                commit: None,
                error: Some(e.to_string()),
                links: Vec::new(),
            }
        }
    }
}

// Prints one repository's results as a human-readable table
fn print_table(report: &RepositoryLinks) {
    println!("🔍 {} ({})", report.repository, report.file);

    if let Some(error) = &report.error {
        println!("   ❌ {}", error);
        println!();
        return;
    }

    println!("{:<60} {:<15} {:<30}", "URL", "STATUS", "DETAIL");
    println!("{}", "=".repeat(105));

    for result in &report.links {
        // Truncate URL if too long for display
        let url_display = if result.url.chars().count() > 57 {
            format!("{}...", result.url.chars().take(57).collect::<String>())
        } else {
            result.url.clone()
        };
        println!(
            "{:<60} {:<15} {:<30}",
            url_display,
            format_status(&result.outcome),
            format_detail(&result.outcome)
        );
    }

    println!();

    let ok_count = report.links.iter().filter(|r| r.is_ok()).count();
    let redirected = report
        .links
        .iter()
        .filter(|r| matches!(r.outcome, ProbeResult::Redirected(_)))
        .count();

    println!("📊 Summary:");
    println!("   ✅ OK: {}", ok_count);
    println!("   🔀 Redirected: {}", redirected);
    println!("   ❌ Broken: {}", report.links.len() - ok_count - redirected);
    println!("   📋 Total: {}", report.links.len());
    println!();
}

fn format_status(outcome: &ProbeResult) -> &'static str {
    match outcome {
        ProbeResult::Ok => "✅ OK",
        ProbeResult::Redirected(_) => "🔀 REDIRECT",
        ProbeResult::Failed(_) => "❌ FAILED",
    }
}

fn format_detail(outcome: &ProbeResult) -> String {
    match outcome {
        ProbeResult::Ok => String::new(),
        ProbeResult::Redirected(location) if location.is_empty() => "-> (no Location header)".to_string(),
        ProbeResult::Redirected(location) => format!("-> {}", location),
        ProbeResult::Failed(failure) => failure.to_string(),
    }
}
