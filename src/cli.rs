// src/cli.rs
// =============================================================================
// This file defines our command-line interface using the `clap` crate, and
// turns the parsed arguments into the Settings the rest of the program uses.
//
// Everything is configured from the command line; the token and API URL may
// also come from the GITHUB_TOKEN and LOMAD_API_URL environment variables.
// =============================================================================

use anyhow::{anyhow, Result};
use clap::{Parser, Subcommand};
use std::time::Duration;

/// Repositories selected by --all-repositories
pub const KNOWN_REPOSITORIES: &[&str] = &["oblivion", "skyrim", "fallout3", "falloutnv", "fallout4"];

pub const DEFAULT_FILE: &str = "masterlist.yaml";
pub const DEFAULT_MESSAGE: &str = "Update LOOT version check for new release message";

#[derive(Parser, Debug)]
#[command(
    name = "lomad",
    version,
    about = "Maintain LOOT masterlist repositories on GitHub",
    long_about = "lomad creates branches, changes the default branch and edits masterlist files \
                  directly through the GitHub API, and checks that every link in a masterlist \
                  still resolves."
)]
pub struct Cli {
    /// GitHub personal access token
    #[arg(short, long, env = "GITHUB_TOKEN", hide_env_values = true)]
    pub token: String,

    /// Account that owns the repositories
    #[arg(long, default_value = "loot")]
    pub owner: String,

    /// Repository to operate on (repeatable)
    #[arg(short = 'r', long = "repository", value_name = "NAME")]
    pub repositories: Vec<String>,

    /// Operate on all known repositories (oblivion, skyrim, fallout3, falloutnv, fallout4)
    #[arg(short, long)]
    pub all_repositories: bool,

    /// GitHub API root
    #[arg(long, env = "LOMAD_API_URL", default_value = "https://api.github.com")]
    pub api_url: String,

    /// Log every remote call and transaction step
    #[arg(short, long)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Create a branch, set the default branch, bump the LOOT version check and/or replace a URL
    ///
    /// Example: lomad -r skyrim update -b v0.15 -d v0.15 -n 0.15.0
    #[command(after_help = "If a combination of -b, -d and -n are specified, they act in order:\n\n\
                            1. The branch is created\n\
                            2. The default branch is set\n\
                            3. The LOOT version condition is updated\n\
                            4. The URL replacement is committed")]
    Update {
        /// Create a new branch with this name from the current default branch
        #[arg(short, long)]
        branch: Option<String>,

        /// Set the default branch
        #[arg(short, long)]
        default_branch: Option<String>,

        /// Update the "LOOT update available" message condition to this version
        #[arg(short, long)]
        new_version: Option<String>,

        /// Replace every occurrence of URL OLD with NEW (e.g. a redirect target)
        #[arg(long, num_args = 2, value_names = ["OLD", "NEW"])]
        replace_url: Option<Vec<String>>,

        /// File holding the version condition
        #[arg(long, default_value = DEFAULT_FILE)]
        file: String,

        /// Commit message for the version update
        #[arg(long, default_value = DEFAULT_MESSAGE)]
        message: String,
    },

    /// Check every link in a file on each repository's default branch
    ///
    /// Example: lomad -a links --json
    Links {
        /// File to scan for links
        #[arg(long, default_value = DEFAULT_FILE)]
        file: String,

        /// Output results in JSON format instead of a table
        #[arg(long)]
        json: bool,

        /// Seconds before a single link check gives up
        #[arg(long, default_value_t = 10)]
        timeout: u64,

        /// Maximum link checks in flight at once
        #[arg(long, default_value_t = 50)]
        concurrency: usize,
    },
}

/// Resolved configuration for one run.
#[derive(Debug, Clone)]
pub struct Settings {
    pub token: String,
    pub owner: String,
    pub api_url: String,
    pub repositories: Vec<String>,
    pub verbose: bool,
    pub action: Action,
}

#[derive(Debug, Clone)]
pub enum Action {
    Update(UpdatePlan),
    Links(LinkOptions),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpdatePlan {
    pub branch: Option<String>,
    pub default_branch: Option<String>,
    pub new_version: Option<String>,
    pub replace_url: Option<(String, String)>,
    pub file: String,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinkOptions {
    pub file: String,
    pub json: bool,
    pub timeout: Duration,
    pub concurrency: usize,
}

impl Settings {
    // Validates the parsed arguments
    //
    // Fails when no repository is selected, the token is blank, or an update
    // was asked for without anything to update.
    pub fn from_cli(cli: Cli) -> Result<Self> {
        if cli.token.trim().is_empty() {
            return Err(anyhow!("A GitHub token is required (--token or GITHUB_TOKEN)"));
        }

        let requested: Vec<String> = if cli.all_repositories {
            KNOWN_REPOSITORIES.iter().map(|name| name.to_string()).collect()
        } else {
            cli.repositories
        };

        // Keep the order given, drop repeats
        let mut repositories: Vec<String> = Vec::new();
        for name in requested {
            if !repositories.contains(&name) {
                repositories.push(name);
            }
        }
        if repositories.is_empty() {
            return Err(anyhow!("Specify at least one --repository, or --all-repositories"));
        }

        let action = match cli.command {
            Commands::Update {
                branch,
                default_branch,
                new_version,
                replace_url,
                file,
                message,
            } => {
                let replace_url = match replace_url.as_deref() {
                    None => None,
                    Some([old, new]) => Some((old.clone(), new.clone())),
                    Some(_) => return Err(anyhow!("--replace-url takes exactly two URLs")),
                };
                if branch.is_none() && default_branch.is_none() && new_version.is_none() && replace_url.is_none() {
                    return Err(anyhow!("Nothing to do: give at least one of -b, -d, -n or --replace-url"));
                }
                Action::Update(UpdatePlan {
                    branch,
                    default_branch,
                    new_version,
                    replace_url,
                    file,
                    message,
                })
            }
            Commands::Links {
                file,
                json,
                timeout,
                concurrency,
            } => {
                if timeout == 0 || concurrency == 0 {
                    return Err(anyhow!("--timeout and --concurrency must be greater than zero"));
                }
                Action::Links(LinkOptions {
                    file,
                    json,
                    timeout: Duration::from_secs(timeout),
                    concurrency,
                })
            }
        };

        Ok(Self {
            token: cli.token,
            owner: cli.owner,
            api_url: cli.api_url,
            repositories,
            verbose: cli.verbose,
            action,
        })
    }
}
