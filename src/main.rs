use anyhow::{Context, Result};
use clap::{CommandFactory, Parser, Subcommand};
use clap_complete::Shell;
use tracing_subscriber::EnvFilter;

use gitsw::{
    commands,
    error::GitswError,
    input::{Interactive, NonInteractive, ProfileInput},
    paths::Paths,
    profiles::snapshot_default,
    switch::Scope,
    ui::{ColorMode, Ui},
};

/// Env var holding the log filter, e.g. `GIT_SW_LOG=debug`
const LOG_ENV: &str = "GIT_SW_LOG";

#[derive(Parser)]
#[command(name = "git-sw")]
#[command(about = "Git identity switcher - manage multiple user.name/user.email/signing profiles")]
#[command(version)]
struct Cli {
    /// Act on the global config instead of the current repository (use, edit, delete)
    #[arg(short, long, global = true)]
    global: bool,

    /// Read everything from flags instead of prompting
    #[arg(long, global = true)]
    no_tui: bool,

    /// Profile to create or act on
    #[arg(short, long, global = true)]
    profile: Option<String>,

    /// Git user.name for a new profile
    #[arg(long, global = true)]
    name: Option<String>,

    /// Git user.email for a new profile
    #[arg(long, global = true)]
    email: Option<String>,

    /// Signing key: GPG key id, path to an SSH public key, or X.509 certificate id
    #[arg(long, global = true)]
    signing_key: Option<String>,

    /// Signing key format: openpgp, ssh, x509 (default: openpgp)
    #[arg(long, global = true)]
    key_format: Option<String>,

    /// Program used for OpenPGP signing (default: gpg)
    #[arg(long, global = true)]
    gpg_program: Option<String>,

    /// Confirm destructive operations without asking
    #[arg(short, long, global = true)]
    yes: bool,

    /// Disable colored output
    #[arg(long, global = true)]
    no_color: bool,

    /// When to use colors: always, auto, never
    #[arg(long, global = true, value_name = "WHEN", default_value = "auto")]
    color: ColorMode,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Clone, Copy, PartialEq, Eq)]
enum Commands {
    /// Create a new profile
    Create,

    /// Select the profile to use
    Use,

    /// List all profiles
    List {
        /// Print profiles as JSON
        #[arg(long)]
        json: bool,
    },

    /// Open a profile in your editor
    Edit,

    /// Delete a profile
    Delete,

    /// Check storage and config includes for problems
    Doctor,

    /// Print a shell completion script
    Completions {
        #[arg(value_enum)]
        shell: Shell,
    },
}

impl Cli {
    fn scope(&self) -> Result<Scope, GitswError> {
        scope_for(self.command, self.global)
    }

    fn input(&self, ui: &Ui) -> Box<dyn ProfileInput> {
        if self.no_tui {
            Box::new(NonInteractive {
                profile: self.profile.clone(),
                name: self.name.clone(),
                email: self.email.clone(),
                signing_key: self.signing_key.clone(),
                key_format: self.key_format.clone(),
                gpg_program: self.gpg_program.clone(),
                yes: self.yes,
            })
        } else {
            Box::new(Interactive::new(ui.clone(), self.profile.clone()))
        }
    }
}

/// `-g` only makes sense for commands that touch a config scope
fn scope_for(command: Commands, global: bool) -> Result<Scope, GitswError> {
    match (command, global) {
        (_, false) => Ok(Scope::Local),
        (Commands::Use | Commands::Edit | Commands::Delete, true) => Ok(Scope::Global),
        _ => Err(GitswError::GlobalNotAllowed),
    }
}

fn init_logging() {
    let filter = EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new("warn"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}

fn run(cli: &Cli, ui: &Ui) -> Result<()> {
    if let Commands::Completions { shell } = cli.command {
        clap_complete::generate(shell, &mut Cli::command(), "git-sw", &mut std::io::stdout());
        return Ok(());
    }

    let scope = cli.scope()?;
    let paths = Paths::new()?;
    let cwd = std::env::current_dir().context("Failed to determine working directory")?;

    // doctor reports the store as it is
    if cli.command != Commands::Doctor {
        paths.ensure_dirs()?;
        if snapshot_default(&paths)? {
            ui.info(format!(
                "Saved {} as the 'default' profile",
                paths.global_config.display()
            ));
        }
    }

    let input = cli.input(ui);
    match cli.command {
        Commands::Create => commands::create(&paths, ui, input.as_ref()),
        Commands::Use => commands::use_profile(&paths, ui, input.as_ref(), scope, &cwd),
        Commands::List { json } => commands::list(&paths, ui, &cwd, json),
        Commands::Edit => commands::edit(&paths, ui, input.as_ref(), scope),
        Commands::Delete => commands::delete(&paths, ui, input.as_ref(), scope, &cwd),
        Commands::Doctor => commands::doctor(&paths, ui, &cwd),
        Commands::Completions { .. } => Ok(()),
    }
}

fn main() {
    let cli = Cli::parse();
    init_logging();
    let ui = Ui::new(cli.color, cli.no_color);

    if let Err(e) = run(&cli, &ui) {
        ui.err(format!("{e:#}"));
        std::process::exit(1);
    }
}
