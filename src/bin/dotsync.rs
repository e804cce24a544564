// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

use dotsync::{
    alias::AliasTable,
    config::ToolConfig,
    lldbinit::{scan_commands, InitFile},
    path::{home_dir, locate_source_root, resolve_against, CONFIG_FILE_NAME},
    scaffold::ScriptScaffold,
    sync::{
        confirm::{Confirm, InquirePrompt, StreamPrompt},
        reload::ShellProfile,
        upstream::Git2Upstream,
        RunMode, SyncConfig, SyncOutcome, Synchronizer,
    },
};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::{
    fs::{read_to_string, write},
    io::{stderr, stdin, IsTerminal},
    path::{Path, PathBuf},
    process::exit,
};
use tracing::{error, info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[derive(Debug, Clone, Parser)]
#[command(
    about,
    override_usage = "\n  dotsync [options]\n  dotsync [options] <dotsync-command>",
    subcommand_help_heading = "Commands",
    version
)]
struct Cli {
    /// Skip confirmation and overwrite files right away.
    #[arg(short, long)]
    pub force: bool,

    #[command(subcommand)]
    pub command: Option<Command>,
}

impl Cli {
    fn run(self) -> Result<()> {
        match self.command {
            None => run_sync(self.force),
            Some(Command::Lldbinit(opts)) => run_lldbinit(opts),
            Some(Command::Expand(opts)) => run_expand(opts),
            Some(Command::NewScript(opts)) => run_new_script(opts),
        }
    }
}

#[derive(Debug, Clone, Subcommand)]
enum Command {
    /// Render LLDB init file from alias table and command scripts.
    #[command(override_usage = "dotsync lldbinit [options]")]
    Lldbinit(LldbinitOptions),

    /// Resolve one alias and print its expansion.
    #[command(override_usage = "dotsync expand [options] <name> [input]...")]
    Expand(ExpandOptions),

    /// Scaffold new LLDB command script.
    #[command(override_usage = "dotsync new-script [options] <name>")]
    NewScript(NewScriptOptions),
}

#[derive(Parser, Clone, Debug)]
#[command(author, about, long_about)]
struct LldbinitOptions {
    /// Alias definition file to render instead of the configured one.
    #[arg(short, long, value_name = "file")]
    pub aliases: Option<PathBuf>,

    /// Command script directory to load instead of the configured one.
    #[arg(short, long, value_name = "dir")]
    pub commands: Option<PathBuf>,

    /// Write init file here instead of standard output.
    #[arg(short, long, value_name = "file")]
    pub output: Option<PathBuf>,
}

#[derive(Parser, Clone, Debug)]
#[command(author, about, long_about)]
struct ExpandOptions {
    /// Alias definition file to resolve against.
    #[arg(short, long, value_name = "file")]
    pub aliases: Option<PathBuf>,

    /// Name of alias to resolve.
    #[arg(required = true, value_name = "name")]
    pub name: String,

    /// Input handed to the alias.
    #[arg(value_name = "input", trailing_var_arg = true, allow_hyphen_values = true)]
    pub input: Vec<String>,
}

#[derive(Parser, Clone, Debug)]
#[command(author, about, long_about)]
struct NewScriptOptions {
    /// Python module name of new script.
    #[arg(required = true, value_name = "name")]
    pub name: String,

    /// Register command under a different name than the module.
    #[arg(short = 'n', long, value_name = "cmd")]
    pub command_name: Option<String>,

    /// Directory to place script in instead of the configured one.
    #[arg(short, long, value_name = "dir")]
    pub dir: Option<PathBuf>,
}

fn main() {
    let layer = fmt::layer()
        .compact()
        .with_target(false)
        .with_timer(false)
        .without_time();
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::registry()
        .with(layer)
        .with(filter)
        .init();

    if let Err(error) = run() {
        error!("{error:?}");
        exit(1);
    }

    exit(0)
}

fn run() -> Result<()> {
    Cli::parse().run()
}

/// Source root with its tool configuration.
///
/// A missing configuration file means default settings.
struct Workspace {
    root: PathBuf,
    config: ToolConfig,
}

impl Workspace {
    fn discover() -> Result<Self> {
        let root = locate_source_root()?;
        let path = root.join(CONFIG_FILE_NAME);
        let data = if path.is_file() {
            read_to_string(&path).with_context(|| format!("failed to read {:?}", path.display()))?
        } else {
            String::new()
        };
        let config = data
            .parse::<ToolConfig>()
            .with_context(|| format!("invalid configuration {:?}", path.display()))?;

        Ok(Self { root, config })
    }

    /// Alias definition path, if the configured file exists.
    fn aliases(&self) -> Option<PathBuf> {
        let path = resolve_against(&self.root, &self.config.lldb.aliases);
        path.is_file().then_some(path)
    }

    fn commands(&self) -> PathBuf {
        resolve_against(&self.root, &self.config.lldb.commands)
    }
}

/// Load explicit alias file, else configured one, else the builtin table.
fn load_aliases(explicit: Option<&Path>, workspace: Option<&Workspace>) -> Result<AliasTable> {
    let path = explicit
        .map(Path::to_path_buf)
        .or_else(|| workspace.and_then(Workspace::aliases));

    let table = match path {
        Some(path) => AliasTable::load(path)?,
        None => {
            info!("no alias definition found, use builtin aliases");
            AliasTable::builtin()?
        }
    };

    Ok(table)
}

/// Subcommands still work outside of a source root.
fn try_workspace() -> Option<Workspace> {
    match Workspace::discover() {
        Ok(workspace) => Some(workspace),
        Err(error) => {
            warn!("{error:#}");
            None
        }
    }
}

fn run_sync(force: bool) -> Result<()> {
    let workspace = Workspace::discover()?;
    let config = SyncConfig::from_settings(&workspace.root, &workspace.config.sync);
    let mode = if force {
        RunMode::Force
    } else {
        RunMode::Interactive
    };
    if config.destination_root() != home_dir()? {
        warn!(
            "destination {:?} is not your home directory",
            config.destination_root().display()
        );
    }
    let profile = config.profile().to_path_buf();
    let reloader = ShellProfile::new(&profile);

    let outcome = if stdin().is_terminal() {
        sync_with(config, mode, InquirePrompt::new(), reloader)?
    } else {
        let prompt = StreamPrompt::new(stdin().lock(), stderr());
        sync_with(config, mode, prompt, reloader)?
    };

    match outcome {
        SyncOutcome::Declined { .. } => {}
        SyncOutcome::Completed { .. } => {
            info!(
                "run `source {}` to apply the profile to this shell",
                profile.display()
            );
        }
    }

    Ok(())
}

fn sync_with(
    config: SyncConfig,
    mode: RunMode,
    prompt: impl Confirm,
    reloader: ShellProfile,
) -> Result<SyncOutcome> {
    let sync = Synchronizer::new(config, mode, Git2Upstream::default(), prompt, reloader);
    Ok(sync.run()?)
}

fn run_lldbinit(opts: LldbinitOptions) -> Result<()> {
    let workspace = try_workspace();
    let table = load_aliases(opts.aliases.as_deref(), workspace.as_ref())?;

    let commands = opts
        .commands
        .or_else(|| workspace.as_ref().map(Workspace::commands));
    let scripts = match commands {
        Some(dir) => scan_commands(dir)?,
        None => Vec::new(),
    };

    let init = InitFile::new(&table, scripts).to_string();
    match opts.output {
        Some(path) => {
            write(&path, init).with_context(|| format!("failed to write {:?}", path.display()))?;
            info!("wrote LLDB init file {:?}", path.display());
        }
        None => print!("{init}"),
    }

    Ok(())
}

fn run_expand(opts: ExpandOptions) -> Result<()> {
    let workspace = try_workspace();
    let table = load_aliases(opts.aliases.as_deref(), workspace.as_ref())?;
    let expansion = table.resolve(&opts.name, opts.input.join(" "))?;
    println!("{expansion}");

    Ok(())
}

fn run_new_script(opts: NewScriptOptions) -> Result<()> {
    let mut scaffold = ScriptScaffold::new(&opts.name)?;
    if let Some(command) = opts.command_name {
        scaffold = scaffold.with_command_name(command)?;
    }

    let dir = match opts.dir {
        Some(dir) => dir,
        None => Workspace::discover()?.commands(),
    };
    let path = scaffold.write_into(dir)?;
    println!("{}", path.display());

    Ok(())
}
