use std::sync::Arc;

use clap::Parser;
use color_eyre::{eyre::eyre, Result};
use pyship_core::{CommandContext, CommandGroup, CommandInfo, GlobalOptions, SystemEffects};
use tracing_subscriber::EnvFilter;

mod cli;
mod dispatch;
mod output;
mod style;

use cli::{CommandGroupCli, PyshipCli};
use output::{emit_output, OutputOptions};

fn main() -> Result<()> {
    color_eyre::install()?;

    let cli = PyshipCli::parse();
    init_tracing(cli.trace, cli.verbose, cli.quiet);

    let global = GlobalOptions {
        quiet: cli.quiet,
        verbose: cli.verbose,
        trace: cli.trace,
        json: cli.json,
        project: cli.project.clone(),
    };
    let options = OutputOptions {
        quiet: cli.quiet,
        json: cli.json,
        no_color: cli.no_color,
    };

    let code = match CommandContext::new(&global, Arc::new(SystemEffects::new())) {
        Ok(ctx) => {
            let (info, outcome) = dispatch::dispatch_command(&ctx, cli.command.as_ref())
                .map_err(|err| eyre!("{err:?}"))?;
            emit_output(&options, info, &outcome)?
        }
        Err(err) => {
            // Unusable PYSHIP_* settings surface before any command runs.
            let outcome = pyship_core::outcome_from_error(&err);
            let info = command_info(&cli);
            emit_output(&options, info, &outcome)?
        }
    };

    if code == 0 {
        Ok(())
    } else {
        std::process::exit(code);
    }
}

fn command_info(cli: &PyshipCli) -> CommandInfo {
    match cli.command {
        None | Some(CommandGroupCli::Release(_)) => {
            CommandInfo::new(CommandGroup::Release, "release")
        }
        Some(CommandGroupCli::Clean(_)) => CommandInfo::new(CommandGroup::Clean, "clean"),
        Some(CommandGroupCli::Build(_)) => CommandInfo::new(CommandGroup::Build, "build"),
        Some(CommandGroupCli::Publish(_)) => CommandInfo::new(CommandGroup::Publish, "publish"),
        Some(CommandGroupCli::Test(_)) => CommandInfo::new(CommandGroup::Test, "test"),
    }
}

fn init_tracing(trace: bool, verbose: u8, quiet: bool) {
    let level = if trace {
        "trace"
    } else if quiet {
        "error"
    } else {
        match verbose {
            0 => "warn",
            1 => "info",
            2 => "debug",
            _ => "trace",
        }
    };

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(format!(
            "pyship_core={level},pyship_domain={level},pyship_cli={level}"
        ))
    });
    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_level(true)
        .finish();

    let _ = tracing::subscriber::set_global_default(subscriber);
}
