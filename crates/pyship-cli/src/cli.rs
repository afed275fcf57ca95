use std::path::PathBuf;

use clap::{ArgAction, Args, Parser, Subcommand, ValueEnum};

pub const PYSHIP_HELP_TEMPLATE: &str =
    "{before-help}\nUsage:\n    {usage}\n\nGlobal options:\n{options}\n";

pub const PYSHIP_BEFORE_HELP: &str = concat!(
    "pyship ",
    env!("CARGO_PKG_VERSION"),
    " – Release pure-Python packages\n\n",
    "\x1b[1;36mRelease\x1b[0m\n",
    "  release          Clean dist/, build an sdist and a wheel, then upload (default).\n\n",
    "\x1b[1;36mSteps\x1b[0m\n",
    "  clean            Remove everything inside the output directory.\n",
    "  build            Write sdist and/or wheel archives into the output directory.\n",
    "  publish          Upload every artifact in the output directory.\n",
    "  test             Run the unittest suite, under coverage when enabled.\n",
);

#[derive(Parser, Debug)]
#[command(
    name = "pyship",
    author,
    version,
    propagate_version = false,
    disable_help_subcommand = true,
    before_help = PYSHIP_BEFORE_HELP,
    help_template = PYSHIP_HELP_TEMPLATE
)]
#[allow(clippy::struct_excessive_bools)]
pub struct PyshipCli {
    #[arg(
        short,
        long,
        help = "Suppress human output (errors still print to stderr)",
        global = true
    )]
    pub quiet: bool,
    #[arg(
        short,
        long,
        action = ArgAction::Count,
        help = "Increase logging (-vv reaches trace)",
        global = true
    )]
    pub verbose: u8,
    #[arg(long, help = "Force trace logging regardless of -v/-q", global = true)]
    pub trace: bool,
    #[arg(
        long,
        help = "Emit {status,message,details} JSON envelopes",
        global = true
    )]
    pub json: bool,
    #[arg(long, help = "Disable colored human output", global = true)]
    pub no_color: bool,
    #[arg(
        long,
        value_name = "DIR",
        help = "Project directory (defaults to the nearest pyproject.toml)",
        global = true
    )]
    pub project: Option<PathBuf>,
    #[command(subcommand)]
    pub command: Option<CommandGroupCli>,
}

#[derive(Subcommand, Debug)]
pub enum CommandGroupCli {
    #[command(
        about = "Clean the output directory, build sdist and wheel, then upload them.",
        override_usage = "pyship release [--skip-upload] [--dry-run] [--registry NAME|URL]"
    )]
    Release(ReleaseArgs),
    #[command(
        about = "Remove stale artifacts from the output directory.",
        override_usage = "pyship clean [--out DIR]"
    )]
    Clean(CleanArgs),
    #[command(
        about = "Build the sdist and/or universal wheel.",
        override_usage = "pyship build [sdist|wheel|both] [--out DIR] [--no-clean]"
    )]
    Build(BuildArgs),
    #[command(
        about = "Upload built artifacts to a package index.",
        override_usage = "pyship publish [--dry-run] [--registry NAME|URL] [--token-env VAR]"
    )]
    Publish(PublishArgs),
    #[command(
        about = "Run the project's unittest suite.",
        override_usage = "pyship test [-- <TEST_ARG>...]"
    )]
    Test(TestArgs),
}

#[derive(Args, Debug, Clone, Default)]
pub struct UploadFlags {
    #[arg(
        long,
        value_name = "NAME|URL",
        help = "Registry alias (pypi, testpypi), host, or upload URL"
    )]
    pub registry: Option<String>,
    #[arg(
        long,
        value_name = "VAR",
        help = "Environment variable holding an API token (default PYSHIP_TOKEN)"
    )]
    pub token_env: Option<String>,
    #[arg(long, help = "Never prompt for credentials")]
    pub no_input: bool,
    #[arg(long, help = "List what would be uploaded without contacting the registry")]
    pub dry_run: bool,
}

#[derive(Args, Debug, Clone, Default)]
pub struct ReleaseArgs {
    #[command(flatten)]
    pub upload: UploadFlags,
    #[arg(long, help = "Stop after building the sdist and wheel")]
    pub skip_upload: bool,
}

#[derive(Args, Debug)]
pub struct CleanArgs {
    #[arg(long, value_name = "DIR")]
    pub out: Option<PathBuf>,
}

#[derive(Args, Debug)]
pub struct BuildArgs {
    #[arg(value_enum, default_value_t = BuildFormat::Both)]
    pub format: BuildFormat,
    #[arg(long, value_name = "DIR")]
    pub out: Option<PathBuf>,
    #[arg(long, help = "Keep existing files in the output directory")]
    pub no_clean: bool,
}

#[derive(ValueEnum, Debug, Clone, Copy)]
pub enum BuildFormat {
    Sdist,
    Wheel,
    Both,
}

#[derive(Args, Debug)]
pub struct PublishArgs {
    #[command(flatten)]
    pub upload: UploadFlags,
}

#[derive(Args, Debug)]
pub struct TestArgs {
    #[arg(last = true, value_name = "TEST_ARG")]
    pub args: Vec<String>,
}
