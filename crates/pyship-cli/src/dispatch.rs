use color_eyre::Result;
use pyship_core::{
    BuildRequest, CleanRequest, CommandContext, CommandGroup, CommandInfo, ExecutionOutcome,
    PublishRequest, ReleaseRequest, TestRequest,
};
use tracing::debug;

use crate::cli::{
    BuildArgs, BuildFormat, CleanArgs, CommandGroupCli, PublishArgs, ReleaseArgs, TestArgs,
    UploadFlags,
};

pub fn dispatch_command(
    ctx: &CommandContext,
    group: Option<&CommandGroupCli>,
) -> Result<(CommandInfo, ExecutionOutcome)> {
    match group {
        None => {
            let info = CommandInfo::new(CommandGroup::Release, "release");
            let request = release_request_from_args(&ReleaseArgs::default());
            core_call(info, || pyship_core::release(ctx, &request))
        }
        Some(CommandGroupCli::Release(args)) => {
            let info = CommandInfo::new(CommandGroup::Release, "release");
            let request = release_request_from_args(args);
            core_call(info, || pyship_core::release(ctx, &request))
        }
        Some(CommandGroupCli::Clean(args)) => {
            let info = CommandInfo::new(CommandGroup::Clean, "clean");
            let request = clean_request_from_args(args);
            core_call(info, || pyship_core::clean_project(ctx, &request))
        }
        Some(CommandGroupCli::Build(args)) => {
            let info = CommandInfo::new(CommandGroup::Build, "build");
            let request = build_request_from_args(args);
            core_call(info, || pyship_core::build_project(ctx, &request))
        }
        Some(CommandGroupCli::Publish(args)) => {
            let info = CommandInfo::new(CommandGroup::Publish, "publish");
            let request = publish_request_from_args(args);
            core_call(info, || pyship_core::publish_project(ctx, &request))
        }
        Some(CommandGroupCli::Test(args)) => {
            let info = CommandInfo::new(CommandGroup::Test, "test");
            let request = test_request_from_args(args);
            core_call(info, || pyship_core::test_project(ctx, &request))
        }
    }
}

fn core_call<F>(info: CommandInfo, action: F) -> Result<(CommandInfo, ExecutionOutcome)>
where
    F: FnOnce() -> anyhow::Result<ExecutionOutcome>,
{
    debug!(group = %info.group, name = info.name, "running command");
    match action() {
        Ok(outcome) => Ok((info, outcome)),
        Err(err) => Ok((info, pyship_core::outcome_from_error(&err))),
    }
}

fn release_request_from_args(args: &ReleaseArgs) -> ReleaseRequest {
    ReleaseRequest {
        skip_upload: args.skip_upload,
        dry_run: args.upload.dry_run,
        registry: args.upload.registry.clone(),
        token_env: args.upload.token_env.clone(),
        no_input: args.upload.no_input,
    }
}

fn clean_request_from_args(args: &CleanArgs) -> CleanRequest {
    CleanRequest {
        out: args.out.clone(),
    }
}

fn build_request_from_args(args: &BuildArgs) -> BuildRequest {
    let (include_sdist, include_wheel) = match args.format {
        BuildFormat::Sdist => (true, false),
        BuildFormat::Wheel => (false, true),
        BuildFormat::Both => (true, true),
    };
    BuildRequest {
        include_sdist,
        include_wheel,
        out: args.out.clone(),
        clean: !args.no_clean,
    }
}

fn publish_request_from_args(args: &PublishArgs) -> PublishRequest {
    let flags: &UploadFlags = &args.upload;
    PublishRequest {
        registry: flags.registry.clone(),
        token_env: flags.token_env.clone(),
        dry_run: flags.dry_run,
        no_input: flags.no_input,
    }
}

fn test_request_from_args(args: &TestArgs) -> TestRequest {
    TestRequest {
        args: args.args.clone(),
    }
}
