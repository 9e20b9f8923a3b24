use espat_command::Command as AtCommand;

use crate::cmd::{exchange_one, Context, ResetArgs, SleepArgs};
use crate::exit::CliResult;

pub fn reset(args: ResetArgs, ctx: &Context) -> CliResult<i32> {
    exchange_one(ctx, &AtCommand::Reset, |driver| {
        if args.wait {
            driver.reset_and_wait()
        } else {
            driver.reset()
        }
    })
}

pub fn version(ctx: &Context) -> CliResult<i32> {
    exchange_one(ctx, &AtCommand::Version, |driver| driver.check_version())
}

pub fn sleep(args: SleepArgs, ctx: &Context) -> CliResult<i32> {
    exchange_one(
        ctx,
        &AtCommand::DeepSleep {
            millis: args.millis,
        },
        |driver| driver.enter_deep_sleep(args.millis),
    )
}

pub fn status(ctx: &Context) -> CliResult<i32> {
    exchange_one(ctx, &AtCommand::ConnectionStatus, |driver| {
        driver.connection_status()
    })
}
