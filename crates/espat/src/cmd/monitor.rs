use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use espat_command::LineAccumulator;

use crate::cmd::{parse_duration, Context, MonitorArgs};
use crate::exit::{CliError, CliResult, INTERNAL, SUCCESS};
use crate::link::Link;
use crate::output::print_line;

const POLL: Duration = Duration::from_millis(100);

pub fn run(args: MonitorArgs, ctx: &Context) -> CliResult<i32> {
    let idle_timeout = args
        .idle_timeout
        .as_deref()
        .map(parse_duration)
        .transpose()?;

    let running = Arc::new(AtomicBool::new(true));
    let flag = Arc::clone(&running);
    ctrlc::set_handler(move || flag.store(false, Ordering::SeqCst))
        .map_err(|err| CliError::new(INTERNAL, format!("signal handler setup failed: {err}")))?;

    let link = Link::open(&ctx.settings)?;
    let mut lines = LineAccumulator::new();
    let mut printed = 0usize;
    let mut last_activity = Instant::now();

    while running.load(Ordering::SeqCst) {
        if let Some(chunk) = link.responses().recv_timeout(POLL) {
            lines.push(&chunk);
            last_activity = Instant::now();
        }

        for line in lines.by_ref() {
            print_line(&line, ctx.format);
            printed = printed.saturating_add(1);
            if args.count.is_some_and(|count| printed >= count) {
                return Ok(SUCCESS);
            }
        }

        if idle_timeout.is_some_and(|limit| last_activity.elapsed() >= limit) {
            break;
        }
    }

    if let Some(line) = lines.finish() {
        print_line(&line, ctx.format);
    }
    Ok(SUCCESS)
}
