use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use espat_command::{Command as AtCommand, SessionParams};
use tracing::info;

use crate::cmd::{parse_duration, sent_line, Context, StreamArgs};
use crate::exit::{driver_error, CliError, CliResult, INTERNAL, SUCCESS};
use crate::link::{CliDriver, Link};
use crate::output::{payload_preview, print_exchange, Exchange};

const TICK: Duration = Duration::from_millis(50);

/// Reset, query the firmware, open a session, then push `--data` every
/// `--interval` until `--count` payloads are sent or Ctrl-C.
pub fn run(args: StreamArgs, ctx: &Context) -> CliResult<i32> {
    let interval = parse_duration(&args.interval)?;
    let params = SessionParams::tcp(args.host, args.port, args.keepalive);
    let payload = args.data.into_bytes();

    let session_line = sent_line(&AtCommand::OpenSession(params.clone()))?;
    let payload_sent = vec![
        sent_line(&AtCommand::PrepareSend { len: payload.len() })?,
        payload_preview(&payload),
    ];

    let running = Arc::new(AtomicBool::new(true));
    install_ctrlc_handler(Arc::clone(&running))?;

    let mut link = Link::open(&ctx.settings)?;

    if !args.no_reset {
        let reset_line = sent_line(&AtCommand::Reset)?;
        step(&mut link, ctx, "reset", vec![reset_line], |d| d.reset_and_wait())?;
    }
    let version_line = sent_line(&AtCommand::Version)?;
    step(&mut link, ctx, "version", vec![version_line], |d| d.check_version())?;
    step(&mut link, ctx, "open-session", vec![session_line], |d| {
        d.establish_session(&params)
    })?;

    let mut sent = 0u64;
    while running.load(Ordering::SeqCst) {
        step(&mut link, ctx, "send-payload", payload_sent.clone(), |d| {
            d.send_payload(&payload)
        })?;
        sent = sent.saturating_add(1);

        if args.count.is_some_and(|count| sent >= count) {
            break;
        }
        wait_interruptible(interval, &running);
    }

    info!(sent, "stream finished");
    Ok(SUCCESS)
}

fn step(
    link: &mut Link,
    ctx: &Context,
    operation: &str,
    sent: Vec<String>,
    op: impl FnOnce(&mut CliDriver) -> espat_driver::Result<()>,
) -> CliResult<()> {
    op(link.driver()).map_err(|err| driver_error(&format!("{operation} failed"), err))?;
    let received = link.collect(ctx.listen);
    print_exchange(&Exchange::new(operation, sent, &received), &received, ctx.format);
    Ok(())
}

fn wait_interruptible(total: Duration, running: &AtomicBool) {
    let deadline = Instant::now() + total;
    while running.load(Ordering::SeqCst) {
        let Some(left) = deadline.checked_duration_since(Instant::now()) else {
            return;
        };
        if left.is_zero() {
            return;
        }
        thread::sleep(left.min(TICK));
    }
}

fn install_ctrlc_handler(running: Arc<AtomicBool>) -> CliResult<()> {
    ctrlc::set_handler(move || {
        running.store(false, Ordering::SeqCst);
    })
    .map_err(|err| CliError::new(INTERNAL, format!("signal handler setup failed: {err}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wait_returns_early_when_stopped() {
        let running = AtomicBool::new(false);
        let start = Instant::now();
        wait_interruptible(Duration::from_secs(5), &running);
        assert!(start.elapsed() < Duration::from_secs(1));
    }

    #[test]
    fn wait_honors_duration() {
        let running = AtomicBool::new(true);
        let start = Instant::now();
        wait_interruptible(Duration::from_millis(120), &running);
        assert!(start.elapsed() >= Duration::from_millis(120));
    }
}
