use std::fs;

use espat_command::{Command as AtCommand, SessionParams, SessionProtocol};

use crate::cmd::{exchange, exchange_one, sent_line, ConnectArgs, Context, SendArgs};
use crate::exit::{io_error, CliResult};
use crate::output::payload_preview;

pub fn connect(args: ConnectArgs, ctx: &Context) -> CliResult<i32> {
    let params = SessionParams {
        protocol: if args.ssl {
            SessionProtocol::Ssl
        } else {
            SessionProtocol::Tcp
        },
        ..SessionParams::tcp(args.host, args.port, args.keepalive)
    };
    exchange_one(ctx, &AtCommand::OpenSession(params.clone()), |driver| {
        driver.establish_session(&params)
    })
}

pub fn send(args: SendArgs, ctx: &Context) -> CliResult<i32> {
    let payload = resolve_payload(&args)?;
    let sent = vec![
        sent_line(&AtCommand::PrepareSend { len: payload.len() })?,
        payload_preview(&payload),
    ];
    exchange(ctx, "send-payload", sent, |driver| driver.send_payload(&payload))
}

fn resolve_payload(args: &SendArgs) -> CliResult<Vec<u8>> {
    if let Some(data) = &args.data {
        return Ok(data.as_bytes().to_vec());
    }
    if let Some(path) = &args.file {
        return fs::read(path)
            .map_err(|err| io_error(&format!("failed reading {}", path.display()), err));
    }
    Ok(Vec::new())
}
