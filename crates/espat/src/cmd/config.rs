use crate::cmd::Context;
use crate::exit::{CliError, CliResult, INTERNAL, SUCCESS};
use crate::output::OutputFormat;

pub fn run(ctx: &Context) -> CliResult<i32> {
    let settings = &ctx.settings;
    match ctx.format {
        OutputFormat::Json | OutputFormat::Raw => {
            let json = serde_json::to_string_pretty(settings)
                .map_err(|err| CliError::new(INTERNAL, format!("config encode failed: {err}")))?;
            println!("{json}");
        }
        OutputFormat::Table | OutputFormat::Pretty => {
            println!("espat link configuration\n");
            println!("  Device:         {}", settings.device);
            println!("  Device id:      {}", settings.device_id);
            println!("  Baud:           {}", settings.baud);
            println!(
                "  Config file:    {}",
                settings
                    .config_file
                    .as_ref()
                    .map(|p| p.display().to_string())
                    .unwrap_or_else(|| "(none)".to_string())
            );
            println!(
                "  Spin limit:     {}",
                settings
                    .transport
                    .spin_limit
                    .map(|n| n.to_string())
                    .unwrap_or_else(|| "unbounded".to_string())
            );
            println!("  Session settle: {:?}", settings.driver.session_settle);
            println!("  Payload settle: {:?}", settings.driver.payload_settle);
            println!("  Reset settle:   {:?}", settings.driver.reset_settle);
        }
    }
    Ok(SUCCESS)
}
