use espat_command::{Bssid, Command as AtCommand, DhcpMode, Encryption, SoftApConfig, WifiMode};

use crate::cmd::{exchange_one, ApAction, ApArgs, Context, DhcpAction, DhcpArgs, ModeAction};
use crate::cmd::{ModeArgs, SoftapAction, SoftapArgs};
use crate::exit::{validation_error, CliResult};

pub fn mode(args: ModeArgs, ctx: &Context) -> CliResult<i32> {
    match args.action {
        ModeAction::Get => exchange_one(ctx, &AtCommand::QueryWifiMode, |driver| {
            driver.get_wifi_mode()
        }),
        ModeAction::Set { mode } => {
            let mode =
                WifiMode::try_from(mode).map_err(|err| validation_error("invalid mode", err))?;
            exchange_one(ctx, &AtCommand::SetWifiMode(mode), |driver| {
                driver.set_wifi_mode(mode)
            })
        }
    }
}

pub fn ap(args: ApArgs, ctx: &Context) -> CliResult<i32> {
    match args.action {
        ApAction::Get => exchange_one(ctx, &AtCommand::QueryAp, |driver| driver.get_current_ap()),
        ApAction::Join {
            ssid,
            password,
            bssid,
        } => {
            let bssid = bssid
                .map(|b| b.parse::<Bssid>())
                .transpose()
                .map_err(|err| validation_error("invalid --bssid", err))?;
            let command = AtCommand::JoinAp {
                ssid: ssid.clone(),
                password: password.clone(),
                bssid,
            };
            exchange_one(ctx, &command, |driver| driver.join_ap(&ssid, &password, bssid))
        }
        ApAction::List { ssid } => {
            let command = AtCommand::ListAps { ssid: ssid.clone() };
            exchange_one(ctx, &command, |driver| driver.list_aps(ssid.as_deref()))
        }
    }
}

pub fn dhcp(args: DhcpArgs, ctx: &Context) -> CliResult<i32> {
    match args.action {
        DhcpAction::Get => exchange_one(ctx, &AtCommand::QueryDhcp, |driver| driver.get_dhcp()),
        DhcpAction::Set { mode, disable } => {
            let mode =
                DhcpMode::try_from(mode).map_err(|err| validation_error("invalid mode", err))?;
            let enable = !disable;
            exchange_one(ctx, &AtCommand::SetDhcp { enable, mode }, |driver| {
                driver.set_dhcp(enable, mode)
            })
        }
    }
}

pub fn softap(args: SoftapArgs, ctx: &Context) -> CliResult<i32> {
    match args.action {
        SoftapAction::Get => {
            exchange_one(ctx, &AtCommand::QuerySoftAp, |driver| driver.get_soft_ap())
        }
        SoftapAction::Set {
            ssid,
            password,
            channel,
            encryption,
            max_conn,
            hidden,
        } => {
            let encryption = Encryption::try_from(encryption)
                .map_err(|err| validation_error("invalid --encryption", err))?;
            let config = SoftApConfig {
                max_conn,
                hidden: hidden.then_some(true),
                ..SoftApConfig::new(ssid, password, channel, encryption)
            };
            exchange_one(ctx, &AtCommand::SetSoftAp(config.clone()), |driver| {
                driver.set_soft_ap(&config)
            })
        }
        SoftapAction::Clients => exchange_one(ctx, &AtCommand::ListSoftApClients, |driver| {
            driver.list_soft_ap_clients()
        }),
    }
}
