//! Static description of every supported AT command.
//!
//! A descriptor fixes a command's prefix, its syntactic form, how many
//! parameters it takes, and how the driver must transmit it.

/// Syntactic form of an AT command line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Form {
    /// `AT+X`
    Execute,
    /// `AT+X?`
    Query,
    /// `AT+X=?`
    Test,
    /// `AT+X=<p1>,<p2>...`; written as `AT+X` when no parameters are given.
    Set,
}

/// Everything the encoder, decoder, and driver need to know about one
/// command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CommandDescriptor {
    /// Short operation name, used in logs.
    pub name: &'static str,
    /// Fixed prefix including `AT+`.
    pub prefix: &'static str,
    pub form: Form,
    pub min_params: usize,
    pub max_params: usize,
    /// Send the line one byte per hardware call regardless of its length.
    pub byte_safe: bool,
    /// A raw payload follows the command after a settle delay.
    pub payload_phase: bool,
}

const fn simple(name: &'static str, prefix: &'static str, form: Form) -> CommandDescriptor {
    CommandDescriptor {
        name,
        prefix,
        form,
        min_params: 0,
        max_params: 0,
        byte_safe: false,
        payload_phase: false,
    }
}

const fn set(
    name: &'static str,
    prefix: &'static str,
    min_params: usize,
    max_params: usize,
) -> CommandDescriptor {
    CommandDescriptor {
        name,
        prefix,
        form: Form::Set,
        min_params,
        max_params,
        byte_safe: false,
        payload_phase: false,
    }
}

pub const RESET: CommandDescriptor = simple("reset", "AT+RST", Form::Execute);
pub const VERSION: CommandDescriptor = simple("version", "AT+GMR", Form::Execute);
pub const DEEP_SLEEP: CommandDescriptor = set("deep-sleep", "AT+GSLP", 1, 1);
pub const QUERY_WIFI_MODE: CommandDescriptor = simple("query-wifi-mode", "AT+CWMODE", Form::Test);
pub const SET_WIFI_MODE: CommandDescriptor = set("set-wifi-mode", "AT+CWMODE", 1, 1);
pub const QUERY_AP: CommandDescriptor = simple("query-ap", "AT+CWJAP", Form::Query);
pub const JOIN_AP: CommandDescriptor = set("join-ap", "AT+CWJAP", 2, 3);
pub const LIST_APS: CommandDescriptor = set("list-aps", "AT+CWLAP", 0, 1);
pub const SET_DHCP: CommandDescriptor = set("set-dhcp", "AT+CWDHCP", 2, 2);
pub const QUERY_DHCP: CommandDescriptor = simple("query-dhcp", "AT+CWDHCP", Form::Query);
pub const QUERY_SOFTAP: CommandDescriptor = simple("query-softap", "AT+CWSAP", Form::Query);
pub const SET_SOFTAP: CommandDescriptor = set("set-softap", "AT+CWSAP", 4, 6);
pub const LIST_SOFTAP_CLIENTS: CommandDescriptor =
    simple("list-softap-clients", "AT+CWLIF", Form::Execute);
pub const CONNECTION_STATUS: CommandDescriptor =
    simple("connection-status", "AT+CIPSTATUS", Form::Execute);
pub const OPEN_SESSION: CommandDescriptor = CommandDescriptor {
    byte_safe: true,
    ..set("open-session", "AT+CIPSTART", 4, 4)
};
pub const PREPARE_SEND: CommandDescriptor = CommandDescriptor {
    byte_safe: true,
    payload_phase: true,
    ..set("prepare-send", "AT+CIPSEND", 1, 1)
};

/// Every supported command.
pub const DESCRIPTORS: &[CommandDescriptor] = &[
    RESET,
    VERSION,
    DEEP_SLEEP,
    QUERY_WIFI_MODE,
    SET_WIFI_MODE,
    QUERY_AP,
    JOIN_AP,
    LIST_APS,
    SET_DHCP,
    QUERY_DHCP,
    QUERY_SOFTAP,
    SET_SOFTAP,
    LIST_SOFTAP_CLIENTS,
    CONNECTION_STATUS,
    OPEN_SESSION,
    PREPARE_SEND,
];

/// Find the descriptor for a decoded prefix and form.
///
/// A bare `AT+X` matches a set-form command whose parameters are all
/// optional.
pub fn descriptor_for_prefix(prefix: &str, form: Form) -> Option<&'static CommandDescriptor> {
    DESCRIPTORS.iter().find(|d| {
        d.prefix == prefix
            && (d.form == form || (form == Form::Execute && d.form == Form::Set && d.min_params == 0))
    })
}

impl CommandDescriptor {
    /// Whether `count` parameters fit this command.
    pub fn accepts_arity(&self, count: usize) -> bool {
        (self.min_params..=self.max_params).contains(&count)
    }
}
