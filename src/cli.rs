//! Command line interface for the `alpine` binary.
//!
//! The binary runs a device, discovers devices on the local network, or
//! streams a fixed frame to a device.

use std::net::SocketAddr;

use clap::{Parser, Subcommand, ValueEnum};

/// Command line arguments for the `alpine` binary.
#[derive(Debug, Parser)]
#[command(name = "alpine", version, about = "ALPINE lighting controller and device tools")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Run a device and print every frame it receives.
    Device {
        /// Address to listen on.
        #[arg(long, default_value = "0.0.0.0:5555")]
        bind: SocketAddr,
        /// Shared secret used to authenticate controllers.
        #[arg(long)]
        secret: Option<String>,
    },
    /// Broadcast a discovery request and list the devices that answer.
    Discover {
        /// Broadcast address to query.
        #[arg(long)]
        broadcast: SocketAddr,
        /// Local address to bind.
        #[arg(long, default_value = "0.0.0.0:0")]
        bind: SocketAddr,
        /// How long to collect replies, in milliseconds.
        #[arg(long, default_value_t = 1000)]
        timeout_ms: u64,
        /// Require replies signed with this shared secret.
        #[arg(long)]
        secret: Option<String>,
    },
    /// Connect to a device and stream a fixed frame.
    Send {
        /// Device address.
        #[arg(long)]
        remote: SocketAddr,
        /// Local address to bind.
        #[arg(long, default_value = "0.0.0.0:0")]
        bind: SocketAddr,
        /// Stream profile to bind.
        #[arg(long, value_enum, default_value_t = ProfileArg::Auto)]
        profile: ProfileArg,
        /// Comma-separated channel values.
        #[arg(long, value_delimiter = ',', default_value = "0")]
        channels: Vec<u16>,
        /// Number of frames to send.
        #[arg(long, default_value_t = 1)]
        count: u32,
        /// Delay between frames, in milliseconds.
        #[arg(long, default_value_t = 25)]
        interval_ms: u64,
        /// Shared secret used to authenticate the device.
        #[arg(long)]
        secret: Option<String>,
    },
}

/// Built-in stream profiles selectable from the command line.
#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum ProfileArg {
    Auto,
    Realtime,
    Install,
}

#[cfg(test)]
mod tests {
    use clap::Parser;

    use super::{Cli, Command, ProfileArg};

    #[test]
    fn parses_send_with_channel_list() {
        let cli = Cli::parse_from([
            "alpine",
            "send",
            "--remote",
            "127.0.0.1:5555",
            "--profile",
            "realtime",
            "--channels",
            "1,2,255",
            "--count",
            "3",
        ]);
        let Command::Send {
            remote,
            profile,
            channels,
            count,
            interval_ms,
            ..
        } = cli.command
        else {
            panic!("expected send command");
        };
        assert_eq!(remote.port(), 5555);
        assert_eq!(profile, ProfileArg::Realtime);
        assert_eq!(channels, vec![1, 2, 255]);
        assert_eq!(count, 3);
        assert_eq!(interval_ms, 25);
    }

    #[test]
    fn device_defaults_to_standard_port() {
        let cli = Cli::parse_from(["alpine", "device"]);
        assert!(matches!(
            cli.command,
            Command::Device { bind, secret: None } if bind.port() == 5555
        ));
    }

    #[test]
    fn discover_requires_broadcast_address() {
        assert!(Cli::try_parse_from(["alpine", "discover"]).is_err());
    }
}
