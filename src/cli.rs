use std::path::PathBuf;

use clap::{Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(name = "irc-bridge-slack")]
#[command(about = "IRC-Slack Bridge", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,

    #[arg(short, long, env = "CONFIG_PATH", default_value = "config.yaml")]
    pub config: PathBuf,
}

#[derive(Subcommand, Debug, PartialEq, Eq)]
pub enum Commands {
    #[command(about = "Validate the configuration file and environment, then exit")]
    ValidateConfig,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_to_running_the_bridge() {
        let cli = Cli::try_parse_from(["irc-bridge-slack", "--config", "bridge.yaml"])
            .expect("parse");
        assert_eq!(cli.command, None);
        assert_eq!(cli.config, PathBuf::from("bridge.yaml"));
    }

    #[test]
    fn validate_config_subcommand() {
        let cli = Cli::try_parse_from(["irc-bridge-slack", "validate-config"]).expect("parse");
        assert_eq!(cli.command, Some(Commands::ValidateConfig));
    }

    #[test]
    fn unknown_subcommand_is_rejected() {
        assert!(Cli::try_parse_from(["irc-bridge-slack", "migrate"]).is_err());
    }
}
