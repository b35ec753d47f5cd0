pub use self::parser::{
    AvatarStoreConfig, BridgeBinding, BridgeConfig, Config, IrcConfig, LoggingConfig,
    ShortenerConfig, SlackConfig,
};
pub use self::validator::ConfigError;

mod parser;
mod validator;
