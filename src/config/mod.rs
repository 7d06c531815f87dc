pub mod bot_config;
pub mod guild_config;

pub use bot_config::BotConfig;
pub use guild_config::GuildConfig;
