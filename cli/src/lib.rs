pub mod vault;

pub use vault::VaultCli;
pub use vault::VaultCommand;
pub use vault::run;
