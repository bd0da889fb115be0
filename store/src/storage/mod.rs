//! Key-value slot storage. Each key holds one whole document that is read
//! and replaced as a unit.

pub trait SlotStorage: Send + Sync {
    /// Current contents of `key`, or `None` if the slot was never written.
    fn get(&self, key: &str) -> anyhow::Result<Option<String>>;
    /// Replace the contents of `key`. Readers never observe a partial write.
    fn set(&self, key: &str, value: &str) -> anyhow::Result<()>;
    /// Human-readable location, for logs.
    fn describe(&self) -> String;
}

pub mod file;
pub mod memory;
#[cfg(feature = "sqlite")]
pub mod sqlite;

fn check_key(key: &str) -> anyhow::Result<()> {
    if key.is_empty()
        || !key
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'))
        || key.starts_with('.')
    {
        anyhow::bail!("invalid slot key: {key:?}");
    }
    Ok(())
}
