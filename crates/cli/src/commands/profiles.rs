//! Profiles command: list configured credential targets.

use anyhow::Result;

use crate::resolve::{self, GlobalArgs};

pub fn execute(global: &GlobalArgs) -> Result<()> {
    let settings = resolve::load_settings(global)?;
    let names = settings.profile_names();

    if names.is_empty() {
        println!("No profiles configured.");
        return Ok(());
    }
    for name in names {
        println!("{}", name);
    }
    Ok(())
}
