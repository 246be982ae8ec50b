use crate::db::{get_connection, init_db};
use crate::error::Result;
use crate::settings::{resolve_data_dir, Settings};

/// Point extracto at a data directory and make sure its ledger exists.
/// Settings are written only once the database opened cleanly.
pub fn run(data_dir: Option<String>) -> Result<()> {
    let mut settings = Settings::load();
    if let Some(dir) = data_dir {
        settings.data_dir = resolve_data_dir(&dir)?;
    }
    std::fs::create_dir_all(&settings.data_dir)?;
    let conn = get_connection(&settings.db_path())?;
    init_db(&conn)?;
    settings.save()?;

    println!("Initialized extracto at {}", settings.data_dir.display());
    Ok(())
}
