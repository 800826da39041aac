use rust_embed::RustEmbed;

/// Embedded migrations of the sequence store
#[derive(RustEmbed)]
#[folder = "src/database/migrations/primary/"]
#[prefix = "migrations/"]
pub struct SequenceMigrations;

/// Embedded migrations of the QC report store
#[derive(RustEmbed)]
#[folder = "src/database/migrations/qc/"]
#[prefix = "migrations/"]
pub struct QcMigrations;

/// Collect `(file name, sql)` pairs of an embedded migration folder, sorted
/// by file name
pub fn migrations<E: RustEmbed>() -> Vec<(String, String)> {
    let mut migrations: Vec<(String, String)> = E::iter()
        .filter_map(|file_path| {
            E::get(&file_path).map(|file| {
                let content = String::from_utf8_lossy(&file.data).to_string();
                let name = file_path
                    .strip_prefix("migrations/")
                    .unwrap_or(&file_path)
                    .to_string();
                (name, content)
            })
        })
        .collect();

    migrations.sort_by(|a, b| a.0.cmp(&b.0));
    migrations
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_migrations_are_embedded_in_order() {
        let sequence = migrations::<SequenceMigrations>();
        assert!(!sequence.is_empty());
        assert!(sequence[0].0.starts_with("001_"));
        assert!(sequence[0].1.contains("CREATE TABLE IF NOT EXISTS sequences"));

        let qc = migrations::<QcMigrations>();
        assert!(qc.iter().any(|(_, sql)| sql.contains("qc_reports")));
    }
}
