use std::path::PathBuf;

use clap::Parser;

#[derive(Debug, Parser)]
pub struct Args {
    #[arg(long)]
    pub file: PathBuf,

    /// Use this site name for every row instead of the file's `site_name` column.
    #[arg(long, value_parser = non_blank)]
    pub site_name: Option<String>,

    #[arg(long, env = "DATABASE_URL")]
    pub database_url: String,
}

fn non_blank(value: &str) -> Result<String, String> {
    if value.trim().is_empty() {
        return Err("must not be blank".to_string());
    }
    Ok(value.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(site_name: &str) -> Result<Args, clap::Error> {
        Args::try_parse_from([
            "nightwatcher-csv-importer",
            "--file",
            "readings.csv",
            "--database-url",
            "postgres://localhost/nightwatcher",
            "--site-name",
            site_name,
        ])
    }

    #[test]
    fn site_name_override_must_not_be_blank() {
        assert!(parse("").is_err());
        assert!(parse("  ").is_err());
        assert_eq!(parse("Backyard").unwrap().site_name.as_deref(), Some("Backyard"));
    }
}
