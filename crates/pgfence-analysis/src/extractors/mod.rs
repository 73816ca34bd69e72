//! Extractors: lift SQL out of migration source files.
//!
//! Each format maps a file to `(sql, warnings, auto_commit)`. Raw formats
//! return the body as-is; the ORM extractors parse the host language with
//! tree-sitter, locate the upward migration, and lift literal SQL or
//! transpile builder calls. Dynamic SQL always warns rather than silently
//! disappearing — the warning count is what the coverage number reports.

mod js;
mod knex;
mod raw;
mod sequelize;
mod typeorm;

use std::path::Path;

use serde::Serialize;

use pgfence_core::errors::{ConfigError, ExtractError};

/// A dynamic-SQL site, a conditional-SQL site, or an unanalyzable block.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExtractionWarning {
    pub file: String,
    /// 1-based.
    pub line: usize,
    /// 1-based.
    pub column: usize,
    pub message: String,
}

/// The product of one extractor run.
#[derive(Debug, Clone, Default)]
pub struct Extraction {
    pub sql: String,
    pub warnings: Vec<ExtractionWarning>,
    /// The host migration disabled its wrapping transaction; statements
    /// commit individually and locks do not accumulate.
    pub auto_commit: bool,
}

/// Recognized migration source formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MigrationFormat {
    Sql,
    Prisma,
    Drizzle,
    TypeOrm,
    Knex,
    Sequelize,
}

impl MigrationFormat {
    /// Parse a `--format` value; `auto` means detect per file.
    pub fn parse_flag(value: &str) -> Result<Option<Self>, ConfigError> {
        match value.to_ascii_lowercase().as_str() {
            "auto" => Ok(None),
            "sql" => Ok(Some(Self::Sql)),
            "prisma" => Ok(Some(Self::Prisma)),
            "drizzle" => Ok(Some(Self::Drizzle)),
            "typeorm" => Ok(Some(Self::TypeOrm)),
            "knex" => Ok(Some(Self::Knex)),
            "sequelize" => Ok(Some(Self::Sequelize)),
            _ => Err(ConfigError::InvalidFormat {
                value: value.to_string(),
            }),
        }
    }

    /// Detect the format from the path and a peek at the source.
    pub fn detect(path: &Path, source: &str) -> Result<Self, ExtractError> {
        let extension = path
            .extension()
            .and_then(|ext| ext.to_str())
            .unwrap_or_default()
            .to_ascii_lowercase();

        match extension.as_str() {
            "sql" => Ok(Self::Sql),
            "ts" | "mts" | "cts" | "js" | "mjs" | "cjs" => {
                if source.contains("typeorm") || source.contains("MigrationInterface") {
                    Ok(Self::TypeOrm)
                } else if source.contains("knex") {
                    Ok(Self::Knex)
                } else if source.contains("queryInterface") || source.contains("sequelize") {
                    Ok(Self::Sequelize)
                } else {
                    Err(ExtractError::UnknownFormat {
                        path: path.to_path_buf(),
                    })
                }
            }
            _ => Err(ExtractError::UnknownFormat {
                path: path.to_path_buf(),
            }),
        }
    }
}

/// Read and extract one migration file.
pub fn extract_file(
    path: &Path,
    format: Option<MigrationFormat>,
) -> Result<Extraction, ExtractError> {
    let source = std::fs::read_to_string(path).map_err(|source| ExtractError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let format = match format {
        Some(format) => format,
        None => MigrationFormat::detect(path, &source)?,
    };
    extract_source(&path.display().to_string(), &source, format)
}

/// Extract from in-memory source.
pub fn extract_source(
    file: &str,
    source: &str,
    format: MigrationFormat,
) -> Result<Extraction, ExtractError> {
    match format {
        MigrationFormat::Sql | MigrationFormat::Prisma | MigrationFormat::Drizzle => {
            Ok(raw::extract(source))
        }
        MigrationFormat::TypeOrm => typeorm::extract(file, source),
        MigrationFormat::Knex => knex::extract(file, source),
        MigrationFormat::Sequelize => sequelize::extract(file, source),
    }
}
