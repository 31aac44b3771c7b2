//! Business domain constants: entity/taxonomy identifiers, settings keys,
//! and the hard caps the pipeline and importer enforce.

/// Entity type under which remote cases are materialized locally.
pub const CASE_ENTITY_TYPE: &str = "gallery_case";

/// Taxonomy holding category and procedure labels.
pub const PROCEDURE_TAXONOMY: &str = "gallery_procedure";

/// Metadata key carrying the immutable remote case id on a local entity.
pub const META_REMOTE_CASE_ID: &str = "remote_case_id";

/// Metadata key for the remote procedure ids a case belongs to (JSON array).
pub const META_PROCEDURE_IDS: &str = "remote_procedure_ids";

/// Settings keys. Engine-owned settings share the `gallery_` prefix so a
/// backup can snapshot all of them with a single prefix scan.
pub mod settings {
    /// Current installation mode: "api" or "local".
    pub const MODE: &str = "gallery_mode";
    /// Serialized singleton `MigrationStatus`.
    pub const MIGRATION_STATUS: &str = "gallery_migration_status";
    /// Serialized singleton pre-migration backup.
    pub const MIGRATION_BACKUP: &str = "gallery_migration_backup";
    /// Prefix shared by every engine-owned setting.
    pub const PREFIX: &str = "gallery_";
}

/// Stage 3 keeps at most this many per-case error strings; anything beyond
/// is counted and reported as a single "…and N more" summary line.
pub const MAX_STAGE_ERRORS: usize = 1000;

/// Minimum free disk space required before a to-local migration (1 GiB).
pub const MIN_FREE_DISK_BYTES: u64 = 1024 * 1024 * 1024;

/// Minimum execution time budget an operator may impose on a migration.
pub const MIN_TIME_BUDGET_SECS: u64 = 30;

/// Current export document format version. Imports declaring a newer
/// version are rejected outright.
pub const EXPORT_FORMAT_VERSION: u32 = 3;

/// Hard cap on the serialized size of an import payload (bytes).
pub const MAX_IMPORT_BYTES: usize = 50 * 1024 * 1024;

/// Hard cap on JSON nesting depth of an import payload.
pub const MAX_IMPORT_DEPTH: usize = 12;
