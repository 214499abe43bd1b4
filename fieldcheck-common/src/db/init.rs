//! Database initialization
//!
//! Creates the connection pool and the full relational schema. All table
//! creation is idempotent (`CREATE TABLE IF NOT EXISTS`), so startup is safe
//! against an existing database.
//!
//! Application-side validation is the single source of truth for the tree
//! invariants; the CHECK constraints here reassert a subset (parent
//! exclusivity, the grid biconditionals, the single-choice option rule) as a
//! last line of defense. A CHECK firing after validation passed is a defect.

use crate::Result;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions};
use sqlx::SqlitePool;
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;
use tracing::info;

/// Initialize database connection pool and create tables if needed.
///
/// Connect options carry the pragmas, so every pooled connection gets WAL
/// and enforced foreign keys; cascade deletes depend on the latter.
pub async fn init_database(db_path: &Path) -> Result<SqlitePool> {
    let newly_created = !db_path.exists();

    if let Some(parent) = db_path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let options = SqliteConnectOptions::new()
        .filename(db_path)
        .create_if_missing(true)
        .journal_mode(SqliteJournalMode::Wal)
        .busy_timeout(Duration::from_secs(5))
        .foreign_keys(true);
    let pool = SqlitePoolOptions::new()
        .max_connections(10)
        .connect_with(options)
        .await?;

    if newly_created {
        info!("Initialized new database: {}", db_path.display());
    } else {
        info!("Opened existing database: {}", db_path.display());
    }

    create_schema(&pool).await?;

    Ok(pool)
}

/// Single-connection in-memory database with the full schema. Test-only in
/// spirit: a pooled in-memory database would give every connection its own
/// empty database, so the pool is pinned to one connection.
pub async fn init_memory_database() -> Result<SqlitePool> {
    let options = SqliteConnectOptions::from_str("sqlite::memory:")?.foreign_keys(true);
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect_with(options)
        .await?;

    create_schema(&pool).await?;

    Ok(pool)
}

/// Create all tables and indexes. Idempotent.
pub async fn create_schema(pool: &SqlitePool) -> Result<()> {
    create_organizations_table(pool).await?;
    create_profiles_table(pool).await?;
    create_tags_table(pool).await?;
    create_tag_vocabularies_table(pool).await?;
    create_assets_table(pool).await?;
    create_questionnaires_table(pool).await?;
    create_blocks_table(pool).await?;
    create_titles_table(pool).await?;
    create_questions_table(pool).await?;
    create_answer_options_table(pool).await?;
    create_numeric_bands_table(pool).await?;
    create_questionnaire_photos_table(pool).await?;
    create_inspections_table(pool).await?;
    create_answers_table(pool).await?;
    create_answer_photos_table(pool).await?;

    Ok(())
}

async fn create_organizations_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS organizations (
            id TEXT PRIMARY KEY,
            nombre TEXT NOT NULL,
            link TEXT NOT NULL DEFAULT '',
            acerca TEXT NOT NULL DEFAULT ''
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

async fn create_profiles_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS profiles (
            id TEXT PRIMARY KEY,
            organization_id TEXT NOT NULL REFERENCES organizations(id) ON DELETE CASCADE,
            nombre TEXT NOT NULL,
            rol TEXT NOT NULL CHECK (rol IN ('inspector', 'administrador')),
            celular TEXT NOT NULL DEFAULT ''
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

/// Deduplicated (clave, valor) labels for assets and questions.
///
/// `scope` is either the literal 'global' or an organization id, depending
/// on the configured tag scoping mode. It is part of the natural key so both
/// modes coexist on one schema.
async fn create_tags_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS tags (
            id TEXT PRIMARY KEY,
            kind TEXT NOT NULL CHECK (kind IN ('activo', 'pregunta')),
            scope TEXT NOT NULL,
            clave TEXT NOT NULL,
            valor TEXT NOT NULL,
            UNIQUE (kind, scope, clave, valor)
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

/// Named hierarchical tag vocabularies, one tree per (kind, organization,
/// nombre). The tree itself is an opaque JSON document the clients author;
/// the server never interprets it.
async fn create_tag_vocabularies_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS tag_vocabularies (
            kind TEXT NOT NULL CHECK (kind IN ('activo', 'pregunta')),
            organization_id TEXT NOT NULL REFERENCES organizations(id) ON DELETE CASCADE,
            nombre TEXT NOT NULL,
            arbol TEXT NOT NULL,
            PRIMARY KEY (kind, organization_id, nombre)
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

/// Assets carry an organization-scoped natural key: the same freeform id may
/// exist in two organizations.
async fn create_assets_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS assets (
            id TEXT NOT NULL,
            organization_id TEXT NOT NULL REFERENCES organizations(id) ON DELETE CASCADE,
            PRIMARY KEY (id, organization_id)
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS asset_tags (
            asset_id TEXT NOT NULL,
            organization_id TEXT NOT NULL,
            tag_id TEXT NOT NULL REFERENCES tags(id) ON DELETE CASCADE,
            PRIMARY KEY (asset_id, organization_id, tag_id),
            FOREIGN KEY (asset_id, organization_id)
                REFERENCES assets(id, organization_id) ON DELETE CASCADE
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

async fn create_questionnaires_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS questionnaires (
            id TEXT PRIMARY KEY,
            organization_id TEXT NOT NULL REFERENCES organizations(id) ON DELETE CASCADE,
            tipo_de_inspeccion TEXT NOT NULL,
            version INTEGER NOT NULL,
            periodicidad_dias INTEGER NOT NULL,
            creador_id TEXT REFERENCES profiles(id) ON DELETE SET NULL,
            UNIQUE (organization_id, tipo_de_inspeccion, version)
        )
        "#,
    )
    .execute(pool)
    .await?;

    // applicable asset-tags for questionnaire-to-asset matching
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS questionnaire_tags (
            questionnaire_id TEXT NOT NULL REFERENCES questionnaires(id) ON DELETE CASCADE,
            tag_id TEXT NOT NULL REFERENCES tags(id) ON DELETE CASCADE,
            PRIMARY KEY (questionnaire_id, tag_id)
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

async fn create_blocks_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS blocks (
            id TEXT PRIMARY KEY,
            questionnaire_id TEXT NOT NULL REFERENCES questionnaires(id) ON DELETE CASCADE,
            n_orden INTEGER
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_blocks_questionnaire ON blocks(questionnaire_id)",
    )
    .execute(pool)
    .await?;

    Ok(())
}

async fn create_titles_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS titles (
            id TEXT PRIMARY KEY,
            block_id TEXT NOT NULL UNIQUE REFERENCES blocks(id) ON DELETE CASCADE,
            titulo TEXT NOT NULL,
            descripcion TEXT NOT NULL DEFAULT ''
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

/// Questions are a self-referential tree: a question belongs to exactly one
/// of {a block, a parent grid question}. Grid members hang off their grid,
/// never off a block.
async fn create_questions_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS questions (
            id TEXT PRIMARY KEY,
            block_id TEXT UNIQUE REFERENCES blocks(id) ON DELETE CASCADE,
            parent_question_id TEXT REFERENCES questions(id) ON DELETE CASCADE,
            titulo TEXT NOT NULL,
            descripcion TEXT NOT NULL DEFAULT '',
            criticidad INTEGER NOT NULL,
            tipo_de_pregunta TEXT NOT NULL CHECK (tipo_de_pregunta IN
                ('cuadricula', 'parte_de_cuadricula', 'seleccion_unica',
                 'seleccion_multiple', 'numerica')),
            tipo_de_cuadricula TEXT CHECK (tipo_de_cuadricula IN
                ('seleccion_unica', 'seleccion_multiple')),
            unidades TEXT,
            CHECK ((block_id IS NULL) <> (parent_question_id IS NULL)),
            CHECK ((tipo_de_pregunta = 'cuadricula') = (tipo_de_cuadricula IS NOT NULL)),
            CHECK ((tipo_de_pregunta = 'parte_de_cuadricula') = (parent_question_id IS NOT NULL))
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_questions_parent ON questions(parent_question_id)",
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS question_tags (
            question_id TEXT NOT NULL REFERENCES questions(id) ON DELETE CASCADE,
            tag_id TEXT NOT NULL REFERENCES tags(id) ON DELETE CASCADE,
            PRIMARY KEY (question_id, tag_id)
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

async fn create_answer_options_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS answer_options (
            id TEXT PRIMARY KEY,
            question_id TEXT NOT NULL REFERENCES questions(id) ON DELETE CASCADE,
            titulo TEXT NOT NULL,
            descripcion TEXT NOT NULL DEFAULT '',
            criticidad INTEGER NOT NULL,
            requiere_criticidad_del_inspector INTEGER NOT NULL DEFAULT 0
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_answer_options_question ON answer_options(question_id)",
    )
    .execute(pool)
    .await?;

    Ok(())
}

/// `posicion` preserves insertion order; band lookup is first-match in
/// `posicion` order, inclusive at both interval edges.
async fn create_numeric_bands_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS numeric_bands (
            id TEXT PRIMARY KEY,
            question_id TEXT NOT NULL REFERENCES questions(id) ON DELETE CASCADE,
            valor_minimo REAL NOT NULL,
            valor_maximo REAL NOT NULL,
            criticidad INTEGER NOT NULL,
            posicion INTEGER NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_numeric_bands_question ON numeric_bands(question_id)",
    )
    .execute(pool)
    .await?;

    Ok(())
}

/// Photos uploaded for questionnaire nodes. Uploaded unattached, then
/// claimed by a title or a question during tree construction (at most one).
async fn create_questionnaire_photos_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS questionnaire_photos (
            id TEXT PRIMARY KEY,
            file_path TEXT NOT NULL,
            title_id TEXT REFERENCES titles(id) ON DELETE CASCADE,
            question_id TEXT REFERENCES questions(id) ON DELETE CASCADE,
            uploaded_at TEXT NOT NULL,
            CHECK (title_id IS NULL OR question_id IS NULL)
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

async fn create_inspections_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS inspections (
            id TEXT PRIMARY KEY,
            questionnaire_id TEXT NOT NULL REFERENCES questionnaires(id),
            organization_id TEXT NOT NULL,
            activo_id TEXT NOT NULL,
            inspector_id TEXT REFERENCES profiles(id) ON DELETE SET NULL,
            momento_inicio TEXT NOT NULL,
            momento_subida TEXT NOT NULL,
            estado TEXT NOT NULL DEFAULT 'borrador'
                CHECK (estado IN ('borrador', 'reparacion', 'finalizada')),
            criticidad_calculada INTEGER NOT NULL DEFAULT 0,
            criticidad_calculada_con_reparaciones INTEGER NOT NULL DEFAULT 0,
            FOREIGN KEY (activo_id, organization_id)
                REFERENCES assets(id, organization_id)
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

/// Answers mirror the question tree. Exactly one of {inspection, parent grid
/// answer, parent multi-choice answer} owns each row; the single-choice
/// option rule is the one kind-specific predicate the schema reasserts.
async fn create_answers_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS answers (
            id TEXT PRIMARY KEY,
            inspection_id TEXT REFERENCES inspections(id) ON DELETE CASCADE,
            parent_grid_answer_id TEXT REFERENCES answers(id) ON DELETE CASCADE,
            parent_multi_answer_id TEXT REFERENCES answers(id) ON DELETE CASCADE,
            question_id TEXT REFERENCES questions(id) ON DELETE CASCADE,
            tipo_de_respuesta TEXT NOT NULL CHECK (tipo_de_respuesta IN
                ('cuadricula', 'seleccion_unica', 'seleccion_multiple',
                 'parte_de_seleccion_multiple', 'numerica')),
            observacion TEXT NOT NULL DEFAULT '',
            reparado INTEGER NOT NULL,
            observacion_reparacion TEXT NOT NULL DEFAULT '',
            momento_respuesta TEXT,
            criticidad_del_inspector INTEGER,
            criticidad_calculada INTEGER NOT NULL,
            criticidad_calculada_con_reparaciones INTEGER NOT NULL,
            opcion_seleccionada_id TEXT REFERENCES answer_options(id),
            opcion_respondida_id TEXT REFERENCES answer_options(id),
            opcion_respondida_esta_seleccionada INTEGER,
            valor_numerico REAL,
            CHECK ((inspection_id IS NOT NULL)
                 + (parent_grid_answer_id IS NOT NULL)
                 + (parent_multi_answer_id IS NOT NULL) = 1),
            CHECK ((tipo_de_respuesta = 'seleccion_unica') = (opcion_seleccionada_id IS NOT NULL))
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query("CREATE INDEX IF NOT EXISTS idx_answers_inspection ON answers(inspection_id)")
        .execute(pool)
        .await?;
    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_answers_parent_grid ON answers(parent_grid_answer_id)",
    )
    .execute(pool)
    .await?;
    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_answers_parent_multi ON answers(parent_multi_answer_id)",
    )
    .execute(pool)
    .await?;

    Ok(())
}

/// Photos uploaded for answers. Classification (`base` / `reparacion`) is
/// assigned when the photo is claimed, never before.
async fn create_answer_photos_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS answer_photos (
            id TEXT PRIMARY KEY,
            file_path TEXT NOT NULL,
            answer_id TEXT REFERENCES answers(id) ON DELETE CASCADE,
            tipo TEXT CHECK (tipo IN ('base', 'reparacion')),
            uploaded_at TEXT NOT NULL,
            CHECK ((answer_id IS NULL) = (tipo IS NULL))
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query("CREATE INDEX IF NOT EXISTS idx_answer_photos_answer ON answer_photos(answer_id)")
        .execute(pool)
        .await?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn memory_pool() -> SqlitePool {
        init_memory_database().await.expect("in-memory database")
    }

    #[tokio::test]
    async fn schema_creation_is_idempotent() {
        let pool = memory_pool().await;
        create_schema(&pool).await.expect("second run");
    }

    #[tokio::test]
    async fn question_parent_exclusivity_is_checked() {
        let pool = memory_pool().await;

        // neither parent set
        let result = sqlx::query(
            "INSERT INTO questions (id, titulo, criticidad, tipo_de_pregunta)
             VALUES ('q1', 't', 1, 'seleccion_unica')",
        )
        .execute(&pool)
        .await;
        assert!(result.is_err(), "orphan question must be rejected");
    }

    #[tokio::test]
    async fn grid_kind_biconditional_is_checked() {
        let pool = memory_pool().await;
        sqlx::query("INSERT INTO organizations (id, nombre) VALUES ('o1', 'org')")
            .execute(&pool)
            .await
            .unwrap();
        sqlx::query(
            "INSERT INTO questionnaires (id, organization_id, tipo_de_inspeccion, version, periodicidad_dias)
             VALUES ('c1', 'o1', 'tipo', 1, 30)",
        )
        .execute(&pool)
        .await
        .unwrap();
        sqlx::query("INSERT INTO blocks (id, questionnaire_id, n_orden) VALUES ('b1', 'c1', 0)")
            .execute(&pool)
            .await
            .unwrap();

        // grid without grid kind
        let result = sqlx::query(
            "INSERT INTO questions (id, block_id, titulo, criticidad, tipo_de_pregunta)
             VALUES ('q1', 'b1', 't', 1, 'cuadricula')",
        )
        .execute(&pool)
        .await;
        assert!(result.is_err());

        // non-grid with grid kind
        let result = sqlx::query(
            "INSERT INTO questions (id, block_id, titulo, criticidad, tipo_de_pregunta, tipo_de_cuadricula)
             VALUES ('q2', 'b1', 't', 1, 'numerica', 'seleccion_unica')",
        )
        .execute(&pool)
        .await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn tag_natural_key_is_unique() {
        let pool = memory_pool().await;
        sqlx::query(
            "INSERT INTO tags (id, kind, scope, clave, valor) VALUES ('t1', 'activo', 'global', 'color', 'rojo')",
        )
        .execute(&pool)
        .await
        .unwrap();

        let duplicate = sqlx::query(
            "INSERT INTO tags (id, kind, scope, clave, valor) VALUES ('t2', 'activo', 'global', 'color', 'rojo')",
        )
        .execute(&pool)
        .await;
        assert!(duplicate.is_err());

        // same pair under another scope is a different tag
        sqlx::query(
            "INSERT INTO tags (id, kind, scope, clave, valor) VALUES ('t3', 'activo', 'org-1', 'color', 'rojo')",
        )
        .execute(&pool)
        .await
        .unwrap();
    }
}
