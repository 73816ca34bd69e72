//! Knex extractor tests: raw lifting and builder transpilation.

use pgfence_analysis::extractors::{extract_source, MigrationFormat};

#[test]
fn test_raw_sql_is_lifted() {
    let source = r#"
exports.up = function (knex) {
  return knex.raw("ALTER TABLE users ADD COLUMN age int");
};
exports.down = function (knex) {
  return knex.raw("ALTER TABLE users DROP COLUMN age");
};
"#;
    let extraction = extract_source("m.js", source, MigrationFormat::Knex).unwrap();
    assert!(extraction.sql.contains("ADD COLUMN age int"));
    assert!(!extraction.sql.contains("DROP COLUMN age"));
}

#[test]
fn test_schema_raw_and_export_const_form() {
    let source = r#"
export const up = (knex) => knex.schema.raw(`CREATE INDEX idx ON t(x)`);
export const down = (knex) => knex.schema.raw(`DROP INDEX idx`);
"#;
    let extraction = extract_source("m.js", source, MigrationFormat::Knex).unwrap();
    assert!(extraction.sql.contains("CREATE INDEX idx"));
}

#[test]
fn test_create_table_transpilation() {
    let source = r#"
exports.up = function (knex) {
  return knex.schema.createTable('users', (t) => {
    t.bigIncrements('id');
    t.string('email', 120).notNullable().unique();
    t.string('nickname');
    t.jsonb('settings').defaultTo('{}');
    t.timestamp('created_at').defaultTo(knex.fn.now());
    t.integer('team_id').references('id').inTable('teams').onDelete('cascade');
  });
};
"#;
    let extraction = extract_source("m.js", source, MigrationFormat::Knex).unwrap();
    let sql = &extraction.sql;
    assert!(sql.contains("CREATE TABLE users"), "sql: {sql}");
    assert!(sql.contains("id bigserial PRIMARY KEY"));
    assert!(sql.contains("email varchar(120) NOT NULL UNIQUE"));
    assert!(sql.contains("nickname varchar(255)"));
    assert!(sql.contains("settings jsonb DEFAULT '{}'"));
    // Non-literal defaults become the volatile sentinel.
    assert!(sql.contains("created_at timestamp DEFAULT pgfence_volatile_expr()"));
    assert!(sql.contains("team_id integer REFERENCES teams(id) ON DELETE CASCADE"));
}

#[test]
fn test_alter_table_transpilation() {
    let source = r#"
exports.up = function (knex) {
  return knex.schema.alterTable('users', (t) => {
    t.string('city', 80).notNullable();
    t.dropColumn('legacy');
    t.renameColumn('nick', 'nickname');
  });
};
"#;
    let extraction = extract_source("m.js", source, MigrationFormat::Knex).unwrap();
    let sql = &extraction.sql;
    assert!(sql.contains("ALTER TABLE users ADD COLUMN city varchar(80) NOT NULL"));
    assert!(sql.contains("ALTER TABLE users DROP COLUMN legacy"));
    assert!(sql.contains("ALTER TABLE users RENAME COLUMN nick TO nickname"));
}

#[test]
fn test_drop_and_rename_table_variants() {
    let source = r#"
exports.up = async function (knex) {
  await knex.schema.dropTableIfExists('old_data');
  await knex.schema.renameTable('tmp_users', 'users');
};
"#;
    let extraction = extract_source("m.js", source, MigrationFormat::Knex).unwrap();
    assert!(extraction.sql.contains("DROP TABLE IF EXISTS old_data"));
    assert!(extraction.sql.contains("ALTER TABLE tmp_users RENAME TO users"));
}

#[test]
fn test_unsupported_builder_method_warns() {
    let source = r#"
exports.up = function (knex) {
  return knex.schema.createView('v', () => {});
};
"#;
    let extraction = extract_source("m.js", source, MigrationFormat::Knex).unwrap();
    assert!(extraction.sql.is_empty());
    assert!(extraction.warnings.iter().any(|warning| warning
        .message
        .contains("Unsupported builder call knex.schema.createView")));
}

#[test]
fn test_dynamic_raw_warns() {
    let source = r#"
exports.up = function (knex) {
  const t = process.env.TABLE;
  return knex.raw(`DROP TABLE ${t}`);
};
"#;
    let extraction = extract_source("m.js", source, MigrationFormat::Knex).unwrap();
    assert!(extraction.sql.is_empty());
    assert!(extraction.warnings.iter().any(|warning| warning
        .message
        .contains("Dynamic SQL — cannot statically analyze knex.raw()")));
}

#[test]
fn test_conditional_builder_sql_warns() {
    let source = r#"
exports.up = function (knex) {
  if (process.env.WIDE) {
    return knex.raw("ALTER TABLE t ADD COLUMN extra text");
  }
  return knex.raw("SELECT 1");
};
"#;
    let extraction = extract_source("m.js", source, MigrationFormat::Knex).unwrap();
    assert!(extraction.sql.contains("ADD COLUMN extra"));
    assert!(extraction
        .warnings
        .iter()
        .any(|warning| warning.message.contains("Conditional SQL")));
}

#[test]
fn test_transpiled_sql_parses_downstream() {
    let source = r#"
exports.up = function (knex) {
  return knex.schema.createTable('teams', (t) => {
    t.increments('id');
    t.string('name').notNullable();
  });
};
"#;
    let extraction = extract_source("m.js", source, MigrationFormat::Knex).unwrap();
    let statements = pgfence_analysis::parser::parse_sql("m.js", &extraction.sql).unwrap();
    assert_eq!(statements.len(), 1);
    assert_eq!(statements[0].kind, "CreateStmt");
}
