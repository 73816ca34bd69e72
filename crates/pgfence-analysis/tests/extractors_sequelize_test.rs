//! Sequelize extractor tests.

use pgfence_analysis::extractors::{extract_source, MigrationFormat};

#[test]
fn test_create_table_transpilation() {
    let source = r#"
module.exports = {
  async up(queryInterface, Sequelize) {
    await queryInterface.createTable('orders', {
      id: { type: Sequelize.INTEGER, autoIncrement: true, primaryKey: true },
      total: Sequelize.DECIMAL(10, 2),
      status: { type: Sequelize.STRING, allowNull: false, defaultValue: 'new' },
      placed_at: { type: Sequelize.DATE, defaultValue: Sequelize.fn('NOW') },
      user_id: { type: Sequelize.BIGINT, references: { model: 'users', key: 'id' } },
    });
  },
  async down(queryInterface) {
    await queryInterface.dropTable('orders');
  },
};
"#;
    let extraction = extract_source("m.js", source, MigrationFormat::Sequelize).unwrap();
    let sql = &extraction.sql;
    assert!(sql.contains("CREATE TABLE orders"), "sql: {sql}");
    assert!(sql.contains("id serial PRIMARY KEY"));
    assert!(sql.contains("total numeric(10,2)"));
    assert!(sql.contains("status varchar(255) NOT NULL DEFAULT 'new'"));
    assert!(sql.contains("placed_at timestamptz DEFAULT pgfence_volatile_expr()"));
    assert!(sql.contains("user_id bigint REFERENCES users(id)"));
    // down() is not analyzed.
    assert!(!sql.contains("DROP TABLE orders"));
}

#[test]
fn test_column_operations() {
    let source = r#"
module.exports = {
  up: async (queryInterface, DataTypes) => {
    await queryInterface.addColumn('users', 'age', { type: DataTypes.INTEGER, allowNull: false });
    await queryInterface.removeColumn('users', 'legacy');
    await queryInterface.renameColumn('users', 'nick', 'nickname');
    await queryInterface.changeColumn('users', 'bio', { type: DataTypes.TEXT });
  },
};
"#;
    let extraction = extract_source("m.js", source, MigrationFormat::Sequelize).unwrap();
    let sql = &extraction.sql;
    assert!(sql.contains("ALTER TABLE users ADD COLUMN age integer NOT NULL"));
    assert!(sql.contains("ALTER TABLE users DROP COLUMN legacy"));
    assert!(sql.contains("ALTER TABLE users RENAME COLUMN nick TO nickname"));
    assert!(sql.contains("ALTER TABLE users ALTER COLUMN bio TYPE text"));
}

#[test]
fn test_index_operations() {
    let source = r#"
module.exports = {
  async up(queryInterface) {
    await queryInterface.addIndex('orders', ['status']);
    await queryInterface.addIndex('orders', { fields: ['user_id'], unique: true, name: 'orders_user_uniq' });
    await queryInterface.removeIndex('orders', 'orders_old_idx');
  },
};
"#;
    let extraction = extract_source("m.js", source, MigrationFormat::Sequelize).unwrap();
    let sql = &extraction.sql;
    assert!(sql.contains("CREATE INDEX orders_status ON orders (status)"));
    assert!(sql.contains("CREATE UNIQUE INDEX orders_user_uniq ON orders (user_id)"));
    assert!(sql.contains("DROP INDEX orders_old_idx"));
}

#[test]
fn test_raw_query_lifting_and_dynamic_warning() {
    let source = r#"
module.exports = {
  async up(queryInterface) {
    await queryInterface.sequelize.query('CREATE INDEX CONCURRENTLY idx ON orders(total)');
    const table = process.env.T;
    await queryInterface.sequelize.query(`DROP TABLE ${table}`);
  },
};
"#;
    let extraction = extract_source("m.js", source, MigrationFormat::Sequelize).unwrap();
    assert!(extraction.sql.contains("CREATE INDEX CONCURRENTLY idx"));
    assert_eq!(extraction.warnings.len(), 1);
    assert!(extraction.warnings[0]
        .message
        .contains("Dynamic SQL — cannot statically analyze sequelize.query()"));
}

#[test]
fn test_dynamic_table_name_warns_without_sql() {
    let source = r#"
module.exports = {
  async up(queryInterface) {
    await queryInterface.dropTable(process.env.TABLE);
  },
};
"#;
    let extraction = extract_source("m.js", source, MigrationFormat::Sequelize).unwrap();
    assert!(extraction.sql.is_empty());
    assert!(extraction.warnings.iter().any(|warning| warning
        .message
        .contains("Dynamic table or column name")));
}

#[test]
fn test_rename_and_drop_table() {
    let source = r#"
exports.up = async function (queryInterface) {
  await queryInterface.renameTable('tmp_orders', 'orders');
  await queryInterface.dropTable('scratch');
};
"#;
    let extraction = extract_source("m.js", source, MigrationFormat::Sequelize).unwrap();
    assert!(extraction.sql.contains("ALTER TABLE tmp_orders RENAME TO orders"));
    assert!(extraction.sql.contains("DROP TABLE scratch"));
}
