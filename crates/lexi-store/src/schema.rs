//! Database schema SQL.

/// Core tables: templates, template_variables, documents, instances.
pub const SCHEMA_SQL: &str = r#"
CREATE TABLE IF NOT EXISTS templates (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    template_id TEXT NOT NULL UNIQUE,
    title TEXT NOT NULL,
    file_description TEXT,
    doc_type TEXT,
    jurisdiction TEXT,
    similarity_tags TEXT NOT NULL DEFAULT '[]',
    body_md TEXT NOT NULL,
    embedding TEXT,
    created_at INTEGER NOT NULL
);

CREATE TABLE IF NOT EXISTS template_variables (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    template_id INTEGER NOT NULL REFERENCES templates(id) ON DELETE CASCADE,
    position INTEGER NOT NULL,
    key TEXT NOT NULL,
    label TEXT NOT NULL,
    description TEXT,
    example TEXT,
    required INTEGER NOT NULL DEFAULT 1,
    dtype TEXT NOT NULL DEFAULT 'string',
    regex TEXT,
    enum_values TEXT,
    UNIQUE (template_id, key)
);

CREATE INDEX IF NOT EXISTS idx_template_variables_template ON template_variables(template_id);

CREATE TABLE IF NOT EXISTS documents (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    filename TEXT NOT NULL,
    mime TEXT,
    raw_text TEXT NOT NULL,
    embedding TEXT,
    created_at INTEGER NOT NULL
);

CREATE TABLE IF NOT EXISTS instances (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    template_id INTEGER REFERENCES templates(id) ON DELETE SET NULL,
    user_query TEXT,
    answers_json TEXT NOT NULL DEFAULT '{}',
    draft_md TEXT NOT NULL,
    created_at INTEGER NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_instances_created ON instances(created_at);
"#;
