//! SQLite-backed catalog of templates, variables, uploaded documents and drafts.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use rusqlite::{params, Connection, OptionalExtension};
use tracing::{debug, info};

use crate::embedding::{decode_embedding, encode_embedding};
use crate::ids::generate_template_id;
use crate::schema::SCHEMA_SQL;
use crate::types::*;
use lexi_core::{Error, Result};

const TEMPLATE_COLUMNS: &str = "id, template_id, title, file_description, doc_type, jurisdiction, \
     similarity_tags, body_md, embedding, created_at";

const INSTANCE_SELECT: &str = "SELECT i.id, i.user_query, i.answers_json, i.draft_md, i.created_at, \
     t.template_id AS tpl_public_id, t.title AS tpl_title \
     FROM instances i LEFT JOIN templates t ON t.id = i.template_id";

/// SQLite store for the template catalog.
pub struct SqliteStore {
    conn: Mutex<Connection>,
    db_path: PathBuf,
}

fn now_millis() -> i64 {
    Utc::now().timestamp_millis()
}

fn millis_to_datetime(ms: i64) -> DateTime<Utc> {
    DateTime::from_timestamp_millis(ms).unwrap_or_default()
}

fn db_err(e: rusqlite::Error) -> Error {
    Error::Database(e.to_string())
}

impl SqliteStore {
    /// Open or create the database file at `db_path`.
    pub fn open(db_path: impl AsRef<Path>) -> Result<Self> {
        let db_path = db_path.as_ref().to_path_buf();
        if let Some(parent) = db_path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).map_err(|e| Error::Storage(e.to_string()))?;
            }
        }

        let conn = Self::create_connection(&db_path)?;
        Self::init_schema(&conn)?;

        let store = Self {
            conn: Mutex::new(conn),
            db_path,
        };

        info!(
            "SqliteStore initialized: {} templates, path={}",
            store.count_templates()?,
            store.db_path.display()
        );
        Ok(store)
    }

    fn create_connection(db_path: &Path) -> Result<Connection> {
        let conn = Connection::open(db_path).map_err(db_err)?;
        conn.execute_batch(
            "PRAGMA journal_mode = WAL;
             PRAGMA foreign_keys = ON;
             PRAGMA synchronous = NORMAL;",
        )
        .map_err(db_err)?;
        Ok(conn)
    }

    fn init_schema(conn: &Connection) -> Result<()> {
        conn.execute_batch(SCHEMA_SQL)
            .map_err(|e| Error::Database(format!("Schema init failed: {}", e)))?;
        Ok(())
    }

    pub fn db_path(&self) -> &Path {
        &self.db_path
    }

    // ---------------------------------------------------------------
    // Templates
    // ---------------------------------------------------------------

    /// Insert a template and its variables in one transaction.
    ///
    /// Generates the public `template_id`. Rejects blank titles, blank variable
    /// keys and duplicate keys within the template.
    pub fn create_template(
        &self,
        new: &NewTemplate,
        embedding: Option<&[f32]>,
    ) -> Result<Template> {
        if new.title.trim().is_empty() {
            return Err(Error::Validation("Template title must not be empty".into()));
        }
        let mut seen = std::collections::HashSet::new();
        for var in &new.variables {
            if var.key.trim().is_empty() {
                return Err(Error::Validation("Variable key must not be empty".into()));
            }
            if !seen.insert(var.key.as_str()) {
                return Err(Error::Validation(format!(
                    "Duplicate variable key '{}'",
                    var.key
                )));
            }
        }

        let template_id = generate_template_id(&new.title);
        let tags_json = serde_json::to_string(&new.similarity_tags)?;
        let embedding_json = encode_embedding(embedding);
        let now = now_millis();

        let mut conn = self.conn.lock();
        let tx = conn.transaction().map_err(db_err)?;
        let row_id = {
            tx.prepare_cached(
                "INSERT INTO templates (template_id, title, file_description, doc_type, jurisdiction,
                    similarity_tags, body_md, embedding, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
            )
            .map_err(db_err)?
            .insert(params![
                template_id,
                new.title,
                new.file_description,
                new.doc_type,
                new.jurisdiction,
                tags_json,
                new.body_md,
                embedding_json,
                now
            ])
            .map_err(db_err)?
        };

        {
            let mut stmt = tx
                .prepare_cached(
                    "INSERT INTO template_variables (template_id, position, key, label, description,
                        example, required, dtype, regex, enum_values)
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
                )
                .map_err(db_err)?;
            for (position, var) in new.variables.iter().enumerate() {
                let enum_json = match &var.enum_values {
                    Some(values) => Some(serde_json::to_string(values)?),
                    None => None,
                };
                stmt.execute(params![
                    row_id,
                    position as i64,
                    var.key,
                    var.label,
                    var.description,
                    var.example,
                    var.required,
                    var.dtype.as_str(),
                    var.regex,
                    enum_json
                ])
                .map_err(db_err)?;
            }
        }
        tx.commit().map_err(db_err)?;

        debug!(
            "Created template {} with {} variables",
            template_id,
            new.variables.len()
        );

        Ok(Template {
            id: row_id,
            template_id,
            title: new.title.clone(),
            doc_type: new.doc_type.clone(),
            jurisdiction: new.jurisdiction.clone(),
            file_description: new.file_description.clone(),
            similarity_tags: new.similarity_tags.clone(),
            body_md: new.body_md.clone(),
            embedding: decode_embedding(encode_embedding(embedding)),
            variables: new.variables.clone(),
            created_at: millis_to_datetime(now),
        })
    }

    /// Look up a template by its public id.
    pub fn get_template(&self, template_id: &str) -> Result<Option<Template>> {
        let conn = self.conn.lock();
        let sql = format!("SELECT {} FROM templates WHERE template_id = ?1", TEMPLATE_COLUMNS);
        let template = conn
            .prepare_cached(&sql)
            .map_err(db_err)?
            .query_row(params![template_id], |row| Ok(Self::row_to_template(row)))
            .optional()
            .map_err(db_err)?;

        match template {
            Some(mut t) => {
                t.variables = Self::load_variables(&conn, t.id)?;
                Ok(Some(t))
            }
            None => Ok(None),
        }
    }

    /// Templates in insertion order, with variables loaded.
    pub fn list_templates(&self, skip: usize, limit: usize) -> Result<Vec<Template>> {
        let conn = self.conn.lock();
        let sql = format!(
            "SELECT {} FROM templates ORDER BY id ASC LIMIT ?1 OFFSET ?2",
            TEMPLATE_COLUMNS
        );
        let mut templates: Vec<Template> = conn
            .prepare_cached(&sql)
            .map_err(db_err)?
            .query_map(params![limit as i64, skip as i64], |row| {
                Ok(Self::row_to_template(row))
            })
            .map_err(db_err)?
            .filter_map(|r| r.ok())
            .collect();

        for t in &mut templates {
            t.variables = Self::load_variables(&conn, t.id)?;
        }
        Ok(templates)
    }

    /// Every template in the catalog.
    pub fn all_templates(&self) -> Result<Vec<Template>> {
        self.list_templates(0, i64::MAX as usize)
    }

    pub fn count_templates(&self) -> Result<usize> {
        let conn = self.conn.lock();
        let count: i64 = conn
            .query_row("SELECT COUNT(*) FROM templates", [], |row| row.get(0))
            .map_err(db_err)?;
        Ok(count as usize)
    }

    /// Delete a template and its variables. Drafts that referenced it keep
    /// their text and lose the link. Returns `false` when nothing matched.
    pub fn delete_template(&self, template_id: &str) -> Result<bool> {
        let conn = self.conn.lock();
        let deleted = conn
            .execute(
                "DELETE FROM templates WHERE template_id = ?1",
                params![template_id],
            )
            .map_err(db_err)?;
        if deleted > 0 {
            debug!("Deleted template {}", template_id);
        }
        Ok(deleted > 0)
    }

    fn load_variables(conn: &Connection, template_row_id: i64) -> Result<Vec<Variable>> {
        let vars = conn
            .prepare_cached(
                "SELECT key, label, description, example, required, dtype, regex, enum_values
                 FROM template_variables WHERE template_id = ?1 ORDER BY position ASC",
            )
            .map_err(db_err)?
            .query_map(params![template_row_id], |row| Ok(Self::row_to_variable(row)))
            .map_err(db_err)?
            .filter_map(|r| r.ok())
            .collect();
        Ok(vars)
    }

    // ---------------------------------------------------------------
    // Documents
    // ---------------------------------------------------------------

    /// Record an uploaded document. Returns the new row id.
    pub fn add_document(
        &self,
        filename: &str,
        mime: Option<&str>,
        raw_text: &str,
        embedding: Option<&[f32]>,
    ) -> Result<i64> {
        let conn = self.conn.lock();
        let id = conn
            .prepare_cached(
                "INSERT INTO documents (filename, mime, raw_text, embedding, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
            )
            .map_err(db_err)?
            .insert(params![
                filename,
                mime,
                raw_text,
                encode_embedding(embedding),
                now_millis()
            ])
            .map_err(db_err)?;
        Ok(id)
    }

    pub fn get_document(&self, id: i64) -> Result<Option<Document>> {
        let conn = self.conn.lock();
        let doc = conn
            .prepare_cached(
                "SELECT id, filename, mime, raw_text, embedding, created_at FROM documents WHERE id = ?1",
            )
            .map_err(db_err)?
            .query_row(params![id], |row| {
                Ok(Document {
                    id: row.get("id").unwrap_or(0),
                    filename: row.get("filename").unwrap_or_default(),
                    mime: row.get("mime").ok().flatten(),
                    raw_text: row.get("raw_text").unwrap_or_default(),
                    embedding: decode_embedding(row.get("embedding").ok().flatten()),
                    created_at: millis_to_datetime(row.get("created_at").unwrap_or(0)),
                })
            })
            .optional()
            .map_err(db_err)?;
        Ok(doc)
    }

    // ---------------------------------------------------------------
    // Instances (drafts)
    // ---------------------------------------------------------------

    /// Persist a rendered draft for the template with row id `template_row_id`.
    pub fn create_instance(
        &self,
        template_row_id: i64,
        user_query: Option<&str>,
        answers: &Answers,
        draft_md: &str,
    ) -> Result<Instance> {
        let answers_json = serde_json::to_string(answers)?;
        let id = {
            let conn = self.conn.lock();
            let id = conn.prepare_cached(
                "INSERT INTO instances (template_id, user_query, answers_json, draft_md, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
            )
            .map_err(db_err)?
            .insert(params![
                template_row_id,
                user_query,
                answers_json,
                draft_md,
                now_millis()
            ])
            .map_err(db_err)?;
            id
        };
        self.get_instance(id)?
            .ok_or_else(|| Error::Internal(format!("Instance {} vanished after insert", id)))
    }

    pub fn get_instance(&self, id: i64) -> Result<Option<Instance>> {
        let conn = self.conn.lock();
        let sql = format!("{} WHERE i.id = ?1", INSTANCE_SELECT);
        let instance = conn
            .prepare_cached(&sql)
            .map_err(db_err)?
            .query_row(params![id], |row| Ok(Self::row_to_instance(row)))
            .optional()
            .map_err(db_err)?;
        Ok(instance)
    }

    /// Drafts, newest first.
    pub fn list_instances(&self, skip: usize, limit: usize) -> Result<Vec<Instance>> {
        let conn = self.conn.lock();
        let sql = format!(
            "{} ORDER BY i.created_at DESC, i.id DESC LIMIT ?1 OFFSET ?2",
            INSTANCE_SELECT
        );
        let instances = conn
            .prepare_cached(&sql)
            .map_err(db_err)?
            .query_map(params![limit as i64, skip as i64], |row| {
                Ok(Self::row_to_instance(row))
            })
            .map_err(db_err)?
            .filter_map(|r| r.ok())
            .collect();
        Ok(instances)
    }

    /// Returns `false` when no draft had this id.
    pub fn delete_instance(&self, id: i64) -> Result<bool> {
        let conn = self.conn.lock();
        let deleted = conn
            .execute("DELETE FROM instances WHERE id = ?1", params![id])
            .map_err(db_err)?;
        Ok(deleted > 0)
    }

    // ---------------------------------------------------------------
    // Row mapping
    // ---------------------------------------------------------------

    fn row_to_template(row: &rusqlite::Row<'_>) -> Template {
        Template {
            id: row.get("id").unwrap_or(0),
            template_id: row.get("template_id").unwrap_or_default(),
            title: row.get("title").unwrap_or_default(),
            doc_type: row.get("doc_type").ok().flatten(),
            jurisdiction: row.get("jurisdiction").ok().flatten(),
            file_description: row.get("file_description").ok().flatten(),
            similarity_tags: row
                .get::<_, Option<String>>("similarity_tags")
                .ok()
                .flatten()
                .and_then(|s| serde_json::from_str(&s).ok())
                .unwrap_or_default(),
            body_md: row.get("body_md").unwrap_or_default(),
            embedding: decode_embedding(row.get("embedding").ok().flatten()),
            variables: Vec::new(),
            created_at: millis_to_datetime(row.get("created_at").unwrap_or(0)),
        }
    }

    fn row_to_variable(row: &rusqlite::Row<'_>) -> Variable {
        Variable {
            key: row.get("key").unwrap_or_default(),
            label: row.get("label").unwrap_or_default(),
            description: row.get("description").ok().flatten(),
            example: row.get("example").ok().flatten(),
            required: row.get("required").unwrap_or(true),
            dtype: VariableType::parse(&row.get::<_, String>("dtype").unwrap_or_default()),
            regex: row.get("regex").ok().flatten(),
            enum_values: row
                .get::<_, Option<String>>("enum_values")
                .ok()
                .flatten()
                .and_then(|s| serde_json::from_str(&s).ok()),
        }
    }

    fn row_to_instance(row: &rusqlite::Row<'_>) -> Instance {
        Instance {
            id: row.get("id").unwrap_or(0),
            template_id: row.get("tpl_public_id").ok().flatten(),
            template_title: row.get("tpl_title").ok().flatten(),
            user_query: row.get("user_query").ok().flatten(),
            answers: row
                .get::<_, String>("answers_json")
                .ok()
                .and_then(|s| serde_json::from_str(&s).ok())
                .unwrap_or_default(),
            draft_md: row.get("draft_md").unwrap_or_default(),
            created_at: millis_to_datetime(row.get("created_at").unwrap_or(0)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn test_store() -> (SqliteStore, TempDir) {
        let dir = TempDir::new().unwrap();
        let store = SqliteStore::open(dir.path().join("lexi.db")).unwrap();
        (store, dir)
    }

    fn var(key: &str, label: &str) -> Variable {
        Variable {
            key: key.into(),
            label: label.into(),
            description: None,
            example: None,
            required: true,
            dtype: VariableType::String,
            regex: None,
            enum_values: None,
        }
    }

    fn notice() -> NewTemplate {
        NewTemplate {
            title: "Incident Notice to Insurer".into(),
            body_md: "Policy {{policy_number}} for {{insured_name}}".into(),
            doc_type: Some("notice".into()),
            jurisdiction: Some("IN".into()),
            file_description: Some("Notice of an insured incident".into()),
            similarity_tags: vec!["insurance".into(), "notice".into()],
            variables: vec![
                var("policy_number", "Policy Number"),
                Variable {
                    dtype: VariableType::Enum,
                    enum_values: Some(vec!["fire".into(), "theft".into()]),
                    required: false,
                    ..var("incident_kind", "Incident Kind")
                },
                var("insured_name", "Insured Name"),
            ],
        }
    }

    #[test]
    fn test_create_and_get_template() {
        let (store, _dir) = test_store();
        let created = store.create_template(&notice(), Some(&[0.1, 0.2])).unwrap();
        assert!(created.template_id.starts_with("tpl_incident_notice_to_insurer_"));

        let loaded = store.get_template(&created.template_id).unwrap().unwrap();
        assert_eq!(loaded.title, "Incident Notice to Insurer");
        assert_eq!(loaded.similarity_tags, vec!["insurance", "notice"]);
        assert_eq!(
            loaded.variable_keys(),
            vec!["policy_number", "incident_kind", "insured_name"]
        );
        assert_eq!(loaded.variables[1].dtype, VariableType::Enum);
        assert_eq!(
            loaded.variables[1].enum_values.as_deref(),
            Some(&["fire".to_string(), "theft".to_string()][..])
        );
        assert!(!loaded.variables[1].required);
        assert_eq!(loaded.embedding, Some(vec![0.1, 0.2]));
    }

    #[test]
    fn test_duplicate_variable_key_rejected() {
        let (store, _dir) = test_store();
        let mut tpl = notice();
        tpl.variables.push(var("policy_number", "Again"));
        let err = store.create_template(&tpl, None).unwrap_err();
        assert!(matches!(err, Error::Validation(_)));
        assert_eq!(store.count_templates().unwrap(), 0);
    }

    #[test]
    fn test_empty_embedding_stored_as_null() {
        let (store, _dir) = test_store();
        let created = store.create_template(&notice(), Some(&[])).unwrap();
        let loaded = store.get_template(&created.template_id).unwrap().unwrap();
        assert!(loaded.embedding.is_none());
    }

    #[test]
    fn test_list_templates_paging() {
        let (store, _dir) = test_store();
        for i in 0..3 {
            let mut tpl = notice();
            tpl.title = format!("Template {}", i);
            store.create_template(&tpl, None).unwrap();
        }
        let page = store.list_templates(1, 1).unwrap();
        assert_eq!(page.len(), 1);
        assert_eq!(page[0].title, "Template 1");
        assert_eq!(page[0].summary().variable_count, 3);
        assert_eq!(store.all_templates().unwrap().len(), 3);
    }

    #[test]
    fn test_missing_template() {
        let (store, _dir) = test_store();
        assert!(store.get_template("tpl_nope_00000000").unwrap().is_none());
        assert!(!store.delete_template("tpl_nope_00000000").unwrap());
    }

    #[test]
    fn test_instances_survive_template_delete() {
        let (store, _dir) = test_store();
        let tpl = store.create_template(&notice(), None).unwrap();

        let mut answers = Answers::new();
        answers.insert("policy_number".into(), serde_json::json!("POL-1"));
        let draft = store
            .create_instance(tpl.id, Some("notice for fire"), &answers, "Policy POL-1")
            .unwrap();
        assert_eq!(draft.template_id.as_deref(), Some(tpl.template_id.as_str()));
        assert_eq!(draft.display_title(), "Incident Notice to Insurer");

        assert!(store.delete_template(&tpl.template_id).unwrap());
        let orphan = store.get_instance(draft.id).unwrap().unwrap();
        assert!(orphan.template_id.is_none());
        assert_eq!(orphan.display_title(), "Unknown");
        assert_eq!(orphan.draft_md, "Policy POL-1");
        assert_eq!(orphan.answers["policy_number"], "POL-1");
    }

    #[test]
    fn test_list_instances_newest_first() {
        let (store, _dir) = test_store();
        let tpl = store.create_template(&notice(), None).unwrap();
        let first = store
            .create_instance(tpl.id, None, &Answers::new(), "first")
            .unwrap();
        let second = store
            .create_instance(tpl.id, None, &Answers::new(), "second")
            .unwrap();

        let listed = store.list_instances(0, 50).unwrap();
        assert_eq!(listed.len(), 2);
        assert_eq!(listed[0].id, second.id);
        assert_eq!(listed[1].id, first.id);

        assert!(store.delete_instance(first.id).unwrap());
        assert!(!store.delete_instance(first.id).unwrap());
        assert_eq!(store.list_instances(0, 50).unwrap().len(), 1);
    }

    #[test]
    fn test_documents() {
        let (store, _dir) = test_store();
        let id = store
            .add_document("notice.docx", Some("application/octet-stream"), "raw text", None)
            .unwrap();
        let doc = store.get_document(id).unwrap().unwrap();
        assert_eq!(doc.filename, "notice.docx");
        assert_eq!(doc.raw_text, "raw text");
        assert!(doc.embedding.is_none());
    }
}
