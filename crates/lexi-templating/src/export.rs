//! Variable export (JSON, CSV) and Markdown with YAML front-matter.

use serde::Serialize;

use lexi_core::{Error, Result};
use lexi_store::{Template, VariableType};

pub const CSV_HEADER: &str = "key,label,description,example,required,dtype";

/// Export format for a template's variable list.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportFormat {
    Json,
    Csv,
}

impl ExportFormat {
    pub fn parse(raw: &str) -> Result<Self> {
        match raw.to_lowercase().as_str() {
            "json" => Ok(Self::Json),
            "csv" => Ok(Self::Csv),
            other => Err(Error::Validation(format!(
                "Unsupported export format '{}', expected json or csv",
                other
            ))),
        }
    }
}

/// One exported variable row.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExportedVariable {
    pub key: String,
    pub label: String,
    pub description: Option<String>,
    pub example: Option<String>,
    pub required: bool,
    pub dtype: VariableType,
}

pub fn exported_variables(template: &Template) -> Vec<ExportedVariable> {
    template
        .variables
        .iter()
        .map(|v| ExportedVariable {
            key: v.key.clone(),
            label: v.label.clone(),
            description: v.description.clone(),
            example: v.example.clone(),
            required: v.required,
            dtype: v.dtype,
        })
        .collect()
}

fn quote(field: &str) -> String {
    format!("\"{}\"", field.replace('"', "\"\""))
}

/// CSV with a header row; text fields quoted, `required` as `true`/`false`.
pub fn variables_csv(template: &Template) -> String {
    let mut lines = vec![CSV_HEADER.to_string()];
    for v in &template.variables {
        lines.push(format!(
            "{},{},{},{},{},{}",
            quote(&v.key),
            quote(&v.label),
            quote(v.description.as_deref().unwrap_or("")),
            quote(v.example.as_deref().unwrap_or("")),
            v.required,
            quote(v.dtype.as_str()),
        ));
    }
    lines.join("\n")
}

#[derive(Serialize)]
struct FrontMatter<'a> {
    template_id: &'a str,
    title: &'a str,
    file_description: &'a str,
    jurisdiction: &'a str,
    doc_type: &'a str,
    variables: Vec<FrontMatterVariable<'a>>,
    similarity_tags: &'a [String],
}

#[derive(Serialize)]
struct FrontMatterVariable<'a> {
    key: &'a str,
    label: &'a str,
    description: &'a str,
    example: &'a str,
    required: bool,
}

/// YAML front-matter block: `---`, fields, `---`, then a blank line.
pub fn frontmatter(template: &Template) -> Result<String> {
    let header = FrontMatter {
        template_id: &template.template_id,
        title: &template.title,
        file_description: template.file_description.as_deref().unwrap_or(""),
        jurisdiction: template.jurisdiction.as_deref().unwrap_or(""),
        doc_type: template.doc_type.as_deref().unwrap_or(""),
        variables: template
            .variables
            .iter()
            .map(|v| FrontMatterVariable {
                key: &v.key,
                label: &v.label,
                description: v.description.as_deref().unwrap_or(""),
                example: v.example.as_deref().unwrap_or(""),
                required: v.required,
            })
            .collect(),
        similarity_tags: &template.similarity_tags,
    };
    let yaml = serde_yaml::to_string(&header)
        .map_err(|e| Error::Internal(format!("Failed to write front-matter: {}", e)))?;
    Ok(format!("---\n{}---\n\n", yaml))
}

/// Template body, optionally preceded by its front-matter.
pub fn template_markdown(template: &Template, include_frontmatter: bool) -> Result<String> {
    if include_frontmatter {
        Ok(format!("{}{}", frontmatter(template)?, template.body_md))
    } else {
        Ok(template.body_md.clone())
    }
}
