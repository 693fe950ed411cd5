//! Sample templates loaded into an empty catalog at startup.

use serde::Deserialize;
use tracing::{info, warn};

use lexi_core::{Error, Result};
use lexi_llm::CompletionBackend;
use lexi_store::{NewTemplate, SqliteStore, Variable};

const MANIFEST: &str = include_str!("../seed/samples.yaml");

const BODIES: &[(&str, &str)] = &[
    ("incident_notice.md", include_str!("../seed/incident_notice.md")),
    ("nda.md", include_str!("../seed/nda.md")),
    ("offer_letter.md", include_str!("../seed/offer_letter.md")),
    ("residential_lease.md", include_str!("../seed/residential_lease.md")),
    ("power_of_attorney.md", include_str!("../seed/power_of_attorney.md")),
];

#[derive(Debug, Deserialize)]
struct SampleEntry {
    title: String,
    #[serde(default)]
    doc_type: Option<String>,
    #[serde(default)]
    jurisdiction: Option<String>,
    #[serde(default)]
    file_description: Option<String>,
    #[serde(default)]
    similarity_tags: Vec<String>,
    /// Name of the Markdown body file under `seed/`.
    body: String,
    variables: Vec<Variable>,
}

/// The bundled sample templates, in manifest order.
pub fn sample_templates() -> Result<Vec<NewTemplate>> {
    let entries: Vec<SampleEntry> = serde_yaml::from_str(MANIFEST)
        .map_err(|e| Error::Config(format!("Invalid sample manifest: {}", e)))?;

    entries
        .into_iter()
        .map(|entry| -> Result<NewTemplate> {
            let body_md = BODIES
                .iter()
                .find(|(name, _)| *name == entry.body)
                .map(|(_, body)| body.to_string())
                .ok_or_else(|| {
                    Error::Config(format!("Sample body {} is not bundled", entry.body))
                })?;
            Ok(NewTemplate {
                title: entry.title,
                body_md,
                doc_type: entry.doc_type,
                jurisdiction: entry.jurisdiction,
                file_description: entry.file_description,
                similarity_tags: entry.similarity_tags,
                variables: entry.variables,
            })
        })
        .collect()
}

/// Store the sample templates when the catalog is empty. Returns how many were created.
///
/// A sample that fails to store is logged and skipped.
pub async fn seed_samples(store: &SqliteStore, llm: &dyn CompletionBackend) -> Result<usize> {
    let existing = store.count_templates()?;
    if existing > 0 {
        info!("Found {} existing templates, skipping seed", existing);
        return Ok(0);
    }

    info!("Seeding sample templates");
    let mut created = 0;
    for sample in sample_templates()? {
        let embedding = llm.embed(&sample.embedding_text()).await;
        match store.create_template(&sample, Some(&embedding)) {
            Ok(template) => {
                info!("Seeded {} ({})", template.title, template.template_id);
                created += 1;
            }
            Err(e) => warn!("Failed to seed {}: {}", sample.title, e),
        }
    }
    Ok(created)
}
