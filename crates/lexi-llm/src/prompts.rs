//! Prompt library for the extraction, matching, prefill, question and body calls.

/// Ask for template variables and metadata from a whole document (or its first chunk).
pub fn variable_extraction(document_text: &str) -> String {
    format!(
        r#"You are a legal document templating assistant. Read the document below and identify every reusable variable that should become a template parameter.

## Variable rules
1. Keys are snake_case (e.g. claimant_full_name, incident_date).
2. Look for parties, dates, amounts, policy numbers, addresses and reference numbers.
3. Never turn statutory text or fixed legal language into a variable.
4. Only party-specific facts become variables.
5. Merge fields that mean the same thing.
6. Prefer domain-generic names.

## Per variable
- key: unique snake_case identifier
- label: human readable name (e.g. "Claimant's Full Name")
- description: what the field represents
- example: a realistic example value
- required: true or false
- dtype: string | date | number | currency | address | email | phone

## Document metadata
- title: suggested template title
- doc_type: legal_notice | contract | agreement | letter | deed | policy | other
- file_description: one or two sentences describing the document, used for matching
- similarity_tags: array of tags for similarity search

## Output
Return ONLY valid JSON, no markdown and no commentary:
{{
  "title": "Template Title",
  "doc_type": "legal_notice",
  "file_description": "A notice sent to an insurance company regarding...",
  "similarity_tags": ["insurance", "notice", "claim"],
  "variables": [
    {{
      "key": "variable_name",
      "label": "Human Readable Label",
      "description": "What this represents",
      "example": "Example Value",
      "required": true,
      "dtype": "string"
    }}
  ]
}}

## Document Text
{document_text}
"#
    )
}

/// Ask for new variables in a later chunk, listing those already found.
pub fn extraction_continuation(known_variables_json: &str, chunk_number: usize, chunk: &str) -> String {
    format!(
        r#"You are continuing variable extraction on a long legal document.

## Variables already found (do not repeat them)
{known_variables_json}

## Rules
1. Report only variables that are not in the list above.
2. Reuse an existing key when a field is logically the same.
3. Use the same JSON output format as before.

## Document Chunk {chunk_number}
{chunk}

Return JSON containing only NEW variables, or an empty "variables" array if there are none.
"#
    )
}

/// Turn variable definitions into polite questions.
pub fn question_generation(variables_json: &str) -> String {
    format!(
        r#"You are a friendly legal assistant helping someone fill in a document template.
Rewrite each variable definition below as a clear, polite question.

## Rules
1. Never show variable keys in the question (no "What is policy_number?").
2. Add format hints where they help (e.g. "in DD/MM/YYYY format").
3. Be specific about the information needed.
4. Name the currency for amounts when it is known.
5. Keep questions short but complete.

## Variables
{variables_json}

## Output
Return ONLY a valid JSON array, no markdown:
[
  {{
    "key": "variable_key",
    "question": "What is the policy number exactly as printed on your policy schedule?",
    "hint": "Usually on the first page of the policy document",
    "example": "POL-2024-12345",
    "required": true
  }}
]
"#
    )
}

/// Rank stored templates against a free-text request.
pub fn template_matching(user_query: &str, templates_json: &str) -> String {
    format!(
        r#"You are a template matching assistant. Pick the stored templates that best fit the user's request.

## User Request
{user_query}

## Available Templates
{templates_json}

## Instructions
1. Work out the user's intent and the kind of document they need.
2. Compare against template titles, descriptions, doc_types and tags.
3. Give each candidate a confidence score from 0.0 to 1.0. Do not return candidates scoring below 0.6.
4. Justify every match.
5. Return at most the top 3.

## Output
Return ONLY valid JSON, no markdown:
{{
  "matches": [
    {{
      "template_id": "tpl_xxx",
      "score": 0.85,
      "reason": "Best match because..."
    }}
  ]
}}

When nothing fits (every score below 0.6), return:
{{
  "matches": [],
  "no_match_reason": "Why no template matched"
}}
"#
    )
}

/// Pull variable values out of the user's request.
pub fn prefill_variables(user_query: &str, variables_json: &str) -> String {
    format!(
        r#"You are a data extraction assistant. Fill in whatever variable values the user's request states or strongly implies.

## User Request
{user_query}

## Variables
{variables_json}

## Instructions
1. Only use values that are stated outright or strongly implied.
2. Never guess or invent a value.
3. Put each value under the matching variable key.
4. Write dates as YYYY-MM-DD.
5. Write currency amounts as bare numbers.

## Output
Return ONLY valid JSON:
{{
  "prefilled": {{
    "variable_key": "extracted_value"
  }},
  "confidence": {{
    "variable_key": 0.9
  }}
}}
"#
    )
}

/// Rewrite a document as a Markdown template body with `{{key}}` placeholders.
pub fn template_body(document_text: &str, variables_json: &str) -> String {
    format!(
        r#"You are a document templating assistant. Turn the original document into a clean Markdown template using the extracted variables.

## Original Document
{document_text}

## Extracted Variables
{variables_json}

## Instructions
1. Replace each variable span with a {{{{variable_key}}}} placeholder.
2. Keep the document's structure and formatting.
3. Produce clean Markdown.
4. Leave all static and legal text unchanged.
5. Place every variable.

## Output
Return ONLY the Markdown template body, with no JSON wrapper and no code fences:
"#
    )
}
