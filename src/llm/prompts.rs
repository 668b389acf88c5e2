// Prompts for the two-stage extraction: identify the company, then pull the metrics.

use crate::schema::{CompanyIdentity, Metric};

/// Characters of document text sent with the identification prompt.
pub const IDENTITY_TEXT_LIMIT: usize = 3000;
/// Characters of document text sent with the metrics prompt.
pub const METRICS_TEXT_LIMIT: usize = 20000;

const COMPANY_PLACEHOLDER: &str = "azienda";
const YEAR_PLACEHOLDER: &str = "sconosciuto";

const IDENTITY_PROMPT: &str = r#"
Analizza questo documento finanziario e identifica le informazioni richieste.

IMPORTANTE: Restituisci SOLO il JSON richiesto, senza altro testo.

Formato richiesto:
{
    "company_name": "Nome Azienda S.p.A.",
    "fiscal_year": "2023",
    "currency": "EUR",
    "document_type": "Relazione Annuale"
}

Cerca nel documento:
1. Nome dell'azienda (nome legale completo)
2. Anno fiscale o periodo coperto
3. Valuta utilizzata nei bilanci
4. Tipo di documento (relazione annuale, bilancio, ecc.)

Testo del documento (primi {{LIMIT}} caratteri):
{{DOCUMENT_TEXT}}
"#;

const METRICS_PROMPT: &str = r#"
Estrai le metriche finanziarie richieste da questo documento.

IMPORTANTE: Restituisci SOLO il JSON richiesto, senza altro testo o spiegazioni.

Azienda: {{COMPANY}}
Anno fiscale: {{FISCAL_YEAR}}
Metriche da estrarre: {{METRICS}}

Formato richiesto:
{
    "Ricavi/Vendite": {"value": 123456789, "unit": "milioni"},
    "EBITDA": {"value": 23456789, "unit": "milioni"},
    "EBIT": {"value": 20000000, "unit": "milioni"},
    "PFN (Posizione Finanziaria Netta)": {"value": 15000000, "unit": "milioni"}
}

Regole specifiche:
- Converti tutti i valori nella stessa unità (preferibilmente milioni)
- Se una metrica non viene trovata direttamente, CALCOLALA dai dati disponibili:
  * EBITDA = EBIT + Ammortamenti (ammort. immateriali + ammort. materiali)
  * EBIT = Risultato operativo (A-B nel conto economico italiano)
  * PFN = Debiti verso banche - Disponibilità liquide - Titoli facilmente liquidabili
  * Se PFN è negativo = posizione di liquidità netta (bene per l'azienda)
- Per i rapporti, usa il formato decimale (es. 0.25 per 25%)
- Cerca in tutto il documento, non solo all'inizio
- Identifica voci come "Ricavi delle vendite", "TOTALE VALORE DELLA PRODUZIONE", "TOTALE COSTI DELLA PRODUZIONE"
- Per ammortamenti cerca "AMM.TO" o "ammortamenti"
- Per debiti bancari cerca "Debiti verso banche"
- Per liquidità cerca "Disponibilità liquide" o "Depositi bancari"

Testo del documento (primi {{LIMIT}} caratteri):
{{DOCUMENT_TEXT}}
"#;

/// First `limit` characters of `text`, never splitting a character.
pub fn truncate_chars(text: &str, limit: usize) -> &str {
    match text.char_indices().nth(limit) {
        Some((byte_idx, _)) => &text[..byte_idx],
        None => text,
    }
}

/// Fills `{{KEY}}` placeholders in one left-to-right scan. Substituted values
/// are never rescanned; unknown keys are left as written.
fn fill_template(template: &str, values: &[(&str, &str)]) -> String {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;
    while let Some(open) = rest.find("{{") {
        out.push_str(&rest[..open]);
        let after = &rest[open + 2..];
        let Some(close) = after.find("}}") else {
            rest = &rest[open..];
            break;
        };
        let key = &after[..close];
        match values.iter().find(|(k, _)| *k == key) {
            Some((_, value)) => out.push_str(value),
            None => out.push_str(&rest[open..open + 2 + close + 2]),
        }
        rest = &after[close + 2..];
    }
    out.push_str(rest);
    out
}

pub fn build_identity_prompt(document_text: &str) -> String {
    let limit = IDENTITY_TEXT_LIMIT.to_string();
    fill_template(
        IDENTITY_PROMPT,
        &[
            ("LIMIT", limit.as_str()),
            (
                "DOCUMENT_TEXT",
                truncate_chars(document_text, IDENTITY_TEXT_LIMIT),
            ),
        ],
    )
}

pub fn build_metrics_prompt(
    document_text: &str,
    identity: &CompanyIdentity,
    metrics: &[Metric],
) -> String {
    let metrics_list = metrics
        .iter()
        .map(|m| m.label())
        .collect::<Vec<_>>()
        .join(", ");
    let limit = METRICS_TEXT_LIMIT.to_string();

    fill_template(
        METRICS_PROMPT,
        &[
            (
                "COMPANY",
                identity.company_name.as_deref().unwrap_or(COMPANY_PLACEHOLDER),
            ),
            (
                "FISCAL_YEAR",
                identity.fiscal_year.as_deref().unwrap_or(YEAR_PLACEHOLDER),
            ),
            ("METRICS", metrics_list.as_str()),
            ("LIMIT", limit.as_str()),
            (
                "DOCUMENT_TEXT",
                truncate_chars(document_text, METRICS_TEXT_LIMIT),
            ),
        ],
    )
}
