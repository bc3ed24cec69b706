//! Upstream response model and the normalized output record.
//!
//! The upstream returns loosely-typed items: numeric fields sometimes arrive
//! as strings and vice versa, and fields may be missing or `null`. Decoding
//! is lenient per field: strings and numbers are accepted as text, anything
//! else is treated as absent. Only a body that is not a JSON object at all
//! is a decode error.

use crate::extract::extract_despacho_date;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

/// One decoded page: `{status, message, count, items[]}`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ApiPage {
    #[serde(default, deserialize_with = "text_or_empty")]
    pub status: String,
    #[serde(default, deserialize_with = "text_or_empty")]
    pub message: String,
    /// Total items across all pages.
    #[serde(default, deserialize_with = "lenient_count")]
    pub count: i64,
    #[serde(default, deserialize_with = "lenient_items")]
    pub items: Vec<ApiItem>,
}

impl ApiPage {
    /// Decode raw response bytes.
    pub fn from_slice(bytes: &[u8]) -> serde_json::Result<Self> {
        serde_json::from_slice(bytes)
    }

    /// Whether the upstream reported success (case-insensitive).
    #[must_use]
    pub fn is_success(&self) -> bool {
        self.status.eq_ignore_ascii_case("success")
    }
}

/// The item fields the pipeline consumes.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct ApiItem {
    #[serde(default, deserialize_with = "lenient_text")]
    pub id: Option<String>,
    #[serde(default, deserialize_with = "lenient_text")]
    pub numeroprocessocommascara: Option<String>,
    #[serde(default, deserialize_with = "lenient_text")]
    pub numero_processo: Option<String>,
    #[serde(default, deserialize_with = "lenient_text")]
    pub data_disponibilizacao: Option<String>,
    #[serde(default, rename = "siglaTribunal", deserialize_with = "lenient_text")]
    pub sigla_tribunal: Option<String>,
    #[serde(default, rename = "tipoComunicacao", deserialize_with = "lenient_text")]
    pub tipo_comunicacao: Option<String>,
    #[serde(default, rename = "codigoClasse", deserialize_with = "lenient_text")]
    pub codigo_classe: Option<String>,
    #[serde(default, rename = "nomeClasse", deserialize_with = "lenient_text")]
    pub nome_classe: Option<String>,
    #[serde(default, deserialize_with = "lenient_text")]
    pub texto: Option<String>,
    #[serde(default, deserialize_with = "lenient_text")]
    pub meio: Option<String>,
    #[serde(default, rename = "tipoDocumento", deserialize_with = "lenient_text")]
    pub tipo_documento: Option<String>,
    #[serde(default, rename = "nomeOrgao", deserialize_with = "lenient_text")]
    pub nome_orgao: Option<String>,
}

impl ApiItem {
    /// Build an item from an arbitrary JSON value; non-objects yield `None`.
    #[must_use]
    pub fn from_value(value: Value) -> Option<Self> {
        if value.is_object() {
            serde_json::from_value(value).ok()
        } else {
            None
        }
    }
}

/// Normalized output unit, one per matching upstream item.
///
/// Serialized with the field names downstream consumers of the output files
/// already rely on.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Record {
    pub id: Option<String>,
    #[serde(rename = "processo")]
    pub process_number: Option<String>,
    #[serde(rename = "processo_sem_mascara")]
    pub process_number_unmasked: Option<String>,
    #[serde(rename = "data_disponibilizacao")]
    pub available_on: Option<String>,
    #[serde(
        rename = "data_despacho",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub despacho_date: Option<String>,
    pub tribunal: Option<String>,
    #[serde(rename = "tipo_comunicacao")]
    pub communication_type: Option<String>,
    #[serde(rename = "codigo_classe")]
    pub class_code: Option<String>,
    #[serde(rename = "nome_classe")]
    pub class_name: Option<String>,
    #[serde(rename = "texto")]
    pub text: Option<String>,
    #[serde(rename = "meio", default, skip_serializing_if = "Option::is_none")]
    pub medium: Option<String>,
    #[serde(
        rename = "tipo_documento",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub document_type: Option<String>,
    #[serde(rename = "nome_orgao", default, skip_serializing_if = "Option::is_none")]
    pub body_name: Option<String>,
}

impl Record {
    /// Normalize one upstream item, extracting the despacho date from its text.
    #[must_use]
    pub fn from_item(item: &ApiItem) -> Self {
        let despacho_date = item
            .texto
            .as_deref()
            .and_then(extract_despacho_date)
            .map(str::to_string);

        Self {
            id: item.id.clone(),
            process_number: item.numeroprocessocommascara.clone(),
            process_number_unmasked: item.numero_processo.clone(),
            available_on: item.data_disponibilizacao.clone(),
            despacho_date,
            tribunal: item.sigla_tribunal.clone(),
            communication_type: item.tipo_comunicacao.clone(),
            class_code: item.codigo_classe.clone(),
            class_name: item.nome_classe.clone(),
            text: item.texto.clone(),
            medium: item.meio.clone(),
            document_type: item.tipo_documento.clone(),
            body_name: item.nome_orgao.clone(),
        }
    }
}

fn value_to_text(value: Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn lenient_text<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(value_to_text(Value::deserialize(deserializer)?))
}

fn text_or_empty<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(lenient_text(deserializer)?.unwrap_or_default())
}

#[allow(clippy::cast_possible_truncation)]
fn lenient_count<'de, D>(deserializer: D) -> Result<i64, D::Error>
where
    D: Deserializer<'de>,
{
    let count = match Value::deserialize(deserializer)? {
        Value::Number(n) => n
            .as_i64()
            .or_else(|| n.as_f64().filter(|f| f.is_finite()).map(|f| f as i64)),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    };
    Ok(count.unwrap_or(0))
}

fn lenient_items<'de, D>(deserializer: D) -> Result<Vec<ApiItem>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Value::deserialize(deserializer)? {
        Value::Array(values) => values.into_iter().filter_map(ApiItem::from_value).collect(),
        _ => Vec::new(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_decode_page() {
        let body = json!({
            "status": "success",
            "message": "",
            "count": 250,
            "items": [{
                "id": 987654,
                "numeroprocessocommascara": "4002606-06.2025.8.26.0438",
                "numero_processo": "40026060620258260438",
                "data_disponibilizacao": "2025-11-10",
                "siglaTribunal": "TJSP",
                "tipoComunicacao": "Lista de distribuição",
                "codigoClasse": 12154,
                "nomeClasse": "PROCEDIMENTO DO JUIZADO ESPECIAL CÍVEL",
                "texto": "distribuido para Vara Única na data de 10/11/2025.",
                "meio": "D",
                "tipoDocumento": "Distribuição",
                "nomeOrgao": "Vara Única"
            }]
        });
        let page = ApiPage::from_slice(body.to_string().as_bytes()).expect("decode page");

        assert!(page.is_success());
        assert_eq!(page.count, 250);
        assert_eq!(page.items.len(), 1);
        let item = &page.items[0];
        assert_eq!(item.id.as_deref(), Some("987654"));
        assert_eq!(item.codigo_classe.as_deref(), Some("12154"));
        assert_eq!(item.sigla_tribunal.as_deref(), Some("TJSP"));
    }

    #[test]
    fn test_type_deviations_fail_closed() {
        let body = json!({
            "status": "SUCCESS",
            "count": "42",
            "items": [
                {"id": {"nested": true}, "texto": ["not", "text"], "codigoClasse": null},
                "not an object",
                17
            ]
        });
        let page = ApiPage::from_slice(body.to_string().as_bytes()).expect("decode page");

        assert!(page.is_success());
        assert_eq!(page.count, 42);
        assert_eq!(page.items.len(), 1);
        assert_eq!(page.items[0], ApiItem::default());
    }

    #[test]
    fn test_missing_fields_default() {
        let page = ApiPage::from_slice(b"{}").expect("decode empty object");
        assert!(!page.is_success());
        assert_eq!(page.count, 0);
        assert!(page.items.is_empty());

        let page =
            ApiPage::from_slice(br#"{"status":"success","items":"oops"}"#).expect("decode page");
        assert!(page.items.is_empty());
    }

    #[test]
    fn test_malformed_json_is_an_error() {
        assert!(ApiPage::from_slice(b"{\"status\": ").is_err());
        assert!(ApiPage::from_slice(b"\"success\"").is_err());
        assert!(ApiPage::from_slice(b"<html>502 Bad Gateway</html>").is_err());
    }

    #[test]
    fn test_record_from_item() {
        let item = ApiItem {
            id: Some("1".to_string()),
            numeroprocessocommascara: Some("0001234-56.2025.8.04.0001".to_string()),
            tipo_comunicacao: Some("Intimação".to_string()),
            texto: Some("DATA DE EXPEDIENTE: 05/11/2025 - Processo foo".to_string()),
            ..ApiItem::default()
        };
        let record = Record::from_item(&item);

        assert_eq!(record.process_number.as_deref(), Some("0001234-56.2025.8.04.0001"));
        assert_eq!(record.despacho_date.as_deref(), Some("05/11/2025"));
        assert_eq!(record.communication_type.as_deref(), Some("Intimação"));
    }

    #[test]
    fn test_record_serialization_names() {
        let record = Record::from_item(&ApiItem {
            numero_processo: Some("40026060620258260438".to_string()),
            texto: Some("Processo sem data no texto".to_string()),
            ..ApiItem::default()
        });
        let json = serde_json::to_value(&record).expect("serialize record");

        assert_eq!(json["processo_sem_mascara"], "40026060620258260438");
        assert!(json.get("data_despacho").is_none());
        assert!(json.get("meio").is_none());
        assert!(json.get("tipo_comunicacao").is_some());
    }
}
