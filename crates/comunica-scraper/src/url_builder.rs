//! Query construction for the paginated communications endpoint.

use crate::cache::CacheKey;
use crate::filter::RecordFilter;
use chrono::NaiveDate;
use comunica_core::TribunalCode;
use url::Url;

/// Date format the upstream expects for `dataDisponibilizacao*`.
pub const QUERY_DATE_FORMAT: &str = "%Y-%m-%d";

/// Everything that identifies one page of one tribunal's listing.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PageRequest {
    pub tribunal: TribunalCode,
    pub page: u32,
    pub items_per_page: u32,
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl PageRequest {
    /// Same request for another page number.
    #[must_use]
    pub fn for_page(&self, page: u32) -> Self {
        Self {
            page,
            ..self.clone()
        }
    }

    #[must_use]
    pub fn start_param(&self) -> String {
        self.start.format(QUERY_DATE_FORMAT).to_string()
    }

    #[must_use]
    pub fn end_param(&self) -> String {
        self.end.format(QUERY_DATE_FORMAT).to_string()
    }

    /// Content-addressed key of this request's payload.
    #[must_use]
    pub fn cache_key(&self) -> CacheKey {
        CacheKey::derive(
            &self.tribunal,
            self.page,
            self.items_per_page,
            &self.start_param(),
            &self.end_param(),
        )
    }
}

/// Build the page URL: `base` plus pagination, tribunal, period and the
/// optional filter parameters. Parameters already on `base` are kept.
#[must_use]
pub fn build_page_url(base: &Url, request: &PageRequest, filter: &RecordFilter) -> Url {
    let mut url = base.clone();
    {
        let mut query = url.query_pairs_mut();
        query
            .append_pair("pagina", &request.page.to_string())
            .append_pair("itensPorPagina", &request.items_per_page.to_string())
            .append_pair("siglaTribunal", request.tribunal.as_str())
            .append_pair("dataDisponibilizacaoInicio", &request.start_param())
            .append_pair("dataDisponibilizacaoFim", &request.end_param());

        if let Some(tipo) = &filter.communication_type {
            query.append_pair("tipoComunicacao", tipo);
        }
        if let Some(classe) = &filter.class_code {
            query.append_pair("codigoClasse", classe);
        }
    }
    url
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn request(page: u32) -> PageRequest {
        PageRequest {
            tribunal: TribunalCode::new("TJSP").expect("valid code"),
            page,
            items_per_page: 100,
            start: NaiveDate::from_ymd_opt(2025, 11, 6).expect("valid date"),
            end: NaiveDate::from_ymd_opt(2025, 11, 10).expect("valid date"),
        }
    }

    fn params(url: &Url) -> HashMap<String, String> {
        url.query_pairs().into_owned().collect()
    }

    #[test]
    fn test_build_page_url_with_filters() {
        let base = Url::parse("https://comunicaapi.pje.jus.br/api/v1/comunicacao").expect("url");
        let filter = RecordFilter::new(
            Some("Lista de distribuição".to_string()),
            Some("12154".to_string()),
        );
        let url = build_page_url(&base, &request(3), &filter);
        let params = params(&url);

        assert_eq!(url.path(), "/api/v1/comunicacao");
        assert_eq!(params["pagina"], "3");
        assert_eq!(params["itensPorPagina"], "100");
        assert_eq!(params["siglaTribunal"], "TJSP");
        assert_eq!(params["dataDisponibilizacaoInicio"], "2025-11-06");
        assert_eq!(params["dataDisponibilizacaoFim"], "2025-11-10");
        assert_eq!(params["tipoComunicacao"], "Lista de distribuição");
        assert_eq!(params["codigoClasse"], "12154");
    }

    #[test]
    fn test_build_page_url_without_filters() {
        let base = Url::parse("http://127.0.0.1:8080/api?token=abc").expect("url");
        let url = build_page_url(&base, &request(1), &RecordFilter::default());
        let params = params(&url);

        assert_eq!(params["token"], "abc");
        assert!(!params.contains_key("tipoComunicacao"));
        assert!(!params.contains_key("codigoClasse"));
    }

    #[test]
    fn test_cache_key_depends_on_page() {
        let first = request(1);
        assert_eq!(first.cache_key(), request(1).cache_key());
        assert_ne!(first.cache_key(), first.for_page(2).cache_key());
    }
}
