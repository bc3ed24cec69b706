//! Catalogue of tribunals served by the communications API.

use crate::error::ConfigError;
use crate::types::TribunalCode;
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// A catalogued tribunal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Tribunal {
    /// Tribunal code as accepted by `siglaTribunal`
    pub code: &'static str,
    /// Display name
    pub name: &'static str,
    /// Court family
    pub kind: TribunalKind,
}

/// Court family.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TribunalKind {
    /// Tribunal de Justiça (state court)
    Tj,
    /// Tribunal Regional Federal
    Trf,
}

/// Group selector used instead of an explicit tribunal list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TribunalGroup {
    /// State courts only
    Tj,
    /// Federal regional courts only
    Trf,
    /// Everything in the catalogue
    All,
}

impl FromStr for TribunalGroup {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "tj" => Ok(Self::Tj),
            "trf" => Ok(Self::Trf),
            "all" | "todos" => Ok(Self::All),
            other => Err(ConfigError::invalid(
                "tribunal_group",
                format!("expected tj, trf or all, got '{other}'"),
            )),
        }
    }
}

const fn tj(code: &'static str, name: &'static str) -> Tribunal {
    Tribunal {
        code,
        name,
        kind: TribunalKind::Tj,
    }
}

const fn trf(code: &'static str, name: &'static str) -> Tribunal {
    Tribunal {
        code,
        name,
        kind: TribunalKind::Trf,
    }
}

/// Every tribunal known to the scraper.
pub const CATALOGUE: &[Tribunal] = &[
    tj("TJAC", "Tribunal de Justiça do Acre"),
    tj("TJAL", "Tribunal de Justiça de Alagoas"),
    tj("TJAM", "Tribunal de Justiça do Amazonas"),
    tj("TJAP", "Tribunal de Justiça do Amapá"),
    tj("TJBA", "Tribunal de Justiça da Bahia"),
    tj("TJCE", "Tribunal de Justiça do Ceará"),
    tj("TJDFT", "Tribunal de Justiça do Distrito Federal e Territórios"),
    tj("TJES", "Tribunal de Justiça do Espírito Santo"),
    tj("TJGO", "Tribunal de Justiça de Goiás"),
    tj("TJMA", "Tribunal de Justiça do Maranhão"),
    tj("TJMG", "Tribunal de Justiça de Minas Gerais"),
    tj("TJMS", "Tribunal de Justiça do Mato Grosso do Sul"),
    tj("TJMT", "Tribunal de Justiça do Mato Grosso"),
    tj("TJPA", "Tribunal de Justiça do Pará"),
    tj("TJPB", "Tribunal de Justiça da Paraíba"),
    tj("TJPE", "Tribunal de Justiça de Pernambuco"),
    tj("TJPI", "Tribunal de Justiça do Piauí"),
    tj("TJPR", "Tribunal de Justiça do Paraná"),
    tj("TJRJ", "Tribunal de Justiça do Rio de Janeiro"),
    tj("TJRN", "Tribunal de Justiça do Rio Grande do Norte"),
    tj("TJRO", "Tribunal de Justiça de Rondônia"),
    tj("TJRR", "Tribunal de Justiça de Roraima"),
    tj("TJRS", "Tribunal de Justiça do Rio Grande do Sul"),
    tj("TJSC", "Tribunal de Justiça de Santa Catarina"),
    tj("TJSE", "Tribunal de Justiça de Sergipe"),
    tj("TJSP", "Tribunal de Justiça de São Paulo"),
    tj("TJTO", "Tribunal de Justiça do Estado de Tocantins"),
    trf("TRF1", "Tribunal Regional Federal da 1ª Região"),
    trf("TRF2", "Tribunal Regional Federal da 2ª Região"),
    trf("TRF3", "Tribunal Regional Federal da 3ª Região"),
    trf("TRF4", "Tribunal Regional Federal da 4ª Região"),
    trf("TRF5", "Tribunal Regional Federal da 5ª Região"),
    trf("TRF6", "Tribunal Regional Federal da 6ª Região"),
];

/// Look up a catalogued tribunal by code.
#[must_use]
pub fn lookup(code: &TribunalCode) -> Option<&'static Tribunal> {
    CATALOGUE.iter().find(|t| t.code == code.as_str())
}

/// Tribunal codes belonging to `group`, in catalogue order.
#[must_use]
pub fn codes_for(group: TribunalGroup) -> Vec<TribunalCode> {
    CATALOGUE
        .iter()
        .filter(|t| match group {
            TribunalGroup::Tj => t.kind == TribunalKind::Tj,
            TribunalGroup::Trf => t.kind == TribunalKind::Trf,
            TribunalGroup::All => true,
        })
        .filter_map(|t| TribunalCode::new(t.code).ok())
        .collect()
}
