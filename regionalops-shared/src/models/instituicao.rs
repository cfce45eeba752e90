/// Institution (ONG / partner organization) model
///
/// Besides CRUD, this module computes the per-regional institution counts
/// shown on the dashboard.

use crate::supabase::{Scope, SupabaseClient, SupabaseError};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use uuid::Uuid;

/// Label used for institutions without a regional
pub const UNASSIGNED_REGIONAL: &str = "Sem regional";

fn default_true() -> bool {
    true
}

/// Institution record
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Instituicao {
    pub id: Uuid,
    pub nome: String,

    /// Brazilian company registry number, digits only
    #[serde(default)]
    pub cnpj: Option<String>,

    #[serde(default)]
    pub tipo: Option<String>,

    #[serde(default)]
    pub regional: Option<String>,

    #[serde(default)]
    pub endereco: Option<String>,

    #[serde(default)]
    pub telefone: Option<String>,

    #[serde(default)]
    pub email: Option<String>,

    #[serde(default = "default_true")]
    pub ativa: bool,

    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateInstituicao {
    pub nome: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub cnpj: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub tipo: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub regional: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub endereco: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub telefone: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,

    pub ativa: bool,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UpdateInstituicao {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub nome: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub cnpj: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub tipo: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub regional: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub endereco: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub telefone: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub ativa: Option<bool>,
}

#[derive(Debug, Clone, Default)]
pub struct InstituicaoFilter {
    pub regional: Option<String>,
    pub ativa: Option<bool>,
    pub search: Option<String>,
}

/// Institution counts for one regional
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstituicaoStats {
    pub regional: String,
    pub total: u64,
    pub ativas: u64,
}

#[derive(Debug, Deserialize)]
struct StatsRow {
    #[serde(default)]
    regional: Option<String>,
    #[serde(default = "default_true")]
    ativa: bool,
}

impl Instituicao {
    pub const TABLE: &'static str = "instituicoes";

    pub async fn create(
        db: &SupabaseClient,
        scope: &Scope,
        data: &CreateInstituicao,
    ) -> Result<Self, SupabaseError> {
        db.from(Self::TABLE).insert_one(scope, data).await
    }

    pub async fn find_by_id(
        db: &SupabaseClient,
        scope: &Scope,
        id: Uuid,
    ) -> Result<Option<Self>, SupabaseError> {
        db.from(Self::TABLE).eq("id", id).fetch_optional(scope).await
    }

    pub async fn list(
        db: &SupabaseClient,
        scope: &Scope,
        filter: &InstituicaoFilter,
    ) -> Result<Vec<Self>, SupabaseError> {
        let mut query = db.from(Self::TABLE).order("nome", true);

        if let Some(regional) = &filter.regional {
            query = query.eq("regional", regional);
        }
        if let Some(ativa) = filter.ativa {
            query = query.eq("ativa", ativa);
        }
        if let Some(search) = &filter.search {
            query = query.search(&["nome", "cnpj"], search);
        }

        query.fetch(scope).await
    }

    pub async fn update(
        db: &SupabaseClient,
        scope: &Scope,
        id: Uuid,
        data: &UpdateInstituicao,
    ) -> Result<Option<Self>, SupabaseError> {
        let rows: Vec<Self> = db.from(Self::TABLE).eq("id", id).update(scope, data).await?;
        Ok(rows.into_iter().next())
    }

    pub async fn delete(
        db: &SupabaseClient,
        scope: &Scope,
        id: Uuid,
    ) -> Result<Option<Self>, SupabaseError> {
        let rows: Vec<Self> = db.from(Self::TABLE).eq("id", id).delete(scope).await?;
        Ok(rows.into_iter().next())
    }

    /// Institution counts per regional, sorted by regional
    pub async fn stats(
        db: &SupabaseClient,
        scope: &Scope,
        regional: Option<&str>,
    ) -> Result<Vec<InstituicaoStats>, SupabaseError> {
        let mut query = db.from(Self::TABLE).select("regional,ativa");
        if let Some(regional) = regional {
            query = query.eq("regional", regional);
        }

        let rows: Vec<StatsRow> = query.fetch(scope).await?;
        Ok(aggregate_stats(rows.iter().map(|r| (r.regional.as_deref(), r.ativa))))
    }
}

/// Counts `(regional, ativa)` pairs per regional
pub fn aggregate_stats<'a>(
    rows: impl IntoIterator<Item = (Option<&'a str>, bool)>,
) -> Vec<InstituicaoStats> {
    let mut counts: BTreeMap<String, (u64, u64)> = BTreeMap::new();

    for (regional, ativa) in rows {
        let key = regional
            .map(str::trim)
            .filter(|r| !r.is_empty())
            .unwrap_or(UNASSIGNED_REGIONAL)
            .to_string();
        let entry = counts.entry(key).or_default();
        entry.0 += 1;
        if ativa {
            entry.1 += 1;
        }
    }

    counts
        .into_iter()
        .map(|(regional, (total, ativas))| InstituicaoStats {
            regional,
            total,
            ativas,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_aggregate_stats_groups_by_regional() {
        let stats = aggregate_stats(vec![
            (Some("Norte"), true),
            (Some("Norte"), false),
            (Some(" Sul "), true),
            (None, true),
            (Some(""), false),
        ]);

        assert_eq!(
            stats,
            vec![
                InstituicaoStats { regional: "Norte".to_string(), total: 2, ativas: 1 },
                InstituicaoStats { regional: UNASSIGNED_REGIONAL.to_string(), total: 2, ativas: 1 },
                InstituicaoStats { regional: "Sul".to_string(), total: 1, ativas: 1 },
            ]
        );
    }

    #[test]
    fn test_aggregate_stats_empty() {
        assert!(aggregate_stats(Vec::new()).is_empty());
    }
}
