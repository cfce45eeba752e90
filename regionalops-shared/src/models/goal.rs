/// Goal (meta) model and repository operations
///
/// A goal sets a target number of activity units (`valor_meta`) for a
/// regional, optionally bounded by a deadline (`prazo`). Goals are not linked
/// to activities by id: the dashboard relates them through the descriptive
/// fields (`tipo_atividade`, `categoria`, `titulo`, `descricao`).

use crate::supabase::{Scope, SupabaseClient, SupabaseError};
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Goal record
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Goal {
    pub id: Uuid,

    /// Member that created the goal
    #[serde(default)]
    pub member_id: Option<Uuid>,

    pub titulo: String,

    #[serde(default)]
    pub descricao: Option<String>,

    #[serde(default)]
    pub categoria: Option<String>,

    /// Activity label this goal counts
    #[serde(default)]
    pub tipo_atividade: Option<String>,

    /// Target number of activity units
    pub valor_meta: i64,

    /// None means the goal applies to every regional
    #[serde(default)]
    pub regional: Option<String>,

    #[serde(default)]
    pub prazo: Option<NaiveDate>,

    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
}

/// Input for creating a goal
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateGoal {
    pub member_id: Uuid,
    pub titulo: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub descricao: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub categoria: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub tipo_atividade: Option<String>,

    pub valor_meta: i64,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub regional: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub prazo: Option<NaiveDate>,
}

/// Input for updating a goal; only non-None fields are sent
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UpdateGoal {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub titulo: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub descricao: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub categoria: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub tipo_atividade: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub valor_meta: Option<i64>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub regional: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub prazo: Option<NaiveDate>,
}

#[derive(Debug, Clone, Default)]
pub struct GoalFilter {
    pub regional: Option<String>,
    pub categoria: Option<String>,
}

impl Goal {
    pub const TABLE: &'static str = "goals";

    pub async fn create(
        db: &SupabaseClient,
        scope: &Scope,
        data: &CreateGoal,
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
        filter: &GoalFilter,
    ) -> Result<Vec<Self>, SupabaseError> {
        let mut query = db.from(Self::TABLE).order("created_at", false);

        if let Some(regional) = &filter.regional {
            query = query.eq("regional", regional);
        }
        if let Some(categoria) = &filter.categoria {
            query = query.eq("categoria", categoria);
        }

        query.fetch(scope).await
    }

    pub async fn update(
        db: &SupabaseClient,
        scope: &Scope,
        id: Uuid,
        data: &UpdateGoal,
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

    /// Descriptive fields used for matching, most specific first
    pub fn match_fields(&self) -> impl Iterator<Item = &str> {
        [
            self.tipo_atividade.as_deref(),
            self.categoria.as_deref(),
            Some(self.titulo.as_str()),
            self.descricao.as_deref(),
        ]
        .into_iter()
        .flatten()
        .filter(|s| !s.trim().is_empty())
    }
}
