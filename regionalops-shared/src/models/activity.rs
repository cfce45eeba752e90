/// Activity model and repository operations
///
/// An activity is something a member did on a given day (a workshop, a home
/// visit, a distribution). `tipo` is the free-text label the dashboard uses to
/// relate activities to goals, and `quantidade` is how many units the activity
/// counts for.

use crate::supabase::{Scope, SupabaseClient, SupabaseError};
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

fn default_quantidade() -> i64 {
    1
}

/// Activity record
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Activity {
    pub id: Uuid,

    /// Member that recorded the activity
    pub member_id: Uuid,

    pub titulo: String,

    #[serde(default)]
    pub descricao: Option<String>,

    /// Activity label, e.g. "Oficina de capacitação"
    pub tipo: String,

    #[serde(default = "default_quantidade")]
    pub quantidade: i64,

    /// Day the activity happened
    pub data: NaiveDate,

    #[serde(default)]
    pub regional: Option<String>,

    #[serde(default)]
    pub instituicao_id: Option<Uuid>,

    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
}

/// Input for creating an activity
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateActivity {
    pub member_id: Uuid,
    pub titulo: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub descricao: Option<String>,

    pub tipo: String,
    pub quantidade: i64,
    pub data: NaiveDate,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub regional: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub instituicao_id: Option<Uuid>,
}

/// Input for updating an activity; only non-None fields are sent
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UpdateActivity {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub titulo: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub descricao: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub tipo: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub quantidade: Option<i64>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<NaiveDate>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub regional: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub instituicao_id: Option<Uuid>,
}

/// List filters
#[derive(Debug, Clone, Default)]
pub struct ActivityFilter {
    pub regional: Option<String>,
    pub member_id: Option<Uuid>,
    pub tipo: Option<String>,
    /// Inclusive lower bound on `data`
    pub from: Option<NaiveDate>,
    /// Inclusive upper bound on `data`
    pub to: Option<NaiveDate>,
}

impl Activity {
    pub const TABLE: &'static str = "activities";

    pub async fn create(
        db: &SupabaseClient,
        scope: &Scope,
        data: &CreateActivity,
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

    /// Lists activities, most recent first
    pub async fn list(
        db: &SupabaseClient,
        scope: &Scope,
        filter: &ActivityFilter,
    ) -> Result<Vec<Self>, SupabaseError> {
        let mut query = db.from(Self::TABLE).order("data", false);

        if let Some(regional) = &filter.regional {
            query = query.eq("regional", regional);
        }
        if let Some(member_id) = filter.member_id {
            query = query.eq("member_id", member_id);
        }
        if let Some(tipo) = &filter.tipo {
            query = query.ilike("tipo", tipo);
        }
        if let Some(from) = filter.from {
            query = query.gte("data", from);
        }
        if let Some(to) = filter.to {
            query = query.lte("data", to);
        }

        query.fetch(scope).await
    }

    pub async fn update(
        db: &SupabaseClient,
        scope: &Scope,
        id: Uuid,
        data: &UpdateActivity,
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
}
