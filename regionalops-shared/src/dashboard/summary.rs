/// Goal progress and per-regional roll-ups
///
/// Goals, activities and institution counts are fetched independently and
/// combined here. Nothing in this module performs I/O.

use super::matching::goal_matches_activity;
use super::normalize::{normalize_regional, RegionalAliases};
use crate::models::activity::Activity;
use crate::models::goal::Goal;
use crate::models::instituicao::InstituicaoStats;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use uuid::Uuid;

/// Roll-up label for goals without a regional
pub const ALL_REGIONALS: &str = "Todas";

/// Progress of one goal
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GoalProgress {
    pub goal_id: Uuid,
    pub titulo: String,
    pub regional: Option<String>,
    pub tipo_atividade: Option<String>,
    pub valor_meta: i64,
    pub prazo: Option<NaiveDate>,

    /// Sum of `quantidade` over matching activities
    pub achieved: i64,

    /// Number of activities counted
    pub matched_activities: usize,

    /// 0.0 to 100.0, one decimal
    pub percent: f64,

    pub completed: bool,
}

/// Roll-up for one regional
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegionalSummary {
    /// Display name (first spelling seen)
    pub regional: String,
    pub goals: usize,
    pub completed_goals: usize,
    pub average_percent: f64,
    pub instituicoes_total: u64,
    pub instituicoes_ativas: u64,
}

/// Dashboard payload
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DashboardSummary {
    pub goals: Vec<GoalProgress>,
    pub regionais: Vec<RegionalSummary>,
    pub total_goals: usize,
    pub completed_goals: usize,
    pub overall_percent: f64,
}

/// Rounds to one decimal place
fn round1(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}

fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        0.0
    } else {
        round1(values.iter().sum::<f64>() / values.len() as f64)
    }
}

/// Completion percentage capped at 100
pub fn progress_percent(achieved: i64, valor_meta: i64) -> f64 {
    if valor_meta <= 0 {
        return 0.0;
    }
    round1((achieved.max(0) as f64 / valor_meta as f64 * 100.0).min(100.0))
}

fn activity_label(activity: &Activity) -> &str {
    if activity.tipo.trim().is_empty() {
        &activity.titulo
    } else {
        &activity.tipo
    }
}

fn regional_key(regional: Option<&str>, aliases: &RegionalAliases) -> Option<String> {
    regional
        .map(|r| normalize_regional(r, aliases))
        .filter(|r| !r.is_empty())
}

#[derive(Default)]
struct Rollup {
    label: String,
    percents: Vec<f64>,
    completed: usize,
    instituicoes_total: u64,
    instituicoes_ativas: u64,
}

impl Rollup {
    fn labeled(label: &str) -> Self {
        Self {
            label: label.trim().to_string(),
            ..Default::default()
        }
    }
}

/// Computes goal progress and roll-ups
///
/// - An activity counts for a goal when its label matches the goal, it is in
///   the goal's regional (goals without a regional take every regional) and,
///   when the goal has a deadline, it happened on or before it.
/// - With `regional_filter`, only goals in that regional (plus goals without
///   a regional), activities in it and its institution counts are used.
pub fn summarize(
    goals: &[Goal],
    activities: &[Activity],
    institution_stats: &[InstituicaoStats],
    aliases: &RegionalAliases,
    regional_filter: Option<&str>,
) -> DashboardSummary {
    let filter_key = regional_key(regional_filter, aliases);
    let in_filter = |key: &Option<String>| match (&filter_key, key) {
        (None, _) => true,
        (Some(f), Some(k)) => f == k,
        (Some(_), None) => false,
    };

    let activities: Vec<(Option<String>, &Activity)> = activities
        .iter()
        .map(|a| (regional_key(a.regional.as_deref(), aliases), a))
        .filter(|(key, _)| in_filter(key))
        .collect();

    let mut rollups: BTreeMap<String, Rollup> = BTreeMap::new();
    let mut progress = Vec::new();

    for goal in goals {
        let goal_key = regional_key(goal.regional.as_deref(), aliases);
        if goal_key.is_some() && !in_filter(&goal_key) {
            continue;
        }

        let mut achieved = 0i64;
        let mut matched = 0usize;
        for (activity_key, activity) in &activities {
            if goal_key.is_some() && activity_key != &goal_key {
                continue;
            }
            if goal.prazo.is_some_and(|prazo| activity.data > prazo) {
                continue;
            }
            if !goal_matches_activity(goal, activity_label(activity)) {
                continue;
            }
            achieved = achieved.saturating_add(activity.quantidade.max(0));
            matched += 1;
        }

        let percent = progress_percent(achieved, goal.valor_meta);
        let completed = percent >= 100.0;

        let (key, label) = match (&goal_key, goal.regional.as_deref()) {
            (Some(key), Some(label)) => (key.clone(), label),
            _ => (String::new(), ALL_REGIONALS),
        };
        let rollup = rollups.entry(key).or_insert_with(|| Rollup::labeled(label));
        rollup.percents.push(percent);
        if completed {
            rollup.completed += 1;
        }

        progress.push(GoalProgress {
            goal_id: goal.id,
            titulo: goal.titulo.clone(),
            regional: goal.regional.clone(),
            tipo_atividade: goal.tipo_atividade.clone(),
            valor_meta: goal.valor_meta,
            prazo: goal.prazo,
            achieved,
            matched_activities: matched,
            percent,
            completed,
        });
    }

    for stats in institution_stats {
        let key = regional_key(Some(&stats.regional), aliases);
        if !in_filter(&key) {
            continue;
        }
        let Some(key) = key else { continue };
        let rollup = rollups
            .entry(key)
            .or_insert_with(|| Rollup::labeled(&stats.regional));
        rollup.instituicoes_total += stats.total;
        rollup.instituicoes_ativas += stats.ativas;
    }

    let regionais = rollups
        .into_values()
        .map(|r| RegionalSummary {
            regional: r.label,
            goals: r.percents.len(),
            completed_goals: r.completed,
            average_percent: mean(&r.percents),
            instituicoes_total: r.instituicoes_total,
            instituicoes_ativas: r.instituicoes_ativas,
        })
        .collect();

    let percents: Vec<f64> = progress.iter().map(|p| p.percent).collect();
    let completed_goals = progress.iter().filter(|p| p.completed).count();

    DashboardSummary {
        total_goals: progress.len(),
        completed_goals,
        overall_percent: mean(&percents),
        goals: progress,
        regionais,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(s: &str) -> NaiveDate {
        s.parse().unwrap()
    }

    fn goal(titulo: &str, tipo: &str, valor_meta: i64, regional: Option<&str>) -> Goal {
        Goal {
            id: Uuid::new_v4(),
            member_id: None,
            titulo: titulo.to_string(),
            descricao: None,
            categoria: None,
            tipo_atividade: Some(tipo.to_string()),
            valor_meta,
            regional: regional.map(str::to_string),
            prazo: None,
            created_at: None,
        }
    }

    fn activity(tipo: &str, quantidade: i64, data: &str, regional: Option<&str>) -> Activity {
        Activity {
            id: Uuid::new_v4(),
            member_id: Uuid::new_v4(),
            titulo: "registro".to_string(),
            descricao: None,
            tipo: tipo.to_string(),
            quantidade,
            data: date(data),
            regional: regional.map(str::to_string),
            instituicao_id: None,
            created_at: None,
        }
    }

    #[test]
    fn test_progress_percent() {
        assert_eq!(progress_percent(5, 10), 50.0);
        assert_eq!(progress_percent(1, 3), 33.3);
        assert_eq!(progress_percent(2, 3), 66.7);
        assert_eq!(progress_percent(30, 10), 100.0);
        assert_eq!(progress_percent(5, 0), 0.0);
        assert_eq!(progress_percent(-4, 10), 0.0);
    }

    #[test]
    fn test_summarize_matches_by_label_and_regional() {
        let goals = vec![goal("Oficinas no Norte", "Oficina", 10, Some("Regional Norte"))];
        let activities = vec![
            activity("Oficinas de capacitação", 4, "2024-03-01", Some("Norte")),
            activity("oficina", 2, "2024-03-02", Some("norte")),
            // other regional
            activity("Oficina", 50, "2024-03-02", Some("Sul")),
            // unrelated label
            activity("Visita domiciliar", 50, "2024-03-02", Some("Norte")),
        ];

        let summary = summarize(&goals, &activities, &[], &RegionalAliases::new(), None);

        assert_eq!(summary.total_goals, 1);
        assert_eq!(summary.goals[0].achieved, 6);
        assert_eq!(summary.goals[0].matched_activities, 2);
        assert_eq!(summary.goals[0].percent, 60.0);
        assert!(!summary.goals[0].completed);
        assert_eq!(summary.overall_percent, 60.0);
    }

    #[test]
    fn test_deadline_excludes_later_activities() {
        let mut g = goal("Visitas", "Visita", 4, None);
        g.prazo = Some(date("2024-06-30"));
        let activities = vec![
            activity("Visita", 2, "2024-06-30", Some("Norte")),
            activity("Visita", 2, "2024-07-01", Some("Sul")),
        ];

        let summary = summarize(&[g], &activities, &[], &RegionalAliases::new(), None);
        assert_eq!(summary.goals[0].achieved, 2);
        assert_eq!(summary.goals[0].percent, 50.0);
    }

    #[test]
    fn test_aliases_join_regionals() {
        let aliases: RegionalAliases = "rmr:metropolitana".parse().unwrap();
        let goals = vec![goal("Atendimentos", "Atendimento", 2, Some("Metropolitana"))];
        let activities = vec![activity("Atendimento", 2, "2024-01-10", Some("Regional RMR"))];

        let summary = summarize(&goals, &activities, &[], &aliases, None);
        assert!(summary.goals[0].completed);
        assert_eq!(summary.completed_goals, 1);
        assert_eq!(summary.regionais[0].completed_goals, 1);
    }

    #[test]
    fn test_rollups_and_institutions() {
        let goals = vec![
            goal("Oficinas", "Oficina", 10, Some("Norte")),
            goal("Visitas", "Visita", 10, Some("Norte")),
            goal("Reuniões", "Reunião", 5, None),
        ];
        let activities = vec![
            activity("Oficina", 10, "2024-02-01", Some("Norte")),
            activity("Reunião", 1, "2024-02-01", Some("Sul")),
        ];
        let stats = vec![
            InstituicaoStats { regional: "Norte".to_string(), total: 3, ativas: 2 },
            InstituicaoStats { regional: "Agreste".to_string(), total: 1, ativas: 1 },
        ];

        let summary = summarize(&goals, &activities, &stats, &RegionalAliases::new(), None);

        assert_eq!(summary.total_goals, 3);
        assert_eq!(summary.completed_goals, 1);
        // (100 + 0 + 20) / 3
        assert_eq!(summary.overall_percent, 40.0);

        let by_name = |name: &str| {
            summary
                .regionais
                .iter()
                .find(|r| r.regional == name)
                .unwrap()
                .clone()
        };

        let norte = by_name("Norte");
        assert_eq!(norte.goals, 2);
        assert_eq!(norte.completed_goals, 1);
        assert_eq!(norte.average_percent, 50.0);
        assert_eq!(norte.instituicoes_total, 3);
        assert_eq!(norte.instituicoes_ativas, 2);

        let todas = by_name(ALL_REGIONALS);
        assert_eq!(todas.goals, 1);
        assert_eq!(todas.average_percent, 20.0);

        let agreste = by_name("Agreste");
        assert_eq!(agreste.goals, 0);
        assert_eq!(agreste.instituicoes_total, 1);
    }

    #[test]
    fn test_regional_filter() {
        let goals = vec![
            goal("Oficinas", "Oficina", 10, Some("Norte")),
            goal("Oficinas", "Oficina", 10, Some("Sul")),
            goal("Oficinas gerais", "Oficina", 10, None),
        ];
        let activities = vec![
            activity("Oficina", 5, "2024-02-01", Some("Norte")),
            activity("Oficina", 5, "2024-02-01", Some("Sul")),
        ];

        let summary = summarize(
            &goals,
            &activities,
            &[],
            &RegionalAliases::new(),
            Some("Regional Norte"),
        );

        assert_eq!(summary.total_goals, 2);
        // The goal without a regional only sees the filtered activities
        assert!(summary.goals.iter().all(|g| g.achieved == 5));
    }

    #[test]
    fn test_empty_summary() {
        let summary = summarize(&[], &[], &[], &RegionalAliases::new(), None);
        assert_eq!(summary.total_goals, 0);
        assert_eq!(summary.overall_percent, 0.0);
        assert!(summary.regionais.is_empty());
    }
}
