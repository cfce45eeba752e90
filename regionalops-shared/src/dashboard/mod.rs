/// Dashboard aggregation for goals (metas)
///
/// Relates goals to activities by their free-text labels and computes
/// progress per goal, per regional and overall.
///
/// # Example
///
/// ```
/// use regionalops_shared::dashboard::{summarize, RegionalAliases};
///
/// let summary = summarize(&[], &[], &[], &RegionalAliases::new(), None);
/// assert_eq!(summary.overall_percent, 0.0);
/// ```

pub mod matching;
pub mod normalize;
pub mod summary;

pub use matching::{goal_matches_activity, keywords};
pub use normalize::{normalize_regional, normalize_text, RegionalAliases};
pub use summary::{summarize, DashboardSummary, GoalProgress, RegionalSummary};
