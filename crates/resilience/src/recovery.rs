//! Recovery planning (spec §4.E): given a disruption and an inventory of
//! mitigations, pick the fastest feasible strategy.

use residency_domain::PersonImpact;

/// One available mitigation an operator could invoke in response to a
/// disruption (spec §4.E "supplemental staff with onboarding delay;
/// cross-trained residents; overtime budget").
#[derive(Debug, Clone)]
pub enum Mitigation {
    SupplementalStaff { count: u32 },
    CrossTrainedResidents { person_ids: Vec<uuid::Uuid> },
    OvertimeBudget { hours: f64 },
}

/// The strategy chosen for one disrupted person, with its estimated time
/// to full recovery in days.
#[derive(Debug, Clone)]
pub struct RecoveryPlan {
    pub strategy: String,
    pub recovery_days: f64,
}

/// Picks the fastest feasible strategy from `mitigations` for `impact`.
/// Cross-trained residents already on the affected rotations resolve
/// immediately (0 days) since `impact.reassignment_candidates` are by
/// definition qualified and unassigned; overtime absorbs understaffing
/// without a new hire at the cost of the current pay period; supplemental
/// staff carries `onboarding_hours` before they can cover a shift.
pub fn plan(impact: &PersonImpact, mitigations: &[Mitigation], onboarding_hours: f64) -> Option<RecoveryPlan> {
    if impact.understaffing_hours <= 0.0 {
        return None;
    }

    let mut candidates = Vec::new();

    if !impact.reassignment_candidates.is_empty() {
        candidates.push(RecoveryPlan {
            strategy: format!(
                "reassign {} cross-trained resident(s) already qualified for the affected rotation(s)",
                impact.reassignment_candidates.len()
            ),
            recovery_days: 0.0,
        });
    }

    for mitigation in mitigations {
        match mitigation {
            Mitigation::CrossTrainedResidents { person_ids } if !person_ids.is_empty() => {
                candidates.push(RecoveryPlan {
                    strategy: format!("redeploy {} cross-trained resident(s) from the mitigation inventory", person_ids.len()),
                    recovery_days: 0.0,
                });
            }
            Mitigation::OvertimeBudget { hours } if *hours >= impact.understaffing_hours => {
                candidates.push(RecoveryPlan {
                    strategy: "absorb the shortfall with overtime budget".to_string(),
                    recovery_days: 1.0,
                });
            }
            Mitigation::SupplementalStaff { count } if *count > 0 => {
                candidates.push(RecoveryPlan {
                    strategy: format!("bring in supplemental staff ({count} available) after onboarding"),
                    recovery_days: onboarding_hours / 24.0,
                });
            }
            _ => {}
        }
    }

    candidates.into_iter().min_by(|a, b| a.recovery_days.partial_cmp(&b.recovery_days).unwrap())
}

#[cfg(test)]
mod tests {
    use residency_domain::ImpactClass;
    use uuid::Uuid;

    use super::*;

    fn impact(understaffing_hours: f64, reassignment_candidates: Vec<Uuid>) -> PersonImpact {
        PersonImpact {
            person_id: Uuid::new_v4(),
            classification: ImpactClass::Critical,
            rotations_at_risk: vec!["ICU".to_string()],
            understaffing_hours,
            reassignment_candidates,
            induced_violations: Vec::new(),
            recovery_days: 0,
        }
    }

    #[test]
    fn no_shortfall_needs_no_plan() {
        assert!(plan(&impact(0.0, vec![]), &[], 48.0).is_none());
    }

    #[test]
    fn reassignment_candidates_beat_every_mitigation() {
        let result = plan(
            &impact(8.0, vec![Uuid::new_v4()]),
            &[Mitigation::OvertimeBudget { hours: 40.0 }, Mitigation::SupplementalStaff { count: 2 }],
            48.0,
        );
        assert_eq!(result.unwrap().recovery_days, 0.0);
    }

    #[test]
    fn insufficient_overtime_is_not_a_candidate() {
        let result = plan(&impact(8.0, vec![]), &[Mitigation::OvertimeBudget { hours: 2.0 }], 48.0);
        assert!(result.is_none());
    }

    #[test]
    fn supplemental_staff_recovery_days_scale_with_onboarding() {
        let result = plan(&impact(8.0, vec![]), &[Mitigation::SupplementalStaff { count: 1 }], 72.0);
        assert_eq!(result.unwrap().recovery_days, 3.0);
    }
}
