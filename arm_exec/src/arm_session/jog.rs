//! Joint jog planning
//!
//! Pure checks applied to an operator's joint jog before anything is sent to the controller.

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

use comms_if::eqpt::arm::{JointIndex, JointVector};

// ---------------------------------------------------------------------------
// ENUMERATIONS
// ---------------------------------------------------------------------------

/// Reasons a jog is refused.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum JogError {
    #[error("The {0} must be a finite number")]
    NonFinite(&'static str),

    #[error(
        "Joint {joint} would move to {target_deg:.1} deg, exceeding the safe limits \
         (-{limit_deg} to +{limit_deg})"
    )]
    LimitExceeded {
        joint: JointIndex,
        target_deg: f64,
        limit_deg: f64,
    },

    #[error("A change of {delta_deg} deg is larger than {threshold_deg} deg and must be confirmed")]
    ConfirmationRequired { delta_deg: f64, threshold_deg: f64 },
}

// ---------------------------------------------------------------------------
// PUBLIC FUNCTIONS
// ---------------------------------------------------------------------------

/// Returns true if a change of `delta_deg` needs the operator's explicit confirmation.
pub fn needs_confirmation(delta_deg: f64, threshold_deg: f64) -> bool {
    delta_deg.abs() > threshold_deg
}

/// Compute the target of jogging `joint` by `delta_deg` from `current`.
///
/// Every other joint keeps its current angle. The jog is refused if the new angle of the joint
/// would be further than `limit_deg` from zero.
pub fn plan_joint_delta(
    current: &JointVector,
    joint: JointIndex,
    delta_deg: f64,
    limit_deg: f64,
) -> Result<JointVector, JogError> {
    if !delta_deg.is_finite() {
        return Err(JogError::NonFinite("angle change"));
    }

    let target = current.with_delta(joint, delta_deg);

    if target.get(joint).abs() > limit_deg {
        return Err(JogError::LimitExceeded {
            joint,
            target_deg: target.get(joint),
            limit_deg,
        });
    }

    Ok(target)
}

/// Clamp a requested speed into `[min_degs, max_degs]`.
///
/// `min_degs` must not be greater than `max_degs`.
pub fn clamp_speed(speed_degs: f64, min_degs: f64, max_degs: f64) -> Result<f64, JogError> {
    if !speed_degs.is_finite() {
        return Err(JogError::NonFinite("speed"));
    }

    Ok(speed_degs.max(min_degs).min(max_degs))
}

// ---------------------------------------------------------------------------
// TESTS
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    const CURRENT: JointVector = JointVector([103.7, -24.3, -1.9, 26.2, 14.8]);

    fn joint(n: usize) -> JointIndex {
        JointIndex::new(n).unwrap()
    }

    #[test]
    fn test_speed_clamp() {
        assert_eq!(clamp_speed(0.0, 1.0, 30.0), Ok(1.0));
        assert_eq!(clamp_speed(45.0, 1.0, 30.0), Ok(30.0));
        assert_eq!(clamp_speed(7.0, 1.0, 30.0), Ok(7.0));
        assert_eq!(clamp_speed(-5.0, 1.0, 30.0), Ok(1.0));
        assert_eq!(
            clamp_speed(std::f64::NAN, 1.0, 30.0),
            Err(JogError::NonFinite("speed"))
        );
    }

    #[test]
    fn test_confirmation_threshold() {
        assert!(!needs_confirmation(30.0, 30.0));
        assert!(!needs_confirmation(-30.0, 30.0));
        assert!(needs_confirmation(30.5, 30.0));
        assert!(needs_confirmation(-45.0, 30.0));
    }

    #[test]
    fn test_plan_changes_only_selected_joint() {
        for n in 1..=5 {
            for delta in [-30.0, -12.5, 0.0, 0.1, 30.0].iter() {
                let target = plan_joint_delta(&CURRENT, joint(n), *delta, 180.0).unwrap();

                for other in JointIndex::all() {
                    if other == joint(n) {
                        assert!((target.get(other) - (CURRENT.get(other) + delta)).abs() < 1e-9);
                    } else {
                        assert_eq!(target.get(other), CURRENT.get(other));
                    }
                }
            }
        }
    }

    #[test]
    fn test_plan_shoulder_scenario() {
        let target = plan_joint_delta(&CURRENT, joint(2), 10.0, 180.0).unwrap();
        let expected = [103.7, -14.3, -1.9, 26.2, 14.8];

        for (a, e) in target.0.iter().zip(expected.iter()) {
            assert!((a - e).abs() < 1e-9, "{} != {}", target, JointVector(expected));
        }
    }

    #[test]
    fn test_plan_limits() {
        // Exactly on the limit is allowed
        let near_limit = JointVector([170.0, -170.0, 0.0, 0.0, 0.0]);
        let at_limit = plan_joint_delta(&near_limit, joint(1), 10.0, 180.0).unwrap();
        assert_eq!(at_limit.get(joint(1)), 180.0);
        let at_limit = plan_joint_delta(&near_limit, joint(2), -10.0, 180.0).unwrap();
        assert_eq!(at_limit.get(joint(2)), -180.0);

        assert!(matches!(
            plan_joint_delta(&CURRENT, joint(1), 80.0, 180.0),
            Err(JogError::LimitExceeded { .. })
        ));
        assert!(matches!(
            plan_joint_delta(&CURRENT, joint(2), -160.0, 180.0),
            Err(JogError::LimitExceeded { .. })
        ));
        assert_eq!(
            plan_joint_delta(&CURRENT, joint(3), std::f64::INFINITY, 180.0),
            Err(JogError::NonFinite("angle change"))
        );
    }
}
