//! Application status state machine.
//!
//! ```text
//! submitted → reviewing → interview → offered → hired
//!     └──────────┴────────────┴──────────┴──→ rejected   (recruiter)
//!     └──────────┴────────────┴──────────┴──→ withdrawn  (applicant)
//! ```
//! A recruiter may skip `reviewing` and invite straight to interview.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ApplicationStatus {
    Submitted,
    Reviewing,
    Interview,
    Offered,
    Hired,
    Rejected,
    Withdrawn,
}

impl ApplicationStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ApplicationStatus::Submitted => "submitted",
            ApplicationStatus::Reviewing => "reviewing",
            ApplicationStatus::Interview => "interview",
            ApplicationStatus::Offered => "offered",
            ApplicationStatus::Hired => "hired",
            ApplicationStatus::Rejected => "rejected",
            ApplicationStatus::Withdrawn => "withdrawn",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            ApplicationStatus::Hired | ApplicationStatus::Rejected | ApplicationStatus::Withdrawn
        )
    }

    /// Transitions a recruiter may make.
    pub fn recruiter_can_move_to(&self, next: ApplicationStatus) -> bool {
        use ApplicationStatus::*;
        matches!(
            (*self, next),
            (Submitted, Reviewing | Interview | Rejected)
                | (Reviewing, Interview | Rejected)
                | (Interview, Offered | Rejected)
                | (Offered, Hired | Rejected)
        )
    }

    pub fn applicant_can_withdraw(&self) -> bool {
        !self.is_terminal()
    }

    /// Sentence used in the applicant's notification.
    pub fn describe(&self) -> &'static str {
        match self {
            ApplicationStatus::Submitted => "has been submitted",
            ApplicationStatus::Reviewing => "is being reviewed",
            ApplicationStatus::Interview => "has moved to the interview stage",
            ApplicationStatus::Offered => "has received an offer",
            ApplicationStatus::Hired => "was successful. Congratulations!",
            ApplicationStatus::Rejected => "was not selected",
            ApplicationStatus::Withdrawn => "was withdrawn",
        }
    }
}

impl fmt::Display for ApplicationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ApplicationStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s {
            "submitted" => ApplicationStatus::Submitted,
            "reviewing" => ApplicationStatus::Reviewing,
            "interview" => ApplicationStatus::Interview,
            "offered" => ApplicationStatus::Offered,
            "hired" => ApplicationStatus::Hired,
            "rejected" => ApplicationStatus::Rejected,
            "withdrawn" => ApplicationStatus::Withdrawn,
            other => return Err(format!("unknown application status '{other}'")),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::ApplicationStatus::*;
    use super::*;

    const ALL: [ApplicationStatus; 7] = [
        Submitted, Reviewing, Interview, Offered, Hired, Rejected, Withdrawn,
    ];

    #[test]
    fn test_happy_path_is_allowed() {
        assert!(Submitted.recruiter_can_move_to(Reviewing));
        assert!(Reviewing.recruiter_can_move_to(Interview));
        assert!(Interview.recruiter_can_move_to(Offered));
        assert!(Offered.recruiter_can_move_to(Hired));
    }

    #[test]
    fn test_submitted_can_skip_to_interview() {
        assert!(Submitted.recruiter_can_move_to(Interview));
    }

    #[test]
    fn test_no_skipping_to_offer_or_hire() {
        assert!(!Submitted.recruiter_can_move_to(Offered));
        assert!(!Reviewing.recruiter_can_move_to(Hired));
        assert!(!Interview.recruiter_can_move_to(Hired));
    }

    #[test]
    fn test_no_backwards_moves() {
        assert!(!Interview.recruiter_can_move_to(Reviewing));
        assert!(!Offered.recruiter_can_move_to(Submitted));
    }

    #[test]
    fn test_rejection_from_every_active_state() {
        for status in [Submitted, Reviewing, Interview, Offered] {
            assert!(status.recruiter_can_move_to(Rejected), "{status}");
        }
    }

    #[test]
    fn test_terminal_states_are_final() {
        for from in [Hired, Rejected, Withdrawn] {
            assert!(from.is_terminal());
            assert!(!from.applicant_can_withdraw());
            for to in ALL {
                assert!(!from.recruiter_can_move_to(to), "{from} -> {to}");
            }
        }
    }

    #[test]
    fn test_recruiter_cannot_withdraw_for_applicant() {
        for from in ALL {
            assert!(!from.recruiter_can_move_to(Withdrawn));
        }
    }

    #[test]
    fn test_round_trips_through_str() {
        for status in ALL {
            assert_eq!(status.as_str().parse::<ApplicationStatus>().unwrap(), status);
        }
        assert!("pending".parse::<ApplicationStatus>().is_err());
    }
}
