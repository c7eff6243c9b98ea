// ── Draft payloads for Create mutations ──
//
// Drafts are what a form submits. They validate themselves before the
// coordinator touches the cache or the network.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::error::CoreError;

pub const MIN_RATING: u8 = 1;
pub const MAX_RATING: u8 = 5;

const DATE_FORMAT: &str = "%Y-%m-%d";

fn require(field: &str, value: &str) -> Result<(), CoreError> {
    if value.trim().is_empty() {
        return Err(CoreError::ValidationFailed {
            message: format!("{field} is required"),
        });
    }
    Ok(())
}

fn parse_date(field: &str, value: &str) -> Result<NaiveDate, CoreError> {
    require(field, value)?;
    NaiveDate::parse_from_str(value.trim(), DATE_FORMAT).map_err(|_| CoreError::ValidationFailed {
        message: format!("{field} must be a date like 2025-03-01, got '{value}'"),
    })
}

// ── Proposal ─────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProposalDraft {
    pub name: String,
    pub description: String,
    /// Last day of debate (`YYYY-MM-DD`).
    pub debate_end_date: String,
    /// Last day of deliberation (`YYYY-MM-DD`). Not before the debate ends.
    pub deliberation_end_date: String,
    /// Author shown on the optimistic row. The request itself is
    /// attributed through the session token.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub written_by: Option<String>,
}

impl ProposalDraft {
    pub fn validate(&self) -> Result<(), CoreError> {
        require("proposal name", &self.name)?;
        require("proposal description", &self.description)?;
        let debate = parse_date("debate end date", &self.debate_end_date)?;
        let deliberation = parse_date("deliberation end date", &self.deliberation_end_date)?;
        if deliberation < debate {
            return Err(CoreError::ValidationFailed {
                message: "deliberation cannot end before the debate".into(),
            });
        }
        Ok(())
    }

    pub(crate) fn fingerprint(&self) -> String {
        format!("proposal:{}:{}", self.name, self.description)
    }
}

// ── Review ───────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReviewDraft {
    pub name: String,
    pub description: String,
    /// Star rating, 1 to 5.
    pub rating: u8,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub written_by: Option<String>,
}

impl ReviewDraft {
    pub fn validate(&self) -> Result<(), CoreError> {
        require("review title", &self.name)?;
        require("review text", &self.description)?;
        if !(MIN_RATING..=MAX_RATING).contains(&self.rating) {
            return Err(CoreError::ValidationFailed {
                message: format!(
                    "rating must be between {MIN_RATING} and {MAX_RATING}, got {}",
                    self.rating
                ),
            });
        }
        Ok(())
    }

    pub(crate) fn fingerprint(&self) -> String {
        format!(
            "review:{}:{}:{}:{}",
            self.name,
            self.description,
            self.rating,
            self.written_by.as_deref().unwrap_or_default()
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn proposal() -> ProposalDraft {
        ProposalDraft {
            name: "Longer hours".into(),
            description: "Open until 9pm".into(),
            debate_end_date: "2025-03-01".into(),
            deliberation_end_date: "2025-03-08".into(),
            written_by: None,
        }
    }

    #[test]
    fn complete_proposal_is_valid() {
        assert!(proposal().validate().is_ok());
    }

    #[test]
    fn proposal_requires_every_field() {
        let mut draft = proposal();
        draft.description = "   ".into();
        assert!(matches!(
            draft.validate(),
            Err(CoreError::ValidationFailed { .. })
        ));

        let mut draft = proposal();
        draft.debate_end_date = String::new();
        assert!(draft.validate().is_err());
    }

    #[test]
    fn proposal_dates_must_parse_and_be_ordered() {
        let mut draft = proposal();
        draft.deliberation_end_date = "next week".into();
        assert!(draft.validate().is_err());

        let mut draft = proposal();
        draft.deliberation_end_date = "2025-02-01".into();
        assert!(draft.validate().is_err());
    }

    #[test]
    fn review_rating_is_bounded() {
        let mut draft = ReviewDraft {
            name: "Great".into(),
            description: "Loved it".into(),
            rating: 5,
            written_by: None,
        };
        assert!(draft.validate().is_ok());
        draft.rating = 0;
        assert!(draft.validate().is_err());
        draft.rating = 6;
        assert!(draft.validate().is_err());
    }
}
