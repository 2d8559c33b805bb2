//! Campaign registration checks, applied before anything reaches a store.

use std::collections::HashSet;

use crate::errors::{LedgerError, Result};
use crate::types::{NewCampaign, Rupees};

/// Normalise and validate a registration payload.
///
/// Titles are trimmed and must be unique, since they key donations and proofs.
pub fn normalize(mut new: NewCampaign) -> Result<NewCampaign> {
    new.ngo_id = new.ngo_id.trim().to_string();
    new.name = new.name.trim().to_string();

    if new.ngo_id.is_empty() {
        return Err(LedgerError::MissingRequiredField("ngo_id"));
    }
    if new.name.is_empty() {
        return Err(LedgerError::MissingRequiredField("name"));
    }

    let mut seen = HashSet::new();
    for condition in &mut new.conditions {
        condition.title = condition.title.trim().to_string();
        if condition.title.is_empty() {
            return Err(LedgerError::MissingRequiredField("conditions.title"));
        }
        if condition.fund_estimate < 0 {
            return Err(LedgerError::InvalidAmount(format!(
                "fund estimate for \"{}\" is negative ({})",
                condition.title,
                Rupees(condition.fund_estimate)
            )));
        }
        if !seen.insert(condition.title.clone()) {
            return Err(LedgerError::DuplicateCondition(condition.title.clone()));
        }
    }

    new.conditions.iter().try_fold(0i64, |acc, c| {
        acc.checked_add(c.fund_estimate)
            .ok_or_else(|| LedgerError::InvalidAmount("total goal overflows".to_string()))
    })?;

    Ok(new)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::new_campaign;

    #[test]
    fn titles_are_trimmed_and_unique() {
        let mut new = new_campaign(&[("Food", 100), ("Shelter", 50)]);
        new.conditions[1].title = " Food ".into();
        assert_eq!(
            normalize(new),
            Err(LedgerError::DuplicateCondition("Food".into()))
        );
    }

    #[test]
    fn rejects_missing_fields_and_negative_goals() {
        let mut new = new_campaign(&[("Food", 100)]);
        new.name = "  ".into();
        assert_eq!(normalize(new), Err(LedgerError::MissingRequiredField("name")));

        let mut new = new_campaign(&[("Food", 100)]);
        new.conditions[0].fund_estimate = -1;
        assert!(matches!(normalize(new), Err(LedgerError::InvalidAmount(_))));

        let mut new = new_campaign(&[("Food", 100)]);
        new.conditions[0].title = String::new();
        assert_eq!(
            normalize(new),
            Err(LedgerError::MissingRequiredField("conditions.title"))
        );
    }

    #[test]
    fn campaign_without_conditions_is_allowed() {
        let new = normalize(new_campaign(&[])).unwrap();
        assert_eq!(new.total_goal(), 0);
    }
}
