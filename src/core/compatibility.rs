use crate::models::BloodGroup::{self, *};

/// Recipient groups a donor of the given group may give to
///
/// O- is the universal donor and AB+ the universal recipient; every group
/// can always give to itself.
pub fn compatible_recipients(donor: BloodGroup) -> &'static [BloodGroup] {
    match donor {
        ONegative => &[
            ONegative, OPositive, ANegative, APositive, BNegative, BPositive, ABNegative,
            ABPositive,
        ],
        OPositive => &[OPositive, APositive, BPositive, ABPositive],
        ANegative => &[ANegative, APositive, ABNegative, ABPositive],
        APositive => &[APositive, ABPositive],
        BNegative => &[BNegative, BPositive, ABNegative, ABPositive],
        BPositive => &[BPositive, ABPositive],
        ABNegative => &[ABNegative, ABPositive],
        ABPositive => &[ABPositive],
    }
}

#[inline]
pub fn can_donate(donor: BloodGroup, recipient: BloodGroup) -> bool {
    compatible_recipients(donor).contains(&recipient)
}

/// Donor groups that can supply a recipient of the given group
pub fn compatible_donors(recipient: BloodGroup) -> Vec<BloodGroup> {
    BloodGroup::ALL
        .iter()
        .copied()
        .filter(|donor| can_donate(*donor, recipient))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_every_group_gives_to_itself_and_ab_positive() {
        for group in BloodGroup::ALL {
            let recipients = compatible_recipients(group);
            assert!(recipients.contains(&group), "{} must give to itself", group);
            assert!(recipients.contains(&ABPositive), "{} must give to AB+", group);
        }
    }

    #[test]
    fn test_universal_donor() {
        assert_eq!(compatible_recipients(ONegative).len(), 8);
        assert_eq!(compatible_donors(ABPositive).len(), 8);
    }

    #[test]
    fn test_specific_rules() {
        assert!(can_donate(OPositive, APositive));
        assert!(!can_donate(OPositive, ANegative));
        assert!(can_donate(BPositive, ABPositive));
        assert!(!can_donate(BPositive, APositive));
        assert!(!can_donate(ABPositive, ONegative));
        assert_eq!(compatible_donors(ONegative), vec![ONegative]);
    }
}
