//! Reduces a C/I/A rating to a single severity tier.

use std::collections::BTreeMap;

use crate::models::{Asset, AssetClassification, ClassificationLevel};

/// Highest of the three axes.
pub fn severity(classification: &AssetClassification) -> ClassificationLevel {
    classification
        .confidentiality
        .max(classification.integrity)
        .max(classification.availability)
}

/// Asset counts per severity tier. Every tier is present, including empty ones.
pub fn severity_breakdown<'a, I>(assets: I) -> BTreeMap<ClassificationLevel, usize>
where
    I: IntoIterator<Item = &'a Asset>,
{
    let mut counts: BTreeMap<ClassificationLevel, usize> =
        ClassificationLevel::ALL.iter().map(|l| (*l, 0)).collect();
    for asset in assets {
        *counts.entry(severity(&asset.classification)).or_default() += 1;
    }
    counts
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::AssetType;
    use chrono::Utc;
    use uuid::Uuid;
    use ClassificationLevel::*;

    fn rating(c: ClassificationLevel, i: ClassificationLevel, a: ClassificationLevel) -> AssetClassification {
        AssetClassification {
            confidentiality: c,
            integrity: i,
            availability: a,
        }
    }

    fn asset(classification: AssetClassification) -> Asset {
        let now = Utc::now();
        Asset {
            id: Uuid::new_v4(),
            tenant_id: Uuid::new_v4(),
            name: "Payroll DB".to_string(),
            asset_type: AssetType::Data,
            owner_id: Uuid::new_v4(),
            classification,
            description: None,
            location: None,
            organization_id: Uuid::new_v4(),
            is_active: true,
            created_utc: now,
            updated_utc: now,
        }
    }

    #[test]
    fn severity_is_the_maximum_axis() {
        assert_eq!(severity(&rating(High, Critical, Low)), Critical);
        assert_eq!(severity(&rating(Low, Low, Low)), Low);
        assert_eq!(severity(&rating(Medium, Low, High)), High);
    }

    #[test]
    fn severity_is_total_and_dominates_every_axis() {
        for c in ClassificationLevel::ALL {
            for i in ClassificationLevel::ALL {
                for a in ClassificationLevel::ALL {
                    let s = severity(&rating(c, i, a));
                    assert!(s >= c && s >= i && s >= a);
                    assert!(s == c || s == i || s == a);
                }
            }
        }
    }

    #[test]
    fn breakdown_counts_each_tier() {
        let assets = vec![
            asset(rating(High, Critical, Low)),
            asset(rating(Low, Low, Low)),
            asset(rating(Critical, Low, Low)),
        ];
        let counts = severity_breakdown(&assets);
        assert_eq!(counts[&Critical], 2);
        assert_eq!(counts[&Low], 1);
        assert_eq!(counts[&Medium], 0);
        assert_eq!(counts[&High], 0);
    }
}
