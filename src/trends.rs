use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::errors::DataIntegrityError;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TrendPoint<'a> {
    pub entity: &'a str,
    pub year: u16,
    pub volume: u64,
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
pub struct YearVolume {
    pub year: u16,
    pub volume: u64,
}

/// Strictly ascending years. Missing years stay missing.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq, Default)]
#[serde(transparent)]
pub struct TrendSeries(pub Vec<YearVolume>);

impl TrendSeries {
    pub fn years(&self) -> impl Iterator<Item = u16> + '_ {
        self.0.iter().map(|e| e.year)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// One series per entity id, from points in any order.
pub fn aggregate<'a, I>(
    scope: &str,
    points: I,
) -> Result<BTreeMap<String, TrendSeries>, DataIntegrityError>
where
    I: IntoIterator<Item = TrendPoint<'a>>,
{
    let mut by_entity: BTreeMap<&str, BTreeMap<u16, u64>> = BTreeMap::new();
    for p in points {
        let years = by_entity.entry(p.entity).or_default();
        if years.insert(p.year, p.volume).is_some() {
            return Err(DataIntegrityError::DuplicateTrendYear {
                scope: scope.to_string(),
                entity: p.entity.to_string(),
                year: p.year,
            });
        }
    }
    Ok(by_entity
        .into_iter()
        .map(|(entity, years)| {
            let series = years
                .into_iter()
                .map(|(year, volume)| YearVolume { year, volume })
                .collect();
            (entity.to_string(), TrendSeries(series))
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pt(entity: &str, year: u16, volume: u64) -> TrendPoint<'_> {
        TrendPoint {
            entity,
            year,
            volume,
        }
    }

    #[test]
    fn gaps_stay_gaps() {
        let out = aggregate("US", vec![pt("t1", 2015, 9), pt("t1", 2010, 4), pt("t1", 2012, 6)]).unwrap();
        let s = &out["t1"];
        assert_eq!(s.years().collect::<Vec<_>>(), vec![2010, 2012, 2015]);
        assert_eq!(s.0[1], YearVolume { year: 2012, volume: 6 });
    }

    #[test]
    fn separate_series_per_entity() {
        let out = aggregate(
            "US",
            vec![pt("b", 2020, 1), pt("a", 2021, 2), pt("a", 2020, 3), pt("b", 2019, 0)],
        )
        .unwrap();
        assert_eq!(out.keys().collect::<Vec<_>>(), vec!["a", "b"]);
        assert_eq!(out["b"].years().collect::<Vec<_>>(), vec![2019, 2020]);
        assert_eq!(out["b"].0[0].volume, 0);
    }

    #[test]
    fn duplicate_year_fails() {
        let err = aggregate("DE", vec![pt("a", 2020, 1), pt("a", 2020, 2)]).unwrap_err();
        assert_eq!(
            err,
            DataIntegrityError::DuplicateTrendYear {
                scope: "DE".into(),
                entity: "a".into(),
                year: 2020
            }
        );
    }

    #[test]
    fn empty_input() {
        assert!(aggregate("DE", Vec::new()).unwrap().is_empty());
    }

    #[test]
    fn serializes_as_list() {
        let out = aggregate("US", vec![pt("a", 2001, 5)]).unwrap();
        assert_eq!(
            serde_json::to_string(&out["a"]).unwrap(),
            r#"[{"year":2001,"volume":5}]"#
        );
    }
}
