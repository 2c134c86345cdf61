use std::collections::HashMap;

use super::{error::TypeError, schema::Id};

pub type QueryParams = HashMap<String, String>;

/// Filters accepted by the tag and ingredient listings
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AttributeFilter {
    /// Only rows linked to at least one recipe, whoever owns the recipe
    pub assigned_only: bool,
}

impl AttributeFilter {
    pub fn from_params(params: &QueryParams) -> Result<Self, TypeError> {
        let assigned_only = match non_empty(params, "assigned_only") {
            Some(value) => value
                .parse::<i64>()
                .map(|flag| flag != 0)
                .map_err(|_e| TypeError::new("assigned_only must be an integer"))?,
            None => false,
        };

        Ok(Self { assigned_only })
    }
}

/// Filters accepted by the recipe listing. Each axis matches on any of its
/// ids; both axes must match when both are given.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RecipeFilter {
    pub tags: Option<Vec<Id>>,
    pub ingredients: Option<Vec<Id>>,
}

impl RecipeFilter {
    pub fn from_params(params: &QueryParams) -> Result<Self, TypeError> {
        Ok(Self {
            tags: non_empty(params, "tags").map(parse_id_list).transpose()?,
            ingredients: non_empty(params, "ingredients")
                .map(parse_id_list)
                .transpose()?,
        })
    }

    pub fn matches(&self, tags: &[Id], ingredients: &[Id]) -> bool {
        intersects(self.tags.as_deref(), tags)
            && intersects(self.ingredients.as_deref(), ingredients)
    }
}

fn intersects(wanted: Option<&[Id]>, linked: &[Id]) -> bool {
    match wanted {
        Some(wanted) => linked.iter().any(|id| wanted.contains(id)),
        None => true,
    }
}

fn non_empty<'a>(params: &'a QueryParams, key: &str) -> Option<&'a str> {
    params
        .get(key)
        .map(|value| value.trim())
        .filter(|value| !value.is_empty())
}

/// "1,2,3" -> [1, 2, 3]
pub fn parse_id_list(value: &str) -> Result<Vec<Id>, TypeError> {
    value
        .split(',')
        .map(|id| id.trim())
        .filter(|id| !id.is_empty())
        .map(|id| {
            id.parse::<Id>()
                .map_err(|_e| TypeError::new("Invalid id list; expected comma separated integers"))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params(pairs: &[(&str, &str)]) -> QueryParams {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn assigned_only_defaults_to_false() {
        let assigned = |value: &str| {
            AttributeFilter::from_params(&params(&[("assigned_only", value)]))
                .ok()
                .map(|filter| filter.assigned_only)
        };

        assert!(!AttributeFilter::from_params(&params(&[])).unwrap().assigned_only);
        assert_eq!(assigned("0"), Some(false));
        assert_eq!(assigned(""), Some(false));
        assert_eq!(assigned("1"), Some(true));
        assert_eq!(assigned("yes"), None);
    }

    #[test]
    fn parses_id_lists() {
        assert_eq!(parse_id_list("1,2, 3").unwrap(), vec![1, 2, 3]);
        assert_eq!(parse_id_list("4,").unwrap(), vec![4]);
        assert!(parse_id_list("1,a").is_err());
    }

    #[test]
    fn empty_filters_are_absent() {
        let filter =
            RecipeFilter::from_params(&params(&[("tags", ""), ("ingredients", "2")])).unwrap();

        assert_eq!(filter.tags, None);
        assert_eq!(filter.ingredients, Some(vec![2]));
    }

    #[test]
    fn axes_or_within_and_between() {
        let filter = RecipeFilter {
            tags: Some(vec![1, 2]),
            ingredients: Some(vec![9]),
        };

        assert!(filter.matches(&[2, 5], &[9]));
        assert!(!filter.matches(&[2], &[8]));
        assert!(!filter.matches(&[], &[9]));
        assert!(RecipeFilter::default().matches(&[], &[]));
    }
}
