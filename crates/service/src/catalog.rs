//! In-memory filtering over catalog lists already downloaded from the content
//! backend. Every filter is a linear scan.

use models::{DiseaseSolution, Dish, Medicine, Nutrient};

fn contains_ci(haystack: &str, needle: &str) -> bool {
    haystack.to_lowercase().contains(&needle.to_lowercase())
}

fn eq_ci(a: &str, b: &str) -> bool {
    a.to_lowercase() == b.to_lowercase()
}

// blank selection means "all"
fn selected(value: Option<&str>) -> Option<&str> {
    value.filter(|v| !v.trim().is_empty())
}

/// Medicines whose name contains `query`, optionally restricted to one disease.
/// A blank disease is no restriction.
pub fn filter_medicines<'a>(medicines: &'a [Medicine], query: &str, disease: Option<&str>) -> Vec<&'a Medicine> {
    let disease = selected(disease);
    medicines
        .iter()
        .filter(|m| contains_ci(&m.name, query))
        .filter(|m| disease.map_or(true, |d| eq_ci(&m.disease, d)))
        .collect()
}

/// Dishes matching the name query, optional rice type, and optional nutrient.
///
/// A nutrient filter keeps dishes whose value for it is greater than zero;
/// dishes that do not report the nutrient at all are kept. A blank rice type
/// is no restriction.
pub fn filter_dishes<'a>(
    dishes: &'a [Dish],
    query: &str,
    rice_type: Option<&str>,
    nutrient: Option<Nutrient>,
) -> Vec<&'a Dish> {
    let rice_type = selected(rice_type);
    dishes
        .iter()
        .filter(|d| contains_ci(&d.dish_name, query))
        .filter(|d| rice_type.map_or(true, |r| eq_ci(&d.rice_type, r)))
        .filter(|d| match nutrient.and_then(|n| d.nutrient(n)) {
            Some(value) => value > 0.0,
            None => true,
        })
        .collect()
}

/// Distinct rice types in first-seen order.
pub fn rice_types(dishes: &[Dish]) -> Vec<&str> {
    let mut seen: Vec<&str> = Vec::new();
    for dish in dishes {
        if !seen.contains(&dish.rice_type.as_str()) {
            seen.push(&dish.rice_type);
        }
    }
    seen
}

pub fn find_solution<'a>(solutions: &'a [DiseaseSolution], disease: &str) -> Option<&'a DiseaseSolution> {
    solutions.iter().find(|s| s.disease_name == disease)
}
