//! Structural checks over an untrusted bundle. Pure; reports every problem at once.

use std::collections::{HashMap, HashSet};

use validator::Validate;

use super::bundle::Bundle;

/// Returns every structural violation in `bundle`, in a stable order. Empty means sound.
///
/// The version is not checked here; callers compare it against `BUNDLE_VERSION` first.
pub fn validate_bundle(bundle: &Bundle) -> Vec<String> {
    let mut violations = Vec::new();

    field_violations(bundle, &mut violations);

    for (id, n) in duplicates(bundle.tests.iter().map(|t| t.id.as_str())) {
        violations.push(format!("duplicate test id '{}' ({} occurrences)", id, n));
    }
    for (code, n) in duplicates(bundle.tests.iter().map(|t| t.code.as_str())) {
        violations.push(format!("duplicate test code '{}' ({} occurrences)", code, n));
    }
    for (id, n) in duplicates(bundle.suites.iter().map(|s| s.id.as_str())) {
        violations.push(format!("duplicate suite id '{}' ({} occurrences)", id, n));
    }
    for (name, n) in duplicates(bundle.tags.iter().map(|t| t.name.as_str())) {
        violations.push(format!("duplicate tag name '{}' ({} occurrences)", name, n));
    }

    let test_ids: HashSet<&str> = bundle.tests.iter().map(|t| t.id.as_str()).collect();
    let tag_names: HashSet<&str> = bundle.tags.iter().map(|t| t.name.as_str()).collect();
    let suite_ids: HashSet<&str> = bundle.suites.iter().map(|s| s.id.as_str()).collect();

    for suite in &bundle.suites {
        for test_id in &suite.test_ids {
            if !test_ids.contains(test_id.as_str()) {
                violations.push(format!(
                    "suite '{}' references unknown test '{}'",
                    suite.name, test_id
                ));
            }
        }
        if let Some(parent_id) = &suite.parent_id {
            if !suite_ids.contains(parent_id.as_str()) {
                violations.push(format!(
                    "suite '{}' references unknown parent '{}'",
                    suite.name, parent_id
                ));
            }
        }
    }

    for test in &bundle.tests {
        for tag in &test.tags {
            if !tag_names.contains(tag.as_str()) {
                violations.push(format!("test '{}' references unknown tag '{}'", test.code, tag));
            }
        }
    }

    cycle_violations(bundle, &mut violations);

    violations
}

fn field_violations(bundle: &Bundle, violations: &mut Vec<String>) {
    let mut push = |label: String, result: Result<(), validator::ValidationErrors>| {
        if let Err(errors) = result {
            let mut fields: Vec<String> = errors.field_errors().keys().map(|k| k.to_string()).collect();
            fields.sort();
            for field in fields {
                violations.push(format!("{}: invalid {}", label, field));
            }
        }
    };

    for tag in &bundle.tags {
        push(format!("tag '{}'", tag.name), tag.validate());
    }
    for suite in &bundle.suites {
        push(format!("suite '{}'", suite.id), suite.validate());
    }
    for test in &bundle.tests {
        push(format!("test '{}'", test.id), test.validate());
    }
}

/// Walks each suite's parent chain; revisiting a suite within one walk is a cycle,
/// reported against the suite the walk started from. O(n * depth).
fn cycle_violations(bundle: &Bundle, violations: &mut Vec<String>) {
    let parents: HashMap<&str, Option<&str>> = bundle
        .suites
        .iter()
        .map(|s| (s.id.as_str(), s.parent_id.as_deref()))
        .collect();

    for suite in &bundle.suites {
        let mut visited: HashSet<&str> = HashSet::new();
        let mut current = Some(suite.id.as_str());
        while let Some(id) = current {
            if !visited.insert(id) {
                violations.push(format!("suite '{}' is part of a parent cycle", suite.name));
                break;
            }
            current = parents.get(id).copied().flatten();
        }
    }
}

/// Values occurring more than once, with their count, in order of first appearance.
fn duplicates<'a>(values: impl Iterator<Item = &'a str>) -> Vec<(&'a str, usize)> {
    let mut counts: HashMap<&str, usize> = HashMap::new();
    let mut order = Vec::new();
    for v in values {
        let n = counts.entry(v).or_insert(0);
        if *n == 0 {
            order.push(v);
        }
        *n += 1;
    }
    order
        .into_iter()
        .filter_map(|v| {
            let n = counts[v];
            (n > 1).then_some((v, n))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::domain::TestContent;
    use crate::app::features::transfer::bundle::{
        BundleProject, BundleSuite, BundleTag, BundleTest, BUNDLE_VERSION,
    };

    fn suite(id: &str, parent: Option<&str>, name: &str, tests: &[&str]) -> BundleSuite {
        BundleSuite {
            id: id.into(),
            parent_id: parent.map(Into::into),
            name: name.into(),
            order: 0,
            test_ids: tests.iter().map(|t| t.to_string()).collect(),
        }
    }

    fn test(id: &str, code: &str, tags: &[&str]) -> BundleTest {
        BundleTest {
            id: id.into(),
            code: code.into(),
            title: format!("Test {}", code),
            content: TestContent::default(),
            tags: tags.iter().map(|t| t.to_string()).collect(),
        }
    }

    fn tag(name: &str) -> BundleTag {
        BundleTag {
            id: format!("tag-{}", name),
            name: name.into(),
            color: "#00ff00".into(),
        }
    }

    fn bundle(suites: Vec<BundleSuite>, tests: Vec<BundleTest>, tags: Vec<BundleTag>) -> Bundle {
        Bundle {
            version: BUNDLE_VERSION.into(),
            exported_at: "2025-01-01T00:00:00Z".into(),
            project: BundleProject {
                name: "P".into(),
                slug: "p".into(),
                description: None,
            },
            suites,
            tests,
            tags,
        }
    }

    #[test]
    fn sound_bundle_has_no_violations() {
        let b = bundle(
            vec![suite("a", None, "A", &[]), suite("b", Some("a"), "B", &["t1"])],
            vec![test("t1", "TC-9", &["smoke"])],
            vec![tag("smoke")],
        );
        assert!(validate_bundle(&b).is_empty());
    }

    #[test]
    fn reports_every_duplicate() {
        let b = bundle(
            vec![suite("s", None, "A", &[]), suite("s", None, "B", &[])],
            vec![
                test("t1", "TC-1", &[]),
                test("t1", "TC-1", &[]),
                test("t2", "TC-2", &[]),
                test("t3", "TC-2", &[]),
            ],
            vec![tag("smoke"), tag("smoke")],
        );
        let v = validate_bundle(&b);
        assert!(v.contains(&"duplicate test id 't1' (2 occurrences)".to_string()));
        assert!(v.contains(&"duplicate test code 'TC-1' (2 occurrences)".to_string()));
        assert!(v.contains(&"duplicate test code 'TC-2' (2 occurrences)".to_string()));
        assert!(v.contains(&"duplicate suite id 's' (2 occurrences)".to_string()));
        assert!(v.contains(&"duplicate tag name 'smoke' (2 occurrences)".to_string()));
    }

    #[test]
    fn reports_dangling_references() {
        let b = bundle(
            vec![suite("a", Some("ghost"), "A", &["nope"])],
            vec![test("t1", "TC-1", &["missing"])],
            vec![],
        );
        let v = validate_bundle(&b);
        assert_eq!(
            v,
            vec![
                "suite 'A' references unknown test 'nope'".to_string(),
                "suite 'A' references unknown parent 'ghost'".to_string(),
                "test 'TC-1' references unknown tag 'missing'".to_string(),
            ]
        );
    }

    #[test]
    fn two_suite_cycle_names_both() {
        let b = bundle(
            vec![suite("a", Some("b"), "A", &[]), suite("b", Some("a"), "B", &[])],
            vec![],
            vec![],
        );
        let v = validate_bundle(&b);
        assert!(v.contains(&"suite 'A' is part of a parent cycle".to_string()));
        assert!(v.contains(&"suite 'B' is part of a parent cycle".to_string()));
    }

    #[test]
    fn self_parent_is_a_cycle() {
        let b = bundle(vec![suite("a", Some("a"), "A", &[])], vec![], vec![]);
        assert_eq!(validate_bundle(&b), vec!["suite 'A' is part of a parent cycle".to_string()]);
    }

    #[test]
    fn field_rules_fold_into_report() {
        let mut bad_tag = tag("smoke");
        bad_tag.color = "green".into();
        let b = bundle(vec![suite("a", None, "", &[])], vec![test("t1", "", &[])], vec![bad_tag]);
        let v = validate_bundle(&b);
        assert!(v.contains(&"tag 'smoke': invalid color".to_string()));
        assert!(v.contains(&"suite 'a': invalid name".to_string()));
        assert!(v.contains(&"test 't1': invalid code".to_string()));
    }
}
