pub mod import_audit;
pub mod projects;
pub mod suite_items;
pub mod suites;
pub mod tags;
pub mod test_cases;
pub mod test_tags;
pub mod test_versions;
