use jobfeed::feed::view::{project, ExperienceFilter, SortOrder, ViewConfig};
use jobfeed::feed::{ExperienceLevel, JobRecord, JobStatus, ReconciliationStore};

fn job(id: i64, title: &str, company: &str, posted_at: &str) -> JobRecord {
    JobRecord::new(id, title, company, &format!("https://jobs/{}", id))
        .with_source("LinkedIn")
        .with_posted_at(posted_at)
}

fn ids(records: &[JobRecord]) -> Vec<i64> {
    records.iter().map(|r| r.id).collect()
}

/// A mixed collection across tabs, levels and sources.
fn sample_store() -> ReconciliationStore {
    let mut store = ReconciliationStore::new();
    store.replace_all(vec![
        job(1, "Senior Rust Engineer", "Acme", "2024-05-03T09:00:00"),
        job(2, "Graduate Trainee", "beta labs", "2024-05-01T09:00:00").with_source("Naukri"),
        job(3, "Software Engineer", "Cobalt", "2024-05-02T09:00:00").with_source("Indeed"),
        job(4, "Backend Intern", "Acme", "2024-04-30T09:00:00"),
        job(5, "Data Engineer", "Delta", "not a date").with_status(JobStatus::Draft),
        job(6, "Lead Platform Engineer", "Echo", "2024-05-04T09:00:00")
            .with_status(JobStatus::Applied),
    ]);
    store
}

#[test]
fn test_tab_filter_partitions_collection() {
    let store = sample_store();

    let new = project(store.records(), &ViewConfig::default());
    let applied = project(
        store.records(),
        &ViewConfig::default().with_tab(JobStatus::Applied),
    );
    let draft = project(
        store.records(),
        &ViewConfig::default().with_tab(JobStatus::Draft),
    );

    assert_eq!(new.total_matching, 4);
    assert_eq!(ids(&applied.items), vec![6]);
    assert_eq!(ids(&draft.items), vec![5]);
    assert_eq!(
        new.total_matching + applied.total_matching + draft.total_matching,
        store.len()
    );
    assert!(new.items.iter().all(|r| r.status == JobStatus::New));
}

#[test]
fn test_set_status_moves_record_between_tabs() {
    let mut store = ReconciliationStore::new();
    store.replace_all(vec![
        job(1, "A", "A", "2024-05-01"),
        job(2, "B", "B", "2024-05-02"),
        job(3, "C", "C", "2024-05-03"),
    ]);

    store.set_status(2, JobStatus::Applied);

    let new = project(store.records(), &ViewConfig::default());
    let applied = project(
        store.records(),
        &ViewConfig::default().with_tab(JobStatus::Applied),
    );
    assert!(!ids(&new.items).contains(&2));
    assert_eq!(ids(&applied.items), vec![2]);
    assert_eq!(new.tab_counts.new, 2);
    assert_eq!(new.tab_counts.applied, 1);
}

#[test]
fn test_experience_filter() {
    let store = sample_store();

    let fresher = project(
        store.records(),
        &ViewConfig::default().with_experience(ExperienceFilter::Fresher),
    );
    let experienced = project(
        store.records(),
        &ViewConfig::default().with_experience(ExperienceFilter::Experienced),
    );
    let all = project(store.records(), &ViewConfig::default());

    assert_eq!(ids(&fresher.items), vec![2, 4]);
    assert_eq!(ids(&experienced.items), vec![1]);
    // ALL keeps UNKNOWN records too
    assert!(all
        .items
        .iter()
        .any(|r| r.experience() == ExperienceLevel::Unknown));
    assert_eq!(all.total_matching, 4);
}

#[test]
fn test_search_matches_title_or_company_case_insensitively() {
    let store = sample_store();

    let by_company = project(store.records(), &ViewConfig::default().with_search("ACME"));
    let by_title = project(store.records(), &ViewConfig::default().with_search("trainee"));
    let empty = project(store.records(), &ViewConfig::default().with_search(""));

    assert_eq!(ids(&by_company.items), vec![1, 4]);
    assert_eq!(ids(&by_title.items), vec![2]);
    assert_eq!(empty.total_matching, 4);
}

#[test]
fn test_source_filter_empty_set_matches_all() {
    let store = sample_store();

    let none_selected = project(store.records(), &ViewConfig::default());
    let two_selected = project(
        store.records(),
        &ViewConfig::default()
            .with_source("Naukri")
            .with_source("Indeed"),
    );

    assert_eq!(none_selected.total_matching, 4);
    assert_eq!(ids(&two_selected.items), vec![3, 2]);
}

#[test]
fn test_date_desc_ties_break_by_higher_id() {
    let records = vec![
        job(5, "Five", "X", "2024-05-01T10:00:00"),
        job(9, "Nine", "X", "2024-05-01T10:00:00"),
        job(7, "Seven", "X", "2024-04-01T10:00:00"),
    ];

    let view = project(&records, &ViewConfig::default().with_sort(SortOrder::DateDesc));

    assert_eq!(ids(&view.items), vec![9, 5, 7]);
}

#[test]
fn test_date_desc_ranks_undated_by_id() {
    let records = vec![
        job(1, "Old", "X", "2020-01-01"),
        job(8, "Broken", "X", "yesterday"),
        job(3, "New", "X", "2024-01-01"),
        JobRecord::new(4, "Missing", "X", "https://jobs/4"),
    ];

    let view = project(&records, &ViewConfig::default());

    // Recently ingested undated postings stay near the top
    assert_eq!(ids(&view.items), vec![8, 4, 3, 1]);
}

#[test]
fn test_date_desc_interleaves_undated_between_dated() {
    let records = vec![
        job(2, "Older", "X", "2023-06-01"),
        JobRecord::new(5, "Undated", "X", "https://jobs/5"),
        job(9, "Newest", "X", "2024-06-01"),
        job(1, "Oldest", "X", "2022-06-01"),
    ];

    let view = project(&records, &ViewConfig::default());
    assert_eq!(ids(&view.items), vec![9, 5, 2, 1]);
}

#[test]
fn test_date_asc_treats_unparseable_as_earliest() {
    let records = vec![
        job(1, "Newer", "X", "2024-05-02"),
        job(2, "Broken", "X", "garbage"),
        job(3, "Older", "X", "2024-05-01"),
    ];

    let view = project(&records, &ViewConfig::default().with_sort(SortOrder::DateAsc));

    assert_eq!(ids(&view.items), vec![2, 3, 1]);
}

#[test]
fn test_company_sort_ignores_case() {
    let store = sample_store();

    let view = project(
        store.records(),
        &ViewConfig::default().with_sort(SortOrder::Company),
    );

    let companies: Vec<&str> = view.items.iter().map(|r| r.company.as_str()).collect();
    assert_eq!(companies, vec!["Acme", "Acme", "beta labs", "Cobalt"]);
}

#[test]
fn test_pagination_slices_and_counts() {
    let records: Vec<JobRecord> = (1..=25)
        .map(|i| job(i, "Role", "X", &format!("2024-01-{:02}", i)))
        .collect();

    let first = project(&records, &ViewConfig::default());
    let third = project(&records, &ViewConfig::default().with_page(3));

    assert_eq!(first.items.len(), 10);
    assert_eq!(first.page_count, 3);
    assert_eq!(first.items[0].id, 25);
    assert_eq!(ids(&third.items), vec![5, 4, 3, 2, 1]);
    assert!(!third.past_end);
}

#[test]
fn test_filter_shrinking_below_current_page_reports_past_end() {
    let records: Vec<JobRecord> = (1..=25)
        .map(|i| job(i, if i == 1 { "Rust" } else { "Go" }, "X", "2024-01-01"))
        .collect();

    let view = project(
        &records,
        &ViewConfig::default().with_page(3).with_search("rust"),
    );

    assert!(view.past_end);
    assert!(view.items.is_empty());
    assert_eq!(view.total_matching, 1);
    assert_eq!(view.page_count, 1);
}

#[test]
fn test_projection_is_subset_of_active_tab() {
    let store = sample_store();
    let configs = [
        ViewConfig::default(),
        ViewConfig::default().with_sort(SortOrder::Company),
        ViewConfig::default()
            .with_tab(JobStatus::Draft)
            .with_sort(SortOrder::DateAsc),
        ViewConfig::default()
            .with_experience(ExperienceFilter::Fresher)
            .with_source("Naukri"),
        ViewConfig::default().with_page_size(20).unwrap().with_search("e"),
    ];

    for config in configs {
        let view = project(store.records(), &config);
        for item in &view.items {
            assert_eq!(item.status, config.tab);
            assert_eq!(store.get(item.id), Some(item));
        }
        assert!(view.items.len() <= config.page_size);
    }
}
