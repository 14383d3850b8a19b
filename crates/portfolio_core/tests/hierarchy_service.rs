use portfolio_core::db::open_db_in_memory;
use portfolio_core::{
    DeleteMode, EntityKind, HierarchyError, NewPage, PagePatch, PortfolioPatch,
    SqliteHierarchyService, ValidationError,
};
use rusqlite::Connection;
use serde_json::json;

fn count_rows(conn: &Connection, table: &str) -> i64 {
    conn.query_row(&format!("SELECT COUNT(*) FROM {table};"), [], |row| {
        row.get(0)
    })
    .unwrap()
}

#[test]
fn added_version_is_listed_exactly_once() {
    let conn = open_db_in_memory().unwrap();
    let service = SqliteHierarchyService::sqlite(&conn).unwrap();
    let portfolio = service.add_portfolio("P", "http://p.com").unwrap();
    let other = service.add_portfolio("Q", "http://q.com").unwrap();
    service.add_portfolio_version(other.id, "draft", None).unwrap();

    let added = service
        .add_portfolio_version(portfolio.id, "draft", None)
        .unwrap();
    assert_eq!(added.version.portfolio_id, portfolio.id);
    assert_eq!(added.portfolio, portfolio);
    assert!(added.pages.is_empty());

    let listed = service.list_portfolio_versions(portfolio.id).unwrap();
    let matches = listed
        .iter()
        .filter(|detail| detail.version.id == added.version.id)
        .count();
    assert_eq!(matches, 1);
    assert_eq!(listed.len(), 1);
}

#[test]
fn list_portfolios_attaches_versions() {
    let conn = open_db_in_memory().unwrap();
    let service = SqliteHierarchyService::sqlite(&conn).unwrap();
    let p = service.add_portfolio("P", "http://p.com").unwrap();
    let q = service.add_portfolio("Q", "").unwrap();
    let v1 = service.add_portfolio_version(p.id, "draft", None).unwrap();
    let v2 = service.add_portfolio_version(p.id, "live", None).unwrap();

    let listed = service.list_portfolios().unwrap();
    assert_eq!(listed.len(), 2);
    assert_eq!(listed[0].portfolio, p);
    assert_eq!(listed[0].versions, vec![v1.version, v2.version]);
    assert_eq!(listed[1].portfolio, q);
    assert!(listed[1].versions.is_empty());
}

#[test]
fn pages_are_scoped_to_their_version() {
    let conn = open_db_in_memory().unwrap();
    let service = SqliteHierarchyService::sqlite(&conn).unwrap();
    let p = service.add_portfolio("P", "http://p.com").unwrap();
    let v1 = service.add_portfolio_version(p.id, "v1", None).unwrap().version;
    let v2 = service.add_portfolio_version(p.id, "v2", None).unwrap().version;
    let a = service.add_page("A", "http://a.com", v1.id).unwrap();

    let v1_pages = service.list_pages(v1.id).unwrap();
    assert_eq!(v1_pages.len(), 1);
    assert_eq!(v1_pages[0].page, a.page);
    assert_eq!(v1_pages[0].version, v1);
    assert!(service.list_pages(v2.id).unwrap().is_empty());
}

#[test]
fn add_page_rejects_url_owned_by_other_version() {
    let conn = open_db_in_memory().unwrap();
    let service = SqliteHierarchyService::sqlite(&conn).unwrap();
    let p = service.add_portfolio("P", "http://p.com").unwrap();
    let v1 = service.add_portfolio_version(p.id, "v1", None).unwrap().version;
    let v2 = service.add_portfolio_version(p.id, "v2", None).unwrap().version;
    service.add_page("A", "http://x.com", v1.id).unwrap();

    let err = service.add_page("B", "http://x.com", v2.id).unwrap_err();
    assert!(
        matches!(err, HierarchyError::UniqueConstraintViolation { field: "url", ref value } if value == "http://x.com")
    );
    assert_eq!(err.code(), "unique_constraint_violation");
    assert!(service.list_pages(v2.id).unwrap().is_empty());

    let err = service.add_page("C", "http://x.com", v1.id).unwrap_err();
    assert!(matches!(
        err,
        HierarchyError::UniqueConstraintViolation { .. }
    ));
}

#[test]
fn add_page_requires_existing_version() {
    let conn = open_db_in_memory().unwrap();
    let service = SqliteHierarchyService::sqlite(&conn).unwrap();

    let err = service.add_page("A", "http://a.com", 42).unwrap_err();
    assert!(matches!(
        err,
        HierarchyError::NotFound {
            kind: EntityKind::Version,
            id: 42
        }
    ));
    assert_eq!(count_rows(&conn, "pages"), 0);
}

#[test]
fn delete_page_then_second_delete_is_not_found() {
    let conn = open_db_in_memory().unwrap();
    let service = SqliteHierarchyService::sqlite(&conn).unwrap();
    let p = service.add_portfolio("P", "http://p.com").unwrap();
    let v1 = service.add_portfolio_version(p.id, "v1", None).unwrap().version;
    let a = service.add_page("A", "http://a.com", v1.id).unwrap();

    assert!(service.delete_page(a.page.id).unwrap());
    assert!(service.list_pages(v1.id).unwrap().is_empty());

    let err = service.delete_page(a.page.id).unwrap_err();
    assert!(matches!(
        err,
        HierarchyError::NotFound {
            kind: EntityKind::Page,
            ..
        }
    ));
}

#[test]
fn add_version_to_missing_portfolio_writes_nothing() {
    let conn = open_db_in_memory().unwrap();
    let service = SqliteHierarchyService::sqlite(&conn).unwrap();

    let err = service
        .add_portfolio_version(999, "x", Some(vec![NewPage::new("A", "http://a.com")]))
        .unwrap_err();
    assert!(matches!(
        err,
        HierarchyError::NotFound {
            kind: EntityKind::Portfolio,
            id: 999
        }
    ));
    assert_eq!(count_rows(&conn, "portfolio_versions"), 0);
    assert_eq!(count_rows(&conn, "pages"), 0);
}

#[test]
fn add_version_with_pages_creates_them_in_order() {
    let conn = open_db_in_memory().unwrap();
    let service = SqliteHierarchyService::sqlite(&conn).unwrap();
    let p = service.add_portfolio("P", "http://p.com").unwrap();

    let detail = service
        .add_portfolio_version(
            p.id,
            "draft",
            Some(vec![
                NewPage::new("Home", "http://p.com/"),
                NewPage::new("About", "http://p.com/about"),
            ]),
        )
        .unwrap();
    let names: Vec<&str> = detail.pages.iter().map(|page| page.name.as_str()).collect();
    assert_eq!(names, vec!["Home", "About"]);
    assert!(detail
        .pages
        .iter()
        .all(|page| page.version_id == detail.version.id));

    let empty = service
        .add_portfolio_version(p.id, "empty", Some(Vec::new()))
        .unwrap();
    assert!(empty.pages.is_empty());
}

#[test]
fn failing_page_batch_rolls_back_new_version() {
    let conn = open_db_in_memory().unwrap();
    let service = SqliteHierarchyService::sqlite(&conn).unwrap();
    let p = service.add_portfolio("P", "http://p.com").unwrap();

    let err = service
        .add_portfolio_version(
            p.id,
            "draft",
            Some(vec![
                NewPage::new("One", "http://dup.com"),
                NewPage::new("Two", "http://dup.com"),
            ]),
        )
        .unwrap_err();
    assert!(matches!(
        err,
        HierarchyError::UniqueConstraintViolation { .. }
    ));
    assert!(service.list_portfolio_versions(p.id).unwrap().is_empty());
    assert_eq!(count_rows(&conn, "pages"), 0);
}

#[test]
fn replacing_with_empty_list_removes_every_page() {
    let conn = open_db_in_memory().unwrap();
    let service = SqliteHierarchyService::sqlite(&conn).unwrap();
    let p = service.add_portfolio("P", "http://p.com").unwrap();
    let version = service
        .add_portfolio_version(
            p.id,
            "draft",
            Some(vec![
                NewPage::new("A", "http://a.com"),
                NewPage::new("B", "http://b.com"),
            ]),
        )
        .unwrap()
        .version;

    let updated = service
        .update_portfolio_version(version.id, None, Some(Vec::new()))
        .unwrap();
    assert!(updated.pages.is_empty());
    assert_eq!(updated.version.version_type, "draft");
    assert!(service.list_pages(version.id).unwrap().is_empty());
}

#[test]
fn omitted_pages_leave_page_set_unchanged() {
    let conn = open_db_in_memory().unwrap();
    let service = SqliteHierarchyService::sqlite(&conn).unwrap();
    let p = service.add_portfolio("P", "http://p.com").unwrap();
    let created = service
        .add_portfolio_version(p.id, "draft", Some(vec![NewPage::new("A", "http://a.com")]))
        .unwrap();

    let updated = service
        .update_portfolio_version(created.version.id, Some("published".to_string()), None)
        .unwrap();
    assert_eq!(updated.version.version_type, "published");
    assert_eq!(updated.pages, created.pages);
}

#[test]
fn full_replace_swaps_page_set_and_may_reuse_urls() {
    let conn = open_db_in_memory().unwrap();
    let service = SqliteHierarchyService::sqlite(&conn).unwrap();
    let p = service.add_portfolio("P", "http://p.com").unwrap();
    let created = service
        .add_portfolio_version(
            p.id,
            "draft",
            Some(vec![
                NewPage::new("A", "http://a.com"),
                NewPage::new("B", "http://b.com"),
            ]),
        )
        .unwrap();

    let updated = service
        .update_portfolio_version(
            created.version.id,
            None,
            Some(vec![
                NewPage::new("B again", "http://b.com"),
                NewPage::new("C", "http://c.com"),
            ]),
        )
        .unwrap();
    let urls: Vec<&str> = updated.pages.iter().map(|page| page.url.as_str()).collect();
    assert_eq!(urls, vec!["http://b.com", "http://c.com"]);
    assert_eq!(count_rows(&conn, "pages"), 2);
}

#[test]
fn failing_full_replace_keeps_previous_pages() {
    let conn = open_db_in_memory().unwrap();
    let service = SqliteHierarchyService::sqlite(&conn).unwrap();
    let p = service.add_portfolio("P", "http://p.com").unwrap();
    let target = service
        .add_portfolio_version(p.id, "draft", Some(vec![NewPage::new("A", "http://a.com")]))
        .unwrap();
    service
        .add_portfolio_version(p.id, "other", Some(vec![NewPage::new("Z", "http://z.com")]))
        .unwrap();

    let err = service
        .update_portfolio_version(
            target.version.id,
            Some("renamed".to_string()),
            Some(vec![
                NewPage::new("New", "http://new.com"),
                NewPage::new("Clash", "http://z.com"),
            ]),
        )
        .unwrap_err();
    assert!(matches!(
        err,
        HierarchyError::UniqueConstraintViolation { .. }
    ));

    let current = service.get_portfolio_version(target.version.id).unwrap();
    assert_eq!(current.version.version_type, "draft");
    assert_eq!(current.pages, target.pages);
}

#[test]
fn update_missing_version_is_not_found() {
    let conn = open_db_in_memory().unwrap();
    let service = SqliteHierarchyService::sqlite(&conn).unwrap();

    let err = service
        .update_portfolio_version(5, Some("x".to_string()), Some(Vec::new()))
        .unwrap_err();
    assert!(matches!(
        err,
        HierarchyError::NotFound {
            kind: EntityKind::Version,
            id: 5
        }
    ));
}

#[test]
fn update_page_with_no_fields_returns_page_unchanged() {
    let conn = open_db_in_memory().unwrap();
    let service = SqliteHierarchyService::sqlite(&conn).unwrap();
    let p = service.add_portfolio("P", "http://p.com").unwrap();
    let v = service.add_portfolio_version(p.id, "v1", None).unwrap().version;
    let a = service.add_page("A", "http://a.com", v.id).unwrap();

    let same = service.update_page(a.page.id, &PagePatch::default()).unwrap();
    assert_eq!(same, a);
}

#[test]
fn update_page_can_keep_own_url_but_not_take_another() {
    let conn = open_db_in_memory().unwrap();
    let service = SqliteHierarchyService::sqlite(&conn).unwrap();
    let p = service.add_portfolio("P", "http://p.com").unwrap();
    let v = service.add_portfolio_version(p.id, "v1", None).unwrap().version;
    let a = service.add_page("A", "http://a.com", v.id).unwrap();
    service.add_page("B", "http://b.com", v.id).unwrap();

    let renamed = service
        .update_page(
            a.page.id,
            &PagePatch {
                name: Some("A renamed".to_string()),
                url: Some("http://a.com".to_string()),
                version_id: None,
            },
        )
        .unwrap();
    assert_eq!(renamed.page.name, "A renamed");

    let err = service
        .update_page(
            a.page.id,
            &PagePatch {
                url: Some("http://b.com".to_string()),
                ..PagePatch::default()
            },
        )
        .unwrap_err();
    assert!(matches!(
        err,
        HierarchyError::UniqueConstraintViolation { .. }
    ));
}

#[test]
fn reassign_page_moves_it_between_versions() {
    let conn = open_db_in_memory().unwrap();
    let service = SqliteHierarchyService::sqlite(&conn).unwrap();
    let p = service.add_portfolio("P", "http://p.com").unwrap();
    let v1 = service.add_portfolio_version(p.id, "v1", None).unwrap().version;
    let v2 = service.add_portfolio_version(p.id, "v2", None).unwrap().version;
    let a = service.add_page("A", "http://a.com", v1.id).unwrap();

    let moved = service.reassign_page(a.page.id, v2.id).unwrap();
    assert_eq!(moved.page.version_id, v2.id);
    assert_eq!(moved.version, v2);
    assert!(service.list_pages(v1.id).unwrap().is_empty());
    assert_eq!(service.list_pages(v2.id).unwrap().len(), 1);
}

#[test]
fn reassign_to_missing_version_changes_nothing() {
    let conn = open_db_in_memory().unwrap();
    let service = SqliteHierarchyService::sqlite(&conn).unwrap();
    let p = service.add_portfolio("P", "http://p.com").unwrap();
    let v1 = service.add_portfolio_version(p.id, "v1", None).unwrap().version;
    let a = service.add_page("A", "http://a.com", v1.id).unwrap();

    let err = service
        .update_page(
            a.page.id,
            &PagePatch {
                name: Some("moved".to_string()),
                version_id: Some(321),
                ..PagePatch::default()
            },
        )
        .unwrap_err();
    assert!(matches!(
        err,
        HierarchyError::NotFound {
            kind: EntityKind::Version,
            id: 321
        }
    ));
    assert_eq!(service.list_pages(v1.id).unwrap()[0].page, a.page);
}

#[test]
fn update_missing_page_reports_page_before_version() {
    let conn = open_db_in_memory().unwrap();
    let service = SqliteHierarchyService::sqlite(&conn).unwrap();

    let err = service.reassign_page(8, 9).unwrap_err();
    assert!(matches!(
        err,
        HierarchyError::NotFound {
            kind: EntityKind::Page,
            id: 8
        }
    ));
}

#[test]
fn update_portfolio_applies_patch_and_reports_missing() {
    let conn = open_db_in_memory().unwrap();
    let service = SqliteHierarchyService::sqlite(&conn).unwrap();
    let p = service.add_portfolio("P", "http://p.com").unwrap();

    let unchanged = service
        .update_portfolio(p.id, &PortfolioPatch::default())
        .unwrap();
    assert_eq!(unchanged, p);

    let updated = service
        .update_portfolio(
            p.id,
            &PortfolioPatch {
                name: None,
                url: Some("https://p.org".to_string()),
            },
        )
        .unwrap();
    assert_eq!(updated.name, "P");
    assert_eq!(updated.url, "https://p.org");

    let err = service
        .update_portfolio(77, &PortfolioPatch::default())
        .unwrap_err();
    assert!(matches!(
        err,
        HierarchyError::NotFound {
            kind: EntityKind::Portfolio,
            id: 77
        }
    ));
}

#[test]
fn delete_portfolio_cascades_to_versions_and_pages() {
    let conn = open_db_in_memory().unwrap();
    let service = SqliteHierarchyService::sqlite(&conn).unwrap();
    let p = service.add_portfolio("P", "http://p.com").unwrap();
    let keep = service.add_portfolio("Keep", "http://keep.com").unwrap();
    service
        .add_portfolio_version(p.id, "v1", Some(vec![NewPage::new("A", "http://a.com")]))
        .unwrap();
    service
        .add_portfolio_version(p.id, "v2", Some(vec![NewPage::new("B", "http://b.com")]))
        .unwrap();
    service
        .add_portfolio_version(keep.id, "v1", Some(vec![NewPage::new("K", "http://k.com")]))
        .unwrap();

    assert!(service.delete_portfolio(p.id).unwrap());

    assert_eq!(count_rows(&conn, "portfolios"), 1);
    assert_eq!(count_rows(&conn, "portfolio_versions"), 1);
    assert_eq!(count_rows(&conn, "pages"), 1);
    assert!(service.list_portfolio_versions(p.id).unwrap().is_empty());

    let err = service.delete_portfolio(p.id).unwrap_err();
    assert!(matches!(err, HierarchyError::NotFound { .. }));

    // The freed url can be reused.
    let v = service.add_portfolio_version(keep.id, "v2", None).unwrap();
    service.add_page("A", "http://a.com", v.version.id).unwrap();
}

#[test]
fn restrict_mode_refuses_to_orphan_children() {
    let conn = open_db_in_memory().unwrap();
    let service = SqliteHierarchyService::sqlite(&conn).unwrap();
    let p = service.add_portfolio("P", "http://p.com").unwrap();
    let v = service
        .add_portfolio_version(
            p.id,
            "v1",
            Some(vec![
                NewPage::new("A", "http://a.com"),
                NewPage::new("B", "http://b.com"),
            ]),
        )
        .unwrap()
        .version;

    let err = service
        .delete_portfolio_version_with_mode(v.id, DeleteMode::Restrict)
        .unwrap_err();
    assert!(matches!(
        err,
        HierarchyError::HasDependents {
            kind: EntityKind::Version,
            dependents: 2,
            ..
        }
    ));
    assert_eq!(err.code(), "has_dependents");

    let err = service
        .delete_portfolio_with_mode(p.id, DeleteMode::Restrict)
        .unwrap_err();
    assert!(matches!(
        err,
        HierarchyError::HasDependents {
            kind: EntityKind::Portfolio,
            dependents: 1,
            ..
        }
    ));
    assert_eq!(count_rows(&conn, "pages"), 2);

    service.update_portfolio_version(v.id, None, Some(Vec::new())).unwrap();
    assert!(service
        .delete_portfolio_version_with_mode(v.id, DeleteMode::Restrict)
        .unwrap());
    assert!(service
        .delete_portfolio_with_mode(p.id, DeleteMode::Restrict)
        .unwrap());
}

#[test]
fn delete_version_cascades_pages() {
    let conn = open_db_in_memory().unwrap();
    let service = SqliteHierarchyService::sqlite(&conn).unwrap();
    let p = service.add_portfolio("P", "http://p.com").unwrap();
    let v = service
        .add_portfolio_version(p.id, "v1", Some(vec![NewPage::new("A", "http://a.com")]))
        .unwrap()
        .version;

    assert!(service.delete_portfolio_version(v.id).unwrap());
    assert_eq!(count_rows(&conn, "pages"), 0);
    assert!(service.list_pages(v.id).unwrap().is_empty());
    assert!(matches!(
        service.get_portfolio_version(v.id),
        Err(HierarchyError::NotFound {
            kind: EntityKind::Version,
            ..
        })
    ));
    assert!(matches!(
        service.delete_portfolio_version(v.id),
        Err(HierarchyError::NotFound { .. })
    ));
}

#[test]
fn invalid_ids_and_text_are_rejected() {
    let conn = open_db_in_memory().unwrap();
    let service = SqliteHierarchyService::sqlite(&conn).unwrap();

    assert!(matches!(
        service.list_pages(0),
        Err(HierarchyError::Validation(ValidationError::InvalidId { .. }))
    ));
    assert!(matches!(
        service.delete_page(-1),
        Err(HierarchyError::Validation(_))
    ));

    let too_long = "x".repeat(portfolio_core::MAX_TEXT_CHARS + 1);
    let err = service.add_portfolio(too_long, "").unwrap_err();
    assert!(matches!(
        err,
        HierarchyError::Validation(ValidationError::FieldTooLong { field: "name", .. })
    ));
    assert_eq!(err.code(), "validation_failed");
    assert_eq!(count_rows(&conn, "portfolios"), 0);
}

#[test]
fn detail_types_serialize_with_camel_case_fields() {
    let conn = open_db_in_memory().unwrap();
    let service = SqliteHierarchyService::sqlite(&conn).unwrap();
    let p = service.add_portfolio("P", "http://p.com").unwrap();
    let detail = service
        .add_portfolio_version(p.id, "draft", Some(vec![NewPage::new("A", "http://a.com")]))
        .unwrap();

    let value = serde_json::to_value(&detail).unwrap();
    assert_eq!(
        value,
        json!({
            "id": detail.version.id,
            "portfolioId": p.id,
            "versionType": "draft",
            "portfolio": { "id": p.id, "name": "P", "url": "http://p.com" },
            "pages": [{
                "id": detail.pages[0].id,
                "versionId": detail.version.id,
                "name": "A",
                "url": "http://a.com"
            }]
        })
    );

    let listed = serde_json::to_value(service.list_portfolios().unwrap()).unwrap();
    assert_eq!(listed[0]["versions"][0]["versionType"], "draft");
    assert_eq!(listed[0]["name"], "P");
}

#[test]
fn failed_operations_inside_caller_transaction_leave_no_writes() {
    let conn = open_db_in_memory().unwrap();
    let service = SqliteHierarchyService::sqlite(&conn).unwrap();
    let p = service.add_portfolio("P", "http://p.com").unwrap();
    let v1 = service
        .add_portfolio_version(p.id, "a", Some(vec![NewPage::new("A", "http://x.com")]))
        .unwrap();

    conn.execute_batch("BEGIN;").unwrap();

    let err = service
        .add_portfolio_version(
            p.id,
            "b",
            Some(vec![
                NewPage::new("Y", "http://y.com"),
                NewPage::new("Dup", "http://x.com"),
            ]),
        )
        .unwrap_err();
    assert!(matches!(
        err,
        HierarchyError::UniqueConstraintViolation { .. }
    ));

    let err = service
        .update_portfolio_version(
            v1.version.id,
            None,
            Some(vec![
                NewPage::new("D", "http://x.com"),
                NewPage::new("D twice", "http://x.com"),
            ]),
        )
        .unwrap_err();
    assert!(matches!(
        err,
        HierarchyError::UniqueConstraintViolation { .. }
    ));

    let added = service.add_page("B", "http://b.com", v1.version.id).unwrap();
    conn.execute_batch("COMMIT;").unwrap();

    let versions = service.list_portfolio_versions(p.id).unwrap();
    assert_eq!(versions.len(), 1);
    assert_eq!(versions[0].pages, vec![v1.pages[0].clone(), added.page]);
    assert_eq!(count_rows(&conn, "pages"), 2);
}
