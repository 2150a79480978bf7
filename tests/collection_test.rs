use dossier::records::{Customer, CustomerDraft, User, UserDraft};
use dossier::store::{Collection, ListFilter, ListOrder};
use dossier::StoreError;
use std::fs;
use tempfile::TempDir;

fn setup() -> (TempDir, Collection<Customer>) {
    let dir = TempDir::new().unwrap();
    let store = Collection::open(dir.path().join("customers")).unwrap();
    (dir, store)
}

fn draft(name: &str, phone: &str) -> CustomerDraft {
    CustomerDraft {
        name: name.to_string(),
        district: "Kollam".to_string(),
        phone: phone.to_string(),
        ..CustomerDraft::default()
    }
}

#[test]
fn test_save_assigns_sequential_ids() {
    let (_dir, store) = setup();

    let a = store.save(draft("A", "9000000001").validate().unwrap()).unwrap();
    let b = store.save(draft("B", "9000000002").validate().unwrap()).unwrap();

    assert_eq!(a.id, 1);
    assert_eq!(b.id, 2);
}

#[test]
fn test_save_stamps_timestamps() {
    let (_dir, store) = setup();

    let saved = store.save(draft("A", "9000000001").validate().unwrap()).unwrap();
    assert!(saved.created_at.is_some());
    assert!(saved.updated_at.is_some());
}

#[test]
fn test_get_round_trip() {
    let (_dir, store) = setup();

    let saved = store.save(draft("Asha Nair", "9000000001").validate().unwrap()).unwrap();
    let loaded = store.get(saved.id).unwrap().unwrap();

    assert_eq!(loaded, saved);
}

#[test]
fn test_get_missing_returns_none() {
    let (_dir, store) = setup();
    assert!(store.get(42).unwrap().is_none());
}

#[test]
fn test_record_files_are_zero_padded() {
    let (dir, store) = setup();
    store.save(draft("A", "9000000001").validate().unwrap()).unwrap();

    assert!(dir.path().join("customers").join("rec-000001.json").exists());
}

#[test]
fn test_no_temp_files_left_behind() {
    let (dir, store) = setup();
    store.save(draft("A", "9000000001").validate().unwrap()).unwrap();
    store.save(draft("B", "9000000002").validate().unwrap()).unwrap();

    for entry in fs::read_dir(dir.path().join("customers")).unwrap() {
        let name = entry.unwrap().file_name();
        let name = name.to_str().unwrap().to_string();
        assert!(!name.ends_with(".tmp"), "leftover temp file: {}", name);
    }
}

#[test]
fn test_duplicate_phone_is_rejected_and_original_untouched() {
    let (_dir, store) = setup();

    let first = store.save(draft("A", "9000000001").validate().unwrap()).unwrap();
    let err = store
        .save(draft("B", "9000000001").validate().unwrap())
        .unwrap_err();

    match err {
        StoreError::Conflict { key, holder, .. } => {
            assert_eq!(key, "phone");
            assert_eq!(holder, first.id);
        }
        other => panic!("expected conflict, got {:?}", other),
    }

    // The original record is unmodified and the loser was never written.
    let records = store.list(&ListFilter::new()).unwrap();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0], first);
}

#[test]
fn test_update_frees_old_key_and_claims_new() {
    let (_dir, store) = setup();

    let mut a = store.save(draft("A", "9000000001").validate().unwrap()).unwrap();
    a.phone = "9000000009".to_string();
    store.save(a).unwrap();

    // The old value is free for someone else now.
    store.save(draft("B", "9000000001").validate().unwrap()).unwrap();

    let by_old = store.find_by_key("phone", "9000000001").unwrap().unwrap();
    let by_new = store.find_by_key("phone", "9000000009").unwrap().unwrap();
    assert_eq!(by_old.name, "B");
    assert_eq!(by_new.name, "A");
}

#[test]
fn test_update_preserves_created_at() {
    let (_dir, store) = setup();

    let saved = store.save(draft("A", "9000000001").validate().unwrap()).unwrap();
    let created = saved.created_at;

    let mut tampered = saved.clone();
    tampered.created_at = None;
    tampered.notes = "called back".to_string();
    let updated = store.save(tampered).unwrap();

    assert_eq!(updated.created_at, created);
    assert!(updated.updated_at >= saved.updated_at);
}

#[test]
fn test_resave_changes_only_updated_at() {
    let (_dir, store) = setup();

    let saved = store.save(draft("A", "9000000001").validate().unwrap()).unwrap();
    let resaved = store.save(store.get(saved.id).unwrap().unwrap()).unwrap();

    let mut expected = saved.clone();
    expected.updated_at = resaved.updated_at;
    assert_eq!(resaved, expected);

    // Index memberships are unchanged too.
    let rebuilt = store.rebuild_from_records().unwrap();
    let report = store.verify_index(false).unwrap();
    assert!(report.consistent, "index diverged: {:?}", rebuilt);
}

#[test]
fn test_find_by_key_normalizes_probe_value() {
    let (_dir, store) = setup();
    store
        .save(draft("A", "+91 90000-00001").validate().unwrap())
        .unwrap();

    let found = store.find_by_key("phone", "91 90000 00001").unwrap();
    assert!(found.is_some());
}

#[test]
fn test_find_by_any_uses_priority_order() {
    let dir = TempDir::new().unwrap();
    let users: Collection<User> = Collection::open(dir.path().join("users")).unwrap();

    let u = UserDraft {
        name: "Asha Nair".to_string(),
        username: "asha".to_string(),
        email: "asha@example.com".to_string(),
        phone: "9000000001".to_string(),
        password_hash: "$argon2id$stub".to_string(),
        ..UserDraft::default()
    };
    let saved = users.save(u.validate().unwrap()).unwrap();

    assert_eq!(
        users.find_by_any("asha@example.com").unwrap().map(|u| u.id),
        Some(saved.id)
    );
    assert_eq!(
        users.find_by_any("asha").unwrap().map(|u| u.id),
        Some(saved.id)
    );
    assert_eq!(
        users.find_by_any("9000000001").unwrap().map(|u| u.id),
        Some(saved.id)
    );
    assert!(users.find_by_any("nobody@example.com").unwrap().is_none());
}

#[test]
fn test_list_newest_first_by_default() {
    let (_dir, store) = setup();
    store.save(draft("Old", "9000000001").validate().unwrap()).unwrap();
    store.save(draft("New", "9000000002").validate().unwrap()).unwrap();

    let records = store.list(&ListFilter::new()).unwrap();
    assert_eq!(records.len(), 2);
    assert!(records[0].created_at >= records[1].created_at);

    let oldest = store
        .list(&ListFilter::new().order(ListOrder::OldestFirst))
        .unwrap();
    assert_eq!(oldest[0].id, 1);
}

#[test]
fn test_list_filters_by_bucket_and_text() {
    let (_dir, store) = setup();
    store.save(draft("Asha Nair", "9000000001").validate().unwrap()).unwrap();
    let mut inactive = draft("Ravi Menon", "9000000002").validate().unwrap();
    inactive.active = false;
    store.save(inactive).unwrap();

    let active = store
        .list(&ListFilter::new().bucket("active", "true"))
        .unwrap();
    assert_eq!(active.len(), 1);
    assert_eq!(active[0].name, "Asha Nair");

    let by_text = store.list(&ListFilter::new().text("ravi")).unwrap();
    assert_eq!(by_text.len(), 1);
    assert_eq!(by_text[0].name, "Ravi Menon");

    let none = store
        .list(&ListFilter::new().bucket("active", "false").text("asha"))
        .unwrap();
    assert!(none.is_empty());
}

#[test]
fn test_delete_removes_record_and_memberships() {
    let (dir, store) = setup();
    let saved = store.save(draft("A", "9000000001").validate().unwrap()).unwrap();

    assert!(store.delete(saved.id).unwrap());
    assert!(store.get(saved.id).unwrap().is_none());
    assert!(store.find_by_key("phone", "9000000001").unwrap().is_none());
    assert!(!dir
        .path()
        .join("customers")
        .join("rec-000001.json")
        .exists());

    // The freed key can be claimed again.
    store.save(draft("B", "9000000001").validate().unwrap()).unwrap();
}

#[test]
fn test_delete_missing_is_a_noop() {
    let (_dir, store) = setup();
    assert!(!store.delete(42).unwrap());
}

#[test]
fn test_ids_are_never_reused_after_delete() {
    let (_dir, store) = setup();

    let a = store.save(draft("A", "9000000001").validate().unwrap()).unwrap();
    let b = store.save(draft("B", "9000000002").validate().unwrap()).unwrap();
    store.delete(b.id).unwrap();

    let c = store.save(draft("C", "9000000003").validate().unwrap()).unwrap();
    assert_eq!(a.id, 1);
    assert_eq!(b.id, 2);
    assert_eq!(c.id, 3);
}

#[test]
fn test_corrupt_record_reads_as_absent_with_side_channel() {
    let (dir, store) = setup();
    let saved = store.save(draft("A", "9000000001").validate().unwrap()).unwrap();

    fs::write(
        dir.path().join("customers").join("rec-000001.json"),
        "{ not json",
    )
    .unwrap();

    assert_eq!(store.corrupt_reads(), 0);
    assert!(store.get(saved.id).unwrap().is_none());
    assert_eq!(store.corrupt_reads(), 1);
}

#[test]
fn test_concurrent_reader_sees_old_or_new_never_a_mix() {
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Arc;
    use std::thread;

    let dir = Arc::new(TempDir::new().unwrap());
    let store: Collection<Customer> = Collection::open(dir.path().join("customers")).unwrap();
    let saved = store.save(draft("v0", "9000000001").validate().unwrap()).unwrap();
    let id = saved.id;
    let done = Arc::new(AtomicBool::new(false));

    let writer = {
        let dir = Arc::clone(&dir);
        let done = Arc::clone(&done);
        thread::spawn(move || {
            let store: Collection<Customer> =
                Collection::open(dir.path().join("customers")).unwrap();
            for round in 1..=25 {
                let mut record = store.get(id).unwrap().unwrap();
                record.name = format!("v{}", round);
                record.notes = format!("round {}", round);
                store.save(record).unwrap();
            }
            done.store(true, Ordering::SeqCst);
        })
    };

    while !done.load(Ordering::SeqCst) {
        if let Some(record) = store.get(id).unwrap() {
            // Name and notes are written together; a torn read would let
            // them disagree.
            let version: u32 = record.name.trim_start_matches('v').parse().unwrap();
            if version > 0 {
                assert_eq!(record.notes, format!("round {}", version));
            } else {
                assert_eq!(record.notes, "");
            }
        }
    }
    writer.join().unwrap();
}

#[test]
fn test_records_visible_across_store_handles() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("customers");

    let first: Collection<Customer> = Collection::open(&path).unwrap();
    let saved = first.save(draft("A", "9000000001").validate().unwrap()).unwrap();
    drop(first);

    let second: Collection<Customer> = Collection::open(&path).unwrap();
    assert_eq!(second.get(saved.id).unwrap().unwrap(), saved);
    assert_eq!(
        second.save(draft("B", "9000000002").validate().unwrap()).unwrap().id,
        2
    );
}
